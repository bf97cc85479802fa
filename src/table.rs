use std::fmt;

use arrow2::array::{
    Array, BooleanArray, MutableArray, MutableBooleanArray, MutablePrimitiveArray,
    MutableUtf8Array, PrimitiveArray, Utf8Array,
};
use arrow2::chunk::Chunk;
use arrow2::datatypes::{DataType, Field, Schema};
use serde_json::Value;

use crate::error::StorageError;
use crate::payload::scalar_to_string;

/// Long-form table: named, typed, nullable columns of equal length.
pub struct LongTable {
    schema: Schema,
    chunk: Chunk<Box<dyn Array>>,
}

impl fmt::Debug for LongTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LongTable")
            .field("columns", &self.column_names())
            .field("rows", &self.height())
            .finish()
    }
}

impl Clone for LongTable {
    fn clone(&self) -> Self {
        LongTable {
            schema: self.schema.clone(),
            chunk: Chunk::new(self.chunk.arrays().iter().map(|a| a.to_boxed()).collect()),
        }
    }
}

impl LongTable {
    /// Pair a schema with its columns. Field count and column lengths must agree.
    pub fn try_new(schema: Schema, columns: Vec<Box<dyn Array>>) -> Result<Self, StorageError> {
        if schema.fields.len() != columns.len() {
            return Err(StorageError::Schema(format!(
                "{} fields but {} columns",
                schema.fields.len(),
                columns.len()
            )));
        }
        let chunk = Chunk::try_new(columns)?;
        Ok(LongTable { schema, chunk })
    }

    /// Columns must already match `schema` and share one length.
    pub(crate) fn from_parts(schema: Schema, columns: Vec<Box<dyn Array>>) -> Self {
        LongTable {
            schema,
            chunk: Chunk::new(columns),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn into_chunk(self) -> Chunk<Box<dyn Array>> {
        self.chunk
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.chunk.len()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.schema.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.schema.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.schema.fields.iter().position(|f| f.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.position(name).map(|i| &self.schema.fields[i])
    }

    pub fn column(&self, name: &str) -> Option<&dyn Array> {
        self.position(name).map(|i| self.chunk.arrays()[i].as_ref())
    }

    /// Values of a string column, `None` if the column is missing or not Utf8.
    pub fn utf8_values(&self, name: &str) -> Option<Vec<Option<String>>> {
        let column = self.column(name)?;
        let array = column.as_any().downcast_ref::<Utf8Array<i32>>()?;
        Some(array.iter().map(|v| v.map(str::to_owned)).collect())
    }

    /// Values of an Int64 column, `None` if the column is missing or of another type.
    pub fn i64_values(&self, name: &str) -> Option<Vec<Option<i64>>> {
        let column = self.column(name)?;
        let array = column.as_any().downcast_ref::<PrimitiveArray<i64>>()?;
        Some(array.iter().map(|v| v.copied()).collect())
    }

    /// Values of a Float64 column, `None` if the column is missing or of another type.
    pub fn f64_values(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let column = self.column(name)?;
        let array = column.as_any().downcast_ref::<PrimitiveArray<f64>>()?;
        Some(array.iter().map(|v| v.copied()).collect())
    }

    /// Keep the rows where `mask` is true.
    pub fn filter(&self, mask: &BooleanArray) -> Result<Self, StorageError> {
        let chunk = arrow2::compute::filter::filter_chunk(&self.chunk, mask)?;
        Ok(LongTable {
            schema: self.schema.clone(),
            chunk,
        })
    }
}

// ─────────────────────────────────────────────────────────────
//  Value column: infer one Arrow type for a column of JSON values
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Text,
}

impl ValueKind {
    fn of(value: &Value) -> Self {
        match value {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(n) if n.is_i64() => ValueKind::Int,
            Value::Number(_) => ValueKind::Float,
            _ => ValueKind::Text,
        }
    }

    fn merge(self, other: Self) -> Self {
        use ValueKind::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Null, k) | (k, Null) => k,
            (Int, Float) | (Float, Int) => Float,
            _ => Text,
        }
    }
}

/// Build a single typed column from per-row JSON values.
///
/// All-boolean becomes Boolean, all-integer Int64, mixed numeric Float64 and
/// anything else Utf8. A column with no values at all is a Float64 of nulls.
pub fn build_value_column(values: &[Option<&Value>]) -> (DataType, Box<dyn Array>) {
    let kind = values
        .iter()
        .flatten()
        .fold(ValueKind::Null, |acc, v| acc.merge(ValueKind::of(v)));

    macro_rules! build_prim {
        ($ty:ty, $get:expr) => {{
            let mut col = MutablePrimitiveArray::<$ty>::with_capacity(values.len());
            for v in values {
                col.push(v.and_then($get));
            }
            let array: PrimitiveArray<$ty> = col.into();
            array.boxed()
        }};
    }

    match kind {
        ValueKind::Bool => {
            let mut col = MutableBooleanArray::with_capacity(values.len());
            for v in values {
                col.push(v.and_then(Value::as_bool));
            }
            let array: BooleanArray = col.into();
            (DataType::Boolean, array.boxed())
        }
        ValueKind::Int => (DataType::Int64, build_prim!(i64, Value::as_i64)),
        ValueKind::Float | ValueKind::Null => (DataType::Float64, build_prim!(f64, Value::as_f64)),
        ValueKind::Text => {
            let mut col = MutableUtf8Array::<i32>::with_capacity(values.len());
            for v in values {
                match v {
                    Some(Value::Null) | None => col.push_null(),
                    Some(v) => col.push(Some(scalar_to_string(v))),
                }
            }
            let array: Utf8Array<i32> = col.into();
            (DataType::Utf8, array.boxed())
        }
    }
}
