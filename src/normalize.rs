//! Dataset normalization: dimensional payload to long-form rows.
//!
//! Every combination of dimension categories becomes one row. Combinations are
//! enumerated row-major over the declared dimension order (the last dimension
//! varies fastest), and a combination's position is its key into the flat
//! value container.

use ahash::{AHashMap, AHashSet};
use arrow2::array::{Array, MutableUtf8Array, Utf8Array};
use arrow2::datatypes::{DataType, Field, Schema};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::FormatError;
use crate::payload::{DatasetBody, ValueContainer};
use crate::table::{build_value_column, LongTable};

pub const VALUE_COLUMN: &str = "value";
pub const LABEL_SUFFIX: &str = "_label";

/// Lowercase, collapse every run of non-alphanumerics to `_`, trim `_`.
pub fn sanitize_column_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut in_gap = false;
    for c in lowered.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
            in_gap = false;
        } else if !in_gap {
            out.push('_');
            in_gap = true;
        }
    }
    out.trim_matches('_').to_string()
}

/// Mixed-radix decoder from combination position to per-dimension category
/// indices.
#[derive(Debug, Clone)]
pub struct CombinationIndex {
    cardinalities: Vec<usize>,
    strides: Vec<usize>,
    total: usize,
}

impl CombinationIndex {
    pub fn new(cardinalities: Vec<usize>) -> Result<Self, FormatError> {
        let mut strides = vec![1usize; cardinalities.len()];
        let mut total = 1usize;
        for (i, card) in cardinalities.iter().enumerate().rev() {
            strides[i] = total;
            total = total
                .checked_mul(*card)
                .ok_or(FormatError::TooManyCombinations)?;
        }
        Ok(CombinationIndex {
            cardinalities,
            strides,
            total,
        })
    }

    /// Number of combinations. The empty product is one.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Category index of dimension `dim` at combination `position`.
    #[inline]
    pub fn decode(&self, position: usize, dim: usize) -> usize {
        (position / self.strides[dim]) % self.cardinalities[dim]
    }
}

/// Resolve the value container to a position lookup over `total` combinations.
fn resolve_values(values: &ValueContainer, total: usize) -> AHashMap<usize, &Value> {
    match values {
        ValueContainer::Dense(items) => {
            if items.len() > total {
                warn!(
                    dropped = items.len() - total,
                    combinations = total,
                    "value sequence longer than combination count; extra values dropped"
                );
            }
            items.iter().take(total).enumerate().collect()
        }
        ValueContainer::Sparse(entries) => {
            let mut map = AHashMap::with_capacity(entries.len());
            for (pos, value) in entries {
                match usize::try_from(*pos) {
                    Ok(idx) if idx < total => {
                        map.insert(idx, value);
                    }
                    _ => debug!(position = pos, "value position outside combination range"),
                }
            }
            map
        }
    }
}

/// Convert one dataset payload into a long-form table.
///
/// Columns are, per dimension in declared order, the sanitized dimension name
/// (category code) followed by `<name>_label`, then a single `value` column.
/// The row count always equals the product of dimension cardinalities.
pub fn normalize_dataset(payload: &Value) -> Result<LongTable, FormatError> {
    let body = DatasetBody::from_json(payload)?;
    normalize_body(&body)
}

pub fn normalize_body(body: &DatasetBody) -> Result<LongTable, FormatError> {
    let codes: Vec<Vec<String>> = body.dimensions.iter().map(|d| d.index.codes()).collect();
    let combos = CombinationIndex::new(codes.iter().map(Vec::len).collect())?;
    let total = combos.len();

    let mut fields = Vec::with_capacity(body.dimensions.len() * 2 + 1);
    let mut columns: Vec<Box<dyn Array>> = Vec::with_capacity(fields.capacity());
    let mut seen = AHashSet::new();

    for (dim_idx, dim) in body.dimensions.iter().enumerate() {
        let column = sanitize_column_name(&dim.name);
        let label_column = format!("{column}{LABEL_SUFFIX}");
        if column.is_empty()
            || column == VALUE_COLUMN
            || !seen.insert(column.clone())
            || !seen.insert(label_column.clone())
        {
            return Err(FormatError::DuplicateColumn(dim.name.clone()));
        }
        let dim_codes = &codes[dim_idx];

        let mut code_col = MutableUtf8Array::<i32>::with_capacity(total);
        let mut label_col = MutableUtf8Array::<i32>::with_capacity(total);
        for position in 0..total {
            let code = dim_codes[combos.decode(position, dim_idx)].as_str();
            code_col.push(Some(code));
            label_col.push(Some(dim.label(code)));
        }

        let code_col: Utf8Array<i32> = code_col.into();
        let label_col: Utf8Array<i32> = label_col.into();
        fields.push(Field::new(column.clone(), DataType::Utf8, true));
        fields.push(Field::new(label_column, DataType::Utf8, true));
        columns.push(code_col.boxed());
        columns.push(label_col.boxed());
    }

    let lookup = resolve_values(&body.values, total);
    let values: Vec<Option<&Value>> = (0..total).map(|pos| lookup.get(&pos).copied()).collect();
    let (value_type, value_col) = build_value_column(&values);
    fields.push(Field::new(VALUE_COLUMN, value_type, true));
    columns.push(value_col);

    debug!(
        dimensions = body.dimensions.len(),
        rows = total,
        present = lookup.len(),
        "normalized dataset"
    );

    // every column was built with `total` rows
    Ok(LongTable::from_parts(Schema::from(fields), columns))
}
