//! Append/merge store over a single Parquet file.
//!
//! Every append reads the whole existing file, concatenates the new rows after
//! it with schema-union ("diagonal") semantics and rewrites the file in full.
//!
//! The operation is not transactional. A crash between the read and the write
//! loses the update, and a crash during the write can leave a truncated file.
//! There is no locking: concurrent appends to one target are last-writer-wins
//! and callers must serialize them.

use std::fs::{self, File};
use std::path::Path;

use arrow2::array::{new_null_array, Array, BooleanArray, Utf8Array};
use arrow2::compute::cast::{cast, CastOptions};
use arrow2::compute::concatenate::concatenate;
use arrow2::datatypes::{DataType, Field, Schema};
use arrow2::io::parquet::read;
use arrow2::io::parquet::write::{
    transverse, CompressionOptions, Encoding, FileWriter, RowGroupIterator, Version, WriteOptions,
};
use tracing::{debug, info};

use crate::error::StorageError;
use crate::table::LongTable;

static WRITE_OPTIONS: WriteOptions = WriteOptions {
    write_statistics: true,
    compression: CompressionOptions::Snappy,
    version: Version::V2,
    data_pagesize_limit: None,
};

/// Read a whole Parquet file into memory.
pub fn read_parquet(path: &Path) -> Result<LongTable, StorageError> {
    let mut file = File::open(path).map_err(|e| StorageError::io(path, e))?;
    let metadata = read::read_metadata(&mut file).map_err(|e| StorageError::parquet(path, e))?;
    let schema = read::infer_schema(&metadata).map_err(|e| StorageError::parquet(path, e))?;

    let reader = read::FileReader::new(file, metadata.row_groups, schema.clone(), None, None, None);

    let mut parts: Vec<Vec<Box<dyn Array>>> = schema.fields.iter().map(|_| Vec::new()).collect();
    for chunk in reader {
        let chunk = chunk.map_err(|e| StorageError::parquet(path, e))?;
        for (i, array) in chunk.into_arrays().into_iter().enumerate() {
            parts[i].push(array);
        }
    }

    let columns = parts
        .into_iter()
        .zip(schema.fields.iter())
        .map(|(arrays, field)| concat_all(&arrays, &field.data_type))
        .collect::<Result<Vec<_>, _>>()?;

    LongTable::try_new(schema, columns)
}

/// Overwrite `path` with `table`.
pub fn write_parquet(table: &LongTable, path: &Path) -> Result<(), StorageError> {
    let schema = table.schema();
    let encodings: Vec<Vec<Encoding>> = schema
        .fields
        .iter()
        .map(|f| transverse(&f.data_type, |_| Encoding::Plain))
        .collect();

    let row_groups = RowGroupIterator::try_new(
        std::iter::once(Ok(table.clone().into_chunk())),
        schema,
        WRITE_OPTIONS,
        encodings,
    )
    .map_err(|e| StorageError::parquet(path, e))?;

    let file = File::create(path).map_err(|e| StorageError::io(path, e))?;
    let mut writer = FileWriter::try_new(file, schema.clone(), WRITE_OPTIONS)
        .map_err(|e| StorageError::parquet(path, e))?;

    for group in row_groups {
        let group = group.map_err(|e| StorageError::parquet(path, e))?;
        writer.write(group).map_err(|e| StorageError::parquet(path, e))?;
    }
    writer.end(None).map_err(|e| StorageError::parquet(path, e))?;

    debug!(path = %path.display(), rows = table.height(), "wrote parquet file");
    Ok(())
}

/// Common type two columns of the same name are widened to.
///
/// Integers widen to Int64, integer with float to Float64, Null adopts the
/// other side, and any other disagreement falls back to Utf8.
pub fn widen(a: &DataType, b: &DataType) -> DataType {
    if a == b {
        return a.clone();
    }
    match (a, b) {
        (DataType::Null, other) | (other, DataType::Null) => other.clone(),
        (x, y) if is_integer(x) && is_integer(y) => DataType::Int64,
        (x, y) if is_numeric(x) && is_numeric(y) => DataType::Float64,
        _ => DataType::Utf8,
    }
}

fn is_integer(dt: &DataType) -> bool {
    matches!(
        dt,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
    )
}

fn is_numeric(dt: &DataType) -> bool {
    is_integer(dt) || matches!(dt, DataType::Float32 | DataType::Float64 | DataType::UInt64)
}

fn concat_all(arrays: &[Box<dyn Array>], data_type: &DataType) -> Result<Box<dyn Array>, StorageError> {
    match arrays {
        [] => Ok(new_null_array(data_type.clone(), 0)),
        [single] => Ok(single.to_boxed()),
        many => {
            let refs: Vec<&dyn Array> = many.iter().map(|a| a.as_ref()).collect();
            Ok(concatenate(&refs)?)
        }
    }
}

/// Column of `table` named `name`, cast to `data_type`, or all nulls if absent.
fn aligned_column(
    table: &LongTable,
    name: &str,
    data_type: &DataType,
) -> Result<Box<dyn Array>, StorageError> {
    match table.column(name) {
        Some(array) if array.data_type() == data_type => Ok(array.to_boxed()),
        Some(array) if *array.data_type() == DataType::Boolean && *data_type == DataType::Utf8 => {
            bool_to_text(array)
        }
        Some(array) => Ok(cast(array, data_type, CastOptions::default())?),
        None => Ok(new_null_array(data_type.clone(), table.height())),
    }
}

/// Booleans as `"true"`/`"false"`, the same text a mixed value column gets.
fn bool_to_text(array: &dyn Array) -> Result<Box<dyn Array>, StorageError> {
    let bools = array
        .as_any()
        .downcast_ref::<BooleanArray>()
        .ok_or_else(|| StorageError::Schema("boolean column is not a BooleanArray".into()))?;
    let text: Utf8Array<i32> = bools
        .iter()
        .map(|v| v.map(|b| if b { "true" } else { "false" }))
        .collect();
    Ok(text.boxed())
}

/// Rows of `first` followed by rows of `second`, over the union of their columns.
///
/// Column order is `first`'s columns, then the columns only `second` has.
pub fn concat_diagonal(first: &LongTable, second: &LongTable) -> Result<LongTable, StorageError> {
    let mut fields: Vec<Field> = Vec::with_capacity(first.width() + second.width());
    for field in &first.schema().fields {
        let data_type = match second.field(&field.name) {
            Some(other) => widen(&field.data_type, &other.data_type),
            None => field.data_type.clone(),
        };
        fields.push(Field::new(field.name.clone(), data_type, true));
    }
    for field in &second.schema().fields {
        if first.field(&field.name).is_none() {
            fields.push(Field::new(field.name.clone(), field.data_type.clone(), true));
        }
    }

    let columns = fields
        .iter()
        .map(|field| {
            let top = aligned_column(first, &field.name, &field.data_type)?;
            let bottom = aligned_column(second, &field.name, &field.data_type)?;
            Ok(concatenate(&[top.as_ref(), bottom.as_ref()])?)
        })
        .collect::<Result<Vec<_>, StorageError>>()?;

    LongTable::try_new(Schema::from(fields), columns)
}

/// Append `table` to the Parquet file at `target` and return the merged content.
///
/// A missing target is created (with its parent directories) holding just
/// `table`. An existing but unreadable target is an error; nothing is written.
pub fn append_to_parquet(table: &LongTable, target: &Path) -> Result<LongTable, StorageError> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }

    let combined = if target.exists() {
        let existing = read_parquet(target)?;
        debug!(existing_rows = existing.height(), new_rows = table.height(), "merging into existing table");
        concat_diagonal(&existing, table)?
    } else {
        table.clone()
    };

    write_parquet(&combined, target)?;
    info!(
        target = %target.display(),
        rows = combined.height(),
        columns = combined.width(),
        "appended to raw parquet"
    );
    Ok(combined)
}
