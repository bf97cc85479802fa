//! Dry-run scope limiting over a long-form table.
//!
//! Each axis (reporting package, organization, year) is matched to the first
//! dimension column whose name contains one of the axis tokens. The table is
//! then cut down to the `limit` smallest distinct values of that column. Axes
//! are applied in that fixed order, each on the previous axis's output.

use std::collections::BTreeSet;

use ahash::AHashSet;
use arrow2::array::{Array, BooleanArray, PrimitiveArray, Utf8Array};
use arrow2::compute::cast::{cast, CastOptions};
use arrow2::datatypes::DataType;
use tracing::{debug, info};

use crate::error::StorageError;
use crate::normalize::LABEL_SUFFIX;
use crate::table::LongTable;

/// Semantic axis a dry run can be limited along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    ReportingPackage,
    Organization,
    Year,
}

impl Axis {
    pub const ORDER: [Axis; 3] = [Axis::ReportingPackage, Axis::Organization, Axis::Year];

    /// Substrings identifying a column for this axis (matched case-insensitively).
    pub fn tokens(self) -> &'static [&'static str] {
        match self {
            Axis::ReportingPackage => &["raportointikokonaisuus", "reporting_package"],
            Axis::Organization => &["organisaatio", "organization", "kunta"],
            Axis::Year => &["vuosi", "year"],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Axis::ReportingPackage => "reporting package",
            Axis::Organization => "organization",
            Axis::Year => "year",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DryRunLimits {
    pub reporting_package: i64,
    pub organization: i64,
    pub year: i64,
}

impl Default for DryRunLimits {
    fn default() -> Self {
        DryRunLimits {
            reporting_package: 1,
            organization: 2,
            year: 1,
        }
    }
}

impl DryRunLimits {
    pub fn limit(&self, axis: Axis) -> i64 {
        match axis {
            Axis::ReportingPackage => self.reporting_package,
            Axis::Organization => self.organization,
            Axis::Year => self.year,
        }
    }
}

/// First non-label column, in table order, whose name contains one of the axis tokens.
pub fn candidate_column(table: &LongTable, axis: Axis) -> Option<&str> {
    table.column_names().into_iter().find(|name| {
        let lowered = name.to_lowercase();
        !name.ends_with(LABEL_SUFFIX) && axis.tokens().iter().any(|t| lowered.contains(t))
    })
}

/// Sortable cell value. Numbers order numerically, everything else as text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Key {
    Int(i64),
    /// `f64` bits remapped so integer order is IEEE total order.
    Float(i64),
    Text(String),
}

impl Key {
    fn float(v: f64) -> Self {
        let bits = v.to_bits() as i64;
        Key::Float(bits ^ (((bits >> 63) as u64) >> 1) as i64)
    }
}

fn row_keys(array: &dyn Array) -> Result<Vec<Option<Key>>, StorageError> {
    match array.data_type() {
        DataType::Utf8 => Ok(utf8_keys(array.as_any().downcast_ref::<Utf8Array<i32>>())),
        DataType::LargeUtf8 => Ok(utf8_keys(array.as_any().downcast_ref::<Utf8Array<i64>>())),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => {
            let ints = cast(array, &DataType::Int64, CastOptions::default())?;
            let ints = ints
                .as_any()
                .downcast_ref::<PrimitiveArray<i64>>()
                .ok_or_else(|| StorageError::Schema("integer cast did not yield Int64".into()))?;
            Ok(ints.iter().map(|v| v.map(|v| Key::Int(*v))).collect())
        }
        DataType::Float32 | DataType::Float64 => {
            let floats = cast(array, &DataType::Float64, CastOptions::default())?;
            let floats = floats
                .as_any()
                .downcast_ref::<PrimitiveArray<f64>>()
                .ok_or_else(|| StorageError::Schema("float cast did not yield Float64".into()))?;
            Ok(floats.iter().map(|v| v.map(|v| Key::float(*v))).collect())
        }
        DataType::Null => Ok(vec![None; array.len()]),
        _ => {
            let text = cast(array, &DataType::Utf8, CastOptions::default())?;
            Ok(utf8_keys(text.as_any().downcast_ref::<Utf8Array<i32>>()))
        }
    }
}

fn utf8_keys<O: arrow2::offset::Offset>(array: Option<&Utf8Array<O>>) -> Vec<Option<Key>> {
    array
        .map(|a| a.iter().map(|v| v.map(|s| Key::Text(s.to_owned()))).collect())
        .unwrap_or_default()
}

/// Restrict `table` to the `limit` smallest distinct non-null values of `column`.
fn limit_column(table: &LongTable, column: &str, limit: usize) -> Result<LongTable, StorageError> {
    let Some(array) = table.column(column) else {
        return Ok(table.clone());
    };
    let keys = row_keys(array)?;

    let distinct: BTreeSet<&Key> = keys.iter().flatten().collect();
    let keep: AHashSet<&Key> = distinct.into_iter().take(limit).collect();

    let mask: Vec<bool> = keys
        .iter()
        .map(|k| k.as_ref().is_some_and(|k| keep.contains(k)))
        .collect();
    table.filter(&BooleanArray::from_slice(mask))
}

/// Apply the dry-run limits axis by axis. The input table is left untouched.
///
/// Axes with a limit of zero or less, or without a matching column, are skipped.
pub fn apply_dry_run_limits(
    table: &LongTable,
    limits: &DryRunLimits,
) -> Result<LongTable, StorageError> {
    let mut filtered = table.clone();
    for axis in Axis::ORDER {
        let limit = limits.limit(axis);
        if limit <= 0 {
            continue;
        }
        let Some(column) = candidate_column(&filtered, axis).map(str::to_owned) else {
            debug!(axis = axis.name(), "no column for axis; skipping");
            continue;
        };

        let before = filtered.height();
        filtered = limit_column(&filtered, &column, limit as usize)?;
        info!(
            axis = axis.name(),
            column = %column,
            limit,
            rows_before = before,
            rows_after = filtered.height(),
            "applied dry-run limit"
        );
    }
    Ok(filtered)
}
