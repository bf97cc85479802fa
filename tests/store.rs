use std::fs;

use arrow2::datatypes::DataType;
use serde_json::json;
use vk_etl::store::{concat_diagonal, read_parquet};
use vk_etl::{append_to_parquet, apply_dry_run_limits, normalize_dataset, DryRunLimits, StorageError};

fn dataset(dim: &str, codes: &[&str], values: serde_json::Value) -> vk_etl::LongTable {
    normalize_dataset(&json!({
        "dimension": {dim: {"category": {"index": codes}}},
        "value": values
    }))
    .unwrap()
}

#[test]
fn appending_twice_doubles_rows() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("raw").join("facts_raw.parquet");

    let table = normalize_dataset(&json!({
        "dataset": {
            "id": ["Organisaatio", "Vuosi"],
            "dimension": {
                "Organisaatio": {"category": {"index": {"091": 0, "049": 1, "235": 2}}},
                "Vuosi": {"category": {"index": {"2022": 0, "2023": 1}}}
            },
            "value": [1, 2, 3, 4, 5, 6]
        }
    }))
    .unwrap();
    let dry_run = apply_dry_run_limits(&table, &DryRunLimits::default()).unwrap();

    let first = append_to_parquet(&dry_run, &target).unwrap();
    let second = append_to_parquet(&dry_run, &target).unwrap();

    assert!(target.exists());
    assert_eq!(first.height(), dry_run.height());
    assert_eq!(second.height(), first.height() * 2);
    assert_eq!(second.column_names(), dry_run.column_names());

    let on_disk = read_parquet(&target).unwrap();
    assert_eq!(on_disk.height(), second.height());
    assert_eq!(on_disk.utf8_values("organisaatio"), second.utf8_values("organisaatio"));
    assert_eq!(on_disk.i64_values("value"), second.i64_values("value"));
}

#[test]
fn schema_drift_is_unioned_with_nulls() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("facts.parquet");

    let first = dataset("Kunta", &["091", "049"], json!([1, 2]));
    let second = dataset("Vuosi", &["2023"], json!([0.5]));

    append_to_parquet(&first, &target).unwrap();
    let merged = append_to_parquet(&second, &target).unwrap();

    assert_eq!(
        merged.column_names(),
        vec!["kunta", "kunta_label", "value", "vuosi", "vuosi_label"]
    );
    assert_eq!(merged.height(), 3);
    assert_eq!(merged.field("value").unwrap().data_type, DataType::Float64);
    assert_eq!(
        merged.f64_values("value").unwrap(),
        vec![Some(1.0), Some(2.0), Some(0.5)]
    );
    assert_eq!(
        merged.utf8_values("kunta").unwrap(),
        vec![Some("091".to_string()), Some("049".to_string()), None]
    );
    assert_eq!(
        merged.utf8_values("vuosi").unwrap(),
        vec![None, None, Some("2023".to_string())]
    );
}

#[test]
fn conflicting_types_widen_to_text() {
    let numbers = dataset("Kunta", &["091"], json!([7]));
    let text = dataset("Kunta", &["049"], json!([".."]));

    let merged = concat_diagonal(&numbers, &text).unwrap();
    assert_eq!(merged.field("value").unwrap().data_type, DataType::Utf8);
    assert_eq!(
        merged.utf8_values("value").unwrap(),
        vec![Some("7".to_string()), Some("..".to_string())]
    );
}

#[test]
fn corrupt_target_is_an_error_and_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("facts.parquet");
    fs::write(&target, b"not a parquet file").unwrap();

    let table = dataset("Kunta", &["091"], json!([1]));
    let err = append_to_parquet(&table, &target).unwrap_err();

    assert!(matches!(err, StorageError::Parquet { .. }));
    assert_eq!(fs::read(&target).unwrap(), b"not a parquet file");
}

#[test]
fn booleans_widened_to_text_keep_their_spelling() {
    let flags = dataset("Kunta", &["091", "049"], json!([true, false]));
    let counts = dataset("Kunta", &["235"], json!([3]));

    let merged = concat_diagonal(&flags, &counts).unwrap();
    assert_eq!(merged.field("value").unwrap().data_type, DataType::Utf8);
    assert_eq!(
        merged.utf8_values("value").unwrap(),
        vec![Some("true".to_string()), Some("false".to_string()), Some("3".to_string())]
    );

    // same text as a single payload mixing the two
    let mixed = dataset("Kunta", &["091", "235"], json!([true, 3]));
    assert_eq!(
        mixed.utf8_values("value").unwrap(),
        vec![Some("true".to_string()), Some("3".to_string())]
    );
}
