use std::collections::BTreeSet;

use serde_json::json;
use vk_etl::{apply_dry_run_limits, normalize_dataset, DryRunLimits, LongTable};

fn sample() -> LongTable {
    normalize_dataset(&json!({
        "dataset": {
            "id": ["Raportointikokonaisuus", "Organisaatio", "Vuosi"],
            "dimension": {
                "Raportointikokonaisuus": {
                    "category": {"index": {"Käyttötalous": 0, "Tuloslaskelma": 1}}
                },
                "Organisaatio": {
                    "category": {
                        "index": {"091": 0, "049": 1, "235": 2},
                        "label": {"091": "Helsinki", "049": "Espoo", "235": "Kauniainen"}
                    }
                },
                "Vuosi": {"category": {"index": {"2022": 0, "2023": 1}}}
            },
            "value": (0..12).collect::<Vec<i64>>()
        }
    }))
    .unwrap()
}

fn distinct(table: &LongTable, column: &str) -> BTreeSet<String> {
    table
        .utf8_values(column)
        .unwrap()
        .into_iter()
        .flatten()
        .collect()
}

#[test]
fn default_limits_shrink_each_axis() {
    let table = sample();
    let limited = apply_dry_run_limits(&table, &DryRunLimits::default()).unwrap();

    assert_eq!(distinct(&limited, "raportointikokonaisuus"), BTreeSet::from(["Käyttötalous".to_string()]));
    assert_eq!(
        distinct(&limited, "organisaatio"),
        BTreeSet::from(["049".to_string(), "091".to_string()])
    );
    assert_eq!(distinct(&limited, "vuosi"), BTreeSet::from(["2022".to_string()]));
    assert_eq!(limited.height(), 2);
    // the input is left as it was
    assert_eq!(table.height(), 12);
}

#[test]
fn limiting_is_idempotent() {
    let limits = DryRunLimits {
        reporting_package: 2,
        organization: 2,
        year: 1,
    };
    let once = apply_dry_run_limits(&sample(), &limits).unwrap();
    let twice = apply_dry_run_limits(&once, &limits).unwrap();

    assert_eq!(once.height(), twice.height());
    for column in once.column_names() {
        if column == "value" {
            assert_eq!(once.i64_values(column), twice.i64_values(column));
        } else {
            assert_eq!(once.utf8_values(column), twice.utf8_values(column));
        }
    }
}

#[test]
fn limit_of_one_keeps_smallest_value() {
    let table = normalize_dataset(&json!({
        "dimension": {
            "Kunta": {"category": {"index": ["e", "c", "a", "d", "b"]}},
            "Tili": {"category": {"index": ["t1", "t2"]}}
        },
        "value": (0..10).collect::<Vec<i64>>()
    }))
    .unwrap();
    let limits = DryRunLimits {
        reporting_package: 0,
        organization: 1,
        year: 0,
    };
    let limited = apply_dry_run_limits(&table, &limits).unwrap();

    assert_eq!(distinct(&limited, "kunta"), BTreeSet::from(["a".to_string()]));
    assert_eq!(limited.height(), 2);
    assert_eq!(limited.i64_values("value").unwrap(), vec![Some(4), Some(5)]);
}

#[test]
fn axes_without_matching_columns_are_skipped() {
    let table = normalize_dataset(&json!({
        "dimension": {
            "Tili": {"category": {"index": ["t1", "t2", "t3"]}},
            "Tunnusluku_label": {"category": {"index": ["x"]}}
        },
        "value": [1, 2, 3]
    }))
    .unwrap();
    let limited = apply_dry_run_limits(&table, &DryRunLimits::default()).unwrap();
    assert_eq!(limited.height(), 3);
}

#[test]
fn non_positive_limits_disable_the_axis() {
    let limits = DryRunLimits {
        reporting_package: 0,
        organization: -1,
        year: 0,
    };
    let limited = apply_dry_run_limits(&sample(), &limits).unwrap();
    assert_eq!(limited.height(), 12);
}
