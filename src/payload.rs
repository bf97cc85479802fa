//! Recognized shapes of a JSON-stat-like dataset payload.
//!
//! The raw JSON is validated once here and turned into [`DatasetBody`]; the
//! normalizer only ever sees the typed form.

use std::fs;
use std::path::Path;

use ahash::AHashMap;
use serde_json::{Map, Value};

use crate::error::{EtlError, FormatError};

/// Key of the optional wrapper object around the dataset body.
pub const WRAPPER_KEY: &str = "dataset";

/// Ordered category index of one dimension.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryIndex {
    /// `["a", "b"]`: position is the list index.
    Positional(Vec<String>),
    /// `{"a": 0, "b": 1}`: code to explicit position.
    Keyed(Vec<(String, i64)>),
}

impl CategoryIndex {
    /// Category codes in position order.
    pub fn codes(&self) -> Vec<String> {
        match self {
            CategoryIndex::Positional(codes) => codes.clone(),
            CategoryIndex::Keyed(pairs) => {
                let mut sorted: Vec<&(String, i64)> = pairs.iter().collect();
                // stable: equal positions keep declaration order
                sorted.sort_by_key(|(_, pos)| *pos);
                sorted.into_iter().map(|(code, _)| code.clone()).collect()
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            CategoryIndex::Positional(codes) => codes.len(),
            CategoryIndex::Keyed(pairs) => pairs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct Dimension {
    pub name: String,
    pub index: CategoryIndex,
    pub labels: AHashMap<String, String>,
}

impl Dimension {
    /// Human-readable label for `code`, falling back to the code itself.
    pub fn label<'a>(&'a self, code: &'a str) -> &'a str {
        self.labels.get(code).map(String::as_str).unwrap_or(code)
    }
}

/// Flat value container, indexed by combination position.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueContainer {
    Dense(Vec<Value>),
    Sparse(Vec<(i64, Value)>),
}

/// A validated dataset body with dimensions in declared order.
#[derive(Debug, Clone)]
pub struct DatasetBody {
    pub dimensions: Vec<Dimension>,
    pub values: ValueContainer,
}

impl DatasetBody {
    /// Validate `payload` and extract the dimensional body.
    ///
    /// A top-level `dataset` wrapper is unwrapped when present. Both a
    /// `dimension` and a `value` section are required.
    pub fn from_json(payload: &Value) -> Result<Self, FormatError> {
        let body = match payload {
            Value::Object(map) => map.get(WRAPPER_KEY).unwrap_or(payload),
            _ => payload,
        };
        let body = body.as_object().ok_or(FormatError::NotAnObject)?;

        let (Some(dimensions), Some(values)) = (body.get("dimension"), body.get("value")) else {
            return Err(FormatError::MissingSections);
        };
        let dimensions = dimensions
            .as_object()
            .ok_or(FormatError::DimensionsNotAnObject)?;

        let order = dimension_order(body, dimensions)?;
        let dimensions = order
            .into_iter()
            .map(|name| {
                let dim = dimensions
                    .get(&name)
                    .ok_or_else(|| FormatError::UnknownDimension(name.clone()))?;
                parse_dimension(name, dim)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DatasetBody {
            dimensions,
            values: parse_values(values)?,
        })
    }

    /// Cardinality of each dimension, in declared order.
    pub fn cardinalities(&self) -> Vec<usize> {
        self.dimensions.iter().map(|d| d.index.len()).collect()
    }
}

/// Explicit `id` list when present and non-empty, else the key order of the
/// dimension mapping.
fn dimension_order(
    body: &Map<String, Value>,
    dimensions: &Map<String, Value>,
) -> Result<Vec<String>, FormatError> {
    match body.get("id") {
        Some(Value::Array(ids)) if !ids.is_empty() => ids
            .iter()
            .map(|id| match id {
                Value::String(s) => Ok(s.clone()),
                other => Err(FormatError::UnknownDimension(other.to_string())),
            })
            .collect(),
        Some(Value::Array(_)) | Some(Value::Null) | None => Ok(dimensions.keys().cloned().collect()),
        Some(other) => Err(FormatError::UnknownDimension(other.to_string())),
    }
}

fn parse_dimension(name: String, dim: &Value) -> Result<Dimension, FormatError> {
    let dim = dim
        .as_object()
        .ok_or_else(|| FormatError::UnsupportedCategoryIndex(name.clone()))?;

    let empty = Map::new();
    let category = match dim.get("category") {
        None | Some(Value::Null) => &empty,
        Some(Value::Object(category)) => category,
        Some(_) => return Err(FormatError::UnsupportedCategoryIndex(name)),
    };

    let index = match category.get("index") {
        None => CategoryIndex::Keyed(Vec::new()),
        Some(Value::Array(codes)) => {
            CategoryIndex::Positional(codes.iter().map(scalar_to_string).collect())
        }
        Some(Value::Object(positions)) => {
            let pairs = positions
                .iter()
                .map(|(code, pos)| {
                    parse_position(pos)
                        .map(|pos| (code.clone(), pos))
                        .ok_or_else(|| FormatError::InvalidCategoryPosition {
                            dimension: name.clone(),
                            code: code.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            CategoryIndex::Keyed(pairs)
        }
        Some(_) => return Err(FormatError::UnsupportedCategoryIndex(name)),
    };

    let labels = match category.get("label") {
        None | Some(Value::Null) => AHashMap::new(),
        Some(Value::Object(labels)) => labels
            .iter()
            .map(|(code, label)| (code.clone(), scalar_to_string(label)))
            .collect(),
        Some(_) => return Err(FormatError::UnsupportedCategoryLabel { dimension: name }),
    };

    Ok(Dimension {
        name,
        index,
        labels,
    })
}

fn parse_values(values: &Value) -> Result<ValueContainer, FormatError> {
    match values {
        Value::Array(items) => Ok(ValueContainer::Dense(items.clone())),
        Value::Object(entries) => entries
            .iter()
            .map(|(key, value)| {
                key.trim()
                    .parse::<i64>()
                    .map(|pos| (pos, value.clone()))
                    .map_err(|_| FormatError::InvalidValuePosition(key.clone()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(ValueContainer::Sparse),
        _ => Err(FormatError::UnsupportedValueContainer),
    }
}

fn parse_position(pos: &Value) -> Option<i64> {
    match pos {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Strings verbatim, everything else as JSON text.
pub(crate) fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Read and parse a dataset payload from a JSON file.
pub fn read_payload(path: impl AsRef<Path>) -> Result<Value, EtlError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| EtlError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_slice(&bytes).map_err(FormatError::from)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unwraps_dataset_key() {
        let payload = json!({
            "dataset": {
                "dimension": {"A": {"category": {"index": ["x", "y"]}}},
                "value": [1, 2]
            }
        });
        let body = DatasetBody::from_json(&payload).unwrap();
        assert_eq!(body.dimensions.len(), 1);
        assert_eq!(body.cardinalities(), vec![2]);
    }

    #[test]
    fn keyed_index_sorted_by_position() {
        let payload = json!({
            "dimension": {"A": {"category": {"index": {"b": 1, "c": "2", "a": 0}}}},
            "value": []
        });
        let body = DatasetBody::from_json(&payload).unwrap();
        assert_eq!(body.dimensions[0].index.codes(), vec!["a", "b", "c"]);
    }

    #[test]
    fn explicit_order_overrides_key_order() {
        let payload = json!({
            "id": ["B", "A"],
            "dimension": {
                "A": {"category": {"index": ["x"]}},
                "B": {"category": {"index": ["p"]}}
            },
            "value": [1]
        });
        let body = DatasetBody::from_json(&payload).unwrap();
        let names: Vec<_> = body.dimensions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn missing_label_falls_back_to_code() {
        let payload = json!({
            "dimension": {"A": {"category": {"index": ["x", "y"], "label": {"x": "Ex"}}}},
            "value": [1, 2]
        });
        let body = DatasetBody::from_json(&payload).unwrap();
        assert_eq!(body.dimensions[0].label("x"), "Ex");
        assert_eq!(body.dimensions[0].label("y"), "y");
    }

    #[test]
    fn rejects_malformed_shapes() {
        assert!(matches!(
            DatasetBody::from_json(&json!([1, 2])),
            Err(FormatError::NotAnObject)
        ));
        assert!(matches!(
            DatasetBody::from_json(&json!({"dataset": 3})),
            Err(FormatError::NotAnObject)
        ));
        assert!(matches!(
            DatasetBody::from_json(&json!({"dimension": {}})),
            Err(FormatError::MissingSections)
        ));
        assert!(matches!(
            DatasetBody::from_json(&json!({
                "dimension": {"A": {"category": {"index": "x"}}},
                "value": []
            })),
            Err(FormatError::UnsupportedCategoryIndex(name)) if name == "A"
        ));
        assert!(matches!(
            DatasetBody::from_json(&json!({"dimension": {}, "value": 5})),
            Err(FormatError::UnsupportedValueContainer)
        ));
        assert!(matches!(
            DatasetBody::from_json(&json!({"dimension": {}, "value": {"one": 1}})),
            Err(FormatError::InvalidValuePosition(_))
        ));
        assert!(matches!(
            DatasetBody::from_json(&json!({"id": ["Z"], "dimension": {}, "value": []})),
            Err(FormatError::UnknownDimension(name)) if name == "Z"
        ));
    }
}
