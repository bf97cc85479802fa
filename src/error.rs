//! Error types for the ingestion core.

use std::path::PathBuf;

use thiserror::Error;

/// The payload does not have the expected dimensional shape.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("dataset must be a JSON object")]
    NotAnObject,

    #[error("dataset must include 'dimension' and 'value'")]
    MissingSections,

    #[error("dataset 'dimension' must be a JSON object")]
    DimensionsNotAnObject,

    #[error("dimension order lists '{0}' which is not declared under 'dimension'")]
    UnknownDimension(String),

    #[error("dimension '{0}' has unsupported category.index")]
    UnsupportedCategoryIndex(String),

    #[error("dimension '{dimension}' has unsupported category.label")]
    UnsupportedCategoryLabel { dimension: String },

    #[error("dimension '{dimension}' maps code '{code}' to a non-integer position")]
    InvalidCategoryPosition { dimension: String, code: String },

    #[error("dataset value must be a list or object")]
    UnsupportedValueContainer,

    #[error("dataset value key '{0}' is not an integer position")]
    InvalidValuePosition(String),

    #[error("dimension '{0}' does not map to a distinct column name")]
    DuplicateColumn(String),

    #[error("dimension cardinalities overflow the combination count")]
    TooManyCombinations,

    #[error("failed to parse dataset JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read or write failure on the persisted table.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parquet error on {path}: {source}")]
    Parquet {
        path: PathBuf,
        #[source]
        source: arrow2::error::Error,
    },

    #[error("Schema error: {0}")]
    Schema(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parquet(path: impl Into<PathBuf>, source: arrow2::error::Error) -> Self {
        StorageError::Parquet {
            path: path.into(),
            source,
        }
    }
}

impl From<arrow2::error::Error> for StorageError {
    fn from(err: arrow2::error::Error) -> Self {
        StorageError::Schema(err.to_string())
    }
}

/// Umbrella error for callers that drive the whole pipeline.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, EtlError>;
