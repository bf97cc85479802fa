//! Ingestion of JSON-stat-like statistical datasets into long-form Parquet.
//!
//! Data flows payload → [`normalize::normalize_dataset`] → optional
//! [`scope::apply_dry_run_limits`] → [`store::append_to_parquet`].

pub mod catalog;
pub mod config;
pub mod error;
pub mod log;
pub mod normalize;
pub mod payload;
pub mod scope;
pub mod store;
pub mod table;

pub use error::{EtlError, FormatError, Result, StorageError};
pub use normalize::{normalize_dataset, sanitize_column_name};
pub use scope::{apply_dry_run_limits, DryRunLimits};
pub use store::append_to_parquet;
pub use table::LongTable;
