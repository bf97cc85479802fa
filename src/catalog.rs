//! Dataset catalog: which published datasets to ingest.
//!
//! Fetching the catalog over HTTP is the caller's job. This module filters an
//! already-loaded catalog and resolves each entry's dataset location.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::config::IngestionConfig;
use crate::error::{EtlError, FormatError};

/// A code that publishers emit either as a JSON string or a number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Code {
    Text(String),
    Number(i64),
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Code::Text(s) => f.write_str(s),
            Code::Number(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(default)]
    pub dataset_id: Option<String>,
    #[serde(default)]
    pub reporting_package: Option<String>,
    #[serde(default)]
    pub organization_type: Option<String>,
    #[serde(default)]
    pub municipality_code: Option<Code>,
    #[serde(default)]
    pub year: Option<i64>,
    pub dataset_url: String,
}

pub fn load_catalog(path: impl AsRef<Path>) -> Result<Vec<CatalogEntry>, EtlError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| EtlError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_slice(&bytes).map_err(FormatError::from)?)
}

/// Keep entries whose reporting package is whitelisted and whose organization
/// type is one of the configured types.
pub fn filter_catalog(entries: &[CatalogEntry], cfg: &IngestionConfig) -> Vec<CatalogEntry> {
    let whitelist: AHashSet<&str> = cfg.reporting_packages_whitelist.iter().map(String::as_str).collect();
    let org_types: AHashSet<&str> = cfg.organization_types.iter().map(String::as_str).collect();
    entries
        .iter()
        .filter(|e| {
            e.reporting_package.as_deref().is_some_and(|p| whitelist.contains(p))
                && e.organization_type.as_deref().is_some_and(|t| org_types.contains(t))
        })
        .cloned()
        .collect()
}

/// Narrow a catalog to the first `dry_run_year_limit` years and, within those,
/// the first `dry_run_org_limit` municipality codes.
///
/// Entries without a year are dropped.
pub fn select_dry_run_scope(entries: &[CatalogEntry], cfg: &IngestionConfig) -> Vec<CatalogEntry> {
    let years: BTreeSet<i64> = entries.iter().filter_map(|e| e.year).collect();
    let years: AHashSet<i64> = years
        .into_iter()
        .take(cfg.dry_run_year_limit.max(0) as usize)
        .collect();
    let year_filtered: Vec<&CatalogEntry> = entries
        .iter()
        .filter(|e| e.year.is_some_and(|y| years.contains(&y)))
        .collect();

    let municipality = |e: &CatalogEntry| {
        e.municipality_code
            .as_ref()
            .map(Code::to_string)
            .unwrap_or_else(|| "None".to_string())
    };
    let codes: BTreeSet<String> = year_filtered.iter().map(|e| municipality(*e)).collect();
    let codes: AHashSet<String> = codes
        .into_iter()
        .take(cfg.dry_run_org_limit.max(0) as usize)
        .collect();

    year_filtered
        .into_iter()
        .filter(|e| codes.contains(&municipality(*e)))
        .cloned()
        .collect()
}

/// Where a dataset payload lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadSource {
    /// A local file, either a bundled fixture or a plain path.
    Local(PathBuf),
    /// An `http(s)` URL; fetching is left to the caller.
    Remote(String),
}

impl PayloadSource {
    /// `fixture://rel` resolves under `fixtures_dir`; `file://` and bare paths are local.
    pub fn resolve(url: &str, fixtures_dir: &Path) -> Self {
        if let Some(rel) = url.strip_prefix("fixture://") {
            PayloadSource::Local(fixtures_dir.join(rel))
        } else if let Some(path) = url.strip_prefix("file://") {
            PayloadSource::Local(PathBuf::from(path))
        } else if url.starts_with("http://") || url.starts_with("https://") {
            PayloadSource::Remote(url.to_string())
        } else {
            PayloadSource::Local(PathBuf::from(url))
        }
    }
}
