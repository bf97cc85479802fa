use std::fs;
use std::path::{Path, PathBuf};

use config::{Config, File};
use serde::{Deserialize, Serialize};

use crate::error::EtlError;
use crate::scope::DryRunLimits;

pub const DEFAULT_CONFIG_PATH: &str = "config/settings.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub metadata_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub reporting_packages_whitelist: Vec<String>,
    pub organization_types: Vec<String>,
    pub dry_run_reporting_package_limit: i64,
    pub dry_run_year_limit: i64,
    pub dry_run_org_limit: i64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        IngestionConfig {
            reporting_packages_whitelist: Vec::new(),
            organization_types: vec!["kunta".into(), "kuntayhtymä".into()],
            dry_run_reporting_package_limit: 1,
            dry_run_year_limit: 1,
            dry_run_org_limit: 2,
        }
    }
}

impl IngestionConfig {
    pub fn dry_run_limits(&self) -> DryRunLimits {
        DryRunLimits {
            reporting_package: self.dry_run_reporting_package_limit,
            organization: self.dry_run_org_limit,
            year: self.dry_run_year_limit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub base_path: PathBuf,
    pub raw_path: PathBuf,
    pub curated_path: PathBuf,
    pub duckdb_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            base_path: PathBuf::from("data"),
            raw_path: PathBuf::from("data/raw"),
            curated_path: PathBuf::from("data/curated"),
            duckdb_path: PathBuf::from("data/vk_analytics.duckdb"),
        }
    }
}

impl StorageConfig {
    /// Default append target for normalized facts.
    pub fn raw_facts_path(&self) -> PathBuf {
        self.raw_path.join("facts_raw.parquet")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_log_level() -> String {
    "INFO".into()
}

impl AppConfig {
    /// Load settings from `path` (YAML, TOML or JSON by extension).
    ///
    /// `VK_METADATA_URL` and `VK_LOG_LEVEL` override the file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EtlError> {
        let path = path.as_ref();
        let cfg = Config::builder()
            .add_source(File::from(path))
            .set_override_option("api.metadata_url", std::env::var("VK_METADATA_URL").ok())?
            .set_override_option("log_level", std::env::var("VK_LOG_LEVEL").ok())?
            .build()?;
        Ok(cfg.try_deserialize()?)
    }

    /// Create the storage directories.
    pub fn ensure_dirs(&self) -> Result<(), EtlError> {
        for dir in [
            &self.storage.base_path,
            &self.storage.raw_path,
            &self.storage.curated_path,
        ] {
            fs::create_dir_all(dir).map_err(|source| EtlError::Io {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}
