use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use tracing::{info, warn};

use vk_etl::catalog::{filter_catalog, load_catalog, select_dry_run_scope, PayloadSource};
use vk_etl::config::{AppConfig, DEFAULT_CONFIG_PATH};
use vk_etl::payload::read_payload;
use vk_etl::{append_to_parquet, apply_dry_run_limits, normalize_dataset, DryRunLimits, LongTable};

#[derive(Debug, Parser)]
#[command(name = "vk-etl", about = "VK Data ETL CLI")]
struct Cli {
    /// Path to the settings file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Write logs to a daily rolling file in this directory instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the resolved configuration as JSON
    PrintConfig,

    /// Normalize dataset JSON files and append them to the raw table
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Target parquet file (defaults to <raw_path>/facts_raw.parquet)
        #[arg(long)]
        target: Option<PathBuf>,

        /// Keep only a small slice of each dataset
        #[arg(long)]
        dry_run: bool,
    },

    /// Ingest the datasets a catalog file selects
    Catalog {
        catalog: PathBuf,

        /// Directory `fixture://` URLs resolve against
        #[arg(long, default_value = "fixtures")]
        fixtures: PathBuf,

        #[arg(long)]
        target: Option<PathBuf>,

        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let cfg = AppConfig::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    let _guard = vk_etl::log::init_tracing(&cfg.log_level, cli.log_dir.as_deref());
    cfg.ensure_dirs()?;

    match cli.command {
        Command::PrintConfig => {
            println!("{}", serde_json::to_string_pretty(&cfg)?);
        }
        Command::Ingest {
            files,
            target,
            dry_run,
        } => {
            let target = target.unwrap_or_else(|| cfg.storage.raw_facts_path());
            let limits = dry_run.then(|| cfg.ingestion.dry_run_limits());
            ingest_files(&files, &target, limits.as_ref())?;
        }
        Command::Catalog {
            catalog,
            fixtures,
            target,
            dry_run,
        } => {
            let entries = load_catalog(&catalog)
                .with_context(|| format!("loading catalog {}", catalog.display()))?;
            let mut selected = filter_catalog(&entries, &cfg.ingestion);
            if dry_run {
                selected = select_dry_run_scope(&selected, &cfg.ingestion);
            }
            info!(total = entries.len(), selected = selected.len(), "catalog filtered");

            let mut files = Vec::with_capacity(selected.len());
            for entry in &selected {
                match PayloadSource::resolve(&entry.dataset_url, &fixtures) {
                    PayloadSource::Local(path) => files.push(path),
                    PayloadSource::Remote(url) => {
                        warn!(%url, dataset = ?entry.dataset_id, "remote datasets are not fetched; skipping")
                    }
                }
            }

            let target = target.unwrap_or_else(|| cfg.storage.raw_facts_path());
            let limits = dry_run.then(|| cfg.ingestion.dry_run_limits());
            ingest_files(&files, &target, limits.as_ref())?;
        }
    }

    Ok(())
}

/// Normalize every file in parallel, then append the results one at a time.
fn ingest_files(files: &[PathBuf], target: &Path, limits: Option<&DryRunLimits>) -> anyhow::Result<()> {
    let tables: Vec<(PathBuf, LongTable)> = files
        .par_iter()
        .map(|path| -> anyhow::Result<(PathBuf, LongTable)> {
            let payload = read_payload(path)?;
            let table = normalize_dataset(&payload)
                .with_context(|| format!("normalizing {}", path.display()))?;
            Ok((path.clone(), table))
        })
        .collect::<anyhow::Result<_>>()?;

    // the target file has no locking; appends must stay sequential
    for (path, table) in tables {
        let table = match limits {
            Some(limits) => apply_dry_run_limits(&table, limits)?,
            None => table,
        };
        let merged = append_to_parquet(&table, target)
            .with_context(|| format!("appending {} to {}", path.display(), target.display()))?;
        println!(
            "💾 {} → {} ({} new rows, {} total)",
            path.display(),
            target.display(),
            table.height(),
            merged.height()
        );
    }
    Ok(())
}
