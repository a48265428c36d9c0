use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::database_ops::collateral::ImportDefaults;
use crate::database_ops::importer::{run_import, ImportOptions, ImportSummary};
use crate::excel::read_price_sheet;
use crate::util::db::Db;
use crate::util::env as env_util;

#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Path to the pricing workbook.
    pub file: PathBuf,
    /// Worksheet holding the price rows.
    pub sheet: String,
    /// Admission limit for concurrent record imports.
    pub concurrency: usize,
    pub defaults: ImportDefaults,
    /// Optional override for the Postgres connection string.
    pub database_url: Option<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("data.xlsx"),
            sheet: "Sheet1".to_string(),
            concurrency: 10,
            defaults: ImportDefaults::default(),
            database_url: None,
        }
    }
}

/// Connect, read the sheet, dispatch the import, and report the summary.
/// Setup failures (connection, workbook, sheet) abort the run; per-record
/// failures only show up in the summary.
pub async fn run(cfg: ImportConfig) -> Result<ImportSummary> {
    let db_url = match cfg.database_url.clone() {
        Some(url) => url,
        None => env_util::db_url()?,
    };

    // Pool sized to the admission limit so every in-flight task can hold a
    // connection without queueing on the pool.
    let db = Db::connect(&db_url, cfg.concurrency.max(1) as u32)
        .await
        .context("failed to connect to database")?;

    let records = read_price_sheet(&cfg.file, &cfg.sheet)
        .with_context(|| format!("failed to read {}", cfg.file.display()))?;
    info!(
        records = records.len(),
        file = %cfg.file.display(),
        sheet = %cfg.sheet,
        "price sheet loaded"
    );

    let opts = ImportOptions {
        concurrency: cfg.concurrency,
        defaults: cfg.defaults,
    };
    let summary = run_import(&db, &opts, records).await;
    if summary.failures > 0 {
        warn!(
            failures = summary.failures,
            failed = ?summary.failed_pairs,
            "some records were not imported"
        );
    }
    Ok(summary)
}
