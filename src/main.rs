use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use collateral_price_importer::cli::import::{self, ImportConfig};
use collateral_price_importer::database_ops::collateral::ImportDefaults;
use collateral_price_importer::util::env as env_util;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "cpi", version, about = "Collateral motorcycle price importer")]
struct Cli {
    /// Path to the pricing workbook
    #[arg(long, default_value = "data.xlsx")]
    file: PathBuf,

    /// Worksheet holding the price rows
    #[arg(long, default_value = "Sheet1")]
    sheet: String,

    /// Maximum number of records imported concurrently
    #[arg(long, default_value_t = 10)]
    concurrency: usize,

    /// collateral_brand_id stamped on created rows
    #[arg(long, default_value_t = 1)]
    brand_id: i64,

    /// created_by stamped on created rows
    #[arg(long, default_value_t = 1)]
    creator_id: i64,

    /// mst_province_id stamped on price rows (0 = unset)
    #[arg(long, default_value_t = 0)]
    province_id: i64,

    /// Override the database URL (otherwise composed from DB_* env vars)
    #[arg(long)]
    db_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    env_util::load_dotenv_required().context("error loading .env file")?;

    let cfg = ImportConfig {
        file: cli.file,
        sheet: cli.sheet,
        concurrency: cli.concurrency,
        defaults: ImportDefaults {
            brand_id: cli.brand_id,
            creator_id: cli.creator_id,
            province_id: cli.province_id,
        },
        database_url: cli.db_url,
    };

    let summary = import::run(cfg).await?;
    info!(
        records = summary.records,
        prices_written = summary.prices_written,
        types_created = summary.types_created,
        failures = summary.failures,
        "import complete"
    );
    Ok(())
}
