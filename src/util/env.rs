//! Environment helpers: centralized dotenv loading and DSN composition.

use std::path::PathBuf;
use std::sync::Once;

static INIT: Once = Once::new();

/// Load .env if present, exactly once. Safe to call many times.
pub fn init_env() {
    INIT.call_once(|| {
        let _ = dotenv::dotenv();
    });
}

/// Load .env, failing if no file is found. The importer refuses to run
/// without one so a bare shell cannot point it at the wrong database.
pub fn load_dotenv_required() -> anyhow::Result<PathBuf> {
    let path = dotenv::dotenv().map_err(|e| anyhow::anyhow!("failed to load .env file: {e}"))?;
    INIT.call_once(|| {});
    Ok(path)
}

/// Get required env var; error if missing or blank.
pub fn env_req(key: &str) -> anyhow::Result<String> {
    init_env();
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(anyhow::anyhow!("missing env var {key}")),
    }
}

/// Compose the Postgres DSN from the five required DB_* variables.
pub fn db_url() -> anyhow::Result<String> {
    Ok(compose_dsn(
        &env_req("DB_HOST")?,
        &env_req("DB_USERNAME")?,
        &env_req("DB_PASSWORD")?,
        &env_req("DB_NAME")?,
        &env_req("DB_PORT")?,
    ))
}

fn compose_dsn(host: &str, user: &str, password: &str, dbname: &str, port: &str) -> String {
    format!("host={host} user={user} password={password} dbname={dbname} port={port} sslmode=disable")
}
