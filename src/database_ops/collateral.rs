//! Lookup-or-create for collateral types, and the dependent price insert.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use sqlx::Row;
use tracing::{debug, instrument};

use crate::util::db::Db;

/// Foreign keys stamped on every created row. These were literals in the
/// legacy import job; they are threaded explicitly so a run against a
/// different brand or province doesn't require an edit.
#[derive(Debug, Clone, Copy)]
pub struct ImportDefaults {
    pub brand_id: i64,
    pub creator_id: i64,
    pub province_id: i64,
}

impl Default for ImportDefaults {
    fn default() -> Self {
        Self {
            brand_id: 1,
            creator_id: 1,
            province_id: 0,
        }
    }
}

/// Per-(name, tahun) creation locks.
///
/// collateral_types carries no unique constraint on the pair, so the
/// check-then-insert in [`ensure_collateral_type`] must be serialized per key
/// or concurrent tasks for the same pair would each create a row.
#[derive(Default)]
pub struct TypeLocks {
    inner: Mutex<HashMap<(String, String), Arc<tokio::sync::Mutex<()>>>>,
}

impl TypeLocks {
    pub fn lock_for(&self, name: &str, tahun: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().expect("type lock map poisoned");
        map.entry((name.to_string(), tahun.to_string()))
            .or_default()
            .clone()
    }
}

/// Find the collateral type for (name, tahun), creating it when absent.
///
/// Concurrent calls for the same pair serialize on the pair's lock, so at
/// most one of them creates. A lookup error propagates; only a genuine
/// "no rows" miss triggers the insert. Returns the id and whether the row
/// was created by this call.
#[instrument(skip(db, locks, defaults))]
pub async fn ensure_collateral_type(
    db: &Db,
    locks: &TypeLocks,
    defaults: &ImportDefaults,
    name: &str,
    tahun: &str,
) -> Result<(i64, bool)> {
    let pair_lock = locks.lock_for(name, tahun);
    let _held = pair_lock.lock().await;

    if let Some(rec) = sqlx::query("SELECT id FROM collateral_types WHERE name=$1 AND tahun=$2 LIMIT 1")
        .persistent(false)
        .bind(name)
        .bind(tahun)
        .fetch_optional(&db.pool)
        .await?
    {
        return Ok((rec.get::<i64, _>("id"), false));
    }

    let rec = sqlx::query(
        "INSERT INTO collateral_types (collateral_brand_id, name, tahun, is_active, created_by) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .persistent(false)
    .bind(defaults.brand_id)
    .bind(name)
    .bind(tahun)
    .bind(true)
    .bind(defaults.creator_id)
    .fetch_one(&db.pool)
    .await?;
    let id = rec.get::<i64, _>("id");
    debug!(name, tahun, id, "created collateral type");
    Ok((id, true))
}

/// Insert one base-price row for a resolved collateral type. No retry and no
/// rollback of the ensure step; the caller decides what a failure means.
pub async fn insert_motorcycle_price(
    db: &Db,
    defaults: &ImportDefaults,
    collateral_type_id: i64,
    base_price: i64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO collateral_motorcycle_prices \
         (collateral_brand_id, collateral_type_id, mst_province_id, base_price, created_by) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .persistent(false)
    .bind(defaults.brand_id)
    .bind(collateral_type_id)
    .bind(defaults.province_id)
    .bind(base_price)
    .bind(defaults.creator_id)
    .execute(&db.pool)
    .await?;
    Ok(())
}
