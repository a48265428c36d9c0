//! Bounded fan-out of per-record import tasks.
//!
//! One task per sheet record, at most `concurrency` of them mid-flight at a
//! time. Each task resolves its collateral type and then writes the price
//! row; a failure in either step is logged and counted, never propagated to
//! sibling tasks. The run always drains every task before returning.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::database_ops::collateral::{
    ensure_collateral_type, insert_motorcycle_price, ImportDefaults, TypeLocks,
};
use crate::excel::PriceRecord;
use crate::util::db::Db;

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Admission limit: how many records may be running their store
    /// operations at once.
    pub concurrency: usize,
    pub defaults: ImportDefaults,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            concurrency: 10,
            defaults: ImportDefaults::default(),
        }
    }
}

/// Aggregate outcome of one run. Per-record failures are counted here in
/// addition to being logged, so the operator gets a final tally instead of
/// having to grep the log. `records == prices_written + failures` on return.
#[derive(Debug, Default, Clone)]
pub struct ImportSummary {
    pub records: usize,
    pub prices_written: usize,
    pub types_created: usize,
    pub failures: usize,
    /// (tipe, tahun) of records whose store writes failed.
    pub failed_pairs: Vec<(String, String)>,
}

impl ImportSummary {
    fn absorb(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Written { created_type } => {
                self.prices_written += 1;
                if created_type {
                    self.types_created += 1;
                }
            }
            TaskOutcome::Failed { tipe, tahun } => {
                self.failures += 1;
                self.failed_pairs.push((tipe, tahun));
            }
        }
    }
}

#[derive(Debug)]
enum TaskOutcome {
    Written { created_type: bool },
    Failed { tipe: String, tahun: String },
}

/// Run every record through resolve-then-write, bounded by the admission
/// limit, and return the merged summary.
pub async fn run_import(db: &Db, opts: &ImportOptions, records: Vec<PriceRecord>) -> ImportSummary {
    let mut summary = ImportSummary {
        records: records.len(),
        ..Default::default()
    };
    if records.is_empty() {
        info!("no records to import");
        return summary;
    }

    let locks = Arc::new(TypeLocks::default());
    let db = db.clone();
    let defaults = opts.defaults;
    let results = run_bounded(records, opts.concurrency, move |record| {
        let db = db.clone();
        let locks = Arc::clone(&locks);
        async move { import_record(&db, &locks, &defaults, record).await }
    })
    .await;

    for result in results {
        match result {
            Ok(outcome) => summary.absorb(outcome),
            Err(join_err) => {
                error!(error = %join_err, "import task panicked");
                summary.failures += 1;
            }
        }
    }

    info!(
        records = summary.records,
        prices_written = summary.prices_written,
        types_created = summary.types_created,
        failures = summary.failures,
        "import finished"
    );
    summary
}

async fn import_record(
    db: &Db,
    locks: &TypeLocks,
    defaults: &ImportDefaults,
    record: PriceRecord,
) -> TaskOutcome {
    let (type_id, created_type) =
        match ensure_collateral_type(db, locks, defaults, &record.tipe, &record.tahun).await {
            Ok(resolved) => resolved,
            Err(e) => {
                error!(
                    tipe = %record.tipe,
                    tahun = %record.tahun,
                    error = %e,
                    "failed to resolve collateral type"
                );
                return TaskOutcome::Failed {
                    tipe: record.tipe,
                    tahun: record.tahun,
                };
            }
        };

    if let Err(e) = insert_motorcycle_price(db, defaults, type_id, record.harga).await {
        error!(
            tipe = %record.tipe,
            tahun = %record.tahun,
            collateral_type_id = type_id,
            error = %e,
            "failed to insert collateral price"
        );
        return TaskOutcome::Failed {
            tipe: record.tipe,
            tahun: record.tahun,
        };
    }

    TaskOutcome::Written { created_type }
}

/// Spawn one task per item with at most `limit` bodies running concurrently.
/// Tasks past the limit wait for a permit before their body starts. All
/// spawned tasks are awaited; a panicked task surfaces as its `JoinError`.
async fn run_bounded<T, F, Fut, R>(
    items: Vec<T>,
    limit: usize,
    f: F,
) -> Vec<Result<R, tokio::task::JoinError>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let sem = Arc::new(Semaphore::new(limit.max(1)));
    let mut handles = Vec::with_capacity(items.len());
    for item in items {
        let sem = Arc::clone(&sem);
        let f = f.clone();
        handles.push(tokio::spawn(async move {
            let _permit = sem.acquire_owned().await.unwrap();
            f(item).await
        }));
    }
    join_all(handles).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn run_bounded_never_exceeds_the_limit() {
        const LIMIT: usize = 3;
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let active_c = Arc::clone(&active);
        let peak_c = Arc::clone(&peak);
        let results = run_bounded((0..20).collect::<Vec<u32>>(), LIMIT, move |n| {
            let active = Arc::clone(&active_c);
            let peak = Arc::clone(&peak_c);
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                n
            }
        })
        .await;

        assert_eq!(results.len(), 20);
        assert!(results.iter().all(|r| r.is_ok()));
        assert!(peak.load(Ordering::SeqCst) <= LIMIT);
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_bounded_tolerates_a_zero_limit() {
        let results = run_bounded(vec![1, 2, 3], 0, |n| async move { n * 2 }).await;
        let mut values: Vec<i32> = results.into_iter().map(|r| r.unwrap()).collect();
        values.sort_unstable();
        assert_eq!(values, vec![2, 4, 6]);
    }

    #[tokio::test]
    async fn run_bounded_reports_panics_as_join_errors() {
        let results = run_bounded(vec![1, 2], 4, |n| async move {
            if n == 2 {
                panic!("boom");
            }
            n
        })
        .await;
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    }

    #[test]
    fn summary_accounting_adds_up() {
        let mut summary = ImportSummary {
            records: 3,
            ..Default::default()
        };
        summary.absorb(TaskOutcome::Written { created_type: true });
        summary.absorb(TaskOutcome::Written { created_type: false });
        summary.absorb(TaskOutcome::Failed {
            tipe: "Scooter".into(),
            tahun: "2023".into(),
        });

        assert_eq!(summary.prices_written, 2);
        assert_eq!(summary.types_created, 1);
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.failed_pairs, vec![("Scooter".into(), "2023".into())]);
        assert_eq!(summary.records, summary.prices_written + summary.failures);
    }
}
