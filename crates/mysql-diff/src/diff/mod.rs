//! Comparison orchestrator.
//!
//! A [`Differ`] compares databases in order and, within one database, runs
//! table comparisons concurrently with at most `workers` tables in flight.
//! Each table goes through two phases:
//!
//! 1. **Schema check**: both definitions are loaded concurrently and compared
//!    structurally. Any discrepancy ends the table as not equal.
//! 2. **Row check**: the key space is partitioned, every range is checksummed
//!    on both sides concurrently, and mismatched ranges are narrowed by
//!    bisection until single rows are located or a limit is reached.
//!
//! Under fail-fast the first table that is not equal cancels its siblings;
//! they are listed as abandoned. The first database that is not equal ends
//! the run.

mod narrow;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::catalog::{list_databases, user_databases};
use crate::checksum::{self, ChunkChecksum};
use crate::config::{DatabaseSelection, DiffConfig};
use crate::core::range::KeyRange;
use crate::core::schema::TableSchema;
use crate::core::traits::Connection;
use crate::error::{DiffError, Result};
use crate::partition::{plan_ranges, PartitionStrategy};
use crate::report::{
    DatabaseReport, DatabaseSetMismatch, Divergence, Mismatch, RunReport, TableReport,
    TableVerdict,
};
use crate::retry::RetryPolicy;
use crate::schema::{compare_schemas, load_table};

use narrow::Pending;

/// Compares two connections.
#[derive(Clone)]
pub struct Differ {
    left: Arc<dyn Connection>,
    right: Arc<dyn Connection>,
    config: DiffConfig,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

/// Next event of the table scheduling loop.
enum Step {
    Finished(std::result::Result<(usize, Option<TableReport>), JoinError>),
    Slot(OwnedSemaphorePermit),
}

impl Differ {
    /// Create a differ; the retry policy is derived from `config`.
    pub fn new(left: Arc<dyn Connection>, right: Arc<dyn Connection>, config: DiffConfig) -> Self {
        let retry = RetryPolicy::from_config(&config);
        Self {
            left,
            right,
            config,
            retry,
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Use an externally owned cancellation token (e.g. cancelled on Ctrl-C).
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Compare the selected databases.
    ///
    /// Returns `Err` only for failures that make the whole run meaningless
    /// (listing databases failed, cancellation). Table-level failures are
    /// recorded in the report.
    pub async fn run(&self, selection: &DatabaseSelection) -> Result<RunReport> {
        let mut report = RunReport::begin();

        // One listing per side serves the selection and every existence check.
        let (left_all, right_all) = tokio::join!(
            list_databases(self.left.as_ref(), &self.retry),
            list_databases(self.right.as_ref(), &self.retry),
        );
        let (left_all, right_all) = (left_all?, right_all?);

        let databases = match selection {
            DatabaseSelection::All => {
                let (left, right) = (user_databases(&left_all), user_databases(&right_all));
                if left != right {
                    warn!(
                        "Database lists differ: {} has [{}], {} has [{}]",
                        self.left.label(),
                        left.join(", "),
                        self.right.label(),
                        right.join(", ")
                    );
                    report.database_sets_differ = Some(DatabaseSetMismatch { left, right });
                    return Ok(report.finish());
                }
                left
            }
            DatabaseSelection::Names(names) => names.clone(),
        };

        for database in &databases {
            if self.cancel.is_cancelled() {
                return Err(DiffError::Cancelled);
            }
            let db_report = self
                .compare_database(database, &left_all, &right_all)
                .await?;
            let equal = db_report.is_equal();
            report.databases.push(db_report);
            if self.cancel.is_cancelled() {
                return Err(DiffError::Cancelled);
            }
            if !equal && self.config.fail_fast {
                info!("{}: not equal, stopping (fail-fast)", database);
                break;
            }
        }

        Ok(report.finish())
    }

    async fn list_tables(&self, conn: &dyn Connection, database: &str) -> Result<Vec<String>> {
        self.retry
            .run(
                &format!("list tables of {} on {}", database, conn.label()),
                || conn.list_tables(database),
            )
            .await
    }

    /// Compare every table of one database.
    pub async fn diff_database(&self, database: &str) -> Result<DatabaseReport> {
        let (left_all, right_all) = tokio::join!(
            list_databases(self.left.as_ref(), &self.retry),
            list_databases(self.right.as_ref(), &self.retry),
        );
        match (left_all, right_all) {
            (Ok(left_all), Ok(right_all)) => {
                self.compare_database(database, &left_all, &right_all).await
            }
            (Err(e), _) | (_, Err(e)) => {
                error!("{}: cannot list databases: {}", database, e);
                let mut report = DatabaseReport::new(database);
                report.error = Some(e.to_string());
                Ok(report)
            }
        }
    }

    /// Compare one database given both sides' database listings.
    async fn compare_database(
        &self,
        database: &str,
        left_all: &[String],
        right_all: &[String],
    ) -> Result<DatabaseReport> {
        let mut report = DatabaseReport::new(database);

        for (all, conn) in [(left_all, &self.left), (right_all, &self.right)] {
            if !all.iter().any(|d| d == database) {
                report.error = Some(format!("database {} not found on {}", database, conn.label()));
                return Ok(report);
            }
        }

        let (left, right) = tokio::join!(
            self.list_tables(self.left.as_ref(), database),
            self.list_tables(self.right.as_ref(), database),
        );
        let (left, right) = match (left, right) {
            (Ok(l), Ok(r)) => (l, r),
            (Err(e), _) | (_, Err(e)) => {
                error!("{}: cannot list tables: {}", database, e);
                report.error = Some(e.to_string());
                return Ok(report);
            }
        };

        let tables: Vec<String> = left
            .into_iter()
            .chain(right)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let workers = self.config.workers.max(1);
        info!(
            "{}: comparing {} tables with {} workers",
            database,
            tables.len(),
            workers
        );

        let semaphore = Arc::new(Semaphore::new(workers));
        let token = self.cancel.child_token();
        let mut set: JoinSet<(usize, Option<TableReport>)> = JoinSet::new();
        let mut results: Vec<Option<TableReport>> = vec![None; tables.len()];
        let mut next = 0;

        loop {
            let step = if next < tables.len() && !token.is_cancelled() {
                tokio::select! {
                    biased;
                    Some(joined) = set.join_next() => Step::Finished(joined),
                    permit = semaphore.clone().acquire_owned() => {
                        Step::Slot(permit.map_err(|_| DiffError::Cancelled)?)
                    }
                }
            } else {
                match set.join_next().await {
                    Some(joined) => Step::Finished(joined),
                    None => break,
                }
            };

            match step {
                Step::Slot(permit) => {
                    let idx = next;
                    next += 1;
                    let this = self.clone();
                    let token = token.clone();
                    let db = database.to_string();
                    let table = tables[idx].clone();
                    set.spawn(async move {
                        let report = tokio::select! {
                            _ = token.cancelled() => None,
                            report = this.diff_table(&db, &table) => Some(report),
                        };
                        drop(permit);
                        (idx, report)
                    });
                }
                Step::Finished(Ok((idx, Some(table_report)))) => {
                    log_table(&table_report);
                    let failed = !table_report.is_equal();
                    results[idx] = Some(table_report);
                    if failed && self.config.fail_fast && !token.is_cancelled() {
                        info!(
                            "{}: cancelling remaining tables (fail-fast)",
                            database
                        );
                        token.cancel();
                        set.abort_all();
                    }
                }
                Step::Finished(Ok((_, None))) => {}
                Step::Finished(Err(e)) if e.is_cancelled() => {}
                Step::Finished(Err(e)) => {
                    return Err(DiffError::TaskFailed(format!("{}: {}", database, e)));
                }
            }
        }

        for (name, result) in tables.into_iter().zip(results) {
            match result {
                Some(table_report) => report.tables.push(table_report),
                None => report.abandoned.push(name),
            }
        }
        if !report.abandoned.is_empty() {
            info!(
                "{}: abandoned {} tables: {}",
                database,
                report.abandoned.len(),
                report.abandoned.join(", ")
            );
        }
        Ok(report)
    }

    /// Compare one table. Failures become an `Error` verdict.
    pub async fn diff_table(&self, database: &str, table: &str) -> TableReport {
        let start = Instant::now();
        let mut report = TableReport::new(database, table, TableVerdict::Equal);
        let verdict = match self.compare_table(database, table, &mut report).await {
            Ok(verdict) => verdict,
            Err(e) => TableVerdict::Error {
                reason: e.to_string(),
            },
        };
        report.verdict = verdict;
        report.duration_ms = start.elapsed().as_millis() as u64;
        report
    }

    async fn compare_table(
        &self,
        database: &str,
        table: &str,
        report: &mut TableReport,
    ) -> Result<TableVerdict> {
        let (left, right) = tokio::join!(
            load_table(self.left.as_ref(), &self.retry, database, table),
            load_table(self.right.as_ref(), &self.retry, database, table),
        );
        let (schema, right_schema) = (left?, right?);

        let comparison = compare_schemas(&schema, &right_schema);
        if !comparison.is_equal() {
            return Ok(TableVerdict::NotEqual {
                mismatch: Mismatch::Schema {
                    discrepancies: comparison.discrepancies,
                },
            });
        }

        let strategy = PartitionStrategy::for_table(&schema);
        if !strategy.is_keyed() {
            debug!(
                "{}: no usable key, checksumming the whole table",
                schema.full_name()
            );
        }
        let ranges = plan_ranges(
            &strategy,
            self.left.as_ref(),
            self.right.as_ref(),
            &schema,
            self.config.chunk_size,
            &self.retry,
        )
        .await?;

        let mut pending = Vec::new();
        for range in ranges {
            let (left, right) = self.checksum_pair(&schema, &range).await?;
            report.chunks += 1;
            report.left_rows += left.rows;
            report.right_rows += right.rows;
            if !left.matches(&right) {
                debug!(
                    "{}: chunk {} differs ({} vs {} rows)",
                    schema.full_name(),
                    range,
                    left.rows,
                    right.rows
                );
                report.mismatched_chunks += 1;
                pending.push(Pending::new(range, 0, &left, &right));
            }
        }

        if pending.is_empty() {
            return Ok(TableVerdict::Equal);
        }

        let divergences = if strategy.is_keyed() {
            self.narrow(&schema, pending).await?
        } else {
            pending
                .into_iter()
                .map(|p| Divergence::Table {
                    left_rows: p.left_rows,
                    right_rows: p.right_rows,
                })
                .collect()
        };

        Ok(TableVerdict::NotEqual {
            mismatch: Mismatch::Rows { divergences },
        })
    }

    /// Checksum one range on both sides concurrently.
    async fn checksum_pair(
        &self,
        table: &TableSchema,
        range: &KeyRange,
    ) -> Result<(ChunkChecksum, ChunkChecksum)> {
        let (left, right) = tokio::join!(
            checksum::compute(self.left.as_ref(), &self.retry, table, range),
            checksum::compute(self.right.as_ref(), &self.retry, table, range),
        );
        Ok((left?, right?))
    }
}

fn log_table(report: &TableReport) {
    let name = report.full_name();
    match &report.verdict {
        TableVerdict::Equal => info!(
            "{}: equal ({} rows, {} chunks, {}ms)",
            name, report.left_rows, report.chunks, report.duration_ms
        ),
        TableVerdict::NotEqual {
            mismatch: Mismatch::Schema { discrepancies },
        } => {
            warn!("{}: schema differs", name);
            for d in discrepancies {
                warn!("{}:   {}", name, d);
            }
        }
        TableVerdict::NotEqual {
            mismatch: Mismatch::Rows { divergences },
        } => {
            warn!(
                "{}: data differs in {} of {} chunks",
                name, report.mismatched_chunks, report.chunks
            );
            for d in divergences {
                warn!("{}:   {}", name, d);
            }
        }
        TableVerdict::Error { reason } => error!("{}: {}", name, reason),
    }
}
