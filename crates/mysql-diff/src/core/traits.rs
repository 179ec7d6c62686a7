//! The connection facade consumed by the reconciliation engine.
//!
//! [`Connection`] is the only seam between the engine and a database. It
//! exposes read-only operations at the granularity the engine needs:
//! catalog listing, raw metadata, key sampling and range digests. Row
//! contents never leave the server; only keys and aggregates do.
//! Drivers turn these into SQL; tests substitute an in-memory table store.

use async_trait::async_trait;

use crate::error::Result;

use super::digest::RangeDigest;
use super::range::KeyRange;
use super::schema::{Column, Index, TableSchema};
use super::value::KeyValue;

/// Read access to one database instance.
///
/// Implementations must be safe to call concurrently; every call acquires
/// its own pooled connection and releases it when the call completes or fails.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Label used in logs and errors (e.g. "url1", "url2").
    fn label(&self) -> &str;

    /// Check the instance is reachable.
    async fn ping(&self) -> Result<()>;

    /// All database names visible to the user, in server collation order.
    ///
    /// System databases are included; see [`crate::catalog`] for filtering.
    async fn list_databases(&self) -> Result<Vec<String>>;

    /// Base table names in a database, in server collation order.
    async fn list_tables(&self, database: &str) -> Result<Vec<String>>;

    /// Raw column metadata in ordinal order. Empty if the table does not exist.
    async fn load_columns(&self, database: &str, table: &str) -> Result<Vec<Column>>;

    /// Index metadata including the primary key.
    async fn load_indexes(&self, database: &str, table: &str) -> Result<Vec<Index>>;

    /// Every `every`-th comparison key value in key order, starting with the
    /// smallest. Returns an empty list for an empty table.
    async fn sample_keys(&self, table: &TableSchema, every: u64) -> Result<Vec<KeyValue>>;

    /// The comparison key of the row at `offset` (0-based, key order) inside
    /// `range`, or `None` if the range holds fewer rows.
    async fn key_at_offset(
        &self,
        table: &TableSchema,
        range: &KeyRange,
        offset: u64,
    ) -> Result<Option<KeyValue>>;

    /// Row count and [`RangeDigest`] of the rows inside `range`, every column
    /// in ordinal order. Unkeyed tables only accept the full range.
    async fn checksum_range(&self, table: &TableSchema, range: &KeyRange) -> Result<RangeDigest>;

    /// Get the database type identifier (e.g., "mysql").
    fn db_type(&self) -> &str;

    /// Close the connection pool.
    async fn close(&self);
}
