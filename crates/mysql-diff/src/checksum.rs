//! Chunk checksums.
//!
//! The digest of a range is computed where the rows live: each side returns
//! a row count and a [`RangeDigest`], never the rows themselves. Digests are
//! order-independent, so neither side needs an `ORDER BY`.

use tracing::debug;

use crate::core::digest::RangeDigest;
use crate::core::range::KeyRange;
use crate::core::schema::TableSchema;
use crate::core::traits::Connection;
use crate::error::Result;
use crate::retry::RetryPolicy;

/// Digest and row count of the rows inside one key range.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkChecksum {
    pub range: KeyRange,
    pub digest: u128,
    pub rows: u64,
}

impl ChunkChecksum {
    pub fn new(range: KeyRange, digest: RangeDigest) -> Self {
        Self {
            range,
            digest: digest.value(),
            rows: digest.rows,
        }
    }

    /// Same digest and row count.
    pub fn matches(&self, other: &ChunkChecksum) -> bool {
        self.digest == other.digest && self.rows == other.rows
    }
}

/// Checksum the rows of `range` on one side.
pub async fn compute(
    conn: &dyn Connection,
    retry: &RetryPolicy,
    table: &TableSchema,
    range: &KeyRange,
) -> Result<ChunkChecksum> {
    let digest = retry
        .run(
            &format!("checksum {} {} on {}", table.full_name(), range, conn.label()),
            || conn.checksum_range(table, range),
        )
        .await?;
    let checksum = ChunkChecksum::new(range.clone(), digest);
    debug!(
        "{} {} on {}: {} rows, digest {:032x}",
        table.full_name(),
        range,
        conn.label(),
        checksum.rows,
        checksum.digest
    );
    Ok(checksum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::KeyValue;
    use crate::drivers::memory::{MemTable, MemoryConnection};
    use crate::error::DiffError;
    use crate::schema::load_table;
    use std::time::Duration;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            attempt_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_compute_matches_across_row_order() {
        let data = MemTable::keyed(&[(1, "a"), (2, "b"), (3, "c")]);
        let left = MemoryConnection::new("url1").with_table("d1", "t1", data.clone());
        let right = MemoryConnection::new("url2")
            .with_table("d1", "t1", data)
            .with_reversed_rows();
        let table = load_table(&left, &fast_retry(), "d1", "t1").await.unwrap();
        let range = KeyRange::full();

        let a = compute(&left, &fast_retry(), &table, &range).await.unwrap();
        let b = compute(&right, &fast_retry(), &table, &range).await.unwrap();
        assert_eq!(a.rows, 3);
        assert!(a.matches(&b));
    }

    #[tokio::test]
    async fn test_compute_only_ships_the_aggregate() {
        let rows: Vec<(i64, String)> = (1..=500).map(|i| (i, format!("row-{}", i))).collect();
        let borrowed: Vec<(i64, &str)> = rows.iter().map(|(i, s)| (*i, s.as_str())).collect();
        let conn = MemoryConnection::new("url1").with_table("d1", "t1", MemTable::keyed(&borrowed));
        let table = load_table(&conn, &fast_retry(), "d1", "t1").await.unwrap();
        let range = KeyRange::new(Some(KeyValue::from(101)), Some(KeyValue::from(201)));

        let checksum = compute(&conn, &fast_retry(), &table, &range).await.unwrap();
        assert_eq!(checksum.rows, 100);
        assert_eq!(conn.rows_returned(), 1);
    }

    #[tokio::test]
    async fn test_compute_retries_then_fails() {
        let conn = MemoryConnection::new("url1")
            .with_table("d1", "t1", MemTable::keyed(&[(1, "a")]))
            .fail_times("checksum_range", 5);
        let table = load_table(&conn, &fast_retry(), "d1", "t1").await.unwrap();
        let err = compute(&conn, &fast_retry(), &table, &KeyRange::full())
            .await
            .unwrap_err();
        assert!(matches!(err, DiffError::RetriesExhausted { attempts: 2, .. }));
        assert_eq!(conn.calls("checksum_range"), 2);
    }
}
