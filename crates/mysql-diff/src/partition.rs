//! Splits a table's key space into chunks.
//!
//! Boundaries come from the servers themselves: each side returns every
//! `chunk_size`-th key in its own key order and the denser side's sample is
//! used. The engine never has to order key values in Rust, so collation
//! rules stay on the server.

use crate::core::range::KeyRange;
use crate::core::schema::{ComparisonKey, TableSchema};
use crate::core::traits::Connection;
use crate::error::Result;
use crate::retry::RetryPolicy;

/// How a table's rows are split for checksumming.
#[derive(Debug, Clone, PartialEq)]
pub enum PartitionStrategy {
    /// Contiguous key ranges over the comparison key.
    Keyed(ComparisonKey),

    /// No usable key: the table is checksummed as a single unit.
    WholeTable,
}

impl PartitionStrategy {
    /// Pick the strategy for a table from its comparison key.
    pub fn for_table(table: &TableSchema) -> Self {
        match &table.comparison_key {
            Some(key) => PartitionStrategy::Keyed(key.clone()),
            None => PartitionStrategy::WholeTable,
        }
    }

    /// Whether mismatches can be narrowed below table granularity.
    pub fn is_keyed(&self) -> bool {
        matches!(self, PartitionStrategy::Keyed(_))
    }
}

/// Compute the ranges to checksum.
///
/// Keyed tables get contiguous ranges covering the whole key domain, the
/// first open below and the last open above. Two empty sides yield no ranges.
pub async fn plan_ranges(
    strategy: &PartitionStrategy,
    left: &dyn Connection,
    right: &dyn Connection,
    table: &TableSchema,
    chunk_size: u64,
    retry: &RetryPolicy,
) -> Result<Vec<KeyRange>> {
    if !strategy.is_keyed() {
        return Ok(vec![KeyRange::full()]);
    }

    let left_op = format!("sample keys of {} on {}", table.full_name(), left.label());
    let right_op = format!("sample keys of {} on {}", table.full_name(), right.label());
    let (left_keys, right_keys) = tokio::join!(
        retry.run(&left_op, || left.sample_keys(table, chunk_size)),
        retry.run(&right_op, || right.sample_keys(table, chunk_size)),
    );
    let (left_keys, right_keys) = (left_keys?, right_keys?);

    let mut keys = if right_keys.len() > left_keys.len() {
        right_keys
    } else {
        left_keys
    };
    if keys.is_empty() {
        return Ok(Vec::new());
    }

    // The first sample is the smallest key; the first range starts unbounded instead.
    keys.remove(0);
    Ok(KeyRange::from_boundaries(keys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum;
    use crate::core::value::KeyValue;
    use crate::drivers::memory::{MemTable, MemoryConnection};
    use crate::schema::load_table;

    fn rows(n: i64) -> Vec<(i64, &'static str)> {
        (1..=n).map(|i| (i, "x")).collect()
    }

    async fn plan(left: &MemoryConnection, right: &MemoryConnection, chunk: u64) -> Vec<KeyRange> {
        let retry = RetryPolicy::default();
        let table = load_table(left, &retry, "d1", "t1").await.unwrap();
        let strategy = PartitionStrategy::for_table(&table);
        plan_ranges(&strategy, left, right, &table, chunk, &retry)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_ranges_contiguous_and_cover_domain() {
        let left = MemoryConnection::new("url1").with_table("d1", "t1", MemTable::keyed(&rows(25)));
        let right = MemoryConnection::new("url2").with_table("d1", "t1", MemTable::keyed(&rows(25)));
        let ranges = plan(&left, &right, 10).await;

        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0].lower, None);
        assert_eq!(ranges[0].upper, Some(KeyValue::from(11)));
        assert_eq!(ranges[1].upper, Some(KeyValue::from(21)));
        assert_eq!(ranges.last().unwrap().upper, None);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].upper, pair[1].lower);
        }
    }

    #[tokio::test]
    async fn test_row_count_conserved() {
        let left = MemoryConnection::new("url1").with_table("d1", "t1", MemTable::keyed(&rows(47)));
        let right = MemoryConnection::new("url2").with_table("d1", "t1", MemTable::keyed(&rows(12)));
        let ranges = plan(&left, &right, 5).await;

        let retry = RetryPolicy::default();
        let table = load_table(&left, &retry, "d1", "t1").await.unwrap();
        let mut left_total = 0;
        let mut right_total = 0;
        for range in &ranges {
            left_total += checksum::compute(&left, &retry, &table, range).await.unwrap().rows;
            right_total += checksum::compute(&right, &retry, &table, range).await.unwrap().rows;
        }
        assert_eq!(left_total, 47);
        assert_eq!(right_total, 12);
    }

    #[tokio::test]
    async fn test_denser_side_chosen() {
        let left = MemoryConnection::new("url1").with_table("d1", "t1", MemTable::keyed(&rows(3)));
        let right = MemoryConnection::new("url2").with_table("d1", "t1", MemTable::keyed(&rows(30)));
        let ranges = plan(&left, &right, 10).await;
        assert_eq!(ranges.len(), 3);
    }

    #[tokio::test]
    async fn test_small_table_single_range() {
        let left = MemoryConnection::new("url1").with_table("d1", "t1", MemTable::keyed(&rows(4)));
        let right = MemoryConnection::new("url2").with_table("d1", "t1", MemTable::keyed(&rows(4)));
        assert_eq!(plan(&left, &right, 10).await, vec![KeyRange::full()]);
    }

    #[tokio::test]
    async fn test_both_empty_no_ranges() {
        let left = MemoryConnection::new("url1").with_table("d1", "t1", MemTable::keyed(&[]));
        let right = MemoryConnection::new("url2").with_table("d1", "t1", MemTable::keyed(&[]));
        assert!(plan(&left, &right, 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_unkeyed_table_whole() {
        let left = MemoryConnection::new("url1").with_table("d1", "t1", MemTable::unkeyed(&[1, 1, 2]));
        let right = MemoryConnection::new("url2").with_table("d1", "t1", MemTable::unkeyed(&[]));
        let retry = RetryPolicy::default();
        let table = load_table(&left, &retry, "d1", "t1").await.unwrap();
        let strategy = PartitionStrategy::for_table(&table);
        assert_eq!(strategy, PartitionStrategy::WholeTable);
        let ranges = plan_ranges(&strategy, &left, &right, &table, 10, &retry)
            .await
            .unwrap();
        assert_eq!(ranges, vec![KeyRange::full()]);
        assert_eq!(left.calls("sample_keys"), 0);
    }
}
