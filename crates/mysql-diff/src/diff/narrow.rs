//! Bisection of mismatched key ranges.

use std::cmp::Ordering;

use tracing::debug;

use super::Differ;
use crate::checksum::{self, ChunkChecksum};
use crate::core::range::KeyRange;
use crate::core::schema::TableSchema;
use crate::core::traits::Connection;
use crate::core::value::KeyValue;
use crate::error::Result;
use crate::report::Divergence;

/// A range known to differ, waiting to be narrowed.
#[derive(Debug, Clone)]
pub(super) struct Pending {
    pub range: KeyRange,
    pub depth: u32,
    pub left_rows: u64,
    pub right_rows: u64,
}

impl Pending {
    pub fn new(range: KeyRange, depth: u32, left: &ChunkChecksum, right: &ChunkChecksum) -> Self {
        Self {
            range,
            depth,
            left_rows: left.rows,
            right_rows: right.rows,
        }
    }

    fn unlocalized(self) -> Divergence {
        Divergence::Range {
            range: self.range,
            left_rows: self.left_rows,
            right_rows: self.right_rows,
        }
    }
}

impl Differ {
    /// Narrow mismatched ranges down to single rows where limits allow.
    ///
    /// Ranges are processed depth-first, lower half before upper half, so
    /// divergences come out in key order. Once `max_divergences` divergences
    /// are recorded the remaining ranges are reported without narrowing.
    pub(super) async fn narrow(
        &self,
        table: &TableSchema,
        initial: Vec<Pending>,
    ) -> Result<Vec<Divergence>> {
        let mut divergences = Vec::new();
        let mut stack: Vec<Pending> = initial.into_iter().rev().collect();

        while let Some(pending) = stack.pop() {
            if divergences.len() >= self.config.max_divergences {
                divergences.push(pending.unlocalized());
                continue;
            }

            if pending.left_rows <= 1 && pending.right_rows <= 1 {
                let rows = self.locate_rows(table, &pending).await?;
                if rows.is_empty() {
                    // Rows changed between the checksum and the lookup.
                    divergences.push(pending.unlocalized());
                } else {
                    divergences.extend(rows);
                }
                continue;
            }

            let larger = pending.left_rows.max(pending.right_rows);
            if pending.depth >= self.config.max_narrow_depth || larger <= self.config.narrow_min_rows
            {
                divergences.push(pending.unlocalized());
                continue;
            }

            let conn: &dyn Connection = if pending.left_rows >= pending.right_rows {
                self.left.as_ref()
            } else {
                self.right.as_ref()
            };
            let Some(mid) = self.key_at(conn, table, &pending.range, larger / 2).await? else {
                divergences.push(pending.unlocalized());
                continue;
            };

            let (lower, upper) = pending.range.split_at(mid);
            let (low, high) = tokio::join!(
                self.checksum_pair(table, &lower),
                self.checksum_pair(table, &upper),
            );
            let ((low_left, low_right), (high_left, high_right)) = (low?, high?);
            debug!(
                "{}: split {} at depth {} into {} ({}/{} rows) and {} ({}/{} rows)",
                table.full_name(),
                pending.range,
                pending.depth,
                lower,
                low_left.rows,
                low_right.rows,
                upper,
                high_left.rows,
                high_right.rows
            );

            let depth = pending.depth + 1;
            if !high_left.matches(&high_right) {
                stack.push(Pending::new(upper, depth, &high_left, &high_right));
            }
            if !low_left.matches(&low_right) {
                stack.push(Pending::new(lower, depth, &low_left, &low_right));
            }
        }

        Ok(divergences)
    }

    async fn key_at(
        &self,
        conn: &dyn Connection,
        table: &TableSchema,
        range: &KeyRange,
        offset: u64,
    ) -> Result<Option<KeyValue>> {
        self.retry
            .run(
                &format!(
                    "key at offset {} of {} {} on {}",
                    offset,
                    table.full_name(),
                    range,
                    conn.label()
                ),
                || conn.key_at_offset(table, range, offset),
            )
            .await
    }

    /// Concrete keys of a range holding at most one row per side.
    async fn locate_rows(&self, table: &TableSchema, pending: &Pending) -> Result<Vec<Divergence>> {
        let range = &pending.range;
        let left_key = async {
            if pending.left_rows == 1 {
                self.key_at(self.left.as_ref(), table, range, 0).await
            } else {
                Ok(None)
            }
        };
        let right_key = async {
            if pending.right_rows == 1 {
                self.key_at(self.right.as_ref(), table, range, 0).await
            } else {
                Ok(None)
            }
        };
        let (left_key, right_key) = tokio::join!(left_key, right_key);

        let row = |key, on_left, on_right| Divergence::Row {
            key,
            on_left,
            on_right,
        };
        let rows = match (left_key?, right_key?) {
            (Some(l), Some(r)) => match self.key_order(table, range, &l, &r).await? {
                Ordering::Equal => vec![row(l, true, true)],
                Ordering::Less => vec![row(l, true, false), row(r, false, true)],
                Ordering::Greater => vec![row(r, false, true), row(l, true, false)],
            },
            (l, r) => l
                .map(|key| row(key, true, false))
                .into_iter()
                .chain(r.map(|key| row(key, false, true)))
                .collect(),
        };
        Ok(rows)
    }

    /// Order of the left key `l` and the right key `r` under the server's
    /// collation, where each side holds exactly one row in `range`.
    ///
    /// Keys that differ as values can still be equal to the server (`'abc'`
    /// and `'ABC'` under a `_ci` collation, trailing spaces under PAD SPACE).
    /// Each side counts its row below the other side's key instead.
    async fn key_order(
        &self,
        table: &TableSchema,
        range: &KeyRange,
        l: &KeyValue,
        r: &KeyValue,
    ) -> Result<Ordering> {
        if l == r {
            return Ok(Ordering::Equal);
        }
        let below_r = KeyRange::new(range.lower.clone(), Some(r.clone()));
        let below_l = KeyRange::new(range.lower.clone(), Some(l.clone()));
        let (left, right) = tokio::join!(
            checksum::compute(self.left.as_ref(), &self.retry, table, &below_r),
            checksum::compute(self.right.as_ref(), &self.retry, table, &below_l),
        );
        let order = match (left?.rows, right?.rows) {
            (0, 0) => Ordering::Equal,
            (_, 0) => Ordering::Less,
            _ => Ordering::Greater,
        };
        Ok(order)
    }
}
