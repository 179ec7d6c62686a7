//! Order-independent digest over a set of rows.
//!
//! A row hashes to SHA-256 over its canonical encoding (see
//! [`super::value`]). The first 16 bytes of the hash are read as two
//! big-endian `u64` halves, and a set of rows sums each half modulo 2^64.
//! Addition commutes, so the order in which rows are visited does not matter.
//!
//! MySQL evaluates the same definition in SQL: `SHA2(..., 256)` yields the
//! hash as hex, `CONV(SUBSTRING(h, 1, 16), 16, 10)` and
//! `CONV(SUBSTRING(h, 17, 16), 16, 10)` are the two halves, and `SUM` adds
//! them exactly. [`RangeDigest::from_sums`] reduces those sums.

use std::num::ParseIntError;

use sha2::{Digest, Sha256};

use super::value::{encode_row, SqlValue};

/// Row count and digest of a set of rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeDigest {
    pub rows: u64,
    pub high: u64,
    pub low: u64,
}

impl RangeDigest {
    /// Digest rows held in memory.
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a [SqlValue<'static>]>,
    {
        let mut digest = Self::default();
        let mut buf = Vec::new();
        for row in rows {
            buf.clear();
            encode_row(row, &mut buf);
            digest.add_encoded(&buf);
        }
        digest
    }

    /// Build from the decimal sums returned by the server.
    ///
    /// Each sum is below `rows * 2^64`, so it fits a `u128` for any table.
    pub fn from_sums(rows: u64, high_sum: &str, low_sum: &str) -> Result<Self, ParseIntError> {
        Ok(Self {
            rows,
            high: high_sum.trim().parse::<u128>()? as u64,
            low: low_sum.trim().parse::<u128>()? as u64,
        })
    }

    /// Fold one canonically encoded row.
    pub fn add_encoded(&mut self, encoded: &[u8]) {
        let hash = Sha256::digest(encoded);
        let mut half = [0u8; 8];
        half.copy_from_slice(&hash[..8]);
        self.high = self.high.wrapping_add(u64::from_be_bytes(half));
        half.copy_from_slice(&hash[8..16]);
        self.low = self.low.wrapping_add(u64::from_be_bytes(half));
        self.rows += 1;
    }

    /// Both halves as one 128-bit value.
    pub fn value(&self) -> u128 {
        (u128::from(self.high) << 64) | u128::from(self.low)
    }
}
