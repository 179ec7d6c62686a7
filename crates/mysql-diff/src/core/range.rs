//! Key ranges over a table's comparison key.

use std::fmt;

use serde::Serialize;

use super::value::KeyValue;

/// Half-open range `[lower, upper)` over comparison key values.
///
/// `None` on either side means the range is unbounded in that direction.
/// The first range of a partition is unbounded below and the last one
/// unbounded above, so rows that exist only on one side are still covered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyRange {
    /// Inclusive lower bound.
    pub lower: Option<KeyValue>,
    /// Exclusive upper bound.
    pub upper: Option<KeyValue>,
}

impl KeyRange {
    /// Create a range from explicit bounds.
    pub fn new(lower: Option<KeyValue>, upper: Option<KeyValue>) -> Self {
        Self { lower, upper }
    }

    /// The range covering the whole key domain.
    pub fn full() -> Self {
        Self {
            lower: None,
            upper: None,
        }
    }

    /// Whether this range covers everything.
    pub fn is_full(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }

    /// Split into `[lower, mid)` and `[mid, upper)`.
    pub fn split_at(&self, mid: KeyValue) -> (KeyRange, KeyRange) {
        (
            KeyRange::new(self.lower.clone(), Some(mid.clone())),
            KeyRange::new(Some(mid), self.upper.clone()),
        )
    }

    /// Build the contiguous ranges delimited by `boundaries`.
    ///
    /// `n` boundaries produce `n + 1` ranges, the first open below and the
    /// last open above. Boundaries must already be in key order.
    pub fn from_boundaries(boundaries: Vec<KeyValue>) -> Vec<KeyRange> {
        let mut ranges = Vec::with_capacity(boundaries.len() + 1);
        let mut lower = None;
        for boundary in boundaries {
            ranges.push(KeyRange::new(lower, Some(boundary.clone())));
            lower = Some(boundary);
        }
        ranges.push(KeyRange::new(lower, None));
        ranges
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.lower {
            Some(k) => write!(f, "[{}", k)?,
            None => write!(f, "(-inf")?,
        }
        match &self.upper {
            Some(k) => write!(f, ", {})", k),
            None => write!(f, ", +inf)"),
        }
    }
}
