//! Domain primitives: BucketIndex, BucketRange, PositionId, Owner.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};

/// Number of risk buckets in the ledger.
pub const BUCKET_COUNT: usize = 100;

/// Index of a risk bucket, 0 (safest) through 99 (riskiest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct BucketIndex(u8);

impl BucketIndex {
    pub const MIN: BucketIndex = BucketIndex(0);
    pub const MAX: BucketIndex = BucketIndex((BUCKET_COUNT - 1) as u8);

    /// Validate a raw index. Out-of-range values are rejected, never clamped.
    pub fn new(index: i64) -> Result<Self, EngineError> {
        if (0..BUCKET_COUNT as i64).contains(&index) {
            Ok(BucketIndex(index as u8))
        } else {
            Err(EngineError::InvalidRange(format!(
                "bucket {} outside [0, {}]",
                index,
                BUCKET_COUNT - 1
            )))
        }
    }

    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }

    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for BucketIndex {
    type Error = EngineError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        BucketIndex::new(value)
    }
}

impl From<BucketIndex> for u8 {
    fn from(value: BucketIndex) -> Self {
        value.0
    }
}

impl std::fmt::Display for BucketIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive bucket range `[start, end]` with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BucketRange {
    start: BucketIndex,
    end: BucketIndex,
}

impl BucketRange {
    pub fn new(start: i64, end: i64) -> Result<Self, EngineError> {
        if start > end {
            return Err(EngineError::InvalidRange(format!(
                "start {} greater than end {}",
                start, end
            )));
        }
        Ok(BucketRange {
            start: BucketIndex::new(start)?,
            end: BucketIndex::new(end)?,
        })
    }

    /// Range over known-valid static bounds.
    pub(crate) const fn spanning(start: u8, end: u8) -> Self {
        BucketRange {
            start: BucketIndex(start),
            end: BucketIndex(end),
        }
    }

    pub fn start(&self) -> BucketIndex {
        self.start
    }

    pub fn end(&self) -> BucketIndex {
        self.end
    }

    /// Number of buckets covered (at least 1).
    pub fn width(&self) -> usize {
        self.end.as_usize() - self.start.as_usize() + 1
    }

    pub fn contains(&self, bucket: usize) -> bool {
        (self.start.as_usize()..=self.end.as_usize()).contains(&bucket)
    }

    /// Raw bucket indices covered by this range.
    pub fn indices(&self) -> std::ops::RangeInclusive<usize> {
        self.start.as_usize()..=self.end.as_usize()
    }

    /// Overlap with another range, if any.
    pub fn intersect(&self, other: &BucketRange) -> Option<BucketRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start <= end {
            Some(BucketRange { start, end })
        } else {
            None
        }
    }
}

impl std::fmt::Display for BucketRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Sequential position identifier, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl PositionId {
    pub fn new(id: u64) -> Self {
        PositionId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PositionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to the depositor (wallet address, account id).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Owner(pub String);

impl Owner {
    pub fn new(owner: impl Into<String>) -> Self {
        Owner(owner.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
