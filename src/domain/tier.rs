//! Static risk tiers over the bucket ledger.

use super::primitives::{BucketIndex, BucketRange};
use serde::{Deserialize, Serialize};

/// Shape of the APY formula used inside a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApyFormula {
    Fixed,
    Linear,
    Quadratic,
    Exponential,
}

/// Contiguous, non-overlapping bucket ranges, ordered safest to riskiest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Buckets 0..=9.
    Safe,
    /// Buckets 10..=29.
    Conservative,
    /// Buckets 30..=59.
    Balanced,
    /// Buckets 60..=99.
    Hero,
}

impl Tier {
    /// Yield priority order (senior first).
    pub const ALL: [Tier; 4] = [Tier::Safe, Tier::Conservative, Tier::Balanced, Tier::Hero];

    /// Loss priority order (junior first).
    pub const LOSS_ORDER: [Tier; 4] = [Tier::Hero, Tier::Balanced, Tier::Conservative, Tier::Safe];

    pub fn first_bucket(&self) -> usize {
        match self {
            Tier::Safe => 0,
            Tier::Conservative => 10,
            Tier::Balanced => 30,
            Tier::Hero => 60,
        }
    }

    pub fn last_bucket(&self) -> usize {
        match self {
            Tier::Safe => 9,
            Tier::Conservative => 29,
            Tier::Balanced => 59,
            Tier::Hero => 99,
        }
    }

    pub fn width(&self) -> usize {
        self.last_bucket() - self.first_bucket() + 1
    }

    pub fn range(&self) -> BucketRange {
        BucketRange::spanning(self.first_bucket() as u8, self.last_bucket() as u8)
    }

    /// Raw bucket indices in this tier.
    pub fn indices(&self) -> std::ops::RangeInclusive<usize> {
        self.first_bucket()..=self.last_bucket()
    }

    pub fn formula(&self) -> ApyFormula {
        match self {
            Tier::Safe => ApyFormula::Fixed,
            Tier::Conservative => ApyFormula::Linear,
            Tier::Balanced => ApyFormula::Quadratic,
            Tier::Hero => ApyFormula::Exponential,
        }
    }

    /// Position in [`Tier::ALL`], handy for `[T; 4]` tables.
    pub fn ordinal(&self) -> usize {
        match self {
            Tier::Safe => 0,
            Tier::Conservative => 1,
            Tier::Balanced => 2,
            Tier::Hero => 3,
        }
    }

    pub fn of_bucket(bucket: BucketIndex) -> Tier {
        Tier::of_raw(bucket.as_usize())
    }

    pub(crate) fn of_raw(bucket: usize) -> Tier {
        match bucket {
            0..=9 => Tier::Safe,
            10..=29 => Tier::Conservative,
            30..=59 => Tier::Balanced,
            _ => Tier::Hero,
        }
    }

    /// Balanced and Hero count as high-risk capital.
    pub fn is_high_risk(&self) -> bool {
        matches!(self, Tier::Balanced | Tier::Hero)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tier::Safe => "safe",
            Tier::Conservative => "conservative",
            Tier::Balanced => "balanced",
            Tier::Hero => "hero",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
