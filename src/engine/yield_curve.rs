//! Piecewise APY curve over the 100 buckets.

use crate::domain::{BucketIndex, CurveParams, Decimal, Tier, BUCKET_COUNT};
use crate::error::EngineError;

/// Maps a bucket to its target APY.
///
/// Safe is flat at `r_min`, Conservative rises linearly to the conservative
/// target, Balanced rises quadratically to the balanced target, and Hero
/// compounds by `k` per bucket from the balanced target. With
/// `r_min <= conservative_target <= balanced_target` and `k >= 1` the curve is
/// non-decreasing and continuous at every tier boundary.
#[derive(Debug, Clone, Copy)]
pub struct YieldCurve {
    params: CurveParams,
    k: Decimal,
}

impl YieldCurve {
    pub fn new(params: CurveParams, k: Decimal) -> Self {
        Self { params, k }
    }

    pub fn k(&self) -> Decimal {
        self.k
    }

    pub fn apy(&self, bucket: BucketIndex) -> Decimal {
        self.apy_raw(bucket.as_usize())
    }

    /// Checked variant for untrusted indices.
    pub fn apy_at(&self, bucket: i64) -> Result<Decimal, EngineError> {
        BucketIndex::new(bucket).map(|b| self.apy(b))
    }

    /// APY of every bucket, index-aligned.
    pub fn table(&self) -> [Decimal; BUCKET_COUNT] {
        let mut out = [Decimal::zero(); BUCKET_COUNT];
        for (b, slot) in out.iter_mut().enumerate() {
            *slot = self.apy_raw(b);
        }
        out
    }

    /// Unweighted mean APY across a tier's buckets.
    pub fn tier_mean(&self, tier: Tier) -> Decimal {
        let total: Decimal = tier.indices().map(|b| self.apy_raw(b)).sum();
        total / Decimal::from(tier.width() as u32)
    }

    fn apy_raw(&self, bucket: usize) -> Decimal {
        let tier = Tier::of_raw(bucket);
        let p = &self.params;
        match tier {
            Tier::Safe => p.r_min,
            Tier::Conservative => {
                let x = normalized(tier, bucket);
                p.r_min + (p.conservative_target - p.r_min) * x
            }
            Tier::Balanced => {
                let x = normalized(tier, bucket);
                p.conservative_target + (p.balanced_target - p.conservative_target) * x * x
            }
            Tier::Hero => {
                let steps = (bucket - tier.first_bucket()) as u32;
                p.balanced_target * self.k.powu(steps)
            }
        }
    }
}

/// `(bucket - start) / (width - 1)`, or 0 for a single-bucket tier.
fn normalized(tier: Tier, bucket: usize) -> Decimal {
    let width = tier.width();
    if width <= 1 {
        return Decimal::zero();
    }
    Decimal::from((bucket - tier.first_bucket()) as u32) / Decimal::from((width - 1) as u32)
}
