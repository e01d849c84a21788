//! Aggregate liquidity per risk bucket.

use crate::domain::{BucketRange, Decimal, Tier, TierWeights, BUCKET_COUNT};
use serde::Serialize;

/// One of the 100 fixed buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub total_liquidity: Decimal,
    /// Yield credited by the most recent yield pass.
    pub yield_generated: Decimal,
}

/// Result of a liquidity removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemovalOutcome {
    /// Amount actually taken out of the ledger.
    pub removed: Decimal,
    /// Amount that could not be found anywhere in the ledger.
    pub unreconciled: Decimal,
}

/// Split `amount` evenly across `range`, remainder on the last bucket.
///
/// Uniform density is an approximation; every caller that turns an amount into
/// per-bucket liquidity goes through here.
pub fn uniform_footprint(amount: Decimal, range: BucketRange) -> Vec<Decimal> {
    let width = range.width();
    let share = amount / Decimal::from(width as u32);
    let mut footprint = vec![share; width];
    let assigned: Decimal = footprint[..width - 1].iter().sum();
    footprint[width - 1] = amount - assigned;
    footprint
}

/// Owns every bucket's liquidity. Aggregates are always recomputed from the
/// buckets, never cached.
#[derive(Debug, Clone)]
pub struct BucketLedger {
    buckets: [Bucket; BUCKET_COUNT],
    removal_epsilon: Decimal,
}

impl BucketLedger {
    pub fn new(removal_epsilon: Decimal) -> Self {
        Self {
            buckets: [Bucket::default(); BUCKET_COUNT],
            removal_epsilon,
        }
    }

    pub fn bucket(&self, index: usize) -> Bucket {
        self.buckets[index]
    }

    pub fn buckets(&self) -> &[Bucket; BUCKET_COUNT] {
        &self.buckets
    }

    pub fn liquidity(&self, index: usize) -> Decimal {
        self.buckets[index].total_liquidity
    }

    pub fn add_liquidity(&mut self, amount: Decimal, range: BucketRange) -> Vec<Decimal> {
        let footprint = uniform_footprint(amount, range);
        self.add_footprint(range, &footprint);
        footprint
    }

    pub fn add_footprint(&mut self, range: BucketRange, footprint: &[Decimal]) {
        for (b, amount) in range.indices().zip(footprint) {
            self.buckets[b].total_liquidity += *amount;
        }
    }

    pub fn remove_liquidity(&mut self, amount: Decimal, range: BucketRange) -> RemovalOutcome {
        let footprint = uniform_footprint(amount, range);
        self.remove_footprint(range, &footprint)
    }

    /// Remove per-bucket amounts without letting any bucket go negative.
    ///
    /// Whatever a bucket cannot cover is taken from the nearest non-zero bucket
    /// (ties go to the riskier side). Anything left after the whole ledger is
    /// drained is reported as unreconciled.
    pub fn remove_footprint(&mut self, range: BucketRange, footprint: &[Decimal]) -> RemovalOutcome {
        let requested: Decimal = footprint.iter().sum();
        let mut unreconciled = Decimal::zero();

        for (b, amount) in range.indices().zip(footprint) {
            let excess = self.take(b, *amount);
            if excess.is_positive() {
                unreconciled += self.take_nearest(b, excess);
            }
        }

        if unreconciled > self.removal_epsilon {
            tracing::warn!(
                "Reconciliation discrepancy: removal of {} over {} exceeded tracked liquidity by {}",
                requested,
                range,
                unreconciled
            );
        }

        RemovalOutcome {
            removed: requested - unreconciled,
            unreconciled,
        }
    }

    /// Take up to `amount` from one bucket, returning what it could not cover.
    fn take(&mut self, index: usize, amount: Decimal) -> Decimal {
        let bucket = &mut self.buckets[index];
        let taken = amount.min(bucket.total_liquidity).floor_zero();
        bucket.total_liquidity -= taken;
        amount - taken
    }

    fn take_nearest(&mut self, origin: usize, mut excess: Decimal) -> Decimal {
        for distance in 1..BUCKET_COUNT {
            let riskier = origin + distance;
            let safer = origin.checked_sub(distance);
            for candidate in [Some(riskier), safer].into_iter().flatten() {
                if candidate < BUCKET_COUNT && excess.is_positive() {
                    excess = self.take(candidate, excess);
                }
            }
            if !excess.is_positive() {
                break;
            }
        }
        excess
    }

    /// Add a distribution share to one bucket.
    pub fn credit_bucket(&mut self, index: usize, amount: Decimal) {
        let bucket = &mut self.buckets[index];
        bucket.total_liquidity += amount;
        bucket.yield_generated += amount;
    }

    /// Remove a loss share from one bucket, flooring at zero.
    pub fn debit_bucket(&mut self, index: usize, amount: Decimal) {
        let bucket = &mut self.buckets[index];
        bucket.total_liquidity = (bucket.total_liquidity - amount).floor_zero();
    }

    /// Start of a new yield period.
    pub fn reset_period_yield(&mut self) {
        for bucket in self.buckets.iter_mut() {
            bucket.yield_generated = Decimal::zero();
        }
    }

    pub fn range_liquidity(&self, range: BucketRange) -> Decimal {
        range.indices().map(|b| self.liquidity(b)).sum()
    }

    pub fn tier_liquidity(&self, tier: Tier) -> Decimal {
        tier.indices().map(|b| self.liquidity(b)).sum()
    }

    pub fn total_liquidity(&self) -> Decimal {
        self.buckets.iter().map(|b| b.total_liquidity).sum()
    }

    /// Balanced + Hero liquidity.
    pub fn high_risk_liquidity(&self) -> Decimal {
        Tier::ALL
            .iter()
            .filter(|t| t.is_high_risk())
            .map(|t| self.tier_liquidity(*t))
            .sum()
    }

    /// Share of total liquidity held by a tier; 0 on an empty ledger.
    pub fn tier_weight(&self, tier: Tier) -> Decimal {
        Decimal::one().mul_div(self.tier_liquidity(tier), self.total_liquidity())
    }

    pub fn tier_weights(&self) -> TierWeights {
        let total = self.total_liquidity();
        let mut weights = [Decimal::zero(); 4];
        for tier in Tier::ALL {
            weights[tier.ordinal()] = Decimal::one().mul_div(self.tier_liquidity(tier), total);
        }
        TierWeights(weights)
    }
}

impl Default for BucketLedger {
    fn default() -> Self {
        Self::new(Decimal::zero())
    }
}
