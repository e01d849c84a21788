//! Strict-priority yield and loss allocation across tiers.
//!
//! Yield flows senior first (Safe → Hero), loss flows junior first
//! (Hero → Safe) after the insurance reserve. Every allocation sums exactly to
//! its input: capped tiers take `min(cap, remaining)` and the final recipient
//! takes whatever is left, so no rounding step sits on the exact-sum path.

use super::bucket_ledger::BucketLedger;
use super::yield_curve::YieldCurve;
use crate::domain::{Decimal, FeeAllocation, FeeSplit, Tier};
use crate::error::EngineError;
use serde::Serialize;

/// Amount assigned to one tier by a waterfall pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierShare {
    pub tier: Tier,
    /// Obligation (yield) or capacity (loss); `None` for the uncapped residual tier.
    pub limit: Option<Decimal>,
    pub amount: Decimal,
}

/// Outcome of a yield pass before it touches any position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YieldWaterfall {
    pub gross_yield: Decimal,
    pub fee: FeeSplit,
    pub net_yield: Decimal,
    /// One entry per tier in yield order; sums to `net_yield`.
    pub shares: Vec<TierShare>,
    /// Senior obligations left unpaid. Non-zero implies Hero received nothing.
    pub shortfall: Decimal,
}

/// Outcome of a loss pass before it touches any position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LossWaterfall {
    pub total_loss: Decimal,
    pub reserve_used: Decimal,
    /// One entry per tier in loss order; with `reserve_used` sums to `total_loss`.
    pub shares: Vec<TierShare>,
}

impl YieldWaterfall {
    pub fn amount_for(&self, tier: Tier) -> Decimal {
        amount_for(&self.shares, tier)
    }

    pub fn allocated(&self) -> Decimal {
        self.shares.iter().map(|s| s.amount).sum()
    }
}

impl LossWaterfall {
    pub fn amount_for(&self, tier: Tier) -> Decimal {
        amount_for(&self.shares, tier)
    }

    pub fn allocated(&self) -> Decimal {
        self.reserve_used + self.shares.iter().map(|s| s.amount).sum::<Decimal>()
    }
}

fn amount_for(shares: &[TierShare], tier: Tier) -> Decimal {
    shares
        .iter()
        .find(|s| s.tier == tier)
        .map(|s| s.amount)
        .unwrap_or_default()
}

/// Per-tier liquidity snapshot, indexed by [`Tier::ordinal`].
pub fn tier_liquidity(ledger: &BucketLedger) -> [Decimal; 4] {
    let mut out = [Decimal::zero(); 4];
    for tier in Tier::ALL {
        out[tier.ordinal()] = ledger.tier_liquidity(tier);
    }
    out
}

/// What each tier is owed for one period: `Σ liquidity(b) · apy(b) · period_fraction`.
pub fn tier_obligations(
    ledger: &BucketLedger,
    curve: &YieldCurve,
    period_fraction: Decimal,
) -> [Decimal; 4] {
    let apy = curve.table();
    let mut out = [Decimal::zero(); 4];
    for tier in Tier::ALL {
        let owed: Decimal = tier
            .indices()
            .map(|b| ledger.liquidity(b) * apy[b])
            .sum();
        out[tier.ordinal()] = owed * period_fraction;
    }
    out
}

pub struct WaterfallDistributor;

impl WaterfallDistributor {
    /// Deduct the performance fee, then pay tiers senior first.
    ///
    /// Safe, Conservative and Balanced each get `min(obligation, remaining)`.
    /// The residual goes to Hero, or to the riskiest tier holding liquidity
    /// when Hero is empty.
    pub fn distribute_yield(
        gross_yield: Decimal,
        performance_fee_rate: Decimal,
        fee_allocation: &FeeAllocation,
        obligations: [Decimal; 4],
        liquidity: [Decimal; 4],
    ) -> Result<YieldWaterfall, EngineError> {
        if !gross_yield.is_positive() {
            return Err(EngineError::InvalidAmount(format!(
                "yield must be > 0, got {}",
                gross_yield
            )));
        }
        let residual_tier = Tier::ALL
            .iter()
            .rev()
            .copied()
            .find(|t| liquidity[t.ordinal()].is_positive())
            .ok_or(EngineError::NoLiquidity)?;

        let fee = fee_allocation.split(gross_yield * performance_fee_rate);
        let net_yield = gross_yield - fee.total;

        let mut remaining = net_yield;
        let mut shortfall = Decimal::zero();
        let mut shares = Vec::with_capacity(4);

        for tier in [Tier::Safe, Tier::Conservative, Tier::Balanced] {
            let owed = obligations[tier.ordinal()];
            let paid = owed.min(remaining).floor_zero();
            remaining -= paid;
            shortfall += owed - paid;
            shares.push(TierShare {
                tier,
                limit: Some(owed),
                amount: paid,
            });
        }
        shares.push(TierShare {
            tier: Tier::Hero,
            limit: None,
            amount: Decimal::zero(),
        });

        // A shortfall leaves nothing behind, so Hero stays at exactly zero.
        if let Some(share) = shares.iter_mut().find(|s| s.tier == residual_tier) {
            share.amount += remaining;
        }

        if shortfall.is_positive() {
            tracing::warn!(
                "Yield shortfall: net yield {} leaves senior obligations unpaid by {}",
                net_yield,
                shortfall
            );
        }

        Ok(YieldWaterfall {
            gross_yield,
            fee,
            net_yield,
            shares,
            shortfall,
        })
    }

    /// Drain the reserve, then tiers junior first. Fails without partial
    /// results when reserve plus all tiers cannot cover the loss.
    pub fn distribute_loss(
        total_loss: Decimal,
        reserve: Decimal,
        liquidity: [Decimal; 4],
    ) -> Result<LossWaterfall, EngineError> {
        if !total_loss.is_positive() {
            return Err(EngineError::InvalidAmount(format!(
                "loss must be > 0, got {}",
                total_loss
            )));
        }

        let absorbable = reserve + liquidity.iter().sum::<Decimal>();
        if total_loss > absorbable {
            let uncovered = total_loss - absorbable;
            tracing::warn!(
                "Insolvency: loss {} exceeds reserve plus tier liquidity {} by {}",
                total_loss,
                absorbable,
                uncovered
            );
            return Err(EngineError::InsolvencyDetected {
                total_loss,
                absorbable,
                uncovered,
            });
        }

        let reserve_used = reserve.min(total_loss);
        let mut remaining = total_loss - reserve_used;
        let mut shares = Vec::with_capacity(4);

        for tier in Tier::LOSS_ORDER {
            let capacity = liquidity[tier.ordinal()];
            let absorbed = capacity.min(remaining);
            remaining -= absorbed;
            shares.push(TierShare {
                tier,
                limit: Some(capacity),
                amount: absorbed,
            });
        }
        debug_assert!(remaining.is_zero());

        Ok(LossWaterfall {
            total_loss,
            reserve_used,
            shares,
        })
    }
}
