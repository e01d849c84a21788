//! The engine facade: stake, close, yield and loss passes, and read models.
//!
//! Every mutating call validates and computes its full outcome before touching
//! state, so a returned error always means nothing changed.

use super::bonus::{BonusAllocation, BonusAllocator};
use super::bucket_ledger::BucketLedger;
use super::optimizer::{AllocationOptimizer, Recommendation};
use super::position_ledger::{DistributionPlan, FlowDirection, PositionLedger};
use super::waterfall::{tier_liquidity, tier_obligations, WaterfallDistributor};
use super::yield_curve::YieldCurve;
use crate::domain::params::max_liquidity;
use crate::domain::{
    ApyFormula, BucketRange, Decimal, FeeSplit, Owner, PositionId, PositionView, ProtocolParams,
    Tier,
};
use crate::error::EngineError;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionKind {
    Yield,
    Loss,
}

/// One tier's line in a distribution report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierDistribution {
    pub tier: Tier,
    /// Obligation (yield) or capacity (loss); absent for the residual tier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<Decimal>,
    /// Waterfall amount.
    pub amount: Decimal,
    /// Bonus paid on top of `amount` (yield passes only).
    pub bonus: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionReport {
    pub kind: DistributionKind,
    /// Gross yield or total loss as submitted.
    pub input: Decimal,
    /// In waterfall order. Amounts sum to net yield, or to the loss not taken by the reserve.
    pub tiers: Vec<TierDistribution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<FeeSplit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_yield: Option<Decimal>,
    pub shortfall: Decimal,
    pub reserve_used: Decimal,
    pub reserve_after: Decimal,
    pub bonus_held: Decimal,
    pub positions_affected: usize,
    /// Hero steepness in force for this pass.
    pub k: Decimal,
}

impl DistributionReport {
    pub fn tier(&self, tier: Tier) -> Option<&TierDistribution> {
        self.tiers.iter().find(|t| t.tier == tier)
    }

    /// Sum of waterfall amounts across tiers (bonus excluded).
    pub fn tier_total(&self) -> Decimal {
        self.tiers.iter().map(|t| t.amount).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierMetrics {
    pub current_weight: Decimal,
    pub target_weight: Decimal,
    /// Liquidity-weighted target APY, or the plain bucket mean when the tier is empty.
    pub apy: Decimal,
    pub liquidity: Decimal,
    pub formula: ApyFormula,
}

/// Fee flows that leave the waterfall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Treasury {
    pub buyback_total: Decimal,
    pub protocol_revenue_total: Decimal,
    /// Bonus waiting for an underweight tier that can receive it.
    pub held_bonus: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolState {
    pub total_liquidity: Decimal,
    pub high_risk_liquidity: Decimal,
    pub k: Decimal,
    pub reserve_amount: Decimal,
    pub treasury: Treasury,
    pub active_positions: usize,
}

pub struct Engine {
    params: ProtocolParams,
    buckets: BucketLedger,
    positions: PositionLedger,
    treasury: Treasury,
}

impl Engine {
    pub fn new(params: ProtocolParams) -> Self {
        let buckets = BucketLedger::new(params.removal_epsilon);
        let mut engine = Self {
            params,
            buckets,
            positions: PositionLedger::new(),
            treasury: Treasury::default(),
        };
        engine.params.refresh_k(Decimal::zero(), Decimal::zero());
        engine
    }

    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }

    pub fn buckets(&self) -> &BucketLedger {
        &self.buckets
    }

    pub fn positions(&self) -> &PositionLedger {
        &self.positions
    }

    pub fn treasury(&self) -> &Treasury {
        &self.treasury
    }

    /// Curve at the steepness implied by current liquidity.
    pub fn curve(&self) -> YieldCurve {
        let k = self.params.steepness(
            self.buckets.total_liquidity(),
            self.buckets.high_risk_liquidity(),
        );
        YieldCurve::new(self.params.curve, k)
    }

    pub fn stake(
        &mut self,
        owner: Owner,
        amount: Decimal,
        range: BucketRange,
    ) -> Result<PositionId, EngineError> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(format!(
                "stake must be > 0, got {}",
                amount
            )));
        }

        self.ensure_headroom(amount, "stake")?;

        let footprint = self.buckets.add_liquidity(amount, range);
        let id = self.positions.create(owner.clone(), amount, range, footprint);
        tracing::info!("Staked {} into {} for {} as position {}", amount, range, owner, id);
        Ok(id)
    }

    /// Withdraw a position, returning its payout.
    pub fn close(&mut self, id: PositionId) -> Result<Decimal, EngineError> {
        let closed = self.positions.close(id)?;
        let outcome = self.buckets.remove_footprint(closed.range, &closed.footprint);
        tracing::info!(
            "Closed position {}: paid out {}, removed {} from {}",
            id,
            closed.payout,
            outcome.removed,
            closed.range
        );
        Ok(closed.payout)
    }

    pub fn apply_yield(&mut self, gross_yield: Decimal) -> Result<DistributionReport, EngineError> {
        self.ensure_headroom(gross_yield, "yield")?;
        let curve = self.curve();
        let liquidity = tier_liquidity(&self.buckets);
        let obligations = tier_obligations(&self.buckets, &curve, self.params.period_fraction);

        let waterfall = WaterfallDistributor::distribute_yield(
            gross_yield,
            self.params.performance_fee_rate,
            &self.params.fee_allocation,
            obligations,
            liquidity,
        )?;
        if waterfall.shortfall.is_positive() && self.params.reject_yield_shortfall {
            return Err(EngineError::YieldShortfall {
                shortfall: waterfall.shortfall,
            });
        }

        let bonus_pool = waterfall.fee.bonus + self.treasury.held_bonus;
        let bonus = BonusAllocator::allocate(
            bonus_pool,
            &self.params.target_weights,
            &self.buckets.tier_weights(),
        );
        let (bonus_paid, bonus_held) = payable_bonus(&bonus, &liquidity);

        // Nothing below can fail.
        let mut credits = [Decimal::zero(); 4];
        for tier in Tier::ALL {
            credits[tier.ordinal()] = waterfall.amount_for(tier) + bonus_paid[tier.ordinal()];
            tracing::debug!(
                "{} tier credited {} (bonus {})",
                tier,
                credits[tier.ordinal()],
                bonus_paid[tier.ordinal()]
            );
        }
        self.params.k = curve.k();
        self.buckets.reset_period_yield();
        let plan = self.positions.credit_yield(&credits, &self.buckets);
        self.apply_to_buckets(&plan);

        let fee = waterfall.fee;
        self.params.reserve_amount += fee.insurance;
        self.treasury.buyback_total += fee.buyback;
        self.treasury.protocol_revenue_total += fee.protocol_revenue;
        self.treasury.held_bonus = bonus_held;

        tracing::info!(
            "Yield pass: gross {} net {} fee {} bonus paid {} held {} across {} positions",
            gross_yield,
            waterfall.net_yield,
            fee.total,
            bonus_pool - bonus_held,
            bonus_held,
            plan.position_deltas.len()
        );

        Ok(DistributionReport {
            kind: DistributionKind::Yield,
            input: gross_yield,
            tiers: waterfall
                .shares
                .iter()
                .map(|s| TierDistribution {
                    tier: s.tier,
                    limit: s.limit,
                    amount: s.amount,
                    bonus: bonus_paid[s.tier.ordinal()],
                })
                .collect(),
            fee: Some(fee),
            net_yield: Some(waterfall.net_yield),
            shortfall: waterfall.shortfall,
            reserve_used: Decimal::zero(),
            reserve_after: self.params.reserve_amount,
            bonus_held,
            positions_affected: plan.position_deltas.len(),
            k: self.params.k,
        })
    }

    pub fn apply_loss(&mut self, total_loss: Decimal) -> Result<DistributionReport, EngineError> {
        let liquidity = tier_liquidity(&self.buckets);
        let waterfall =
            WaterfallDistributor::distribute_loss(total_loss, self.params.reserve_amount, liquidity)?;

        let mut debits = [Decimal::zero(); 4];
        for tier in Tier::ALL {
            debits[tier.ordinal()] = waterfall.amount_for(tier);
            tracing::debug!("{} tier absorbs {}", tier, debits[tier.ordinal()]);
        }
        self.params.reserve_amount -= waterfall.reserve_used;
        let plan = self.positions.debit_loss(&debits, &self.buckets);
        self.apply_to_buckets(&plan);

        tracing::info!(
            "Loss pass: total {} reserve used {} tiers absorbed {} across {} positions",
            total_loss,
            waterfall.reserve_used,
            total_loss - waterfall.reserve_used,
            plan.position_deltas.len()
        );

        Ok(DistributionReport {
            kind: DistributionKind::Loss,
            input: total_loss,
            tiers: waterfall
                .shares
                .iter()
                .map(|s| TierDistribution {
                    tier: s.tier,
                    limit: s.limit,
                    amount: s.amount,
                    bonus: Decimal::zero(),
                })
                .collect(),
            fee: None,
            net_yield: None,
            shortfall: Decimal::zero(),
            reserve_used: waterfall.reserve_used,
            reserve_after: self.params.reserve_amount,
            bonus_held: self.treasury.held_bonus,
            positions_affected: plan.position_deltas.len(),
            k: self.curve().k(),
        })
    }

    pub fn snapshot(&self, id: PositionId) -> Result<PositionView, EngineError> {
        self.positions.get(id).map(|p| p.view())
    }

    pub fn positions_for_owner(&self, owner: &Owner) -> Vec<PositionView> {
        self.positions
            .positions_for_owner(owner)
            .into_iter()
            .map(|p| p.view())
            .collect()
    }

    pub fn tier_metrics(&self) -> BTreeMap<Tier, TierMetrics> {
        let curve = self.curve();
        let apy = curve.table();
        let weights = self.buckets.tier_weights();

        Tier::ALL
            .iter()
            .map(|tier| {
                let liquidity = self.buckets.tier_liquidity(*tier);
                let tier_apy = if liquidity.is_positive() {
                    let weighted: Decimal = tier
                        .indices()
                        .map(|b| self.buckets.liquidity(b) * apy[b])
                        .sum();
                    weighted / liquidity
                } else {
                    curve.tier_mean(*tier)
                };
                let metrics = TierMetrics {
                    current_weight: weights.get(*tier),
                    target_weight: self.params.target_weights.get(*tier),
                    apy: tier_apy,
                    liquidity,
                    formula: tier.formula(),
                };
                (*tier, metrics)
            })
            .collect()
    }

    pub fn recommend_allocation(&self, amount: Decimal) -> Result<Recommendation, EngineError> {
        self.ensure_headroom(amount, "allocation")?;
        AllocationOptimizer::recommend(amount, &self.buckets, &self.params.target_weights)
    }

    pub fn protocol_state(&self) -> ProtocolState {
        ProtocolState {
            total_liquidity: self.buckets.total_liquidity(),
            high_risk_liquidity: self.buckets.high_risk_liquidity(),
            k: self.curve().k(),
            reserve_amount: self.params.reserve_amount,
            treasury: self.treasury,
            active_positions: self.positions.active_count(),
        }
    }

    /// Reject `incoming` if liquidity plus held bonus would pass [`max_liquidity`].
    fn ensure_headroom(&self, incoming: Decimal, what: &str) -> Result<(), EngineError> {
        let projected = self
            .buckets
            .buckets()
            .iter()
            .try_fold(incoming, |acc, b| acc.checked_add(b.total_liquidity))
            .and_then(|t| t.checked_add(self.treasury.held_bonus));
        match projected {
            Some(total) if total <= max_liquidity() => Ok(()),
            _ => Err(EngineError::InvalidAmount(format!(
                "{} of {} would take ledger value past {}",
                what,
                incoming,
                max_liquidity()
            ))),
        }
    }

    fn apply_to_buckets(&mut self, plan: &DistributionPlan) {
        for (b, delta) in plan.bucket_deltas.iter().enumerate() {
            if delta.is_zero() {
                continue;
            }
            match plan.direction {
                FlowDirection::Credit => self.buckets.credit_bucket(b, *delta),
                FlowDirection::Debit => self.buckets.debit_bucket(b, *delta),
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(ProtocolParams::default())
    }
}

/// Bonus for tiers with no liquidity has no recipient and is held with the rest.
fn payable_bonus(bonus: &BonusAllocation, liquidity: &[Decimal; 4]) -> ([Decimal; 4], Decimal) {
    let mut paid = [Decimal::zero(); 4];
    let mut held = bonus.held;
    for tier in Tier::ALL {
        let amount = bonus.for_tier(tier);
        if liquidity[tier.ordinal()].is_positive() {
            paid[tier.ordinal()] = amount;
        } else {
            held += amount;
        }
    }
    (paid, held)
}
