//! Advisory placement of new capital.

use super::bucket_ledger::BucketLedger;
use crate::domain::{BucketRange, Decimal, Tier, TierWeights, BUCKET_COUNT};
use crate::error::EngineError;
use serde::Serialize;

/// One leg of a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationLeg {
    pub tier: Tier,
    pub range: BucketRange,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStrategy {
    /// Everything into the most underweight tier.
    Single,
    /// Width-weighted split across all tiers.
    Split,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub strategy: AllocationStrategy,
    pub legs: Vec<AllocationLeg>,
    /// Tier weights if every leg were staked as recommended.
    pub projected_weights: TierWeights,
}

pub struct AllocationOptimizer;

impl AllocationOptimizer {
    /// Recommend where `amount` should go. Never mutates the ledger.
    pub fn recommend(
        amount: Decimal,
        ledger: &BucketLedger,
        target: &TierWeights,
    ) -> Result<Recommendation, EngineError> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(format!(
                "allocation amount must be > 0, got {}",
                amount
            )));
        }

        let current = ledger.tier_weights();
        let most_underweight = Tier::ALL
            .iter()
            .map(|t| (*t, target.get(*t) - current.get(*t)))
            .filter(|(_, delta)| delta.is_positive())
            // Ties resolve to the safer tier.
            .fold(None, |best: Option<(Tier, Decimal)>, (tier, delta)| match best {
                Some((_, best_delta)) if best_delta >= delta => best,
                _ => Some((tier, delta)),
            });

        let (strategy, legs) = match most_underweight {
            Some((tier, _)) => (
                AllocationStrategy::Single,
                vec![AllocationLeg {
                    tier,
                    range: tier.range(),
                    amount,
                }],
            ),
            None => (AllocationStrategy::Split, width_weighted_split(amount)),
        };

        let projected_weights = project(ledger, &legs);
        Ok(Recommendation {
            strategy,
            legs,
            projected_weights,
        })
    }
}

fn width_weighted_split(amount: Decimal) -> Vec<AllocationLeg> {
    let total_width = Decimal::from(BUCKET_COUNT as u32);
    let mut assigned = Decimal::zero();
    Tier::ALL
        .iter()
        .map(|tier| {
            let share = if *tier == Tier::Hero {
                amount - assigned
            } else {
                amount.mul_div(Decimal::from(tier.width() as u32), total_width)
            };
            assigned += share;
            AllocationLeg {
                tier: *tier,
                range: tier.range(),
                amount: share,
            }
        })
        .collect()
}

fn project(ledger: &BucketLedger, legs: &[AllocationLeg]) -> TierWeights {
    let mut liquidity = [Decimal::zero(); 4];
    for tier in Tier::ALL {
        liquidity[tier.ordinal()] = ledger.tier_liquidity(tier);
    }
    for leg in legs {
        liquidity[leg.tier.ordinal()] += leg.amount;
    }
    let total: Decimal = liquidity.iter().sum();
    TierWeights(liquidity.map(|l| Decimal::one().mul_div(l, total)))
}
