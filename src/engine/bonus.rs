//! Fee-funded bonus for underweight tiers.

use crate::domain::{Decimal, Tier, TierWeights};
use serde::Serialize;

/// How a bonus pool was split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusAllocation {
    pub pool: Decimal,
    /// Per-tier bonus, indexed by [`Tier::ordinal`]. Zero for tiers at or above target.
    pub per_tier: [Decimal; 4],
    /// Portion of the pool kept back because no tier was underweight.
    pub held: Decimal,
}

impl BonusAllocation {
    pub fn for_tier(&self, tier: Tier) -> Decimal {
        self.per_tier[tier.ordinal()]
    }

    pub fn distributed(&self) -> Decimal {
        self.per_tier.iter().sum()
    }
}

pub struct BonusAllocator;

impl BonusAllocator {
    /// `bonus[t] = pool * delta[t] / Σ positive deltas` where `delta = target - current`.
    ///
    /// Only underweight tiers participate. When none is underweight the whole
    /// pool is held for the next pass. Outputs plus `held` equal `pool` exactly.
    pub fn allocate(pool: Decimal, target: &TierWeights, current: &TierWeights) -> BonusAllocation {
        let mut per_tier = [Decimal::zero(); 4];

        let deltas: Vec<(Tier, Decimal)> = Tier::ALL
            .iter()
            .map(|t| (*t, target.get(*t) - current.get(*t)))
            .filter(|(_, delta)| delta.is_positive())
            .collect();
        let delta_sum: Decimal = deltas.iter().map(|(_, delta)| *delta).sum();

        if !pool.is_positive() || deltas.is_empty() {
            return BonusAllocation {
                pool,
                per_tier,
                held: pool,
            };
        }

        let mut assigned = Decimal::zero();
        let last = deltas.len() - 1;
        for (i, (tier, delta)) in deltas.iter().enumerate() {
            let share = if i == last {
                pool - assigned
            } else {
                pool.mul_div(*delta, delta_sum)
            };
            assigned += share;
            per_tier[tier.ordinal()] = share;
        }

        tracing::debug!(
            "Bonus pool {} split across {} underweight tiers",
            pool,
            deltas.len()
        );

        BonusAllocation {
            pool,
            per_tier,
            held: Decimal::zero(),
        }
    }
}
