//! Protocol-wide parameters bound to one engine instance.

use super::decimal::Decimal;
use super::tier::Tier;
use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};

/// Ceiling on total value held by the ledger (liquidity plus held bonus) and
/// on the insurance reserve. Keeps every product the engine forms well inside
/// the 96-bit mantissa.
pub fn max_liquidity() -> Decimal {
    Decimal::new(RustDecimal::from_i128_with_scale(100_000_000_000_000_000_000, 0))
}

/// Highest APY the curve may produce at the top Hero bucket.
pub fn max_apy() -> Decimal {
    Decimal::from(100i64)
}

/// Per-tier fractions indexed by [`Tier::ordinal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierWeights(pub [Decimal; 4]);

impl TierWeights {
    pub fn new(safe: Decimal, conservative: Decimal, balanced: Decimal, hero: Decimal) -> Self {
        TierWeights([safe, conservative, balanced, hero])
    }

    pub fn get(&self, tier: Tier) -> Decimal {
        self.0[tier.ordinal()]
    }

    pub fn total(&self) -> Decimal {
        self.0.iter().sum()
    }
}

/// Where the performance fee goes. Fractions sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeAllocation {
    pub bonus: Decimal,
    pub buyback: Decimal,
    pub protocol_revenue: Decimal,
    pub insurance: Decimal,
}

impl FeeAllocation {
    pub fn total(&self) -> Decimal {
        self.bonus + self.buyback + self.protocol_revenue + self.insurance
    }

    /// Split a fee exactly. Rounding dust lands in protocol revenue.
    pub fn split(&self, fee: Decimal) -> FeeSplit {
        let bonus = fee * self.bonus;
        let buyback = fee * self.buyback;
        let insurance = fee * self.insurance;
        let protocol_revenue = fee - bonus - buyback - insurance;
        FeeSplit {
            total: fee,
            bonus,
            buyback,
            protocol_revenue,
            insurance,
        }
    }
}

/// One performance fee broken down by destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSplit {
    pub total: Decimal,
    pub bonus: Decimal,
    pub buyback: Decimal,
    pub protocol_revenue: Decimal,
    pub insurance: Decimal,
}

/// Inputs to the piecewise APY curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurveParams {
    /// Fixed Safe-tier rate.
    pub r_min: Decimal,
    /// Rate reached at the top of the Conservative tier.
    pub conservative_target: Decimal,
    /// Rate reached at the top of the Balanced tier; Hero grows from here.
    pub balanced_target: Decimal,
    /// Hero growth factor when high-risk capital is plentiful.
    pub k_min: Decimal,
    /// Hero growth factor when there is no high-risk capital.
    pub k_max: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolParams {
    pub curve: CurveParams,
    /// Current Hero steepness; see [`ProtocolParams::steepness`].
    pub k: Decimal,
    /// Insurance buffer that absorbs losses before any tier.
    pub reserve_amount: Decimal,
    /// Share of gross yield taken as a fee before the waterfall.
    pub performance_fee_rate: Decimal,
    pub fee_allocation: FeeAllocation,
    pub target_weights: TierWeights,
    /// Length of one yield period as a fraction of a year.
    pub period_fraction: Decimal,
    /// Tolerance before a liquidity removal is reported as a discrepancy.
    pub removal_epsilon: Decimal,
    /// Reject yield passes that cannot meet senior obligations.
    pub reject_yield_shortfall: bool,
}

impl ProtocolParams {
    pub fn r_min(&self) -> Decimal {
        self.curve.r_min
    }

    /// `k_min + (k_max - k_min) * (1 - high_risk / tvl)`; the ratio is 0 on an empty ledger.
    pub fn steepness(&self, tvl: Decimal, high_risk: Decimal) -> Decimal {
        let ratio = Decimal::one().mul_div(high_risk, tvl).min(Decimal::one());
        self.curve.k_min + (self.curve.k_max - self.curve.k_min) * (Decimal::one() - ratio)
    }

    pub fn refresh_k(&mut self, tvl: Decimal, high_risk: Decimal) {
        self.k = self.steepness(tvl, high_risk);
    }

    /// `balanced_target * k_max^(hero width - 1)`: the steepest the curve can get.
    /// `None` when that is not representable.
    pub fn peak_apy(&self) -> Option<Decimal> {
        let steps = (Tier::Hero.width() - 1) as u32;
        self.curve
            .k_max
            .checked_powu(steps)
            .and_then(|k| k.checked_mul(self.curve.balanced_target))
    }

    /// Check the cross-field constraints the engine relies on.
    pub fn validate(&self) -> Result<(), (&'static str, String)> {
        let zero = Decimal::zero();
        let one = Decimal::one();
        let c = &self.curve;

        if c.r_min.is_negative() {
            return Err(("R_MIN", "must be >= 0".to_string()));
        }
        if c.conservative_target < c.r_min {
            return Err(("CONSERVATIVE_TARGET_APY", "must be >= R_MIN".to_string()));
        }
        if c.balanced_target < c.conservative_target {
            return Err((
                "BALANCED_TARGET_APY",
                "must be >= CONSERVATIVE_TARGET_APY".to_string(),
            ));
        }
        if c.k_min < one {
            return Err(("K_MIN", "must be >= 1".to_string()));
        }
        if c.k_max < c.k_min {
            return Err(("K_MAX", "must be >= K_MIN".to_string()));
        }
        match self.peak_apy() {
            Some(peak) if peak <= max_apy() => {}
            _ => {
                return Err((
                    "K_MAX",
                    format!("top Hero bucket APY must not exceed {}", max_apy()),
                ))
            }
        }
        if self.performance_fee_rate < zero || self.performance_fee_rate > one {
            return Err(("PERFORMANCE_FEE_RATE", "must be within [0, 1]".to_string()));
        }
        let fa = &self.fee_allocation;
        if [fa.bonus, fa.buyback, fa.protocol_revenue, fa.insurance]
            .iter()
            .any(|f| f.is_negative())
        {
            return Err(("FEE_ALLOCATION", "fractions must be >= 0".to_string()));
        }
        if fa.total() != one {
            return Err((
                "FEE_ALLOCATION",
                format!("fractions must sum to 1, got {}", fa.total()),
            ));
        }
        if self.target_weights.0.iter().any(|w| w.is_negative()) {
            return Err(("TARGET_WEIGHTS", "weights must be >= 0".to_string()));
        }
        if self.target_weights.total() != one {
            return Err((
                "TARGET_WEIGHTS",
                format!("weights must sum to 1, got {}", self.target_weights.total()),
            ));
        }
        if self.reserve_amount.is_negative() || self.reserve_amount > max_liquidity() {
            return Err((
                "INITIAL_RESERVE",
                format!("must be within [0, {}]", max_liquidity()),
            ));
        }
        if !self.period_fraction.is_positive() || self.period_fraction > one {
            return Err(("YIELD_PERIOD_FRACTION", "must be within (0, 1]".to_string()));
        }
        if self.removal_epsilon.is_negative() {
            return Err(("REMOVAL_EPSILON", "must be >= 0".to_string()));
        }
        Ok(())
    }
}

impl Default for ProtocolParams {
    fn default() -> Self {
        let d = |num: i64, scale: u32| Decimal::new(RustDecimal::new(num, scale));
        let curve = CurveParams {
            r_min: d(54, 3),
            conservative_target: d(8, 2),
            balanced_target: d(12, 2),
            k_min: d(101, 2),
            k_max: d(105, 2),
        };
        ProtocolParams {
            k: curve.k_max,
            curve,
            reserve_amount: Decimal::zero(),
            performance_fee_rate: d(10, 2),
            fee_allocation: FeeAllocation {
                bonus: d(4, 1),
                buyback: d(2, 1),
                protocol_revenue: d(2, 1),
                insurance: d(2, 1),
            },
            target_weights: TierWeights::new(d(2, 1), d(3, 1), d(3, 1), d(2, 1)),
            period_fraction: Decimal::one(),
            removal_epsilon: d(1, 9),
            reject_yield_shortfall: false,
        }
    }
}
