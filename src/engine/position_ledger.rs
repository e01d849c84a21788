//! Individual positions and their pro-rata share of tier-level flows.

use super::bucket_ledger::BucketLedger;
use crate::domain::{
    BucketRange, Decimal, Owner, Position, PositionId, PositionStatus, Tier, BUCKET_COUNT,
};
use crate::error::EngineError;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowDirection {
    Credit,
    Debit,
}

/// Per-position, per-bucket movements computed from tier amounts.
///
/// A plan is computed against an immutable ledger snapshot and can be
/// discarded freely; nothing changes until it is committed.
#[derive(Debug, Clone)]
pub struct DistributionPlan {
    pub direction: FlowDirection,
    /// Total movement per bucket; equals the sum of position movements in that bucket.
    pub bucket_deltas: [Decimal; BUCKET_COUNT],
    /// `(bucket, amount)` pairs per position.
    pub position_deltas: BTreeMap<PositionId, Vec<(usize, Decimal)>>,
}

impl DistributionPlan {
    pub fn position_total(&self, id: PositionId) -> Decimal {
        self.position_deltas
            .get(&id)
            .map(|moves| moves.iter().map(|(_, amount)| *amount).sum())
            .unwrap_or_default()
    }

    pub fn total(&self) -> Decimal {
        self.bucket_deltas.iter().sum()
    }
}

/// A position that was just closed, with what must leave the bucket ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedPosition {
    pub id: PositionId,
    pub payout: Decimal,
    pub range: BucketRange,
    pub footprint: Vec<Decimal>,
}

pub struct PositionLedger {
    positions: BTreeMap<PositionId, Position>,
    next_id: u64,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self {
            positions: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn create(
        &mut self,
        owner: Owner,
        amount: Decimal,
        range: BucketRange,
        footprint: Vec<Decimal>,
    ) -> PositionId {
        let id = PositionId::new(self.next_id);
        self.next_id += 1;
        self.positions
            .insert(id, Position::new(id, owner, amount, range, footprint));
        id
    }

    pub fn get(&self, id: PositionId) -> Result<&Position, EngineError> {
        self.positions
            .get(&id)
            .ok_or(EngineError::UnknownPosition(id))
    }

    pub fn positions_for_owner(&self, owner: &Owner) -> Vec<&Position> {
        self.positions
            .values()
            .filter(|p| &p.owner == owner)
            .collect()
    }

    pub fn active(&self) -> impl Iterator<Item = &Position> {
        self.positions.values().filter(|p| p.is_active())
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Mark a position closed and hand back its payout and footprint.
    pub fn close(&mut self, id: PositionId) -> Result<ClosedPosition, EngineError> {
        let position = self
            .positions
            .get_mut(&id)
            .ok_or(EngineError::UnknownPosition(id))?;
        if !position.is_active() {
            return Err(EngineError::AlreadyClosed(id));
        }

        let payout = position.current_value();
        let footprint = std::mem::take(&mut position.footprint);
        position.status = PositionStatus::Closed;
        position.payout = Some(payout);

        Ok(ClosedPosition {
            id,
            payout,
            range: position.range,
            footprint,
        })
    }

    /// Pro-rate tier amounts onto active positions.
    ///
    /// Each tier amount is split over the tier's buckets by liquidity, then each
    /// bucket share over the positions in that bucket by current footprint.
    /// Summed over a tier this gives every position
    /// `tier_amount * footprint_in_tier / tier_liquidity`. The last participant
    /// of every split takes the rounding remainder.
    pub fn plan(
        &self,
        tier_amounts: &[Decimal; 4],
        ledger: &BucketLedger,
        direction: FlowDirection,
    ) -> DistributionPlan {
        let mut bucket_shares = [Decimal::zero(); BUCKET_COUNT];
        for tier in Tier::ALL {
            let amount = tier_amounts[tier.ordinal()];
            if !amount.is_positive() {
                continue;
            }
            let tier_liquidity = ledger.tier_liquidity(tier);
            if !tier_liquidity.is_positive() {
                tracing::warn!("No liquidity in {} tier to carry {}", tier, amount);
                continue;
            }
            let funded: Vec<usize> = tier
                .indices()
                .filter(|b| ledger.liquidity(*b).is_positive())
                .collect();
            split_exact(amount, tier_liquidity, &funded, |b| ledger.liquidity(b), |b, share| {
                bucket_shares[b] = share;
            });
        }

        let mut holders: Vec<Vec<&Position>> = vec![Vec::new(); BUCKET_COUNT];
        for position in self.active() {
            for b in position.range.indices() {
                if bucket_shares[b].is_positive() && position.footprint_at(b).is_positive() {
                    holders[b].push(position);
                }
            }
        }

        let mut bucket_deltas = [Decimal::zero(); BUCKET_COUNT];
        let mut position_deltas: BTreeMap<PositionId, Vec<(usize, Decimal)>> = BTreeMap::new();
        for (b, in_bucket) in holders.iter().enumerate() {
            if in_bucket.is_empty() {
                continue;
            }
            let held: Decimal = in_bucket.iter().map(|p| p.footprint_at(b)).sum();
            split_exact(
                bucket_shares[b],
                held,
                in_bucket,
                |p| p.footprint_at(b),
                |p, share| {
                    let share = match direction {
                        FlowDirection::Credit => share,
                        FlowDirection::Debit => share.min(p.footprint_at(b)),
                    };
                    bucket_deltas[b] += share;
                    position_deltas.entry(p.id).or_default().push((b, share));
                },
            );
        }

        DistributionPlan {
            direction,
            bucket_deltas,
            position_deltas,
        }
    }

    /// Apply a plan to the positions it names. Bucket liquidity is left to the caller.
    pub fn commit(&mut self, plan: &DistributionPlan) {
        for (id, moves) in &plan.position_deltas {
            let Some(position) = self.positions.get_mut(id) else {
                continue;
            };
            let start = position.range.start().as_usize();
            let mut total = Decimal::zero();
            for (b, amount) in moves {
                let slot = &mut position.footprint[b - start];
                match plan.direction {
                    FlowDirection::Credit => *slot += *amount,
                    FlowDirection::Debit => *slot = (*slot - *amount).floor_zero(),
                }
                total += *amount;
            }
            match plan.direction {
                FlowDirection::Credit => position.earned_amount += total,
                FlowDirection::Debit => position.earned_amount -= total,
            }
        }
    }

    /// Credit tier yield to positions; returns per-bucket amounts for the bucket ledger.
    pub fn credit_yield(
        &mut self,
        tier_amounts: &[Decimal; 4],
        ledger: &BucketLedger,
    ) -> DistributionPlan {
        let plan = self.plan(tier_amounts, ledger, FlowDirection::Credit);
        self.commit(&plan);
        plan
    }

    /// Debit tier losses from positions; values floor at zero.
    pub fn debit_loss(
        &mut self,
        tier_amounts: &[Decimal; 4],
        ledger: &BucketLedger,
    ) -> DistributionPlan {
        let plan = self.plan(tier_amounts, ledger, FlowDirection::Debit);
        self.commit(&plan);
        plan
    }
}

impl Default for PositionLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `amount` over `items` by `weight / total`, last item takes the remainder.
fn split_exact<T: Copy>(
    amount: Decimal,
    total: Decimal,
    items: &[T],
    weight: impl Fn(T) -> Decimal,
    mut assign: impl FnMut(T, Decimal),
) {
    let Some(last) = items.len().checked_sub(1) else {
        return;
    };
    let mut assigned = Decimal::zero();
    for (i, item) in items.iter().enumerate() {
        let share = if i == last {
            amount - assigned
        } else {
            amount.mul_div(weight(*item), total)
        };
        assigned += share;
        assign(*item, share);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn stake(
        positions: &mut PositionLedger,
        ledger: &mut BucketLedger,
        amount: &str,
        start: i64,
        end: i64,
    ) -> PositionId {
        let range = BucketRange::new(start, end).unwrap();
        let footprint = ledger.add_liquidity(d(amount), range);
        positions.create(Owner::new("0xabc"), d(amount), range, footprint)
    }

    fn apply(ledger: &mut BucketLedger, plan: &DistributionPlan) {
        for (b, delta) in plan.bucket_deltas.iter().enumerate() {
            match plan.direction {
                FlowDirection::Credit => ledger.credit_bucket(b, *delta),
                FlowDirection::Debit => ledger.debit_bucket(b, *delta),
            }
        }
    }

    fn assert_close(actual: Decimal, expected: Decimal) {
        let tolerance = d("0.000000001");
        assert!(
            (actual - expected).abs() < tolerance,
            "expected {} got {}",
            expected,
            actual
        );
    }

    fn balanced_only(amount: &str) -> [Decimal; 4] {
        [Decimal::zero(), Decimal::zero(), d(amount), Decimal::zero()]
    }

    #[test]
    fn test_overlapping_positions_split_by_footprint() {
        let mut ledger = BucketLedger::default();
        let mut positions = PositionLedger::new();
        let a = stake(&mut positions, &mut ledger, "1000", 30, 40);
        let b = stake(&mut positions, &mut ledger, "3000", 35, 59);

        let plan = positions.credit_yield(&balanced_only("400"), &ledger);
        let credit_a = plan.position_total(a);
        let credit_b = plan.position_total(b);

        assert_close(credit_a, d("100"));
        assert_close(credit_b, d("300"));
        assert_close(credit_a + credit_b, d("400"));
        assert_close(
            positions.get(a).unwrap().earned_amount + positions.get(b).unwrap().earned_amount,
            d("400"),
        );
    }

    #[test]
    fn test_debit_uses_current_footprint_and_floors() {
        let mut ledger = BucketLedger::default();
        let mut positions = PositionLedger::new();
        let a = stake(&mut positions, &mut ledger, "100", 60, 60);

        let wipe = [Decimal::zero(), Decimal::zero(), Decimal::zero(), d("100")];
        let plan = positions.debit_loss(&wipe, &ledger);
        apply(&mut ledger, &plan);

        let p = positions.get(a).unwrap();
        assert_eq!(p.current_value(), Decimal::zero());
        assert_eq!(p.earned_amount, d("-100"));
        assert_eq!(ledger.liquidity(60), Decimal::zero());

        // Nothing left to debit: a second pass moves nothing.
        let plan = positions.debit_loss(&wipe, &ledger);
        assert_eq!(plan.total(), Decimal::zero());
        assert_eq!(positions.get(a).unwrap().current_value(), Decimal::zero());
    }

    #[test]
    fn test_earlier_losses_shrink_future_share() {
        let mut ledger = BucketLedger::default();
        let mut positions = PositionLedger::new();
        let a = stake(&mut positions, &mut ledger, "100", 70, 70);
        let hero = |s: &str| [Decimal::zero(), Decimal::zero(), Decimal::zero(), d(s)];

        // Only `a` is present when the loss lands.
        let plan = positions.debit_loss(&hero("50"), &ledger);
        apply(&mut ledger, &plan);
        let b = stake(&mut positions, &mut ledger, "100", 70, 70);

        let plan = positions.credit_yield(&hero("30"), &ledger);
        assert_eq!(plan.position_total(a), d("10"));
        assert_eq!(plan.position_total(b), d("20"));
    }

    #[test]
    fn test_plan_does_not_mutate() {
        let mut ledger = BucketLedger::default();
        let mut positions = PositionLedger::new();
        let a = stake(&mut positions, &mut ledger, "500", 0, 9);

        let safe = [d("5"), Decimal::zero(), Decimal::zero(), Decimal::zero()];
        let plan = positions.plan(&safe, &ledger, FlowDirection::Credit);
        assert_eq!(plan.position_total(a), d("5"));
        assert_eq!(positions.get(a).unwrap().earned_amount, Decimal::zero());
    }

    #[test]
    fn test_bucket_deltas_match_position_moves() {
        let mut ledger = BucketLedger::default();
        let mut positions = PositionLedger::new();
        stake(&mut positions, &mut ledger, "333", 5, 40);
        stake(&mut positions, &mut ledger, "777", 25, 75);
        stake(&mut positions, &mut ledger, "10", 99, 99);

        let amounts = [d("1.1"), d("2.2"), d("3.3"), d("4.4")];
        let plan = positions.credit_yield(&amounts, &ledger);
        apply(&mut ledger, &plan);

        assert_close(plan.total(), d("11"));
        let footprints: Decimal = positions.active().flat_map(|p| p.footprint().to_vec()).sum();
        assert_close(footprints, ledger.total_liquidity());
    }

    #[test]
    fn test_close_lifecycle() {
        let mut ledger = BucketLedger::default();
        let mut positions = PositionLedger::new();
        let a = stake(&mut positions, &mut ledger, "250", 10, 14);

        let closed = positions.close(a).unwrap();
        assert_eq!(closed.payout, d("250"));
        assert_eq!(closed.footprint.iter().sum::<Decimal>(), d("250"));
        assert_eq!(positions.get(a).unwrap().status, PositionStatus::Closed);
        assert_eq!(positions.close(a), Err(EngineError::AlreadyClosed(a)));
        assert_eq!(
            positions.close(PositionId::new(99)),
            Err(EngineError::UnknownPosition(PositionId::new(99)))
        );
        assert_eq!(positions.active_count(), 0);
        assert_eq!(positions.len(), 1);
    }
}
