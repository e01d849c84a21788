//! Staked positions and their read-only views.

use super::decimal::Decimal;
use super::primitives::{BucketRange, Owner, PositionId};
use super::tier::Tier;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Active,
    Closed,
}

/// A deposit staked into a bucket range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub id: PositionId,
    pub owner: Owner,
    /// Principal; never changes after stake.
    pub amount: Decimal,
    pub range: BucketRange,
    /// Net yield minus absorbed loss over the position's life.
    pub earned_amount: Decimal,
    pub status: PositionStatus,
    /// Liquidity attributed to each bucket of `range`, indexed from `range.start()`.
    /// Emptied on close.
    pub(crate) footprint: Vec<Decimal>,
    /// Amount paid out on close.
    pub payout: Option<Decimal>,
}

impl Position {
    pub fn new(
        id: PositionId,
        owner: Owner,
        amount: Decimal,
        range: BucketRange,
        footprint: Vec<Decimal>,
    ) -> Self {
        debug_assert_eq!(footprint.len(), range.width());
        Position {
            id,
            owner,
            amount,
            range,
            earned_amount: Decimal::zero(),
            status: PositionStatus::Active,
            footprint,
            payout: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == PositionStatus::Active
    }

    /// `amount + earned_amount`, never below zero.
    pub fn current_value(&self) -> Decimal {
        (self.amount + self.earned_amount).floor_zero()
    }

    /// Footprint in an absolute bucket, zero outside the range.
    pub fn footprint_at(&self, bucket: usize) -> Decimal {
        if !self.range.contains(bucket) {
            return Decimal::zero();
        }
        self.footprint
            .get(bucket - self.range.start().as_usize())
            .copied()
            .unwrap_or_default()
    }

    pub fn footprint(&self) -> &[Decimal] {
        &self.footprint
    }

    /// Sum of this position's footprint over a tier's buckets.
    pub fn footprint_in_tier(&self, tier: Tier) -> Decimal {
        match self.range.intersect(&tier.range()) {
            Some(overlap) => overlap.indices().map(|b| self.footprint_at(b)).sum(),
            None => Decimal::zero(),
        }
    }

    pub fn view(&self) -> PositionView {
        PositionView {
            id: self.id,
            owner: self.owner.clone(),
            amount: self.amount,
            start: self.range.start().as_u8(),
            end: self.range.end().as_u8(),
            earned_amount: self.earned_amount,
            current_value: self.current_value(),
            status: self.status,
            payout: self.payout,
        }
    }
}

/// Caller-facing snapshot of a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionView {
    pub id: PositionId,
    pub owner: Owner,
    pub amount: Decimal,
    pub start: u8,
    pub end: u8,
    pub earned_amount: Decimal,
    pub current_value: Decimal,
    pub status: PositionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout: Option<Decimal>,
}
