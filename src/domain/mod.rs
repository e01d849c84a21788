//! Domain types for the risk-tranche ledger.
//!
//! This module provides:
//! - Lossless numeric handling via Decimal wrapper
//! - Domain primitives: BucketIndex, BucketRange, PositionId, Owner
//! - Static tier layout and the APY formula kind of each tier
//! - Position state and its caller-facing view
//! - Protocol parameters (curve, fees, target weights, reserve)

pub mod decimal;
pub mod params;
pub mod position;
pub mod primitives;
pub mod tier;

pub use decimal::Decimal;
pub use params::{CurveParams, FeeAllocation, FeeSplit, ProtocolParams, TierWeights};
pub use position::{Position, PositionStatus, PositionView};
pub use primitives::{BucketIndex, BucketRange, Owner, PositionId, BUCKET_COUNT};
pub use tier::{ApyFormula, Tier};
