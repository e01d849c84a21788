//! Pure, synchronous computation engine for the risk-tranche ledger.
//!
//! Leaves first: [`yield_curve`] and [`bucket_ledger`] hold no policy,
//! [`waterfall`], [`bonus`] and [`optimizer`] are pure allocators,
//! [`position_ledger`] pro-rates tier flows onto positions, and [`protocol`]
//! wires them into atomic operations.

pub mod bonus;
pub mod bucket_ledger;
pub mod optimizer;
pub mod position_ledger;
pub mod protocol;
pub mod waterfall;
pub mod yield_curve;

pub use bonus::{BonusAllocation, BonusAllocator};
pub use bucket_ledger::{uniform_footprint, Bucket, BucketLedger, RemovalOutcome};
pub use optimizer::{AllocationLeg, AllocationOptimizer, AllocationStrategy, Recommendation};
pub use position_ledger::{ClosedPosition, DistributionPlan, FlowDirection, PositionLedger};
pub use protocol::{
    DistributionKind, DistributionReport, Engine, ProtocolState, TierDistribution, TierMetrics,
    Treasury,
};
pub use waterfall::{LossWaterfall, TierShare, WaterfallDistributor, YieldWaterfall};
pub use yield_curve::YieldCurve;
