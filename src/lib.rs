pub mod api;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;

pub use config::Config;
pub use domain::{
    BucketIndex, BucketRange, Decimal, Owner, PositionId, PositionView, ProtocolParams, Tier,
};
pub use engine::{DistributionReport, Engine};
pub use error::{AppError, EngineError};
