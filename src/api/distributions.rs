//! Yield and loss events submitted by the host.

use crate::api::positions::parse_amount;
use crate::api::AppState;
use crate::engine::DistributionReport;
use crate::error::AppError;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionRequest {
    pub amount: f64,
}

pub async fn apply_yield(
    State(state): State<AppState>,
    Json(req): Json<DistributionRequest>,
) -> Result<Json<DistributionReport>, AppError> {
    let amount = parse_amount(req.amount)?;
    let mut engine = state.engine.write().await;
    Ok(Json(engine.apply_yield(amount)?))
}

pub async fn apply_loss(
    State(state): State<AppState>,
    Json(req): Json<DistributionRequest>,
) -> Result<Json<DistributionReport>, AppError> {
    let amount = parse_amount(req.amount)?;
    let mut engine = state.engine.write().await;
    Ok(Json(engine.apply_loss(amount)?))
}
