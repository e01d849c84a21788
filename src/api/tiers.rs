//! Read-only tier metrics, allocation advice and protocol totals.

use crate::api::positions::parse_amount;
use crate::api::AppState;
use crate::domain::Tier;
use crate::engine::{ProtocolState, Recommendation, TierMetrics};
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationQuery {
    pub amount: f64,
}

pub async fn get_tiers(State(state): State<AppState>) -> Json<BTreeMap<Tier, TierMetrics>> {
    let engine = state.engine.read().await;
    Json(engine.tier_metrics())
}

pub async fn get_allocation(
    Query(params): Query<AllocationQuery>,
    State(state): State<AppState>,
) -> Result<Json<Recommendation>, AppError> {
    let amount = parse_amount(params.amount)?;
    let engine = state.engine.read().await;
    Ok(Json(engine.recommend_allocation(amount)?))
}

pub async fn get_protocol(State(state): State<AppState>) -> Json<ProtocolState> {
    let engine = state.engine.read().await;
    Json(engine.protocol_state())
}
