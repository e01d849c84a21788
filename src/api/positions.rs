use crate::api::AppState;
use crate::domain::{BucketRange, Decimal, Owner, PositionId, PositionView};
use crate::error::{AppError, EngineError};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeRequest {
    pub owner: String,
    pub amount: f64,
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionsQuery {
    pub owner: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseResponse {
    pub id: PositionId,
    pub payout: Decimal,
}

/// Parse a JSON amount, rejecting non-finite values.
pub(crate) fn parse_amount(raw: f64) -> Result<Decimal, EngineError> {
    Decimal::try_from_f64(raw)
        .ok_or_else(|| EngineError::InvalidAmount(format!("not a finite number: {}", raw)))
}

pub async fn create_position(
    State(state): State<AppState>,
    Json(req): Json<StakeRequest>,
) -> Result<(StatusCode, Json<PositionView>), AppError> {
    if req.owner.trim().is_empty() {
        return Err(AppError::BadRequest("owner must not be empty".into()));
    }
    let amount = parse_amount(req.amount)?;
    let range = BucketRange::new(req.start, req.end)?;

    let mut engine = state.engine.write().await;
    let id = engine.stake(Owner::new(req.owner.trim()), amount, range)?;
    let view = engine.snapshot(id)?;

    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_position(
    Path(id): Path<u64>,
    State(state): State<AppState>,
) -> Result<Json<PositionView>, AppError> {
    let engine = state.engine.read().await;
    Ok(Json(engine.snapshot(PositionId::new(id))?))
}

pub async fn list_positions(
    Query(params): Query<PositionsQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<PositionView>>, AppError> {
    let engine = state.engine.read().await;
    Ok(Json(engine.positions_for_owner(&Owner::new(params.owner))))
}

pub async fn close_position(
    Path(id): Path<u64>,
    State(state): State<AppState>,
) -> Result<Json<CloseResponse>, AppError> {
    let id = PositionId::new(id);
    let mut engine = state.engine.write().await;
    let payout = engine.close(id)?;
    Ok(Json(CloseResponse { id, payout }))
}
