use crate::api::AppState;
use axum::extract::State;
use axum::Json;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok", "service": "tranchewell"}))
}

/// Ready once the engine lock can be taken; reports how much it is holding.
pub async fn ready(State(state): State<AppState>) -> Json<serde_json::Value> {
    let engine = state.engine.read().await;
    Json(serde_json::json!({
        "status": "ready",
        "activePositions": engine.positions().active_count(),
    }))
}
