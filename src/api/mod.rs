pub mod distributions;
pub mod health;
pub mod positions;
pub mod tiers;

use crate::config::Config;
use crate::engine::Engine;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};

/// Shared handler state.
///
/// The engine sits behind one lock: stake, close and distribution passes take
/// the write guard, queries share read guards.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RwLock<Engine>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            engine: Arc::new(RwLock::new(Engine::new(config.params))),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route(
            "/v1/positions",
            post(positions::create_position).get(positions::list_positions),
        )
        .route("/v1/positions/:id", get(positions::get_position))
        .route("/v1/positions/:id/close", post(positions::close_position))
        .route("/v1/distributions/yield", post(distributions::apply_yield))
        .route("/v1/distributions/loss", post(distributions::apply_loss))
        .route("/v1/tiers", get(tiers::get_tiers))
        .route("/v1/allocation", get(tiers::get_allocation))
        .route("/v1/protocol", get(tiers::get_protocol))
        .layer(cors)
        .with_state(state)
}
