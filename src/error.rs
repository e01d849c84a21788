use crate::domain::{Decimal, PositionId};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Caller-recoverable engine failures. A failed call leaves all state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Invalid bucket range: {0}")]
    InvalidRange(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Unknown position: {0}")]
    UnknownPosition(PositionId),
    #[error("Position already closed: {0}")]
    AlreadyClosed(PositionId),
    #[error("Insolvency detected: loss {total_loss} exceeds absorbable {absorbable} by {uncovered}")]
    InsolvencyDetected {
        total_loss: Decimal,
        absorbable: Decimal,
        uncovered: Decimal,
    },
    #[error("Yield shortfall: net yield misses senior obligations by {shortfall}")]
    YieldShortfall { shortfall: Decimal },
    #[error("No liquidity staked")]
    NoLiquidity,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::UnknownPosition(_) => AppError::NotFound(err.to_string()),
            EngineError::InvalidRange(_)
            | EngineError::InvalidAmount(_)
            | EngineError::AlreadyClosed(_) => AppError::BadRequest(err.to_string()),
            EngineError::InsolvencyDetected { .. }
            | EngineError::YieldShortfall { .. }
            | EngineError::NoLiquidity => AppError::Conflict(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_errors_map_to_status() {
        let cases = vec![
            (
                EngineError::UnknownPosition(PositionId::new(7)),
                StatusCode::NOT_FOUND,
            ),
            (
                EngineError::InvalidRange("start 5 greater than end 4".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                EngineError::AlreadyClosed(PositionId::new(1)),
                StatusCode::BAD_REQUEST,
            ),
            (EngineError::NoLiquidity, StatusCode::CONFLICT),
            (
                EngineError::YieldShortfall {
                    shortfall: Decimal::one(),
                },
                StatusCode::CONFLICT,
            ),
        ];

        for (err, status) in cases {
            let resp = AppError::from(err).into_response();
            assert_eq!(resp.status(), status);
        }
    }

    #[test]
    fn test_insolvency_message_names_uncovered_amount() {
        let err = EngineError::InsolvencyDetected {
            total_loss: Decimal::from(10i64),
            absorbable: Decimal::from(4i64),
            uncovered: Decimal::from(6i64),
        };
        assert!(err.to_string().contains("by 6"));
    }
}
