use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use farmchain_core::{ErrorKind, TradeError};

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    ServiceUnavailable(String),
    Trade(TradeError),
    Anyhow(anyhow::Error),
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation
        | ErrorKind::InsufficientQuantity
        | ErrorKind::InvalidTransition
        | ErrorKind::GracePeriodExpired => StatusCode::BAD_REQUEST,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::ExternalLedgerError => StatusCode::BAD_GATEWAY,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message, retryable) = match self {
            AppError::AuthenticationError(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", msg, false)
            }
            AppError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", msg, true)
            }
            AppError::Trade(err) => {
                let kind = err.kind();
                let status = status_for(kind);
                if status.is_server_error() {
                    tracing::error!(kind = %kind, "Request failed: {}", err);
                }
                (status, kind.as_str(), err.to_string(), kind.is_retryable())
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "Internal Server Error".to_string(),
                    false,
                )
            }
        };

        let body = Json(json!({
            "error": {
                "kind": kind,
                "message": message,
                "retryable": retryable,
            }
        }));

        (status, body).into_response()
    }
}

impl From<TradeError> for AppError {
    fn from(err: TradeError) -> Self {
        Self::Trade(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}
