use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::error::CompanionError;

impl IntoResponse for CompanionError {
    fn into_response(self) -> Response {
        match self {
            CompanionError::Upstream { service, source } => (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "error": format!("{} is unavailable: {}", service, source),
                    "service": service,
                })),
            )
                .into_response(),
            CompanionError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            CompanionError::InvalidInput(message) => {
                warn!(%message, "Rejected request");
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            other => {
                error!(error = %other, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": other.to_string() })),
                )
                    .into_response()
            }
        }
    }
}
