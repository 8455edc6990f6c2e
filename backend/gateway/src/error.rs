//! Error envelope: `{"error": {"kind", "message"}}` with a status per kind.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::warn;

use intentforge_core::RouterError;

#[derive(Debug)]
pub enum ApiError {
    Router(RouterError),
    /// Body was not valid JSON for the endpoint.
    InvalidRequest(String),
}

impl From<RouterError> for ApiError {
    fn from(err: RouterError) -> Self {
        Self::Router(err)
    }
}

pub fn status_for(err: &RouterError) -> StatusCode {
    match err {
        RouterError::MissingInput(_) => StatusCode::BAD_REQUEST,
        RouterError::MissingCredential(_) => StatusCode::INTERNAL_SERVER_ERROR,
        RouterError::ProviderUnreachable { .. } => StatusCode::BAD_GATEWAY,
        RouterError::DuplicateOperationName { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        RouterError::DuplicateProvider(_) => StatusCode::INTERNAL_SERVER_ERROR,
        RouterError::UnknownOperation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        RouterError::InvocationFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        RouterError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            Self::Router(err) => (status_for(&err), err.kind(), err.to_string()),
            Self::InvalidRequest(message) => (StatusCode::BAD_REQUEST, "invalid_request", message),
        };
        warn!(status = status.as_u16(), kind, message = %message, "Request failed");
        (
            status,
            Json(json!({ "error": { "kind": kind, "message": message } })),
        )
            .into_response()
    }
}
