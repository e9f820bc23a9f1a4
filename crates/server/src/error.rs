use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use parcel_relay::TransferError;

/// Errors that can occur when running the Parcel server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A relay-level error surfaced through the API.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// The request body could not be read or decoded.
    #[error("invalid request: {0}")]
    BadRequest(String),

    /// Authentication failed (missing credentials).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Caller lacks permission for the requested operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error (e.g. binding the listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Map a relay failure onto its distinct HTTP signal.
///
/// Every taxonomy kind gets a disjoint status/code pair, so callers can
/// tell not-found from exhausted from wrong-password without parsing
/// message text.
fn transfer_signal(e: &TransferError) -> (StatusCode, &'static str) {
    match e {
        TransferError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
        TransferError::TooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
        TransferError::MalwareDetected { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "malware_detected")
        }
        TransferError::PasswordRequired => (StatusCode::UNAUTHORIZED, "password_required"),
        TransferError::WrongPassword => (StatusCode::FORBIDDEN, "wrong_password"),
        TransferError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        TransferError::Exhausted => (StatusCode::GONE, "download_limit_reached"),
        TransferError::Integrity => (StatusCode::INTERNAL_SERVER_ERROR, "integrity_failure"),
        TransferError::ScannerUnavailable(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "scanner_unavailable")
        }
        TransferError::Registry(_) | TransferError::Storage(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable")
        }
        TransferError::Crypto(_) | TransferError::Configuration(_) | TransferError::Internal(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal")
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::Transfer(e) => {
                let (status, code) = transfer_signal(e);
                (status, code, e.to_string())
            }
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "validation", msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            Self::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg.clone()),
            Self::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", e.to_string()),
        };

        let body = serde_json::json!({ "error": message, "code": code });
        (status, axum::Json(body)).into_response()
    }
}
