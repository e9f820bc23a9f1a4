//! Operator capability check for the admin surface.
//!
//! The capability is a shared secret: configuration stores the SHA-256
//! of the token, requests present the raw token in `x-admin-token`, and
//! the digests are compared in constant time. Hardening beyond that
//! (rotation, rate limiting) belongs to the deployment, not this gate.

use axum::http::HeaderMap;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::ServerError;

/// Header carrying the raw admin token.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Hash a raw admin token to the configuration format (lowercase hex
/// SHA-256).
pub fn hash_admin_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check the operator capability on an admin request.
///
/// With no digest configured the admin surface is disabled outright.
pub fn authorize_admin(
    headers: &HeaderMap,
    expected_sha256_hex: Option<&str>,
) -> Result<(), ServerError> {
    let Some(expected_hex) = expected_sha256_hex else {
        return Err(ServerError::Unauthorized(
            "admin surface is not configured".into(),
        ));
    };
    let expected = hex::decode(expected_hex)
        .map_err(|_| ServerError::Config("admin token digest is not valid hex".into()))?;

    let Some(token) = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        return Err(ServerError::Unauthorized(format!(
            "missing {ADMIN_TOKEN_HEADER} header"
        )));
    };

    let candidate = Sha256::digest(token.as_bytes());
    if candidate.as_slice().ct_eq(&expected).into() {
        Ok(())
    } else {
        Err(ServerError::Forbidden("invalid admin token".into()))
    }
}
