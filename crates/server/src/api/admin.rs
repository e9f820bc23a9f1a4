use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use tracing::info;

use parcel_core::validate_transfer_id;
use parcel_relay::TransferError;

use crate::auth::authorize_admin;
use crate::error::ServerError;

use super::AppState;
use super::schemas::{AdminDeleteResponse, AdminListResponse, ErrorResponse, TransferSummaryBody};

/// `GET /v1/admin/transfers` -- list active transfers for the operator.
///
/// Requires the `x-admin-token` capability. The listing carries only
/// non-sensitive fields; password hashes and key material never leave
/// the registry.
#[utoipa::path(
    get,
    path = "/v1/admin/transfers",
    tag = "Admin",
    summary = "List active transfers",
    description = "Returns all active transfers with non-sensitive fields, gated by the operator capability.",
    responses(
        (status = 200, description = "Active transfers", body = AdminListResponse),
        (status = 401, description = "Missing capability", body = ErrorResponse),
        (status = 403, description = "Invalid capability", body = ErrorResponse)
    )
)]
pub async fn list_transfers(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServerError> {
    authorize_admin(&headers, state.admin_token_sha256.as_deref())?;

    let transfers = state.relay.list_transfers().await?;
    let body = AdminListResponse {
        total_active: transfers.len(),
        transfers: transfers
            .iter()
            .map(TransferSummaryBody::from_summary)
            .collect(),
    };
    Ok((StatusCode::OK, Json(body)))
}

/// `DELETE /v1/admin/transfers/{id}` -- force-remove a transfer.
///
/// Runs the same blob-then-record purge path as organic expiry.
#[utoipa::path(
    delete,
    path = "/v1/admin/transfers/{id}",
    tag = "Admin",
    summary = "Force-delete a transfer",
    description = "Removes the blob and record through the same path the reaper uses.",
    params(("id" = String, Path, description = "Transfer id")),
    responses(
        (status = 200, description = "Deleted", body = AdminDeleteResponse),
        (status = 401, description = "Missing capability", body = ErrorResponse),
        (status = 403, description = "Invalid capability", body = ErrorResponse),
        (status = 404, description = "No such transfer", body = ErrorResponse)
    )
)]
pub async fn delete_transfer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServerError> {
    authorize_admin(&headers, state.admin_token_sha256.as_deref())?;

    if !validate_transfer_id(&id) {
        return Err(TransferError::Validation("malformed transfer id".into()).into());
    }

    let existed = state.relay.purge(&id).await.map_err(ServerError::from)?;
    if !existed {
        return Err(TransferError::NotFound.into());
    }

    info!(id = %id, "transfer force-deleted by operator");
    Ok((
        StatusCode::OK,
        Json(AdminDeleteResponse {
            id,
            status: "deleted".to_owned(),
        }),
    ))
}
