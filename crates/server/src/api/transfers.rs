use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use parcel_relay::UploadRequest;

use crate::error::ServerError;

use super::AppState;
use super::schemas::{CheckResponse, DownloadRequest, ErrorResponse, UploadForm, UploadResponse};

/// Downloads left after this response, when the budget is bounded.
static REMAINING_DOWNLOADS: HeaderName = HeaderName::from_static("x-remaining-downloads");

/// `POST /v1/transfers` -- ingest an upload.
///
/// Multipart fields: `file` (required, filename taken from the part),
/// `ttl_seconds`, `password`, `sender`, `max_downloads`.
#[utoipa::path(
    post,
    path = "/v1/transfers",
    tag = "Transfers",
    summary = "Upload a file",
    description = "Scans, encrypts, and stores a file; returns the opaque id and retrieval link.",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Stored", body = UploadResponse),
        (status = 400, description = "Invalid field or TTL", body = ErrorResponse),
        (status = 413, description = "Payload exceeds the size limit", body = ErrorResponse),
        (status = 422, description = "Malware detected", body = ErrorResponse),
        (status = 503, description = "Scanner or storage unavailable", body = ErrorResponse)
    )
)]
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ServerError> {
    let mut filename: Option<String> = None;
    let mut data: Option<Bytes> = None;
    let mut ttl_seconds: Option<u64> = None;
    let mut password: Option<String> = None;
    let mut sender: Option<String> = None;
    let mut max_downloads: Option<u32> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().map(ToOwned::to_owned);
        match name.as_deref() {
            Some("file") => {
                filename = field.file_name().map(ToOwned::to_owned);
                data = Some(field.bytes().await.map_err(|e| {
                    ServerError::BadRequest(format!("failed to read file field: {e}"))
                })?);
            }
            Some("ttl_seconds") => {
                let text = read_text(field).await?;
                ttl_seconds = Some(text.trim().parse().map_err(|_| {
                    ServerError::BadRequest("ttl_seconds must be an integer".into())
                })?);
            }
            Some("password") => password = Some(read_text(field).await?),
            Some("sender") => sender = Some(read_text(field).await?),
            Some("max_downloads") => {
                let text = read_text(field).await?;
                max_downloads = Some(text.trim().parse().map_err(|_| {
                    ServerError::BadRequest("max_downloads must be an integer".into())
                })?);
            }
            _ => {}
        }
    }

    let data = data.ok_or_else(|| ServerError::BadRequest("missing file field".into()))?;
    let filename =
        filename.ok_or_else(|| ServerError::BadRequest("file field must carry a filename".into()))?;

    let receipt = state
        .relay
        .upload(UploadRequest {
            filename,
            data,
            ttl_seconds,
            password,
            sender,
            max_downloads,
        })
        .await?;

    let url = format!(
        "{}/download?id={}",
        state.external_url.trim_end_matches('/'),
        receipt.id
    );
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            id: receipt.id,
            filename: receipt.filename,
            url,
            expires_at: receipt.expires_at,
        }),
    ))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ServerError> {
    field
        .text()
        .await
        .map_err(|e| ServerError::BadRequest(format!("failed to read multipart field: {e}")))
}

/// `GET /v1/transfers/{id}` -- the check phase.
///
/// Discloses only whether the object exists (status 200 vs 404) and
/// whether it is password-protected. Filename and size stay hidden
/// until a download succeeds.
#[utoipa::path(
    get,
    path = "/v1/transfers/{id}",
    tag = "Transfers",
    summary = "Check a transfer",
    description = "Reports whether the transfer exists and whether a password is required.",
    params(("id" = String, Path, description = "Transfer id")),
    responses(
        (status = 200, description = "Transfer exists", body = CheckResponse),
        (status = 404, description = "Absent or expired", body = ErrorResponse)
    )
)]
pub async fn check(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let status = state.relay.check(&id).await?;
    Ok(Json(CheckResponse {
        protected: status.protected,
    }))
}

/// `POST /v1/transfers/{id}/download` -- the download phase.
///
/// Re-validates expiry and budget, verifies the password before any
/// decryption work, and returns the original bytes with the original
/// filename.
#[utoipa::path(
    post,
    path = "/v1/transfers/{id}/download",
    tag = "Transfers",
    summary = "Download a transfer",
    description = "Returns the decrypted payload as an attachment, consuming one download slot.",
    params(("id" = String, Path, description = "Transfer id")),
    request_body(content = DownloadRequest, description = "Password, when the transfer is protected"),
    responses(
        (status = 200, description = "Decrypted payload served as an attachment"),
        (status = 401, description = "Password required", body = ErrorResponse),
        (status = 403, description = "Wrong password", body = ErrorResponse),
        (status = 404, description = "Absent or expired", body = ErrorResponse),
        (status = 410, description = "Download budget consumed", body = ErrorResponse),
        (status = 500, description = "Stored payload failed integrity verification", body = ErrorResponse)
    )
)]
pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<DownloadRequest>>,
) -> Result<Response, ServerError> {
    let password = body.and_then(|Json(request)| request.password);
    let payload = state.relay.download(&id, password.as_deref()).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(CONTENT_DISPOSITION, content_disposition(&payload.filename));
    if let Some(remaining) = payload.remaining_downloads
        && let Ok(value) = HeaderValue::from_str(&remaining.to_string())
    {
        headers.insert(REMAINING_DOWNLOADS.clone(), value);
    }

    Ok((headers, payload.data).into_response())
}

/// Build an attachment header for a verbatim-stored filename.
///
/// Quotes and control characters are replaced so the stored name cannot
/// break out of the quoted-string; anything a header cannot carry falls
/// back to a fixed name.
fn content_disposition(filename: &str) -> HeaderValue {
    let sanitized: String = filename
        .chars()
        .map(|c| {
            if c == '"' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    HeaderValue::from_str(&format!("attachment; filename=\"{sanitized}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=\"download\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_disposition_plain_name() {
        let value = content_disposition("report.pdf");
        assert_eq!(value.to_str().unwrap(), "attachment; filename=\"report.pdf\"");
    }

    #[test]
    fn content_disposition_escapes_quotes() {
        let value = content_disposition("we\"ird.bin");
        assert_eq!(value.to_str().unwrap(), "attachment; filename=\"we_ird.bin\"");
    }

    #[test]
    fn content_disposition_replaces_control_characters() {
        let value = content_disposition("line\nbreak.bin");
        assert_eq!(
            value.to_str().unwrap(),
            "attachment; filename=\"line_break.bin\""
        );
    }
}
