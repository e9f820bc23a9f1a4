use utoipa::OpenApi;

use super::schemas;
use super::{admin, health, transfers};

/// OpenAPI document for the Parcel HTTP surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Parcel",
        description = "Ephemeral encrypted file relay: scanned on ingest, encrypted at rest, \
                       gone after its lifetime or download budget."
    ),
    paths(
        health::health,
        health::metrics,
        transfers::upload,
        transfers::check,
        transfers::download,
        admin::list_transfers,
        admin::delete_transfer,
    ),
    components(schemas(
        schemas::UploadResponse,
        schemas::UploadForm,
        schemas::CheckResponse,
        schemas::DownloadRequest,
        schemas::TransferSummaryBody,
        schemas::AdminListResponse,
        schemas::AdminDeleteResponse,
        schemas::HealthResponse,
        schemas::MetricsResponse,
        schemas::ErrorResponse,
    )),
    tags(
        (name = "Transfers", description = "Upload, check, and download"),
        (name = "Admin", description = "Operator listing and forced deletion"),
        (name = "Health", description = "Service status and counters")
    )
)]
pub struct ApiDoc;
