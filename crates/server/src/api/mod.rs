pub mod admin;
pub mod health;
pub mod openapi;
pub mod schemas;
pub mod transfers;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use parcel_relay::Relay;

use self::openapi::ApiDoc;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The relay instance.
    pub relay: Arc<Relay>,
    /// SHA-256 digest of the operator token (None disables the admin
    /// surface).
    pub admin_token_sha256: Option<String>,
    /// External URL for building retrieval links.
    pub external_url: String,
    /// Request body cap; sized above the payload limit so multipart
    /// framing never trips it before the relay's own size check does.
    pub max_body_bytes: usize,
}

/// Build the Axum router with all API routes, middleware, and Swagger UI.
pub fn router(state: AppState) -> Router {
    let max_body_bytes = state.max_body_bytes;
    Router::new()
        // Health & metrics
        .route("/health", get(health::health))
        .route("/metrics", get(health::metrics))
        // Transfers
        .route("/v1/transfers", post(transfers::upload))
        .route("/v1/transfers/{id}", get(transfers::check))
        .route("/v1/transfers/{id}/download", post(transfers::download))
        // Admin
        .route("/v1/admin/transfers", get(admin::list_transfers))
        .route("/v1/admin/transfers/{id}", delete(admin::delete_transfer))
        .with_state(state)
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
