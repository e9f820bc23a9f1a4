use std::sync::Arc;

use axum::body::Body;
use axum::http::{self, Request, StatusCode};
use tower::ServiceExt;

use parcel_blob::BlobStore;
use parcel_blob_memory::MemoryBlobStore;
use parcel_core::{UploadLimits, new_transfer_id};
use parcel_crypto::MasterKey;
use parcel_registry::TransferRegistry;
use parcel_registry_memory::MemoryTransferRegistry;
use parcel_relay::RelayBuilder;
use parcel_scanner::MalwareScanner;
use parcel_scanner::testing::StaticScanner;
use parcel_server::api::AppState;
use parcel_server::auth::hash_admin_token;

const BOUNDARY: &str = "parcel-test-boundary";
const ADMIN_TOKEN: &str = "operator-secret";

// -- Helpers --------------------------------------------------------------

fn build_test_state(scanner: StaticScanner, limits: UploadLimits) -> AppState {
    let registry = Arc::new(MemoryTransferRegistry::new());
    let blobs = Arc::new(MemoryBlobStore::new());

    let relay = RelayBuilder::new()
        .registry(registry as Arc<dyn TransferRegistry>)
        .blobs(blobs as Arc<dyn BlobStore>)
        .scanner(Arc::new(scanner) as Arc<dyn MalwareScanner>)
        .master_key(MasterKey::generate())
        .limits(limits)
        .build()
        .expect("relay should build");

    AppState {
        relay: Arc::new(relay),
        admin_token_sha256: Some(hash_admin_token(ADMIN_TOKEN)),
        external_url: "http://parcel.test".to_owned(),
        max_body_bytes: 16 * 1024 * 1024,
    }
}

fn build_app(state: AppState) -> axum::Router {
    parcel_server::api::router(state)
}

fn default_app() -> axum::Router {
    build_app(build_test_state(
        StaticScanner::clean(),
        UploadLimits::default(),
    ))
}

fn multipart_body(filename: &str, contents: &[u8], fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(filename: &str, contents: &[u8], fields: &[(&str, &str)]) -> Request<Body> {
    Request::builder()
        .method(http::Method::POST)
        .uri("/v1/transfers")
        .header(
            http::header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(filename, contents, fields)))
        .unwrap()
}

fn download_request(id: &str, password: Option<&str>) -> Request<Body> {
    let builder = Request::builder()
        .method(http::Method::POST)
        .uri(format!("/v1/transfers/{id}/download"));
    match password {
        Some(pw) => builder
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({ "password": pw }).to_string(),
            ))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn upload_and_get_id(app: &axum::Router, fields: &[(&str, &str)]) -> String {
    let response = app
        .clone()
        .oneshot(upload_request("report.pdf", b"file contents", fields))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    json["id"].as_str().unwrap().to_owned()
}

// -- Tests ----------------------------------------------------------------

#[tokio::test]
async fn health_returns_200() {
    let response = default_app()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["metrics"].is_object());
}

#[tokio::test]
async fn upload_check_download_roundtrip() {
    let app = default_app();

    let response = app
        .clone()
        .oneshot(upload_request(
            "report.pdf",
            b"ten megabyte stand-in",
            &[("ttl_seconds", "86400")],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    let id = json["id"].as_str().unwrap().to_owned();
    assert_eq!(json["filename"], "report.pdf");
    assert_eq!(
        json["url"],
        format!("http://parcel.test/download?id={id}")
    );

    // Check phase: only the protection flag, never the filename.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/v1/transfers/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["protected"], false);
    assert!(json.get("filename").is_none());

    // Download phase: original bytes under the original name.
    let response = app
        .clone()
        .oneshot(download_request(&id, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[http::header::CONTENT_DISPOSITION],
        "attachment; filename=\"report.pdf\""
    );
    assert_eq!(response.headers()["x-remaining-downloads"], "99");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"ten megabyte stand-in");
}

#[tokio::test]
async fn password_flow() {
    let app = default_app();
    let id = upload_and_get_id(&app, &[("password", "p4ss")]).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/v1/transfers/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json["protected"], true);

    // Missing password.
    let response = app
        .clone()
        .oneshot(download_request(&id, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["code"], "password_required");

    // Wrong password.
    let response = app
        .clone()
        .oneshot(download_request(&id, Some("nope")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["code"], "wrong_password");

    // Right password.
    let response = app
        .clone()
        .oneshot(download_request(&id, Some("p4ss")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"file contents");
}

#[tokio::test]
async fn flagged_upload_is_rejected_and_never_registered() {
    let app = build_app(build_test_state(
        StaticScanner::infected("Win.Test.EICAR_HDB-1"),
        UploadLimits::default(),
    ));

    let response = app
        .clone()
        .oneshot(upload_request("eicar.com", b"X5O!P%@AP[4\\PZX54(P^)7CC)7}", &[]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = json_body(response).await;
    assert_eq!(json["code"], "malware_detected");
    assert!(json["error"].as_str().unwrap().contains("Win.Test.EICAR_HDB-1"));

    // Nothing was registered: the admin listing is empty.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/admin/transfers")
                .header("x-admin-token", ADMIN_TOKEN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["total_active"], 0);
}

#[tokio::test]
async fn scanner_outage_maps_to_503() {
    let app = build_app(build_test_state(
        StaticScanner::unavailable("engine down"),
        UploadLimits::default(),
    ));

    let response = app
        .oneshot(upload_request("any.bin", b"bytes", &[]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["code"], "scanner_unavailable");
}

#[tokio::test]
async fn invalid_ttl_is_a_validation_error() {
    let app = default_app();
    let response = app
        .oneshot(upload_request(
            "report.pdf",
            b"bytes",
            &[("ttl_seconds", "12345")],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "validation");
}

#[tokio::test]
async fn oversize_upload_maps_to_413() {
    let app = build_app(build_test_state(
        StaticScanner::clean(),
        UploadLimits {
            max_upload_bytes: 8,
            ..UploadLimits::default()
        },
    ));

    let response = app
        .oneshot(upload_request("big.bin", b"way more than eight bytes", &[]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json_body(response).await["code"], "payload_too_large");
}

#[tokio::test]
async fn unknown_id_maps_to_404_and_malformed_to_400() {
    let app = default_app();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/v1/transfers/{}", new_transfer_id()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["code"], "not_found");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/transfers/not-a-uuid")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn single_use_transfer_is_gone_after_one_download() {
    let app = default_app();
    let id = upload_and_get_id(&app, &[("max_downloads", "1")]).await;

    let response = app
        .clone()
        .oneshot(download_request(&id, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-remaining-downloads"], "0");

    // The consuming request already removed the object; the second
    // attempt is refused either as exhausted or as gone entirely.
    let response = app
        .clone()
        .oneshot(download_request(&id, None))
        .await
        .unwrap();
    assert!(
        matches!(
            response.status(),
            StatusCode::GONE | StatusCode::NOT_FOUND
        ),
        "got {}",
        response.status()
    );
}

#[tokio::test]
async fn bounded_budget_signals_gone_when_exhausted() {
    let app = default_app();
    let id = upload_and_get_id(&app, &[("max_downloads", "2")]).await;

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(download_request(&id, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(download_request(&id, None))
        .await
        .unwrap();
    assert!(matches!(
        response.status(),
        StatusCode::GONE | StatusCode::NOT_FOUND
    ));
}

#[tokio::test]
async fn admin_surface_requires_the_capability() {
    let app = default_app();

    // No token.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/admin/transfers")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Wrong token.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/admin/transfers")
                .header("x-admin-token", "wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_listing_shows_transfers_without_secrets() {
    let app = default_app();
    let id = upload_and_get_id(
        &app,
        &[("password", "hunter2"), ("sender", "alice@example.com")],
    )
    .await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/admin/transfers")
                .header("x-admin-token", ADMIN_TOKEN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["total_active"], 1);
    let entry = &json["transfers"][0];
    assert_eq!(entry["id"], id.as_str());
    assert_eq!(entry["protected"], true);
    assert_eq!(entry["sender"], "alice@example.com");
    assert_eq!(entry["status"], "active");

    let raw = json.to_string();
    assert!(!raw.contains("argon2"), "password hash must never be listed");
    assert!(!raw.contains("ENC["), "key material must never be listed");
}

#[tokio::test]
async fn admin_delete_removes_the_transfer() {
    let app = default_app();
    let id = upload_and_get_id(&app, &[]).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(http::Method::DELETE)
                .uri(format!("/v1/admin/transfers/{id}"))
                .header("x-admin-token", ADMIN_TOKEN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "deleted");

    // The object is gone for everyone.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/v1/transfers/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Deleting it again reports not-found.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(http::Method::DELETE)
                .uri(format!("/v1/admin/transfers/{id}"))
                .header("x-admin-token", ADMIN_TOKEN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn metrics_reflect_rejections() {
    let app = build_app(build_test_state(
        StaticScanner::infected("Sig.Test"),
        UploadLimits::default(),
    ));

    let _ = app
        .clone()
        .oneshot(upload_request("a.bin", b"x", &[]))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["rejected_malware"], 1);
    assert_eq!(json["uploads"], 0);
}

#[tokio::test]
async fn upload_without_file_field_is_rejected() {
    let app = default_app();
    let body = {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"sender\"\r\n\r\nalice\r\n--{BOUNDARY}--\r\n"
            )
            .as_bytes(),
        );
        body
    };
    let response = app
        .oneshot(
            Request::builder()
                .method(http::Method::POST)
                .uri("/v1/transfers")
                .header(
                    http::header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
