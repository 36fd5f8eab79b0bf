use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use profile_backend::config::{AppConfig, StorageBackend};
use profile_backend::storage::{MemoryObjectStore, ObjectStoreHandle};
use profile_backend::{AppState, build_router, db};
use tower::ServiceExt;

async fn build_app() -> Router {
    let mut cfg = AppConfig::default();
    cfg.database.sqlite_path = std::env::temp_dir()
        .join(format!("request_id_{}.db", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .to_string();
    cfg.database.wal = false;
    cfg.storage.backend = StorageBackend::Memory;
    let pool = db::connect_sqlite(&cfg.database).await.expect("connect sqlite");
    db::init_schema(&pool).await.expect("init schema");
    build_router(AppState::new(
        Arc::new(cfg),
        pool,
        ObjectStoreHandle::Memory(MemoryObjectStore::new()),
    ))
}

fn header_request_id(resp: &axum::response::Response) -> String {
    resp.headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

#[tokio::test]
async fn request_id_is_generated_when_missing() {
    let app = build_app().await;
    let resp = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .expect("request /health");

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(header_request_id(&resp).starts_with("req_"));
}

#[tokio::test]
async fn request_id_uses_client_value_when_valid() {
    let app = build_app().await;
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "client.req-001")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("request /health");

    assert_eq!(header_request_id(&resp), "client.req-001");
}

#[tokio::test]
async fn invalid_client_request_id_is_replaced() {
    let app = build_app().await;
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "bad id with spaces")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("request /health");

    let rid = header_request_id(&resp);
    assert_ne!(rid, "bad id with spaces");
    assert!(rid.starts_with("req_"));
}

#[tokio::test]
async fn unauthorized_upload_problem_carries_request_id() {
    let app = build_app().await;
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/page/studentProfilePictureUpload")
                .header("x-request-id", "upload.req-042")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("request upload");

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(header_request_id(&resp), "upload.req-042");

    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json: serde_json::Value = serde_json::from_slice(&body).expect("parse json");
    assert_eq!(json["requestId"], "upload.req-042");
    assert_eq!(json["code"], "UNAUTHORIZED");
}
