//! SQLiteストアへの永続化と障害分離の検証

use std::sync::Arc;

use apilog::api;
use apilog::config::{CaptureConfig, TrafficLogConfig};
use apilog::traffic::serializer::parse_entry;
use apilog::AppState;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};

use crate::support::{body_bytes, create_test_db, send, state_with_sink, writer_config, FailingSink};

#[tokio::test]
async fn entry_is_written_to_logs_table() {
    let (pool, _dir) = create_test_db().await;
    let state = AppState::new(
        pool.clone(),
        TrafficLogConfig {
            database_url: String::new(),
            capture: CaptureConfig {
                application: "OrdersAPI".to_string(),
                ..CaptureConfig::default()
            },
            writer: writer_config(100),
        },
    );
    let writer = state.traffic_logger.writer().clone();
    let app = api::create_app(state);

    let res = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/echo")
            .header(header::CONTENT_TYPE, "text/plain")
            .header("x-forwarded-for", "198.51.100.23")
            .body(Body::from("hello"))
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    writer.shutdown().await;

    let rows: Vec<(String, String, String)> =
        sqlx::query_as("SELECT LogContent, ReferenceId, CreationDate FROM logs")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(rows.len(), 1);

    let (content, reference_id, creation_date) = &rows[0];
    let entry = parse_entry(content).unwrap();
    assert_eq!(&entry.reference_id.to_string(), reference_id);
    assert_eq!(entry.application, "OrdersAPI");
    assert_eq!(entry.request_ip_address.as_deref(), Some("198.51.100.23"));
    assert_eq!(entry.request_content_body.as_deref(), Some("hello"));
    assert!(chrono::DateTime::parse_from_rfc3339(creation_date).is_ok());

    let json: serde_json::Value = serde_json::from_str(content).unwrap();
    assert!(json.get("referenceId").is_some());
    assert!(json.get("responseStatusCode").is_some());
    assert!(json.get("user").is_none(), "unset fields are omitted");
}

#[tokio::test]
async fn store_failure_is_isolated_from_caller() {
    let state = state_with_sink(Arc::new(FailingSink), 100);
    let writer = state.traffic_logger.writer().clone();
    let app = api::create_app(state);

    let res = send(
        &app,
        Request::builder()
            .uri("/api/items/5")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(
        &body_bytes(res).await[..],
        br#"{"id":5,"name":"item-5"}"#
    );

    writer.shutdown().await;
    let stats = writer.stats().snapshot();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.persisted, 0);
}

#[tokio::test]
async fn closed_pool_is_reported_as_failure() {
    let (pool, _dir) = create_test_db().await;
    let state = AppState::new(
        pool.clone(),
        TrafficLogConfig {
            database_url: String::new(),
            capture: CaptureConfig::default(),
            writer: writer_config(100),
        },
    );
    let writer = state.traffic_logger.writer().clone();
    let app = api::create_app(state);
    pool.close().await;

    let res = send(
        &app,
        Request::builder()
            .uri("/api/items/9")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);

    writer.shutdown().await;
    assert_eq!(writer.stats().snapshot().failed, 1);
}
