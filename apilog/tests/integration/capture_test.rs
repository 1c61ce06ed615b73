//! サンプルAPI経由のキャプチャ検証

use std::sync::Arc;

use apilog::api;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::Value;

use crate::support::{body_bytes, send, state_with_sink, MemorySink};

#[tokio::test]
async fn post_json_is_recorded_exactly() {
    let sink = Arc::new(MemorySink::default());
    let state = state_with_sink(sink.clone(), 100);
    let writer = state.traffic_logger.writer().clone();
    let app = api::create_app(state);

    let res = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/echo")
            .header(header::HOST, "api.example.com")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-request-source", "integration")
            .body(Body::from(r#"{"a":1}"#))
            .unwrap(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(&body_bytes(res).await[..], br#"{"a":1}"#);

    writer.shutdown().await;
    let entries = sink.entries().await;
    assert_eq!(entries.len(), 1);

    let entry = &entries[0];
    assert_eq!(entry.request_content_body.as_deref(), Some(r#"{"a":1}"#));
    assert_eq!(entry.request_content_type.as_deref(), Some("application/json"));
    assert_eq!(entry.request_uri, "http://api.example.com/api/echo");
    assert_eq!(entry.request_route_template.as_deref(), Some("/api/echo"));
    assert_eq!(
        entry.request_headers.get("x-request-source").map(String::as_str),
        Some("integration")
    );
    assert_eq!(entry.response_status_code, 200);
    assert_eq!(entry.response_content_body.as_deref(), Some(r#"{"a":1}"#));
    assert!(entry.response_timestamp >= entry.request_timestamp);
}

#[tokio::test]
async fn not_found_item_is_recorded_with_status_and_body() {
    let sink = Arc::new(MemorySink::default());
    let state = state_with_sink(sink.clone(), 100);
    let writer = state.traffic_logger.writer().clone();
    let app = api::create_app(state);

    let res = send(
        &app,
        Request::builder()
            .uri("/api/items/0")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = serde_json::from_slice(&body_bytes(res).await).unwrap();
    assert_eq!(body["error"], "item 0 not found");

    writer.shutdown().await;
    let entries = sink.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].response_status_code, 404);
    assert_eq!(
        entries[0].request_route_data.as_ref().unwrap().get("id").map(String::as_str),
        Some("0")
    );
    let recorded: Value =
        serde_json::from_str(entries[0].response_content_body.as_deref().unwrap()).unwrap();
    assert_eq!(recorded, body);
}

#[tokio::test]
async fn health_is_excluded_by_default() {
    let sink = Arc::new(MemorySink::default());
    let state = state_with_sink(sink.clone(), 100);
    let writer = state.traffic_logger.writer().clone();
    let app = api::create_app(state);

    let res = send(
        &app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(&body_bytes(res).await[..], b"OK");

    writer.shutdown().await;
    assert!(sink.rows().await.is_empty());
}

#[tokio::test]
async fn binary_echo_is_byte_identical() {
    let sink = Arc::new(MemorySink::default());
    let state = state_with_sink(sink.clone(), 100);
    let writer = state.traffic_logger.writer().clone();
    let app = api::create_app(state);

    let payload: Vec<u8> = (0..=255u8).collect();
    let res = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/echo")
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(Body::from(payload.clone()))
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(&body_bytes(res).await[..], &payload[..]);

    writer.shutdown().await;
    let entries = sink.entries().await;
    assert_eq!(
        entries[0].request_content_type.as_deref(),
        Some("application/octet-stream")
    );
    assert!(entries[0].request_content_body.is_none());
    assert!(entries[0].response_content_body.is_none());
}

#[tokio::test]
async fn stats_endpoint_reports_writer_counters() {
    let sink = Arc::new(MemorySink::default());
    let state = state_with_sink(sink.clone(), 100);
    let app = api::create_app(state);

    for id in 1..=3 {
        let res = send(
            &app,
            Request::builder()
                .uri(format!("/api/items/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    let mut persisted = 0;
    for _ in 0..100 {
        let res = send(
            &app,
            Request::builder()
                .uri("/api/traffic/stats")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        let stats: Value = serde_json::from_slice(&body_bytes(res).await).unwrap();
        persisted = stats["persisted"].as_u64().unwrap();
        if persisted >= 3 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(persisted >= 3, "three item requests should be persisted");
    assert!(sink.rows().await.len() as u64 >= persisted);
}
