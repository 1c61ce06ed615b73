//! 並行リクエスト下での相関IDとエントリ分離の検証

use std::collections::HashSet;
use std::sync::Arc;

use apilog::api;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use futures::future::join_all;

use crate::support::{body_bytes, send, state_with_sink, MemorySink};

const REQUESTS: usize = 10_000;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reference_ids_are_unique_across_concurrent_requests() {
    let sink = Arc::new(MemorySink::default());
    let state = state_with_sink(sink.clone(), REQUESTS * 2);
    let writer = state.traffic_logger.writer().clone();
    let app = api::create_app(state);

    let tasks = (0..REQUESTS).map(|i| {
        let app = app.clone();
        tokio::spawn(async move {
            let res = send(
                &app,
                Request::builder()
                    .uri(format!("/api/items/{}", i + 1))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            res.status()
        })
    });
    for status in join_all(tasks).await {
        assert_eq!(status.unwrap(), StatusCode::OK);
    }

    writer.shutdown().await;

    let rows = sink.rows().await;
    assert_eq!(rows.len(), REQUESTS);
    let ids: HashSet<_> = rows.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids.len(), REQUESTS, "referenceId must be pairwise distinct");
    assert_eq!(writer.stats().snapshot().dropped, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_entries_do_not_mix_bodies() {
    let sink = Arc::new(MemorySink::default());
    let state = state_with_sink(sink.clone(), 1_000);
    let writer = state.traffic_logger.writer().clone();
    let app = api::create_app(state);

    let tasks = (0..200).map(|i| {
        let app = app.clone();
        tokio::spawn(async move {
            let payload = format!(r#"{{"n":{}}}"#, i);
            let res = send(
                &app,
                Request::builder()
                    .method("POST")
                    .uri("/api/echo")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.clone()))
                    .unwrap(),
            )
            .await;
            assert_eq!(body_bytes(res).await, payload.as_bytes());
        })
    });
    for task in join_all(tasks).await {
        task.unwrap();
    }

    writer.shutdown().await;

    let entries = sink.entries().await;
    assert_eq!(entries.len(), 200);
    for entry in entries {
        assert_eq!(entry.request_content_body, entry.response_content_body);
    }
}
