//! HTTP surface tests: health, stream listing, playlist serving, status.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{TestHarness, LIVE_PLAYLIST};
use http_body_util::BodyExt;
use serde_json::Value;
use syncwall::server::create_router;
use tower::ServiceExt;

async fn body_json(body: Body) -> Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let harness = TestHarness::new(2);
    let app = create_router(harness.ctx.clone(), None);

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response.into_body()).await;
    assert_eq!(json["status"], "ok");
    assert!(json["message"].is_string());
}

#[tokio::test]
async fn test_streams_use_request_host() {
    let harness = TestHarness::new(3);
    let app = create_router(harness.ctx.clone(), None);

    let response = app
        .oneshot(
            Request::get("/streams")
                .header(header::HOST, "wall.local:9000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response.into_body()).await;
    let streams = json["streams"].as_array().unwrap();
    assert_eq!(streams.len(), 3);
    assert_eq!(streams[0]["id"], "stream1");
    assert_eq!(
        streams[0]["url"],
        "http://wall.local:9000/hls/stream1/index.m3u8"
    );
    assert_eq!(
        streams[2]["url"],
        "http://wall.local:9000/hls/stream3/index.m3u8"
    );
}

#[tokio::test]
async fn test_streams_honor_forwarded_proto() {
    let harness = TestHarness::new(1);
    let app = create_router(harness.ctx.clone(), None);

    let response = app
        .oneshot(
            Request::get("/streams")
                .header(header::HOST, "wall.example.com")
                .header("x-forwarded-proto", "https")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let json = body_json(response.into_body()).await;
    assert_eq!(
        json["streams"][0]["url"],
        "https://wall.example.com/hls/stream1/index.m3u8"
    );
}

#[tokio::test]
async fn test_empty_registry_lists_nothing() {
    let harness = TestHarness::new(0);
    let app = create_router(harness.ctx.clone(), None);

    let response = app
        .oneshot(Request::get("/streams").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let json = body_json(response.into_body()).await;
    assert!(json["streams"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_playlist_served_from_output_root() {
    let (harness, addr) = TestHarness::with_server(2).await;
    harness.write_output("stream1", "index.m3u8", LIVE_PLAYLIST);

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://{}/hls/stream1/index.m3u8", addr))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), LIVE_PLAYLIST);

    let missing = client
        .get(format!("http://{}/hls/stream2/index.m3u8", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cross_origin_playlist_request() {
    let (harness, addr) = TestHarness::with_server(1).await;
    harness.write_output("stream1", "index.m3u8", LIVE_PLAYLIST);

    let response = reqwest::Client::new()
        .get(format!("http://{}/hls/stream1/index.m3u8", addr))
        .header(reqwest::header::ORIGIN, "http://dashboard.local:5173")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(reqwest::header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn test_status_without_supervisor() {
    let harness = TestHarness::new(2);
    let app = create_router(harness.ctx.clone(), None);

    let response = app
        .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response.into_body()).await;
    assert_eq!(json["running"], 0);
    assert!(json["processes"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_dashboard_reads_stream_listing() {
    let (_harness, addr) = TestHarness::with_server(2).await;

    let client = reqwest::Client::new();
    let streams = syncwall::dashboard::fetch_streams(&client, &format!("http://{}/", addr))
        .await
        .unwrap();

    assert_eq!(streams.len(), 2);
    assert_eq!(streams[1].id, "stream2");
    assert_eq!(
        streams[1].url,
        format!("http://{}/hls/stream2/index.m3u8", addr)
    );
}
