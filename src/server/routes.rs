//! JSON routes: health, stream listing, supervisor status.

use super::AppContext;
use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use crate::supervisor::ProcessStatus;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        message: "syncwall is up",
    })
}

#[derive(Debug, Serialize)]
pub struct StreamEntry {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct StreamsResponse {
    pub streams: Vec<StreamEntry>,
}

/// List every registered stream with an absolute playlist URL built from the
/// request's Host header.
pub async fn list_streams(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> Json<StreamsResponse> {
    let base = request_base_url(&headers, &ctx);
    let streams = ctx
        .registry
        .iter()
        .map(|s| StreamEntry {
            id: s.name.clone(),
            url: s.url_for(&base),
        })
        .collect();

    Json(StreamsResponse { streams })
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: usize,
    pub processes: Vec<ProcessStatus>,
}

pub async fn supervisor_status(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    let (running, processes) = match &ctx.supervisor {
        Some(supervisor) => (supervisor.running_count(), supervisor.status()),
        None => (0, Vec::new()),
    };
    Json(StatusResponse { running, processes })
}

fn request_base_url(headers: &HeaderMap, ctx: &AppContext) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(|h| h.to_string())
        .unwrap_or_else(|| format!("{}:{}", ctx.config.server.host, ctx.config.server.port));

    format!("{}://{}", scheme, host)
}
