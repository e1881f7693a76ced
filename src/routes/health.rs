use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::metrics::Metrics;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/info", get(info))
        .route("/metrics/prometheus", get(metrics_prometheus))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    timestamp: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthInfoResponse {
    service: &'static str,
    version: String,
    uptime: u64,
}

async fn root(State(state): State<AppState>) -> Response {
    let ok = state.proxy().ping().await.is_ok();

    let response = HealthResponse {
        status: if ok { "ok" } else { "degraded" },
        database: if ok { "connected" } else { "disconnected" },
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    };

    let status_code = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(response)).into_response()
}

async fn info(State(state): State<AppState>) -> Response {
    let response = HealthInfoResponse {
        service: "drillflow-backend",
        version: std::env::var("APP_VERSION")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
        uptime: state.uptime_seconds(),
    };

    Json(response).into_response()
}

async fn metrics_prometheus(State(state): State<AppState>) -> Response {
    let metrics = Metrics::global();
    let mut lines: Vec<String> = Vec::new();

    add_metric(
        &mut lines,
        "process_uptime_seconds",
        "Process uptime in seconds",
        "gauge",
        state.uptime_seconds() as f64,
    );
    add_metric(
        &mut lines,
        "recommendation_requests_created_total",
        "Recommendation requests created",
        "counter",
        metrics.requests_created() as f64,
    );
    add_metric(
        &mut lines,
        "recommendations_computed_total",
        "Recommendation lists computed",
        "counter",
        metrics.recommendations_computed() as f64,
    );
    add_metric(
        &mut lines,
        "recommendations_served_total",
        "Recommendation results served",
        "counter",
        metrics.recommendations_served() as f64,
    );
    add_metric(
        &mut lines,
        "attempts_recorded_total",
        "Practice attempts recorded",
        "counter",
        metrics.attempts_recorded() as f64,
    );

    let body = lines.join("\n") + "\n";
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

fn add_metric(lines: &mut Vec<String>, name: &str, help: &str, kind: &str, value: f64) {
    lines.push(format!("# HELP {name} {help}"));
    lines.push(format!("# TYPE {name} {kind}"));
    lines.push(format!("{name} {value}"));
}
