use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use crate::{AppState, db};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/favicon.ico", get(favicon))
        .route("/health", get(health))
        .route("/health/ready", get(ready))
        .route("/health/info", get(info))
}

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    pub docs: &'static str,
    pub health: &'static str,
    pub api: &'static str,
    pub timestamp: DateTime<FixedOffset>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<FixedOffset>,
}

#[derive(Debug, Serialize)]
pub struct ReadyChecks {
    pub database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub checks: ReadyChecks,
    pub timestamp: DateTime<FixedOffset>,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub service: String,
    pub version: String,
    pub debug: bool,
    pub timezone: String,
    pub utc_offset: String,
    pub git_commit: &'static str,
    pub build_timestamp: &'static str,
    pub timestamp: DateTime<FixedOffset>,
}

async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    let config = state.config();
    Json(RootResponse {
        message: format!("Welcome to {}", config.app_name),
        version: config.app_version.clone(),
        docs: "/docs",
        health: "/health",
        api: "/api/v1",
        timestamp: state.clock().now(),
    })
}

async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let config = state.config();
    Json(HealthResponse {
        status: "healthy",
        service: config.app_name.clone(),
        version: config.app_version.clone(),
        timestamp: state.clock().now(),
    })
}

async fn ready(State(state): State<AppState>) -> Response {
    let (status, checks) = match db::ping(state.pool()).await {
        Ok(()) => (
            StatusCode::OK,
            ReadyChecks {
                database: "connected",
                database_error: None,
            },
        ),
        Err(error) => {
            warn!(?error, "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ReadyChecks {
                    database: "disconnected",
                    database_error: Some(error.to_string()),
                },
            )
        }
    };

    let body = ReadyResponse {
        status: if status.is_success() { "ready" } else { "not_ready" },
        checks,
        timestamp: state.clock().now(),
    };
    (status, Json(body)).into_response()
}

async fn info(State(state): State<AppState>) -> Response {
    let config = state.config();
    if !config.debug {
        return Json(json!({ "message": "Info endpoint not available in production" }))
            .into_response();
    }

    Json(InfoResponse {
        service: config.app_name.clone(),
        version: config.app_version.clone(),
        debug: config.debug,
        timezone: config.timezone.clone(),
        utc_offset: config.utc_offset.to_string(),
        git_commit: option_env!("TRACKER_GIT_COMMIT").unwrap_or("unknown"),
        build_timestamp: option_env!("TRACKER_BUILD_TIMESTAMP").unwrap_or("unknown"),
        timestamp: state.clock().now(),
    })
    .into_response()
}
