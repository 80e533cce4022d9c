use std::time::Duration;

use axum::{
    Router,
    http::{HeaderValue, Method, Request, header, header::HeaderName},
    middleware,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::{DefaultOnFailure, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, field, warn};

use crate::{
    AppState,
    auth::{enforce_rate_limit, require_session},
    config::TrackerConfig,
};

mod auth;
mod batches;
pub mod error;
pub mod extract;
mod health;
mod operations;
mod security_headers;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
}

impl MessageResponse {
    pub fn ok(message: &'static str) -> Self {
        Self {
            success: true,
            message,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            let request_id = request
                .extensions()
                .get::<RequestId>()
                .and_then(|id| id.header_value().to_str().ok());
            let span = tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = field::Empty
            );
            if let Some(request_id) = request_id {
                span.record("request_id", field::display(request_id));
            }
            span
        })
        .on_response(DefaultOnResponse::new().level(Level::INFO))
        .on_failure(DefaultOnFailure::new().level(Level::ERROR));

    let v1_public = Router::<AppState>::new().merge(auth::public_router());

    let v1_protected = Router::<AppState>::new()
        .merge(auth::protected_router())
        .merge(operations::router())
        .merge(batches::router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            enforce_rate_limit,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    Router::<AppState>::new()
        .merge(health::router())
        .nest("/api/v1", v1_public)
        .nest("/api/v1", v1_protected)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers::process_time,
        ))
        .layer(cors_layer(state.config()))
        .layer(middleware::from_fn(security_headers::security_headers))
        .layer(trace_layer)
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
            REQUEST_ID_HEADER,
        )))
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static(REQUEST_ID_HEADER),
            MakeRequestUuid {},
        ))
        .with_state(state)
}

fn cors_layer(config: &TrackerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins()
        .into_iter()
        .filter_map(|origin| match HeaderValue::from_str(&origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCEPT,
            header::ACCEPT_LANGUAGE,
            header::CONTENT_TYPE,
            header::CONTENT_LANGUAGE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .expose_headers([
            HeaderName::from_static(REQUEST_ID_HEADER),
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderName::from_static("x-ratelimit-remaining"),
            HeaderName::from_static("x-ratelimit-reset"),
        ])
        .max_age(Duration::from_secs(3600))
}

async fn not_found() -> Response {
    error::ApiError::NotFound("Resource not found".to_string()).into_response()
}
