//! Session and rate-limit behaviour through the full router.
//!
//! # Running
//! ```bash
//! DATABASE_URL=postgres://... cargo test -p tracker --test session_routes_e2e
//! ```
//!
//! Tests are skipped if DATABASE_URL is not set.

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sqlx::PgPool;
use tower::ServiceExt;
use tracker::{AppState, auth::token_hash, config::TrackerConfig, db, routes};
use uuid::Uuid;

const RATE_LIMIT: u32 = 3;

fn database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

/// Skip test if database is not available.
macro_rules! skip_without_db {
    () => {
        if database_url().is_none() {
            eprintln!("Skipping test: DATABASE_URL not set");
            return;
        }
    };
}

async fn setup() -> (Router, PgPool) {
    let url = database_url().expect("DATABASE_URL must be set");
    let config = TrackerConfig::from_lookup(|key| match key {
        "DATABASE_URL" => Some(url.clone()),
        "JWT_SECRET_KEY" => Some("session-routes-secret".to_string()),
        "RATE_LIMIT_PER_MINUTE" => Some(RATE_LIMIT.to_string()),
        _ => None,
    })
    .unwrap();

    let pool = PgPool::connect(&url)
        .await
        .expect("Failed to connect to database");
    db::migrate(&pool).await.expect("Failed to run migrations");

    (routes::router(AppState::new(pool.clone(), config)), pool)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

fn authed(method: Method, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

/// Register a fresh user over HTTP and return the issued access token.
async fn register(app: &Router) -> String {
    let payload = json!({
        "name": "Route Tester",
        "email": format!("routes-{}@example.com", Uuid::new_v4().simple()),
        "password": "MySecurePass123",
    });
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();

    let (status, _, body) = send(app, request).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["token"]["access_token"].as_str().unwrap().to_string()
}

async fn session_exists(pool: &PgPool, token: &str) -> bool {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM user_sessions WHERE token_hash = $1)",
    )
    .bind(token_hash(token))
    .fetch_one(pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn logged_out_token_is_rejected() {
    skip_without_db!();
    let (app, pool) = setup().await;
    let token = register(&app).await;

    let (status, _, body) = send(&app, authed(Method::GET, "/api/v1/auth/verify", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Token is valid");

    let (status, _, _) = send(&app, authed(Method::POST, "/api/v1/auth/logout", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!session_exists(&pool, &token).await);

    let (status, headers, body) =
        send(&app, authed(Method::GET, "/api/v1/auth/verify", &token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "AUTH_ERROR");
    assert_eq!(headers[header::WWW_AUTHENTICATE], "Bearer");
}

#[tokio::test]
async fn expired_session_is_rejected_and_deleted() {
    skip_without_db!();
    let (app, pool) = setup().await;
    let token = register(&app).await;

    // The JWT itself stays valid; only the session row has lapsed.
    sqlx::query(
        "UPDATE user_sessions SET expires_at = NOW() - INTERVAL '1 minute' WHERE token_hash = $1",
    )
    .bind(token_hash(&token))
    .execute(&pool)
    .await
    .unwrap();
    assert!(session_exists(&pool, &token).await);

    let (status, _, body) = send(&app, authed(Method::GET, "/api/v1/auth/me", &token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "AUTH_ERROR");
    assert!(!session_exists(&pool, &token).await);
}

#[tokio::test]
async fn requests_over_the_limit_get_429() {
    skip_without_db!();
    let (app, _pool) = setup().await;
    let token = register(&app).await;

    for expected_remaining in (0..RATE_LIMIT).rev() {
        let (status, headers, _) =
            send(&app, authed(Method::GET, "/api/v1/auth/verify", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["x-ratelimit-limit"], RATE_LIMIT.to_string().as_str());
        assert_eq!(
            headers["x-ratelimit-remaining"],
            expected_remaining.to_string().as_str()
        );
    }

    let (status, headers, body) =
        send(&app, authed(Method::GET, "/api/v1/auth/verify", &token)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "RATE_LIMITED");
    assert_eq!(headers["x-ratelimit-remaining"], "0");
    assert!(headers.contains_key(header::RETRY_AFTER));
    assert!(headers.contains_key("x-ratelimit-reset"));
}
