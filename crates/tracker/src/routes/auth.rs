use axum::{
    Json, Router,
    extract::{Extension, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use super::{
    MessageResponse,
    error::ApiError,
    extract::{ValidForm, ValidJson},
};
use crate::{
    AppState,
    auth::RequestContext,
    db::users::User,
    services::{AuthOutcome, AuthService, auth::expires_in_secs},
};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/login/form", post(login_form))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/auth/verify", get(verify))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// OAuth2 password-grant style form; `username` carries the email.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: &'static str,
    pub user: UserResponse,
    pub token: TokenResponse,
}

impl AuthResponse {
    fn new(outcome: AuthOutcome, message: &'static str) -> Self {
        Self {
            success: true,
            message,
            token: TokenResponse {
                expires_in: expires_in_secs(outcome.token.expires_at, Utc::now()),
                access_token: outcome.token.token,
                token_type: "bearer",
            },
            user: outcome.user.into(),
        }
    }
}

#[instrument(name = "auth.register_handler", skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<RegisterRequest>,
) -> Result<Response, ApiError> {
    let jwt = state.jwt();
    let outcome = AuthService::new(state.pool(), &jwt)
        .register(&payload.name, &payload.email, &payload.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse::new(outcome, "User registered successfully")),
    )
        .into_response())
}

async fn login(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    authenticate(&state, &payload.email, &payload.password).await
}

async fn login_form(
    State(state): State<AppState>,
    ValidForm(form): ValidForm<LoginForm>,
) -> Result<Json<AuthResponse>, ApiError> {
    authenticate(&state, &form.username, &form.password).await
}

async fn authenticate(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<Json<AuthResponse>, ApiError> {
    let jwt = state.jwt();
    let outcome = AuthService::new(state.pool(), &jwt)
        .login(email, password)
        .await?;
    Ok(Json(AuthResponse::new(outcome, "Login successful")))
}

#[instrument(name = "auth.logout", skip(state, ctx), fields(user_id = %ctx.user.id))]
async fn logout(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<MessageResponse>, ApiError> {
    let jwt = state.jwt();
    AuthService::new(state.pool(), &jwt)
        .logout(ctx.user.id, &ctx.token_hash)
        .await?;
    Ok(Json(MessageResponse::ok("Logged out successfully")))
}

async fn me(Extension(ctx): Extension<RequestContext>) -> Json<UserResponse> {
    Json(ctx.user.into())
}

async fn verify(Extension(_ctx): Extension<RequestContext>) -> Json<MessageResponse> {
    Json(MessageResponse::ok("Token is valid"))
}
