use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use chrono::Utc;
use tracing::{debug, warn};

use super::jwt::token_hash;
use crate::{
    AppState,
    db::{
        sessions::SessionRepository,
        users::{User, UserError, UserRepository},
    },
    routes::error::ApiError,
};

/// Context for authenticated requests.
#[derive(Clone)]
pub struct RequestContext {
    pub user: User,
    pub token_hash: String,
}

/// Resolve the bearer token into a user with a live session.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let bearer = match req.headers().typed_get::<Authorization<Bearer>>() {
        Some(Authorization(token)) => token.token().to_owned(),
        None => return ApiError::unauthorized("Not authenticated").into_response(),
    };

    match authenticate(&state, &bearer).await {
        Ok(ctx) => {
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        Err(error) => error.into_response(),
    }
}

async fn authenticate(state: &AppState, bearer: &str) -> Result<RequestContext, ApiError> {
    let identity = state.jwt().decode_access_token(bearer).map_err(|error| {
        debug!(?error, "failed to decode access token");
        ApiError::invalid_token()
    })?;

    let pool = state.pool();
    let user = match UserRepository::new(pool).find_by_id(identity.user_id).await {
        Ok(user) => user,
        Err(UserError::NotFound) => {
            warn!("user `{}` missing", identity.user_id);
            return Err(ApiError::unauthorized("User not found"));
        }
        Err(error) => return Err(error.into()),
    };

    let hash = token_hash(bearer);
    let sessions = SessionRepository::new(pool);
    let session = sessions
        .find_by_user_and_hash(user.id, &hash)
        .await?
        .ok_or_else(|| {
            debug!(user_id = %user.id, "no session for token");
            ApiError::invalid_token()
        })?;

    if session.is_expired(Utc::now()) {
        debug!(session_id = %session.id, "session expired; deleting");
        if let Err(error) = sessions.delete(session.id).await {
            warn!(?error, "failed to delete expired session");
        }
        return Err(ApiError::invalid_token());
    }

    Ok(RequestContext {
        user,
        token_hash: hash,
    })
}
