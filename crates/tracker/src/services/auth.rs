use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        IssuedToken, JwtError, JwtService, PasswordHashError, hash_password, token_hash,
        validate_email, validate_name, validate_password, verify_password,
    },
    db::{
        sessions::{SessionError, SessionRepository},
        users::{User, UserError, UserRepository},
    },
};

#[derive(Debug, Error)]
pub enum AuthServiceError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("Email already registered")]
    EmailExists,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),
    #[error(transparent)]
    Token(#[from] JwtError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// A user together with the token just issued for them.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub user: User,
    pub token: IssuedToken,
}

pub struct AuthService<'a> {
    pool: &'a PgPool,
    jwt: &'a JwtService,
}

impl<'a> AuthService<'a> {
    pub fn new(pool: &'a PgPool, jwt: &'a JwtService) -> Self {
        Self { pool, jwt }
    }

    #[instrument(name = "auth.register", skip_all)]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthOutcome, AuthServiceError> {
        let name = validate_name(name).map_err(AuthServiceError::Validation)?;
        let email = validate_email(email).map_err(AuthServiceError::Validation)?;
        validate_password(password).map_err(AuthServiceError::Validation)?;

        let users = UserRepository::new(self.pool);
        if users.find_by_email(&email).await?.is_some() {
            return Err(AuthServiceError::EmailExists);
        }

        let password_hash = hash_password(password)?;
        let user = match users.create(&name, &email, &password_hash).await {
            Ok(user) => user,
            Err(UserError::EmailExists) => return Err(AuthServiceError::EmailExists),
            Err(e) => return Err(e.into()),
        };

        let token = self.open_session(user.id).await?;
        info!(user_id = %user.id, "user registered");
        Ok(AuthOutcome { user, token })
    }

    #[instrument(name = "auth.login", skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthOutcome, AuthServiceError> {
        let email = validate_email(email).map_err(AuthServiceError::Validation)?;
        if password.is_empty() {
            return Err(AuthServiceError::Validation("Password is required"));
        }

        let user = UserRepository::new(self.pool)
            .find_by_email(&email)
            .await?
            .filter(|user| verify_password(password, &user.password_hash));

        let Some(user) = user else {
            warn!("login rejected");
            return Err(AuthServiceError::InvalidCredentials);
        };

        let token = self.open_session(user.id).await?;
        info!(user_id = %user.id, "user logged in");
        Ok(AuthOutcome { user, token })
    }

    /// Remove the session behind `token_hash`. Logging out twice is not an error.
    pub async fn logout(&self, user_id: Uuid, token_hash: &str) -> Result<(), AuthServiceError> {
        let removed = SessionRepository::new(self.pool)
            .delete_by_user_and_hash(user_id, token_hash)
            .await?;
        info!(%user_id, removed, "user logged out");
        Ok(())
    }

    async fn open_session(&self, user_id: Uuid) -> Result<IssuedToken, AuthServiceError> {
        let token = self.jwt.issue_access_token(user_id)?;
        SessionRepository::new(self.pool)
            .create(user_id, &token_hash(&token.token), token.expires_at)
            .await?;
        Ok(token)
    }
}

/// Seconds from `now` until `expires_at`, never negative.
pub fn expires_in_secs(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (expires_at - now).num_seconds().max(0)
}
