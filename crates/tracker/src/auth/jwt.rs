//! Access tokens issued on login and registration.
//!
//! Tokens are HMAC-signed JWTs carrying the user id. A token is only honoured
//! while a session row with its hash exists, see [`super::middleware`].

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtConfig;

const ACCESS_TOKEN_TYPE: &str = "access";

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    TokenExpired,
    #[error("token expiry out of range")]
    ExpiryOutOfRange,
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
    #[serde(rename = "type")]
    pub token_type: String,
}

/// A freshly signed token together with its expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AccessTokenDetails {
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct JwtService {
    secret: Arc<SecretString>,
    algorithm: Algorithm,
    lifetime: Duration,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            secret: Arc::clone(&config.secret),
            algorithm: config.algorithm,
            lifetime: Duration::try_hours(config.expiration_hours).unwrap_or(Duration::MAX),
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn issue_access_token(&self, user_id: Uuid) -> Result<IssuedToken, JwtError> {
        self.issue_at(user_id, Utc::now())
    }

    fn issue_at(&self, user_id: Uuid, issued_at: DateTime<Utc>) -> Result<IssuedToken, JwtError> {
        let expires_at = issued_at
            .checked_add_signed(self.lifetime)
            .ok_or(JwtError::ExpiryOutOfRange)?;
        let claims = AccessTokenClaims {
            sub: user_id,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            token_type: ACCESS_TOKEN_TYPE.to_string(),
        };

        let key = EncodingKey::from_secret(self.secret.expose_secret().as_bytes());
        let token = encode(&Header::new(self.algorithm), &claims, &key)?;

        Ok(IssuedToken { token, expires_at })
    }

    pub fn decode_access_token(&self, token: &str) -> Result<AccessTokenDetails, JwtError> {
        if token.trim().is_empty() {
            return Err(JwtError::InvalidToken);
        }

        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.required_spec_claims =
            HashSet::from(["sub".to_string(), "exp".to_string()]);

        let key = DecodingKey::from_secret(self.secret.expose_secret().as_bytes());
        let data = decode::<AccessTokenClaims>(token, &key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                _ => JwtError::Jwt(e),
            }
        })?;
        let claims = data.claims;

        if claims.token_type != ACCESS_TOKEN_TYPE {
            return Err(JwtError::InvalidToken);
        }

        let expires_at = DateTime::from_timestamp(claims.exp, 0).ok_or(JwtError::InvalidToken)?;

        Ok(AccessTokenDetails {
            user_id: claims.sub,
            expires_at,
        })
    }
}

/// SHA-256 hex digest of a token; sessions store this rather than the token.
pub fn token_hash(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
