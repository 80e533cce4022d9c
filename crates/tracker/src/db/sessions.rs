use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl UserSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub struct SessionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SessionRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<UserSession, SessionError> {
        let session = sqlx::query_as::<_, UserSession>(
            r#"
            INSERT INTO user_sessions (id, user_id, token_hash, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, token_hash, expires_at, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(self.pool)
        .await?;

        Ok(session)
    }

    pub async fn find_by_user_and_hash(
        &self,
        user_id: Uuid,
        token_hash: &str,
    ) -> Result<Option<UserSession>, SessionError> {
        let session = sqlx::query_as::<_, UserSession>(
            r#"
            SELECT id, user_id, token_hash, expires_at, created_at
            FROM user_sessions
            WHERE user_id = $1 AND token_hash = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;

        Ok(session)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), SessionError> {
        sqlx::query("DELETE FROM user_sessions WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Returns the number of sessions removed.
    pub async fn delete_by_user_and_hash(
        &self,
        user_id: Uuid,
        token_hash: &str,
    ) -> Result<u64, SessionError> {
        let result =
            sqlx::query("DELETE FROM user_sessions WHERE user_id = $1 AND token_hash = $2")
                .bind(user_id)
                .bind(token_hash)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, SessionError> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
