//! Background task that deletes expired user sessions.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio::{
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, error, info};

use crate::db::sessions::{SessionError, SessionRepository};

#[derive(Debug, Clone)]
pub struct SessionCleanupConfig {
    pub cleanup_interval: Duration,
}

impl Default for SessionCleanupConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(15 * 60),
        }
    }
}

pub fn spawn_session_cleanup_service(pool: PgPool, config: SessionCleanupConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(config.cleanup_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            match cleanup_expired_sessions(&pool).await {
                Ok(0) => debug!("No expired sessions to clean up"),
                Ok(deleted) => info!(deleted, "Cleaned up expired sessions"),
                Err(e) => error!(error = ?e, "Failed to clean up expired sessions"),
            }
        }
    })
}

pub async fn cleanup_expired_sessions(pool: &PgPool) -> Result<u64, SessionError> {
    SessionRepository::new(pool).delete_expired(Utc::now()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionCleanupConfig::default();
        assert_eq!(config.cleanup_interval.as_secs(), 15 * 60);
    }
}
