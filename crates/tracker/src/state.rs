use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    auth::{JwtService, RateLimiter},
    clock::Clock,
    config::TrackerConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<TrackerConfig>,
    pub jwt: Arc<JwtService>,
    pub clock: Clock,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(pool: PgPool, config: TrackerConfig) -> Self {
        let jwt = Arc::new(JwtService::new(&config.jwt));
        let clock = config.clock();
        let rate_limiter = RateLimiter::new(config.rate_limit_per_minute);
        Self {
            pool,
            config: Arc::new(config),
            jwt,
            clock,
            rate_limiter,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn jwt(&self) -> Arc<JwtService> {
        Arc::clone(&self.jwt)
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }
}
