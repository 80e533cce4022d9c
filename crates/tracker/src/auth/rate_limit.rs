//! Per-user request budget over a sliding one-minute window.

use std::{
    collections::VecDeque,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    body::Body,
    extract::{Extension, State},
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tracing::warn;
use uuid::Uuid;

use super::RequestContext;
use crate::{AppState, routes::error::ApiError};

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after_secs: u64,
}

impl RateLimitDecision {
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert("x-ratelimit-limit", HeaderValue::from(self.limit));
        headers.insert("x-ratelimit-remaining", HeaderValue::from(self.remaining));
        headers.insert("x-ratelimit-reset", HeaderValue::from(self.reset_after_secs));
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    limit: u32,
    hits: Arc<DashMap<Uuid, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(limit_per_minute: u32) -> Self {
        Self {
            limit: limit_per_minute.max(1),
            hits: Arc::new(DashMap::new()),
        }
    }

    pub fn check(&self, user_id: Uuid) -> RateLimitDecision {
        self.check_at(user_id, Instant::now())
    }

    fn check_at(&self, user_id: Uuid, now: Instant) -> RateLimitDecision {
        let mut entry = self.hits.entry(user_id).or_default();
        let window = entry.value_mut();

        while let Some(&oldest) = window.front() {
            if now.duration_since(oldest) >= WINDOW {
                window.pop_front();
            } else {
                break;
            }
        }

        let allowed = (window.len() as u32) < self.limit;
        if allowed {
            window.push_back(now);
        }

        let used = window.len() as u32;
        let reset_after_secs = window
            .front()
            .map(|oldest| WINDOW.saturating_sub(now.duration_since(*oldest)))
            .map(|left| left.as_secs().max(1))
            .unwrap_or(0);

        RateLimitDecision {
            allowed,
            limit: self.limit,
            remaining: self.limit.saturating_sub(used),
            reset_after_secs,
        }
    }

    /// Periodically forget idle users so the map does not grow without bound.
    pub fn spawn_pruner(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                limiter.prune();
            }
        })
    }

    /// Drop users whose window has fully drained.
    pub fn prune(&self) {
        let now = Instant::now();
        self.hits.retain(|_, window| {
            window
                .back()
                .is_some_and(|last| now.duration_since(*last) < WINDOW)
        });
    }
}

/// Runs after [`super::require_session`]; keys the budget on the user.
pub async fn enforce_rate_limit(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let decision = state.rate_limiter().check(ctx.user.id);

    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        warn!(user_id = %ctx.user.id, "rate limit exceeded");
        ApiError::RateLimited {
            retry_after_secs: decision.reset_after_secs,
        }
        .into_response()
    };

    decision.apply_headers(response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_limit() {
        let limiter = RateLimiter::new(3);
        let user = Uuid::new_v4();
        let now = Instant::now();

        let first = limiter.check_at(user, now);
        assert!(first.allowed);
        assert_eq!(first.remaining, 2);
        assert_eq!(first.reset_after_secs, 60);

        assert!(limiter.check_at(user, now).allowed);
        let third = limiter.check_at(user, now);
        assert!(third.allowed);
        assert_eq!(third.remaining, 0);

        let fourth = limiter.check_at(user, now);
        assert!(!fourth.allowed);
        assert_eq!(fourth.remaining, 0);
        assert_eq!(fourth.limit, 3);
    }

    #[test]
    fn test_window_slides() {
        let limiter = RateLimiter::new(2);
        let user = Uuid::new_v4();
        let start = Instant::now();

        assert!(limiter.check_at(user, start).allowed);
        assert!(limiter.check_at(user, start + Duration::from_secs(30)).allowed);
        assert!(!limiter.check_at(user, start + Duration::from_secs(45)).allowed);

        let later = limiter.check_at(user, start + Duration::from_secs(61));
        assert!(later.allowed);
        assert_eq!(later.remaining, 0);
        assert_eq!(later.reset_after_secs, 29);
    }

    #[test]
    fn test_users_are_independent() {
        let limiter = RateLimiter::new(1);
        let now = Instant::now();
        assert!(limiter.check_at(Uuid::new_v4(), now).allowed);
        assert!(limiter.check_at(Uuid::new_v4(), now).allowed);
    }

    #[test]
    fn test_prune_keeps_active_users() {
        let limiter = RateLimiter::new(5);
        let user = Uuid::new_v4();
        limiter.check(user);
        limiter.prune();
        assert_eq!(limiter.hits.len(), 1);

        limiter.hits.insert(Uuid::new_v4(), VecDeque::new());
        limiter.prune();
        assert_eq!(limiter.hits.len(), 1);
    }

    #[test]
    fn test_headers() {
        let decision = RateLimitDecision {
            allowed: true,
            limit: 60,
            remaining: 59,
            reset_after_secs: 60,
        };
        let mut headers = HeaderMap::new();
        decision.apply_headers(&mut headers);
        assert_eq!(headers["x-ratelimit-limit"], "60");
        assert_eq!(headers["x-ratelimit-remaining"], "59");
        assert_eq!(headers["x-ratelimit-reset"], "60");
    }
}
