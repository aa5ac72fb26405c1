//! Application state shared across handlers

use std::sync::Arc;
use std::time::{Duration, Instant};

use buildops_core::BuildopsConfig;
use sqlx::PgPool;

use crate::cache::{JsonCache, KvStore, OnboardingStore, RateLimiter, SessionStore};

/// Shared application state, held behind an `Arc` by the router
pub struct AppState {
    pub pool: PgPool,
    pub kv: Arc<dyn KvStore>,
    pub config: Arc<BuildopsConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(pool: PgPool, kv: Arc<dyn KvStore>, config: BuildopsConfig) -> Self {
        Self {
            pool,
            kv,
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }

    pub fn sessions(&self) -> SessionStore {
        SessionStore::new(self.kv.clone())
    }

    pub fn cache(&self) -> JsonCache {
        JsonCache::new(self.kv.clone())
    }

    pub fn onboarding_drafts(&self) -> OnboardingStore {
        OnboardingStore::new(self.kv.clone())
    }

    pub fn rate_limiter(&self) -> RateLimiter {
        let limits = &self.config.rate_limit;
        RateLimiter::new(
            self.kv.clone(),
            limits.max_requests,
            Duration::from_secs(limits.window_secs),
        )
    }

    /// Development mode exposes reset tokens and drops the `Secure` cookie flag.
    pub fn dev_mode(&self) -> bool {
        !self.config.is_production()
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.config.auth.session_ttl_days)
    }
}
