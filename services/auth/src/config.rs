//! Service configuration
//!
//! Defaults are overridden by `MEMRI_*` environment variables, nested keys
//! separated by a double underscore:
//!
//! ```text
//! MEMRI_BIND_ADDR=0.0.0.0:3000
//! MEMRI_SESSION__BACKEND=postgres        # memory | postgres | redis
//! MEMRI_SESSION__TTL_SECS=604800
//! MEMRI_SESSION__REFRESH_THRESHOLD_SECS=86400
//! MEMRI_SESSION__SECURE_COOKIE=true
//! MEMRI_SWEEP__SCHEDULE="0 0 * * * *"
//! MEMRI_PASSWORD__MEMORY_KIB=19456
//! MEMRI_LOGIN_LIMIT__MAX_ATTEMPTS=5
//! MEMRI_RETRY__MAX_ATTEMPTS=3
//! ```
//!
//! Database and Redis connection settings come from `DATABASE_URL` and
//! `REDIS_URL`, see `common::database` and `common::cache`.

use anyhow::Result;
use common::RetryPolicy;
use config::{Config, ConfigError, Environment, builder::DefaultState};
use serde::Deserialize;

use crate::password::PasswordSettings;
use crate::rate_limiter::RateLimiterConfig;
use crate::session::{SessionBackend, SessionPolicy};

pub const ENV_PREFIX: &str = "MEMRI";

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    pub backend: SessionBackend,
    pub ttl_secs: i64,
    pub refresh_threshold_secs: i64,
    pub cookie_name: String,
    /// Set the `Secure` cookie attribute; on in production.
    pub secure_cookie: bool,
}

impl SessionSettings {
    pub fn policy(&self) -> Result<SessionPolicy> {
        SessionPolicy::from_secs(self.ttl_secs, self.refresh_threshold_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweepSettings {
    pub enabled: bool,
    /// Six-field cron expression, seconds first.
    pub schedule: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl From<RetrySettings> for RetryPolicy {
    fn from(settings: RetrySettings) -> Self {
        RetryPolicy::from_millis(
            settings.max_attempts,
            settings.base_delay_ms,
            settings.max_delay_ms,
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub bind_addr: String,
    pub session: SessionSettings,
    pub sweep: SweepSettings,
    pub password: PasswordSettings,
    pub login_limit: RateLimiterConfig,
    pub retry: RetrySettings,
}

/// Defaults shared by every service that resolves sessions.
pub fn shared_defaults() -> Result<config::ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("session.backend", "postgres")?
        .set_default("session.ttl_secs", 7 * 24 * 3600)?
        .set_default("session.refresh_threshold_secs", 24 * 3600)?
        .set_default("session.cookie_name", "memri_session")?
        .set_default("session.secure_cookie", false)?
        .set_default("retry.max_attempts", 3)?
        .set_default("retry.base_delay_ms", 100)?
        .set_default("retry.max_delay_ms", 2000)
}

/// Environment source for `MEMRI_*` variables.
pub fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

impl AuthSettings {
    pub fn load() -> Result<Self, ConfigError> {
        let password = PasswordSettings::default();
        let limit = RateLimiterConfig::default();

        shared_defaults()?
            .set_default("bind_addr", "0.0.0.0:3000")?
            .set_default("sweep.enabled", true)?
            .set_default("sweep.schedule", "0 0 * * * *")?
            .set_default("password.memory_kib", password.memory_kib)?
            .set_default("password.iterations", password.iterations)?
            .set_default("password.parallelism", password.parallelism)?
            .set_default("login_limit.max_attempts", limit.max_attempts)?
            .set_default("login_limit.window_seconds", limit.window_seconds)?
            .set_default("login_limit.ban_duration_seconds", limit.ban_duration_seconds)?
            .add_source(environment())
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_defaults() {
        let settings = AuthSettings::load().unwrap();

        assert_eq!(settings.bind_addr, "0.0.0.0:3000");
        assert_eq!(settings.session.backend, SessionBackend::Postgres);
        assert_eq!(settings.session.cookie_name, "memri_session");
        assert!(!settings.session.secure_cookie);
        assert_eq!(settings.sweep.schedule, "0 0 * * * *");
        assert_eq!(settings.login_limit.max_attempts, 5);

        let policy = settings.session.policy().unwrap();
        assert_eq!(policy, SessionPolicy::default());

        let retry: RetryPolicy = settings.retry.into();
        assert_eq!(retry, RetryPolicy::default());
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        unsafe {
            std::env::set_var("MEMRI_SESSION__BACKEND", "memory");
            std::env::set_var("MEMRI_SESSION__TTL_SECS", "86400");
            std::env::set_var("MEMRI_SESSION__REFRESH_THRESHOLD_SECS", "3600");
            std::env::set_var("MEMRI_SESSION__SECURE_COOKIE", "true");
        }

        let settings = AuthSettings::load();

        unsafe {
            std::env::remove_var("MEMRI_SESSION__BACKEND");
            std::env::remove_var("MEMRI_SESSION__TTL_SECS");
            std::env::remove_var("MEMRI_SESSION__REFRESH_THRESHOLD_SECS");
            std::env::remove_var("MEMRI_SESSION__SECURE_COOKIE");
        }

        let settings = settings.unwrap();
        assert_eq!(settings.session.backend, SessionBackend::Memory);
        assert!(settings.session.secure_cookie);

        let policy = settings.session.policy().unwrap();
        assert_eq!(policy.ttl, Duration::hours(24));
        assert_eq!(policy.refresh_threshold, Duration::hours(1));
    }

    #[test]
    #[serial]
    fn test_inconsistent_policy_is_rejected() {
        unsafe {
            std::env::set_var("MEMRI_SESSION__REFRESH_THRESHOLD_SECS", "999999999");
        }

        let settings = AuthSettings::load();

        unsafe {
            std::env::remove_var("MEMRI_SESSION__REFRESH_THRESHOLD_SECS");
        }

        assert!(settings.unwrap().session.policy().is_err());
    }
}
