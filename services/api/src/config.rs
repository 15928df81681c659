//! Service configuration
//!
//! Shares the `MEMRI_SESSION__*` and `MEMRI_RETRY__*` keys with the auth
//! service so both resolve sessions the same way. `MEMRI_BIND_ADDR` sets the
//! listen address.

use auth::config::{RetrySettings, SessionSettings, environment, shared_defaults};
use config::ConfigError;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    pub bind_addr: String,
    pub session: SessionSettings,
    pub retry: RetrySettings,
}

impl ApiSettings {
    pub fn load() -> Result<Self, ConfigError> {
        shared_defaults()?
            .set_default("bind_addr", "0.0.0.0:3001")?
            .add_source(environment())
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth::session::SessionBackend;
    use common::RetryPolicy;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_defaults() {
        let settings = ApiSettings::load().unwrap();

        assert_eq!(settings.bind_addr, "0.0.0.0:3001");
        assert_eq!(settings.session.backend, SessionBackend::Postgres);
        assert_eq!(settings.session.cookie_name, "memri_session");

        let retry: RetryPolicy = settings.retry.into();
        assert_eq!(retry, RetryPolicy::default());
    }

    #[test]
    #[serial]
    fn test_shares_session_keys_with_auth() {
        unsafe {
            std::env::set_var("MEMRI_BIND_ADDR", "127.0.0.1:9001");
            std::env::set_var("MEMRI_SESSION__COOKIE_NAME", "album");
            std::env::set_var("MEMRI_RETRY__MAX_ATTEMPTS", "1");
        }

        let settings = ApiSettings::load();

        unsafe {
            std::env::remove_var("MEMRI_BIND_ADDR");
            std::env::remove_var("MEMRI_SESSION__COOKIE_NAME");
            std::env::remove_var("MEMRI_RETRY__MAX_ATTEMPTS");
        }

        let settings = settings.unwrap();
        assert_eq!(settings.bind_addr, "127.0.0.1:9001");
        assert_eq!(settings.session.cookie_name, "album");
        assert_eq!(settings.retry.max_attempts, 1);
    }
}
