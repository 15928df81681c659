//! Session model and related functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Session entity
///
/// `username` is a denormalized copy of the account's login name so a
/// lookup never needs a join. A session is valid iff `now < expires_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub username: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session is dead at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_session_expires_exactly_at_expires_at() {
        let now = Utc::now();
        let session = Session {
            token: "t".to_string(),
            user_id: 1,
            username: "chihiro".to_string(),
            expires_at: now,
            created_at: now - Duration::days(7),
            updated_at: now - Duration::days(7),
        };

        assert!(session.is_expired_at(now));
        assert!(session.is_expired_at(now + Duration::seconds(1)));
        assert!(!session.is_expired_at(now - Duration::seconds(1)));
    }
}
