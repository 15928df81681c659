//! Account repositories

use async_trait::async_trait;
use common::StoreResult;

use crate::models::{NewUser, User};

#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod user;

#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryUserRepository;
pub use user::PgUserRepository;

/// Read-mostly access to accounts, by id or by login name.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// Insert an account. A taken username is `StoreError::Conflict`.
    async fn create(&self, new_user: &NewUser) -> StoreResult<User>;
}
