//! In-process user repository for tests and local runs

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{StoreError, StoreResult};
use tokio::sync::Mutex;

use super::UserRepository;
use crate::models::{NewUser, User};

#[derive(Debug, Default)]
struct Users {
    next_id: i64,
    by_id: HashMap<i64, User>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryUserRepository {
    users: Arc<Mutex<Users>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove an account, leaving any of its sessions behind.
    pub async fn remove(&self, id: i64) -> Option<User> {
        self.users.lock().await.by_id.remove(&id)
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.users.lock().await.by_id.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let users = self.users.lock().await;
        Ok(users
            .by_id
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create(&self, new_user: &NewUser) -> StoreResult<User> {
        let mut users = self.users.lock().await;
        if users.by_id.values().any(|u| u.username == new_user.username) {
            return Err(StoreError::Conflict(format!(
                "username {} is taken",
                new_user.username
            )));
        }

        users.next_id += 1;
        let now = Utc::now();
        let user = User {
            id: users.next_id,
            username: new_user.username.clone(),
            password_hash: new_user.password_hash.clone(),
            display_name: new_user.display_name.clone(),
            avatar_url: new_user.avatar_url.clone(),
            created_at: now,
            updated_at: now,
        };
        users.by_id.insert(user.id, user.clone());
        Ok(user)
    }
}
