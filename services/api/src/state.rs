//! Application state shared across handlers

use std::sync::Arc;

use auth::AuthService;
use common::RetryPolicy;

use crate::ownership::OwnershipGuard;
use crate::repositories::{CollectionRepository, PhotoRepository};

#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub collections: Arc<dyn CollectionRepository>,
    pub photos: Arc<dyn PhotoRepository>,
    pub owners: Arc<dyn OwnershipGuard>,
    pub retry: RetryPolicy,
}
