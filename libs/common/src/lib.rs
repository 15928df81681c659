//! Common library for the Memri services
//!
//! This crate provides shared functionality used by the auth and api
//! services: database and Redis connectivity, the store error taxonomy,
//! retry with exponential backoff, and the clock abstraction.
//!
//! ```rust,no_run
//! use common::database::{DatabaseConfig, init_pool, health_check};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from_env()?;
//!     let pool = init_pool(&config).await?;
//!     println!("Database reachable: {}", health_check(&pool).await?);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod clock;
pub mod database;
pub mod error;
pub mod retry;

pub use clock::{Clock, SystemClock};
pub use error::{FailureKind, StoreError, StoreResult};
pub use retry::{RetryPolicy, Retryable, with_retry};

#[cfg(any(test, feature = "testing"))]
pub use clock::ManualClock;
