//! Integration tests for the infrastructure components
//!
//! These tests verify that the PostgreSQL database and Redis cache
//! are configured and reachable, and that failures coming out of them are
//! classified the way the retry wrapper expects. They need live services
//! (`DATABASE_URL`, `REDIS_URL`) and are ignored by default.

use common::{
    FailureKind, RetryPolicy, StoreError,
    cache::{RedisConfig, RedisPool},
    database::{DatabaseConfig, health_check, init_pool},
    with_retry,
};
use sqlx::Row;

#[tokio::test]
#[ignore = "requires PostgreSQL and Redis"]
async fn test_infrastructure_integration() -> Result<(), Box<dyn std::error::Error>> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    assert!(health_check(&pool).await?, "Database health check failed");

    // Reads go through the retry wrapper the same way the services do
    let row = with_retry(&RetryPolicy::default(), "select one", || async {
        sqlx::query("SELECT 1 as result")
            .fetch_one(&pool)
            .await
            .map_err(StoreError::from)
    })
    .await?;

    let result: i32 = row.get("result");
    assert_eq!(result, 1, "PostgreSQL simple query test failed");

    let redis_config = RedisConfig::from_env()?;
    let redis_pool = RedisPool::new(&redis_config).await?;

    assert!(
        redis_pool.health_check().await?,
        "Redis health check failed"
    );

    // Session keys are written with a millisecond expiry
    let mut conn = redis_pool.connection().await?;
    let test_key = "session:memri_integration_test";
    let _: () = redis::cmd("SET")
        .arg(test_key)
        .arg("{}")
        .arg("PX")
        .arg(10_000)
        .query_async(&mut conn)
        .await?;

    let ttl: i64 = redis::cmd("PTTL").arg(test_key).query_async(&mut conn).await?;
    assert!(ttl > 0 && ttl <= 10_000, "expiry was not applied");

    let removed: i64 = redis::cmd("DEL").arg(test_key).query_async(&mut conn).await?;
    assert_eq!(removed, 1, "Redis delete operation failed");

    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_statement_timeout_is_classified_as_timeout() -> Result<(), Box<dyn std::error::Error>>
{
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    let mut tx = pool.begin().await?;
    sqlx::query("SET LOCAL statement_timeout = 50")
        .execute(&mut *tx)
        .await?;
    let err = sqlx::query("SELECT pg_sleep(1)")
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)
        .expect_err("pg_sleep should be cancelled");

    assert_eq!(err.kind(), FailureKind::Timeout);
    Ok(())
}
