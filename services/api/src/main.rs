use anyhow::Result;
use api::config::ApiSettings;
use api::routes;
use common::database::{DatabaseConfig, health_check, init_pool};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    auth::init_tracing();

    info!("Starting API service");

    let settings = ApiSettings::load()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let state = api::build_state(&settings, pool).await?;
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    info!("API service listening on {}", settings.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
