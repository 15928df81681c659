use anyhow::Result;
use tokio::net::TcpListener;
use tracing::info;

use auth::{
    build_auth_service, config::AuthSettings, init_tracing, routes, sweeper::SessionSweeper,
};
use common::database::{DatabaseConfig, health_check, init_pool};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("Starting authentication service");

    let settings = AuthSettings::load()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let auth = build_auth_service(
        &settings.session,
        settings.retry.into(),
        settings.password,
        settings.login_limit,
        pool,
    )
    .await?;

    let _scheduler = if settings.sweep.enabled {
        let sweeper =
            SessionSweeper::new(auth.sessions().clone()).with_limiter(auth.limiter().clone());
        Some(sweeper.start(&settings.sweep.schedule).await?)
    } else {
        info!("Session sweep disabled");
        None
    };

    info!("Authentication service initialized successfully");

    let app = routes::create_router(auth);

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    info!("Authentication service listening on {}", settings.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
