use anyhow::Result;
use catalog_rs::services::seeding::SeedingService;
use catalog_rs::{AppConfig, Database};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Applies migrations and seeds demo users and projects.
/// Pass `--reset` to wipe all catalog data first.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catalog_rs=info,init_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let reset = std::env::args().skip(1).any(|arg| arg == "--reset");

    let config = AppConfig::new()?;
    let database = Database::new(&config.database.url, config.database.max_connections).await?;
    info!("Migrations applied");

    let seeding = SeedingService::new(database.pool().clone());
    if reset {
        seeding.clear_all().await?;
    }
    seeding.seed_all().await?;

    let stats = seeding.get_stats().await?;
    info!(
        "Database ready: {} users, {} projects, {} assignments",
        stats.users, stats.projects, stats.assignments
    );

    Ok(())
}
