use identity_service::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "identity_service=debug".into()),
        )
        .init();

    // Load config
    let config = Config::from_env().expect("Failed to load configuration");

    // Connect to database
    let db =
        identity_service::db::pool::connect(&config.database_url, config.max_pool_size).await?;
    tracing::info!("Connected to database");

    // Apply schema
    let applied = identity_service::db::migration::run(&db).await?;
    tracing::info!(applied, "Schema applied");

    Ok(())
}
