use anyhow::Result;
use cryptofolio::{services::ApiService, Config};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("🌐 Starting API service...");

    let config = Config::from_env()?;
    info!("Configuration loaded successfully");

    let api_service = ApiService::new(config).await?;
    api_service.start().await
}
