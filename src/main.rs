use anyhow::Result;
use cryptofolio::{services::ApiService, Config};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("🔧 Starting combined service (API + price updater)...");

    let config = Config::from_env()?;
    info!("Configuration loaded successfully");

    let api_service = ApiService::new(config.clone()).await?;

    match config.price_api.update_interval() {
        Some(every) => {
            let price_service = api_service.price_service();
            tokio::spawn(async move { price_service.start(every).await });
        }
        None => info!("Background price updates disabled"),
    }

    api_service.start().await
}
