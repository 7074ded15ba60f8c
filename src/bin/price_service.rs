use anyhow::Result;
use cryptofolio::{
    services::{api_service, PriceService},
    Config,
};
use std::time::Duration;
use tracing::{info, warn, Level};

const FALLBACK_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("💱 Starting price service...");

    let config = Config::from_env()?;
    let database = api_service::connect_database(&config).await?;
    let prices = api_service::price_client(&config)?;

    let every = config.price_api.update_interval().unwrap_or_else(|| {
        warn!("⚠️ PRICE_UPDATE_INTERVAL_SECS is 0, using {:?}", FALLBACK_INTERVAL);
        FALLBACK_INTERVAL
    });

    PriceService::new(database, prices).start(every).await;
    Ok(())
}
