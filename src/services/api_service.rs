use crate::{
    api::{create_router, ApiState},
    config::Config,
    database::Database,
    services::{auth_service::SupabaseAuth, price_service::{CoinGeckoClient, PriceService}},
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Connects to Postgres and bootstraps the schema.
pub async fn connect_database(config: &Config) -> Result<Arc<Database>> {
    let database = Database::connect(&config.database.url, config.database.max_connections)
        .await
        .context("failed to connect to the database")?;
    database
        .create_tables()
        .await
        .context("failed to create tables")?;
    info!("🗄️ Database connected and tables ready");
    Ok(Arc::new(database))
}

pub fn price_client(config: &Config) -> Result<Arc<CoinGeckoClient>> {
    let client = CoinGeckoClient::new(&config.price_api.base_url, config.price_api.timeout())
        .context("failed to build price API client")?;
    Ok(Arc::new(client))
}

pub struct ApiService {
    config: Config,
    state: ApiState,
}

impl ApiService {
    /// Builds every dependency up front so a bad configuration fails here and
    /// not on the first request.
    pub async fn new(config: Config) -> Result<Self> {
        let database = connect_database(&config).await?;
        let prices = price_client(&config)?;
        let auth = SupabaseAuth::new(
            &config.supabase.url,
            &config.supabase.anon_key,
            &config.supabase.service_role_key,
            config.price_api.timeout(),
        )
        .context("failed to build auth client")?;

        let state = ApiState::new(
            database,
            prices,
            Arc::new(auth),
            config.public(),
            &config.cron.api_key,
        );

        Ok(Self { config, state })
    }

    pub fn state(&self) -> &ApiState {
        &self.state
    }

    /// Price updater sharing this service's store and price client.
    pub fn price_service(&self) -> PriceService {
        self.state.price_service()
    }

    pub async fn start(&self) -> Result<()> {
        info!("🚀 Starting API service...");

        let app = create_router(self.state.clone());
        let address = self.config.bind_address();
        let listener = tokio::net::TcpListener::bind(&address).await?;

        info!("API server listening on {}", address);
        axum::serve(listener, app).await?;

        Ok(())
    }
}
