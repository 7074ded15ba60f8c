use crate::database::PortfolioStore;
use crate::types::{PriceQuote, PriceUpdateSummary};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{error, info, warn};

pub const PRICE_SOURCE: &str = "coingecko";

pub const DEFAULT_SYMBOLS: [&str; 10] = [
    "BTC", "ETH", "XRP", "ADA", "SOL", "DOGE", "USDT", "USDC", "LTC", "BCH",
];

/// Supported symbols: (symbol, price API id, display name).
const COINS: &[(&str, &str, &str)] = &[
    ("BTC", "bitcoin", "Bitcoin"),
    ("ETH", "ethereum", "Ethereum"),
    ("XRP", "ripple", "XRP"),
    ("ADA", "cardano", "Cardano"),
    ("SOL", "solana", "Solana"),
    ("DOGE", "dogecoin", "Dogecoin"),
    ("USDT", "tether", "Tether"),
    ("USDC", "usd-coin", "USD Coin"),
    ("LTC", "litecoin", "Litecoin"),
    ("BCH", "bitcoin-cash", "Bitcoin Cash"),
];

fn coin_for(symbol: &str) -> Option<(&'static str, &'static str, &'static str)> {
    let symbol = symbol.trim().to_uppercase();
    COINS.iter().find(|(s, _, _)| *s == symbol).copied()
}

pub fn is_supported(symbol: &str) -> bool {
    coin_for(symbol).is_some()
}

/// Market data lookups. Failures never surface as errors: a symbol that
/// cannot be priced is simply absent.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn get_price(&self, symbol: &str) -> Option<PriceQuote>;

    /// Keys of the returned map are upper-cased symbols.
    async fn get_prices(&self, symbols: &[String]) -> HashMap<String, PriceQuote>;

    async fn get_coin_details(&self, symbol: &str) -> Option<PriceQuote>;
}

#[derive(Debug, Deserialize)]
struct SimplePrice {
    usd: f64,
    #[serde(default)]
    usd_24h_change: Option<f64>,
    #[serde(default)]
    usd_market_cap: Option<f64>,
    #[serde(default)]
    usd_24h_vol: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CoinDetailResponse {
    id: String,
    symbol: String,
    name: String,
    market_data: MarketData,
}

#[derive(Debug, Deserialize)]
struct MarketData {
    current_price: UsdValue,
    #[serde(default)]
    price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    market_cap: Option<UsdValue>,
    #[serde(default)]
    total_volume: Option<UsdValue>,
    #[serde(default)]
    circulating_supply: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct UsdValue {
    #[serde(default)]
    usd: Option<f64>,
}

pub struct CoinGeckoClient {
    client: reqwest::Client,
    base_url: String,
}

impl CoinGeckoClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("cryptofolio/0.1")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_simple_prices(
        &self,
        ids: &[&str],
    ) -> Result<HashMap<String, SimplePrice>, reqwest::Error> {
        let url = format!("{}/simple/price", self.base_url);
        let ids = ids.join(",");

        self.client
            .get(&url)
            .query(&[
                ("ids", ids.as_str()),
                ("vs_currencies", "usd"),
                ("include_market_cap", "true"),
                ("include_24hr_vol", "true"),
                ("include_24hr_change", "true"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    async fn fetch_details(&self, id: &str) -> Result<CoinDetailResponse, reqwest::Error> {
        let url = format!("{}/coins/{}", self.base_url, id);

        self.client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

fn quote_from_simple(symbol: &str, id: &str, name: &str, data: &SimplePrice) -> PriceQuote {
    PriceQuote {
        id: id.to_string(),
        symbol: symbol.to_string(),
        name: name.to_string(),
        price_usd: data.usd,
        price_change_24h: data.usd_24h_change.unwrap_or_default(),
        market_cap: data.usd_market_cap.unwrap_or_default(),
        volume_24h: data.usd_24h_vol.unwrap_or_default(),
        circulating_supply: 0.0,
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    async fn get_price(&self, symbol: &str) -> Option<PriceQuote> {
        self.get_prices(&[symbol.to_string()])
            .await
            .remove(&symbol.trim().to_uppercase())
    }

    async fn get_prices(&self, symbols: &[String]) -> HashMap<String, PriceQuote> {
        let mut coins = Vec::new();
        for symbol in symbols {
            match coin_for(symbol) {
                Some(coin) if !coins.contains(&coin) => coins.push(coin),
                Some(_) => {}
                None => warn!("⚠️ Symbol {} has no price API mapping", symbol),
            }
        }

        if coins.is_empty() {
            return HashMap::new();
        }

        let ids: Vec<&str> = coins.iter().map(|(_, id, _)| *id).collect();
        let data = match self.fetch_simple_prices(&ids).await {
            Ok(data) => data,
            Err(e) => {
                error!("❌ Batch price fetch for {} failed: {}", ids.join(","), e);
                return HashMap::new();
            }
        };

        coins
            .into_iter()
            .filter_map(|(symbol, id, name)| {
                data.get(id)
                    .map(|entry| (symbol.to_string(), quote_from_simple(symbol, id, name, entry)))
            })
            .collect()
    }

    async fn get_coin_details(&self, symbol: &str) -> Option<PriceQuote> {
        let Some((_, id, _)) = coin_for(symbol) else {
            warn!("⚠️ Symbol {} has no price API mapping", symbol);
            return None;
        };

        match self.fetch_details(id).await {
            Ok(details) => {
                let market = details.market_data;
                Some(PriceQuote {
                    id: details.id,
                    symbol: details.symbol.to_uppercase(),
                    name: details.name,
                    price_usd: market.current_price.usd?,
                    price_change_24h: market.price_change_percentage_24h.unwrap_or_default(),
                    market_cap: market.market_cap.and_then(|v| v.usd).unwrap_or_default(),
                    volume_24h: market.total_volume.and_then(|v| v.usd).unwrap_or_default(),
                    circulating_supply: market.circulating_supply.unwrap_or_default(),
                })
            }
            Err(e) => {
                error!("❌ Coin details for {} failed: {}", symbol, e);
                None
            }
        }
    }
}

/// Pulls quotes from the price API into the price history and re-prices holdings.
pub struct PriceService {
    store: Arc<dyn PortfolioStore>,
    prices: Arc<dyn PriceSource>,
}

impl PriceService {
    pub fn new(store: Arc<dyn PortfolioStore>, prices: Arc<dyn PriceSource>) -> Self {
        Self { store, prices }
    }

    pub fn default_symbols() -> Vec<String> {
        DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect()
    }

    pub async fn update_prices(&self, symbols: &[String]) -> PriceUpdateSummary {
        let quotes = self.prices.get_prices(symbols).await;
        let mut summary = PriceUpdateSummary::default();

        for (symbol, quote) in &quotes {
            let Some(row) = quote.to_price_history(PRICE_SOURCE) else {
                warn!("⚠️ Unusable price {} for {}", quote.price_usd, symbol);
                summary.failed += 1;
                continue;
            };

            match self.store.insert_price_history(&row).await {
                Ok(_) => summary.updated += 1,
                Err(e) => {
                    error!("❌ Failed to save price for {}: {}", symbol, e);
                    summary.failed += 1;
                }
            }
        }

        match self.store.update_asset_prices().await {
            Ok(count) => info!("💱 Re-priced {} holdings", count),
            Err(e) => error!("❌ Failed to re-price holdings: {}", e),
        }

        summary
    }

    /// Runs `update_prices` for the default symbols on a fixed interval. Never returns.
    pub async fn start(&self, every: Duration) {
        info!("🚀 Price updater started, interval {:?}", every);
        let symbols = Self::default_symbols();
        let mut interval = time::interval(every);

        loop {
            interval.tick().await;
            let summary = self.update_prices(&symbols).await;
            info!(
                "✅ Price update finished: {} updated, {} failed",
                summary.updated, summary.failed
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_mapping_is_case_insensitive() {
        assert_eq!(coin_for("btc").map(|c| c.1), Some("bitcoin"));
        assert_eq!(coin_for(" usdc ").map(|c| c.1), Some("usd-coin"));
        assert!(coin_for("SHIB").is_none());
    }

    #[test]
    fn test_default_symbols_are_all_supported() {
        assert!(DEFAULT_SYMBOLS.iter().all(|s| is_supported(s)));
    }

    #[tokio::test]
    async fn test_unreachable_api_degrades_to_empty() {
        let client = CoinGeckoClient::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        let prices = client
            .get_prices(&["BTC".to_string(), "ETH".to_string()])
            .await;
        assert!(prices.is_empty());
        assert!(client.get_price("BTC").await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_symbols_never_hit_the_network() {
        let client = CoinGeckoClient::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        assert!(client.get_prices(&["NOPE".to_string()]).await.is_empty());
        assert!(client.get_coin_details("NOPE").await.is_none());
    }
}
