// PriceQuote and its conversion into PriceHistory rows
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::NewPriceHistory;

/// Point-in-time market data for one symbol as reported by the price API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub price_usd: f64,
    pub price_change_24h: f64,
    pub market_cap: f64,
    pub volume_24h: f64,
    pub circulating_supply: f64,
}

impl PriceQuote {
    pub fn price_decimal(&self) -> Option<Decimal> {
        Decimal::from_f64(self.price_usd)
    }

    /// Row to append to the price history. `None` when the price is not representable.
    pub fn to_price_history(&self, source: &str) -> Option<NewPriceHistory> {
        let price_usd = self.price_decimal()?;
        if price_usd <= Decimal::ZERO {
            return None;
        }

        Some(NewPriceHistory {
            symbol: self.symbol.clone(),
            price_usd,
            price_change_24h: Decimal::from_f64(self.price_change_24h),
            market_cap: Decimal::from_f64(self.market_cap),
            volume_24h: Decimal::from_f64(self.volume_24h),
            circulating_supply: Decimal::from_f64(self.circulating_supply),
            source: source.to_string(),
            timestamp: None,
        })
    }
}
