//! Market data provider seam.
//!
//! The pricing and PnL code never talks to the network; everything it
//! needs comes through this trait.

use std::collections::HashMap;

use thiserror::Error;

use super::types::{HistoricalSeries, Quote};

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("No data available for {0}")]
    NoData(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
}

/// Source of spot quotes and historical series.
pub trait MarketDataProvider {
    /// Current spot mid for `pair`.
    fn fetch_quote(&self, pair: &str) -> Result<Quote, ProviderError>;

    /// Daily spot and swap-point history covering the last `days` days.
    fn fetch_history(&self, pair: &str, days: u32) -> Result<HistoricalSeries, ProviderError>;

    /// Current daily swap-point rate for a tenor, if the source publishes one.
    fn fetch_swap_points(&self, _pair: &str, _tenor_days: u32) -> Result<Option<f64>, ProviderError> {
        Ok(None)
    }
}

/// Fixed in-memory data, for offline runs and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    quotes: HashMap<String, Quote>,
    swap_points: HashMap<String, f64>,
    history: HashMap<String, HistoricalSeries>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quote(mut self, quote: Quote) -> Self {
        self.quotes.insert(quote.pair.clone(), quote);
        self
    }

    pub fn with_swap_points(mut self, pair: &str, swap_points: f64) -> Self {
        self.swap_points.insert(pair.to_string(), swap_points);
        self
    }

    pub fn with_history(mut self, series: HistoricalSeries) -> Self {
        self.history.insert(series.pair.clone(), series);
        self
    }

    /// Replace the current quote for a pair.
    pub fn set_quote(&mut self, quote: Quote) {
        self.quotes.insert(quote.pair.clone(), quote);
    }
}

impl MarketDataProvider for InMemoryProvider {
    fn fetch_quote(&self, pair: &str) -> Result<Quote, ProviderError> {
        self.quotes
            .get(pair)
            .cloned()
            .ok_or_else(|| ProviderError::NoData(pair.to_string()))
    }

    fn fetch_history(&self, pair: &str, _days: u32) -> Result<HistoricalSeries, ProviderError> {
        self.history
            .get(pair)
            .cloned()
            .ok_or_else(|| ProviderError::NoData(pair.to_string()))
    }

    fn fetch_swap_points(&self, pair: &str, _tenor_days: u32) -> Result<Option<f64>, ProviderError> {
        Ok(self.swap_points.get(pair).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_in_memory_provider() {
        let provider = InMemoryProvider::new()
            .with_quote(Quote::new("EUR_USD", Utc::now(), 1.0850))
            .with_swap_points("EUR_USD", 0.0012);

        assert_eq!(provider.fetch_quote("EUR_USD").unwrap().spot_mid, 1.0850);
        assert_eq!(provider.fetch_swap_points("EUR_USD", 30).unwrap(), Some(0.0012));
        assert_eq!(provider.fetch_swap_points("GBP_USD", 30).unwrap(), None);
        assert!(matches!(
            provider.fetch_quote("GBP_USD"),
            Err(ProviderError::NoData(_))
        ));
    }
}
