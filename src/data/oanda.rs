//! OANDA v20 REST client.
//!
//! Endpoints used:
//! - `GET /v3/accounts/{account}/pricing` for live top-of-book
//! - `GET /v3/instruments/{pair}/candles` for daily mid candles
//! - `GET /v3/accounts/{account}/instruments/{pair}/swap_rates` for swap points
//!
//! Plain blocking request/response, one attempt per call.

use std::cell::Cell;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::provider::{MarketDataProvider, ProviderError};
use super::types::{HistoricalSeries, Quote, SpotPoint, SwapPoint};

/// Maximum candles OANDA returns per request.
pub const MAX_CANDLES_PER_REQUEST: u32 = 5000;

pub const TOKEN_ENV: &str = "OANDA_TOKEN";
pub const ACCOUNT_ENV: &str = "OANDA_ACCOUNT_ID";
pub const ENVIRONMENT_ENV: &str = "OANDA_ENV";

/// OANDA trading environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OandaEnvironment {
    Practice,
    Live,
}

impl OandaEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Practice => "https://api-fxpractice.oanda.com",
            Self::Live => "https://api-fxtrade.oanda.com",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "practice" | "demo" => Some(Self::Practice),
            "live" | "trade" => Some(Self::Live),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PricingResponse {
    prices: Vec<RawPrice>,
}

#[derive(Debug, Deserialize)]
struct RawPrice {
    #[serde(default)]
    time: Option<String>,
    bids: Vec<RawBucket>,
    asks: Vec<RawBucket>,
}

#[derive(Debug, Deserialize)]
struct RawBucket {
    price: String,
}

#[derive(Debug, Deserialize)]
struct CandlesResponse {
    candles: Vec<RawCandle>,
}

#[derive(Debug, Deserialize)]
struct RawCandle {
    time: String,
    #[serde(default)]
    mid: Option<RawMid>,
}

#[derive(Debug, Deserialize)]
struct RawMid {
    o: String,
    c: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapRatesResponse {
    #[serde(default)]
    swap_rates: Vec<RawSwapRate>,
}

/// Raw swap-rate entry. Rates may arrive as JSON numbers or strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSwapRate {
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub tenor: Option<String>,
    #[serde(default)]
    pub long_rate: Option<serde_json::Value>,
    #[serde(default)]
    pub short_rate: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    #[serde(default)]
    accounts: Vec<AccountSummary>,
}

/// Account visible to the API token.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountSummary {
    pub id: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn value_to_f64(value: &Option<serde_json::Value>) -> f64 {
    match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

impl RawSwapRate {
    /// Net daily swap points: long rate minus short rate.
    pub fn net_points(&self) -> f64 {
        value_to_f64(&self.long_rate) - value_to_f64(&self.short_rate)
    }

    /// Tenor in days for tenors quoted as `"{n}D"`.
    pub fn tenor_days(&self) -> Option<u32> {
        self.tenor.as_deref()?.strip_suffix('D')?.parse().ok()
    }
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, ProviderError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ProviderError::InvalidResponse(format!("bad timestamp {}: {}", raw, e)))
}

fn parse_price(raw: &str) -> Result<f64, ProviderError> {
    raw.parse::<f64>()
        .map_err(|e| ProviderError::InvalidResponse(format!("bad price {}: {}", raw, e)))
}

/// OANDA API client.
pub struct OandaClient {
    client: Client,
    token: String,
    account_id: String,
    environment: OandaEnvironment,
    request_count: Cell<u64>,
}

impl OandaClient {
    pub fn new(token: String, account_id: String, environment: OandaEnvironment) -> Self {
        Self {
            client: Client::new(),
            token,
            account_id,
            environment,
            request_count: Cell::new(0),
        }
    }

    /// Build a client from `OANDA_TOKEN`, `OANDA_ACCOUNT_ID` and optional `OANDA_ENV`.
    pub fn from_env() -> Result<Self, ProviderError> {
        let token = std::env::var(TOKEN_ENV)
            .map_err(|_| ProviderError::MissingCredentials(format!("{} not set", TOKEN_ENV)))?;
        let account_id = std::env::var(ACCOUNT_ENV)
            .map_err(|_| ProviderError::MissingCredentials(format!("{} not set", ACCOUNT_ENV)))?;
        let environment = std::env::var(ENVIRONMENT_ENV)
            .ok()
            .and_then(|s| OandaEnvironment::parse(&s))
            .unwrap_or(OandaEnvironment::Practice);
        Ok(Self::new(token, account_id, environment))
    }

    pub fn environment(&self) -> OandaEnvironment {
        self.environment
    }

    /// Get request count for monitoring.
    pub fn request_count(&self) -> u64 {
        self.request_count.get()
    }

    fn get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.environment.base_url(), path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(params)
            .send()?;
        self.request_count.set(self.request_count.get() + 1);

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().unwrap_or_default();
            return Err(ProviderError::Api(format!("{}: {}", status, text)));
        }

        response
            .json()
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Accounts the token can access.
    pub fn fetch_accounts(&self) -> Result<Vec<AccountSummary>, ProviderError> {
        let response: AccountsResponse = self.get("/v3/accounts", &[])?;
        Ok(response.accounts)
    }

    /// Daily mid candles; spot is the average of open and close.
    pub fn fetch_spot_history(&self, pair: &str, days: u32) -> Result<Vec<SpotPoint>, ProviderError> {
        let count = days.clamp(1, MAX_CANDLES_PER_REQUEST);
        let params = [
            ("granularity", "D".to_string()),
            ("count", count.to_string()),
            ("price", "M".to_string()),
        ];
        let response: CandlesResponse =
            self.get(&format!("/v3/instruments/{}/candles", pair), &params)?;

        let mut points = Vec::with_capacity(response.candles.len());
        for candle in response.candles {
            let Some(mid) = candle.mid else { continue };
            let open = parse_price(&mid.o)?;
            let close = parse_price(&mid.c)?;
            points.push(SpotPoint {
                date: parse_time(&candle.time)?.date_naive(),
                spot: (open + close) / 2.0,
            });
        }
        points.sort_by_key(|p| p.date);
        Ok(points)
    }

    /// All swap-rate entries published for the pair.
    pub fn fetch_swap_rates(&self, pair: &str, days: Option<u32>) -> Result<Vec<RawSwapRate>, ProviderError> {
        let mut params = Vec::new();
        if let Some(days) = days {
            params.push(("count", days.to_string()));
            params.push(("granularity", "D".to_string()));
        }
        let response: SwapRatesResponse = self.get(
            &format!("/v3/accounts/{}/instruments/{}/swap_rates", self.account_id, pair),
            &params,
        )?;
        Ok(response.swap_rates)
    }

    /// Daily swap-point history keyed by date.
    pub fn fetch_swap_history(&self, pair: &str, days: u32) -> Result<Vec<SwapPoint>, ProviderError> {
        let rates = self.fetch_swap_rates(pair, Some(days))?;
        let mut points = Vec::with_capacity(rates.len());
        for rate in &rates {
            let Some(time) = rate.time.as_deref() else { continue };
            points.push(SwapPoint {
                date: parse_time(time)?.date_naive(),
                swap_points: rate.net_points(),
            });
        }
        points.sort_by_key(|p| p.date);
        Ok(points)
    }
}

impl MarketDataProvider for OandaClient {
    fn fetch_quote(&self, pair: &str) -> Result<Quote, ProviderError> {
        let params = [("instruments", pair.to_string())];
        let response: PricingResponse =
            self.get(&format!("/v3/accounts/{}/pricing", self.account_id), &params)?;

        let price = response
            .prices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::NoData(pair.to_string()))?;
        let bid = price
            .bids
            .first()
            .ok_or_else(|| ProviderError::InvalidResponse("empty bids".to_string()))?;
        let ask = price
            .asks
            .first()
            .ok_or_else(|| ProviderError::InvalidResponse("empty asks".to_string()))?;

        let timestamp = match price.time.as_deref() {
            Some(raw) => parse_time(raw)?,
            None => Utc::now(),
        };

        Ok(Quote::from_bid_ask(
            pair,
            timestamp,
            parse_price(&bid.price)?,
            parse_price(&ask.price)?,
        ))
    }

    fn fetch_history(&self, pair: &str, days: u32) -> Result<HistoricalSeries, ProviderError> {
        let spot = self.fetch_spot_history(pair, days)?;
        if spot.is_empty() {
            return Err(ProviderError::NoData(pair.to_string()));
        }

        let swap_points = match self.fetch_swap_history(pair, days) {
            Ok(points) => points,
            Err(e) => {
                warn!(
                    "swap_rates unavailable for {} ({}); every row will be a swap gap",
                    pair, e
                );
                Vec::new()
            }
        };

        Ok(HistoricalSeries::new(pair, spot, swap_points))
    }

    fn fetch_swap_points(&self, pair: &str, tenor_days: u32) -> Result<Option<f64>, ProviderError> {
        let rates = self.fetch_swap_rates(pair, None)?;
        Ok(rates
            .iter()
            .find(|r| r.tenor_days() == Some(tenor_days))
            .map(|r| r.net_points()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_rate_parsing() {
        let json = r#"{"swapRates": [
            {"time": "2024-03-01T21:00:00.000000000Z", "tenor": "30D", "longRate": "0.0123", "shortRate": 0.0023},
            {"time": "2024-03-02T21:00:00.000000000Z", "tenor": "1M"}
        ]}"#;
        let response: SwapRatesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.swap_rates.len(), 2);

        let first = &response.swap_rates[0];
        assert!((first.net_points() - 0.01).abs() < 1e-12);
        assert_eq!(first.tenor_days(), Some(30));

        let second = &response.swap_rates[1];
        assert_eq!(second.net_points(), 0.0);
        assert_eq!(second.tenor_days(), None);
    }

    #[test]
    fn test_pricing_response_parsing() {
        let json = r#"{"prices": [{
            "instrument": "EUR_USD",
            "time": "2024-03-01T12:00:00.123456789Z",
            "bids": [{"price": "1.08000", "liquidity": 1000000}],
            "asks": [{"price": "1.08020", "liquidity": 1000000}]
        }]}"#;
        let response: PricingResponse = serde_json::from_str(json).unwrap();
        let price = &response.prices[0];
        let bid = parse_price(&price.bids[0].price).unwrap();
        let ask = parse_price(&price.asks[0].price).unwrap();
        assert!(((bid + ask) / 2.0 - 1.0801).abs() < 1e-12);
        assert!(parse_time(price.time.as_deref().unwrap()).is_ok());
    }

    #[test]
    fn test_account_list_parsing() {
        let json = r#"{"accounts": [
            {"id": "101-004-1234567-001", "tags": []},
            {"id": "101-004-1234567-002", "tags": ["hedging"]},
            {"id": "101-004-1234567-003"}
        ]}"#;
        let response: AccountsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.accounts.len(), 3);
        assert_eq!(response.accounts[0].id, "101-004-1234567-001");
        assert_eq!(response.accounts[1].tags, vec!["hedging".to_string()]);
        assert!(response.accounts[2].tags.is_empty());

        let empty: AccountsResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.accounts.is_empty());
    }

    #[test]
    fn test_environment_urls() {
        assert_eq!(
            OandaEnvironment::parse("LIVE"),
            Some(OandaEnvironment::Live)
        );
        assert!(OandaEnvironment::Practice.base_url().contains("fxpractice"));
        assert_eq!(OandaEnvironment::parse("x"), None);
    }
}
