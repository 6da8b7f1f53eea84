//! Market data access.
//!
//! Provides:
//! - Core quote and history types
//! - The provider trait the pricing core depends on
//! - OANDA v20 REST client
//! - CSV history loader/writer

pub mod loader;
pub mod oanda;
pub mod provider;
pub mod types;

pub use loader::{load_history_file, save_history_file, DataLoader, LoaderError};
pub use oanda::{AccountSummary, OandaClient, OandaEnvironment, RawSwapRate};
pub use provider::{InMemoryProvider, MarketDataProvider, ProviderError};
pub use types::{HistoricalSeries, MarketRow, Quote, SpotPoint, SwapPoint};
