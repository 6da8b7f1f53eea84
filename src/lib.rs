pub mod backtest;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod optimize;
pub mod pricing;
pub mod signal;
pub mod simulation;

// Re-export commonly used types
pub use backtest::{estimate_pnl, BacktestConfig, BacktestEngine, BacktestResult, PnlRecord, TradeRecord};
pub use config::{AppConfig, ConfigError};
pub use data::{DataLoader, HistoricalSeries, InMemoryProvider, MarketDataProvider, MarketRow, OandaClient, Quote};
pub use error::{ModelError, ModelResult};
pub use metrics::{MetricsCalculator, PerformanceMetrics};
pub use monitor::{HistoryBuffer, LiveMonitor, MonitorConfig, MonitorSnapshot, MonitorState};
pub use optimize::{ParameterGrid, ParameterSweep, SweepResult, SweepRow};
pub use pricing::{deviation_bps, observed_forward, theoretical_forward, ForwardPair, RateAssumptions};
pub use signal::{classify, Signal};
pub use simulation::{MonteCarloSimulator, PnlDistribution, PnlMatrix, SimulationConfig};
