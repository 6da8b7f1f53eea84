//! Historical backtest for CIP forward arbitrage.
//!
//! This module provides:
//! - Per-trade PnL estimate (spread cost, stop-loss floor)
//! - Per-step trade records and failure records
//! - The single-pass driver with summary statistics

pub mod engine;
pub mod pnl;
pub mod trade;

pub use engine::{BacktestConfig, BacktestEngine, BacktestResult, EquityPoint};
pub use pnl::{estimate_pnl, PnlRecord, TradeCosts};
pub use trade::{to_money, StepFailure, TradeOutcome, TradeRecord};
