//! Performance metrics module.
//!
//! Extended statistics over a backtest result:
//! - Win rate, profit factor, winner/loser breakdown
//! - Stop-outs and spread cost
//! - Drawdown with peak, trough and recovery dates
//! - Monthly PnL

pub mod calculator;

pub use calculator::{DrawdownAnalysis, MetricsCalculator, MonthlyPnl, PerformanceMetrics};
