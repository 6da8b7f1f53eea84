//! Per-step trade records for the historical backtest.
//!
//! Every evaluated row produces a `TradeRecord`, directional or not; rows
//! that fail produce a `StepFailure` instead.

use chrono::NaiveDate;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::signal::Signal;

use super::pnl::PnlRecord;

/// Convert a currency amount to `Decimal` rounded to cents.
pub fn to_money(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default().round_dp(2)
}

/// How a step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeOutcome {
    /// Deviation within threshold.
    NoTrade,
    /// Net PnL above zero.
    Win,
    /// Net PnL at or below zero, above the stop.
    Loss,
    /// Loss capped by the stop-loss floor.
    StoppedOut,
}

/// Evaluation of one historical row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Entry date.
    pub date: NaiveDate,
    /// Date of the exit spot (`tenor_days` rows later).
    pub exit_date: NaiveDate,
    pub spot: f64,
    pub exit_spot: f64,
    /// Swap points used, after forward fill.
    pub swap_points: f64,
    /// True when `swap_points` was carried from an earlier row.
    pub swap_filled: bool,
    pub theoretical_forward: f64,
    pub observed_forward: f64,
    pub deviation_bps: f64,
    pub signal: Signal,
    pub pnl: PnlRecord,
}

impl TradeRecord {
    pub fn is_trade(&self) -> bool {
        self.pnl.is_trade()
    }

    pub fn is_winner(&self) -> bool {
        self.pnl.is_winner()
    }

    pub fn outcome(&self) -> TradeOutcome {
        if !self.is_trade() {
            TradeOutcome::NoTrade
        } else if self.pnl.stopped_out() {
            TradeOutcome::StoppedOut
        } else if self.is_winner() {
            TradeOutcome::Win
        } else {
            TradeOutcome::Loss
        }
    }

    /// Net PnL in cents.
    pub fn pnl(&self) -> Decimal {
        to_money(self.pnl.clamped_pnl)
    }

    /// Spread paid in cents.
    pub fn spread_cost(&self) -> Decimal {
        to_money(self.pnl.spread_cost)
    }
}

/// A row that could not be evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailure {
    pub date: NaiveDate,
    /// Error tag, see `ModelError::kind`.
    pub kind: String,
    pub message: String,
}

impl StepFailure {
    pub fn new(date: NaiveDate, error: &ModelError) -> Self {
        Self {
            date,
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}
