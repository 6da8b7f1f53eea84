//! Performance metrics calculator.
//!
//! Derives trade and drawdown statistics from a backtest result.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

use crate::backtest::{BacktestResult, EquityPoint, TradeOutcome, TradeRecord};
use crate::signal::Signal;

/// Extended performance metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    // Basic statistics
    pub rows_evaluated: usize,
    pub total_trades: usize,
    pub buy_trades: usize,
    pub sell_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub stopped_out: usize,
    pub win_rate: f64,

    // P&L metrics
    pub total_pnl: Decimal,
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,
    pub profit_factor: f64,
    pub avg_trade_pnl: Decimal,
    pub avg_winner: Decimal,
    pub avg_loser: Decimal,
    pub largest_winner: Decimal,
    pub largest_loser: Decimal,

    // Signal metrics
    pub avg_abs_deviation_bps: f64,

    // Risk metrics
    pub max_drawdown: Decimal,
    pub drawdown_duration_days: i64,

    // Costs
    pub total_spread_cost: Decimal,
    pub spread_pct_of_gross: f64,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            rows_evaluated: 0,
            total_trades: 0,
            buy_trades: 0,
            sell_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            stopped_out: 0,
            win_rate: 0.0,
            total_pnl: Decimal::ZERO,
            gross_profit: Decimal::ZERO,
            gross_loss: Decimal::ZERO,
            profit_factor: 0.0,
            avg_trade_pnl: Decimal::ZERO,
            avg_winner: Decimal::ZERO,
            avg_loser: Decimal::ZERO,
            largest_winner: Decimal::ZERO,
            largest_loser: Decimal::ZERO,
            avg_abs_deviation_bps: 0.0,
            max_drawdown: Decimal::ZERO,
            drawdown_duration_days: 0,
            total_spread_cost: Decimal::ZERO,
            spread_pct_of_gross: 0.0,
        }
    }
}

impl PerformanceMetrics {
    /// Generate a summary report.
    pub fn summary(&self) -> String {
        format!(
            "Performance Summary\n\
             ====================\n\
             \n\
             Trades: {} of {} rows (Buy: {}, Sell: {})\n\
             W: {}, L: {}, stopped out: {}\n\
             Win Rate: {:.1}%\n\
             Profit Factor: {:.2}\n\
             \n\
             Total P&L: ${:.2}\n\
             Avg Trade: ${:.2}\n\
             Avg Winner: ${:.2}\n\
             Avg Loser: ${:.2}\n\
             Largest Win: ${:.2}\n\
             Largest Loss: ${:.2}\n\
             \n\
             Avg |deviation|: {:.2} bps\n\
             Max Drawdown: ${:.2} ({} days)\n\
             Spread Cost: ${:.2} ({:.2}% of gross)",
            self.total_trades,
            self.rows_evaluated,
            self.buy_trades,
            self.sell_trades,
            self.winning_trades,
            self.losing_trades,
            self.stopped_out,
            self.win_rate * 100.0,
            self.profit_factor,
            self.total_pnl,
            self.avg_trade_pnl,
            self.avg_winner,
            self.avg_loser,
            self.largest_winner,
            self.largest_loser,
            self.avg_abs_deviation_bps,
            self.max_drawdown,
            self.drawdown_duration_days,
            self.total_spread_cost,
            self.spread_pct_of_gross,
        )
    }
}

/// Drawdown analysis details.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrawdownAnalysis {
    pub max_drawdown: Decimal,
    /// Date of the peak preceding the deepest trough.
    pub peak_date: Option<NaiveDate>,
    /// Date of the deepest trough.
    pub trough_date: Option<NaiveDate>,
    /// First date equity regained the peak after the trough.
    pub recovery_date: Option<NaiveDate>,
    /// Peak to trough, in calendar days.
    pub duration_days: i64,
    pub drawdown_periods: usize,
}

/// Monthly PnL breakdown, keyed by entry date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyPnl {
    pub year: i32,
    pub month: u32,
    pub pnl: Decimal,
    pub trades: usize,
    pub win_rate: f64,
}

/// Metrics calculator.
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Calculate all metrics from a backtest result.
    pub fn calculate(result: &BacktestResult) -> PerformanceMetrics {
        let trades: Vec<&TradeRecord> = result.directional_trades().collect();

        let total_trades = trades.len();
        let buy_trades = trades.iter().filter(|t| t.signal == Signal::Buy).count();
        let sell_trades = total_trades - buy_trades;
        let winning_trades = trades.iter().filter(|t| t.is_winner()).count();
        let losing_trades = total_trades - winning_trades;
        let stopped_out = trades
            .iter()
            .filter(|t| t.outcome() == TradeOutcome::StoppedOut)
            .count();
        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64
        } else {
            0.0
        };

        let gross_profit: Decimal = trades
            .iter()
            .filter(|t| t.is_winner())
            .map(|t| t.pnl())
            .sum();
        let gross_loss: Decimal = trades
            .iter()
            .filter(|t| !t.is_winner())
            .map(|t| t.pnl())
            .sum();
        let profit_factor = Self::calculate_profit_factor(gross_profit, gross_loss);

        let avg_winner = if winning_trades > 0 {
            (gross_profit / Decimal::from(winning_trades as u64)).round_dp(2)
        } else {
            Decimal::ZERO
        };
        let avg_loser = if losing_trades > 0 {
            (gross_loss / Decimal::from(losing_trades as u64)).round_dp(2)
        } else {
            Decimal::ZERO
        };

        let largest_winner = trades
            .iter()
            .filter(|t| t.is_winner())
            .map(|t| t.pnl())
            .max()
            .unwrap_or(Decimal::ZERO);
        let largest_loser = trades
            .iter()
            .filter(|t| !t.is_winner())
            .map(|t| t.pnl())
            .min()
            .unwrap_or(Decimal::ZERO);

        let avg_abs_deviation_bps = if total_trades > 0 {
            trades.iter().map(|t| t.deviation_bps.abs()).sum::<f64>() / total_trades as f64
        } else {
            0.0
        };

        let drawdown = Self::analyze_drawdown(&result.equity_curve);

        let total_spread_cost: Decimal = trades.iter().map(|t| t.spread_cost()).sum();
        let gross = trades
            .iter()
            .map(|t| t.pnl.raw_pnl.abs())
            .sum::<f64>();
        let spread_pct_of_gross = if gross > 0.0 {
            total_spread_cost.to_f64().unwrap_or(0.0) / gross * 100.0
        } else {
            0.0
        };

        PerformanceMetrics {
            rows_evaluated: result.trades.len(),
            total_trades,
            buy_trades,
            sell_trades,
            winning_trades,
            losing_trades,
            stopped_out,
            win_rate,
            total_pnl: result.total_pnl,
            gross_profit,
            gross_loss,
            profit_factor,
            avg_trade_pnl: result.avg_pnl,
            avg_winner,
            avg_loser,
            largest_winner,
            largest_loser,
            avg_abs_deviation_bps,
            max_drawdown: drawdown.max_drawdown,
            drawdown_duration_days: drawdown.duration_days,
            total_spread_cost,
            spread_pct_of_gross,
        }
    }

    /// Calculate profit factor.
    fn calculate_profit_factor(gross_profit: Decimal, gross_loss: Decimal) -> f64 {
        let loss = gross_loss.abs().to_f64().unwrap_or(0.0);
        let profit = gross_profit.to_f64().unwrap_or(0.0);
        if loss == 0.0 {
            return if profit > 0.0 { f64::INFINITY } else { 0.0 };
        }
        profit / loss
    }

    /// Analyze drawdown from the equity curve.
    ///
    /// The running peak starts at the first equity point.
    pub fn analyze_drawdown(equity_curve: &[EquityPoint]) -> DrawdownAnalysis {
        let Some(first) = equity_curve.first() else {
            return DrawdownAnalysis::default();
        };

        let mut peak = first.equity;
        let mut peak_date = first.date;
        let mut in_drawdown = false;
        let mut periods = 0;

        let mut max_drawdown = Decimal::ZERO;
        let mut max_peak_date = None;
        let mut trough_date = None;
        let mut recovery_date = None;

        for point in equity_curve {
            if point.equity >= peak {
                if in_drawdown {
                    periods += 1;
                    in_drawdown = false;
                    if trough_date.is_some() && recovery_date.is_none() && max_peak_date == Some(peak_date) {
                        recovery_date = Some(point.date);
                    }
                }
                peak = point.equity;
                peak_date = point.date;
                continue;
            }

            in_drawdown = true;
            let drawdown = peak - point.equity;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
                max_peak_date = Some(peak_date);
                trough_date = Some(point.date);
                recovery_date = None;
            }
        }
        if in_drawdown {
            periods += 1;
        }

        let duration_days = match (max_peak_date, trough_date) {
            (Some(peak), Some(trough)) => (trough - peak).num_days(),
            _ => 0,
        };

        DrawdownAnalysis {
            max_drawdown,
            peak_date: max_peak_date,
            trough_date,
            recovery_date,
            duration_days,
            drawdown_periods: periods,
        }
    }

    /// Net PnL of directional trades per entry month.
    pub fn monthly_pnl(result: &BacktestResult) -> Vec<MonthlyPnl> {
        let mut monthly: BTreeMap<(i32, u32), Vec<&TradeRecord>> = BTreeMap::new();

        for trade in result.directional_trades() {
            let key = (trade.date.year(), trade.date.month());
            monthly.entry(key).or_default().push(trade);
        }

        monthly
            .into_iter()
            .map(|((year, month), trades)| {
                let pnl: Decimal = trades.iter().map(|t| t.pnl()).sum();
                let winners = trades.iter().filter(|t| t.is_winner()).count();
                MonthlyPnl {
                    year,
                    month,
                    pnl,
                    trades: trades.len(),
                    win_rate: winners as f64 / trades.len() as f64,
                }
            })
            .collect()
    }
}
