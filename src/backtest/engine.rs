//! Historical backtest driver.
//!
//! Runs one pass over aligned daily rows:
//! 1. Forward-fill missing swap points from the last known value
//! 2. Price the theoretical and observed forwards
//! 3. Classify the deviation
//! 4. Estimate PnL against the spot `tenor_days` rows ahead
//! 5. Accumulate equity and summary statistics
//!
//! A failing row is recorded and skipped; the run continues.

use chrono::NaiveDate;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::data::{HistoricalSeries, MarketRow};
use crate::error::{ModelError, ModelResult};
use crate::pricing::{observed_forward, ForwardPair, RateAssumptions};
use crate::signal::DeviationSignal;

use super::pnl::TradeCosts;
use super::trade::{StepFailure, TradeRecord};

/// Configuration for backtest execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Forward tenor in days; also the holding period in rows.
    pub tenor_days: u32,

    /// Annual simple domestic rate.
    pub r_dom: f64,

    /// Annual simple foreign rate.
    pub r_for: f64,

    /// Trade notional in quote currency.
    pub notional: f64,

    /// Minimum absolute deviation to trade (bps).
    pub threshold_bps: f64,

    /// Spread cost per trade (bps of notional).
    pub spread_bps: f64,

    /// Stop-loss floor (bps of notional).
    pub stop_loss_bps: f64,

    /// Days of history to request from a provider.
    pub history_days: u32,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            tenor_days: 30,
            r_dom: 0.025,
            r_for: 0.005,
            notional: 1_000_000.0,
            threshold_bps: 0.0,
            spread_bps: 0.5,
            stop_loss_bps: 5.0,
            history_days: 365,
        }
    }
}

impl BacktestConfig {
    pub fn rates(&self) -> RateAssumptions {
        RateAssumptions::new(self.r_dom, self.r_for, self.tenor_days)
    }

    pub fn costs(&self) -> TradeCosts {
        TradeCosts {
            notional: self.notional,
            spread_bps: self.spread_bps,
            stop_loss_bps: self.stop_loss_bps,
        }
    }

    /// Same configuration with a different threshold / stop / spread.
    pub fn with_parameters(&self, threshold_bps: f64, stop_loss_bps: f64, spread_bps: f64) -> Self {
        Self {
            threshold_bps,
            stop_loss_bps,
            spread_bps,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> ModelResult<()> {
        if self.tenor_days == 0 {
            return Err(ModelError::config("tenor_days must be positive"));
        }
        if self.threshold_bps.is_nan() || self.threshold_bps < 0.0 {
            return Err(ModelError::config(format!(
                "threshold_bps must be non-negative, got {}",
                self.threshold_bps
            )));
        }
        if !self.r_dom.is_finite() || !self.r_for.is_finite() {
            return Err(ModelError::config("rates must be finite"));
        }
        self.costs().validate()
    }
}

/// Cumulative PnL after one evaluated row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub pnl: Decimal,
    pub equity: Decimal,
    pub drawdown: Decimal,
}

/// Result of a completed backtest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Pair tested.
    pub pair: String,

    /// Configuration used.
    pub config: BacktestConfig,

    /// First and last evaluated date.
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,

    /// One record per evaluated row.
    pub trades: Vec<TradeRecord>,

    /// Cumulative PnL per evaluated row.
    pub equity_curve: Vec<EquityPoint>,

    /// Rows that failed to evaluate.
    pub failures: Vec<StepFailure>,

    /// Trailing rows without an exit spot.
    pub excluded_rows: usize,

    /// Sum of net PnL.
    pub total_pnl: Decimal,

    /// Directional trades.
    pub num_trades: usize,

    /// Directional trades with net PnL > 0.
    pub winning_trades: usize,

    /// winning_trades / num_trades (0 with no trades).
    pub win_rate: f64,

    /// total_pnl / num_trades (0 with no trades).
    pub avg_pnl: Decimal,

    /// Largest peak-to-trough decline of the equity curve.
    pub max_drawdown: Decimal,
}

impl BacktestResult {
    pub fn losing_trades(&self) -> usize {
        self.num_trades - self.winning_trades
    }

    pub fn final_equity(&self) -> Decimal {
        self.equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(Decimal::ZERO)
    }

    /// Directional trades only.
    pub fn directional_trades(&self) -> impl Iterator<Item = &TradeRecord> {
        self.trades.iter().filter(|t| t.is_trade())
    }

    /// Generate summary string.
    pub fn summary(&self) -> String {
        let period = match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => format!("{} to {}", start, end),
            _ => "no rows".to_string(),
        };
        format!(
            "Backtest Results for {} ({}d tenor, {})\n\
             ----------------------------------------\n\
             Total PnL:         ${:.0}\n\
             Number of trades:  {}\n\
             Win rate:          {:.1}%\n\
             Avg PnL/trade:     ${:.0}\n\
             Max Drawdown:      ${:.0}\n\
             \n\
             Rows evaluated: {} (failed: {}, excluded: {})",
            self.pair,
            self.config.tenor_days,
            period,
            self.total_pnl,
            self.num_trades,
            self.win_rate * 100.0,
            self.avg_pnl,
            self.max_drawdown,
            self.trades.len(),
            self.failures.len(),
            self.excluded_rows,
        )
    }
}

/// The backtest driver.
#[derive(Debug, Clone)]
pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Run against a provider series (swap points reindexed onto spot dates).
    pub fn run_series(&self, series: &HistoricalSeries) -> ModelResult<BacktestResult> {
        self.run(&series.pair, &series.align())
    }

    /// Run over rows sorted by strictly increasing date.
    ///
    /// Configuration errors and unordered input abort the run; per-row
    /// errors are collected in `failures`.
    pub fn run(&self, pair: &str, rows: &[MarketRow]) -> ModelResult<BacktestResult> {
        self.config.validate()?;
        if let Some(w) = rows.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(ModelError::config(format!(
                "rows must be in increasing date order ({} follows {})",
                w[1].date, w[0].date
            )));
        }

        let tenor = self.config.tenor_days as usize;
        let mut trades = Vec::with_capacity(rows.len().saturating_sub(tenor));
        let mut failures = Vec::new();
        let mut excluded_rows = 0;
        let mut last_swap: Option<f64> = None;

        for (i, row) in rows.iter().enumerate() {
            let swap_filled = row.swap_points.is_none() && last_swap.is_some();
            if row.swap_points.is_some() {
                last_swap = row.swap_points;
            }

            let Some(exit) = rows.get(i + tenor) else {
                excluded_rows += 1;
                continue;
            };

            match self.evaluate_row(row, last_swap, swap_filled, exit) {
                Ok(record) => {
                    debug!(
                        "{} dev={:.3}bps signal={} pnl={:.2}",
                        record.date, record.deviation_bps, record.signal, record.pnl.clamped_pnl
                    );
                    trades.push(record);
                }
                Err(e) => {
                    warn!("{} {}: skipped ({})", pair, row.date, e);
                    failures.push(StepFailure::new(row.date, &e));
                }
            }
        }

        let result = self.build_result(pair, trades, failures, excluded_rows);
        info!(
            "Backtest {}: {} rows, {} trades, total PnL {}",
            pair,
            result.trades.len(),
            result.num_trades,
            result.total_pnl
        );
        Ok(result)
    }

    /// Evaluate one row with an explicit swap value and exit row.
    fn evaluate_row(
        &self,
        row: &MarketRow,
        swap_points: Option<f64>,
        swap_filled: bool,
        exit: &MarketRow,
    ) -> ModelResult<TradeRecord> {
        let spot = row.spot.ok_or_else(|| ModelError::MissingData {
            date: row.date,
            what: "spot".to_string(),
        })?;
        let swap_points = swap_points.ok_or_else(|| ModelError::MissingData {
            date: row.date,
            what: "swap_points (no earlier value to carry forward)".to_string(),
        })?;
        let exit_spot = exit.spot.ok_or_else(|| ModelError::MissingData {
            date: exit.date,
            what: format!("exit spot for the {} entry", row.date),
        })?;
        if !exit_spot.is_finite() || exit_spot <= 0.0 {
            return Err(ModelError::InvalidPrice {
                what: format!("exit spot on {}", exit.date),
                value: exit_spot,
            });
        }

        let rates = self.config.rates();
        let observed = observed_forward(spot, swap_points, rates.tenor_days)?;
        let forwards = ForwardPair::evaluate(spot, observed, &rates)?;
        let deviation = DeviationSignal::new(forwards.deviation_bps()?, self.config.threshold_bps)?;
        let pnl = self
            .config
            .costs()
            .estimate(deviation.signal, observed, exit_spot)?;

        Ok(TradeRecord {
            date: row.date,
            exit_date: exit.date,
            spot,
            exit_spot,
            swap_points,
            swap_filled,
            theoretical_forward: forwards.theoretical,
            observed_forward: observed,
            deviation_bps: deviation.deviation_bps,
            signal: deviation.signal,
            pnl,
        })
    }

    fn build_result(
        &self,
        pair: &str,
        trades: Vec<TradeRecord>,
        failures: Vec<StepFailure>,
        excluded_rows: usize,
    ) -> BacktestResult {
        let mut equity_curve = Vec::with_capacity(trades.len());
        let mut equity = Decimal::ZERO;
        let mut peak: Option<Decimal> = None;
        let mut max_drawdown = Decimal::ZERO;

        for trade in &trades {
            let pnl = Decimal::from_f64(trade.pnl.clamped_pnl).unwrap_or_default();
            equity += pnl;
            // running peak starts at the first equity value
            let running_peak = peak.map_or(equity, |p| p.max(equity));
            peak = Some(running_peak);
            let drawdown = running_peak - equity;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
            equity_curve.push(EquityPoint {
                date: trade.date,
                pnl: pnl.round_dp(2),
                equity: equity.round_dp(2),
                drawdown: drawdown.round_dp(2),
            });
        }

        let num_trades = trades.iter().filter(|t| t.is_trade()).count();
        let winning_trades = trades.iter().filter(|t| t.is_winner()).count();
        let win_rate = if num_trades == 0 {
            0.0
        } else {
            winning_trades as f64 / num_trades as f64
        };
        let avg_pnl = if num_trades == 0 {
            Decimal::ZERO
        } else {
            (equity / Decimal::from(num_trades as u64)).round_dp(2)
        };

        BacktestResult {
            pair: pair.to_string(),
            config: self.config.clone(),
            start_date: trades.first().map(|t| t.date),
            end_date: trades.last().map(|t| t.date),
            total_pnl: equity.round_dp(2),
            num_trades,
            winning_trades,
            win_rate,
            avg_pnl,
            max_drawdown: max_drawdown.round_dp(2),
            trades,
            equity_curve,
            failures,
            excluded_rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::TradeOutcome;
    use crate::signal::Signal;
    use rust_decimal_macros::dec;

    fn date(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(offset)
    }

    /// Swap points that make the observed forward equal the theoretical one.
    fn fair_swap(spot: f64, config: &BacktestConfig) -> f64 {
        let theo = config.rates().theoretical_forward(spot).unwrap();
        (theo - spot) * 360.0 / config.tenor_days as f64
    }

    fn short_config() -> BacktestConfig {
        BacktestConfig {
            tenor_days: 2,
            threshold_bps: 1.0,
            spread_bps: 0.5,
            stop_loss_bps: 5.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = BacktestConfig::default();
        assert_eq!(config.tenor_days, 30);
        assert_eq!(config.notional, 1_000_000.0);
        assert_eq!(config.spread_bps, 0.5);
        assert_eq!(config.stop_loss_bps, 5.0);
        assert_eq!(config.history_days, 365);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deviations_inside_threshold_produce_no_trades() {
        let config = short_config();
        let rows: Vec<MarketRow> = (0..10)
            .map(|i| {
                let spot = 1.10 + 0.001 * i as f64;
                MarketRow::new(date(i), spot, Some(fair_swap(spot, &config)))
            })
            .collect();

        let result = BacktestEngine::new(config).run("EUR_USD", &rows).unwrap();
        assert_eq!(result.total_pnl, Decimal::ZERO);
        assert_eq!(result.num_trades, 0);
        assert_eq!(result.win_rate, 0.0);
        assert_eq!(result.max_drawdown, Decimal::ZERO);
        assert_eq!(result.trades.len(), 8);
        assert_eq!(result.excluded_rows, 2);
        assert!(result.failures.is_empty());
    }

    #[test]
    fn test_rich_forward_is_sold() {
        let config = short_config();
        let spot = 1.2;
        // observed forward 10 bps above fair, spot unchanged at exit
        let swap = fair_swap(spot, &config) + 0.0012 * 360.0 / 2.0;
        let rows = vec![
            MarketRow::new(date(0), spot, Some(swap)),
            MarketRow::new(date(1), spot, Some(swap)),
            MarketRow::new(date(2), spot, Some(swap)),
        ];

        let result = BacktestEngine::new(config).run("EUR_USD", &rows).unwrap();
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.signal, Signal::Sell);
        assert!(trade.deviation_bps > 1.0);
        // sold forward converges to spot, gain exceeds spread
        assert!(trade.pnl.raw_pnl > 0.0);
        assert_eq!(result.num_trades, 1);
        assert_eq!(result.winning_trades, 1);
        assert_eq!(result.win_rate, 1.0);
        assert_eq!(result.avg_pnl, result.total_pnl);
    }

    #[test]
    fn test_swap_gaps_are_forward_filled() {
        let config = short_config();
        let swap = fair_swap(1.1, &config);
        let rows = vec![
            MarketRow::new(date(0), 1.1, None),
            MarketRow::new(date(1), 1.1, Some(swap)),
            MarketRow::new(date(2), 1.1, None),
            MarketRow::new(date(3), 1.1, None),
            MarketRow::new(date(4), 1.1, Some(swap)),
        ];

        let result = BacktestEngine::new(config).run("EUR_USD", &rows).unwrap();
        // leading gap has nothing to carry forward
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].date, date(0));
        assert_eq!(result.failures[0].kind, "missing_data");

        assert_eq!(result.trades.len(), 2);
        assert!(!result.trades[0].swap_filled);
        assert!(result.trades[1].swap_filled);
        assert_eq!(result.trades[1].swap_points, swap);
        assert_eq!(result.excluded_rows, 2);
    }

    #[test]
    fn test_drawdown_from_first_equity_point() {
        let config = BacktestConfig {
            tenor_days: 1,
            threshold_bps: 0.0,
            spread_bps: 0.0,
            stop_loss_bps: 10_000.0,
            notional: 1_000_000.0,
            ..Default::default()
        };
        let engine = BacktestEngine::new(config.clone());

        // zero swap points: observed = spot, below fair, so every row buys
        let spots = [1.0, 1.0001, 0.9998, 0.9999];
        let rows: Vec<MarketRow> = spots
            .iter()
            .enumerate()
            .map(|(i, &s)| MarketRow::new(date(i as i64), s, Some(0.0)))
            .collect();

        let result = engine.run("EUR_USD", &rows).unwrap();
        assert_eq!(result.trades.len(), 3);
        assert!(result.trades.iter().all(|t| t.signal == Signal::Buy));

        // pnl = exit - observed(=spot): +100, -300, +100
        let pnls: Vec<Decimal> = result.equity_curve.iter().map(|p| p.pnl).collect();
        assert_eq!(pnls, vec![dec!(100), dec!(-300), dec!(100)]);
        assert_eq!(result.total_pnl, dec!(-100));
        assert_eq!(result.max_drawdown, dec!(300));
        assert_eq!(result.winning_trades, 2);
        assert_eq!(result.avg_pnl, dec!(-33.33));
        assert_eq!(result.final_equity(), dec!(-100));
    }

    #[test]
    fn test_break_even_trade_is_not_a_win() {
        let config = BacktestConfig {
            tenor_days: 1,
            threshold_bps: 0.0,
            spread_bps: 1.0,
            stop_loss_bps: 5.0,
            ..Default::default()
        };
        // buy at 1.0010, exit 1.0011: +100 gross, 100 spread
        let rows = vec![
            MarketRow::new(date(0), 1.0010, Some(0.0)),
            MarketRow::new(date(1), 1.0011, Some(0.0)),
        ];

        let result = BacktestEngine::new(config).run("EUR_USD", &rows).unwrap();
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert!(trade.is_trade());
        assert_eq!(trade.pnl(), Decimal::ZERO);
        assert!(!trade.is_winner());
        assert_eq!(trade.outcome(), TradeOutcome::Loss);
        assert_eq!(result.num_trades, 1);
        assert_eq!(result.winning_trades, 0);
        assert_eq!(result.win_rate, 0.0);
        assert_eq!(result.total_pnl, Decimal::ZERO);
    }

    #[test]
    fn test_missing_spot_is_recorded_and_keeps_exits_aligned() {
        let config = BacktestConfig {
            tenor_days: 1,
            ..short_config()
        };
        let rows = vec![
            MarketRow::new(date(0), 1.10, Some(0.0)),
            MarketRow::spot_gap(date(1), Some(0.0)),
            MarketRow::new(date(2), 1.30, Some(0.0)),
            MarketRow::new(date(3), 1.31, Some(0.0)),
        ];

        let result = BacktestEngine::new(config).run("EUR_USD", &rows).unwrap();

        // date(0) exits into the gap and date(1) has no entry spot
        assert_eq!(result.failures.len(), 2);
        assert_eq!(result.failures[0].date, date(0));
        assert_eq!(result.failures[0].kind, "missing_data");
        assert_eq!(result.failures[1].date, date(1));
        assert_eq!(result.failures[1].kind, "missing_data");

        // date(2) still exits on date(3), not one row later
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].date, date(2));
        assert_eq!(result.trades[0].exit_date, date(3));
        assert_eq!(result.excluded_rows, 1);
    }

    #[test]
    fn test_invalid_config_aborts() {
        let config = BacktestConfig {
            threshold_bps: -1.0,
            ..Default::default()
        };
        let rows = vec![MarketRow::new(date(0), 1.1, Some(0.0))];
        assert!(matches!(
            BacktestEngine::new(config).run("EUR_USD", &rows),
            Err(ModelError::Configuration(_))
        ));
    }

    #[test]
    fn test_unordered_rows_rejected() {
        let rows = vec![
            MarketRow::new(date(1), 1.1, Some(0.0)),
            MarketRow::new(date(0), 1.1, Some(0.0)),
        ];
        assert!(BacktestEngine::new(BacktestConfig::default())
            .run("EUR_USD", &rows)
            .is_err());
    }

    #[test]
    fn test_series_shorter_than_tenor() {
        let rows: Vec<MarketRow> = (0..5).map(|i| MarketRow::new(date(i), 1.1, Some(0.0))).collect();
        let result = BacktestEngine::new(BacktestConfig::default())
            .run("EUR_USD", &rows)
            .unwrap();
        assert!(result.trades.is_empty());
        assert_eq!(result.excluded_rows, 5);
        assert_eq!(result.start_date, None);
        assert!(result.summary().contains("no rows"));
    }
}
