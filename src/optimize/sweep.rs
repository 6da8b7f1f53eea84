//! Parameter sweep over threshold, stop-loss and spread.
//!
//! One backtest per combination, run sequentially over the same rows.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backtest::{BacktestConfig, BacktestEngine, BacktestResult};
use crate::data::MarketRow;

/// Parameter values to sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterGrid {
    /// Signal thresholds (bps).
    pub thresholds_bps: Vec<f64>,
    /// Stop-loss floors (bps).
    pub stop_losses_bps: Vec<f64>,
    /// Spread costs (bps).
    pub spreads_bps: Vec<f64>,
}

impl Default for ParameterGrid {
    fn default() -> Self {
        Self {
            thresholds_bps: vec![0.5, 1.0, 2.0, 3.0],
            stop_losses_bps: vec![2.0, 5.0, 10.0],
            spreads_bps: vec![0.1, 0.5, 1.0],
        }
    }
}

impl ParameterGrid {
    /// Calculate total number of parameter combinations.
    pub fn total_combinations(&self) -> usize {
        self.thresholds_bps.len() * self.stop_losses_bps.len() * self.spreads_bps.len()
    }

    /// All combinations, threshold outermost and spread innermost.
    pub fn combinations(&self) -> Vec<ParameterSet> {
        let mut combos = Vec::with_capacity(self.total_combinations());

        for &threshold_bps in &self.thresholds_bps {
            for &stop_loss_bps in &self.stop_losses_bps {
                for &spread_bps in &self.spreads_bps {
                    combos.push(ParameterSet {
                        threshold_bps,
                        stop_loss_bps,
                        spread_bps,
                    });
                }
            }
        }

        combos
    }
}

/// A single parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub threshold_bps: f64,
    pub stop_loss_bps: f64,
    pub spread_bps: f64,
}

impl ParameterSet {
    /// Apply this parameter set to a backtest config.
    pub fn apply_to_config(&self, config: &BacktestConfig) -> BacktestConfig {
        config.with_parameters(self.threshold_bps, self.stop_loss_bps, self.spread_bps)
    }

    pub fn key(&self) -> String {
        format!(
            "th{:.2}_sl{:.2}_sp{:.2}",
            self.threshold_bps, self.stop_loss_bps, self.spread_bps
        )
    }
}

/// Summary of one combination, as exported to CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    pub threshold_bps: f64,
    pub stop_loss_bps: f64,
    pub spread_bps: f64,
    pub total_pnl: Decimal,
    pub num_trades: usize,
    pub win_rate: f64,
    pub avg_pnl: Decimal,
    pub max_drawdown: Decimal,
}

impl SweepRow {
    pub fn from_result(params: &ParameterSet, result: &BacktestResult) -> Self {
        Self {
            threshold_bps: params.threshold_bps,
            stop_loss_bps: params.stop_loss_bps,
            spread_bps: params.spread_bps,
            total_pnl: result.total_pnl,
            num_trades: result.num_trades,
            win_rate: result.win_rate,
            avg_pnl: result.avg_pnl,
            max_drawdown: result.max_drawdown,
        }
    }

    pub fn params(&self) -> ParameterSet {
        ParameterSet {
            threshold_bps: self.threshold_bps,
            stop_loss_bps: self.stop_loss_bps,
            spread_bps: self.spread_bps,
        }
    }
}

/// A combination that could not be run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepFailure {
    pub params: ParameterSet,
    pub kind: String,
    pub message: String,
}

/// Complete sweep output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepResult {
    pub pair: String,
    /// Rows in combination order.
    pub rows: Vec<SweepRow>,
    pub failures: Vec<SweepFailure>,
}

impl SweepResult {
    /// Best `n` rows by total PnL, highest first.
    pub fn top_by_total_pnl(&self, n: usize) -> Vec<SweepRow> {
        top_by_total_pnl(&self.rows, n)
    }

    pub fn best(&self) -> Option<SweepRow> {
        self.top_by_total_pnl(1).into_iter().next()
    }
}

/// Sort rows by total PnL descending (stable) and keep the first `n`.
pub fn top_by_total_pnl(rows: &[SweepRow], n: usize) -> Vec<SweepRow> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| b.total_pnl.cmp(&a.total_pnl));
    sorted.truncate(n);
    sorted
}

/// Sequential grid search over one set of rows.
pub struct ParameterSweep {
    base_config: BacktestConfig,
    grid: ParameterGrid,
}

impl ParameterSweep {
    pub fn new(base_config: BacktestConfig) -> Self {
        Self {
            base_config,
            grid: ParameterGrid::default(),
        }
    }

    /// Set parameter grid.
    pub fn with_grid(mut self, grid: ParameterGrid) -> Self {
        self.grid = grid;
        self
    }

    pub fn grid(&self) -> &ParameterGrid {
        &self.grid
    }

    pub fn run(&self, pair: &str, rows: &[MarketRow]) -> SweepResult {
        self.run_with_progress(pair, rows, |_, _| {})
    }

    /// Run every combination; `on_progress(done, total)` fires after each.
    pub fn run_with_progress<F>(&self, pair: &str, rows: &[MarketRow], mut on_progress: F) -> SweepResult
    where
        F: FnMut(usize, usize),
    {
        let combos = self.grid.combinations();
        let total = combos.len();
        info!("Sweeping {} parameter combinations for {}", total, pair);

        let mut result = SweepResult {
            pair: pair.to_string(),
            ..Default::default()
        };

        for (i, params) in combos.iter().enumerate() {
            let engine = BacktestEngine::new(params.apply_to_config(&self.base_config));
            match engine.run(pair, rows) {
                Ok(backtest) => result.rows.push(SweepRow::from_result(params, &backtest)),
                Err(e) => {
                    warn!("Combination {} failed: {}", params.key(), e);
                    result.failures.push(SweepFailure {
                        params: *params,
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    });
                }
            }
            on_progress(i + 1, total);
        }

        if let Some(best) = result.best() {
            info!(
                "Best of {}: {} total PnL {}",
                result.rows.len(),
                best.params().key(),
                best.total_pnl
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn rows() -> Vec<MarketRow> {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let spots = [1.0, 1.0005, 1.0002, 1.0010, 1.0011, 1.0004];
        spots
            .iter()
            .enumerate()
            .map(|(i, &s)| MarketRow::new(start + chrono::Duration::days(i as i64), s, Some(0.0)))
            .collect()
    }

    fn base() -> BacktestConfig {
        BacktestConfig {
            tenor_days: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_grid() {
        let grid = ParameterGrid::default();
        assert_eq!(grid.total_combinations(), 36);
        let combos = grid.combinations();
        assert_eq!(combos.len(), 36);
        assert_eq!(
            combos[0],
            ParameterSet {
                threshold_bps: 0.5,
                stop_loss_bps: 2.0,
                spread_bps: 0.1
            }
        );
        assert_eq!(combos[1].spread_bps, 0.5);
    }

    #[test]
    fn test_parameter_set_apply() {
        let params = ParameterSet {
            threshold_bps: 2.0,
            stop_loss_bps: 10.0,
            spread_bps: 1.0,
        };
        let config = params.apply_to_config(&BacktestConfig::default());
        assert_eq!(config.threshold_bps, 2.0);
        assert_eq!(config.stop_loss_bps, 10.0);
        assert_eq!(config.spread_bps, 1.0);
        assert_eq!(config.tenor_days, 30);
        assert_eq!(params.key(), "th2.00_sl10.00_sp1.00");
    }

    #[test]
    fn test_sweep_runs_every_combination() {
        let mut calls = Vec::new();
        let result = ParameterSweep::new(base()).run_with_progress("EUR_USD", &rows(), |done, total| {
            calls.push((done, total));
        });
        assert_eq!(result.rows.len(), 36);
        assert!(result.failures.is_empty());
        assert_eq!(calls.len(), 36);
        assert_eq!(calls.last(), Some(&(36, 36)));

        // threshold above every |deviation| (~0.56 bps) never trades
        let idle = result.rows.iter().filter(|r| r.threshold_bps >= 1.0);
        for row in idle {
            assert_eq!(row.num_trades, 0);
            assert_eq!(row.total_pnl, Decimal::ZERO);
        }
    }

    #[test]
    fn test_failing_combination_is_recorded() {
        let grid = ParameterGrid {
            thresholds_bps: vec![0.0, -1.0],
            stop_losses_bps: vec![5.0],
            spreads_bps: vec![0.5],
        };
        let result = ParameterSweep::new(base()).with_grid(grid).run("EUR_USD", &rows());
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].kind, "configuration");
        assert_eq!(result.failures[0].params.threshold_bps, -1.0);
    }

    #[test]
    fn test_top_by_total_pnl() {
        let row = |th: f64, pnl: Decimal| SweepRow {
            threshold_bps: th,
            stop_loss_bps: 5.0,
            spread_bps: 0.5,
            total_pnl: pnl,
            num_trades: 1,
            win_rate: 1.0,
            avg_pnl: pnl,
            max_drawdown: Decimal::ZERO,
        };
        let rows = vec![row(0.5, dec!(10)), row(1.0, dec!(300)), row(2.0, dec!(-50)), row(3.0, dec!(300))];
        let top = top_by_total_pnl(&rows, 3);
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].threshold_bps, 1.0);
        // ties keep input order
        assert_eq!(top[1].threshold_bps, 3.0);
        assert_eq!(top[2].total_pnl, dec!(10));
        assert_eq!(top_by_total_pnl(&rows, 10).len(), 4);
    }
}
