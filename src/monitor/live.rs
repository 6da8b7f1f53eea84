//! Live monitor update cycle.
//!
//! Each call to [`LiveMonitor::update`] fetches a quote per pair, prices the
//! forwards, classifies the deviation and marks PnL against the theoretical
//! forward. Results land in caller-owned history buffers and a snapshot the
//! presentation layer renders as-is.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::backtest::{estimate_pnl, to_money, PnlRecord, TradeCosts};
use crate::data::{MarketDataProvider, ProviderError};
use crate::error::{ModelError, ModelResult};
use crate::pricing::{observed_forward, ForwardPair, RateAssumptions};
use crate::signal::{DeviationSignal, Signal};
use crate::simulation::{MonteCarloSimulator, PnlMatrix, SimulationConfig};

use super::history::{HistoryBuffer, PairHistory, DEFAULT_HISTORY_LEN};

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("No swap points published for {pair} at {tenor_days}D")]
    NoSwapPoints { pair: String, tenor_days: u32 },
}

/// Where the observed forward comes from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForwardSource {
    /// Theoretical forward shifted by a fixed offset.
    Manual { offset_bps: f64 },
    /// Spot plus the provider's swap points for the tenor.
    SwapPoints,
}

impl Default for ForwardSource {
    fn default() -> Self {
        Self::Manual { offset_bps: 0.0 }
    }
}

/// Live monitor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub pairs: Vec<String>,
    pub source: ForwardSource,
    pub tenor_days: u32,
    pub r_dom: f64,
    pub r_for: f64,
    pub notional: f64,
    pub threshold_bps: f64,
    pub stop_loss_bps: f64,
    pub spread_bps: f64,
    /// Entries kept per history series.
    pub history_len: usize,
    /// Settings for [`LiveMonitor::pnl_distribution`].
    pub simulation: SimulationConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            pairs: vec![
                "EUR_USD".to_string(),
                "GBP_USD".to_string(),
                "USD_JPY".to_string(),
            ],
            source: ForwardSource::default(),
            tenor_days: 30,
            r_dom: 0.025,
            r_for: 0.005,
            notional: 1_000_000.0,
            threshold_bps: 1.0,
            stop_loss_bps: 2.0,
            spread_bps: 0.1,
            history_len: DEFAULT_HISTORY_LEN,
            simulation: SimulationConfig::default(),
        }
    }
}

impl MonitorConfig {
    pub fn rates(&self) -> RateAssumptions {
        RateAssumptions::new(self.r_dom, self.r_for, self.tenor_days)
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
        if let ForwardSource::Manual { offset_bps } = self.source {
            if !offset_bps.is_finite() {
                return Err(ModelError::config("manual offset must be finite"));
            }
        }
        if self.history_len == 0 {
            return Err(ModelError::config("history_len must be positive"));
        }
        TradeCosts::new(self.notional, self.spread_bps, self.stop_loss_bps)?;
        self.simulation.validate()
    }
}

/// Caller-owned state carried between update cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorState {
    histories: BTreeMap<String, PairHistory>,
    /// Sum of pair PnL per cycle.
    cycle_pnl: HistoryBuffer<f64>,
    capacity: usize,
    cycles: u64,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}

impl MonitorState {
    pub fn new(capacity: usize) -> Self {
        Self {
            histories: BTreeMap::new(),
            cycle_pnl: HistoryBuffer::new(capacity),
            capacity,
            cycles: 0,
        }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn history(&self, pair: &str) -> Option<&PairHistory> {
        self.histories.get(pair)
    }

    pub fn pairs(&self) -> impl Iterator<Item = &str> {
        self.histories.keys().map(|k| k.as_str())
    }

    /// Cumulative PnL of the buffered history for `pair`.
    pub fn equity_curve(&self, pair: &str) -> Vec<f64> {
        self.histories
            .get(pair)
            .map(|h| h.equity_curve())
            .unwrap_or_default()
    }

    /// Cumulative PnL of all pairs, one point per cycle.
    pub fn combined_equity(&self) -> Vec<f64> {
        self.cycle_pnl
            .iter()
            .scan(0.0, |equity, pnl| {
                *equity += pnl;
                Some(*equity)
            })
            .collect()
    }

    fn record(&mut self, row: &PairSnapshot) {
        let capacity = self.capacity;
        self.histories
            .entry(row.pair.clone())
            .or_insert_with(|| PairHistory::new(capacity))
            .record(row.deviation_bps, row.observed_forward, row.pnl.clamped_pnl);
    }
}

/// Evaluation of one pair in one cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairSnapshot {
    pub pair: String,
    pub timestamp: DateTime<Utc>,
    pub spot_mid: f64,
    pub observed_forward: f64,
    pub theoretical_forward: f64,
    pub deviation_bps: f64,
    pub signal: Signal,
    pub action: String,
    pub pnl: PnlRecord,
}

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryCards {
    /// Sum of this cycle's pair PnL.
    pub total_pnl: Decimal,
    /// Share of this cycle's directional rows with PnL > 0.
    pub win_rate: f64,
    /// Largest decline of the combined equity over buffered cycles.
    pub max_drawdown: Decimal,
    /// Deviation of the first evaluated pair.
    pub current_deviation_bps: Option<f64>,
}

/// Directional signal raised in a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub pair: String,
    pub deviation_bps: f64,
    pub signal: Signal,
    pub message: String,
}

/// A pair that could not be evaluated in a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairFailure {
    pub pair: String,
    pub message: String,
}

/// Output of one update cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub cycle: u64,
    pub rows: Vec<PairSnapshot>,
    pub summary: SummaryCards,
    pub alerts: Vec<Alert>,
    pub failures: Vec<PairFailure>,
}

impl MonitorSnapshot {
    /// Plain-text rendering of the rows and cards.
    pub fn format_table(&self) -> String {
        let mut out = format!(
            "{:<8} {:>12} {:>12} {:>12} {:>9}  {:<34} {:>10}\n",
            "Pair", "Spot Mid", "Observed", "Theoretical", "Dev bps", "Signal", "PnL"
        );
        for r in &self.rows {
            out.push_str(&format!(
                "{:<8} {:>12.6} {:>12.6} {:>12.6} {:>+9.2}  {:<34} {:>10.0}\n",
                r.pair,
                r.spot_mid,
                r.observed_forward,
                r.theoretical_forward,
                r.deviation_bps,
                r.action,
                r.pnl.clamped_pnl,
            ));
        }
        for f in &self.failures {
            out.push_str(&format!("{:<8} failed: {}\n", f.pair, f.message));
        }
        out.push_str(&format!(
            "Total PnL ${:.0} | Win rate {:.1}% | Max DD ${:.0} | Current dev {}\n",
            self.summary.total_pnl,
            self.summary.win_rate * 100.0,
            self.summary.max_drawdown,
            self.summary
                .current_deviation_bps
                .map(|d| format!("{:+.2} bps", d))
                .unwrap_or_else(|| "n/a".to_string()),
        ));
        out
    }
}

fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = match equity.first() {
        Some(&first) => first,
        None => return 0.0,
    };
    let mut max_dd = 0.0_f64;
    for &e in equity {
        peak = peak.max(e);
        max_dd = max_dd.max(peak - e);
    }
    max_dd
}

/// Live monitor.
#[derive(Debug, Clone)]
pub struct LiveMonitor {
    config: MonitorConfig,
}

impl LiveMonitor {
    pub fn new(config: MonitorConfig) -> ModelResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Fresh state sized to the configured history length.
    pub fn new_state(&self) -> MonitorState {
        MonitorState::new(self.config.history_len)
    }

    /// Run one cycle over every configured pair.
    pub fn update<P>(&self, provider: &P, state: &mut MonitorState) -> MonitorSnapshot
    where
        P: MarketDataProvider + ?Sized,
    {
        let mut rows = Vec::with_capacity(self.config.pairs.len());
        let mut failures = Vec::new();

        for pair in &self.config.pairs {
            match self.evaluate_pair(provider, pair) {
                Ok(row) => {
                    state.record(&row);
                    rows.push(row);
                }
                Err(e) => {
                    warn!("{}: skipped this cycle ({})", pair, e);
                    failures.push(PairFailure {
                        pair: pair.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let alerts: Vec<Alert> = rows
            .iter()
            .filter(|r| r.signal.is_directional())
            .map(|r| Alert {
                pair: r.pair.clone(),
                deviation_bps: r.deviation_bps,
                signal: r.signal,
                message: format!(
                    "Arb alert: {} {:+.2}bps -> {}",
                    r.pair, r.deviation_bps, r.action
                ),
            })
            .collect();

        let cycle_total: f64 = rows.iter().map(|r| r.pnl.clamped_pnl).sum();
        state.cycle_pnl.push(cycle_total);
        state.cycles += 1;

        let directional: Vec<&PairSnapshot> =
            rows.iter().filter(|r| r.signal.is_directional()).collect();
        let win_rate = if directional.is_empty() {
            0.0
        } else {
            directional.iter().filter(|r| r.pnl.is_winner()).count() as f64
                / directional.len() as f64
        };

        let summary = SummaryCards {
            total_pnl: to_money(cycle_total),
            win_rate,
            max_drawdown: to_money(max_drawdown(&state.combined_equity())),
            current_deviation_bps: rows.first().map(|r| r.deviation_bps),
        };

        for alert in &alerts {
            info!("{}", alert.message);
        }

        MonitorSnapshot {
            cycle: state.cycles,
            rows,
            summary,
            alerts,
            failures,
        }
    }

    /// Current spot and observed forward for `pair` under the configured source.
    fn forwards<P>(&self, provider: &P, pair: &str) -> Result<(DateTime<Utc>, ForwardPair), MonitorError>
    where
        P: MarketDataProvider + ?Sized,
    {
        let quote = provider.fetch_quote(pair)?;
        let rates = self.config.rates();

        let forwards = match self.config.source {
            ForwardSource::Manual { offset_bps } => {
                ForwardPair::with_manual_offset(quote.spot_mid, offset_bps, &rates)?
            }
            ForwardSource::SwapPoints => {
                let swap = provider
                    .fetch_swap_points(pair, rates.tenor_days)?
                    .ok_or_else(|| MonitorError::NoSwapPoints {
                        pair: pair.to_string(),
                        tenor_days: rates.tenor_days,
                    })?;
                let observed = observed_forward(quote.spot_mid, swap, rates.tenor_days)?;
                ForwardPair::evaluate(quote.spot_mid, observed, &rates)?
            }
        };
        Ok((quote.timestamp, forwards))
    }

    /// Evaluate one pair without touching any state.
    pub fn evaluate_pair<P>(&self, provider: &P, pair: &str) -> Result<PairSnapshot, MonitorError>
    where
        P: MarketDataProvider + ?Sized,
    {
        let (timestamp, forwards) = self.forwards(provider, pair)?;
        let deviation = DeviationSignal::new(forwards.deviation_bps()?, self.config.threshold_bps)?;
        let pnl = estimate_pnl(
            deviation.signal,
            forwards.observed,
            forwards.theoretical,
            self.config.notional,
            self.config.spread_bps,
            self.config.stop_loss_bps,
        )?;

        Ok(PairSnapshot {
            pair: pair.to_string(),
            timestamp,
            spot_mid: forwards.spot,
            observed_forward: forwards.observed,
            theoretical_forward: forwards.theoretical,
            deviation_bps: deviation.deviation_bps,
            signal: deviation.signal,
            action: deviation.signal.action().to_string(),
            pnl,
        })
    }

    /// Simulated PnL paths for a forward locked at the pair's current observed forward.
    pub fn pnl_distribution<P>(&self, provider: &P, pair: &str) -> Result<PnlMatrix, MonitorError>
    where
        P: MarketDataProvider + ?Sized,
    {
        let (_, forwards) = self.forwards(provider, pair)?;
        Ok(MonteCarloSimulator::new(self.config.simulation.clone())
            .simulate(forwards.spot, forwards.observed)?)
    }

    /// As [`Self::pnl_distribution`], drawing from `rng`.
    pub fn pnl_distribution_with_rng<P, R>(
        &self,
        provider: &P,
        pair: &str,
        rng: &mut R,
    ) -> Result<PnlMatrix, MonitorError>
    where
        P: MarketDataProvider + ?Sized,
        R: Rng + ?Sized,
    {
        let (_, forwards) = self.forwards(provider, pair)?;
        Ok(MonteCarloSimulator::new(self.config.simulation.clone())
            .simulate_with_rng(forwards.spot, forwards.observed, rng)?)
    }
}
