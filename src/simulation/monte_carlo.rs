//! Monte-Carlo spot paths and forward PnL.
//!
//! Each path applies `spot *= 1 + U(-shock, shock)` once per day. The PnL
//! of a long forward locked at `observed_forward` is marked against the
//! simulated spot every day.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ModelError, ModelResult};

use super::risk::{histogram, pnl_path, HistogramBin, PnlDistribution};

/// Simulation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Days per path.
    pub days: usize,

    /// Number of paths.
    pub num_sims: usize,

    /// Half-width of the uniform daily return shock (0.005 = ±0.5%).
    pub daily_shock: f64,

    /// Position notional.
    pub notional: f64,

    /// Fixed seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            days: 30,
            num_sims: 1000,
            daily_shock: 0.005,
            notional: 1_000_000.0,
            seed: None,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> ModelResult<()> {
        if self.days == 0 {
            return Err(ModelError::config("days must be positive"));
        }
        if self.num_sims == 0 {
            return Err(ModelError::config("num_sims must be positive"));
        }
        if !(0.0..1.0).contains(&self.daily_shock) {
            return Err(ModelError::config(format!(
                "daily_shock must be in [0, 1), got {}",
                self.daily_shock
            )));
        }
        if !self.notional.is_finite() || self.notional <= 0.0 {
            return Err(ModelError::config(format!(
                "notional must be positive, got {}",
                self.notional
            )));
        }
        Ok(())
    }
}

/// Simulated PnL, indexed `[sim][day]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnlMatrix {
    days: usize,
    rows: Vec<Vec<f64>>,
}

impl PnlMatrix {
    pub fn num_sims(&self) -> usize {
        self.rows.len()
    }

    pub fn days(&self) -> usize {
        self.days
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn path(&self, sim: usize) -> Option<&[f64]> {
        self.rows.get(sim).map(|r| r.as_slice())
    }

    /// PnL of every path on `day` (0-based).
    pub fn day(&self, day: usize) -> Vec<f64> {
        self.rows.iter().filter_map(|r| r.get(day).copied()).collect()
    }

    /// Last-day PnL of every path.
    pub fn terminal_pnls(&self) -> Vec<f64> {
        self.rows.iter().filter_map(|r| r.last().copied()).collect()
    }

    /// Summary of the terminal PnL distribution.
    pub fn distribution(&self) -> PnlDistribution {
        PnlDistribution::from_values(&self.terminal_pnls())
    }

    /// Terminal PnL histogram with `bins` equal-width buckets.
    pub fn histogram(&self, bins: usize) -> Vec<HistogramBin> {
        histogram(&self.terminal_pnls(), bins)
    }
}

/// One simulated spot path of `days` steps, excluding the start value.
pub fn spot_path<R: Rng + ?Sized>(spot0: f64, days: usize, daily_shock: f64, rng: &mut R) -> Vec<f64> {
    let mut spot = spot0;
    (0..days)
        .map(|_| {
            spot *= 1.0 + rng.gen_range(-daily_shock..=daily_shock);
            spot
        })
        .collect()
}

/// Random-walk forward PnL simulator.
#[derive(Debug, Clone, Default)]
pub struct MonteCarloSimulator {
    config: SimulationConfig,
}

impl MonteCarloSimulator {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Simulate with the configured seed, or OS entropy when unset.
    pub fn simulate(&self, spot0: f64, observed_forward: f64) -> ModelResult<PnlMatrix> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.simulate_with_rng(spot0, observed_forward, &mut rng)
    }

    /// Simulate drawing shocks from `rng`.
    pub fn simulate_with_rng<R: Rng + ?Sized>(
        &self,
        spot0: f64,
        observed_forward: f64,
        rng: &mut R,
    ) -> ModelResult<PnlMatrix> {
        self.config.validate()?;
        if !spot0.is_finite() || spot0 <= 0.0 {
            return Err(ModelError::InvalidPrice {
                what: "spot".to_string(),
                value: spot0,
            });
        }
        if !observed_forward.is_finite() {
            return Err(ModelError::InvalidPrice {
                what: "observed forward".to_string(),
                value: observed_forward,
            });
        }

        let cfg = &self.config;
        let rows: Vec<Vec<f64>> = (0..cfg.num_sims)
            .map(|_| {
                let spots = spot_path(spot0, cfg.days, cfg.daily_shock, rng);
                pnl_path(&spots, observed_forward, cfg.notional)
            })
            .collect();

        debug!(
            "Simulated {} paths x {} days from spot {}",
            cfg.num_sims, cfg.days, spot0
        );

        Ok(PnlMatrix {
            days: cfg.days,
            rows,
        })
    }
}

/// Convenience form of [`MonteCarloSimulator::simulate`].
pub fn simulate_paths(
    spot0: f64,
    observed_forward: f64,
    days: usize,
    num_sims: usize,
    daily_shock: f64,
    notional: f64,
    seed: Option<u64>,
) -> ModelResult<PnlMatrix> {
    MonteCarloSimulator::new(SimulationConfig {
        days,
        num_sims,
        daily_shock,
        notional,
        seed,
    })
    .simulate(spot0, observed_forward)
}
