//! Monte-Carlo PnL simulation.
//!
//! Provides:
//! - Seeded or injected-RNG random-walk spot paths
//! - PnL matrix `[sim][day]` with distribution and histogram views
//! - Single-path PnL and one-day VaR
//! - Observed-forward noise scenarios

pub mod monte_carlo;
pub mod risk;
pub mod scenarios;

pub use monte_carlo::{simulate_paths, spot_path, MonteCarloSimulator, PnlMatrix, SimulationConfig};
pub use risk::{histogram, one_day_var, percentile, pnl_path, HistogramBin, PnlDistribution};
pub use scenarios::{noise_trials, NoiseTrial};
