//! Observed-forward noise scenarios.
//!
//! Perturbs a fair forward by uniform noise in bps and classifies each
//! trial, to see how often a given threshold would fire on pure noise.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::pricing::{deviation_bps, BPS_PER_UNIT};
use crate::signal::{classify, Signal};

/// One perturbed quote.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseTrial {
    pub trial: usize,
    pub noise_bps: f64,
    pub observed_forward: f64,
    pub deviation_bps: f64,
    pub signal: Signal,
}

/// Draw `trials` observed forwards as `theo * (1 + U(-max_noise, max_noise)/10000)`.
pub fn noise_trials<R: Rng + ?Sized>(
    theoretical_forward: f64,
    max_noise_bps: f64,
    threshold_bps: f64,
    trials: usize,
    rng: &mut R,
) -> ModelResult<Vec<NoiseTrial>> {
    if max_noise_bps.is_nan() || max_noise_bps < 0.0 {
        return Err(ModelError::config(format!(
            "max_noise_bps must be non-negative, got {}",
            max_noise_bps
        )));
    }

    (1..=trials)
        .map(|trial| {
            let noise_bps = rng.gen_range(-max_noise_bps..=max_noise_bps);
            let observed_forward = theoretical_forward * (1.0 + noise_bps / BPS_PER_UNIT);
            let deviation = deviation_bps(observed_forward, theoretical_forward)?;
            Ok(NoiseTrial {
                trial,
                noise_bps,
                observed_forward,
                deviation_bps: deviation,
                signal: classify(deviation, threshold_bps)?,
            })
        })
        .collect()
}
