//! Deviation signal classifier.
//!
//! A forward trading rich to CIP is sold against spot, a cheap one is
//! bought. Deviations exactly at the threshold do nothing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Trading signal for one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Forward rich: sell forward, buy spot.
    Sell,
    /// Forward cheap: buy forward, sell spot.
    Buy,
    /// Deviation within threshold.
    NoAction,
}

impl Signal {
    /// Position sign applied to forward PnL.
    pub fn sign(&self) -> f64 {
        match self {
            Self::Sell => -1.0,
            Self::Buy => 1.0,
            Self::NoAction => 0.0,
        }
    }

    pub fn is_directional(&self) -> bool {
        !matches!(self, Self::NoAction)
    }

    /// Trade description shown next to a quote.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Sell => "Rich -> Sell forward / Buy spot",
            Self::Buy => "Cheap -> Buy forward / Sell spot",
            Self::NoAction => "No arbitrage",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sell => "sell",
            Self::Buy => "buy",
            Self::NoAction => "no_action",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a deviation against a non-negative threshold.
pub fn classify(deviation_bps: f64, threshold_bps: f64) -> ModelResult<Signal> {
    if threshold_bps.is_nan() || threshold_bps < 0.0 {
        return Err(ModelError::config(format!(
            "threshold_bps must be non-negative, got {}",
            threshold_bps
        )));
    }

    let signal = if deviation_bps > threshold_bps {
        Signal::Sell
    } else if deviation_bps < -threshold_bps {
        Signal::Buy
    } else {
        Signal::NoAction
    };
    Ok(signal)
}

/// A deviation together with its classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviationSignal {
    pub deviation_bps: f64,
    pub threshold_bps: f64,
    pub signal: Signal,
}

impl DeviationSignal {
    pub fn new(deviation_bps: f64, threshold_bps: f64) -> ModelResult<Self> {
        let signal = classify(deviation_bps, threshold_bps)?;
        Ok(Self {
            deviation_bps,
            threshold_bps,
            signal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_regions() {
        assert_eq!(classify(2.5, 1.0).unwrap(), Signal::Sell);
        assert_eq!(classify(-2.5, 1.0).unwrap(), Signal::Buy);
        assert_eq!(classify(0.3, 1.0).unwrap(), Signal::NoAction);
    }

    #[test]
    fn test_ties_resolve_to_no_action() {
        assert_eq!(classify(1.0, 1.0).unwrap(), Signal::NoAction);
        assert_eq!(classify(-1.0, 1.0).unwrap(), Signal::NoAction);
        assert_eq!(classify(0.0, 0.0).unwrap(), Signal::NoAction);
    }

    #[test]
    fn test_zero_threshold_trades_any_deviation() {
        assert_eq!(classify(1e-9, 0.0).unwrap(), Signal::Sell);
        assert_eq!(classify(-1e-9, 0.0).unwrap(), Signal::Buy);
    }

    #[test]
    fn test_classifier_is_symmetric() {
        let deviations = [-7.5, -3.0, -1.0, -0.2, 0.0, 0.2, 1.0, 3.0, 7.5];
        for threshold in [0.0, 0.5, 1.0, 3.0] {
            for &x in &deviations {
                let buy = classify(x, threshold).unwrap() == Signal::Buy;
                let mirrored_sell = classify(-x, threshold).unwrap() == Signal::Sell;
                assert_eq!(buy, mirrored_sell, "x={} t={}", x, threshold);
            }
        }
    }

    #[test]
    fn test_classifier_is_monotonic_in_deviation() {
        // Sell (-1) -> NoAction (0) -> Buy (+1) as the deviation falls
        for threshold in [0.0, 0.25, 1.0, 2.5, 7.0] {
            let mut previous = classify(10.0, threshold).unwrap();
            for step in 1..=2000 {
                let x = 10.0 - step as f64 * 0.01;
                let signal = classify(x, threshold).unwrap();
                assert!(
                    signal.sign() >= previous.sign(),
                    "{} after {} at x={} t={}",
                    signal,
                    previous,
                    x,
                    threshold
                );
                previous = signal;
            }
            assert_eq!(previous, Signal::Buy);
        }
    }

    #[test]
    fn test_negative_threshold_is_config_error() {
        assert!(matches!(classify(1.0, -0.5), Err(ModelError::Configuration(_))));
        assert!(matches!(classify(1.0, f64::NAN), Err(ModelError::Configuration(_))));
    }

    #[test]
    fn test_signal_sign() {
        assert_eq!(Signal::Sell.sign(), -1.0);
        assert_eq!(Signal::Buy.sign(), 1.0);
        assert_eq!(Signal::NoAction.sign(), 0.0);
        assert!(!Signal::NoAction.is_directional());
    }

    #[test]
    fn test_reference_quote_is_buy() {
        let theo = crate::pricing::theoretical_forward(1.16910, 0.025, 0.005, 30).unwrap();
        let dev = crate::pricing::deviation_bps(1.16930, theo).unwrap();
        let signal = DeviationSignal::new(dev, 1.0).unwrap();
        assert!(signal.deviation_bps < 0.0);
        assert_eq!(signal.signal, Signal::Buy);
    }
}
