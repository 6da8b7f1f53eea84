//! Covered-interest-parity forward pricing.
//!
//! F = S * (1 + r_dom * t/360) / (1 + r_for * t/360), simple rates on an
//! ACT/360 basis.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Money-market day count basis.
pub const DAY_COUNT_BASIS: f64 = 360.0;

/// Basis points per unit.
pub const BPS_PER_UNIT: f64 = 10_000.0;

fn check_spot(spot: f64) -> ModelResult<()> {
    if !spot.is_finite() || spot <= 0.0 {
        return Err(ModelError::InvalidPrice {
            what: "spot".to_string(),
            value: spot,
        });
    }
    Ok(())
}

fn check_tenor(tenor_days: u32) -> ModelResult<()> {
    if tenor_days == 0 {
        return Err(ModelError::config("tenor_days must be positive"));
    }
    Ok(())
}

/// Theoretical CIP forward for `tenor_days`.
pub fn theoretical_forward(spot: f64, r_dom: f64, r_for: f64, tenor_days: u32) -> ModelResult<f64> {
    check_spot(spot)?;
    check_tenor(tenor_days)?;

    let year_fraction = tenor_days as f64 / DAY_COUNT_BASIS;
    let denominator = 1.0 + r_for * year_fraction;
    if !denominator.is_finite() || denominator <= 0.0 {
        return Err(ModelError::InvalidRate {
            rate: r_for,
            tenor_days,
        });
    }

    let forward = spot * (1.0 + r_dom * year_fraction) / denominator;
    if !forward.is_finite() {
        return Err(ModelError::InvalidRate {
            rate: r_dom,
            tenor_days,
        });
    }
    Ok(forward)
}

/// Signed deviation of `observed` from `theoretical`, in basis points.
pub fn deviation_bps(observed: f64, theoretical: f64) -> ModelResult<f64> {
    if theoretical == 0.0 {
        return Err(ModelError::DivideByZero);
    }
    Ok((observed - theoretical) / theoretical * BPS_PER_UNIT)
}

/// Outright forward implied by a daily swap-point rate accrued over the tenor.
pub fn observed_forward(spot: f64, swap_points: f64, tenor_days: u32) -> ModelResult<f64> {
    check_spot(spot)?;
    check_tenor(tenor_days)?;
    if !swap_points.is_finite() {
        return Err(ModelError::InvalidPrice {
            what: "swap_points".to_string(),
            value: swap_points,
        });
    }
    Ok(spot + swap_points * tenor_days as f64 / DAY_COUNT_BASIS)
}

/// Rate and tenor assumptions used to price the theoretical leg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateAssumptions {
    /// Annual simple domestic (quote currency) rate.
    pub r_dom: f64,
    /// Annual simple foreign (base currency) rate.
    pub r_for: f64,
    /// Forward tenor in days.
    pub tenor_days: u32,
}

impl Default for RateAssumptions {
    fn default() -> Self {
        Self {
            r_dom: 0.025,
            r_for: 0.005,
            tenor_days: 30,
        }
    }
}

impl RateAssumptions {
    pub fn new(r_dom: f64, r_for: f64, tenor_days: u32) -> Self {
        Self {
            r_dom,
            r_for,
            tenor_days,
        }
    }

    pub fn theoretical_forward(&self, spot: f64) -> ModelResult<f64> {
        theoretical_forward(spot, self.r_dom, self.r_for, self.tenor_days)
    }
}

/// Theoretical and observed forward for one observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForwardPair {
    pub spot: f64,
    pub theoretical: f64,
    pub observed: f64,
    pub tenor_days: u32,
    pub r_dom: f64,
    pub r_for: f64,
}

impl ForwardPair {
    /// Price the theoretical leg for `spot` and pair it with `observed`.
    pub fn evaluate(spot: f64, observed: f64, rates: &RateAssumptions) -> ModelResult<Self> {
        if !observed.is_finite() {
            return Err(ModelError::InvalidPrice {
                what: "observed forward".to_string(),
                value: observed,
            });
        }
        let theoretical = rates.theoretical_forward(spot)?;
        Ok(Self {
            spot,
            theoretical,
            observed,
            tenor_days: rates.tenor_days,
            r_dom: rates.r_dom,
            r_for: rates.r_for,
        })
    }

    /// Observed forward built from swap points, paired with the CIP forward.
    pub fn from_swap_points(spot: f64, swap_points: f64, rates: &RateAssumptions) -> ModelResult<Self> {
        let observed = observed_forward(spot, swap_points, rates.tenor_days)?;
        Self::evaluate(spot, observed, rates)
    }

    /// Observed forward set `offset_bps` away from the CIP forward.
    pub fn with_manual_offset(spot: f64, offset_bps: f64, rates: &RateAssumptions) -> ModelResult<Self> {
        let theoretical = rates.theoretical_forward(spot)?;
        Self::evaluate(spot, theoretical * (1.0 + offset_bps / BPS_PER_UNIT), rates)
    }

    pub fn deviation_bps(&self) -> ModelResult<f64> {
        deviation_bps(self.observed, self.theoretical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theoretical_forward_reference_case() {
        let theo = theoretical_forward(1.16910, 0.025, 0.005, 30).unwrap();
        assert!((theo - 1.171_047_7).abs() < 1e-6);

        let dev = deviation_bps(1.16930, theo).unwrap();
        assert!((dev - (-14.924)).abs() < 0.01);
    }

    #[test]
    fn test_equal_rates_leave_spot_unchanged() {
        let theo = theoretical_forward(1.25, 0.03, 0.03, 90).unwrap();
        assert!((theo - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_forward_converges_to_spot_for_short_tenor() {
        let spot = 1.3;
        let one_day = theoretical_forward(spot, 0.05, 0.01, 1).unwrap();
        let one_year = theoretical_forward(spot, 0.05, 0.01, 360).unwrap();
        assert!((one_day - spot).abs() < (one_year - spot).abs());
        assert!((one_day - spot).abs() < 2e-4);
    }

    #[test]
    fn test_invalid_foreign_rate_is_rejected() {
        // 1 + r_for * 360/360 == 0
        let err = theoretical_forward(1.1, 0.01, -1.0, 360).unwrap_err();
        assert!(matches!(err, ModelError::InvalidRate { .. }));

        let err = theoretical_forward(1.1, 0.01, -2.0, 360).unwrap_err();
        assert!(matches!(err, ModelError::InvalidRate { .. }));
    }

    #[test]
    fn test_bad_inputs() {
        assert!(matches!(
            theoretical_forward(1.1, 0.01, 0.0, 0),
            Err(ModelError::Configuration(_))
        ));
        assert!(matches!(
            theoretical_forward(0.0, 0.01, 0.0, 30),
            Err(ModelError::InvalidPrice { .. })
        ));
        assert!(matches!(
            theoretical_forward(f64::NAN, 0.01, 0.0, 30),
            Err(ModelError::InvalidPrice { .. })
        ));
    }

    #[test]
    fn test_deviation_identity_and_zero_guard() {
        for theo in [0.5, 1.1691, 151.2] {
            assert_eq!(deviation_bps(theo, theo).unwrap(), 0.0);
        }
        assert_eq!(deviation_bps(1.0, 0.0), Err(ModelError::DivideByZero));
    }

    #[test]
    fn test_observed_forward_from_swap_points() {
        let fwd = observed_forward(1.2, 0.0036, 30).unwrap();
        assert!((fwd - 1.2003).abs() < 1e-12);
    }

    #[test]
    fn test_forward_pair_manual_offset() {
        let rates = RateAssumptions::default();
        let pair = ForwardPair::with_manual_offset(1.1691, 2.0, &rates).unwrap();
        assert!((pair.deviation_bps().unwrap() - 2.0).abs() < 1e-9);
        assert_eq!(pair.tenor_days, 30);
    }
}
