//! Per-trade PnL estimate with spread cost and stop-loss floor.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::pricing::BPS_PER_UNIT;
use crate::signal::Signal;

use super::trade::to_money;

/// PnL of one forward trade held to the exit reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PnlRecord {
    pub signal: Signal,
    /// sign * (exit - observed) * notional, before costs.
    pub raw_pnl: f64,
    /// Spread charged once per directional trade (>= 0).
    pub spread_cost: f64,
    /// raw - cost, floored at `stop_floor`.
    pub clamped_pnl: f64,
    /// Maximum loss allowed by the stop (<= 0).
    pub stop_floor: f64,
}

impl PnlRecord {
    /// Record for a step with no position.
    pub fn flat() -> Self {
        Self {
            signal: Signal::NoAction,
            raw_pnl: 0.0,
            spread_cost: 0.0,
            clamped_pnl: 0.0,
            stop_floor: 0.0,
        }
    }

    pub fn is_trade(&self) -> bool {
        self.signal.is_directional()
    }

    /// Cent-rounded PnL above zero; break-even is not a win.
    pub fn is_winner(&self) -> bool {
        self.is_trade() && to_money(self.clamped_pnl) > Decimal::ZERO
    }

    /// True when the stop floor replaced the net PnL.
    pub fn stopped_out(&self) -> bool {
        self.is_trade() && self.raw_pnl - self.spread_cost < self.stop_floor
    }
}

/// Cost and risk parameters shared by every trade of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeCosts {
    pub notional: f64,
    pub spread_bps: f64,
    pub stop_loss_bps: f64,
}

impl TradeCosts {
    pub fn new(notional: f64, spread_bps: f64, stop_loss_bps: f64) -> ModelResult<Self> {
        let costs = Self {
            notional,
            spread_bps,
            stop_loss_bps,
        };
        costs.validate()?;
        Ok(costs)
    }

    pub fn validate(&self) -> ModelResult<()> {
        if !self.notional.is_finite() || self.notional <= 0.0 {
            return Err(ModelError::config(format!(
                "notional must be positive, got {}",
                self.notional
            )));
        }
        check_bps("spread_bps", self.spread_bps)?;
        check_bps("stop_loss_bps", self.stop_loss_bps)?;
        Ok(())
    }

    /// Spread cost in currency.
    pub fn spread_cost(&self) -> f64 {
        self.spread_bps / BPS_PER_UNIT * self.notional
    }

    /// Stop-loss floor in currency (<= 0).
    pub fn stop_floor(&self) -> f64 {
        -(self.stop_loss_bps / BPS_PER_UNIT * self.notional)
    }

    pub fn estimate(&self, signal: Signal, observed_forward: f64, exit_reference: f64) -> ModelResult<PnlRecord> {
        estimate_pnl(
            signal,
            observed_forward,
            exit_reference,
            self.notional,
            self.spread_bps,
            self.stop_loss_bps,
        )
    }
}

fn check_bps(name: &str, value: f64) -> ModelResult<()> {
    if value.is_nan() || value < 0.0 {
        return Err(ModelError::config(format!(
            "{} must be non-negative, got {}",
            name, value
        )));
    }
    Ok(())
}

fn check_price(what: &str, value: f64) -> ModelResult<()> {
    if !value.is_finite() {
        return Err(ModelError::InvalidPrice {
            what: what.to_string(),
            value,
        });
    }
    Ok(())
}

/// Estimate PnL for a forward position closed at `exit_reference`.
///
/// Directional signals pay the spread once and are floored at
/// `-stop_loss_bps/10000 * notional`. `NoAction` yields an all-zero record.
pub fn estimate_pnl(
    signal: Signal,
    observed_forward: f64,
    exit_reference: f64,
    notional: f64,
    spread_bps: f64,
    stop_loss_bps: f64,
) -> ModelResult<PnlRecord> {
    let costs = TradeCosts {
        notional,
        spread_bps,
        stop_loss_bps,
    };
    costs.validate()?;

    if !signal.is_directional() {
        return Ok(PnlRecord::flat());
    }

    check_price("observed forward", observed_forward)?;
    check_price("exit reference", exit_reference)?;

    let raw_pnl = signal.sign() * (exit_reference - observed_forward) * notional;
    let spread_cost = costs.spread_cost();
    let stop_floor = costs.stop_floor();
    let clamped_pnl = (raw_pnl - spread_cost).max(stop_floor);

    Ok(PnlRecord {
        signal,
        raw_pnl,
        spread_cost,
        clamped_pnl,
        stop_floor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_loss_scenario() {
        let rec = estimate_pnl(Signal::Buy, 1.2, 1.175, 1_000_000.0, 10.0, 5.0).unwrap();
        assert!((rec.raw_pnl + 25_000.0).abs() < 1e-6);
        assert!((rec.spread_cost - 1_000.0).abs() < 1e-9);
        assert!((rec.stop_floor + 500.0).abs() < 1e-9);
        assert!((rec.clamped_pnl + 500.0).abs() < 1e-9);
        assert!(rec.stopped_out());
    }

    #[test]
    fn test_winning_sell() {
        // Forward sold at 1.2010, spot ends at 1.2000
        let rec = estimate_pnl(Signal::Sell, 1.2010, 1.2000, 1_000_000.0, 0.5, 5.0).unwrap();
        assert!((rec.raw_pnl - 1_000.0).abs() < 1e-6);
        assert!((rec.clamped_pnl - 950.0).abs() < 1e-6);
        assert!(rec.is_winner());
        assert!(!rec.stopped_out());
    }

    #[test]
    fn test_sub_cent_residue_is_not_a_win() {
        let rec = PnlRecord {
            signal: Signal::Buy,
            raw_pnl: 100.0 + 2.11e-10,
            spread_cost: 100.0,
            clamped_pnl: 2.11e-10,
            stop_floor: -200.0,
        };
        assert!(rec.is_trade());
        assert!(!rec.is_winner());

        let rec = PnlRecord {
            clamped_pnl: 0.01,
            ..rec
        };
        assert!(rec.is_winner());
    }

    #[test]
    fn test_no_action_is_flat() {
        let rec = estimate_pnl(Signal::NoAction, 1.2, 0.9, 1_000_000.0, 10.0, 5.0).unwrap();
        assert_eq!(rec, PnlRecord::flat());
        assert!(!rec.is_trade());
    }

    #[test]
    fn test_pnl_never_below_stop_floor() {
        let notional = 250_000.0;
        for stop in [0.0, 1.0, 5.0, 20.0] {
            for exit in [0.5, 1.0, 1.1999, 1.2, 1.25, 2.0] {
                for signal in [Signal::Buy, Signal::Sell, Signal::NoAction] {
                    let rec = estimate_pnl(signal, 1.2, exit, notional, 1.0, stop).unwrap();
                    assert!(rec.clamped_pnl >= -stop / 10_000.0 * notional);
                    assert!(rec.spread_cost >= 0.0);
                    assert!(rec.stop_floor <= 0.0);
                }
            }
        }
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            estimate_pnl(Signal::Buy, 1.2, 1.2, 0.0, 1.0, 1.0),
            Err(ModelError::Configuration(_))
        ));
        assert!(matches!(
            estimate_pnl(Signal::Buy, 1.2, 1.2, 1e6, -1.0, 1.0),
            Err(ModelError::Configuration(_))
        ));
        assert!(matches!(
            estimate_pnl(Signal::Sell, 1.2, 1.2, 1e6, 1.0, f64::NAN),
            Err(ModelError::Configuration(_))
        ));
        assert!(matches!(
            estimate_pnl(Signal::Sell, 1.2, f64::NAN, 1e6, 1.0, 1.0),
            Err(ModelError::InvalidPrice { .. })
        ));
    }

    #[test]
    fn test_trade_costs() {
        let costs = TradeCosts::new(1_000_000.0, 0.5, 5.0).unwrap();
        assert!((costs.spread_cost() - 50.0).abs() < 1e-9);
        assert!((costs.stop_floor() + 500.0).abs() < 1e-9);
        assert!(TradeCosts::new(-1.0, 0.5, 5.0).is_err());
    }
}
