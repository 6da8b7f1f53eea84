//! Covered-interest-parity pricing.
//!
//! Closed-form helpers for:
//! - Theoretical forward from spot and the rate differential
//! - Observed forward from broker swap points
//! - Signed deviation between the two, in basis points

pub mod cip;

pub use cip::{
    deviation_bps, observed_forward, theoretical_forward, ForwardPair, RateAssumptions,
    BPS_PER_UNIT, DAY_COUNT_BASIS,
};
