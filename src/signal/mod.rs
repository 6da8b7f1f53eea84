//! Arbitrage signal classification.
//!
//! Maps a forward deviation (bps) against a threshold to a discrete
//! trading signal.

pub mod classifier;

pub use classifier::{classify, DeviationSignal, Signal};
