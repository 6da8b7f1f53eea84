//! Live CIP monitor.
//!
//! Provides:
//! - Bounded per-pair history buffers
//! - The per-cycle update producing table rows, summary cards and alerts
//! - PnL distribution for the currently observed forward

pub mod history;
pub mod live;

pub use history::{HistoryBuffer, PairHistory, DEFAULT_HISTORY_LEN};
pub use live::{
    Alert, ForwardSource, LiveMonitor, MonitorConfig, MonitorError, MonitorSnapshot, MonitorState,
    PairFailure, PairSnapshot, SummaryCards,
};
