//! Parameter optimization.
//!
//! Grid sweep over threshold × stop-loss × spread, one backtest per
//! combination, with CSV export and top-N analysis of the results.

pub mod results;
pub mod sweep;

pub use results::{analyze_results, format_table, read_results_csv, write_results_csv, RESULT_COLUMNS};
pub use sweep::{
    top_by_total_pnl, ParameterGrid, ParameterSet, ParameterSweep, SweepFailure, SweepResult, SweepRow,
};
