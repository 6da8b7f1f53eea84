//! Sweep result CSV export and analysis.
//!
//! Columns: threshold_bps, stop_loss_bps, spread_bps, total_pnl,
//! num_trades, win_rate, avg_pnl, max_drawdown.

use std::fs;
use std::path::Path;

use polars::prelude::*;
use rust_decimal::prelude::*;

use crate::backtest::to_money;
use crate::data::LoaderError;

use super::sweep::{top_by_total_pnl, SweepRow};

/// Column order of exported results.
pub const RESULT_COLUMNS: &[&str] = &[
    "threshold_bps",
    "stop_loss_bps",
    "spread_bps",
    "total_pnl",
    "num_trades",
    "win_rate",
    "avg_pnl",
    "max_drawdown",
];

fn money_column(rows: &[SweepRow], f: impl Fn(&SweepRow) -> Decimal) -> Vec<f64> {
    rows.iter()
        .map(|r| f(r).to_f64().unwrap_or(0.0))
        .collect()
}

/// Build a DataFrame of sweep rows.
pub fn results_frame(rows: &[SweepRow]) -> Result<DataFrame, LoaderError> {
    let df = DataFrame::new(vec![
        Series::new("threshold_bps".into(), rows.iter().map(|r| r.threshold_bps).collect::<Vec<_>>()).into(),
        Series::new("stop_loss_bps".into(), rows.iter().map(|r| r.stop_loss_bps).collect::<Vec<_>>()).into(),
        Series::new("spread_bps".into(), rows.iter().map(|r| r.spread_bps).collect::<Vec<_>>()).into(),
        Series::new("total_pnl".into(), money_column(rows, |r| r.total_pnl)).into(),
        Series::new("num_trades".into(), rows.iter().map(|r| r.num_trades as u64).collect::<Vec<_>>()).into(),
        Series::new("win_rate".into(), rows.iter().map(|r| r.win_rate).collect::<Vec<_>>()).into(),
        Series::new("avg_pnl".into(), money_column(rows, |r| r.avg_pnl)).into(),
        Series::new("max_drawdown".into(), money_column(rows, |r| r.max_drawdown)).into(),
    ])?;
    Ok(df)
}

/// Write sweep rows to `path`, creating parent directories.
pub fn write_results_csv(path: impl AsRef<Path>, rows: &[SweepRow]) -> Result<(), LoaderError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut df = results_frame(rows)?;
    let mut file = fs::File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)?;
    Ok(())
}

fn float_values(df: &DataFrame, name: &str) -> Result<Vec<f64>, LoaderError> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    column
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(i, v)| v.ok_or_else(|| LoaderError::InvalidData(format!("{} is empty on row {}", name, i))))
        .collect()
}

/// Read rows previously written by [`write_results_csv`].
pub fn read_results_csv(path: impl AsRef<Path>) -> Result<Vec<SweepRow>, LoaderError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(LoaderError::FileNotFound(path.display().to_string()));
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let thresholds = float_values(&df, "threshold_bps")?;
    let stops = float_values(&df, "stop_loss_bps")?;
    let spreads = float_values(&df, "spread_bps")?;
    let totals = float_values(&df, "total_pnl")?;
    let trades = float_values(&df, "num_trades")?;
    let win_rates = float_values(&df, "win_rate")?;
    let avgs = float_values(&df, "avg_pnl")?;
    let drawdowns = float_values(&df, "max_drawdown")?;

    Ok((0..df.height())
        .map(|i| SweepRow {
            threshold_bps: thresholds[i],
            stop_loss_bps: stops[i],
            spread_bps: spreads[i],
            total_pnl: to_money(totals[i]),
            num_trades: trades[i].max(0.0) as usize,
            win_rate: win_rates[i],
            avg_pnl: to_money(avgs[i]),
            max_drawdown: to_money(drawdowns[i]),
        })
        .collect())
}

/// Load a results file and return its best `n` rows by total PnL.
pub fn analyze_results(path: impl AsRef<Path>, n: usize) -> Result<Vec<SweepRow>, LoaderError> {
    let rows = read_results_csv(path)?;
    Ok(top_by_total_pnl(&rows, n))
}

/// Plain-text table of sweep rows.
pub fn format_table(rows: &[SweepRow]) -> String {
    let mut out = format!(
        "{:>9} {:>9} {:>9} {:>12} {:>7} {:>8} {:>10} {:>12}\n",
        "threshold", "stop", "spread", "total_pnl", "trades", "win%", "avg_pnl", "max_dd"
    );
    for r in rows {
        out.push_str(&format!(
            "{:>9.2} {:>9.2} {:>9.2} {:>12.0} {:>7} {:>8.1} {:>10.0} {:>12.0}\n",
            r.threshold_bps,
            r.stop_loss_bps,
            r.spread_bps,
            r.total_pnl,
            r.num_trades,
            r.win_rate * 100.0,
            r.avg_pnl,
            r.max_drawdown,
        ));
    }
    out
}
