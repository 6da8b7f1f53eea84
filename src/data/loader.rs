//! CSV history files.
//!
//! One file per pair under `{data_dir}/history/{PAIR}.csv` with columns:
//! - date (YYYY-MM-DD)
//! - spot (daily mid; empty cell = date listed without a price)
//! - swap_points (nullable; empty cell = gap)

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::*;
use thiserror::Error;
use tracing::{info, warn};

use super::types::{HistoricalSeries, MarketRow, SpotPoint, SwapPoint};

/// Expected columns in history files.
pub const EXPECTED_COLUMNS: &[&str] = &["date", "spot", "swap_points"];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Loader for per-pair history CSV files.
pub struct DataLoader {
    data_dir: PathBuf,
}

impl DataLoader {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    /// Get the path to a pair's history file.
    pub fn history_path(&self, pair: &str) -> PathBuf {
        self.data_dir.join("history").join(format!("{}.csv", pair))
    }

    /// List pairs with a history file.
    pub fn available_pairs(&self) -> Result<Vec<String>, LoaderError> {
        let dir = self.data_dir.join("history");
        if !dir.exists() {
            return Ok(vec![]);
        }

        let mut pairs = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            if let Some(pair) = name.strip_suffix(".csv") {
                pairs.push(pair.to_string());
            }
        }
        pairs.sort();
        Ok(pairs)
    }

    /// Load the stored history for `pair`.
    pub fn load_history(&self, pair: &str) -> Result<HistoricalSeries, LoaderError> {
        load_history_file(self.history_path(pair), pair)
    }

    /// Store a series as `{data_dir}/history/{pair}.csv`.
    pub fn save_history(&self, series: &HistoricalSeries) -> Result<PathBuf, LoaderError> {
        let path = self.history_path(&series.pair);
        save_history_file(&path, series)?;
        Ok(path)
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, LoaderError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| LoaderError::InvalidData(format!("bad date {}: {}", raw, e)))
}

/// Read a history CSV into a series for `pair`.
pub fn load_history_file(path: impl AsRef<Path>, pair: &str) -> Result<HistoricalSeries, LoaderError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(LoaderError::FileNotFound(path.display().to_string()));
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let dates = df.column("date")?.cast(&DataType::String)?;
    let spots = df.column("spot")?.cast(&DataType::Float64)?;
    let swaps = match df.column("swap_points") {
        Ok(column) => Some(column.cast(&DataType::Float64)?),
        Err(_) => {
            warn!("{} has no swap_points column", path.display());
            None
        }
    };

    let dates = dates.str()?;
    let spots = spots.f64()?;

    let mut spot_points = Vec::with_capacity(df.height());
    let mut swap_points = Vec::new();
    let mut spot_gaps = Vec::new();

    for (idx, (date, spot)) in dates.into_iter().zip(spots.into_iter()).enumerate() {
        let Some(date) = date else {
            warn!("row {} of {} has no date, skipped", idx, path.display());
            continue;
        };
        let date = parse_date(date)?;

        match spot {
            Some(spot) => spot_points.push(SpotPoint { date, spot }),
            None => {
                warn!("row {} ({}) has no spot, kept as a gap", idx, date);
                spot_gaps.push(date);
            }
        }

        if let Some(swaps) = &swaps {
            if let Some(value) = swaps.f64()?.get(idx) {
                swap_points.push(SwapPoint {
                    date,
                    swap_points: value,
                });
            }
        }
    }

    if spot_points.is_empty() {
        return Err(LoaderError::InvalidData(format!(
            "no spot rows in {}",
            path.display()
        )));
    }

    info!(
        "Loaded {} spot rows, {} spot gaps and {} swap rows for {}",
        spot_points.len(),
        spot_gaps.len(),
        swap_points.len(),
        pair
    );

    Ok(HistoricalSeries::new(pair, spot_points, swap_points).with_spot_gaps(spot_gaps))
}

/// Write aligned rows of `series` to a CSV file.
pub fn save_history_file(path: impl AsRef<Path>, series: &HistoricalSeries) -> Result<(), LoaderError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let rows: Vec<MarketRow> = series.align();
    let dates: Vec<String> = rows.iter().map(|r| r.date.format("%Y-%m-%d").to_string()).collect();
    let spots: Vec<Option<f64>> = rows.iter().map(|r| r.spot).collect();
    let swaps: Vec<Option<f64>> = rows.iter().map(|r| r.swap_points).collect();

    let mut df = DataFrame::new(vec![
        Series::new("date".into(), dates).into(),
        Series::new("spot".into(), spots).into(),
        Series::new("swap_points".into(), swaps).into(),
    ])?;

    let mut file = fs::File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    #[test]
    fn test_history_round_trip_keeps_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DataLoader::new(dir.path());

        let series = HistoricalSeries::new(
            "EUR_USD",
            vec![
                SpotPoint { date: d(1), spot: 1.0701 },
                SpotPoint { date: d(2), spot: 1.0712 },
                SpotPoint { date: d(3), spot: 1.0698 },
            ],
            vec![
                SwapPoint { date: d(1), swap_points: 0.0021 },
                SwapPoint { date: d(3), swap_points: 0.0024 },
            ],
        );

        let path = loader.save_history(&series).unwrap();
        assert!(path.ends_with("history/EUR_USD.csv"));
        assert_eq!(loader.available_pairs().unwrap(), vec!["EUR_USD".to_string()]);

        let loaded = loader.load_history("EUR_USD").unwrap();
        let rows = loaded.align();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].date, d(2));
        assert_eq!(rows[1].swap_points, None);
        assert!((rows[2].spot.unwrap() - 1.0698).abs() < 1e-12);
        assert_eq!(rows[2].swap_points, Some(0.0024));
    }

    #[test]
    fn test_missing_file() {
        let loader = DataLoader::new("/nonexistent/dir");
        assert!(matches!(
            loader.load_history("EUR_USD"),
            Err(LoaderError::FileNotFound(_))
        ));
        assert!(loader.available_pairs().unwrap().is_empty());
    }

    #[test]
    fn test_integer_swap_column_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("USD_JPY.csv");
        fs::write(&path, "date,spot,swap_points\n2024-05-01,151,0\n2024-05-02,152,\n").unwrap();

        let series = load_history_file(&path, "USD_JPY").unwrap();
        let rows = series.align();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].spot, Some(151.0));
        assert_eq!(rows[0].swap_points, Some(0.0));
        assert_eq!(rows[1].swap_points, None);
    }

    #[test]
    fn test_missing_spot_is_kept_as_gap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("EUR_USD.csv");
        fs::write(
            &path,
            "date,spot,swap_points\n2024-05-01,1.1,0.0\n2024-05-02,,0.0\n2024-05-03,1.3,0.0\n",
        )
        .unwrap();

        let series = load_history_file(&path, "EUR_USD").unwrap();
        assert_eq!(series.spot.len(), 2);
        assert_eq!(series.spot_gaps, vec![d(2)]);
        assert_eq!(series.swap_points.len(), 3);

        let rows = series.align();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], MarketRow::spot_gap(d(2), Some(0.0)));

        // the gap survives a save and reload
        let saved = dir.path().join("copy.csv");
        save_history_file(&saved, &series).unwrap();
        let reloaded = load_history_file(&saved, "EUR_USD").unwrap();
        assert_eq!(reloaded.align(), rows);
    }
}
