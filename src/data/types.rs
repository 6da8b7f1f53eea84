//! Core market data types.
//!
//! These are the rows handed to the pricing core by a data provider. They
//! mirror what the broker returns (daily mid candles and daily swap-point
//! rates) but carry no transport details.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Live spot quote for a currency pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Instrument identifier (e.g., "EUR_USD")
    pub pair: String,

    /// Time the price was observed
    pub timestamp: DateTime<Utc>,

    /// Spot mid price
    pub spot_mid: f64,
}

impl Quote {
    pub fn new(pair: &str, timestamp: DateTime<Utc>, spot_mid: f64) -> Self {
        Self {
            pair: pair.to_string(),
            timestamp,
            spot_mid,
        }
    }

    /// Build a quote from top-of-book bid and ask.
    pub fn from_bid_ask(pair: &str, timestamp: DateTime<Utc>, bid: f64, ask: f64) -> Self {
        Self::new(pair, timestamp, (bid + ask) / 2.0)
    }
}

/// Daily spot mid observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpotPoint {
    pub date: NaiveDate,
    pub spot: f64,
}

/// Daily swap-point observation (long rate minus short rate).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwapPoint {
    pub date: NaiveDate,
    pub swap_points: f64,
}

/// One date of aligned input for the backtest driver.
///
/// `spot` is `None` for a date the source listed without a price;
/// `swap_points` is `None` where the swap series has no value for the date.
/// Swap gaps are filled by the driver, never here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketRow {
    pub date: NaiveDate,
    pub spot: Option<f64>,
    pub swap_points: Option<f64>,
}

impl MarketRow {
    pub fn new(date: NaiveDate, spot: f64, swap_points: Option<f64>) -> Self {
        Self {
            date,
            spot: Some(spot),
            swap_points,
        }
    }

    /// A date present in the source with no spot price.
    pub fn spot_gap(date: NaiveDate, swap_points: Option<f64>) -> Self {
        Self {
            date,
            spot: None,
            swap_points,
        }
    }
}

/// Spot and swap-point history for one pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoricalSeries {
    pub pair: String,
    pub spot: Vec<SpotPoint>,
    pub swap_points: Vec<SwapPoint>,

    /// Dates listed by the source without a spot price.
    #[serde(default)]
    pub spot_gaps: Vec<NaiveDate>,
}

impl HistoricalSeries {
    pub fn new(pair: &str, spot: Vec<SpotPoint>, swap_points: Vec<SwapPoint>) -> Self {
        Self {
            pair: pair.to_string(),
            spot,
            swap_points,
            spot_gaps: Vec::new(),
        }
    }

    pub fn with_spot_gaps(mut self, gaps: Vec<NaiveDate>) -> Self {
        self.spot_gaps = gaps;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.spot.is_empty()
    }

    /// Reindex the swap series onto the spot dates and spot gaps.
    ///
    /// Output is sorted by date; for duplicate dates the last observation
    /// wins on both sides. A gap date that also has a spot is not a gap.
    pub fn align(&self) -> Vec<MarketRow> {
        let mut spot: BTreeMap<NaiveDate, Option<f64>> =
            self.spot_gaps.iter().map(|date| (*date, None)).collect();
        spot.extend(self.spot.iter().map(|p| (p.date, Some(p.spot))));
        let swaps: BTreeMap<NaiveDate, f64> = self
            .swap_points
            .iter()
            .map(|p| (p.date, p.swap_points))
            .collect();

        spot.into_iter()
            .map(|(date, spot)| {
                let swap = swaps.get(&date).copied();
                match spot {
                    Some(spot) => MarketRow::new(date, spot, swap),
                    None => MarketRow::spot_gap(date, swap),
                }
            })
            .collect()
    }

    /// Add an explicit constant swap value on every spot date that has none.
    ///
    /// Used when the broker does not publish swap rates for the account.
    pub fn fill_missing_swaps(&mut self, value: f64) -> usize {
        let known: std::collections::HashSet<NaiveDate> =
            self.swap_points.iter().map(|p| p.date).collect();

        let missing: Vec<SwapPoint> = self
            .spot
            .iter()
            .filter(|p| !known.contains(&p.date))
            .map(|p| SwapPoint {
                date: p.date,
                swap_points: value,
            })
            .collect();

        let filled = missing.len();
        self.swap_points.extend(missing);
        self.swap_points.sort_by_key(|p| p.date);
        filled
    }

    /// First and last date, spot gaps included.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let dates = || self.spot.iter().map(|p| p.date).chain(self.spot_gaps.iter().copied());
        let first = dates().min()?;
        let last = dates().max()?;
        Some((first, last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn test_quote_mid() {
        let q = Quote::from_bid_ask("EUR_USD", Utc::now(), 1.0800, 1.0802);
        assert!((q.spot_mid - 1.0801).abs() < 1e-12);
    }

    #[test]
    fn test_align_keeps_gaps() {
        let series = HistoricalSeries::new(
            "EUR_USD",
            vec![
                SpotPoint { date: d(4), spot: 1.08 },
                SpotPoint { date: d(1), spot: 1.07 },
                SpotPoint { date: d(5), spot: 1.09 },
            ],
            vec![
                SwapPoint { date: d(1), swap_points: 0.001 },
                SwapPoint { date: d(5), swap_points: 0.002 },
                // no matching spot date, dropped
                SwapPoint { date: d(2), swap_points: 0.009 },
            ],
        );

        let rows = series.align();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].date, d(1));
        assert_eq!(rows[0].swap_points, Some(0.001));
        assert_eq!(rows[1].date, d(4));
        assert_eq!(rows[1].swap_points, None);
        assert_eq!(rows[2].swap_points, Some(0.002));
    }

    #[test]
    fn test_fill_missing_swaps() {
        let mut series = HistoricalSeries::new(
            "EUR_USD",
            vec![
                SpotPoint { date: d(1), spot: 1.07 },
                SpotPoint { date: d(2), spot: 1.08 },
            ],
            vec![SwapPoint { date: d(2), swap_points: 0.003 }],
        );

        assert_eq!(series.fill_missing_swaps(0.0), 1);
        let rows = series.align();
        assert_eq!(rows[0].swap_points, Some(0.0));
        assert_eq!(rows[1].swap_points, Some(0.003));
        assert_eq!(series.date_range(), Some((d(1), d(2))));
    }

    #[test]
    fn test_align_keeps_spot_gaps_in_sequence() {
        let series = HistoricalSeries::new(
            "EUR_USD",
            vec![
                SpotPoint { date: d(1), spot: 1.07 },
                SpotPoint { date: d(3), spot: 1.09 },
            ],
            vec![
                SwapPoint { date: d(1), swap_points: 0.001 },
                SwapPoint { date: d(2), swap_points: 0.002 },
            ],
        )
        .with_spot_gaps(vec![d(2), d(4)]);

        let rows = series.align();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].spot, Some(1.07));
        assert_eq!(rows[1], MarketRow::spot_gap(d(2), Some(0.002)));
        assert_eq!(rows[2].spot, Some(1.09));
        assert_eq!(rows[3], MarketRow::spot_gap(d(4), None));
        assert_eq!(series.date_range(), Some((d(1), d(4))));
    }

    #[test]
    fn test_priced_date_is_not_a_gap() {
        let series = HistoricalSeries::new("EUR_USD", vec![SpotPoint { date: d(1), spot: 1.07 }], vec![])
            .with_spot_gaps(vec![d(1)]);

        let rows = series.align();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].spot, Some(1.07));
    }
}
