//! PnL path, one-day VaR and distribution summaries.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Daily PnL of a long forward locked at `observed_forward`:
/// `notional * (spot_t - observed_forward)`.
pub fn pnl_path(spot_series: &[f64], observed_forward: f64, notional: f64) -> Vec<f64> {
    spot_series
        .iter()
        .map(|s| notional * (s - observed_forward))
        .collect()
}

/// Percentile `q` in [0, 1] with linear interpolation between closest
/// ranks (rank `q * (n - 1)` of the sorted sample).
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = q * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// One-day Value-at-Risk of a PnL path.
///
/// Negated lower `1 - confidence` quantile of the day-over-day PnL changes.
/// `None` with fewer than two points or a confidence outside (0, 1).
pub fn one_day_var(pnls: &[f64], confidence: f64) -> Option<f64> {
    if pnls.len() < 2 || !(confidence > 0.0 && confidence < 1.0) {
        return None;
    }
    let diffs: Vec<f64> = pnls.windows(2).map(|w| w[1] - w[0]).collect();
    percentile(&diffs, 1.0 - confidence).map(|q| -q)
}

/// Summary statistics of a PnL sample.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PnlDistribution {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// 5th percentile.
    pub p5: f64,
    /// Median.
    pub p50: f64,
    /// 95th percentile.
    pub p95: f64,
    /// Negated 5th percentile.
    pub var_95: f64,
}

impl PnlDistribution {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let mean = values.iter().copied().mean();
        let std_dev = if values.len() > 1 {
            values.iter().copied().std_dev()
        } else {
            0.0
        };
        let min = Statistics::min(values.iter().copied());
        let max = Statistics::max(values.iter().copied());

        let p5 = percentile(values, 0.05).unwrap_or(min);
        let p50 = percentile(values, 0.5).unwrap_or(mean);
        let p95 = percentile(values, 0.95).unwrap_or(max);

        Self {
            count: values.len(),
            mean,
            std_dev,
            min,
            max,
            p5,
            p50,
            p95,
            var_95: -p5,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "PnL distribution ({} paths)\n\
             Mean: ${:.2}  Std: ${:.2}\n\
             Min: ${:.2}  Max: ${:.2}\n\
             P5: ${:.2}  P50: ${:.2}  P95: ${:.2}\n\
             VaR 95%: ${:.2}",
            self.count,
            self.mean,
            self.std_dev,
            self.min,
            self.max,
            self.p5,
            self.p50,
            self.p95,
            self.var_95,
        )
    }
}

/// Equal-width histogram bucket; `upper` is inclusive for the last bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Equal-width histogram over the sample range.
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    if values.is_empty() || bins == 0 {
        return vec![];
    }

    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if hi <= lo {
        return vec![HistogramBin {
            lower: lo,
            upper: hi,
            count: values.len(),
        }];
    }

    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for &v in values {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: lo + width * i as f64,
            upper: lo + width * (i + 1) as f64,
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pnl_path() {
        let pnls = pnl_path(&[1.17, 1.172, 1.168], 1.171, 1_000_000.0);
        assert_eq!(pnls.len(), 3);
        assert!((pnls[0] + 1_000.0).abs() < 1e-6);
        assert!((pnls[1] - 1_000.0).abs() < 1e-6);
        assert!((pnls[2] + 3_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_one_day_var_constant_loss() {
        // PnL falls by 500 every day
        let pnls = [0.0, -500.0, -1000.0, -1500.0];
        let var = one_day_var(&pnls, 0.95).unwrap();
        assert!((var - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_one_day_var_interpolates_changes() {
        let pnls = [0.0, 100.0, -200.0, 50.0, -400.0, 300.0];
        let var = one_day_var(&pnls, 0.95).unwrap();
        // changes sorted: -450 -300 100 250 700; rank 0.2 lies between the first two
        assert!((var - 420.0).abs() < 1e-9);
        assert!(one_day_var(&[1.0], 0.95).is_none());
        assert!(one_day_var(&pnls, 1.5).is_none());
    }

    #[test]
    fn test_percentile_interpolates_between_ranks() {
        let values = [3.0, 1.0, 4.0, 2.0];
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 1.0), Some(4.0));
        assert_eq!(percentile(&values, 0.5), Some(2.5));
        assert!((percentile(&values, 0.1).unwrap() - 1.3).abs() < 1e-12);
        assert_eq!(percentile(&[7.0], 0.05), Some(7.0));
        assert!(percentile(&[], 0.5).is_none());
        assert!(percentile(&values, 1.2).is_none());
    }

    #[test]
    fn test_distribution() {
        let values: Vec<f64> = (1..=100).map(|i| i as f64).collect();
        let dist = PnlDistribution::from_values(&values);
        assert_eq!(dist.count, 100);
        assert!((dist.mean - 50.5).abs() < 1e-9);
        assert_eq!(dist.min, 1.0);
        assert_eq!(dist.max, 100.0);
        assert!((dist.p5 - 5.95).abs() < 1e-9);
        assert!((dist.p50 - 50.5).abs() < 1e-9);
        assert!((dist.p95 - 95.05).abs() < 1e-9);
        assert_eq!(dist.var_95, -dist.p5);
        assert_eq!(PnlDistribution::from_values(&[]).count, 0);
    }

    #[test]
    fn test_histogram() {
        let bins = histogram(&[0.0, 1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0].count, 2);
        assert_eq!(bins[1].count, 3);
        assert_eq!(bins[1].upper, 4.0);

        let flat = histogram(&[5.0, 5.0], 10);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].count, 2);
        assert!(histogram(&[], 3).is_empty());
    }
}
