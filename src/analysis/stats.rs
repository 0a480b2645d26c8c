//! Log transforms, correlation and density estimation.
//!
//! Non-positive mass fractions have no finite logarithm. They are dropped
//! before binning or correlating, and every result carries the number of
//! dropped rows so callers can surface it.

use crate::error::QueryError;
use crate::models::MassFractionTable;
use serde::Serialize;

/// Number of points on a density curve.
const DENSITY_POINTS: usize = 200;

/// Natural log of each value. Zero gives -inf, negatives and NaN give NaN.
pub fn log_transform(values: &[f64]) -> Vec<f64> {
    values.iter().map(|v| v.ln()).collect()
}

/// Keep the finite values, counting the rest.
pub fn finite_values(values: &[f64]) -> (Vec<f64>, usize) {
    let kept: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let dropped = values.len() - kept.len();
    (kept, dropped)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator).
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Pearson correlation coefficient.
///
/// `None` when there are fewer than two pairs, the lengths differ or either
/// side has zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let mx = mean(x)?;
    let my = mean(y)?;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0))
}

/// Quantile of sorted data with linear interpolation.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Equal-width histogram.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    /// `counts.len() + 1` bin edges.
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn bin_width(&self) -> f64 {
        match self.edges.as_slice() {
            [first, second, ..] => second - first,
            _ => 0.0,
        }
    }

    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

/// Number of bins: the larger of Sturges and Freedman-Diaconis.
pub fn auto_bin_count(sorted: &[f64], max_bins: usize) -> usize {
    let n = sorted.len();
    if n < 2 {
        return 1;
    }
    let range = sorted[n - 1] - sorted[0];
    let sturges = ((n as f64).log2() + 1.0).ceil() as usize;

    let iqr = quantile(sorted, 0.75) - quantile(sorted, 0.25);
    let fd = if iqr > 0.0 && range > 0.0 {
        let width = 2.0 * iqr / (n as f64).cbrt();
        (range / width).ceil() as usize
    } else {
        0
    };

    sturges.max(fd).clamp(1, max_bins.max(1))
}

/// Histogram of finite values. `None` when there are no values.
pub fn histogram(values: &[f64], max_bins: usize) -> Option<Histogram> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let (mut lo, mut hi) = (sorted[0], sorted[sorted.len() - 1]);
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let bins = auto_bin_count(&sorted, max_bins);
    let width = (hi - lo) / bins as f64;

    let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();
    let mut counts = vec![0usize; bins];
    for v in &sorted {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    Some(Histogram { edges, counts })
}

/// Gaussian kernel density estimate with Scott's bandwidth, evaluated on
/// `points` evenly spaced positions spanning the data.
///
/// Empty when fewer than two values or the values do not vary.
pub fn gaussian_kde(values: &[f64], points: usize) -> Vec<(f64, f64)> {
    let n = values.len();
    let Some(sd) = std_dev(values) else {
        return Vec::new();
    };
    let bandwidth = sd * (n as f64).powf(-0.2);
    if bandwidth <= 0.0 || points < 2 {
        return Vec::new();
    }

    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let norm = 1.0 / (n as f64 * bandwidth * (2.0 * std::f64::consts::PI).sqrt());

    (0..points)
        .map(|i| {
            let x = lo + (hi - lo) * i as f64 / (points - 1) as f64;
            let density: f64 = values
                .iter()
                .map(|v| {
                    let z = (x - v) / bandwidth;
                    (-0.5 * z * z).exp()
                })
                .sum::<f64>()
                * norm;
            (x, density)
        })
        .collect()
}

/// Log distribution of one condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogDistribution {
    pub condition: String,
    /// Finite log values.
    pub values: Vec<f64>,
    /// Rows whose log was not finite.
    pub dropped: usize,
    pub histogram: Option<Histogram>,
    /// Density curve scaled to histogram counts.
    pub density: Vec<(f64, f64)>,
}

impl LogDistribution {
    pub fn mean(&self) -> Option<f64> {
        mean(&self.values)
    }

    pub fn median(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let mut sorted = self.values.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        Some(quantile(&sorted, 0.5))
    }
}

/// Build the log distribution of a condition from its raw values.
pub fn log_distribution_of(condition: &str, raw: &[f64], max_bins: usize) -> LogDistribution {
    let (values, dropped) = finite_values(&log_transform(raw));
    distribution_of_logs(condition, values, dropped, max_bins)
}

/// Bin already finite log values and fit the density curve.
fn distribution_of_logs(
    condition: &str,
    values: Vec<f64>,
    dropped: usize,
    max_bins: usize,
) -> LogDistribution {
    let histogram = histogram(&values, max_bins);

    let scale = histogram
        .as_ref()
        .map(|h| values.len() as f64 * h.bin_width())
        .unwrap_or(0.0);
    let density = gaussian_kde(&values, DENSITY_POINTS)
        .into_iter()
        .map(|(x, d)| (x, d * scale))
        .collect();

    LogDistribution {
        condition: condition.to_string(),
        values,
        dropped,
        histogram,
        density,
    }
}

/// Log distribution of a mass-fraction column.
pub fn log_distribution(
    table: &MassFractionTable,
    condition: &str,
    max_bins: usize,
) -> Result<LogDistribution, QueryError> {
    let raw = table.require_column(condition)?;
    Ok(log_distribution_of(condition, raw, max_bins))
}

/// A gene plotted on two log axes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogPoint {
    pub gene: String,
    pub x: f64,
    pub y: f64,
}

/// Paired log comparison of two mass-fraction columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogScatter {
    pub first: String,
    pub second: String,
    /// Rows where both logs are finite.
    pub points: Vec<LogPoint>,
    /// Rows dropped because either log was not finite.
    pub dropped: usize,
    /// Pearson correlation over `points`.
    pub correlation: Option<f64>,
    pub first_distribution: LogDistribution,
    pub second_distribution: LogDistribution,
}

/// Log-transform two columns, keep the rows where both are finite and
/// correlate them. The marginal distributions are built from the same
/// paired rows, so every marginal bin lies inside the scatter's range.
pub fn log_scatter(
    table: &MassFractionTable,
    first: &str,
    second: &str,
    max_bins: usize,
) -> Result<LogScatter, QueryError> {
    let a = table.require_column(first)?;
    let b = table.require_column(second)?;
    let log_a = log_transform(a);
    let log_b = log_transform(b);

    let points: Vec<LogPoint> = table
        .keys()
        .iter()
        .zip(log_a.iter().zip(&log_b))
        .filter(|(_, (x, y))| x.is_finite() && y.is_finite())
        .map(|(gene, (&x, &y))| LogPoint {
            gene: gene.clone(),
            x,
            y,
        })
        .collect();
    let dropped = table.len() - points.len();

    let xs: Vec<f64> = points.iter().map(|p| p.x).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.y).collect();
    let correlation = pearson(&xs, &ys);

    Ok(LogScatter {
        first: first.to_string(),
        second: second.to_string(),
        points,
        dropped,
        correlation,
        first_distribution: distribution_of_logs(first, xs, dropped, max_bins),
        second_distribution: distribution_of_logs(second, ys, dropped, max_bins),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NumericTable;

    fn two_column_table(a: Vec<f64>, b: Vec<f64>) -> NumericTable {
        let keys = (0..a.len()).map(|i| format!("G{}", i)).collect();
        NumericTable::new(
            "mass_fraction_combine",
            "gene",
            keys,
            vec!["P1".into(), "P2".into()],
            vec![a, b],
        )
        .unwrap()
    }

    #[test]
    fn test_log_transform_edge_values() {
        let logs = log_transform(&[1.0, 0.0, -1.0, f64::NAN]);
        assert_eq!(logs[0], 0.0);
        assert_eq!(logs[1], f64::NEG_INFINITY);
        assert!(logs[2].is_nan());
        assert!(logs[3].is_nan());

        let (kept, dropped) = finite_values(&logs);
        assert_eq!(kept, vec![0.0]);
        assert_eq!(dropped, 3);
    }

    #[test]
    fn test_pearson_identical_columns() {
        let values = vec![0.001, 0.02, 0.0005, 0.3, 0.07];
        let table = two_column_table(values.clone(), values);
        let scatter = log_scatter(&table, "P1", "P2", 50).unwrap();
        assert!((scatter.correlation.unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_negated_logs() {
        let a = vec![0.001, 0.02, 0.0005, 0.3, 0.07];
        let b: Vec<f64> = a.iter().map(|v| 1.0 / v).collect();
        let table = two_column_table(a, b);
        let scatter = log_scatter(&table, "P1", "P2", 50).unwrap();
        assert!((scatter.correlation.unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_degenerate_inputs() {
        assert_eq!(pearson(&[1.0], &[2.0]), None);
        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), None);
        assert_eq!(pearson(&[1.0, 2.0], &[1.0]), None);
    }

    // Rows with a non-positive value on either side are dropped before
    // correlating, and the drop is counted rather than rejected.
    #[test]
    fn test_log_scatter_drops_non_finite_rows() {
        let a = vec![0.1, 0.0, 0.2, 0.4, -0.1];
        let b = vec![0.1, 0.3, 0.2, 0.4, 0.5];
        let table = two_column_table(a, b);
        let scatter = log_scatter(&table, "P1", "P2", 50).unwrap();

        assert_eq!(scatter.dropped, 2);
        let genes: Vec<&str> = scatter.points.iter().map(|p| p.gene.as_str()).collect();
        assert_eq!(genes, vec!["G0", "G2", "G3"]);
        assert!((scatter.correlation.unwrap() - 1.0).abs() < 1e-12);

        assert_eq!(scatter.first_distribution.dropped, 2);
        assert_eq!(scatter.second_distribution.dropped, 2);
    }

    // A value kept in its own column but dropped from the pair must not
    // reach the marginal histogram.
    #[test]
    fn test_log_scatter_marginals_follow_paired_rows() {
        let table = two_column_table(vec![0.1, 0.2, 0.3, 10.0], vec![0.1, 0.2, 0.3, 0.0]);
        let scatter = log_scatter(&table, "P1", "P2", 50).unwrap();

        assert_eq!(scatter.points.len(), 3);
        let xs: Vec<f64> = scatter.points.iter().map(|p| p.x).collect();
        assert_eq!(scatter.first_distribution.values, xs);

        let hist = scatter.first_distribution.histogram.as_ref().unwrap();
        assert_eq!(hist.counts.iter().sum::<usize>(), 3);
        assert!(*hist.edges.last().unwrap() < 10.0_f64.ln());
        let max_x = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert!(*hist.edges.last().unwrap() <= max_x + 1e-9);
    }

    #[test]
    fn test_log_scatter_unknown_column() {
        let table = two_column_table(vec![0.1], vec![0.1]);
        assert!(matches!(
            log_scatter(&table, "P1", "P9", 50),
            Err(QueryError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_histogram_counts_every_value() {
        let values: Vec<f64> = (0..100).map(|i| i as f64 / 10.0).collect();
        let hist = histogram(&values, 50).unwrap();
        assert_eq!(hist.counts.iter().sum::<usize>(), 100);
        assert_eq!(hist.edges.len(), hist.counts.len() + 1);
        assert!((hist.edges[0] - 0.0).abs() < 1e-12);
        assert!((hist.edges.last().unwrap() - 9.9).abs() < 1e-9);
    }

    #[test]
    fn test_histogram_constant_values() {
        let hist = histogram(&[2.0, 2.0, 2.0], 50).unwrap();
        assert_eq!(hist.counts.iter().sum::<usize>(), 3);
        assert!((hist.edges[0] - 1.5).abs() < 1e-12);
        assert!(histogram(&[], 50).is_none());
    }

    #[test]
    fn test_auto_bin_count_respects_cap() {
        let values: Vec<f64> = (0..10_000).map(|i| i as f64).collect();
        assert_eq!(auto_bin_count(&values, 30), 30);
        assert_eq!(auto_bin_count(&[1.0], 30), 1);
    }

    #[test]
    fn test_kde_integrates_to_one() {
        let values: Vec<f64> = (0..50).map(|i| i as f64 / 49.0).collect();
        let curve = gaussian_kde(&values, 400);
        let step = curve[1].0 - curve[0].0;
        let area: f64 = curve.iter().map(|(_, d)| d * step).sum();
        // The curve only spans the data range, so some tail mass is cut off.
        assert!(area > 0.7 && area <= 1.01, "area = {}", area);
        assert!(gaussian_kde(&[1.0, 1.0], 10).is_empty());
    }

    #[test]
    fn test_log_distribution_reports_drops() {
        let table = two_column_table(vec![0.1, 0.0, 0.01, 1.0], vec![0.1; 4]);
        let dist = log_distribution(&table, "P1", 50).unwrap();
        assert_eq!(dist.dropped, 1);
        assert_eq!(dist.values.len(), 3);
        assert!(dist.histogram.is_some());
        assert!((dist.median().unwrap() - 0.1f64.ln()).abs() < 1e-12);
    }
}
