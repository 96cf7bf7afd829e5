//! Column statistics and attribute histograms.

use serde::{Deserialize, Serialize};

use crate::table::{columns, LocalisationTable};

/// Number of bins of an attribute histogram.
pub const ATTRIBUTE_BINS: usize = 50;

fn finite_sorted(values: &[f64]) -> Vec<f64> {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| !x.is_nan()).collect();
    v.sort_by(f64::total_cmp);
    v
}

fn percentile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let pos = (q / 100.0).clamp(0.0, 1.0) * last as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// `q`-th percentile (0..=100) with linear interpolation between the closest
/// ranks. NaN values are ignored; `None` when nothing remains.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    percentile_sorted(&finite_sorted(values), q)
}

/// Several percentiles of the same data, sorting once.
pub fn percentiles<const N: usize>(values: &[f64], qs: [f64; N]) -> Option<[f64; N]> {
    let sorted = finite_sorted(values);
    let mut out = [0.0; N];
    for (o, q) in out.iter_mut().zip(qs) {
        *o = percentile_sorted(&sorted, q)?;
    }
    Some(out)
}

pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 50.0)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    let (sum, n) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), &v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let (sq, n) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), &v| (s + (v - m) * (v - m), n + 1));
    Some((sq / n as f64).sqrt())
}

/// Summary shown next to a filtered column.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub count: usize,
    pub median: f64,
    pub mean: f64,
    pub std: f64,
}

impl ColumnSummary {
    pub fn of(values: &[f64]) -> Option<Self> {
        Some(Self {
            count: values.iter().filter(|v| !v.is_nan()).count(),
            median: median(values)?,
            mean: mean(values)?,
            std: std_dev(values)?,
        })
    }
}

/// Histogram of one column over the unfiltered value range, evaluated for the
/// unfiltered and the filtered data so the two can be overlaid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeHistogram {
    pub column: String,
    /// `ATTRIBUTE_BINS + 1` bin edges.
    pub edges: Vec<f64>,
    pub unfiltered: Vec<f64>,
    pub filtered: Vec<f64>,
}

impl AttributeHistogram {
    /// `None` when `column` is missing from `unfiltered` or holds no numbers.
    ///
    /// The `frame` column is weighted so that bars read as the average number
    /// of localisations per frame.
    pub fn compute(
        column: &str,
        unfiltered: &LocalisationTable,
        filtered: &LocalisationTable,
    ) -> Option<Self> {
        let all = unfiltered.column(column)?;
        let (mut lo, mut hi) = all
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((a, b)) => Some((a.min(v), b.max(v))),
            })?;
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }

        let weight = if column == columns::FRAME {
            let max = unfiltered.column_max(column).unwrap_or(0.0);
            if max > 0.0 {
                ATTRIBUTE_BINS as f64 / max
            } else {
                1.0
            }
        } else {
            1.0
        };

        let width = (hi - lo) / ATTRIBUTE_BINS as f64;
        let edges = (0..=ATTRIBUTE_BINS).map(|i| lo + width * i as f64).collect();
        let bin = |values: &[f64]| {
            let mut counts = vec![0.0; ATTRIBUTE_BINS];
            for &v in values {
                if v.is_nan() || v < lo || v > hi {
                    continue;
                }
                let i = (((v - lo) / width) as usize).min(ATTRIBUTE_BINS - 1);
                counts[i] += weight;
            }
            counts
        };

        Some(Self {
            column: column.to_string(),
            edges,
            unfiltered: bin(all),
            filtered: filtered
                .column(column)
                .map(bin)
                .unwrap_or_else(|| vec![0.0; ATTRIBUTE_BINS]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn percentile_interpolates_linearly() {
        let v = [4.0, 1.0, 3.0, 2.0, f64::NAN];
        assert_relative_eq!(percentile(&v, 0.0).unwrap(), 1.0);
        assert_relative_eq!(percentile(&v, 100.0).unwrap(), 4.0);
        assert_relative_eq!(percentile(&v, 50.0).unwrap(), 2.5);
        assert_relative_eq!(percentile(&v, 5.0).unwrap(), 1.15, epsilon = 1e-12);
        assert!(percentile(&[f64::NAN], 50.0).is_none());
    }

    #[test]
    fn percentiles_match_single_calls() {
        let v: Vec<f64> = (0..37).map(|i| (i * 7 % 37) as f64).collect();
        let [a, b] = percentiles(&v, [5.0, 98.0]).unwrap();
        assert_relative_eq!(a, percentile(&v, 5.0).unwrap());
        assert_relative_eq!(b, percentile(&v, 98.0).unwrap());
    }

    #[test]
    fn summary_uses_population_std() {
        let s = ColumnSummary::of(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(s.count, 8);
        assert_relative_eq!(s.mean, 5.0);
        assert_relative_eq!(s.median, 4.5);
        assert_relative_eq!(s.std, 2.0);
        assert!(ColumnSummary::of(&[]).is_none());
    }

    #[test]
    fn attribute_histogram_overlays_filtered() {
        let names = vec!["x".into(), "y".into(), "frame".into(), "snr".into()];
        let snr: Vec<f64> = (0..=100).map(f64::from).collect();
        let n = snr.len();
        let all = LocalisationTable::new(
            names,
            vec![vec![0.0; n], vec![0.0; n], vec![0.0; n], snr],
        )
        .unwrap();
        let keep: Vec<bool> = (0..n).map(|i| i >= 50).collect();
        let sub = all.select_rows(&keep);

        let h = AttributeHistogram::compute("snr", &all, &sub).unwrap();
        assert_eq!(h.edges.len(), ATTRIBUTE_BINS + 1);
        assert_relative_eq!(h.unfiltered.iter().sum::<f64>(), 101.0);
        assert_relative_eq!(h.filtered.iter().sum::<f64>(), 51.0);
        // last bin is closed
        assert_relative_eq!(h.unfiltered[ATTRIBUTE_BINS - 1], 3.0);
        assert!(AttributeHistogram::compute("photons", &all, &sub).is_none());
    }

    #[test]
    fn frame_histogram_counts_per_frame() {
        let frames: Vec<f64> = (0..100).map(|i| f64::from(i / 2)).collect();
        let t = LocalisationTable::from_xyt(vec![0.0; 100], vec![0.0; 100], frames).unwrap();
        let h = AttributeHistogram::compute("frame", &t, &t).unwrap();
        let total: f64 = h.unfiltered.iter().sum();
        assert_relative_eq!(total, 100.0 * 50.0 / 49.0, epsilon = 1e-9);
    }
}
