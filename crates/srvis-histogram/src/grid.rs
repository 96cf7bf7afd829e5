//! Fixed-bin 2-D histogram of localisation positions.
//!
//! Bins follow `numpy.histogram2d`: `n = ceil(span / bin_size)` equal bins per
//! axis between the data minimum and maximum, half-open except the last one,
//! which also takes the maximum. A zero span is widened to `±0.5`.

use log::debug;
use nalgebra::{DMatrix, Point2};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::blur::GaussianBlur;
use crate::color::{ColorLegend, ColorScale, Colormap, Rgba};
use crate::HistogramError;
use srvis_core::percentiles;

/// Auto-scale percentiles of the bin values.
const AUTO_SCALE: [f64; 2] = [5.0, 98.0];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridParams {
    /// Bin edge length in pixels.
    pub bin_size: f64,
    /// Lower end of the colour scale, auto when unset.
    pub scale_min: Option<f64>,
    /// Upper end of the colour scale, auto when unset.
    pub scale_max: Option<f64>,
    pub blur: Option<GaussianBlur>,
    pub colormap: Colormap,
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            bin_size: 1.0,
            scale_min: None,
            scale_max: None,
            blur: None,
            colormap: Colormap::GistHeat,
        }
    }
}

/// One rendered grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridHistogram {
    /// Bin values, rows along x and columns along y.
    pub counts: DMatrix<f64>,
    /// Plot extent `[y_min, y_max, x_max, x_min]` of a top-left origin image
    /// whose rows are x bins.
    pub extent: [f64; 4],
    pub legend: ColorLegend,
}

impl GridHistogram {
    pub fn scale_min(&self) -> f64 {
        self.legend.min
    }

    pub fn scale_max(&self) -> f64 {
        self.legend.max
    }

    /// Colour of every bin in row-major order (`counts.nrows()` rows of
    /// `counts.ncols()`).
    pub fn colors(&self) -> Vec<Rgba> {
        let (rows, cols) = self.counts.shape();
        let mut out = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                out.push(self.legend.color(self.counts[(r, c)]));
            }
        }
        out
    }
}

/// Equal-width bin edges between `lo` and `hi`.
fn axis_bins(lo: f64, hi: f64, bin_size: f64) -> (f64, f64, usize) {
    let n = ((hi - lo) / bin_size).ceil().max(1.0) as usize;
    if lo == hi {
        (lo - 0.5, hi + 0.5, n)
    } else {
        (lo, hi, n)
    }
}

fn bin_index(v: f64, lo: f64, hi: f64, n: usize) -> usize {
    if v >= hi {
        n - 1
    } else {
        (((v - lo) / (hi - lo) * n as f64) as usize).min(n - 1)
    }
}

/// Count points into `ceil(span / bin_size)` bins per axis.
///
/// Returns the count matrix (rows along x) and its extent.
pub fn bin_points(
    points: &[Point2<f64>],
    bin_size: f64,
) -> Result<(DMatrix<f64>, [f64; 4]), HistogramError> {
    if bin_size.is_nan() || bin_size <= 0.0 {
        return Err(HistogramError::InvalidBinSize(bin_size));
    }
    let first = points.first().ok_or(HistogramError::EmptyDataset)?;
    let (mins, maxs) = points.iter().fold((*first, *first), |(lo, hi), p| {
        (
            Point2::new(lo.x.min(p.x), lo.y.min(p.y)),
            Point2::new(hi.x.max(p.x), hi.y.max(p.y)),
        )
    });

    let (x_lo, x_hi, nx) = axis_bins(mins.x, maxs.x, bin_size);
    let (y_lo, y_hi, ny) = axis_bins(mins.y, maxs.y, bin_size);

    let mut counts = DMatrix::zeros(nx, ny);
    for p in points {
        counts[(bin_index(p.x, x_lo, x_hi, nx), bin_index(p.y, y_lo, y_hi, ny))] += 1.0;
    }
    Ok((counts, [y_lo, y_hi, x_hi, x_lo]))
}

#[derive(Clone, Debug, PartialEq)]
struct MemoKey {
    bin_size: f64,
    scale_min: Option<f64>,
    scale_max: Option<f64>,
}

impl MemoKey {
    fn of(params: &GridParams) -> Self {
        Self {
            bin_size: params.bin_size,
            scale_min: params.scale_min,
            scale_max: params.scale_max,
        }
    }
}

#[derive(Clone, Debug)]
struct Binned {
    key: MemoKey,
    counts: DMatrix<f64>,
    extent: [f64; 4],
}

/// Fixed-grid histogram of one point set, re-binned only when the bin size
/// or the requested scale changes.
#[derive(Clone, Debug, Default)]
pub struct FixedGridHistogram {
    points: Vec<Point2<f64>>,
    memo: Option<Binned>,
}

impl FixedGridHistogram {
    pub fn new(points: Vec<Point2<f64>>) -> Self {
        Self { points, memo: None }
    }

    /// Replace the point set and drop the cached grid.
    pub fn set_points(&mut self, points: Vec<Point2<f64>>) {
        self.points = points;
        self.memo = None;
    }

    pub fn points(&self) -> &[Point2<f64>] {
        &self.points
    }

    /// Whether `compute(params)` would reuse the cached grid.
    pub fn is_cached(&self, params: &GridParams) -> bool {
        self.memo
            .as_ref()
            .is_some_and(|m| m.key == MemoKey::of(params))
    }

    /// Bin (or reuse the cached bins), blur a copy if requested, then resolve
    /// the colour scale: unset bounds come from the 5th / 98th percentile of
    /// the bin values.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self), fields(points = self.points.len()))
    )]
    pub fn compute(&mut self, params: &GridParams) -> Result<GridHistogram, HistogramError> {
        if !self.is_cached(params) {
            let (counts, extent) = bin_points(&self.points, params.bin_size)?;
            debug!(
                "binned {} points into {}x{} bins",
                self.points.len(),
                counts.nrows(),
                counts.ncols()
            );
            self.memo = Some(Binned {
                key: MemoKey::of(params),
                counts,
                extent,
            });
        }
        let binned = self.memo.as_ref().ok_or(HistogramError::EmptyDataset)?;

        let counts = match params.blur {
            Some(blur) => blur.apply(&binned.counts),
            None => binned.counts.clone(),
        };
        let [lo, hi] = percentiles(counts.as_slice(), AUTO_SCALE).unwrap_or([0.0, 0.0]);
        let scale = ColorScale::resolve(params.scale_min, params.scale_max, (lo, hi));
        let legend =
            ColorLegend::new(params.colormap, &scale).ok_or(HistogramError::EmptyDataset)?;

        Ok(GridHistogram {
            counts,
            extent: binned.extent,
            legend,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid_points(n: usize) -> Vec<Point2<f64>> {
        (0..n)
            .map(|i| Point2::new((i % 10) as f64 + 0.5, (i / 10 % 10) as f64 + 0.5))
            .collect()
    }

    #[test]
    fn bins_follow_numpy_rules() {
        let pts = vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 4.0),
            Point2::new(2.5, 2.0),
        ];
        let (counts, extent) = bin_points(&pts, 2.0).unwrap();
        assert_eq!(counts.shape(), (5, 2));
        assert_eq!(extent, [0.0, 4.0, 10.0, 0.0]);
        assert_eq!(counts[(0, 0)], 1.0);
        // maximum lands in the closed last bin
        assert_eq!(counts[(4, 1)], 1.0);
        assert_eq!(counts[(1, 1)], 1.0);
        assert_eq!(counts.sum(), 3.0);
    }

    #[test]
    fn zero_span_is_widened() {
        let pts = vec![Point2::new(3.0, 7.0); 4];
        let (counts, extent) = bin_points(&pts, 1.0).unwrap();
        assert_eq!(counts.shape(), (1, 1));
        assert_eq!(counts[(0, 0)], 4.0);
        assert_eq!(extent, [6.5, 7.5, 3.5, 2.5]);
    }

    #[test]
    fn empty_points_are_reported() {
        let mut h = FixedGridHistogram::default();
        assert!(matches!(
            h.compute(&GridParams::default()),
            Err(HistogramError::EmptyDataset)
        ));
        assert!(matches!(
            bin_points(&grid_points(3), 0.0),
            Err(HistogramError::InvalidBinSize(_))
        ));
    }

    #[test]
    fn ten_by_ten_grid_sums_to_n() {
        let mut pts = grid_points(1000);
        pts.push(Point2::new(0.0, 0.0));
        pts.push(Point2::new(10.0, 10.0));
        let mut h = FixedGridHistogram::new(pts);
        let out = h.compute(&GridParams::default()).unwrap();
        assert_eq!(out.counts.shape(), (10, 10));
        assert_relative_eq!(out.counts.sum(), 1002.0);
    }

    #[test]
    fn hundred_square_with_bin_size_ten_gives_ten_by_ten() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(11);
        let mut pts: Vec<_> = (0..500)
            .map(|_| Point2::new(rng.gen_range(0.0..=100.0), rng.gen_range(0.0..=100.0)))
            .collect();
        pts.push(Point2::new(0.0, 0.0));
        pts.push(Point2::new(100.0, 100.0));
        let n = pts.len();

        let mut h = FixedGridHistogram::new(pts);
        let params = GridParams {
            bin_size: 10.0,
            ..GridParams::default()
        };
        let out = h.compute(&params).unwrap();
        assert_eq!(out.counts.shape(), (10, 10));
        assert_relative_eq!(out.counts.sum(), n as f64);
    }

    #[test]
    fn memo_is_keyed_on_request() {
        let mut h = FixedGridHistogram::new(grid_points(100));
        let params = GridParams::default();
        assert!(!h.is_cached(&params));
        h.compute(&params).unwrap();
        assert!(h.is_cached(&params));

        let blurred = GridParams {
            blur: Some(GaussianBlur::new(1.0)),
            ..params.clone()
        };
        assert!(h.is_cached(&blurred));
        let coarse = GridParams {
            bin_size: 2.0,
            ..params.clone()
        };
        assert!(!h.is_cached(&coarse));

        h.set_points(grid_points(50));
        assert!(!h.is_cached(&params));
    }

    #[test]
    fn blur_does_not_touch_cached_counts() {
        let mut h = FixedGridHistogram::new(grid_points(100));
        let plain = h.compute(&GridParams::default()).unwrap();
        let blurred = h
            .compute(&GridParams {
                blur: Some(GaussianBlur::new(2.0)),
                ..GridParams::default()
            })
            .unwrap();
        assert_ne!(plain.counts, blurred.counts);
        let again = h.compute(&GridParams::default()).unwrap();
        assert_eq!(plain.counts, again.counts);
    }

    #[test]
    fn explicit_scale_overrides_auto() {
        let mut h = FixedGridHistogram::new(grid_points(100));
        let out = h
            .compute(&GridParams {
                scale_min: Some(5.0),
                scale_max: Some(5.0),
                ..GridParams::default()
            })
            .unwrap();
        assert_relative_eq!(out.scale_min(), 5.0);
        assert_relative_eq!(out.scale_max(), 5.5);

        // 9x9 bins: the closed last row and column collect two point
        // columns each, so 64 bins hold 1, 16 hold 2 and one holds 4
        let auto = h.compute(&GridParams::default()).unwrap();
        assert_eq!(auto.counts.shape(), (9, 9));
        assert_relative_eq!(auto.scale_min(), 1.0);
        assert_relative_eq!(auto.scale_max(), 2.0);
        assert_eq!(auto.colors().len(), 81);
    }
}
