use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Kernel half-width in standard deviations.
const TRUNCATE: f64 = 4.0;

/// Separable Gaussian blur of a count raster.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaussianBlur {
    /// Standard deviation in bins.
    pub sigma: f64,
}

impl Default for GaussianBlur {
    fn default() -> Self {
        Self { sigma: 1.0 }
    }
}

impl GaussianBlur {
    pub fn new(sigma: f64) -> Self {
        Self { sigma }
    }

    /// Blur matching a localisation precision (pixels) on a grid of
    /// `bin_size` pixels.
    pub fn from_precision(precision: f64, bin_size: f64) -> Self {
        Self::new(precision / bin_size)
    }

    pub fn radius(&self) -> usize {
        (TRUNCATE * self.sigma + 0.5).floor().max(0.0) as usize
    }

    /// Normalised taps, `2 * radius + 1` long.
    pub fn taps(&self) -> Vec<f64> {
        let r = self.radius() as isize;
        let denom = 2.0 * self.sigma * self.sigma;
        let raw: Vec<f64> = (-r..=r)
            .map(|x| (-((x * x) as f64) / denom).exp())
            .collect();
        let sum: f64 = raw.iter().sum();
        raw.into_iter().map(|w| w / sum).collect()
    }

    /// Blurred copy of `src`. Borders reflect about the edge
    /// (`d c b a | a b c d | d c b a`). A non-positive sigma returns `src`
    /// unchanged.
    pub fn apply(&self, src: &DMatrix<f64>) -> DMatrix<f64> {
        if self.sigma.is_nan() || self.sigma <= 0.0 || src.is_empty() {
            return src.clone();
        }
        let taps = self.taps();
        let vertical = convolve(src, &taps, true);
        convolve(&vertical, &taps, false)
    }
}

/// 1-D convolution along every column (`vertical`) or every row of `m`.
fn convolve(m: &DMatrix<f64>, taps: &[f64], vertical: bool) -> DMatrix<f64> {
    let r = (taps.len() / 2) as isize;
    let len = if vertical { m.nrows() } else { m.ncols() };
    DMatrix::from_fn(m.nrows(), m.ncols(), |i, j| {
        let centre = (if vertical { i } else { j }) as isize;
        taps.iter()
            .enumerate()
            .map(|(k, &w)| {
                let p = reflect(centre + k as isize - r, len);
                let v = if vertical { m[(p, j)] } else { m[(i, p)] };
                w * v
            })
            .sum()
    })
}

fn reflect(i: isize, len: usize) -> usize {
    let n = len as isize;
    let period = 2 * n;
    let i = i.rem_euclid(period);
    (if i >= n { period - 1 - i } else { i }) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn kernel_matches_truncated_gaussian() {
        let blur = GaussianBlur::new(1.0);
        assert_eq!(blur.radius(), 4);
        let taps = blur.taps();
        assert_eq!(taps.len(), 9);
        assert_relative_eq!(taps.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(taps[3] / taps[4], (-0.5f64).exp(), epsilon = 1e-12);
        assert_eq!(GaussianBlur::new(0.1).radius(), 0);
    }

    #[test]
    fn reflect_indices() {
        let got: Vec<usize> = (-3..7).map(|i| reflect(i, 4)).collect();
        assert_eq!(got, vec![2, 1, 0, 0, 1, 2, 3, 3, 2, 1]);
        assert_eq!(reflect(-1, 1), 0);
    }

    #[test]
    fn blur_conserves_mass_and_spreads_peak() {
        let mut m = DMatrix::zeros(15, 15);
        m[(7, 7)] = 100.0;
        let out = GaussianBlur::new(1.5).apply(&m);
        assert_relative_eq!(out.sum(), 100.0, epsilon = 1e-9);
        assert!(out[(7, 7)] < 100.0);
        assert!(out[(7, 6)] > 0.0);
        assert_relative_eq!(out[(6, 7)], out[(8, 7)], epsilon = 1e-12);
        assert_relative_eq!(out[(7, 6)], out[(6, 7)], epsilon = 1e-12);
        // the input is left alone
        assert_eq!(m[(7, 7)], 100.0);
    }

    #[test]
    fn constant_raster_is_unchanged() {
        let m = DMatrix::from_element(3, 4, 2.0);
        let out = GaussianBlur::new(2.0).apply(&m);
        for v in out.iter() {
            assert_relative_eq!(*v, 2.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn zero_sigma_is_identity() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(GaussianBlur::new(0.0).apply(&m), m);
    }
}
