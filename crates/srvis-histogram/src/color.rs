//! Value → RGBA mapping shared by the raster and the quad-tree renderers.

use std::sync::OnceLock;

use log::warn;
use serde::{Deserialize, Serialize};

/// 8-bit RGBA.
pub type Rgba = [u8; 4];

/// Colour returned for NaN values.
pub const TRANSPARENT: Rgba = [0, 0, 0, 0];

const LUT_SIZE: usize = 256;

/// Colour tables.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Colormap {
    /// Black → red → yellow → white.
    #[default]
    GistHeat,
}

fn gist_heat_lut() -> &'static [Rgba; LUT_SIZE] {
    static LUT: OnceLock<[Rgba; LUT_SIZE]> = OnceLock::new();
    LUT.get_or_init(|| {
        let channel = |v: f64| (v.clamp(0.0, 1.0) * 255.0) as u8;
        let mut lut = [[0u8; 4]; LUT_SIZE];
        for (i, c) in lut.iter_mut().enumerate() {
            let t = i as f64 / (LUT_SIZE - 1) as f64;
            *c = [
                channel(1.5 * t),
                channel(2.0 * t - 1.0),
                channel(4.0 * t - 3.0),
                255,
            ];
        }
        lut
    })
}

impl Colormap {
    fn lut(self) -> &'static [Rgba; LUT_SIZE] {
        match self {
            Colormap::GistHeat => gist_heat_lut(),
        }
    }

    /// Colour of a normalised value. Values outside `[0, 1]` clamp to the
    /// end colours.
    pub fn map(self, t: f64) -> Rgba {
        if t.is_nan() {
            return TRANSPARENT;
        }
        let idx = (t * LUT_SIZE as f64).clamp(0.0, (LUT_SIZE - 1) as f64) as usize;
        self.lut()[idx]
    }
}

/// Normalisation of raw values into `[0, 1]` before the colour lookup.
///
/// Either bound may be unset:
///
/// | bounds     | `t`                       |
/// |------------|---------------------------|
/// | min, max   | `(v − min) / (max − min)` |
/// | max only   | `v / max`                 |
/// | min only   | `v − min`                 |
/// | none       | `v`                       |
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorScale {
    min: Option<f64>,
    max: Option<f64>,
}

impl ColorScale {
    /// Equal bounds are widened to `max = min × 1.1`.
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        let max = match (min, max) {
            (Some(lo), Some(hi)) if lo == hi => {
                warn!("zero colour scale range at {lo}, widening to {}", lo * 1.1);
                Some(lo * 1.1)
            }
            _ => max,
        };
        Self { min, max }
    }

    /// Combine user bounds with automatically derived ones. A resulting
    /// `max ≤ min` becomes `max = min × 1.1`.
    pub fn resolve(min: Option<f64>, max: Option<f64>, auto: (f64, f64)) -> Self {
        let lo = min.unwrap_or(auto.0);
        let mut hi = max.unwrap_or(auto.1);
        if hi <= lo {
            hi = lo * 1.1;
        }
        Self::new(Some(lo), Some(hi))
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn normalize(&self, v: f64) -> f64 {
        match (self.min, self.max) {
            (Some(lo), Some(hi)) => {
                let span = hi - lo;
                // min = max = 0 survives widening
                if span == 0.0 {
                    0.0
                } else {
                    (v - lo) / span
                }
            }
            (None, Some(hi)) => v / hi,
            (Some(lo), None) => v - lo,
            (None, None) => v,
        }
    }

    pub fn color(&self, colormap: Colormap, v: f64) -> Rgba {
        colormap.map(self.normalize(v))
    }
}

/// Resolved colour range handed to renderers together with the data.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorLegend {
    pub colormap: Colormap,
    pub min: f64,
    pub max: f64,
}

impl ColorLegend {
    pub fn new(colormap: Colormap, scale: &ColorScale) -> Option<Self> {
        Some(Self {
            colormap,
            min: scale.min()?,
            max: scale.max()?,
        })
    }

    pub fn scale(&self) -> ColorScale {
        ColorScale {
            min: Some(self.min),
            max: Some(self.max),
        }
    }

    pub fn color(&self, v: f64) -> Rgba {
        self.scale().color(self.colormap, v)
    }

    /// `n` evenly spaced `(value, colour)` stops from `min` to `max`.
    pub fn sample(&self, n: usize) -> Vec<(f64, Rgba)> {
        match n {
            0 => Vec::new(),
            1 => vec![(self.min, self.color(self.min))],
            _ => (0..n)
                .map(|i| {
                    let v = self.min + (self.max - self.min) * i as f64 / (n - 1) as f64;
                    (v, self.color(v))
                })
                .collect(),
        }
    }
}
