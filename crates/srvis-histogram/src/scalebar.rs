use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Bar lengths tried in order, nanometres.
pub const BAR_LENGTHS_NM: [f64; 5] = [50.0, 100.0, 500.0, 1000.0, 5000.0];

/// Used when no candidate covers 5–10 % of the view.
pub const FALLBACK_LENGTH_NM: f64 = 10_000.0;

/// A scale bar in view (pixel) coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScaleBar {
    pub length_nm: f64,
    /// Top-left corner.
    pub origin: Point2<f64>,
    pub length: f64,
    pub height: f64,
}

/// First candidate length covering at least 5 % and less than 10 % of
/// `view_width_nm`.
pub fn bar_length_nm(view_width_nm: f64) -> f64 {
    BAR_LENGTHS_NM
        .into_iter()
        .find(|&l| {
            let frac = l / view_width_nm;
            (0.05..0.1).contains(&frac)
        })
        .unwrap_or(FALLBACK_LENGTH_NM)
}

impl ScaleBar {
    /// Place a bar for the view `[view_min, view_max]` (pixels). The bar is
    /// inset by 5 % of the view from the lower-left corner of the data or the
    /// view, whichever is further inside, and is a tenth as high as long.
    pub fn for_view(
        view_min: Point2<f64>,
        view_max: Point2<f64>,
        data_min: Point2<f64>,
        pixel_size: f64,
    ) -> Self {
        let width = view_max.x - view_min.x;
        let height = view_max.y - view_min.y;
        let length_nm = bar_length_nm(width * pixel_size);
        let length = length_nm / pixel_size;
        let bar_height = 0.1 * length;

        let inset_x = 0.05 * width;
        let inset_y = 0.05 * height;
        let x = data_min.x.max(view_min.x) + inset_x;
        let y = data_min.y.max(view_min.y) + inset_y - bar_height;

        Self {
            length_nm,
            origin: Point2::new(x, y),
            length,
            height: bar_height,
        }
    }
}
