//! Density images of localisation point clouds.
//!
//! Two renderings of the same points:
//!
//! - [`FixedGridHistogram`]: counts on a regular grid, optionally blurred,
//!   memoised on the request parameters.
//! - [`QuadTree`]: adaptive cells coloured by points per area.
//!
//! Both resolve their colour range into a [`ColorLegend`] that renderers
//! receive alongside the data.

mod blur;
mod color;
mod grid;
mod quadtree;
mod scalebar;

pub use blur::GaussianBlur;
pub use color::{ColorLegend, ColorScale, Colormap, Rgba, TRANSPARENT};
pub use grid::{bin_points, FixedGridHistogram, GridHistogram, GridParams};
pub use quadtree::{QuadCell, QuadPatch, QuadTree, QuadTreeParams};
pub use scalebar::{bar_length_nm, ScaleBar, BAR_LENGTHS_NM, FALLBACK_LENGTH_NM};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum HistogramError {
    #[error("no localisations to histogram")]
    EmptyDataset,
    #[error("bin size must be positive, got {0}")]
    InvalidBinSize(f64),
}
