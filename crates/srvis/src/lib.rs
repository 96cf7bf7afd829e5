//! High-level facade crate for the `srvis-*` workspace.
//!
//! This crate provides:
//! - re-exports of the data-model and histogram crates
//! - a [`Session`] that ties a localisation file to its camera frames
//! - parsing of free-text bound entries, JSON render configs and reports
//! - (feature-gated) RGBA rendering of histograms and frame overlays
//!
//! ## Quickstart
//!
//! ```no_run
//! use srvis::{FilterRange, GridParams, LocalisationFormat, Session};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let format = LocalisationFormat::RapidStorm {
//!     photon_conversion: 4.1,
//!     pixel_size: 106.0,
//! };
//! let mut session = Session::open("localisations.txt", format)?;
//! session.filter([("photonCount", FilterRange::at_least(500.0))], false)?;
//!
//! let params = GridParams {
//!     bin_size: 0.5,
//!     blur: Some(session.precision_blur(0.5, None)?),
//!     ..GridParams::default()
//! };
//! let hist = session.grid_histogram(None)?.compute(&params)?;
//! println!("{} bins", hist.counts.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `srvis::core`: localisation tables, readers, the layered store, filters, export.
//! - `srvis::histogram`: fixed-grid and quad-tree histograms, colour legends, scale bars.
//! - `srvis::render` (feature `image`): rasters as `image::RgbaImage`.

pub use srvis_core as core;
pub use srvis_histogram as histogram;

pub use srvis_core::{
    FilterRange, LocalisationFormat, LocalisationStore, LocalisationTable, Variant,
};
pub use srvis_histogram::{
    ColorLegend, FixedGridHistogram, GaussianBlur, GridHistogram, GridParams, QuadTree,
    QuadTreeParams,
};

mod input;
mod io;
pub mod pipeline;
mod session;

pub use input::{parse_bound, parse_filter_arg, parse_filter_range, try_parse_bound, InvalidRange};
pub use io::{
    ColumnFilter, ConfigError, GridReport, QuadTreeConfig, QuadTreeReport, RenderConfig,
    RenderReport,
};
pub use session::{Session, SessionError, DEFAULT_PRECISION_NM};

#[cfg(feature = "image")]
pub mod render;
