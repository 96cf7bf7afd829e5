//! Localisation data model for super-resolution microscopy.
//!
//! Reads localisation tables from the supported file dialects, keeps the raw
//! data together with its grouped and drift-corrected variants, filters them
//! in lock-step, and writes `x, y, frame` back out. No plotting here: the
//! histogram crate turns point sets into rasters and patches.

mod export;
mod filter;
mod image;
mod logger;
mod read;
mod stats;
mod store;
mod table;
mod view;

pub use export::{write_xyt, ExportError, PLACEHOLDER};
pub use filter::{filter_table, FilterError, FilterRange, FilterSession};
pub use image::{FrameImage, FrameStack, ImageSource};
pub use read::{
    parse_localisations, parse_rapidstorm, parse_xyt, read_localisations, read_rapidstorm,
    read_xyt, LocalisationFormat, RapidStormField, ReadError,
};
pub use stats::{
    mean, median, percentile, percentiles, std_dev, AttributeHistogram, ColumnSummary,
    ATTRIBUTE_BINS,
};
pub use store::LocalisationStore;
pub use table::{columns, IndexGenerator, LocalisationTable, RecordKey, TableError};
pub use view::{resolve_view, ResolvedView, UnknownVariant, Variant, ViewFlags};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, level_from_verbosity};
