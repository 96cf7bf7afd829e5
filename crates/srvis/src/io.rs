//! JSON configuration and report for batch rendering.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use srvis_core::{FilterRange, LocalisationFormat, Variant};
use srvis_histogram::{ColorLegend, Colormap, GridParams, QuadTreeParams, ScaleBar};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Range filter on one named column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub column: String,
    #[serde(flatten)]
    pub range: FilterRange,
}

fn default_zoom() -> f64 {
    1.0
}

/// Quad-tree rendering options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuadTreeConfig {
    #[serde(flatten)]
    pub params: QuadTreeParams,
    #[serde(default)]
    pub scale_min: Option<f64>,
    #[serde(default)]
    pub scale_max: Option<f64>,
    #[serde(default)]
    pub colormap: Colormap,
    /// Output pixels per data pixel.
    #[serde(default = "default_zoom")]
    pub zoom: f64,
}

impl Default for QuadTreeConfig {
    fn default() -> Self {
        Self {
            params: QuadTreeParams::default(),
            scale_min: None,
            scale_max: None,
            colormap: Colormap::default(),
            zoom: default_zoom(),
        }
    }
}

/// One batch run: read, filter, histogram, render and export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub input_path: String,
    pub format: LocalisationFormat,
    /// Applied together, non-cascading.
    #[serde(default)]
    pub filters: Vec<ColumnFilter>,
    /// Explicit data variant, otherwise the preferred one.
    #[serde(default)]
    pub view: Option<Variant>,
    #[serde(default)]
    pub grid: Option<GridParams>,
    /// Derive the grid blur from the localisation precision, overriding
    /// `grid.blur`.
    #[serde(default)]
    pub precision_blur: bool,
    #[serde(default)]
    pub quadtree: Option<QuadTreeConfig>,
    /// Draw a scale bar on the quad-tree image.
    #[serde(default)]
    pub scale_bar: bool,
    #[serde(default)]
    pub grid_image_path: Option<String>,
    #[serde(default)]
    pub quadtree_image_path: Option<String>,
    /// `x, y, frame` export of the filtered view.
    #[serde(default)]
    pub export_path: Option<String>,
    #[serde(default)]
    pub output_path: Option<String>,
}

impl RenderConfig {
    /// Config for `input_path` with nothing but defaults.
    pub fn new(input_path: impl Into<String>, format: LocalisationFormat) -> Self {
        Self {
            input_path: input_path.into(),
            format,
            filters: Vec::new(),
            view: None,
            grid: None,
            precision_blur: false,
            quadtree: None,
            scale_bar: false,
            grid_image_path: None,
            quadtree_image_path: None,
            export_path: None,
            output_path: None,
        }
    }

    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve the output report path.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("srvis_render_report.json"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridReport {
    /// Rows (x bins) and columns (y bins).
    pub bins: [usize; 2],
    pub extent: [f64; 4],
    #[serde(default)]
    pub blur_sigma: Option<f64>,
    pub legend: ColorLegend,
    #[serde(default)]
    pub image_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuadTreeReport {
    pub cells: usize,
    pub leaves: usize,
    pub unresolved: usize,
    pub legend: ColorLegend,
    #[serde(default)]
    pub scale_bar: Option<ScaleBar>,
    #[serde(default)]
    pub image_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderReport {
    pub input_path: String,
    pub config_path: String,
    /// Name of the table that was rendered, e.g. `originalFiltered`.
    #[serde(default)]
    pub view: Option<String>,
    #[serde(default)]
    pub num_localisations: usize,
    #[serde(default)]
    pub num_shown: usize,
    /// Filters with relative bounds resolved to absolute values.
    #[serde(default)]
    pub filters: Vec<ColumnFilter>,
    /// Localisation precision, pixels.
    #[serde(default)]
    pub precision: Option<f64>,
    #[serde(default)]
    pub grid: Option<GridReport>,
    #[serde(default)]
    pub quadtree: Option<QuadTreeReport>,
    #[serde(default)]
    pub export_path: Option<String>,
    #[serde(default)]
    pub num_exported: Option<usize>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RenderReport {
    /// Empty report for a config.
    pub fn new(cfg: &RenderConfig, config_path: &Path) -> Self {
        Self {
            input_path: cfg.input_path.clone(),
            config_path: config_path.to_string_lossy().into_owned(),
            view: None,
            num_localisations: 0,
            num_shown: 0,
            filters: Vec::new(),
            precision: None,
            grid: None,
            quadtree: None,
            export_path: None,
            num_exported: None,
            error: None,
        }
    }

    /// Record a failure.
    pub fn set_error(&mut self, err: impl std::fmt::Display) {
        self.error = Some(err.to_string());
    }

    /// Load a report from JSON on disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this report to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_takes_defaults() {
        let cfg: RenderConfig = serde_json::from_str(
            r#"{
                "input_path": "data.txt",
                "format": { "kind": "xyt", "pixel_size": 100.0 },
                "filters": [ { "column": "frame", "max": 10 } ],
                "grid": { "bin_size": 2.0 },
                "quadtree": { "eps": 20 }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.filters[0].range, FilterRange::at_most(10.0));
        let grid = cfg.grid.as_ref().unwrap();
        assert_eq!(grid.bin_size, 2.0);
        assert!(grid.blur.is_none());
        let quad = cfg.quadtree.as_ref().unwrap();
        assert_eq!(quad.params.eps, 20);
        assert_eq!(quad.params.unit_length, QuadTreeParams::default().unit_length);
        assert_eq!(quad.zoom, 1.0);
        assert!(cfg.view.is_none());
        assert_eq!(cfg.output_path(), PathBuf::from("srvis_render_report.json"));
    }

    #[test]
    fn config_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        let mut cfg = RenderConfig::new(
            "in.txt",
            LocalisationFormat::RapidStorm {
                photon_conversion: 4.1,
                pixel_size: 106.0,
            },
        );
        cfg.view = Some(Variant::Grouped);
        cfg.filters.push(ColumnFilter {
            column: "photonCount".into(),
            range: FilterRange::relative(Some(0.1), None),
        });
        cfg.write_json(&path).unwrap();

        let back = RenderConfig::load_json(&path).unwrap();
        assert_eq!(back.format, cfg.format);
        assert_eq!(back.filters, cfg.filters);
        assert_eq!(back.view, Some(Variant::Grouped));
    }

    #[test]
    fn missing_config_is_io_error() {
        assert!(matches!(
            RenderConfig::load_json("/definitely/not/here.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
