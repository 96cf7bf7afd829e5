//! Batch run of a [`RenderConfig`].

use std::path::Path;

use log::{info, warn};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::io::{
    ColumnFilter, GridReport, QuadTreeConfig, QuadTreeReport, RenderConfig, RenderReport,
};
use crate::session::{Session, SessionError};
use srvis_histogram::GridParams;

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[cfg(feature = "image")]
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Run `cfg` and describe what was done. Failures are recorded in
/// [`RenderReport::error`]; whatever was produced before the failure stays in
/// the report.
pub fn run(cfg: &RenderConfig, config_path: &Path) -> RenderReport {
    let mut report = RenderReport::new(cfg, config_path);
    if let Err(e) = run_into(cfg, &mut report) {
        warn!("render of {} failed: {e}", cfg.input_path);
        report.set_error(e);
    }
    report
}

#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(cfg, report), fields(input = %cfg.input_path))
)]
fn run_into(cfg: &RenderConfig, report: &mut RenderReport) -> Result<(), RenderError> {
    let mut session = Session::open(&cfg.input_path, cfg.format)?;
    if !cfg.filters.is_empty() {
        session.filter(
            cfg.filters.iter().map(|f| (f.column.clone(), f.range)),
            false,
        )?;
    }
    let store = session.store();
    report.view = Some(store.view_name(cfg.view, true));
    report.num_localisations = store
        .current_view(cfg.view, false)
        .map_or(0, |t| t.len());
    report.num_shown = session.number_of_localisations(cfg.view);
    report.filters = store
        .filter_ranges()
        .iter()
        .map(|(column, range)| ColumnFilter {
            column: column.clone(),
            range: *range,
        })
        .collect();
    report.precision = Some(session.localisation_precision(cfg.view)?);

    if let Some(params) = &cfg.grid {
        report.grid = Some(render_grid(&session, cfg, params)?);
    }
    if let Some(quad) = &cfg.quadtree {
        report.quadtree = Some(render_quadtree(&session, cfg, quad)?);
    }
    if let Some(path) = &cfg.export_path {
        report.export_path = Some(path.clone());
        report.num_exported = Some(session.save(path, cfg.view)?);
    }
    Ok(())
}

fn render_grid(
    session: &Session,
    cfg: &RenderConfig,
    params: &GridParams,
) -> Result<GridReport, RenderError> {
    let mut params = params.clone();
    if cfg.precision_blur {
        params.blur = Some(session.precision_blur(params.bin_size, cfg.view)?);
    }
    let mut grid = session.grid_histogram(cfg.view)?;
    let hist = grid.compute(&params).map_err(SessionError::from)?;
    info!(
        "grid {}x{} bins, scale {:.3}..{:.3}",
        hist.counts.nrows(),
        hist.counts.ncols(),
        hist.scale_min(),
        hist.scale_max()
    );

    let image_path = match &cfg.grid_image_path {
        Some(path) => write_grid_image(&hist, path)?,
        None => None,
    };
    Ok(GridReport {
        bins: [hist.counts.nrows(), hist.counts.ncols()],
        extent: hist.extent,
        blur_sigma: params.blur.map(|b| b.sigma),
        legend: hist.legend,
        image_path,
    })
}

fn render_quadtree(
    session: &Session,
    cfg: &RenderConfig,
    quad: &QuadTreeConfig,
) -> Result<QuadTreeReport, RenderError> {
    let tree = session.quad_tree(&quad.params, cfg.view)?;
    let (patches, legend) = tree
        .patches(quad.scale_min, quad.scale_max, quad.colormap)
        .map_err(SessionError::from)?;
    info!("quad-tree with {} leaves", patches.len());

    let root = tree.root();
    let scale_bar = cfg
        .scale_bar
        .then(|| session.scale_bar(root.mins, root.maxs, cfg.view));

    let image_path = match &cfg.quadtree_image_path {
        Some(path) => {
            write_quadtree_image(&patches, &legend, scale_bar.as_ref(), quad.zoom, path)?
        }
        None => None,
    };
    Ok(QuadTreeReport {
        cells: tree.cells().len(),
        leaves: patches.len(),
        unresolved: tree.unresolved(),
        legend,
        scale_bar,
        image_path,
    })
}

#[cfg(feature = "image")]
fn write_grid_image(
    hist: &srvis_histogram::GridHistogram,
    path: &str,
) -> Result<Option<String>, RenderError> {
    let img = crate::render::with_legend(&crate::render::grid_image(hist), &hist.legend);
    crate::render::save_png(&img, path)?;
    info!("wrote {path}");
    Ok(Some(path.to_string()))
}

#[cfg(not(feature = "image"))]
fn write_grid_image(
    _hist: &srvis_histogram::GridHistogram,
    path: &str,
) -> Result<Option<String>, RenderError> {
    warn!("built without the image feature, not writing {path}");
    Ok(None)
}

#[cfg(feature = "image")]
fn write_quadtree_image(
    patches: &[srvis_histogram::QuadPatch],
    legend: &srvis_histogram::ColorLegend,
    scale_bar: Option<&srvis_histogram::ScaleBar>,
    zoom: f64,
    path: &str,
) -> Result<Option<String>, RenderError> {
    use crate::render::{draw_scale_bar, quadtree_image, save_png, with_legend, PatchCanvas};

    let Some(canvas) = PatchCanvas::around(patches, zoom) else {
        return Ok(None);
    };
    let mut img = quadtree_image(patches, &canvas);
    if let Some(bar) = scale_bar {
        draw_scale_bar(&mut img, bar, &canvas);
    }
    save_png(&with_legend(&img, legend), path)?;
    info!("wrote {path}");
    Ok(Some(path.to_string()))
}

#[cfg(not(feature = "image"))]
fn write_quadtree_image(
    _patches: &[srvis_histogram::QuadPatch],
    _legend: &srvis_histogram::ColorLegend,
    _scale_bar: Option<&srvis_histogram::ScaleBar>,
    _zoom: f64,
    path: &str,
) -> Result<Option<String>, RenderError> {
    warn!("built without the image feature, not writing {path}");
    Ok(None)
}
