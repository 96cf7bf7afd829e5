//! RGBA rasters of histograms, quad-tree patches and frame overlays.

use std::path::Path;

use image::{Rgba, RgbaImage};
use nalgebra::{Point2, Vector2};

use srvis_core::FrameImage;
use srvis_histogram::{ColorLegend, GridHistogram, QuadPatch, ScaleBar};

const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);
const SCALE_BAR: Rgba<u8> = Rgba([0, 160, 0, 255]);
const MARKER: Rgba<u8> = Rgba([255, 40, 40, 255]);
const LEGEND_GAP: u32 = 2;

/// Fill the half-open pixel rectangle `[x0, x1) × [y0, y1)`, clipped.
fn fill_rect(img: &mut RgbaImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgba<u8>) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    for y in y0.max(0)..y1.min(h) {
        for x in x0.max(0)..x1.min(w) {
            img.put_pixel(x as u32, y as u32, color);
        }
    }
}

/// One pixel per bin; image rows are x bins, columns are y bins, matching
/// the histogram extent.
pub fn grid_image(hist: &GridHistogram) -> RgbaImage {
    let (rows, cols) = hist.counts.shape();
    RgbaImage::from_fn(cols as u32, rows as u32, |c, r| {
        Rgba(hist.legend.color(hist.counts[(r as usize, c as usize)]))
    })
}

/// Maps data pixels onto a y-up raster covering `[mins, maxs]`.
#[derive(Clone, Copy, Debug)]
pub struct PatchCanvas {
    pub mins: Point2<f64>,
    pub maxs: Point2<f64>,
    /// Output pixels per data pixel.
    pub zoom: f64,
}

impl PatchCanvas {
    /// Canvas covering the union of `patches`.
    pub fn around(patches: &[QuadPatch], zoom: f64) -> Option<Self> {
        let first = patches.first()?;
        let (mins, maxs) = patches.iter().fold(
            (first.mins, first.mins + Vector2::from(first.size)),
            |(lo, hi), p| {
                (
                    Point2::new(lo.x.min(p.mins.x), lo.y.min(p.mins.y)),
                    Point2::new(
                        hi.x.max(p.mins.x + p.size[0]),
                        hi.y.max(p.mins.y + p.size[1]),
                    ),
                )
            },
        );
        Some(Self { mins, maxs, zoom })
    }

    pub fn size(&self) -> (u32, u32) {
        let w = ((self.maxs.x - self.mins.x) * self.zoom).ceil().max(1.0);
        let h = ((self.maxs.y - self.mins.y) * self.zoom).ceil().max(1.0);
        (w as u32, h as u32)
    }

    /// Raster position of a data point.
    pub fn to_raster(&self, p: Point2<f64>) -> (f64, f64) {
        (
            (p.x - self.mins.x) * self.zoom,
            (self.maxs.y - p.y) * self.zoom,
        )
    }

    /// Fill the data-space rectangle spanned by `a` and `b`.
    fn fill(&self, img: &mut RgbaImage, a: Point2<f64>, b: Point2<f64>, color: Rgba<u8>) {
        let (ax, ay) = self.to_raster(a);
        let (bx, by) = self.to_raster(b);
        fill_rect(
            img,
            ax.min(bx).round() as i64,
            ay.min(by).round() as i64,
            ax.max(bx).round() as i64,
            ay.max(by).round() as i64,
            color,
        );
    }
}

/// Rasterise quad-tree leaves on a black background.
pub fn quadtree_image(patches: &[QuadPatch], canvas: &PatchCanvas) -> RgbaImage {
    let (w, h) = canvas.size();
    let mut img = RgbaImage::from_pixel(w, h, BACKGROUND);
    for p in patches {
        let far = Point2::new(p.mins.x + p.size[0], p.mins.y + p.size[1]);
        canvas.fill(&mut img, p.mins, far, Rgba(p.color));
    }
    img
}

/// Draw a scale bar given in data pixels.
pub fn draw_scale_bar(img: &mut RgbaImage, bar: &ScaleBar, canvas: &PatchCanvas) {
    let far = Point2::new(bar.origin.x + bar.length, bar.origin.y + bar.height);
    canvas.fill(img, bar.origin, far, SCALE_BAR);
}

/// Append a vertical colour bar (max at the top) to the right of `img`.
pub fn with_legend(img: &RgbaImage, legend: &ColorLegend) -> RgbaImage {
    let (w, h) = img.dimensions();
    let bar = (w / 20).max(8);
    let mut out = RgbaImage::from_pixel(w + LEGEND_GAP + bar, h, BACKGROUND);
    image::imageops::replace(&mut out, img, 0, 0);

    let stops = legend.sample(h as usize);
    for (row, (_, color)) in stops.iter().rev().enumerate() {
        for x in (w + LEGEND_GAP)..out.width() {
            out.put_pixel(x, row as u32, Rgba(*color));
        }
    }
    out
}

/// Greyscale camera frame with the given localisations marked.
pub fn frame_overlay(frame: &FrameImage, xs: &[f64], ys: &[f64]) -> RgbaImage {
    let (lo, hi) = frame.value_range().unwrap_or((0.0, 1.0));
    let span = if hi > lo { hi - lo } else { 1.0 };
    let mut img = RgbaImage::from_fn(frame.width as u32, frame.height as u32, |x, y| {
        let v = frame.get(x as usize, y as usize).unwrap_or(lo);
        let g = (((v - lo) / span).clamp(0.0, 1.0) * 255.0) as u8;
        Rgba([g, g, g, 255])
    });
    for (&x, &y) in xs.iter().zip(ys) {
        if !(x.is_finite() && y.is_finite()) {
            continue;
        }
        let (cx, cy) = (x.round() as i64, y.round() as i64);
        fill_rect(&mut img, cx - 1, cy, cx + 2, cy + 1, MARKER);
        fill_rect(&mut img, cx, cy - 1, cx + 1, cy + 2, MARKER);
    }
    img
}

/// Write a raster as PNG (format from the extension).
pub fn save_png(img: &RgbaImage, path: impl AsRef<Path>) -> image::ImageResult<()> {
    img.save(path)
}
