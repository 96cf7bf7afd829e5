//! Adaptive quad-tree histogram.
//!
//! Starting from the bounding box of all points, every cell holding at least
//! `eps` points is split into four equal quadrants until cells are either
//! sparse or smaller than `unit_length²`. Each leaf is drawn with a colour
//! proportional to its density (points per area), which gives fine detail in
//! dense regions and coarse patches in the background.
//!
//! Cells live in one arena; each owns a contiguous range of a permutation of
//! the input points, and the four children of a cell are stored next to each
//! other.

use std::collections::VecDeque;

use log::{debug, warn};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::color::{ColorLegend, ColorScale, Colormap, Rgba};
use crate::HistogramError;
use srvis_core::percentiles;

/// Auto-scale percentiles of the leaf densities.
const AUTO_SCALE: [f64; 2] = [5.0, 95.0];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadTreeParams {
    /// Cells with fewer points are not split.
    pub eps: usize,
    /// Cells with an area below `unit_length²` are not split.
    pub unit_length: f64,
    /// Ceiling on processed cells.
    pub max_iterations: usize,
}

impl Default for QuadTreeParams {
    fn default() -> Self {
        Self {
            eps: 10,
            unit_length: 10.0,
            max_iterations: 1_000_000,
        }
    }
}

/// One node of the tree.
#[derive(Clone, Debug, PartialEq)]
pub struct QuadCell {
    pub mins: Point2<f64>,
    pub maxs: Point2<f64>,
    start: usize,
    end: usize,
    children: Option<usize>,
}

impl QuadCell {
    pub fn count(&self) -> usize {
        self.end - self.start
    }

    pub fn area(&self) -> f64 {
        (self.maxs.x - self.mins.x) * (self.maxs.y - self.mins.y)
    }

    pub fn density(&self) -> f64 {
        self.count() as f64 / self.area()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Arena indices of the four children.
    pub fn children(&self) -> Option<std::ops::Range<usize>> {
        self.children.map(|c| c..c + 4)
    }
}

/// A leaf ready to draw.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuadPatch {
    pub mins: Point2<f64>,
    pub size: [f64; 2],
    pub density: f64,
    pub color: Rgba,
}

#[derive(Clone, Debug)]
pub struct QuadTree {
    points: Vec<Point2<f64>>,
    order: Vec<usize>,
    cells: Vec<QuadCell>,
    processed: usize,
    unresolved: usize,
}

fn quadrant(p: &Point2<f64>, mid: &Point2<f64>) -> u8 {
    match (p.x < mid.x, p.y < mid.y) {
        (true, true) => 0,
        (true, false) => 1,
        (false, true) => 2,
        (false, false) => 3,
    }
}

impl QuadTree {
    /// Subdivide `points` until every cell satisfies the stop criterion or
    /// `max_iterations` cells have been processed. Non-finite points are
    /// dropped.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(points), fields(points = points.len()))
    )]
    pub fn build(points: &[Point2<f64>], params: &QuadTreeParams) -> Result<Self, HistogramError> {
        let points: Vec<Point2<f64>> = points
            .iter()
            .copied()
            .filter(|p| p.x.is_finite() && p.y.is_finite())
            .collect();
        let first = *points.first().ok_or(HistogramError::EmptyDataset)?;
        let (mins, maxs) = points.iter().fold((first, first), |(lo, hi), p| {
            (
                Point2::new(lo.x.min(p.x), lo.y.min(p.y)),
                Point2::new(hi.x.max(p.x), hi.y.max(p.y)),
            )
        });

        let mut tree = QuadTree {
            order: (0..points.len()).collect(),
            cells: vec![QuadCell {
                mins,
                maxs,
                start: 0,
                end: points.len(),
                children: None,
            }],
            points,
            processed: 0,
            unresolved: 0,
        };
        tree.subdivide(params);
        debug!(
            "quad-tree: {} cells, {} leaves after {} steps",
            tree.cells.len(),
            tree.leaves().count(),
            tree.processed
        );
        Ok(tree)
    }

    fn subdivide(&mut self, params: &QuadTreeParams) {
        let unit_area = params.unit_length * params.unit_length;
        let mut queue = VecDeque::from([0usize]);

        while let Some(ci) = queue.pop_front() {
            if self.processed == params.max_iterations {
                self.unresolved = queue.len() + 1;
                warn!(
                    "quad-tree stopped after {} cells, {} left unresolved",
                    self.processed, self.unresolved
                );
                break;
            }
            self.processed += 1;

            let cell = &self.cells[ci];
            if cell.count() < params.eps || cell.area() < unit_area {
                continue;
            }
            let (mins, maxs, start, end) = (cell.mins, cell.maxs, cell.start, cell.end);
            let mid = Point2::new(0.5 * (mins.x + maxs.x), 0.5 * (mins.y + maxs.y));

            let points = &self.points;
            self.order[start..end].sort_by_key(|&i| quadrant(&points[i], &mid));
            let mut bounds = [start; 5];
            bounds[4] = end;
            for q in 1..4u8 {
                let prev = bounds[q as usize - 1];
                let len = self.order[prev..end]
                    .iter()
                    .take_while(|&&i| quadrant(&points[i], &mid) < q)
                    .count();
                bounds[q as usize] = prev + len;
            }

            let boxes = [
                (mins, mid),
                (Point2::new(mins.x, mid.y), Point2::new(mid.x, maxs.y)),
                (Point2::new(mid.x, mins.y), Point2::new(maxs.x, mid.y)),
                (mid, maxs),
            ];
            let first_child = self.cells.len();
            for (q, (lo, hi)) in boxes.into_iter().enumerate() {
                self.cells.push(QuadCell {
                    mins: lo,
                    maxs: hi,
                    start: bounds[q],
                    end: bounds[q + 1],
                    children: None,
                });
            }
            self.cells[ci].children = Some(first_child);
            queue.extend(first_child..first_child + 4);
        }
    }

    pub fn cells(&self) -> &[QuadCell] {
        &self.cells
    }

    pub fn root(&self) -> &QuadCell {
        &self.cells[0]
    }

    pub fn leaves(&self) -> impl Iterator<Item = &QuadCell> + '_ {
        self.cells.iter().filter(|c| c.is_leaf())
    }

    /// Points inside `cell`.
    pub fn cell_points<'a>(&'a self, cell: &QuadCell) -> impl Iterator<Item = Point2<f64>> + 'a {
        self.order[cell.start..cell.end]
            .iter()
            .map(move |&i| self.points[i])
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Cells taken from the worklist.
    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Cells still waiting when the iteration ceiling was hit, 0 when the
    /// subdivision finished.
    pub fn unresolved(&self) -> usize {
        self.unresolved
    }

    /// Colour scale over leaf densities: unset bounds come from the 5th /
    /// 95th percentile of the finite densities.
    pub fn color_scale(&self, scale_min: Option<f64>, scale_max: Option<f64>) -> ColorScale {
        let densities: Vec<f64> = self
            .leaves()
            .map(QuadCell::density)
            .filter(|d| d.is_finite())
            .collect();
        let [lo, hi] = percentiles(&densities, AUTO_SCALE).unwrap_or([0.0, 0.0]);
        ColorScale::resolve(scale_min, scale_max, (lo, hi))
    }

    /// Every leaf as a coloured rectangle, plus the legend they share.
    pub fn patches(
        &self,
        scale_min: Option<f64>,
        scale_max: Option<f64>,
        colormap: Colormap,
    ) -> Result<(Vec<QuadPatch>, ColorLegend), HistogramError> {
        let scale = self.color_scale(scale_min, scale_max);
        let legend = ColorLegend::new(colormap, &scale).ok_or(HistogramError::EmptyDataset)?;
        let patches = self
            .leaves()
            .map(|c| QuadPatch {
                mins: c.mins,
                size: [c.maxs.x - c.mins.x, c.maxs.y - c.mins.y],
                density: c.density(),
                color: legend.color(c.density()),
            })
            .collect();
        Ok((patches, legend))
    }
}
