//! One opened localisation file together with its camera frames.

use std::path::{Path, PathBuf};

use log::{debug, info};
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

use srvis_core::{
    columns, mean, read_localisations, AttributeHistogram, ColumnSummary, ExportError,
    FilterError, FilterRange, FrameImage, ImageSource, LocalisationFormat, LocalisationStore,
    LocalisationTable, ReadError, Variant,
};
use srvis_histogram::{
    FixedGridHistogram, GaussianBlur, HistogramError, QuadTree, QuadTreeParams, ScaleBar,
};

/// Localisation precision assumed when the data carries no uncertainties.
pub const DEFAULT_PRECISION_NM: f64 = 20.0;

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Histogram(#[from] HistogramError),
    #[error("session was not opened from a file")]
    NoSource,
    #[error("no {view} localisations are loaded")]
    MissingView { view: String },
}

/// Data handler: the localisation store, the dialect it was read with and
/// an optional source of raw camera frames.
pub struct Session {
    store: LocalisationStore,
    format: LocalisationFormat,
    path: Option<PathBuf>,
    images: Option<Box<dyn ImageSource>>,
}

impl Session {
    /// Read `path` in the given dialect.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(path, format), fields(path = %path.as_ref().display()))
    )]
    pub fn open(path: impl AsRef<Path>, format: LocalisationFormat) -> Result<Self, SessionError> {
        let path = path.as_ref();
        let table = read_localisations(path, &format)?;
        info!("opened {}", path.display());
        Ok(Self {
            store: LocalisationStore::new(table),
            format,
            path: Some(path.to_path_buf()),
            images: None,
        })
    }

    /// Session over an in-memory table.
    pub fn from_table(table: LocalisationTable, format: LocalisationFormat) -> Self {
        Self {
            store: LocalisationStore::new(table),
            format,
            path: None,
            images: None,
        }
    }

    /// Read the source file again, dropping filters and derived tables.
    pub fn reload(&mut self) -> Result<(), SessionError> {
        let path = self.path.as_ref().ok_or(SessionError::NoSource)?;
        let table = read_localisations(path, &self.format)?;
        self.store.load(table);
        Ok(())
    }

    pub fn store(&self) -> &LocalisationStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut LocalisationStore {
        &mut self.store
    }

    pub fn format(&self) -> &LocalisationFormat {
        &self.format
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Nanometres per pixel.
    pub fn pixel_size(&self) -> f64 {
        self.format.pixel_size()
    }

    pub fn set_image_source(&mut self, images: Box<dyn ImageSource>) {
        debug!("image source with {} frames", images.max_frame());
        self.images = Some(images);
    }

    /// Frame count of the image source, 0 without one.
    pub fn max_image_frame(&self) -> usize {
        self.images.as_ref().map_or(0, |s| s.max_frame())
    }

    pub fn frame_image(&self, frame: usize) -> Option<FrameImage> {
        self.images.as_ref()?.image(frame)
    }

    /// `x` and `y` of the current view's localisations in one frame.
    pub fn localisations_in_frame(&self, frame: usize) -> (Vec<f64>, Vec<f64>) {
        let table = self.store.current();
        let Ok(frame) = i64::try_from(frame) else {
            return (Vec::new(), Vec::new());
        };
        table
            .frame_rows(frame)
            .map(|i| (table.x()[i], table.y()[i]))
            .unzip()
    }

    pub fn number_of_localisations(&self, request: Option<Variant>) -> usize {
        self.store.number_of_localisations(request)
    }

    /// See [`LocalisationStore::apply_filters`].
    pub fn filter<I, K>(&mut self, ranges: I, cascading: bool) -> Result<(), SessionError>
    where
        I: IntoIterator<Item = (K, FilterRange)>,
        K: Into<String>,
    {
        self.store.apply_filters(ranges, cascading)?;
        info!(
            "{} of {} localisations after filtering",
            self.store.number_of_localisations(None),
            self.store.current_view(None, false).map_or(0, LocalisationTable::len)
        );
        Ok(())
    }

    pub fn reset_filters(&mut self) {
        self.store.reset_filters();
    }

    /// Median, mean and standard deviation of a column of the current view.
    pub fn column_summary(&self, column: &str) -> Option<ColumnSummary> {
        ColumnSummary::of(self.store.current().column(column)?)
    }

    /// Filtered against unfiltered histogram of every attribute column of the
    /// current view (everything but the positions).
    pub fn attribute_histograms(&self) -> Vec<AttributeHistogram> {
        let filtered = self.store.current();
        let Some(unfiltered) = self.store.current_view(None, false) else {
            return Vec::new();
        };
        unfiltered
            .column_names()
            .iter()
            .filter(|c| c.as_str() != columns::X && c.as_str() != columns::Y)
            .filter_map(|c| AttributeHistogram::compute(c, unfiltered, filtered))
            .collect()
    }

    /// The filtered table `request` resolves to; an unpopulated variant is
    /// [`SessionError::MissingView`].
    pub fn view(&self, request: Option<Variant>) -> Result<&LocalisationTable, SessionError> {
        self.store
            .current_view(request, true)
            .ok_or_else(|| SessionError::MissingView {
                view: self.store.view_name(request, true),
            })
    }

    /// Positions of the resolved view, in pixels.
    pub fn points(&self, request: Option<Variant>) -> Result<Vec<Point2<f64>>, SessionError> {
        Ok(self.view(request)?.points())
    }

    /// Localisation precision in pixels: mean plus two sample standard
    /// deviations of `uncertaintyX`, or [`DEFAULT_PRECISION_NM`] when the
    /// column is missing or too short.
    pub fn localisation_precision(&self, request: Option<Variant>) -> Result<f64, SessionError> {
        let fallback = DEFAULT_PRECISION_NM / self.pixel_size();
        let Some(values) = self.view(request)?.column(columns::UNCERTAINTY_X) else {
            return Ok(fallback);
        };
        let values: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if values.len() < 2 {
            return Ok(fallback);
        }
        let Some(mu) = mean(&values) else {
            return Ok(fallback);
        };
        let var =
            values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
        Ok(mu + 2.0 * var.sqrt())
    }

    /// Blur whose sigma equals the localisation precision on a grid of
    /// `bin_size` pixels.
    pub fn precision_blur(
        &self,
        bin_size: f64,
        request: Option<Variant>,
    ) -> Result<GaussianBlur, SessionError> {
        Ok(GaussianBlur::from_precision(
            self.localisation_precision(request)?,
            bin_size,
        ))
    }

    pub fn grid_histogram(
        &self,
        request: Option<Variant>,
    ) -> Result<FixedGridHistogram, SessionError> {
        Ok(FixedGridHistogram::new(self.points(request)?))
    }

    pub fn quad_tree(
        &self,
        params: &QuadTreeParams,
        request: Option<Variant>,
    ) -> Result<QuadTree, SessionError> {
        Ok(QuadTree::build(&self.points(request)?, params)?)
    }

    /// Smallest `x` and `y` of the resolved view.
    pub fn data_min(&self, request: Option<Variant>) -> Option<Point2<f64>> {
        self.view(request).ok()?.points().into_iter().reduce(|lo, p| {
            Point2::new(lo.x.min(p.x), lo.y.min(p.y))
        })
    }

    /// Scale bar for a view window given in pixels.
    pub fn scale_bar(
        &self,
        view_min: Point2<f64>,
        view_max: Point2<f64>,
        request: Option<Variant>,
    ) -> ScaleBar {
        let data_min = self.data_min(request).unwrap_or(view_min);
        ScaleBar::for_view(view_min, view_max, data_min, self.pixel_size())
    }

    /// Export the resolved view in nanometres.
    pub fn save(
        &self,
        path: impl AsRef<Path>,
        request: Option<Variant>,
    ) -> Result<usize, SessionError> {
        Ok(self.store.save(path, self.pixel_size(), request)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use srvis_core::FrameStack;

    fn xyt() -> LocalisationFormat {
        LocalisationFormat::Xyt { pixel_size: 100.0 }
    }

    fn session() -> Session {
        let table = LocalisationTable::new(
            vec![
                "x".into(),
                "y".into(),
                "frame".into(),
                columns::UNCERTAINTY_X.into(),
            ],
            vec![
                vec![1.0, 2.0, 3.0, 4.0, 5.0],
                vec![5.0, 4.0, 3.0, 2.0, 1.0],
                vec![0.0, 0.0, 1.0, 1.0, 1.0],
                vec![0.1, 0.2, 0.3, 0.4, 0.5],
            ],
        )
        .unwrap();
        Session::from_table(table, xyt())
    }

    #[test]
    fn frame_overlay_follows_filter() {
        let mut s = session();
        assert_eq!(s.localisations_in_frame(1), (vec![3.0, 4.0, 5.0], vec![3.0, 2.0, 1.0]));
        assert_eq!(s.localisations_in_frame(7), (vec![], vec![]));

        s.filter([("x", FilterRange::at_most(3.5))], false).unwrap();
        assert_eq!(s.localisations_in_frame(1), (vec![3.0], vec![3.0]));
        assert_eq!(s.number_of_localisations(None), 3);

        s.reset_filters();
        assert_eq!(s.number_of_localisations(None), 5);
    }

    #[test]
    fn precision_is_mean_plus_two_sample_std() {
        let s = session();
        // mean 0.3, sample std sqrt(0.025)
        assert_relative_eq!(
            s.localisation_precision(None).unwrap(),
            0.3 + 2.0 * 0.025f64.sqrt(),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            s.precision_blur(0.5, None).unwrap().sigma,
            2.0 * s.localisation_precision(None).unwrap()
        );

        let bare = Session::from_table(
            LocalisationTable::from_xyt(vec![0.0], vec![0.0], vec![0.0]).unwrap(),
            xyt(),
        );
        assert_relative_eq!(bare.localisation_precision(None).unwrap(), 0.2);
    }

    #[test]
    fn attribute_histograms_skip_positions() {
        let mut s = session();
        s.filter([("frame", FilterRange::at_least(1.0))], false).unwrap();
        let hists = s.attribute_histograms();
        let names: Vec<&str> = hists.iter().map(|h| h.column.as_str()).collect();
        assert_eq!(names, ["frame", columns::UNCERTAINTY_X]);

        let summary = s.column_summary(columns::UNCERTAINTY_X).unwrap();
        assert_eq!(summary.count, 3);
        assert_relative_eq!(summary.median, 0.4);
    }

    #[test]
    fn image_source_is_optional() {
        let mut s = session();
        assert_eq!(s.max_image_frame(), 0);
        assert!(s.frame_image(0).is_none());

        let frame = FrameImage::new(2, 1, vec![0.0, 1.0]).unwrap();
        s.set_image_source(Box::new(FrameStack::new(vec![frame.clone(), frame])));
        assert_eq!(s.max_image_frame(), 2);
        assert!(s.frame_image(1).is_some());
        assert!(s.frame_image(2).is_none());

        let single = FrameImage::new(1, 1, vec![4.0]).unwrap();
        s.set_image_source(Box::new(FrameStack::new(vec![single])));
        assert_eq!(s.max_image_frame(), 1);
    }

    #[test]
    fn reload_needs_a_file() {
        let mut s = session();
        assert!(matches!(s.reload(), Err(SessionError::NoSource)));
    }

    #[test]
    fn histograms_cover_current_view() {
        let s = session();
        let mut grid = s.grid_histogram(None).unwrap();
        assert_eq!(grid.points().len(), 5);
        assert!(grid.compute(&Default::default()).is_ok());
        let tree = s.quad_tree(&QuadTreeParams::default(), None).unwrap();
        assert_eq!(tree.root().count(), 5);
        assert_eq!(s.data_min(None), Some(Point2::new(1.0, 1.0)));
    }

    #[test]
    fn histograms_follow_requested_view() {
        let mut s = session();
        s.filter([("frame", FilterRange::at_least(1.0))], false).unwrap();
        assert_eq!(s.points(None).unwrap().len(), 3);
        assert_eq!(
            s.points(Some(Variant::Original)).unwrap().len(),
            3,
            "explicit original still shows the filtered table"
        );

        let missing = Some(Variant::Grouped);
        assert!(matches!(
            s.grid_histogram(missing),
            Err(SessionError::MissingView { ref view }) if view == "groupedFiltered"
        ));
        assert!(s.quad_tree(&QuadTreeParams::default(), missing).is_err());
        assert!(s.localisation_precision(missing).is_err());
        assert_eq!(s.data_min(missing), None);

        let grouped = LocalisationTable::from_xyt(vec![7.0], vec![8.0], vec![1.0]).unwrap();
        s.store_mut().attach_grouped(grouped).unwrap();
        let tree = s.quad_tree(&QuadTreeParams::default(), missing).unwrap();
        assert_eq!(tree.root().count(), 1);
        assert_eq!(s.data_min(missing), Some(Point2::new(7.0, 8.0)));
    }
}
