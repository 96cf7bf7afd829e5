//! Layered localisation store.
//!
//! Holds the raw table read from file plus the optional grouped and
//! drift-corrected tables produced by external algorithms, each with a
//! filtered sibling. Which of them callers see is decided by
//! [`resolve_view`](crate::view::resolve_view).

use std::path::Path;

use log::{debug, info};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::export::{write_xyt, ExportError};
use crate::filter::{FilterError, FilterRange, FilterSession};
use crate::table::LocalisationTable;
use crate::view::{resolve_view, ResolvedView, Variant, ViewFlags};

#[derive(Clone, Debug)]
struct Layer {
    base: LocalisationTable,
    filtered: Option<LocalisationTable>,
}

impl Layer {
    fn new(base: LocalisationTable) -> Self {
        Self {
            base,
            filtered: None,
        }
    }

    fn get(&self, filtered: bool) -> Option<&LocalisationTable> {
        if filtered {
            self.filtered.as_ref()
        } else {
            Some(&self.base)
        }
    }
}

/// Raw, grouped and drift-corrected localisations with their filtered views.
#[derive(Clone, Debug)]
pub struct LocalisationStore {
    raw: Layer,
    grouped: Option<Layer>,
    drift_corrected: Option<Layer>,
    drift_corrected_ungrouped: Option<Layer>,
    flags: ViewFlags,
    filter_ranges: Vec<(String, FilterRange)>,
}

impl LocalisationStore {
    pub fn new(raw: LocalisationTable) -> Self {
        Self {
            raw: Layer::new(raw),
            grouped: None,
            drift_corrected: None,
            drift_corrected_ungrouped: None,
            flags: ViewFlags::default(),
            filter_ranges: Vec::new(),
        }
    }

    /// Replace the raw table and forget every filter and derived table.
    pub fn load(&mut self, raw: LocalisationTable) {
        info!("loaded {} localisations", raw.len());
        *self = Self::new(raw);
    }

    pub fn flags(&self) -> ViewFlags {
        self.flags
    }

    pub fn is_filtered(&self) -> bool {
        self.flags.is_filtered
    }

    pub fn is_grouped(&self) -> bool {
        self.flags.is_grouped
    }

    pub fn has_drift_correction(&self) -> bool {
        self.flags.has_drift_correction
    }

    /// Absolute column ranges applied so far, in application order. Folding
    /// them over the unfiltered tables reproduces the filtered ones.
    pub fn filter_ranges(&self) -> &[(String, FilterRange)] {
        &self.filter_ranges
    }

    pub fn raw(&self) -> &LocalisationTable {
        &self.raw.base
    }

    fn layer(&self, variant: Variant) -> Option<&Layer> {
        match variant {
            Variant::Original => Some(&self.raw),
            Variant::Grouped => self.grouped.as_ref(),
            Variant::DriftCorrected => self.drift_corrected.as_ref(),
            Variant::DriftCorrectedUngrouped => self.drift_corrected_ungrouped.as_ref(),
        }
    }

    fn layer_mut(&mut self, variant: Variant) -> Option<&mut Layer> {
        match variant {
            Variant::Original => Some(&mut self.raw),
            Variant::Grouped => self.grouped.as_mut(),
            Variant::DriftCorrected => self.drift_corrected.as_mut(),
            Variant::DriftCorrectedUngrouped => self.drift_corrected_ungrouped.as_mut(),
        }
    }

    fn populated(&self) -> impl Iterator<Item = (Variant, &Layer)> + '_ {
        Variant::ALL
            .into_iter()
            .filter_map(|v| self.layer(v).map(|l| (v, l)))
    }

    /// Which table a request resolves to, whether or not it is populated.
    pub fn resolve(&self, request: Option<Variant>, include_filtered: bool) -> ResolvedView {
        resolve_view(self.flags, request, include_filtered)
    }

    /// Name of the table a request resolves to, e.g. `groupedFiltered`.
    pub fn view_name(&self, request: Option<Variant>, include_filtered: bool) -> String {
        self.resolve(request, include_filtered).to_string()
    }

    /// The table selected by the resolution rule, `None` if that variant has
    /// not been populated.
    pub fn current_view(
        &self,
        request: Option<Variant>,
        include_filtered: bool,
    ) -> Option<&LocalisationTable> {
        let view = self.resolve(request, include_filtered);
        self.layer(view.variant)?.get(view.filtered)
    }

    /// Shorthand for `current_view(None, true)`; always populated.
    pub fn current(&self) -> &LocalisationTable {
        self.current_view(None, true).unwrap_or(&self.raw.base)
    }

    pub fn number_of_localisations(&self, request: Option<Variant>) -> usize {
        self.current_view(request, true)
            .map_or(0, LocalisationTable::len)
    }

    /// Hand in the result of an external grouping run. While a filter is
    /// active the grouped table gets its filtered sibling immediately.
    pub fn attach_grouped(&mut self, grouped: LocalisationTable) -> Result<(), FilterError> {
        let layer = self.refiltered_layer(Variant::Grouped, grouped)?;
        self.grouped = Some(layer);
        self.flags.is_grouped = true;
        Ok(())
    }

    pub fn detach_grouped(&mut self) {
        self.grouped = None;
        self.flags.is_grouped = false;
    }

    /// Hand in the result of an external drift correction with detected
    /// fiducials: the grouped and the ungrouped corrected tables.
    pub fn attach_drift_corrected(
        &mut self,
        grouped: LocalisationTable,
        ungrouped: LocalisationTable,
    ) -> Result<(), FilterError> {
        let corrected = self.refiltered_layer(Variant::DriftCorrected, grouped)?;
        let corrected_ungrouped =
            self.refiltered_layer(Variant::DriftCorrectedUngrouped, ungrouped)?;
        self.drift_corrected = Some(corrected);
        self.drift_corrected_ungrouped = Some(corrected_ungrouped);
        self.flags.has_drift_correction = true;
        Ok(())
    }

    pub fn detach_drift_correction(&mut self) {
        self.drift_corrected = None;
        self.drift_corrected_ungrouped = None;
        self.flags.has_drift_correction = false;
    }

    fn refiltered_layer(
        &self,
        variant: Variant,
        table: LocalisationTable,
    ) -> Result<Layer, FilterError> {
        let mut layer = Layer::new(table);
        if self.flags.is_filtered {
            let session = FilterSession::new([(variant, layer.base.clone())])
                .fold(self.filter_ranges.iter().map(|(c, r)| (c.as_str(), r)))?;
            layer.filtered = session.into_tables().remove(&variant);
        }
        Ok(layer)
    }

    /// Filter every populated variant by `ranges`.
    ///
    /// With `cascading == false` the filtered tables are first reset to the
    /// unfiltered ones and the stored ranges are replaced by `ranges`.
    /// With `cascading == true` filtering continues from the current filtered
    /// tables and `ranges` are appended to the stored ones. On error the store
    /// is left unchanged.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self, ranges)))]
    pub fn apply_filters<I, K>(&mut self, ranges: I, cascading: bool) -> Result<(), FilterError>
    where
        I: IntoIterator<Item = (K, FilterRange)>,
        K: Into<String>,
    {
        let resolved: Vec<(String, FilterRange)> = ranges
            .into_iter()
            .map(|(c, r)| {
                let column = c.into();
                let max = self.raw.base.column_max(&column).unwrap_or(f64::NAN);
                let range = r.resolve(max);
                (column, range)
            })
            .collect();

        let from_filtered = cascading && self.flags.is_filtered;
        let seed = self.populated().map(|(v, layer)| {
            let source = if from_filtered {
                layer.filtered.as_ref().unwrap_or(&layer.base)
            } else {
                &layer.base
            };
            (v, source.clone())
        });
        let session =
            FilterSession::new(seed).fold(resolved.iter().map(|(c, r)| (c.as_str(), r)))?;

        for (variant, table) in session.into_tables() {
            if let Some(layer) = self.layer_mut(variant) {
                debug!(
                    "{variant}: {} of {} localisations pass",
                    table.len(),
                    layer.base.len()
                );
                layer.filtered = Some(table);
            }
        }
        if !cascading {
            self.filter_ranges.clear();
        }
        self.filter_ranges.extend(resolved);
        self.flags.is_filtered = true;
        Ok(())
    }

    /// Cascade a single column filter on top of the current state.
    pub fn apply_filter(&mut self, column: &str, range: FilterRange) -> Result<(), FilterError> {
        self.apply_filters([(column, range)], true)
    }

    /// Drop every filtered table; views fall back to the unfiltered data.
    pub fn reset_filters(&mut self) {
        for variant in Variant::ALL {
            if let Some(layer) = self.layer_mut(variant) {
                layer.filtered = None;
            }
        }
        self.filter_ranges.clear();
        self.flags.is_filtered = false;
    }

    /// Make the filtered tables the new unfiltered ones (pre-filtering) and
    /// clear the filter state. Does nothing when unfiltered.
    pub fn commit_filtered(&mut self) {
        if !self.flags.is_filtered {
            return;
        }
        for variant in Variant::ALL {
            if let Some(layer) = self.layer_mut(variant) {
                if let Some(filtered) = layer.filtered.take() {
                    layer.base = filtered;
                }
            }
        }
        info!("filtered localisations committed, {} remain", self.raw.base.len());
        self.reset_filters();
    }

    /// Export `x, y, frame` of the resolved view in nanometres.
    ///
    /// See [`write_xyt`] for the failure behaviour.
    pub fn save(
        &self,
        path: impl AsRef<Path>,
        pixel_size: f64,
        request: Option<Variant>,
    ) -> Result<usize, ExportError> {
        write_xyt(path, self.current_view(request, true), pixel_size)
    }
}
