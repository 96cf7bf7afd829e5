//! Per-column range filters.
//!
//! A [`FilterSession`] holds the evolving filtered copies of every populated
//! variant during one filter application. Each `(column, range)` pair is
//! folded over all of them in lock-step, so later pairs compose with earlier
//! ones.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::table::LocalisationTable;
use crate::view::Variant;

/// Closed interval on one column. Unset bounds are −∞ / +∞.
///
/// A `relative` range holds fractions of the column maximum instead of
/// absolute values; bounds above 1 are read as percentages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterRange {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub relative: bool,
}

impl FilterRange {
    /// The range that accepts every row.
    pub const OPEN: FilterRange = FilterRange {
        min: None,
        max: None,
        relative: false,
    };

    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            min,
            max,
            relative: false,
        }
    }

    pub fn between(min: f64, max: f64) -> Self {
        Self::new(Some(min), Some(max))
    }

    pub fn at_least(min: f64) -> Self {
        Self::new(Some(min), None)
    }

    pub fn at_most(max: f64) -> Self {
        Self::new(None, Some(max))
    }

    pub fn relative(min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            min,
            max,
            relative: true,
        }
    }

    pub fn is_open(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn lower(&self) -> f64 {
        self.min.unwrap_or(f64::NEG_INFINITY)
    }

    pub fn upper(&self) -> f64 {
        self.max.unwrap_or(f64::INFINITY)
    }

    /// `min ≤ v ≤ max`. NaN never passes a bounded range; an open range
    /// accepts everything.
    pub fn contains(&self, v: f64) -> bool {
        self.is_open() || (v >= self.lower() && v <= self.upper())
    }

    /// Turn a relative range into absolute bounds against `column_max`.
    pub fn resolve(self, column_max: f64) -> FilterRange {
        if !self.relative {
            return self;
        }
        let scale = |b: f64| {
            let frac = if b > 1.0 { b / 100.0 } else { b };
            column_max * frac
        };
        FilterRange::new(self.min.map(scale), self.max.map(scale))
    }
}

/// Errors raised while filtering.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("cannot filter on unknown column '{column}' ({variant} table)")]
    UnknownColumn { column: String, variant: Variant },
}

/// Keep the rows of `table` whose `column` lies in `range`.
pub fn filter_table(
    table: &LocalisationTable,
    column: &str,
    range: &FilterRange,
) -> Option<LocalisationTable> {
    let values = table.column(column)?;
    let keep: Vec<bool> = values.iter().map(|&v| range.contains(v)).collect();
    Some(table.select_rows(&keep))
}

/// Filtered tables of every populated variant, threaded through one filter
/// application.
#[derive(Clone, Debug, Default)]
pub struct FilterSession {
    tables: BTreeMap<Variant, LocalisationTable>,
}

impl FilterSession {
    /// Start a session from the tables each variant should be filtered from:
    /// the unfiltered tables for a fresh application, the previous filtered
    /// tables for a cascading one.
    pub fn new(seed: impl IntoIterator<Item = (Variant, LocalisationTable)>) -> Self {
        Self {
            tables: seed.into_iter().collect(),
        }
    }

    /// Apply one range to every table of the session.
    pub fn apply(mut self, column: &str, range: &FilterRange) -> Result<Self, FilterError> {
        if range.is_open() {
            return Ok(self);
        }
        for (&variant, table) in self.tables.iter_mut() {
            *table =
                filter_table(table, column, range).ok_or_else(|| FilterError::UnknownColumn {
                    column: column.to_string(),
                    variant,
                })?;
        }
        Ok(self)
    }

    /// Fold a sequence of ranges over the session.
    pub fn fold<'a, I>(self, ranges: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = (&'a str, &'a FilterRange)>,
    {
        ranges
            .into_iter()
            .try_fold(self, |session, (column, range)| session.apply(column, range))
    }

    pub fn get(&self, variant: Variant) -> Option<&LocalisationTable> {
        self.tables.get(&variant)
    }

    pub fn into_tables(self) -> BTreeMap<Variant, LocalisationTable> {
        self.tables
    }
}
