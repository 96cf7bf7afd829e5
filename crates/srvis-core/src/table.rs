//! Column-major localisation tables.
//!
//! A [`LocalisationTable`] stores one `Vec<f64>` per named column plus a
//! parallel vector of [`RecordKey`]s. `x`, `y` and `frame` are always present;
//! every other column is optional and depends on the file dialect the table
//! was read from.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Canonical column names.
pub mod columns {
    pub const X: &str = "x";
    pub const Y: &str = "y";
    pub const FRAME: &str = "frame";
    pub const UNCERTAINTY_X: &str = "uncertaintyX";
    pub const UNCERTAINTY_Y: &str = "uncertaintyY";
    pub const PHOTON_COUNT: &str = "photonCount";
    pub const FIT_RESIDUE: &str = "fitResidue";
    pub const SIGNAL_TO_NOISE: &str = "signalToNoise";

    /// Columns every table must carry.
    pub const REQUIRED: [&str; 3] = [X, Y, FRAME];
}

/// Two-level key of a localisation: frame number and the zero-based position
/// of the record inside that frame.
///
/// Keys are assigned once when a table is built and survive filtering
/// unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub frame: i64,
    pub index: u32,
}

/// Generates per-frame sequence indices for frame-ordered rows.
///
/// The index restarts at zero whenever the frame value changes.
#[derive(Clone, Debug, Default)]
pub struct IndexGenerator {
    current: Option<i64>,
    next: u32,
}

impl IndexGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_key(&mut self, frame: i64) -> RecordKey {
        if self.current != Some(frame) {
            self.current = Some(frame);
            self.next = 0;
        }
        let key = RecordKey {
            frame,
            index: self.next,
        };
        self.next += 1;
        key
    }
}

/// Errors raised when assembling a table from raw columns.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TableError {
    #[error("required column '{0}' is missing")]
    MissingRequiredColumn(String),
    #[error("column '{column}' has {got} values, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        got: usize,
    },
    #[error("{names} column names for {columns} columns")]
    NameCount { names: usize, columns: usize },
}

/// An ordered set of localisations sharing one column schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalisationTable {
    names: Vec<String>,
    data: Vec<Vec<f64>>,
    keys: Vec<RecordKey>,
    x: usize,
    y: usize,
    frame: usize,
}

impl LocalisationTable {
    /// Build a table from named columns. Rows must already be ordered by
    /// frame; keys are generated in row order.
    pub fn new(names: Vec<String>, data: Vec<Vec<f64>>) -> Result<Self, TableError> {
        if names.len() != data.len() {
            return Err(TableError::NameCount {
                names: names.len(),
                columns: data.len(),
            });
        }
        let find = |name: &str| {
            names
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| TableError::MissingRequiredColumn(name.to_string()))
        };
        let x = find(columns::X)?;
        let y = find(columns::Y)?;
        let frame = find(columns::FRAME)?;

        let rows = data[frame].len();
        for (name, col) in names.iter().zip(&data) {
            if col.len() != rows {
                return Err(TableError::LengthMismatch {
                    column: name.clone(),
                    expected: rows,
                    got: col.len(),
                });
            }
        }

        let mut generator = IndexGenerator::new();
        let keys = data[frame]
            .iter()
            .map(|&f| generator.next_key(f as i64))
            .collect();

        Ok(Self {
            names,
            data,
            keys,
            x,
            y,
            frame,
        })
    }

    /// Build a table from `x`, `y`, `frame` only.
    pub fn from_xyt(x: Vec<f64>, y: Vec<f64>, frame: Vec<f64>) -> Result<Self, TableError> {
        Self::new(
            vec![
                columns::X.to_string(),
                columns::Y.to_string(),
                columns::FRAME.to_string(),
            ],
            vec![x, y, frame],
        )
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.column_index(name).map(|i| self.data[i].as_slice())
    }

    pub fn keys(&self) -> &[RecordKey] {
        &self.keys
    }

    pub fn x(&self) -> &[f64] {
        &self.data[self.x]
    }

    pub fn y(&self) -> &[f64] {
        &self.data[self.y]
    }

    pub fn frame(&self) -> &[f64] {
        &self.data[self.frame]
    }

    /// All values of one row, in column order.
    pub fn row(&self, i: usize) -> Option<Vec<f64>> {
        (i < self.len()).then(|| self.data.iter().map(|c| c[i]).collect())
    }

    /// Positions as points, in row order.
    pub fn points(&self) -> Vec<Point2<f64>> {
        self.x()
            .iter()
            .zip(self.y())
            .map(|(&x, &y)| Point2::new(x, y))
            .collect()
    }

    /// Row indices belonging to `frame`.
    pub fn frame_rows(&self, frame: i64) -> impl Iterator<Item = usize> + '_ {
        self.keys
            .iter()
            .enumerate()
            .filter(move |(_, k)| k.frame == frame)
            .map(|(i, _)| i)
    }

    /// Largest non-NaN value of a column, `None` when the column is absent or
    /// holds no numbers.
    pub fn column_max(&self, name: &str) -> Option<f64> {
        self.column(name)?
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
    }

    /// New table holding the rows for which `keep` is true. Keys are carried
    /// over, never renumbered.
    pub fn select_rows(&self, keep: &[bool]) -> Self {
        debug_assert_eq!(keep.len(), self.len());
        let pick = |col: &[f64]| -> Vec<f64> {
            col.iter()
                .zip(keep)
                .filter_map(|(&v, &k)| k.then_some(v))
                .collect()
        };
        Self {
            names: self.names.clone(),
            data: self.data.iter().map(|c| pick(c)).collect(),
            keys: self
                .keys
                .iter()
                .zip(keep)
                .filter_map(|(&key, &k)| k.then_some(key))
                .collect(),
            x: self.x,
            y: self.y,
            frame: self.frame,
        }
    }

    /// Divide every value of the named columns by `factor`. Absent columns
    /// are skipped.
    pub(crate) fn divide_columns(&mut self, names: &[&str], factor: f64) {
        for name in names {
            if let Some(i) = self.column_index(name) {
                self.data[i].iter_mut().for_each(|v| *v /= factor);
            }
        }
    }
}
