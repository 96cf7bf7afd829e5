//! Generic tab-separated localisation tables.
//!
//! The header names every column and must contain `x`, `y` and `frame`
//! (case sensitive). Any further columns are kept and can be filtered on.

use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[cfg(feature = "tracing")]
use tracing::instrument;

use super::{read_rows, ReadError};
use crate::table::{columns, LocalisationTable};

/// Read an `x y frame` table from disk; positions are converted from
/// nanometres to pixels with `pixel_size`.
pub fn read_xyt(path: impl AsRef<Path>, pixel_size: f64) -> Result<LocalisationTable, ReadError> {
    let reader = BufReader::new(File::open(path)?);
    parse_xyt(reader, pixel_size)
}

/// Parse an `x y frame` table. Rows are stably sorted by frame before the
/// per-frame keys are assigned.
#[cfg_attr(feature = "tracing", instrument(level = "info", skip(reader)))]
pub fn parse_xyt<R: BufRead>(reader: R, pixel_size: f64) -> Result<LocalisationTable, ReadError> {
    let mut lines = reader.lines();
    let header = lines.next().ok_or(ReadError::Empty)??;
    let names: Vec<String> = header.trim().split('\t').map(str::to_string).collect();
    for required in columns::REQUIRED {
        if !names.iter().any(|n| n == required) {
            return Err(ReadError::MissingRequiredColumn(required.to_string()));
        }
    }
    let frame = names
        .iter()
        .position(|n| n == columns::FRAME)
        .ok_or_else(|| ReadError::MissingRequiredColumn(columns::FRAME.to_string()))?;

    let mut rows = read_rows(lines, Some(names.len()))?;

    // `sort_by` is stable, so rows within one frame keep their file order.
    rows.sort_by(|a, b| a[frame].partial_cmp(&b[frame]).unwrap_or(Ordering::Equal));

    let data: Vec<Vec<f64>> = (0..names.len())
        .map(|c| rows.iter().map(|r| r[c]).collect())
        .collect();

    let mut table = LocalisationTable::new(names, data)?;
    table.divide_columns(&[columns::X, columns::Y], pixel_size);
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn sorts_by_frame_and_converts_units() {
        let src = "x\ty\tframe\tsigma\n300\t600\t2\t1.0\n100\t200\t0\t2.0\n200\t400\t2\t3.0\n500\t500\t1\t4.0\n";
        let t = parse_xyt(Cursor::new(src), 100.0).unwrap();
        assert_eq!(t.frame(), &[0.0, 1.0, 2.0, 2.0]);
        assert_eq!(t.x(), &[1.0, 5.0, 3.0, 2.0]);
        assert_eq!(t.y(), &[2.0, 5.0, 6.0, 4.0]);
        assert_eq!(t.column("sigma").unwrap(), &[2.0, 4.0, 1.0, 3.0]);
        let idx: Vec<_> = t.keys().iter().map(|k| (k.frame, k.index)).collect();
        assert_eq!(idx, vec![(0, 0), (1, 0), (2, 0), (2, 1)]);
    }

    #[test]
    fn header_is_case_sensitive() {
        let src = "X\ty\tframe\n1\t2\t0\n";
        let err = parse_xyt(Cursor::new(src), 1.0).unwrap_err();
        assert!(matches!(err, ReadError::MissingRequiredColumn(ref c) if c == "x"));
    }

    #[test]
    fn missing_frame_column() {
        let src = "x\ty\tt\n1\t2\t0\n";
        let err = parse_xyt(Cursor::new(src), 1.0).unwrap_err();
        assert!(matches!(err, ReadError::MissingRequiredColumn(ref c) if c == "frame"));
    }

    #[test]
    fn body_may_use_spaces() {
        let src = "x\ty\tframe\n1 2   0\n";
        let t = parse_xyt(Cursor::new(src), 1.0).unwrap();
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn row_width_must_match_header() {
        let src = "x\ty\tframe\n1 2\n";
        let err = parse_xyt(Cursor::new(src), 1.0).unwrap_err();
        assert!(matches!(err, ReadError::ColumnCount { expected: 3, got: 2, .. }));
    }
}
