//! Readers for the two supported localisation file dialects.
//!
//! Both dialects end up in the same canonical [`LocalisationTable`]; the
//! [`LocalisationFormat`] tag selects the parser.

mod error;
mod rapidstorm;
mod xyt;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::table::LocalisationTable;

pub use error::ReadError;
pub use rapidstorm::{parse_rapidstorm, read_rapidstorm, RapidStormField};
pub use xyt::{parse_xyt, read_xyt};

/// Localisation file dialect plus the unit conversions it needs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LocalisationFormat {
    /// XML-annotated RapidStorm output.
    RapidStorm {
        /// Camera counts per photon.
        photon_conversion: f64,
        /// Nanometres per pixel.
        pixel_size: f64,
    },
    /// Generic tab-separated table with at least `x`, `y` and `frame`.
    Xyt { pixel_size: f64 },
}

impl LocalisationFormat {
    pub fn pixel_size(&self) -> f64 {
        match *self {
            LocalisationFormat::RapidStorm { pixel_size, .. } => pixel_size,
            LocalisationFormat::Xyt { pixel_size } => pixel_size,
        }
    }
}

/// Read a localisation file in the given dialect.
pub fn read_localisations(
    path: impl AsRef<Path>,
    format: &LocalisationFormat,
) -> Result<LocalisationTable, ReadError> {
    let reader = BufReader::new(File::open(path)?);
    parse_localisations(reader, format)
}

/// Parse localisations from any buffered reader.
pub fn parse_localisations<R: BufRead>(
    reader: R,
    format: &LocalisationFormat,
) -> Result<LocalisationTable, ReadError> {
    match *format {
        LocalisationFormat::RapidStorm {
            photon_conversion,
            pixel_size,
        } => parse_rapidstorm(reader, photon_conversion, pixel_size),
        LocalisationFormat::Xyt { pixel_size } => parse_xyt(reader, pixel_size),
    }
}

/// Parse the numeric body that follows the header line.
///
/// Blank lines and `#` comment lines are skipped. Every row must have the
/// same number of values; `width` fixes that number up front, otherwise the
/// first row decides. Reported line numbers count the header as line 1.
fn read_rows<I>(lines: I, width: Option<usize>) -> Result<Vec<Vec<f64>>, ReadError>
where
    I: Iterator<Item = std::io::Result<String>>,
{
    let mut expected = width;
    let mut rows = Vec::new();
    for (i, line) in lines.enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line_no = i + 2;
        let row = trimmed
            .split_whitespace()
            .map(|tok| {
                tok.parse::<f64>().map_err(|_| ReadError::Parse {
                    line: line_no,
                    token: tok.to_string(),
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        let expected = *expected.get_or_insert(row.len());
        if row.len() != expected {
            return Err(ReadError::ColumnCount {
                line: line_no,
                expected,
                got: row.len(),
            });
        }
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn body(src: &str) -> Result<Vec<Vec<f64>>, ReadError> {
        let mut lines = Cursor::new(src.to_string()).lines();
        lines.next();
        read_rows(lines, None)
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        let rows = body("header\n1 2\n\n# note\n3 4\n").unwrap();
        assert_eq!(rows, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn reports_line_of_bad_token() {
        let err = body("h\n1 2\n3 x\n").unwrap_err();
        assert!(matches!(err, ReadError::Parse { line: 3, ref token } if token == "x"));
    }

    #[test]
    fn reports_ragged_rows() {
        let err = body("h\n1 2 3\n4 5\n").unwrap_err();
        assert!(matches!(
            err,
            ReadError::ColumnCount {
                line: 3,
                expected: 3,
                got: 2
            }
        ));
    }

    #[test]
    fn empty_input_is_an_error() {
        let fmt = LocalisationFormat::Xyt { pixel_size: 1.0 };
        let err = parse_localisations(Cursor::new(""), &fmt).unwrap_err();
        assert!(matches!(err, ReadError::Empty));
    }

    #[test]
    fn pixel_size_is_reported_for_both_dialects() {
        let a = LocalisationFormat::RapidStorm {
            photon_conversion: 2.0,
            pixel_size: 160.0,
        };
        let b = LocalisationFormat::Xyt { pixel_size: 100.0 };
        assert_eq!(a.pixel_size(), 160.0);
        assert_eq!(b.pixel_size(), 100.0);
    }
}
