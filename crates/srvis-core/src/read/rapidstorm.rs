//! RapidStorm localisation files.
//!
//! The first line is `# ` followed by an XML fragment listing one `<field>`
//! per body column:
//!
//! ```text
//! # <localizations><field identifier="Position-0-0" .../><field identifier="Position-1-0" .../>...</localizations>
//! 1234.5 2345.6 0 5120.0 ...
//! ```
//!
//! The position of a field in the header is the index of its column in the
//! whitespace-separated body.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::debug;

#[cfg(feature = "tracing")]
use tracing::instrument;

use super::{read_rows, ReadError};
use crate::table::{columns, LocalisationTable};

/// Header fields the reader understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RapidStormField {
    PositionX,
    PositionXUncertainty,
    PositionY,
    PositionYUncertainty,
    Amplitude,
    ImageNumber,
    PsfWidthX,
    PsfWidthY,
    FitResidues,
    LocalBackground,
}

impl RapidStormField {
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        use RapidStormField::*;
        Some(match identifier {
            "Position-0-0" => PositionX,
            "Position-0-0-uncertainty" => PositionXUncertainty,
            "Position-1-0" => PositionY,
            "Position-1-0-uncertainty" => PositionYUncertainty,
            "Amplitude-0-0" => Amplitude,
            "ImageNumber-0-0" => ImageNumber,
            "PSFWidth-0-0" => PsfWidthX,
            "PSFWidth-1-0" => PsfWidthY,
            "FitResidues-0-0" => FitResidues,
            "LocalBackground-0-0" => LocalBackground,
            _ => return None,
        })
    }

    pub fn identifier(self) -> &'static str {
        use RapidStormField::*;
        match self {
            PositionX => "Position-0-0",
            PositionXUncertainty => "Position-0-0-uncertainty",
            PositionY => "Position-1-0",
            PositionYUncertainty => "Position-1-0-uncertainty",
            Amplitude => "Amplitude-0-0",
            ImageNumber => "ImageNumber-0-0",
            PsfWidthX => "PSFWidth-0-0",
            PsfWidthY => "PSFWidth-1-0",
            FitResidues => "FitResidues-0-0",
            LocalBackground => "LocalBackground-0-0",
        }
    }
}

/// Column positions declared by the header.
#[derive(Clone, Debug, Default)]
struct HeaderLayout {
    x: Option<usize>,
    x_uncertainty: Option<usize>,
    y: Option<usize>,
    y_uncertainty: Option<usize>,
    amplitude: Option<usize>,
    image_number: Option<usize>,
    fit_residues: Option<usize>,
    local_background: Option<usize>,
    width: usize,
}

impl HeaderLayout {
    fn parse(line: &str) -> Result<Self, ReadError> {
        // Drop the leading "# " marker.
        let xml = line
            .char_indices()
            .nth(2)
            .map(|(i, _)| &line[i..])
            .ok_or_else(|| ReadError::MalformedHeader("header line too short".into()))?;
        let doc = roxmltree::Document::parse(xml.trim_end())
            .map_err(|e| ReadError::MalformedHeader(e.to_string()))?;

        let mut layout = HeaderLayout::default();
        for (index, node) in doc
            .root_element()
            .children()
            .filter(|n| n.is_element())
            .enumerate()
        {
            layout.width = index + 1;
            let Some(field) = node
                .attribute("identifier")
                .and_then(RapidStormField::from_identifier)
            else {
                continue;
            };
            let slot = match field {
                RapidStormField::PositionX => &mut layout.x,
                RapidStormField::PositionXUncertainty => &mut layout.x_uncertainty,
                RapidStormField::PositionY => &mut layout.y,
                RapidStormField::PositionYUncertainty => &mut layout.y_uncertainty,
                RapidStormField::Amplitude => &mut layout.amplitude,
                RapidStormField::ImageNumber => &mut layout.image_number,
                // Declared but not carried into the canonical table.
                RapidStormField::PsfWidthX | RapidStormField::PsfWidthY => continue,
                RapidStormField::FitResidues => &mut layout.fit_residues,
                RapidStormField::LocalBackground => &mut layout.local_background,
            };
            *slot = Some(index);
        }
        Ok(layout)
    }

    fn require(slot: Option<usize>, field: RapidStormField) -> Result<usize, ReadError> {
        slot.ok_or_else(|| {
            ReadError::MalformedHeader(format!(
                "required field '{}' not declared",
                field.identifier()
            ))
        })
    }
}

/// Read a RapidStorm localisation file.
///
/// `photon_conversion` converts the amplitude (camera counts) into photons
/// and `pixel_size` (nm per pixel) converts positions and their
/// uncertainties from nanometres into pixels.
pub fn read_rapidstorm(
    path: impl AsRef<Path>,
    photon_conversion: f64,
    pixel_size: f64,
) -> Result<LocalisationTable, ReadError> {
    let reader = BufReader::new(File::open(path)?);
    parse_rapidstorm(reader, photon_conversion, pixel_size)
}

/// Parse RapidStorm localisations from a buffered reader.
///
/// Output columns, in order: `x, y, uncertaintyX, uncertaintyY,
/// photonCount, frame, fitResidue, signalToNoise`. Optional fields the header
/// does not declare come out as all-NaN columns.
#[cfg_attr(feature = "tracing", instrument(level = "info", skip(reader)))]
pub fn parse_rapidstorm<R: BufRead>(
    reader: R,
    photon_conversion: f64,
    pixel_size: f64,
) -> Result<LocalisationTable, ReadError> {
    let mut lines = reader.lines();
    let header_line = lines.next().ok_or(ReadError::Empty)??;
    let layout = HeaderLayout::parse(&header_line)?;

    let x = HeaderLayout::require(layout.x, RapidStormField::PositionX)?;
    let y = HeaderLayout::require(layout.y, RapidStormField::PositionY)?;
    let amplitude = HeaderLayout::require(layout.amplitude, RapidStormField::Amplitude)?;
    let frame = HeaderLayout::require(layout.image_number, RapidStormField::ImageNumber)?;
    let background = layout
        .local_background
        .ok_or_else(|| ReadError::MissingColumn {
            column: RapidStormField::LocalBackground.identifier().to_string(),
            derived: columns::SIGNAL_TO_NOISE.to_string(),
        })?;

    let rows = read_rows(lines, Some(layout.width))?;
    debug!(
        "rapidstorm header declares {} fields, {} rows",
        layout.width,
        rows.len()
    );

    let n = rows.len();
    let take = |idx: Option<usize>, scale: f64| -> Vec<f64> {
        match idx {
            Some(i) => rows.iter().map(|r| r[i] / scale).collect(),
            None => vec![f64::NAN; n],
        }
    };

    let snr: Vec<f64> = rows.iter().map(|r| r[amplitude] / r[background]).collect();
    let data = vec![
        take(Some(x), pixel_size),
        take(Some(y), pixel_size),
        take(layout.x_uncertainty, pixel_size),
        take(layout.y_uncertainty, pixel_size),
        take(Some(amplitude), photon_conversion),
        take(Some(frame), 1.0),
        take(layout.fit_residues, 1.0),
        snr,
    ];
    let names = [
        columns::X,
        columns::Y,
        columns::UNCERTAINTY_X,
        columns::UNCERTAINTY_Y,
        columns::PHOTON_COUNT,
        columns::FRAME,
        columns::FIT_RESIDUE,
        columns::SIGNAL_TO_NOISE,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    Ok(LocalisationTable::new(names, data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    fn header(ids: &[&str]) -> String {
        let fields: String = ids
            .iter()
            .map(|id| format!(r#"<field identifier="{id}" syntax="floating point" />"#))
            .collect();
        format!(r#"# <localizations insequence="true" repetitions="variable">{fields}</localizations>"#)
    }

    const FULL: [&str; 8] = [
        "Position-0-0",
        "Position-0-0-uncertainty",
        "Position-1-0",
        "Position-1-0-uncertainty",
        "ImageNumber-0-0",
        "Amplitude-0-0",
        "FitResidues-0-0",
        "LocalBackground-0-0",
    ];

    #[test]
    fn converts_units_and_orders_columns() {
        let src = format!(
            "{}\n1000 10 2000 20 0 500 3.5 50\n1500 15 2500 25 0 800 1.5 40\n3000 30 100 10 1 900 2.0 30\n",
            header(&FULL)
        );
        let t = parse_rapidstorm(Cursor::new(src), 2.0, 100.0).unwrap();

        assert_eq!(
            t.column_names(),
            &[
                "x",
                "y",
                "uncertaintyX",
                "uncertaintyY",
                "photonCount",
                "frame",
                "fitResidue",
                "signalToNoise"
            ]
        );
        assert_eq!(t.x(), &[10.0, 15.0, 30.0]);
        assert_eq!(t.y(), &[20.0, 25.0, 1.0]);
        assert_eq!(t.column("uncertaintyX").unwrap(), &[0.1, 0.15, 0.3]);
        assert_eq!(t.column("photonCount").unwrap(), &[250.0, 400.0, 450.0]);
        assert_relative_eq!(t.column("signalToNoise").unwrap()[0], 10.0);
        assert_relative_eq!(t.column("signalToNoise").unwrap()[1], 20.0);
        assert_eq!(t.keys()[1].index, 1);
        assert_eq!(t.keys()[2].frame, 1);
        assert_eq!(t.keys()[2].index, 0);
    }

    #[test]
    fn absent_optional_fields_are_nan() {
        let ids = [
            "Position-0-0",
            "Position-1-0",
            "ImageNumber-0-0",
            "Amplitude-0-0",
            "LocalBackground-0-0",
        ];
        let src = format!("{}\n100 200 0 10 5\n", header(&ids));
        let t = parse_rapidstorm(Cursor::new(src), 1.0, 1.0).unwrap();
        assert!(t.column("uncertaintyX").unwrap()[0].is_nan());
        assert!(t.column("uncertaintyY").unwrap()[0].is_nan());
        assert!(t.column("fitResidue").unwrap()[0].is_nan());
        assert_eq!(t.column("signalToNoise").unwrap(), &[2.0]);
    }

    #[test]
    fn missing_required_field_is_malformed_header() {
        let ids = ["Position-0-0", "ImageNumber-0-0", "Amplitude-0-0"];
        let src = format!("{}\n1 2 3\n", header(&ids));
        let err = parse_rapidstorm(Cursor::new(src), 1.0, 1.0).unwrap_err();
        assert!(matches!(err, ReadError::MalformedHeader(ref m) if m.contains("Position-1-0")));
    }

    #[test]
    fn missing_local_background_is_reported_upfront() {
        let ids = [
            "Position-0-0",
            "Position-1-0",
            "ImageNumber-0-0",
            "Amplitude-0-0",
        ];
        let src = format!("{}\n1 2 0 3\n", header(&ids));
        let err = parse_rapidstorm(Cursor::new(src), 1.0, 1.0).unwrap_err();
        assert!(matches!(err, ReadError::MissingColumn { ref derived, .. } if derived == "signalToNoise"));
    }

    #[test]
    fn broken_xml_is_malformed_header() {
        let src = "# <localizations><field identifier=\"Position-0-0\">\n1\n";
        let err = parse_rapidstorm(Cursor::new(src), 1.0, 1.0).unwrap_err();
        assert!(matches!(err, ReadError::MalformedHeader(_)));
    }

    #[test]
    fn unknown_fields_still_occupy_a_column() {
        let ids = [
            "Position-0-0",
            "SomethingElse-0-0",
            "Position-1-0",
            "ImageNumber-0-0",
            "Amplitude-0-0",
            "LocalBackground-0-0",
        ];
        let src = format!("{}\n100 999 200 0 10 5\n", header(&ids));
        let t = parse_rapidstorm(Cursor::new(src), 1.0, 10.0).unwrap();
        assert_eq!(t.x(), &[10.0]);
        assert_eq!(t.y(), &[20.0]);
    }
}
