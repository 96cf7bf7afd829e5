//! Export of `x, y, frame` back to nanometres.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::table::LocalisationTable;

/// Text written in place of the data when an export fails.
pub const PLACEHOLDER: &str = "Sorry, data not available.";

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("could not write localisations to {}: {reason}", path.display())]
    WriteError { path: PathBuf, reason: String },
}

/// Write `table` as a tab-separated `x\ty\tframe` file, positions multiplied
/// by `pixel_size`.
///
/// When `table` is `None` or writing fails, the file is replaced by a short
/// placeholder message and `WriteError` is returned. Returns the number of
/// rows written on success.
pub fn write_xyt(
    path: impl AsRef<Path>,
    table: Option<&LocalisationTable>,
    pixel_size: f64,
) -> Result<usize, ExportError> {
    let path = path.as_ref();
    let result = match table {
        Some(t) => write_rows(path, t, pixel_size).map_err(|e| e.to_string()),
        None => Err("requested data variant is not available".to_string()),
    };

    match result {
        Ok(()) => {
            let rows = table.map_or(0, LocalisationTable::len);
            info!("exported {rows} localisations to {}", path.display());
            Ok(rows)
        }
        Err(reason) => {
            warn!("export to {} failed: {reason}", path.display());
            if let Err(e) = fs::write(path, PLACEHOLDER) {
                warn!("could not write placeholder to {}: {e}", path.display());
            }
            Err(ExportError::WriteError {
                path: path.to_path_buf(),
                reason,
            })
        }
    }
}

fn write_rows(path: &Path, table: &LocalisationTable, pixel_size: f64) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "x\ty\tframe")?;
    for ((&x, &y), &frame) in table.x().iter().zip(table.y()).zip(table.frame()) {
        writeln!(out, "{}\t{}\t{}", x * pixel_size, y * pixel_size, frame)?;
    }
    out.flush()
}
