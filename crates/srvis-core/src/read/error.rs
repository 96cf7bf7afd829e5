use crate::table::TableError;

/// Errors returned by the localisation file readers.
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    #[error("malformed header: {0}")]
    MalformedHeader(String),
    #[error("header is missing required column '{0}'")]
    MissingRequiredColumn(String),
    #[error("column '{column}' is needed to compute '{derived}' but is not present")]
    MissingColumn { column: String, derived: String },
    #[error("line {line}: cannot parse '{token}' as a number")]
    Parse { line: usize, token: String },
    #[error("line {line}: expected {expected} values, got {got}")]
    ColumnCount {
        line: usize,
        expected: usize,
        got: usize,
    },
    #[error("file is empty")]
    Empty,
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
