use thiserror::Error;

/// Convenience result type used across the crate.
pub type TabularResult<T> = Result<T, TabularError>;

/// Error type returned by every load, export and dataset operation.
///
/// This is a closed set: codecs map their third-party errors (`csv`, `serde_json`,
/// `calamine`, ...) into one of these variants, carrying the original message as detail.
#[derive(Debug, Error)]
pub enum TabularError {
    /// No registered codec recognizes the input.
    #[error("unsupported format: no registered codec recognizes the input")]
    UnsupportedFormat,

    /// The input was recognized (or forced) as `format` but its content is invalid.
    #[error("malformed {format} input: {detail}")]
    MalformedInput { format: String, detail: String },

    /// A row (or header list / column) does not match the dataset width.
    #[error("width mismatch: expected {expected} cells, found {found}")]
    WidthMismatch { expected: usize, found: usize },

    /// Export was requested for a format id that is not registered.
    #[error("unknown format '{0}'")]
    UnknownFormat(String),

    /// The target format cannot represent part of the dataset.
    #[error("format '{format}' cannot represent {detail}")]
    UnsupportedCellType { format: String, detail: String },

    /// A native value could not be turned into a [`crate::types::Cell`].
    #[error("type error: {detail}")]
    TypeError { detail: String },

    /// A row index is outside the dataset.
    #[error("row index {index} out of range for dataset with {len} rows")]
    RowOutOfRange { index: usize, len: usize },

    /// A column name is not among the dataset headers.
    #[error("column '{0}' not found")]
    ColumnNotFound(String),

    /// The dataset does not conform to the provided [`crate::types::Schema`].
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// A cell could not be coerced into the [`crate::types::ColumnType`] required by a schema.
    #[error("failed to parse value at row {row} column '{column}': {message} (raw='{raw}')")]
    ParseError {
        row: usize,
        column: String,
        raw: String,
        message: String,
    },
}

impl TabularError {
    pub(crate) fn malformed(format: &str, detail: impl Into<String>) -> Self {
        Self::MalformedInput {
            format: format.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn unsupported_cell(format: &str, detail: impl Into<String>) -> Self {
        Self::UnsupportedCellType {
            format: format.to_string(),
            detail: detail.into(),
        }
    }
}
