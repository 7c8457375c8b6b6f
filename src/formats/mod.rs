//! Format codecs.
//!
//! Each supported format is a stateless [`Codec`] that maps between raw content and a
//! [`Dataset`]. Codecs are looked up by id (export) or by content sniffing (load) through
//! [`crate::registry::Registry`].
//!
//! - [`csv`]: comma- and tab-separated values
//! - [`json`]: JSON array-of-objects / array-of-arrays
//! - [`yaml`]: the same shapes as JSON, in YAML
//! - [`html`]: a single `<table>`
//! - `xls`, `xlsx`, `ods`: spreadsheets (feature-gated behind `excel`)

use std::fmt;

use crate::dataset::{Dataset, Row};
use crate::error::{TabularError, TabularResult};
use crate::types::Cell;

pub mod csv;
pub mod html;
pub mod json;
pub mod yaml;

#[cfg(feature = "excel")]
mod excel;
#[cfg(feature = "excel")]
pub mod ods;
#[cfg(feature = "excel")]
pub mod xls;
#[cfg(feature = "excel")]
pub mod xlsx;

pub use self::csv::DelimitedCodec;
pub use self::html::HtmlCodec;
pub use self::json::JsonCodec;
pub use self::yaml::YamlCodec;
#[cfg(feature = "excel")]
pub use self::ods::OdsCodec;
#[cfg(feature = "excel")]
pub use self::xls::XlsCodec;
#[cfg(feature = "excel")]
pub use self::xlsx::XlsxCodec;

/// Detection priority group of a codec.
///
/// Codecs are sniffed tier by tier, most specific first. Within a tier, registration order
/// decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DetectionTier {
    /// Binary magic numbers (compound file, ZIP packages).
    BinarySignature,
    /// Text with an unambiguous grammar (JSON, HTML, YAML).
    StructuredText,
    /// Delimited text with a recognizable separator (TSV).
    Delimited,
    /// Accepts any text; tried last and never trusted from a filename hint alone.
    Fallback,
}

/// Options passed to [`Codec::deserialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Treat the first row as headers (ignored by JSON/YAML, whose shape decides).
    pub headers: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self { headers: true }
    }
}

/// Serialized form of a dataset.
#[derive(Clone, PartialEq, Eq)]
pub enum Exported {
    /// Text formats (CSV, TSV, JSON, YAML, HTML).
    Text(String),
    /// Binary formats (XLS, XLSX, ODS).
    Binary(Vec<u8>),
}

impl Exported {
    /// The text, for text formats.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Binary(_) => None,
        }
    }

    /// Raw bytes, regardless of kind (UTF-8 for text formats).
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Binary(b) => b,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Text(s) => s.into_bytes(),
            Self::Binary(b) => b,
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Exported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Self::Binary(b) => f.debug_struct("Binary").field("len", &b.len()).finish(),
        }
    }
}

/// A bidirectional mapping between one file format and [`Dataset`].
///
/// Implementations must be stateless: the registry shares one instance across threads.
pub trait Codec: Send + Sync {
    /// Format id used by export (`"csv"`, `"xlsx"`, ...). Lowercase.
    fn id(&self) -> &'static str;

    /// File extensions (lowercase, without dot) used to interpret filename hints.
    fn extensions(&self) -> &'static [&'static str];

    /// Detection priority group.
    fn tier(&self) -> DetectionTier;

    /// Cheap structural check: could `raw` be this format?
    fn can_parse(&self, raw: &[u8]) -> bool;

    /// Parse `raw` into a dataset. All-or-nothing: errors never yield a partial dataset.
    fn deserialize(&self, raw: &[u8], options: &ReadOptions) -> TabularResult<Dataset>;

    /// Serialize a dataset. Fails only with [`TabularError::UnsupportedCellType`].
    fn serialize(&self, dataset: &Dataset) -> TabularResult<Exported>;
}

impl fmt::Debug for dyn Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("id", &self.id())
            .field("tier", &self.tier())
            .finish()
    }
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Strip a UTF-8 BOM.
pub(crate) fn strip_bom(raw: &[u8]) -> &[u8] {
    raw.strip_prefix(UTF8_BOM).unwrap_or(raw)
}

/// Decode text content, ignoring a leading BOM.
pub(crate) fn decode_text<'a>(format: &str, raw: &'a [u8]) -> TabularResult<&'a str> {
    std::str::from_utf8(strip_bom(raw))
        .map_err(|e| TabularError::malformed(format, format!("invalid UTF-8: {e}")))
}

/// Text content that is valid UTF-8 and not blank.
pub(crate) fn sniff_text(raw: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(strip_bom(raw)).ok()?;
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Build a dataset from a grid of parsed rows.
///
/// With `headers`, the first row becomes the header list (cells rendered as text). Every row
/// must be as wide as the first one, otherwise the input is malformed.
pub(crate) fn dataset_from_grid(format: &str, grid: Vec<Row>, headers: bool) -> TabularResult<Dataset> {
    if let Some(width) = grid.first().map(Vec::len) {
        if let Some((idx, row)) = grid.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(TabularError::malformed(
                format,
                format!("row {} has {} cells, expected {width}", idx + 1, row.len()),
            ));
        }
    }

    let mut rows = grid.into_iter();
    let header_names = if headers {
        rows.next()
            .map(|first| first.iter().map(Cell::to_text).collect::<Vec<_>>())
    } else {
        None
    };
    Ok(Dataset::from_parts(header_names, rows.collect()))
}

/// Header row (when present) followed by the data rows, as plain text.
pub(crate) fn text_grid(dataset: &Dataset) -> impl Iterator<Item = Vec<String>> + '_ {
    let header = dataset.headers().map(|h| h.to_vec());
    header
        .into_iter()
        .chain(dataset.rows().iter().map(|row| row.iter().map(Cell::to_text).collect()))
}
