//! Cell model and schema types.
//!
//! Every codec reads into and writes from the same [`Cell`] representation. A cell's tag is
//! fixed when it is constructed; nothing in [`crate::dataset::Dataset`] converts between tags.
//! Conversions happen only inside codecs, or explicitly through [`Schema`] coercion.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};

use crate::error::{TabularError, TabularResult};

/// Rendering used for datetimes by the plain-text codecs.
pub(crate) const TEXT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Rendering used for datetimes by JSON/YAML and ODS.
pub(crate) const ISO_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Tag of a [`Cell`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    Text,
    Number,
    Boolean,
    DateTime,
    Empty,
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::DateTime => "datetime",
            Self::Empty => "empty",
        };
        f.write_str(name)
    }
}

/// A single typed value in a [`crate::dataset::Dataset`].
///
/// Equality compares tag and value, so `Cell::from("24") != Cell::from(24)`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    /// UTF-8 string.
    Text(String),
    /// 64-bit float. Integers are stored here too.
    Number(f64),
    /// Boolean.
    Boolean(bool),
    /// Date and time without a timezone.
    DateTime(NaiveDateTime),
    /// Missing value.
    #[default]
    Empty,
}

impl Cell {
    /// The cell's tag.
    pub fn kind(&self) -> CellKind {
        match self {
            Self::Text(_) => CellKind::Text,
            Self::Number(_) => CellKind::Number,
            Self::Boolean(_) => CellKind::Boolean,
            Self::DateTime(_) => CellKind::DateTime,
            Self::Empty => CellKind::Empty,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Canonical text rendering used by the plain-text codecs (CSV, TSV, HTML).
    ///
    /// - integral numbers are written without a fraction (`24`, not `24.0`)
    /// - booleans are `True` / `False`
    /// - datetimes are `YYYY-MM-DD HH:MM:SS`
    /// - empty cells are the empty string
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => format_number(*n),
            Self::Boolean(true) => "True".to_string(),
            Self::Boolean(false) => "False".to_string(),
            Self::DateTime(dt) => dt.format(TEXT_DATETIME_FORMAT).to_string(),
            Self::Empty => String::new(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Returns `Some(i)` when `n` is a finite whole number that fits an `i64` exactly.
pub(crate) fn integral_value(n: f64) -> Option<i64> {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Some(n as i64)
    } else {
        None
    }
}

pub(crate) fn format_number(n: f64) -> String {
    match integral_value(n) {
        Some(i) => i.to_string(),
        None => n.to_string(),
    }
}

/// Parses the datetime spellings the codecs produce (and a few common neighbours).
pub(crate) fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    let s = s.trim();
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            Self::Number(n) => match integral_value(*n) {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(*n),
            },
            Self::Boolean(b) => serializer.serialize_bool(*b),
            Self::DateTime(dt) => serializer.collect_str(&dt.format(ISO_DATETIME_FORMAT)),
            Self::Empty => serializer.serialize_none(),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for Cell {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<f32> for Cell {
    fn from(value: f32) -> Self {
        Self::Number(f64::from(value))
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Cell {
                fn from(value: $t) -> Self {
                    Self::Number(value as f64)
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Self::DateTime(value.and_time(chrono::NaiveTime::MIN))
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Empty)
    }
}

impl TryFrom<serde_json::Value> for Cell {
    type Error = TabularError;

    /// Arrays and objects are not scalar cells and fail with [`TabularError::TypeError`].
    fn try_from(value: serde_json::Value) -> TabularResult<Self> {
        match value {
            serde_json::Value::Null => Ok(Self::Empty),
            serde_json::Value::Bool(b) => Ok(Self::Boolean(b)),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Number).ok_or_else(|| {
                TabularError::TypeError {
                    detail: format!("number {n} is not representable as f64"),
                }
            }),
            serde_json::Value::String(s) => Ok(Self::Text(s)),
            serde_json::Value::Array(_) => Err(TabularError::TypeError {
                detail: "arrays are not supported cell values".to_string(),
            }),
            serde_json::Value::Object(_) => Err(TabularError::TypeError {
                detail: "objects are not supported cell values".to_string(),
            }),
        }
    }
}

/// Target type for a column when coercing with a [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Number,
    Boolean,
    DateTime,
}

/// A single named, typed column in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Header name the field applies to.
    pub name: String,
    /// Type the column's cells are coerced into.
    pub column_type: ColumnType,
}

impl Field {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Column type hints applied after loading (see [`crate::dataset::Dataset::apply_schema`]).
///
/// Columns not named by the schema are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// Coerce one cell into `column_type`. `row` is 1-based and only used for error reporting.
pub(crate) fn coerce_cell(
    row: usize,
    column: &str,
    column_type: ColumnType,
    cell: &Cell,
) -> TabularResult<Cell> {
    if cell.is_empty() {
        return Ok(Cell::Empty);
    }
    if let Cell::Text(s) = cell {
        if s.trim().is_empty() {
            return Ok(Cell::Empty);
        }
    }

    let parse_error = |message: String| TabularError::ParseError {
        row,
        column: column.to_owned(),
        raw: cell.to_text(),
        message,
    };

    match (column_type, cell) {
        (ColumnType::Text, Cell::Text(_)) => Ok(cell.clone()),
        (ColumnType::Text, other) => Ok(Cell::Text(other.to_text())),
        (ColumnType::Number, Cell::Number(_)) => Ok(cell.clone()),
        (ColumnType::Number, Cell::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Cell::Number)
            .map_err(|e| parse_error(e.to_string())),
        (ColumnType::Boolean, Cell::Boolean(_)) => Ok(cell.clone()),
        (ColumnType::Boolean, Cell::Number(n)) => Ok(Cell::Boolean(*n != 0.0)),
        (ColumnType::Boolean, Cell::Text(s)) => parse_bool(s).map(Cell::Boolean).map_err(parse_error),
        (ColumnType::DateTime, Cell::DateTime(_)) => Ok(cell.clone()),
        (ColumnType::DateTime, Cell::Text(s)) => parse_datetime(s)
            .map(Cell::DateTime)
            .ok_or_else(|| parse_error("expected datetime (YYYY-MM-DD[ HH:MM:SS])".to_string())),
        (target, other) => Err(parse_error(format!(
            "cannot coerce {} cell into {target:?}",
            other.kind()
        ))),
    }
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Ok(true),
        "false" | "f" | "0" | "no" | "n" => Ok(false),
        _ => Err("expected bool (true/false/1/0/yes/no)".to_string()),
    }
}
