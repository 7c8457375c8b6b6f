//! Helpers shared by the spreadsheet codecs.
//!
//! All three spreadsheet formats are read through `calamine`; only the first sheet is loaded
//! and its name becomes the dataset title.

use std::fmt::Display;
use std::io::{Read, Seek};

use calamine::{Data, Range, Reader};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use crate::dataset::{Dataset, Row};
use crate::error::{TabularError, TabularResult};
use crate::types::{parse_datetime, Cell};

use super::{dataset_from_grid, ReadOptions};

/// Default sheet name for untitled datasets.
pub(crate) const DEFAULT_SHEET_NAME: &str = "Sheet1";

const MAX_SHEET_NAME_CHARS: usize = 31;

/// Load the first worksheet of an opened workbook.
pub(crate) fn read_first_sheet<RS, R>(format: &str, mut workbook: R, options: &ReadOptions) -> TabularResult<Dataset>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: Display,
{
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| TabularError::malformed(format, "workbook has no sheets"))?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| TabularError::malformed(format, format!("sheet '{sheet}': {e}")))?;

    let mut ds = dataset_from_grid(format, range_to_grid(&range), options.headers)?;
    ds.set_title(Some(sheet));
    Ok(ds)
}

/// Cells from `A1` to the last used cell, so leading blank rows and columns keep their place.
fn range_to_grid(range: &Range<Data>) -> Vec<Row> {
    let Some((last_row, last_col)) = range.end() else {
        return Vec::new();
    };
    (0..=last_row)
        .map(|r| {
            (0..=last_col)
                .map(|c| range.get_value((r, c)).map(data_to_cell).unwrap_or_default())
                .collect()
        })
        .collect()
}

#[allow(unreachable_patterns)]
fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) if s.is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Boolean(*b),
        Data::DateTime(dt) => match serial_to_datetime(dt.as_f64()) {
            Some(value) => Cell::DateTime(value),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => match parse_datetime(s) {
            Some(value) => Cell::DateTime(value),
            None => Cell::Text(s.clone()),
        },
        Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(e.to_string()),
        other => Cell::Text(other.to_string()),
    }
}

fn serial_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .unwrap_or_default()
        .and_time(chrono::NaiveTime::MIN)
}

/// Excel serial date (days since 1899-12-30, 1900 date system) to a datetime, rounded to the
/// second.
pub(crate) fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let secs = (serial * 86_400.0).round();
    if secs.abs() > i64::MAX as f64 / 1000.0 {
        return None;
    }
    serial_epoch().checked_add_signed(TimeDelta::try_seconds(secs as i64)?)
}

/// Datetime to Excel serial date.
pub(crate) fn datetime_to_serial(dt: NaiveDateTime) -> f64 {
    let delta = dt - serial_epoch();
    delta.num_milliseconds() as f64 / 86_400_000.0
}

/// Sheet name for a dataset: the title with `[]:*?/\` replaced by `_`, at most 31 characters.
pub(crate) fn sheet_name(dataset: &Dataset) -> String {
    let name: String = dataset
        .title()
        .unwrap_or_default()
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .take(MAX_SHEET_NAME_CHARS)
        .collect();
    let name = name.trim_matches('\'').to_string();
    if name.trim().is_empty() {
        DEFAULT_SHEET_NAME.to_string()
    } else {
        name
    }
}

/// Header row (when present) followed by the data rows.
pub(crate) fn cell_grid(dataset: &Dataset) -> impl Iterator<Item = Vec<Cell>> + '_ {
    let header = dataset
        .headers()
        .map(|h| h.iter().map(|name| Cell::Text(name.clone())).collect::<Vec<_>>());
    header.into_iter().chain(dataset.rows().iter().cloned())
}

/// Rows (header included) and columns the written sheet spans.
pub(crate) fn grid_size(dataset: &Dataset) -> (usize, usize) {
    (
        dataset.row_count() + usize::from(dataset.headers().is_some()),
        dataset.column_count(),
    )
}

/// Cells the writers leave out of the sheet.
pub(crate) fn is_blank(cell: &Cell) -> bool {
    cell.is_empty() || cell.as_str() == Some("")
}

/// Whether `(row, col)` is the last cell of the grid. Writers store a blank cell there as an
/// empty string; readers size the sheet by its last stored cell, so trailing blank rows and
/// columns would otherwise vanish.
pub(crate) fn is_corner(row: usize, col: usize, (rows, cols): (usize, usize)) -> bool {
    row + 1 == rows && col + 1 == cols
}
