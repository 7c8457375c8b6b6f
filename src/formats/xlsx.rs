//! XLSX codec (Office Open XML workbook).
//!
//! Written with `rust_xlsxwriter`, read with `calamine`. Datetimes are stored as serial numbers
//! with a `yyyy-mm-dd hh:mm:ss` number format so they load back as dates.

use std::io::Cursor;

use calamine::{Reader, Xlsx};
use rust_xlsxwriter::{Format, Formula, Workbook, XlsxError};

use crate::dataset::Dataset;
use crate::error::{TabularError, TabularResult};
use crate::types::Cell;

use super::excel::{cell_grid, datetime_to_serial, grid_size, is_blank, is_corner, read_first_sheet, sheet_name};
use super::{Codec, DetectionTier, Exported, ReadOptions};

const MAX_ROWS: usize = 1_048_576;
const MAX_COLUMNS: usize = 16_384;
const DATETIME_NUM_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// XLSX codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxCodec;

impl Codec for XlsxCodec {
    fn id(&self) -> &'static str {
        "xlsx"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["xlsx", "xlsm"]
    }

    fn tier(&self) -> DetectionTier {
        DetectionTier::BinarySignature
    }

    fn can_parse(&self, raw: &[u8]) -> bool {
        zip_has_member(raw, "xl/workbook.xml")
    }

    fn deserialize(&self, raw: &[u8], options: &ReadOptions) -> TabularResult<Dataset> {
        let workbook: Xlsx<_> =
            Xlsx::new(Cursor::new(raw)).map_err(|e| TabularError::malformed(self.id(), e.to_string()))?;
        read_first_sheet(self.id(), workbook, options)
    }

    fn serialize(&self, dataset: &Dataset) -> TabularResult<Exported> {
        let rows = dataset.row_count() + usize::from(dataset.headers().is_some());
        if rows > MAX_ROWS {
            return Err(TabularError::unsupported_cell(
                self.id(),
                format!("{rows} rows (limit {MAX_ROWS})"),
            ));
        }
        if dataset.column_count() > MAX_COLUMNS {
            return Err(TabularError::unsupported_cell(
                self.id(),
                format!("{} columns (limit {MAX_COLUMNS})", dataset.column_count()),
            ));
        }

        write_workbook(dataset)
            .map(Exported::Binary)
            .map_err(|e| TabularError::unsupported_cell(self.id(), e.to_string()))
    }
}

fn write_workbook(dataset: &Dataset) -> Result<Vec<u8>, XlsxError> {
    let date_format = Format::new().set_num_format(DATETIME_NUM_FORMAT);
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name(dataset))?;
    // Empty strings are never stored, so the corner marker is a formula with an empty result.
    worksheet.set_formula_result_default("");
    let size = grid_size(dataset);

    // Bounds were checked by the caller.
    for (r, cells) in cell_grid(dataset).enumerate() {
        let row = r as u32;
        for (c, cell) in cells.iter().enumerate() {
            let col = c as u16;
            match cell {
                cell if is_blank(cell) => {
                    if is_corner(r, c, size) {
                        worksheet.write_formula(row, col, Formula::new("=\"\""))?;
                    }
                }
                Cell::Text(s) => {
                    worksheet.write_string(row, col, s)?;
                }
                Cell::Number(n) if !n.is_finite() => {
                    return Err(XlsxError::ParameterError(format!(
                        "non-finite number {n} at row {} column {}",
                        row + 1,
                        col + 1
                    )));
                }
                Cell::Number(n) => {
                    worksheet.write_number(row, col, *n)?;
                }
                Cell::Boolean(b) => {
                    worksheet.write_boolean(row, col, *b)?;
                }
                Cell::DateTime(dt) => {
                    worksheet.write_number_with_format(row, col, datetime_to_serial(*dt), &date_format)?;
                }
                Cell::Empty => {}
            }
        }
    }

    workbook.save_to_buffer()
}

/// Whether `raw` is a ZIP archive containing `member`.
pub(crate) fn zip_has_member(raw: &[u8], member: &str) -> bool {
    if !raw.starts_with(b"PK\x03\x04") {
        return false;
    }
    match zip::ZipArchive::new(Cursor::new(raw)) {
        Ok(archive) => archive.file_names().any(|name| name == member),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn round_trips_typed_cells_and_title() {
        let mut ds = Dataset::with_headers(["Name", "Age", "Active", "Joined"]);
        ds.set_title(Some("People".to_string()));
        let joined = NaiveDate::from_ymd_opt(2021, 6, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        ds.append_row(vec![Cell::from("Alice"), Cell::from(24), Cell::from(true), Cell::from(joined)])
            .unwrap();
        ds.append_row(vec![Cell::from("Bob"), Cell::from(30.5), Cell::from(false), Cell::Empty])
            .unwrap();

        let out = XlsxCodec.serialize(&ds).unwrap();
        assert!(out.is_binary());
        assert!(XlsxCodec.can_parse(out.as_bytes()));

        let back = XlsxCodec
            .deserialize(out.as_bytes(), &ReadOptions::default())
            .unwrap();
        assert_eq!(back, ds);
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let mut ds = Dataset::new();
        ds.append_row([f64::INFINITY]).unwrap();
        assert!(matches!(
            XlsxCodec.serialize(&ds),
            Err(TabularError::UnsupportedCellType { .. })
        ));
    }

    #[test]
    fn garbage_is_not_xlsx() {
        assert!(!XlsxCodec.can_parse(b"PK\x03\x04 not really a zip"));
        assert!(!XlsxCodec.can_parse(b"Name,Age\r\n"));
        assert!(matches!(
            XlsxCodec.deserialize(b"PK\x03\x04junk", &ReadOptions::default()),
            Err(TabularError::MalformedInput { .. })
        ));
    }
}
