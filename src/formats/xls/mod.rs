//! XLS codec (Excel 97-2003, BIFF8 in a compound file).
//!
//! Reading goes through `calamine`. Writing is done here: [`biff`] produces the `Workbook`
//! stream and [`cfb`] wraps it in an OLE2 container.

use std::io::Cursor;

use calamine::{Reader, Xls};

use crate::dataset::Dataset;
use crate::error::{TabularError, TabularResult};

use super::excel::{cell_grid, grid_size, read_first_sheet, sheet_name};
use super::{Codec, DetectionTier, Exported, ReadOptions};

mod biff;
mod cfb;

const STREAM_NAME: &str = "Workbook";

/// XLS codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsCodec;

impl Codec for XlsCodec {
    fn id(&self) -> &'static str {
        "xls"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["xls"]
    }

    fn tier(&self) -> DetectionTier {
        DetectionTier::BinarySignature
    }

    fn can_parse(&self, raw: &[u8]) -> bool {
        cfb::looks_like_workbook(raw)
    }

    fn deserialize(&self, raw: &[u8], options: &ReadOptions) -> TabularResult<Dataset> {
        let workbook: Xls<_> =
            Xls::new(Cursor::new(raw)).map_err(|e| TabularError::malformed(self.id(), e.to_string()))?;
        read_first_sheet(self.id(), workbook, options)
    }

    fn serialize(&self, dataset: &Dataset) -> TabularResult<Exported> {
        let (rows, cols) = grid_size(dataset);
        if rows > biff::MAX_ROWS {
            return Err(TabularError::unsupported_cell(
                self.id(),
                format!("{rows} rows (limit {})", biff::MAX_ROWS),
            ));
        }
        if cols > biff::MAX_COLUMNS {
            return Err(TabularError::unsupported_cell(
                self.id(),
                format!("{cols} columns (limit {})", biff::MAX_COLUMNS),
            ));
        }

        let stream = biff::workbook_stream(&sheet_name(dataset), cell_grid(dataset), rows, cols)
            .map_err(|detail| TabularError::unsupported_cell(self.id(), detail))?;
        Ok(Exported::Binary(cfb::write_single_stream(STREAM_NAME, &stream)))
    }
}
