//! BIFF8 record writer for a single-sheet workbook stream.
//!
//! Strings are always stored uncompressed (UTF-16LE) and written inline with LABEL records,
//! so the stream never needs a shared string table or CONTINUE records.

use crate::types::Cell;

use super::super::excel::{datetime_to_serial, is_blank, is_corner};

const BOF: u16 = 0x0809;
const EOF: u16 = 0x000A;
const CODEPAGE: u16 = 0x0042;
const WINDOW1: u16 = 0x003D;
const FONT: u16 = 0x0031;
const XF: u16 = 0x00E0;
const STYLE: u16 = 0x0293;
const BOUNDSHEET: u16 = 0x0085;
const DIMENSIONS: u16 = 0x0200;
const NUMBER: u16 = 0x0203;
const LABEL: u16 = 0x0204;
const BOOLERR: u16 = 0x0205;
const WINDOW2: u16 = 0x023E;

const SUBSTREAM_GLOBALS: u16 = 0x0005;
const SUBSTREAM_WORKSHEET: u16 = 0x0010;
const CODEPAGE_UTF16: u16 = 1200;

/// Largest record payload before a CONTINUE record would be needed.
const MAX_RECORD_PAYLOAD: usize = 8224;

/// Longest text cell: LABEL carries 6 bytes of cell header, 3 of string header, then UTF-16.
pub(crate) const MAX_LABEL_UNITS: usize = (MAX_RECORD_PAYLOAD - 9) / 2;

pub(crate) const MAX_ROWS: usize = 65_536;
pub(crate) const MAX_COLUMNS: usize = 256;

/// Excel wants 15 style XFs before any cell XF.
const STYLE_XF_COUNT: u16 = 15;
const XF_GENERAL: u16 = STYLE_XF_COUNT;
const XF_DATETIME: u16 = STYLE_XF_COUNT + 1;
/// Built-in number format `m/d/yy h:mm`.
const FORMAT_DATETIME: u16 = 22;

/// Append-only BIFF record buffer.
#[derive(Debug, Default)]
struct RecordStream {
    buf: Vec<u8>,
}

impl RecordStream {
    fn record(&mut self, id: u16, payload: &[u8]) {
        debug_assert!(payload.len() <= MAX_RECORD_PAYLOAD);
        self.buf.extend_from_slice(&id.to_le_bytes());
        self.buf.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        self.buf.extend_from_slice(payload);
    }

    fn position(&self) -> usize {
        self.buf.len()
    }

    fn bof(&mut self, substream: u16) {
        let mut p = Vec::with_capacity(16);
        p.extend_from_slice(&0x0600u16.to_le_bytes()); // BIFF8
        p.extend_from_slice(&substream.to_le_bytes());
        p.extend_from_slice(&0x0DBBu16.to_le_bytes()); // build id
        p.extend_from_slice(&0x07CCu16.to_le_bytes()); // build year
        p.extend_from_slice(&0u32.to_le_bytes()); // file history
        p.extend_from_slice(&6u32.to_le_bytes()); // lowest BIFF version
        self.record(BOF, &p);
    }

    fn eof(&mut self) {
        self.record(EOF, &[]);
    }

    fn window1(&mut self) {
        let mut p = Vec::with_capacity(18);
        for v in [0u16, 0, 0x3000, 0x1E00, 0x0038, 0, 0, 1, 0x0258] {
            p.extend_from_slice(&v.to_le_bytes());
        }
        self.record(WINDOW1, &p);
    }

    fn font(&mut self, name: &str) {
        let mut p = Vec::with_capacity(16 + name.len() * 2);
        p.extend_from_slice(&200u16.to_le_bytes()); // 10pt, in twips
        p.extend_from_slice(&0u16.to_le_bytes()); // attributes
        p.extend_from_slice(&0x7FFFu16.to_le_bytes()); // automatic colour
        p.extend_from_slice(&400u16.to_le_bytes()); // normal weight
        p.extend_from_slice(&[0, 0, 0, 0, 0, 0]); // escapement, underline, family, charset, reserved
        push_short_string(&mut p, name);
        self.record(FONT, &p);
    }

    fn xf(&mut self, format: u16, style: bool) {
        let (protection, used) = if style { (0xFFF5u16, 0xF4u8) } else { (0x0001u16, 0u8) };
        let used = if format != 0 { used | 0x04 } else { used };
        let mut p = Vec::with_capacity(20);
        p.extend_from_slice(&0u16.to_le_bytes()); // font
        p.extend_from_slice(&format.to_le_bytes());
        p.extend_from_slice(&protection.to_le_bytes());
        p.extend_from_slice(&[0x20, 0, 0, used]); // bottom aligned
        p.extend_from_slice(&[0; 8]); // borders
        p.extend_from_slice(&0x20C0u16.to_le_bytes()); // default pattern colours
        self.record(XF, &p);
    }

    fn style_normal(&mut self) {
        let mut p = Vec::with_capacity(4);
        p.extend_from_slice(&0x8000u16.to_le_bytes()); // built-in, XF 0
        p.extend_from_slice(&[0, 0xFF]); // "Normal", no outline level
        self.record(STYLE, &p);
    }

    /// Writes a BOUNDSHEET with a zero position; returns the offset to patch.
    fn boundsheet(&mut self, name: &str) -> usize {
        let mut p = Vec::with_capacity(8 + name.len() * 2);
        p.extend_from_slice(&0u32.to_le_bytes());
        p.extend_from_slice(&[0, 0]); // visible worksheet
        push_short_string(&mut p, name);
        let patch_at = self.position() + 4;
        self.record(BOUNDSHEET, &p);
        patch_at
    }

    fn dimensions(&mut self, rows: usize, cols: usize) {
        let mut p = Vec::with_capacity(14);
        p.extend_from_slice(&0u32.to_le_bytes());
        p.extend_from_slice(&(rows as u32).to_le_bytes());
        p.extend_from_slice(&0u16.to_le_bytes());
        p.extend_from_slice(&(cols as u16).to_le_bytes());
        p.extend_from_slice(&0u16.to_le_bytes());
        self.record(DIMENSIONS, &p);
    }

    fn cell_header(row: u16, col: u16, xf: u16, capacity: usize) -> Vec<u8> {
        let mut p = Vec::with_capacity(6 + capacity);
        p.extend_from_slice(&row.to_le_bytes());
        p.extend_from_slice(&col.to_le_bytes());
        p.extend_from_slice(&xf.to_le_bytes());
        p
    }

    fn number(&mut self, row: u16, col: u16, xf: u16, value: f64) {
        let mut p = Self::cell_header(row, col, xf, 8);
        p.extend_from_slice(&value.to_le_bytes());
        self.record(NUMBER, &p);
    }

    fn label(&mut self, row: u16, col: u16, units: &[u16]) {
        let mut p = Self::cell_header(row, col, XF_GENERAL, 3 + units.len() * 2);
        p.extend_from_slice(&(units.len() as u16).to_le_bytes());
        p.push(0x01); // uncompressed
        for unit in units {
            p.extend_from_slice(&unit.to_le_bytes());
        }
        self.record(LABEL, &p);
    }

    fn boolean(&mut self, row: u16, col: u16, value: bool) {
        let mut p = Self::cell_header(row, col, XF_GENERAL, 2);
        p.extend_from_slice(&[u8::from(value), 0]);
        self.record(BOOLERR, &p);
    }

    fn window2(&mut self) {
        let mut p = Vec::with_capacity(18);
        for v in [0x06B6u16, 0, 0, 0x0040, 0, 0, 0, 0, 0] {
            p.extend_from_slice(&v.to_le_bytes());
        }
        self.record(WINDOW2, &p);
    }
}

/// ShortXLUnicodeString: 8-bit length, flags, UTF-16LE characters.
fn push_short_string(p: &mut Vec<u8>, s: &str) {
    let units: Vec<u16> = s.encode_utf16().take(u8::MAX as usize).collect();
    p.push(units.len() as u8);
    p.push(0x01);
    for unit in units {
        p.extend_from_slice(&unit.to_le_bytes());
    }
}

/// Build the `Workbook` stream for one sheet.
///
/// `grid` is the header row (if any) followed by the data rows, all `cols` wide. The caller
/// checks the row and column limits; cell-level problems are returned as a description.
pub(crate) fn workbook_stream<I>(sheet_name: &str, grid: I, rows: usize, cols: usize) -> Result<Vec<u8>, String>
where
    I: IntoIterator<Item = Vec<Cell>>,
{
    let mut s = RecordStream::default();

    s.bof(SUBSTREAM_GLOBALS);
    s.record(CODEPAGE, &CODEPAGE_UTF16.to_le_bytes());
    s.window1();
    // Font index 4 does not exist in BIFF, so four fonts make index 0..=3 valid.
    for _ in 0..4 {
        s.font("Arial");
    }
    for _ in 0..STYLE_XF_COUNT {
        s.xf(0, true);
    }
    s.xf(0, false);
    s.xf(FORMAT_DATETIME, false);
    s.style_normal();
    let patch_at = s.boundsheet(sheet_name);
    s.eof();

    let sheet_start = s.position() as u32;
    s.buf[patch_at..patch_at + 4].copy_from_slice(&sheet_start.to_le_bytes());

    s.bof(SUBSTREAM_WORKSHEET);
    if rows > 0 && cols > 0 {
        s.dimensions(rows, cols);
    }
    for (r, cells) in grid.into_iter().enumerate() {
        let row = r as u16;
        for (c, cell) in cells.iter().enumerate() {
            let col = c as u16;
            match cell {
                cell if is_blank(cell) => {
                    if is_corner(r, c, (rows, cols)) {
                        s.label(row, col, &[]);
                    }
                }
                Cell::Text(text) => {
                    let units: Vec<u16> = text.encode_utf16().collect();
                    if units.len() > MAX_LABEL_UNITS {
                        return Err(format!(
                            "text of {} UTF-16 units at row {} column {} (limit {MAX_LABEL_UNITS})",
                            units.len(),
                            r + 1,
                            c + 1
                        ));
                    }
                    s.label(row, col, &units);
                }
                Cell::Number(n) if !n.is_finite() => {
                    return Err(format!("non-finite number {n} at row {} column {}", r + 1, c + 1));
                }
                Cell::Number(n) => s.number(row, col, XF_GENERAL, *n),
                Cell::Boolean(b) => s.boolean(row, col, *b),
                Cell::DateTime(dt) => s.number(row, col, XF_DATETIME, datetime_to_serial(*dt)),
                Cell::Empty => {}
            }
        }
    }
    s.window2();
    s.eof();

    Ok(s.buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// (record id, payload) pairs until the end of the buffer.
    fn records(buf: &[u8]) -> Vec<(u16, &[u8])> {
        let mut out = Vec::new();
        let mut pos = 0;
        while pos + 4 <= buf.len() {
            let id = u16::from_le_bytes([buf[pos], buf[pos + 1]]);
            let len = u16::from_le_bytes([buf[pos + 2], buf[pos + 3]]) as usize;
            out.push((id, &buf[pos + 4..pos + 4 + len]));
            pos += 4 + len;
        }
        out
    }

    #[test]
    fn boundsheet_points_at_sheet_bof() {
        let grid = vec![vec![Cell::from("a"), Cell::from(1)]];
        let stream = workbook_stream("Data", grid, 1, 2).unwrap();
        let recs = records(&stream);
        let (_, boundsheet) = recs.iter().find(|(id, _)| *id == BOUNDSHEET).unwrap();
        let pos = u32::from_le_bytes(boundsheet[0..4].try_into().unwrap()) as usize;
        assert_eq!(&stream[pos..pos + 2], &BOF.to_le_bytes());
        assert_eq!(&stream[pos + 6..pos + 8], &SUBSTREAM_WORKSHEET.to_le_bytes());
        // cch, flags, then "Data" in UTF-16
        assert_eq!(&boundsheet[6..8], &[4, 1]);
        assert_eq!(&boundsheet[8..10], &[b'D', 0]);
    }

    #[test]
    fn cells_use_expected_records() {
        let grid = vec![vec![Cell::from("Name"), Cell::from(24), Cell::from(true), Cell::Empty]];
        let stream = workbook_stream("Sheet1", grid, 1, 4).unwrap();
        let ids: Vec<u16> = records(&stream).into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids.iter().filter(|&&id| id == XF).count(), 17);
        assert!(ids.contains(&LABEL));
        assert!(ids.contains(&NUMBER));
        assert!(ids.contains(&BOOLERR));
        assert_eq!(ids.last(), Some(&EOF));
        assert_eq!(ids.iter().filter(|&&id| id == BOF).count(), 2);
    }

    #[test]
    fn blank_corner_is_an_empty_label() {
        let grid = vec![vec![Cell::from(1), Cell::Empty], vec![Cell::Empty, Cell::Empty]];
        let stream = workbook_stream("Sheet1", grid, 2, 2).unwrap();
        let labels: Vec<&[u8]> = records(&stream)
            .into_iter()
            .filter(|(id, _)| *id == LABEL)
            .map(|(_, payload)| payload)
            .collect();
        assert_eq!(labels.len(), 1);
        // row 1, column 1, zero characters
        assert_eq!(&labels[0][0..4], &[1, 0, 1, 0]);
        assert_eq!(&labels[0][6..8], &[0, 0]);
    }

    #[test]
    fn empty_sheet_has_no_dimensions() {
        let stream = workbook_stream("Sheet1", Vec::<Vec<Cell>>::new(), 0, 0).unwrap();
        assert!(!records(&stream).iter().any(|(id, _)| *id == DIMENSIONS));
    }

    #[test]
    fn oversized_text_is_rejected() {
        let grid = vec![vec![Cell::from("x".repeat(MAX_LABEL_UNITS + 1))]];
        let err = workbook_stream("Sheet1", grid, 1, 1).unwrap_err();
        assert!(err.contains("limit 4107"));

        let grid = vec![vec![Cell::from("x".repeat(MAX_LABEL_UNITS))]];
        assert!(workbook_stream("Sheet1", grid, 1, 1).is_ok());
    }
}
