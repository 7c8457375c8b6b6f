//! ODS codec (OpenDocument spreadsheet).
//!
//! Written as a minimal ODF package (`mimetype`, `META-INF/manifest.xml`, `content.xml`),
//! read with `calamine`.

use std::io::{Cursor, Read, Write};

use calamine::{Ods, Reader};
use quick_xml::escape::escape;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

use crate::dataset::Dataset;
use crate::error::{TabularError, TabularResult};
use crate::types::{format_number, Cell, ISO_DATETIME_FORMAT};

use super::excel::{cell_grid, grid_size, is_blank, is_corner, read_first_sheet, sheet_name};
use super::{Codec, DetectionTier, Exported, ReadOptions};

const MIMETYPE: &str = "application/vnd.oasis.opendocument.spreadsheet";

const MANIFEST_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest:manifest xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0" manifest:version="1.2">
 <manifest:file-entry manifest:full-path="/" manifest:version="1.2" manifest:media-type="application/vnd.oasis.opendocument.spreadsheet"/>
 <manifest:file-entry manifest:full-path="content.xml" manifest:media-type="text/xml"/>
</manifest:manifest>
"#;

const CONTENT_HEAD: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    "\n",
    r#"<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0""#,
    r#" xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0""#,
    r#" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" office:version="1.2">"#,
    "<office:body><office:spreadsheet>",
);

const CONTENT_TAIL: &str = "</office:spreadsheet></office:body></office:document-content>\n";

/// ODS codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct OdsCodec;

impl Codec for OdsCodec {
    fn id(&self) -> &'static str {
        "ods"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ods"]
    }

    fn tier(&self) -> DetectionTier {
        DetectionTier::BinarySignature
    }

    fn can_parse(&self, raw: &[u8]) -> bool {
        if !raw.starts_with(b"PK\x03\x04") {
            return false;
        }
        let Ok(mut archive) = zip::ZipArchive::new(Cursor::new(raw)) else {
            return false;
        };
        let Ok(mut member) = archive.by_name("mimetype") else {
            return false;
        };
        let mut content = String::new();
        member.read_to_string(&mut content).is_ok() && content.trim() == MIMETYPE
    }

    fn deserialize(&self, raw: &[u8], options: &ReadOptions) -> TabularResult<Dataset> {
        let workbook: Ods<_> =
            Ods::new(Cursor::new(raw)).map_err(|e| TabularError::malformed(self.id(), e.to_string()))?;
        read_first_sheet(self.id(), workbook, options)
    }

    fn serialize(&self, dataset: &Dataset) -> TabularResult<Exported> {
        let content = content_xml(dataset)?;
        write_package(&content)
            .map(Exported::Binary)
            .map_err(|e| TabularError::unsupported_cell(self.id(), e.to_string()))
    }
}

fn write_package(content: &str) -> zip::result::ZipResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    // `mimetype` must be the first member and stored uncompressed.
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    zip.start_file("mimetype", stored)?;
    zip.write_all(MIMETYPE.as_bytes())?;

    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file("META-INF/manifest.xml", deflated)?;
    zip.write_all(MANIFEST_XML.as_bytes())?;
    zip.start_file("content.xml", deflated)?;
    zip.write_all(content.as_bytes())?;

    Ok(zip.finish()?.into_inner())
}

fn content_xml(dataset: &Dataset) -> TabularResult<String> {
    let mut xml = String::from(CONTENT_HEAD);
    xml.push_str(&format!(r#"<table:table table:name="{}">"#, escape(sheet_name(dataset).as_str())));
    if dataset.column_count() > 0 {
        xml.push_str(&format!(
            r#"<table:table-column table:number-columns-repeated="{}"/>"#,
            dataset.column_count()
        ));
    }
    let size = grid_size(dataset);
    for (r, cells) in cell_grid(dataset).enumerate() {
        xml.push_str("<table:table-row>");
        for (c, cell) in cells.iter().enumerate() {
            if is_blank(cell) && is_corner(r, c, size) {
                xml.push_str(r#"<table:table-cell office:value-type="string"><text:p/></table:table-cell>"#);
                continue;
            }
            push_cell(&mut xml, cell).map_err(|detail| {
                TabularError::unsupported_cell("ods", format!("{detail} at row {} column {}", r + 1, c + 1))
            })?;
        }
        xml.push_str("</table:table-row>");
    }
    xml.push_str("</table:table>");
    xml.push_str(CONTENT_TAIL);
    Ok(xml)
}

fn push_cell(xml: &mut String, cell: &Cell) -> Result<(), String> {
    match cell {
        Cell::Text(s) if s.is_empty() => xml.push_str("<table:table-cell/>"),
        Cell::Text(s) => {
            xml.push_str(r#"<table:table-cell office:value-type="string">"#);
            for line in s.split('\n') {
                xml.push_str("<text:p>");
                xml.push_str(&escape(line));
                xml.push_str("</text:p>");
            }
            xml.push_str("</table:table-cell>");
        }
        Cell::Number(n) if !n.is_finite() => return Err(format!("non-finite number {n}")),
        Cell::Number(n) => {
            let value = format_number(*n);
            xml.push_str(&format!(
                r#"<table:table-cell office:value-type="float" office:value="{value}"><text:p>{value}</text:p></table:table-cell>"#
            ));
        }
        Cell::Boolean(b) => {
            let (value, label) = if *b { ("true", "TRUE") } else { ("false", "FALSE") };
            xml.push_str(&format!(
                r#"<table:table-cell office:value-type="boolean" office:boolean-value="{value}"><text:p>{label}</text:p></table:table-cell>"#
            ));
        }
        Cell::DateTime(dt) => {
            let value = dt.format(ISO_DATETIME_FORMAT);
            xml.push_str(&format!(
                r#"<table:table-cell office:value-type="date" office:date-value="{value}"><text:p>{value}</text:p></table:table-cell>"#
            ));
        }
        Cell::Empty => xml.push_str("<table:table-cell/>"),
    }
    Ok(())
}
