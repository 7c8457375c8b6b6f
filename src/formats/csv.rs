//! CSV and TSV codecs.
//!
//! Both formats share one implementation parameterized by the delimiter. Writing follows
//! RFC 4180 (fields are quoted only when they contain the delimiter, a quote, CR or LF) with
//! CRLF record terminators. When minimal quoting would let another format's sniffer claim the
//! output, every field is quoted instead. Every loaded cell is text; empty fields load as [`Cell::Empty`].

use crate::dataset::{Dataset, Row};
use crate::error::{TabularError, TabularResult};
use crate::types::Cell;

use super::html::HtmlCodec;
use super::json::JsonCodec;
use super::yaml::YamlCodec;
use super::{dataset_from_grid, decode_text, sniff_text, text_grid, Codec, DetectionTier, Exported, ReadOptions};

/// Delimiter-separated values (CSV or TSV).
#[derive(Debug, Clone, Copy)]
pub struct DelimitedCodec {
    id: &'static str,
    delimiter: u8,
    extensions: &'static [&'static str],
    tier: DetectionTier,
}

impl DelimitedCodec {
    /// Comma-separated values. The fallback codec: accepts any non-blank UTF-8 text.
    pub const fn csv() -> Self {
        Self {
            id: "csv",
            delimiter: b',',
            extensions: &["csv"],
            tier: DetectionTier::Fallback,
        }
    }

    /// Tab-separated values.
    pub const fn tsv() -> Self {
        Self {
            id: "tsv",
            delimiter: b'\t',
            extensions: &["tsv", "tab"],
            tier: DetectionTier::Delimited,
        }
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }
}

impl Codec for DelimitedCodec {
    fn id(&self) -> &'static str {
        self.id
    }

    fn extensions(&self) -> &'static [&'static str] {
        self.extensions
    }

    fn tier(&self) -> DetectionTier {
        self.tier
    }

    fn can_parse(&self, raw: &[u8]) -> bool {
        let Some(text) = sniff_text(raw) else {
            return false;
        };
        match self.tier {
            DetectionTier::Fallback => true,
            _ => first_record_has_delimiter(text, self.delimiter),
        }
    }

    fn deserialize(&self, raw: &[u8], options: &ReadOptions) -> TabularResult<Dataset> {
        let text = decode_text(self.id, raw)?;
        check_quotes(self.id, text, self.delimiter)?;

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(false)
            .delimiter(self.delimiter)
            .from_reader(text.as_bytes());

        let mut grid: Vec<Row> = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| TabularError::malformed(self.id, e.to_string()))?;
            grid.push(
                record
                    .iter()
                    .map(|field| {
                        if field.is_empty() {
                            Cell::Empty
                        } else {
                            Cell::from(field)
                        }
                    })
                    .collect(),
            );
        }

        dataset_from_grid(self.id, grid, options.headers)
    }

    fn serialize(&self, dataset: &Dataset) -> TabularResult<Exported> {
        let text = self.write(dataset, csv::QuoteStyle::Necessary)?;
        if self.is_ambiguous(&text) {
            // Quoting every field makes the output start with `"`, which no structured
            // sniffer accepts, and hides embedded tabs and commas from the delimiter sniff.
            return self.write(dataset, csv::QuoteStyle::Always).map(Exported::Text);
        }
        Ok(Exported::Text(text))
    }
}

impl DelimitedCodec {
    fn write(&self, dataset: &Dataset, quoting: csv::QuoteStyle) -> TabularResult<String> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .quote_style(quoting)
            .terminator(csv::Terminator::CRLF)
            .from_writer(Vec::new());

        for record in text_grid(dataset) {
            // Writing into a Vec cannot fail on I/O; any error here is a csv invariant.
            wtr.write_record(&record)
                .map_err(|e| TabularError::unsupported_cell(self.id, e.to_string()))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| TabularError::unsupported_cell(self.id, e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| TabularError::unsupported_cell(self.id, e.to_string()))
    }

    /// Whether minimally quoted output would be detected as another default format, or read
    /// back with a different delimiter.
    fn is_ambiguous(&self, text: &str) -> bool {
        let raw = text.as_bytes();
        if JsonCodec.can_parse(raw) || YamlCodec.can_parse(raw) || HtmlCodec.can_parse(raw) {
            return true;
        }
        let has_tab = first_record_has_delimiter(text, b'\t');
        match self.tier {
            // A bare tab in the first record makes TSV claim CSV output.
            DetectionTier::Fallback => has_tab,
            // Without a tab the CSV fallback reads it, so commas must be quoted.
            _ => !has_tab && text.contains(','),
        }
    }
}

/// Reject quoted fields that never close. The csv reader silently ends such a field at EOF.
fn check_quotes(format: &str, text: &str, delimiter: u8) -> TabularResult<()> {
    let bytes = text.as_bytes();
    let mut in_quotes = false;
    let mut at_field_start = true;
    let mut line = 1usize;
    let mut opened_at = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\n' {
            line += 1;
        }
        if in_quotes {
            if b == b'"' {
                if bytes.get(i + 1) == Some(&b'"') {
                    i += 1;
                } else {
                    in_quotes = false;
                }
            }
        } else if b == b'"' && at_field_start {
            in_quotes = true;
            opened_at = line;
        }
        at_field_start = !in_quotes && (b == delimiter || b == b'\n' || b == b'\r');
        i += 1;
    }
    if in_quotes {
        return Err(TabularError::malformed(
            format,
            format!("unterminated quoted field starting on line {opened_at}"),
        ));
    }
    Ok(())
}

/// Whether the first record contains `delimiter` outside quotes.
fn first_record_has_delimiter(text: &str, delimiter: u8) -> bool {
    let mut in_quotes = false;
    for &b in text.as_bytes() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b'\n' | b'\r' if !in_quotes => return false,
            _ if b == delimiter && !in_quotes => return true,
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(codec: &DelimitedCodec, raw: &str) -> TabularResult<Dataset> {
        codec.deserialize(raw.as_bytes(), &ReadOptions::default())
    }

    #[test]
    fn loads_headers_and_text_cells() {
        let ds = load(
            &DelimitedCodec::csv(),
            "Name,Age,City,Phone\r\nAlice,24,New York,+1-212-555-0187\r\n",
        )
        .unwrap();
        assert_eq!(ds.headers().unwrap(), ["Name", "Age", "City", "Phone"]);
        assert_eq!(ds.row_count(), 1);
        assert_eq!(ds.row(0).unwrap()[1], Cell::from("24"));
    }

    #[test]
    fn quoted_fields_keep_delimiters_and_newlines() {
        let ds = load(
            &DelimitedCodec::csv(),
            "a,b\n\"x, y\",\"line1\nline2 \"\"quoted\"\"\"\n",
        )
        .unwrap();
        assert_eq!(ds.row(0).unwrap()[0], Cell::from("x, y"));
        assert_eq!(ds.row(0).unwrap()[1], Cell::from("line1\nline2 \"quoted\""));
    }

    #[test]
    fn empty_fields_load_as_empty() {
        let ds = load(&DelimitedCodec::csv(), "a,b,c\n1,,3\n").unwrap();
        assert_eq!(ds.row(0).unwrap()[1], Cell::Empty);
    }

    #[test]
    fn unterminated_quote_is_malformed() {
        let err = load(&DelimitedCodec::csv(), "a,b\n\"open,1\n").unwrap_err();
        assert!(matches!(err, TabularError::MalformedInput { .. }));
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn ragged_rows_are_malformed() {
        let err = load(&DelimitedCodec::csv(), "a,b\n1,2,3\n").unwrap_err();
        assert!(matches!(err, TabularError::MalformedInput { .. }));
    }

    #[test]
    fn headerless_read_keeps_first_row() {
        let ds = DelimitedCodec::csv()
            .deserialize(b"1,2\n3,4\n", &ReadOptions { headers: false })
            .unwrap();
        assert!(ds.headers().is_none());
        assert_eq!(ds.row_count(), 2);
    }

    #[test]
    fn writes_crlf_and_quotes_only_when_needed() {
        let mut ds = Dataset::with_headers(["Name", "Note", "Active"]);
        ds.append_row(vec![Cell::from("Alice"), Cell::from("says \"hi\", twice"), Cell::from(true)])
            .unwrap();
        ds.append_row(vec![Cell::from("Bob"), Cell::Empty, Cell::from(false)])
            .unwrap();
        let out = DelimitedCodec::csv().serialize(&ds).unwrap();
        assert_eq!(
            out.as_text().unwrap(),
            "Name,Note,Active\r\nAlice,\"says \"\"hi\"\", twice\",True\r\nBob,,False\r\n"
        );
    }

    #[test]
    fn tsv_uses_tabs() {
        let mut ds = Dataset::with_headers(["a", "b"]);
        ds.append_row(["x,y", "z"]).unwrap();
        let out = DelimitedCodec::tsv().serialize(&ds).unwrap();
        assert_eq!(out.as_text().unwrap(), "a\tb\r\nx,y\tz\r\n");
        let back = load(&DelimitedCodec::tsv(), out.as_text().unwrap()).unwrap();
        assert_eq!(back, ds);
    }

    #[test]
    fn bare_tabs_in_csv_output_are_quoted() {
        let mut ds = Dataset::new();
        ds.append_row(["x\ty", "z"]).unwrap();
        let csv = DelimitedCodec::csv();
        let out = csv.serialize(&ds).unwrap();
        assert_eq!(out.as_text().unwrap(), "\"x\ty\",\"z\"\r\n");
        assert!(!DelimitedCodec::tsv().can_parse(out.as_bytes()));
        let back = csv.deserialize(out.as_bytes(), &ReadOptions { headers: false }).unwrap();
        assert_eq!(back, ds);
    }

    #[test]
    fn output_that_reads_as_structured_text_is_quoted() {
        let csv = DelimitedCodec::csv();
        for first in ["[1]", "<table>", "key: value", "- [1, 2]"] {
            let ds = Dataset::with_headers([first]);
            let out = csv.serialize(&ds).unwrap();
            assert!(out.as_text().unwrap().starts_with('"'), "{first}");
            assert_eq!(load(&csv, out.as_text().unwrap()).unwrap(), ds, "{first}");
        }
    }

    #[test]
    fn single_column_tsv_quotes_commas() {
        let mut ds = Dataset::with_headers(["note"]);
        ds.append_row(["a, b"]).unwrap();
        let out = DelimitedCodec::tsv().serialize(&ds).unwrap();
        assert_eq!(out.as_text().unwrap(), "\"note\"\r\n\"a, b\"\r\n");
        // Read by the CSV fallback, the column stays whole.
        assert_eq!(load(&DelimitedCodec::csv(), out.as_text().unwrap()).unwrap(), ds);
    }

    #[test]
    fn sniffing() {
        let csv = DelimitedCodec::csv();
        let tsv = DelimitedCodec::tsv();
        assert!(csv.can_parse(b"just some text"));
        assert!(!csv.can_parse(b""));
        assert!(!csv.can_parse(b" \n\t "));
        assert!(!csv.can_parse(b"\xFF\xFE\x00"));
        assert!(tsv.can_parse(b"a\tb\r\n1\t2\r\n"));
        assert!(!tsv.can_parse(b"a,b\r\n1\t2\r\n"));
        assert!(!tsv.can_parse(b"\"a\tb\",c\r\n"));
    }
}
