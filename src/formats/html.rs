//! HTML table codec.
//!
//! Writes one `<table>` with an optional `<caption>` (the dataset title), a `<thead>` row of
//! `<th>` for the headers and a `<tbody>` of `<td>` rows. Reading is tolerant: it takes the
//! first `<table>` of the document, ignores inline markup inside cells and resolves the
//! XML entities plus `&nbsp;`.

use std::borrow::Cow;

use quick_xml::escape::{escape, unescape_with};

use crate::dataset::{Dataset, Row};
use crate::error::{TabularError, TabularResult};
use crate::types::Cell;

use super::{dataset_from_grid, decode_text, sniff_text, Codec, DetectionTier, Exported, ReadOptions};

/// HTML `<table>` codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlCodec;

impl Codec for HtmlCodec {
    fn id(&self) -> &'static str {
        "html"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["html", "htm"]
    }

    fn tier(&self) -> DetectionTier {
        DetectionTier::StructuredText
    }

    fn can_parse(&self, raw: &[u8]) -> bool {
        let Some(text) = sniff_text(raw) else {
            return false;
        };
        text.trim_start().starts_with('<') && find_ci(text, "<table", 0).is_some()
    }

    fn deserialize(&self, raw: &[u8], options: &ReadOptions) -> TabularResult<Dataset> {
        let text = decode_text(self.id(), raw)?;
        let table = parse_first_table(text)?;
        let mut ds = dataset_from_grid(self.id(), table.rows, options.headers)?;
        ds.set_title(table.caption);
        Ok(ds)
    }

    fn serialize(&self, dataset: &Dataset) -> TabularResult<Exported> {
        let mut out = String::from("<table>\n");
        if let Some(title) = dataset.title() {
            out.push_str("<caption>");
            out.push_str(&escape(title));
            out.push_str("</caption>\n");
        }
        if let Some(headers) = dataset.headers() {
            out.push_str("<thead>\n<tr>");
            for name in headers {
                push_cell(&mut out, "th", name);
            }
            out.push_str("</tr>\n</thead>\n");
        }
        out.push_str("<tbody>\n");
        for row in dataset.rows() {
            out.push_str("<tr>");
            for cell in row {
                push_cell(&mut out, "td", &cell.to_text());
            }
            out.push_str("</tr>\n");
        }
        out.push_str("</tbody>\n</table>\n");
        Ok(Exported::Text(out))
    }
}

fn push_cell(out: &mut String, tag: &str, text: &str) {
    out.push('<');
    out.push_str(tag);
    out.push('>');
    out.push_str(&escape(text).replace('\n', "<br>"));
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

struct ParsedTable {
    caption: Option<String>,
    rows: Vec<Row>,
}

/// Where character data currently goes.
enum Sink {
    Nowhere,
    Caption(String),
    Cell(String),
}

fn parse_first_table(text: &str) -> TabularResult<ParsedTable> {
    let start = find_ci(text, "<table", 0)
        .ok_or_else(|| TabularError::malformed("html", "no <table> element"))?;
    let end = find_ci(text, "</table", start)
        .ok_or_else(|| TabularError::malformed("html", "unterminated <table> element"))?;
    let body = &text[start..end];

    let mut caption = None;
    let mut rows: Vec<Row> = Vec::new();
    let mut row: Option<Row> = None;
    let mut sink = Sink::Nowhere;

    let mut pos = 0;
    while pos < body.len() {
        let Some(lt) = body[pos..].find('<').map(|i| pos + i) else {
            push_text(&mut sink, &body[pos..]);
            break;
        };
        push_text(&mut sink, &body[pos..lt]);

        if body[lt..].starts_with("<!--") {
            pos = match body[lt..].find("-->") {
                Some(i) => lt + i + 3,
                None => body.len(),
            };
            continue;
        }
        let gt = body[lt..]
            .find('>')
            .map(|i| lt + i)
            .ok_or_else(|| TabularError::malformed("html", "unterminated tag"))?;
        pos = gt + 1;

        let (closing, name) = tag_name(&body[lt + 1..gt]);
        match (closing, name.as_str()) {
            (false, "tr") => {
                close_cell(&mut sink, &mut row);
                if let Some(done) = row.take() {
                    rows.push(done);
                }
                row = Some(Vec::new());
            }
            (true, "tr") => {
                close_cell(&mut sink, &mut row);
                if let Some(done) = row.take() {
                    rows.push(done);
                }
            }
            (false, "td" | "th") => {
                close_cell(&mut sink, &mut row);
                row.get_or_insert_with(Vec::new);
                sink = Sink::Cell(String::new());
            }
            (true, "td" | "th") => close_cell(&mut sink, &mut row),
            (false, "caption") => sink = Sink::Caption(String::new()),
            (true, "caption") => {
                if let Sink::Caption(buf) = std::mem::replace(&mut sink, Sink::Nowhere) {
                    caption = Some(buf.trim().to_string());
                }
            }
            (false, "br") => push_text(&mut sink, "\n"),
            (false, "thead" | "tbody" | "tfoot") | (true, "thead" | "tbody" | "tfoot") => {
                close_cell(&mut sink, &mut row);
                if let Some(done) = row.take() {
                    rows.push(done);
                }
            }
            _ => {}
        }
    }
    close_cell(&mut sink, &mut row);
    if let Some(done) = row.take() {
        rows.push(done);
    }

    Ok(ParsedTable { caption, rows })
}

fn close_cell(sink: &mut Sink, row: &mut Option<Row>) {
    if let Sink::Cell(buf) = std::mem::replace(sink, Sink::Nowhere) {
        let text = clean_cell_text(&buf);
        let cell = if text.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(text)
        };
        row.get_or_insert_with(Vec::new).push(cell);
    }
}

fn push_text(sink: &mut Sink, raw: &str) {
    match sink {
        Sink::Caption(buf) | Sink::Cell(buf) => buf.push_str(&unescape_entities(raw)),
        Sink::Nowhere => {}
    }
}

/// Trim each line of a cell; source indentation and line breaks are not content.
fn clean_cell_text(buf: &str) -> String {
    let lines: Vec<&str> = buf.split('\n').map(str::trim).collect();
    let first = lines.iter().position(|l| !l.is_empty());
    let last = lines.iter().rposition(|l| !l.is_empty());
    match (first, last) {
        (Some(a), Some(b)) => lines[a..=b].join("\n"),
        _ => String::new(),
    }
}

fn unescape_entities(raw: &str) -> Cow<'_, str> {
    let resolved = unescape_with(raw, |entity| match entity {
        "lt" => Some("<"),
        "gt" => Some(">"),
        "amp" => Some("&"),
        "apos" => Some("'"),
        "quot" => Some("\""),
        "nbsp" => Some("\u{a0}"),
        _ => None,
    });
    // Unknown entities and stray ampersands are kept verbatim.
    resolved.unwrap_or(Cow::Borrowed(raw))
}

/// `("/td" | "td class=x")` -> `(closing, "td")`, lowercased.
fn tag_name(inner: &str) -> (bool, String) {
    let inner = inner.trim_start();
    let (closing, rest) = match inner.strip_prefix('/') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, inner),
    };
    let name: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    (closing, name)
}

/// Case-insensitive ASCII search for `needle` in `haystack[from..]`.
fn find_ci(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || hay.len() < needle.len() {
        return None;
    }
    (from..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(raw: &str) -> TabularResult<Dataset> {
        HtmlCodec.deserialize(raw.as_bytes(), &ReadOptions::default())
    }

    #[test]
    fn writes_caption_head_and_body() {
        let mut ds = Dataset::with_headers(["Name", "Note"]);
        ds.set_title(Some("People".to_string()));
        ds.append_row(vec![Cell::from("Alice"), Cell::from("a < b & c")])
            .unwrap();
        ds.append_row(vec![Cell::from("Bob"), Cell::Empty]).unwrap();
        let out = HtmlCodec.serialize(&ds).unwrap();
        assert_eq!(
            out.as_text().unwrap(),
            "<table>\n<caption>People</caption>\n<thead>\n<tr><th>Name</th><th>Note</th></tr>\n</thead>\n\
             <tbody>\n<tr><td>Alice</td><td>a &lt; b &amp; c</td></tr>\n<tr><td>Bob</td><td></td></tr>\n\
             </tbody>\n</table>\n"
        );
        assert_eq!(load(out.as_text().unwrap()).unwrap(), ds);
    }

    #[test]
    fn tolerates_markup_attributes_and_entities() {
        let html = r#"<!DOCTYPE html>
<html><body>
<TABLE class="grid">
  <tr><th>Name</th><th>City</th></tr>
  <tr>
    <td><b>Alice</b></td>
    <td>New&nbsp;York &amp; co</td>
  </tr>
  <!-- <tr><td>hidden</td><td>row</td></tr> -->
  <tr><td>Bob<td>LA
</TABLE>
</body></html>"#;
        let ds = load(html).unwrap();
        assert_eq!(ds.headers().unwrap(), ["Name", "City"]);
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.row(0).unwrap()[0], Cell::from("Alice"));
        assert_eq!(ds.row(0).unwrap()[1], Cell::from("New\u{a0}York & co"));
        assert_eq!(ds.row(1).unwrap(), [Cell::from("Bob"), Cell::from("LA")]);
    }

    #[test]
    fn line_breaks_survive() {
        let mut ds = Dataset::with_headers(["Address"]);
        ds.append_row(["1 Main St\nSpringfield"]).unwrap();
        let out = HtmlCodec.serialize(&ds).unwrap();
        assert!(out.as_text().unwrap().contains("1 Main St<br>Springfield"));
        assert_eq!(load(out.as_text().unwrap()).unwrap(), ds);
    }

    #[test]
    fn unterminated_and_ragged_tables_are_malformed() {
        assert!(matches!(
            load("<table><tr><td>a</td></tr>"),
            Err(TabularError::MalformedInput { .. })
        ));
        assert!(matches!(
            load("<table><tr><td>a</td><td>b</td></tr><tr><td>c</td></tr></table>"),
            Err(TabularError::MalformedInput { .. })
        ));
    }

    #[test]
    fn sniffing() {
        assert!(HtmlCodec.can_parse(b"<html><table></table></html>"));
        assert!(HtmlCodec.can_parse(b"  <TABLE>"));
        assert!(!HtmlCodec.can_parse(b"<p>no table</p>"));
        assert!(!HtmlCodec.can_parse(b"a,b\n<table>\n"));
    }
}
