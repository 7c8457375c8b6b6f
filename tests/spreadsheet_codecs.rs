#![cfg(feature = "excel")]

use chrono::NaiveDate;

use tabular_interchange::formats::{Codec, OdsCodec, XlsCodec, XlsxCodec};
use tabular_interchange::{Cell, Dataset, Exported, ReadOptions, Registry, Tabular, TabularError};

fn codecs() -> [(&'static str, Box<dyn Codec>); 3] {
    [
        ("xls", Box::new(XlsCodec) as Box<dyn Codec>),
        ("xlsx", Box::new(XlsxCodec) as Box<dyn Codec>),
        ("ods", Box::new(OdsCodec) as Box<dyn Codec>),
    ]
}

fn people() -> Dataset {
    let mut ds = Dataset::with_headers(["Name", "Age", "City", "Phone"]);
    for (name, age, city, phone) in [
        ("Alice", 24, "New York", "+1-212-555-0187"),
        ("Bob", 30, "Los Angeles", "+1-310-555-0143"),
        ("Charlie", 22, "Chicago", "+1-312-555-0198"),
        ("David", 35, "Houston", "+1-713-555-0123"),
        ("Eva", 28, "Phoenix", "+1-602-555-0179"),
    ] {
        ds.append_row([Cell::from(name), Cell::from(age), Cell::from(city), Cell::from(phone)])
            .unwrap();
    }
    ds
}

fn mixed() -> Dataset {
    let when = NaiveDate::from_ymd_opt(1999, 12, 31)
        .unwrap()
        .and_hms_opt(23, 59, 59)
        .unwrap();
    let mut ds = Dataset::with_headers(["text", "number", "flag", "when"]);
    ds.set_title(Some("Mixed".to_string()));
    ds.append_row([Cell::from("a & b"), Cell::from(-0.125), Cell::from(true), Cell::from(when)])
        .unwrap();
    ds.append_row([Cell::Empty, Cell::from(1e9), Cell::from(false), Cell::Empty])
        .unwrap();
    ds
}

#[test]
fn people_table_round_trips_in_every_spreadsheet_format() {
    let mut expected = people();
    expected.set_title(Some("Sheet1".to_string()));
    for (id, codec) in codecs() {
        let out = codec.serialize(&people()).unwrap();
        assert!(matches!(out, Exported::Binary(_)), "{id} exports bytes");
        let back = codec.deserialize(out.as_bytes(), &ReadOptions::default()).unwrap();
        assert_eq!(back, expected, "{id}");
    }
}

#[test]
fn typed_cells_and_title_survive() {
    for (id, codec) in codecs() {
        let out = codec.serialize(&mixed()).unwrap();
        let back = codec.deserialize(out.as_bytes(), &ReadOptions::default()).unwrap();
        assert_eq!(back, mixed(), "{id}");
    }
}

#[test]
fn every_spreadsheet_export_is_detected_as_itself() {
    let registry = Registry::with_defaults();
    for (id, codec) in codecs() {
        let out = codec.serialize(&people()).unwrap();
        assert_eq!(registry.detect(out.as_bytes(), None).unwrap(), id);
        // A wrong hint does not win over the content.
        assert_eq!(registry.detect(out.as_bytes(), Some("table.csv")).unwrap(), id);
    }
}

#[test]
fn headerless_datasets_write_data_from_the_first_row() {
    let mut ds = Dataset::new();
    ds.append_row([Cell::from("x"), Cell::from(1)]).unwrap();
    ds.append_row([Cell::from("y"), Cell::from(2)]).unwrap();
    let opts = ReadOptions { headers: false };
    for (id, codec) in codecs() {
        let out = codec.serialize(&ds).unwrap();
        let back = codec.deserialize(out.as_bytes(), &opts).unwrap();
        assert!(back.headers().is_none(), "{id}");
        assert_eq!(back.rows(), ds.rows(), "{id}");
    }
}

#[test]
fn long_titles_are_sanitized_into_sheet_names() {
    let mut ds = people();
    ds.set_title(Some("Q1/Q2 [draft]: people*? and a name longer than allowed".to_string()));
    for (id, codec) in codecs() {
        let out = codec.serialize(&ds).unwrap();
        let back = codec.deserialize(out.as_bytes(), &ReadOptions::default()).unwrap();
        let title = back.title().unwrap();
        assert!(title.chars().count() <= 31, "{id}: {title}");
        assert!(title.starts_with("Q1_Q2 _draft__ people__"), "{id}: {title}");
    }
}

#[test]
fn non_finite_numbers_are_unsupported() {
    let mut ds = Dataset::with_headers(["x"]);
    ds.append_row([Cell::from(f64::INFINITY)]).unwrap();
    for (id, codec) in codecs() {
        assert!(
            matches!(codec.serialize(&ds), Err(TabularError::UnsupportedCellType { .. })),
            "{id}"
        );
    }
}

#[test]
fn truncated_packages_are_malformed() {
    for (id, codec) in codecs() {
        let out = codec.serialize(&people()).unwrap().into_bytes();
        let cut = &out[..out.len() / 2];
        assert!(
            matches!(
                codec.deserialize(cut, &ReadOptions::default()),
                Err(TabularError::MalformedInput { .. })
            ),
            "{id}"
        );
    }
}

#[test]
fn trailing_blank_rows_and_columns_keep_their_place() {
    let mut headed = Dataset::with_headers(["a", "b"]);
    headed.append_row([Cell::from(1), Cell::Empty]).unwrap();
    headed.append_row([Cell::Empty, Cell::Empty]).unwrap();
    headed.set_title(Some("Sheet1".to_string()));

    let mut bare = Dataset::new();
    bare.append_row([Cell::from("x"), Cell::Empty, Cell::Empty]).unwrap();
    bare.set_title(Some("Sheet1".to_string()));

    for (id, codec) in codecs() {
        let out = codec.serialize(&headed).unwrap();
        let back = codec.deserialize(out.as_bytes(), &ReadOptions::default()).unwrap();
        assert_eq!(back, headed, "{id}");

        let out = codec.serialize(&bare).unwrap();
        let back = codec.deserialize(out.as_bytes(), &ReadOptions { headers: false }).unwrap();
        assert_eq!(back, bare, "{id}");
    }
}

fn utf16(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

#[test]
fn compound_files_without_a_workbook_stream_are_skipped() {
    let mut ds = Dataset::with_headers(["Agenda"]);
    ds.append_row(["Book club minutes, then the Workbook review"]).unwrap();
    let mut doc = XlsCodec.serialize(&ds).unwrap().into_bytes();

    // Rename the directory entry (the last "Workbook" in the file) to another stream name.
    let name = utf16("Workbook");
    let at = doc
        .windows(name.len())
        .rposition(|w| w == name.as_slice())
        .unwrap();
    doc[at..at + name.len()].copy_from_slice(&utf16("Document"));

    let registry = Registry::with_defaults();
    assert!(matches!(registry.detect(&doc, None), Err(TabularError::UnsupportedFormat)));
    assert!(matches!(
        registry.detect(&doc, Some("minutes.xls")),
        Err(TabularError::UnsupportedFormat)
    ));
    assert!(matches!(
        Tabular::new().with_registry(registry).load(&doc, Some("minutes.doc")),
        Err(TabularError::UnsupportedFormat)
    ));
}
