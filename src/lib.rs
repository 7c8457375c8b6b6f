//! `tabular-interchange` loads tabular content in common formats into an in-memory
//! [`Dataset`] and exports a [`Dataset`] to any registered format.
//!
//! The primary entry points are [`load`], which auto-detects the format of raw content
//! (optionally helped by a filename hint), and [`export`]. The engine never touches the file
//! system: callers hand in bytes and get back an [`Exported`] value.
//!
//! ## Formats
//!
//! | id     | load | export | notes                                               |
//! |--------|------|--------|-----------------------------------------------------|
//! | `csv`  | yes  | yes    | RFC 4180, CRLF, fallback for any text               |
//! | `tsv`  | yes  | yes    | tab-separated                                       |
//! | `json` | yes  | yes    | array of objects (headered) / array of arrays       |
//! | `yaml` | yes  | yes    | same shapes as JSON                                 |
//! | `html` | yes  | yes    | first `<table>`; `<caption>` is the title           |
//! | `xls`  | yes  | yes    | BIFF8, requires the Cargo feature `excel` (default) |
//! | `xlsx` | yes  | yes    | requires `excel`                                    |
//! | `ods`  | yes  | yes    | requires `excel`                                    |
//!
//! Detection tries codecs in a fixed order (`xls, xlsx, ods, json, html, yaml, tsv, csv`) and
//! fails with [`TabularError::UnsupportedFormat`] when nothing matches.
//!
//! ## Cells
//!
//! Every value is a [`Cell`]: `Text`, `Number`, `Boolean`, `DateTime` or `Empty`. Text formats
//! load every non-empty value as `Text`; apply a [`Schema`] to get typed columns back.
//!
//! ## Quick examples
//!
//! ```
//! use tabular_interchange::{Cell, Dataset};
//!
//! # fn main() -> Result<(), tabular_interchange::TabularError> {
//! let mut people = Dataset::with_headers(["Name", "Age", "City", "Phone"]);
//! people.append_row([
//!     Cell::from("Alice"),
//!     Cell::from(24),
//!     Cell::from("New York"),
//!     Cell::from("+1-212-555-0187"),
//! ])?;
//!
//! let csv = people.export("csv")?;
//! assert_eq!(
//!     csv.as_text(),
//!     Some("Name,Age,City,Phone\r\nAlice,24,New York,+1-212-555-0187\r\n")
//! );
//!
//! let back = Dataset::load(csv.as_bytes(), Some("people.csv"))?;
//! for row in back.to_dicts() {
//!     println!("{} {}", row["Name"], row["Phone"]);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Reading a directory and skipping files the engine does not recognize:
//!
//! ```no_run
//! use tabular_interchange::{load, TabularError};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! for entry in std::fs::read_dir("exports")? {
//!     let path = entry?.path();
//!     let raw = std::fs::read(&path)?;
//!     let name = path.file_name().and_then(|n| n.to_str());
//!     let ds = match load(&raw, name) {
//!         Ok(ds) => ds,
//!         Err(TabularError::UnsupportedFormat) => continue,
//!         Err(e) => return Err(e.into()),
//!     };
//!     for row in ds.to_dicts() {
//!         println!("{}, {}", row["Name"], row["Phone"]);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`dataset`]: the in-memory table and its row-dict projection
//! - [`types`]: [`Cell`] and schema types
//! - [`formats`]: the [`formats::Codec`] trait and one codec per format
//! - [`registry`]: ordered codec set and format detection
//! - [`facade`]: [`Tabular`], load/export with options and observer hooks
//! - [`observability`]: observer trait, severities and stock observers
//! - [`error`]: the crate-wide error type

pub mod dataset;
pub mod error;
pub mod facade;
pub mod formats;
pub mod observability;
pub mod registry;
pub mod types;

pub use dataset::{Dataset, Row, RowDict, RowDicts};
pub use error::{TabularError, TabularResult};
pub use facade::{export, load, LoadOptions, Tabular};
pub use formats::{Codec, DetectionTier, Exported, ReadOptions};
pub use registry::Registry;
pub use types::{Cell, CellKind, ColumnType, Field, Schema};
