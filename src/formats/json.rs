//! JSON codec.
//!
//! A headered dataset is written as an array of objects (keys in header order), a headerless
//! one as an array of arrays. Loading accepts both shapes plus a single top-level object
//! (one row). Objects with differing keys are merged: headers are the union of keys in
//! first-seen order and missing keys load as [`Cell::Empty`].

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::dataset::{Dataset, Row};
use crate::error::{TabularError, TabularResult};
use crate::types::Cell;

use super::{decode_text, strip_bom, Codec, DetectionTier, Exported, ReadOptions};

/// JSON codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn id(&self) -> &'static str {
        "json"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["json"]
    }

    fn tier(&self) -> DetectionTier {
        DetectionTier::StructuredText
    }

    fn can_parse(&self, raw: &[u8]) -> bool {
        let raw = strip_bom(raw);
        let starts_like_json = raw
            .iter()
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|b| matches!(b, b'{' | b'['));
        starts_like_json && serde_json::from_slice::<serde::de::IgnoredAny>(raw).is_ok()
    }

    fn deserialize(&self, raw: &[u8], _options: &ReadOptions) -> TabularResult<Dataset> {
        let text = decode_text(self.id(), raw)?;
        let value: Value =
            serde_json::from_str(text).map_err(|e| TabularError::malformed(self.id(), e.to_string()))?;
        dataset_from_value(self.id(), value)
    }

    fn serialize(&self, dataset: &Dataset) -> TabularResult<Exported> {
        ensure_finite(self.id(), dataset)?;
        serde_json::to_string_pretty(&DatasetShape(dataset))
            .map(Exported::Text)
            .map_err(|e| TabularError::unsupported_cell(self.id(), e.to_string()))
    }
}

/// Reject NaN and infinities, which neither JSON nor YAML can carry as numbers.
pub(crate) fn ensure_finite(format: &str, dataset: &Dataset) -> TabularResult<()> {
    for (r, row) in dataset.rows().iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            if let Cell::Number(n) = cell {
                if !n.is_finite() {
                    return Err(TabularError::unsupported_cell(
                        format,
                        format!("non-finite number {n} at row {} column {}", r + 1, c + 1),
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Serializes a dataset as a sequence of mappings (headered) or sequences (headerless).
pub(crate) struct DatasetShape<'a>(pub(crate) &'a Dataset);

struct RecordShape<'a> {
    headers: &'a [String],
    cells: &'a [Cell],
}

impl Serialize for DatasetShape<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let ds = self.0;
        let mut seq = serializer.serialize_seq(Some(ds.row_count()))?;
        match ds.headers() {
            Some(headers) => {
                for cells in ds.rows() {
                    seq.serialize_element(&RecordShape { headers, cells })?;
                }
            }
            None => {
                for cells in ds.rows() {
                    seq.serialize_element(cells)?;
                }
            }
        }
        seq.end()
    }
}

impl Serialize for RecordShape<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.headers.len()))?;
        for (name, cell) in self.headers.iter().zip(self.cells) {
            map.serialize_entry(name, cell)?;
        }
        map.end()
    }
}

/// Build a dataset from a parsed document (shared by JSON and YAML).
pub(crate) fn dataset_from_value(format: &str, value: Value) -> TabularResult<Dataset> {
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                Ok(Dataset::new())
            } else if items.iter().all(Value::is_object) {
                let objects = items.into_iter().filter_map(|v| match v {
                    Value::Object(map) => Some(map),
                    _ => None,
                });
                from_objects(format, objects.collect())
            } else if items.iter().all(Value::is_array) {
                from_arrays(format, items)
            } else {
                Err(TabularError::malformed(
                    format,
                    "top-level array must hold only objects or only arrays",
                ))
            }
        }
        Value::Object(map) => from_objects(format, vec![map]),
        other => Err(TabularError::malformed(
            format,
            format!("expected an array or object at top level, found {}", json_kind(&other)),
        )),
    }
}

fn from_objects(format: &str, objects: Vec<Map<String, Value>>) -> TabularResult<Dataset> {
    let mut headers: Vec<String> = Vec::new();
    for obj in &objects {
        for key in obj.keys() {
            if !headers.iter().any(|h| h == key) {
                headers.push(key.clone());
            }
        }
    }

    let mut rows: Vec<Row> = Vec::with_capacity(objects.len());
    for (idx, mut obj) in objects.into_iter().enumerate() {
        let mut row = Vec::with_capacity(headers.len());
        for name in &headers {
            let cell = match obj.remove(name) {
                Some(v) => to_cell(format, idx, v)?,
                None => Cell::Empty,
            };
            row.push(cell);
        }
        rows.push(row);
    }
    Ok(Dataset::from_parts(Some(headers), rows))
}

fn from_arrays(format: &str, items: Vec<Value>) -> TabularResult<Dataset> {
    let mut rows: Vec<Row> = Vec::with_capacity(items.len());
    let mut width = None;
    for (idx, item) in items.into_iter().enumerate() {
        let Value::Array(values) = item else {
            continue;
        };
        let expected = *width.get_or_insert(values.len());
        if values.len() != expected {
            return Err(TabularError::malformed(
                format,
                format!("row {} has {} cells, expected {expected}", idx + 1, values.len()),
            ));
        }
        let row = values
            .into_iter()
            .map(|v| to_cell(format, idx, v))
            .collect::<TabularResult<Row>>()?;
        rows.push(row);
    }
    Ok(Dataset::from_parts(None, rows))
}

fn to_cell(format: &str, row_idx: usize, value: Value) -> TabularResult<Cell> {
    Cell::try_from(value).map_err(|e| match e {
        TabularError::TypeError { detail } => {
            TabularError::malformed(format, format!("row {}: {detail}", row_idx + 1))
        }
        other => other,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
