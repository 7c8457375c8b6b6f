//! YAML codec.
//!
//! Same shapes and cell rules as [`super::json`]: a sequence of mappings (headered) or a
//! sequence of sequences (headerless). `~` and `null` load as [`Cell::Empty`].

use serde_json::Value;

use crate::dataset::Dataset;
use crate::error::{TabularError, TabularResult};

use super::json::{dataset_from_value, ensure_finite, DatasetShape};
use super::{decode_text, sniff_text, Codec, DetectionTier, Exported, ReadOptions};

/// YAML codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl Codec for YamlCodec {
    fn id(&self) -> &'static str {
        "yaml"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["yaml", "yml"]
    }

    fn tier(&self) -> DetectionTier {
        DetectionTier::StructuredText
    }

    fn can_parse(&self, raw: &[u8]) -> bool {
        let Some(text) = sniff_text(raw) else {
            return false;
        };
        match serde_saphyr::from_str::<Value>(text) {
            Ok(Value::Array(items)) => {
                !items.is_empty() && items.iter().all(|v| v.is_object() || v.is_array())
            }
            Ok(Value::Object(map)) => !map.is_empty(),
            _ => false,
        }
    }

    fn deserialize(&self, raw: &[u8], _options: &ReadOptions) -> TabularResult<Dataset> {
        let text = decode_text(self.id(), raw)?;
        let value: Value =
            serde_saphyr::from_str(text).map_err(|e| TabularError::malformed(self.id(), e.to_string()))?;
        dataset_from_value(self.id(), value)
    }

    fn serialize(&self, dataset: &Dataset) -> TabularResult<Exported> {
        ensure_finite(self.id(), dataset)?;
        serde_saphyr::to_string(&DatasetShape(dataset))
            .map(Exported::Text)
            .map_err(|e| TabularError::unsupported_cell(self.id(), e.to_string()))
    }
}
