//! Codec registry and format detection.
//!
//! A [`Registry`] keeps codecs in detection order: grouped by [`DetectionTier`], in
//! registration order within a tier. [`Registry::detect`] walks that order and returns the
//! first codec whose [`Codec::can_parse`] accepts the input.
//!
//! The default order is `xls, xlsx, ods, json, html, yaml, tsv, csv`.

use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::error::{TabularError, TabularResult};
use crate::formats::{Codec, DelimitedCodec, DetectionTier, HtmlCodec, JsonCodec, YamlCodec};
#[cfg(feature = "excel")]
use crate::formats::{OdsCodec, XlsCodec, XlsxCodec};

static GLOBAL: LazyLock<Arc<Registry>> = LazyLock::new(|| Arc::new(Registry::with_defaults()));

/// Ordered set of codecs.
#[derive(Clone, Default)]
pub struct Registry {
    codecs: Vec<Arc<dyn Codec>>,
}

impl Registry {
    /// A registry with no codecs.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry with every built-in codec enabled by the crate features.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        #[cfg(feature = "excel")]
        {
            registry.register(Arc::new(XlsCodec));
            registry.register(Arc::new(XlsxCodec));
            registry.register(Arc::new(OdsCodec));
        }
        registry.register(Arc::new(JsonCodec));
        registry.register(Arc::new(HtmlCodec));
        registry.register(Arc::new(YamlCodec));
        registry.register(Arc::new(DelimitedCodec::tsv()));
        registry.register(Arc::new(DelimitedCodec::csv()));
        registry
    }

    /// Process-wide default registry (read-only).
    pub fn global() -> Arc<Registry> {
        Arc::clone(&GLOBAL)
    }

    /// Add a codec. A codec with the same id replaces the earlier one, taking its new tier's
    /// place at the end of that tier.
    pub fn register(&mut self, codec: Arc<dyn Codec>) {
        let id = codec.id();
        self.codecs.retain(|c| !c.id().eq_ignore_ascii_case(id));
        self.codecs.push(codec);
        // Stable: registration order is kept within a tier.
        self.codecs.sort_by_key(|c| c.tier());
    }

    /// Codec by id (case-insensitive).
    pub fn get(&self, id: &str) -> Option<Arc<dyn Codec>> {
        self.codecs
            .iter()
            .find(|c| c.id().eq_ignore_ascii_case(id))
            .cloned()
    }

    /// First codec (in detection order) claiming the file extension `ext` (with or without a
    /// leading dot, case-insensitive).
    pub fn by_extension(&self, ext: &str) -> Option<Arc<dyn Codec>> {
        let ext = ext.trim_start_matches('.');
        self.codecs
            .iter()
            .find(|c| c.extensions().iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .cloned()
    }

    /// Registered ids in detection order.
    pub fn ids(&self) -> Vec<&'static str> {
        self.codecs.iter().map(|c| c.id()).collect()
    }

    /// Codecs in detection order.
    pub fn codecs(&self) -> impl Iterator<Item = &Arc<dyn Codec>> {
        self.codecs.iter()
    }

    /// Id of the codec that should read `raw`.
    ///
    /// A filename hint is tried first, but only trusted when its codec confirms the content
    /// and is not a [`DetectionTier::Fallback`] codec. Otherwise the first codec in detection
    /// order whose sniff accepts the content wins.
    ///
    /// Fails with [`TabularError::UnsupportedFormat`] when nothing matches.
    pub fn detect(&self, raw: &[u8], filename_hint: Option<&str>) -> TabularResult<&'static str> {
        if let Some(codec) = filename_hint.and_then(extension_of).and_then(|ext| self.by_extension(ext)) {
            if codec.tier() != DetectionTier::Fallback && codec.can_parse(raw) {
                return Ok(codec.id());
            }
        }
        self.codecs
            .iter()
            .find(|c| c.can_parse(raw))
            .map(|c| c.id())
            .ok_or(TabularError::UnsupportedFormat)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("ids", &self.ids()).finish()
    }
}

/// Extension of a file name or path (`"data/People.XLSX"` -> `"XLSX"`).
fn extension_of(hint: &str) -> Option<&str> {
    let name = hint.rsplit(['/', '\\']).next().unwrap_or(hint);
    // A bare extension ("csv") is accepted as a hint too.
    let ext = name.rsplit_once('.').map_or(name, |(_, ext)| ext);
    (!ext.is_empty()).then_some(ext)
}
