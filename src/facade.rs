//! Load and export entry points.
//!
//! Most callers use the free functions [`load`] / [`export`] (or [`Dataset::load`] /
//! [`Dataset::export`]), which run against [`Registry::global`]. Build a [`Tabular`] to use a
//! custom registry, to attach an [`Observer`], or to pass [`LoadOptions`].
//!
//! When an observer is configured, every operation reports:
//!
//! - `on_success` with row/column stats
//! - `on_failure` with a severity computed by [`severity_for_error`]
//! - `on_alert` when that severity is >= the alert threshold (default [`Severity::Critical`])

use std::fmt;
use std::sync::Arc;

use crate::dataset::Dataset;
use crate::error::{TabularError, TabularResult};
use crate::formats::{Exported, ReadOptions};
use crate::observability::{severity_for_error, EventContext, EventStats, Observer, Operation, Severity};
use crate::registry::Registry;
use crate::types::Schema;

/// Options controlling [`Tabular::load_with`].
///
/// Use [`Default`] for common cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Skip detection and read with this codec id. An unregistered id fails with
    /// [`TabularError::UnknownFormat`].
    pub format: Option<String>,
    /// File name (or bare extension) used as a detection hint.
    pub filename_hint: Option<String>,
    /// Treat the first row as headers (CSV, TSV, HTML and spreadsheets).
    pub headers: bool,
    /// Coerce columns after loading.
    pub schema: Option<Schema>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            format: None,
            filename_hint: None,
            headers: true,
            schema: None,
        }
    }
}

impl LoadOptions {
    /// Default options with a filename hint.
    pub fn with_hint(filename_hint: impl Into<String>) -> Self {
        Self {
            filename_hint: Some(filename_hint.into()),
            ..Self::default()
        }
    }
}

/// Load/export facade over a [`Registry`].
#[derive(Clone)]
pub struct Tabular {
    registry: Arc<Registry>,
    observer: Option<Arc<dyn Observer>>,
    alert_at_or_above: Severity,
}

impl fmt::Debug for Tabular {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tabular")
            .field("registry", &self.registry)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for Tabular {
    fn default() -> Self {
        Self {
            registry: Registry::global(),
            observer: None,
            alert_at_or_above: Severity::Critical,
        }
    }
}

impl Tabular {
    /// A facade over the global registry, without an observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `registry` instead of the global one.
    pub fn with_registry(mut self, registry: impl Into<Arc<Registry>>) -> Self {
        self.registry = registry.into();
        self
    }

    /// Report outcomes to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Severity at or above which `on_alert` is invoked.
    pub fn with_alert_threshold(mut self, severity: Severity) -> Self {
        self.alert_at_or_above = severity;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Detect the format of `raw` and read it.
    ///
    /// # Examples
    ///
    /// ```
    /// use tabular_interchange::Tabular;
    ///
    /// # fn main() -> Result<(), tabular_interchange::TabularError> {
    /// let raw = b"Name,Age,City,Phone\r\nAlice,24,New York,+1-212-555-0187\r\n";
    /// let ds = Tabular::new().load(raw, Some("people.csv"))?;
    /// for row in ds.to_dicts() {
    ///     println!("{} {}", row["Name"], row["Phone"]);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn load(&self, raw: &[u8], filename_hint: Option<&str>) -> TabularResult<Dataset> {
        self.load_with(
            raw,
            &LoadOptions {
                filename_hint: filename_hint.map(str::to_string),
                ..LoadOptions::default()
            },
        )
    }

    /// Read `raw` according to `options`.
    ///
    /// # Examples
    ///
    /// ## Force a format, then type the columns
    ///
    /// ```
    /// use tabular_interchange::{ColumnType, Field, LoadOptions, Schema, Tabular};
    ///
    /// # fn main() -> Result<(), tabular_interchange::TabularError> {
    /// let opts = LoadOptions {
    ///     format: Some("csv".to_string()),
    ///     ..Default::default()
    /// };
    /// let mut ds = Tabular::new().load_with(b"id,active\n1,yes\n2,no\n", &opts)?;
    /// ds.apply_schema(&Schema::new(vec![
    ///     Field::new("id", ColumnType::Number),
    ///     Field::new("active", ColumnType::Boolean),
    /// ]))?;
    /// assert_eq!(ds.row(1).and_then(|r| r[1].as_bool()), Some(false));
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// ## Observability (stderr logging + alert threshold)
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use tabular_interchange::observability::{Severity, StdErrObserver};
    /// use tabular_interchange::{Tabular, TabularError};
    ///
    /// let tabular = Tabular::new()
    ///     .with_observer(Arc::new(StdErrObserver))
    ///     .with_alert_threshold(Severity::Warning);
    ///
    /// // Unrecognized content is a Warning, so this also triggers `on_alert`.
    /// let err = tabular.load(b"", None).unwrap_err();
    /// assert!(matches!(err, TabularError::UnsupportedFormat));
    /// ```
    pub fn load_with(&self, raw: &[u8], options: &LoadOptions) -> TabularResult<Dataset> {
        let mut ctx = EventContext {
            operation: Operation::Load,
            format: options.format.clone(),
            filename_hint: options.filename_hint.clone(),
        };

        let result = self.load_inner(raw, options, &mut ctx);
        self.report(&ctx, result.as_ref().map(stats));
        result
    }

    fn load_inner(&self, raw: &[u8], options: &LoadOptions, ctx: &mut EventContext) -> TabularResult<Dataset> {
        let codec = match options.format.as_deref() {
            Some(id) => self
                .registry
                .get(id)
                .ok_or_else(|| TabularError::UnknownFormat(id.to_string()))?,
            None => {
                let id = self.registry.detect(raw, options.filename_hint.as_deref())?;
                self.registry
                    .get(id)
                    .ok_or_else(|| TabularError::UnknownFormat(id.to_string()))?
            }
        };
        ctx.format = Some(codec.id().to_string());

        let mut dataset = codec.deserialize(raw, &ReadOptions { headers: options.headers })?;
        if let Some(schema) = &options.schema {
            dataset.apply_schema(schema)?;
        }
        Ok(dataset)
    }

    /// Serialize `dataset` with the codec registered as `format` (case-insensitive).
    ///
    /// Fails with [`TabularError::UnknownFormat`] for unregistered ids.
    ///
    /// # Examples
    ///
    /// ```
    /// use tabular_interchange::{Cell, Dataset, Tabular};
    ///
    /// # fn main() -> Result<(), tabular_interchange::TabularError> {
    /// let mut ds = Dataset::with_headers(["Name", "Active"]);
    /// ds.append_row([Cell::from("Alice"), Cell::from(true)])?;
    /// let out = Tabular::new().export(&ds, "csv")?;
    /// assert_eq!(out.as_text(), Some("Name,Active\r\nAlice,True\r\n"));
    /// # Ok(())
    /// # }
    /// ```
    pub fn export(&self, dataset: &Dataset, format: &str) -> TabularResult<Exported> {
        let ctx = EventContext {
            operation: Operation::Export,
            format: Some(format.to_string()),
            filename_hint: None,
        };

        let result = self
            .registry
            .get(format)
            .ok_or_else(|| TabularError::UnknownFormat(format.to_string()))
            .and_then(|codec| codec.serialize(dataset));
        self.report(&ctx, result.as_ref().map(|_| stats(dataset)));
        result
    }

    fn report(&self, ctx: &EventContext, outcome: Result<EventStats, &TabularError>) {
        let Some(obs) = self.observer.as_ref() else {
            return;
        };
        match outcome {
            Ok(stats) => obs.on_success(ctx, stats),
            Err(e) => {
                let sev = severity_for_error(e);
                obs.on_failure(ctx, sev, e);
                if sev >= self.alert_at_or_above {
                    obs.on_alert(ctx, sev, e);
                }
            }
        }
    }
}

fn stats(dataset: &Dataset) -> EventStats {
    EventStats {
        rows: dataset.row_count(),
        columns: dataset.column_count(),
    }
}

/// Detect the format of `raw` and read it with the global registry.
pub fn load(raw: &[u8], filename_hint: Option<&str>) -> TabularResult<Dataset> {
    Tabular::default().load(raw, filename_hint)
}

/// Serialize `dataset` as `format` with the global registry.
pub fn export(dataset: &Dataset, format: &str) -> TabularResult<Exported> {
    Tabular::default().export(dataset, format)
}

impl Dataset {
    /// Shorthand for [`load`].
    pub fn load(raw: &[u8], filename_hint: Option<&str>) -> TabularResult<Dataset> {
        load(raw, filename_hint)
    }

    /// Shorthand for [`export`].
    pub fn export(&self, format: &str) -> TabularResult<Exported> {
        export(self, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Cell, ColumnType, Field};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        successes: Mutex<Vec<(EventContext, EventStats)>>,
        failures: Mutex<Vec<Severity>>,
        alerts: Mutex<Vec<Severity>>,
    }

    impl Observer for Recording {
        fn on_success(&self, ctx: &EventContext, stats: EventStats) {
            self.successes.lock().unwrap().push((ctx.clone(), stats));
        }

        fn on_failure(&self, _ctx: &EventContext, severity: Severity, _error: &TabularError) {
            self.failures.lock().unwrap().push(severity);
        }

        fn on_alert(&self, _ctx: &EventContext, severity: Severity, _error: &TabularError) {
            self.alerts.lock().unwrap().push(severity);
        }
    }

    #[test]
    fn detected_format_is_reported() {
        let obs = Arc::new(Recording::default());
        let tabular = Tabular::new().with_observer(obs.clone());
        tabular.load(b"[{\"a\": 1}, {\"a\": 2}]", Some("x.csv")).unwrap();

        let successes = obs.successes.lock().unwrap();
        let (ctx, stats) = &successes[0];
        assert_eq!(ctx.format.as_deref(), Some("json"));
        assert_eq!(ctx.filename_hint.as_deref(), Some("x.csv"));
        assert_eq!(*stats, EventStats { rows: 2, columns: 1 });
    }

    #[test]
    fn unknown_export_format_alerts_at_default_threshold() {
        let obs = Arc::new(Recording::default());
        let tabular = Tabular::new().with_observer(obs.clone());
        let err = tabular.export(&Dataset::new(), "pdf").unwrap_err();
        assert!(matches!(err, TabularError::UnknownFormat(ref id) if id == "pdf"));
        assert_eq!(*obs.failures.lock().unwrap(), [Severity::Critical]);
        assert_eq!(*obs.alerts.lock().unwrap(), [Severity::Critical]);
    }

    #[test]
    fn forced_format_skips_detection() {
        // Valid JSON, but read as CSV on request.
        let opts = LoadOptions {
            format: Some("CSV".to_string()),
            headers: false,
            ..Default::default()
        };
        let ds = Tabular::new().load_with(b"[1]", &opts).unwrap();
        assert_eq!(ds.headers(), None);
        assert_eq!(ds.rows(), [vec![Cell::from("[1]")]]);

        let unknown = LoadOptions {
            format: Some("pdf".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            Tabular::new().load_with(b"a,b\n", &unknown),
            Err(TabularError::UnknownFormat(_))
        ));
    }

    #[test]
    fn schema_is_applied_after_load() {
        let opts = LoadOptions {
            schema: Some(Schema::new(vec![Field::new("Age", ColumnType::Number)])),
            ..Default::default()
        };
        let ds = Tabular::new().load_with(b"Name,Age\nAlice,24\n", &opts).unwrap();
        assert_eq!(ds.row(0).unwrap()[1], Cell::from(24));

        let bad = LoadOptions {
            schema: Some(Schema::new(vec![Field::new("Age", ColumnType::Boolean)])),
            ..Default::default()
        };
        assert!(matches!(
            Tabular::new().load_with(b"Name,Age\nAlice,24\n", &bad),
            Err(TabularError::ParseError { .. })
        ));
    }

    #[test]
    fn custom_registry_limits_formats() {
        let mut registry = Registry::empty();
        registry.register(Arc::new(crate::formats::JsonCodec));
        let tabular = Tabular::new().with_registry(registry);
        assert!(matches!(
            tabular.load(b"a,b\n1,2\n", None),
            Err(TabularError::UnsupportedFormat)
        ));
        assert!(tabular.export(&Dataset::new(), "csv").is_err());
        assert_eq!(tabular.export(&Dataset::new(), "json").unwrap().as_text(), Some("[]"));
    }
}
