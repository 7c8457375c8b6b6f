//! Observer hooks for load/export outcomes.
//!
//! The [`crate::facade::Tabular`] facade reports every operation to an optional
//! [`Observer`]: `on_success` with [`EventStats`], `on_failure` with a [`Severity`] computed by
//! [`severity_for_error`], and `on_alert` when that severity reaches the configured threshold.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::{json, Value};

use crate::error::TabularError;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational event.
    Info,
    /// Content the engine does not recognize.
    Warning,
    /// The operation failed on bad content or an unrepresentable value.
    Error,
    /// Caller misuse (unknown format id, arity or index errors).
    Critical,
}

/// Which facade operation produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Raw content to [`crate::Dataset`].
    Load,
    /// [`crate::Dataset`] to a format.
    Export,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Export => "export",
        }
    }
}

/// Context about a load or export attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventContext {
    /// Operation kind.
    pub operation: Operation,
    /// Format id: the requested one for exports and forced loads, the detected one otherwise.
    /// `None` when detection failed.
    pub format: Option<String>,
    /// Filename hint passed to a load, if any.
    pub filename_hint: Option<String>,
}

/// Minimal stats reported on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventStats {
    /// Data rows (headers excluded).
    pub rows: usize,
    /// Columns.
    pub columns: usize,
}

/// Observer interface for facade outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait Observer: Send + Sync {
    /// Called when an operation succeeds.
    fn on_success(&self, _ctx: &EventContext, _stats: EventStats) {}

    /// Called when an operation fails.
    fn on_failure(&self, _ctx: &EventContext, _severity: Severity, _error: &TabularError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &EventContext, severity: Severity, error: &TabularError) {
        self.on_failure(ctx, severity, error)
    }
}

/// Severity of a failure.
///
/// Unrecognized content is a [`Severity::Warning`] (directory scans skip such files), bad
/// content and unrepresentable cells are [`Severity::Error`], and programmer errors are
/// [`Severity::Critical`].
pub fn severity_for_error(e: &TabularError) -> Severity {
    match e {
        TabularError::UnsupportedFormat => Severity::Warning,
        TabularError::MalformedInput { .. }
        | TabularError::UnsupportedCellType { .. }
        | TabularError::ParseError { .. }
        | TabularError::SchemaMismatch { .. } => Severity::Error,
        TabularError::UnknownFormat(_)
        | TabularError::WidthMismatch { .. }
        | TabularError::TypeError { .. }
        | TabularError::RowOutOfRange { .. }
        | TabularError::ColumnNotFound(_) => Severity::Critical,
    }
}

/// Forwards every load/export event to each wrapped observer, in order.
///
/// ```
/// use std::sync::Arc;
///
/// use tabular_interchange::observability::{CompositeObserver, FileObserver, StdErrObserver};
/// use tabular_interchange::Tabular;
///
/// let log = std::env::temp_dir().join("tabular-events.jsonl");
/// let observer = CompositeObserver::default()
///     .with(Arc::new(StdErrObserver))
///     .with(Arc::new(FileObserver::new(log)));
/// let tabular = Tabular::new().with_observer(Arc::new(observer));
/// # let _ = tabular;
/// ```
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn Observer>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn Observer>>) -> Self {
        Self { observers }
    }

    /// Append one more observer.
    pub fn with(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl FromIterator<Arc<dyn Observer>> for CompositeObserver {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Observer>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Observer for CompositeObserver {
    fn on_success(&self, ctx: &EventContext, stats: EventStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &EventContext, severity: Severity, error: &TabularError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &EventContext, severity: Severity, error: &TabularError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

impl fmt::Display for EventContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "op={} format={} hint={}",
            self.operation.as_str(),
            self.format.as_deref().unwrap_or("-"),
            self.filename_hint.as_deref().unwrap_or("-")
        )
    }
}

/// Logs events to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl Observer for StdErrObserver {
    fn on_success(&self, ctx: &EventContext, stats: EventStats) {
        eprintln!("[tabular][ok] {ctx} rows={} cols={}", stats.rows, stats.columns);
    }

    fn on_failure(&self, ctx: &EventContext, severity: Severity, error: &TabularError) {
        eprintln!("[tabular][{severity:?}] {ctx} err={error}");
    }

    fn on_alert(&self, ctx: &EventContext, severity: Severity, error: &TabularError) {
        eprintln!("[ALERT][tabular][{severity:?}] {ctx} err={error}");
    }
}

/// Appends one JSON object per event to a local log file (JSON lines).
///
/// Every record carries `ts` (unix seconds), `event` (`ok`, `fail` or `alert`), `op`, `format`
/// and `hint`; successes add `rows`/`cols`, failures add `severity` and `error`. Writes are
/// best-effort: a log file that cannot be opened or written is ignored.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn record(ctx: &EventContext, event: &str, details: Value) -> Value {
        let mut record = json!({
            "ts": Utc::now().timestamp(),
            "event": event,
            "op": ctx.operation.as_str(),
            "format": ctx.format,
            "hint": ctx.filename_hint,
        });
        if let (Value::Object(record), Value::Object(details)) = (&mut record, details) {
            record.extend(details);
        }
        record
    }

    fn append(&self, record: &Value) {
        // One writer at a time; lines never interleave.
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{record}");
        }
    }

    fn failure(&self, ctx: &EventContext, event: &str, severity: Severity, error: &TabularError) {
        self.append(&Self::record(
            ctx,
            event,
            json!({ "severity": format!("{severity:?}"), "error": error.to_string() }),
        ));
    }
}

impl Observer for FileObserver {
    fn on_success(&self, ctx: &EventContext, stats: EventStats) {
        self.append(&Self::record(
            ctx,
            "ok",
            json!({ "rows": stats.rows, "cols": stats.columns }),
        ));
    }

    fn on_failure(&self, ctx: &EventContext, severity: Severity, error: &TabularError) {
        self.failure(ctx, "fail", severity, error);
    }

    fn on_alert(&self, ctx: &EventContext, severity: Severity, error: &TabularError) {
        self.failure(ctx, "alert", severity, error);
    }
}
