use std::time::SystemTime;

/// Caller location attached to a [`LogEntry`], mirroring `zapcore.Entry`'s
/// `Caller` field in the original source this crate was distilled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerInfo {
    /// Source file of the log call site.
    pub file: &'static str,
    /// Line number of the log call site.
    pub line: u32,
}

/// Immutable metadata accompanying a write. The core treats `LogEntry` as
/// opaque: only `level` is ever consulted (for the sync-on-error policy in
/// the host framework integration, see spec.md §4.1).
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Severity of the record. Reuses `slog::Level` rather than a parallel
    /// enum since the crate already depends on `slog`.
    pub level: slog::Level,
    /// Name of the logger that produced this record.
    pub logger: String,
    /// Rendered message text.
    pub message: String,
    /// Wall-clock time the record was produced.
    pub timestamp: SystemTime,
    /// Call site, if the host framework captured one.
    pub caller: Option<CallerInfo>,
}

impl LogEntry {
    /// Build a `LogEntry` stamped with the current time and no caller info.
    pub fn new(level: slog::Level, logger: impl Into<String>, message: impl Into<String>) -> Self {
        LogEntry {
            level,
            logger: logger.into(),
            message: message.into(),
            timestamp: SystemTime::now(),
            caller: None,
        }
    }
}

/// One structured field value, used by the `Encoder` collaborator
/// (spec.md §6). Intentionally small: the appender core never inspects
/// these, it only carries them to the pluggable encoder.
#[derive(Debug, Clone)]
pub enum FieldValue {
    /// UTF-8 text.
    Str(String),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point.
    Float(f64),
    /// Boolean.
    Bool(bool),
}
