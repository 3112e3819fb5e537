//! Pluggable record-to-bytes encoders (spec.md §6), the collaborator
//! [`Enveloping`](crate::enveloping::Enveloping) and
//! [`bridge::SlogBridge`](crate::bridge::SlogBridge) sit on either side of.
//! Grounded in how the teacher's `MutexDrain` stays generic over its wrapped
//! `Drain` rather than hardcoding a format — here the axis that varies is
//! the wire encoding instead of the sink.

#[cfg(feature = "json-encoder")]
pub mod json;

use crate::entry::{FieldValue, LogEntry};
use crate::error::AppenderResult;

#[cfg(feature = "json-encoder")]
pub use json::JsonEncoder;

/// Renders a [`LogEntry`] plus its structured fields into bytes appended to
/// `output`. Implementations must not truncate or clear `output` — callers
/// may be accumulating multiple records into one buffer.
pub trait Encoder: Send + Sync {
    /// Append the encoded form of `entry`/`fields` to `output`.
    fn encode(
        &self,
        entry: &LogEntry,
        fields: &[(String, FieldValue)],
        output: &mut Vec<u8>,
    ) -> AppenderResult<()>;
}

/// Human-readable `timestamp LEVEL logger: message key=value ...` encoder,
/// terminated with a newline. The default when no `*-encoder` feature is
/// selected.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineEncoder;

impl Encoder for LineEncoder {
    fn encode(
        &self,
        entry: &LogEntry,
        fields: &[(String, FieldValue)],
        output: &mut Vec<u8>,
    ) -> AppenderResult<()> {
        use std::io::Write;
        let time: chrono::DateTime<chrono::Utc> = entry.timestamp.into();
        write!(
            output,
            "{} {} {}: {}",
            time.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            entry.level.as_str(),
            entry.logger,
            entry.message
        )?;
        for (key, value) in fields {
            write!(output, " {}={}", key, format_value(value))?;
        }
        output.push(b'\n');
        Ok(())
    }
}

fn format_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Str(s) => s.clone(),
        FieldValue::Int(i) => i.to_string(),
        FieldValue::UInt(u) => u.to_string(),
        FieldValue::Float(f) => f.to_string(),
        FieldValue::Bool(b) => b.to_string(),
    }
}
