//! Seam back into `slog::Drain` (spec.md §4.1), pairing an
//! [`Encoder`](crate::encoder::Encoder) with an [`Appender`]. Grounded in
//! the teacher's `MutexDrain`, which wraps one `Drain` and forwards `log`
//! calls to it; this wraps an `Appender` instead and does the
//! record-to-bytes step itself, since an `Appender` consumes bytes rather
//! than another `Drain`. Field capture is adapted from `slog-async`'s
//! `ToSendSerializer` (`examples/other_examples` vendor copy): the same
//! "implement `Serializer`, fold each `emit_*` into an owned value" idiom,
//! simplified to build a flat `Vec<(String, FieldValue)>` instead of a
//! chain of boxed `KV`s, since `Encoder` only needs the flattened list.

use crate::entry::{FieldValue, LogEntry};
use crate::encoder::Encoder;
use crate::error::AppenderError;
use crate::Appender;
use slog::{Key, OwnedKVList, Record, Serializer, KV};
use std::fmt;

/// Adapts an `(Encoder, Appender)` pair into a `slog::Drain`.
///
/// On every `log` call, the record's own key-values and the logger's owned
/// key-values are collected, the pair is encoded via `E`, and the resulting
/// bytes are handed to `A`. Encode or write failures are reported as the
/// `Drain`'s `Err`; by policy (spec.md §4.1) an error at `Critical` level or
/// above additionally triggers a best-effort `sync()` before returning, so
/// an about-to-crash process has the best chance of having flushed it.
pub struct SlogBridge<E, A> {
    encoder: E,
    appender: A,
}

impl<E: Encoder, A: Appender> SlogBridge<E, A> {
    /// Pair `encoder` and `appender` into a `Drain`.
    pub fn new(encoder: E, appender: A) -> Self {
        SlogBridge { encoder, appender }
    }
}

impl<E: Encoder, A: Appender> slog::Drain for SlogBridge<E, A> {
    type Ok = ();
    type Err = AppenderError;

    fn log(&self, record: &Record, logger_values: &OwnedKVList) -> Result<(), AppenderError> {
        let mut fields = Vec::new();
        let mut collector = FieldCollector(&mut fields);
        logger_values
            .serialize(record, &mut collector)
            .map_err(|e| AppenderError::EnvelopeFailed(e.to_string()))?;
        record
            .kv()
            .serialize(record, &mut collector)
            .map_err(|e| AppenderError::EnvelopeFailed(e.to_string()))?;

        let entry = LogEntry {
            level: record.level(),
            logger: record.module().to_string(),
            message: fmt::format(*record.msg()),
            timestamp: std::time::SystemTime::now(),
            caller: Some(crate::entry::CallerInfo {
                file: record.file(),
                line: record.line(),
            }),
        };

        let mut payload = Vec::new();
        let result = self
            .encoder
            .encode(&entry, &fields, &mut payload)
            .and_then(|()| self.appender.write(&payload, &entry).map(|_| ()));

        if result.is_err() && record.level().is_at_least(slog::Level::Critical) {
            let _ = self.appender.sync();
        }
        result
    }
}

struct FieldCollector<'a>(&'a mut Vec<(String, FieldValue)>);

impl<'a> FieldCollector<'a> {
    fn push(&mut self, key: Key, value: FieldValue) {
        self.0.push((key.to_string(), value));
    }
}

impl<'a> Serializer for FieldCollector<'a> {
    fn emit_bool(&mut self, key: Key, val: bool) -> slog::Result {
        self.push(key, FieldValue::Bool(val));
        Ok(())
    }
    fn emit_unit(&mut self, key: Key) -> slog::Result {
        self.push(key, FieldValue::Str("()".into()));
        Ok(())
    }
    fn emit_none(&mut self, key: Key) -> slog::Result {
        self.push(key, FieldValue::Str("none".into()));
        Ok(())
    }
    fn emit_char(&mut self, key: Key, val: char) -> slog::Result {
        self.push(key, FieldValue::Str(val.to_string()));
        Ok(())
    }
    fn emit_u8(&mut self, key: Key, val: u8) -> slog::Result {
        self.push(key, FieldValue::UInt(val as u64));
        Ok(())
    }
    fn emit_i8(&mut self, key: Key, val: i8) -> slog::Result {
        self.push(key, FieldValue::Int(val as i64));
        Ok(())
    }
    fn emit_u16(&mut self, key: Key, val: u16) -> slog::Result {
        self.push(key, FieldValue::UInt(val as u64));
        Ok(())
    }
    fn emit_i16(&mut self, key: Key, val: i16) -> slog::Result {
        self.push(key, FieldValue::Int(val as i64));
        Ok(())
    }
    fn emit_u32(&mut self, key: Key, val: u32) -> slog::Result {
        self.push(key, FieldValue::UInt(val as u64));
        Ok(())
    }
    fn emit_i32(&mut self, key: Key, val: i32) -> slog::Result {
        self.push(key, FieldValue::Int(val as i64));
        Ok(())
    }
    fn emit_f32(&mut self, key: Key, val: f32) -> slog::Result {
        self.push(key, FieldValue::Float(val as f64));
        Ok(())
    }
    fn emit_u64(&mut self, key: Key, val: u64) -> slog::Result {
        self.push(key, FieldValue::UInt(val));
        Ok(())
    }
    fn emit_i64(&mut self, key: Key, val: i64) -> slog::Result {
        self.push(key, FieldValue::Int(val));
        Ok(())
    }
    fn emit_f64(&mut self, key: Key, val: f64) -> slog::Result {
        self.push(key, FieldValue::Float(val));
        Ok(())
    }
    fn emit_usize(&mut self, key: Key, val: usize) -> slog::Result {
        self.push(key, FieldValue::UInt(val as u64));
        Ok(())
    }
    fn emit_isize(&mut self, key: Key, val: isize) -> slog::Result {
        self.push(key, FieldValue::Int(val as i64));
        Ok(())
    }
    fn emit_str(&mut self, key: Key, val: &str) -> slog::Result {
        self.push(key, FieldValue::Str(val.to_owned()));
        Ok(())
    }
    fn emit_arguments(&mut self, key: Key, val: &fmt::Arguments) -> slog::Result {
        self.push(key, FieldValue::Str(fmt::format(*val)));
        Ok(())
    }
}
