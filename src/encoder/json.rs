//! Newline-delimited JSON encoder, mirroring the shape `slog-json` (a
//! teacher dev-dependency) produces, but built on our own `Encoder` trait
//! instead of `slog::Drain` directly.

use crate::entry::{FieldValue, LogEntry};
use crate::error::AppenderResult;
use serde_json::{Map, Value};

use super::Encoder;

/// Encodes each record as one line of JSON: `ts`, `level`, `logger`, `msg`
/// plus the structured fields, flattened into the same object.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    fn encode(
        &self,
        entry: &LogEntry,
        fields: &[(String, FieldValue)],
        output: &mut Vec<u8>,
    ) -> AppenderResult<()> {
        let time: chrono::DateTime<chrono::Utc> = entry.timestamp.into();
        let mut obj = Map::new();
        obj.insert(
            "ts".into(),
            Value::String(time.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
        );
        obj.insert("level".into(), Value::String(entry.level.as_str().into()));
        obj.insert("logger".into(), Value::String(entry.logger.clone()));
        obj.insert("msg".into(), Value::String(entry.message.clone()));
        for (key, value) in fields {
            obj.insert(key.clone(), to_json_value(value));
        }
        serde_json::to_writer(&mut *output, &Value::Object(obj))
            .map_err(|e| crate::error::AppenderError::EnvelopeFailed(e.to_string()))?;
        output.push(b'\n');
        Ok(())
    }
}

fn to_json_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Str(s) => Value::String(s.clone()),
        FieldValue::Int(i) => Value::from(*i),
        FieldValue::UInt(u) => Value::from(*u),
        FieldValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        FieldValue::Bool(b) => Value::Bool(*b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_one_json_object_per_line() {
        let entry = LogEntry::new(slog::Level::Info, "svc", "started");
        let fields = vec![("port".to_string(), FieldValue::UInt(8080))];
        let mut out = Vec::new();
        JsonEncoder.encode(&entry, &fields, &mut out).unwrap();
        assert_eq!(out.pop(), Some(b'\n'));
        let parsed: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed["msg"], "started");
        assert_eq!(parsed["port"], 8080);
    }
}
