//! The `Discard` leaf appender (spec.md §4.3): unconditionally succeeds and
//! drops the payload.

use crate::entry::LogEntry;
use crate::error::AppenderResult;
use crate::Appender;

/// An appender that accepts and discards every payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl Appender for Discard {
    fn write(&self, payload: &[u8], _entry: &LogEntry) -> AppenderResult<usize> {
        Ok(payload.len())
    }

    fn sync(&self) -> AppenderResult<()> {
        Ok(())
    }

    fn is_synchronized(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_reports_full_length_without_storing_anything() {
        let entry = LogEntry::new(slog::Level::Info, "test", "hi");
        assert_eq!(Discard.write(b"abcdef", &entry).unwrap(), 6);
        assert!(Discard.is_synchronized());
        Discard.sync().unwrap();
    }
}
