//! Leaf appender wrapping a [`ByteSink`] (spec.md §4.2).

use crate::entry::LogEntry;
use crate::error::AppenderResult;
use crate::sink::ByteSink;
use crate::Appender;

/// Non-actionable `errno`s that show up when `sync`ing a non-file
/// descriptor (pipes, character devices, sockets) and which carry no
/// useful information for the caller.
fn is_non_actionable(err: &std::io::Error) -> bool {
    match err.raw_os_error() {
        Some(code) => {
            code == libc::EINVAL
                || code == libc::ENOTSUP
                || code == libc::ENOTTY
                || code == libc::EBADF
        }
        None => false,
    }
}

/// Forwards `write` unchanged to an inner [`ByteSink`]; suppresses the
/// documented set of non-actionable OS errors on `sync`.
pub struct Writer<S: ByteSink> {
    sink: S,
}

impl<S: ByteSink> Writer<S> {
    /// Wrap `sink` in a `Writer` appender.
    pub fn new(sink: S) -> Self {
        Writer { sink }
    }
}

impl<S: ByteSink> Appender for Writer<S> {
    fn write(&self, payload: &[u8], _entry: &LogEntry) -> AppenderResult<usize> {
        Ok(self.sink.write_bytes(payload)?)
    }

    fn sync(&self) -> AppenderResult<()> {
        match self.sink.sync() {
            Ok(()) => Ok(()),
            Err(e) if is_non_actionable(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn is_synchronized(&self) -> bool {
        self.sink.is_synchronized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn write_forwards_bytes_unchanged() {
        let writer = Writer::new(Mutex::new(Vec::new()));
        let entry = LogEntry::new(slog::Level::Info, "test", "hi");
        let n = writer.write(b"hello", &entry).unwrap();
        assert_eq!(n, 5);
        let sink = writer.sink.lock().unwrap();
        assert_eq!(&**sink, b"hello");
    }

    #[test]
    fn sync_is_synchronized_for_mutex_sink() {
        let writer = Writer::new(Mutex::new(Vec::new()));
        assert!(writer.is_synchronized());
        writer.sync().unwrap();
    }
}
