//! The byte-sink collaborator interface (spec.md §6): a synchronizable byte
//! destination `Writer` wraps.

use std::fs::File;
use std::io::{self, Stderr, Stdout, Write};
use std::sync::{Arc, Mutex};

/// A destination `Writer` can forward bytes to.
pub trait ByteSink: Send + Sync {
    /// Write the full buffer, returning the number of bytes written.
    fn write_bytes(&self, buf: &[u8]) -> io::Result<usize>;
    /// Flush buffered data, if any.
    fn sync(&self) -> io::Result<()>;
    /// Whether concurrent `write_bytes`/`sync` calls are safe without an
    /// external lock. Sinks backed by an OS file descriptor lock
    /// internally and so report `true`.
    fn is_synchronized(&self) -> bool {
        true
    }
}

impl ByteSink for File {
    fn write_bytes(&self, buf: &[u8]) -> io::Result<usize> {
        (&*self).write(buf)
    }

    fn sync(&self) -> io::Result<()> {
        self.sync_data()
    }
}

impl ByteSink for Stdout {
    fn write_bytes(&self, buf: &[u8]) -> io::Result<usize> {
        self.lock().write(buf)
    }

    fn sync(&self) -> io::Result<()> {
        Ok(())
    }
}

impl ByteSink for Stderr {
    fn write_bytes(&self, buf: &[u8]) -> io::Result<usize> {
        self.lock().write(buf)
    }

    fn sync(&self) -> io::Result<()> {
        Ok(())
    }
}

/// A `Vec<u8>` behind a mutex, used by tests to capture what an appender
/// tree wrote. Synchronized because access is mutex-guarded.
impl ByteSink for Mutex<Vec<u8>> {
    fn write_bytes(&self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "poisoned sink mutex"))?;
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn sync(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Delegates through the `Arc`, so a sink can be shared between the
/// `Appender` that writes to it and a test (or caller) that wants to read
/// its contents back afterward.
impl<T: ByteSink + ?Sized> ByteSink for Arc<T> {
    fn write_bytes(&self, buf: &[u8]) -> io::Result<usize> {
        (**self).write_bytes(buf)
    }

    fn sync(&self) -> io::Result<()> {
        (**self).sync()
    }

    fn is_synchronized(&self) -> bool {
        (**self).is_synchronized()
    }
}
