//! Composable appenders (byte sinks) for `slog`.
//!
//! An [`Appender`] is the unit this crate builds around: something that
//! accepts an already-encoded record and puts it somewhere. Appenders
//! compose — [`fallback::Fallback`] chains two of them, [`enveloping::Enveloping`]
//! frames bytes before handing them to one, [`async_appender::AsyncAppender`]
//! decouples a slow one from the calling thread — so a deployment is built
//! by nesting a handful of small pieces rather than writing a bespoke sink.
//!
//! [`bridge::SlogBridge`] is the seam back into `slog::Drain`, pairing an
//! [`encoder::Encoder`] with an `Appender` to produce something `slog`
//! itself can log through.

pub mod async_appender;
pub mod bridge;
pub mod discard;
pub mod encoder;
pub mod entry;
pub mod enveloping;
pub mod error;
pub mod fallback;
pub mod pool;
pub mod sink;
#[cfg(feature = "testkit")]
pub mod testkit;
pub mod tcp;
pub mod writer;

pub use entry::{CallerInfo, FieldValue, LogEntry};
pub use error::{AppenderError, AppenderResult};

/// A sink that accepts encoded log records.
///
/// Implementations must not retain `payload` past the call — callers are
/// free to reuse or release the backing buffer the instant `write` returns.
/// `Appender`s are shared across threads (the async queue's worker, the TCP
/// monitor, the calling thread doing a direct write), so every
/// implementation must be `Send + Sync`.
pub trait Appender: Send + Sync {
    /// Hand `payload` (the already-encoded record) to this sink. Returns the
    /// number of bytes accepted, which for composites reflects only the step
    /// this appender itself performed (e.g. [`async_appender::AsyncAppender::write`]
    /// reports the enqueue, not eventual delivery).
    fn write(&self, payload: &[u8], entry: &LogEntry) -> AppenderResult<usize>;

    /// Flush any buffering down to durable storage or the wire, to the
    /// extent this appender is able to.
    fn sync(&self) -> AppenderResult<()>;

    /// `true` if concurrent `write`/`sync` calls on this appender are safe
    /// without an external lock. Leaves backed by an OS file descriptor
    /// return `true` (the descriptor locks internally); most composites
    /// inherit this from the children they wrap. Callers composing a
    /// non-synchronized sink with concurrent producers must add their own
    /// locking.
    fn is_synchronized(&self) -> bool;
}

impl<A: Appender + ?Sized> Appender for Box<A> {
    fn write(&self, payload: &[u8], entry: &LogEntry) -> AppenderResult<usize> {
        (**self).write(payload, entry)
    }
    fn sync(&self) -> AppenderResult<()> {
        (**self).sync()
    }
    fn is_synchronized(&self) -> bool {
        (**self).is_synchronized()
    }
}

impl<A: Appender + ?Sized> Appender for std::sync::Arc<A> {
    fn write(&self, payload: &[u8], entry: &LogEntry) -> AppenderResult<usize> {
        (**self).write(payload, entry)
    }
    fn sync(&self) -> AppenderResult<()> {
        (**self).sync()
    }
    fn is_synchronized(&self) -> bool {
        (**self).is_synchronized()
    }
}
