//! Wrapping sink that frames an encoded payload before delegating
//! (spec.md §4.4). Grounded in `appender/enveloping.go` /
//! `appender/enveloping_encoder.go` of the original source, adapted from an
//! `Encoder`-decorating design (the original wraps `zapcore.Encoder`) to a
//! buffer-to-buffer closure, since this crate's `Appender::write` already
//! receives encoded bytes.

use crate::entry::LogEntry;
use crate::error::{AppenderError, AppenderResult};
use crate::pool::{self, Pool};
use crate::Appender;
use std::sync::Arc;

/// A user-supplied framing callback: writes the on-wire representation of
/// `payload` into `output`.
pub type EnvelopeFn = dyn Fn(&[u8], &LogEntry, &mut Vec<u8>) -> AppenderResult<()> + Send + Sync;

/// Wraps an inner [`Appender`], pre/post-processing encoded bytes through
/// an [`EnvelopeFn`] before delegating.
pub struct Enveloping {
    inner: Box<dyn Appender>,
    env_fn: Arc<EnvelopeFn>,
    pool: Pool,
}

impl Enveloping {
    /// Wrap `inner`, framing every payload through `env_fn` first.
    pub fn new(inner: Box<dyn Appender>, env_fn: Arc<EnvelopeFn>) -> Self {
        Enveloping {
            inner,
            env_fn,
            pool: pool::global(),
        }
    }

    /// Convenience constructor: wraps `payload` as `prefix || payload || suffix`.
    pub fn prefix_suffix(
        inner: Box<dyn Appender>,
        prefix: impl Into<Vec<u8>>,
        suffix: impl Into<Vec<u8>>,
    ) -> Self {
        let prefix = prefix.into();
        let suffix = suffix.into();
        Enveloping::new(
            inner,
            Arc::new(move |payload, _entry, output| {
                output.extend_from_slice(&prefix);
                output.extend_from_slice(payload);
                output.extend_from_slice(&suffix);
                Ok(())
            }),
        )
    }

    /// The identity envelope: forwards the payload unchanged. Used to test
    /// invariant 6 (spec.md §8): `Enveloping` with an identity envelope is
    /// byte-equal to forwarding directly.
    pub fn identity(inner: Box<dyn Appender>) -> Self {
        Enveloping::new(
            inner,
            Arc::new(|payload, _entry, output| {
                output.extend_from_slice(payload);
                Ok(())
            }),
        )
    }
}

impl Appender for Enveloping {
    fn write(&self, payload: &[u8], entry: &LogEntry) -> AppenderResult<usize> {
        let mut output = self.pool.acquire();
        if let Err(e) = (self.env_fn)(payload, entry, &mut output) {
            // Failure in the envelope function is propagated; the inner
            // appender is not called. `output` is released on drop
            // regardless.
            return Err(e);
        }
        self.inner.write(output.as_slice(), entry)
    }

    fn sync(&self) -> AppenderResult<()> {
        self.inner.sync()
    }

    fn is_synchronized(&self) -> bool {
        self.inner.is_synchronized()
    }
}

/// Error helper for envelope functions that want to bail with a message.
pub fn envelope_error(msg: impl Into<String>) -> AppenderError {
    AppenderError::EnvelopeFailed(msg.into())
}
