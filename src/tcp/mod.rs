//! Single-connection, retry-with-backoff TCP writer with idle-read
//! monitoring (spec.md §4.6). Grounded in `tcpwriter/tcpwriter.go` of the
//! original source; `std::net::TcpStream`'s `set_write_timeout`/
//! `set_read_timeout` already take a relative `Duration`, so unlike the Go
//! original we don't need to track an absolute deadline per I/O call, only
//! the overall `write_timeout` budget.

mod monitor;

use crate::entry::LogEntry;
use crate::error::{AppenderError, AppenderResult};
use crate::Appender;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A connection `TcpAppender` can write to.
///
/// Methods take `&self` rather than the usual `&mut self` of
/// `std::io::Read`/`Write`, the same trick `std::net::TcpStream` itself
/// uses (`impl Read for &TcpStream`, `impl Write for &TcpStream`) so that
/// the writer and the idle-read monitor can each hold their own handle to
/// the same socket without fighting over a `&mut`.
pub trait Connection: Send {
    /// Read into `buf`, per `std::io::Read::read`.
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;
    /// Write from `buf`, per `std::io::Write::write`.
    fn write(&self, buf: &[u8]) -> io::Result<usize>;
    /// Set (or clear) the write timeout applied to subsequent writes.
    fn set_write_timeout(&self, dur: Option<Duration>) -> io::Result<()>;
    /// Set (or clear) the read timeout applied to subsequent reads.
    fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()>;
    /// Produce an independent handle to the same underlying connection,
    /// for the idle-read monitor to probe concurrently with the writer.
    fn try_clone(&self) -> io::Result<Box<dyn Connection>>;
    /// Best-effort shutdown of both halves of the connection.
    fn shutdown(&self);
    /// Expose the concrete `TcpStream`, if this connection is backed by
    /// one, so TCP-specific options (keepalive) can be configured.
    fn as_tcp(&self) -> Option<&TcpStream> {
        None
    }
}

impl Connection for TcpStream {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut r: &TcpStream = self;
        r.read(buf)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let mut w: &TcpStream = self;
        w.write(buf)
    }

    fn set_write_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
        TcpStream::set_write_timeout(self, dur)
    }

    fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, dur)
    }

    fn try_clone(&self) -> io::Result<Box<dyn Connection>> {
        Ok(Box::new(TcpStream::try_clone(self)?))
    }

    fn shutdown(&self) {
        let _ = TcpStream::shutdown(self, std::net::Shutdown::Both);
    }

    fn as_tcp(&self) -> Option<&TcpStream> {
        Some(self)
    }
}

fn enable_keepalive(tcp: &TcpStream, period: Duration) {
    let sock_ref = socket2::SockRef::from(tcp);
    let keepalive = socket2::TcpKeepalive::new().with_time(period);
    let _ = sock_ref.set_tcp_keepalive(&keepalive);
}

/// Factory for fresh connections, called whenever `TcpAppender` needs to
/// (re)connect.
pub type ConnectFn = dyn Fn() -> io::Result<Box<dyn Connection>> + Send + Sync;

/// Computes the backoff delay before the next connect/write retry, given
/// the 1-indexed retry attempt number.
pub type BackoffFn = dyn Fn(u64) -> Duration + Send + Sync;

/// Exponential backoff starting at 1s and doubling up to a 30s cap,
/// matching the default backoff table in spec.md §4.6:
/// `1→1s, 2→2s, 3→4s, 4→8s, 5→16s, ≥6→30s`.
pub fn default_backoff(attempt: u64) -> Duration {
    const MAX: Duration = Duration::from_secs(30);
    let exponent = attempt.saturating_sub(1).min(5) as u32;
    Duration::from_secs(1 << exponent).min(MAX)
}

/// Configuration for a [`TcpAppender`].
pub struct TcpConfig {
    /// Builds a new connection on (re)connect.
    pub connect: Arc<ConnectFn>,
    /// Per-attempt socket write deadline. Default 1s.
    pub write_deadline: Duration,
    /// Total wall-clock budget per `write` call. Default 5 minutes.
    pub write_timeout: Duration,
    /// Computes the delay between retries. Default [`default_backoff`].
    pub backoff_fn: Arc<BackoffFn>,
    /// Keepalive period set on connections that expose TCP options.
    /// Default 5s.
    pub keepalive_period: Duration,
}

impl TcpConfig {
    /// Start building a config around `connect`, with all other fields at
    /// their documented defaults.
    pub fn new(connect: Arc<ConnectFn>) -> Self {
        TcpConfig {
            connect,
            write_deadline: Duration::from_secs(1),
            write_timeout: Duration::from_secs(5 * 60),
            backoff_fn: Arc::new(default_backoff),
            keepalive_period: Duration::from_secs(5),
        }
    }
}

/// Reconnecting TCP leaf appender. Not thread-safe: exactly one producer at
/// a time, callers must serialize concurrent writers externally (spec.md
/// §4.6).
pub struct TcpAppender {
    config: TcpConfig,
    conn: Mutex<Option<Box<dyn Connection>>>,
    /// Generation number of the connection currently held. Stands in for
    /// the Go original's "compare the stale notification's conn against
    /// `w.conn`" check — comparing generation numbers instead of trait
    /// objects avoids requiring `Connection: PartialEq`.
    generation: Arc<AtomicU64>,
    retry_attempt: AtomicU64,
    stale_rx: Receiver<u64>,
    stale_tx: SyncSender<u64>,
}

impl TcpAppender {
    /// Build a `TcpAppender` from `config`.
    pub fn new(config: TcpConfig) -> Self {
        let (stale_tx, stale_rx) = sync_channel(1);
        TcpAppender {
            config,
            conn: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
            retry_attempt: AtomicU64::new(0),
            stale_rx,
            stale_tx,
        }
    }

    /// Close the current connection, if any. Idempotent.
    pub fn close(&self) {
        let mut conn = self.conn.lock().unwrap();
        if let Some(c) = conn.take() {
            c.shutdown();
        }
    }

    fn discard_if_stale(&self, conn: &mut Option<Box<dyn Connection>>) {
        let current = self.generation.load(Ordering::SeqCst);
        while let Ok(gen) = self.stale_rx.try_recv() {
            if gen == current {
                *conn = None;
                return;
            }
            // notification for an already-superseded generation; keep
            // draining in case more than one is queued.
        }
    }

    fn ensure_connected<'a>(
        &self,
        conn: &'a mut Option<Box<dyn Connection>>,
    ) -> io::Result<&'a dyn Connection> {
        self.discard_if_stale(conn);
        if conn.is_none() {
            let fresh = (self.config.connect)()?;
            if let Some(tcp) = fresh.as_tcp() {
                enable_keepalive(tcp, self.config.keepalive_period);
            }
            let my_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let probe = fresh.try_clone()?;
            monitor::spawn(probe, my_generation, self.generation.clone(), self.stale_tx.clone());
            *conn = Some(fresh);
        }
        Ok(conn.as_deref().expect("just ensured"))
    }

    fn attempt_write(&self, payload: &[u8]) -> io::Result<usize> {
        let mut conn_guard = self.conn.lock().unwrap();
        let write_result = {
            let conn = self.ensure_connected(&mut conn_guard)?;
            conn.set_write_timeout(Some(self.config.write_deadline))?;
            write_all(conn, payload)
        };
        if write_result.is_err() {
            if let Some(c) = conn_guard.take() {
                c.shutdown();
            }
        }
        write_result
    }

    /// Retry-with-backoff write, bounded by `write_timeout`.
    fn write_with_retry(&self, payload: &[u8]) -> AppenderResult<usize> {
        let deadline = Instant::now() + self.config.write_timeout;
        loop {
            match self.attempt_write(payload) {
                Ok(n) => {
                    self.retry_attempt.store(0, Ordering::SeqCst);
                    return Ok(n);
                }
                Err(_e) => {
                    let attempt = self.retry_attempt.fetch_add(1, Ordering::SeqCst) + 1;
                    let backoff = (self.config.backoff_fn)(attempt);
                    std::thread::sleep(backoff);
                    if Instant::now() > deadline {
                        // Report 0 even if partial bytes may have landed on
                        // the wire already (spec.md §4.6).
                        return Err(AppenderError::WriteTimeout);
                    }
                }
            }
        }
    }
}

fn write_all(conn: &dyn Connection, payload: &[u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < payload.len() {
        match conn.write(&payload[total..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "connection wrote zero bytes",
                ))
            }
            Ok(n) => total += n,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

impl Appender for TcpAppender {
    fn write(&self, payload: &[u8], _entry: &LogEntry) -> AppenderResult<usize> {
        self.write_with_retry(payload)
    }

    fn sync(&self) -> AppenderResult<()> {
        // Byte-stream sockets have no separate flush step beyond the
        // per-write loop already pushing every byte.
        Ok(())
    }

    fn is_synchronized(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct MockConnection {
        write_fn: Arc<dyn Fn(&[u8]) -> io::Result<usize> + Send + Sync>,
        write_calls: Arc<AtomicUsize>,
    }

    impl Connection for MockConnection {
        fn read(&self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::WouldBlock, "no data"))
        }
        fn write(&self, buf: &[u8]) -> io::Result<usize> {
            self.write_calls.fetch_add(1, Ordering::SeqCst);
            (self.write_fn)(buf)
        }
        fn set_write_timeout(&self, _dur: Option<Duration>) -> io::Result<()> {
            Ok(())
        }
        fn set_read_timeout(&self, _dur: Option<Duration>) -> io::Result<()> {
            Ok(())
        }
        fn try_clone(&self) -> io::Result<Box<dyn Connection>> {
            Ok(Box::new(MockConnection {
                write_fn: self.write_fn.clone(),
                write_calls: self.write_calls.clone(),
            }))
        }
        fn shutdown(&self) {}
    }

    #[test]
    fn default_backoff_matches_table() {
        assert_eq!(default_backoff(1), Duration::from_secs(1));
        assert_eq!(default_backoff(2), Duration::from_secs(2));
        assert_eq!(default_backoff(3), Duration::from_secs(4));
        assert_eq!(default_backoff(4), Duration::from_secs(8));
        assert_eq!(default_backoff(5), Duration::from_secs(16));
        assert_eq!(default_backoff(6), Duration::from_secs(30));
        assert_eq!(default_backoff(100), Duration::from_secs(30));
    }

    #[test]
    fn backoff_is_monotone_and_bounded() {
        let mut prev = Duration::from_secs(0);
        for attempt in 1..20 {
            let d = default_backoff(attempt);
            assert!(d >= Duration::from_secs(1));
            assert!(d <= Duration::from_secs(30));
            assert!(d >= prev);
            prev = d;
        }
    }

    #[test]
    fn write_timeout_never_reports_partial_bytes_written() {
        let write_calls = Arc::new(AtomicUsize::new(0));
        let calls = write_calls.clone();
        let always_fails: Arc<dyn Fn(&[u8]) -> io::Result<usize> + Send + Sync> =
            Arc::new(|_buf: &[u8]| Err(io::Error::new(io::ErrorKind::Other, "nope")));

        let connect_count = Arc::new(AtomicUsize::new(0));
        let connect_count2 = connect_count.clone();
        let config = TcpConfig {
            connect: Arc::new(move || {
                connect_count2.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(MockConnection {
                    write_fn: always_fails.clone(),
                    write_calls: calls.clone(),
                }) as Box<dyn Connection>)
            }),
            write_deadline: Duration::from_millis(10),
            write_timeout: Duration::from_millis(30),
            backoff_fn: Arc::new(|_attempt| Duration::from_millis(5)),
            keepalive_period: Duration::from_secs(5),
        };
        let appender = TcpAppender::new(config);
        let entry = LogEntry::new(slog::Level::Info, "t", "m");
        let result = appender.write(b"message", &entry);
        match result {
            Err(AppenderError::WriteTimeout) => {}
            other => panic!("expected WriteTimeout, got {:?}", other),
        }
        assert!(write_calls.load(Ordering::SeqCst) >= 1);
    }
}
