//! Test-only fault injection and a local TCP test server (feature
//! `testkit`). Grounded in `appender/chaos/*.go` (`BlockingSwitchable`,
//! `FailingSwitchable`) and `test_support/{mock_conn,local_tcp_server}.go`
//! of the original source.

use crate::entry::LogEntry;
use crate::error::{AppenderError, AppenderResult};
use crate::tcp::Connection;
use crate::Appender;
use std::io;
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Common interface of the chaos appenders: toggle a fault on and off
/// mid-test.
pub trait Switchable {
    /// Whether the fault is currently active.
    fn enabled(&self) -> bool;
    /// Activate the fault.
    fn enable(&self);
    /// Deactivate the fault.
    fn disable(&self);
}

/// Wraps an inner [`Appender`]; while broken, `write` blocks the calling
/// thread until [`fix`](Self::fix) is called, instead of failing outright.
/// Used to exercise backpressure (e.g. the async queue filling up because
/// its primary has stalled).
pub struct BlockingSwitchable {
    inner: Box<dyn Appender>,
    state: Mutex<bool>,
    condvar: Condvar,
}

impl BlockingSwitchable {
    /// Wrap `inner`; writes pass straight through until [`break_now`](Self::break_now)
    /// is called.
    pub fn new(inner: Box<dyn Appender>) -> Self {
        BlockingSwitchable {
            inner,
            state: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Start blocking every `write` call.
    pub fn break_now(&self) {
        *self.state.lock().unwrap() = true;
    }

    /// Stop blocking and wake every thread currently parked in `write`.
    pub fn fix(&self) {
        *self.state.lock().unwrap() = false;
        self.condvar.notify_all();
    }
}

impl Switchable for BlockingSwitchable {
    fn enabled(&self) -> bool {
        *self.state.lock().unwrap()
    }
    fn enable(&self) {
        self.break_now();
    }
    fn disable(&self) {
        self.fix();
    }
}

impl Appender for BlockingSwitchable {
    fn write(&self, payload: &[u8], entry: &LogEntry) -> AppenderResult<usize> {
        let mut broken = self.state.lock().unwrap();
        while *broken {
            broken = self.condvar.wait(broken).unwrap();
        }
        drop(broken);
        self.inner.write(payload, entry)
    }

    fn sync(&self) -> AppenderResult<()> {
        self.inner.sync()
    }

    fn is_synchronized(&self) -> bool {
        self.inner.is_synchronized()
    }
}

/// Wraps an inner [`Appender`]; while broken, every `write` fails
/// immediately with [`AppenderError::FailEnabled`] instead of reaching the
/// inner appender.
pub struct FailingSwitchable {
    inner: Box<dyn Appender>,
    enabled: Mutex<bool>,
}

impl FailingSwitchable {
    /// Wrap `inner`; writes pass straight through until
    /// [`break_now`](Self::break_now) is called.
    pub fn new(inner: Box<dyn Appender>) -> Self {
        FailingSwitchable {
            inner,
            enabled: Mutex::new(false),
        }
    }

    /// Start failing every `write` call.
    pub fn break_now(&self) {
        *self.enabled.lock().unwrap() = true;
    }

    /// Stop failing; `write` resumes delegating to the inner appender.
    pub fn fix(&self) {
        *self.enabled.lock().unwrap() = false;
    }
}

impl Switchable for FailingSwitchable {
    fn enabled(&self) -> bool {
        *self.enabled.lock().unwrap()
    }
    fn enable(&self) {
        self.break_now();
    }
    fn disable(&self) {
        self.fix();
    }
}

impl Appender for FailingSwitchable {
    fn write(&self, payload: &[u8], entry: &LogEntry) -> AppenderResult<usize> {
        if *self.enabled.lock().unwrap() {
            return Err(AppenderError::FailEnabled);
        }
        self.inner.write(payload, entry)
    }

    fn sync(&self) -> AppenderResult<()> {
        self.inner.sync()
    }

    fn is_synchronized(&self) -> bool {
        self.inner.is_synchronized()
    }
}

/// A [`Connection`] whose `read`/`write` behavior is supplied by closures,
/// for exercising [`TcpAppender`](crate::tcp::TcpAppender)'s retry and
/// staleness-detection logic without a real socket.
pub struct MockConnection {
    read_fn: Box<dyn Fn(&mut [u8]) -> io::Result<usize> + Send + Sync>,
    write_fn: Box<dyn Fn(&[u8]) -> io::Result<usize> + Send + Sync>,
}

impl MockConnection {
    /// A connection whose reads block forever (simulating an idle,
    /// still-healthy socket) and whose writes always succeed.
    pub fn healthy() -> Self {
        MockConnection {
            read_fn: Box::new(|buf| Ok(buf.len())),
            write_fn: Box::new(|buf| Ok(buf.len())),
        }
    }

    /// Override the read behavior.
    pub fn with_read_fn(
        mut self,
        f: impl Fn(&mut [u8]) -> io::Result<usize> + Send + Sync + 'static,
    ) -> Self {
        self.read_fn = Box::new(f);
        self
    }

    /// Override the write behavior.
    pub fn with_write_fn(
        mut self,
        f: impl Fn(&[u8]) -> io::Result<usize> + Send + Sync + 'static,
    ) -> Self {
        self.write_fn = Box::new(f);
        self
    }
}

impl Connection for MockConnection {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        (self.read_fn)(buf)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        (self.write_fn)(buf)
    }

    fn set_write_timeout(&self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }

    fn set_read_timeout(&self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }

    fn try_clone(&self) -> io::Result<Box<dyn Connection>> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "MockConnection cannot be cloned",
        ))
    }

    fn shutdown(&self) {}
}

/// One accepted line, or the error that ended the read loop for its
/// connection.
pub struct ReceivedLine {
    /// Raw bytes up to and including the trailing newline, if any.
    pub line: Vec<u8>,
    /// Set if the read that produced `line` subsequently failed (e.g. the
    /// connection was closed).
    pub error: Option<io::ErrorKind>,
}

/// A local TCP server accepting line-delimited input, for testing
/// [`TcpAppender`](crate::tcp::TcpAppender) against real sockets.
pub struct LocalTcpServer {
    listener_addr: std::net::SocketAddr,
    results_rx: crossbeam_channel::Receiver<ReceivedLine>,
    active: Arc<Mutex<Vec<TcpStream>>>,
    closed: Arc<Mutex<bool>>,
    total_conn_count: Arc<Mutex<usize>>,
}

impl LocalTcpServer {
    /// Bind an ephemeral port on `127.0.0.1` and start accepting
    /// connections in the background.
    pub fn start() -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let listener_addr = listener.local_addr()?;
        let (results_tx, results_rx) = crossbeam_channel::unbounded();
        let active = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(Mutex::new(false));
        let total_conn_count = Arc::new(Mutex::new(0));

        {
            let active = active.clone();
            let closed = closed.clone();
            let total_conn_count = total_conn_count.clone();
            std::thread::spawn(move || {
                for stream in listener.incoming() {
                    if *closed.lock().unwrap() {
                        return;
                    }
                    let Ok(stream) = stream else { continue };
                    *total_conn_count.lock().unwrap() += 1;
                    active
                        .lock()
                        .unwrap()
                        .push(stream.try_clone().expect("clone accepted stream"));
                    let results_tx = results_tx.clone();
                    let closed = closed.clone();
                    std::thread::spawn(move || handle_connection(stream, results_tx, closed));
                }
            });
        }

        Ok(LocalTcpServer {
            listener_addr,
            results_rx,
            active,
            closed,
            total_conn_count,
        })
    }

    /// `host:port` string clients should connect to.
    pub fn address(&self) -> String {
        self.listener_addr.to_string()
    }

    /// Open a fresh client connection to this server.
    pub fn dial(&self) -> io::Result<TcpStream> {
        TcpStream::connect(self.listener_addr)
    }

    /// Block until one line has been received, or `timeout` elapses.
    pub fn wait_for_one_line(&self, timeout: Duration) -> AppenderResult<ReceivedLine> {
        self.results_rx
            .recv_timeout(timeout)
            .map_err(|_| AppenderError::WriteTimeout)
    }

    /// Force-close every currently tracked client connection, simulating a
    /// mid-session network interruption.
    pub fn close_all_client_connections(&self) {
        for stream in self.active.lock().unwrap().drain(..) {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
    }

    /// Total number of connections accepted so far.
    pub fn total_conn_count(&self) -> usize {
        *self.total_conn_count.lock().unwrap()
    }

    /// Stop accepting new connections and close tracked ones.
    pub fn close(&self) {
        *self.closed.lock().unwrap() = true;
        self.close_all_client_connections();
    }
}

fn handle_connection(
    stream: TcpStream,
    results_tx: crossbeam_channel::Sender<ReceivedLine>,
    closed: Arc<Mutex<bool>>,
) {
    use std::io::BufRead;
    let mut reader = io::BufReader::new(stream);
    loop {
        if *closed.lock().unwrap() {
            return;
        }
        let mut line = Vec::new();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => return,
            Ok(_) => {
                let _ = results_tx.send(ReceivedLine { line, error: None });
            }
            Err(e) => {
                let _ = results_tx.send(ReceivedLine {
                    line,
                    error: Some(e.kind()),
                });
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discard::Discard;

    fn entry() -> LogEntry {
        LogEntry::new(slog::Level::Info, "test", "hi")
    }

    #[test]
    fn failing_switchable_fails_only_while_broken() {
        let fs = FailingSwitchable::new(Box::new(Discard));
        assert!(fs.write(b"x", &entry()).is_ok());
        fs.break_now();
        assert!(matches!(
            fs.write(b"x", &entry()),
            Err(AppenderError::FailEnabled)
        ));
        fs.fix();
        assert!(fs.write(b"x", &entry()).is_ok());
    }

    #[test]
    fn blocking_switchable_unblocks_on_fix() {
        let bs = Arc::new(BlockingSwitchable::new(Box::new(Discard)));
        bs.break_now();

        let worker = {
            let bs = bs.clone();
            std::thread::spawn(move || bs.write(b"x", &entry()))
        };

        std::thread::sleep(Duration::from_millis(100));
        assert!(!worker.is_finished());

        bs.fix();
        let result = worker.join().unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn local_tcp_server_receives_a_line() {
        let server = LocalTcpServer::start().unwrap();
        let mut client = server.dial().unwrap();
        use std::io::Write;
        client.write_all(b"hello\n").unwrap();

        let received = server.wait_for_one_line(Duration::from_secs(5)).unwrap();
        assert_eq!(received.line, b"hello\n");
    }
}
