//! Idle-read monitor (spec.md §4.6): detects half-open sockets by probing
//! reads on a write-only stream, since Linux can take a long time to
//! surface a dead peer to a writer alone.

use super::Connection;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::time::Duration;

const TICK: Duration = Duration::from_secs(1);
const READ_DEADLINE: Duration = Duration::from_secs(30);

/// Spawn the background probe for one connection generation. Exits when
/// the connection is superseded or a non-timeout read error occurs.
pub fn spawn(
    probe: Box<dyn Connection>,
    my_generation: u64,
    current_generation: Arc<AtomicU64>,
    stale_tx: SyncSender<u64>,
) {
    std::thread::spawn(move || {
        let mut buf = [0u8; 1];
        loop {
            if current_generation.load(Ordering::SeqCst) != my_generation {
                // Our connection has already been replaced or closed.
                return;
            }

            std::thread::sleep(TICK);

            if probe.set_read_timeout(Some(READ_DEADLINE)).is_err() {
                continue;
            }

            match probe.read(&mut buf) {
                Ok(_) => {
                    // A byte on a write-only stream is unexpected but not
                    // an error signal either; keep probing.
                    continue;
                }
                Err(e) if is_timeout(&e) => continue,
                Err(_) => {
                    let _ = stale_tx.try_send(my_generation);
                    return;
                }
            }
        }
    });
}

fn is_timeout(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut
}
