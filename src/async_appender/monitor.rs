//! Occupancy monitor: proactively diverts to the fallback as the data queue
//! approaches saturation, instead of letting producers block or drop once
//! it's already full (spec.md §4.7).

use super::queue::QueueMsg;
use crate::Appender;
use crossbeam_channel::{Receiver, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Run the monitor loop until `stop` is set. `threshold` is the minimum
/// number of free slots the queue should maintain; whenever free space dips
/// below it, the oldest `threshold - free` messages are popped and handed to
/// `fallback` instead of `primary`.
pub fn run(
    data_rx: Receiver<QueueMsg>,
    fallback: Arc<dyn Appender>,
    threshold: usize,
    period: Duration,
    stop: Arc<AtomicBool>,
) {
    let capacity = data_rx.capacity().unwrap_or(usize::MAX);
    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        std::thread::sleep(period);
        if stop.load(Ordering::SeqCst) {
            return;
        }

        let free = capacity.saturating_sub(data_rx.len());
        if free >= threshold {
            continue;
        }
        let mut to_divert = threshold - free;
        while to_divert > 0 {
            match data_rx.try_recv() {
                Ok(QueueMsg::Write { buf, entry }) => {
                    let _ = fallback.write(buf.as_slice(), &entry);
                    to_divert -= 1;
                }
                Ok(QueueMsg::Drain { done }) => {
                    // Not a payload; signal it and keep working the budget.
                    let _ = done.send(());
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }
}
