//! Message types carried on the bounded data queue (spec.md §4.7).

use crate::entry::LogEntry;
use crate::pool::PooledBuffer;
use crossbeam_channel::Sender;

/// One slot on [`AsyncAppender`](super::AsyncAppender)'s data queue.
///
/// `Drain` shares the queue with `Write` rather than travelling on a side
/// channel: whichever of the worker or the monitor dequeues it, observing it
/// is equally valid proof that every message enqueued earlier has already
/// reached the primary or been diverted to the fallback (Testable Property 1,
/// spec.md §8), since both are legitimate destinations. A marker never
/// counts against the monitor's per-tick diversion budget (see
/// `monitor.rs`).
pub enum QueueMsg {
    /// An encoded record, still owned by its pooled buffer.
    Write { buf: PooledBuffer, entry: LogEntry },
    /// A flush barrier: signal `done` once every message enqueued before it
    /// has been delivered.
    Drain { done: Sender<()> },
}
