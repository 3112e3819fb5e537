//! End-to-end `AsyncAppender` occupancy-diversion behavior (spec.md §8),
//! parameterized the same way as the original source's `TestAsync` table.
//! Requires the `testkit` feature for `BlockingSwitchable`.
#![cfg(feature = "testkit")]

use slog_appender::async_appender::{AsyncAppender, AsyncConfig};
use slog_appender::entry::LogEntry;
use slog_appender::error::AppenderResult;
use slog_appender::testkit::BlockingSwitchable;
use slog_appender::Appender;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn entry() -> LogEntry {
    LogEntry::new(slog::Level::Info, "async-integration", "m")
}

struct CountingAppender(Arc<AtomicU64>);

impl Appender for CountingAppender {
    fn write(&self, payload: &[u8], _entry: &LogEntry) -> AppenderResult<usize> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(payload.len())
    }
    fn sync(&self) -> AppenderResult<()> {
        Ok(())
    }
    fn is_synchronized(&self) -> bool {
        true
    }
}

/// Runs the `TestAsync` table's shape: break the primary, write `n`
/// messages, assert the broken-state counters, fix the primary, assert the
/// fixed-state counters once everything has drained.
fn run_scenario(
    max_queue_len: usize,
    min_free_items: usize,
    writes: usize,
    expect_broken: (u64, u64),
    expect_fixed: (u64, u64),
) {
    let primary_count = Arc::new(AtomicU64::new(0));
    let fallback_count = Arc::new(AtomicU64::new(0));
    let primary = Arc::new(BlockingSwitchable::new(Box::new(CountingAppender(
        primary_count.clone(),
    ))));
    primary.break_now();

    let config = AsyncConfig::new(
        Box::new(primary.clone()),
        Box::new(CountingAppender(fallback_count.clone())),
    )
    .max_queue_len(max_queue_len)
    .min_free_items(min_free_items)
    .monitor_period(Duration::from_millis(20));
    let appender = AsyncAppender::new(config).unwrap();

    for _ in 0..writes {
        appender.write(b"x", &entry()).unwrap();
    }
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(
        primary_count.load(Ordering::SeqCst),
        expect_broken.0,
        "primary writes while broken"
    );
    assert_eq!(
        fallback_count.load(Ordering::SeqCst),
        expect_broken.1,
        "fallback writes while broken"
    );

    primary.fix();
    appender.sync().unwrap();
    assert_eq!(
        primary_count.load(Ordering::SeqCst),
        expect_fixed.0,
        "primary writes once fixed"
    );
    assert_eq!(
        fallback_count.load(Ordering::SeqCst),
        expect_fixed.1,
        "fallback writes once fixed"
    );
}

#[test]
fn mini_scenario() {
    // One message is consumed by the blocked worker; the second finds the
    // queue already saturated and is diverted to the fallback.
    run_scenario(1, 1, 2, (0, 1), (1, 1));
}

#[test]
fn example_scenario() {
    run_scenario(10, 2, 10, (0, 1), (9, 1));
}

#[test]
fn larger_queue_scenario() {
    run_scenario(100, 10, 100, (0, 9), (91, 9));
}

/// Scenario 4: with a diversion threshold of zero and a monitor period long
/// enough never to tick during the test, the queue never diverts — once its
/// one slot is occupied and the stalled worker has no room to hand off a
/// second message, the producer blocks until the primary is fixed, and every
/// message it sent ends up delivered to the primary.
#[test]
fn blocking_single_producer_never_diverts_scenario4() {
    let primary_count = Arc::new(AtomicU64::new(0));
    let fallback_count = Arc::new(AtomicU64::new(0));
    let primary = Arc::new(BlockingSwitchable::new(Box::new(CountingAppender(
        primary_count.clone(),
    ))));
    primary.break_now();

    let config = AsyncConfig::new(
        Box::new(primary.clone()),
        Box::new(CountingAppender(fallback_count.clone())),
    )
    .max_queue_len(1)
    .min_free_items(0)
    .monitor_period(Duration::from_secs(3600));
    let appender = Arc::new(AsyncAppender::new(config).unwrap());

    let producer = {
        let appender = appender.clone();
        std::thread::spawn(move || {
            for _ in 0..10 {
                appender.write(b"x", &entry()).unwrap();
            }
        })
    };

    // One message fits in the single queue slot; the producer blocks trying
    // to enqueue the second since nothing is diverting or draining yet.
    std::thread::sleep(Duration::from_millis(200));
    assert!(!producer.is_finished());
    assert_eq!(primary_count.load(Ordering::SeqCst), 0);
    assert_eq!(fallback_count.load(Ordering::SeqCst), 0);

    primary.fix();
    producer.join().unwrap();
    appender.sync().unwrap();

    assert_eq!(primary_count.load(Ordering::SeqCst), 10);
    assert_eq!(fallback_count.load(Ordering::SeqCst), 0);
}
