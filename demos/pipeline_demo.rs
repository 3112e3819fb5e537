//! Builds a small appender pipeline — stdout primary, `Discard` fallback,
//! decoupled through an `AsyncAppender` — and drives it through
//! `SlogBridge` with the ordinary `slog` logging macros.

mod common;

use slog::{o, Drain};
use slog_appender::async_appender::{AsyncAppender, AsyncConfig};
use slog_appender::bridge::SlogBridge;
use slog_appender::discard::Discard;
use slog_appender::encoder::LineEncoder;
use slog_appender::writer::Writer;
use std::io;

fn main() {
    let stdout = Writer::new(io::stdout());
    let config = AsyncConfig::new(Box::new(stdout), Box::new(Discard));
    let async_appender = AsyncAppender::new(config).expect("valid async config");

    let drain = SlogBridge::new(LineEncoder, async_appender).fuse();
    let log = slog::Logger::root(drain, o!("version" => "0.5"));

    common::simulate_server(&log);
}
