//! Worker thread body: the only consumer allowed to deliver to the primary.

use super::queue::QueueMsg;
use crate::Appender;
use crossbeam_channel::{Receiver, RecvError};
use std::sync::Arc;

/// Drain the data queue onto `primary` until `stop_rx` fires or the queue
/// disconnects. A dedicated stop channel — never read by the monitor — is
/// what lets shutdown terminate this thread specifically, independent of
/// however many `Drain` markers or pending writes the monitor may also be
/// racing to consume.
pub fn run(primary: Arc<dyn Appender>, data_rx: Receiver<QueueMsg>, stop_rx: Receiver<()>) {
    loop {
        crossbeam_channel::select! {
            recv(stop_rx) -> _ => return,
            recv(data_rx) -> msg => match msg {
                Ok(QueueMsg::Write { buf, entry }) => {
                    let _ = primary.write(buf.as_slice(), &entry);
                }
                Ok(QueueMsg::Drain { done }) => {
                    let _ = done.send(());
                }
                Err(RecvError) => return,
            },
        }
    }
}
