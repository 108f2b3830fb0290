//! Worker thread that moves raw events from a channel into the store.
//!
//! Platform callbacks that must return quickly can push [`RawEvent`]s onto a
//! bounded crossbeam channel; the pump submits them through the
//! [`CaptureAdapter`] on its own thread.

use crate::capture::adapter::{CaptureAdapter, RawEvent};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Default capacity of the event hand-off channel.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Create a bounded channel for raw events.
pub fn event_channel(capacity: usize) -> (Sender<RawEvent>, Receiver<RawEvent>) {
    bounded(capacity)
}

#[derive(Debug, Default)]
struct PumpCounters {
    submitted: AtomicU64,
    rejected: AtomicU64,
}

/// Totals reported when a pump finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PumpSummary {
    /// Events accepted into the store
    pub submitted: u64,
    /// Events rejected as malformed
    pub rejected: u64,
}

/// Handle on a running pump thread.
pub struct EventPump {
    handle: Option<JoinHandle<()>>,
    counters: Arc<PumpCounters>,
}

impl EventPump {
    /// Spawn a pump that runs until every sender for `receiver` is dropped.
    pub fn spawn(adapter: CaptureAdapter, receiver: Receiver<RawEvent>) -> std::io::Result<Self> {
        let counters = Arc::new(PumpCounters::default());
        let worker_counters = Arc::clone(&counters);

        let handle = thread::Builder::new()
            .name("event-pump".to_string())
            .spawn(move || {
                for event in receiver.iter() {
                    match adapter.submit_event(event) {
                        Ok(_) => {
                            worker_counters.submitted.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            // Already logged by the adapter
                            worker_counters.rejected.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
                tracing::debug!("event pump input closed");
            })?;

        Ok(Self {
            handle: Some(handle),
            counters,
        })
    }

    /// Totals so far.
    pub fn summary(&self) -> PumpSummary {
        PumpSummary {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
        }
    }

    /// Whether the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the pump to drain its input and exit.
    pub fn join(mut self) -> PumpSummary {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("event pump thread panicked");
            }
        }
        self.summary()
    }
}
