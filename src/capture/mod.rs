//! Event capture for the liveness pipeline.
//!
//! This module turns raw platform callbacks into normalized samples and
//! feeds them into the store.

pub mod adapter;
pub mod pump;
pub mod types;

// Re-export commonly used types
pub use adapter::{now_millis, CaptureAdapter, CaptureError, RawEvent, RawValue};
pub use pump::{event_channel, EventPump, PumpSummary, DEFAULT_QUEUE_CAPACITY};
pub use types::{Sample, SampleKind, SampleValue, UnknownSampleKind};
