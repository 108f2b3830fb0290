//! Bounded per-kind sample buffers.
//!
//! This module contains:
//! - Channels that enforce a capacity or time-window retention policy
//! - The ring buffer store exposing append, drain and peek

pub mod channel;
pub mod ring;

// Re-export commonly used types
pub use channel::{ChannelStats, RetentionPolicy};
pub use ring::{MalformedSampleError, RingBufferStore, SharedStore};
