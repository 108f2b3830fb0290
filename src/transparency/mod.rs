//! Transparency module for the liveness pipeline.
//!
//! Tracks how many samples were ingested, rejected and reduced so the
//! signal's provenance can be audited without retaining raw events.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, SharedTransparencyLog, TransparencyLog,
    TransparencyStats,
};
