//! Core functionality of the liveness pipeline.
//!
//! This module contains:
//! - Feature extraction from drained samples
//! - Snapshot assembly across every channel
//! - Versioned payload building for export

pub mod features;
pub mod payload;
pub mod snapshot;

// Re-export commonly used types
pub use features::{
    compute_features, mean_magnitude, mean_pressure, typing_cadence_mean, variance, FeatureVector,
};
pub use payload::{LivenessPayload, PayloadBuilder, PAYLOAD_VERSION, PRODUCER_NAME};
pub use snapshot::{DrainedSamples, SnapshotAssembler};
