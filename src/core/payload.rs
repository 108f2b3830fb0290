//! Versioned liveness payload builder.
//!
//! This module wraps a [`FeatureVector`] in the envelope handed to the
//! transport layer. Serialization to the wire is the consumer's job; the
//! JSON form here is what the risk service expects in the transaction header.

use crate::capture::types::SampleKind;
use crate::core::features::FeatureVector;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// The current payload format version.
pub const PAYLOAD_VERSION: &str = "1.0";

/// The name of this producer.
pub const PRODUCER_NAME: &str = "sentinel-biometrics";

/// Producer metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadProducer {
    /// Name of the producing software
    pub name: String,
    /// Version of the producing software
    pub version: String,
    /// Unique instance identifier (UUID)
    pub instance_id: String,
}

/// The scored metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadMetrics {
    pub gyro_variance: f64,
    pub typing_cadence_mean: f64,
    pub touch_pressure_avg: f64,
    pub accel_magnitude_mean: f64,
}

/// Envelope sent to the risk-scoring service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivenessPayload {
    /// Payload schema version
    pub payload_version: String,
    /// Producer metadata
    pub producer: PayloadProducer,
    /// Sequence number of this payload within the session
    pub sequence: u64,
    /// Optional session identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub metrics: PayloadMetrics,
    /// Samples drained across all kinds
    pub raw_sample_count: usize,
    /// Samples drained per kind
    pub sample_counts: BTreeMap<SampleKind, usize>,
    /// Snapshot time, Unix milliseconds
    pub timestamp: i64,
    /// When the payload was built (RFC3339)
    pub computed_at_utc: String,
}

/// Builder for liveness payloads.
pub struct PayloadBuilder {
    instance_id: Uuid,
    session_id: Option<String>,
    sequence: AtomicU64,
}

impl PayloadBuilder {
    /// Create a new builder with a unique instance ID.
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            session_id: None,
            sequence: AtomicU64::new(0),
        }
    }

    /// Set the session ID for generated payloads.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Get the instance ID.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Build a payload from a feature vector.
    pub fn build(&self, features: &FeatureVector) -> LivenessPayload {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;

        LivenessPayload {
            payload_version: PAYLOAD_VERSION.to_string(),
            producer: PayloadProducer {
                name: PRODUCER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                instance_id: self.instance_id.to_string(),
            },
            sequence,
            session_id: self.session_id.clone(),
            metrics: PayloadMetrics {
                gyro_variance: features.gyro_variance,
                typing_cadence_mean: features.typing_cadence_mean_millis,
                touch_pressure_avg: features.touch_pressure_avg,
                accel_magnitude_mean: features.accel_magnitude_mean,
            },
            raw_sample_count: features.sample_count,
            sample_counts: features.sample_counts.clone(),
            timestamp: features.snapshot_timestamp.timestamp_millis(),
            computed_at_utc: Utc::now().to_rfc3339(),
        }
    }

    /// Build and serialize a payload to compact JSON.
    pub fn build_json(&self, features: &FeatureVector) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.build(features))
    }
}

impl Default for PayloadBuilder {
    fn default() -> Self {
        Self::new()
    }
}
