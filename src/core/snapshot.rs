//! Snapshot assembly: drain every channel, then reduce.
//!
//! The assembler keeps no state between snapshots beyond its handle on the
//! store. Each channel's drain is atomic on its own; drains of different
//! kinds are not simultaneous, which is fine because no feature mixes kinds.

use crate::capture::types::{Sample, SampleKind};
use crate::core::features::{compute_features, FeatureVector};
use crate::store::SharedStore;
use crate::transparency::SharedTransparencyLog;
use chrono::Utc;

/// Samples removed from the store in one snapshot cycle, grouped by kind.
#[derive(Debug, Clone, Default)]
pub struct DrainedSamples {
    by_kind: [Vec<Sample>; SampleKind::ALL.len()],
}

impl DrainedSamples {
    /// Drain every channel of the store.
    pub fn drain_all(store: &SharedStore) -> Self {
        let mut drained = Self::default();
        for kind in SampleKind::ALL {
            drained.by_kind[kind.index()] = store.drain(kind);
        }
        drained
    }

    /// Group already-owned samples by kind, keeping their order.
    pub fn from_samples(samples: impl IntoIterator<Item = Sample>) -> Self {
        let mut drained = Self::default();
        for sample in samples {
            drained.by_kind[sample.kind().index()].push(sample);
        }
        drained
    }

    /// Samples of one kind.
    pub fn samples(&self, kind: SampleKind) -> &[Sample] {
        &self.by_kind[kind.index()]
    }

    /// Total number of samples across all kinds.
    pub fn len(&self) -> usize {
        self.by_kind.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Turns the store's current contents into a [`FeatureVector`].
pub struct SnapshotAssembler {
    store: SharedStore,
    transparency: Option<SharedTransparencyLog>,
}

impl SnapshotAssembler {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            transparency: None,
        }
    }

    /// Record drained counts and snapshots in a transparency log.
    pub fn with_transparency(mut self, log: SharedTransparencyLog) -> Self {
        self.transparency = Some(log);
        self
    }

    /// The store this assembler drains.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Drain every channel and reduce the samples to a feature vector.
    ///
    /// Reduction runs after every channel lock has been released.
    pub fn take_snapshot(&self) -> FeatureVector {
        let drained = DrainedSamples::drain_all(&self.store);
        let snapshot_timestamp = Utc::now();
        let features = compute_features(&drained, snapshot_timestamp);

        if let Some(ref log) = self.transparency {
            for kind in SampleKind::ALL {
                log.record_drained(kind, drained.samples(kind).len() as u64);
            }
            log.record_snapshot();
        }

        tracing::debug!(
            samples = features.sample_count,
            gyro_variance = features.gyro_variance,
            typing_cadence_ms = features.typing_cadence_mean_millis,
            touch_pressure = features.touch_pressure_avg,
            "snapshot taken"
        );

        features
    }
}
