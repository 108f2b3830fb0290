//! Per-kind ring buffers with an atomic drain contract.
//!
//! Every kind has its own lock, so a burst on one channel never stalls
//! ingestion on another. `drain` holds a channel's lock only long enough to
//! swap its buffer for an empty one; filtering and reduction happen after
//! the lock is released.

use crate::capture::types::{Sample, SampleKind};
use crate::config::Config;
use crate::store::channel::{Channel, ChannelStats, RetentionPolicy};
use crate::transparency::SharedTransparencyLog;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// A sample rejected by [`RingBufferStore::append`].
///
/// The producer decides whether to retry or discard.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("malformed {kind} sample: {reason}")]
pub struct MalformedSampleError {
    pub kind: SampleKind,
    pub reason: String,
}

impl MalformedSampleError {
    fn new(kind: SampleKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

struct Slot {
    channel: Mutex<Channel>,
    drained: AtomicU64,
    expired_on_drain: AtomicU64,
}

/// Owns one channel per sample kind.
pub struct RingBufferStore {
    slots: Vec<Slot>,
    next_arrival: AtomicU64,
    transparency: Option<SharedTransparencyLog>,
}

/// Thread-safe shared store.
pub type SharedStore = Arc<RingBufferStore>;

impl RingBufferStore {
    /// Create a store using the default retention policy for each kind.
    pub fn new() -> Self {
        Self::with_policies(RetentionPolicy::default_for)
    }

    /// Create a store with a policy chosen per kind.
    pub fn with_policies<F>(policy_for: F) -> Self
    where
        F: Fn(SampleKind) -> RetentionPolicy,
    {
        let slots = SampleKind::ALL
            .iter()
            .map(|&kind| Slot {
                channel: Mutex::new(Channel::new(kind, policy_for(kind))),
                drained: AtomicU64::new(0),
                expired_on_drain: AtomicU64::new(0),
            })
            .collect();

        Self {
            slots,
            next_arrival: AtomicU64::new(1),
            transparency: None,
        }
    }

    /// Count evicted samples in a transparency log.
    pub fn with_transparency(mut self, log: SharedTransparencyLog) -> Self {
        self.transparency = Some(log);
        self
    }

    /// Create a store using the retention policies of a configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::with_policies(|kind| config.retention.policy_for(kind))
    }

    /// Create a shared store.
    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }

    /// Validate and buffer a sample. Returns its arrival sequence number.
    ///
    /// A sample captured before its channel's time window is rejected
    /// rather than stored and immediately evicted.
    pub fn append(&self, sample: Sample) -> Result<u64, MalformedSampleError> {
        validate(&sample)?;

        let kind = sample.kind();
        let captured_at = sample.captured_at_millis();
        let mut channel = self.lock(kind);
        if let Some(floor) = channel.expired_floor(captured_at) {
            return Err(MalformedSampleError::new(
                kind,
                format!(
                    "captured at {captured_at} ms, before the retention window starting at {floor} ms"
                ),
            ));
        }
        // Stamped under the channel lock so arrival order equals buffer order.
        let arrival = self.next_arrival.fetch_add(1, Ordering::Relaxed);
        let evicted = channel.push(sample.stamped(arrival));
        drop(channel);

        if evicted > 0 {
            tracing::debug!(%kind, evicted, "retention policy evicted samples");
            self.record_evicted(kind, evicted);
        }
        Ok(arrival)
    }

    /// Atomically remove and return every buffered sample of `kind`.
    ///
    /// Samples are returned in arrival order. An empty channel yields an
    /// empty vector.
    pub fn drain(&self, kind: SampleKind) -> Vec<Sample> {
        let slot = &self.slots[kind.index()];
        let cut = self.lock(kind).take();
        let evicted_at_cut = cut.evicted;

        let (live, expired) = cut.into_live();
        slot.drained.fetch_add(live.len() as u64, Ordering::Relaxed);
        if expired > 0 {
            slot.expired_on_drain
                .fetch_add(expired as u64, Ordering::Relaxed);
        }
        if evicted_at_cut + expired > 0 {
            tracing::debug!(
                %kind,
                evicted = evicted_at_cut,
                expired,
                "dropped expired samples at drain"
            );
            self.record_evicted(kind, evicted_at_cut + expired);
        }
        live
    }

    /// Drain a channel by name. Unknown names yield an empty vector.
    pub fn drain_named(&self, name: &str) -> Vec<Sample> {
        match name.parse::<SampleKind>() {
            Ok(kind) => self.drain(kind),
            Err(e) => {
                tracing::debug!(error = %e, "drain of unregistered channel");
                Vec::new()
            }
        }
    }

    /// Peek a channel by name. Unknown names yield an empty vector.
    pub fn peek_named(&self, name: &str) -> Vec<Sample> {
        name.parse::<SampleKind>()
            .map(|kind| self.peek(kind))
            .unwrap_or_default()
    }

    /// Copy of the live samples of `kind` without removing them.
    pub fn peek(&self, kind: SampleKind) -> Vec<Sample> {
        self.lock(kind).snapshot()
    }

    /// Number of samples currently buffered for `kind`.
    pub fn len(&self, kind: SampleKind) -> usize {
        self.lock(kind).len()
    }

    /// Whether every channel is empty.
    pub fn is_empty(&self) -> bool {
        SampleKind::ALL.iter().all(|&kind| self.len(kind) == 0)
    }

    /// Retention policy in force for `kind`.
    pub fn policy(&self, kind: SampleKind) -> RetentionPolicy {
        self.lock(kind).policy()
    }

    /// Counters for one channel.
    pub fn stats(&self, kind: SampleKind) -> ChannelStats {
        let slot = &self.slots[kind.index()];
        let channel = self.lock(kind);
        ChannelStats {
            kind: channel.kind(),
            policy: channel.policy(),
            buffered: channel.len(),
            accepted: channel.accepted(),
            evicted: channel.evicted() + slot.expired_on_drain.load(Ordering::Relaxed),
            drained: slot.drained.load(Ordering::Relaxed),
        }
    }

    /// Counters for every channel, in [`SampleKind::ALL`] order.
    pub fn all_stats(&self) -> Vec<ChannelStats> {
        SampleKind::ALL.iter().map(|&kind| self.stats(kind)).collect()
    }

    fn record_evicted(&self, kind: SampleKind, count: usize) {
        if let Some(ref log) = self.transparency {
            log.record_evicted(kind, count as u64);
        }
    }

    fn lock(&self, kind: SampleKind) -> MutexGuard<'_, Channel> {
        // A panicking producer cannot leave the buffer half-updated, so a
        // poisoned lock is still safe to use.
        self.slots[kind.index()]
            .channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RingBufferStore {
    fn default() -> Self {
        Self::new()
    }
}

fn validate(sample: &Sample) -> Result<(), MalformedSampleError> {
    let kind = sample.kind();
    let value = sample.value();

    if !value.fits(kind) {
        return Err(MalformedSampleError::new(
            kind,
            format!("{} payload does not describe a {kind} event", value.shape()),
        ));
    }

    if let Some((field, number)) = value.numbers().into_iter().find(|(_, n)| !n.is_finite()) {
        return Err(MalformedSampleError::new(
            kind,
            format!("{field} is not finite ({number})"),
        ));
    }

    if matches!(sample.key(), Some(key) if key.is_empty()) {
        return Err(MalformedSampleError::new(kind, "empty key identifier"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::SampleValue;
    use crate::transparency::create_shared_log;
    use std::thread;

    #[test]
    fn test_append_and_drain() {
        let store = RingBufferStore::new();
        store.append(Sample::orientation(1.0, 10.0, 2.0, 100)).unwrap();
        store.append(Sample::orientation(1.0, 20.0, 2.0, 110)).unwrap();

        let drained = store.drain(SampleKind::Orientation);
        assert_eq!(drained.len(), 2);
        assert!(drained[0].arrival() < drained[1].arrival());
        assert_eq!(store.len(SampleKind::Orientation), 0);
    }

    #[test]
    fn test_empty_drain_is_idempotent() {
        let store = RingBufferStore::new();
        assert!(store.drain(SampleKind::TouchStart).is_empty());
        assert!(store.drain(SampleKind::TouchStart).is_empty());
    }

    #[test]
    fn test_unknown_channel_names_are_empty() {
        let store = RingBufferStore::new();
        store.append(Sample::key_up("a", 1)).unwrap();
        assert!(store.drain_named("gyro").is_empty());
        assert!(store.peek_named("gyro").is_empty());
        assert_eq!(store.peek_named("key_up").len(), 1);
        assert_eq!(store.drain_named("key_up").len(), 1);
    }

    #[test]
    fn test_peek_does_not_clear() {
        let store = RingBufferStore::new();
        store.append(Sample::touch(0.5, 2.0, 2.0, 1)).unwrap();

        assert_eq!(store.peek(SampleKind::TouchStart).len(), 1);
        assert_eq!(store.peek(SampleKind::TouchStart).len(), 1);
        assert_eq!(store.drain(SampleKind::TouchStart).len(), 1);
        assert!(store.peek(SampleKind::TouchStart).is_empty());
    }

    #[test]
    fn test_rejects_non_finite_values() {
        let store = RingBufferStore::new();
        let err = store
            .append(Sample::orientation(0.0, f64::NAN, 0.0, 1))
            .unwrap_err();
        assert_eq!(err.kind, SampleKind::Orientation);
        assert!(err.reason.contains("beta"));

        let err = store
            .append(Sample::acceleration(f64::INFINITY, 0.0, 0.0, 1))
            .unwrap_err();
        assert!(err.to_string().contains("acceleration"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_rejects_mismatched_payload() {
        let store = RingBufferStore::new();
        let sample = Sample::new(
            SampleKind::Orientation,
            SampleValue::Key {
                key: "a".to_string(),
            },
            1,
        );
        assert!(store.append(sample).is_err());
        assert!(store.append(Sample::key_down("", 1)).is_err());
    }

    #[test]
    fn test_future_outlier_does_not_stall_key_channel() {
        let store = RingBufferStore::new();
        store.append(Sample::key_down("x", 4_000_000_000_000)).unwrap();
        assert_eq!(store.drain(SampleKind::KeyDown).len(), 1);

        store.append(Sample::key_down("a", 1_700_000_000_000)).unwrap();
        store.append(Sample::key_down("b", 1_700_000_000_090)).unwrap();
        assert_eq!(store.drain(SampleKind::KeyDown).len(), 2);
        assert_eq!(store.stats(SampleKind::KeyDown).evicted, 0);
    }

    #[test]
    fn test_expired_on_arrival_is_reported() {
        let store = RingBufferStore::new();
        store.append(Sample::key_up("a", 100_000)).unwrap();

        let err = store.append(Sample::key_up("b", 10_000)).unwrap_err();
        assert_eq!(err.kind, SampleKind::KeyUp);
        assert!(err.reason.contains("retention window"));

        let stats = store.stats(SampleKind::KeyUp);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.buffered, 1);
    }

    #[test]
    fn test_evictions_reach_transparency_log() {
        let log = create_shared_log();
        let store = RingBufferStore::with_policies(|kind| match kind {
            SampleKind::TouchStart => RetentionPolicy::Capacity { max_samples: 2 },
            _ => RetentionPolicy::default_for(kind),
        })
        .with_transparency(Arc::clone(&log));

        for i in 0..5 {
            store.append(Sample::touch(0.1, 0.0, 0.0, i)).unwrap();
        }
        store.append(Sample::key_down("a", 1_000)).unwrap();
        store.append(Sample::key_down("b", 900)).unwrap();
        store.append(Sample::key_down("c", 40_000)).unwrap();
        store.drain(SampleKind::KeyDown);

        let stats = log.stats();
        assert_eq!(stats.evicted(SampleKind::TouchStart), 3);
        assert_eq!(stats.evicted(SampleKind::KeyDown), 2);
        assert_eq!(stats.evicted(SampleKind::Orientation), 0);
    }

    #[test]
    fn test_channels_are_independent() {
        let store = RingBufferStore::new();
        store.append(Sample::key_down("a", 1)).unwrap();
        store.append(Sample::acceleration(0.0, 0.0, 1.0, 1)).unwrap();

        assert_eq!(store.drain(SampleKind::KeyDown).len(), 1);
        assert_eq!(store.len(SampleKind::Acceleration), 1);
    }

    #[test]
    fn test_from_config_applies_overrides() {
        let mut config = Config::default();
        config
            .retention
            .set(SampleKind::Orientation, RetentionPolicy::Capacity { max_samples: 2 });
        let store = RingBufferStore::from_config(&config);

        for i in 0..4 {
            store.append(Sample::orientation(0.0, i as f64, 0.0, i)).unwrap();
        }
        assert_eq!(store.len(SampleKind::Orientation), 2);
        assert_eq!(
            store.policy(SampleKind::KeyDown),
            RetentionPolicy::default_for(SampleKind::KeyDown)
        );
    }

    #[test]
    fn test_stats_track_counts() {
        let store = RingBufferStore::with_policies(|_| RetentionPolicy::Capacity { max_samples: 2 });
        for i in 0..5 {
            store.append(Sample::touch(0.1, 0.0, 0.0, i)).unwrap();
        }
        store.drain(SampleKind::TouchStart);

        let stats = store.stats(SampleKind::TouchStart);
        assert_eq!(stats.accepted, 5);
        assert_eq!(stats.evicted, 3);
        assert_eq!(stats.drained, 2);
        assert_eq!(stats.buffered, 0);
    }

    #[test]
    fn test_append_after_drain_lands_in_next_drain() {
        let store = RingBufferStore::new();
        store.append(Sample::orientation(0.0, 1.0, 0.0, 1)).unwrap();
        let first = store.drain(SampleKind::Orientation);
        store.append(Sample::orientation(0.0, 2.0, 0.0, 2)).unwrap();
        let second = store.drain(SampleKind::Orientation);

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].captured_at_millis(), 2);
    }

    #[test]
    fn test_concurrent_appends_are_all_stamped() {
        let store = Arc::new(RingBufferStore::with_policies(|_| RetentionPolicy::Capacity {
            max_samples: 100_000,
        }));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..500 {
                        store
                            .append(Sample::acceleration(t as f64, i as f64, 0.0, i))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let drained = store.drain(SampleKind::Acceleration);
        assert_eq!(drained.len(), 2_000);
        // Arrival numbers are unique and increase in buffer order
        assert!(drained.windows(2).all(|w| w[0].arrival() < w[1].arrival()));
    }
}
