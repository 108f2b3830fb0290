//! Transparency log of what the pipeline has ingested and emitted.
//!
//! Only counts are kept. No sample values, key identifiers or timestamps of
//! individual events are ever recorded here.

use crate::capture::types::SampleKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const KINDS: usize = SampleKind::ALL.len();

/// Counters for the current session.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Samples accepted into the store, per kind
    accepted: [AtomicU64; KINDS],
    /// Samples rejected as malformed, per kind
    rejected: [AtomicU64; KINDS],
    /// Samples removed by retention policies, per kind
    evicted: [AtomicU64; KINDS],
    /// Samples handed to feature extraction, per kind
    drained: [AtomicU64; KINDS],
    /// Number of snapshots taken
    snapshots_taken: AtomicU64,
    /// Number of payloads exported
    payloads_exported: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    /// Create a new transparency log.
    pub fn new() -> Self {
        Self {
            accepted: Default::default(),
            rejected: Default::default(),
            evicted: Default::default(),
            drained: Default::default(),
            snapshots_taken: AtomicU64::new(0),
            payloads_exported: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a transparency log with persistence.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        // Try to load existing stats
        if let Err(e) = log.load() {
            tracing::warn!(error = %e, "could not load previous transparency stats");
        }

        log
    }

    /// Record an accepted sample.
    pub fn record_accepted(&self, kind: SampleKind) {
        self.accepted[kind.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected sample.
    pub fn record_rejected(&self, kind: SampleKind) {
        self.rejected[kind.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Record samples removed by a retention policy.
    pub fn record_evicted(&self, kind: SampleKind, count: u64) {
        self.evicted[kind.index()].fetch_add(count, Ordering::Relaxed);
    }

    /// Record samples consumed by a snapshot.
    pub fn record_drained(&self, kind: SampleKind, count: u64) {
        self.drained[kind.index()].fetch_add(count, Ordering::Relaxed);
    }

    /// Record a snapshot.
    pub fn record_snapshot(&self) {
        self.snapshots_taken.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an exported payload.
    pub fn record_payload_exported(&self) {
        self.payloads_exported.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> TransparencyStats {
        let per_kind = |counters: &[AtomicU64; KINDS]| -> BTreeMap<SampleKind, u64> {
            SampleKind::ALL
                .iter()
                .map(|&kind| (kind, counters[kind.index()].load(Ordering::Relaxed)))
                .collect()
        };

        TransparencyStats {
            accepted: per_kind(&self.accepted),
            rejected: per_kind(&self.rejected),
            evicted: per_kind(&self.evicted),
            drained: per_kind(&self.drained),
            snapshots_taken: self.snapshots_taken.load(Ordering::Relaxed),
            payloads_exported: self.payloads_exported.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        let mut lines = vec!["Session Statistics:".to_string()];
        for kind in SampleKind::ALL {
            lines.push(format!(
                "- {kind}: {} accepted, {} rejected, {} evicted, {} drained",
                stats.accepted(kind),
                stats.rejected(kind),
                stats.evicted(kind),
                stats.drained(kind)
            ));
        }
        lines.push(format!("- Snapshots taken: {}", stats.snapshots_taken));
        lines.push(format!("- Payloads exported: {}", stats.payloads_exported));
        lines.push(format!(
            "- Session duration: {} seconds",
            stats.session_duration_secs
        ));
        lines.push(String::new());
        lines.push("Signal Contents:".to_string());
        lines.push("- Aggregate statistics only".to_string());
        lines.push("- Key identifiers never leave the device".to_string());
        lines.join("\n")
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            // Ensure parent directory exists
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                accepted: stats.accepted,
                rejected: stats.rejected,
                evicted: stats.evicted,
                drained: stats.drained,
                snapshots_taken: stats.snapshots_taken,
                payloads_exported: stats.payloads_exported,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Load stats from disk.
    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                for (&kind, &n) in &persisted.accepted {
                    self.accepted[kind.index()].store(n, Ordering::Relaxed);
                }
                for (&kind, &n) in &persisted.rejected {
                    self.rejected[kind.index()].store(n, Ordering::Relaxed);
                }
                for (&kind, &n) in &persisted.evicted {
                    self.evicted[kind.index()].store(n, Ordering::Relaxed);
                }
                for (&kind, &n) in &persisted.drained {
                    self.drained[kind.index()].store(n, Ordering::Relaxed);
                }
                self.snapshots_taken
                    .store(persisted.snapshots_taken, Ordering::Relaxed);
                self.payloads_exported
                    .store(persisted.payloads_exported, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counters in [&self.accepted, &self.rejected, &self.evicted, &self.drained] {
            for counter in counters {
                counter.store(0, Ordering::Relaxed);
            }
        }
        self.snapshots_taken.store(0, Ordering::Relaxed);
        self.payloads_exported.store(0, Ordering::Relaxed);
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of transparency statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub accepted: BTreeMap<SampleKind, u64>,
    pub rejected: BTreeMap<SampleKind, u64>,
    pub evicted: BTreeMap<SampleKind, u64>,
    pub drained: BTreeMap<SampleKind, u64>,
    pub snapshots_taken: u64,
    pub payloads_exported: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

impl TransparencyStats {
    pub fn accepted(&self, kind: SampleKind) -> u64 {
        self.accepted.get(&kind).copied().unwrap_or(0)
    }

    pub fn rejected(&self, kind: SampleKind) -> u64 {
        self.rejected.get(&kind).copied().unwrap_or(0)
    }

    pub fn evicted(&self, kind: SampleKind) -> u64 {
        self.evicted.get(&kind).copied().unwrap_or(0)
    }

    pub fn drained(&self, kind: SampleKind) -> u64 {
        self.drained.get(&kind).copied().unwrap_or(0)
    }

    /// Accepted samples across all kinds.
    pub fn total_accepted(&self) -> u64 {
        self.accepted.values().sum()
    }
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    accepted: BTreeMap<SampleKind, u64>,
    rejected: BTreeMap<SampleKind, u64>,
    #[serde(default)]
    evicted: BTreeMap<SampleKind, u64>,
    drained: BTreeMap<SampleKind, u64>,
    snapshots_taken: u64,
    payloads_exported: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared transparency log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

/// Create a new shared transparency log.
pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

/// Create a new shared transparency log with persistence.
pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTransparencyLog {
    Arc::new(TransparencyLog::with_persistence(path))
}
