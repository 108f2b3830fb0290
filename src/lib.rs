//! Sentinel Biometrics - behavioral telemetry aggregation for liveness signals.
//!
//! This library buffers low-level input and sensor events from a client
//! device and collapses them, on demand, into a compact statistical feature
//! vector that a remote risk-scoring service uses to judge whether the
//! interaction came from a human.
//!
//! # Guarantees
//!
//! - **Read once**: every accepted sample is returned by exactly one drain,
//!   or evicted by its channel's retention policy
//! - **Per-kind locking**: a burst on one channel never stalls another
//! - **Total features**: empty input, clock skew and out-of-range values all
//!   reduce to defined numbers
//! - **Aggregates only**: key identifiers are used for pairing and never
//!   appear in the payload
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Sentinel Biometrics                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐         │
//! │  │   Capture   │──▶│ Ring Buffer │──▶│  Snapshot   │         │
//! │  │   Adapter   │   │    Store    │   │  Assembler  │         │
//! │  └─────────────┘   └─────────────┘   └─────────────┘         │
//! │         │                                   │                │
//! │         ▼                                   ▼                │
//! │  ┌─────────────┐                    ┌─────────────┐          │
//! │  │Transparency │                    │  Liveness   │          │
//! │  │    Log      │                    │  Payload    │          │
//! │  └─────────────┘                    └─────────────┘          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use sentinel_biometrics::{CaptureAdapter, PayloadBuilder, RingBufferStore, SnapshotAssembler};
//!
//! let store = RingBufferStore::shared();
//! let adapter = CaptureAdapter::new(Arc::clone(&store));
//! let assembler = SnapshotAssembler::new(store);
//!
//! adapter.on_orientation(Some(0.0), Some(12.5), Some(-3.0)).unwrap();
//! adapter.on_key_down("a").unwrap();
//! adapter.on_key_up("a").unwrap();
//!
//! let features = assembler.take_snapshot();
//! assert_eq!(features.sample_count, 3);
//!
//! let payload = PayloadBuilder::new().build(&features);
//! assert_eq!(payload.raw_sample_count, 3);
//! ```

pub mod capture;
pub mod config;
pub mod core;
pub mod store;
pub mod transparency;

// Re-export key types at crate root for convenience
pub use capture::{CaptureAdapter, CaptureError, EventPump, RawEvent, RawValue, Sample, SampleKind};
pub use config::{Config, ConfigError, RetentionConfig};
pub use core::{
    compute_features, FeatureVector, LivenessPayload, PayloadBuilder, SnapshotAssembler,
};
pub use store::{MalformedSampleError, RetentionPolicy, RingBufferStore, SharedStore};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Declaration of what the liveness signal contains.
pub const SIGNAL_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║            SENTINEL BIOMETRICS - SIGNAL DECLARATION              ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This pipeline summarizes interaction telemetry for risk         ║
║  scoring.                                                        ║
║                                                                  ║
║  ✓ WHAT THE SIGNAL CONTAINS:                                     ║
║    • Variance of device tilt (front/back axis)                   ║
║    • Mean key hold duration                                      ║
║    • Mean touch pressure                                         ║
║    • Mean device acceleration                                    ║
║    • Sample counts per event type                                ║
║                                                                  ║
║  ✗ WHAT THE SIGNAL NEVER CONTAINS:                               ║
║    • Which keys were pressed                                     ║
║    • Individual events or their timestamps                       ║
║    • Touch coordinates or screen content                         ║
║                                                                  ║
║  Raw samples are held in memory only until the next snapshot     ║
║  and are discarded once reduced.                                 ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
