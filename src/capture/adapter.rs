//! Boundary between platform event callbacks and the store.
//!
//! The adapter is the store's only producer. It normalizes raw platform
//! values into [`Sample`]s and appends them; malformed input is reported
//! back to the caller, never swallowed.

use crate::capture::types::{Sample, SampleKind, SampleValue};
use crate::store::{MalformedSampleError, SharedStore};
use crate::transparency::SharedTransparencyLog;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A raw value as reported by a platform callback.
///
/// Numeric fields are optional because platforms report missing axes or
/// forces as null.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    Orientation {
        alpha: Option<f64>,
        beta: Option<f64>,
        gamma: Option<f64>,
    },
    Motion {
        x: Option<f64>,
        y: Option<f64>,
        z: Option<f64>,
    },
    Key {
        key: String,
    },
    Touch {
        force: Option<f64>,
        radius_x: Option<f64>,
        radius_y: Option<f64>,
    },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct OrientationFields {
    alpha: Option<f64>,
    beta: Option<f64>,
    gamma: Option<f64>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MotionFields {
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct KeyFields {
    key: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TouchFields {
    force: Option<f64>,
    #[serde(default)]
    radius_x: Option<f64>,
    #[serde(default)]
    radius_y: Option<f64>,
}

impl RawValue {
    /// Parse a JSON payload using the shape dictated by `kind`.
    pub fn from_json(kind: SampleKind, value: serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            SampleKind::Orientation => {
                let f: OrientationFields = serde_json::from_value(value)?;
                RawValue::Orientation {
                    alpha: f.alpha,
                    beta: f.beta,
                    gamma: f.gamma,
                }
            }
            SampleKind::Acceleration => {
                let f: MotionFields = serde_json::from_value(value)?;
                RawValue::Motion {
                    x: f.x,
                    y: f.y,
                    z: f.z,
                }
            }
            SampleKind::KeyDown | SampleKind::KeyUp => {
                let f: KeyFields = serde_json::from_value(value)?;
                RawValue::Key { key: f.key }
            }
            SampleKind::TouchStart => {
                let f: TouchFields = serde_json::from_value(value)?;
                RawValue::Touch {
                    force: f.force,
                    radius_x: f.radius_x,
                    radius_y: f.radius_y,
                }
            }
        })
    }
}

/// One raw platform event, as carried over a channel or a JSONL file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEventRepr")]
pub struct RawEvent {
    pub kind: SampleKind,
    /// Capture time, Unix milliseconds
    pub timestamp: i64,
    pub value: RawValue,
}

#[derive(Deserialize)]
struct RawEventRepr {
    kind: SampleKind,
    timestamp: i64,
    value: serde_json::Value,
}

impl TryFrom<RawEventRepr> for RawEvent {
    type Error = serde_json::Error;

    fn try_from(repr: RawEventRepr) -> Result<Self, Self::Error> {
        let value = RawValue::from_json(repr.kind, repr.value)?;
        Ok(Self::new(repr.kind, value, repr.timestamp))
    }
}

impl RawEvent {
    pub fn new(kind: SampleKind, value: RawValue, timestamp: i64) -> Self {
        Self {
            kind,
            timestamp,
            value,
        }
    }
}

/// Errors returned by [`CaptureAdapter::submit`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CaptureError {
    #[error("raw {value} value cannot describe a {kind} event")]
    KindMismatch {
        kind: SampleKind,
        value: &'static str,
    },

    #[error(transparent)]
    Malformed(#[from] MalformedSampleError),
}

/// Normalizes platform events and appends them to the store.
#[derive(Clone)]
pub struct CaptureAdapter {
    store: SharedStore,
    transparency: Option<SharedTransparencyLog>,
}

impl CaptureAdapter {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            transparency: None,
        }
    }

    /// Count accepted and rejected samples in a transparency log.
    pub fn with_transparency(mut self, log: SharedTransparencyLog) -> Self {
        self.transparency = Some(log);
        self
    }

    /// The store this adapter feeds.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Normalize and append one platform event.
    ///
    /// Returns the store's arrival sequence number for the sample.
    pub fn submit(
        &self,
        kind: SampleKind,
        raw: RawValue,
        timestamp_millis: i64,
    ) -> Result<u64, CaptureError> {
        let result = normalize(kind, raw)
            .map(|value| Sample::new(kind, value, timestamp_millis))
            .and_then(|sample| self.store.append(sample).map_err(CaptureError::from));

        match &result {
            Ok(_) => {
                if let Some(ref log) = self.transparency {
                    log.record_accepted(kind);
                }
            }
            Err(e) => {
                tracing::warn!(%kind, error = %e, "rejected sample");
                if let Some(ref log) = self.transparency {
                    log.record_rejected(kind);
                }
            }
        }
        result
    }

    /// Submit a [`RawEvent`].
    pub fn submit_event(&self, event: RawEvent) -> Result<u64, CaptureError> {
        self.submit(event.kind, event.value, event.timestamp)
    }

    /// Device orientation callback. Captured at the current time.
    pub fn on_orientation(
        &self,
        alpha: Option<f64>,
        beta: Option<f64>,
        gamma: Option<f64>,
    ) -> Result<u64, CaptureError> {
        self.submit(
            SampleKind::Orientation,
            RawValue::Orientation { alpha, beta, gamma },
            now_millis(),
        )
    }

    /// Device motion callback. Captured at the current time.
    pub fn on_motion(
        &self,
        x: Option<f64>,
        y: Option<f64>,
        z: Option<f64>,
    ) -> Result<u64, CaptureError> {
        self.submit(
            SampleKind::Acceleration,
            RawValue::Motion { x, y, z },
            now_millis(),
        )
    }

    /// Key press callback. Captured at the current time.
    pub fn on_key_down(&self, key: impl Into<String>) -> Result<u64, CaptureError> {
        self.submit(
            SampleKind::KeyDown,
            RawValue::Key { key: key.into() },
            now_millis(),
        )
    }

    /// Key release callback. Captured at the current time.
    pub fn on_key_up(&self, key: impl Into<String>) -> Result<u64, CaptureError> {
        self.submit(
            SampleKind::KeyUp,
            RawValue::Key { key: key.into() },
            now_millis(),
        )
    }

    /// Touch start callback for the first contact point. Captured at the current time.
    pub fn on_touch_start(
        &self,
        force: Option<f64>,
        radius_x: Option<f64>,
        radius_y: Option<f64>,
    ) -> Result<u64, CaptureError> {
        self.submit(
            SampleKind::TouchStart,
            RawValue::Touch {
                force,
                radius_x,
                radius_y,
            },
            now_millis(),
        )
    }
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Map a raw platform value onto the sample payload for `kind`.
///
/// Missing orientation axes are a malformed sample. Missing motion axes,
/// touch force and radii default to zero, as platforms without the
/// hardware report them as null.
fn normalize(kind: SampleKind, raw: RawValue) -> Result<SampleValue, CaptureError> {
    let mismatch = |value: &'static str| CaptureError::KindMismatch { kind, value };

    match (kind, raw) {
        (SampleKind::Orientation, RawValue::Orientation { alpha, beta, gamma }) => {
            match (alpha, beta, gamma) {
                (Some(alpha), Some(beta), Some(gamma)) => {
                    Ok(SampleValue::Orientation { alpha, beta, gamma })
                }
                _ => Err(CaptureError::Malformed(MalformedSampleError {
                    kind,
                    reason: "orientation axis missing".to_string(),
                })),
            }
        }
        (SampleKind::Acceleration, RawValue::Motion { x, y, z }) => Ok(SampleValue::Acceleration {
            x: x.unwrap_or(0.0),
            y: y.unwrap_or(0.0),
            z: z.unwrap_or(0.0),
        }),
        (SampleKind::KeyDown | SampleKind::KeyUp, RawValue::Key { key }) => {
            Ok(SampleValue::Key { key })
        }
        (
            SampleKind::TouchStart,
            RawValue::Touch {
                force,
                radius_x,
                radius_y,
            },
        ) => Ok(SampleValue::Touch {
            force: force.unwrap_or(0.0),
            radius_x: radius_x.unwrap_or(0.0),
            radius_y: radius_y.unwrap_or(0.0),
        }),
        (_, RawValue::Orientation { .. }) => Err(mismatch("orientation")),
        (_, RawValue::Motion { .. }) => Err(mismatch("motion")),
        (_, RawValue::Key { .. }) => Err(mismatch("key")),
        (_, RawValue::Touch { .. }) => Err(mismatch("touch")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RingBufferStore;
    use crate::transparency::create_shared_log;
    use std::sync::Arc;

    fn adapter() -> CaptureAdapter {
        CaptureAdapter::new(RingBufferStore::shared())
    }

    #[test]
    fn test_submit_appends_to_store() {
        let adapter = adapter();
        adapter
            .submit(
                SampleKind::Orientation,
                RawValue::Orientation {
                    alpha: Some(1.0),
                    beta: Some(2.0),
                    gamma: Some(3.0),
                },
                1_000,
            )
            .unwrap();

        let samples = adapter.store().peek(SampleKind::Orientation);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].captured_at_millis(), 1_000);
    }

    #[test]
    fn test_missing_motion_axes_default_to_zero() {
        let adapter = adapter();
        adapter.on_motion(Some(1.0), None, None).unwrap();

        let samples = adapter.store().peek(SampleKind::Acceleration);
        assert_eq!(
            samples[0].value(),
            &SampleValue::Acceleration {
                x: 1.0,
                y: 0.0,
                z: 0.0
            }
        );
    }

    #[test]
    fn test_missing_orientation_axis_is_malformed() {
        let adapter = adapter();
        let err = adapter.on_orientation(Some(1.0), None, Some(3.0)).unwrap_err();
        assert!(matches!(err, CaptureError::Malformed(_)));
    }

    #[test]
    fn test_touch_without_force_is_zero_pressure() {
        let adapter = adapter();
        adapter.on_touch_start(None, Some(4.0), None).unwrap();
        let samples = adapter.store().peek(SampleKind::TouchStart);
        assert!(matches!(samples[0].value(), SampleValue::Touch { force, .. } if *force == 0.0));
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let adapter = adapter();
        let err = adapter
            .submit(
                SampleKind::TouchStart,
                RawValue::Key {
                    key: "a".to_string(),
                },
                1,
            )
            .unwrap_err();
        assert_eq!(
            err,
            CaptureError::KindMismatch {
                kind: SampleKind::TouchStart,
                value: "key"
            }
        );
    }

    #[test]
    fn test_non_finite_rejected_and_counted() {
        let log = create_shared_log();
        let adapter = adapter().with_transparency(Arc::clone(&log));

        let err = adapter.on_motion(Some(f64::NAN), Some(0.0), Some(0.0)).unwrap_err();
        assert!(matches!(err, CaptureError::Malformed(_)));
        adapter.on_key_down("a").unwrap();

        let stats = log.stats();
        assert_eq!(stats.rejected(SampleKind::Acceleration), 1);
        assert_eq!(stats.accepted(SampleKind::KeyDown), 1);
    }

    #[test]
    fn test_raw_event_shape_follows_kind() {
        let line = r#"{"kind":"orientation","timestamp":5,"value":{"force":0.4}}"#;
        assert!(serde_json::from_str::<RawEvent>(line).is_err());

        let line = r#"{"kind":"key_up","timestamp":5,"value":{"key":"Enter"}}"#;
        let event: RawEvent = serde_json::from_str(line).unwrap();
        assert_eq!(
            event.value,
            RawValue::Key {
                key: "Enter".to_string()
            }
        );
    }

    #[test]
    fn test_raw_event_json() {
        let line = r#"{"kind":"touch_start","timestamp":5,"value":{"force":0.4}}"#;
        let event: RawEvent = serde_json::from_str(line).unwrap();
        assert_eq!(event.kind, SampleKind::TouchStart);

        let adapter = adapter();
        adapter.submit_event(event).unwrap();
        assert_eq!(adapter.store().len(SampleKind::TouchStart), 1);
    }
}
