//! Sample types shared by the capture adapter, the store and the extractors.
//!
//! A [`Sample`] is one normalized observation. Its payload is a
//! [`SampleValue`] whose shape is dictated by the [`SampleKind`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of a sample. Each kind is buffered in its own channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleKind {
    /// Device orientation (alpha/beta/gamma, degrees)
    Orientation,
    /// Device acceleration (x/y/z, m/s²)
    Acceleration,
    /// Key pressed
    KeyDown,
    /// Key released
    KeyUp,
    /// Touch contact started
    TouchStart,
}

impl SampleKind {
    /// Every registered kind, in channel order.
    pub const ALL: [SampleKind; 5] = [
        SampleKind::Orientation,
        SampleKind::Acceleration,
        SampleKind::KeyDown,
        SampleKind::KeyUp,
        SampleKind::TouchStart,
    ];

    /// Position of this kind in [`SampleKind::ALL`].
    pub fn index(self) -> usize {
        match self {
            SampleKind::Orientation => 0,
            SampleKind::Acceleration => 1,
            SampleKind::KeyDown => 2,
            SampleKind::KeyUp => 3,
            SampleKind::TouchStart => 4,
        }
    }

    /// Stable lowercase name, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            SampleKind::Orientation => "orientation",
            SampleKind::Acceleration => "acceleration",
            SampleKind::KeyDown => "key_down",
            SampleKind::KeyUp => "key_up",
            SampleKind::TouchStart => "touch_start",
        }
    }

    /// Whether this kind carries a key identifier payload.
    pub fn is_key(self) -> bool {
        matches!(self, SampleKind::KeyDown | SampleKind::KeyUp)
    }
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SampleKind {
    type Err = UnknownSampleKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SampleKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownSampleKind(s.to_string()))
    }
}

/// A channel name that does not match any registered kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sample kind: {0}")]
pub struct UnknownSampleKind(pub String);

/// Kind-specific sample payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    /// Rotation around the z (alpha), x (beta) and y (gamma) axes
    Orientation { alpha: f64, beta: f64, gamma: f64 },
    /// Linear acceleration excluding gravity
    Acceleration { x: f64, y: f64, z: f64 },
    /// Key identifier as reported by the platform
    Key { key: String },
    /// Touch force (expected 0-1) and contact radii
    Touch {
        force: f64,
        #[serde(default)]
        radius_x: f64,
        #[serde(default)]
        radius_y: f64,
    },
}

impl SampleValue {
    /// Short name of the payload shape, used in error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            SampleValue::Orientation { .. } => "orientation",
            SampleValue::Acceleration { .. } => "acceleration",
            SampleValue::Key { .. } => "key",
            SampleValue::Touch { .. } => "touch",
        }
    }

    /// Whether this payload shape is valid for the given kind.
    pub fn fits(&self, kind: SampleKind) -> bool {
        matches!(
            (kind, self),
            (SampleKind::Orientation, SampleValue::Orientation { .. })
                | (SampleKind::Acceleration, SampleValue::Acceleration { .. })
                | (SampleKind::KeyDown, SampleValue::Key { .. })
                | (SampleKind::KeyUp, SampleValue::Key { .. })
                | (SampleKind::TouchStart, SampleValue::Touch { .. })
        )
    }

    /// Numeric fields of the payload, for finiteness checks.
    pub(crate) fn numbers(&self) -> Vec<(&'static str, f64)> {
        match self {
            SampleValue::Orientation { alpha, beta, gamma } => {
                vec![("alpha", *alpha), ("beta", *beta), ("gamma", *gamma)]
            }
            SampleValue::Acceleration { x, y, z } => vec![("x", *x), ("y", *y), ("z", *z)],
            SampleValue::Key { .. } => Vec::new(),
            SampleValue::Touch {
                force,
                radius_x,
                radius_y,
            } => vec![
                ("force", *force),
                ("radius_x", *radius_x),
                ("radius_y", *radius_y),
            ],
        }
    }
}

/// A single immutable observation.
///
/// The arrival sequence is assigned by the store when the sample is accepted
/// and records the order in which appends were linearized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    kind: SampleKind,
    value: SampleValue,
    captured_at_millis: i64,
    #[serde(default)]
    arrival: u64,
}

impl Sample {
    /// Create a new sample. It is not validated until appended to a store.
    pub fn new(kind: SampleKind, value: SampleValue, captured_at_millis: i64) -> Self {
        Self {
            kind,
            value,
            captured_at_millis,
            arrival: 0,
        }
    }

    pub fn orientation(alpha: f64, beta: f64, gamma: f64, captured_at_millis: i64) -> Self {
        Self::new(
            SampleKind::Orientation,
            SampleValue::Orientation { alpha, beta, gamma },
            captured_at_millis,
        )
    }

    pub fn acceleration(x: f64, y: f64, z: f64, captured_at_millis: i64) -> Self {
        Self::new(
            SampleKind::Acceleration,
            SampleValue::Acceleration { x, y, z },
            captured_at_millis,
        )
    }

    pub fn key_down(key: impl Into<String>, captured_at_millis: i64) -> Self {
        Self::new(
            SampleKind::KeyDown,
            SampleValue::Key { key: key.into() },
            captured_at_millis,
        )
    }

    pub fn key_up(key: impl Into<String>, captured_at_millis: i64) -> Self {
        Self::new(
            SampleKind::KeyUp,
            SampleValue::Key { key: key.into() },
            captured_at_millis,
        )
    }

    pub fn touch(force: f64, radius_x: f64, radius_y: f64, captured_at_millis: i64) -> Self {
        Self::new(
            SampleKind::TouchStart,
            SampleValue::Touch {
                force,
                radius_x,
                radius_y,
            },
            captured_at_millis,
        )
    }

    pub fn kind(&self) -> SampleKind {
        self.kind
    }

    pub fn value(&self) -> &SampleValue {
        &self.value
    }

    pub fn captured_at_millis(&self) -> i64 {
        self.captured_at_millis
    }

    /// Arrival sequence number assigned by the store (0 before acceptance).
    pub fn arrival(&self) -> u64 {
        self.arrival
    }

    /// Key identifier for key samples.
    pub fn key(&self) -> Option<&str> {
        match &self.value {
            SampleValue::Key { key } => Some(key.as_str()),
            _ => None,
        }
    }

    pub(crate) fn stamped(mut self, arrival: u64) -> Self {
        self.arrival = arrival;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_index_matches_all() {
        for (i, kind) in SampleKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_value_fits_kind() {
        let key = SampleValue::Key {
            key: "a".to_string(),
        };
        assert!(key.fits(SampleKind::KeyDown));
        assert!(key.fits(SampleKind::KeyUp));
        assert!(!key.fits(SampleKind::Orientation));

        let touch = SampleValue::Touch {
            force: 0.5,
            radius_x: 1.0,
            radius_y: 1.0,
        };
        assert!(touch.fits(SampleKind::TouchStart));
        assert!(!touch.fits(SampleKind::Acceleration));
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&SampleKind::TouchStart).unwrap();
        assert_eq!(json, "\"touch_start\"");
        assert_eq!(SampleKind::KeyDown.to_string(), "key_down");
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("key_up".parse::<SampleKind>(), Ok(SampleKind::KeyUp));
        assert!("gyro".parse::<SampleKind>().is_err());
    }

    #[test]
    fn test_sample_key_accessor() {
        let sample = Sample::key_down("Shift", 10);
        assert_eq!(sample.key(), Some("Shift"));
        assert_eq!(sample.arrival(), 0);
        assert_eq!(Sample::orientation(0.0, 1.0, 2.0, 10).key(), None);
    }
}
