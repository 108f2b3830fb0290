//! Configuration for the liveness pipeline.

use crate::capture::types::SampleKind;
use crate::store::RetentionPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Time between snapshots when running continuously
    #[serde(with = "duration_serde")]
    pub snapshot_interval: Duration,

    /// Retention policy per sample kind
    pub retention: RetentionConfig,

    /// Path for exporting payloads
    pub export_path: PathBuf,

    /// Path for storing transparency logs
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sentinel-biometrics");

        Self {
            snapshot_interval: Duration::from_secs(5),
            retention: RetentionConfig::default(),
            export_path: data_dir.join("exports"),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a file, falling back to defaults if it is absent.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
            let config: Config =
                serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to a file.
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sentinel-biometrics")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path).map_err(|e| ConfigError::Io(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    }

    /// Reject settings that would make the pipeline useless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.snapshot_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "snapshot_interval must be at least one second".to_string(),
            ));
        }
        for kind in SampleKind::ALL {
            let policy = self.retention.policy_for(kind);
            if !policy.is_valid() {
                return Err(ConfigError::Invalid(format!(
                    "retention for {kind} must keep at least one sample"
                )));
            }
        }
        Ok(())
    }
}

/// Retention policy overrides per kind. Kinds not listed use their default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetentionConfig {
    overrides: BTreeMap<SampleKind, RetentionPolicy>,
}

impl RetentionConfig {
    /// Policy in force for a kind.
    pub fn policy_for(&self, kind: SampleKind) -> RetentionPolicy {
        self.overrides
            .get(&kind)
            .copied()
            .unwrap_or_else(|| RetentionPolicy::default_for(kind))
    }

    /// Override the policy for one kind.
    pub fn set(&mut self, kind: SampleKind, policy: RetentionPolicy) {
        self.overrides.insert(kind, policy);
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.snapshot_interval, Duration::from_secs(5));
        assert!(config.validate().is_ok());
        assert_eq!(
            config.retention.policy_for(SampleKind::KeyDown),
            RetentionPolicy::Window { millis: 30_000 }
        );
    }

    #[test]
    fn test_retention_override() {
        let mut retention = RetentionConfig::default();
        retention.set(
            SampleKind::Orientation,
            RetentionPolicy::Window { millis: 2_000 },
        );
        assert_eq!(
            retention.policy_for(SampleKind::Orientation),
            RetentionPolicy::Window { millis: 2_000 }
        );
        assert_eq!(
            retention.policy_for(SampleKind::Acceleration),
            RetentionPolicy::default_for(SampleKind::Acceleration)
        );
    }

    #[test]
    fn test_retention_json_format() {
        let json = r#"{"touch_start":{"policy":"capacity","max_samples":16}}"#;
        let retention: RetentionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            retention.policy_for(SampleKind::TouchStart),
            RetentionPolicy::Capacity { max_samples: 16 }
        );
    }

    #[test]
    fn test_invalid_retention_rejected() {
        let mut config = Config::default();
        config
            .retention
            .set(SampleKind::KeyUp, RetentionPolicy::Capacity { max_samples: 0 });
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir()
            .join(format!("sentinel-config-{}", uuid::Uuid::new_v4()))
            .join("config.json");

        let mut config = Config::default();
        config.snapshot_interval = Duration::from_secs(30);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.snapshot_interval, Duration::from_secs(30));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("sentinel-config-does-not-exist.json");
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.snapshot_interval, Duration::from_secs(5));
    }
}
