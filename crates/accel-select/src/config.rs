//! Selection configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::runtime::DeviceType;
use crate::version::VersionIdentifier;

/// Errors loading a [`SelectionConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not valid configuration.
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Which platforms and devices take part in enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Platforms reporting an older version are skipped.
    pub min_platform_version: VersionIdentifier,
    /// Device types to enumerate on each eligible platform.
    pub device_type: DeviceType,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_platform_version: VersionIdentifier::new(1, 2),
            device_type: DeviceType::ALL,
        }
    }
}

impl SelectionConfig {
    /// Configuration requiring at least `version`.
    #[must_use]
    pub fn with_min_version(version: VersionIdentifier) -> Self {
        Self {
            min_platform_version: version,
            ..Self::default()
        }
    }

    /// Restrict enumeration to `device_type`.
    #[must_use]
    pub const fn with_device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = device_type;
        self
    }

    /// Parse configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] if the document is malformed.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        debug!(path = %path.display(), ?config, "loaded selection config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = SelectionConfig::default();
        assert_eq!(config.min_platform_version, VersionIdentifier::new(1, 2));
        assert_eq!(config.device_type, DeviceType::ALL);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = SelectionConfig::from_json_str(r#"{ "min_platform_version": "2.0" }"#)
            .expect("parse");
        assert_eq!(config.min_platform_version, VersionIdentifier::new(2, 0));
        assert_eq!(config.device_type, DeviceType::ALL);

        let config = SelectionConfig::from_json_str(r#"{ "device_type": "gpu" }"#).expect("parse");
        assert_eq!(config.min_platform_version, VersionIdentifier::new(1, 2));
        assert_eq!(config.device_type, DeviceType::GPU);
    }

    #[test]
    fn rejects_bad_version() {
        let result = SelectionConfig::from_json_str(r#"{ "min_platform_version": "OpenCL" }"#);
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, r#"{{ "min_platform_version": "3.0", "device_type": "cpu|gpu" }}"#)
            .expect("write");
        let config = SelectionConfig::load(file.path()).expect("load");
        assert_eq!(
            config,
            SelectionConfig::with_min_version(VersionIdentifier::new(3, 0))
                .with_device_type(DeviceType::CPU | DeviceType::GPU)
        );
    }

    #[test]
    fn serde_roundtrip() {
        let config = SelectionConfig::with_min_version(VersionIdentifier::new(2, 1));
        let json = serde_json::to_string(&config).expect("serialize");
        assert_eq!(SelectionConfig::from_json_str(&json).expect("parse"), config);
    }
}
