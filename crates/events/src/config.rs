use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::Result;

/// What dispatch does when a handler returns an error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failing handler and return its error.
    /// Handlers after it in the same pass do not run.
    #[default]
    FailFast,
    /// Run every handler, then report all failures together
    Isolate,
}

/// Registry behaviour settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Handling of handler errors during dispatch
    pub failure_policy: FailurePolicy,
    /// Emit a debug event when dispatching a key nobody listens to
    pub log_unhandled: bool,
}

impl RegistryConfig {
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Read config from a JSON file, falling back to defaults
    pub fn read(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "Config file does not exist, using defaults");
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match Self::from_json(&content) {
                Ok(config) => {
                    debug!(path = %path.display(), "Config loaded successfully");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read config file, using defaults");
                Self::default()
            }
        }
    }

    /// Write config as pretty JSON, creating parent directories as needed
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        debug!(path = %path.display(), "Config saved successfully");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = RegistryConfig::default();
        assert_eq!(config.failure_policy, FailurePolicy::FailFast);
        assert!(!config.log_unhandled);
    }

    #[test]
    fn test_config_from_json_partial() {
        let config = RegistryConfig::from_json(r#"{"failure_policy": "isolate"}"#).unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::Isolate);
        assert!(!config.log_unhandled);
    }

    #[test]
    fn test_config_from_json_invalid_policy() {
        let result = RegistryConfig::from_json(r#"{"failure_policy": "retry"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_read_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let config = RegistryConfig::read(&temp_dir.path().join("missing.json"));
        assert_eq!(config, RegistryConfig::default());
    }

    #[test]
    fn test_config_read_invalid_falls_back() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("events.json");
        std::fs::write(&path, "not json").unwrap();

        let config = RegistryConfig::read(&path);
        assert_eq!(config, RegistryConfig::default());
    }

    #[test]
    fn test_config_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("events.json");

        let config = RegistryConfig {
            failure_policy: FailurePolicy::Isolate,
            log_unhandled: true,
        };
        config.write(&path).unwrap();

        let loaded = RegistryConfig::read(&path);
        assert_eq!(loaded, config);
    }
}
