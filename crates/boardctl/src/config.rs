//! Board connection configuration.
//!
//! Every field has a default matching the stock RasPi extension board setup,
//! so a config file only needs to list what differs:
//!
//! ```yaml
//! device: /dev/ttyUSB0
//! command_timeout_ms: 8000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BoardError, Result};

/// Configuration for talking to the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoardConfig {
    /// Serial device path.
    pub device: String,

    /// Serial baud rate.
    pub baud_rate: u32,

    /// Timeout for a single port read (milliseconds).
    /// Keeps the read loop responsive when the board is silent.
    pub read_timeout_ms: u64,

    /// Overall deadline for one command exchange (milliseconds).
    pub command_timeout_ms: u64,

    /// Path of the lock file that serializes access to the board.
    pub lock_path: PathBuf,

    /// Give up waiting for the lock after this long (milliseconds).
    /// If None, wait until the lock is free.
    pub lock_wait_timeout_ms: Option<u64>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        BoardConfig {
            device: "/dev/ttyAMA0".to_string(),
            baud_rate: 9600,
            read_timeout_ms: 200,
            command_timeout_ms: 5000,
            lock_path: PathBuf::from("/var/tmp/boardctl.lock"),
            lock_wait_timeout_ms: None,
        }
    }
}

impl BoardConfig {
    /// Load a configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| BoardError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml(&text)
            .map_err(|e| BoardError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse a configuration from YAML text.
    pub fn from_yaml(text: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Check values that would make the board unusable.
    pub fn validate(&self) -> Result<()> {
        if self.device.is_empty() {
            return Err(BoardError::Config("device must not be empty".to_string()));
        }
        if self.baud_rate == 0 {
            return Err(BoardError::Config("baud_rate must be positive".to_string()));
        }
        if self.read_timeout_ms == 0 {
            return Err(BoardError::Config("read_timeout_ms must be positive".to_string()));
        }
        if self.command_timeout_ms < self.read_timeout_ms {
            return Err(BoardError::Config(format!(
                "command_timeout_ms ({}) must not be shorter than read_timeout_ms ({})",
                self.command_timeout_ms, self.read_timeout_ms
            )));
        }
        Ok(())
    }

    /// Per-read timeout as a [`Duration`].
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Command deadline as a [`Duration`].
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Bounded lock wait, if configured.
    pub fn lock_wait_timeout(&self) -> Option<Duration> {
        self.lock_wait_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BoardConfig::default();
        assert_eq!(config.device, "/dev/ttyAMA0");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.read_timeout(), Duration::from_millis(200));
        assert_eq!(config.command_timeout(), Duration::from_secs(5));
        assert_eq!(config.lock_path, PathBuf::from("/var/tmp/boardctl.lock"));
        assert!(config.lock_wait_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = BoardConfig::from_yaml("device: /dev/ttyUSB0\nlock_wait_timeout_ms: 1500\n").unwrap();
        assert_eq!(config.device, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.lock_wait_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(BoardConfig::from_yaml("").unwrap(), BoardConfig::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(BoardConfig::from_yaml("baud: 115200\n").is_err());
    }

    #[test]
    fn test_validate_rejects_short_deadline() {
        let config = BoardConfig {
            command_timeout_ms: 100,
            ..BoardConfig::default()
        };
        assert!(matches!(config.validate(), Err(BoardError::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let err = BoardConfig::load("/nonexistent/boardctl.yaml").unwrap_err();
        assert!(matches!(err, BoardError::Config(_)));
    }
}
