/*!
Configuration management for the shutter command-line tool.
*/

use serde::{Deserialize, Serialize};
use shared::protocol::PREFERRED_PORT;
use shared::ActuatorSettings;
use std::path::Path;
use anyhow::{Context, Result};
use tracing::Level;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub shutter: ShutterConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self {
            shutter: ShutterConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize config to TOML")?;

        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Shutter specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutterConfig {
    /// Fixed serial port. When absent the port is chosen among the enumerated ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,

    /// Port picked by default when it is enumerated
    pub preferred_port: String,
}

impl ShutterConfig {
    /// Build actuator settings from enumerated ports, honouring a command-line override
    pub fn settings(&self, ports: Vec<String>, port_override: Option<String>) -> ActuatorSettings {
        let mut settings = ActuatorSettings::from_ports_preferring(ports, &self.preferred_port);
        if let Some(port) = port_override.or_else(|| self.port.clone()) {
            settings.port = Some(port);
        }
        settings
    }
}

impl Default for ShutterConfig {
    fn default() -> Self {
        Self {
            port: None,
            preferred_port: PREFERRED_PORT.to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error
    pub level: String,
}

impl LoggingConfig {
    pub fn level(&self) -> Level {
        self.level.parse().unwrap_or(Level::INFO)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_roundtrip() {
        let mut original_config = AppConfig::new();
        original_config.shutter.port = Some("/dev/ttyUSB0".to_string());

        let temp_file = NamedTempFile::new().unwrap();
        let temp_path = temp_file.path();

        // Save and load
        original_config.save_to_file(temp_path).unwrap();
        let loaded_config = AppConfig::load_from_file(temp_path).unwrap();

        // Compare (using debug format since we don't have PartialEq)
        assert_eq!(format!("{:?}", original_config), format!("{:?}", loaded_config));
    }

    #[test]
    fn test_default_values() {
        let config = AppConfig::new();

        assert_eq!(config.shutter.port, None);
        assert_eq!(config.shutter.preferred_port, "COM10");
        assert_eq!(config.logging.level(), Level::INFO);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.shutter.preferred_port, "COM10");
    }

    #[test]
    fn test_port_resolution() {
        let ports = vec!["COM1".to_string(), "COM2".to_string()];
        let mut shutter = ShutterConfig::default();
        assert_eq!(shutter.settings(ports.clone(), None).port.as_deref(), Some("COM1"));

        shutter.preferred_port = "COM2".to_string();
        assert_eq!(shutter.settings(ports.clone(), None).port.as_deref(), Some("COM2"));

        shutter.port = Some("COM7".to_string());
        assert_eq!(shutter.settings(ports.clone(), None).port.as_deref(), Some("COM7"));
        assert_eq!(
            shutter.settings(ports, Some("COM9".to_string())).port.as_deref(),
            Some("COM9")
        );
    }

    #[test]
    fn test_bad_level_falls_back_to_info() {
        let logging = LoggingConfig { level: "chatty".to_string() };
        assert_eq!(logging.level(), Level::INFO);
    }
}
