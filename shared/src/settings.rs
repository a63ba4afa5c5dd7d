/*!
Configuration surface consumed from the host framework.

Port enumeration happens when settings are built, through an explicit call,
never as a side effect of loading the library.
*/

use crate::channel::{enumerate_ports, SerialBackend};
use crate::error::{Result, SharedError};
use crate::protocol::{BAUD_RATE, EPSILON, MAX_BOUND, MIN_BOUND, PREFERRED_PORT};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Host parameter name of the port selection
pub const PORT_SETTING: &str = "COM_port";

/// Serial parameters of a channel. The baud rate is fixed by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub port: String,
    pub baud_rate: u32,
}

impl ChannelConfig {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: BAUD_RATE,
        }
    }
}

/// Value range used by the host UI for clamping. Not enforced by the core.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub enabled: bool,
    pub min: f64,
    pub max: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            enabled: true,
            min: MIN_BOUND,
            max: MAX_BOUND,
        }
    }
}

/// Actuator settings as exposed to the host framework
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorSettings {
    /// Selected port, `None` when nothing could be selected
    pub port: Option<String>,

    /// Ports enumerated when the settings were built
    pub available_ports: Vec<String>,

    pub bounds: Bounds,

    pub epsilon: f64,
}

impl ActuatorSettings {
    /// Build settings from a list of enumerated ports.
    ///
    /// The preferred port wins when present, otherwise the first port,
    /// otherwise nothing is selected and initialization will fail fast.
    pub fn from_ports(ports: Vec<String>) -> Self {
        Self::from_ports_preferring(ports, PREFERRED_PORT)
    }

    pub fn from_ports_preferring(ports: Vec<String>, preferred: &str) -> Self {
        let port = select_default_port(&ports, preferred);
        Self {
            port,
            available_ports: ports,
            bounds: Bounds::default(),
            epsilon: EPSILON,
        }
    }

    /// Enumerate the backend's ports and build settings from them
    pub fn discover(backend: &dyn SerialBackend) -> Result<Self> {
        Ok(Self::from_ports(enumerate_ports(backend)?))
    }

    /// Channel configuration for the selected port, if any
    pub fn channel_config(&self) -> Option<ChannelConfig> {
        self.port.as_deref().map(ChannelConfig::new)
    }

    /// Translate a host parameter change into a [`SettingChange`].
    ///
    /// Bounds fields are merged into the current bounds. Parameters this
    /// driver does not act on (timeouts, axis names, ...) yield `None`.
    pub fn change_from_named(&self, name: &str, value: &str) -> Result<Option<SettingChange>> {
        let value = value.trim();
        let change = match name.to_ascii_lowercase().as_str() {
            "com_port" => SettingChange::Port((!value.is_empty()).then(|| value.to_string())),
            "epsilon" => SettingChange::Epsilon(parse_number(name, value)?),
            "is_bounds" => SettingChange::Bounds(Bounds {
                enabled: parse_flag(name, value)?,
                ..self.bounds
            }),
            "min_bound" => SettingChange::Bounds(Bounds {
                min: parse_number(name, value)?,
                ..self.bounds
            }),
            "max_bound" => SettingChange::Bounds(Bounds {
                max: parse_number(name, value)?,
                ..self.bounds
            }),
            _ => {
                debug!("Ignoring host setting {} = {:?}", name, value);
                return Ok(None);
            }
        };
        Ok(Some(change))
    }

    /// Store a setting change. Side effects on open channels are the controller's job.
    pub fn apply(&mut self, change: &SettingChange) {
        match change {
            SettingChange::Port(port) => self.port = port.clone(),
            SettingChange::Bounds(bounds) => self.bounds = *bounds,
            SettingChange::Epsilon(epsilon) => self.epsilon = *epsilon,
        }
    }
}

/// Pick the default port out of an enumerated list
pub fn select_default_port(ports: &[String], preferred: &str) -> Option<String> {
    if ports.iter().any(|p| p == preferred) {
        Some(preferred.to_string())
    } else {
        ports.first().cloned()
    }
}

fn parse_number(name: &str, value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .map_err(|e| SharedError::config(format!("invalid {name} {value:?}: {e}")))
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(SharedError::config(format!("invalid {name} {value:?}: expected a boolean"))),
    }
}

/// A single setting modified by the host
#[derive(Debug, Clone, PartialEq)]
pub enum SettingChange {
    Port(Option<String>),
    Bounds(Bounds),
    Epsilon(f64),
}

impl SettingChange {
    /// Whether applying this change invalidates an open channel
    pub fn invalidates_channel(&self) -> bool {
        matches!(self, Self::Port(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ports(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_preferred_port_wins() {
        let settings = ActuatorSettings::from_ports(ports(&["COM3", "COM10", "COM4"]));
        assert_eq!(settings.port.as_deref(), Some("COM10"));
        assert_eq!(settings.available_ports.len(), 3);
    }

    #[test]
    fn test_first_port_fallback() {
        let settings = ActuatorSettings::from_ports(ports(&["/dev/ttyUSB0", "/dev/ttyUSB1"]));
        assert_eq!(settings.port.as_deref(), Some("/dev/ttyUSB0"));
    }

    #[test]
    fn test_no_ports_selects_nothing() {
        let settings = ActuatorSettings::from_ports(Vec::new());
        assert_eq!(settings.port, None);
        assert!(settings.channel_config().is_none());
    }

    #[test]
    fn test_default_metadata() {
        let settings = ActuatorSettings::from_ports(ports(&["COM3"]));
        assert!(settings.bounds.enabled);
        assert_eq!(settings.bounds.min, 0.0);
        assert_eq!(settings.bounds.max, 1.0);
        assert_eq!(settings.epsilon, 1.0);

        let config = settings.channel_config().unwrap();
        assert_eq!(config.port, "COM3");
        assert_eq!(config.baud_rate, 9600);
    }

    #[test]
    fn test_named_setting_changes() {
        let settings = ActuatorSettings::from_ports(ports(&["COM3"]));
        assert_eq!(
            settings.change_from_named(PORT_SETTING, "COM7").unwrap(),
            Some(SettingChange::Port(Some("COM7".to_string())))
        );
        assert_eq!(
            settings.change_from_named("com_PORT", " ").unwrap(),
            Some(SettingChange::Port(None))
        );
        assert_eq!(
            settings.change_from_named("epsilon", "0.5").unwrap(),
            Some(SettingChange::Epsilon(0.5))
        );
        assert!(settings.change_from_named("epsilon", "wide").is_err());
    }

    #[test]
    fn test_bounds_changes_merge_into_current_bounds() {
        let settings = ActuatorSettings::from_ports(ports(&["COM3"]));
        assert_eq!(
            settings.change_from_named("max_bound", "1").unwrap(),
            Some(SettingChange::Bounds(Bounds { enabled: true, min: 0.0, max: 1.0 }))
        );
        assert_eq!(
            settings.change_from_named("is_bounds", "False").unwrap(),
            Some(SettingChange::Bounds(Bounds { enabled: false, min: 0.0, max: 1.0 }))
        );
        assert_eq!(
            settings.change_from_named("min_bound", "-1.5").unwrap(),
            Some(SettingChange::Bounds(Bounds { enabled: true, min: -1.5, max: 1.0 }))
        );
        assert!(settings.change_from_named("is_bounds", "maybe").is_err());
    }

    #[test]
    fn test_unrelated_host_settings_are_ignored() {
        let settings = ActuatorSettings::from_ports(ports(&["COM3"]));
        assert_eq!(settings.change_from_named("timeout", "20").unwrap(), None);
        assert_eq!(settings.change_from_named("speed", "3").unwrap(), None);
    }

    #[test]
    fn test_apply_changes() {
        let mut settings = ActuatorSettings::from_ports(ports(&["COM3"]));
        settings.apply(&SettingChange::Port(Some("COM9".to_string())));
        settings.apply(&SettingChange::Epsilon(0.1));
        settings.apply(&SettingChange::Bounds(Bounds { enabled: false, min: 0.0, max: 2.0 }));
        assert_eq!(settings.port.as_deref(), Some("COM9"));
        assert_eq!(settings.epsilon, 0.1);
        assert!(!settings.bounds.enabled);
        assert_eq!(settings.bounds.max, 2.0);
        assert!(SettingChange::Port(None).invalidates_channel());
        assert!(!SettingChange::Epsilon(0.1).invalidates_channel());
    }
}
