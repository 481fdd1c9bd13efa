//! Monitor configuration
//!
//! Loaded from an optional TOML file, then overridden by `OBD_` environment
//! variables (nested keys use `__`, e.g. `OBD_DISPATCHER__PACING_DELAY_MS`).

use config::{Config, ConfigError, Environment, File, FileFormat};
use obd_dispatcher::DispatcherConfig;
use obd_protocol::{pid, Command, ObdError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file looked up in the working directory
const DEFAULT_FILE: &str = "obd-monitor";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Serial device of the adapter
    pub device: String,
    /// Serial speed; the protocol's usual rate when unset
    pub baud_rate: Option<u32>,
    /// Tracing filter directive, overridden by `RUST_LOG`
    pub log_level: String,
    /// Emit JSON log lines
    pub json_logs: bool,
    /// Catalogue names of the commands to poll, in order
    pub commands: Vec<String>,
    /// Seconds to wait before reconnecting after the link ends; 0 exits instead
    pub reconnect_delay_secs: u64,
    pub dispatcher: DispatcherConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: None,
            log_level: "info".to_string(),
            json_logs: false,
            commands: ["rpm", "speed", "coolant_temp", "engine_load"]
                .iter()
                .map(|name| name.to_string())
                .collect(),
            reconnect_delay_secs: 5,
            dispatcher: DispatcherConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Load from `path` (or `obd-monitor.toml` if present) plus the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path),
            None => File::with_name(DEFAULT_FILE).required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("OBD")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("commands"),
            )
            .build()?
            .try_deserialize()
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    pub fn validate(&self) -> Result<(), ObdError> {
        if self.device.is_empty() {
            return Err(ObdError::InvalidConfig("device must not be empty".to_string()));
        }
        if self.baud_rate == Some(0) {
            return Err(ObdError::InvalidConfig("baud_rate must be > 0".to_string()));
        }
        self.dispatcher.validate()
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
            .unwrap_or_else(|| self.dispatcher.session.protocol.default_baud_rate())
    }

    /// Look up every configured name in the command catalogue
    pub fn resolve_commands(&self) -> Result<Vec<Command>, ObdError> {
        self.commands
            .iter()
            .map(|name| {
                pid::by_name(name)
                    .ok_or_else(|| ObdError::InvalidConfig(format!("unknown command '{}'", name)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obd_protocol::ObdProtocol;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = MonitorConfig::from_toml_str("").unwrap();
        assert_eq!(config, MonitorConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_nested_sections() {
        let config = MonitorConfig::from_toml_str(
            r#"
            device = "/dev/rfcomm0"
            commands = ["rpm", "vin"]

            [dispatcher]
            pacing_delay_ms = 250
            debug = true

            [dispatcher.session]
            protocol = "j1850_vpw"
            response_timeout_ms = 5000
            "#,
        )
        .unwrap();

        assert_eq!(config.device, "/dev/rfcomm0");
        assert_eq!(config.dispatcher.pacing_delay_ms, 250);
        assert!(config.dispatcher.debug);
        assert_eq!(config.dispatcher.session.protocol, ObdProtocol::J1850Vpw);
        assert_eq!(config.dispatcher.session.response_timeout_ms, 5000);
        assert_eq!(config.dispatcher.session.max_consecutive_timeouts, 3);
        assert_eq!(config.resolve_commands().unwrap(), vec![pid::RPM, pid::VIN]);
    }

    #[test]
    fn test_unknown_command_rejected() {
        let config = MonitorConfig {
            commands: vec!["rpm".to_string(), "warp_drive".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            config.resolve_commands(),
            Err(ObdError::InvalidConfig(msg)) if msg.contains("warp_drive")
        ));
    }

    #[test]
    fn test_baud_rate_follows_protocol_unless_set() {
        let mut config = MonitorConfig::default();
        assert_eq!(config.baud_rate(), 38_400);

        config.baud_rate = Some(9600);
        assert_eq!(config.baud_rate(), 9600);

        config.baud_rate = Some(0);
        assert!(matches!(config.validate(), Err(ObdError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_pacing_in_file_fails_validation() {
        let config = MonitorConfig::from_toml_str("[dispatcher]\npacing_delay_ms = 0").unwrap();
        assert!(config.validate().is_err());
    }
}
