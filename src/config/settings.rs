//! Application settings

use crate::core::receiver::ReceiverConfig;
use crate::core::simulator::{EmulationRule, EmulationTable};
use crate::core::transport::{PortSettings, SerialParity, SerialStopBits, DEFAULT_BAUD_RATE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read or written
    #[error("Config file {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`AppConfig`]
    #[error("Config file {path} is malformed: {source}")]
    Parse {
        /// File path
        path: PathBuf,
        /// Parser error
        source: toml::de::Error,
    },

    /// Encoding the configuration failed
    #[error("Failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),

    /// An emulation rule is not valid hex
    #[error("Emulation rule #{index}: {reason}")]
    InvalidRule {
        /// 1-based rule position
        index: usize,
        /// What is wrong
        reason: String,
    },

    /// No platform configuration directory
    #[error("Could not determine the configuration directory")]
    NoConfigDir,
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default line settings
    pub serial: SerialConfig,
    /// Receiver timing
    pub receiver: ReceiverSettings,
    /// History storage
    pub history: HistoryConfig,
    /// Diagnostic log
    pub logging: LoggingConfig,
    /// Automatic responses
    pub emulation: EmulationConfig,
}

impl AppConfig {
    /// Default location, `<config_dir>/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        super::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Load from `path`, or from the default location when `None`
    ///
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config: Self =
            toml::from_str(&content).map_err(|source| ConfigError::Parse { path: path.clone(), source })?;
        config.emulation.table()?;
        Ok(config)
    }

    /// Save to `path`, or to the default location when `None`; returns the
    /// file written
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path().ok_or(ConfigError::NoConfigDir)?,
        };

        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
        }
        match std::fs::write(&path, content) {
            Ok(()) => Ok(path),
            Err(source) => Err(ConfigError::Io { path, source }),
        }
    }

    /// History file location
    pub fn history_path(&self) -> Option<PathBuf> {
        self.history
            .file
            .clone()
            .or_else(|| super::data_dir().map(|dir| dir.join("history.json")))
    }
}

/// `[serial]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits
    pub data_bits: u8,
    /// Parity
    pub parity: SerialParity,
    /// Stop bits
    pub stop_bits: SerialStopBits,
    /// Read timeout used when no inter-byte timeout applies
    pub read_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        let defaults = PortSettings::default();
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: defaults.data_bits,
            parity: defaults.parity,
            stop_bits: defaults.stop_bits,
            read_timeout_ms: 1000,
        }
    }
}

impl SerialConfig {
    /// Settings offered as the defaults
    pub fn port_settings(&self) -> PortSettings {
        PortSettings::new(self.baud_rate)
            .data_bits(self.data_bits)
            .parity(self.parity)
            .stop_bits(self.stop_bits)
    }

    /// Fallback read timeout
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// `[receiver]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverSettings {
    /// Longest wait on the receive gate per cycle
    pub poll_interval_ms: u64,
    /// Pause after an idle cycle
    pub idle_sleep_ms: u64,
    /// Shutdown wait for the receiver thread
    pub join_timeout_ms: u64,
}

impl Default for ReceiverSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            idle_sleep_ms: 50,
            join_timeout_ms: 1000,
        }
    }
}

impl ReceiverSettings {
    /// Receiver timing
    pub fn receiver_config(&self) -> ReceiverConfig {
        ReceiverConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            idle_sleep: Duration::from_millis(self.idle_sleep_ms),
            join_timeout: Duration::from_millis(self.join_timeout_ms),
        }
    }
}

/// `[history]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// History file; defaults to `<data_dir>/history.json`
    pub file: Option<PathBuf>,
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log directory; defaults to `<data_dir>/logs`
    pub directory: Option<PathBuf>,
    /// Filter directive, e.g. `info` or `comterm_core=debug`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Effective log directory
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.directory.clone().or_else(super::log_dir)
    }
}

/// One `[[emulation.rules]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Request bytes as hex
    pub request: String,
    /// Response bytes as hex
    pub response: String,
}

/// `[emulation]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulationConfig {
    /// Answer known requests automatically
    pub enabled: bool,
    /// Replacement rules; the built-in table applies when empty
    pub rules: Vec<RuleConfig>,
}

impl Default for EmulationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rules: Vec::new(),
        }
    }
}

impl EmulationConfig {
    /// Build the responder table
    pub fn table(&self) -> Result<EmulationTable, ConfigError> {
        if !self.enabled {
            return Ok(EmulationTable::empty());
        }
        if self.rules.is_empty() {
            return Ok(EmulationTable::builtin());
        }

        let rules = self
            .rules
            .iter()
            .enumerate()
            .map(|(i, rule)| {
                EmulationRule::from_hex(&format!("rule{}", i + 1), &rule.request, &rule.response)
                    .map_err(|e| ConfigError::InvalidRule {
                        index: i + 1,
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(EmulationTable::new(rules))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::simulator::Responder;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.serial.port_settings(), PortSettings::default());
        assert_eq!(config.serial.read_timeout(), Duration::from_secs(1));
        assert_eq!(config.receiver.receiver_config(), ReceiverConfig::default());
        assert!(config.emulation.enabled);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load(Some(&dir.path().join("none.toml"))).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[serial]
baud_rate = 115200
parity = "even"
stop_bits = "2"

[receiver]
poll_interval_ms = 20

[[emulation.rules]]
request = "10 20"
response = "30"
"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        let settings = config.serial.port_settings();
        assert_eq!(settings.baud_rate, 115_200);
        assert_eq!(settings.parity, SerialParity::Even);
        assert_eq!(settings.stop_bits, SerialStopBits::Two);
        assert_eq!(settings.data_bits, 8);
        assert_eq!(config.receiver.poll_interval_ms, 20);
        assert_eq!(config.receiver.idle_sleep_ms, 50);

        let table = config.emulation.table().unwrap();
        assert_eq!(table.respond(&[0x10, 0x20]), Some(vec![0x30]));
        assert_eq!(table.respond(&[0x41]), None);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[serial\nbaud_rate = ").unwrap();
        assert!(matches!(AppConfig::load(Some(&path)), Err(ConfigError::Parse { .. })));

        std::fs::write(&path, "[[emulation.rules]]\nrequest = \"XY\"\nresponse = \"00\"\n").unwrap();
        assert!(matches!(
            AppConfig::load(Some(&path)),
            Err(ConfigError::InvalidRule { index: 1, .. })
        ));
    }

    #[test]
    fn test_save_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = AppConfig::default();
        config.history.file = Some(dir.path().join("h.json"));
        config.emulation.enabled = false;
        assert_eq!(config.save(Some(&path)).unwrap(), path);

        let loaded = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.history_path(), Some(dir.path().join("h.json")));
        assert_eq!(loaded.emulation.table().unwrap().respond(&[0x41]), None);
    }
}
