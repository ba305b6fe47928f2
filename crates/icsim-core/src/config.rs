//! Dashboard configuration
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! stock cluster on `vcan0`. Identifiers accept `"0x7E0"` strings or integers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frame::{CANFD_MAX_DLEN, EXTENDED_ID_MAX};
use crate::router::BusIds;
use crate::vehicle::SignalPositions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete dashboard configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IcsimConfig {
    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub ids: IdConfig,

    #[serde(default)]
    pub positions: SignalPositions,

    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,

    #[serde(default)]
    pub randomize: RandomizeConfig,
}

impl IcsimConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ids = self.ids.to_bus_ids();
        for (name, id) in [
            ("door_command", ids.door_command),
            ("door_status", ids.door_status),
            ("door", ids.door),
            ("signal", ids.signal),
            ("speed", ids.speed),
            ("warning", ids.warning),
            ("light", ids.light),
            ("luminosity", ids.luminosity),
            ("shared_control", ids.shared_control),
            ("diag_request", ids.diag_request),
            ("diag_response", ids.diag_response),
        ] {
            if id > EXTENDED_ID_MAX {
                return Err(ConfigError::Invalid(format!(
                    "{} id 0x{:X} does not fit in 29 bits",
                    name, id
                )));
            }
        }
        if self.ids.diag_request == 0 {
            return Err(ConfigError::Invalid(
                "diag_request id must leave room for the functional address".to_string(),
            ));
        }

        let p = &self.positions;
        for (name, pos) in [
            ("door", p.door),
            ("signal", p.signal),
            ("speed", p.speed + 1),
            ("warning", p.warning),
            ("light", p.light),
            ("luminosity", p.luminosity),
        ] {
            if pos >= CANFD_MAX_DLEN {
                return Err(ConfigError::Invalid(format!(
                    "{} position {} is outside a 64-byte frame",
                    name, pos
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Transport Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// SocketCAN interface
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Open the interface in CAN FD mode
    #[serde(default)]
    pub fd: bool,
}

fn default_interface() -> String {
    "vcan0".to_string()
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            fd: false,
        }
    }
}

// =============================================================================
// Identifier Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdConfig {
    #[serde(default = "default_door_command_id", deserialize_with = "deserialize_hex_u32")]
    pub door_command: u32,

    #[serde(default = "default_door_status_id", deserialize_with = "deserialize_hex_u32")]
    pub door_status: u32,

    #[serde(default = "default_door_id", deserialize_with = "deserialize_hex_u32")]
    pub door: u32,

    #[serde(default = "default_signal_id", deserialize_with = "deserialize_hex_u32")]
    pub signal: u32,

    #[serde(default = "default_speed_id", deserialize_with = "deserialize_hex_u32")]
    pub speed: u32,

    #[serde(default = "default_warning_id", deserialize_with = "deserialize_hex_u32")]
    pub warning: u32,

    #[serde(default = "default_light_id", deserialize_with = "deserialize_hex_u32")]
    pub light: u32,

    #[serde(default = "default_luminosity_id", deserialize_with = "deserialize_hex_u32")]
    pub luminosity: u32,

    #[serde(default = "default_shared_control_id", deserialize_with = "deserialize_hex_u32")]
    pub shared_control: u32,

    /// Physical request address; the functional one is this minus one
    #[serde(default = "default_diag_request_id", deserialize_with = "deserialize_hex_u32")]
    pub diag_request: u32,

    #[serde(default = "default_diag_response_id", deserialize_with = "deserialize_hex_u32")]
    pub diag_response: u32,
}

fn default_door_command_id() -> u32 {
    BusIds::default().door_command
}
fn default_door_status_id() -> u32 {
    BusIds::default().door_status
}
fn default_door_id() -> u32 {
    BusIds::default().door
}
fn default_signal_id() -> u32 {
    BusIds::default().signal
}
fn default_speed_id() -> u32 {
    BusIds::default().speed
}
fn default_warning_id() -> u32 {
    BusIds::default().warning
}
fn default_light_id() -> u32 {
    BusIds::default().light
}
fn default_luminosity_id() -> u32 {
    BusIds::default().luminosity
}
fn default_shared_control_id() -> u32 {
    BusIds::default().shared_control
}
fn default_diag_request_id() -> u32 {
    BusIds::default().diag_request
}
fn default_diag_response_id() -> u32 {
    BusIds::default().diag_response
}

impl Default for IdConfig {
    fn default() -> Self {
        let ids = BusIds::default();
        Self {
            door_command: ids.door_command,
            door_status: ids.door_status,
            door: ids.door,
            signal: ids.signal,
            speed: ids.speed,
            warning: ids.warning,
            light: ids.light,
            luminosity: ids.luminosity,
            shared_control: ids.shared_control,
            diag_request: ids.diag_request,
            diag_response: ids.diag_response,
        }
    }
}

impl IdConfig {
    pub fn to_bus_ids(&self) -> BusIds {
        BusIds {
            door_command: self.door_command,
            door_status: self.door_status,
            door: self.door,
            signal: self.signal,
            speed: self.speed,
            warning: self.warning,
            light: self.light,
            luminosity: self.luminosity,
            shared_control: self.shared_control,
            diag_request: self.diag_request,
            diag_response: self.diag_response,
        }
    }
}

// =============================================================================
// Diagnostics Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Non-default sessions end after this long without tester present
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,

    /// Wait for flow control after an ISO-TP first frame
    #[serde(default = "default_isotp_timeout_ms")]
    pub isotp_timeout_ms: u64,

    /// XOR key for security access, high byte first
    #[serde(default = "default_session_key", deserialize_with = "deserialize_hex_u16")]
    pub session_key: u16,
}

fn default_session_timeout_ms() -> u64 {
    3500
}

fn default_isotp_timeout_ms() -> u64 {
    100
}

fn default_session_key() -> u16 {
    0x3530
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            session_timeout_ms: default_session_timeout_ms(),
            isotp_timeout_ms: default_isotp_timeout_ms(),
            session_key: default_session_key(),
        }
    }
}

impl DiagnosticsConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    pub fn isotp_timeout(&self) -> Duration {
        Duration::from_millis(self.isotp_timeout_ms)
    }

    pub fn session_key_bytes(&self) -> [u8; 2] {
        self.session_key.to_be_bytes()
    }
}

// =============================================================================
// Randomization Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomizeConfig {
    /// Draw door, signal and speed ids and positions at startup
    #[serde(default)]
    pub enabled: bool,

    /// Reuse a previous session's seed instead of drawing a new one
    #[serde(default)]
    pub seed: Option<u64>,

    /// Where the seed in use is written
    #[serde(default = "default_seed_file")]
    pub seed_file: PathBuf,
}

fn default_seed_file() -> PathBuf {
    PathBuf::from("/tmp/icsim_seed.txt")
}

impl Default for RandomizeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            seed: None,
            seed_file: default_seed_file(),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn parse_hex(s: &str) -> Result<u32, std::num::ParseIntError> {
    let s = s.trim();
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u32::from_str_radix(s, 16)
}

/// Deserialize a hex u32 (supports "0x7E0" or 2016)
fn deserialize_hex_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HexOrInt {
        Hex(String),
        Int(u32),
    }

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(n),
        HexOrInt::Hex(s) => parse_hex(&s).map_err(|e| D::Error::custom(e.to_string())),
    }
}

/// Deserialize a hex u16 (supports "0x3530" or 13616)
fn deserialize_hex_u16<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    let value = deserialize_hex_u32(deserializer)?;
    u16::try_from(value).map_err(|_| D::Error::custom(format!("0x{:X} exceeds 16 bits", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = IcsimConfig::from_toml("").unwrap();
        assert_eq!(config.transport.interface, "vcan0");
        assert!(!config.transport.fd);
        assert_eq!(config.ids.to_bus_ids(), BusIds::default());
        assert_eq!(config.positions, SignalPositions::default());
        assert_eq!(config.diagnostics.session_timeout(), Duration::from_millis(3500));
        assert_eq!(config.diagnostics.session_key_bytes(), [0x35, 0x30]);
        assert_eq!(
            config.randomize.seed_file,
            PathBuf::from("/tmp/icsim_seed.txt")
        );
    }

    #[test]
    fn test_hex_and_int_ids() {
        let toml = r#"
[ids]
speed = "0x300"
signal = 500
diag_request = "0X18DA00F1"

[positions]
speed = 1
"#;
        let config = IcsimConfig::from_toml(toml).unwrap();
        let ids = config.ids.to_bus_ids();
        assert_eq!(ids.speed, 0x300);
        assert_eq!(ids.signal, 500);
        assert_eq!(ids.diag_request, 0x18DA_00F1);
        assert_eq!(ids.door, 0x19B);
        assert_eq!(config.positions.speed, 1);
        assert_eq!(config.positions.door, 2);
    }

    #[test]
    fn test_rejects_wide_id() {
        let toml = r#"
[ids]
speed = "0x20000000"
"#;
        assert!(matches!(
            IcsimConfig::from_toml(toml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_speed_position_past_frame() {
        let toml = r#"
[positions]
speed = 63
"#;
        assert!(matches!(
            IcsimConfig::from_toml(toml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_bad_hex() {
        let toml = r#"
[diagnostics]
session_key = "0xZZ"
"#;
        assert!(matches!(
            IcsimConfig::from_toml(toml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[transport]
interface = "can1"
fd = true

[diagnostics]
session_key = "0x1234"
isotp_timeout_ms = 250

[randomize]
enabled = true
seed = 42
"#
        )
        .unwrap();

        let config = IcsimConfig::load(file.path()).unwrap();
        assert_eq!(config.transport.interface, "can1");
        assert!(config.transport.fd);
        assert_eq!(config.diagnostics.session_key_bytes(), [0x12, 0x34]);
        assert_eq!(config.diagnostics.isotp_timeout(), Duration::from_millis(250));
        assert!(config.randomize.enabled);
        assert_eq!(config.randomize.seed, Some(42));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            IcsimConfig::load("/nonexistent/icsim.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
