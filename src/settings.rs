// src/settings.rs
//
// Bridge settings, loaded from a TOML file. Every key is optional; a missing
// file means all defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::io::serial::{default_allow_list, DeviceIdentity, Parity, SerialConfig};
use crate::io::ProtocolVariant;
use crate::sensors::SourceKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialSettings {
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default)]
    pub parity: Parity,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    #[serde(default = "default_read_poll_ms")]
    pub read_poll_ms: u64,
    #[serde(default = "default_assert_ready_line")]
    pub assert_ready_line: bool,
}

fn default_baud_rate() -> u32 {
    115_200
}
fn default_data_bits() -> u8 {
    8
}
fn default_stop_bits() -> u8 {
    1
}
fn default_write_timeout_ms() -> u64 {
    100
}
fn default_read_poll_ms() -> u64 {
    50
}
fn default_assert_ready_line() -> bool {
    true
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            parity: Parity::default(),
            write_timeout_ms: default_write_timeout_ms(),
            read_poll_ms: default_read_poll_ms(),
            assert_ready_line: default_assert_ready_line(),
        }
    }
}

impl SerialSettings {
    pub fn to_serial_config(&self) -> SerialConfig {
        SerialConfig {
            baud_rate: self.baud_rate,
            data_bits: self.data_bits,
            stop_bits: self.stop_bits,
            parity: self.parity,
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            read_poll: Duration::from_millis(self.read_poll_ms),
            assert_ready_line: self.assert_ready_line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSettings {
    #[serde(default)]
    pub source: SourceKind,
    /// Nominal sample rate (one accelerometer + one gyro reading per tick)
    #[serde(default = "default_rate_hz")]
    pub rate_hz: u32,
    #[serde(default)]
    pub replay_path: Option<PathBuf>,
}

fn default_rate_hz() -> u32 {
    50
}

/// Platform sensor stacks top out well below 1 kHz
pub const SENSOR_RATE_RANGE_HZ: std::ops::RangeInclusive<u32> = 1..=1000;

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            rate_hz: default_rate_hz(),
            replay_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeSettings {
    #[serde(default)]
    pub protocol: ProtocolVariant,
    /// Attach/detach polling period
    #[serde(default = "default_device_poll_ms")]
    pub device_poll_ms: u64,
    /// File logging is off unless set
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub serial: SerialSettings,
    #[serde(default)]
    pub sensor: SensorSettings,
    /// Controller identities to connect to
    #[serde(default = "default_allow_list")]
    pub devices: Vec<DeviceIdentity>,
}

fn default_device_poll_ms() -> u64 {
    500
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            protocol: ProtocolVariant::default(),
            device_poll_ms: default_device_poll_ms(),
            log_dir: None,
            serial: SerialSettings::default(),
            sensor: SensorSettings::default(),
            devices: default_allow_list(),
        }
    }
}

impl BridgeSettings {
    /// Reject values that would only fail later at open or spawn time
    pub fn validate(&self) -> Result<(), String> {
        if self.serial.baud_rate == 0 {
            return Err("serial.baud_rate must be greater than 0".to_string());
        }
        if !(5..=8).contains(&self.serial.data_bits) {
            return Err(format!("serial.data_bits must be 5-8, got {}", self.serial.data_bits));
        }
        if !(1..=2).contains(&self.serial.stop_bits) {
            return Err(format!("serial.stop_bits must be 1 or 2, got {}", self.serial.stop_bits));
        }
        if self.serial.write_timeout_ms == 0 || self.serial.read_poll_ms == 0 {
            return Err("serial timeouts must be greater than 0".to_string());
        }
        if !SENSOR_RATE_RANGE_HZ.contains(&self.sensor.rate_hz) {
            return Err(format!(
                "sensor.rate_hz must be {}-{}, got {}",
                SENSOR_RATE_RANGE_HZ.start(),
                SENSOR_RATE_RANGE_HZ.end(),
                self.sensor.rate_hz
            ));
        }
        if self.device_poll_ms == 0 {
            return Err("device_poll_ms must be greater than 0".to_string());
        }
        if self.sensor.source == SourceKind::Replay && self.sensor.replay_path.is_none() {
            return Err("sensor.source = \"replay\" needs sensor.replay_path".to_string());
        }
        if self.devices.is_empty() {
            return Err("devices allow-list is empty; nothing would ever connect".to_string());
        }
        Ok(())
    }
}

/// `<config dir>/balancebridge/config.toml`
pub fn default_settings_path() -> Result<PathBuf, String> {
    dirs::config_dir()
        .map(|dir| dir.join("balancebridge").join("config.toml"))
        .ok_or_else(|| "Failed to get config dir".to_string())
}

pub fn parse_settings(content: &str) -> Result<BridgeSettings, String> {
    let settings: BridgeSettings =
        toml::from_str(content).map_err(|e| format!("Failed to parse settings: {}", e))?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings from `path`, or the default location when `None`.
pub fn load_settings(path: Option<&Path>) -> Result<BridgeSettings, String> {
    let settings_path = match path {
        Some(p) => p.to_path_buf(),
        None => default_settings_path()?,
    };

    if !settings_path.exists() {
        if path.is_some() {
            return Err(format!("Settings file not found: {}", settings_path.display()));
        }
        tlog!(
            "[settings] No settings at {}, using defaults",
            settings_path.display()
        );
        return Ok(BridgeSettings::default());
    }

    let content = std::fs::read_to_string(&settings_path)
        .map_err(|e| format!("Failed to read settings: {}", e))?;
    let settings = parse_settings(&content)?;
    tlog!("[settings] Loaded {}", settings_path.display());
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_all_defaults() {
        let settings = parse_settings("").unwrap();
        assert_eq!(settings, BridgeSettings::default());
        assert_eq!(settings.serial.to_serial_config(), SerialConfig::default());
        assert_eq!(settings.protocol, ProtocolVariant::PitchBinary);
        assert_eq!(settings.sensor.rate_hz, 50);
        assert_eq!(settings.devices.len(), 4);
    }

    #[test]
    fn test_full_file() {
        let settings = parse_settings(
            r#"
protocol = "combined_binary"
device_poll_ms = 250
log_dir = "/tmp/bb-logs"

[serial]
baud_rate = 57600
parity = "even"
write_timeout_ms = 20

[sensor]
source = "replay"
rate_hz = 100
replay_path = "bench.jsonl"

[[devices]]
vendor_id = 0x1A86
product_id = 0x7523
label = "CH340 clone"
"#,
        )
        .unwrap();

        assert_eq!(settings.protocol, ProtocolVariant::CombinedBinary);
        assert_eq!(settings.device_poll_ms, 250);
        assert_eq!(settings.log_dir, Some(PathBuf::from("/tmp/bb-logs")));

        let config = settings.serial.to_serial_config();
        assert_eq!(config.summary(), "57600 8E1");
        assert_eq!(config.write_timeout, Duration::from_millis(20));
        assert_eq!(config.read_poll, Duration::from_millis(50));

        assert_eq!(settings.sensor.source, SourceKind::Replay);
        assert_eq!(settings.sensor.replay_path, Some(PathBuf::from("bench.jsonl")));
        assert_eq!(settings.devices, vec![DeviceIdentity::new(0x1A86, 0x7523, "CH340 clone")]);
    }

    #[test]
    fn test_unknown_protocol_is_an_error() {
        let err = parse_settings("protocol = \"morse\"").unwrap_err();
        assert!(err.starts_with("Failed to parse settings"), "{}", err);
    }

    #[test]
    fn test_validation() {
        assert!(parse_settings("[serial]\ndata_bits = 9").is_err());
        assert!(parse_settings("[sensor]\nrate_hz = 0").is_err());
        assert!(parse_settings("[sensor]\nrate_hz = 1000").is_ok());
        assert!(parse_settings("[sensor]\nrate_hz = 1001").is_err());
        let err = parse_settings("[sensor]\nrate_hz = 2000000").unwrap_err();
        assert!(err.contains("rate_hz"), "{}", err);
        assert!(parse_settings("[sensor]\nsource = \"replay\"").is_err());
        assert!(parse_settings("devices = []").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("balancebridge-settings-{}.toml", std::process::id()));
        std::fs::write(&path, "protocol = \"human_readable\"\n").unwrap();
        let settings = load_settings(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(settings.protocol, ProtocolVariant::HumanReadable);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let path = std::env::temp_dir().join("balancebridge-does-not-exist.toml");
        assert!(load_settings(Some(&path)).is_err());
    }
}
