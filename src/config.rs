//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::steering::{CurvePoint, TableCurve};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub link: LinkConfig,

    #[serde(default)]
    pub steering: SteeringConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// Control loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
}

/// Steering calibration configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SteeringConfig {
    /// Radius-to-steer calibration points; omit to use the factory table
    #[serde(default)]
    pub curve: Vec<CurvePoint>,
}

/// Telemetry sink configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyACM1".to_string() }
fn default_baud_rate() -> u32 { 115_200 }
fn default_read_timeout_ms() -> u64 { 5 }

fn default_tick_hz() -> u32 { 20 }

fn default_telemetry_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }

impl Default for Config {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            link: LinkConfig::default(),
            steering: SteeringConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// The steering calibration curve this config selects.
    ///
    /// An empty `[steering] curve` table means the factory calibration.
    /// `validate` has already rejected malformed tables by the time this is
    /// called from a loaded config.
    pub fn steering_curve(&self) -> TableCurve {
        if self.steering.curve.is_empty() {
            TableCurve::default()
        } else {
            TableCurve::from_points(self.steering.curve.clone())
                .unwrap_or_default()
        }
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(crate::error::BridgeError::Config(
                toml::de::Error::custom("serial port cannot be empty")
            ));
        }

        if ![9600, 19200, 38400, 57600, 115200, 230400].contains(&self.serial.baud_rate) {
            return Err(crate::error::BridgeError::Config(
                toml::de::Error::custom(
                    "baud_rate must be one of: 9600, 19200, 38400, 57600, 115200, 230400"
                )
            ));
        }

        if self.serial.read_timeout_ms == 0 || self.serial.read_timeout_ms > 1000 {
            return Err(crate::error::BridgeError::Config(
                toml::de::Error::custom("read_timeout_ms must be between 1 and 1000")
            ));
        }

        if self.link.tick_hz == 0 || self.link.tick_hz > 100 {
            return Err(crate::error::BridgeError::Config(
                toml::de::Error::custom("tick_hz must be between 1 and 100")
            ));
        }

        // A read must fit inside a tick, or the loop cadence drifts.
        if self.serial.read_timeout_ms > u64::from(1000 / self.link.tick_hz) {
            return Err(crate::error::BridgeError::Config(
                toml::de::Error::custom("read_timeout_ms must not exceed the tick period")
            ));
        }

        if !self.steering.curve.is_empty()
            && TableCurve::from_points(self.steering.curve.clone()).is_none()
        {
            return Err(crate::error::BridgeError::Config(
                toml::de::Error::custom(
                    "steering curve must be non-empty with strictly increasing radii"
                )
            ));
        }

        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(crate::error::BridgeError::Config(
                toml::de::Error::custom("telemetry log_dir cannot be empty when enabled")
            ));
        }

        Ok(())
    }
}
