//! # Serial Communication Module
//!
//! Handles serial communication with the rover's microcontroller.
//!
//! This module handles:
//! - Opening the serial port at 115,200 baud, 8N1
//! - Timeout-bounded reads so a quiet link never stalls the tick
//! - Writing encoded command and snapshot frames

use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::config::SerialConfig;
use crate::error::{BridgeError, Result};

pub mod port_trait;

pub use port_trait::SerialPortIO;

/// Default baud rate of the rover's controller board
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default device paths to try (in order of preference)
const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyACM1", // the controller board enumerates second on the rover
    "/dev/ttyACM0",
    "/dev/ttyUSB0",
];

/// Serial link to the rover's microcontroller.
pub struct RoverLink {
    /// Serial port handle
    port: tokio_serial::SerialStream,
    /// Device path (e.g., /dev/ttyACM1)
    device_path: String,
    /// Upper bound on one read; elapsed means "no bytes this tick"
    read_timeout: Duration,
}

impl std::fmt::Debug for RoverLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoverLink")
            .field("device_path", &self.device_path)
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

impl RoverLink {
    /// Open the link using the configured port, falling back to the default
    /// device paths when the configured one is unavailable.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::SerialPortNotFound`] if no candidate device
    /// opens. This is fatal: the process does not start without hardware.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let mut paths: Vec<&str> = vec![config.port.as_str()];
        paths.extend(
            DEFAULT_DEVICE_PATHS
                .iter()
                .copied()
                .filter(|p| *p != config.port),
        );
        Self::open_with_paths(
            &paths,
            config.baud_rate,
            Duration::from_millis(config.read_timeout_ms),
        )
    }

    /// Open the first path that accepts the connection.
    pub fn open_with_paths(
        paths: &[&str],
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Successfully opened rover link at {}", path);
                    return Ok(Self {
                        port,
                        device_path: path.to_string(),
                        read_timeout,
                    });
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(BridgeError::SerialPortNotFound(paths.join(", ")))
    }

    /// Open a specific serial port with the rover's link settings (8N1).
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| BridgeError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

#[async_trait]
impl SerialPortIO for RoverLink {
    async fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match tokio::time::timeout(self.read_timeout, self.port.read(buf)).await {
            Ok(result) => result,
            // Timeout just means the link was quiet this tick.
            Err(_elapsed) => Ok(0),
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.port.flush().await
    }
}
