//! # Error Types
//!
//! Custom error types for Rover Bridge using `thiserror`.

use thiserror::Error;

/// Main error type for Rover Bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A handler asked for more payload bytes than the frame carries
    #[error("decode underflow: needed {needed} bytes, {remaining} remaining")]
    DecodeUnderflow { needed: usize, remaining: usize },

    /// An `OutPacket` was used outside its reset/append/finish phase
    #[error("packet state error: {0}")]
    PacketState(&'static str),

    /// Serial transport errors
    #[error("serial error: {0}")]
    Serial(String),

    /// No serial device could be opened at any of the candidate paths
    #[error("no serial device found at: {0}")]
    SerialPortNotFound(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Rover Bridge
pub type Result<T> = std::result::Result<T, BridgeError>;
