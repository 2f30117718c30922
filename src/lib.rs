//! # Rover Bridge Library
//!
//! Bridge between a rover microcontroller on a serial link and a structured
//! message bus.
//!
//! Inbound, the crate extracts carriage-return-delimited frames from the
//! byte stream, decodes them by type tag, and publishes sensor events
//! (odometry, GPS, idle counter, sonar). Outbound, it translates velocity
//! commands into the rover's steering protocol and ships range-scan
//! snapshots, all from a single fixed-rate transport loop.

pub mod bridge;
pub mod bus;
pub mod config;
pub mod error;
pub mod proto;
pub mod serial;
pub mod steering;
pub mod telemetry;
