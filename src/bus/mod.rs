//! # Message Bus Boundary
//!
//! Structured events decoded from the hardware link.
//!
//! The bridge does not own a pub/sub system; it hands decoded sensor data to
//! whatever sits on the other side of an unbounded channel. Handlers send,
//! a consumer (the telemetry sink, or a real middleware adapter) receives.
//! Everything here is plain data, serializable for the JSONL sink.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::proto::NUM_SONARS;

/// Parent coordinate frame for odometry transforms
pub const ODOM_FRAME: &str = "odom";

/// Child coordinate frame for odometry transforms
pub const BASE_FRAME: &str = "base_link";

/// Odometry update decoded from an `O` frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OdometryEvent {
    /// Forward velocity in m/s
    pub linear_velocity: f32,

    /// Turn rate in rad/s
    pub angular_velocity: f32,

    /// Position x in meters, odom frame
    pub position_x: f32,

    /// Position y in meters, odom frame
    pub position_y: f32,

    /// Heading in radians
    pub yaw: f32,
}

/// Unit quaternion, z-axis rotation only
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    /// Quaternion for a pure yaw (rotation about z).
    pub fn from_yaw(yaw: f32) -> Self {
        let half = yaw * 0.5;
        Self {
            x: 0.0,
            y: 0.0,
            z: half.sin(),
            w: half.cos(),
        }
    }
}

/// Coordinate-frame transform derived from an odometry update
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameTransform {
    /// Parent frame id (always [`ODOM_FRAME`])
    pub parent_frame: &'static str,

    /// Child frame id (always [`BASE_FRAME`])
    pub child_frame: &'static str,

    /// Translation x in meters
    pub translation_x: f32,

    /// Translation y in meters
    pub translation_y: f32,

    /// Rotation as a unit quaternion
    pub rotation: Quaternion,
}

impl FrameTransform {
    /// Derive the odom -> base_link transform from an odometry event.
    pub fn from_odometry(odo: &OdometryEvent) -> Self {
        Self {
            parent_frame: ODOM_FRAME,
            child_frame: BASE_FRAME,
            translation_x: odo.position_x,
            translation_y: odo.position_y,
            rotation: Quaternion::from_yaw(odo.yaw),
        }
    }
}

/// GPS fix decoded from a `G` frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GpsFixEvent {
    /// Latitude in degrees x 1e6, as sent on the wire
    pub lat_scaled: i32,

    /// Longitude in degrees x 1e6, as sent on the wire
    pub lon_scaled: i32,

    /// Latitude in degrees
    pub latitude: f64,

    /// Longitude in degrees
    pub longitude: f64,
}

impl GpsFixEvent {
    /// Build a fix from the wire's scaled-integer representation.
    pub fn from_scaled(lat_scaled: i32, lon_scaled: i32) -> Self {
        Self {
            lat_scaled,
            lon_scaled,
            latitude: f64::from(lat_scaled) / 1_000_000.0,
            longitude: f64::from(lon_scaled) / 1_000_000.0,
        }
    }
}

/// Idle-time counter decoded from an `I` frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IdleEvent {
    /// Firmware idle loop count since the last report
    pub count: u16,
}

/// Sonar ranges decoded from an `S` frame, one byte per sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SonarEvent {
    pub ranges: [u8; NUM_SONARS],
}

/// Everything the bridge publishes to the bus
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BusEvent {
    Odometry(OdometryEvent),
    Transform(FrameTransform),
    GpsFix(GpsFixEvent),
    Idle(IdleEvent),
    Sonar(SonarEvent),
}

/// Sending half of the bus boundary, held by frame handlers
pub type BusSender = mpsc::UnboundedSender<BusEvent>;

/// Receiving half of the bus boundary, held by the consumer
pub type BusReceiver = mpsc::UnboundedReceiver<BusEvent>;

/// Create the event channel connecting handlers to the bus consumer.
pub fn channel() -> (BusSender, BusReceiver) {
    mpsc::unbounded_channel()
}
