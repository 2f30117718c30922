//! # Command Translation
//!
//! Turns velocity commands from the bus into the rover's steering protocol.
//!
//! The hardware does not take `{linear, angular}` velocities; it takes a
//! speed in internal encoder counts and a steering-servo position. Speed is
//! a fixed unit conversion (one count is 0.016 m/s). Steering goes through
//! turn-radius geometry: `radius = |linear / angular|`, then a calibration
//! curve maps radius to a servo magnitude, clamped to the servo's +-120
//! travel. The curve is a hardware calibration detail, so it lives behind a
//! trait and the built-in table can be replaced from config.

use serde::Deserialize;

use crate::error::Result;
use crate::proto::packet::OutPacket;
use crate::proto::TAG_COMMAND;

/// Internal speed counts per m/s.
///
/// The firmware specifies speed as 2000/(ms per count) with one count equal
/// to 0.032 m, which works out to 0.016 m/s per unit, i.e. 62.5 units per
/// m/s. An inverse unit conversion, not a tunable.
pub const SPEED_COUNTS_PER_MPS: f32 = 62.5;

/// Steering servo travel limit, both directions
pub const STEER_LIMIT: i16 = 120;

/// Velocity command arriving from the bus
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityCommand {
    /// Forward velocity in m/s
    pub linear_x: f32,

    /// Turn rate in rad/s; positive is a left turn
    pub angular_z: f32,
}

/// Hardware-ready steering values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SteeringOutput {
    /// Speed in internal counts (0.016 m/s each)
    pub target_speed: i16,

    /// Steering servo position in [-120, 120]
    pub steer: i8,
}

impl SteeringOutput {
    /// Encode as a command frame: tag `C`, i16 speed, i8 steer, flush.
    pub fn encode(&self, packet: &mut OutPacket) -> Result<()> {
        packet.reset(TAG_COMMAND);
        packet.append_i16(self.target_speed)?;
        packet.append_i8(self.steer)?;
        packet.finish()
    }
}

/// Radius-to-steer calibration.
///
/// The exact curve was measured on the vehicle, not derived, so it is a
/// swappable lookup rather than a formula. Implementations must be
/// monotonic: a tighter radius never yields a smaller steering magnitude.
pub trait SteeringCurve: Send + Sync {
    /// Raw steering magnitude for a turn radius in meters.
    ///
    /// The translator clamps the result to [`STEER_LIMIT`]; implementations
    /// need not.
    fn steer_for_radius(&self, radius: f32) -> i16;
}

/// One calibration point: turn radius in meters to raw steer value
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CurvePoint {
    pub radius: f32,
    pub steer: i16,
}

/// Factory-measured calibration, radii ascending.
const DEFAULT_CURVE: &[CurvePoint] = &[
    CurvePoint { radius: 0.7, steer: 120 },
    CurvePoint { radius: 1.0, steer: 90 },
    CurvePoint { radius: 1.5, steer: 60 },
    CurvePoint { radius: 2.5, steer: 35 },
    CurvePoint { radius: 4.0, steer: 18 },
    CurvePoint { radius: 8.0, steer: 6 },
    CurvePoint { radius: 15.0, steer: 0 },
];

/// Piecewise-linear interpolation over a calibration table.
///
/// Radii below the first point saturate at the first steer value; radii past
/// the last point saturate at the last.
#[derive(Debug, Clone)]
pub struct TableCurve {
    points: Vec<CurvePoint>,
}

impl Default for TableCurve {
    fn default() -> Self {
        Self {
            points: DEFAULT_CURVE.to_vec(),
        }
    }
}

impl TableCurve {
    /// Build a curve from calibration points.
    ///
    /// Points must be non-empty with strictly increasing radii; returns
    /// `None` otherwise.
    pub fn from_points(points: Vec<CurvePoint>) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        if points.windows(2).any(|w| w[1].radius <= w[0].radius) {
            return None;
        }
        Some(Self { points })
    }
}

impl SteeringCurve for TableCurve {
    fn steer_for_radius(&self, radius: f32) -> i16 {
        let first = self.points[0];
        let last = self.points[self.points.len() - 1];
        if radius <= first.radius {
            return first.steer;
        }
        if radius >= last.radius {
            return last.steer;
        }
        for pair in self.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if radius <= b.radius {
                let t = (radius - a.radius) / (b.radius - a.radius);
                let steer = f32::from(a.steer) + t * f32::from(b.steer - a.steer);
                return steer.round() as i16;
            }
        }
        last.steer
    }
}

/// Translates bus velocity commands into steering outputs.
pub struct CommandTranslator {
    curve: Box<dyn SteeringCurve>,
}

impl std::fmt::Debug for CommandTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandTranslator").finish_non_exhaustive()
    }
}

impl Default for CommandTranslator {
    fn default() -> Self {
        Self::new(Box::new(TableCurve::default()))
    }
}

impl CommandTranslator {
    /// Create a translator over the given calibration curve.
    pub fn new(curve: Box<dyn SteeringCurve>) -> Self {
        Self { curve }
    }

    /// Convert a velocity command to hardware steering values.
    ///
    /// Speed truncates toward zero and saturates at the i16 range. Zero
    /// turn rate always means zero steer, whatever the linear speed. The
    /// steering-actuator polarity is asymmetric: positive `angular_z`
    /// (left turn) produces a negative steer value.
    pub fn translate(&self, cmd: &VelocityCommand) -> SteeringOutput {
        // `as` on floats truncates toward zero and saturates, matching the
        // firmware's integer conversion.
        let target_speed = (cmd.linear_x * SPEED_COUNTS_PER_MPS) as i16;

        let steer = if cmd.angular_z == 0.0 {
            0
        } else {
            let radius = (cmd.linear_x / cmd.angular_z).abs();
            let raw = self.curve.steer_for_radius(radius);
            let clamped = raw.clamp(-STEER_LIMIT, STEER_LIMIT);
            let signed = if cmd.angular_z > 0.0 {
                -clamped
            } else {
                clamped
            };
            signed as i8
        };

        SteeringOutput {
            target_speed,
            steer,
        }
    }
}
