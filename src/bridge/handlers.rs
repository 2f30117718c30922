//! # Frame Handlers
//!
//! Interpreters for the message types the rover firmware actually sends.
//!
//! Each handler reads its tag's fixed field layout off the cursor and
//! publishes the decoded event on the bus. Handlers never look at bytes
//! beyond their own fields and never touch the transport.

use tracing::{debug, info};

use crate::bus::{
    BusEvent, BusSender, FrameTransform, GpsFixEvent, IdleEvent, OdometryEvent, SonarEvent,
};
use crate::error::Result;
use crate::proto::dispatch::{Dispatcher, FrameHandler};
use crate::proto::packet::InCursor;
use crate::proto::{NUM_SONARS, TAG_GPS, TAG_IDLE, TAG_ODOMETRY, TAG_SONAR};

fn publish(bus: &BusSender, event: BusEvent) {
    if bus.send(event).is_err() {
        debug!("bus receiver dropped, discarding event");
    }
}

/// `O` frames: f32 linear, f32 angular, f32 x, f32 y, f32 yaw.
///
/// Publishes the odometry event and the derived odom -> base_link transform.
pub struct OdometryHandler {
    bus: BusSender,
}

impl FrameHandler for OdometryHandler {
    fn on_frame(&mut self, _tag: u8, cursor: &mut InCursor<'_>) -> Result<()> {
        let odo = OdometryEvent {
            linear_velocity: cursor.read_f32()?,
            angular_velocity: cursor.read_f32()?,
            position_x: cursor.read_f32()?,
            position_y: cursor.read_f32()?,
            yaw: cursor.read_f32()?,
        };
        let transform = FrameTransform::from_odometry(&odo);
        publish(&self.bus, BusEvent::Odometry(odo));
        publish(&self.bus, BusEvent::Transform(transform));
        Ok(())
    }
}

/// `G` frames: i32 lat x 1e6, i32 lon x 1e6.
pub struct GpsHandler {
    bus: BusSender,
}

impl FrameHandler for GpsHandler {
    fn on_frame(&mut self, _tag: u8, cursor: &mut InCursor<'_>) -> Result<()> {
        let lat = cursor.read_i32()?;
        let lon = cursor.read_i32()?;
        info!("GPS lat: {} lon: {}", lat, lon);
        publish(&self.bus, BusEvent::GpsFix(GpsFixEvent::from_scaled(lat, lon)));
        Ok(())
    }
}

/// `I` frames: u16 idle count.
pub struct IdleHandler {
    bus: BusSender,
}

impl FrameHandler for IdleHandler {
    fn on_frame(&mut self, _tag: u8, cursor: &mut InCursor<'_>) -> Result<()> {
        let count = cursor.read_u16()?;
        info!("Idle count: {}", count);
        publish(&self.bus, BusEvent::Idle(IdleEvent { count }));
        Ok(())
    }
}

/// `S` frames: one u8 range per sonar.
pub struct SonarHandler {
    bus: BusSender,
}

impl FrameHandler for SonarHandler {
    fn on_frame(&mut self, _tag: u8, cursor: &mut InCursor<'_>) -> Result<()> {
        let mut ranges = [0u8; NUM_SONARS];
        for slot in ranges.iter_mut() {
            *slot = cursor.read_u8()?;
        }
        info!(
            "Sonar readings: {:3} {:3} {:3} {:3} {:3}",
            ranges[0], ranges[1], ranges[2], ranges[3], ranges[4]
        );
        publish(&self.bus, BusEvent::Sonar(SonarEvent { ranges }));
        Ok(())
    }
}

/// Install all live message handlers on a dispatcher.
pub fn register_handlers(dispatcher: &mut Dispatcher, bus: &BusSender) {
    dispatcher.register(TAG_ODOMETRY, Box::new(OdometryHandler { bus: bus.clone() }));
    dispatcher.register(TAG_GPS, Box::new(GpsHandler { bus: bus.clone() }));
    dispatcher.register(TAG_IDLE, Box::new(IdleHandler { bus: bus.clone() }));
    dispatcher.register(TAG_SONAR, Box::new(SonarHandler { bus: bus.clone() }));
}
