//! # Wire Protocol
//!
//! Core definitions for the rover's serial frame protocol.
//!
//! The link carries carriage-return-delimited frames. The first byte of each
//! frame is a type tag; the remaining bytes are a binary payload whose layout
//! is fixed per tag. All multi-byte fields are little-endian, matching the
//! microcontroller's native representation. There is no CRC and no
//! acknowledgement: the protocol is fire-and-forget, and a lost frame is
//! simply superseded by the next cycle's data.

pub mod dispatch;
pub mod framing;
pub mod packet;

/// Frame delimiter byte (carriage return)
pub const FRAME_DELIMITER: u8 = 0x0D;

/// Flush marker appended after every outbound packet.
///
/// A run of delimiters forces the receiver's frame scanner to terminate the
/// message promptly even under partial reads; the empty spans it produces on
/// the far side are discarded as noise.
pub const FLUSH_MARKER: [u8; 8] = [FRAME_DELIMITER; 8];

/// Capacity of the inbound accumulation buffer
pub const RAW_BUFFER_CAPACITY: usize = 1024;

/// Odometry update frame: f32 linear, f32 angular, f32 x, f32 y, f32 yaw
pub const TAG_ODOMETRY: u8 = b'O';

/// GPS fix frame: i32 lat x 1e6, i32 lon x 1e6
pub const TAG_GPS: u8 = b'G';

/// Idle counter frame: u16 idle count
pub const TAG_IDLE: u8 = b'I';

/// Sonar frame: 5 x u8 ranges
pub const TAG_SONAR: u8 = b'S';

/// Outbound velocity command frame: i16 speed, i8 steer
pub const TAG_COMMAND: u8 = b'C';

/// Outbound range-scan snapshot frame: 512 x u8 samples
pub const TAG_SCAN: u8 = b'L';

/// Number of sonar sensors reported in a `S` frame
pub const NUM_SONARS: usize = 5;

/// Number of samples in an outbound `L` scan snapshot
pub const SCAN_SAMPLES: usize = 512;

/// Total size of an encoded command frame: tag + i16 + i8 + flush
pub const COMMAND_FRAME_LEN: usize = 12;

/// One delimiter-bounded unit of the wire protocol.
///
/// A frame is an immutable view into the extractor's buffer, valid only until
/// the next `feed` call. The extractor guarantees at least two bytes: the tag
/// and one payload byte (shorter spans are delimiter noise and never reach a
/// handler).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    bytes: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Wrap a delimiter-free byte span as a frame.
    ///
    /// Callers must guarantee `bytes` is non-empty; the extractor and the
    /// tests are the only constructors.
    pub fn new(bytes: &'a [u8]) -> Self {
        debug_assert!(!bytes.is_empty());
        Self { bytes }
    }

    /// The type tag identifying this frame's message type
    pub fn tag(&self) -> u8 {
        self.bytes[0]
    }

    /// The binary payload following the tag
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[1..]
    }

    /// The full frame contents, tag included
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Total frame length in bytes, tag included
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the frame is empty (never true for extractor-produced frames)
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_constants() {
        assert_eq!(FRAME_DELIMITER, b'\r');
        assert_eq!(FLUSH_MARKER.len(), 8);
        assert!(FLUSH_MARKER.iter().all(|&b| b == FRAME_DELIMITER));
        assert_eq!(RAW_BUFFER_CAPACITY, 1024);
    }

    #[test]
    fn test_tag_values() {
        assert_eq!(TAG_ODOMETRY, 0x4F);
        assert_eq!(TAG_GPS, 0x47);
        assert_eq!(TAG_IDLE, 0x49);
        assert_eq!(TAG_SONAR, 0x53);
        assert_eq!(TAG_COMMAND, 0x43);
        assert_eq!(TAG_SCAN, 0x4C);
    }

    #[test]
    fn test_frame_accessors() {
        let bytes = [b'O', 1, 2, 3];
        let frame = Frame::new(&bytes);
        assert_eq!(frame.tag(), b'O');
        assert_eq!(frame.payload(), &[1, 2, 3]);
        assert_eq!(frame.bytes(), &bytes);
        assert_eq!(frame.len(), 4);
        assert!(!frame.is_empty());
    }

    #[test]
    fn test_command_frame_len() {
        // tag(1) + speed(2) + steer(1) + flush(8)
        assert_eq!(COMMAND_FRAME_LEN, 1 + 2 + 1 + FLUSH_MARKER.len());
    }
}
