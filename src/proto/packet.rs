//! # Packet Codec
//!
//! Typed builder for outbound packets and field reader for inbound payloads.
//!
//! [`OutPacket`] is a reusable builder with three phases: `reset` clears the
//! buffer and writes the type tag, `append_*` adds one little-endian field,
//! and `finish` appends the flush marker and makes the bytes sendable. The
//! firmware's builder left out-of-phase use undefined; here it is an explicit
//! [`BridgeError::PacketState`] error instead.
//!
//! [`InCursor`] walks a frame's payload front to back. Each `read_*` advances
//! by the field's width; there is no seeking, so fields must be read in the
//! exact order the protocol defines for that tag. Reading past the end is a
//! [`BridgeError::DecodeUnderflow`], never a silent zero.

use bytes::BufMut;

use super::FLUSH_MARKER;
use crate::error::{BridgeError, Result};

/// Reusable outbound packet builder.
///
/// Long-lived by design: the loop constructs one per outbound message type at
/// startup and `reset`s it each cycle instead of allocating per send.
///
/// # Examples
///
/// ```
/// use rover_bridge::proto::packet::OutPacket;
///
/// let mut pkt = OutPacket::new();
/// pkt.reset(b'C');
/// pkt.append_i16(62)?;
/// pkt.append_i8(-30)?;
/// pkt.finish()?;
/// assert_eq!(pkt.as_bytes()?.len(), 12);
/// # Ok::<(), rover_bridge::error::BridgeError>(())
/// ```
#[derive(Debug)]
pub struct OutPacket {
    buf: Vec<u8>,
    ready: bool,
}

impl Default for OutPacket {
    fn default() -> Self {
        Self::new()
    }
}

impl OutPacket {
    /// Create an empty builder. `reset` must be called before appending.
    pub fn new() -> Self {
        Self::with_capacity(32)
    }

    /// Create an empty builder sized for a known payload.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            ready: false,
        }
    }

    /// Clear any previous contents and start a new packet with `tag`.
    pub fn reset(&mut self, tag: u8) {
        self.buf.clear();
        self.buf.put_u8(tag);
        self.ready = false;
    }

    fn check_open(&self) -> Result<()> {
        if self.buf.is_empty() {
            return Err(BridgeError::PacketState("append before reset"));
        }
        if self.ready {
            return Err(BridgeError::PacketState("append after finish"));
        }
        Ok(())
    }

    /// Append an unsigned byte field.
    pub fn append_u8(&mut self, value: u8) -> Result<()> {
        self.check_open()?;
        self.buf.put_u8(value);
        Ok(())
    }

    /// Append a signed byte field.
    pub fn append_i8(&mut self, value: i8) -> Result<()> {
        self.check_open()?;
        self.buf.put_i8(value);
        Ok(())
    }

    /// Append an unsigned 16-bit field, little-endian.
    pub fn append_u16(&mut self, value: u16) -> Result<()> {
        self.check_open()?;
        self.buf.put_u16_le(value);
        Ok(())
    }

    /// Append a signed 16-bit field, little-endian.
    pub fn append_i16(&mut self, value: i16) -> Result<()> {
        self.check_open()?;
        self.buf.put_i16_le(value);
        Ok(())
    }

    /// Append an unsigned 32-bit field, little-endian.
    pub fn append_u32(&mut self, value: u32) -> Result<()> {
        self.check_open()?;
        self.buf.put_u32_le(value);
        Ok(())
    }

    /// Append a signed 32-bit field, little-endian.
    pub fn append_i32(&mut self, value: i32) -> Result<()> {
        self.check_open()?;
        self.buf.put_i32_le(value);
        Ok(())
    }

    /// Append a 32-bit float field, little-endian.
    pub fn append_f32(&mut self, value: f32) -> Result<()> {
        self.check_open()?;
        self.buf.put_f32_le(value);
        Ok(())
    }

    /// Append a run of raw bytes (bulk payloads such as scan snapshots).
    pub fn append_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_open()?;
        self.buf.put_slice(bytes);
        Ok(())
    }

    /// Append the flush marker and mark the packet sendable.
    pub fn finish(&mut self) -> Result<()> {
        self.check_open()?;
        self.buf.put_slice(&FLUSH_MARKER);
        self.ready = true;
        Ok(())
    }

    /// Whether `finish` has been called since the last `reset`.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// The encoded bytes, flush marker included. Errors before `finish`.
    pub fn as_bytes(&self) -> Result<&[u8]> {
        if !self.ready {
            return Err(BridgeError::PacketState("read before finish"));
        }
        Ok(&self.buf)
    }

    /// Current length in bytes, tag included.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written since construction.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Read-only forward cursor over a frame's payload.
///
/// The type tag has already been consumed by the dispatcher; the cursor sees
/// only the payload bytes and lives no longer than the frame it reads.
#[derive(Debug)]
pub struct InCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> InCursor<'a> {
    /// Create a cursor at the start of `payload`.
    pub fn new(payload: &'a [u8]) -> Self {
        Self {
            data: payload,
            pos: 0,
        }
    }

    fn take(&mut self, width: usize) -> Result<&'a [u8]> {
        let remaining = self.data.len() - self.pos;
        if remaining < width {
            return Err(BridgeError::DecodeUnderflow {
                needed: width,
                remaining,
            });
        }
        let field = &self.data[self.pos..self.pos + width];
        self.pos += width;
        Ok(field)
    }

    /// Read an unsigned byte field.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a signed byte field.
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    /// Read an unsigned 16-bit field, little-endian.
    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Read a signed 16-bit field, little-endian.
    pub fn read_i16(&mut self) -> Result<i16> {
        let b = self.take(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    /// Read an unsigned 32-bit field, little-endian.
    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a signed 32-bit field, little-endian.
    pub fn read_i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a 32-bit float field, little-endian.
    pub fn read_f32(&mut self) -> Result<f32> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Number of unread payload bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// The unread payload bytes, without advancing.
    pub fn remaining_bytes(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}
