//! # Range-Scan Snapshot
//!
//! Bulk outbound `L` frame carrying a 512-sample range scan.
//!
//! The firmware wants the whole scan as one byte per sample, scaled so that
//! 5.0 units of physical range maps to byte value 250. Ranges past the byte
//! ceiling saturate at 255; samples beyond the first 512 are dropped.

use crate::error::Result;
use crate::proto::packet::OutPacket;
use crate::proto::{SCAN_SAMPLES, TAG_SCAN};

/// Byte counts per physical range unit (250 = 5.0 units)
pub const SCAN_SCALE: f32 = 50.0;

/// One outbound scan, quantized for the wire.
#[derive(Clone)]
pub struct RangeSnapshot {
    samples: [u8; SCAN_SAMPLES],
}

impl std::fmt::Debug for RangeSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeSnapshot")
            .field("samples", &SCAN_SAMPLES)
            .finish_non_exhaustive()
    }
}

impl Default for RangeSnapshot {
    fn default() -> Self {
        Self {
            samples: [0; SCAN_SAMPLES],
        }
    }
}

impl RangeSnapshot {
    /// Quantize physical ranges into a snapshot.
    ///
    /// Missing trailing samples stay zero. The float-to-byte cast saturates,
    /// so out-of-range and non-finite inputs cannot wrap.
    pub fn from_ranges(ranges: &[f32]) -> Self {
        let mut samples = [0u8; SCAN_SAMPLES];
        for (slot, &range) in samples.iter_mut().zip(ranges.iter()) {
            *slot = (range * SCAN_SCALE) as u8;
        }
        Self { samples }
    }

    /// The quantized sample bytes.
    pub fn samples(&self) -> &[u8; SCAN_SAMPLES] {
        &self.samples
    }

    /// Encode as an `L` frame: tag, 512 sample bytes, flush.
    pub fn encode(&self, packet: &mut OutPacket) -> Result<()> {
        packet.reset(TAG_SCAN);
        packet.append_bytes(&self.samples)?;
        packet.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::FLUSH_MARKER;

    #[test]
    fn test_scale_five_units_is_250() {
        let snap = RangeSnapshot::from_ranges(&[5.0]);
        assert_eq!(snap.samples()[0], 250);
    }

    #[test]
    fn test_scale_saturates() {
        let snap = RangeSnapshot::from_ranges(&[100.0, -1.0, f32::NAN]);
        assert_eq!(snap.samples()[0], 255);
        assert_eq!(snap.samples()[1], 0);
        assert_eq!(snap.samples()[2], 0);
    }

    #[test]
    fn test_extra_samples_dropped() {
        let ranges = vec![1.0f32; SCAN_SAMPLES + 100];
        let snap = RangeSnapshot::from_ranges(&ranges);
        assert_eq!(snap.samples().len(), SCAN_SAMPLES);
        assert!(snap.samples().iter().all(|&s| s == 50));
    }

    #[test]
    fn test_short_scan_pads_with_zero() {
        let snap = RangeSnapshot::from_ranges(&[2.0, 2.0]);
        assert_eq!(snap.samples()[0], 100);
        assert_eq!(snap.samples()[1], 100);
        assert_eq!(snap.samples()[2], 0);
    }

    #[test]
    fn test_encode_frame_layout() {
        let snap = RangeSnapshot::from_ranges(&[1.0; SCAN_SAMPLES]);
        let mut pkt = OutPacket::with_capacity(1 + SCAN_SAMPLES + FLUSH_MARKER.len());
        snap.encode(&mut pkt).unwrap();

        let bytes = pkt.as_bytes().unwrap();
        assert_eq!(bytes.len(), 1 + SCAN_SAMPLES + FLUSH_MARKER.len());
        assert_eq!(bytes[0], b'L');
        assert!(bytes[1..=SCAN_SAMPLES].iter().all(|&b| b == 50));
        assert_eq!(&bytes[1 + SCAN_SAMPLES..], &FLUSH_MARKER);
    }
}
