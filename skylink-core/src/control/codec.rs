//! Fixed-length binary framing for control samples.
//!
//! ## Wire format
//!
//! **Control packet** (16 bytes, little-endian):
//! ```text
//! roll:      i32  (4)
//! pitch:     i32  (4)
//! yaw:       i32  (4)
//! throttle:  i32  (4)
//! ```
//!
//! There is no header, sequence number or checksum. Each packet is a
//! complete state snapshot and the newest one wins.

use crate::axis::AxisSample;
use crate::error::LinkError;

/// Exact size of a control datagram.
pub const CONTROL_PACKET_SIZE: usize = 16;

/// Encoder / decoder for [`AxisSample`] control packets.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControlCodec;

impl ControlCodec {
    /// Serialize a sample. Each channel is clamped into range first, so
    /// an out-of-range value never reaches the wire.
    pub fn encode(sample: &AxisSample) -> [u8; CONTROL_PACKET_SIZE] {
        let clamped = sample.clamped();
        let mut buf = [0u8; CONTROL_PACKET_SIZE];
        for (slot, value) in buf.chunks_exact_mut(4).zip(clamped.to_array()) {
            slot.copy_from_slice(&value.to_le_bytes());
        }
        buf
    }

    /// Deserialize a control datagram.
    ///
    /// Values are returned exactly as transmitted; the receiver clamps
    /// before applying them.
    pub fn decode(data: &[u8]) -> Result<AxisSample, LinkError> {
        if data.len() != CONTROL_PACKET_SIZE {
            return Err(LinkError::MalformedPacket {
                expected: CONTROL_PACKET_SIZE,
                actual: data.len(),
            });
        }

        let mut values = [0i32; 4];
        for (value, field) in values.iter_mut().zip(data.chunks_exact(4)) {
            *value = i32::from_le_bytes([field[0], field[1], field[2], field[3]]);
        }
        Ok(AxisSample::from_array(values))
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::{AXIS_MAX, AXIS_MID, AXIS_MIN};

    #[test]
    fn roundtrip_in_range_samples() {
        let samples = [
            AxisSample::centered(),
            AxisSample::disarmed(),
            AxisSample::new(AXIS_MIN, AXIS_MAX, AXIS_MIN, AXIS_MAX),
            AxisSample::new(16384, 16384, 16384, 1),
            AxisSample::new(123, 4567, 8910, 31000),
        ];
        for s in samples {
            assert_eq!(ControlCodec::decode(&ControlCodec::encode(&s)).unwrap(), s);
        }
    }

    #[test]
    fn field_order_and_endianness() {
        let bytes = ControlCodec::encode(&AxisSample::new(1, 2, 3, 0x0102));
        assert_eq!(&bytes[0..4], &[1, 0, 0, 0]);
        assert_eq!(&bytes[4..8], &[2, 0, 0, 0]);
        assert_eq!(&bytes[8..12], &[3, 0, 0, 0]);
        assert_eq!(&bytes[12..16], &[0x02, 0x01, 0, 0]);
    }

    #[test]
    fn encode_clamps_out_of_range() {
        let bytes = ControlCodec::encode(&AxisSample::new(-40, 99_999, AXIS_MID, 0));
        let decoded = ControlCodec::decode(&bytes).unwrap();
        assert_eq!(decoded, AxisSample::new(AXIS_MIN, AXIS_MAX, AXIS_MID, AXIS_MIN));
    }

    #[test]
    fn decode_rejects_wrong_lengths() {
        for len in [0usize, 1, 4, 15, 17, 32, 1024] {
            let data = vec![0xFFu8; len];
            match ControlCodec::decode(&data) {
                Err(LinkError::MalformedPacket { expected, actual }) => {
                    assert_eq!(expected, CONTROL_PACKET_SIZE);
                    assert_eq!(actual, len);
                }
                other => panic!("len {len}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn decode_does_not_validate_range() {
        let mut raw = [0u8; CONTROL_PACKET_SIZE];
        raw[12..16].copy_from_slice(&(-5i32).to_le_bytes());
        let s = ControlCodec::decode(&raw).unwrap();
        assert_eq!(s.throttle, -5);
        assert_eq!(s.roll, 0);
    }
}
