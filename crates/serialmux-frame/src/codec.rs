use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Channel id field length in bytes.
pub const CHANNEL_LEN: usize = 1;
/// DLC field length in bytes.
pub const DLC_LEN: usize = 1;
/// Checksum field length in bytes.
pub const CHECKSUM_LEN: usize = 1;
/// Length of the complete header: channel (1) + DLC (1) + checksum (1).
pub const HEADER_LEN: usize = CHANNEL_LEN + DLC_LEN + CHECKSUM_LEN;
/// Maximum payload length in bytes.
pub const MAX_DATA_LEN: usize = 32;
/// Total frame length at the maximum DLC.
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_DATA_LEN;
/// Channel id reserved for the control channel.
pub const CONTROL_CHANNEL: u8 = 0;

/// A framed message with channel routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The channel this message belongs to.
    pub channel: u8,
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame, validating the payload length.
    pub fn new(channel: u8, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        if payload.is_empty() || payload.len() > MAX_DATA_LEN {
            return Err(FrameError::InvalidDlc { dlc: payload.len() });
        }
        Ok(Self { channel, payload })
    }

    /// The DLC (payload length) of this frame.
    pub fn dlc(&self) -> u8 {
        self.payload.len() as u8
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }
}

/// Compute the frame checksum: `(channel + dlc + Σ payload) mod 255`.
///
/// The modulus is 255, not 256. This is the interop contract with every
/// deployed peer and must stay bit-exact.
pub fn checksum(channel: u8, payload: &[u8]) -> u8 {
    let mut sum = u32::from(channel) + payload.len() as u32;
    for &byte in payload {
        sum += u32::from(byte);
    }
    (sum % u32::from(u8::MAX)) as u8
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌─────────────┬──────────┬────────────┬─────────────────┐
/// │ Channel (1B)│ DLC (1B) │ Checksum   │ Payload         │
/// │ 0 = control │ 1..=32   │ (1B, %255) │ (DLC bytes)     │
/// └─────────────┴──────────┴────────────┴─────────────────┘
/// ```
pub fn encode_frame(channel: u8, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.is_empty() || payload.len() > MAX_DATA_LEN {
        return Err(FrameError::InvalidDlc { dlc: payload.len() });
    }
    dst.reserve(HEADER_LEN + payload.len());
    dst.put_u8(channel);
    dst.put_u8(payload.len() as u8);
    dst.put_u8(checksum(channel, payload));
    dst.put_slice(payload);
    Ok(())
}

/// Decode one complete frame from a buffer.
///
/// The buffer must hold the whole frame; this is the whole-buffer
/// counterpart to [`crate::FrameCollector`]'s incremental reassembly,
/// used by tools and tests.
pub fn decode_frame(src: &[u8]) -> Result<Frame> {
    if src.len() < HEADER_LEN {
        return Err(FrameError::Truncated {
            have: src.len(),
            need: HEADER_LEN,
        });
    }

    let channel = src[0];
    let dlc = src[1] as usize;
    if dlc == 0 || dlc > MAX_DATA_LEN {
        return Err(FrameError::InvalidDlc { dlc });
    }

    let total = HEADER_LEN + dlc;
    if src.len() < total {
        return Err(FrameError::Truncated {
            have: src.len(),
            need: total,
        });
    }

    let payload = &src[HEADER_LEN..total];
    let expected = checksum(channel, payload);
    if expected != src[2] {
        return Err(FrameError::ChecksumMismatch {
            expected,
            found: src[2],
        });
    }

    Ok(Frame {
        channel,
        payload: Bytes::copy_from_slice(payload),
    })
}

/// Recompute the checksum of a complete frame and compare it to the
/// received checksum byte.
pub fn validate(frame: &[u8]) -> bool {
    if frame.len() < HEADER_LEN {
        return false;
    }
    let dlc = frame[1] as usize;
    if frame.len() != HEADER_LEN + dlc {
        return false;
    }
    checksum(frame[0], &frame[HEADER_LEN..]) == frame[2]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_matches_reference_vectors() {
        // (1 + 4 + 0x12 + 0x34 + 0x56 + 0x78) mod 255 = 0x1A
        assert_eq!(checksum(1, &[0x12, 0x34, 0x56, 0x78]), 0x1A);
        // SYNC at t=1000: cmd 0x00 + big-endian timestamp + zero padding
        let sync_payload: [u8; 16] = [
            0x00, 0x00, 0x00, 0x03, 0xE8, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00,
        ];
        assert_eq!(checksum(0, &sync_payload), 0xFB);
    }

    #[test]
    fn checksum_uses_modulus_255_not_256() {
        // channel 0, payload [1, 0xFE]: sum = 0 + 2 + 1 + 254 = 257, 257 % 255 = 2
        assert_eq!(checksum(0, &[0x01, 0xFE]), 0x02);
        // sum of exactly 255 wraps to 0
        assert_eq!(checksum(0, &[0xFD]), 0x00);
    }

    #[test]
    fn encode_produces_reference_bytes() {
        let mut buf = BytesMut::new();
        encode_frame(1, &[0x12, 0x34, 0x56, 0x78], &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0x01, 0x04, 0x1A, 0x12, 0x34, 0x56, 0x78]);
    }

    #[test]
    fn encode_decode_roundtrip() {
        let payload = [0xDE, 0xAD, 0xBE, 0xEF];
        let mut buf = BytesMut::new();
        encode_frame(3, &payload, &mut buf).unwrap();

        let frame = decode_frame(&buf).unwrap();
        assert_eq!(frame.channel, 3);
        assert_eq!(frame.payload.as_ref(), &payload);
        assert_eq!(frame.dlc(), 4);
        assert_eq!(frame.wire_size(), HEADER_LEN + 4);
    }

    #[test]
    fn every_encoded_frame_validates() {
        for dlc in 1..=MAX_DATA_LEN {
            let payload = vec![0x5A; dlc];
            let mut buf = BytesMut::new();
            encode_frame(7, &payload, &mut buf).unwrap();
            assert!(validate(&buf), "dlc {dlc} should validate");
        }
    }

    #[test]
    fn encode_rejects_empty_and_oversize_payloads() {
        let mut buf = BytesMut::new();
        assert!(matches!(
            encode_frame(1, &[], &mut buf),
            Err(FrameError::InvalidDlc { dlc: 0 })
        ));
        assert!(matches!(
            encode_frame(1, &[0u8; MAX_DATA_LEN + 1], &mut buf),
            Err(FrameError::InvalidDlc { dlc: 33 })
        ));
    }

    #[test]
    fn decode_rejects_corrupted_checksum() {
        let mut buf = BytesMut::new();
        encode_frame(2, &[0x11, 0x22], &mut buf).unwrap();
        buf[2] ^= 0xFF;

        assert!(matches!(
            decode_frame(&buf),
            Err(FrameError::ChecksumMismatch { .. })
        ));
        assert!(!validate(&buf));
    }

    #[test]
    fn decode_rejects_truncated_input() {
        let mut buf = BytesMut::new();
        encode_frame(2, &[0x11, 0x22], &mut buf).unwrap();

        assert!(matches!(
            decode_frame(&buf[..2]),
            Err(FrameError::Truncated { .. })
        ));
        assert!(matches!(
            decode_frame(&buf[..4]),
            Err(FrameError::Truncated { .. })
        ));
    }

    #[test]
    fn frame_new_enforces_dlc_bounds() {
        assert!(Frame::new(1, Bytes::from_static(b"x")).is_ok());
        assert!(Frame::new(1, Bytes::new()).is_err());
        assert!(Frame::new(1, Bytes::from(vec![0u8; 33])).is_err());
    }
}
