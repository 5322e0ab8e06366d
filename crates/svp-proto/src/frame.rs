//! SVP frame header and CRC framing.
//!
//! Wire format (all fields network byte order):
//!
//! ```text
//! +--------------+--------------+----------------------------+
//! | version (2B) |    op (2B)   |      payload size (4B)     |
//! +--------------+--------------+----------------------------+
//! |           id (4B)           |          crc32 (4B)        |
//! +-----------------------------+----------------------------+
//! ```
//!
//! The CRC is CRC-32/IEEE computed over the whole framed message with
//! the CRC field itself as zero. Payload size excludes the header.

use crate::op::SvpOp;
use byteorder::{BigEndian, ByteOrder};

/// Protocol version spoken by this implementation.
pub const SVP_VERSION: u16 = 1;

/// Size of the frame header in bytes.
pub const HEADER_LEN: usize = 16;

/// Sentinel transaction id used by the handshake PING. Normal traffic
/// starts at 1 and never reaches the sentinel without wrapping past it.
pub const PING_ID: u32 = 0xffff_ffff;

/// Decoded SVP frame header.
///
/// `op` is kept as the raw wire value; use [`SvpHeader::op`] for the
/// typed view so unknown codes survive decoding and can be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvpHeader {
    pub version: u16,
    pub op: u16,
    pub size: u32,
    pub id: u32,
    pub crc: u32,
}

impl SvpHeader {
    /// Builds a header for an outbound frame. The CRC starts at zero
    /// and is filled in by [`encode_frame`].
    pub fn new(op: SvpOp, size: u32, id: u32) -> Self {
        Self {
            version: SVP_VERSION,
            op: op.as_u16(),
            size,
            id,
            crc: 0,
        }
    }

    /// The typed op code, if the wire value is known.
    pub fn op(&self) -> Option<SvpOp> {
        SvpOp::from_wire(self.op)
    }

    /// Encodes the header into its 16-byte network-order form.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        BigEndian::write_u16(&mut buf[0..2], self.version);
        BigEndian::write_u16(&mut buf[2..4], self.op);
        BigEndian::write_u32(&mut buf[4..8], self.size);
        BigEndian::write_u32(&mut buf[8..12], self.id);
        BigEndian::write_u32(&mut buf[12..16], self.crc);
        buf
    }

    /// Decodes a header from its 16-byte network-order form.
    pub fn decode(buf: &[u8; HEADER_LEN]) -> Self {
        Self {
            version: BigEndian::read_u16(&buf[0..2]),
            op: BigEndian::read_u16(&buf[2..4]),
            size: BigEndian::read_u32(&buf[4..8]),
            id: BigEndian::read_u32(&buf[8..12]),
            crc: BigEndian::read_u32(&buf[12..16]),
        }
    }
}

/// Computes the frame CRC over `header ++ payload` with the header's
/// CRC field treated as zero.
///
/// The caller's buffers are never mutated; the zeroed CRC bytes are
/// substituted in the view the checksum walks.
pub fn frame_crc(header: &[u8; HEADER_LEN], payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&header[..12]);
    hasher.update(&[0u8; 4]);
    hasher.update(payload);
    hasher.finalize()
}

/// Encodes a complete outbound frame: header, payload, and CRC.
pub fn encode_frame(op: SvpOp, id: u32, payload: &[u8]) -> Vec<u8> {
    let header = SvpHeader::new(op, payload.len() as u32, id);
    let mut hdr = header.encode();
    let crc = frame_crc(&hdr, payload);
    BigEndian::write_u32(&mut hdr[12..16], crc);

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&hdr);
    frame.extend_from_slice(payload);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_header_round_trip() {
        let header = SvpHeader {
            version: SVP_VERSION,
            op: SvpOp::Vl3Req.as_u16(),
            size: 24,
            id: 7,
            crc: 0xdead_beef,
        };
        let wire = header.encode();
        assert_eq!(SvpHeader::decode(&wire), header);
    }

    #[test]
    fn test_header_is_network_order() {
        let header = SvpHeader::new(SvpOp::Ping, 0, PING_ID);
        let wire = header.encode();
        assert_eq!(&wire[0..2], &[0x00, 0x01]); // version
        assert_eq!(&wire[2..4], &[0x00, 0x01]); // op
        assert_eq!(&wire[4..8], &[0x00, 0x00, 0x00, 0x00]); // size
        assert_eq!(&wire[8..12], &[0xff, 0xff, 0xff, 0xff]); // id
    }

    #[test]
    fn test_crc_known_vector() {
        // CRC-32/IEEE of "123456789" is 0xcbf43926.
        assert_eq!(crc32fast::hash(b"123456789"), 0xcbf4_3926);
    }

    #[test]
    fn test_frame_crc_ignores_stored_crc() {
        let mut hdr = SvpHeader::new(SvpOp::Vl3Req, 4, 9).encode();
        let payload = [1u8, 2, 3, 4];
        let clean = frame_crc(&hdr, &payload);
        BigEndian::write_u32(&mut hdr[12..16], 0x1234_5678);
        assert_eq!(frame_crc(&hdr, &payload), clean);
    }

    #[test]
    fn test_encode_frame_crc_recompute_law() {
        let payload = [0xabu8; 12];
        let frame = encode_frame(SvpOp::Vl2Req, 3, &payload);
        assert_eq!(frame.len(), HEADER_LEN + payload.len());

        let mut hdr = [0u8; HEADER_LEN];
        hdr.copy_from_slice(&frame[..HEADER_LEN]);
        let header = SvpHeader::decode(&hdr);
        assert_eq!(header.size as usize, payload.len());
        assert_eq!(header.crc, frame_crc(&hdr, &frame[HEADER_LEN..]));
    }
}
