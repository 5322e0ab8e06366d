//! Lookup request and acknowledgement payload codecs.
//!
//! A VL2 lookup resolves an overlay MAC to the underlay (IP, port)
//! terminating its tunnel. A VL3 lookup resolves an overlay IP to its
//! overlay MAC, and implicitly performs the VL2 lookup as well. IPv4
//! addresses travel as IPv4-mapped IPv6 on the wire, in requests and in
//! underlay answers alike.

use crate::op::L3Type;
use crate::{CodecError, MacAddress};
use byteorder::{BigEndian, ByteOrder};
use std::net::Ipv6Addr;

/// VL2 request payload size.
pub const VL2_REQ_SIZE: usize = 12;
/// VL2 acknowledgement payload size.
pub const VL2_ACK_SIZE: usize = 20;
/// VL3 request payload size.
pub const VL3_REQ_SIZE: usize = 24;
/// VL3 acknowledgement payload size.
pub const VL3_ACK_SIZE: usize = 28;

fn check_len(what: &'static str, need: usize, buf: &[u8]) -> Result<(), CodecError> {
    if buf.len() < need {
        return Err(CodecError::Truncated {
            what,
            need,
            got: buf.len(),
        });
    }
    Ok(())
}

fn read_ipv6(buf: &[u8]) -> Ipv6Addr {
    let mut octets = [0u8; 16];
    octets.copy_from_slice(&buf[..16]);
    Ipv6Addr::from(octets)
}

fn read_mac(buf: &[u8]) -> MacAddress {
    let mut bytes = [0u8; 6];
    bytes.copy_from_slice(&buf[..6]);
    MacAddress::new(bytes)
}

/// An overlay MAC → underlay lookup request.
///
/// Wire: 6-byte MAC, 2 bytes of zero padding, 32-bit vnet-id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vl2Req {
    pub mac: MacAddress,
    pub vnetid: u32,
}

impl Vl2Req {
    pub fn encode(&self) -> [u8; VL2_REQ_SIZE] {
        let mut buf = [0u8; VL2_REQ_SIZE];
        buf[0..6].copy_from_slice(self.mac.as_bytes());
        // buf[6..8] stays zero padding
        BigEndian::write_u32(&mut buf[8..12], self.vnetid);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        check_len("VL2 request", VL2_REQ_SIZE, buf)?;
        Ok(Self {
            mac: read_mac(buf),
            vnetid: BigEndian::read_u32(&buf[8..12]),
        })
    }
}

/// The answer to a [`Vl2Req`].
///
/// Wire: 16-bit status, 16-bit underlay port, 16-byte underlay IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vl2Ack {
    pub status: u16,
    pub port: u16,
    pub ip: Ipv6Addr,
}

impl Vl2Ack {
    pub fn encode(&self) -> [u8; VL2_ACK_SIZE] {
        let mut buf = [0u8; VL2_ACK_SIZE];
        BigEndian::write_u16(&mut buf[0..2], self.status);
        BigEndian::write_u16(&mut buf[2..4], self.port);
        buf[4..20].copy_from_slice(&self.ip.octets());
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        check_len("VL2 ack", VL2_ACK_SIZE, buf)?;
        Ok(Self {
            status: BigEndian::read_u16(&buf[0..2]),
            port: BigEndian::read_u16(&buf[2..4]),
            ip: read_ipv6(&buf[4..20]),
        })
    }
}

/// An overlay IP → overlay MAC lookup request.
///
/// Wire: 16-byte overlay IP (IPv4-mapped if v4), 32-bit lookup type,
/// 32-bit vnet-id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vl3Req {
    pub ip: Ipv6Addr,
    pub l3type: L3Type,
    pub vnetid: u32,
}

impl Vl3Req {
    pub fn encode(&self) -> [u8; VL3_REQ_SIZE] {
        let mut buf = [0u8; VL3_REQ_SIZE];
        buf[0..16].copy_from_slice(&self.ip.octets());
        BigEndian::write_u32(&mut buf[16..20], self.l3type.as_u32());
        BigEndian::write_u32(&mut buf[20..24], self.vnetid);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        check_len("VL3 request", VL3_REQ_SIZE, buf)?;
        let raw_type = BigEndian::read_u32(&buf[16..20]);
        Ok(Self {
            ip: read_ipv6(&buf[0..16]),
            l3type: L3Type::from_wire(raw_type).ok_or(CodecError::UnknownL3Type(raw_type))?,
            vnetid: BigEndian::read_u32(&buf[20..24]),
        })
    }
}

/// The answer to a [`Vl3Req`]: both the VL3→VL2 and the VL2→UL3 halves.
///
/// Wire: 32-bit status, 6-byte overlay MAC, 16-bit underlay port,
/// 16-byte underlay IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vl3Ack {
    pub status: u32,
    pub mac: MacAddress,
    pub port: u16,
    pub ip: Ipv6Addr,
}

impl Vl3Ack {
    pub fn encode(&self) -> [u8; VL3_ACK_SIZE] {
        let mut buf = [0u8; VL3_ACK_SIZE];
        BigEndian::write_u32(&mut buf[0..4], self.status);
        buf[4..10].copy_from_slice(self.mac.as_bytes());
        BigEndian::write_u16(&mut buf[10..12], self.port);
        buf[12..28].copy_from_slice(&self.ip.octets());
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        check_len("VL3 ack", VL3_ACK_SIZE, buf)?;
        Ok(Self {
            status: BigEndian::read_u32(&buf[0..4]),
            mac: read_mac(&buf[4..10]),
            port: BigEndian::read_u16(&buf[10..12]),
            ip: read_ipv6(&buf[12..28]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::net::Ipv4Addr;

    #[test]
    fn test_vl3_req_round_trip() {
        let req = Vl3Req {
            ip: Ipv4Addr::new(10, 0, 0, 1).to_ipv6_mapped(),
            l3type: L3Type::Ip,
            vnetid: 4385813,
        };
        let wire = req.encode();
        assert_eq!(Vl3Req::decode(&wire).unwrap(), req);
    }

    #[test]
    fn test_vl3_req_wire_layout() {
        let req = Vl3Req {
            ip: Ipv4Addr::new(10, 0, 0, 1).to_ipv6_mapped(),
            l3type: L3Type::Ip,
            vnetid: 0x0102_0304,
        };
        let wire = req.encode();
        // ::ffff:10.0.0.1
        assert_eq!(&wire[10..16], &[0xff, 0xff, 10, 0, 0, 1]);
        assert_eq!(&wire[16..20], &[0, 0, 0, 1]); // type, BE
        assert_eq!(&wire[20..24], &[1, 2, 3, 4]); // vnetid, BE
    }

    #[test]
    fn test_vl3_req_rejects_unknown_type() {
        let mut wire = Vl3Req {
            ip: Ipv6Addr::LOCALHOST,
            l3type: L3Type::Ipv6,
            vnetid: 1,
        }
        .encode();
        wire[19] = 3;
        assert_eq!(Vl3Req::decode(&wire), Err(CodecError::UnknownL3Type(3)));
    }

    #[test]
    fn test_vl2_req_pads_mac() {
        let req = Vl2Req {
            mac: MacAddress::new([2, 8, 0x20, 0xaa, 0xbb, 0xcc]),
            vnetid: 99,
        };
        let wire = req.encode();
        assert_eq!(&wire[6..8], &[0, 0]);
        assert_eq!(Vl2Req::decode(&wire).unwrap(), req);
    }

    #[test]
    fn test_ack_round_trips() {
        let vl3 = Vl3Ack {
            status: 0,
            mac: MacAddress::new([2, 8, 0x20, 0xaa, 0xbb, 0xcc]),
            port: 4789,
            ip: Ipv4Addr::new(192, 168, 1, 5).to_ipv6_mapped(),
        };
        assert_eq!(Vl3Ack::decode(&vl3.encode()).unwrap(), vl3);

        let vl2 = Vl2Ack {
            status: 2,
            port: 0,
            ip: Ipv6Addr::UNSPECIFIED,
        };
        assert_eq!(Vl2Ack::decode(&vl2.encode()).unwrap(), vl2);
    }

    #[test]
    fn test_truncated_payloads() {
        assert!(matches!(
            Vl3Ack::decode(&[0u8; 27]),
            Err(CodecError::Truncated { need: 28, .. })
        ));
        assert!(matches!(
            Vl2Ack::decode(&[0u8; 4]),
            Err(CodecError::Truncated { need: 20, .. })
        ));
    }
}
