//! SVP protocol definitions for the overlay fabric.
//!
//! SVP is the framed TCP request/response protocol spoken to the
//! Portolan directory service. This crate carries everything both ends
//! of the wire agree on:
//!
//! - [`SvpHeader`]: the 16-byte CRC-protected frame header
//! - [`SvpOp`] / [`SvpStatus`]: operation and status codes
//! - [`Vl2Req`], [`Vl2Ack`], [`Vl3Req`], [`Vl3Ack`]: lookup payloads
//! - [`MacAddress`], [`VnetId`], [`VlanId`]: overlay value types
//!
//! It is a pure codec crate: no sockets, no async, no policy.

mod frame;
mod mac;
mod op;
mod payload;
mod vlan;
mod vnet;

pub use frame::{encode_frame, frame_crc, SvpHeader, HEADER_LEN, PING_ID, SVP_VERSION};
pub use mac::MacAddress;
pub use op::{L3Type, SvpOp, SvpStatus};
pub use payload::{
    Vl2Ack, Vl2Req, Vl3Ack, Vl3Req, VL2_ACK_SIZE, VL2_REQ_SIZE, VL3_ACK_SIZE, VL3_REQ_SIZE,
};
pub use vlan::VlanId;
pub use vnet::VnetId;

/// Common error type for value-type parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid vnet id: {0} (must be 1-16777215)")]
    InvalidVnetId(u32),

    #[error("invalid VLAN id: {0} (must be 1-1023)")]
    InvalidVlanId(u32),
}

/// Error type for wire decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("{what}: need {need} bytes, got {got}")]
    Truncated {
        what: &'static str,
        need: usize,
        got: usize,
    },

    #[error("unknown L3 lookup type on the wire: {0}")]
    UnknownL3Type(u32),
}
