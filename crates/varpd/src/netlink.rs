//! Kernel routing/neighbor event consumer.
//!
//! A raw `NETLINK_ROUTE` datagram socket joined to the link, IPv4-route
//! and neighbor multicast groups delivers one datagram per kernel
//! event. The parser picks out the neighbor-resolution triggers
//! (RTM_GETNEIGH in the INCOMPLETE or PROBE states) and link-change
//! notifications; everything else is ignored.

use crate::error::{Result, VarpdError};
use byteorder::{ByteOrder, NativeEndian};
use netlink_sys::{protocols::NETLINK_ROUTE, Socket, SocketAddr};
use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use svp_proto::MacAddress;
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tracing::{debug, warn};

// rtnetlink message types and multicast groups (linux/rtnetlink.h).
const RTM_NEWLINK: u16 = 16;
const RTM_DELLINK: u16 = 17;
const RTM_NEWNEIGH: u16 = 28;
const RTM_GETNEIGH: u16 = 30;

const RTMGRP_LINK: u32 = 0x01;
const RTMGRP_NEIGH: u32 = 0x04;
const RTMGRP_IPV4_ROUTE: u32 = 0x40;

// Neighbor states that trigger a resolution (linux/neighbour.h).
const NUD_INCOMPLETE: u16 = 0x01;
const NUD_PROBE: u16 = 0x10;

// The neighbor attribute carrying the address being resolved.
const NDA_DST: u16 = 1;

// Fixed layout sizes: struct nlmsghdr and struct ndmsg.
const NLMSG_HDRLEN: usize = 16;
const NDMSG_LEN: usize = 12;
const RTA_HDRLEN: usize = 4;

/// Receive buffer size; ample for the neighbor and link ops we handle.
pub const NETLINK_BUF_SIZE: usize = 4096;

/// The address a neighbor-resolution trigger asks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborTarget {
    V4(Ipv4Addr),
    V6(Ipv6Addr),
    Mac(MacAddress),
}

/// One resolution trigger: the address and the link it came in on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborQuery {
    pub ifindex: i32,
    pub target: NeighborTarget,
}

/// What a kernel datagram asks the daemon to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetlinkEvent {
    /// Resolve an overlay neighbor via Portolan.
    Resolve(NeighborQuery),
    /// A link came or went; rescan the fabric inventory.
    LinkChange,
}

/// The kernel event source: socket, readiness wrapper, and buffer.
pub struct NetlinkSource {
    fd: AsyncFd<Socket>,
    buf: Vec<u8>,
}

impl NetlinkSource {
    /// Opens the NETLINK_ROUTE socket and joins the multicast groups.
    pub fn new() -> Result<Self> {
        let mut socket = Socket::new(NETLINK_ROUTE)
            .map_err(|e| VarpdError::Netlink(format!("create socket: {e}")))?;
        let addr = SocketAddr::new(0, RTMGRP_LINK | RTMGRP_IPV4_ROUTE | RTMGRP_NEIGH);
        socket
            .bind(&addr)
            .map_err(|e| VarpdError::Netlink(format!("bind: {e}")))?;
        socket
            .set_non_blocking(true)
            .map_err(|e| VarpdError::Netlink(format!("set nonblocking: {e}")))?;
        let fd = AsyncFd::with_interest(socket, Interest::READABLE)
            .map_err(|e| VarpdError::Netlink(format!("register with reactor: {e}")))?;
        debug!("netlink socket bound to link/route/neigh groups");
        Ok(Self {
            fd,
            buf: vec![0u8; NETLINK_BUF_SIZE],
        })
    }

    /// Receives exactly one datagram and parses it.
    ///
    /// Returns `None` for datagrams that carry nothing actionable.
    /// Cancellation-safe: a datagram is consumed atomically or not at
    /// all.
    pub async fn recv_event(&mut self) -> Result<Option<NetlinkEvent>> {
        loop {
            let mut guard = self.fd.readable().await?;
            let recv_result = guard.try_io(|fd| {
                let mut slice = &mut self.buf[..];
                fd.get_ref().recv(&mut slice, 0)
            });
            match recv_result {
                Ok(Ok(len)) => {
                    // A full buffer means the datagram was (or may have
                    // been) truncated by the kernel; nothing we handle
                    // is near this big.
                    if len >= self.buf.len() {
                        warn!(len, "netlink datagram exceeds receive buffer, dropping");
                        return Ok(None);
                    }
                    return Ok(parse_datagram(&self.buf[..len]));
                }
                Ok(Err(e)) => return Err(VarpdError::Netlink(format!("recv: {e}"))),
                Err(_would_block) => continue,
            }
        }
    }
}

/// Parses one netlink datagram into an event, if it carries one.
///
/// The datagram is kernel-originated, so a `recv` yields exactly one
/// message; `nlmsg_len` and the received size are reconciled by
/// trusting the shorter of the two.
pub fn parse_datagram(buf: &[u8]) -> Option<NetlinkEvent> {
    if buf.len() < NLMSG_HDRLEN {
        warn!(len = buf.len(), "short netlink datagram, dropping");
        return None;
    }

    let nlmsg_len = NativeEndian::read_u32(&buf[0..4]) as usize;
    let nlmsg_type = NativeEndian::read_u16(&buf[4..6]);
    if nlmsg_len != buf.len() {
        warn!(nlmsg_len, received = buf.len(), "netlink length mismatch, continuing");
    }
    let body = if nlmsg_len < buf.len() {
        &buf[..nlmsg_len]
    } else {
        buf
    };

    match nlmsg_type {
        RTM_GETNEIGH => parse_getneigh(body),
        // A resolution we did not answer fast enough, or an entry going
        // stale. Not acted on.
        RTM_NEWNEIGH => None,
        RTM_NEWLINK | RTM_DELLINK => Some(NetlinkEvent::LinkChange),
        _ => None,
    }
}

/// Parses the neighbor descriptor and attributes of an RTM_GETNEIGH.
fn parse_getneigh(buf: &[u8]) -> Option<NetlinkEvent> {
    if buf.len() < NLMSG_HDRLEN + NDMSG_LEN {
        warn!(len = buf.len(), "GETNEIGH too short for its descriptor, dropping");
        return None;
    }

    // struct ndmsg: family u8, pad u8, pad u16, ifindex i32, state u16,
    // flags u8, type u8.
    let ndm = &buf[NLMSG_HDRLEN..NLMSG_HDRLEN + NDMSG_LEN];
    let family = ndm[0] as i32;
    let ifindex = NativeEndian::read_i32(&ndm[4..8]);
    let state = NativeEndian::read_u16(&ndm[8..10]);
    let ndm_type = ndm[11] as u16;

    if family != libc::AF_INET && family != libc::AF_INET6 && family != libc::AF_PACKET {
        warn!(family, "unknown neighbor family, dropping");
        return None;
    }
    // Both INCOMPLETE and PROBE want an answer from us.
    if state != NUD_INCOMPLETE && state != NUD_PROBE {
        warn!(state, "uninteresting neighbor state, dropping");
        return None;
    }
    if ndm_type != NDA_DST {
        warn!(ndm_type, "unexpected neighbor descriptor type, dropping");
        return None;
    }

    let attrs = parse_attrs(&buf[NLMSG_HDRLEN + NDMSG_LEN..]);
    let Some(dst) = attrs.get(&NDA_DST) else {
        warn!(ifindex, "GETNEIGH without an NDA_DST attribute, dropping");
        return None;
    };

    let target = match family {
        f if f == libc::AF_INET => {
            let octets: [u8; 4] = dst.get(..4)?.try_into().ok()?;
            NeighborTarget::V4(Ipv4Addr::from(octets))
        }
        f if f == libc::AF_INET6 => {
            let octets: [u8; 16] = dst.get(..16)?.try_into().ok()?;
            NeighborTarget::V6(Ipv6Addr::from(octets))
        }
        _ => {
            let bytes: [u8; 6] = dst.get(..6)?.try_into().ok()?;
            NeighborTarget::Mac(MacAddress::new(bytes))
        }
    };

    debug!(ifindex, ?target, "neighbor resolution trigger");
    Some(NetlinkEvent::Resolve(NeighborQuery { ifindex, target }))
}

/// Walks the padded TLV attributes into a type-indexed table.
fn parse_attrs(buf: &[u8]) -> HashMap<u16, &[u8]> {
    let mut attrs = HashMap::new();
    let mut rest = buf;
    while rest.len() >= RTA_HDRLEN {
        let rta_len = NativeEndian::read_u16(&rest[0..2]) as usize;
        let rta_type = NativeEndian::read_u16(&rest[2..4]);
        if rta_len < RTA_HDRLEN || rta_len > rest.len() {
            warn!(rta_len, remaining = rest.len(), "malformed attribute, stopping walk");
            break;
        }
        attrs.insert(rta_type, &rest[RTA_HDRLEN..rta_len]);
        // Attributes are padded to a 4-byte boundary.
        let aligned = (rta_len + 3) & !3;
        if aligned >= rest.len() {
            break;
        }
        rest = &rest[aligned..];
    }
    attrs
}
