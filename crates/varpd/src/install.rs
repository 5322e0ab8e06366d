//! The mapping-installer seam.
//!
//! Resolved answers are programmed into the kernel's neighbor and
//! bridge-FDB tables. That programming lives behind
//! [`MappingInstaller`] so the resolution core stays independent of the
//! `ip neigh`/`bridge fdb` plumbing; the shipped implementation logs
//! what it would install.

use std::net::{IpAddr, Ipv6Addr};
use svp_proto::MacAddress;
use tracing::info;

/// The underlay tunnel endpoint an overlay MAC resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnderlayDest {
    pub ip: Ipv6Addr,
    pub port: u16,
}

/// Where resolved overlay mappings get programmed.
pub trait MappingInstaller {
    /// Install overlay MAC → underlay (IP, port); the `bridge fdb add`
    /// equivalent on the VXLAN device.
    fn install_overlay_mac(&mut self, ifindex: i32, mac: MacAddress, dest: UnderlayDest);

    /// Install overlay IP → overlay MAC; the `ip neigh add` equivalent
    /// on the VLAN link.
    fn install_overlay_ip(&mut self, ifindex: i32, ip: IpAddr, mac: MacAddress);
}

/// Logs each installation instead of programming the kernel.
#[derive(Debug, Default)]
pub struct TracingInstaller;

impl MappingInstaller for TracingInstaller {
    fn install_overlay_mac(&mut self, ifindex: i32, mac: MacAddress, dest: UnderlayDest) {
        info!(ifindex, %mac, underlay = %dest.ip, port = dest.port, "installing overlay MAC");
    }

    fn install_overlay_ip(&mut self, ifindex: i32, ip: IpAddr, mac: MacAddress) {
        info!(ifindex, %ip, %mac, "installing overlay IP");
    }
}
