//! The readiness loop.
//!
//! One task multiplexes the netlink socket, the SVP socket, and the
//! SIGHUP notifier. Each readiness consumes exactly one unit of work: a
//! single netlink datagram or a single framed SVP message. There are no
//! worker threads and no queues beyond the transaction registry; all
//! state lives in the [`Reactor`] and is touched serially.

use crate::error::{Result, VarpdError};
use crate::install::MappingInstaller;
use crate::link::LinkTable;
use crate::netlink::{NeighborTarget, NetlinkEvent, NetlinkSource};
use crate::scan::FabricScanner;
use crate::svp::SvpConnection;
use std::time::Duration;
use svp_proto::L3Type;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time;
use tracing::{info, warn};

/// Idle tick for the readiness wait. A timeout drives no logic.
pub const SELECT_TIMEOUT: Duration = Duration::from_secs(60);

/// All daemon state, threaded through every handler.
pub struct Reactor {
    links: LinkTable,
    scanner: FabricScanner,
    netlink: NetlinkSource,
    svp: SvpConnection,
    installer: Box<dyn MappingInstaller>,
}

impl Reactor {
    pub fn new(
        links: LinkTable,
        scanner: FabricScanner,
        netlink: NetlinkSource,
        svp: SvpConnection,
        installer: Box<dyn MappingInstaller>,
    ) -> Self {
        Self {
            links,
            scanner,
            netlink,
            svp,
            installer,
        }
    }

    /// Runs until a fatal error. Handlers either complete, log and
    /// drop, or return the error that ends the daemon; nothing is
    /// caught here.
    pub async fn run(&mut self) -> Result<()> {
        let mut hangup = signal(SignalKind::hangup())
            .map_err(|e| VarpdError::Netlink(format!("install SIGHUP handler: {e}")))?;
        info!("entering event loop");

        loop {
            tokio::select! {
                _ = hangup.recv() => {
                    info!("SIGHUP received, rescanning fabric links");
                    self.scanner.scan(&mut self.links, false)?;
                }
                event = self.netlink.recv_event() => {
                    if let Some(event) = event? {
                        self.handle_netlink(event).await?;
                    }
                }
                ready = self.svp.readable() => {
                    ready.map_err(|e| VarpdError::Protocol(format!("SVP readiness: {e}")))?;
                    self.svp.process_inbound(&mut *self.installer).await?;
                }
                _ = time::sleep(SELECT_TIMEOUT) => {}
            }
        }
    }

    /// Turns one kernel event into an SVP request or a rescan.
    async fn handle_netlink(&mut self, event: NetlinkEvent) -> Result<()> {
        match event {
            NetlinkEvent::LinkChange => self.scanner.scan(&mut self.links, false),
            NetlinkEvent::Resolve(query) => {
                let Some(vnetid) = self.links.vnet_for_index(query.ifindex) else {
                    warn!(ifindex = query.ifindex, "resolution trigger on unknown link, dropping");
                    return Ok(());
                };
                match query.target {
                    NeighborTarget::V4(v4) => {
                        // SVP carries IPv4 as v4-mapped.
                        self.svp
                            .send_vl3_req(query.ifindex, v4.to_ipv6_mapped(), L3Type::Ip, vnetid)
                            .await
                    }
                    NeighborTarget::V6(v6) => {
                        self.svp
                            .send_vl3_req(query.ifindex, v6, L3Type::Ipv6, vnetid)
                            .await
                    }
                    NeighborTarget::Mac(mac) => {
                        self.svp.send_vl2_req(query.ifindex, mac, vnetid).await
                    }
                }
            }
        }
    }
}
