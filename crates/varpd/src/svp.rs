//! The SVP transport: connection, framing, and acknowledgement
//! dispatch.
//!
//! One TCP connection to Portolan lives for the lifetime of the
//! daemon. Outbound lookups go out framed with a fresh transaction id;
//! inbound acknowledgements are re-framed (they may arrive fragmented),
//! CRC-checked, matched to their transaction, and turned into mapping
//! installations.

use crate::error::{Result, VarpdError};
use crate::install::{MappingInstaller, UnderlayDest};
use crate::transaction::{IdGenerator, PendingRequest, Transaction, TransactionRegistry};
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use svp_proto::{
    encode_frame, frame_crc, L3Type, MacAddress, SvpHeader, SvpOp, SvpStatus, Vl2Ack, Vl2Req,
    Vl3Ack, Vl3Req, HEADER_LEN, PING_ID, SVP_VERSION,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt, Interest};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Inbound buffer bound; ample for every acknowledgement we accept.
pub const SVP_INBOUND_BUF: usize = 2048;

/// The connection to Portolan plus its in-flight bookkeeping.
#[derive(Debug)]
pub struct SvpConnection {
    stream: TcpStream,
    ids: IdGenerator,
    registry: TransactionRegistry,
}

impl SvpConnection {
    /// Opens the TCP connection and completes the version handshake:
    /// a framed PING carrying the sentinel id, answered by a PONG with
    /// a valid CRC. Anything else is fatal.
    pub async fn connect(server: SocketAddr) -> Result<Self> {
        let mut stream = TcpStream::connect(server)
            .await
            .map_err(|e| VarpdError::Handshake(format!("connect to {server}: {e}")))?;

        let ping = encode_frame(SvpOp::Ping, PING_ID, &[]);
        stream
            .write_all(&ping)
            .await
            .map_err(|e| VarpdError::Handshake(format!("send PING: {e}")))?;

        let mut reply = [0u8; HEADER_LEN];
        stream
            .read_exact(&mut reply)
            .await
            .map_err(|e| VarpdError::Handshake(format!("recv PONG: {e}")))?;

        let header = SvpHeader::decode(&reply);
        let computed = frame_crc(&reply, &[]);
        if header.crc != computed {
            return Err(VarpdError::Handshake(format!(
                "crc mismatch: wire {:#010x}, ours {:#010x}",
                header.crc, computed
            )));
        }
        if header.op() != Some(SvpOp::Pong) {
            return Err(VarpdError::Handshake(format!(
                "expected PONG, got op {:#06x}",
                header.op
            )));
        }

        info!(%server, "SVP handshake complete");
        Ok(Self {
            stream,
            ids: IdGenerator::new(),
            registry: TransactionRegistry::new(),
        })
    }

    /// Resolves when the peer has bytes for us.
    pub async fn readable(&self) -> std::io::Result<()> {
        self.stream.ready(Interest::READABLE).await.map(|_| ())
    }

    /// Live transactions awaiting an acknowledgement.
    pub fn outstanding(&self) -> usize {
        self.registry.len()
    }

    /// Sends a VL3 (overlay IP → overlay MAC) lookup. IPv4 targets
    /// arrive here already widened to their v4-mapped form.
    pub async fn send_vl3_req(
        &mut self,
        ifindex: i32,
        ip: Ipv6Addr,
        l3type: L3Type,
        vnetid: u32,
    ) -> Result<()> {
        let req = Vl3Req { ip, l3type, vnetid };
        self.send_request(ifindex, PendingRequest::Vl3(req), &req.encode())
            .await
    }

    /// Sends a VL2 (overlay MAC → underlay) lookup.
    pub async fn send_vl2_req(&mut self, ifindex: i32, mac: MacAddress, vnetid: u32) -> Result<()> {
        let req = Vl2Req { mac, vnetid };
        self.send_request(ifindex, PendingRequest::Vl2(req), &req.encode())
            .await
    }

    async fn send_request(
        &mut self,
        ifindex: i32,
        request: PendingRequest,
        payload: &[u8],
    ) -> Result<()> {
        let op = request.op();
        let id = self.ids.next_id();
        let frame = encode_frame(op, id, payload);
        debug!(id, ifindex, ?op, "sending SVP request");
        if let Err(e) = self.stream.write_all(&frame).await {
            // The kernel will re-ask if it still needs the answer.
            warn!(id, error = %e, "SVP request send failed, dropping");
            return Ok(());
        }
        self.registry.insert(Transaction {
            id,
            ifindex,
            request,
        })
    }

    /// Reads exactly one framed message and processes it.
    pub async fn process_inbound(&mut self, installer: &mut dyn MappingInstaller) -> Result<()> {
        match self.read_frame().await? {
            Some((header, payload)) => self.dispatch(header, &payload, installer),
            None => Ok(()),
        }
    }

    /// Loops until a full header and payload have been received.
    ///
    /// Returns `None` for frames that fail the CRC or version checks;
    /// those are logged and dropped without tearing the connection
    /// down. A payload bigger than the inbound bound is fatal.
    async fn read_frame(&mut self) -> Result<Option<(SvpHeader, Vec<u8>)>> {
        let mut hdr = [0u8; HEADER_LEN];
        self.stream
            .read_exact(&mut hdr)
            .await
            .map_err(|e| VarpdError::Protocol(format!("recv header: {e}")))?;
        let header = SvpHeader::decode(&hdr);

        let payload_len = header.size as usize;
        if HEADER_LEN + payload_len > SVP_INBOUND_BUF {
            return Err(VarpdError::Protocol(format!(
                "payload length {payload_len} exceeds inbound bound {SVP_INBOUND_BUF}"
            )));
        }
        let mut payload = vec![0u8; payload_len];
        self.stream
            .read_exact(&mut payload)
            .await
            .map_err(|e| VarpdError::Protocol(format!("recv payload: {e}")))?;

        let computed = frame_crc(&hdr, &payload);
        if computed != header.crc {
            warn!(
                id = header.id,
                wire = header.crc,
                ours = computed,
                "crc mismatch on inbound frame, dropping"
            );
            return Ok(None);
        }
        if header.version != SVP_VERSION {
            warn!(version = header.version, "unexpected SVP version, dropping");
            return Ok(None);
        }
        Ok(Some((header, payload)))
    }

    /// Matches an acknowledgement to its transaction and installs the
    /// answer it carries.
    fn dispatch(
        &mut self,
        header: SvpHeader,
        payload: &[u8],
        installer: &mut dyn MappingInstaller,
    ) -> Result<()> {
        let Some(txn) = self.registry.remove(header.id) else {
            warn!(id = header.id, "no transaction matches acknowledgement, dropping");
            return Ok(());
        };

        // REQ/ACK pairs are adjacent in the op space.
        let req_op = txn.request.op();
        match header.op() {
            Some(ack) if ack.acks(req_op.as_u16()) => {}
            _ => {
                warn!(
                    id = header.id,
                    req = req_op.as_u16(),
                    ack = header.op,
                    "request/acknowledgement op mismatch, dropping"
                );
                return Ok(());
            }
        }

        match txn.request {
            PendingRequest::Vl2(req) => self.handle_vl2_ack(&txn, req, payload, installer),
            PendingRequest::Vl3(req) => self.handle_vl3_ack(&txn, req, payload, installer),
        }
    }

    fn handle_vl2_ack(
        &mut self,
        txn: &Transaction,
        req: Vl2Req,
        payload: &[u8],
        installer: &mut dyn MappingInstaller,
    ) -> Result<()> {
        let ack = match Vl2Ack::decode(payload) {
            Ok(ack) => ack,
            Err(e) => {
                warn!(id = txn.id, error = %e, "undecodable VL2 ack, dropping");
                return Ok(());
            }
        };
        if !check_status(u32::from(ack.status), txn.id)? {
            return Ok(());
        }
        installer.install_overlay_mac(
            txn.ifindex,
            req.mac,
            UnderlayDest {
                ip: ack.ip,
                port: ack.port,
            },
        );
        Ok(())
    }

    fn handle_vl3_ack(
        &mut self,
        txn: &Transaction,
        req: Vl3Req,
        payload: &[u8],
        installer: &mut dyn MappingInstaller,
    ) -> Result<()> {
        let ack = match Vl3Ack::decode(payload) {
            Ok(ack) => ack,
            Err(e) => {
                warn!(id = txn.id, error = %e, "undecodable VL3 ack, dropping");
                return Ok(());
            }
        };
        if !check_status(ack.status, txn.id)? {
            return Ok(());
        }

        // The answer covers both halves. Program the overlay MAC first,
        // then the overlay IP that resolves to it.
        installer.install_overlay_mac(
            txn.ifindex,
            ack.mac,
            UnderlayDest {
                ip: ack.ip,
                port: ack.port,
            },
        );

        let overlay_ip = match req.l3type {
            L3Type::Ip => match req.ip.to_ipv4_mapped() {
                Some(v4) => IpAddr::V4(v4),
                None => {
                    return Err(VarpdError::Invariant(format!(
                        "IPv4 lookup {} was not v4-mapped",
                        req.ip
                    )))
                }
            },
            L3Type::Ipv6 => {
                if req.ip.to_ipv4_mapped().is_some() {
                    return Err(VarpdError::Invariant(format!(
                        "IPv6 lookup {} is v4-mapped",
                        req.ip
                    )));
                }
                IpAddr::V6(req.ip)
            }
        };
        installer.install_overlay_ip(txn.ifindex, overlay_ip, ack.mac);
        Ok(())
    }
}

/// Applies the server-status policy: OK proceeds, NOTFOUND quietly
/// drops the transaction, everything else takes the daemon down.
fn check_status(raw: u32, id: u32) -> Result<bool> {
    match SvpStatus::from_wire(raw) {
        Some(SvpStatus::Ok) => Ok(true),
        Some(SvpStatus::NotFound) => {
            info!(id, "lookup target not found, dropping transaction");
            Ok(false)
        }
        Some(SvpStatus::Fatal) => Err(VarpdError::ServerStatus(
            "server returned FATAL, closing".to_string(),
        )),
        Some(SvpStatus::BadL3Type) => Err(VarpdError::ServerStatus(
            "server rejected our L3 lookup type".to_string(),
        )),
        Some(SvpStatus::BadBulk) => Err(VarpdError::ServerStatus(
            "server answered BADBULK to a lookup".to_string(),
        )),
        None => Err(VarpdError::ServerStatus(format!(
            "invalid status value {raw:#x}"
        ))),
    }
}
