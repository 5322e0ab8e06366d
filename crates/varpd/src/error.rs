//! Error types for varpd.
//!
//! Fatal conditions become `VarpdError` values that propagate up to
//! `main`. Transient conditions (dropped events, unknown ids, CRC
//! mismatches on routine frames) are logged where they are observed and
//! never reach this type.

use thiserror::Error;

/// Errors that abort the daemon.
#[derive(Debug, Error)]
pub enum VarpdError {
    /// I/O failure on a daemon-lifetime resource
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Netlink socket setup failure
    #[error("netlink error: {0}")]
    Netlink(String),

    /// SVP version handshake failure
    #[error("SVP handshake failed: {0}")]
    Handshake(String),

    /// SVP connection-level failure (broken socket, oversized frame)
    #[error("SVP protocol error: {0}")]
    Protocol(String),

    /// Server answered with a status that closes the connection
    #[error("SVP server status: {0}")]
    ServerStatus(String),

    /// Fabric scan failure that cannot be skipped
    #[error("fabric scan failed: {0}")]
    Scan(String),

    /// Link table index out of the signed 32-bit range
    #[error("link table index {0} out of range")]
    LinkIndex(i32),

    /// Interface name exceeds the kernel bound
    #[error("link name too long: {0:?}")]
    LinkName(String),

    /// Re-registration of an ifindex with differing fields
    #[error("link {ifindex} ({name:?}) re-registered with mismatched fields")]
    LinkMismatch { ifindex: i32, name: String },

    /// Transaction id collision; the id generator rules this out
    #[error("duplicate live transaction id {0}")]
    DuplicateTransaction(u32),

    /// Internal consistency violation
    #[error("invariant violated: {0}")]
    Invariant(String),
}

/// Result type alias for varpd operations.
pub type Result<T> = std::result::Result<T, VarpdError>;
