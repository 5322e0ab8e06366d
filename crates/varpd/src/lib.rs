//! varpd — overlay resolution agent for the SDC VXLAN fabric.
//!
//! The daemon keeps an inventory of the host's fabric links, listens to
//! the kernel's rtnetlink neighbor-resolution events, asks the Portolan
//! directory service for the overlay→underlay mappings the kernel is
//! missing, and hands the answers to the mapping installer.
//!
//! Structure:
//!
//! - [`link`] / [`scan`]: the fabric link inventory and its sysfs
//!   discovery walks
//! - [`netlink`]: the kernel event consumer
//! - [`svp`] / [`transaction`]: the Portolan transport and its
//!   in-flight request registry
//! - [`install`]: the seam the resolved mappings are programmed through
//! - [`reactor`]: the single-threaded readiness loop tying it together

pub mod config;
pub mod error;
pub mod install;
pub mod link;
pub mod netlink;
pub mod reactor;
pub mod scan;
pub mod svp;
pub mod transaction;

pub use error::{Result, VarpdError};
