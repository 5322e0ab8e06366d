//! Command line arguments and the fabric-NIC file.

use clap::Parser;
use std::fs;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};

/// Default Portolan TCP port.
pub const DEFAULT_SVP_PORT: u16 = 1296;

/// Default fabric-NIC configuration file.
pub const DEFAULT_NIC_FILE: &str = "/var/varpd/fabric-nics.txt";

/// Overlay resolution agent for the SDC VXLAN fabric.
///
/// Listens for kernel neighbor-resolution events on the fabric links,
/// resolves the missing overlay mappings against the Portolan directory
/// service, and installs the answers.
#[derive(Debug, Clone, Parser)]
#[command(name = "varpd")]
pub struct Args {
    /// Portolan server IPv4 address
    #[arg(short = 'a', value_name = "ADDR")]
    pub server_addr: Ipv4Addr,

    /// Portolan server TCP port
    #[arg(short = 'p', value_name = "PORT", default_value_t = DEFAULT_SVP_PORT,
          value_parser = parse_port)]
    pub port: u16,

    /// Fabric-NIC configuration file
    #[arg(short = 'f', value_name = "FILE", default_value = DEFAULT_NIC_FILE)]
    pub nic_file: PathBuf,
}

impl Args {
    /// The Portolan endpoint to connect to.
    pub fn server(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.server_addr, self.port))
    }
}

/// Rejects the port values the daemon cannot use: 0 and 0xFFFF.
fn parse_port(s: &str) -> Result<u16, String> {
    let port: u16 = s.parse().map_err(|_| format!("`{s}` is not a port number"))?;
    if port == 0 || port == 0xFFFF {
        return Err(format!("port {port} out of range (1-65534)"));
    }
    Ok(port)
}

/// Loads the fabric-NIC file: one interface name per line, with blank
/// lines and `#` comments ignored.
pub fn load_fabric_nics(path: &Path) -> io::Result<Vec<String>> {
    let contents = fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
