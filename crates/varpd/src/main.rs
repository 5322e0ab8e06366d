//! varpd - Overlay Resolution Agent Daemon
//!
//! Entry point: argument handling, logging setup, startup scan, SVP
//! handshake, and the reactor loop.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use varpd::config::Args;
use varpd::install::TracingInstaller;
use varpd::link::LinkTable;
use varpd::netlink::NetlinkSource;
use varpd::reactor::Reactor;
use varpd::scan::FabricScanner;
use varpd::svp::SvpConnection;

/// Initializes tracing/logging to stderr, honoring `RUST_LOG`.
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // Usage problems exit 1; --help/--version exit cleanly.
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_logging();
    info!(server = %args.server(), "varpd starting");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "varpd exiting on fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> varpd::Result<()> {
    let mut links = LinkTable::new();
    let scanner = FabricScanner::new(args.nic_file.clone());
    scanner.scan(&mut links, true)?;

    let svp = SvpConnection::connect(args.server()).await?;
    let netlink = NetlinkSource::new()?;

    let mut reactor = Reactor::new(links, scanner, netlink, svp, Box::new(TracingInstaller));
    reactor.run().await
}
