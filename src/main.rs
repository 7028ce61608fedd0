#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! `p2p-dprd` node entrypoint (systemd-friendly).
//!
//! Loads configuration, binds the UDP peer socket and the local control
//! socket, spawns the metrics HTTP endpoint, sends the one-shot bootstrap
//! message, then runs the reactor event loop until SIGTERM/SIGINT.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info};

use p2p_dprd::core::config::Configuration;
use p2p_dprd::monitoring::metrics::{self, Metrics};
use p2p_dprd::reactor::Reactor;

/// Default bind address for the `GET /metrics` HTTP endpoint.
const DEFAULT_METRICS_ADDR: &str = "127.0.0.1:9898";

fn config_path() -> PathBuf {
    std::env::var("P2PDPRD_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./p2p-dprd.toml"))
}

fn metrics_addr() -> SocketAddr {
    std::env::var("P2PDPRD_METRICS_ADDR")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| DEFAULT_METRICS_ADDR.parse().expect("valid default literal"))
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }
}

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .compact()
        .try_init();

    let path = config_path();
    let cfg = match Configuration::load(Path::new(&path)) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, path = %path.display(), "failed to load configuration");
            std::process::exit(1);
        }
    };

    info!(port = cfg.port, local_socket = %cfg.local_socket_path, "p2p-dprd starting");

    let metrics = Arc::new(Metrics::new());
    if let Err(e) = metrics::serve(metrics.clone(), metrics_addr()).await {
        error!(error = %e, "failed to start metrics endpoint");
        std::process::exit(1);
    }

    let reactor = match Reactor::new(cfg, metrics).await {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "failed to initialize reactor");
            std::process::exit(1);
        }
    };

    // No explicit bootstrap here: the random list starts empty, so the
    // first tick's `store::random_peer` miss drives `Reactor::bootstrap`
    // reactively, exactly once (spec.md: "Called when the RandomList is
    // empty at tick time").
    reactor.run(shutdown_signal()).await;

    info!("p2p-dprd exiting");
}
