//! relayguard-server: backend-side gatekeeper daemon.
//!
//! Sits behind a trusted front-end relay and admits only those connections
//! whose handshake carries the secret token the relay injected. Everything
//! else — including direct connections that bypass the relay — is kicked
//! before it reaches backend state.

mod config;
mod extract;
mod interceptor;
mod server;
mod sessions;
mod store;

use clap::Parser;
use config::GuardConfig;
use extract::HandshakeFormat;
use server::GuardServer;
use std::path::Path;
use tracing::{error, info};

/// relayguard-server — relay-handshake gatekeeper
#[derive(Parser, Debug)]
#[command(name = "relayguard-server", version, about = "Relay-handshake gatekeeper")]
struct Cli {
    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address
    #[arg(long)]
    bind: Option<String>,

    /// Config file path
    #[arg(long, default_value = "~/.relayguard/config.toml")]
    config: String,

    /// Handshake format override
    #[arg(long, value_enum)]
    handshake_format: Option<HandshakeFormat>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    use tracing_subscriber::EnvFilter;
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting relayguard-server"
    );

    let config = match GuardConfig::load(
        Path::new(&cli.config),
        cli.port,
        cli.bind.as_deref(),
        cli.handshake_format,
    ) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    let guard_server = match GuardServer::new(config) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to create server");
            std::process::exit(1);
        }
    };

    tokio::select! {
        result = guard_server.run() => {
            if let Err(e) = result {
                error!(error = %e, "server error");
                std::process::exit(1);
            }
        }
        _ = shutdown_signal() => {
            info!("received shutdown signal");
        }
    }

    info!("relayguard-server stopped");
}

/// Wait for SIGTERM or SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
