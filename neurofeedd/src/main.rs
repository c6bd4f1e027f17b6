//! Neurofeed Daemon - streams synthetic neural activity to dashboard clients
//!
//! Clients connect over TCP and exchange JSON lines:
//! - `start-simulation` / `stop-simulation` / `reset-simulation`
//! - `update-config` to change parameters of a running feed
//! - `get-status` for a snapshot of the session
//!
//! While a feed runs, the daemon pushes one `new-activity` frame per step.
//!
//! Config file locations:
//! - Linux: ~/.config/neurofeed/config.json
//! - Windows: %APPDATA%\neurofeed\config.json
//! - MacOS: ~/Library/Application Support/neurofeed/config.json

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

mod channel;
mod config;
mod feed;
mod paths;
mod protocol;
mod server;
mod session;

use config::{DaemonConfig, LISTEN_ENV};
use paths::AppPaths;
use server::Server;

struct Args {
    config: Option<PathBuf>,
    listen: Option<String>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config: None,
        listen: None,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => {
                let v = it.next().ok_or("--config needs a path")?;
                args.config = Some(PathBuf::from(v));
            }
            "--listen" => {
                args.listen = Some(it.next().ok_or("--listen needs an address")?);
            }
            "-h" | "--help" => {
                println!("Usage: neurofeedd [--config <path>] [--listen <addr:port>]");
                std::process::exit(0);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args = parse_args()?;

    // An explicit --config must exist; the default location is optional.
    let mut config = match &args.config {
        Some(path) => DaemonConfig::load(path, true)?,
        None => {
            let paths = AppPaths::new()?;
            info!("Config directory: {:?}", paths.config_dir());
            let path = paths.config_file();
            DaemonConfig::load(&path, false)?
        }
    };

    // Precedence: --listen, then the environment, then the file.
    config.apply_listen_override(std::env::var(LISTEN_ENV).ok());
    config.apply_listen_override(args.listen);
    config.validate()?;

    let listener = TcpListener::bind(&config.listen).await?;
    info!(
        "Neurofeed daemon listening on {} ({} mode)",
        listener.local_addr()?,
        config.channel_mode.as_str()
    );

    let server = Arc::new(Server::new(config));
    tokio::select! {
        res = server.run(listener) => {
            if let Err(e) = &res {
                error!("Accept loop failed: {}", e);
            }
            res?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C: shutting down");
        }
    }

    Ok(())
}
