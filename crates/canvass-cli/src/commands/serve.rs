//! Run the gateway in the foreground.

use std::path::PathBuf;

use anyhow::Context;
use canvass_gateway::{Gateway, GatewayConfig};

use super::load_config;
use crate::ui;

/// Serve command arguments.
#[derive(Debug, Clone)]
pub struct ServeArgs {
    /// Explicit config file.
    pub config_path: Option<PathBuf>,
    /// Port override.
    pub port: Option<u16>,
    /// Bind address override.
    pub bind: Option<String>,
    /// Skip the port-in-use check.
    pub force: bool,
}

/// Load config, apply overrides, and serve until Ctrl+C.
///
/// # Errors
///
/// Returns error if the config is invalid or the server fails.
pub async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = load_config(args.config_path.as_deref()).context("Invalid configuration")?;

    let mut gateway_config = GatewayConfig::from(&config);
    if let Some(port) = args.port {
        gateway_config.port = port;
    }
    if let Some(bind) = args.bind {
        gateway_config.bind_address = bind;
    }

    let address = format!("{}:{}", gateway_config.bind_address, gateway_config.port);
    if !args.force && std::net::TcpListener::bind(&address).is_err() {
        ui::error(&format!(
            "Port {} is already in use. Use --force to override.",
            gateway_config.port
        ));
        return Ok(());
    }

    ui::header("Starting Canvass");
    ui::kv("Address", &address);
    ui::kv("Data", &gateway_config.data_dir.display().to_string());
    if gateway_config.auth.session_secret.is_none() {
        ui::info("No session secret configured; using the one stored in the data directory");
    }
    println!();
    ui::info("Press Ctrl+C to stop");

    let gateway = Gateway::new(gateway_config)?;
    gateway.run().await?;

    ui::success("Stopped");
    Ok(())
}
