//! Check on a running gateway.

use std::path::Path;
use std::time::Duration;

use super::load_config;
use crate::ui::{self, HealthStatus};

/// Report config and server health.
///
/// # Errors
///
/// Returns error only if the HTTP client cannot be built.
pub async fn run_status(config_path: Option<&Path>) -> anyhow::Result<()> {
    ui::header("Canvass Status");

    let config = match load_config(config_path) {
        Ok(config) => {
            ui::health_check("Config", HealthStatus::Ok, Some("loaded"));
            config
        }
        Err(e) => {
            ui::health_check("Config", HealthStatus::Error, Some(&e.to_string()));
            return Ok(());
        }
    };
    ui::kv("  Data", &config.data_dir().display().to_string());

    let port = config.server.port;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;

    match client
        .get(format!("http://127.0.0.1:{port}/health"))
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            let body = resp.text().await.unwrap_or_default();
            ui::health_check("Server", HealthStatus::Ok, Some(body.trim()));
            ui::kv("  Port", &port.to_string());
        }
        Ok(resp) => {
            ui::health_check(
                "Server",
                HealthStatus::Error,
                Some(&format!("health returned {}", resp.status())),
            );
        }
        Err(_) => {
            ui::health_check("Server", HealthStatus::Warning, Some("not running"));
            ui::info("  Start with: canvass serve");
        }
    }

    Ok(())
}
