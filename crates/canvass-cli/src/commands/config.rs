//! Show or validate the configuration file.

use std::path::PathBuf;

use canvass_core::Config;

use super::load_config;
use crate::ui;

/// Config command arguments.
#[derive(Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Explicit config file.
    pub path: Option<PathBuf>,
    /// Validate instead of printing.
    pub validate: bool,
}

/// Run the config command.
///
/// # Errors
///
/// Returns error if the config cannot be loaded or serialized.
pub fn run_config(args: &ConfigArgs) -> anyhow::Result<()> {
    let path = args.path.clone().unwrap_or_else(Config::default_path);

    if args.validate {
        return match load_config(args.path.as_deref()) {
            Ok(_) => {
                ui::success(&format!("{} is valid", path.display()));
                Ok(())
            }
            Err(e) => {
                ui::error(&format!("{}: {e}", path.display()));
                Err(e.into())
            }
        };
    }

    if !path.exists() {
        ui::info(&format!("{} not found; showing defaults", path.display()));
    }
    let mut config = load_config(args.path.as_deref())?;
    if config.session.secret.is_some() {
        config.session.secret = Some("<redacted>".to_string());
    }

    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
