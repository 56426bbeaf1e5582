//! CLI command implementations.

pub mod admin;
pub mod config;
pub mod roles;
pub mod serve;
pub mod status;

use std::path::Path;

use anyhow::Context;
use canvass_core::Config;
use canvass_gateway::{AuthConfig, AuthState};

pub use admin::run_admin;
pub use config::run_config;
pub use roles::run_roles;
pub use serve::run_serve;
pub use status::run_status;

/// Load the config at `path`, or the default location when none is given.
pub fn load_config(path: Option<&Path>) -> Result<Config, canvass_core::ConfigError> {
    match path {
        Some(path) => Config::load(path),
        None => Config::load_default(),
    }
}

/// Open the account database directly. Fails while a server holds the lock.
fn open_auth(data_dir: &Path) -> anyhow::Result<AuthState> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;

    AuthState::initialize(AuthConfig::default(), data_dir).with_context(|| {
        format!(
            "Failed to open account database in {} (is the server running?)",
            data_dir.display()
        )
    })
}
