//! Configuration loading and validation.
//!
//! Config is JSON5 with camelCase keys.
//! Config location: `~/.canvass/canvass.json` (or `$CANVASS_STATE_DIR/canvass.json`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON5 parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] json5::Error),

    /// Config validation error.
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Longest accepted session lifetime.
pub const MAX_SESSION_TTL_DAYS: u64 = 365;
/// Longest accepted CSRF cookie lifetime.
pub const MAX_CSRF_TTL_MINUTES: u64 = 1440;
/// Longest accepted bound on a single auth operation.
pub const MAX_AUTH_TIMEOUT_SECS: u64 = 300;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Session and CSRF configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Global settings.
    #[serde(default)]
    pub settings: GlobalSettings,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// # Errors
    ///
    /// Returns error if config cannot be loaded or parsed.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration text.
    ///
    /// # Errors
    ///
    /// Returns error if parsing or validation fails.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a path.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        Self::state_dir().join("canvass.json")
    }

    /// Get the state directory.
    ///
    /// Uses `CANVASS_STATE_DIR` env var if set, otherwise `~/.canvass`.
    #[must_use]
    pub fn state_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("CANVASS_STATE_DIR") {
            PathBuf::from(dir)
        } else if let Some(home) = dirs::home_dir() {
            home.join(".canvass")
        } else {
            PathBuf::from(".canvass")
        }
    }

    /// Resolve the data directory: explicit `storage.dataDir`, else `<state_dir>/data`.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(|| Self::state_dir().join("data"))
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns error describing the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "Server port cannot be 0".to_string(),
            ));
        }
        if self.server.login_attempts_per_minute == 0 {
            return Err(ConfigError::Validation(
                "loginAttemptsPerMinute must be positive".to_string(),
            ));
        }
        if !(1..=MAX_SESSION_TTL_DAYS).contains(&self.session.ttl_days) {
            return Err(ConfigError::Validation(format!(
                "Session ttlDays must be between 1 and {MAX_SESSION_TTL_DAYS}"
            )));
        }
        if !(1..=MAX_CSRF_TTL_MINUTES).contains(&self.session.csrf_ttl_minutes) {
            return Err(ConfigError::Validation(format!(
                "csrfTtlMinutes must be between 1 and {MAX_CSRF_TTL_MINUTES}"
            )));
        }
        if !(1..=MAX_AUTH_TIMEOUT_SECS).contains(&self.session.auth_timeout_secs) {
            return Err(ConfigError::Validation(format!(
                "authTimeoutSecs must be between 1 and {MAX_AUTH_TIMEOUT_SECS}"
            )));
        }
        if let Some(secret) = &self.session.secret {
            if secret.len() < 64 || hex::decode(secret).is_err() {
                return Err(ConfigError::Validation(
                    "Session secret must be at least 32 hex-encoded bytes".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address mode.
    #[serde(default)]
    pub mode: BindMode,

    /// Login attempts allowed per email per minute.
    #[serde(default = "default_login_attempts")]
    pub login_attempts_per_minute: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            mode: BindMode::default(),
            login_attempts_per_minute: default_login_attempts(),
        }
    }
}

impl ServerConfig {
    /// The concrete address to bind for the configured mode.
    #[must_use]
    pub fn bind_address(&self) -> String {
        match &self.mode {
            BindMode::Local => "127.0.0.1".to_string(),
            BindMode::Public => "0.0.0.0".to_string(),
            BindMode::Custom(addr) => addr.clone(),
        }
    }
}

const fn default_port() -> u16 {
    8080
}

const fn default_login_attempts() -> u32 {
    10
}

/// Server bind mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    /// Bind to localhost only.
    #[default]
    Local,
    /// Bind to all interfaces.
    Public,
    /// Custom bind address.
    Custom(String),
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Directory holding the embedded database.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Session cookie and CSRF configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Hex-encoded signing secret. Generated per process when absent.
    #[serde(default)]
    pub secret: Option<String>,

    /// Session lifetime in days.
    #[serde(default = "default_session_ttl_days")]
    pub ttl_days: u64,

    /// CSRF cookie lifetime in minutes.
    #[serde(default = "default_csrf_ttl_minutes")]
    pub csrf_ttl_minutes: u64,

    /// Upper bound on credential checks and identity lookups, in seconds.
    #[serde(default = "default_auth_timeout_secs")]
    pub auth_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: None,
            ttl_days: default_session_ttl_days(),
            csrf_ttl_minutes: default_csrf_ttl_minutes(),
            auth_timeout_secs: default_auth_timeout_secs(),
        }
    }
}

const fn default_session_ttl_days() -> u64 {
    7
}

const fn default_csrf_ttl_minutes() -> u64 {
    60
}

const fn default_auth_timeout_secs() -> u64 {
    10
}

/// Global settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    /// Enable debug logging.
    #[serde(default)]
    pub debug: bool,

    /// Log format.
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format.
    #[default]
    Pretty,
    /// JSON format.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.session.ttl_days, 7);
        assert_eq!(config.session.csrf_ttl_minutes, 60);
        assert_eq!(config.server.bind_address(), "127.0.0.1");
    }

    #[test]
    fn test_config_roundtrip() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("canvass.json");

        let mut config = Config::default();
        config.server.port = 9090;
        config.settings.log_format = LogFormat::Json;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.server.port, 9090);
        assert_eq!(loaded.settings.log_format, LogFormat::Json);
    }

    #[test]
    fn test_json5_parsing() {
        let content = r#"{
            // comments and trailing commas are fine
            server: {
                port: 3000,
                mode: "public",
            },
            session: { ttlDays: 3 },
        }"#;

        let config = Config::parse(content).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.mode, BindMode::Public);
        assert_eq!(config.session.ttl_days, 3);
        assert_eq!(config.session.csrf_ttl_minutes, 60);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.session.ttl_days = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.session.ttl_days = MAX_SESSION_TTL_DAYS;
        assert!(config.validate().is_ok());
        config.session.ttl_days = MAX_SESSION_TTL_DAYS + 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.session.csrf_ttl_minutes = MAX_CSRF_TTL_MINUTES + 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.session.secret = Some("abc".to_string());
        assert!(config.validate().is_err());

        config.session.secret = Some("ab".repeat(32));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_huge_ttl_rejected_on_parse() {
        let result = Config::parse("{ session: { ttlDays: 300000000000000 } }");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_data_dir_override() {
        let mut config = Config::default();
        config.storage.data_dir = Some(PathBuf::from("/var/lib/canvass"));
        assert_eq!(config.data_dir(), PathBuf::from("/var/lib/canvass"));
    }
}
