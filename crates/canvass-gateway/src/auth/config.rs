//! Authentication configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default session lifetime in days.
const DEFAULT_SESSION_TTL_DAYS: u64 = 7;
/// Default CSRF cookie lifetime in minutes.
const DEFAULT_CSRF_TTL_MINUTES: u64 = 60;
/// Default bound on credential checks and identity lookups.
const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 10;

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Session signing secret (hex-encoded). Auto-generated if not set.
    #[serde(default)]
    pub session_secret: Option<String>,

    /// Session cookie lifetime in days.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_days: u64,

    /// CSRF cookie lifetime in minutes.
    #[serde(default = "default_csrf_ttl")]
    pub csrf_ttl_minutes: u64,

    /// Upper bound for password checks and identity hydration, in seconds.
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_secs: u64,

    /// Path of the login page.
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Namespace of JSON endpoints; the edge gate never redirects these.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Paths reachable without a session (exact match).
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,

    /// Path prefixes reachable without a session (static asset directories).
    #[serde(default = "default_public_prefixes")]
    pub public_prefixes: Vec<String>,

    /// Unsafe-method paths that skip the CSRF check.
    #[serde(default = "default_csrf_exempt_paths")]
    pub csrf_exempt_paths: Vec<String>,
}

fn default_session_ttl() -> u64 {
    DEFAULT_SESSION_TTL_DAYS
}

fn default_csrf_ttl() -> u64 {
    DEFAULT_CSRF_TTL_MINUTES
}

fn default_auth_timeout() -> u64 {
    DEFAULT_AUTH_TIMEOUT_SECS
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_api_prefix() -> String {
    "/api".to_string()
}

fn default_public_paths() -> Vec<String> {
    vec![
        "/health".to_string(),
        "/favicon.ico".to_string(),
        "/robots.txt".to_string(),
    ]
}

fn default_public_prefixes() -> Vec<String> {
    vec![
        "/static/".to_string(),
        "/assets/".to_string(),
        "/public/".to_string(),
    ]
}

fn default_csrf_exempt_paths() -> Vec<String> {
    vec!["/api/auth/login".to_string()]
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: None,
            session_ttl_days: default_session_ttl(),
            csrf_ttl_minutes: default_csrf_ttl(),
            auth_timeout_secs: default_auth_timeout(),
            login_path: default_login_path(),
            api_prefix: default_api_prefix(),
            public_paths: default_public_paths(),
            public_prefixes: default_public_prefixes(),
            csrf_exempt_paths: default_csrf_exempt_paths(),
        }
    }
}

impl AuthConfig {
    /// Create a new auth config builder.
    #[must_use]
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::default()
    }

    /// Session lifetime as Duration.
    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_days.saturating_mul(24 * 3600))
    }

    /// CSRF cookie lifetime as Duration.
    #[must_use]
    pub fn csrf_ttl(&self) -> Duration {
        Duration::from_secs(self.csrf_ttl_minutes.saturating_mul(60))
    }

    /// Auth operation timeout as Duration.
    #[must_use]
    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    /// Check if a path belongs to the API namespace.
    #[must_use]
    pub fn is_api_path(&self, path: &str) -> bool {
        let prefix = self.api_prefix.trim_end_matches('/');
        path == prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Check if a path is the login page.
    #[must_use]
    pub fn is_login_path(&self, path: &str) -> bool {
        path == self.login_path
    }

    /// Check if a path is public (reachable without a session).
    #[must_use]
    pub fn is_public_path(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| p == path)
            || self.public_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }

    /// Check if a path skips the CSRF check.
    #[must_use]
    pub fn is_csrf_exempt(&self, path: &str) -> bool {
        self.csrf_exempt_paths.iter().any(|p| p == path)
    }

    /// Apply environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(secret) = std::env::var("CANVASS_SESSION_SECRET") {
            if !secret.is_empty() {
                self.session_secret = Some(secret);
            }
        }

        self
    }
}

/// Builder for `AuthConfig`.
#[derive(Debug, Default)]
pub struct AuthConfigBuilder {
    config: AuthConfig,
}

impl AuthConfigBuilder {
    /// Set the session signing secret (hex).
    #[must_use]
    pub fn session_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.session_secret = Some(secret.into());
        self
    }

    /// Set session lifetime in days.
    #[must_use]
    pub fn session_ttl_days(mut self, days: u64) -> Self {
        self.config.session_ttl_days = days;
        self
    }

    /// Set CSRF cookie lifetime in minutes.
    #[must_use]
    pub fn csrf_ttl_minutes(mut self, minutes: u64) -> Self {
        self.config.csrf_ttl_minutes = minutes;
        self
    }

    /// Set the auth operation timeout in seconds.
    #[must_use]
    pub fn auth_timeout_secs(mut self, secs: u64) -> Self {
        self.config.auth_timeout_secs = secs;
        self
    }

    /// Add an exact public path.
    #[must_use]
    pub fn public_path(mut self, path: impl Into<String>) -> Self {
        self.config.public_paths.push(path.into());
        self
    }

    /// Add a public path prefix.
    #[must_use]
    pub fn public_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.public_prefixes.push(prefix.into());
        self
    }

    /// Add a CSRF-exempt path.
    #[must_use]
    pub fn csrf_exempt_path(mut self, path: impl Into<String>) -> Self {
        self.config.csrf_exempt_paths.push(path.into());
        self
    }

    /// Build the config.
    #[must_use]
    pub fn build(self) -> AuthConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AuthConfig::default();
        assert!(config.session_secret.is_none());
        assert_eq!(config.session_ttl_days, 7);
        assert_eq!(config.csrf_ttl_minutes, 60);
        assert_eq!(config.login_path, "/login");
    }

    #[test]
    fn test_api_paths() {
        let config = AuthConfig::default();
        assert!(config.is_api_path("/api"));
        assert!(config.is_api_path("/api/auth/me"));
        assert!(!config.is_api_path("/apikeys"));
        assert!(!config.is_api_path("/reports"));
    }

    #[test]
    fn test_public_paths() {
        let config = AuthConfig::default();
        assert!(config.is_public_path("/health"));
        assert!(config.is_public_path("/static/app.css"));
        assert!(config.is_public_path("/favicon.ico"));
        assert!(!config.is_public_path("/healthz"));
        assert!(!config.is_public_path("/reports"));
        assert!(!config.is_public_path("/static"));
    }

    #[test]
    fn test_builder() {
        let config = AuthConfig::builder()
            .session_ttl_days(1)
            .public_prefix("/img/")
            .csrf_exempt_path("/api/hooks")
            .build();

        assert_eq!(config.session_ttl_days, 1);
        assert!(config.is_public_path("/img/logo.png"));
        assert!(config.is_csrf_exempt("/api/hooks"));
        assert!(config.is_csrf_exempt("/api/auth/login"));
    }

    #[test]
    fn test_oversized_ttls_saturate() {
        let config = AuthConfig::builder()
            .session_ttl_days(u64::MAX / 2)
            .csrf_ttl_minutes(u64::MAX)
            .build();
        assert_eq!(config.session_ttl(), Duration::from_secs(u64::MAX));
        assert_eq!(config.csrf_ttl(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_durations() {
        let config = AuthConfig::default();
        assert_eq!(config.session_ttl(), Duration::from_secs(7 * 24 * 3600));
        assert_eq!(config.csrf_ttl(), Duration::from_secs(3600));
        assert_eq!(config.auth_timeout(), Duration::from_secs(10));
    }
}
