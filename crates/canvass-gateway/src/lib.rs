//! # Canvass Gateway
//!
//! HTTP server for the campaign workspace: session cookies, CSRF protection,
//! the edge gate, and the guarded JSON API for users, roles, and activity.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// JSON API handlers.
pub mod api;
/// Authentication and authorization.
pub mod auth;
mod middleware;
/// Server-rendered pages.
pub mod pages;
mod server;

pub use auth::{AuthConfig, AuthError, AuthState, Authenticated, Identity, User, UserStore};
pub use middleware::LoginRateLimiter;
pub use server::{Gateway, GatewayBuilder, GatewayConfig, GatewayState, router};

/// Start the gateway server.
///
/// # Errors
///
/// Returns error if server fails to start.
pub async fn start(config: GatewayConfig) -> Result<(), GatewayError> {
    let gateway = Gateway::new(config)?;
    gateway.run().await
}

/// Gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Server error.
    #[error("Server error: {0}")]
    Server(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
