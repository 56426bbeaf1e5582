//! Gateway server.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::FromRef,
    middleware,
    routing::{get, post},
};
use canvass_core::Config;
use tower_http::trace::TraceLayer;

use crate::GatewayError;
use crate::auth::{AuthConfig, AuthState, csrf, gate, setup::auto_setup_from_env};
use crate::middleware::LoginRateLimiter;
use crate::{api, pages};

/// How often idle rate-limiter keys are dropped.
const LIMITER_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Port to listen on.
    pub port: u16,
    /// Bind address.
    pub bind_address: String,
    /// Data directory for persistent storage.
    pub data_dir: PathBuf,
    /// Login attempts allowed per account per minute.
    pub login_attempts_per_minute: u32,
    /// Authentication configuration.
    pub auth: AuthConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "127.0.0.1".to_string(),
            data_dir: Config::state_dir().join("data"),
            login_attempts_per_minute: 10,
            auth: AuthConfig::default(),
        }
    }
}

impl From<&Config> for GatewayConfig {
    fn from(config: &Config) -> Self {
        let auth = AuthConfig {
            session_secret: config.session.secret.clone(),
            session_ttl_days: config.session.ttl_days,
            csrf_ttl_minutes: config.session.csrf_ttl_minutes,
            auth_timeout_secs: config.session.auth_timeout_secs,
            ..AuthConfig::default()
        };

        Self {
            port: config.server.port,
            bind_address: config.server.bind_address(),
            data_dir: config.data_dir(),
            login_attempts_per_minute: config.server.login_attempts_per_minute,
            auth,
        }
    }
}

/// Gateway server state shared across handlers.
#[derive(Clone, FromRef)]
pub struct GatewayState {
    /// Authentication state.
    pub auth: Arc<AuthState>,
    /// Login throttle.
    pub login_limiter: Arc<LoginRateLimiter>,
}

/// Gateway server.
pub struct Gateway {
    config: GatewayConfig,
    state: GatewayState,
}

/// Builder for constructing a Gateway with its dependencies.
pub struct GatewayBuilder {
    config: GatewayConfig,
    auth_state: Option<Arc<AuthState>>,
}

impl GatewayBuilder {
    /// Create a new builder with default config.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: GatewayConfig::default(),
            auth_state: None,
        }
    }

    /// Set gateway configuration.
    #[must_use]
    pub fn with_config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the auth state.
    #[must_use]
    pub fn with_auth_state(mut self, auth: Arc<AuthState>) -> Self {
        self.auth_state = Some(auth);
        self
    }

    /// Build the gateway.
    ///
    /// # Errors
    ///
    /// Returns error if the data directory or auth state cannot be set up.
    pub fn build(self) -> Result<Gateway, GatewayError> {
        // Initialize auth state if not provided
        let auth = match self.auth_state {
            Some(auth) => auth,
            None => {
                std::fs::create_dir_all(&self.config.data_dir).map_err(|e| {
                    GatewayError::Config(format!("Failed to create data dir: {e}"))
                })?;
                let auth_config = self.config.auth.clone().with_env_overrides();
                Arc::new(
                    AuthState::initialize(auth_config, &self.config.data_dir)
                        .map_err(|e| GatewayError::Config(format!("Auth init failed: {e}")))?,
                )
            }
        };

        // Auto-setup from environment if configured
        if let Err(e) = auto_setup_from_env(auth.authenticator.users()) {
            tracing::warn!(error = %e, "Auto-setup from env failed");
        }

        let state = GatewayState {
            auth,
            login_limiter: Arc::new(LoginRateLimiter::new(
                self.config.login_attempts_per_minute,
            )),
        };

        Ok(Gateway {
            config: self.config,
            state,
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Gateway {
    /// Create a gateway, opening its stores under `config.data_dir`.
    ///
    /// # Errors
    ///
    /// Returns error if initialization fails.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        GatewayBuilder::new().with_config(config).build()
    }

    /// Shared handler state.
    #[must_use]
    pub const fn state(&self) -> &GatewayState {
        &self.state
    }

    /// The fully layered router.
    #[must_use]
    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Run until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns error if the server fails to bind or serve.
    pub async fn run(&self) -> Result<(), GatewayError> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `shutdown` resolves, then flush the stores.
    ///
    /// # Errors
    ///
    /// Returns error if the server fails to bind or serve, or the final flush fails.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| GatewayError::Config(format!("Invalid address: {e}")))?;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Gateway listening on http://{}", addr);

        let limiter = self.state.login_limiter.clone();
        let sweeper = tokio::spawn(async move {
            let mut interval = tokio::time::interval(LIMITER_SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                limiter.sweep();
            }
        });

        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await;
        sweeper.abort();

        tracing::info!("Gateway shutting down");
        self.state
            .auth
            .close()
            .map_err(|e| GatewayError::Server(format!("Failed to flush stores: {e}")))?;

        served.map_err(|e| GatewayError::Server(e.to_string()))
    }
}

/// Build the router: pages, JSON API, and the auth layers around them.
///
/// Request order: trace, edge gate, CSRF check, handler.
pub fn router(state: GatewayState) -> Router {
    let api = Router::new()
        .route("/auth/login", post(api::login))
        .route("/auth/logout", post(api::logout))
        .route("/auth/me", get(api::me))
        .route("/auth/csrf", get(api::reissue_csrf))
        .route("/users", get(api::list_users).post(api::create_user))
        .route("/roles", get(api::list_roles).post(api::create_role))
        .route("/activity", get(api::list_activity));

    Router::new()
        .route("/health", get(health_handler))
        .route("/login", get(pages::login))
        .route("/", get(pages::home))
        .nest("/api", api)
        .fallback(pages::not_found)
        .layer(middleware::from_fn_with_state(
            state.auth.clone(),
            csrf::protect,
        ))
        .layer(middleware::from_fn_with_state(
            state.auth.clone(),
            gate::edge_gate,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
