//! # Canvass Core
//!
//! Core types, configuration, and input validation for Canvass.
//!
//! This crate provides:
//! - Configuration loading and validation (JSON5 format)
//! - Identifier types for users and roles
//! - Input validation and normalization for account data

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod types;
pub mod validation;

pub use config::{Config, ConfigError, LogFormat};
pub use types::{RoleId, UserId};
pub use validation::ValidationError;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::types::*;
    pub use crate::validation::{normalize_email, validate_email, validate_password};
}
