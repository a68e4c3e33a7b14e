#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Configuration for the ifnotify event engine.
//!
//! A single [`Config`] type covers delivery behaviour and logging.
//!
//! # Usage
//!
//! ```rust,no_run
//! use ifnotify_config::Config;
//!
//! // Embedded defaults, then the file, then IFNOTIFY_* env fallbacks.
//! let config = Config::load(Some(std::path::Path::new("/etc/ifnotify/config.toml"))).unwrap();
//! println!("delivery mode: {}", config.delivery.mode);
//! ```
//!
//! # Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Config file** passed to [`Config::load`]
//! 2. **Environment variables** (`IFNOTIFY_*`), applied only to fields the
//!    file did not set
//! 3. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! This crate has no dependencies on other internal ifnotify crates.
//! Conversion into domain types happens in the consuming crates behind their
//! `config` feature.

/// Environment variable fallback resolution.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file loading and layering.
pub mod loader;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use types::*;

impl Config {
    /// Load configuration with the full precedence chain.
    ///
    /// See [`loader::load`] for the algorithm.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file is malformed or the merged
    /// configuration fails validation.
    pub fn load(path: Option<&std::path::Path>) -> ConfigResult<Self> {
        loader::load(path, &env::collect_env_vars())
    }

    /// Parse and validate configuration from a TOML string (no layering).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the string is not valid TOML or fails
    /// validation.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        loader::from_toml_str(content)
    }
}
