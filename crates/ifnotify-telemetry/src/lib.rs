//! ifnotify Telemetry - logging setup for the ifnotify event engine.
//!
//! The engine only emits `tracing` events; this crate decides where they go.
//!
//! # Example
//!
//! ```rust,no_run
//! use ifnotify_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), ifnotify_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Json)
//!     .with_directive("ifnotify_events=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!("logging ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
