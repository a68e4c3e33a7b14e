//! ifnotify Test - Shared test utilities for the ifnotify event engine.
//!
//! This crate provides a mock object resolver, a recording lifecycle
//! callback and fixtures for connections and events. It is meant to be used
//! as a dev-dependency.
//!
//! # Usage
//!
//! ```rust
//! use ifnotify_test::{LifecycleRecorder, inline_connection, lifecycle_event};
//! use ifnotify_events::{LifecycleType, dispatch};
//!
//! let conn = inline_connection();
//! let recorder = LifecycleRecorder::new();
//! conn.register_event_callback(recorder.request()).unwrap();
//!
//! dispatch(lifecycle_event("eth0", LifecycleType::Started), [&conn]);
//! assert_eq!(recorder.count(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod mocks;
pub mod logging;

pub use fixtures::*;
pub use mocks::*;
pub use logging::init_test_tracing;
