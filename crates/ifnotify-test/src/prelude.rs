//! Prelude module - commonly used test helpers.
//!
//! Use `use ifnotify_test::prelude::*;` in test files.

pub use crate::fixtures::{
    TEST_URI, inline_connection, inline_connection_with, lifecycle_event, queued_connection,
    queued_connection_with,
};
pub use crate::mocks::{CallbackSlot, LifecycleCall, LifecycleRecorder, MockResolver};
pub use crate::logging::init_test_tracing;
