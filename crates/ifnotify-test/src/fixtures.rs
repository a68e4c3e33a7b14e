//! Test fixtures for connections and events.
//!
//! Fixtures panic on failure; they are only meant for tests.

#![allow(clippy::missing_panics_doc)]

use std::sync::Arc;

use ifnotify_events::{
    Connection, DeliveryConfig, EventObject, InterfaceEvent, LifecycleType, NameResolver,
    ObjectResolver,
};

/// URI used by fixture connections.
pub const TEST_URI: &str = "test:///default";

/// Inline connection resolving every name.
#[must_use]
pub fn inline_connection() -> Connection {
    inline_connection_with(Arc::new(NameResolver))
}

/// Inline connection with a custom resolver.
#[must_use]
pub fn inline_connection_with(resolver: Arc<dyn ObjectResolver>) -> Connection {
    Connection::inline(TEST_URI, resolver).expect("event class registry should initialize")
}

/// Queued connection resolving every name. Must be called inside a tokio
/// runtime.
#[must_use]
pub fn queued_connection() -> Connection {
    queued_connection_with(Arc::new(NameResolver))
}

/// Queued connection with a custom resolver. Must be called inside a tokio
/// runtime.
#[must_use]
pub fn queued_connection_with(resolver: Arc<dyn ObjectResolver>) -> Connection {
    Connection::open(TEST_URI, resolver, &DeliveryConfig::default())
        .expect("queued connection should open inside a tokio runtime")
}

/// Lifecycle event with detail 0.
#[must_use]
pub fn lifecycle_event(name: &str, event: LifecycleType) -> EventObject {
    InterfaceEvent::lifecycle(name, event, 0).expect("event class registry should initialize")
}
