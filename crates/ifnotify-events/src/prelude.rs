//! Prelude module - commonly used types for convenient import.
//!
//! Use `use ifnotify_events::prelude::*;` to import all essential types.

// Connections and fan-out
pub use crate::{Connection, ConnectionId, DeliveryConfig, DeliveryMode, EventBroker, dispatch};

// Subscriptions
pub use crate::{
    CallbackId, EventCallback, Opaque, Registered, SubscriptionRequest, SubscriptionState,
};

// Events
pub use crate::{EventObject, InterfaceEvent, InterfaceEventId, LifecycleType, SharedEvent};

// Object resolution
pub use crate::{NameResolver, ObjectHandle, ObjectResolver, ResolveError};

// Errors
pub use crate::{EventError, EventResult};
