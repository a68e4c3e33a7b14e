//! ifnotify Events - object event notification for virtual network interfaces.
//!
//! This crate provides:
//! - A process-wide event class hierarchy, built once on first use
//! - Emission factories drivers call when an interface changes state
//! - Per-connection subscription registries with object filters
//! - A dispatcher that delivers over a snapshot of the subscriptions, so
//!   callbacks may deregister themselves
//! - Per-connection FIFO delivery queues drained by tokio tasks
//!
//! # Architecture
//!
//! A driver builds an [`EventObject`] with an emission factory such as
//! [`InterfaceEvent::lifecycle`] and hands it to an [`EventBroker`] (every
//! open connection) or to [`dispatch()`] (explicit targets). Each
//! [`Connection`] queues a shared reference to the event; its delivery task
//! matches the event against a snapshot of the connection's subscriptions,
//! resolves the object through the connection's [`ObjectResolver`] and
//! invokes each matching callback through the adapter of the event's class.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicI32, Ordering};
//! use ifnotify_events::prelude::*;
//!
//! # fn main() -> EventResult<()> {
//! let conn = Connection::inline("test:///default", Arc::new(NameResolver))?;
//! let last = Arc::new(AtomicI32::new(-1));
//! let seen = Arc::clone(&last);
//!
//! conn.register_event_callback(
//!     SubscriptionRequest::new(
//!         InterfaceEventId::Lifecycle,
//!         EventCallback::lifecycle(move |_, _, event, _, _| {
//!             seen.store(event.code(), Ordering::SeqCst);
//!         }),
//!     )
//!     .with_filter("eth0"),
//! )?;
//!
//! dispatch(InterfaceEvent::lifecycle("eth0", LifecycleType::Started, 0)?, [&conn]);
//! assert_eq!(last.load(Ordering::SeqCst), 2);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod broker;
mod class;
mod connection;
mod dispatch;
mod error;
mod event;
mod interface;
mod queue;
mod resolver;
mod state;
mod subscription;

pub use broker::EventBroker;
pub use class::{EventClass, EventClassId, EventClassRegistry, ensure_initialized};
pub use connection::{Connection, ConnectionId};
pub use dispatch::{DeliveryContext, DeliveryReport, DispatchAdapter, Dispatcher, dispatch};
pub use error::{DeliveryError, EventError, EventResult};
pub use event::{EventMetadata, EventObject, EventPayload, SharedEvent};
pub use interface::{InterfaceEvent, InterfaceEventId, LifecycleType};
pub use queue::{DeliveryConfig, DeliveryMode};
pub use resolver::{NameResolver, ObjectHandle, ObjectResolver, ResolveError};
pub use state::{ConnectionEventState, Registered};
pub use subscription::{
    CallbackId, EventCallback, FreeOpaque, LifecycleCallback, Opaque, Subscription,
    SubscriptionRequest, SubscriptionState,
};
