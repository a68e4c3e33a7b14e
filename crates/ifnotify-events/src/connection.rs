//! Client connections: the unit that owns subscriptions and a delivery queue.

use std::fmt;
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::class::ensure_initialized;
use crate::dispatch::Dispatcher;
use crate::error::{EventError, EventResult};
use crate::event::SharedEvent;
use crate::queue::{DeliveryConfig, DeliveryMode, DeliveryQueue, run_worker};
use crate::resolver::ObjectResolver;
use crate::state::{ConnectionEventState, Registered};
use crate::subscription::{CallbackId, SubscriptionRequest};

/// Unique identifier of an open connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) struct ConnectionInner {
    id: ConnectionId,
    uri: String,
    events: ConnectionEventState,
    resolver: Arc<dyn ObjectResolver>,
    queue: Option<DeliveryQueue>,
}

/// A client connection.
///
/// Cheap to clone; clones share the same subscriptions and queue. Callbacks
/// receive the connection they were registered on and may register or
/// deregister through it.
///
/// A callback that captures a clone of its own connection keeps that
/// connection alive until the subscription is deregistered or the connection
/// is [closed](Self::close).
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    /// Open a connection.
    ///
    /// In [`DeliveryMode::Queued`] this spawns the connection's delivery task
    /// on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// [`EventError::Initialization`] if the class registry is unavailable,
    /// [`EventError::Runtime`] for queued delivery outside a tokio runtime.
    pub fn open(
        uri: impl Into<String>,
        resolver: Arc<dyn ObjectResolver>,
        config: &DeliveryConfig,
    ) -> EventResult<Self> {
        ensure_initialized()?;
        let runtime = match config.mode {
            DeliveryMode::Queued => {
                Some(Handle::try_current().map_err(|e| EventError::Runtime(e.to_string()))?)
            },
            DeliveryMode::Inline => None,
        };
        let warn_depth = config.queue_warn_depth;

        let inner = Arc::new_cyclic(|weak: &Weak<ConnectionInner>| {
            let queue = runtime.map(|handle| {
                let (tx, rx) = mpsc::unbounded_channel();
                handle.spawn(run_worker(Weak::clone(weak), rx));
                DeliveryQueue::new(tx, warn_depth)
            });
            ConnectionInner {
                id: ConnectionId::new(),
                uri: uri.into(),
                events: ConnectionEventState::new(),
                resolver,
                queue,
            }
        });

        debug!(connection = %inner.id, uri = %inner.uri, mode = ?config.mode, "Connection opened");
        Ok(Self { inner })
    }

    /// Open a connection that delivers on the emitting thread.
    ///
    /// # Errors
    ///
    /// [`EventError::Initialization`] if the class registry is unavailable.
    pub fn inline(uri: impl Into<String>, resolver: Arc<dyn ObjectResolver>) -> EventResult<Self> {
        Self::open(uri, resolver, &DeliveryConfig::inline())
    }

    pub(crate) fn from_inner(inner: Arc<ConnectionInner>) -> Self {
        Self { inner }
    }

    /// Connection id.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// URI the connection was opened with.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.inner.uri
    }

    /// The connection's subscriptions.
    #[must_use]
    pub fn events(&self) -> &ConnectionEventState {
        &self.inner.events
    }

    /// Resolver used for handles passed to callbacks.
    #[must_use]
    pub fn resolver(&self) -> &dyn ObjectResolver {
        self.inner.resolver.as_ref()
    }

    pub(crate) fn queue(&self) -> Option<&DeliveryQueue> {
        self.inner.queue.as_ref()
    }

    /// Delivery mode chosen when the connection was opened.
    #[must_use]
    pub fn mode(&self) -> DeliveryMode {
        if self.inner.queue.is_some() {
            DeliveryMode::Queued
        } else {
            DeliveryMode::Inline
        }
    }

    /// Register an event callback on this connection.
    ///
    /// # Errors
    ///
    /// See [`ConnectionEventState::register`].
    pub fn register_event_callback(&self, request: SubscriptionRequest) -> EventResult<Registered> {
        self.inner.events.register(request)
    }

    /// Deregister a callback, returning how many remain. Safe to call from
    /// inside any callback, including the one being removed.
    ///
    /// # Errors
    ///
    /// See [`ConnectionEventState::deregister`].
    pub fn deregister_event_callback(&self, callback_id: CallbackId) -> EventResult<usize> {
        self.inner.events.deregister(callback_id)
    }

    /// Queue `event` for delivery (or deliver it now, in inline mode).
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Closed`] once the connection is closed.
    pub fn enqueue(&self, event: SharedEvent) -> EventResult<()> {
        if self.inner.events.is_closed() {
            return Err(EventError::Closed);
        }
        match &self.inner.queue {
            Some(queue) => queue.push_event(self.inner.id, event),
            None => {
                Dispatcher::deliver(self, &event);
                Ok(())
            },
        }
    }

    /// Events waiting in the queue. Always 0 in inline mode.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue().map_or(0, DeliveryQueue::pending)
    }

    /// Wait until every event queued before this call has been delivered.
    ///
    /// Returns immediately in inline mode. Must not be awaited from inside a
    /// callback of the same connection.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Closed`] if the connection is closed.
    pub async fn flush(&self) -> EventResult<()> {
        let Some(queue) = self.queue() else {
            return Ok(());
        };
        let done = queue.push_flush()?;
        done.await.map_err(|_| EventError::Closed)
    }

    /// Deregister everything and stop the delivery task. Events already
    /// queued are dropped without delivery. Returns how many subscriptions
    /// were removed.
    pub fn close(&self) -> usize {
        let removed = self.inner.events.teardown();
        if let Some(queue) = self.queue() {
            queue.close();
        }
        debug!(connection = %self.inner.id, removed, "Connection closed");
        removed
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.events.is_closed()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("uri", &self.inner.uri)
            .field("mode", &self.mode())
            .field("subscriptions", &self.inner.events.len())
            .field("pending", &self.pending())
            .finish()
    }
}
