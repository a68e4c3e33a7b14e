//! Fan-out of events to every open connection.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::connection::{Connection, ConnectionId};
use crate::dispatch::dispatch;
use crate::error::EventResult;
use crate::event::EventObject;
use crate::queue::DeliveryConfig;
use crate::resolver::ObjectResolver;

/// Table of open connections that drivers emit into.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use ifnotify_events::prelude::*;
///
/// # async fn run() -> EventResult<()> {
/// let broker = EventBroker::new(DeliveryConfig::default());
/// let conn = broker.open_connection("qemu:///system", Arc::new(NameResolver))?;
/// conn.register_event_callback(SubscriptionRequest::new(
///     InterfaceEventId::Lifecycle,
///     EventCallback::lifecycle(|_, iface, event, _, _| println!("{iface}: {event}")),
/// ))?;
///
/// broker.dispatch(InterfaceEvent::lifecycle("eth0", LifecycleType::Started, 0)?);
/// conn.flush().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct EventBroker {
    connections: DashMap<ConnectionId, Connection>,
    config: DeliveryConfig,
}

impl EventBroker {
    /// Create an empty broker; connections it opens use `config`.
    #[must_use]
    pub fn new(config: DeliveryConfig) -> Self {
        Self {
            connections: DashMap::new(),
            config,
        }
    }

    /// Delivery settings for new connections.
    #[must_use]
    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Open a connection and start routing events to it.
    ///
    /// # Errors
    ///
    /// See [`Connection::open`].
    pub fn open_connection(
        &self,
        uri: impl Into<String>,
        resolver: Arc<dyn ObjectResolver>,
    ) -> EventResult<Connection> {
        let connection = Connection::open(uri, resolver, &self.config)?;
        self.attach(connection.clone());
        Ok(connection)
    }

    /// Route events to a connection opened elsewhere.
    pub fn attach(&self, connection: Connection) {
        self.connections.insert(connection.id(), connection);
    }

    /// Stop routing events to a connection without closing it.
    pub fn detach(&self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id).map(|(_, connection)| connection)
    }

    /// Detach and close a connection. Returns how many subscriptions it had,
    /// or `None` if the broker did not know it.
    pub fn close_connection(&self, id: ConnectionId) -> Option<usize> {
        let connection = self.detach(id)?;
        Some(connection.close())
    }

    /// Look up an attached connection.
    #[must_use]
    pub fn get(&self, id: ConnectionId) -> Option<Connection> {
        self.connections.get(&id).map(|entry| entry.value().clone())
    }

    /// Number of attached connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Send `event` to every attached connection. Returns how many accepted
    /// it.
    ///
    /// The connection list is copied first, so connections opened or closed
    /// concurrently either see the event or not, and no shard lock is held
    /// while inline callbacks run.
    pub fn dispatch(&self, event: EventObject) -> usize {
        let targets: Vec<Connection> = self
            .connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        trace!(
            object = event.name(),
            event_id = event.event_id(),
            connections = targets.len(),
            "Dispatching event"
        );
        dispatch(event, &targets)
    }

    /// Close every connection.
    pub fn shutdown(&self) {
        let ids: Vec<ConnectionId> = self.connections.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            self.close_connection(id);
        }
        debug!("Event broker shut down");
    }
}

impl Default for EventBroker {
    fn default() -> Self {
        Self::new(DeliveryConfig::default())
    }
}
