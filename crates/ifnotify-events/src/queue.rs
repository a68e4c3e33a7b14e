//! Per-connection delivery queues.
//!
//! In queued mode every connection owns an unbounded FIFO and one tokio task
//! that drains it, so emitting never waits on a callback. The queue is not
//! bounded and producers are never slowed down; a warning is logged each
//! time the backlog reaches a multiple of the configured depth.

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{trace, warn};

use crate::connection::{Connection, ConnectionId, ConnectionInner};
use crate::dispatch::Dispatcher;
use crate::error::{EventError, EventResult};
use crate::event::SharedEvent;

/// Where callbacks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// On a per-connection tokio task, in emission order.
    #[default]
    Queued,
    /// Synchronously, on the thread that emits.
    Inline,
}

impl FromStr for DeliveryMode {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "inline" => Ok(Self::Inline),
            other => Err(EventError::InvalidDeliveryMode(other.to_owned())),
        }
    }
}

/// Delivery settings applied to every connection opened with them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Queued or inline delivery.
    pub mode: DeliveryMode,
    /// Backlog size that triggers a warning (and every multiple of it).
    /// `0` disables the warning.
    pub queue_warn_depth: usize,
}

impl DeliveryConfig {
    /// Default backlog warning threshold.
    pub const DEFAULT_QUEUE_WARN_DEPTH: usize = 1024;

    /// Synchronous delivery.
    #[must_use]
    pub fn inline() -> Self {
        Self {
            mode: DeliveryMode::Inline,
            ..Self::default()
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            mode: DeliveryMode::Queued,
            queue_warn_depth: Self::DEFAULT_QUEUE_WARN_DEPTH,
        }
    }
}

#[cfg(feature = "config")]
impl TryFrom<&ifnotify_config::DeliverySection> for DeliveryConfig {
    type Error = EventError;

    fn try_from(section: &ifnotify_config::DeliverySection) -> Result<Self, Self::Error> {
        Ok(Self {
            mode: section.mode.parse()?,
            queue_warn_depth: section.queue_warn_depth,
        })
    }
}

pub(crate) enum Delivery {
    Event(SharedEvent),
    Flush(oneshot::Sender<()>),
}

/// Producer side of a connection's queue.
pub(crate) struct DeliveryQueue {
    sender: Mutex<Option<mpsc::UnboundedSender<Delivery>>>,
    pending: AtomicUsize,
    warn_depth: usize,
}

impl DeliveryQueue {
    pub(crate) fn new(sender: mpsc::UnboundedSender<Delivery>, warn_depth: usize) -> Self {
        Self {
            sender: Mutex::new(Some(sender)),
            pending: AtomicUsize::new(0),
            warn_depth,
        }
    }

    pub(crate) fn push_event(
        &self,
        connection: ConnectionId,
        event: SharedEvent,
    ) -> EventResult<()> {
        // Counted before sending so the worker never decrements below zero.
        let depth = self.pending.fetch_add(1, Ordering::AcqRel).saturating_add(1);
        if let Err(e) = self.send(Delivery::Event(event)) {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(e);
        }
        if self.warn_depth > 0 && depth.is_multiple_of(self.warn_depth) {
            warn!(connection = %connection, depth, "Event delivery queue is backing up");
        }
        Ok(())
    }

    pub(crate) fn push_flush(&self) -> EventResult<oneshot::Receiver<()>> {
        let (tx, rx) = oneshot::channel();
        self.send(Delivery::Flush(tx))?;
        Ok(rx)
    }

    fn send(&self, delivery: Delivery) -> EventResult<()> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        sender
            .as_ref()
            .ok_or(EventError::Closed)?
            .send(delivery)
            .map_err(|_| EventError::Closed)
    }

    /// Events queued and not yet picked up by the worker.
    pub(crate) fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    fn dequeued(&self) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }

    /// Stop accepting deliveries. The worker drains what is already queued
    /// and exits.
    pub(crate) fn close(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// Drains one connection's queue. Holds only a weak reference so an
/// otherwise unused connection can be dropped while its worker is idle.
pub(crate) async fn run_worker(
    connection: Weak<ConnectionInner>,
    mut rx: mpsc::UnboundedReceiver<Delivery>,
) {
    while let Some(delivery) = rx.recv().await {
        match delivery {
            Delivery::Event(event) => {
                // Strong only for the length of one delivery.
                let Some(inner) = connection.upgrade() else {
                    break;
                };
                let connection = Connection::from_inner(inner);
                if let Some(queue) = connection.queue() {
                    queue.dequeued();
                }
                Dispatcher::deliver(&connection, &event);
            },
            Delivery::Flush(done) => {
                let _ = done.send(());
            },
        }
    }
    trace!("Event delivery worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_str() {
        assert_eq!("queued".parse::<DeliveryMode>().unwrap(), DeliveryMode::Queued);
        assert_eq!("inline".parse::<DeliveryMode>().unwrap(), DeliveryMode::Inline);
        assert_eq!(
            "batched".parse::<DeliveryMode>(),
            Err(EventError::InvalidDeliveryMode("batched".into()))
        );
    }

    #[test]
    fn test_defaults() {
        let config = DeliveryConfig::default();
        assert_eq!(config.mode, DeliveryMode::Queued);
        assert_eq!(config.queue_warn_depth, 1024);
        assert_eq!(DeliveryConfig::inline().mode, DeliveryMode::Inline);
    }

    #[test]
    fn test_closed_queue_rejects() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let queue = DeliveryQueue::new(tx, 0);
        queue.close();
        assert_eq!(queue.push_flush().unwrap_err(), EventError::Closed);
        assert_eq!(queue.pending(), 0);
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_from_config_section() {
        let section = ifnotify_config::DeliverySection {
            mode: "inline".into(),
            queue_warn_depth: 8,
        };
        let config = DeliveryConfig::try_from(&section).unwrap();
        assert_eq!(config.mode, DeliveryMode::Inline);
        assert_eq!(config.queue_warn_depth, 8);
    }
}
