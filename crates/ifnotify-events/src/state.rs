//! Per-connection subscription registry.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::debug;

use crate::class::ensure_initialized;
use crate::error::{EventError, EventResult};
use crate::subscription::{CallbackId, Subscription, SubscriptionRequest};

/// Outcome of a successful registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Registered {
    /// Handle to pass to deregistration.
    pub callback_id: CallbackId,
    /// Active subscriptions on the connection, including this one.
    pub active: usize,
    /// Remote-client subscriptions sharing this one's event id and filter,
    /// including this one. Zero for local subscriptions. A remote client
    /// only needs to register upstream when this is 1.
    pub remote_peers: usize,
}

/// The subscriptions of one connection.
///
/// The lock guards the list only. Callbacks never run under it, so a callback
/// may register or deregister on its own connection (itself included).
#[derive(Debug)]
pub struct ConnectionEventState {
    next_id: AtomicU64,
    subscriptions: RwLock<Vec<Arc<Subscription>>>,
    closed: AtomicBool,
}

impl ConnectionEventState {
    /// Create an empty registry. Callback ids start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            subscriptions: RwLock::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<Subscription>>> {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<Subscription>>> {
        self.subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a subscription.
    ///
    /// Identical requests are not merged; each gets its own id. When
    /// registration fails the request is dropped without calling its free
    /// function, so the caller still owns whatever the opaque data points to.
    ///
    /// # Errors
    ///
    /// - [`EventError::Initialization`] if the class registry is unavailable.
    /// - [`EventError::UnsupportedEventId`] / [`EventError::CallbackMismatch`]
    ///   for an invalid request.
    /// - [`EventError::Closed`] after [`teardown`](Self::teardown).
    pub fn register(&self, request: SubscriptionRequest) -> EventResult<Registered> {
        ensure_initialized()?;
        let event_id = request.validate()?;

        let mut subscriptions = self.write();
        if self.closed.load(Ordering::Acquire) {
            return Err(EventError::Closed);
        }

        let callback_id = CallbackId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscription = Subscription::new(callback_id, event_id, request);
        let remote_peers = if subscription.is_remote_client() {
            subscriptions
                .iter()
                .filter(|s| s.is_remote_client())
                .filter(|s| s.same_interest(event_id, subscription.filter()))
                .count()
                .saturating_add(1)
        } else {
            0
        };
        debug!(
            callback_id = %callback_id,
            event_id = i32::from(event_id),
            object = subscription.filter().unwrap_or("*"),
            remote_client = subscription.is_remote_client(),
            "Event callback registered"
        );
        subscriptions.push(Arc::new(subscription));

        Ok(Registered {
            callback_id,
            active: subscriptions.len(),
            remote_peers,
        })
    }

    /// Remove a subscription and return how many remain.
    ///
    /// Deliveries already handed to the subscription finish; it is skipped by
    /// every match performed after this returns.
    ///
    /// # Errors
    ///
    /// - [`EventError::Initialization`] if the class registry is unavailable.
    /// - [`EventError::NotFound`] if the id is unknown or already removed.
    pub fn deregister(&self, callback_id: CallbackId) -> EventResult<usize> {
        ensure_initialized()?;
        let (removed, remaining) = {
            let mut subscriptions = self.write();
            let index = subscriptions
                .iter()
                .position(|s| s.id() == callback_id)
                .ok_or(EventError::NotFound(callback_id))?;
            let removed = subscriptions.remove(index);
            removed.mark_deregistered();
            (removed, subscriptions.len())
        };

        debug!(callback_id = %callback_id, remaining, "Event callback deregistered");
        // Last reference (if no delivery holds one) runs the free function
        // here, outside the lock.
        drop(removed);
        Ok(remaining)
    }

    /// Copy of the current subscriptions, in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<Subscription>> {
        self.read().clone()
    }

    /// Look up a live subscription.
    #[must_use]
    pub fn get(&self, callback_id: CallbackId) -> Option<Arc<Subscription>> {
        self.read().iter().find(|s| s.id() == callback_id).cloned()
    }

    /// Record the id a server issued for a remote-client subscription.
    ///
    /// # Errors
    ///
    /// [`EventError::NotFound`] for an unknown id,
    /// [`EventError::RemoteIdAlreadySet`] if one was already recorded.
    pub fn set_remote_id(&self, callback_id: CallbackId, remote_id: i32) -> EventResult<()> {
        let subscription = self
            .get(callback_id)
            .ok_or(EventError::NotFound(callback_id))?;
        subscription.assign_remote_id(remote_id)?;
        debug!(callback_id = %callback_id, remote_id, "Remote id assigned");
        Ok(())
    }

    /// Local callback id carrying `remote_id`.
    #[must_use]
    pub fn callback_id_for_remote(&self, remote_id: i32) -> Option<CallbackId> {
        self.read()
            .iter()
            .find(|s| s.remote_id() == Some(remote_id))
            .map(|s| s.id())
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether there are no active subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Remove every subscription and refuse further registrations.
    ///
    /// Returns how many subscriptions were removed; a second call returns 0.
    pub fn teardown(&self) -> usize {
        let drained = {
            let mut subscriptions = self.write();
            self.closed.store(true, Ordering::Release);
            std::mem::take(&mut *subscriptions)
        };
        for subscription in &drained {
            subscription.mark_deregistered();
        }

        let count = drained.len();
        if count > 0 {
            debug!(removed = count, "Connection event state torn down");
        }
        drop(drained);
        count
    }

    /// Whether [`teardown`](Self::teardown) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Default for ConnectionEventState {
    fn default() -> Self {
        Self::new()
    }
}
