//! Subscriptions: one registered interest in an event id, optionally narrowed
//! to a single object.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::class::{EventClassId, EventClassRegistry};
use crate::connection::Connection;
use crate::error::{EventError, EventResult};
use crate::event::EventObject;
use crate::interface::{InterfaceEvent, InterfaceEventId, LifecycleType};
use crate::resolver::ObjectHandle;

/// Caller data handed back to every invocation of a callback.
pub type Opaque = Arc<dyn Any + Send + Sync>;

/// Releases a subscription's [`Opaque`] data once the subscription is gone.
pub type FreeOpaque = Box<dyn FnOnce(Opaque) + Send>;

/// Signature of interface lifecycle callbacks:
/// `(connection, interface, transition, detail, opaque)`.
pub type LifecycleCallback =
    Arc<dyn Fn(&Connection, &ObjectHandle, LifecycleType, i32, Option<&Opaque>) + Send + Sync>;

/// A callback, tagged with the signature it was written for.
///
/// The tag is checked against the requested event id at registration time,
/// so the dispatch adapter can call it without any cast.
#[derive(Clone)]
pub enum EventCallback {
    /// Receives [`InterfaceEventId::Lifecycle`] events.
    Lifecycle(LifecycleCallback),
}

impl EventCallback {
    /// Wrap a lifecycle callback.
    pub fn lifecycle<F>(f: F) -> Self
    where
        F: Fn(&Connection, &ObjectHandle, LifecycleType, i32, Option<&Opaque>)
            + Send
            + Sync
            + 'static,
    {
        Self::Lifecycle(Arc::new(f))
    }

    /// The event id this callback can receive.
    #[must_use]
    pub fn event_id(&self) -> InterfaceEventId {
        match self {
            Self::Lifecycle(_) => InterfaceEventId::Lifecycle,
        }
    }

    /// Name of the signature, for errors and logs.
    #[must_use]
    pub fn signature(&self) -> &'static str {
        self.event_id().callback_signature()
    }
}

impl fmt::Debug for EventCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventCallback").field(&self.signature()).finish()
    }
}

/// Registration handle, unique for the lifetime of the issuing connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallbackId(u64);

impl CallbackId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Numeric value of the id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Observable state of a subscription.
///
/// A subscription is `Active` as soon as registration returns. Deregistration
/// moves it to `Deregistering`; it is reclaimed (and its opaque data freed)
/// when the last in-flight delivery holding it finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Eligible for matching.
    Active,
    /// Removed from its connection; never matched again.
    Deregistering,
}

/// Everything needed to register a callback.
///
/// ```rust
/// use ifnotify_events::{EventCallback, InterfaceEventId, SubscriptionRequest};
///
/// let request = SubscriptionRequest::new(
///     InterfaceEventId::Lifecycle,
///     EventCallback::lifecycle(|_conn, iface, event, detail, _opaque| {
///         println!("{} {event} ({detail})", iface.name());
///     }),
/// )
/// .with_filter("eth0");
/// # let _ = request;
/// ```
pub struct SubscriptionRequest {
    event_id: i32,
    callback: EventCallback,
    filter: Option<String>,
    opaque: Option<Opaque>,
    free: Option<FreeOpaque>,
    remote_client: bool,
}

impl SubscriptionRequest {
    /// Subscribe `callback` to `event_id` for every object.
    pub fn new(event_id: impl Into<i32>, callback: EventCallback) -> Self {
        Self {
            event_id: event_id.into(),
            callback,
            filter: None,
            opaque: None,
            free: None,
            remote_client: false,
        }
    }

    /// Only deliver events about this object (name or identity key).
    #[must_use]
    pub fn with_filter(mut self, object: impl Into<String>) -> Self {
        self.filter = Some(object.into());
        self
    }

    /// Data passed to every invocation.
    #[must_use]
    pub fn with_opaque(mut self, opaque: Opaque) -> Self {
        self.opaque = Some(opaque);
        self
    }

    /// Called once with the opaque data when the subscription is reclaimed.
    #[must_use]
    pub fn with_free<F>(mut self, free: F) -> Self
    where
        F: FnOnce(Opaque) + Send + 'static,
    {
        self.free = Some(Box::new(free));
        self
    }

    /// Mark this registration as made on behalf of a remote client.
    #[must_use]
    pub fn remote_client(mut self) -> Self {
        self.remote_client = true;
        self
    }

    /// Raw event id requested.
    #[must_use]
    pub fn event_id(&self) -> i32 {
        self.event_id
    }

    /// Object filter, if any.
    #[must_use]
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Check the event id and that the callback has its signature.
    pub(crate) fn validate(&self) -> EventResult<InterfaceEventId> {
        let event_id = InterfaceEventId::try_from(self.event_id)?;
        if self.callback.event_id() != event_id {
            return Err(EventError::CallbackMismatch {
                event_id: self.event_id,
                callback: self.callback.signature(),
            });
        }
        Ok(event_id)
    }
}

impl fmt::Debug for SubscriptionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRequest")
            .field("event_id", &self.event_id)
            .field("callback", &self.callback)
            .field("filter", &self.filter)
            .field("has_opaque", &self.opaque.is_some())
            .field("remote_client", &self.remote_client)
            .finish_non_exhaustive()
    }
}

/// An active registration, owned by its connection's event state.
///
/// Dispatch snapshots hold extra `Arc`s to subscriptions, so a subscription
/// outlives its deregistration until those deliveries finish; the opaque
/// free function runs from `Drop` at that point.
pub struct Subscription {
    id: CallbackId,
    class: EventClassId,
    event_id: InterfaceEventId,
    filter: Option<String>,
    callback: EventCallback,
    opaque: Option<Opaque>,
    free: Mutex<Option<FreeOpaque>>,
    remote_client: bool,
    remote_id: OnceLock<i32>,
    deregistered: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(
        id: CallbackId,
        event_id: InterfaceEventId,
        request: SubscriptionRequest,
    ) -> Self {
        Self {
            id,
            class: InterfaceEvent::FAMILY,
            event_id,
            filter: request.filter,
            callback: request.callback,
            opaque: request.opaque,
            free: Mutex::new(request.free),
            remote_client: request.remote_client,
            remote_id: OnceLock::new(),
            deregistered: AtomicBool::new(false),
        }
    }

    /// Registration handle.
    #[must_use]
    pub fn id(&self) -> CallbackId {
        self.id
    }

    /// Class family the subscription listens to.
    #[must_use]
    pub fn class(&self) -> EventClassId {
        self.class
    }

    /// Event id the subscription listens to.
    #[must_use]
    pub fn event_id(&self) -> InterfaceEventId {
        self.event_id
    }

    /// Object filter, `None` for "all objects".
    #[must_use]
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// The stored callback.
    #[must_use]
    pub fn callback(&self) -> &EventCallback {
        &self.callback
    }

    /// Opaque data passed to the callback.
    #[must_use]
    pub fn opaque(&self) -> Option<&Opaque> {
        self.opaque.as_ref()
    }

    /// Whether the registration was made for a remote client.
    #[must_use]
    pub fn is_remote_client(&self) -> bool {
        self.remote_client
    }

    /// Remote id assigned with
    /// [`ConnectionEventState::set_remote_id`](crate::ConnectionEventState::set_remote_id).
    #[must_use]
    pub fn remote_id(&self) -> Option<i32> {
        self.remote_id.get().copied()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        if self.deregistered.load(Ordering::Acquire) {
            SubscriptionState::Deregistering
        } else {
            SubscriptionState::Active
        }
    }

    pub(crate) fn assign_remote_id(&self, remote_id: i32) -> EventResult<()> {
        self.remote_id
            .set(remote_id)
            .map_err(|_| EventError::RemoteIdAlreadySet(self.id))
    }

    pub(crate) fn mark_deregistered(&self) {
        self.deregistered.store(true, Ordering::Release);
    }

    /// Whether this subscription shares event id and filter with another
    /// registration.
    pub(crate) fn same_interest(&self, event_id: InterfaceEventId, filter: Option<&str>) -> bool {
        self.event_id == event_id && self.filter.as_deref() == filter
    }

    /// Whether `event` should be delivered to this subscription.
    pub(crate) fn matches(&self, registry: &EventClassRegistry, event: &EventObject) -> bool {
        if self.state() != SubscriptionState::Active {
            return false;
        }
        if event.event_id() != i32::from(self.event_id)
            || !registry.is_a(event.class(), self.class)
        {
            return false;
        }
        if self.remote_id() != event.remote_id() {
            return false;
        }
        match &self.filter {
            Some(object) => event.concerns(object),
            None => true,
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("class", &self.class)
            .field("event_id", &self.event_id)
            .field("filter", &self.filter)
            .field("remote_client", &self.remote_client)
            .field("remote_id", &self.remote_id())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let free = self
            .free
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let (Some(free), Some(opaque)) = (free, self.opaque.take()) {
            free(opaque);
        }
        trace!(callback_id = %self.id, "Subscription released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ensure_initialized;
    use std::sync::atomic::AtomicUsize;

    fn noop() -> EventCallback {
        EventCallback::lifecycle(|_, _, _, _, _| {})
    }

    fn subscription(request: SubscriptionRequest) -> Subscription {
        let event_id = request.validate().unwrap();
        Subscription::new(CallbackId::new(1), event_id, request)
    }

    fn started(name: &str) -> EventObject {
        InterfaceEvent::lifecycle(name, LifecycleType::Started, 0).unwrap()
    }

    #[test]
    fn test_validate_rejects_unknown_event_id() {
        let request = SubscriptionRequest::new(5, noop());
        assert_eq!(request.validate(), Err(EventError::UnsupportedEventId(5)));
    }

    #[test]
    fn test_unfiltered_matches_any_object() {
        let registry = ensure_initialized().unwrap();
        let sub = subscription(SubscriptionRequest::new(InterfaceEventId::Lifecycle, noop()));
        assert!(sub.matches(registry, &started("eth0")));
        assert!(sub.matches(registry, &started("br0")));
    }

    #[test]
    fn test_filter_matches_name_or_key() {
        let registry = ensure_initialized().unwrap();
        let by_name = subscription(
            SubscriptionRequest::new(InterfaceEventId::Lifecycle, noop()).with_filter("eth0"),
        );
        assert!(by_name.matches(registry, &started("eth0")));
        assert!(!by_name.matches(registry, &started("eth1")));

        let by_mac = subscription(
            SubscriptionRequest::new(InterfaceEventId::Lifecycle, noop())
                .with_filter("52:54:00:00:00:01"),
        );
        assert!(by_mac.matches(registry, &started("eth3").with_identity_key("52:54:00:00:00:01")));
    }

    #[test]
    fn test_deregistered_never_matches() {
        let registry = ensure_initialized().unwrap();
        let sub = subscription(SubscriptionRequest::new(InterfaceEventId::Lifecycle, noop()));
        sub.mark_deregistered();
        assert_eq!(sub.state(), SubscriptionState::Deregistering);
        assert!(!sub.matches(registry, &started("eth0")));
    }

    #[test]
    fn test_remote_id_routing() {
        let registry = ensure_initialized().unwrap();
        let sub = subscription(
            SubscriptionRequest::new(InterfaceEventId::Lifecycle, noop()).remote_client(),
        );
        assert!(sub.matches(registry, &started("eth0")));

        sub.assign_remote_id(4).unwrap();
        assert!(!sub.matches(registry, &started("eth0")));
        assert!(sub.matches(registry, &started("eth0").with_remote_id(4)));
        assert!(!sub.matches(registry, &started("eth0").with_remote_id(5)));
        assert_eq!(
            sub.assign_remote_id(9),
            Err(EventError::RemoteIdAlreadySet(CallbackId::new(1)))
        );
    }

    #[test]
    fn test_free_runs_once_on_drop() {
        let freed = Arc::new(AtomicUsize::new(0));
        let freed_clone = Arc::clone(&freed);
        let opaque: Opaque = Arc::new(String::from("cookie"));

        let sub = Arc::new(subscription(
            SubscriptionRequest::new(InterfaceEventId::Lifecycle, noop())
                .with_opaque(opaque)
                .with_free(move |data| {
                    assert_eq!(data.downcast_ref::<String>().unwrap(), "cookie");
                    freed_clone.fetch_add(1, Ordering::SeqCst);
                }),
        ));
        let in_flight = Arc::clone(&sub);

        drop(sub);
        assert_eq!(freed.load(Ordering::SeqCst), 0);
        drop(in_flight);
        assert_eq!(freed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_free_skipped_without_opaque() {
        let freed = Arc::new(AtomicUsize::new(0));
        let freed_clone = Arc::clone(&freed);
        let sub = subscription(
            SubscriptionRequest::new(InterfaceEventId::Lifecycle, noop()).with_free(move |_| {
                freed_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        drop(sub);
        assert_eq!(freed.load(Ordering::SeqCst), 0);
    }
}
