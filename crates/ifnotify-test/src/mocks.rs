//! Mock implementations for testing.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use ifnotify_events::{
    CallbackId, ConnectionId, EventCallback, EventClassId, InterfaceEventId, LifecycleType,
    ObjectHandle, ObjectResolver, ResolveError, SubscriptionRequest,
};

/// Resolver backed by a mutable set of live object names.
///
/// Removing a name simulates an object that disappears between emission and
/// delivery. Clones share the same set.
#[derive(Debug, Clone, Default)]
pub struct MockResolver {
    live: Arc<Mutex<HashSet<String>>>,
    lookups: Arc<AtomicUsize>,
}

impl MockResolver {
    /// Resolver that knows the given objects.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            live: Arc::new(Mutex::new(names.into_iter().map(Into::into).collect())),
            lookups: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make an object resolvable.
    pub fn insert(&self, name: impl Into<String>) {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into());
    }

    /// Make an object unresolvable. Returns whether it was live.
    pub fn remove(&self, name: &str) -> bool {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    /// How many lookups were attempted.
    #[must_use]
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl ObjectResolver for MockResolver {
    fn resolve(
        &self,
        family: EventClassId,
        name: &str,
        key: Option<&str>,
    ) -> Result<ObjectHandle, ResolveError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        if live.contains(name) || key.is_some_and(|k| live.contains(k)) {
            Ok(ObjectHandle::new(family, name, key.map(str::to_owned)))
        } else {
            Err(ResolveError::Gone {
                name: name.to_owned(),
            })
        }
    }
}

/// One recorded lifecycle callback invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleCall {
    /// Connection the callback ran for.
    pub connection: ConnectionId,
    /// Resolved object handle.
    pub object: ObjectHandle,
    /// Transition delivered.
    pub event: LifecycleType,
    /// Detail code delivered.
    pub detail: i32,
    /// Opaque data, when it was a `u64` tag.
    pub tag: Option<u64>,
}

/// Records every lifecycle invocation of the callbacks it hands out.
///
/// Clones share the same record, so one recorder can be registered on
/// several connections.
#[derive(Debug, Clone, Default)]
pub struct LifecycleRecorder {
    calls: Arc<Mutex<Vec<LifecycleCall>>>,
}

impl LifecycleRecorder {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A lifecycle callback that appends to this recorder.
    #[must_use]
    pub fn callback(&self) -> EventCallback {
        let calls = Arc::clone(&self.calls);
        EventCallback::lifecycle(move |conn, object, event, detail, opaque| {
            let tag = opaque.and_then(|o| o.downcast_ref::<u64>()).copied();
            calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(LifecycleCall {
                    connection: conn.id(),
                    object: object.clone(),
                    event,
                    detail,
                    tag,
                });
        })
    }

    /// An unfiltered lifecycle subscription request using [`callback`](Self::callback).
    #[must_use]
    pub fn request(&self) -> SubscriptionRequest {
        SubscriptionRequest::new(InterfaceEventId::Lifecycle, self.callback())
    }

    /// A lifecycle subscription request tagged with `tag` as opaque data.
    #[must_use]
    pub fn tagged_request(&self, tag: u64) -> SubscriptionRequest {
        self.request().with_opaque(Arc::new(tag))
    }

    /// Recorded calls, in invocation order.
    #[must_use]
    pub fn calls(&self) -> Vec<LifecycleCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded calls.
    #[must_use]
    pub fn count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Recorded calls whose opaque tag is `tag`.
    #[must_use]
    pub fn calls_tagged(&self, tag: u64) -> Vec<LifecycleCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.tag == Some(tag))
            .collect()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Slot for a callback id that is only known after registration, for
/// callbacks that deregister themselves.
#[derive(Debug, Clone, Default)]
pub struct CallbackSlot(Arc<Mutex<Option<CallbackId>>>);

impl CallbackSlot {
    /// Empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the id.
    pub fn set(&self, id: CallbackId) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(id);
    }

    /// Take the id out, leaving the slot empty.
    #[must_use]
    pub fn take(&self) -> Option<CallbackId> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_resolver_live_set() {
        let resolver = MockResolver::new(["eth0"]);
        assert!(resolver.resolve(EventClassId::Interface, "eth0", None).is_ok());
        assert!(resolver.remove("eth0"));
        assert_eq!(
            resolver.resolve(EventClassId::Interface, "eth0", None),
            Err(ResolveError::Gone {
                name: "eth0".into()
            })
        );
        assert_eq!(resolver.lookups(), 2);
    }

    #[test]
    fn test_mock_resolver_by_key() {
        let resolver = MockResolver::new(["52:54:00:00:00:01"]);
        let handle = resolver
            .resolve(EventClassId::Interface, "eth3", Some("52:54:00:00:00:01"))
            .unwrap();
        assert_eq!(handle.name(), "eth3");
    }

    #[test]
    fn test_callback_slot() {
        let slot = CallbackSlot::new();
        assert!(slot.take().is_none());
    }
}
