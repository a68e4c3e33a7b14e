//! Event objects: one immutable record per occurrence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::class::EventClassId;
use crate::interface::LifecycleType;

/// Metadata attached to every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier, for log correlation.
    pub event_id: Uuid,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
}

impl EventMetadata {
    /// Fresh metadata stamped with the current time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        }
    }
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Kind-specific fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    /// An interface lifecycle transition.
    InterfaceLifecycle {
        /// Which transition happened.
        event: LifecycleType,
        /// Driver-specific detail code.
        detail: i32,
    },
}

/// A reference-counted event, as held by every dispatch path.
pub type SharedEvent = Arc<EventObject>;

/// One occurrence of an event.
///
/// Built by the emission factories and never mutated once it is shared: the
/// builder methods consume `self`, so they can only run while the producer
/// still owns the event exclusively.
#[derive(Debug, Clone, Serialize)]
pub struct EventObject {
    metadata: EventMetadata,
    class: EventClassId,
    event_id: i32,
    name: String,
    identity_key: Option<String>,
    remote_id: Option<i32>,
    payload: EventPayload,
}

impl EventObject {
    pub(crate) fn new(
        class: EventClassId,
        event_id: i32,
        name: String,
        payload: EventPayload,
    ) -> Self {
        Self {
            metadata: EventMetadata::new(),
            class,
            event_id,
            name,
            identity_key: None,
            remote_id: None,
            payload,
        }
    }

    /// Attach a secondary identity (e.g. a MAC address) that subscription
    /// filters may match instead of the name.
    #[must_use]
    pub fn with_identity_key(mut self, key: impl Into<String>) -> Self {
        self.identity_key = Some(key.into());
        self
    }

    /// Route this event only to subscriptions carrying the same remote id.
    ///
    /// Used on the client side of a transport, where the server tags each
    /// forwarded event with the id it issued for the upstream registration.
    #[must_use]
    pub fn with_remote_id(mut self, remote_id: i32) -> Self {
        self.remote_id = Some(remote_id);
        self
    }

    /// Wrap the event for sharing across dispatch paths.
    #[must_use]
    pub fn into_shared(self) -> SharedEvent {
        Arc::new(self)
    }

    /// Event metadata.
    #[must_use]
    pub fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    /// Class the event was constructed with.
    #[must_use]
    pub fn class(&self) -> EventClassId {
        self.class
    }

    /// Raw event id within the class family.
    #[must_use]
    pub fn event_id(&self) -> i32 {
        self.event_id
    }

    /// Name of the object the event is about.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Secondary identity of the object, if the producer supplied one.
    #[must_use]
    pub fn identity_key(&self) -> Option<&str> {
        self.identity_key.as_deref()
    }

    /// Remote routing id, if any.
    #[must_use]
    pub fn remote_id(&self) -> Option<i32> {
        self.remote_id
    }

    /// Kind-specific fields.
    #[must_use]
    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// Whether `filter` names this event's object, by name or identity key.
    #[must_use]
    pub fn concerns(&self, filter: &str) -> bool {
        self.name == filter || self.identity_key.as_deref() == Some(filter)
    }

    #[cfg(test)]
    pub(crate) fn with_raw_event_id(mut self, event_id: i32) -> Self {
        self.event_id = event_id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lifecycle(name: &str) -> EventObject {
        EventObject::new(
            EventClassId::InterfaceLifecycle,
            0,
            name.to_owned(),
            EventPayload::InterfaceLifecycle {
                event: LifecycleType::Started,
                detail: 0,
            },
        )
    }

    #[test]
    fn test_concerns_name_and_key() {
        let event = lifecycle("eth0").with_identity_key("52:54:00:aa:bb:cc");
        assert!(event.concerns("eth0"));
        assert!(event.concerns("52:54:00:aa:bb:cc"));
        assert!(!event.concerns("eth1"));
    }

    #[test]
    fn test_builders_before_sharing() {
        let event = lifecycle("br0").with_remote_id(7).into_shared();
        assert_eq!(event.remote_id(), Some(7));
        assert_eq!(Arc::strong_count(&event), 1);
    }

    #[test]
    fn test_metadata_unique() {
        let a = lifecycle("eth0");
        let b = lifecycle("eth0");
        assert_ne!(a.metadata().event_id, b.metadata().event_id);
    }

    #[test]
    fn test_serialize_payload() {
        let json = serde_json::to_value(lifecycle("eth0")).unwrap();
        assert_eq!(json["name"], "eth0");
        assert_eq!(json["class"], "interface_lifecycle");
        assert_eq!(json["payload"]["kind"], "interface_lifecycle");
        assert_eq!(json["payload"]["event"], "started");
    }
}
