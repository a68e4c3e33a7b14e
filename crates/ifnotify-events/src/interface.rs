//! The network interface event family: event ids, lifecycle codes, the
//! emission factory drivers call, and the adapter that turns a stored
//! callback into a typed call.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::class::{EventClassId, ensure_initialized};
use crate::dispatch::DeliveryContext;
use crate::error::{DeliveryError, EventError, EventResult};
use crate::event::{EventObject, EventPayload};
use crate::subscription::EventCallback;

/// Interface lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum LifecycleType {
    /// The interface configuration was defined.
    Defined = 0,
    /// The interface configuration was removed.
    Undefined = 1,
    /// The interface was brought up.
    Started = 2,
    /// The interface was brought down.
    Stopped = 3,
}

impl LifecycleType {
    /// Every transition, in code order.
    pub const ALL: [Self; 4] = [Self::Defined, Self::Undefined, Self::Started, Self::Stopped];

    /// Wire code of the transition.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Lowercase name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Defined => "defined",
            Self::Undefined => "undefined",
            Self::Started => "started",
            Self::Stopped => "stopped",
        }
    }
}

impl TryFrom<i32> for LifecycleType {
    type Error = EventError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|t| t.code() == code)
            .ok_or(EventError::InvalidLifecycleType(code))
    }
}

impl From<LifecycleType> for i32 {
    fn from(value: LifecycleType) -> Self {
        value.code()
    }
}

impl fmt::Display for LifecycleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event ids a client can register for within the interface family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum InterfaceEventId {
    /// Lifecycle transitions; callbacks are [`EventCallback::Lifecycle`].
    Lifecycle = 0,
}

impl InterfaceEventId {
    /// Every id the family defines.
    pub const ALL: [Self; 1] = [Self::Lifecycle];

    /// Class of the events emitted under this id.
    #[must_use]
    pub const fn class(self) -> EventClassId {
        match self {
            Self::Lifecycle => EventClassId::InterfaceLifecycle,
        }
    }

    /// Name of the callback signature this id requires.
    #[must_use]
    pub const fn callback_signature(self) -> &'static str {
        match self {
            Self::Lifecycle => "lifecycle",
        }
    }
}

impl TryFrom<i32> for InterfaceEventId {
    type Error = EventError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|id| i32::from(*id) == raw)
            .ok_or(EventError::UnsupportedEventId(raw))
    }
}

impl From<InterfaceEventId> for i32 {
    fn from(value: InterfaceEventId) -> Self {
        value as Self
    }
}

/// Emission factory for interface events.
///
/// Drivers call these when they observe a state change, then hand the result
/// to a [`Connection`](crate::Connection), an
/// [`EventBroker`](crate::EventBroker), or [`dispatch`](crate::dispatch()).
#[derive(Debug, Clone, Copy)]
pub struct InterfaceEvent;

impl InterfaceEvent {
    /// The class subscriptions to this family are registered against.
    pub const FAMILY: EventClassId = EventClassId::Interface;

    /// A lifecycle transition of the interface `name`.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Initialization`] if the class registry is not
    /// available.
    pub fn lifecycle(
        name: impl Into<String>,
        event: LifecycleType,
        detail: i32,
    ) -> EventResult<EventObject> {
        ensure_initialized()?;
        Ok(EventObject::new(
            InterfaceEventId::Lifecycle.class(),
            InterfaceEventId::Lifecycle.into(),
            name.into(),
            EventPayload::InterfaceLifecycle { event, detail },
        ))
    }

    /// Same as [`lifecycle`](Self::lifecycle) for drivers that carry the
    /// transition as a raw code.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidLifecycleType`] for codes outside
    /// `0..=3`, or [`EventError::Initialization`].
    pub fn lifecycle_raw(
        name: impl Into<String>,
        event: i32,
        detail: i32,
    ) -> EventResult<EventObject> {
        Self::lifecycle(name, LifecycleType::try_from(event)?, detail)
    }
}

/// Dispatch adapter installed on [`EventClassId::Interface`].
pub(crate) fn dispatch_interface_event(ctx: &DeliveryContext<'_>) -> Result<(), DeliveryError> {
    let id = InterfaceEventId::try_from(ctx.event.event_id()).map_err(|_| {
        DeliveryError::UnknownKind {
            class: ctx.event.class(),
            event_id: ctx.event.event_id(),
        }
    })?;

    match id {
        InterfaceEventId::Lifecycle => {
            let EventPayload::InterfaceLifecycle { event, detail } = *ctx.event.payload();
            let EventCallback::Lifecycle(callback) = ctx.subscription.callback();
            callback(
                ctx.connection,
                ctx.handle,
                event,
                detail,
                ctx.subscription.opaque(),
            );
            Ok(())
        },
    }
}
