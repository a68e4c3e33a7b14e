//! Error types for event registration, emission and delivery.

use thiserror::Error;

use crate::class::EventClassId;
use crate::resolver::ResolveError;
use crate::subscription::CallbackId;

/// Errors surfaced to callers of the registration and emission APIs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// The event class registry could not be built. Every public entry
    /// point fails with this until the process is restarted.
    #[error("event class registry failed to initialize: {0}")]
    Initialization(String),

    /// Deregistration referenced a callback id this connection never issued
    /// or already removed.
    #[error("no event callback with id {0}")]
    NotFound(CallbackId),

    /// The event id is not defined by the event family.
    #[error("unsupported event id {0}")]
    UnsupportedEventId(i32),

    /// The callback variant does not have the signature the event id declares.
    #[error("callback of type {callback} cannot receive event id {event_id}")]
    CallbackMismatch {
        /// Raw event id from the registration request.
        event_id: i32,
        /// Signature name of the supplied callback.
        callback: &'static str,
    },

    /// A raw lifecycle transition code outside the defined range.
    #[error("invalid lifecycle transition type {0}")]
    InvalidLifecycleType(i32),

    /// A remote id was already assigned to this callback.
    #[error("callback {0} already has a remote id")]
    RemoteIdAlreadySet(CallbackId),

    /// The connection's event state has been torn down.
    #[error("connection event state is closed")]
    Closed,

    /// A delivery mode name other than `queued` or `inline`.
    #[error("invalid delivery mode: {0}")]
    InvalidDeliveryMode(String),

    /// Queued delivery needs a tokio runtime and none is running.
    #[error("no async runtime for queued delivery: {0}")]
    Runtime(String),
}

/// Result type for event operations.
pub type EventResult<T> = Result<T, EventError>;

/// Why a single delivery was skipped.
///
/// These never escape the dispatcher: each one is logged and counted in the
/// [`DeliveryReport`](crate::DeliveryReport) while delivery to the remaining
/// subscribers carries on.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The object named by the event no longer resolves to a live handle.
    #[error("object could not be resolved: {0}")]
    Unresolved(#[from] ResolveError),

    /// No dispatch adapter understands this event.
    #[error("unknown event kind: class {class}, event id {event_id}")]
    UnknownKind {
        /// Class the event was constructed with.
        class: EventClassId,
        /// Raw event id carried by the event.
        event_id: i32,
    },

    /// The subscriber's callback panicked.
    #[error("callback panicked: {0}")]
    Panicked(String),
}
