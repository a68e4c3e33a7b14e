//! Matching events against subscriptions and invoking callbacks.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::class::ensure_initialized;
use crate::connection::Connection;
use crate::error::DeliveryError;
use crate::event::{EventObject, SharedEvent};
use crate::resolver::ObjectHandle;
use crate::subscription::Subscription;

/// Per-family function that turns a stored callback into a typed call.
pub type DispatchAdapter = fn(&DeliveryContext<'_>) -> Result<(), DeliveryError>;

/// Everything an adapter needs for one delivery.
pub struct DeliveryContext<'a> {
    pub(crate) connection: &'a Connection,
    pub(crate) handle: &'a ObjectHandle,
    pub(crate) event: &'a EventObject,
    pub(crate) subscription: &'a Subscription,
}

/// What happened when one event was delivered on one connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Subscriptions that matched the event.
    pub matched: usize,
    /// Callbacks that ran to completion.
    pub delivered: usize,
    /// Matches skipped because of a [`DeliveryError`].
    pub skipped: usize,
}

/// Delivers events to the subscriptions of a connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher;

impl Dispatcher {
    /// Deliver `event` to every matching subscription of `connection`, on the
    /// calling thread.
    ///
    /// Works on a snapshot of the subscription list taken before the first
    /// callback runs, so callbacks may register or deregister freely. A
    /// subscription deregistered part-way through the pass is skipped when
    /// its turn comes. Failures affect a single delivery only.
    pub fn deliver(connection: &Connection, event: &EventObject) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let Ok(registry) = ensure_initialized() else {
            return report;
        };

        let Some(adapter) = registry.adapter_for(event.class()) else {
            warn!(
                connection = %connection.id(),
                class = %event.class(),
                event_id = event.event_id(),
                "No dispatch adapter for event class, skipping"
            );
            return report;
        };

        for subscription in connection.events().snapshot() {
            if !subscription.matches(registry, event) {
                continue;
            }
            report.matched = report.matched.saturating_add(1);

            match Self::deliver_one(connection, event, &subscription, adapter) {
                Ok(()) => {
                    report.delivered = report.delivered.saturating_add(1);
                    trace!(
                        connection = %connection.id(),
                        callback_id = %subscription.id(),
                        object = event.name(),
                        "Event delivered"
                    );
                },
                Err(e) => {
                    report.skipped = report.skipped.saturating_add(1);
                    if let DeliveryError::Unresolved(_) = e {
                        debug!(
                            connection = %connection.id(),
                            callback_id = %subscription.id(),
                            object = event.name(),
                            error = %e,
                            "Skipping delivery"
                        );
                    } else {
                        warn!(
                            connection = %connection.id(),
                            callback_id = %subscription.id(),
                            object = event.name(),
                            error = %e,
                            "Skipping delivery"
                        );
                    }
                },
            }
        }

        report
    }

    fn deliver_one(
        connection: &Connection,
        event: &EventObject,
        subscription: &Subscription,
        adapter: DispatchAdapter,
    ) -> Result<(), DeliveryError> {
        // Resolver and callback panics stay inside this delivery.
        panic::catch_unwind(AssertUnwindSafe(|| {
            let handle = connection.resolver().resolve(
                subscription.class(),
                event.name(),
                event.identity_key(),
            )?;
            adapter(&DeliveryContext {
                connection,
                handle: &handle,
                event,
                subscription,
            })
        }))
        .map_err(|payload| DeliveryError::Panicked(panic_message(payload.as_ref())))?
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Hand `event` to each target connection.
///
/// The event is shared, not copied: each connection's queue holds a
/// reference until its delivery finishes, and the event is freed with the
/// last one. Closed connections are skipped. Returns how many connections
/// accepted the event.
pub fn dispatch<'a>(
    event: EventObject,
    targets: impl IntoIterator<Item = &'a Connection>,
) -> usize {
    let event: SharedEvent = event.into_shared();
    let mut accepted: usize = 0;
    for connection in targets {
        match connection.enqueue(SharedEvent::clone(&event)) {
            Ok(()) => accepted = accepted.saturating_add(1),
            Err(e) => {
                trace!(connection = %connection.id(), error = %e, "Connection refused event");
            },
        }
    }
    accepted
}
