//! End-to-end delivery scenarios for interface lifecycle events.

use std::sync::Arc;

use ifnotify_events::{
    DeliveryReport, Dispatcher, EventCallback, EventError, InterfaceEvent, InterfaceEventId,
    LifecycleType, SubscriptionRequest, dispatch,
};
use ifnotify_test::prelude::*;

#[test]
fn lifecycle_round_trip_passes_exact_arguments() {
    init_test_tracing();
    let conn = inline_connection();
    let recorder = LifecycleRecorder::new();
    conn.register_event_callback(recorder.tagged_request(7))
        .unwrap();

    let event = InterfaceEvent::lifecycle("eth0", LifecycleType::Started, 0).unwrap();
    dispatch(event, [&conn]);

    let calls = recorder.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].connection, conn.id());
    assert_eq!(calls[0].object.name(), "eth0");
    assert_eq!(calls[0].event.code(), 2);
    assert_eq!(calls[0].detail, 0);
    assert_eq!(calls[0].tag, Some(7));
}

#[test]
fn unfiltered_subscription_receives_event() {
    init_test_tracing();
    let c1 = inline_connection();
    let recorder = LifecycleRecorder::new();
    c1.register_event_callback(recorder.request()).unwrap();

    let event = InterfaceEvent::lifecycle_raw("eth0", 3, 1).unwrap();
    dispatch(event, [&c1]);

    let calls = recorder.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].event, LifecycleType::Stopped);
    assert_eq!(calls[0].detail, 1);
}

#[test]
fn filters_route_by_object_name() {
    init_test_tracing();
    let c1 = inline_connection();
    let c2 = inline_connection();
    let r1 = LifecycleRecorder::new();
    let r2 = LifecycleRecorder::new();
    c1.register_event_callback(r1.request().with_filter("eth0"))
        .unwrap();
    c2.register_event_callback(r2.request().with_filter("eth1"))
        .unwrap();

    dispatch(lifecycle_event("eth0", LifecycleType::Started), [&c1, &c2]);

    assert_eq!(r1.count(), 1);
    assert_eq!(r2.count(), 0);
}

#[test]
fn duplicate_subscriptions_each_fire_once() {
    init_test_tracing();
    let conn = inline_connection();
    let recorder = LifecycleRecorder::new();
    let first = conn
        .register_event_callback(recorder.tagged_request(1).with_filter("eth0"))
        .unwrap();
    let second = conn
        .register_event_callback(recorder.tagged_request(2).with_filter("eth0"))
        .unwrap();
    assert_ne!(first.callback_id, second.callback_id);
    assert_eq!(second.active, 2);

    dispatch(lifecycle_event("eth0", LifecycleType::Defined), [&conn]);

    assert_eq!(recorder.calls_tagged(1).len(), 1);
    assert_eq!(recorder.calls_tagged(2).len(), 1);
}

#[test]
fn callback_deregisters_itself() {
    init_test_tracing();
    let conn = inline_connection();
    let recorder = LifecycleRecorder::new();
    let inner = recorder.callback();
    let slot = CallbackSlot::new();
    let slot_in_callback = slot.clone();
    let EventCallback::Lifecycle(record) = inner;

    let registered = conn
        .register_event_callback(SubscriptionRequest::new(
            InterfaceEventId::Lifecycle,
            EventCallback::lifecycle(move |c, iface, event, detail, opaque| {
                if let Some(id) = slot_in_callback.take() {
                    assert_eq!(c.deregister_event_callback(id), Ok(0));
                }
                // Still running normally after removing itself.
                record(c, iface, event, detail, opaque);
            }),
        ))
        .unwrap();
    slot.set(registered.callback_id);

    dispatch(lifecycle_event("eth0", LifecycleType::Started), [&conn]);
    dispatch(lifecycle_event("eth0", LifecycleType::Stopped), [&conn]);

    let calls = recorder.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].event, LifecycleType::Started);
    assert_eq!(
        conn.deregister_event_callback(registered.callback_id),
        Err(EventError::NotFound(registered.callback_id))
    );
}

#[test]
fn vanished_object_is_skipped() {
    init_test_tracing();
    let resolver = MockResolver::new(["eth0", "eth1"]);
    let conn = inline_connection_with(Arc::new(resolver.clone()));
    let recorder = LifecycleRecorder::new();
    conn.register_event_callback(recorder.tagged_request(1)).unwrap();
    conn.register_event_callback(recorder.tagged_request(2)).unwrap();

    let vanished = lifecycle_event("eth0", LifecycleType::Undefined);
    let other = lifecycle_event("eth1", LifecycleType::Started);
    resolver.remove("eth0");

    let report = Dispatcher::deliver(&conn, &vanished);
    assert_eq!(
        report,
        DeliveryReport {
            matched: 2,
            delivered: 0,
            skipped: 2,
        }
    );

    let report = Dispatcher::deliver(&conn, &other);
    assert_eq!(report.delivered, 2);
    assert!(recorder.calls().iter().all(|c| c.object.name() == "eth1"));
}

#[test]
fn filter_on_identity_key_matches() {
    init_test_tracing();
    let conn = inline_connection();
    let recorder = LifecycleRecorder::new();
    conn.register_event_callback(recorder.request().with_filter("52:54:00:12:34:56"))
        .unwrap();

    let event = InterfaceEvent::lifecycle("eth0", LifecycleType::Started, 0)
        .unwrap()
        .with_identity_key("52:54:00:12:34:56");
    dispatch(event, [&conn]);
    dispatch(lifecycle_event("eth1", LifecycleType::Started), [&conn]);

    let calls = recorder.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].object.key(), Some("52:54:00:12:34:56"));
}

#[test]
fn unfiltered_subscription_sees_every_object() {
    init_test_tracing();
    let conn = inline_connection();
    let recorder = LifecycleRecorder::new();
    conn.register_event_callback(recorder.request()).unwrap();

    for name in ["eth0", "eth1", "br0", "virbr0"] {
        dispatch(lifecycle_event(name, LifecycleType::Defined), [&conn]);
    }

    let names: Vec<String> = recorder
        .calls()
        .into_iter()
        .map(|c| c.object.name().to_owned())
        .collect();
    assert_eq!(names, ["eth0", "eth1", "br0", "virbr0"]);
}

#[test]
fn remote_client_subscriptions_route_by_remote_id() {
    init_test_tracing();
    let conn = inline_connection();
    let recorder = LifecycleRecorder::new();
    let a = conn
        .register_event_callback(recorder.tagged_request(1).remote_client())
        .unwrap();
    let b = conn
        .register_event_callback(recorder.tagged_request(2).remote_client())
        .unwrap();
    assert_eq!(a.remote_peers, 1);
    assert_eq!(b.remote_peers, 2);

    conn.events().set_remote_id(a.callback_id, 100).unwrap();
    conn.events().set_remote_id(b.callback_id, 200).unwrap();
    assert_eq!(conn.events().callback_id_for_remote(200), Some(b.callback_id));

    let forwarded = lifecycle_event("eth0", LifecycleType::Started).with_remote_id(200);
    dispatch(forwarded, [&conn]);

    assert!(recorder.calls_tagged(1).is_empty());
    assert_eq!(recorder.calls_tagged(2).len(), 1);
}

#[test]
fn invalid_registrations_are_rejected() {
    let conn = inline_connection();
    let recorder = LifecycleRecorder::new();
    let err = conn
        .register_event_callback(SubscriptionRequest::new(4, recorder.callback()))
        .unwrap_err();
    assert_eq!(err, EventError::UnsupportedEventId(4));
    assert!(conn.events().is_empty());

    assert_eq!(
        InterfaceEvent::lifecycle_raw("eth0", 4, 0).unwrap_err(),
        EventError::InvalidLifecycleType(4)
    );
}
