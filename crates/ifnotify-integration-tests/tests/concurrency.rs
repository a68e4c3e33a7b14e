//! Concurrent registration, deregistration and emission.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use ifnotify_events::{
    CallbackId, EventBroker, EventCallback, InterfaceEventId, LifecycleType, Opaque,
    SubscriptionRequest, dispatch,
};
use ifnotify_test::prelude::*;

#[test]
fn callback_ids_unique_under_concurrent_registration() {
    let conn = inline_connection();
    let recorder = LifecycleRecorder::new();

    let ids: Vec<CallbackId> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let conn = conn.clone();
                let recorder = recorder.clone();
                scope.spawn(move || {
                    (0..100)
                        .map(|_| {
                            conn.register_event_callback(recorder.request())
                                .unwrap()
                                .callback_id
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    let unique: HashSet<_> = ids.iter().copied().collect();
    assert_eq!(unique.len(), 800);
    assert_eq!(conn.events().len(), 800);
}

#[test]
fn emission_races_with_registration_changes() {
    init_test_tracing();
    let conn = inline_connection();
    let recorder = LifecycleRecorder::new();
    let stable = conn
        .register_event_callback(recorder.tagged_request(0))
        .unwrap();

    thread::scope(|scope| {
        for _ in 0..4 {
            let conn = conn.clone();
            scope.spawn(move || {
                for _ in 0..200 {
                    dispatch(lifecycle_event("eth0", LifecycleType::Started), [&conn]);
                }
            });
        }
        for _ in 0..2 {
            let conn = conn.clone();
            let recorder = recorder.clone();
            scope.spawn(move || {
                for _ in 0..200 {
                    let id = conn
                        .register_event_callback(recorder.tagged_request(1))
                        .unwrap()
                        .callback_id;
                    conn.deregister_event_callback(id).unwrap();
                }
            });
        }
    });

    // The stable subscription saw every emission exactly once.
    assert_eq!(recorder.calls_tagged(0).len(), 800);
    assert_eq!(conn.events().len(), 1);
    assert!(conn.events().get(stable.callback_id).is_some());
}

#[test]
fn opaque_freed_once_when_in_flight_delivery_finishes() {
    let conn = inline_connection();
    let freed = Arc::new(AtomicUsize::new(0));
    let freed_in_free = Arc::clone(&freed);
    let slot = CallbackSlot::new();
    let slot_in_callback = slot.clone();
    let freed_seen_in_callback = Arc::new(AtomicUsize::new(usize::MAX));
    let seen = Arc::clone(&freed_seen_in_callback);
    let freed_for_callback = Arc::clone(&freed);
    let opaque: Opaque = Arc::new(5_u64);

    let id = conn
        .register_event_callback(
            SubscriptionRequest::new(
                InterfaceEventId::Lifecycle,
                EventCallback::lifecycle(move |c, _, _, _, _| {
                    if let Some(id) = slot_in_callback.take() {
                        c.deregister_event_callback(id).unwrap();
                    }
                    // The dispatch snapshot still holds the subscription.
                    seen.store(freed_for_callback.load(Ordering::SeqCst), Ordering::SeqCst);
                }),
            )
            .with_opaque(opaque)
            .with_free(move |_| {
                freed_in_free.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap()
        .callback_id;
    slot.set(id);

    dispatch(lifecycle_event("eth0", LifecycleType::Stopped), [&conn]);

    assert_eq!(freed_seen_in_callback.load(Ordering::SeqCst), 0);
    assert_eq!(freed.load(Ordering::SeqCst), 1);
    conn.close();
    assert_eq!(freed.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_producers_share_one_event_per_emission() {
    init_test_tracing();
    let broker = Arc::new(EventBroker::default());
    let recorder = LifecycleRecorder::new();
    let mut connections = Vec::new();
    for tag in 0..3_u64 {
        let conn = broker
            .open_connection(TEST_URI, Arc::new(MockResolver::new(["eth0", "eth1"])))
            .unwrap();
        conn.register_event_callback(recorder.tagged_request(tag))
            .unwrap();
        connections.push(conn);
    }

    let producers: Vec<_> = ["eth0", "eth1"]
        .into_iter()
        .map(|name| {
            let broker = Arc::clone(&broker);
            tokio::spawn(async move {
                for _ in 0..50 {
                    broker.dispatch(lifecycle_event(name, LifecycleType::Started));
                }
            })
        })
        .collect();
    for producer in producers {
        producer.await.unwrap();
    }
    for conn in &connections {
        conn.flush().await.unwrap();
    }

    for tag in 0..3_u64 {
        let calls = recorder.calls_tagged(tag);
        assert_eq!(calls.len(), 100);
        assert_eq!(calls.iter().filter(|c| c.object.name() == "eth0").count(), 50);
    }
}

#[tokio::test]
async fn shared_event_released_after_every_queue_drains() {
    let a = queued_connection();
    let b = queued_connection();
    let recorder = LifecycleRecorder::new();
    a.register_event_callback(recorder.request()).unwrap();
    b.register_event_callback(recorder.request()).unwrap();

    let event = lifecycle_event("eth0", LifecycleType::Defined).into_shared();
    a.enqueue(Arc::clone(&event)).unwrap();
    b.enqueue(Arc::clone(&event)).unwrap();
    a.flush().await.unwrap();
    b.flush().await.unwrap();

    assert_eq!(recorder.count(), 2);
    assert_eq!(Arc::strong_count(&event), 1);
}
