use super::*;
use crate::error::Error;
use crate::scheduler::ManualScheduler;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

fn manual_bus() -> (EventBus, Arc<ManualScheduler>) {
    let scheduler = Arc::new(ManualScheduler::new());
    (EventBus::new(scheduler.clone()), scheduler)
}

fn counting(count: &Arc<AtomicUsize>) -> Callback {
    let count = count.clone();
    Callback::new(move |_| {
        count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

fn recording(log: &Arc<Mutex<Vec<(String, String)>>>, name: &str) -> Callback {
    let log = log.clone();
    let name = name.to_string();
    Callback::new(move |event: &Event| {
        log.lock()
            .unwrap()
            .push((name.clone(), event.topic().to_string()));
        Ok(())
    })
}

#[test]
fn test_publish_without_subscribers_is_noop() {
    let (bus, scheduler) = manual_bus();

    assert_eq!(bus.publish("nobody", Payload::new().arg(1)).unwrap(), 0);
    assert_eq!(bus.publish_async("nobody", Payload::new()), 0);
    assert_eq!(scheduler.pending(), 0);
    assert!(bus.topics().is_empty());
}

#[test]
fn test_publish_delivers_to_all_subscribers() {
    let (bus, _) = manual_bus();
    let log = Arc::new(Mutex::new(Vec::new()));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let capture = seen.clone();
    bus.subscribe("tick", recording(&log, "a"));
    bus.subscribe(
        "tick",
        Callback::new(move |event: &Event| {
            capture
                .lock()
                .unwrap()
                .push((event.arg(0).cloned(), event.kwarg("n").cloned()));
            Ok(())
        }),
    );

    let delivered = bus
        .publish("tick", Payload::new().arg("tick").kwarg("n", 1))
        .unwrap();

    assert_eq!(delivered, 2);
    assert_eq!(*log.lock().unwrap(), vec![("a".to_string(), "tick".to_string())]);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![(Some(json!("tick")), Some(json!(1)))]
    );
}

#[test]
fn test_duplicate_subscribe_delivers_once() {
    let (bus, _) = manual_bus();
    let count = Arc::new(AtomicUsize::new(0));
    let callback = counting(&count);

    bus.subscribe("tick", callback.clone());
    bus.subscribe("tick", callback);

    assert_eq!(bus.subscriber_count("tick"), 1);
    bus.publish("tick", Payload::new()).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unsubscribe_stops_delivery() {
    let (bus, _) = manual_bus();
    let count = Arc::new(AtomicUsize::new(0));
    let callback = counting(&count);

    bus.subscribe("tick", callback.clone());
    bus.unsubscribe("tick", &callback);

    assert_eq!(bus.publish("tick", Payload::new()).unwrap(), 0);
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert!(bus.topics().is_empty());
}

#[test]
fn test_bad_unsubscribe_leaves_registry_intact() {
    let (bus, _) = manual_bus();
    let count = Arc::new(AtomicUsize::new(0));
    let subscribed = counting(&count);
    let stranger = counting(&count);

    bus.subscribe("tick", subscribed);

    // Unknown topic, then a callback that was never registered
    bus.unsubscribe("no-such-topic", &stranger);
    bus.unsubscribe("tick", &stranger);

    assert_eq!(bus.subscriber_count("tick"), 1);
    bus.publish("tick", Payload::new()).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_self_unsubscribe_gets_in_flight_event_only() {
    let (bus, _) = manual_bus();
    let count = Arc::new(AtomicUsize::new(0));
    let slot: Arc<OnceLock<Callback>> = Arc::new(OnceLock::new());

    let callback = {
        let bus = bus.clone();
        let slot = slot.clone();
        let count = count.clone();
        Callback::new(move |event: &Event| {
            count.fetch_add(1, Ordering::SeqCst);
            if let Some(me) = slot.get() {
                bus.unsubscribe(event.topic(), me);
            }
            Ok(())
        })
    };
    slot.set(callback.clone()).unwrap();
    bus.subscribe("tick", callback);

    assert_eq!(bus.publish("tick", Payload::new()).unwrap(), 1);
    assert_eq!(bus.publish("tick", Payload::new()).unwrap(), 0);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_subscribe_during_publish_applies_to_next_publish() {
    let (bus, _) = manual_bus();
    let late_count = Arc::new(AtomicUsize::new(0));
    let late = counting(&late_count);

    let adder = {
        let bus = bus.clone();
        Callback::new(move |event: &Event| {
            bus.subscribe(event.topic(), late.clone());
            Ok(())
        })
    };
    bus.subscribe("tick", adder);

    assert_eq!(bus.publish("tick", Payload::new()).unwrap(), 1);
    assert_eq!(late_count.load(Ordering::SeqCst), 0);

    assert_eq!(bus.publish("tick", Payload::new()).unwrap(), 2);
    assert_eq!(late_count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failing_subscriber_does_not_block_others() {
    let (bus, _) = manual_bus();
    let count = Arc::new(AtomicUsize::new(0));
    let failing = Callback::new(|_| Err(anyhow::anyhow!("websocket closed")));
    let failing_id = failing.id();

    bus.subscribe("tick", failing);
    bus.subscribe("tick", counting(&count));
    bus.subscribe("tick", counting(&count));

    let err = bus.publish("tick", Payload::new()).unwrap_err();

    assert_eq!(count.load(Ordering::SeqCst), 2);
    match &err {
        Error::SubscriberFailed {
            topic,
            delivered,
            failures,
        } => {
            assert_eq!(topic, "tick");
            assert_eq!(*delivered, 3);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].callback, failing_id);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_publish_async_defers_until_drained() {
    let (bus, scheduler) = manual_bus();
    let a = Arc::new(AtomicUsize::new(0));
    let b = Arc::new(AtomicUsize::new(0));
    bus.subscribe("tick", counting(&a));
    bus.subscribe("tick", counting(&b));

    assert_eq!(bus.publish_async("tick", Payload::new()), 2);

    // Nothing has run yet
    assert_eq!(scheduler.pending(), 2);
    assert_eq!(a.load(Ordering::SeqCst) + b.load(Ordering::SeqCst), 0);

    assert_eq!(tokio_test::block_on(scheduler.run_until_idle()), 2);
    assert_eq!(a.load(Ordering::SeqCst), 1);
    assert_eq!(b.load(Ordering::SeqCst), 1);
}

#[test]
fn test_publish_async_failure_is_isolated() {
    let (bus, scheduler) = manual_bus();
    let count = Arc::new(AtomicUsize::new(0));
    bus.subscribe(
        "tick",
        Callback::new(|_| Err(anyhow::anyhow!("subscriber broke"))),
    );
    bus.subscribe(
        "tick",
        Callback::new_async(|_| async {
            Err::<(), _>(anyhow::anyhow!("async subscriber broke"))
        }),
    );
    bus.subscribe("tick", counting(&count));

    assert_eq!(bus.publish_async("tick", Payload::new()), 3);
    assert_eq!(tokio_test::block_on(scheduler.run_until_idle()), 3);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_async_callback_on_sync_publish_is_scheduled() {
    let (bus, scheduler) = manual_bus();
    let count = Arc::new(AtomicUsize::new(0));
    let seen = count.clone();
    bus.subscribe(
        "session.closed",
        Callback::new_async(move |event| {
            let seen = seen.clone();
            async move {
                assert_eq!(event.kwarg("id"), Some(&json!("s-1")));
                seen.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(())
            }
        }),
    );

    let delivered = bus
        .publish("session.closed", Payload::new().kwarg("id", "s-1"))
        .unwrap();

    assert_eq!(delivered, 1);
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(scheduler.pending(), 1);

    tokio_test::block_on(scheduler.run_until_idle());
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_subscription_guard_unsubscribes_on_drop() {
    let (bus, _) = manual_bus();
    let count = Arc::new(AtomicUsize::new(0));

    {
        let callback = counting(&count);
        let guard = bus.subscribe_guard("tick", callback.clone());
        assert_eq!(guard.topic(), "tick");
        assert_eq!(guard.callback(), &callback);
        bus.publish("tick", Payload::new()).unwrap();
    }
    bus.publish("tick", Payload::new()).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);

    let kept = bus.subscribe_guard("tick", counting(&count)).detach();
    bus.publish("tick", Payload::new()).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 2);
    bus.unsubscribe("tick", &kept);

    let cancelled = bus.subscribe_guard("tick", counting(&count));
    cancelled.cancel();
    assert_eq!(bus.subscriber_count("tick"), 0);
    assert!(bus.registry.get("tick").is_none());
}

#[test]
fn test_guard_keeps_topic_while_others_subscribed() {
    let (bus, _) = manual_bus();
    let count = Arc::new(AtomicUsize::new(0));
    bus.subscribe("tick", counting(&count));

    drop(bus.subscribe_guard("tick", counting(&count)));

    assert_eq!(bus.subscriber_count("tick"), 1);
    assert!(bus.registry.contains_key("tick"));
}

#[test]
fn test_topics_and_counts() {
    let (bus, _) = manual_bus();
    let count = Arc::new(AtomicUsize::new(0));
    bus.subscribe("a", counting(&count));
    bus.subscribe("a", counting(&count));
    bus.subscribe("b", counting(&count));

    let mut topics = bus.topics();
    topics.sort();
    assert_eq!(topics, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(bus.subscriber_count("a"), 2);
    assert_eq!(bus.subscriber_count("missing"), 0);
}

#[test]
fn test_callback_identity() {
    let first = Callback::new(|_| Ok(())).with_label("first");
    let relabeled = first.clone().with_label("renamed");
    let other = Callback::new(|_| Ok(()));

    assert_eq!(first, relabeled);
    assert_ne!(first, other);
    assert_eq!(relabeled.label(), "renamed");
    assert!(!first.is_async());
    assert!(Callback::new_async(|_| async { Ok::<_, anyhow::Error>(()) }).is_async());
}

#[test]
fn test_event_serialization() {
    let event = Event::new(
        Topic::from("Application.tick/10!"),
        Payload::new().arg(1).kwarg("type", "factory"),
    );
    assert!(!event.payload().is_empty());
    assert!(Payload::new().is_empty());

    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(
        json,
        json!({"topic": "Application.tick/10!", "args": [1], "kwargs": {"type": "factory"}})
    );
}

#[tokio::test]
async fn test_message_waits_for_next_event() {
    let bus = EventBus::new(Arc::new(crate::scheduler::TokioScheduler::current().unwrap()));

    let waiter = bus.clone();
    let handle = tokio::spawn(async move { waiter.message("session.opened").await });

    // Wait until the temporary subscription is in place
    while bus.subscriber_count("session.opened") == 0 {
        tokio::task::yield_now().await;
    }
    bus.publish("session.opened", Payload::new().kwarg("id", "s-1"))
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(event.topic(), "session.opened");
    assert_eq!(event.kwarg("id"), Some(&json!("s-1")));
    assert_eq!(bus.subscriber_count("session.opened"), 0);
    assert!(!bus.registry.contains_key("session.opened"));
}

#[tokio::test]
async fn test_message_cleans_up_when_dropped() {
    let bus = EventBus::new(Arc::new(crate::scheduler::TokioScheduler::current().unwrap()));

    let result = tokio::time::timeout(Duration::from_millis(20), bus.message("never")).await;

    assert!(result.is_err());
    assert_eq!(bus.subscriber_count("never"), 0);
    assert!(bus.registry.is_empty());
}
