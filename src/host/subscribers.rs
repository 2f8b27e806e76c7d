//! Built-in subscribers wired by the host
//!
//! - lifecycle: logs init/run/stop/exit
//! - heartbeat: debug line every `Application.tick/10!`
//! - status: bus summary every `Application.tick/60!`, as an async delivery

use plexus_core::{topics, Callback, Event, EventBus, Subscription};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Subscribe the built-in callbacks. Dropping the returned guards removes them.
pub fn install(bus: &EventBus) -> Vec<Subscription> {
    let mut subscriptions = Vec::new();

    let lifecycle = Callback::new(|event: &Event| {
        info!(topic = event.topic(), payload = ?event.payload().kwargs, "Lifecycle event");
        Ok(())
    })
    .with_label("host::lifecycle");
    for topic in [topics::INIT, topics::RUN, topics::STOP, topics::EXIT] {
        subscriptions.push(bus.subscribe_guard(topic, lifecycle.clone()));
    }

    let beats = Arc::new(AtomicU64::new(0));
    let heartbeat = Callback::new(move |event: &Event| {
        let beat = beats.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(topic = event.topic(), beat, "Heartbeat");
        Ok(())
    })
    .with_label("host::heartbeat");
    subscriptions.push(bus.subscribe_guard(topics::tick_every(10), heartbeat));

    let status_bus = bus.clone();
    let status = Callback::new_async(move |event: Event| {
        let bus = status_bus.clone();
        async move {
            let mut active = bus.topics();
            active.sort();
            let subscribers: usize = active.iter().map(|t| bus.subscriber_count(t)).sum();
            info!(
                topic = event.topic(),
                topics = active.len(),
                subscribers,
                "Event bus status"
            );
            Ok::<_, anyhow::Error>(())
        }
    })
    .with_label("host::status");
    subscriptions.push(bus.subscribe_guard(topics::tick_every(60), status));

    subscriptions
}
