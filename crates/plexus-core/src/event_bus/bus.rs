use super::callback::{Callback, Invocation};
use super::types::{Event, Payload, Topic};
use crate::error::{Error, Result, SubscriberFailure};
use crate::scheduler::Scheduler;
use dashmap::DashMap;
use futures::future::BoxFuture;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

type Registry = DashMap<Topic, HashSet<Callback>>;

/// Topic-based publish/subscribe bus.
///
/// Cloning yields another handle to the same registry and scheduler, so a
/// bus created once by the application can be passed to every component
/// that publishes or subscribes.
///
/// Delivery always iterates a snapshot of the subscriber set taken before
/// the first callback runs. Callbacks may therefore subscribe or unsubscribe
/// (themselves included) while being delivered to; such changes apply from
/// the next publish on. Delivery order among subscribers of one topic is
/// unspecified.
#[derive(Clone)]
pub struct EventBus {
    pub(super) registry: Arc<Registry>,
    scheduler: Arc<dyn Scheduler>,
}

impl EventBus {
    /// Create a bus that hands asynchronous deliveries to `scheduler`.
    #[must_use]
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            registry: Arc::new(DashMap::new()),
            scheduler,
        }
    }

    /// Add `callback` to the subscribers of `topic`.
    ///
    /// Subscribing the same callback (or a clone of it) twice is a no-op.
    pub fn subscribe(&self, topic: impl AsRef<str>, callback: Callback) {
        let topic = topic.as_ref();
        let id = callback.id();
        let added = self
            .registry
            .entry(Topic::from(topic))
            .or_default()
            .insert(callback);

        if added {
            debug!(topic, callback = %id, "Subscribed");
        } else {
            debug!(topic, callback = %id, "Already subscribed");
        }
    }

    /// Subscribe and return a guard that unsubscribes when dropped.
    pub fn subscribe_guard(&self, topic: impl AsRef<str>, callback: Callback) -> Subscription {
        let topic = Topic::from(topic.as_ref());
        self.subscribe(&*topic, callback.clone());
        Subscription {
            bus: self.clone(),
            topic,
            callback,
            active: true,
        }
    }

    /// Remove `callback` from the subscribers of `topic`.
    ///
    /// An unknown topic or a callback that is not subscribed only logs a
    /// warning; other registrations are left untouched.
    pub fn unsubscribe(&self, topic: impl AsRef<str>, callback: &Callback) {
        let topic = topic.as_ref();

        let removed = match self.registry.get_mut(topic) {
            Some(mut subscribers) => subscribers.remove(callback),
            None => {
                warn!(topic, "Event topic not found");
                return;
            }
        };

        if removed {
            debug!(topic, callback = %callback.id(), "Unsubscribed");
        } else {
            warn!(
                topic,
                callback = %callback.id(),
                label = callback.label(),
                "Callback not found in the subscriber set"
            );
        }
    }

    /// Deliver an event to every current subscriber of `topic`, on the
    /// caller's context.
    ///
    /// Sync callbacks run inline, one after another. Async callbacks have
    /// their future handed to the scheduler. A failing subscriber does not
    /// stop delivery to the rest: every failure is logged and collected, and
    /// reported together as [`Error::SubscriberFailed`] once all subscribers
    /// have been called.
    ///
    /// Returns the number of deliveries made (0 when nobody listens).
    pub fn publish(&self, topic: impl AsRef<str>, payload: Payload) -> Result<usize> {
        let topic = topic.as_ref();
        let Some(callbacks) = self.snapshot(topic) else {
            return Ok(0);
        };

        let event = Event::new(Topic::from(topic), payload);
        let mut failures = Vec::new();

        for callback in &callbacks {
            match callback.invoke(&event) {
                Invocation::Done(Ok(())) => {}
                Invocation::Done(Err(error)) => {
                    warn!(
                        topic,
                        callback = %callback.id(),
                        label = callback.label(),
                        "Subscriber failed: {:#}",
                        error
                    );
                    failures.push(SubscriberFailure {
                        callback: callback.id(),
                        error,
                    });
                }
                Invocation::Deferred(work) => self.detach(&event, callback, work),
            }
        }

        if failures.is_empty() {
            Ok(callbacks.len())
        } else {
            Err(Error::SubscriberFailed {
                topic: topic.to_string(),
                delivered: callbacks.len(),
                failures,
            })
        }
    }

    /// Schedule one independent delivery per current subscriber of `topic`
    /// and return without waiting for any of them.
    ///
    /// Failures are reported from inside the delivery task and never reach
    /// the publisher. Returns the number of deliveries scheduled.
    pub fn publish_async(&self, topic: impl AsRef<str>, payload: Payload) -> usize {
        let topic = topic.as_ref();
        let Some(callbacks) = self.snapshot(topic) else {
            return 0;
        };

        let event = Event::new(Topic::from(topic), payload);
        for callback in &callbacks {
            let work = callback.clone().deliver(event.clone());
            self.detach(&event, callback, work);
        }

        debug!(topic, deliveries = callbacks.len(), "Scheduled async deliveries");
        callbacks.len()
    }

    /// Wait for the next event published on `topic`.
    ///
    /// The temporary subscription is removed once the event arrives or when
    /// the returned future is dropped.
    pub async fn message(&self, topic: impl AsRef<str>) -> Result<Event> {
        let (tx, rx) = oneshot::channel();
        let slot = Mutex::new(Some(tx));

        let callback = Callback::new(move |event: &Event| {
            let sender = slot
                .lock()
                .map_err(|_| anyhow::anyhow!("message slot poisoned"))?
                .take();
            if let Some(sender) = sender {
                // Receiver gone means the waiter was dropped
                let _ = sender.send(event.clone());
            }
            Ok(())
        })
        .with_label("EventBus::message");

        let _subscription = self.subscribe_guard(topic, callback);
        rx.await
            .map_err(|_| Error::Internal("message subscription closed".to_string()))
    }

    /// Number of callbacks currently subscribed to `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.registry.get(topic).map_or(0, |subscribers| subscribers.len())
    }

    /// Topics that currently have at least one subscriber.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        self.registry
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().to_string())
            .collect()
    }

    /// Copy of the subscriber set, taken with the map guard released before
    /// any callback runs. `None` when there is nobody to deliver to.
    fn snapshot(&self, topic: &str) -> Option<Vec<Callback>> {
        let subscribers = self.registry.get(topic)?;
        if subscribers.is_empty() {
            return None;
        }
        Some(subscribers.iter().cloned().collect())
    }

    /// Drop the entry of `topic` once its last subscriber is gone.
    fn prune(&self, topic: &str) {
        if self
            .registry
            .remove_if(topic, |_, subscribers| subscribers.is_empty())
            .is_some()
        {
            debug!(topic, "Removed empty topic");
        }
    }

    fn detach(
        &self,
        event: &Event,
        callback: &Callback,
        work: BoxFuture<'static, anyhow::Result<()>>,
    ) {
        let topic = event.shared_topic();
        let id = callback.id();
        let label: Arc<str> = Arc::from(callback.label());

        self.scheduler.schedule(Box::pin(async move {
            if let Err(e) = work.await {
                error!(
                    topic = %topic,
                    callback = %id,
                    label = %label,
                    "Async subscriber failed: {:#}",
                    e
                );
            }
        }));
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("topics", &self.registry.len())
            .finish_non_exhaustive()
    }
}

/// Registration that unsubscribes its callback when dropped.
///
/// Releasing the last guard of a topic also removes the topic entry, so
/// short-lived topics (one per [`EventBus::message`] call, say) do not
/// accumulate in the registry.
///
/// Returned by [`EventBus::subscribe_guard`].
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    bus: EventBus,
    topic: Topic,
    callback: Callback,
    active: bool,
}

impl Subscription {
    /// Topic of this registration.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Subscribed callback.
    #[must_use]
    pub fn callback(&self) -> &Callback {
        &self.callback
    }

    /// Unsubscribe now.
    pub fn cancel(mut self) {
        self.release();
    }

    /// Keep the callback subscribed after this guard is gone.
    pub fn detach(mut self) -> Callback {
        self.active = false;
        self.callback.clone()
    }

    fn release(&mut self) {
        if std::mem::replace(&mut self.active, false) {
            self.bus.unsubscribe(&*self.topic, &self.callback);
            self.bus.prune(&self.topic);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("callback", &self.callback)
            .field("active", &self.active)
            .finish()
    }
}
