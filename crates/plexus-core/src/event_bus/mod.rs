//! EventBus - in-process publish/subscribe for application components.
//!
//! Topics are plain strings (`"Application.tick!"`). Producers either
//! `publish` (subscribers run on the caller, one after another) or
//! `publish_async` (each delivery becomes a detached task on the injected
//! [`Scheduler`](crate::scheduler::Scheduler)).
//!
//! ```ignore
//! let bus = EventBus::new(Arc::new(TokioScheduler::current()?));
//!
//! let on_tick = Callback::new(|event| {
//!     tracing::info!(topic = event.topic(), "tick");
//!     Ok(())
//! });
//! bus.subscribe("Application.tick!", on_tick.clone());
//!
//! bus.publish("Application.tick!", Payload::new())?;
//! bus.unsubscribe("Application.tick!", &on_tick);
//! ```

/// Topic registry and publish paths.
pub mod bus;
/// Subscriber callbacks and their identity.
pub mod callback;
/// Topic, payload and event types.
pub mod types;

pub use bus::{EventBus, Subscription};
pub use callback::{Callback, CallbackId};
pub use types::{Event, Payload, Topic};

#[cfg(test)]
mod tests;
