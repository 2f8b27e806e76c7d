//! Plexus Core - In-process Event Bus
//!
//! This crate provides the publish/subscribe bus that application components
//! use to talk to each other, including:
//! - EventBus: topic registry with synchronous and asynchronous publish
//! - Callbacks: sync and async subscribers with stable identity
//! - Scheduler: the injected facility that runs detached deliveries
//! - Application: lifecycle topics, periodic ticks and graceful shutdown

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod application;
pub mod error;
pub mod event_bus;
pub mod scheduler;
pub mod shutdown;
pub mod ticker;
pub mod topics;

pub use application::{Application, ApplicationConfig};
pub use error::{Error, Result, SubscriberFailure};
pub use event_bus::{Callback, CallbackId, Event, EventBus, Payload, Subscription, Topic};
pub use scheduler::{ManualScheduler, Scheduler, Task, TokioScheduler};
pub use shutdown::{
    shutdown_signal_with_controller, wait_for_shutdown_signal, ShutdownController, ShutdownPhase,
};
pub use ticker::Ticker;
