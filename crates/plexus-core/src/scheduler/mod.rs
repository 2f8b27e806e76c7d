//! Scheduler - where detached deliveries run.
//!
//! The bus never spawns anything itself. Every asynchronous delivery is
//! handed, as a boxed future, to the [`Scheduler`] injected at construction:
//!
//! - [`TokioScheduler`]: spawn-and-detach on a tokio runtime, with in-flight
//!   tracking so the host can drain deliveries at shutdown
//! - [`ManualScheduler`]: queues work until a test drains it explicitly

mod manual;
mod runtime;

pub use manual::ManualScheduler;
pub use runtime::TokioScheduler;

use futures::future::BoxFuture;

/// A zero-argument unit of work, run to completion by a scheduler.
pub type Task = BoxFuture<'static, ()>;

/// Facility that runs deferred work independently of whoever submitted it.
pub trait Scheduler: Send + Sync {
    /// Submit `task`. The caller does not wait for it and gets no handle
    /// back; failures are the task's own business to report.
    fn schedule(&self, task: Task);
}
