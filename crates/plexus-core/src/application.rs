//! Application - owner of the bus and driver of the lifecycle topics.
//!
//! `run()` goes through, in order:
//!
//! 1. publish [`topics::INIT`]
//! 2. start the [`Ticker`] and publish [`topics::RUN`]
//! 3. wait for the [`ShutdownController`] to be triggered
//! 4. publish [`topics::STOP`], stop the ticker
//! 5. drain in-flight async deliveries (bounded by the shutdown timeout)
//! 6. publish [`topics::EXIT`]

use crate::error::{Error, Result};
use crate::event_bus::{EventBus, Payload};
use crate::scheduler::TokioScheduler;
use crate::shutdown::{ShutdownController, ShutdownPhase, DEFAULT_SHUTDOWN_TIMEOUT_SECS};
use crate::ticker::Ticker;
use crate::topics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tracing::{error, info, warn};

/// Default tick period in milliseconds
pub const DEFAULT_TICK_PERIOD_MS: u64 = 1000;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Period of `Application.tick!` in milliseconds (default: 1000)
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,

    /// How long to wait for in-flight deliveries at shutdown (default: 10)
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_tick_period_ms() -> u64 {
    DEFAULT_TICK_PERIOD_MS
}

fn default_shutdown_timeout_secs() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_SECS
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: default_tick_period_ms(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl ApplicationConfig {
    /// Tick period as a duration
    #[must_use]
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    /// Shutdown timeout as a duration
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Reject settings the application cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.tick_period_ms == 0 {
            return Err(Error::InvalidConfig {
                field: "tick_period_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Host of one event bus and its lifecycle.
#[derive(Debug)]
pub struct Application {
    config: ApplicationConfig,
    scheduler: TokioScheduler,
    bus: EventBus,
    shutdown: Arc<ShutdownController>,
}

impl Application {
    /// Build an application on the current tokio runtime.
    pub fn new(config: ApplicationConfig) -> Result<Self> {
        config.validate()?;

        let scheduler = TokioScheduler::current()?;
        let bus = EventBus::new(Arc::new(scheduler.clone()));
        let shutdown = ShutdownController::with_timeout(config.shutdown_timeout());

        Ok(Self {
            config,
            scheduler,
            bus,
            shutdown,
        })
    }

    /// Handle to the application's bus
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Scheduler running async deliveries
    #[must_use]
    pub fn scheduler(&self) -> &TokioScheduler {
        &self.scheduler
    }

    /// Shutdown controller
    #[must_use]
    pub fn shutdown_controller(&self) -> &Arc<ShutdownController> {
        &self.shutdown
    }

    /// Configuration the application was built with
    #[must_use]
    pub fn config(&self) -> &ApplicationConfig {
        &self.config
    }

    /// Request shutdown; `run()` then winds down and returns.
    pub fn stop(&self) {
        self.shutdown.trigger();
    }

    /// Run until shutdown is requested.
    ///
    /// A ticker that dies early (a tick subscriber panicked) is logged and
    /// does not keep the application from stopping, draining and publishing
    /// [`topics::EXIT`].
    pub async fn run(&self) -> Result<()> {
        self.publish_lifecycle(topics::INIT, Payload::new());

        let ticker = Ticker::new(self.bus.clone(), self.config.tick_period());
        let tick_period = ticker.period();
        let mut ticker_handle = tokio::spawn(ticker.run(self.shutdown.token()));

        self.publish_lifecycle(topics::RUN, Payload::new());
        info!(
            tick_period_ms = tick_period.as_millis() as u64,
            "Application running"
        );

        // The ticker only finishes on its own when it failed
        let early_exit = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => None,
            joined = &mut ticker_handle => Some(ticker_cycles(joined)),
        };
        if early_exit.is_some() {
            self.shutdown.cancelled().await;
        }

        self.publish_lifecycle(
            topics::STOP,
            Payload::new().kwarg("exit_timeout_secs", self.config.shutdown_timeout_secs),
        );
        let cycles = match early_exit {
            Some(cycles) => cycles,
            None => ticker_cycles(ticker_handle.await),
        };

        self.shutdown.set_phase(ShutdownPhase::Draining);
        self.scheduler.drain(self.config.shutdown_timeout()).await;

        self.publish_lifecycle(topics::EXIT, Payload::new());
        self.shutdown.set_phase(ShutdownPhase::Terminated);
        info!(cycles, "Application exited");
        Ok(())
    }

    fn publish_lifecycle(&self, topic: &str, payload: Payload) {
        if let Err(e) = self.bus.publish(topic, payload) {
            warn!(topic, "Lifecycle subscribers failed: {}", e);
        }
    }
}

fn ticker_cycles(joined: std::result::Result<u64, JoinError>) -> u64 {
    match joined {
        Ok(cycles) => cycles,
        Err(e) => {
            error!("Ticker task failed, no more ticks until exit: {}", e);
            0
        }
    }
}
