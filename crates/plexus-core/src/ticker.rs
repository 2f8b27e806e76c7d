//! Application clock.
//!
//! Publishes [`topics::TICK`] every period and `Application.tick/N!` every N
//! periods, so components can hook periodic housekeeping onto the bus
//! instead of running their own timers.

use crate::event_bus::{EventBus, Payload};
use crate::topics;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Periodic tick producer.
#[derive(Debug, Clone)]
pub struct Ticker {
    bus: EventBus,
    period: Duration,
    multiples: Vec<(u64, String)>,
}

impl Ticker {
    /// Ticker publishing on `bus` every `period`.
    #[must_use]
    pub fn new(bus: EventBus, period: Duration) -> Self {
        let multiples = topics::TICK_MULTIPLES
            .iter()
            .map(|&every| (every, topics::tick_every(every)))
            .collect();
        Self {
            bus,
            period,
            multiples,
        }
    }

    /// Tick period.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Publish the topics due on `cycle`. Returns how many topics were
    /// published.
    ///
    /// Cycle 0 is the initial tick and only publishes [`topics::TICK`].
    pub fn tick(&self, cycle: u64) -> usize {
        self.publish(topics::TICK);
        let mut published = 1;

        if cycle == 0 {
            return published;
        }

        for (every, topic) in &self.multiples {
            if cycle % every == 0 {
                self.publish(topic);
                published += 1;
            }
        }
        published
    }

    /// Tick until `token` is cancelled. Returns the last cycle number.
    pub async fn run(self, token: CancellationToken) -> u64 {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick of a tokio interval completes immediately
        interval.tick().await;

        let mut cycle = 0;
        self.tick(cycle);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    cycle += 1;
                    self.tick(cycle);
                }
            }
        }

        debug!(cycles = cycle, "Ticker stopped");
        cycle
    }

    fn publish(&self, topic: &str) {
        if let Err(e) = self.bus.publish(topic, Payload::new()) {
            warn!(topic, "Tick subscribers failed: {}", e);
        }
    }
}
