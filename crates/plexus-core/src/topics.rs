//! Well-known application lifecycle topics.

/// Published once after the application has been set up.
pub const INIT: &str = "Application.init!";

/// Published once when the application enters its main loop.
pub const RUN: &str = "Application.run!";

/// Published on every tick of the application clock.
pub const TICK: &str = "Application.tick!";

/// Published when shutdown has been requested, before draining.
/// Carries the named value `exit_timeout_secs`.
pub const STOP: &str = "Application.stop!";

/// Published last, after in-flight deliveries have been drained.
pub const EXIT: &str = "Application.exit!";

/// Tick multiples that get their own `Application.tick/N!` topic.
pub const TICK_MULTIPLES: [u64; 8] = [10, 60, 300, 600, 1800, 3600, 43200, 86400];

/// Topic published every `every` ticks, e.g. `Application.tick/10!`.
#[must_use]
pub fn tick_every(every: u64) -> String {
    format!("Application.tick/{every}!")
}

/// All lifecycle topics, in the order an application publishes them first.
#[must_use]
pub fn lifecycle() -> Vec<String> {
    let mut topics = vec![INIT.to_string(), RUN.to_string(), TICK.to_string()];
    topics.extend(TICK_MULTIPLES.iter().map(|&every| tick_every(every)));
    topics.push(STOP.to_string());
    topics.push(EXIT.to_string());
    topics
}
