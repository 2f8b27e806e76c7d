use super::{Scheduler, Task};
use crate::error::{Error, Result};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

/// Spawns work onto a tokio runtime and detaches it.
///
/// Clones share the same runtime handle and in-flight tracker.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
    tracker: TaskTracker,
}

impl TokioScheduler {
    /// Scheduler bound to an explicit runtime handle.
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            tracker: TaskTracker::new(),
        }
    }

    /// Scheduler bound to the runtime the caller is running in.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| Error::NoRuntime(e.to_string()))
    }

    /// Number of scheduled tasks that have not finished yet.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every scheduled task has finished, up to `timeout`.
    ///
    /// Returns `false` if the timeout elapsed first. Tasks that are still
    /// running are left alone, and scheduling keeps working afterwards.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let drained = tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok();
        self.tracker.reopen();

        if drained {
            debug!("All scheduled deliveries finished");
        } else {
            warn!(
                in_flight = self.in_flight(),
                timeout_secs = timeout.as_secs(),
                "Timed out waiting for scheduled deliveries"
            );
        }
        drained
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, task: Task) {
        // Join handle dropped on purpose: deliveries are fire-and-forget
        drop(self.tracker.spawn_on(task, &self.handle));
    }
}
