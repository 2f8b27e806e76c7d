use super::{Scheduler, Task};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Deterministic scheduler for tests.
///
/// Scheduled tasks sit in a FIFO queue until [`ManualScheduler::run_until_idle`]
/// drives them, one at a time, on the caller's task.
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<VecDeque<Task>>,
}

impl ManualScheduler {
    /// Empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue().len()
    }

    /// Run queued tasks until the queue is empty, including tasks scheduled
    /// by the tasks being run. Returns how many tasks ran.
    pub async fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.next_task() {
            task.await;
            ran += 1;
        }
        ran
    }

    fn next_task(&self) -> Option<Task> {
        self.queue().pop_front()
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<Task>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, task: Task) {
        self.queue().push_back(task);
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}
