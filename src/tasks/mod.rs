//! Single-active background task queue.
//!
//! Each pipeline stage (analysis, training, prediction) gets its own
//! [`TaskQueue`]. A queue runs at most one task at a time on a named OS
//! thread; submitting while a task is active fails with
//! [`FaultsenseError::Busy`] instead of queueing.
//!
//! ```
//! use faultsense::tasks::TaskQueue;
//!
//! let queue = TaskQueue::new("mining");
//! let handle = queue.submit(|| Ok(21 * 2)).unwrap();
//! assert_eq!(handle.wait().unwrap(), 42);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;

use tracing::debug;

use crate::error::{FaultsenseError, Result};

/// Flips its flag when dropped, so a panicking task still releases it.
struct FlagGuard {
    flag: Arc<AtomicBool>,
    on_drop: bool,
}

impl Drop for FlagGuard {
    fn drop(&mut self) {
        self.flag.store(self.on_drop, Ordering::SeqCst);
    }
}

/// Queue admitting one active task.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    name: String,
    active: Arc<AtomicBool>,
}

impl TaskQueue {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a task is running.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Run `task` on a new thread.
    ///
    /// # Errors
    ///
    /// Returns [`FaultsenseError::Busy`] if a task is already active, or
    /// an I/O error if the thread cannot be spawned.
    pub fn submit<T, F>(&self, task: F) -> Result<TaskHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(FaultsenseError::Busy {
                queue: self.name.clone(),
            });
        }
        let active = FlagGuard {
            flag: Arc::clone(&self.active),
            on_drop: false,
        };
        let finished = Arc::new(AtomicBool::new(false));
        let done = FlagGuard {
            flag: Arc::clone(&finished),
            on_drop: true,
        };
        let (tx, rx) = mpsc::sync_channel(1);

        // if spawning fails the closure is dropped and both guards with it
        thread::Builder::new()
            .name(format!("faultsense-{}", self.name))
            .spawn(move || {
                let _active = active;
                let _done = done;
                // the handle may already be gone
                let _ = tx.send(task());
            })?;
        debug!(queue = %self.name, "task started");
        Ok(TaskHandle {
            queue: self.name.clone(),
            rx,
            finished,
        })
    }
}

/// Handle to a submitted task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    queue: String,
    rx: Receiver<Result<T>>,
    finished: Arc<AtomicBool>,
}

impl<T> TaskHandle<T> {
    /// Block until the task finishes.
    ///
    /// # Errors
    ///
    /// Returns the task's own error, or [`FaultsenseError::TaskFailed`] if
    /// it panicked.
    pub fn wait(self) -> Result<T> {
        self.rx.recv().map_err(|_| FaultsenseError::TaskFailed {
            message: format!("task on queue '{}' panicked", self.queue),
        })?
    }

    /// Non-blocking poll. `true` once the task has returned or panicked.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}
