//! A FIFO queue running one task at a time.
//!
//! The tooling keeps one queue per schema so that work on a schema (building
//! its validator, validating, completing) never interleaves, while queues
//! for different schemas run independently.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{Result, ToolingError};

type Job = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Job>,
    running: bool,
}

/// Serializes tasks: the next task starts only after the current one
/// finished.
///
/// Requires a tokio runtime; the worker draining the queue is spawned on
/// first use and exits when the queue is empty.
#[derive(Clone)]
pub struct PromiseQueue {
    name: Arc<str>,
    state: Arc<Mutex<QueueState>>,
}

impl std::fmt::Debug for PromiseQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromiseQueue")
            .field("name", &self.name)
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

impl PromiseQueue {
    pub fn new(name: impl Into<String>) -> Self {
        PromiseQueue {
            name: Arc::from(name.into()),
            state: Arc::new(Mutex::new(QueueState::default())),
        }
    }

    /// Number of tasks waiting to start.
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Queue `task` and wait for its output.
    ///
    /// With `clear_pending`, every task that has not started yet is dropped
    /// first; their callers get [`ToolingError::Cancelled`]. A task that is
    /// already running is never interrupted.
    pub async fn enqueue<F, Fut, T>(&self, task: F, clear_pending: bool) -> Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let job: Job = Box::new(move || {
            Box::pin(async move {
                // the caller may have gone away; nothing to deliver then
                let _ = sender.send(task().await);
            })
        });

        let start_worker = {
            let mut state = self.lock();
            if clear_pending && !state.pending.is_empty() {
                debug!(queue = %self.name, dropped = state.pending.len(), "clearing pending tasks");
                state.pending.clear();
            }
            state.pending.push_back(job);
            !std::mem::replace(&mut state.running, true)
        };
        if start_worker {
            tokio::spawn(drain(self.name.clone(), self.state.clone()));
        }

        receiver.await.map_err(|_| ToolingError::Cancelled)
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        lock_state(&self.state)
    }
}

fn lock_state(state: &Mutex<QueueState>) -> MutexGuard<'_, QueueState> {
    // the state is only touched in short critical sections that cannot
    // leave it inconsistent
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn drain(name: Arc<str>, state: Arc<Mutex<QueueState>>) {
    loop {
        let job = {
            let mut state = lock_state(&state);
            match state.pending.pop_front() {
                Some(job) => job,
                None => {
                    state.running = false;
                    return;
                }
            }
        };
        // a panicking task must not stall the queue
        if let Err(err) = tokio::spawn(job()).await {
            warn!(queue = %name, %err, "queued task failed");
        }
    }
}
