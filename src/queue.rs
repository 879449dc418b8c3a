//! A FIFO queue that runs one task at a time.
//!
//! Many sessions run at once, but they all share one terminal. Every terminal-visible side effect
//! (a prompt, an answer, a chunk of remote output) is wrapped in a task and submitted to a single
//! [SerialQueue]. The queue runs tasks strictly in submission order and never starts a task until
//! the previous one has finished, so no two tasks' writes can interleave.
//!
//! # Lifecycle of a task
//!
//! 1. [SerialQueue::submit] appends the task to the pending list and returns a [Completion].
//! 2. When every earlier task has finished, the queue runs the task to completion.
//! 3. The task's result, or an error if it panicked, is delivered through the [Completion]. The
//!    queue then moves on to the next task, whether or not anyone is waiting on the [Completion].
//!
//! There is no timeout: a task that never finishes stalls the queue, and every task behind it.

use anyhow::anyhow;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::{mpsc, oneshot};
use tokio::task;
use tracing::trace;

type Running = Pin<Box<dyn Future<Output = ()> + Send>>;
type Job = Box<dyn FnOnce() -> Running + Send>;

/// A handle to a process-wide serial queue. Cloning the handle does not create a new queue.
///
/// Construct one at startup and hand clones to everything that writes to the terminal.
#[derive(Clone, Debug)]
pub struct SerialQueue {
    jobs: mpsc::UnboundedSender<Job>,
}

impl SerialQueue {
    /// Creates a queue and spawns the task that drains it.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn new() -> Self {
        let (jobs, pending) = mpsc::unbounded_channel();
        task::spawn(drain(pending));
        SerialQueue { jobs }
    }

    /// Appends a task to the queue.
    ///
    /// `body` is called once, when it reaches the front of the queue, and the future it returns is
    /// run to completion before the next task starts. Submission itself never blocks, so it is
    /// safe to call from synchronous code, including threads outside the runtime.
    pub fn submit<F, Fut, T>(&self, body: F) -> Completion<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (done, completion) = oneshot::channel();
        let job: Job = Box::new(move || -> Running {
            Box::pin(async move {
                // Calling `body` inside the spawned future means a panic, whether raised while
                // building the future or while polling it, surfaces as a JoinError instead of
                // killing the drain loop.
                let outcome = match task::spawn(async move { body().await }).await {
                    Ok(result) => result,
                    Err(error) => Err(anyhow!("queued task failed: {error}")),
                };

                // The submitter may have stopped caring about the outcome. That's fine.
                let _ = done.send(outcome);
            })
        });

        if self.jobs.send(job).is_err() {
            // The drain loop is gone, which only happens when the runtime is shutting down. The
            // dropped sender resolves the Completion with an error.
            trace!("queue is closed; dropping task");
        }

        Completion { receiver: completion }
    }
}

impl Default for SerialQueue {
    fn default() -> Self {
        Self::new()
    }
}

async fn drain(mut pending: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = pending.recv().await {
        trace!("running queued task");
        job().await;
    }
    trace!("all queue handles dropped; queue stopped");
}

/// Resolves once a submitted task has finished.
///
/// Dropping a [Completion] does not cancel the task.
#[derive(Debug)]
#[must_use = "a Completion reports the task's outcome; drop it explicitly to ignore the outcome"]
pub struct Completion<T> {
    receiver: oneshot::Receiver<anyhow::Result<T>>,
}

impl<T> Completion<T> {
    /// Waits for the task to finish and returns its result.
    pub async fn wait(self) -> anyhow::Result<T> {
        self.receiver
            .await
            .unwrap_or_else(|_| Err(anyhow!("queue stopped before the task ran")))
    }

    /// Blocking version of [Self::wait], for use on threads outside the async runtime, e.g.
    /// inside [tokio::task::spawn_blocking].
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn wait_blocking(self) -> anyhow::Result<T> {
        self.receiver
            .blocking_recv()
            .unwrap_or_else(|_| Err(anyhow!("queue stopped before the task ran")))
    }
}

#[cfg(test)]
mod test;
