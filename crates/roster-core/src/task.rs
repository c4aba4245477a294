use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use tokio::{runtime::Handle, sync::mpsc, task::JoinHandle};
use tracing::{trace, warn};

use crate::error::RosterError;

/// Unit of work delivered to an execution context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Where completion callbacks run.
pub trait ExecutionContext: Send + Sync {
    fn execute(&self, job: Job);
}

/// Runs jobs immediately on whichever thread completes the work.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineContext;

impl ExecutionContext for InlineContext {
    fn execute(&self, job: Job) {
        job();
    }
}

/// Queues jobs for a consumer thread that drains them with [`ContextQueue`].
///
/// This models a presentation thread: background work completes anywhere,
/// but its callbacks only run when the owning thread asks for them.
#[derive(Debug, Clone)]
pub struct ChannelContext {
    job_tx: mpsc::UnboundedSender<Job>,
}

/// Receiving half of a [`ChannelContext`], owned by the consumer thread.
#[derive(Debug)]
pub struct ContextQueue {
    job_rx: mpsc::UnboundedReceiver<Job>,
}

impl ChannelContext {
    pub fn new() -> (Self, ContextQueue) {
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        (Self { job_tx }, ContextQueue { job_rx })
    }
}

impl ExecutionContext for ChannelContext {
    fn execute(&self, job: Job) {
        if self.job_tx.send(job).is_err() {
            warn!("execution context queue closed; dropping job");
        }
    }
}

impl ContextQueue {
    /// Run every job queued so far without waiting. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.job_rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Wait for the next job and run it. Returns `false` once every sender is gone.
    pub async fn run_next(&mut self) -> bool {
        match self.job_rx.recv().await {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }
}

/// Future resolving to the result of work submitted to a [`TaskRunner`].
#[derive(Debug)]
pub struct TaskHandle<T> {
    inner: JoinHandle<T>,
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, RosterError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner)
            .poll(cx)
            .map(|result| result.map_err(|err| RosterError::task_failed(err.to_string())))
    }
}

/// Offloads CPU-bound work to the runtime's blocking pool.
#[derive(Debug, Clone)]
pub struct TaskRunner {
    runtime: Handle,
}

impl TaskRunner {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Runner bound to the runtime of the calling task.
    ///
    /// Panics outside a tokio runtime, like [`Handle::current`].
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Submit `work` and get a future for its result.
    pub fn submit<F, T>(&self, work: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        TaskHandle {
            inner: self.runtime.spawn_blocking(work),
        }
    }

    /// Submit `work` and deliver its result to `callback` on `context`.
    pub fn submit_then<F, T, C>(&self, work: F, context: Arc<dyn ExecutionContext>, callback: C)
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
        C: FnOnce(Result<T, RosterError>) + Send + 'static,
    {
        let handle = self.submit(work);
        self.runtime.spawn(async move {
            let result = handle.await;
            trace!(ok = result.is_ok(), "background task finished");
            context.execute(Box::new(move || callback(result)));
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[tokio::test]
    async fn submit_resolves_with_result() {
        let runner = TaskRunner::current();
        let value = runner.submit(|| 6 * 7).await.expect("task should finish");
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn panicking_work_maps_to_task_error() {
        let runner = TaskRunner::current();
        let err = runner
            .submit(|| -> u32 { panic!("boom") })
            .await
            .expect_err("panic should surface as error");
        assert_eq!(err.code, "task_failed");
    }

    #[tokio::test]
    async fn callbacks_wait_for_consumer_queue() {
        let runner = TaskRunner::current();
        let (context, mut queue) = ChannelContext::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        runner.submit_then(
            || "done",
            Arc::new(context),
            move |result| sink.lock().expect("sink lock").push(result),
        );

        assert!(queue.run_next().await);
        let seen = seen.lock().expect("sink lock");
        assert!(matches!(seen.as_slice(), [Ok("done")]));
    }

    #[test]
    fn inline_context_runs_immediately() {
        let flag = Arc::new(Mutex::new(false));
        let sink = Arc::clone(&flag);
        InlineContext.execute(Box::new(move || *sink.lock().expect("flag lock") = true));
        assert!(*flag.lock().expect("flag lock"));
    }

    #[test]
    fn run_pending_drains_without_blocking() {
        let (context, mut queue) = ChannelContext::new();
        assert_eq!(queue.run_pending(), 0);
        context.execute(Box::new(|| {}));
        context.execute(Box::new(|| {}));
        assert_eq!(queue.run_pending(), 2);
    }
}
