//! Foreground scheduling
//!
//! Dialog sessions have to be opened on a designated context, usually the UI
//! thread. A [`ForegroundScheduler`] identifies that context and accepts jobs
//! posted onto it; [`run_on_foreground`] is the "resume on the designated
//! context" primitive built on top of it. `block_on` is how a waiting
//! caller drives its own futures.

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{JoinHandle, Thread, ThreadId};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::error::SchedulerError;
use crate::types::WaitIndicatorConfig;

/// A unit of work posted to the foreground context
pub type ForegroundJob = Box<dyn FnOnce() + Send + 'static>;

/// The designated context dialog sessions are opened on
pub trait ForegroundScheduler: Send + Sync {
    /// Returns true when the calling thread already is the foreground context
    fn is_foreground(&self) -> bool;

    /// Queues a job onto the foreground context
    fn post(&self, job: ForegroundJob) -> Result<(), SchedulerError>;
}

/// Runs `f` on the foreground context and resolves with its result.
///
/// When the caller already is on the foreground context `f` runs inline, so a
/// blocking caller never waits on itself.
pub async fn run_on_foreground<F, R>(
    scheduler: &dyn ForegroundScheduler,
    f: F,
) -> Result<R, SchedulerError>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if scheduler.is_foreground() {
        return Ok(f());
    }

    let (tx, rx) = oneshot::channel();
    scheduler.post(Box::new(move || {
        let _ = tx.send(f());
    }))?;
    rx.await.map_err(|_| SchedulerError::JobDropped)
}

/// Wakes the thread parked in one [`block_on`] call
struct ThreadWaker {
    thread: Thread,
    notified: AtomicBool,
}

impl Wake for ThreadWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.notified.store(true, Ordering::Release);
        self.thread.unpark();
    }
}

/// Drives `future` to completion on the calling thread.
///
/// May be called from inside a future that is itself driven by `block_on`,
/// so an asynchronous operation can start a wait of its own.
pub(crate) fn block_on<F: Future>(future: F) -> F::Output {
    let wake = Arc::new(ThreadWaker {
        thread: std::thread::current(),
        notified: AtomicBool::new(false),
    });
    let waker = Waker::from(wake.clone());
    let mut cx = Context::from_waker(&waker);
    futures::pin_mut!(future);

    loop {
        if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
            return output;
        }
        // Nested calls park the same thread, so an unpark alone does not mean
        // this future was woken.
        while !wake.notified.swap(false, Ordering::Acquire) {
            std::thread::park();
        }
    }
}

/// Treats whichever thread calls into the executor as the foreground context
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineForeground;

impl ForegroundScheduler for InlineForeground {
    fn is_foreground(&self) -> bool {
        true
    }

    fn post(&self, job: ForegroundJob) -> Result<(), SchedulerError> {
        job();
        Ok(())
    }
}

/// A dedicated thread that runs posted jobs one after another
pub struct ForegroundThread {
    name: String,
    thread_id: ThreadId,
    sender: Option<mpsc::UnboundedSender<ForegroundJob>>,
    handle: Option<JoinHandle<()>>,
}

impl ForegroundThread {
    /// Spawns the foreground thread
    pub fn spawn(name: impl Into<String>) -> std::io::Result<Self> {
        let name = name.into();
        let (sender, mut receiver) = mpsc::unbounded_channel::<ForegroundJob>();

        let handle = std::thread::Builder::new().name(name.clone()).spawn(move || {
            while let Some(job) = receiver.blocking_recv() {
                // A panicking job must not take the foreground context down with it.
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    error!("foreground job panicked");
                }
            }
            debug!("foreground thread stopped");
        })?;

        Ok(Self {
            name,
            thread_id: handle.thread().id(),
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    /// Spawns the foreground thread named by the configuration
    pub fn from_config(config: &WaitIndicatorConfig) -> std::io::Result<Self> {
        Self::spawn(config.foreground_thread_name.clone())
    }

    /// The name of the foreground thread
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ForegroundScheduler for ForegroundThread {
    fn is_foreground(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }

    fn post(&self, job: ForegroundJob) -> Result<(), SchedulerError> {
        let sender = self.sender.as_ref().ok_or(SchedulerError::Closed)?;
        sender.send(job).map_err(|_| SchedulerError::Closed)
    }
}

impl std::fmt::Debug for ForegroundThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForegroundThread")
            .field("name", &self.name)
            .field("thread_id", &self.thread_id)
            .finish()
    }
}

impl Drop for ForegroundThread {
    fn drop(&mut self) {
        // Closing the channel ends the job loop.
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if std::thread::current().id() != self.thread_id {
                let _ = handle.join();
            }
        }
    }
}
