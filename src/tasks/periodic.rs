//! Periodic Task
//!
//! Runs a unit of work in a loop at a fixed poll interval until its
//! cancellation signal is set or the work faults.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use tokio::runtime::Builder;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::signal::CancellationSignal;
use crate::error::{HousekeepingError, Result};
use crate::supervisor::Unit;

// == Work ==
/// A single invocation of periodic work.
///
/// Returning an error terminates the owning task; there is no retry.
#[async_trait]
pub trait Work: Send + 'static {
    async fn run(&mut self) -> Result<()>;
}

// == Task Options ==
/// Construction-time settings for a [`PeriodicTask`].
#[derive(Debug, Clone, Copy)]
pub struct TaskOptions {
    /// Delay between the end of one invocation and the next check
    pub interval: Duration,
    /// Non-daemon tasks run on their own thread and keep going after the
    /// caller's runtime shuts down
    pub daemon: bool,
}

impl TaskOptions {
    /// Daemon-class options with the given poll interval.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            daemon: true,
        }
    }

    pub fn daemon(mut self, daemon: bool) -> Self {
        self.daemon = daemon;
        self
    }
}

// == Task State ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Running,
    /// Loop observed its signal and exited normally
    Stopped,
    /// Work faulted and the loop terminated
    Crashed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Stopped | TaskState::Crashed)
    }
}

enum LoopExit {
    Stopped,
    Crashed(HousekeepingError),
}

/// Where a started loop is running.
enum Running {
    /// Async task on the caller's runtime
    Spawned(JoinHandle<LoopExit>),
    /// Dedicated thread with its own runtime; outlives the caller's runtime
    Thread {
        exit: oneshot::Receiver<LoopExit>,
        thread: Option<thread::JoinHandle<()>>,
    },
}

impl Running {
    /// Cancel-safe: both arms await through a mutable reference.
    async fn wait(&mut self) -> std::result::Result<LoopExit, String> {
        match self {
            Running::Spawned(handle) => handle.await.map_err(|e| e.to_string()),
            Running::Thread { exit, .. } => exit
                .await
                .map_err(|_| "task thread exited without reporting".to_string()),
        }
    }

    fn join_thread(&mut self) {
        if let Running::Thread { thread, .. } = self {
            if let Some(thread) = thread.take() {
                let _ = thread.join();
            }
        }
    }
}

// == Periodic Task ==
/// A named work loop bound to its own [`CancellationSignal`].
///
/// A task runs at most once. After it terminates, a new `PeriodicTask` is
/// needed for a fresh run.
///
/// Dropping a running non-daemon task blocks until its loop has exited.
pub struct PeriodicTask {
    name: String,
    options: TaskOptions,
    signal: CancellationSignal,
    work: Option<Box<dyn Work>>,
    running: Option<Running>,
    state: TaskState,
    fault: Option<HousekeepingError>,
    invocations: Arc<AtomicU64>,
}

impl PeriodicTask {
    pub fn new(
        name: impl Into<String>,
        work: impl Work,
        signal: CancellationSignal,
        options: TaskOptions,
    ) -> Self {
        Self {
            name: name.into(),
            options,
            signal,
            work: Some(Box::new(work)),
            running: None,
            state: TaskState::Created,
            fault: None,
            invocations: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn signal(&self) -> &CancellationSignal {
        &self.signal
    }

    pub fn is_daemon(&self) -> bool {
        self.options.daemon
    }

    /// Number of work invocations started so far, including a faulting one.
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::SeqCst)
    }

    /// The fault that crashed the task, once it has been joined.
    pub fn fault(&self) -> Option<&HousekeepingError> {
        self.fault.as_ref()
    }

    /// Launches the work loop without blocking the caller.
    ///
    /// Daemon tasks are spawned on the caller's runtime and are dropped when
    /// it shuts down. Non-daemon tasks get a dedicated thread running its own
    /// current-thread runtime, so they keep going after the caller's runtime
    /// is gone, until their signal is set.
    pub fn start(&mut self) -> Result<()> {
        let Some(work) = self.work.take() else {
            return Err(HousekeepingError::Lifecycle(format!(
                "task {} has already been started",
                self.name
            )));
        };

        let run = run_loop(
            self.name.clone(),
            work,
            self.options.interval,
            self.signal.clone(),
            self.invocations.clone(),
        );

        let running = if self.options.daemon {
            Running::Spawned(tokio::spawn(run))
        } else {
            let runtime = Builder::new_current_thread().enable_all().build()?;
            let (tx, exit) = oneshot::channel();
            let thread = thread::Builder::new()
                .name(self.name.clone())
                .spawn(move || {
                    let _ = tx.send(runtime.block_on(run));
                })?;
            Running::Thread {
                exit,
                thread: Some(thread),
            }
        };

        self.running = Some(running);
        self.state = TaskState::Running;
        Ok(())
    }

    /// Waits for the loop to terminate, up to `timeout` if given.
    ///
    /// Returns whether termination was observed. A timed-out join does not
    /// cancel the task, and dropping an in-flight join leaves the task
    /// joinable.
    pub async fn join(&mut self, timeout: Option<Duration>) -> bool {
        let Some(running) = self.running.as_mut() else {
            return self.state.is_terminal();
        };

        let joined = match timeout {
            Some(limit) => match tokio::time::timeout(limit, running.wait()).await {
                Ok(joined) => joined,
                Err(_) => return false,
            },
            None => running.wait().await,
        };

        if let Some(mut running) = self.running.take() {
            running.join_thread();
        }
        self.record_exit(joined);
        true
    }

    fn record_exit(&mut self, joined: std::result::Result<LoopExit, String>) {
        match joined {
            Ok(LoopExit::Stopped) => self.state = TaskState::Stopped,
            Ok(LoopExit::Crashed(fault)) => {
                self.state = TaskState::Crashed;
                self.fault = Some(fault);
            }
            Err(err) => {
                // Panic inside work, or the runtime cancelled the task
                error!(task = %self.name, error = %err, "Periodic task aborted");
                self.state = TaskState::Crashed;
                self.fault = Some(HousekeepingError::Panicked(err));
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        if let Some(running) = self.running.as_mut() {
            running.join_thread();
        }
    }
}

async fn run_loop(
    name: String,
    mut work: Box<dyn Work>,
    interval: Duration,
    signal: CancellationSignal,
    invocations: Arc<AtomicU64>,
) -> LoopExit {
    info!(
        task = %name,
        "Periodic task started with interval of {} seconds",
        interval.as_secs_f64()
    );

    loop {
        if signal.is_set() {
            info!(task = %name, "Periodic task stopped");
            return LoopExit::Stopped;
        }

        debug!(task = %name, "Initiating periodic work");
        let count = invocations.fetch_add(1, Ordering::SeqCst) + 1;

        if let Err(fault) = work.run().await {
            error!(task = %name, invocation = count, error = %fault, "Periodic task crashed");
            return LoopExit::Crashed(fault);
        }

        signal.wait(interval).await;
    }
}

#[async_trait]
impl Unit for PeriodicTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_daemon(&self) -> bool {
        self.options.daemon
    }

    fn start(&mut self) -> Result<()> {
        PeriodicTask::start(self)
    }

    fn cancel(&self) {
        if self.signal.is_set() {
            warn!(task = %self.name, "Cancellation already requested");
        }
        self.signal.set();
    }

    async fn join(&mut self, timeout: Option<Duration>) -> bool {
        PeriodicTask::join(self, timeout).await
    }
}
