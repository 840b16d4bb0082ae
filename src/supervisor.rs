//! Housekeeping Supervisor
//!
//! Starts the database cleanup and certificate rotation tasks together,
//! waits for both to terminate, and turns process events into coordinated
//! cancellation or configuration reloads.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::Result;
use crate::reload::ConfigReloadHook;
use crate::signals::{EventSource, ProcessEvent};
use crate::tasks::{
    CancellationSignal, CertRotation, CertRotationWork, DatabaseCleanup, DatabaseCleanupWork,
    PeriodicTask, TaskOptions,
};

// == Unit of Execution ==
/// A startable, cancellable, joinable unit of background work.
#[async_trait]
pub trait Unit: Send {
    fn name(&self) -> &str;

    /// Daemon units never keep the process alive on their own.
    fn is_daemon(&self) -> bool;

    fn start(&mut self) -> Result<()>;

    /// Requests cooperative termination. Idempotent.
    fn cancel(&self);

    /// Waits for termination, up to `timeout` if given, and reports whether
    /// it was observed. Must be cancel-safe.
    async fn join(&mut self, timeout: Option<Duration>) -> bool;
}

enum Wait {
    Joined,
    Event(Option<ProcessEvent>),
}

// == Supervisor ==
/// Owns the cleanup and rotation units and coordinates their shutdown.
pub struct HousekeepingSupervisor<U, E> {
    /// Cleanup first, rotation second; joined in this order
    units: [U; 2],
    events: Option<E>,
    reload: Option<ConfigReloadHook>,
}

impl<E: EventSource> HousekeepingSupervisor<PeriodicTask, E> {
    /// Builds daemon-class periodic tasks around the two collaborators, each
    /// with a fresh cancellation signal.
    pub fn build<C, R>(config: &Config, cleanup: C, rotation: R, events: E) -> Self
    where
        C: DatabaseCleanup,
        R: CertRotation,
    {
        info!("DB cleanup interval is set to {} sec", config.cleanup_interval);
        info!("Amphora expiry age is {} seconds", config.amphora_expiry_age);
        info!(
            "Load balancer expiry age is {} seconds",
            config.load_balancer_expiry_age
        );
        info!(
            "Expiring certificate check interval is set to {} sec",
            config.cert_interval
        );

        let cleanup = PeriodicTask::new(
            "db_cleanup",
            DatabaseCleanupWork::new(cleanup),
            CancellationSignal::new(),
            TaskOptions::every(config.cleanup_poll_interval()),
        );
        let rotation = PeriodicTask::new(
            "cert_rotation",
            CertRotationWork::new(rotation),
            CancellationSignal::new(),
            TaskOptions::every(config.cert_poll_interval()),
        );

        Self::new(cleanup, rotation, events)
    }
}

impl<U: Unit, E: EventSource> HousekeepingSupervisor<U, E> {
    pub fn new(cleanup: U, rotation: U, events: E) -> Self {
        Self {
            units: [cleanup, rotation],
            events: Some(events),
            reload: None,
        }
    }

    pub fn with_reload_hook(mut self, hook: ConfigReloadHook) -> Self {
        self.reload = Some(hook);
        self
    }

    pub fn cleanup(&self) -> &U {
        &self.units[0]
    }

    pub fn rotation(&self) -> &U {
        &self.units[1]
    }

    /// Starts both units and returns once both have terminated.
    ///
    /// An interrupt received while waiting on either unit cancels both, then
    /// the wait resumes. A unit that crashes is not restarted and does not
    /// affect the other.
    pub async fn run(mut self) -> Result<()> {
        for index in 0..self.units.len() {
            if let Err(err) = self.units[index].start() {
                error!(task = self.units[index].name(), error = %err, "Failed to start task");
                for unit in &self.units {
                    unit.cancel();
                }
                return Err(err);
            }
            info!(
                task = self.units[index].name(),
                daemon = self.units[index].is_daemon(),
                "Housekeeping task started"
            );
        }

        let mut stopping = false;
        for index in 0..self.units.len() {
            loop {
                let waited = {
                    let unit = &mut self.units[index];
                    match self.events.as_mut() {
                        Some(events) => tokio::select! {
                            biased;
                            _ = unit.join(None) => Wait::Joined,
                            event = events.next_event() => Wait::Event(event),
                        },
                        None => {
                            unit.join(None).await;
                            Wait::Joined
                        }
                    }
                };

                match waited {
                    Wait::Joined => {
                        debug!(task = self.units[index].name(), "Housekeeping task joined");
                        break;
                    }
                    Wait::Event(Some(ProcessEvent::Interrupt)) => {
                        self.request_stop(stopping);
                        stopping = true;
                    }
                    Wait::Event(Some(ProcessEvent::Reload)) => self.reload().await,
                    Wait::Event(None) => {
                        debug!("Event source exhausted, waiting on tasks only");
                        self.events = None;
                    }
                }
            }
        }

        info!("House-Keeping process terminated");
        Ok(())
    }

    fn request_stop(&self, already_stopping: bool) {
        if already_stopping {
            info!("Shutdown already in progress, signalling tasks again");
        } else {
            info!("Attempting to gracefully terminate House-Keeping");
        }
        for unit in &self.units {
            unit.cancel();
        }
    }

    /// Runs the reload hook on the blocking pool; it reads files.
    async fn reload(&self) {
        let Some(hook) = self.reload.clone() else {
            debug!("No reload hook installed, ignoring reload request");
            return;
        };

        match tokio::task::spawn_blocking(move || hook.reload()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(
                error = %err,
                "Configuration reload failed, keeping previous configuration"
            ),
            Err(err) => error!(error = %err, "Configuration reload aborted"),
        }
    }
}
