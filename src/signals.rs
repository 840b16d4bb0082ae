//! Signal handling for shutdown and configuration reload.
//!
//! SIGINT and SIGTERM request a graceful shutdown; SIGHUP requests a
//! configuration reload and never stops the daemon.

use async_trait::async_trait;
#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::info;

/// External request delivered to a blocked supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessEvent {
    /// Stop both tasks and exit once they have terminated
    Interrupt,
    /// Re-read mutable configuration
    Reload,
}

/// Source of [`ProcessEvent`]s.
///
/// `next_event` must be cancel-safe: the supervisor races it against task
/// joins and drops it whenever a join finishes first.
#[async_trait]
pub trait EventSource: Send {
    /// Next event, or `None` once the source is exhausted.
    async fn next_event(&mut self) -> Option<ProcessEvent>;
}

/// Operating system signals as process events.
#[cfg(unix)]
pub struct OsSignals {
    interrupt: Signal,
    terminate: Signal,
    hangup: Signal,
}

#[cfg(unix)]
impl OsSignals {
    /// Registers the signal handlers.
    ///
    /// # Errors
    ///
    /// Returns an [`std::io::Error`] if signal registration fails.
    pub fn try_new() -> std::io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }
}

#[cfg(unix)]
#[async_trait]
impl EventSource for OsSignals {
    async fn next_event(&mut self) -> Option<ProcessEvent> {
        tokio::select! {
            Some(()) = self.interrupt.recv() => {
                info!("Received SIGINT");
                Some(ProcessEvent::Interrupt)
            }
            Some(()) = self.terminate.recv() => {
                info!("Received SIGTERM");
                Some(ProcessEvent::Interrupt)
            }
            Some(()) = self.hangup.recv() => {
                info!("Received SIGHUP");
                Some(ProcessEvent::Reload)
            }
            else => None,
        }
    }
}

/// Ctrl+C as the only process event on platforms without unix signals.
#[cfg(not(unix))]
pub struct OsSignals;

#[cfg(not(unix))]
impl OsSignals {
    pub fn try_new() -> std::io::Result<Self> {
        Ok(Self)
    }
}

#[cfg(not(unix))]
#[async_trait]
impl EventSource for OsSignals {
    async fn next_event(&mut self) -> Option<ProcessEvent> {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C");
                Some(ProcessEvent::Interrupt)
            }
            Err(_) => None,
        }
    }
}
