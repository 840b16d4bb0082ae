//! House Keeping - periodic housekeeping daemon
//!
//! Runs stale-resource database cleanup and certificate rotation as two
//! independent periodic tasks with cooperative cancellation, graceful
//! shutdown on interrupt, and configuration reload on hangup.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod logging;
pub mod reload;
pub mod signals;
pub mod supervisor;
pub mod tasks;

pub use config::{Config, LiveConfig};
pub use error::{HousekeepingError, Result};
pub use reload::{ConfigMutator, ConfigReloadHook, FileConfigMutator};
pub use signals::{EventSource, OsSignals, ProcessEvent};
pub use supervisor::{HousekeepingSupervisor, Unit};
