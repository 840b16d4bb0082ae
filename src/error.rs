//! Error types for the housekeeping daemon
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Housekeeping Error Enum ==
/// Unified error type for the housekeeping daemon.
#[derive(Error, Debug)]
pub enum HousekeepingError {
    /// A collaborator failed during a periodic work invocation
    #[error("Work fault: {0}")]
    Work(String),

    /// An external collaborator command exited unsuccessfully
    #[error("Command failed: {0}")]
    Command(String),

    /// Configuration reload failed
    #[error("Reload fault: {0}")]
    Reload(String),

    /// Configuration is missing or invalid
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A task was driven through an illegal lifecycle transition
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    /// A work invocation panicked
    #[error("Task panicked: {0}")]
    Panicked(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

// == Result Type Alias ==
/// Convenience Result type for the housekeeping daemon.
pub type Result<T> = std::result::Result<T, HousekeepingError>;
