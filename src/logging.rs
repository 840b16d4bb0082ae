//! Logging setup
//!
//! Installs the global `tracing` subscriber with a reloadable filter so a
//! configuration reload can change verbosity without a restart.

use std::env;

use tracing::debug;
use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

use crate::error::{HousekeepingError, Result};

/// Handle to the live log filter.
#[derive(Clone)]
pub struct LogHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    /// `RUST_LOG` was set at startup and takes precedence over configuration
    pinned: bool,
}

/// Initializes the tracing subscriber.
///
/// Defaults to `default_filter`, can be overridden with the RUST_LOG env var.
pub fn init(default_filter: &str) -> LogHandle {
    let pinned = env::var("RUST_LOG").is_ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    LogHandle { handle, pinned }
}

impl LogHandle {
    /// Replaces the active filter with `directive`.
    ///
    /// No-op while RUST_LOG pins the filter.
    pub fn set_filter(&self, directive: &str) -> Result<()> {
        if self.pinned {
            debug!("RUST_LOG is set, keeping current log filter");
            return Ok(());
        }

        let filter = EnvFilter::try_new(directive).map_err(|e| {
            HousekeepingError::Reload(format!("invalid log filter {directive:?}: {e}"))
        })?;
        self.handle
            .reload(filter)
            .map_err(|e| HousekeepingError::Reload(e.to_string()))
    }
}
