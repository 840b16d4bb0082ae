//! House Keeping - periodic housekeeping daemon
//!
//! Runs database cleanup and certificate rotation until interrupted.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use house_keeping::collaborators::{CommandCleanup, CommandRotation};
use house_keeping::{
    logging, Config, ConfigReloadHook, FileConfigMutator, HousekeepingSupervisor, LiveConfig,
    OsSignals,
};

/// Main entry point for the housekeeping daemon.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from file and environment variables
/// 3. Register SIGINT/SIGTERM/SIGHUP handlers
/// 4. Start the cleanup and rotation tasks
/// 5. Block until both tasks have terminated
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log = logging::init("house_keeping=info");

    let config = Config::load().context("Failed to load configuration")?;
    if let Err(e) = log.set_filter(&config.log_filter) {
        warn!("Keeping default log filter: {}", e);
    }

    info!("Starting house keeping at {}", chrono::Utc::now());

    let live = LiveConfig::new(config.clone());
    let events = OsSignals::try_new().context("Failed to install signal handlers")?;
    let reload = ConfigReloadHook::new(Arc::new(FileConfigMutator::from_env(
        live.clone(),
        Some(log),
    )));

    let cleanup = CommandCleanup::new(config.cleanup_command.clone(), live.clone());
    let rotation = CommandRotation::new(config.rotate_command.clone(), live);

    HousekeepingSupervisor::build(&config, cleanup, rotation, events)
        .with_reload_hook(reload)
        .run()
        .await
        .context("Housekeeping supervisor failed")?;

    Ok(())
}
