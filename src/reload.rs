//! Configuration reload
//!
//! A SIGHUP re-reads the configuration sources and applies the mutable
//! options to the live configuration.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{Config, LiveConfig};
use crate::error::{HousekeepingError, Result};
use crate::logging::LogHandle;

/// Re-reads mutable configuration and applies it in place.
pub trait ConfigMutator: Send + Sync {
    fn mutate_config_files(&self) -> Result<()>;
}

// == Reload Hook ==
/// On-demand configuration reload, triggered through the process event
/// channel rather than a timer.
///
/// Faults are returned to the caller unchanged.
#[derive(Clone)]
pub struct ConfigReloadHook {
    mutator: Arc<dyn ConfigMutator>,
}

impl ConfigReloadHook {
    pub fn new(mutator: Arc<dyn ConfigMutator>) -> Self {
        Self { mutator }
    }

    pub fn reload(&self) -> Result<()> {
        info!("Housekeeping received HUP signal, mutating config");
        self.mutator.mutate_config_files()
    }
}

type Loader = Box<dyn Fn() -> Result<Config> + Send + Sync>;

// == File Config Mutator ==
/// Reloads [`Config`] from its sources and swaps the mutable fields into a
/// [`LiveConfig`].
///
/// Changes to immutable fields are reported and ignored; they take effect
/// only after a restart.
pub struct FileConfigMutator {
    live: LiveConfig,
    log: Option<LogHandle>,
    loader: Loader,
}

impl FileConfigMutator {
    /// Reloads from the same file and environment the process started with.
    pub fn from_env(live: LiveConfig, log: Option<LogHandle>) -> Self {
        Self::with_loader(live, log, Config::load)
    }

    pub fn with_loader<F>(live: LiveConfig, log: Option<LogHandle>, loader: F) -> Self
    where
        F: Fn() -> Result<Config> + Send + Sync + 'static,
    {
        Self {
            live,
            log,
            loader: Box::new(loader),
        }
    }
}

impl ConfigMutator for FileConfigMutator {
    fn mutate_config_files(&self) -> Result<()> {
        let fresh = (self.loader)().map_err(|e| HousekeepingError::Reload(e.to_string()))?;
        let current = self.live.snapshot();
        let (merged, ignored) = current.with_mutable_from(&fresh);

        for field in ignored {
            warn!(field, "Option is not mutable, restart required to apply change");
        }

        if let Some(log) = &self.log {
            if merged.log_filter != current.log_filter {
                log.set_filter(&merged.log_filter)?;
            }
        }

        info!(
            amphora_expiry_age = merged.amphora_expiry_age,
            load_balancer_expiry_age = merged.load_balancer_expiry_age,
            cert_expiry_buffer = merged.cert_expiry_buffer,
            "Configuration reloaded"
        );
        self.live.store(merged);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingMutator {
        calls: AtomicUsize,
        fail: bool,
    }

    impl ConfigMutator for CountingMutator {
        fn mutate_config_files(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(HousekeepingError::Reload("bad file".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_reload_calls_mutator_once_per_invocation() {
        let mutator = Arc::new(CountingMutator::default());
        let hook = ConfigReloadHook::new(mutator.clone());

        hook.reload().unwrap();
        assert_eq!(mutator.calls.load(Ordering::SeqCst), 1);

        hook.reload().unwrap();
        assert_eq!(mutator.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reload_fault_is_surfaced() {
        let mutator = Arc::new(CountingMutator {
            fail: true,
            ..Default::default()
        });
        let hook = ConfigReloadHook::new(mutator);

        let err = hook.reload().unwrap_err();
        assert!(matches!(err, HousekeepingError::Reload(msg) if msg == "bad file"));
    }

    #[test]
    fn test_file_mutator_applies_only_mutable_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let live = LiveConfig::new(Config::default());
        let path = file.path().to_path_buf();
        let mutator = FileConfigMutator::with_loader(live.clone(), None, move || {
            let content = std::fs::read_to_string(&path)?;
            Config::from_toml_str(&content)
        });

        writeln!(file, "cleanup_interval = 1").unwrap();
        writeln!(file, "amphora_expiry_age = 3600").unwrap();
        writeln!(file, "cert_expiry_buffer = 60").unwrap();
        file.flush().unwrap();

        mutator.mutate_config_files().unwrap();

        let config = live.snapshot();
        assert_eq!(config.amphora_expiry_age, 3600);
        assert_eq!(config.cert_expiry_buffer, 60);
        assert_eq!(config.cleanup_interval, 30);
    }

    #[test]
    fn test_file_mutator_keeps_config_on_parse_error() {
        let live = LiveConfig::new(Config::default());
        let mutator = FileConfigMutator::with_loader(live.clone(), None, || {
            Config::from_toml_str("amphora_expiry_age = \"soon\"")
        });

        let err = mutator.mutate_config_files().unwrap_err();
        assert!(matches!(err, HousekeepingError::Reload(_)));
        assert_eq!(*live.snapshot(), Config::default());
    }
}
