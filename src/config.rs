//! Configuration Module
//!
//! Handles loading and managing daemon configuration. Values are layered:
//! built-in defaults, then an optional TOML file, then environment variables.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::Deserialize;
use tracing::warn;

use crate::error::{HousekeepingError, Result};

// == Environment Variables ==
pub const CONFIG_FILE_VAR: &str = "HK_CONFIG_FILE";
const CLEANUP_INTERVAL_VAR: &str = "HK_CLEANUP_INTERVAL";
const CERT_INTERVAL_VAR: &str = "HK_CERT_INTERVAL";
const AMPHORA_EXPIRY_AGE_VAR: &str = "HK_AMPHORA_EXPIRY_AGE";
const LOAD_BALANCER_EXPIRY_AGE_VAR: &str = "HK_LOAD_BALANCER_EXPIRY_AGE";
const CERT_EXPIRY_BUFFER_VAR: &str = "HK_CERT_EXPIRY_BUFFER";
const LOG_FILTER_VAR: &str = "HK_LOG";
const CLEANUP_COMMAND_VAR: &str = "HK_CLEANUP_COMMAND";
const ROTATE_COMMAND_VAR: &str = "HK_ROTATE_COMMAND";

/// Housekeeping configuration parameters.
///
/// Fields marked mutable are picked up by a live reload (SIGHUP); the rest
/// require a restart.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Seconds between database cleanup runs
    pub cleanup_interval: u64,
    /// Seconds between certificate expiry checks
    pub cert_interval: u64,
    /// Age in seconds after which a spare amphora record is purged (mutable)
    pub amphora_expiry_age: u64,
    /// Age in seconds after which a deleted load balancer record is purged (mutable)
    pub load_balancer_expiry_age: u64,
    /// Seconds before expiry at which a certificate is rotated (mutable)
    pub cert_expiry_buffer: u64,
    /// `tracing` filter directive (mutable)
    pub log_filter: String,
    /// Shell command backing the database cleanup collaborator
    pub cleanup_command: Option<String>,
    /// Shell command backing the certificate rotation collaborator
    pub rotate_command: Option<String>,
    /// File this configuration was read from, if any
    #[serde(skip)]
    pub config_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cleanup_interval: 30,
            cert_interval: 3600,
            amphora_expiry_age: 604_800,
            load_balancer_expiry_age: 604_800,
            cert_expiry_buffer: 1_209_600,
            log_filter: "house_keeping=info".to_string(),
            cleanup_command: None,
            rotate_command: None,
            config_file: None,
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// # Environment Variables
    /// - `HK_CONFIG_FILE` - Optional TOML file read before the overrides below
    /// - `HK_CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 30)
    /// - `HK_CERT_INTERVAL` - Certificate check frequency in seconds (default: 3600)
    /// - `HK_AMPHORA_EXPIRY_AGE` - Amphora expiry age in seconds (default: 604800)
    /// - `HK_LOAD_BALANCER_EXPIRY_AGE` - Load balancer expiry age in seconds (default: 604800)
    /// - `HK_CERT_EXPIRY_BUFFER` - Rotation buffer in seconds (default: 1209600)
    /// - `HK_LOG` - Log filter directive (default: `house_keeping=info`)
    /// - `HK_CLEANUP_COMMAND` / `HK_ROTATE_COMMAND` - Collaborator commands
    pub fn load() -> Result<Self> {
        Self::load_with(|key| env::var(key).ok())
    }

    /// Loads configuration using `lookup` in place of the process environment.
    pub fn load_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_file = lookup(CONFIG_FILE_VAR)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let mut config = match &config_file {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|e| {
                    HousekeepingError::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::from_toml_str(&content)?
            }
            None => Self::default(),
        };
        config.config_file = config_file;
        config.apply_overrides(&lookup);
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML document; missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_overrides<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        override_number(lookup, CLEANUP_INTERVAL_VAR, &mut self.cleanup_interval);
        override_number(lookup, CERT_INTERVAL_VAR, &mut self.cert_interval);
        override_number(lookup, AMPHORA_EXPIRY_AGE_VAR, &mut self.amphora_expiry_age);
        override_number(
            lookup,
            LOAD_BALANCER_EXPIRY_AGE_VAR,
            &mut self.load_balancer_expiry_age,
        );
        override_number(lookup, CERT_EXPIRY_BUFFER_VAR, &mut self.cert_expiry_buffer);

        if let Some(filter) = lookup(LOG_FILTER_VAR) {
            self.log_filter = filter;
        }
        if let Some(command) = lookup(CLEANUP_COMMAND_VAR) {
            self.cleanup_command = Some(command);
        }
        if let Some(command) = lookup(ROTATE_COMMAND_VAR) {
            self.rotate_command = Some(command);
        }
    }

    /// Checks that both poll intervals are positive.
    pub fn validate(&self) -> Result<()> {
        if self.cleanup_interval == 0 {
            return Err(HousekeepingError::Config(
                "cleanup_interval must be positive".to_string(),
            ));
        }
        if self.cert_interval == 0 {
            return Err(HousekeepingError::Config(
                "cert_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn cleanup_poll_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval)
    }

    pub fn cert_poll_interval(&self) -> Duration {
        Duration::from_secs(self.cert_interval)
    }

    /// Returns `self` with the mutable fields taken from `fresh`, together
    /// with the names of immutable fields whose change was ignored.
    pub fn with_mutable_from(&self, fresh: &Config) -> (Config, Vec<&'static str>) {
        let mut merged = self.clone();
        merged.amphora_expiry_age = fresh.amphora_expiry_age;
        merged.load_balancer_expiry_age = fresh.load_balancer_expiry_age;
        merged.cert_expiry_buffer = fresh.cert_expiry_buffer;
        merged.log_filter = fresh.log_filter.clone();

        let mut ignored = Vec::new();
        if self.cleanup_interval != fresh.cleanup_interval {
            ignored.push("cleanup_interval");
        }
        if self.cert_interval != fresh.cert_interval {
            ignored.push("cert_interval");
        }
        if self.cleanup_command != fresh.cleanup_command {
            ignored.push("cleanup_command");
        }
        if self.rotate_command != fresh.rotate_command {
            ignored.push("rotate_command");
        }
        (merged, ignored)
    }
}

fn override_number<F>(lookup: &F, key: &str, target: &mut u64)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(value) => *target = value,
            Err(_) => warn!(key, value = %raw, "Ignoring non-numeric override"),
        }
    }
}

// == Live Configuration ==
/// Shared, atomically swappable view of the current configuration.
///
/// Collaborators take a snapshot per invocation, so a reload takes effect on
/// the next iteration without locking.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    inner: Arc<ArcSwap<Config>>,
}

impl LiveConfig {
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    pub fn snapshot(&self) -> Arc<Config> {
        self.inner.load_full()
    }

    pub fn store(&self, config: Config) {
        self.inner.store(Arc::new(config));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.cleanup_interval, 30);
        assert_eq!(config.cert_interval, 3600);
        assert_eq!(config.amphora_expiry_age, 604_800);
        assert_eq!(config.load_balancer_expiry_age, 604_800);
        assert_eq!(config.cert_expiry_buffer, 1_209_600);
        assert!(config.cleanup_command.is_none());
    }

    #[test]
    fn test_load_without_sources_gives_defaults() {
        let config = Config::load_with(|_| None).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::load_with(lookup_from(&[
            ("HK_CLEANUP_INTERVAL", "5"),
            ("HK_CERT_INTERVAL", "60"),
            ("HK_ROTATE_COMMAND", "/usr/bin/rotate"),
        ]))
        .unwrap();
        assert_eq!(config.cleanup_interval, 5);
        assert_eq!(config.cert_interval, 60);
        assert_eq!(config.rotate_command.as_deref(), Some("/usr/bin/rotate"));
    }

    #[test]
    fn test_non_numeric_override_is_ignored() {
        let config = Config::load_with(lookup_from(&[("HK_CLEANUP_INTERVAL", "soon")])).unwrap();
        assert_eq!(config.cleanup_interval, 30);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = Config::load_with(lookup_from(&[("HK_CERT_INTERVAL", "0")]));
        assert!(matches!(result, Err(HousekeepingError::Config(_))));
    }

    #[test]
    fn test_toml_partial_document() {
        let config = Config::from_toml_str("amphora_expiry_age = 10\n").unwrap();
        assert_eq!(config.amphora_expiry_age, 10);
        assert_eq!(config.cleanup_interval, 30);
    }

    #[test]
    fn test_toml_unknown_key_rejected() {
        assert!(Config::from_toml_str("clean_interval = 10\n").is_err());
    }

    #[test]
    fn test_file_then_env_layering() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let body = b"cleanup_interval = 7\ncert_interval = 70\n";
        std::io::Write::write_all(&mut file, body).unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config = Config::load_with(lookup_from(&[
            ("HK_CONFIG_FILE", path.as_str()),
            ("HK_CERT_INTERVAL", "700"),
        ]))
        .unwrap();
        assert_eq!(config.cleanup_interval, 7);
        assert_eq!(config.cert_interval, 700);
        assert_eq!(config.config_file.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = Config::load_with(lookup_from(&[("HK_CONFIG_FILE", "/nonexistent/hk.toml")]));
        assert!(matches!(result, Err(HousekeepingError::Config(_))));
    }

    #[test]
    fn test_with_mutable_from_keeps_immutable_fields() {
        let current = Config::default();
        let fresh = Config {
            cleanup_interval: 1,
            amphora_expiry_age: 42,
            log_filter: "house_keeping=debug".to_string(),
            ..Config::default()
        };

        let (merged, ignored) = current.with_mutable_from(&fresh);
        assert_eq!(merged.cleanup_interval, 30);
        assert_eq!(merged.amphora_expiry_age, 42);
        assert_eq!(merged.log_filter, "house_keeping=debug");
        assert_eq!(ignored, vec!["cleanup_interval"]);
    }

    #[test]
    fn test_live_config_swap() {
        let live = LiveConfig::new(Config::default());
        let before = live.snapshot();
        live.store(Config {
            cert_expiry_buffer: 1,
            ..Config::default()
        });
        assert_eq!(before.cert_expiry_buffer, 1_209_600);
        assert_eq!(live.snapshot().cert_expiry_buffer, 1);
    }
}
