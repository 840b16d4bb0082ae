//! Command-backed collaborators
//!
//! Binds the cleanup and rotation operations to operator-supplied shell
//! commands. Each invocation runs the command once with the action name and
//! the current mutable options in its environment:
//!
//! - `HK_ACTION` - `delete_old_amphorae`, `cleanup_load_balancers` or `rotate`
//! - `HK_EXPIRY_AGE` - expiry age in seconds for the cleanup actions
//! - `HK_CERT_EXPIRY_BUFFER` - rotation buffer in seconds for `rotate`
//!
//! A non-zero exit status is a work fault.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::LiveConfig;
use crate::error::{HousekeepingError, Result};
use crate::tasks::{CertRotation, DatabaseCleanup};

pub struct CommandCleanup {
    command: Option<String>,
    live: LiveConfig,
}

impl CommandCleanup {
    pub fn new(command: Option<String>, live: LiveConfig) -> Self {
        Self { command, live }
    }
}

#[async_trait]
impl DatabaseCleanup for CommandCleanup {
    async fn delete_old_amphorae(&mut self) -> Result<()> {
        let age = self.live.snapshot().amphora_expiry_age;
        run_action(
            self.command.as_deref(),
            "delete_old_amphorae",
            &[("HK_EXPIRY_AGE", age)],
        )
        .await
    }

    async fn cleanup_load_balancers(&mut self) -> Result<()> {
        let age = self.live.snapshot().load_balancer_expiry_age;
        run_action(
            self.command.as_deref(),
            "cleanup_load_balancers",
            &[("HK_EXPIRY_AGE", age)],
        )
        .await
    }
}

pub struct CommandRotation {
    command: Option<String>,
    live: LiveConfig,
}

impl CommandRotation {
    pub fn new(command: Option<String>, live: LiveConfig) -> Self {
        Self { command, live }
    }
}

#[async_trait]
impl CertRotation for CommandRotation {
    async fn rotate(&mut self) -> Result<()> {
        let buffer = self.live.snapshot().cert_expiry_buffer;
        run_action(
            self.command.as_deref(),
            "rotate",
            &[("HK_CERT_EXPIRY_BUFFER", buffer)],
        )
        .await
    }
}

async fn run_action(command: Option<&str>, action: &str, vars: &[(&str, u64)]) -> Result<()> {
    let Some(command) = command else {
        debug!(action, "No command configured, skipping");
        return Ok(());
    };

    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .env("HK_ACTION", action)
        .kill_on_drop(true);
    for (key, value) in vars {
        cmd.env(key, value.to_string());
    }

    let output = cmd.output().await?;
    if output.status.success() {
        debug!(action, "Collaborator command succeeded");
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(HousekeepingError::Command(format!(
        "{action} exited with {}: {}",
        output.status,
        stderr.trim()
    )))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::Config;

    fn live() -> LiveConfig {
        LiveConfig::new(Config {
            amphora_expiry_age: 11,
            load_balancer_expiry_age: 22,
            cert_expiry_buffer: 33,
            ..Config::default()
        })
    }

    #[tokio::test]
    async fn test_missing_command_is_a_no_op() {
        let mut rotation = CommandRotation::new(None, live());
        rotation.rotate().await.unwrap();
    }

    #[tokio::test]
    async fn test_action_and_options_are_exported() {
        let script = r#"case "$HK_ACTION" in
            delete_old_amphorae) test "$HK_EXPIRY_AGE" = 11 ;;
            cleanup_load_balancers) test "$HK_EXPIRY_AGE" = 22 ;;
            rotate) test "$HK_CERT_EXPIRY_BUFFER" = 33 ;;
            *) exit 9 ;;
        esac"#;

        let mut cleanup = CommandCleanup::new(Some(script.to_string()), live());
        cleanup.delete_old_amphorae().await.unwrap();
        cleanup.cleanup_load_balancers().await.unwrap();

        let mut rotation = CommandRotation::new(Some(script.to_string()), live());
        rotation.rotate().await.unwrap();
    }

    #[tokio::test]
    async fn test_reloaded_options_apply_to_next_invocation() {
        let live = live();
        let mut rotation = CommandRotation::new(
            Some(r#"test "$HK_CERT_EXPIRY_BUFFER" = 44"#.to_string()),
            live.clone(),
        );
        assert!(rotation.rotate().await.is_err());

        live.store(Config {
            cert_expiry_buffer: 44,
            ..Config::default()
        });
        rotation.rotate().await.unwrap();
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_command_error() {
        let mut cleanup = CommandCleanup::new(Some("echo boom >&2; exit 3".to_string()), live());
        let err = cleanup.delete_old_amphorae().await.unwrap_err();
        match err {
            HousekeepingError::Command(msg) => {
                assert!(msg.starts_with("delete_old_amphorae"));
                assert!(msg.contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
