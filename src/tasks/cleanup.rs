//! Database Cleanup Task
//!
//! Binds the database cleanup collaborator to a periodic work invocation.

use async_trait::async_trait;

use super::periodic::Work;
use crate::error::Result;

/// Purges stale records from the housekeeping database.
#[async_trait]
pub trait DatabaseCleanup: Send + 'static {
    /// Removes spare amphorae older than the configured expiry age.
    async fn delete_old_amphorae(&mut self) -> Result<()>;

    /// Removes deleted load balancers older than the configured expiry age.
    async fn cleanup_load_balancers(&mut self) -> Result<()> {
        Ok(())
    }
}

/// One cleanup pass: amphorae first, then load balancers.
///
/// A fault in the amphora purge skips the load balancer purge for that pass.
pub struct DatabaseCleanupWork<C> {
    cleanup: C,
}

impl<C: DatabaseCleanup> DatabaseCleanupWork<C> {
    pub fn new(cleanup: C) -> Self {
        Self { cleanup }
    }
}

#[async_trait]
impl<C: DatabaseCleanup> Work for DatabaseCleanupWork<C> {
    async fn run(&mut self) -> Result<()> {
        self.cleanup.delete_old_amphorae().await?;
        self.cleanup.cleanup_load_balancers().await
    }
}
