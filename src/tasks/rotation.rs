//! Certificate Rotation Task

use async_trait::async_trait;

use super::periodic::Work;
use crate::error::Result;

/// Rotates certificates that are close to expiry.
#[async_trait]
pub trait CertRotation: Send + 'static {
    async fn rotate(&mut self) -> Result<()>;
}

pub struct CertRotationWork<R> {
    rotation: R,
}

impl<R: CertRotation> CertRotationWork<R> {
    pub fn new(rotation: R) -> Self {
        Self { rotation }
    }
}

#[async_trait]
impl<R: CertRotation> Work for CertRotationWork<R> {
    async fn run(&mut self) -> Result<()> {
        self.rotation.rotate().await
    }
}
