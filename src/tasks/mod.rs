//! Background Tasks Module
//!
//! Periodic work loops and the collaborators they drive.
//!
//! # Tasks
//! - Database cleanup: purges stale amphora and load balancer records
//! - Certificate rotation: renews certificates close to expiry

mod cleanup;
mod periodic;
mod rotation;
mod signal;


pub use cleanup::{DatabaseCleanup, DatabaseCleanupWork};
pub use periodic::{PeriodicTask, TaskOptions, TaskState, Work};
pub use rotation::{CertRotation, CertRotationWork};
pub use signal::CancellationSignal;
