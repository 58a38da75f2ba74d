//! Periodic one-way directory mirroring
//!
//! This crate provides:
//! - Plan execution against the replica (deletions, then creations)
//! - An independent convergence check
//! - Cooperative cancellation
//! - Configuration loading and validation
//! - The polling reconciliation loop tying it all together

pub mod cancel;
pub mod config;
pub mod executor;
pub mod reconcile;
pub mod verify;

pub use cancel::CancelToken;
pub use config::{FileConfig, SyncConfig};
pub use executor::{execute, ExecutionReport, MutationFailure, MutationKind};
pub use reconcile::{IterationReport, Reconciler, SyncState};
pub use verify::converged;
