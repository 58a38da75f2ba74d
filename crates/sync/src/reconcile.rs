//! Periodic origin → replica reconciliation loop
//!
//! Each iteration plans, executes, and verifies. A failed verification gets
//! exactly one re-plan/re-execute pass before the loop goes back to sleep,
//! so persistent divergence can never turn into a tight retry loop.

use crate::cancel::CancelToken;
use crate::config::{check_origin, SyncConfig};
use crate::executor::{execute, ExecutionReport};
use crate::verify;
use mirror_core::{plan, DigestCache, DirectHasher, Result, Snapshot, SyncPlan};
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Where the loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Planning,
    Executing,
    Checking,
    Reconciling,
    Sleeping,
    Stopped,
}

/// What one iteration did
#[derive(Debug)]
pub struct IterationReport {
    /// Mutations in the first plan
    pub planned: usize,
    /// Result of applying the first plan
    pub execution: ExecutionReport,
    /// Result of the reconciliation pass, if the first check failed
    pub resync: Option<ExecutionReport>,
    /// Whether the trees matched at the end of the iteration
    pub converged: bool,
}

/// Keeps a replica in step with its origin
pub struct Reconciler {
    config: SyncConfig,

    /// Digest cache shared across iterations (when enabled)
    cache: Option<DigestCache>,

    state: SyncState,

    /// Consecutive iterations that ended divergent
    divergent_streak: u32,
}

impl Reconciler {
    /// Create a reconciler; does not touch the filesystem
    pub fn new(config: SyncConfig) -> Self {
        let cache = config.digest_cache.then(DigestCache::new);
        Self {
            config,
            cache,
            state: SyncState::Idle,
            divergent_streak: 0,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Consecutive iterations that ended with the trees still different
    pub fn divergent_streak(&self) -> u32 {
        self.divergent_streak
    }

    /// Whether the divergence streak has reached the alert threshold
    pub fn divergence_alerted(&self) -> bool {
        let threshold = self.config.divergence_alert_after;
        threshold > 0 && self.divergent_streak >= threshold
    }

    fn transition(&mut self, next: SyncState) {
        debug!("Sync state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Snapshot both trees and diff them
    ///
    /// Fails fatally when the origin root is gone; other scan errors are
    /// reported for the caller to retry later.
    pub fn plan_pass(&mut self) -> Result<SyncPlan> {
        check_origin(&self.config.origin)?;
        let origin = Snapshot::scan(&self.config.origin)?;
        let replica = Snapshot::scan(&self.config.replica)?;

        let plan = match self.cache.as_mut() {
            Some(cache) => {
                let plan = plan(&origin, &replica, cache);
                cache.prune(|p| in_snapshot(&origin, p) || in_snapshot(&replica, p));
                plan
            }
            None => plan(&origin, &replica, &mut DirectHasher),
        };

        debug!(
            "Planned {} deletion(s) and {} creation(s)",
            plan.deletions.len(),
            plan.creations.len()
        );
        Ok(plan)
    }

    /// Run a single Planning → Executing → Checking (→ Reconciling) pass
    pub fn run_once(&mut self) -> Result<IterationReport> {
        let result = self.iterate();
        self.transition(SyncState::Idle);
        result
    }

    fn iterate(&mut self) -> Result<IterationReport> {
        self.transition(SyncState::Planning);
        let first = self.plan_pass()?;

        self.transition(SyncState::Executing);
        let execution = execute(&first, &self.config.origin, &self.config.replica);

        self.transition(SyncState::Checking);
        info!("Checking...");
        let mut converged = verify::converged(&self.config.origin, &self.config.replica);

        let mut resync = None;
        if !converged {
            self.transition(SyncState::Reconciling);
            info!("Resynchronization...");
            // Cached digests already produced a plan that did not converge
            if let Some(cache) = self.cache.as_mut() {
                cache.clear();
            }
            let second = self.plan_pass()?;
            resync = Some(execute(&second, &self.config.origin, &self.config.replica));

            info!("Checking...");
            converged = verify::converged(&self.config.origin, &self.config.replica);
            if !converged {
                warn!(
                    "Replica \"{}\" still differs from origin after resynchronization, retrying next interval",
                    self.config.replica.display()
                );
            }
        }

        self.record_divergence(converged);

        Ok(IterationReport {
            planned: first.len(),
            execution,
            resync,
            converged,
        })
    }

    fn record_divergence(&mut self, converged: bool) {
        if converged {
            if self.divergent_streak > 0 {
                info!(
                    "Replica converged after {} divergent iteration(s)",
                    self.divergent_streak
                );
            }
            self.divergent_streak = 0;
            return;
        }

        self.divergent_streak += 1;
        if self.divergence_alerted() {
            error!(
                "Replica \"{}\" has diverged from origin for {} consecutive iterations",
                self.config.replica.display(),
                self.divergent_streak
            );
        }
    }

    /// Loop until `cancel` is triggered
    ///
    /// Cancellation is checked before each iteration and wakes the sleep
    /// early, but an iteration that has started always runs to completion.
    /// Returns an error only when the origin root disappears.
    pub async fn run(&mut self, cancel: CancelToken) -> Result<()> {
        info!(
            "Starting periodic sync (interval: {:?})",
            self.config.interval
        );

        while !cancel.is_cancelled() {
            match self.run_once() {
                Ok(_) => info!("Synchronization complete. Next in {}", self.next_run_time()),
                Err(e) if e.is_fatal() => {
                    error!("Stopping synchronization: {}", e);
                    self.transition(SyncState::Stopped);
                    return Err(e);
                }
                Err(e) => warn!(
                    "Synchronization pass failed: {}. Next attempt in {}",
                    e,
                    self.next_run_time()
                ),
            }

            self.transition(SyncState::Sleeping);
            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                _ = cancel.cancelled() => {}
            }
        }

        self.transition(SyncState::Stopped);
        info!("Synchronization stopped");
        Ok(())
    }

    /// Local wall-clock time of the next iteration, `HH:MM:SS`
    fn next_run_time(&self) -> String {
        chrono::Duration::from_std(self.config.interval)
            .ok()
            .and_then(|delay| chrono::Local::now().checked_add_signed(delay))
            .map(|at| at.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| format!("{:?}", self.config.interval))
    }
}

fn in_snapshot(snapshot: &Snapshot, abs_path: &Path) -> bool {
    abs_path
        .strip_prefix(snapshot.root())
        .map(|rel| snapshot.contains(rel))
        .unwrap_or(false)
}
