//! The deletion orchestrator.
//!
//! A run has three phases over a fully loaded [`DataTree`]:
//!
//! 1. **Scan**: walk down from the root's children. An expired node becomes
//!    a candidate and its descendants are not examined further. A live node
//!    is descended into.
//! 2. **Delete**: for each candidate, visit its subtree children-first and
//!    issue a version-checked delete per node (skipped when running dry).
//! 3. **Report**: return the accumulated [`DeletionStats`].
//!
//! Per-node failures never abort the run. Only a missing root or a missing
//! service handle does, and both are detected before any delete is issued.

use crate::cancel::CancelToken;
use crate::config::ReapConfig;
use crate::error::{EngineError, EngineResult, ServiceError};
use crate::service::NamespaceService;
use crate::stats::{DeletionStats, StatsSnapshot};
use snapreap_core::{child_path, DataNode, DataTree};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tracing::{debug, info, warn};

/// A subtree selected for deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Path of the subtree root.
    pub path: String,
    /// Age of the subtree root in whole days.
    pub age_days: i64,
    /// Nodes in the subtree, including its root.
    pub subtree_nodes: u64,
    /// Approximate data bytes in the subtree.
    pub subtree_bytes: u64,
}

/// What happened to a single node during the delete phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOutcome {
    /// The live service removed the node.
    Deleted,
    /// The node was already gone.
    AlreadyAbsent,
    /// The live version no longer matched the snapshot.
    VersionMismatch,
    /// The delete failed and the run moved on.
    Failed(ServiceError),
    /// Dry run, no delete was issued.
    Skipped,
}

impl NodeOutcome {
    /// Returns true if the operator should be told about this node.
    pub fn is_warning(&self) -> bool {
        matches!(self, NodeOutcome::VersionMismatch | NodeOutcome::Failed(_))
    }

    /// Short label for reports.
    pub fn label(&self) -> &'static str {
        match self {
            NodeOutcome::Deleted => "deleted",
            NodeOutcome::AlreadyAbsent => "absent",
            NodeOutcome::VersionMismatch => "version-mismatch",
            NodeOutcome::Failed(_) => "failed",
            NodeOutcome::Skipped => "dry-run",
        }
    }
}

/// Receives progress events from a run.
///
/// Calls may come from several worker threads when parallelism is enabled.
pub trait ReapObserver: Sync {
    /// A subtree was selected during the scan.
    fn on_candidate(&self, _candidate: &Candidate) {}

    /// A node was processed by the delete phase.
    fn on_node(&self, _path: &str, _node: &DataNode, _outcome: &NodeOutcome) {}

    /// The run completed.
    fn on_finished(&self, _report: &ReapReport) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ReapObserver for NoopObserver {}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReapReport {
    /// Scan root.
    pub root: String,
    /// Whether deletes were skipped.
    pub dry_run: bool,
    /// Subtrees selected by the scan.
    pub candidates: Vec<Candidate>,
    /// Counters at the end of the run.
    pub stats: StatsSnapshot,
    /// Whether the run stopped early.
    pub cancelled: bool,
}

impl ReapReport {
    /// Nodes counted as deleted.
    pub fn deleted_count(&self) -> u64 {
        self.stats.deleted_count
    }

    /// Approximate bytes counted as freed.
    pub fn deleted_bytes(&self) -> u64 {
        self.stats.deleted_bytes
    }

    /// Returns true if any node ended in a version mismatch or a failure.
    pub fn has_warnings(&self) -> bool {
        self.stats.version_mismatches > 0 || self.stats.failures > 0
    }
}

/// Scans a snapshot tree for expired subtrees and deletes them.
#[derive(Debug)]
pub struct ReapEngine<'t> {
    tree: &'t DataTree,
    config: ReapConfig,
    stats: DeletionStats,
    cancel: CancelToken,
}

impl<'t> ReapEngine<'t> {
    /// Creates an engine over a loaded tree.
    pub fn new(tree: &'t DataTree, config: ReapConfig) -> Self {
        Self {
            tree,
            config,
            stats: DeletionStats::new(),
            cancel: CancelToken::new(),
        }
    }

    /// Uses an externally owned cancellation token.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the run configuration.
    pub fn config(&self) -> &ReapConfig {
        &self.config
    }

    /// Returns a handle that cancels this engine's runs.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Returns the live counters.
    pub fn stats(&self) -> &DeletionStats {
        &self.stats
    }

    /// Selects the expired subtrees below the configured root.
    ///
    /// Candidates come back in sorted pre-order. No candidate lies inside
    /// another.
    ///
    /// # Errors
    ///
    /// Returns `RootNotFound` if the root is not in the tree.
    pub fn scan(&self) -> EngineResult<Vec<Candidate>> {
        let root = &self.config.root;
        if !self.tree.contains(root) {
            return Err(EngineError::RootNotFound { path: root.clone() });
        }

        let policy = &self.config.policy;
        let now_ms = self.config.now_ms;
        let mut candidates = Vec::new();
        let mut stack: Vec<String> = self.tree.child_paths(root).into_iter().rev().collect();

        while let Some(path) = stack.pop() {
            let Some(node) = self.tree.get(&path) else {
                continue;
            };
            if policy.is_expired(&node.stat, now_ms) {
                let (subtree_nodes, subtree_bytes) = self.subtree_size(&path);
                candidates.push(Candidate {
                    age_days: policy.age_days(&node.stat, now_ms),
                    path,
                    subtree_nodes,
                    subtree_bytes,
                });
            } else {
                for name in node.children().rev() {
                    stack.push(child_path(&path, name));
                }
            }
        }

        info!(
            root = %root,
            candidates = candidates.len(),
            threshold_days = policy.threshold_days,
            basis = %policy.basis,
            "scan complete"
        );
        Ok(candidates)
    }

    /// Paths of the subtree at `path`, children before their parent.
    ///
    /// Siblings appear in sorted order.
    pub fn deletion_order(&self, path: &str) -> Vec<String> {
        let mut order = Vec::new();
        let mut stack = vec![(path.to_string(), false)];

        while let Some((path, expanded)) = stack.pop() {
            if expanded {
                order.push(path);
                continue;
            }
            let Some(node) = self.tree.get(&path) else {
                continue;
            };
            let children: Vec<String> = node
                .children()
                .rev()
                .map(|name| child_path(&path, name))
                .collect();
            stack.push((path, true));
            stack.extend(children.into_iter().map(|child| (child, false)));
        }
        order
    }

    /// Runs scan and delete and reports the totals.
    ///
    /// `service` may be `None` only for dry runs. A missing root is reported
    /// before a missing service.
    ///
    /// A cancelled token stays cancelled: a later run on the same engine
    /// issues no deletes and reports `cancelled`. Attach a fresh token with
    /// [`ReapEngine::with_cancel_token`] to run again.
    ///
    /// # Errors
    ///
    /// Returns `RootNotFound` or `ServiceRequired`. Per-node failures are
    /// reported through the observer and the counters instead.
    pub fn run(
        &self,
        service: Option<&dyn NamespaceService>,
        observer: &dyn ReapObserver,
    ) -> EngineResult<ReapReport> {
        self.stats.reset();
        if !self.tree.contains(&self.config.root) {
            return Err(EngineError::RootNotFound {
                path: self.config.root.clone(),
            });
        }
        let service = if self.config.dry_run {
            None
        } else {
            Some(service.ok_or(EngineError::ServiceRequired)?)
        };

        let candidates = self.scan()?;
        for candidate in &candidates {
            debug!(
                path = %candidate.path,
                age_days = candidate.age_days,
                nodes = candidate.subtree_nodes,
                "candidate"
            );
            observer.on_candidate(candidate);
        }

        let workers = self.config.parallelism.min(candidates.len());
        if workers <= 1 {
            for candidate in &candidates {
                if !self.reap_subtree(&candidate.path, service, observer) {
                    break;
                }
            }
        } else {
            let next = AtomicUsize::new(0);
            thread::scope(|scope| {
                for _ in 0..workers {
                    scope.spawn(|| loop {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        let Some(candidate) = candidates.get(index) else {
                            break;
                        };
                        if !self.reap_subtree(&candidate.path, service, observer) {
                            break;
                        }
                    });
                }
            });
        }

        let report = ReapReport {
            root: self.config.root.clone(),
            dry_run: self.config.dry_run,
            candidates,
            stats: self.stats.snapshot(),
            cancelled: self.cancel.is_cancelled(),
        };
        info!(
            deleted = report.stats.deleted_count,
            bytes = report.stats.deleted_bytes,
            absent = report.stats.already_absent,
            mismatches = report.stats.version_mismatches,
            failures = report.stats.failures,
            dry_run = report.dry_run,
            cancelled = report.cancelled,
            "run complete"
        );
        observer.on_finished(&report);
        Ok(report)
    }

    /// Deletes one candidate subtree. Returns false once cancelled.
    fn reap_subtree(
        &self,
        candidate: &str,
        service: Option<&dyn NamespaceService>,
        observer: &dyn ReapObserver,
    ) -> bool {
        for path in self.deletion_order(candidate) {
            if self.cancel.is_cancelled() {
                debug!(path = %path, "cancelled before delete");
                return false;
            }
            let Some(node) = self.tree.get(&path) else {
                continue;
            };

            let outcome = match service {
                Some(service) => self.delete_node(service, &path, node.stat.version),
                None => NodeOutcome::Skipped,
            };
            self.record(&path, node, &outcome);
            observer.on_node(&path, node, &outcome);
        }
        true
    }

    fn delete_node(&self, service: &dyn NamespaceService, path: &str, version: i32) -> NodeOutcome {
        let retry = &self.config.retry;
        let mut attempt = 0;
        loop {
            debug!(path, version, attempt, "delete");
            match service.delete(path, version) {
                Ok(()) => return NodeOutcome::Deleted,
                Err(ServiceError::NoNode { .. }) => return NodeOutcome::AlreadyAbsent,
                Err(ServiceError::BadVersion { .. }) => return NodeOutcome::VersionMismatch,
                Err(e) if e.is_retryable() && attempt + 1 < retry.max_attempts => {
                    attempt += 1;
                    self.stats.record_retry();
                    let delay = retry.delay_for_attempt(attempt);
                    debug!(path, attempt, error = %e, delay_ms = delay.as_millis() as u64, "retrying delete");
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    if self.cancel.is_cancelled() {
                        return NodeOutcome::Failed(e);
                    }
                }
                Err(e) => return NodeOutcome::Failed(e),
            }
        }
    }

    fn record(&self, path: &str, node: &DataNode, outcome: &NodeOutcome) {
        self.stats.record_node(node.stat.approximate_size());
        match outcome {
            NodeOutcome::Deleted => self.stats.record_removed(),
            NodeOutcome::AlreadyAbsent => {
                debug!(path, "already absent");
                self.stats.record_already_absent();
            }
            NodeOutcome::VersionMismatch => {
                warn!(path, version = node.stat.version, "live version differs from snapshot");
                self.stats.record_version_mismatch();
            }
            NodeOutcome::Failed(e) => {
                warn!(path, error = %e, "delete failed");
                self.stats.record_failure();
            }
            NodeOutcome::Skipped => self.stats.record_skipped(),
        }
    }

    fn subtree_size(&self, path: &str) -> (u64, u64) {
        self.tree
            .walk(path)
            .fold((0, 0), |(nodes, bytes), (_, node)| {
                (nodes + 1, bytes + node.stat.approximate_size())
            })
    }
}
