//! Progress reporting for `expire`.

use snapreap_core::DataNode;
use snapreap_engine::{Candidate, NodeOutcome, ReapObserver, ReapReport};
use std::sync::atomic::{AtomicU64, Ordering};

/// Prints every candidate and every node outcome.
#[derive(Debug, Default)]
pub struct VerboseObserver;

impl ReapObserver for VerboseObserver {
    fn on_candidate(&self, candidate: &Candidate) {
        println!(
            "expired {} ({} days, {} nodes)",
            candidate.path, candidate.age_days, candidate.subtree_nodes
        );
    }

    fn on_node(&self, path: &str, node: &DataNode, outcome: &NodeOutcome) {
        let marker = if outcome.is_warning() { '!' } else { ' ' };
        match outcome {
            NodeOutcome::Failed(e) => println!("{marker} {:<16} {path}: {e}", outcome.label()),
            _ => println!(
                "{marker} {:<16} {path} ({} bytes)",
                outcome.label(),
                node.stat.approximate_size()
            ),
        }
    }
}

/// Prints a line every `every` processed nodes.
#[derive(Debug)]
pub struct ProgressObserver {
    every: u64,
    total: AtomicU64,
    processed: AtomicU64,
}

impl ProgressObserver {
    /// Creates an observer reporting every `every` nodes.
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            total: AtomicU64::new(0),
            processed: AtomicU64::new(0),
        }
    }

    /// Nodes processed so far.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Nodes selected by the scan.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl ReapObserver for ProgressObserver {
    fn on_candidate(&self, candidate: &Candidate) {
        self.total
            .fetch_add(candidate.subtree_nodes, Ordering::Relaxed);
    }

    fn on_node(&self, _path: &str, _node: &DataNode, _outcome: &NodeOutcome) {
        let processed = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        if processed % self.every == 0 {
            println!("progress: {processed}/{} nodes", self.total());
        }
    }

    fn on_finished(&self, _report: &ReapReport) {
        let processed = self.processed();
        if processed % self.every != 0 {
            println!("progress: {processed}/{} nodes", self.total());
        }
    }
}

/// Forwards every event to each inner observer.
#[derive(Default)]
pub struct Observers(Vec<Box<dyn ReapObserver>>);

impl Observers {
    /// Adds an observer.
    pub fn push(&mut self, observer: impl ReapObserver + 'static) {
        self.0.push(Box::new(observer));
    }
}

impl ReapObserver for Observers {
    fn on_candidate(&self, candidate: &Candidate) {
        for observer in &self.0 {
            observer.on_candidate(candidate);
        }
    }

    fn on_node(&self, path: &str, node: &DataNode, outcome: &NodeOutcome) {
        for observer in &self.0 {
            observer.on_node(path, node, outcome);
        }
    }

    fn on_finished(&self, report: &ReapReport) {
        for observer in &self.0 {
            observer.on_finished(report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapreap_core::{AgeBasis, ExpiryPolicy, ROOT_PATH};
    use snapreap_engine::{ReapConfig, ReapEngine};
    use snapreap_testkit::{scenarios, FIXED_NOW_MS};

    #[test]
    fn progress_counts_every_node() {
        let snapshot = scenarios::wide(FIXED_NOW_MS, 3, 1).build();
        let config = ReapConfig::new(ROOT_PATH, ExpiryPolicy::new(AgeBasis::Mtime, 30))
            .with_now_ms(FIXED_NOW_MS)
            .with_dry_run(true);
        let progress = ProgressObserver::new(4);

        let report = ReapEngine::new(&snapshot.tree, config)
            .run(None, &progress)
            .unwrap();
        assert_eq!(progress.total(), 6);
        assert_eq!(progress.processed(), 6);
        assert_eq!(report.deleted_count(), 6);
    }

    #[test]
    fn fan_out_reaches_all_observers() {
        let snapshot = scenarios::jobs(FIXED_NOW_MS).build();
        let config = ReapConfig::new("/jobs", ExpiryPolicy::new(AgeBasis::Mtime, 30))
            .with_now_ms(FIXED_NOW_MS)
            .with_dry_run(true);

        let mut observers = Observers::default();
        observers.push(VerboseObserver);
        observers.push(ProgressObserver::new(1));
        ReapEngine::new(&snapshot.tree, config)
            .run(None, &observers)
            .unwrap();
        assert_eq!(observers.0.len(), 2);
    }
}
