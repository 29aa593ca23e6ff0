//! List command implementation.

use super::{load_snapshot, OutputFormat};
use serde::Serialize;
use snapreap_core::DataTree;
use snapreap_engine::{EngineResult, ReapConfig, ReapEngine};
use std::path::Path;

/// A node that would be deleted.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ListedNode {
    /// Full path.
    pub path: String,
    /// Age in whole days on the configured basis.
    pub age_days: i64,
    /// Version the delete would be checked against.
    pub version: i32,
    /// Approximate data length.
    pub data_length: u64,
}

/// Runs the list command.
pub fn run(path: &Path, config: ReapConfig, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let format = OutputFormat::parse(format)?;
    let snapshot = load_snapshot(path, true)?;
    let listed = collect(&snapshot.tree, config)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&listed)?);
        }
        OutputFormat::Text => {
            for node in &listed {
                println!("{:>6}d  {}", node.age_days, node.path);
            }
            println!("{} nodes", listed.len());
        }
    }
    Ok(())
}

/// Every node the delete phase would reach, in deletion order.
pub fn collect(tree: &DataTree, config: ReapConfig) -> EngineResult<Vec<ListedNode>> {
    let policy = config.policy;
    let now_ms = config.now_ms;
    let engine = ReapEngine::new(tree, config);

    let mut listed = Vec::new();
    for candidate in engine.scan()? {
        for path in engine.deletion_order(&candidate.path) {
            let Some(node) = tree.get(&path) else {
                continue;
            };
            listed.push(ListedNode {
                age_days: policy.age_days(&node.stat, now_ms),
                version: node.stat.version,
                data_length: node.stat.approximate_size(),
                path,
            });
        }
    }
    Ok(listed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapreap_core::{AgeBasis, ExpiryPolicy};
    use snapreap_engine::EngineError;
    use snapreap_testkit::{scenarios, FIXED_NOW_MS};

    fn config(root: &str) -> ReapConfig {
        ReapConfig::new(root, ExpiryPolicy::new(AgeBasis::Mtime, 30)).with_now_ms(FIXED_NOW_MS)
    }

    #[test]
    fn lists_in_deletion_order_with_ages() {
        let snapshot = scenarios::mixed_ages(FIXED_NOW_MS).build();
        let listed = collect(&snapshot.tree, config("/")).unwrap();

        let rows: Vec<_> = listed.iter().map(|n| (n.path.as_str(), n.age_days)).collect();
        assert_eq!(
            rows,
            vec![
                ("/a/fresh", 1),
                ("/a/stale/leaf", 90),
                ("/a/stale", 60),
                ("/a", 45),
                ("/b/old", 31),
            ]
        );
    }

    #[test]
    fn missing_root_is_an_error() {
        let snapshot = scenarios::jobs(FIXED_NOW_MS).build();
        assert!(matches!(
            collect(&snapshot.tree, config("/absent")),
            Err(EngineError::RootNotFound { .. })
        ));
    }
}
