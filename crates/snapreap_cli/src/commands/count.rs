//! Count command implementation.

use super::{load_snapshot, print_summary, OutputFormat, RunSummary};
use snapreap_engine::{NoopObserver, ReapConfig, ReapEngine};
use std::path::Path;

/// Runs the count command. Never contacts the live service.
pub fn run(path: &Path, config: ReapConfig, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let format = OutputFormat::parse(format)?;
    let snapshot = load_snapshot(path, true)?;

    let report = ReapEngine::new(&snapshot.tree, config.with_dry_run(true)).run(None, &NoopObserver)?;
    print_summary("Count", &RunSummary::from(&report), format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapreap_core::{AgeBasis, ExpiryPolicy};
    use snapreap_testkit::{scenarios, TempSnapshot, FIXED_NOW_MS};

    #[test]
    fn counts_a_snapshot_file() {
        let file = TempSnapshot::write(&scenarios::jobs(FIXED_NOW_MS).build());
        let config = ReapConfig::new("/jobs", ExpiryPolicy::new(AgeBasis::Mtime, 30))
            .with_now_ms(FIXED_NOW_MS);
        run(file.path(), config, "json").unwrap();
    }

    #[test]
    fn corrupt_file_fails_without_a_summary() {
        let mut bytes = scenarios::jobs(FIXED_NOW_MS).to_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 1;
        let file = TempSnapshot::from_bytes(&bytes);
        let config = ReapConfig::new("/jobs", ExpiryPolicy::new(AgeBasis::Mtime, 30));
        assert!(run(file.path(), config, "text").is_err());
    }
}
