//! Expire command implementation.

use super::{load_snapshot, print_summary, OutputFormat, RunSummary};
use crate::error::CliError;
use crate::observer::{Observers, ProgressObserver, VerboseObserver};
use snapreap_core::Snapshot;
use snapreap_engine::{
    CancelToken, EngineError, NamespaceService, ReapConfig, ReapEngine, ReapObserver, ReapReport,
    RetryConfig, ServiceConfig, ServiceGuard, ZkClient,
};
use std::path::Path;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{info, warn};

/// Flags of the expire command beyond the node selection.
#[derive(Debug, Clone)]
pub struct ExpireOptions {
    /// Live service addresses.
    pub server: Option<String>,
    /// Print every node.
    pub verbose: bool,
    /// Print progress every N nodes.
    pub progress_every: Option<u64>,
    /// Attempts per delete and per connect round.
    pub attempts: u32,
    /// Deadline for establishing the session.
    pub connect_timeout: Duration,
    /// Output format.
    pub format: String,
}

/// Runs the expire command.
///
/// The snapshot is loaded and the root checked before any connection is
/// made, so a bad snapshot never touches the live service. Ctrl-C stops new
/// deletes; the summary of what was already done is still printed.
pub fn run(
    path: &Path,
    config: ReapConfig,
    options: &ExpireOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = OutputFormat::parse(&options.format)?;
    let snapshot = load_snapshot(path, true)?;
    if !snapshot.tree.contains(&config.root) {
        return Err(EngineError::RootNotFound { path: config.root }.into());
    }

    let config = config.with_retry(RetryConfig::new(options.attempts));
    let observer = observers(options);
    let cancel = CancelToken::new();
    let _signals = cancel_on_interrupt(cancel.clone())?;

    let report = if config.dry_run {
        reap(&snapshot, config, None, &observer, cancel)?
    } else {
        let address = options.server.as_deref().ok_or(CliError::ServerRequired)?;
        let service_config = ServiceConfig::new(address)
            .with_connect_timeout(options.connect_timeout)
            .with_retry(RetryConfig::new(options.attempts));
        let guard = ServiceGuard::new(ZkClient::connect(service_config)?);
        info!(server = %address, session_id = %format!("0x{:x}", guard.session_id()), "connected");

        let report = reap(&snapshot, config, Some(&*guard), &observer, cancel)?;
        if let Err(e) = guard.close() {
            warn!(error = %e, "failed to close session");
        }
        report
    };

    finish(&report, format)
}

fn reap(
    snapshot: &Snapshot,
    config: ReapConfig,
    service: Option<&dyn NamespaceService>,
    observer: &dyn ReapObserver,
    cancel: CancelToken,
) -> Result<ReapReport, EngineError> {
    ReapEngine::new(&snapshot.tree, config)
        .with_cancel_token(cancel)
        .run(service, observer)
}

/// Prints the summary, then fails if the run was cut short.
fn finish(report: &ReapReport, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    print_summary("Expire", &RunSummary::from(report), format)?;
    if report.cancelled {
        return Err(CliError::Interrupted {
            deleted: report.deleted_count(),
        }
        .into());
    }
    Ok(())
}

/// Cancels `token` on the first Ctrl-C and exits on the second.
///
/// The listener lives as long as the returned runtime.
fn cancel_on_interrupt(token: CancelToken) -> std::io::Result<Runtime> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("snapreap-signal")
        .enable_all()
        .build()?;
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("interrupted, stopping after in-flight deletes");
        token.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted again, exiting");
            std::process::exit(130);
        }
    });
    Ok(runtime)
}

fn observers(options: &ExpireOptions) -> Observers {
    let mut observers = Observers::default();
    if options.verbose {
        observers.push(VerboseObserver);
    }
    if let Some(every) = options.progress_every {
        observers.push(ProgressObserver::new(every));
    }
    observers
}
