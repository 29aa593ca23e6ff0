//! Snapreap CLI
//!
//! Finds expired subtrees in a namespace snapshot and removes them from the
//! live service.
//!
//! # Commands
//!
//! - `inspect` - Display snapshot header, sessions and optionally every node
//! - `list` - List the nodes that would be deleted, in deletion order
//! - `count` - Count the nodes and bytes that would be deleted
//! - `expire` - Delete expired subtrees from the live service

mod commands;
mod error;
mod observer;

use clap::{Args, Parser, Subcommand};
use snapreap_core::{AgeBasis, ExpiryPolicy, ROOT_PATH};
use snapreap_engine::{current_time_ms, ReapConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Removes expired subtrees found in a namespace snapshot.
#[derive(Parser, Debug)]
#[command(name = "snapreap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the snapshot file
    #[arg(global = true, short, long)]
    snapshot: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Which nodes a command selects.
#[derive(Args, Debug, Clone)]
struct Selection {
    /// Root of the scan; only its descendants are considered
    #[arg(short, long, default_value = ROOT_PATH)]
    root: String,

    /// Age in days a node must exceed to expire
    #[arg(short = 'd', long, default_value_t = 30)]
    days: u32,

    /// Timestamp ages are measured from (ctime, mtime)
    #[arg(short, long, default_value = "mtime")]
    basis: AgeBasis,

    /// Reference time in milliseconds since the epoch (defaults to now)
    #[arg(long)]
    now_ms: Option<i64>,
}

impl Selection {
    fn to_config(&self) -> ReapConfig {
        ReapConfig::new(self.root.clone(), ExpiryPolicy::new(self.basis, self.days))
            .with_now_ms(self.now_ms.unwrap_or_else(current_time_ms))
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Display snapshot header, sessions and optionally every node
    Inspect {
        /// Print every node with its stat
        #[arg(short, long)]
        nodes: bool,

        /// Load even if the checksum does not match
        #[arg(long)]
        no_verify: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List the nodes that would be deleted, in deletion order
    List {
        #[command(flatten)]
        selection: Selection,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Count the nodes and bytes that would be deleted
    Count {
        #[command(flatten)]
        selection: Selection,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Delete expired subtrees from the live service
    Expire {
        #[command(flatten)]
        selection: Selection,

        /// Live service addresses, comma separated host:port
        #[arg(long)]
        server: Option<String>,

        /// Report without deleting
        #[arg(long)]
        dry_run: bool,

        /// Print a progress line every N nodes
        #[arg(long)]
        progress: Option<u64>,

        /// Worker threads across candidate subtrees
        #[arg(short = 'j', long, default_value_t = 1)]
        parallelism: usize,

        /// Attempts per delete for transient failures
        #[arg(long, default_value_t = 3)]
        attempts: u32,

        /// Seconds to wait for a session
        #[arg(long, default_value_t = 10)]
        connect_timeout: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG overrides the default level
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect {
            nodes,
            no_verify,
            format,
        } => {
            let path = cli.snapshot.ok_or(error::CliError::SnapshotRequired)?;
            commands::inspect::run(&path, nodes, !no_verify, &format)?;
        }
        Commands::List { selection, format } => {
            let path = cli.snapshot.ok_or(error::CliError::SnapshotRequired)?;
            commands::list::run(&path, selection.to_config(), &format)?;
        }
        Commands::Count { selection, format } => {
            let path = cli.snapshot.ok_or(error::CliError::SnapshotRequired)?;
            commands::count::run(&path, selection.to_config(), &format)?;
        }
        Commands::Expire {
            selection,
            server,
            dry_run,
            progress,
            parallelism,
            attempts,
            connect_timeout,
            format,
        } => {
            let path = cli.snapshot.ok_or(error::CliError::SnapshotRequired)?;
            let options = commands::expire::ExpireOptions {
                server,
                verbose: cli.verbose,
                progress_every: progress,
                attempts,
                connect_timeout: std::time::Duration::from_secs(connect_timeout),
                format,
            };
            let config = selection
                .to_config()
                .with_dry_run(dry_run)
                .with_parallelism(parallelism);
            commands::expire::run(&path, config, &options)?;
        }
        Commands::Version => {
            println!("snapreap v{}", env!("CARGO_PKG_VERSION"));
            println!("snapreap core v{}", snapreap_core::VERSION);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_expire() {
        let cli = Cli::try_parse_from([
            "snapreap",
            "-s",
            "snapshot.100",
            "expire",
            "--root",
            "/jobs",
            "-d",
            "7",
            "--basis",
            "ctime",
            "--server",
            "zk1:2181",
            "--dry-run",
            "-j",
            "4",
        ])
        .unwrap();

        assert_eq!(cli.snapshot, Some(PathBuf::from("snapshot.100")));
        let Commands::Expire {
            selection,
            server,
            dry_run,
            parallelism,
            ..
        } = cli.command
        else {
            panic!("expected expire");
        };
        assert_eq!(selection.root, "/jobs");
        assert_eq!(selection.days, 7);
        assert_eq!(selection.basis, AgeBasis::Ctime);
        assert_eq!(server.as_deref(), Some("zk1:2181"));
        assert!(dry_run);
        assert_eq!(parallelism, 4);
    }

    #[test]
    fn selection_defaults() {
        let cli = Cli::try_parse_from(["snapreap", "count", "--now-ms", "5"]).unwrap();
        let Commands::Count { selection, format } = cli.command else {
            panic!("expected count");
        };
        let config = selection.to_config();
        assert_eq!(config.root, "/");
        assert_eq!(config.policy, ExpiryPolicy::new(AgeBasis::Mtime, 30));
        assert_eq!(config.now_ms, 5);
        assert_eq!(format, "text");
    }

    #[test]
    fn rejects_unknown_basis() {
        assert!(Cli::try_parse_from(["snapreap", "list", "--basis", "atime"]).is_err());
    }
}
