//! Inspect command implementation.

use super::{format_size, load_snapshot, OutputFormat};
use serde::Serialize;
use snapreap_core::{Snapshot, ROOT_PATH};
use std::path::Path;

/// Snapshot inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Snapshot path.
    pub path: String,
    /// Header magic, hex.
    pub magic: String,
    /// Format version.
    pub version: i32,
    /// Database id.
    pub db_id: i64,
    /// Number of nodes, including the root.
    pub node_count: usize,
    /// Sum of approximate data lengths.
    pub data_bytes: u64,
    /// Number of sessions.
    pub session_count: usize,
    /// Every session, sorted by id.
    pub sessions: Vec<SessionInfo>,
    /// Every node in pre-order (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<NodeInfo>>,
}

/// A session table entry.
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    /// Session id, hex.
    pub id: String,
    /// Negotiated timeout in milliseconds.
    pub timeout_ms: i32,
}

/// A node with its stat.
#[derive(Debug, Serialize)]
pub struct NodeInfo {
    /// Full path.
    pub path: String,
    /// Creation time, ms since the epoch.
    pub ctime: i64,
    /// Modification time, ms since the epoch.
    pub mtime: i64,
    /// Data version.
    pub version: i32,
    /// Child version.
    pub cversion: i32,
    /// ACL version.
    pub aversion: i32,
    /// Whether the node is bound to a session.
    pub ephemeral: bool,
    /// Owning session, hex, zero for persistent nodes.
    pub ephemeral_owner: String,
    /// Approximate data length.
    pub data_length: i32,
    /// Number of children.
    pub children: usize,
}

/// Runs the inspect command.
pub fn run(
    path: &Path,
    show_nodes: bool,
    verify: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = OutputFormat::parse(format)?;
    let snapshot = load_snapshot(path, verify)?;
    let result = inspect(&snapshot, path, show_nodes);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Text => {
            if !verify {
                println!("(checksum not verified)");
            }
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Summarizes a loaded snapshot.
pub fn inspect(snapshot: &Snapshot, path: &Path, show_nodes: bool) -> InspectResult {
    let sessions = snapshot
        .sessions
        .sorted()
        .into_iter()
        .map(|(id, timeout_ms)| SessionInfo {
            id: format!("0x{id:x}"),
            timeout_ms,
        })
        .collect();

    let nodes = show_nodes.then(|| {
        snapshot
            .tree
            .walk(ROOT_PATH)
            .map(|(path, node)| NodeInfo {
                path,
                ctime: node.stat.ctime,
                mtime: node.stat.mtime,
                version: node.stat.version,
                cversion: node.stat.cversion,
                aversion: node.stat.aversion,
                ephemeral: node.stat.is_ephemeral(),
                ephemeral_owner: format!("0x{:x}", node.stat.ephemeral_owner),
                data_length: node.stat.data_length,
                children: node.child_count(),
            })
            .collect()
    });

    InspectResult {
        path: path.display().to_string(),
        magic: format!("{:#010x}", snapshot.header.magic),
        version: snapshot.header.version,
        db_id: snapshot.header.db_id,
        node_count: snapshot.tree.len(),
        data_bytes: snapshot.tree.total_data_bytes(),
        session_count: snapshot.sessions.len(),
        sessions,
        nodes,
    }
}

fn print_text_output(result: &InspectResult) {
    println!("Snapshot Inspection");
    println!("===================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Header:");
    println!("  Magic:   {}", result.magic);
    println!("  Version: {}", result.version);
    println!("  DB id:   {}", result.db_id);
    println!();
    println!("Tree:");
    println!("  Nodes:      {}", result.node_count);
    println!("  Data bytes: {}", format_size(result.data_bytes));
    println!();
    println!("Sessions: {}", result.session_count);
    for session in &result.sessions {
        println!("  {}: {}", session.id, session.timeout_ms);
    }

    if let Some(nodes) = &result.nodes {
        println!();
        println!("Nodes:");
        for node in nodes {
            let kind = if node.ephemeral { " (ephemeral)" } else { "" };
            println!(
                "  {}{kind} ctime={} mtime={} version={} cversion={} aversion={} owner={} length={} children={}",
                node.path,
                node.ctime,
                node.mtime,
                node.version,
                node.cversion,
                node.aversion,
                node.ephemeral_owner,
                node.data_length,
                node.children
            );
        }
    }
}
