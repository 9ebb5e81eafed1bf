//! Tree command: render the file hierarchy of a persisted graph.

use std::path::PathBuf;

use anyhow::Result;
use meridian::{GraphParams, GraphStore};

const DEFAULT_MAX_DEPTH: usize = 5;
const MAX_LINES: usize = 5000;

pub fn run(db_path: PathBuf, root_node_id: i64, max_depth: Option<usize>) -> Result<()> {
    let mut store = GraphStore::open(&db_path)?;
    let graph = store.load_graph(root_node_id, GraphParams::default())?;
    println!(
        "{}",
        graph.file_tree(max_depth.unwrap_or(DEFAULT_MAX_DEPTH), MAX_LINES)
    );
    Ok(())
}
