//! Delete commands: remove one graph, or wipe the whole store.

use std::path::PathBuf;

use anyhow::Result;
use meridian::GraphStore;

pub fn delete(db_path: PathBuf, root_node_id: i64) -> Result<()> {
    let mut store = GraphStore::open(&db_path)?;
    if !store.graph_exists(root_node_id)? {
        println!("No graph rooted at node {root_node_id}");
        return Ok(());
    }
    store.delete_graph(root_node_id)?;
    println!("Deleted graph rooted at node {root_node_id}");
    Ok(())
}

pub fn wipe(db_path: PathBuf) -> Result<()> {
    let mut store = GraphStore::open(&db_path)?;
    store.wipe()?;
    println!("Store is empty");
    Ok(())
}
