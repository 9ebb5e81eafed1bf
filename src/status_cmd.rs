//! Status command: node counts and graph roots for a store.

use std::path::PathBuf;

use anyhow::Result;
use meridian::GraphStore;

pub fn run(db_path: PathBuf) -> Result<()> {
    let store = GraphStore::open(&db_path)?;
    let (files, asts, texts) = store.counts()?;
    let roots = store.graph_roots()?;

    println!("Database: {}", db_path.display());
    println!("FileNodes: {files}");
    println!("ASTNodes:  {asts}");
    println!("TextNodes: {texts}");
    if roots.is_empty() {
        println!("Graphs: none");
    } else {
        let rendered: Vec<String> = roots.iter().map(|r| r.to_string()).collect();
        println!("Graphs: {} (roots: {})", roots.len(), rendered.join(", "));
    }
    Ok(())
}
