//! Build command: construct and persist the knowledge graph for a
//! repository checkout.

use std::path::PathBuf;

use anyhow::Result;
use meridian::validation::validate_root_dir;
use meridian::{GraphParams, GraphStore};

pub fn run(
    root: PathBuf,
    db_path: PathBuf,
    params: GraphParams,
    batch_size: Option<usize>,
) -> Result<()> {
    let root = validate_root_dir(&root)?;

    let mut store = match batch_size {
        Some(batch_size) => GraphStore::open_with_batch_size(&db_path, batch_size)?,
        None => GraphStore::open(&db_path)?,
    };

    let root_node_id = store.build_graph(&root, params)?;
    let (files, asts, texts) = store.counts()?;

    println!("Indexed {} as graph root {root_node_id}", root.display());
    println!("Store now holds {files} FileNodes, {asts} ASTNodes, {texts} TextNodes");
    Ok(())
}
