//! Repository walk and knowledge-graph assembly
//!
//! Walks the file tree depth-first with an explicit stack, creates one
//! FileNode per file/dir connected with HAS_FILE edges, and dispatches
//! file content to the AST extractor or the document chunker. Owns the
//! single node-id counter; every sub-call threads it through.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::{debug, info, warn};

use crate::graph::ast_extractor::extract_file_ast;
use crate::graph::chunker::chunk_text_file;
use crate::graph::schema::{Edge, EdgeKind, FileNode, GraphNode, NodePayload};
use crate::graph::GraphParams;
use crate::ingest::{classify_file, FileKind};

/// Walk `root_dir` and assemble the in-memory node/edge sets.
///
/// Node ids are allocated from `start_node_id` upward; the first id is
/// always the repository root FileNode. Returns
/// `(next_node_id, nodes, edges)`.
pub fn build_repository_graph(
    root_dir: &Path,
    params: &GraphParams,
    start_node_id: i64,
) -> Result<(i64, Vec<GraphNode>, Vec<Edge>)> {
    let root_dir = std::fs::canonicalize(root_dir)
        .with_context(|| format!("cannot canonicalize {}", root_dir.display()))?;
    if !root_dir.is_dir() {
        bail!("{} is not a directory", root_dir.display());
    }

    let gitignore = load_gitignore(&root_dir);

    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let mut next_node_id = start_node_id;

    let root_basename = root_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| ".".to_string());
    let root_node = FileNode {
        basename: root_basename,
        relative_path: ".".to_string(),
    };
    let root_node_id = next_node_id;
    next_node_id += 1;
    nodes.push(GraphNode::new(root_node_id, NodePayload::File(root_node)));

    // (path on disk, node id of its FileNode)
    let mut stack: Vec<(PathBuf, i64)> = vec![(root_dir.clone(), root_node_id)];

    while let Some((path, file_node_id)) = stack.pop() {
        if path.is_dir() {
            info!("processing directory {}", path.display());
            for child in sorted_children(&path)? {
                if child.file_name().and_then(|n| n.to_str()) == Some(".git") {
                    continue;
                }
                let is_dir = child.is_dir();
                if gitignore.matched(&child, is_dir).is_ignore() {
                    info!("skipping {} because it is ignored", child.display());
                    continue;
                }

                let child_node = FileNode {
                    basename: child
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default(),
                    relative_path: relative_posix(&root_dir, &child),
                };
                let child_node_id = next_node_id;
                next_node_id += 1;
                nodes.push(GraphNode::new(child_node_id, NodePayload::File(child_node)));
                edges.push(Edge::new(file_node_id, child_node_id, EdgeKind::HasFile));

                stack.push((child, child_node_id));
            }
        } else {
            debug!("processing file {}", path.display());
            let content = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!("cannot read {}: {err}", path.display());
                    continue;
                }
            };

            match classify_file(&path) {
                FileKind::Source(language) => {
                    if std::str::from_utf8(&content).is_err() {
                        warn!("skipping {}: not valid utf-8", path.display());
                        continue;
                    }
                    let (next, file_nodes, file_edges) = extract_file_ast(
                        file_node_id,
                        language,
                        &content,
                        params.max_ast_depth,
                        next_node_id,
                    )?;
                    next_node_id = next;
                    nodes.extend(file_nodes);
                    edges.extend(file_edges);
                }
                FileKind::Text => {
                    let text = match String::from_utf8(content) {
                        Ok(text) => text,
                        Err(_) => {
                            warn!("skipping {}: not valid utf-8", path.display());
                            continue;
                        }
                    };
                    let (next, file_nodes, file_edges) =
                        chunk_text_file(file_node_id, &text, next_node_id);
                    next_node_id = next;
                    nodes.extend(file_nodes);
                    edges.extend(file_edges);
                }
                FileKind::Unsupported => {
                    info!("skip {}: unsupported file type", path.display());
                }
            }
        }
    }

    Ok((next_node_id, nodes, edges))
}

/// Gitignore rules for the walk; missing rule files mean "ignore nothing".
fn load_gitignore(root_dir: &Path) -> Gitignore {
    let mut builder = GitignoreBuilder::new(root_dir);
    builder.add(root_dir.join(".gitignore"));
    builder.build().unwrap_or_else(|err| {
        warn!("cannot parse gitignore rules: {err}");
        Gitignore::empty()
    })
}

/// Directory children in sorted (lexicographic) order for determinism
fn sorted_children(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut children: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("cannot read directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    children.sort();
    Ok(children)
}

/// Path relative to the repository root with forward slashes
fn relative_posix(root_dir: &Path, path: &Path) -> String {
    match path.strip_prefix(root_dir) {
        Ok(rel) => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string_lossy().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn build(dir: &Path) -> (i64, Vec<GraphNode>, Vec<Edge>) {
        build_repository_graph(dir, &GraphParams::default(), 0).unwrap()
    }

    fn file_nodes(nodes: &[GraphNode]) -> Vec<&FileNode> {
        nodes.iter().filter_map(|n| n.as_file()).collect()
    }

    #[test]
    fn test_children_sorted_by_name() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("b.py"), "x = 1\n").unwrap();
        std::fs::write(temp.path().join("a.py"), "y = 2\n").unwrap();

        let (_, nodes, _) = build(temp.path());
        let files = file_nodes(&nodes);
        assert_eq!(files[0].relative_path, ".");
        assert_eq!(files[1].basename, "a.py");
        assert_eq!(files[2].basename, "b.py");
    }

    #[test]
    fn test_gitignored_entries_contribute_nothing() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".gitignore"), "ignored.txt\n").unwrap();
        std::fs::write(temp.path().join("ignored.txt"), "secret\n").unwrap();
        std::fs::write(temp.path().join("kept.txt"), "notes\n").unwrap();
        std::fs::create_dir(temp.path().join(".git")).unwrap();
        std::fs::write(temp.path().join(".git").join("HEAD"), "ref\n").unwrap();

        let (_, nodes, _) = build(temp.path());
        let files = file_nodes(&nodes);
        assert!(files.iter().all(|f| f.basename != "ignored.txt"));
        assert!(files.iter().all(|f| f.basename != ".git"));
        assert!(files.iter().any(|f| f.basename == "kept.txt"));
    }

    #[test]
    fn test_unsupported_file_keeps_only_file_node() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("blob.dummy"), "???\n").unwrap();

        let (next_id, nodes, edges) = build(temp.path());
        // root + blob.dummy, nothing else
        assert_eq!(next_id, 2);
        assert_eq!(nodes.len(), 2);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].kind, EdgeKind::HasFile);
    }

    #[test]
    fn test_non_utf8_source_keeps_only_file_node() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("broken.py"), [0xff, 0xfe, 0x00]).unwrap();

        let (_, nodes, edges) = build(temp.path());
        assert_eq!(nodes.len(), 2);
        assert!(edges.iter().all(|e| e.kind == EdgeKind::HasFile));
    }

    #[test]
    fn test_nested_directories_have_single_parent_edge() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("a").join("b")).unwrap();
        std::fs::write(temp.path().join("a").join("b").join("deep.txt"), "hi\n").unwrap();

        let (_, nodes, edges) = build(temp.path());
        let files = file_nodes(&nodes);
        assert!(files.iter().any(|f| f.relative_path == "a/b/deep.txt"));

        // every non-root FileNode has exactly one incoming HAS_FILE edge
        for node in nodes.iter().filter(|n| n.as_file().is_some()) {
            let incoming = edges
                .iter()
                .filter(|e| e.kind == EdgeKind::HasFile && e.target == node.node_id)
                .count();
            let expected = usize::from(node.as_file().unwrap().relative_path != ".");
            assert_eq!(incoming, expected);
        }
    }
}
