//! The knowledge graph: in-memory representation, construction, and
//! sqlitegraph persistence.
//!
//! Node types:
//! * `FileNode`: a file or directory
//! * `AstNode`: a tree-sitter syntax node
//! * `TextNode`: a chunk of a documentation file
//!
//! Edge types:
//! * `HAS_FILE`: parent dir FileNode -> child FileNode
//! * `HAS_AST`: FileNode -> its root AstNode
//! * `HAS_TEXT`: FileNode -> its first TextNode chunk
//! * `PARENT_OF`: AstNode -> child AstNode
//! * `NEXT_CHUNK`: TextNode -> the next chunk in document order
//!
//! Directory structure, source code, and documentation all live in one
//! graph, persisted in an embedded graph database where traversal
//! queries can pull the most relevant context back out.

pub mod ast_extractor;
pub mod builder;
pub mod chunker;
pub mod format;
mod reader;
pub mod schema;
mod store;
mod traversal;
mod writer;

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Result};

pub use schema::{
    AstNode, Edge, EdgeKind, FileNode, GraphNode, NodePayload, TextNode, AST_NODE_KIND,
    FILE_NODE_KIND, TEXT_NODE_KIND,
};
pub use store::GraphStore;
pub use traversal::{Record, MAX_RESULT, PREVIEW_MAX_LINES};

/// Construction / reconstruction parameters carried by every graph.
///
/// `chunk_size` and `chunk_overlap` are reconstruction metadata kept
/// for compatibility with stored graphs; the header-based chunker does
/// not consume them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphParams {
    /// Maximum PARENT_OF depth below each file's AST root
    pub max_ast_depth: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for GraphParams {
    fn default() -> Self {
        Self {
            max_ast_depth: 1000,
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

/// In-memory knowledge graph for one repository snapshot.
///
/// Built once per snapshot, written to the store as a whole, and later
/// reconstructed by root id. Nodes and edges are immutable once built.
#[derive(Debug, Clone)]
pub struct KnowledgeGraph {
    params: GraphParams,
    root_node_id: i64,
    nodes: Vec<GraphNode>,
    edges: Vec<Edge>,
    next_node_id: i64,
}

impl KnowledgeGraph {
    /// Build the graph for the codebase rooted at `root_dir`.
    ///
    /// Node ids are allocated from `start_node_id` upward; the root
    /// FileNode always receives `start_node_id` itself.
    pub fn build(root_dir: &Path, params: GraphParams, start_node_id: i64) -> Result<Self> {
        let (next_node_id, nodes, edges) =
            builder::build_repository_graph(root_dir, &params, start_node_id)?;
        Ok(Self {
            params,
            root_node_id: start_node_id,
            nodes,
            edges,
            next_node_id,
        })
    }

    /// Reassemble a graph from nodes and edges read back from the store
    pub fn from_parts(
        params: GraphParams,
        root_node_id: i64,
        nodes: Vec<GraphNode>,
        edges: Vec<Edge>,
    ) -> Result<Self> {
        if !nodes.iter().any(|n| n.node_id == root_node_id) {
            bail!("node with node_id {root_node_id} not found");
        }
        let next_node_id = nodes.iter().map(|n| n.node_id).max().unwrap_or(0) + 1;
        Ok(Self {
            params,
            root_node_id,
            nodes,
            edges,
            next_node_id,
        })
    }

    pub fn params(&self) -> GraphParams {
        self.params
    }

    pub fn root_node_id(&self) -> i64 {
        self.root_node_id
    }

    /// First node id NOT used by this graph
    pub fn next_node_id(&self) -> i64 {
        self.next_node_id
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn root_node(&self) -> &GraphNode {
        self.nodes
            .iter()
            .find(|n| n.node_id == self.root_node_id)
            .expect("graph invariant: root node is always present")
    }

    pub fn file_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(|n| n.as_file().is_some())
    }

    pub fn ast_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(|n| n.as_ast().is_some())
    }

    pub fn text_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(|n| n.as_text().is_some())
    }

    pub fn edges_of_kind(&self, kind: EdgeKind) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    /// Distinct syntax types present in the graph, sorted
    pub fn ast_node_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .ast_nodes()
            .filter_map(|n| n.as_ast())
            .map(|a| a.syntax_type.clone())
            .collect();
        types.sort();
        types.dedup();
        types
    }

    /// Render the file hierarchy as an ASCII tree.
    ///
    /// Children are sorted by basename; output is bounded by
    /// `max_depth` levels and `max_lines` lines. Stack-based, no
    /// recursion.
    pub fn file_tree(&self, max_depth: usize, max_lines: usize) -> String {
        const SPACE: &str = "    ";
        const BRANCH: &str = "|   ";
        const TEE: &str = "├── ";
        const LAST: &str = "└── ";

        let by_id: HashMap<i64, &GraphNode> =
            self.nodes.iter().map(|n| (n.node_id, n)).collect();
        let mut children: HashMap<i64, Vec<&GraphNode>> = HashMap::new();
        for edge in self.edges_of_kind(EdgeKind::HasFile) {
            if let Some(target) = by_id.get(&edge.target).copied() {
                children.entry(edge.source).or_default().push(target);
            }
        }
        for siblings in children.values_mut() {
            siblings.sort_by(|a, b| {
                let a = a.as_file().map(|f| f.basename.as_str()).unwrap_or("");
                let b = b.as_file().map(|f| f.basename.as_str()).unwrap_or("");
                a.cmp(b)
            });
        }

        // (node, depth, prefix, is last sibling)
        let mut stack: Vec<(&GraphNode, usize, String, bool)> =
            vec![(self.root_node(), 0, String::new(), true)];
        let mut lines = Vec::new();

        while let Some((node, depth, prefix, is_last)) = stack.pop() {
            if lines.len() >= max_lines {
                break;
            }
            if depth > max_depth {
                continue;
            }

            let basename = node.as_file().map(|f| f.basename.as_str()).unwrap_or("");
            if depth == 0 {
                lines.push(basename.to_string());
            } else {
                let pointer = if is_last { LAST } else { TEE };
                lines.push(format!("{prefix}{pointer}{basename}"));
            }

            if let Some(siblings) = children.get(&node.node_id) {
                for (i, child) in siblings.iter().enumerate().rev() {
                    let extension = if is_last { SPACE } else { BRANCH };
                    let child_prefix = if depth == 0 {
                        String::new()
                    } else {
                        format!("{prefix}{extension}")
                    };
                    stack.push((*child, depth + 1, child_prefix, i == siblings.len() - 1));
                }
            }
        }

        lines.join("\n")
    }
}

/// Equality up to node/edge ordering: same root, same (id, payload)
/// node set, same edge set. This is the load-after-write contract.
impl PartialEq for KnowledgeGraph {
    fn eq(&self, other: &Self) -> bool {
        if self.root_node_id != other.root_node_id {
            return false;
        }

        let sort_nodes = |graph: &KnowledgeGraph| {
            let mut nodes = graph.nodes.clone();
            nodes.sort_by_key(|n| n.node_id);
            nodes
        };
        let sort_edges = |graph: &KnowledgeGraph| {
            let mut edges = graph.edges.clone();
            edges.sort();
            edges
        };

        sort_nodes(self) == sort_nodes(other) && sort_edges(self) == sort_edges(other)
    }
}
