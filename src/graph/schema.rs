//! Graph schema definitions for Meridian
//!
//! Defines the in-memory node/edge value types of the knowledge graph
//! and the serde row shapes persisted as sqlitegraph node payloads.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Store label / payload tag for repository files and directories
pub const FILE_NODE_KIND: &str = "FileNode";
/// Store label / payload tag for syntax-tree nodes
pub const AST_NODE_KIND: &str = "ASTNode";
/// Store label / payload tag for documentation chunks
pub const TEXT_NODE_KIND: &str = "TextNode";

/// A file or directory in the repository tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    /// Basename of the file/dir, like `bar.py` or `foo`
    pub basename: String,
    /// Path relative to the repository root, like `foo/bar/baz.java`;
    /// `.` for the root itself
    pub relative_path: String,
}

/// One tree-sitter syntax node flattened into the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AstNode {
    /// Node kind string from the language grammar, like `argument_list`
    pub syntax_type: String,
    /// Starting line, 0-indexed inclusive
    pub start_line: usize,
    /// Ending line, 0-indexed inclusive
    pub end_line: usize,
    /// Exact source slice covered by the node
    pub text: String,
}

/// One chunk of a documentation file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    /// Serialized path of enclosing headers, like `{'Header 1': 'A'}`;
    /// empty when the chunk sits under no header
    pub metadata: String,
}

/// Payload of a knowledge-graph node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodePayload {
    File(FileNode),
    Ast(AstNode),
    Text(TextNode),
}

impl NodePayload {
    /// The store label for this payload variant
    pub fn kind(&self) -> &'static str {
        match self {
            NodePayload::File(_) => FILE_NODE_KIND,
            NodePayload::Ast(_) => AST_NODE_KIND,
            NodePayload::Text(_) => TEXT_NODE_KIND,
        }
    }
}

/// A node in the knowledge graph: globally unique id plus payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub node_id: i64,
    pub payload: NodePayload,
}

impl GraphNode {
    pub fn new(node_id: i64, payload: NodePayload) -> Self {
        Self { node_id, payload }
    }

    pub fn as_file(&self) -> Option<&FileNode> {
        match &self.payload {
            NodePayload::File(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_ast(&self) -> Option<&AstNode> {
        match &self.payload {
            NodePayload::Ast(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextNode> {
        match &self.payload {
            NodePayload::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Serialize the payload into its store row (node_id embedded)
    pub fn to_row(&self) -> Result<serde_json::Value> {
        let value = match &self.payload {
            NodePayload::File(f) => serde_json::to_value(FileNodeRow {
                node_id: self.node_id,
                basename: f.basename.clone(),
                relative_path: f.relative_path.clone(),
            })?,
            NodePayload::Ast(a) => serde_json::to_value(AstNodeRow {
                node_id: self.node_id,
                syntax_type: a.syntax_type.clone(),
                start_line: a.start_line,
                end_line: a.end_line,
                text: a.text.clone(),
            })?,
            NodePayload::Text(t) => serde_json::to_value(TextNodeRow {
                node_id: self.node_id,
                text: t.text.clone(),
                metadata: t.metadata.clone(),
            })?,
        };
        Ok(value)
    }

    /// Rebuild a graph node from a store row tagged with its kind
    pub fn from_row(kind: &str, data: serde_json::Value) -> Result<Self> {
        match kind {
            FILE_NODE_KIND => {
                let row: FileNodeRow = serde_json::from_value(data)?;
                Ok(Self::new(
                    row.node_id,
                    NodePayload::File(FileNode {
                        basename: row.basename,
                        relative_path: row.relative_path,
                    }),
                ))
            }
            AST_NODE_KIND => {
                let row: AstNodeRow = serde_json::from_value(data)?;
                Ok(Self::new(
                    row.node_id,
                    NodePayload::Ast(AstNode {
                        syntax_type: row.syntax_type,
                        start_line: row.start_line,
                        end_line: row.end_line,
                        text: row.text,
                    }),
                ))
            }
            TEXT_NODE_KIND => {
                let row: TextNodeRow = serde_json::from_value(data)?;
                Ok(Self::new(
                    row.node_id,
                    NodePayload::Text(TextNode {
                        text: row.text,
                        metadata: row.metadata,
                    }),
                ))
            }
            other => bail!("unknown node kind in store: {other}"),
        }
    }
}

/// Relationship types of the knowledge graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// FileNode -> FileNode: parent dir to child entry
    HasFile,
    /// FileNode -> AstNode: file to its AST root
    HasAst,
    /// FileNode -> TextNode: file to its first chunk
    HasText,
    /// TextNode -> TextNode: chunk to the next chunk in document order
    NextChunk,
    /// AstNode -> AstNode: syntax parent to child
    ParentOf,
}

impl EdgeKind {
    /// All edge kinds in the order the writer persists them
    pub const WRITE_ORDER: [EdgeKind; 5] = [
        EdgeKind::HasAst,
        EdgeKind::HasFile,
        EdgeKind::HasText,
        EdgeKind::NextChunk,
        EdgeKind::ParentOf,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::HasFile => "HAS_FILE",
            EdgeKind::HasAst => "HAS_AST",
            EdgeKind::HasText => "HAS_TEXT",
            EdgeKind::NextChunk => "NEXT_CHUNK",
            EdgeKind::ParentOf => "PARENT_OF",
        }
    }
}

/// A directed edge between two knowledge-graph nodes.
///
/// Endpoints are node ids; payloads live once in the node set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: i64,
    pub target: i64,
    pub kind: EdgeKind,
}

impl Edge {
    pub fn new(source: i64, target: i64, kind: EdgeKind) -> Self {
        Self { source, target, kind }
    }
}

/// FileNode row as persisted in the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileNodeRow {
    pub node_id: i64,
    pub basename: String,
    pub relative_path: String,
}

/// AstNode row as persisted in the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AstNodeRow {
    pub node_id: i64,
    pub syntax_type: String,
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
}

/// TextNode row as persisted in the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextNodeRow {
    pub node_id: i64,
    pub text: String,
    pub metadata: String,
}
