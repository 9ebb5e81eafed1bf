//! Meridian: a deterministic code knowledge-graph engine
//!
//! Meridian walks a repository checkout, flattens each parseable source
//! file into a depth-bounded syntax tree, splits documentation files
//! into linked chunks, and persists the whole structure as one graph in
//! sqlitegraph. Persisted graphs are reconstructed by root node id or
//! deleted wholesale, and a fixed catalogue of token-budgeted traversal
//! queries answers questions about them.
//!
//! # Position conventions
//!
//! - AST line positions: 0-indexed, inclusive on both ends
//! - Query line ranges (`read_code_*`): 1-indexed, end-exclusive
//! - Rendered line numbers: 1-based
//!
//! # Lifecycle
//!
//! A graph is built once per repository snapshot and never mutated in
//! place; rebuilding allocates a fresh, disjoint node-id space and the
//! old graph is deleted as a whole. One build/delete at a time per
//! repository is the caller's responsibility; reads need no locking.

pub mod graph;
pub mod ingest;
pub mod validation;

pub use graph::format::{
    count_tokens, truncate_to_token_budget, EMPTY_DATA_MESSAGE, TRUNCATION_MARKER,
};
pub use graph::{
    AstNode, Edge, EdgeKind, FileNode, GraphNode, GraphParams, GraphStore, KnowledgeGraph,
    NodePayload, Record, TextNode, MAX_RESULT, PREVIEW_MAX_LINES,
};
pub use ingest::{classify_file, detect_language, supports_file, FileKind, Language};
pub use validation::{canonicalize_path, PathValidationError};
