//! Graph store handle
//!
//! Wraps the sqlitegraph backend behind the knowledge-graph schema:
//! three node kinds uniquely keyed by `node_id`, five relationship
//! types. The store is shared across repositories and partitioned only
//! by reachability from each repository's root node.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use sqlitegraph::{GraphBackend, SnapshotId, SqliteGraphBackend};
use std::rc::Rc;
use tracing::info;

use crate::graph::schema::{GraphNode, AST_NODE_KIND, FILE_NODE_KIND, TEXT_NODE_KIND};
use crate::graph::{GraphParams, KnowledgeGraph};

/// Default number of node/edge rows per write batch
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Handle to the persisted knowledge-graph store.
///
/// Holds the backend plus an in-memory `node_id` -> store-entity index
/// (the uniqueness guard every upsert consults). The handle is
/// single-threaded; concurrent readers open their own.
pub struct GraphStore {
    pub(crate) backend: Rc<SqliteGraphBackend>,
    /// node_id -> backing store entity id
    pub(crate) node_index: HashMap<i64, i64>,
    pub(crate) batch_size: usize,
}

impl GraphStore {
    /// Open (or create) a store at the given database path
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        Self::open_with_batch_size(db_path, DEFAULT_BATCH_SIZE)
    }

    pub fn open_with_batch_size<P: AsRef<Path>>(db_path: P, batch_size: usize) -> Result<Self> {
        let graph = sqlitegraph::SqliteGraph::open(db_path)?;
        let backend = Rc::new(SqliteGraphBackend::from_graph(graph));
        let mut store = Self {
            backend,
            node_index: HashMap::new(),
            batch_size: batch_size.max(1),
        };
        store.rebuild_node_index()?;
        Ok(store)
    }

    /// Rebuild the node_id index by scanning the store.
    ///
    /// Idempotent and safe to run before every write; this is what
    /// keeps `node_id` unique per node kind across upserts.
    pub(crate) fn rebuild_node_index(&mut self) -> Result<()> {
        self.node_index.clear();
        for entity_id in self.backend.entity_ids()? {
            let node = match self.backend.get_node(SnapshotId::current(), entity_id) {
                Ok(node) => node,
                Err(_) => continue,
            };
            if matches!(
                node.kind.as_str(),
                FILE_NODE_KIND | AST_NODE_KIND | TEXT_NODE_KIND
            ) {
                if let Ok(graph_node) = GraphNode::from_row(&node.kind, node.data) {
                    self.node_index.insert(graph_node.node_id, entity_id);
                }
            }
        }
        Ok(())
    }

    /// Store entity backing a node id, if persisted
    pub(crate) fn entity_of(&self, node_id: i64) -> Option<i64> {
        self.node_index.get(&node_id).copied()
    }

    /// Read one graph node back from the store by node id
    pub(crate) fn graph_node(&self, node_id: i64) -> Result<Option<GraphNode>> {
        let Some(entity_id) = self.entity_of(node_id) else {
            return Ok(None);
        };
        let node = self.backend.get_node(SnapshotId::current(), entity_id)?;
        Ok(Some(GraphNode::from_row(&node.kind, node.data)?))
    }

    /// Read one graph node by its backing entity id
    pub(crate) fn graph_node_of_entity(&self, entity_id: i64) -> Result<GraphNode> {
        let node = self.backend.get_node(SnapshotId::current(), entity_id)?;
        GraphNode::from_row(&node.kind, node.data)
    }

    /// First node id guaranteed unused by any persisted graph.
    ///
    /// A rebuild allocates from here, so every build gets an id space
    /// disjoint from all earlier graphs in the store.
    pub fn next_available_node_id(&self) -> i64 {
        self.node_index.keys().max().map_or(0, |max| max + 1)
    }

    /// Build the graph for `root_dir` and persist it, returning the
    /// root node id of the new graph.
    pub fn build_graph(&mut self, root_dir: &Path, params: GraphParams) -> Result<i64> {
        self.rebuild_node_index()?;
        let start_node_id = self.next_available_node_id();
        let graph = KnowledgeGraph::build(root_dir, params, start_node_id)?;
        self.write_graph(&graph)?;
        info!(
            "persisted graph for {} as root node {} ({} nodes, {} edges)",
            root_dir.display(),
            graph.root_node_id(),
            graph.nodes().len(),
            graph.edges().len()
        );
        Ok(graph.root_node_id())
    }

    /// Node counts per kind: (FileNode, AstNode, TextNode)
    pub fn counts(&self) -> Result<(usize, usize, usize)> {
        let mut files = 0;
        let mut asts = 0;
        let mut texts = 0;
        for entity_id in self.node_index.values() {
            let node = self.backend.get_node(SnapshotId::current(), *entity_id)?;
            match node.kind.as_str() {
                FILE_NODE_KIND => files += 1,
                AST_NODE_KIND => asts += 1,
                TEXT_NODE_KIND => texts += 1,
                _ => {}
            }
        }
        Ok((files, asts, texts))
    }

    /// Root node ids of all graphs in the store: FileNodes with no
    /// incoming HAS_FILE edge, sorted.
    pub fn graph_roots(&self) -> Result<Vec<i64>> {
        use crate::graph::schema::EdgeKind;
        use sqlitegraph::{BackendDirection, NeighborQuery};

        let mut roots = Vec::new();
        for (node_id, entity_id) in &self.node_index {
            let node = self.backend.get_node(SnapshotId::current(), *entity_id)?;
            if node.kind != FILE_NODE_KIND {
                continue;
            }
            let parents = self.backend.neighbors(
                SnapshotId::current(),
                *entity_id,
                NeighborQuery {
                    direction: BackendDirection::Incoming,
                    edge_type: Some(EdgeKind::HasFile.as_str().to_string()),
                },
            )?;
            if parents.is_empty() {
                roots.push(*node_id);
            }
        }
        roots.sort_unstable();
        Ok(roots)
    }
}
