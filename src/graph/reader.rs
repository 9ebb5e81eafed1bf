//! Read path: subgraph reconstruction, existence checks, deletion
//!
//! Everything is scoped by reachability from a root node id, so graphs
//! of unrelated repositories sharing the store never leak into each
//! other's results.

use std::collections::{HashMap, HashSet};

use anyhow::{bail, Result};
use sqlitegraph::{BackendDirection, GraphBackend, NeighborQuery, SnapshotId};
use tracing::{info, warn};

use crate::graph::schema::{Edge, EdgeKind, GraphNode, FILE_NODE_KIND};
use crate::graph::store::GraphStore;
use crate::graph::{GraphParams, KnowledgeGraph};

/// Attempts for a whole-store wipe before giving up
const WIPE_ATTEMPTS: usize = 3;

/// Store entities of one graph, grouped per node kind
pub(crate) struct GraphEntities {
    pub files: Vec<i64>,
    pub asts: Vec<i64>,
    pub texts: Vec<i64>,
}

impl GraphEntities {
    pub fn all(&self) -> impl Iterator<Item = i64> + '_ {
        self.files
            .iter()
            .chain(self.asts.iter())
            .chain(self.texts.iter())
            .copied()
    }
}

impl GraphStore {
    /// Outgoing or incoming neighbor entities along one edge kind
    pub(crate) fn neighbors_of(
        &self,
        entity_id: i64,
        kind: EdgeKind,
        direction: BackendDirection,
    ) -> Result<Vec<i64>> {
        let mut ids = self.backend.neighbors(
            SnapshotId::current(),
            entity_id,
            NeighborQuery {
                direction,
                edge_type: Some(kind.as_str().to_string()),
            },
        )?;
        ids.sort_unstable();
        Ok(ids)
    }

    /// Closure of `start` under outgoing edges of `kind`, including
    /// `start` itself
    fn closure(&self, start: i64, kind: EdgeKind) -> Result<Vec<i64>> {
        let mut visited: HashSet<i64> = HashSet::from([start]);
        let mut order = vec![start];
        let mut queue = vec![start];
        while let Some(entity_id) = queue.pop() {
            for next in self.neighbors_of(entity_id, kind, BackendDirection::Outgoing)? {
                if visited.insert(next) {
                    order.push(next);
                    queue.push(next);
                }
            }
        }
        Ok(order)
    }

    /// The root's FileNode entity plus every FileNode reachable via
    /// HAS_FILE hops
    pub(crate) fn reachable_file_entities(&self, root_entity: i64) -> Result<Vec<i64>> {
        self.closure(root_entity, EdgeKind::HasFile)
    }

    /// All entities of the graph rooted at `root_entity`
    pub(crate) fn collect_graph_entities(&self, root_entity: i64) -> Result<GraphEntities> {
        let files = self.reachable_file_entities(root_entity)?;

        let mut asts = Vec::new();
        let mut texts = Vec::new();
        for file_entity in &files {
            for ast_root in
                self.neighbors_of(*file_entity, EdgeKind::HasAst, BackendDirection::Outgoing)?
            {
                asts.extend(self.closure(ast_root, EdgeKind::ParentOf)?);
            }
            for head in
                self.neighbors_of(*file_entity, EdgeKind::HasText, BackendDirection::Outgoing)?
            {
                texts.extend(self.closure(head, EdgeKind::NextChunk)?);
            }
        }

        Ok(GraphEntities { files, asts, texts })
    }

    /// Reconstruct the subgraph induced by reachability from
    /// `root_node_id`.
    ///
    /// `params` is reconstruction metadata carried on the returned
    /// graph, not re-derived from the store. Reconstructing a graph
    /// right after writing it yields a graph equal to the original up
    /// to node ordering.
    pub fn load_graph(&mut self, root_node_id: i64, params: GraphParams) -> Result<KnowledgeGraph> {
        self.rebuild_node_index()?;
        let Some(root_entity) = self.entity_of(root_node_id) else {
            bail!("node with node_id {root_node_id} not found");
        };

        let entities = self.collect_graph_entities(root_entity)?;

        let mut nodes = Vec::new();
        let mut node_id_of: HashMap<i64, i64> = HashMap::new();
        for entity_id in entities.all() {
            let node = self.graph_node_of_entity(entity_id)?;
            node_id_of.insert(entity_id, node.node_id);
            nodes.push(node);
        }

        let mut edges = Vec::new();
        for entity_id in entities.all() {
            let source = node_id_of[&entity_id];
            for kind in EdgeKind::WRITE_ORDER {
                for target_entity in
                    self.neighbors_of(entity_id, kind, BackendDirection::Outgoing)?
                {
                    // Both endpoints must belong to this graph; edges into
                    // other repositories' subgraphs are not reconstructed.
                    if let Some(target) = node_id_of.get(&target_entity) {
                        edges.push(Edge::new(source, *target, kind));
                    }
                }
            }
        }

        KnowledgeGraph::from_parts(params, root_node_id, nodes, edges)
    }

    /// Whether a graph rooted at `root_node_id` is persisted
    pub fn graph_exists(&mut self, root_node_id: i64) -> Result<bool> {
        self.rebuild_node_index()?;
        match self.graph_node(root_node_id)? {
            Some(node) => Ok(node.payload.kind() == FILE_NODE_KIND),
            None => Ok(false),
        }
    }

    /// Delete the graph rooted at `root_node_id`: the root and
    /// everything reachable from it, with all incident relationships.
    /// Best effort, single attempt; a missing root is not an error.
    pub fn delete_graph(&mut self, root_node_id: i64) -> Result<()> {
        self.rebuild_node_index()?;
        let Some(root_entity) = self.entity_of(root_node_id) else {
            warn!("delete_graph: root node {root_node_id} not found, nothing to delete");
            return Ok(());
        };

        let entities = self.collect_graph_entities(root_entity)?;
        let mut deleted = 0usize;
        for entity_id in entities.all() {
            self.backend.graph().delete_entity(entity_id)?;
            deleted += 1;
        }
        self.rebuild_node_index()?;
        info!("deleted graph rooted at node {root_node_id} ({deleted} entities)");
        Ok(())
    }

    /// Delete every graph in the store, verifying emptiness after each
    /// attempt; retried a small fixed number of times.
    pub fn wipe(&mut self) -> Result<()> {
        for attempt in 1..=WIPE_ATTEMPTS {
            self.rebuild_node_index()?;
            for entity_id in self.node_index.values() {
                self.backend.graph().delete_entity(*entity_id)?;
            }
            self.rebuild_node_index()?;
            if self.node_index.is_empty() {
                return Ok(());
            }
            warn!(
                "wipe attempt {attempt}: {} entities still present",
                self.node_index.len()
            );
        }
        bail!("store not empty after {WIPE_ATTEMPTS} wipe attempts");
    }
}
