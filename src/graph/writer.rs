//! Write path: batched, retry-safe upserts of a knowledge graph
//!
//! Write order is fixed: all FileNodes, all AstNodes, all TextNodes,
//! then edges grouped by kind (HAS_AST, HAS_FILE, HAS_TEXT, NEXT_CHUNK)
//! and finally PARENT_OF, usually the largest edge set, in its own
//! pass. Nodes of a kind always exist before edges referencing them.

use anyhow::{anyhow, Result};
use sqlitegraph::{
    add_label, BackendDirection, EdgeSpec, GraphBackend, NeighborQuery, NodeSpec, SnapshotId,
};
use tracing::debug;

use crate::graph::schema::{Edge, EdgeKind, GraphNode, NodePayload};
use crate::graph::store::GraphStore;
use crate::graph::KnowledgeGraph;

impl GraphStore {
    /// Persist a complete in-memory graph.
    ///
    /// Every node write is an upsert keyed by `node_id`, every edge
    /// write an upsert keyed by (source, target, kind); the whole
    /// operation is safe to retry.
    pub fn write_graph(&mut self, graph: &KnowledgeGraph) -> Result<()> {
        // Uniqueness guard for node_id upserts; idempotent.
        self.rebuild_node_index()?;

        let file_nodes: Vec<&GraphNode> = graph.file_nodes().collect();
        let ast_nodes: Vec<&GraphNode> = graph.ast_nodes().collect();
        let text_nodes: Vec<&GraphNode> = graph.text_nodes().collect();
        self.write_nodes(&file_nodes)?;
        self.write_nodes(&ast_nodes)?;
        self.write_nodes(&text_nodes)?;

        for kind in [
            EdgeKind::HasAst,
            EdgeKind::HasFile,
            EdgeKind::HasText,
            EdgeKind::NextChunk,
        ] {
            let edges: Vec<&Edge> = graph.edges_of_kind(kind).collect();
            self.write_edges(&edges, kind)?;
        }

        // PARENT_OF gets its own pass, independent of the others.
        let parent_of: Vec<&Edge> = graph.edges_of_kind(EdgeKind::ParentOf).collect();
        self.write_edges(&parent_of, EdgeKind::ParentOf)?;

        Ok(())
    }

    fn write_nodes(&mut self, nodes: &[&GraphNode]) -> Result<()> {
        for batch in nodes.chunks(self.batch_size) {
            for node in batch {
                self.upsert_node(node)?;
            }
            if let Some(first) = batch.first() {
                debug!(
                    "wrote batch of {} {} rows",
                    batch.len(),
                    first.payload.kind()
                );
            }
        }
        Ok(())
    }

    fn write_edges(&mut self, edges: &[&Edge], kind: EdgeKind) -> Result<()> {
        for batch in edges.chunks(self.batch_size) {
            for edge in batch {
                self.upsert_edge(edge)?;
            }
            debug!("wrote batch of {} {} edges", batch.len(), kind.as_str());
        }
        Ok(())
    }

    /// Match-or-create a node keyed by `node_id`.
    ///
    /// Payloads are immutable once created, so a match is a no-op.
    fn upsert_node(&mut self, node: &GraphNode) -> Result<()> {
        if self.node_index.contains_key(&node.node_id) {
            return Ok(());
        }

        let kind = node.payload.kind();
        let (name, file_path) = match &node.payload {
            NodePayload::File(f) => (f.basename.clone(), Some(f.relative_path.clone())),
            NodePayload::Ast(a) => (a.syntax_type.clone(), None),
            NodePayload::Text(t) => {
                let name = if t.metadata.is_empty() {
                    "text".to_string()
                } else {
                    t.metadata.clone()
                };
                (name, None)
            }
        };

        let spec = NodeSpec {
            kind: kind.to_string(),
            name,
            file_path,
            data: node.to_row()?,
        };
        let entity_id = self.backend.insert_node(spec)?;
        add_label(self.backend.graph(), entity_id, kind)?;
        self.node_index.insert(node.node_id, entity_id);
        Ok(())
    }

    /// Match-or-create an edge keyed by (source, target, kind)
    fn upsert_edge(&mut self, edge: &Edge) -> Result<()> {
        let from = self
            .entity_of(edge.source)
            .ok_or_else(|| anyhow!("edge source node_id {} not persisted", edge.source))?;
        let to = self
            .entity_of(edge.target)
            .ok_or_else(|| anyhow!("edge target node_id {} not persisted", edge.target))?;

        let existing = self.backend.neighbors(
            SnapshotId::current(),
            from,
            NeighborQuery {
                direction: BackendDirection::Outgoing,
                edge_type: Some(edge.kind.as_str().to_string()),
            },
        )?;
        if existing.contains(&to) {
            return Ok(());
        }

        self.backend.insert_edge(EdgeSpec {
            from,
            to,
            edge_type: edge.kind.as_str().to_string(),
            data: serde_json::json!({}),
        })?;
        Ok(())
    }
}
