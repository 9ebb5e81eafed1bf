//! Query/traversal toolset
//!
//! A closed catalogue of parameterized, read-only queries over the
//! store. Every tool is scoped to one repository's root node id (it
//! never crosses into another repository's subgraph), takes a
//! per-call token budget, and returns `(formatted_text, raw_records)`.
//! Invalid parameters come back as a formatted error string in the
//! normal result channel, never as an `Err`.

use std::collections::HashSet;

use anyhow::Result;
use sqlitegraph::BackendDirection;

use crate::graph::format::{format_records, prepend_line_numbers};
use crate::graph::schema::{AstNode, EdgeKind, FileNode, GraphNode};
use crate::graph::store::GraphStore;

pub use crate::graph::format::Record;

/// Result-row cap shared by all search tools
pub const MAX_RESULT: usize = 30;

/// Line cap for file previews
pub const PREVIEW_MAX_LINES: usize = 1000;

/// Formatted text plus the raw rows it was rendered from
pub type ToolResult = (String, Vec<Record>);

/// A FileNode together with its backing store entity
struct FileEntry {
    entity: i64,
    node: GraphNode,
}

impl FileEntry {
    fn file(&self) -> &FileNode {
        self.node
            .as_file()
            .expect("FileEntry is built from FileNode entities only")
    }
}

fn record(entries: &[(&str, &GraphNode)]) -> Result<Record> {
    let mut rec = Record::new();
    for (key, node) in entries {
        rec.insert((*key).to_string(), node.to_row()?);
    }
    Ok(rec)
}

fn finish(records: Vec<Record>, max_token_per_result: usize) -> ToolResult {
    (format_records(&records, max_token_per_result), records)
}

impl GraphStore {
    /// FileNodes of the graph rooted at `root_node_id`, sorted by
    /// node_id. An unknown root yields an empty scope (and the tools
    /// then report "no data").
    fn scoped_files(&mut self, root_node_id: i64) -> Result<Vec<FileEntry>> {
        self.rebuild_node_index()?;
        let Some(root_entity) = self.entity_of(root_node_id) else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::new();
        for entity in self.reachable_file_entities(root_entity)? {
            let node = self.graph_node_of_entity(entity)?;
            if node.as_file().is_some() {
                entries.push(FileEntry { entity, node });
            }
        }
        entries.sort_by_key(|e| e.node.node_id);
        Ok(entries)
    }

    /// Files matching a basename or relative path. A match on a
    /// directory widens the scope to everything beneath it.
    fn scoped_files_matching<P>(&mut self, root_node_id: i64, pred: P) -> Result<Vec<FileEntry>>
    where
        P: Fn(&FileNode) -> bool,
    {
        let files = self.scoped_files(root_node_id)?;
        let mut selected: HashSet<i64> = HashSet::new();
        for entry in files.iter().filter(|e| pred(e.file())) {
            for descendant in self.reachable_file_entities(entry.entity)? {
                selected.insert(descendant);
            }
        }
        Ok(files
            .into_iter()
            .filter(|e| selected.contains(&e.entity))
            .collect())
    }

    /// PARENT_OF descendants of a file's AST root. The root node
    /// itself (the whole file) is not a search candidate.
    fn ast_descendants(&self, file_entity: i64) -> Result<Vec<(i64, GraphNode)>> {
        let mut out = Vec::new();
        for ast_root in
            self.neighbors_of(file_entity, EdgeKind::HasAst, BackendDirection::Outgoing)?
        {
            let mut visited: HashSet<i64> = HashSet::from([ast_root]);
            let mut queue = vec![ast_root];
            while let Some(entity) = queue.pop() {
                for child in
                    self.neighbors_of(entity, EdgeKind::ParentOf, BackendDirection::Outgoing)?
                {
                    if visited.insert(child) {
                        out.push((child, self.graph_node_of_entity(child)?));
                        queue.push(child);
                    }
                }
            }
        }
        Ok(out)
    }

    /// A file's chunks in chain order, starting at its HAS_TEXT head
    fn file_chunks(&self, file_entity: i64) -> Result<Vec<(i64, GraphNode)>> {
        let mut out = Vec::new();
        for head in
            self.neighbors_of(file_entity, EdgeKind::HasText, BackendDirection::Outgoing)?
        {
            let mut visited: HashSet<i64> = HashSet::new();
            let mut current = Some(head);
            while let Some(entity) = current {
                if !visited.insert(entity) {
                    break;
                }
                out.push((entity, self.graph_node_of_entity(entity)?));
                current = self
                    .neighbors_of(entity, EdgeKind::NextChunk, BackendDirection::Outgoing)?
                    .first()
                    .copied();
            }
        }
        Ok(out)
    }

    /// The chunk of a file with no incoming NEXT_CHUNK edge, found by
    /// walking the chain backwards from any linked chunk
    fn head_chunk(&self, file_entity: i64) -> Result<Option<(i64, GraphNode)>> {
        let linked =
            self.neighbors_of(file_entity, EdgeKind::HasText, BackendDirection::Outgoing)?;
        let Some(mut entity) = linked.first().copied() else {
            return Ok(None);
        };
        let mut visited: HashSet<i64> = HashSet::from([entity]);
        while let Some(previous) = self
            .neighbors_of(entity, EdgeKind::NextChunk, BackendDirection::Incoming)?
            .first()
            .copied()
        {
            if !visited.insert(previous) {
                break;
            }
            entity = previous;
        }
        Ok(Some((entity, self.graph_node_of_entity(entity)?)))
    }

    fn collect_ast_matches<FP, AP>(
        &mut self,
        root_node_id: i64,
        file_filter: Option<FP>,
        ast_filter: AP,
        order_by_text_len: bool,
    ) -> Result<Vec<Record>>
    where
        FP: Fn(&FileNode) -> bool,
        AP: Fn(&AstNode) -> bool,
    {
        let files = match file_filter {
            Some(pred) => self.scoped_files_matching(root_node_id, pred)?,
            None => self.scoped_files(root_node_id)?,
        };

        let mut matches: Vec<(GraphNode, GraphNode)> = Vec::new();
        for entry in &files {
            for (_, ast_node) in self.ast_descendants(entry.entity)? {
                let Some(ast) = ast_node.as_ast() else {
                    continue;
                };
                if ast_filter(ast) {
                    matches.push((entry.node.clone(), ast_node));
                }
            }
        }

        if order_by_text_len {
            // Shortest matched text first: the most specific match.
            matches.sort_by_key(|(_, ast)| {
                (
                    ast.as_ast().map(|a| a.text.len()).unwrap_or(usize::MAX),
                    ast.node_id,
                )
            });
        } else {
            matches.sort_by_key(|(_, ast)| ast.node_id);
        }
        matches.truncate(MAX_RESULT);

        matches
            .iter()
            .map(|(file, ast)| record(&[("FileNode", file), ("ASTNode", ast)]))
            .collect()
    }

    fn collect_text_matches<FP>(
        &mut self,
        root_node_id: i64,
        file_filter: Option<FP>,
        text: &str,
    ) -> Result<Vec<Record>>
    where
        FP: Fn(&FileNode) -> bool,
    {
        let files = match file_filter {
            Some(pred) => self.scoped_files_matching(root_node_id, pred)?,
            None => self.scoped_files(root_node_id)?,
        };

        let mut matches: Vec<(GraphNode, GraphNode)> = Vec::new();
        for entry in &files {
            for (_, chunk) in self.file_chunks(entry.entity)? {
                if chunk.as_text().is_some_and(|t| t.text.contains(text)) {
                    matches.push((entry.node.clone(), chunk));
                }
            }
        }
        matches.sort_by_key(|(_, chunk)| chunk.node_id);
        matches.truncate(MAX_RESULT);

        matches
            .iter()
            .map(|(file, chunk)| record(&[("FileNode", file), ("TextNode", chunk)]))
            .collect()
    }

    // ------------------------------------------------------------------
    // File lookups
    // ------------------------------------------------------------------

    /// Find FileNodes by exact basename
    pub fn find_file_node_with_basename(
        &mut self,
        root_node_id: i64,
        basename: &str,
        max_token_per_result: usize,
    ) -> Result<ToolResult> {
        let files = self.scoped_files(root_node_id)?;
        let records = files
            .iter()
            .filter(|e| e.file().basename == basename)
            .take(MAX_RESULT)
            .map(|e| record(&[("FileNode", &e.node)]))
            .collect::<Result<Vec<_>>>()?;
        Ok(finish(records, max_token_per_result))
    }

    /// Find FileNodes by exact relative path
    pub fn find_file_node_with_relative_path(
        &mut self,
        root_node_id: i64,
        relative_path: &str,
        max_token_per_result: usize,
    ) -> Result<ToolResult> {
        let files = self.scoped_files(root_node_id)?;
        let records = files
            .iter()
            .filter(|e| e.file().relative_path == relative_path)
            .take(MAX_RESULT)
            .map(|e| record(&[("FileNode", &e.node)]))
            .collect::<Result<Vec<_>>>()?;
        Ok(finish(records, max_token_per_result))
    }

    // ------------------------------------------------------------------
    // AST searches
    // ------------------------------------------------------------------

    /// Find AstNodes whose text contains `text`, most specific first
    pub fn find_ast_node_with_text(
        &mut self,
        root_node_id: i64,
        text: &str,
        max_token_per_result: usize,
    ) -> Result<ToolResult> {
        let records = self.collect_ast_matches(
            root_node_id,
            None::<fn(&FileNode) -> bool>,
            |ast| ast.text.contains(text),
            true,
        )?;
        Ok(finish(records, max_token_per_result))
    }

    /// Find AstNodes containing `text` inside a file or directory with
    /// the given basename
    pub fn find_ast_node_with_text_in_file(
        &mut self,
        root_node_id: i64,
        text: &str,
        basename: &str,
        max_token_per_result: usize,
    ) -> Result<ToolResult> {
        let records = self.collect_ast_matches(
            root_node_id,
            Some(|f: &FileNode| f.basename == basename),
            |ast| ast.text.contains(text),
            true,
        )?;
        Ok(finish(records, max_token_per_result))
    }

    /// Find AstNodes containing `text` under the given relative path
    pub fn find_ast_node_with_text_in_relative_path(
        &mut self,
        root_node_id: i64,
        text: &str,
        relative_path: &str,
        max_token_per_result: usize,
    ) -> Result<ToolResult> {
        let records = self.collect_ast_matches(
            root_node_id,
            Some(|f: &FileNode| f.relative_path == relative_path),
            |ast| ast.text.contains(text),
            true,
        )?;
        Ok(finish(records, max_token_per_result))
    }

    /// Find AstNodes with an exact grammar node type
    pub fn find_ast_node_with_type(
        &mut self,
        root_node_id: i64,
        syntax_type: &str,
        max_token_per_result: usize,
    ) -> Result<ToolResult> {
        let records = self.collect_ast_matches(
            root_node_id,
            None::<fn(&FileNode) -> bool>,
            |ast| ast.syntax_type == syntax_type,
            false,
        )?;
        Ok(finish(records, max_token_per_result))
    }

    /// Find AstNodes of a type inside a file or directory with the
    /// given basename
    pub fn find_ast_node_with_type_in_file(
        &mut self,
        root_node_id: i64,
        syntax_type: &str,
        basename: &str,
        max_token_per_result: usize,
    ) -> Result<ToolResult> {
        let records = self.collect_ast_matches(
            root_node_id,
            Some(|f: &FileNode| f.basename == basename),
            |ast| ast.syntax_type == syntax_type,
            false,
        )?;
        Ok(finish(records, max_token_per_result))
    }

    /// Find AstNodes of a type under the given relative path
    pub fn find_ast_node_with_type_in_relative_path(
        &mut self,
        root_node_id: i64,
        syntax_type: &str,
        relative_path: &str,
        max_token_per_result: usize,
    ) -> Result<ToolResult> {
        let records = self.collect_ast_matches(
            root_node_id,
            Some(|f: &FileNode| f.relative_path == relative_path),
            |ast| ast.syntax_type == syntax_type,
            false,
        )?;
        Ok(finish(records, max_token_per_result))
    }

    /// Find AstNodes matching both a type and a text fragment
    pub fn find_ast_node_with_type_and_text(
        &mut self,
        root_node_id: i64,
        syntax_type: &str,
        text: &str,
        max_token_per_result: usize,
    ) -> Result<ToolResult> {
        let records = self.collect_ast_matches(
            root_node_id,
            None::<fn(&FileNode) -> bool>,
            |ast| ast.syntax_type == syntax_type && ast.text.contains(text),
            true,
        )?;
        Ok(finish(records, max_token_per_result))
    }

    // ------------------------------------------------------------------
    // Text chunk searches
    // ------------------------------------------------------------------

    /// Find TextNodes whose content contains `text`
    pub fn find_text_node_with_text(
        &mut self,
        root_node_id: i64,
        text: &str,
        max_token_per_result: usize,
    ) -> Result<ToolResult> {
        let records =
            self.collect_text_matches(root_node_id, None::<fn(&FileNode) -> bool>, text)?;
        Ok(finish(records, max_token_per_result))
    }

    /// Find TextNodes containing `text` within one file
    pub fn find_text_node_with_text_in_file(
        &mut self,
        root_node_id: i64,
        text: &str,
        basename: &str,
        max_token_per_result: usize,
    ) -> Result<ToolResult> {
        let records = self.collect_text_matches(
            root_node_id,
            Some(|f: &FileNode| f.basename == basename),
            text,
        )?;
        Ok(finish(records, max_token_per_result))
    }

    /// The NEXT_CHUNK successor of the TextNode with `node_id`
    pub fn get_next_text_node_with_node_id(
        &mut self,
        root_node_id: i64,
        node_id: i64,
        max_token_per_result: usize,
    ) -> Result<ToolResult> {
        let files = self.scoped_files(root_node_id)?;
        let mut records = Vec::new();
        'outer: for entry in &files {
            for (entity, chunk) in self.file_chunks(entry.entity)? {
                if chunk.node_id != node_id {
                    continue;
                }
                if let Some(next_entity) = self
                    .neighbors_of(entity, EdgeKind::NextChunk, BackendDirection::Outgoing)?
                    .first()
                {
                    let next = self.graph_node_of_entity(*next_entity)?;
                    records.push(record(&[("TextNode", &next)])?);
                }
                break 'outer;
            }
        }
        Ok(finish(records, max_token_per_result))
    }

    // ------------------------------------------------------------------
    // AST hierarchy hops
    // ------------------------------------------------------------------

    /// The PARENT_OF predecessor of the AstNode with `node_id`
    pub fn get_parent_node(
        &mut self,
        root_node_id: i64,
        node_id: i64,
        max_token_per_result: usize,
    ) -> Result<ToolResult> {
        let mut records = Vec::new();
        if let Some((entity, node)) = self.scoped_ast_entity(root_node_id, node_id)? {
            if let Some(parent_entity) = self
                .neighbors_of(entity, EdgeKind::ParentOf, BackendDirection::Incoming)?
                .first()
            {
                let parent = self.graph_node_of_entity(*parent_entity)?;
                records.push(record(&[("ASTNode", &node), ("ParentNode", &parent)])?);
            }
        }
        Ok(finish(records, max_token_per_result))
    }

    /// The PARENT_OF successors of the AstNode with `node_id`
    pub fn get_children_node(
        &mut self,
        root_node_id: i64,
        node_id: i64,
        max_token_per_result: usize,
    ) -> Result<ToolResult> {
        let mut records = Vec::new();
        if let Some((entity, node)) = self.scoped_ast_entity(root_node_id, node_id)? {
            let mut children = Vec::new();
            for child_entity in
                self.neighbors_of(entity, EdgeKind::ParentOf, BackendDirection::Outgoing)?
            {
                children.push(self.graph_node_of_entity(child_entity)?);
            }
            children.sort_by_key(|c| c.node_id);
            children.truncate(MAX_RESULT);
            for child in &children {
                records.push(record(&[("ASTNode", &node), ("ChildNode", child)])?);
            }
        }
        Ok(finish(records, max_token_per_result))
    }

    /// Resolve an AstNode id inside the root's subgraph
    fn scoped_ast_entity(
        &mut self,
        root_node_id: i64,
        node_id: i64,
    ) -> Result<Option<(i64, GraphNode)>> {
        self.rebuild_node_index()?;
        let Some(root_entity) = self.entity_of(root_node_id) else {
            return Ok(None);
        };
        let Some(entity) = self.entity_of(node_id) else {
            return Ok(None);
        };
        let entities = self.collect_graph_entities(root_entity)?;
        if !entities.asts.contains(&entity) {
            return Ok(None);
        }
        let node = self.graph_node_of_entity(entity)?;
        Ok(Some((entity, node)))
    }

    // ------------------------------------------------------------------
    // File content
    // ------------------------------------------------------------------

    /// Preview the first lines of files with the given basename
    pub fn preview_file_content_with_basename(
        &mut self,
        root_node_id: i64,
        basename: &str,
        max_token_per_result: usize,
    ) -> Result<ToolResult> {
        let files = self.scoped_files(root_node_id)?;
        let selected: Vec<&FileEntry> = files
            .iter()
            .filter(|e| e.file().basename == basename)
            .collect();
        let records = self.preview_records(&selected)?;
        Ok(finish(records, max_token_per_result))
    }

    /// Preview the first lines of the file at the given relative path
    pub fn preview_file_content_with_relative_path(
        &mut self,
        root_node_id: i64,
        relative_path: &str,
        max_token_per_result: usize,
    ) -> Result<ToolResult> {
        let files = self.scoped_files(root_node_id)?;
        let selected: Vec<&FileEntry> = files
            .iter()
            .filter(|e| e.file().relative_path == relative_path)
            .collect();
        let records = self.preview_records(&selected)?;
        Ok(finish(records, max_token_per_result))
    }

    fn preview_records(&self, files: &[&FileEntry]) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        for entry in files.iter().take(MAX_RESULT) {
            // Parseable source: preview the AST root's text.
            if let Some(ast_root) = self
                .neighbors_of(entry.entity, EdgeKind::HasAst, BackendDirection::Outgoing)?
                .first()
            {
                let ast_node = self.graph_node_of_entity(*ast_root)?;
                let Some(ast) = ast_node.as_ast() else {
                    continue;
                };
                let lines: Vec<&str> = ast.text.lines().take(PREVIEW_MAX_LINES).collect();
                records.push(preview_record(&entry.node, &lines.join("\n"), 1)?);
                continue;
            }

            // Text file: preview the head of the chunk chain. A file
            // whose chunker produced nothing yields no row.
            if let Some((_, chunk_node)) = self.head_chunk(entry.entity)? {
                if let Some(chunk) = chunk_node.as_text() {
                    let lines: Vec<&str> = chunk.text.lines().take(PREVIEW_MAX_LINES).collect();
                    records.push(preview_record(&entry.node, &lines.join("\n"), 1)?);
                }
            }
        }
        Ok(records)
    }

    /// Read the exact line range `[start_line, end_line)` of a source
    /// file; `start_line` is 1-indexed inclusive, `end_line` exclusive.
    ///
    /// Parameter errors are reported in the formatted text so the
    /// calling agent can see and react to them.
    pub fn read_code_with_relative_path(
        &mut self,
        root_node_id: i64,
        relative_path: &str,
        start_line: i64,
        end_line: i64,
        max_token_per_result: usize,
    ) -> Result<ToolResult> {
        if end_line < start_line {
            return Ok((
                format!(
                    "end_line ({end_line}) must be greater than or equal to start_line ({start_line})"
                ),
                Vec::new(),
            ));
        }
        if start_line < 1 {
            return Ok((
                format!("start_line ({start_line}) must be at least 1"),
                Vec::new(),
            ));
        }

        let files = self.scoped_files(root_node_id)?;
        let mut records = Vec::new();
        for entry in files
            .iter()
            .filter(|e| e.file().relative_path == relative_path)
            .take(MAX_RESULT)
        {
            let Some(ast_root) = self
                .neighbors_of(entry.entity, EdgeKind::HasAst, BackendDirection::Outgoing)?
                .first()
                .copied()
            else {
                continue;
            };
            let ast_node = self.graph_node_of_entity(ast_root)?;
            let Some(ast) = ast_node.as_ast() else {
                continue;
            };

            let skip = (start_line - 1) as usize;
            let take = (end_line - start_line) as usize;
            let selected: Vec<&str> = ast.text.lines().skip(skip).take(take).collect();
            if selected.is_empty() {
                continue;
            }

            let text = prepend_line_numbers(&selected.join("\n"), start_line as usize);
            let mut rec = record(&[("FileNode", &entry.node)])?;
            rec.insert(
                "SelectedLines".to_string(),
                serde_json::json!({
                    "text": text,
                    "start_line": start_line,
                    "end_line": start_line + selected.len() as i64,
                }),
            );
            records.push(rec);
        }
        Ok(finish(records, max_token_per_result))
    }
}

fn preview_record(file: &GraphNode, text: &str, start_line: usize) -> Result<Record> {
    let line_count = text.lines().count();
    let mut rec = record(&[("FileNode", file)])?;
    rec.insert(
        "preview".to_string(),
        serde_json::json!({
            "text": prepend_line_numbers(text, start_line),
            "start_line": start_line,
            "end_line": line_count.max(start_line),
        }),
    );
    Ok(rec)
}
