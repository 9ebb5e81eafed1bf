//! Document chunking for text/markdown files
//!
//! Splits a document on header markers at levels 1-3 into an ordered
//! list of chunks, each tagged with the stack of enclosing headers,
//! then turns the chunks into a HAS_TEXT + NEXT_CHUNK chain hanging
//! off the file's node.

use crate::graph::schema::{Edge, EdgeKind, GraphNode, NodePayload, TextNode};

/// One contiguous range of a document between header boundaries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    /// Content between headers, header lines stripped, trimmed
    pub text: String,
    /// Serialized enclosing-header path, like `{'Header 1': 'A'}`
    pub metadata: String,
}

/// Parse a `# ` / `## ` / `### ` header line. Deeper levels are content.
fn parse_header(line: &str) -> Option<(usize, &str)> {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    if (1..=3).contains(&hashes) {
        if let Some(rest) = line[hashes..].strip_prefix(' ') {
            return Some((hashes, rest.trim()));
        }
    }
    None
}

fn render_metadata(stack: &[(usize, String)]) -> String {
    if stack.is_empty() {
        return String::new();
    }
    let entries: Vec<String> = stack
        .iter()
        .map(|(level, title)| format!("'Header {level}': '{title}'"))
        .collect();
    format!("{{{}}}", entries.join(", "))
}

/// Split document content on header boundaries.
///
/// Content lines accumulate until the next header (or end of input)
/// flushes them as one chunk tagged with the headers enclosing it.
/// Blank chunks are dropped, so a document whose headers carry no text
/// may produce fewer chunks than headers, and a document with no
/// headers at all produces a single chunk with empty metadata.
pub fn split_on_headers(content: &str) -> Vec<DocumentChunk> {
    let mut chunks = Vec::new();
    let mut header_stack: Vec<(usize, String)> = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();

    let flush = |buffer: &mut Vec<&str>, stack: &[(usize, String)], out: &mut Vec<DocumentChunk>| {
        let text = buffer.join("\n").trim().to_string();
        buffer.clear();
        if !text.is_empty() {
            out.push(DocumentChunk {
                text,
                metadata: render_metadata(stack),
            });
        }
    };

    for line in content.lines() {
        if let Some((level, title)) = parse_header(line) {
            flush(&mut buffer, &header_stack, &mut chunks);
            while header_stack.last().is_some_and(|(l, _)| *l >= level) {
                header_stack.pop();
            }
            header_stack.push((level, title.to_string()));
        } else {
            buffer.push(line);
        }
    }
    flush(&mut buffer, &header_stack, &mut chunks);

    chunks
}

/// Build the TextNode chain for one file.
///
/// Returns `(next_node_id, nodes, edges)`. The first chunk is linked to
/// the file via HAS_TEXT; every later chunk is reached from its
/// predecessor via NEXT_CHUNK only.
pub fn chunk_text_file(
    file_node_id: i64,
    content: &str,
    next_node_id: i64,
) -> (i64, Vec<GraphNode>, Vec<Edge>) {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let mut next_node_id = next_node_id;

    let mut previous: Option<i64> = None;
    for chunk in split_on_headers(content) {
        let text_node = TextNode {
            text: chunk.text,
            metadata: chunk.metadata,
        };
        let node_id = next_node_id;
        next_node_id += 1;
        nodes.push(GraphNode::new(node_id, NodePayload::Text(text_node)));

        match previous {
            None => edges.push(Edge::new(file_node_id, node_id, EdgeKind::HasText)),
            Some(prev) => edges.push(Edge::new(prev, node_id, EdgeKind::NextChunk)),
        }
        previous = Some(node_id);
    }

    (next_node_id, nodes, edges)
}
