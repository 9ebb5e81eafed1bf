//! AST extraction from tree-sitter trees
//!
//! Flattens one file's syntax tree into knowledge-graph nodes and edges:
//! one AstNode per syntax node down to a bounded depth, a HAS_AST edge
//! from the file to the tree root, and PARENT_OF edges between parents
//! and children.

use anyhow::Result;

use crate::graph::schema::{AstNode, Edge, EdgeKind, GraphNode, NodePayload};
use crate::ingest::{self, Language};

/// Flatten a parsed file into graph nodes and edges.
///
/// Returns `(next_node_id, nodes, edges)`. When the tree reports a
/// syntax error or has no top-level children, the file contributes
/// nothing beyond its own FileNode and the input id is returned
/// unchanged.
///
/// The traversal is iterative with an explicit stack; nodes deeper than
/// `max_ast_depth` PARENT_OF hops from the tree root are never created.
/// Traversal order is not part of the contract, the produced node set is.
pub fn extract_file_ast(
    file_node_id: i64,
    language: Language,
    source: &[u8],
    max_ast_depth: usize,
    next_node_id: i64,
) -> Result<(i64, Vec<GraphNode>, Vec<Edge>)> {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let mut next_node_id = next_node_id;

    let tree = match ingest::parse_source(language, source)? {
        Some(tree) => tree,
        None => return Ok((next_node_id, nodes, edges)),
    };

    let root = tree.root_node();
    if root.has_error() || root.child_count() == 0 {
        return Ok((next_node_id, nodes, edges));
    }

    let ast_root = AstNode {
        syntax_type: root.kind().to_string(),
        start_line: root.start_position().row,
        end_line: root.end_position().row,
        text: root.utf8_text(source)?.to_string(),
    };
    let ast_root_id = next_node_id;
    next_node_id += 1;
    nodes.push(GraphNode::new(ast_root_id, NodePayload::Ast(ast_root)));
    edges.push(Edge::new(file_node_id, ast_root_id, EdgeKind::HasAst));

    // (syntax node, graph node id, depth from the AST root)
    let mut stack: Vec<(tree_sitter::Node, i64, usize)> = vec![(root, ast_root_id, 1)];
    while let Some((ts_node, graph_node_id, depth)) = stack.pop() {
        if depth > max_ast_depth {
            continue;
        }

        let mut cursor = ts_node.walk();
        for child in ts_node.children(&mut cursor) {
            let child_ast = AstNode {
                syntax_type: child.kind().to_string(),
                start_line: child.start_position().row,
                end_line: child.end_position().row,
                text: child.utf8_text(source)?.to_string(),
            };
            let child_id = next_node_id;
            next_node_id += 1;
            nodes.push(GraphNode::new(child_id, NodePayload::Ast(child_ast)));
            edges.push(Edge::new(graph_node_id, child_id, EdgeKind::ParentOf));
            stack.push((child, child_id, depth + 1));
        }
    }

    Ok((next_node_id, nodes, edges))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PYTHON_SOURCE: &[u8] = b"print(\"Hello world!\")\n";

    #[test]
    fn test_python_hello_world() {
        let (next_id, nodes, edges) =
            extract_file_ast(0, Language::Python, PYTHON_SOURCE, 1000, 1).unwrap();

        // module, expression_statement, call, identifier, argument_list,
        // "(", string, ")", string_start, string_content, string_end
        assert_eq!(nodes.len(), 11);
        assert_eq!(next_id, 12);

        let has_ast: Vec<_> = edges.iter().filter(|e| e.kind == EdgeKind::HasAst).collect();
        assert_eq!(has_ast.len(), 1);
        assert_eq!(has_ast[0].source, 0);
        assert_eq!(has_ast[0].target, 1);

        let parent_of = edges.iter().filter(|e| e.kind == EdgeKind::ParentOf).count();
        assert_eq!(parent_of, 10);

        let argument_list = nodes
            .iter()
            .find(|n| n.as_ast().map(|a| a.syntax_type.as_str()) == Some("argument_list"))
            .expect("argument_list node");
        assert_eq!(argument_list.as_ast().unwrap().text, "(\"Hello world!\")");
        assert_eq!(argument_list.as_ast().unwrap().start_line, 0);
        assert_eq!(argument_list.as_ast().unwrap().end_line, 0);
    }

    #[test]
    fn test_depth_bound_stops_allocation() {
        let (_, nodes, edges) =
            extract_file_ast(0, Language::Python, PYTHON_SOURCE, 1, 1).unwrap();

        // Depth 0 is the module root, depth 1 its direct children.
        assert_eq!(nodes.len(), 2);
        assert_eq!(
            edges.iter().filter(|e| e.kind == EdgeKind::ParentOf).count(),
            1
        );
        assert!(nodes
            .iter()
            .any(|n| n.as_ast().unwrap().syntax_type == "expression_statement"));
        assert!(!nodes.iter().any(|n| n.as_ast().unwrap().syntax_type == "call"));
    }

    #[test]
    fn test_error_tree_contributes_nothing() {
        let (next_id, nodes, edges) =
            extract_file_ast(0, Language::C, b"int main( {{{", 1000, 5).unwrap();
        assert_eq!(next_id, 5);
        assert!(nodes.is_empty());
        assert!(edges.is_empty());
    }

    #[test]
    fn test_empty_source_contributes_nothing() {
        let (next_id, nodes, edges) =
            extract_file_ast(0, Language::Python, b"", 1000, 5).unwrap();
        assert_eq!(next_id, 5);
        assert!(nodes.is_empty());
        assert!(edges.is_empty());
    }

    #[test]
    fn test_c_hello_world_node_set() {
        let source: &[u8] = b"#include <stdio.h>\nint main() {\n  printf(\"Hello world!\");\n  return 0;\n}\n";
        let (_, nodes, edges) = extract_file_ast(0, Language::C, source, 1000, 1).unwrap();

        assert_eq!(nodes.len(), 29);
        assert_eq!(
            edges.iter().filter(|e| e.kind == EdgeKind::ParentOf).count(),
            28
        );

        let printf = nodes
            .iter()
            .filter_map(|n| n.as_ast())
            .find(|a| a.syntax_type == "identifier" && a.text == "printf")
            .expect("printf identifier");
        assert_eq!(printf.start_line, 2);
        assert_eq!(printf.end_line, 2);

        assert!(nodes
            .iter()
            .filter_map(|n| n.as_ast())
            .any(|a| a.syntax_type == "string_literal" && a.text == "\"Hello world!\""));
    }
}
