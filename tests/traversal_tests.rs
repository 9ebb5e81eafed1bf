//! Query toolset tests against a persisted fixture graph.

mod common;

use meridian::{
    count_tokens, GraphParams, GraphStore, EMPTY_DATA_MESSAGE, TRUNCATION_MARKER,
};
use tempfile::TempDir;

const BUDGET: usize = 10_000;

struct Fixture {
    _temp: TempDir,
    store: GraphStore,
    root_id: i64,
}

fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let repo = temp.path().join("repo");
    std::fs::create_dir(&repo).unwrap();
    common::write_fixture(&repo);

    let mut store = GraphStore::open(temp.path().join("graph.db")).unwrap();
    let root_id = store.build_graph(&repo, GraphParams::default()).unwrap();
    Fixture {
        _temp: temp,
        store,
        root_id,
    }
}

fn str_field<'a>(record: &'a meridian::Record, key: &str, field: &str) -> &'a str {
    record[key][field].as_str().unwrap()
}

fn int_field(record: &meridian::Record, key: &str, field: &str) -> i64 {
    record[key][field].as_i64().unwrap()
}

#[test]
fn test_find_file_node_with_basename() {
    let mut fx = fixture();
    let (formatted, records) = fx
        .store
        .find_file_node_with_basename(fx.root_id, "test.py", BUDGET)
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(str_field(&records[0], "FileNode", "basename"), "test.py");
    assert_eq!(
        str_field(&records[0], "FileNode", "relative_path"),
        "bar/test.py"
    );
    assert!(formatted.starts_with("Result 1:"));
    assert!(formatted.contains("\"basename\":\"test.py\""));
}

#[test]
fn test_find_file_node_with_relative_path() {
    let mut fx = fixture();
    let (_, records) = fx
        .store
        .find_file_node_with_relative_path(fx.root_id, "foo/test.md", BUDGET)
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(str_field(&records[0], "FileNode", "basename"), "test.md");
}

#[test]
fn test_unknown_basename_yields_no_data_sentinel() {
    let mut fx = fixture();
    let (formatted, records) = fx
        .store
        .find_file_node_with_basename(fx.root_id, "no_such_file.rs", BUDGET)
        .unwrap();

    assert_eq!(formatted, EMPTY_DATA_MESSAGE);
    assert!(records.is_empty());
}

#[test]
fn test_find_ast_node_with_text_prefers_most_specific() {
    let mut fx = fixture();
    let (_, records) = fx
        .store
        .find_ast_node_with_text(fx.root_id, "System.out.println", BUDGET)
        .unwrap();

    assert!(!records.is_empty());
    // shortest matching text first: the invocation itself, not the
    // blocks containing it
    let first = &records[0];
    assert_eq!(str_field(first, "ASTNode", "syntax_type"), "method_invocation");
    assert_eq!(
        str_field(first, "ASTNode", "text"),
        "System.out.println(\"Hello world!\")"
    );
    assert_eq!(int_field(first, "ASTNode", "start_line"), 1);
    assert_eq!(int_field(first, "ASTNode", "end_line"), 1);
    assert_eq!(str_field(first, "FileNode", "basename"), "test.java");
    assert_eq!(
        str_field(first, "FileNode", "relative_path"),
        "bar/test.java"
    );

    // matched-text lengths are ascending
    let lengths: Vec<usize> = records
        .iter()
        .map(|r| str_field(r, "ASTNode", "text").len())
        .collect();
    assert!(lengths.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_find_ast_node_with_text_in_file() {
    let mut fx = fixture();
    let (_, records) = fx
        .store
        .find_ast_node_with_text_in_file(fx.root_id, "printf", "test.c", BUDGET)
        .unwrap();

    let first = &records[0];
    assert_eq!(str_field(first, "ASTNode", "syntax_type"), "identifier");
    assert_eq!(str_field(first, "ASTNode", "text"), "printf");
    assert_eq!(int_field(first, "ASTNode", "start_line"), 2);
    assert!(records
        .iter()
        .all(|r| str_field(r, "FileNode", "basename") == "test.c"));
}

#[test]
fn test_directory_basename_scopes_to_subtree() {
    let mut fx = fixture();
    let (_, records) = fx
        .store
        .find_ast_node_with_text_in_file(fx.root_id, "println", "bar", BUDGET)
        .unwrap();

    assert!(!records.is_empty());
    assert!(records
        .iter()
        .all(|r| str_field(r, "FileNode", "relative_path").starts_with("bar/")));

    // the same search scoped to the other directory finds nothing
    let (formatted, records) = fx
        .store
        .find_ast_node_with_text_in_file(fx.root_id, "println", "foo", BUDGET)
        .unwrap();
    assert_eq!(formatted, EMPTY_DATA_MESSAGE);
    assert!(records.is_empty());
}

#[test]
fn test_find_ast_node_with_text_in_relative_path() {
    let mut fx = fixture();
    let (_, records) = fx
        .store
        .find_ast_node_with_text_in_relative_path(fx.root_id, "print", "bar/test.py", BUDGET)
        .unwrap();

    assert!(!records.is_empty());
    assert!(records
        .iter()
        .all(|r| str_field(r, "FileNode", "relative_path") == "bar/test.py"));
}

#[test]
fn test_find_ast_node_with_type() {
    let mut fx = fixture();
    let (_, records) = fx
        .store
        .find_ast_node_with_type(fx.root_id, "argument_list", BUDGET)
        .unwrap();

    // one match per language fixture, ordered by node_id
    assert_eq!(records.len(), 3);
    let ids: Vec<i64> = records
        .iter()
        .map(|r| int_field(r, "ASTNode", "node_id"))
        .collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
    assert!(records
        .iter()
        .all(|r| str_field(r, "ASTNode", "syntax_type") == "argument_list"));
}

#[test]
fn test_find_ast_node_with_type_in_file() {
    let mut fx = fixture();
    let (_, records) = fx
        .store
        .find_ast_node_with_type_in_file(fx.root_id, "string_literal", "test.c", BUDGET)
        .unwrap();

    assert_eq!(records.len(), 1);
    let first = &records[0];
    assert_eq!(str_field(first, "ASTNode", "text"), "\"Hello world!\"");
    assert_eq!(int_field(first, "ASTNode", "start_line"), 2);
    assert_eq!(str_field(first, "FileNode", "relative_path"), "test.c");
}

#[test]
fn test_find_ast_node_with_type_in_relative_path() {
    let mut fx = fixture();
    let (_, records) = fx
        .store
        .find_ast_node_with_type_in_relative_path(fx.root_id, "string", "bar/test.py", BUDGET)
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(str_field(&records[0], "ASTNode", "text"), "\"Hello world!\"");
}

#[test]
fn test_find_ast_node_with_type_and_text() {
    let mut fx = fixture();
    let (_, records) = fx
        .store
        .find_ast_node_with_type_and_text(fx.root_id, "string_literal", "Hello world!", BUDGET)
        .unwrap();

    // C and Java both carry a string_literal; Python calls it string
    assert_eq!(records.len(), 2);
    assert!(records
        .iter()
        .all(|r| str_field(r, "ASTNode", "text") == "\"Hello world!\""));
}

#[test]
fn test_find_text_node_with_text() {
    let mut fx = fixture();
    let (_, records) = fx
        .store
        .find_text_node_with_text(fx.root_id, "Text under header A.", BUDGET)
        .unwrap();

    assert_eq!(records.len(), 1);
    let first = &records[0];
    assert_eq!(str_field(first, "TextNode", "text"), "Text under header A.");
    assert_eq!(str_field(first, "TextNode", "metadata"), "{'Header 1': 'A'}");
    assert_eq!(str_field(first, "FileNode", "relative_path"), "foo/test.md");
}

#[test]
fn test_find_text_node_with_text_in_file() {
    let mut fx = fixture();
    let (_, records) = fx
        .store
        .find_text_node_with_text_in_file(fx.root_id, "Text under header B.", "test.md", BUDGET)
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(
        str_field(&records[0], "TextNode", "metadata"),
        "{'Header 1': 'A', 'Header 2': 'B'}"
    );
}

#[test]
fn test_get_next_text_node_follows_the_chain() {
    let mut fx = fixture();

    let (_, records) = fx
        .store
        .find_text_node_with_text(fx.root_id, "Text under header B.", BUDGET)
        .unwrap();
    let chunk_b = int_field(&records[0], "TextNode", "node_id");

    let (_, records) = fx
        .store
        .get_next_text_node_with_node_id(fx.root_id, chunk_b, BUDGET)
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        str_field(&records[0], "TextNode", "text"),
        "Text under header C."
    );
    assert_eq!(
        str_field(&records[0], "TextNode", "metadata"),
        "{'Header 1': 'A', 'Header 2': 'C'}"
    );
}

#[test]
fn test_last_chunk_has_no_successor() {
    let mut fx = fixture();
    let (_, records) = fx
        .store
        .find_text_node_with_text(fx.root_id, "Text under header D.", BUDGET)
        .unwrap();
    let last = int_field(&records[0], "TextNode", "node_id");

    let (formatted, records) = fx
        .store
        .get_next_text_node_with_node_id(fx.root_id, last, BUDGET)
        .unwrap();
    assert_eq!(formatted, EMPTY_DATA_MESSAGE);
    assert!(records.is_empty());
}

#[test]
fn test_get_parent_node() {
    let mut fx = fixture();

    // the ")" token inside C's parameter_list
    let (_, records) = fx
        .store
        .find_ast_node_with_type_in_file(fx.root_id, "parameter_list", "test.c", BUDGET)
        .unwrap();
    let parameter_list_id = int_field(&records[0], "ASTNode", "node_id");

    let (_, children) = fx
        .store
        .get_children_node(fx.root_id, parameter_list_id, BUDGET)
        .unwrap();
    let close_paren = int_field(&children[0], "ChildNode", "node_id");

    let (_, records) = fx
        .store
        .get_parent_node(fx.root_id, close_paren, BUDGET)
        .unwrap();
    assert_eq!(records.len(), 1);
    let parent = &records[0];
    assert_eq!(str_field(parent, "ParentNode", "syntax_type"), "parameter_list");
    assert_eq!(str_field(parent, "ParentNode", "text"), "()");
    assert_eq!(int_field(parent, "ParentNode", "start_line"), 1);
}

#[test]
fn test_get_children_node() {
    let mut fx = fixture();

    let (_, records) = fx
        .store
        .find_ast_node_with_type_in_file(fx.root_id, "argument_list", "test.c", BUDGET)
        .unwrap();
    let argument_list_id = int_field(&records[0], "ASTNode", "node_id");

    let (formatted, records) = fx
        .store
        .get_children_node(fx.root_id, argument_list_id, BUDGET)
        .unwrap();

    // "(", string_literal, ")"
    assert_eq!(records.len(), 3);
    assert_eq!(formatted.matches("Result").count(), 3);
    assert!(records
        .iter()
        .any(|r| str_field(r, "ChildNode", "syntax_type") == "string_literal"
            && str_field(r, "ChildNode", "text") == "\"Hello world!\""));
}

#[test]
fn test_ast_root_has_no_parent() {
    let mut fx = fixture();

    let graph = fx.store.load_graph(fx.root_id, GraphParams::default()).unwrap();
    let module_id = graph
        .ast_nodes()
        .find(|n| n.as_ast().unwrap().syntax_type == "module")
        .unwrap()
        .node_id;

    let (formatted, records) = fx
        .store
        .get_parent_node(fx.root_id, module_id, BUDGET)
        .unwrap();
    assert_eq!(formatted, EMPTY_DATA_MESSAGE);
    assert!(records.is_empty());
}

#[test]
fn test_preview_source_file() {
    let mut fx = fixture();
    let (formatted, records) = fx
        .store
        .preview_file_content_with_basename(fx.root_id, "test.c", BUDGET)
        .unwrap();

    assert_eq!(records.len(), 1);
    assert!(formatted.contains("preview"));
    let preview_text = str_field(&records[0], "preview", "text");
    assert!(preview_text.starts_with("1. #include <stdio.h>"));
    assert!(preview_text.contains("3. "));
    assert_eq!(int_field(&records[0], "preview", "start_line"), 1);
    assert_eq!(int_field(&records[0], "preview", "end_line"), 5);
}

#[test]
fn test_preview_text_file_shows_head_chunk() {
    let mut fx = fixture();
    let (_, records) = fx
        .store
        .preview_file_content_with_basename(fx.root_id, "test.md", BUDGET)
        .unwrap();

    assert_eq!(records.len(), 1);
    let preview_text = str_field(&records[0], "preview", "text");
    assert_eq!(preview_text, "1. Text under header A.");
}

#[test]
fn test_preview_with_relative_path() {
    let mut fx = fixture();
    let (_, records) = fx
        .store
        .preview_file_content_with_relative_path(fx.root_id, "bar/test.java", BUDGET)
        .unwrap();

    assert_eq!(records.len(), 1);
    assert!(str_field(&records[0], "preview", "text").contains("public class Test"));
}

#[test]
fn test_preview_of_unsupported_file_is_no_data() {
    let mut fx = fixture();
    let (formatted, records) = fx
        .store
        .preview_file_content_with_basename(fx.root_id, "test.dummy", BUDGET)
        .unwrap();

    assert_eq!(formatted, EMPTY_DATA_MESSAGE);
    assert!(records.is_empty());
}

#[test]
fn test_read_code_line_range() {
    let mut fx = fixture();
    let (formatted, records) = fx
        .store
        .read_code_with_relative_path(fx.root_id, "test.c", 2, 4, BUDGET)
        .unwrap();

    assert_eq!(records.len(), 1);
    let text = str_field(&records[0], "SelectedLines", "text");
    assert_eq!(text, "2. int main() {\n3.   printf(\"Hello world!\");");
    assert_eq!(int_field(&records[0], "SelectedLines", "start_line"), 2);
    assert_eq!(int_field(&records[0], "SelectedLines", "end_line"), 4);
    assert!(formatted.contains("SelectedLines"));
}

#[test]
fn test_read_code_rejects_inverted_range() {
    let mut fx = fixture();
    let (formatted, records) = fx
        .store
        .read_code_with_relative_path(fx.root_id, "test.c", 5, 3, BUDGET)
        .unwrap();

    assert!(formatted.contains("must be greater than"), "{formatted}");
    assert!(records.is_empty());
}

#[test]
fn test_read_code_out_of_range_is_no_data() {
    let mut fx = fixture();
    let (formatted, records) = fx
        .store
        .read_code_with_relative_path(fx.root_id, "test.c", 100, 200, BUDGET)
        .unwrap();

    assert_eq!(formatted, EMPTY_DATA_MESSAGE);
    assert!(records.is_empty());
}

#[test]
fn test_token_budget_truncates_tool_output() {
    let mut fx = fixture();
    let budget = 12;
    let (formatted, _) = fx
        .store
        .find_ast_node_with_text(fx.root_id, "Hello", budget)
        .unwrap();

    assert!(formatted.ends_with(TRUNCATION_MARKER));
    assert!(count_tokens(&formatted) <= budget);
}

#[test]
fn test_queries_never_cross_repository_roots() {
    let temp = TempDir::new().unwrap();

    let repo_a = temp.path().join("alpha");
    std::fs::create_dir(&repo_a).unwrap();
    common::write_fixture(&repo_a);

    let repo_b = temp.path().join("beta");
    std::fs::create_dir(&repo_b).unwrap();
    std::fs::write(repo_b.join("beta_only.py"), "beta_marker = 1\n").unwrap();

    let mut store = GraphStore::open(temp.path().join("graph.db")).unwrap();
    let root_a = store.build_graph(&repo_a, GraphParams::default()).unwrap();
    let root_b = store.build_graph(&repo_b, GraphParams::default()).unwrap();

    let (formatted, records) = store
        .find_file_node_with_basename(root_a, "beta_only.py", BUDGET)
        .unwrap();
    assert_eq!(formatted, EMPTY_DATA_MESSAGE);
    assert!(records.is_empty());

    let (_, records) = store
        .find_ast_node_with_text(root_a, "beta_marker", BUDGET)
        .unwrap();
    assert!(records.is_empty());

    let (_, records) = store
        .find_file_node_with_basename(root_b, "beta_only.py", BUDGET)
        .unwrap();
    assert_eq!(records.len(), 1);
}

#[test]
fn test_unknown_root_yields_no_data() {
    let mut fx = fixture();
    let (formatted, records) = fx
        .store
        .find_file_node_with_basename(999_999, "test.c", BUDGET)
        .unwrap();
    assert_eq!(formatted, EMPTY_DATA_MESSAGE);
    assert!(records.is_empty());
}
