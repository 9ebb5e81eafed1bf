//! Language capability registry and tree-sitter parsing.
//!
//! Maps file extensions to parser capabilities: a fixed set of source
//! languages with bundled grammars, text/markdown files handled by the
//! document chunker, or unsupported. Owns all tree-sitter parser setup.

use std::path::Path;

use anyhow::Result;
use tree_sitter::Tree;

/// Source languages with an available tree-sitter grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    C,
    Cpp,
    Java,
    JavaScript,
    TypeScript,
    Tsx,
    Python,
    Rust,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Java => "java",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::Python => "python",
            Language::Rust => "rust",
        }
    }

    fn grammar(&self) -> tree_sitter::Language {
        match self {
            Language::C => tree_sitter_c::language(),
            Language::Cpp => tree_sitter_cpp::language(),
            Language::Java => tree_sitter_java::language(),
            Language::JavaScript => tree_sitter_javascript::language(),
            Language::TypeScript => tree_sitter_typescript::language_typescript(),
            Language::Tsx => tree_sitter_typescript::language_tsx(),
            Language::Python => tree_sitter_python::language(),
            Language::Rust => tree_sitter_rust::language(),
        }
    }
}

/// What the graph builder can do with a given file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Parseable source code, handled by the AST extractor
    Source(Language),
    /// Text/markdown, handled by the document chunker
    Text,
    /// Everything else: contributes a FileNode and nothing more
    Unsupported,
}

/// Detect the source language of a file from its extension
pub fn detect_language(path: &Path) -> Option<Language> {
    let ext = path.extension()?.to_str()?;
    match ext {
        "c" | "h" => Some(Language::C),
        "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Some(Language::Cpp),
        "java" => Some(Language::Java),
        "js" | "mjs" | "cjs" => Some(Language::JavaScript),
        "ts" => Some(Language::TypeScript),
        "tsx" => Some(Language::Tsx),
        "py" => Some(Language::Python),
        "rs" => Some(Language::Rust),
        _ => None,
    }
}

/// Classify a file for the graph builder
pub fn classify_file(path: &Path) -> FileKind {
    if let Some(language) = detect_language(path) {
        return FileKind::Source(language);
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some("md") | Some("markdown") | Some("txt") | Some("rst") => FileKind::Text,
        _ => FileKind::Unsupported,
    }
}

/// Whether the engine builds graph content for this file at all
pub fn supports_file(path: &Path) -> bool {
    !matches!(classify_file(path), FileKind::Unsupported)
}

/// Parse source bytes with the language's grammar.
///
/// Returns `Ok(None)` when tree-sitter gives up on the input (the file
/// then contributes nothing beyond its FileNode). Errors only on
/// grammar/runtime version mismatch.
pub fn parse_source(language: Language, source: &[u8]) -> Result<Option<Tree>> {
    let mut parser = tree_sitter::Parser::new();
    parser.set_language(&language.grammar())?;
    Ok(parser.parse(source, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language(Path::new("src/main.rs")), Some(Language::Rust));
        assert_eq!(detect_language(Path::new("script.py")), Some(Language::Python));
        assert_eq!(detect_language(Path::new("header.h")), Some(Language::C));
        assert_eq!(detect_language(Path::new("Main.java")), Some(Language::Java));
        assert_eq!(detect_language(Path::new("app.tsx")), Some(Language::Tsx));
        assert_eq!(detect_language(Path::new("notes.md")), None);
        assert_eq!(detect_language(Path::new("no_extension")), None);
    }

    #[test]
    fn test_classify_file() {
        assert_eq!(
            classify_file(Path::new("test.c")),
            FileKind::Source(Language::C)
        );
        assert_eq!(classify_file(Path::new("README.md")), FileKind::Text);
        assert_eq!(classify_file(Path::new("notes.rst")), FileKind::Text);
        assert_eq!(classify_file(Path::new("test.dummy")), FileKind::Unsupported);
    }

    #[test]
    fn test_supports_file() {
        assert!(supports_file(&PathBuf::from("bar/test.py")));
        assert!(supports_file(&PathBuf::from("foo/test.md")));
        assert!(!supports_file(&PathBuf::from("foo/test.dummy")));
    }

    #[test]
    fn test_parse_simple_python() {
        let tree = parse_source(Language::Python, b"print(\"Hello world!\")\n")
            .unwrap()
            .unwrap();
        let root = tree.root_node();
        assert_eq!(root.kind(), "module");
        assert!(!root.has_error());
        assert_eq!(root.child_count(), 1);
    }

    #[test]
    fn test_parse_broken_source_reports_error() {
        let tree = parse_source(Language::C, b"int main( {{{").unwrap().unwrap();
        assert!(tree.root_node().has_error());
    }
}
