//! Query tool commands: thin wrappers over the traversal toolset.

use std::path::PathBuf;

use anyhow::{bail, Result};
use meridian::GraphStore;

use crate::Args;

const DEFAULT_MAX_TOKENS: usize = 2000;

pub fn run(command: &str, db_path: PathBuf, args: &Args) -> Result<()> {
    let mut store = GraphStore::open(&db_path)?;
    let root_id: i64 = args.require_parsed("--root-id")?;
    let max_tokens = args
        .get_parsed("--max-tokens")?
        .unwrap_or(DEFAULT_MAX_TOKENS);

    let (formatted, _records) = match command {
        "find-file" => match (args.get("--basename"), args.get("--path")) {
            (Some(basename), None) => {
                store.find_file_node_with_basename(root_id, basename, max_tokens)?
            }
            (None, Some(path)) => {
                store.find_file_node_with_relative_path(root_id, path, max_tokens)?
            }
            _ => bail!("find-file takes exactly one of --basename or --path"),
        },
        "find-ast" => {
            let text = args.get("--text");
            let syntax_type = args.get("--type");
            let scope_file = args.get("--file");
            let scope_path = args.get("--path");
            match (text, syntax_type, scope_file, scope_path) {
                (Some(text), Some(syntax_type), None, None) => {
                    store.find_ast_node_with_type_and_text(root_id, syntax_type, text, max_tokens)?
                }
                (Some(text), None, None, None) => {
                    store.find_ast_node_with_text(root_id, text, max_tokens)?
                }
                (Some(text), None, Some(basename), None) => {
                    store.find_ast_node_with_text_in_file(root_id, text, basename, max_tokens)?
                }
                (Some(text), None, None, Some(path)) => store
                    .find_ast_node_with_text_in_relative_path(root_id, text, path, max_tokens)?,
                (None, Some(syntax_type), None, None) => {
                    store.find_ast_node_with_type(root_id, syntax_type, max_tokens)?
                }
                (None, Some(syntax_type), Some(basename), None) => store
                    .find_ast_node_with_type_in_file(root_id, syntax_type, basename, max_tokens)?,
                (None, Some(syntax_type), None, Some(path)) => store
                    .find_ast_node_with_type_in_relative_path(
                        root_id,
                        syntax_type,
                        path,
                        max_tokens,
                    )?,
                _ => bail!(
                    "find-ast needs --text and/or --type, optionally scoped by --file or --path"
                ),
            }
        }
        "find-text" => {
            let text = args.require("--text")?;
            match args.get("--file") {
                Some(basename) => {
                    store.find_text_node_with_text_in_file(root_id, text, basename, max_tokens)?
                }
                None => store.find_text_node_with_text(root_id, text, max_tokens)?,
            }
        }
        "preview" => match (args.get("--basename"), args.get("--path")) {
            (Some(basename), None) => {
                store.preview_file_content_with_basename(root_id, basename, max_tokens)?
            }
            (None, Some(path)) => {
                store.preview_file_content_with_relative_path(root_id, path, max_tokens)?
            }
            _ => bail!("preview takes exactly one of --basename or --path"),
        },
        "read" => store.read_code_with_relative_path(
            root_id,
            args.require("--path")?,
            args.require_parsed("--start")?,
            args.require_parsed("--end")?,
            max_tokens,
        )?,
        other => bail!("unknown query command: {other}"),
    };

    println!("{formatted}");
    Ok(())
}
