//! Meridian CLI - deterministic code knowledge-graph engine
//!
//! Usage: meridian <command> [arguments]

mod build_cmd;
mod delete_cmd;
mod status_cmd;
mod tools_cmd;
mod tree_cmd;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Result};
use meridian::GraphParams;

fn print_usage() {
    eprintln!("Meridian - deterministic code knowledge-graph engine");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  meridian <command> [arguments]");
    eprintln!("  meridian --help");
    eprintln!();
    eprintln!("  meridian build --root <DIR> --db <FILE> [--max-ast-depth <N>] [--chunk-size <N>] [--chunk-overlap <N>] [--batch-size <N>]");
    eprintln!("  meridian status --db <FILE>");
    eprintln!("  meridian tree --db <FILE> --root-id <N> [--max-depth <N>]");
    eprintln!("  meridian delete --db <FILE> --root-id <N>");
    eprintln!("  meridian wipe --db <FILE>");
    eprintln!("  meridian find-file --db <FILE> --root-id <N> (--basename <NAME> | --path <PATH>) [--max-tokens <N>]");
    eprintln!("  meridian find-ast --db <FILE> --root-id <N> [--text <TEXT>] [--type <TYPE>] [--file <NAME> | --path <PATH>] [--max-tokens <N>]");
    eprintln!("  meridian find-text --db <FILE> --root-id <N> --text <TEXT> [--file <NAME>] [--max-tokens <N>]");
    eprintln!("  meridian preview --db <FILE> --root-id <N> (--basename <NAME> | --path <PATH>) [--max-tokens <N>]");
    eprintln!("  meridian read --db <FILE> --root-id <N> --path <PATH> --start <N> --end <N> [--max-tokens <N>]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  build      Build the knowledge graph for a repository and persist it");
    eprintln!("  status     Show node counts and graph roots in a store");
    eprintln!("  tree       Render the file hierarchy of a persisted graph");
    eprintln!("  delete     Delete one graph (root and everything reachable)");
    eprintln!("  wipe       Delete all graphs in the store");
    eprintln!("  find-file  Find FileNodes by basename or relative path");
    eprintln!("  find-ast   Find ASTNodes by contained text and/or node type");
    eprintln!("  find-text  Find documentation chunks by contained text");
    eprintln!("  preview    Preview the first lines of a file");
    eprintln!("  read       Read an exact line range of a source file");
    eprintln!();
    eprintln!("Query arguments:");
    eprintln!("  --max-tokens <N>    Token budget per formatted result (default: 2000)");
}

/// Parsed `--flag value` pairs for one command
struct Args {
    values: Vec<(String, String)>,
}

impl Args {
    fn parse(raw: &[String]) -> Result<Self> {
        let mut values = Vec::new();
        let mut iter = raw.iter();
        while let Some(flag) = iter.next() {
            if !flag.starts_with("--") {
                bail!("unexpected argument: {flag}");
            }
            let value = iter
                .next()
                .ok_or_else(|| anyhow!("missing value for {flag}"))?;
            values.push((flag.clone(), value.clone()));
        }
        Ok(Self { values })
    }

    fn get(&self, flag: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(f, _)| f == flag)
            .map(|(_, v)| v.as_str())
    }

    fn require(&self, flag: &str) -> Result<&str> {
        self.get(flag)
            .ok_or_else(|| anyhow!("missing required argument {flag}"))
    }

    fn get_parsed<T: std::str::FromStr>(&self, flag: &str) -> Result<Option<T>> {
        match self.get(flag) {
            None => Ok(None),
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| anyhow!("invalid value for {flag}: {value}")),
        }
    }

    fn require_parsed<T: std::str::FromStr>(&self, flag: &str) -> Result<T> {
        let value = self.require(flag)?;
        value
            .parse()
            .map_err(|_| anyhow!("invalid value for {flag}: {value}"))
    }
}

fn graph_params(args: &Args) -> Result<GraphParams> {
    let defaults = GraphParams::default();
    Ok(GraphParams {
        max_ast_depth: args
            .get_parsed("--max-ast-depth")?
            .unwrap_or(defaults.max_ast_depth),
        chunk_size: args
            .get_parsed("--chunk-size")?
            .unwrap_or(defaults.chunk_size),
        chunk_overlap: args
            .get_parsed("--chunk-overlap")?
            .unwrap_or(defaults.chunk_overlap),
    })
}

fn run(command: &str, args: &Args) -> Result<()> {
    let db = || -> Result<PathBuf> { Ok(PathBuf::from(args.require("--db")?)) };

    match command {
        "build" => build_cmd::run(
            PathBuf::from(args.require("--root")?),
            db()?,
            graph_params(args)?,
            args.get_parsed("--batch-size")?,
        ),
        "status" => status_cmd::run(db()?),
        "tree" => tree_cmd::run(
            db()?,
            args.require_parsed("--root-id")?,
            args.get_parsed("--max-depth")?,
        ),
        "delete" => delete_cmd::delete(db()?, args.require_parsed("--root-id")?),
        "wipe" => delete_cmd::wipe(db()?),
        "find-file" | "find-ast" | "find-text" | "preview" | "read" => {
            tools_cmd::run(command, db()?, args)
        }
        other => {
            print_usage();
            bail!("unknown command: {other}");
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = raw.first() else {
        print_usage();
        return ExitCode::FAILURE;
    };
    if command == "--help" || command == "-h" {
        print_usage();
        return ExitCode::SUCCESS;
    }

    let args = match Args::parse(&raw[1..]) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };

    match run(command, &args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
