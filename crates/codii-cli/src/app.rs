//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "codii")]
#[command(author, version, about = "Local code indexing and hybrid search")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "cli")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Cli,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Index a codebase (incremental unless --force)
    Index(IndexArgs),

    /// Search an indexed codebase
    Search(SearchArgs),

    /// Show indexing status (all codebases when no path given)
    Status(StatusArgs),

    /// Remove a codebase's index
    Clear(ClearArgs),

    /// Start MCP server on stdio
    Mcp,
}

#[derive(Args)]
pub struct IndexArgs {
    /// Absolute path to the codebase
    pub path: PathBuf,

    /// Clear the existing index and re-index from scratch
    #[arg(long)]
    pub force: bool,

    /// Chunking strategy
    #[arg(long, value_enum, default_value = "ast")]
    pub splitter: SplitterArg,

    /// Additional file extensions to index (e.g. --ext zig --ext vue)
    #[arg(long = "ext")]
    pub extensions: Vec<String>,

    /// Additional ignore patterns (gitignore syntax)
    #[arg(long = "ignore")]
    pub ignore_patterns: Vec<String>,

    /// Block until indexing completes instead of returning immediately
    #[arg(long)]
    pub wait: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SplitterArg {
    Ast,
    Text,
}

impl From<SplitterArg> for codii_core::Splitter {
    fn from(value: SplitterArg) -> Self {
        match value {
            SplitterArg::Ast => Self::Ast,
            SplitterArg::Text => Self::Text,
        }
    }
}

#[derive(Args)]
pub struct SearchArgs {
    /// Absolute path to the indexed codebase
    pub path: PathBuf,

    /// Search query
    #[arg(required = true)]
    pub query: Vec<String>,

    /// Maximum number of results
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Filter results by file extension (e.g. --ext py)
    #[arg(long = "ext")]
    pub extension_filter: Vec<String>,

    /// Disable cross-encoder reranking
    #[arg(long)]
    pub no_rerank: bool,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Codebase path; omit to list every tracked codebase
    pub path: Option<PathBuf>,
}

#[derive(Args)]
pub struct ClearArgs {
    /// Codebase path
    pub path: PathBuf,
}
