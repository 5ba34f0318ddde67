//! Code chunking
//!
//! Two chunkers share one contract: given file content, a repo-relative
//! path and a language tag, produce chunks with 1-based line spans and a
//! chunk type. The AST chunker extracts semantic units via tree-sitter and
//! falls back to the text chunker when no grammar is available or parsing
//! fails.

pub mod ast;
pub mod language;
pub mod parser;
pub mod text;

pub use ast::AstChunker;
pub use language::{detect_language, Language};
pub use text::TextChunker;

use crate::config::CodiiConfig;
use serde::{Deserialize, Serialize};

/// Type of a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Function,
    Class,
    Method,
    Module,
    Comment,
    Text,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Method => "method",
            Self::Module => "module",
            Self::Comment => "comment",
            Self::Text => "text",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "function" => Self::Function,
            "class" => Self::Class,
            "method" => Self::Method,
            "module" => Self::Module,
            "comment" => Self::Comment,
            _ => Self::Text,
        }
    }
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contiguous region of a source file, the unit of indexing and retrieval
#[derive(Debug, Clone)]
pub struct Chunk {
    pub content: String,
    /// Repo-relative path of the source file
    pub path: String,
    /// 1-based, inclusive
    pub start_line: usize,
    /// 1-based, inclusive, >= start_line
    pub end_line: usize,
    /// Short language tag, empty when unknown
    pub language: String,
    pub chunk_type: ChunkType,
}

/// Which chunking strategy to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Splitter {
    #[default]
    Ast,
    Text,
}

impl Splitter {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ast" => Some(Self::Ast),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Front door for chunking: dispatches to the AST or text chunker
pub struct Chunker {
    splitter: Splitter,
    ast: AstChunker,
    text: TextChunker,
}

impl Chunker {
    pub fn new(splitter: Splitter, config: &CodiiConfig) -> Self {
        Self {
            splitter,
            ast: AstChunker::new(config.max_chunk_size, config.min_chunk_size),
            text: TextChunker::new(
                config.max_chunk_size,
                config.min_chunk_size,
                config.chunk_overlap,
            ),
        }
    }

    /// Split file content into chunks. Never fails: AST parse errors fall
    /// back to text chunking for that file.
    pub fn chunk(&self, path: &str, content: &str, language: &str) -> Vec<Chunk> {
        match self.splitter {
            Splitter::Ast => self.ast.chunk(path, content, language).unwrap_or_else(|e| {
                tracing::debug!(
                    error = %e,
                    path,
                    language,
                    "AST chunking failed, falling back to text chunker"
                );
                self.text.chunk(path, content, language)
            }),
            Splitter::Text => self.text.chunk(path, content, language),
        }
    }
}
