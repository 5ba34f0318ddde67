//! Language detection from file extensions

use std::path::Path;

/// Languages with a tree-sitter grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    TypeScriptTsx,
    Go,
    Rust,
    Java,
    C,
    Cpp,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript | Self::TypeScriptTsx => "typescript",
            Self::Go => "go",
            Self::Rust => "rust",
            Self::Java => "java",
            Self::C => "c",
            Self::Cpp => "cpp",
        }
    }

    /// Resolve a grammar from the language tag plus the file extension
    /// (the tag alone cannot distinguish .ts from .tsx)
    pub fn from_tag(tag: &str, path: &str) -> Option<Self> {
        match tag {
            "python" => Some(Self::Python),
            "javascript" => Some(Self::JavaScript),
            "typescript" => {
                if path.ends_with(".tsx") {
                    Some(Self::TypeScriptTsx)
                } else {
                    Some(Self::TypeScript)
                }
            }
            "go" => Some(Self::Go),
            "rust" => Some(Self::Rust),
            "java" => Some(Self::Java),
            "c" => Some(Self::C),
            "cpp" => Some(Self::Cpp),
            _ => None,
        }
    }
}

/// Detect the language tag for a file from its extension.
///
/// Every indexed extension gets a tag; files with no known mapping are
/// tagged `text`. Only a subset of tags resolves to an AST grammar.
pub fn detect_language(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "py" | "pyi" => "python",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "ts" | "tsx" | "mts" | "cts" => "typescript",
        "go" => "go",
        "rs" => "rust",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" | "hxx" => "cpp",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "md" => "markdown",
        "rst" => "rst",
        "sh" | "bash" | "zsh" => "shell",
        "sql" => "sql",
        "proto" => "protobuf",
        "html" => "html",
        "css" => "css",
        "scss" => "scss",
        "less" => "less",
        _ => "text",
    }
}
