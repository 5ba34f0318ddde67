//! MCP tool definitions and handlers

use crate::protocol::{ToolDefinition, ToolResult};
use anyhow::Result;
use codii_core::{IndexOutcome, IndexRequest, IndexStatus, Indexer, Splitter};
use serde_json::Value;
use std::path::PathBuf;

/// Long chunk contents are truncated in tool output
const MAX_DISPLAY_CHARS: usize = 5000;

pub fn index_codebase_definition() -> ToolDefinition {
    ToolDefinition {
        name: "index_codebase".to_string(),
        description: "Index a codebase for search. Incremental: only changed files are \
                      re-processed. Use force=true only to rebuild a corrupted index."
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute path to the codebase to index"
                },
                "force": {
                    "type": "boolean",
                    "default": false,
                    "description": "Clear the existing index and re-index from scratch"
                },
                "splitter": {
                    "type": "string",
                    "enum": ["ast", "text"],
                    "default": "ast",
                    "description": "Code splitting method"
                },
                "customExtensions": {
                    "type": "array",
                    "items": {"type": "string"},
                    "default": [],
                    "description": "Additional file extensions to index"
                },
                "ignorePatterns": {
                    "type": "array",
                    "items": {"type": "string"},
                    "default": [],
                    "description": "Additional patterns to ignore (gitignore syntax)"
                }
            },
            "required": ["path"]
        }),
    }
}

pub fn search_code_definition() -> ToolDefinition {
    ToolDefinition {
        name: "search_code".to_string(),
        description: "Search an indexed codebase with hybrid lexical + semantic retrieval"
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute path to the indexed codebase"
                },
                "query": {
                    "type": "string",
                    "description": "Search query"
                },
                "limit": {
                    "type": "number",
                    "default": 10,
                    "maximum": 50,
                    "description": "Maximum number of results"
                },
                "extensionFilter": {
                    "type": "array",
                    "items": {"type": "string"},
                    "default": [],
                    "description": "Filter by file extensions (e.g. ['.py', '.js'])"
                },
                "rerank": {
                    "type": "boolean",
                    "default": true,
                    "description": "Enable cross-encoder reranking"
                }
            },
            "required": ["path", "query"]
        }),
    }
}

pub fn get_indexing_status_definition() -> ToolDefinition {
    ToolDefinition {
        name: "get_indexing_status".to_string(),
        description: "Get indexing status and progress for a codebase".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute path to the codebase"
                }
            },
            "required": ["path"]
        }),
    }
}

pub fn clear_index_definition() -> ToolDefinition {
    ToolDefinition {
        name: "clear_index".to_string(),
        description: "Remove a codebase's index, vectors and tracking state".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute path to the codebase"
                }
            },
            "required": ["path"]
        }),
    }
}

fn required_path(arguments: &Value) -> Result<PathBuf> {
    arguments
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("missing required argument: path"))
}

fn string_array(arguments: &Value, key: &str) -> Vec<String> {
    arguments
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub fn handle_index_codebase(indexer: &Indexer, arguments: Value) -> Result<ToolResult> {
    let path = required_path(&arguments)?;
    let force = arguments
        .get("force")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let splitter = arguments
        .get("splitter")
        .and_then(|v| v.as_str())
        .map(|s| {
            Splitter::parse(s).ok_or_else(|| anyhow::anyhow!("unknown splitter: {s}"))
        })
        .transpose()?
        .unwrap_or_default();

    let request = IndexRequest {
        force,
        splitter,
        custom_extensions: string_array(&arguments, "customExtensions"),
        ignore_patterns: string_array(&arguments, "ignorePatterns"),
    };

    match indexer.index(&path, request) {
        Ok(IndexOutcome::Accepted) => Ok(ToolResult::text(format!(
            "Indexing started for {}. Use get_indexing_status to check progress.",
            path.display()
        ))),
        Ok(IndexOutcome::NoChanges) => Ok(ToolResult::text(format!(
            "Codebase already indexed at {}. No changes detected. Use force=true to re-index.",
            path.display()
        ))),
        Err(e) => Ok(ToolResult::error(format!("Error: {e}"))),
    }
}

pub fn handle_search_code(indexer: &Indexer, arguments: Value) -> Result<ToolResult> {
    let path = required_path(&arguments)?;
    let query = arguments
        .get("query")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("missing required argument: query"))?;
    let limit = arguments
        .get("limit")
        .and_then(|v| v.as_u64())
        .unwrap_or(10) as usize;
    let rerank = arguments
        .get("rerank")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    let extension_filter = string_array(&arguments, "extensionFilter");
    let filter = if extension_filter.is_empty() {
        None
    } else {
        Some(extension_filter.as_slice())
    };

    let results = match indexer.search(&path, query, limit, filter, rerank) {
        Ok(results) => results,
        Err(e) => return Ok(ToolResult::error(format!("Error: {e}"))),
    };

    let still_indexing = indexer
        .status(&path)
        .map(|s| s.status == IndexStatus::Indexing)
        .unwrap_or(false);

    if results.is_empty() {
        let mut message = format!("No results found for query: '{query}'");
        if still_indexing {
            message.push_str("\n\nNote: indexing is still in progress, results may be incomplete.");
        }
        return Ok(ToolResult::text(message));
    }

    let mut lines = Vec::with_capacity(results.len());
    for result in &results {
        let mut content = result.content.as_str();
        if content.len() > MAX_DISPLAY_CHARS {
            let mut cut = MAX_DISPLAY_CHARS;
            while !content.is_char_boundary(cut) {
                cut -= 1;
            }
            content = &content[..cut];
        }
        let truncated = if content.len() < result.content.len() {
            "\n... (truncated)"
        } else {
            ""
        };
        lines.push(format!(
            "Code snippet ({}) [chunk_type: {}]\nLocation: {}:{}-{}\nRank: {}\nContext:\n```\n{}{}\n```\n",
            result.language,
            result.chunk_type,
            result.path,
            result.start_line,
            result.end_line,
            result.rank,
            content,
            truncated,
        ));
    }
    if still_indexing {
        lines.push("Note: indexing is still in progress, results may be incomplete.".to_string());
    }

    Ok(ToolResult::text(lines.join("\n")))
}

pub fn handle_get_indexing_status(indexer: &Indexer, arguments: Value) -> Result<ToolResult> {
    let path = required_path(&arguments)?;
    let status = indexer.status(&path)?;
    Ok(ToolResult::text(serde_json::to_string_pretty(&status)?))
}

pub fn handle_clear_index(indexer: &Indexer, arguments: Value) -> Result<ToolResult> {
    let path = required_path(&arguments)?;
    indexer.clear(&path)?;
    Ok(ToolResult::text(format!(
        "Cleared index for {}.",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use codii_core::{CodiiConfig, HashEmbedder};
    use std::sync::Arc;

    fn test_indexer(base: &std::path::Path) -> Indexer {
        let config = CodiiConfig {
            base_dir: base.join("codii-home"),
            ..CodiiConfig::default()
        };
        Indexer::with_models(config, Arc::new(HashEmbedder::new(32)), None)
    }

    #[test]
    fn test_tool_definitions_have_schemas() {
        for def in [
            index_codebase_definition(),
            search_code_definition(),
            get_indexing_status_definition(),
            clear_index_definition(),
        ] {
            assert!(def.input_schema.get("properties").is_some());
            assert!(def
                .input_schema
                .get("required")
                .and_then(|r| r.as_array())
                .is_some_and(|r| !r.is_empty()));
        }
    }

    #[test]
    fn test_status_of_unknown_codebase_is_not_found() {
        let temp = tempfile::TempDir::new().unwrap();
        let indexer = test_indexer(temp.path());

        let result = handle_get_indexing_status(
            &indexer,
            serde_json::json!({"path": "/nowhere/in/particular"}),
        )
        .unwrap();
        assert!(result.is_error.is_none());
        match &result.content[0] {
            crate::protocol::Content::Text { text } => {
                assert!(text.contains("not_found"));
            }
        }
    }

    #[test]
    fn test_missing_path_argument_is_an_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let indexer = test_indexer(temp.path());
        assert!(handle_index_codebase(&indexer, serde_json::json!({})).is_err());
    }

    #[test]
    fn test_index_and_search_roundtrip() {
        let temp = tempfile::TempDir::new().unwrap();
        let repo = temp.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        std::fs::write(
            repo.join("lib.py"),
            "def resolve_widget(name):\n    return registry[name]\n",
        )
        .unwrap();

        let indexer = test_indexer(temp.path());
        let result = handle_index_codebase(
            &indexer,
            serde_json::json!({"path": repo.to_string_lossy()}),
        )
        .unwrap();
        assert!(result.is_error.is_none());
        indexer.wait(&repo).unwrap();

        let result = handle_search_code(
            &indexer,
            serde_json::json!({"path": repo.to_string_lossy(), "query": "resolve_widget"}),
        )
        .unwrap();
        match &result.content[0] {
            crate::protocol::Content::Text { text } => {
                assert!(text.contains("lib.py"));
                assert!(text.contains("chunk_type: function"));
            }
        }
    }
}
