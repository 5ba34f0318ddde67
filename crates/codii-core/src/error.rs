//! Error types for codii

use thiserror::Error;

/// Result type alias using CodiiError
pub type Result<T> = std::result::Result<T, CodiiError>;

/// Error type alias for convenience
pub type Error = CodiiError;

/// Exit codes for CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const INVALID_INPUT: i32 = 2;
    pub const NOT_INDEXED: i32 = 3;
}

/// Main error type for codii
#[derive(Debug, Error)]
pub enum CodiiError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Walk directory error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Ignore pattern error: {0}")]
    IgnorePattern(#[from] ignore::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Codebase not indexed: {0}")]
    NotIndexed(String),

    #[error("Query too short: {0}")]
    QueryTooShort(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Vector index error: {0}")]
    Vector(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Indexing cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CodiiError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::InvalidInput(_) | Self::QueryTooShort(_) => {
                exit_codes::INVALID_INPUT
            }
            Self::NotIndexed(_) => exit_codes::NOT_INDEXED,
            _ => exit_codes::GENERAL_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            CodiiError::Config("bad".into()).exit_code(),
            exit_codes::INVALID_INPUT
        );
        assert_eq!(
            CodiiError::NotIndexed("/repo".into()).exit_code(),
            exit_codes::NOT_INDEXED
        );
        assert_eq!(
            CodiiError::Search("boom".into()).exit_code(),
            exit_codes::GENERAL_ERROR
        );
    }
}
