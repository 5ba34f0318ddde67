//! Query preprocessing for code search recall
//!
//! Tokenizes the user query, splits code identifiers on camelCase and
//! snake_case boundaries, expands known abbreviations, and builds a
//! disjunctive FTS5 expression with prefix wildcards.

use crate::error::{CodiiError, Result};

/// Minimum length for a term to participate in the expression
const MIN_TERM_LENGTH: usize = 2;

/// Curated short forms seen constantly in code and queries
const ABBREVIATIONS: &[(&str, &[&str])] = &[
    ("ack", &["acknowledge"]),
    ("alloc", &["allocate", "allocation", "allocator"]),
    ("arg", &["argument"]),
    ("async", &["asynchronous"]),
    ("auth", &["authentication", "authorization"]),
    ("avg", &["average"]),
    ("buf", &["buffer"]),
    ("cfg", &["config", "configuration"]),
    ("char", &["character"]),
    ("cmd", &["command"]),
    ("cpu", &["processor", "central_processing_unit"]),
    ("ctx", &["context"]),
    ("cur", &["current"]),
    ("db", &["database"]),
    ("def", &["definition", "default"]),
    ("desc", &["description", "descriptor"]),
    ("dev", &["device", "development"]),
    ("dir", &["directory"]),
    ("dst", &["destination"]),
    ("env", &["environment"]),
    ("err", &["error"]),
    ("fd", &["file_descriptor"]),
    ("fn", &["function"]),
    ("func", &["function"]),
    ("gpu", &["graphics_processing_unit"]),
    ("idx", &["index"]),
    ("impl", &["implementation", "implement"]),
    ("info", &["information"]),
    ("init", &["initialize", "initialization"]),
    ("io", &["input_output"]),
    ("irq", &["interrupt", "interrupt_request"]),
    ("kalloc", &["kernel_allocate", "kernel_allocation"]),
    ("kfree", &["kernel_free", "free"]),
    ("len", &["length"]),
    ("max", &["maximum"]),
    ("mem", &["memory"]),
    ("min", &["minimum"]),
    ("mmu", &["memory_management_unit"]),
    ("msg", &["message"]),
    ("nack", &["not_acknowledge"]),
    ("num", &["number"]),
    ("pa", &["physical_address"]),
    ("param", &["parameter"]),
    ("pfn", &["page_frame_number"]),
    ("pid", &["process_id", "process_identifier"]),
    ("prev", &["previous"]),
    ("proc", &["process", "procedure"]),
    ("ptr", &["pointer"]),
    ("ram", &["random_access_memory", "memory"]),
    ("ref", &["reference"]),
    ("repo", &["repository"]),
    ("req", &["request", "requirement"]),
    ("res", &["result", "response", "resource"]),
    ("resp", &["response"]),
    ("ret", &["return"]),
    ("rom", &["read_only_memory"]),
    ("src", &["source"]),
    ("str", &["string"]),
    ("sync", &["synchronize", "synchronization"]),
    ("temp", &["temporary"]),
    ("tid", &["thread_id", "thread_identifier"]),
    ("tlb", &["translation_lookaside_buffer"]),
    ("tmp", &["temporary"]),
    ("va", &["virtual_address"]),
    ("val", &["value"]),
];

/// A processed query ready for the lexical index
#[derive(Debug, Clone)]
pub struct ProcessedQuery {
    pub original: String,
    /// Cleaned, lowercased input terms
    pub terms: Vec<String>,
    /// Terms plus identifier splits and abbreviation expansions, deduplicated
    pub expanded_terms: Vec<String>,
    /// Disjunctive FTS5 expression with prefix wildcards
    pub fts_expression: String,
}

/// Process a user query. Rejects empty queries and single-token queries of
/// length <= 2.
pub fn process_query(query: &str) -> Result<ProcessedQuery> {
    let cleaned = clean_query(query);
    let raw_terms: Vec<&str> = cleaned.split_whitespace().collect();

    if raw_terms.is_empty() {
        return Err(CodiiError::QueryTooShort(query.to_string()));
    }
    if raw_terms.len() == 1 && raw_terms[0].len() <= 2 {
        return Err(CodiiError::QueryTooShort(query.to_string()));
    }

    let mut terms = Vec::new();
    let mut expanded = Vec::new();

    for raw in &raw_terms {
        let lower = raw.to_lowercase();
        if lower.len() < MIN_TERM_LENGTH {
            continue;
        }

        terms.push(lower.clone());
        expanded.push(lower.clone());

        // Identifier splits work on the original casing
        let parts = tokenize_identifier(raw);
        if parts.len() > 1 {
            expanded.extend(parts);
        }

        if let Ok(i) = ABBREVIATIONS.binary_search_by_key(&lower.as_str(), |&(k, _)| k) {
            expanded.extend(ABBREVIATIONS[i].1.iter().map(|s| s.to_string()));
        }
    }

    if terms.is_empty() {
        return Err(CodiiError::QueryTooShort(query.to_string()));
    }

    dedup_preserving_order(&mut expanded);

    let fts_expression = expanded
        .iter()
        .map(|t| format!("{t}*"))
        .collect::<Vec<_>>()
        .join(" OR ");

    Ok(ProcessedQuery {
        original: query.to_string(),
        terms,
        expanded_terms: expanded,
        fts_expression,
    })
}

/// Strip FTS5 operators and punctuation, keeping word chars and underscores
fn clean_query(query: &str) -> String {
    let mapped: String = query
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a code identifier into constituent words. Handles camelCase,
/// PascalCase, snake_case and SCREAMING_SNAKE_CASE.
fn tokenize_identifier(identifier: &str) -> Vec<String> {
    if identifier.contains('_') {
        return identifier
            .split('_')
            .filter(|p| !p.is_empty())
            .map(|p| p.to_lowercase())
            .collect();
    }

    let has_inner_upper = identifier.chars().skip(1).any(|c| c.is_uppercase());
    if !has_inner_upper {
        return vec![identifier.to_lowercase()];
    }
    if identifier.chars().all(|c| !c.is_lowercase()) {
        return vec![identifier.to_lowercase()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    for c in identifier.chars() {
        if c.is_uppercase() && !current.is_empty() {
            parts.push(current.to_lowercase());
            current = String::new();
        }
        current.push(c);
    }
    if !current.is_empty() {
        parts.push(current.to_lowercase());
    }
    parts
}

fn dedup_preserving_order(terms: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    terms.retain(|t| seen.insert(t.clone()));
}
