//! AST-guided semantic chunking
//!
//! Extracts one chunk per semantic node (functions, classes, methods, type
//! definitions). Nested semantic nodes produce separate chunks; the outer
//! chunk keeps the nested text. Source regions not covered by any semantic
//! chunk are emitted as `module` chunks (or `comment` chunks when the region
//! is entirely comments) once they reach the minimum chunk size.

use super::language::Language;
use super::parser;
use super::{Chunk, ChunkType};
use crate::error::{Error, Result};
use tree_sitter::Node;

/// Node kinds treated as natural chunk boundaries, per language
fn semantic_node_kinds(language: Language) -> &'static [&'static str] {
    match language {
        Language::Python => &["function_definition", "class_definition", "decorated_definition"],
        Language::JavaScript => &[
            "function_declaration",
            "generator_function_declaration",
            "class_declaration",
            "method_definition",
            "arrow_function",
            "function_expression",
        ],
        Language::TypeScript | Language::TypeScriptTsx => &[
            "function_declaration",
            "generator_function_declaration",
            "class_declaration",
            "method_definition",
            "arrow_function",
            "function_expression",
            "interface_declaration",
            "type_alias_declaration",
            "enum_declaration",
        ],
        Language::Go => &["function_declaration", "method_declaration", "type_declaration"],
        Language::Rust => &[
            "function_item",
            "struct_item",
            "enum_item",
            "impl_item",
            "trait_item",
        ],
        Language::Java => &[
            "method_declaration",
            "constructor_declaration",
            "class_declaration",
            "interface_declaration",
            "enum_declaration",
        ],
        Language::C => &["function_definition", "struct_specifier", "enum_specifier"],
        Language::Cpp => &[
            "function_definition",
            "class_specifier",
            "struct_specifier",
            "enum_specifier",
            "namespace_definition",
        ],
    }
}

/// Kinds whose bodies may hold methods
fn is_class_like(kind: &str) -> bool {
    matches!(
        kind,
        "class_definition"
            | "class_declaration"
            | "class_specifier"
            | "impl_item"
            | "trait_item"
            | "interface_declaration"
            | "struct_specifier"
            | "namespace_definition"
    )
}

fn is_function_like(kind: &str) -> bool {
    matches!(
        kind,
        "function_definition"
            | "function_declaration"
            | "generator_function_declaration"
            | "function_item"
            | "arrow_function"
            | "function_expression"
    )
}

fn chunk_type_for(kind: &str, in_class: bool) -> ChunkType {
    match kind {
        k if is_function_like(k) => {
            if in_class {
                ChunkType::Method
            } else {
                ChunkType::Function
            }
        }
        "method_definition" | "method_declaration" | "constructor_declaration" => ChunkType::Method,
        "namespace_definition" => ChunkType::Module,
        _ => ChunkType::Class,
    }
}

pub struct AstChunker {
    max_chunk_size: usize,
    min_chunk_size: usize,
}

impl AstChunker {
    pub fn new(max_chunk_size: usize, min_chunk_size: usize) -> Self {
        Self {
            max_chunk_size,
            min_chunk_size,
        }
    }

    /// Semantic units smaller than `min_chunk_size` are still meaningful
    /// (a two-line function is a valid search hit), so they get a lower bar.
    fn semantic_min(&self) -> usize {
        (self.min_chunk_size / 5).max(20)
    }

    /// Chunk a file via its AST. Errors (no grammar, parse failure) are the
    /// caller's cue to fall back to the text chunker.
    pub fn chunk(&self, path: &str, content: &str, language: &str) -> Result<Vec<Chunk>> {
        let lang = Language::from_tag(language, path)
            .ok_or_else(|| Error::Parse(format!("no grammar for language '{language}'")))?;

        let tree = parser::parse(content, lang)?;
        let kinds = semantic_node_kinds(lang);

        let mut extractor = Extractor {
            path,
            content,
            language,
            kinds,
            max_chunk_size: self.max_chunk_size,
            semantic_min: self.semantic_min(),
            chunks: Vec::new(),
            covered_lines: Vec::new(),
        };
        extractor.walk(tree.root_node(), false, true);
        extractor.emit_gap_chunks(self.min_chunk_size);

        let mut chunks = extractor.chunks;

        // Nothing semantic in a non-empty file: index it whole.
        if chunks.is_empty() && !content.trim().is_empty() {
            chunks.push(Chunk {
                content: content.to_string(),
                path: path.to_string(),
                start_line: 1,
                end_line: content.lines().count().max(1),
                language: language.to_string(),
                chunk_type: ChunkType::Module,
            });
        }

        Ok(chunks)
    }
}

struct Extractor<'a> {
    path: &'a str,
    content: &'a str,
    language: &'a str,
    kinds: &'static [&'static str],
    max_chunk_size: usize,
    semantic_min: usize,
    chunks: Vec<Chunk>,
    /// 1-based line spans of top-level semantic chunks, for gap detection
    covered_lines: Vec<(usize, usize)>,
}

impl<'a> Extractor<'a> {
    fn walk(&mut self, node: Node, in_class: bool, top_level: bool) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            let kind = child.kind();
            if self.kinds.contains(&kind) {
                self.emit_semantic(child, in_class, top_level);

                // Nested semantic nodes still produce their own chunks.
                // Decorated definitions descend through the wrapped
                // definition so it is not emitted twice.
                let (descend, class_body) = if kind == "decorated_definition" {
                    match child.child_by_field_name("definition") {
                        Some(inner) => (inner, is_class_like(inner.kind())),
                        None => (child, false),
                    }
                } else {
                    (child, is_class_like(kind))
                };
                self.walk(descend, in_class || class_body, false);
            } else {
                self.walk(child, in_class, top_level);
            }
        }
    }

    fn emit_semantic(&mut self, node: Node, in_class: bool, top_level: bool) {
        let text = &self.content[node.start_byte()..node.end_byte()];
        if text.len() < self.semantic_min {
            return;
        }
        if text.len() > self.max_chunk_size {
            // A single semantic node is the unit of meaning: kept whole
            // even past max_chunk_size.
            tracing::debug!(
                path = self.path,
                len = text.len(),
                kind = node.kind(),
                "oversized semantic chunk kept whole"
            );
        }

        let start_line = node.start_position().row + 1;
        let end_line = node.end_position().row + 1;

        let kind = if node.kind() == "decorated_definition" {
            node.child_by_field_name("definition")
                .map(|n| n.kind())
                .unwrap_or("function_definition")
        } else {
            node.kind()
        };

        self.chunks.push(Chunk {
            content: text.to_string(),
            path: self.path.to_string(),
            start_line,
            end_line,
            language: self.language.to_string(),
            chunk_type: chunk_type_for(kind, in_class),
        });

        if top_level {
            self.covered_lines.push((start_line, end_line));
        }
    }

    /// Emit `module`/`comment` chunks for line regions not covered by any
    /// top-level semantic chunk (imports, constants, free-standing comments).
    fn emit_gap_chunks(&mut self, min_chunk_size: usize) {
        let lines: Vec<&str> = self.content.lines().collect();
        if lines.is_empty() {
            return;
        }

        self.covered_lines.sort_unstable();
        let mut covered = vec![false; lines.len() + 1];
        for &(start, end) in &self.covered_lines {
            for line in covered.iter_mut().take(end.min(lines.len()) + 1).skip(start) {
                *line = true;
            }
        }

        let mut gap_start: Option<usize> = None;
        for line_no in 1..=lines.len() + 1 {
            let in_gap = line_no <= lines.len() && !covered[line_no];
            match (gap_start, in_gap) {
                (None, true) => gap_start = Some(line_no),
                (Some(start), false) => {
                    self.emit_gap(&lines, start, line_no - 1, min_chunk_size);
                    gap_start = None;
                }
                _ => {}
            }
        }
    }

    fn emit_gap(&mut self, lines: &[&str], start: usize, end: usize, min_chunk_size: usize) {
        // Trim blank edges so the chunk's line span is tight
        let mut start = start;
        let mut end = end;
        while start <= end && lines[start - 1].trim().is_empty() {
            start += 1;
        }
        while end >= start && lines[end - 1].trim().is_empty() {
            end -= 1;
        }
        if start > end {
            return;
        }

        let text = lines[start - 1..end].join("\n");
        if text.len() < min_chunk_size {
            return;
        }

        let chunk_type = if region_is_comment(&lines[start - 1..end]) {
            ChunkType::Comment
        } else {
            ChunkType::Module
        };

        self.chunks.push(Chunk {
            content: text,
            path: self.path.to_string(),
            start_line: start,
            end_line: end,
            language: self.language.to_string(),
            chunk_type,
        });
    }
}

fn region_is_comment(lines: &[&str]) -> bool {
    let mut saw_comment = false;
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with("//")
            || trimmed.starts_with('#')
            || trimmed.starts_with("/*")
            || trimmed.starts_with('*')
            || trimmed.starts_with("*/")
        {
            saw_comment = true;
        } else {
            return false;
        }
    }
    saw_comment
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker() -> AstChunker {
        AstChunker::new(1500, 100)
    }

    #[test]
    fn test_python_function() {
        let content = "def foo():\n    return 1\n";
        let chunks = chunker().chunk("a.py", content, "python").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_type, ChunkType::Function);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 2);
        assert!(chunks[0].content.contains("return 1"));
    }

    #[test]
    fn test_python_class_with_methods() {
        let content = r#"
class Greeter:
    def hello(self):
        print("hello there")

    def goodbye(self):
        print("goodbye now")
"#;
        let chunks = chunker().chunk("g.py", content, "python").unwrap();
        assert!(chunks.iter().any(|c| c.chunk_type == ChunkType::Class));
        let methods: Vec<_> = chunks
            .iter()
            .filter(|c| c.chunk_type == ChunkType::Method)
            .collect();
        assert_eq!(methods.len(), 2);
        // Nested chunks stay inside the class span
        let class = chunks
            .iter()
            .find(|c| c.chunk_type == ChunkType::Class)
            .unwrap();
        for m in methods {
            assert!(m.start_line >= class.start_line && m.end_line <= class.end_line);
        }
    }

    #[test]
    fn test_python_decorated_not_duplicated() {
        let content = "@app.route('/')\ndef handler(request):\n    return respond(request)\n";
        let chunks = chunker().chunk("web.py", content, "python").unwrap();
        let functions = chunks
            .iter()
            .filter(|c| c.chunk_type == ChunkType::Function)
            .count();
        assert_eq!(functions, 1);
        assert!(chunks[0].content.starts_with("@app.route"));
    }

    #[test]
    fn test_rust_impl_methods() {
        let content = r#"
struct Point { x: i32, y: i32 }

impl Point {
    fn magnitude(&self) -> f64 {
        ((self.x * self.x + self.y * self.y) as f64).sqrt()
    }
}
"#;
        let chunks = chunker().chunk("p.rs", content, "rust").unwrap();
        assert!(chunks.iter().any(|c| c.chunk_type == ChunkType::Class));
        assert!(chunks.iter().any(|c| c.chunk_type == ChunkType::Method));
    }

    #[test]
    fn test_module_gap_chunk_for_imports() {
        let header: String = (0..12)
            .map(|i| format!("import module_{i}  # pulls in dependency number {i}\n"))
            .collect();
        let content = format!("{header}\ndef work():\n    return 42\n");
        let chunks = chunker().chunk("m.py", &content, "python").unwrap();
        assert!(chunks.iter().any(|c| c.chunk_type == ChunkType::Module));
        assert!(chunks.iter().any(|c| c.chunk_type == ChunkType::Function));
    }

    #[test]
    fn test_comment_gap_chunk() {
        let comment: String = (0..8)
            .map(|i| format!("// commentary line {i} explaining the sorting strategy\n"))
            .collect();
        let content = format!("{comment}\nfunction quicksort(xs) {{ return xs; }}\n");
        let chunks = chunker().chunk("s.js", &content, "javascript").unwrap();
        assert!(chunks.iter().any(|c| c.chunk_type == ChunkType::Comment));
    }

    #[test]
    fn test_oversized_node_kept_whole() {
        let mut body = String::from("def big():\n");
        for i in 0..200 {
            body.push_str(&format!("    value_{i} = {i} * {i}\n"));
        }
        let chunks = AstChunker::new(300, 100).chunk("big.py", &body, "python").unwrap();
        let function = chunks
            .iter()
            .find(|c| c.chunk_type == ChunkType::Function)
            .unwrap();
        assert!(function.content.len() > 300);
        assert!(function.content.contains("value_199"));
    }

    #[test]
    fn test_no_grammar_is_error() {
        assert!(chunker().chunk("doc.md", "# heading", "markdown").is_err());
    }

    #[test]
    fn test_whole_file_fallback() {
        // Parses fine but contains no semantic nodes and is under min size
        let content = "x = 1\n";
        let chunks = chunker().chunk("tiny.py", content, "python").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_type, ChunkType::Module);
        assert_eq!(chunks[0].start_line, 1);
    }
}
