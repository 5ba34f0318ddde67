//! Tree-sitter parser wrapper

use super::language::Language;
use crate::error::{Error, Result};
use tree_sitter::{Language as TsLanguage, Parser, Tree};

/// Parse source code into a tree-sitter AST
pub fn parse(source: &str, language: Language) -> Result<Tree> {
    let mut parser = Parser::new();
    let ts_language = grammar_for(language);
    parser
        .set_language(&ts_language)
        .map_err(|e| Error::Parse(e.to_string()))?;
    parser
        .parse(source, None)
        .ok_or_else(|| Error::Parse("failed to parse source".to_string()))
}

/// Every Language variant has a grammar, so this is infallible.
fn grammar_for(language: Language) -> TsLanguage {
    match language {
        Language::Python => tree_sitter_python::LANGUAGE.into(),
        Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        Language::TypeScriptTsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        Language::Go => tree_sitter_go::LANGUAGE.into(),
        Language::Rust => tree_sitter_rust::LANGUAGE.into(),
        Language::Java => tree_sitter_java::LANGUAGE.into(),
        Language::C => tree_sitter_c::LANGUAGE.into(),
        Language::Cpp => tree_sitter_cpp::LANGUAGE.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_python() {
        let tree = parse("def main():\n    print('hi')\n", Language::Python).unwrap();
        assert_eq!(tree.root_node().kind(), "module");
    }

    #[test]
    fn test_parse_rust() {
        let tree = parse("fn main() { println!(\"hi\"); }", Language::Rust).unwrap();
        assert_eq!(tree.root_node().kind(), "source_file");
    }

    #[test]
    fn test_parse_java() {
        let tree = parse("class A { void m() {} }", Language::Java).unwrap();
        assert_eq!(tree.root_node().kind(), "program");
    }

    #[test]
    fn test_parse_c() {
        let tree = parse("int main(void) { return 0; }", Language::C).unwrap();
        assert_eq!(tree.root_node().kind(), "translation_unit");
    }
}
