//! Parser adapter.
//!
//! Turns raw bytes into a tree-sitter tree plus the list of syntax errors the
//! grammar recovered from. A file only fails outright when no tree can be
//! produced at all: undecodable bytes, or the parser giving up.

use serde::{Deserialize, Serialize};
use std::fmt;
use tree_sitter::{Node, Tree};

use crate::error::{Error, Result};
use crate::langs::LoadedLanguage;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Source location span with byte offsets and line/column positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    /// Start line (1-indexed).
    pub start_line: usize,
    /// Start column (1-indexed).
    pub start_col: usize,
    /// End line (1-indexed).
    pub end_line: usize,
    /// End column (1-indexed).
    pub end_col: usize,
    pub start_byte: usize,
    pub end_byte: usize,
}

impl Span {
    /// Create a span from a tree-sitter node.
    pub fn from_node(node: Node) -> Self {
        let start = node.start_position();
        let end = node.end_position();
        Self {
            start_line: start.row + 1, // tree-sitter is 0-indexed
            start_col: start.column + 1,
            end_line: end.row + 1,
            end_col: end.column + 1,
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
        }
    }

    /// Number of source lines the span touches.
    pub fn physical_lines(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start_line, self.start_col)
    }
}

/// How the source bytes were encoded on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    Utf8,
    Utf8Bom,
}

/// Validate source bytes and strip a UTF-8 byte order mark.
///
/// UTF-16/32 input, NUL bytes (binary files) and invalid UTF-8 cannot be
/// handed to the grammars and are parse failures.
pub fn decode(mut bytes: Vec<u8>) -> Result<(Vec<u8>, Encoding)> {
    let mut encoding = Encoding::Utf8;
    if bytes.starts_with(UTF8_BOM) {
        bytes.drain(..UTF8_BOM.len());
        encoding = Encoding::Utf8Bom;
    } else if bytes.starts_with(&[0xFF, 0xFE]) || bytes.starts_with(&[0xFE, 0xFF]) {
        return Err(Error::parse_failure("UTF-16/32 encoded source is not supported"));
    }

    if let Some(pos) = bytes.iter().position(|b| *b == 0) {
        return Err(Error::parse_failure(format!(
            "binary content (NUL byte at offset {})",
            pos
        )));
    }

    if let Err(e) = std::str::from_utf8(&bytes) {
        return Err(Error::parse_failure(format!(
            "invalid UTF-8 at byte offset {}",
            e.valid_up_to()
        )));
    }

    Ok((bytes, encoding))
}

/// A syntax error recovered by the grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxError {
    pub byte_offset: usize,
    /// 1-indexed.
    pub line: usize,
    /// 1-indexed.
    pub column: usize,
    pub message: String,
}

/// A parsed file: the tree plus the errors found in it.
pub struct SyntaxTree {
    tree: Tree,
    errors: Vec<SyntaxError>,
}

impl SyntaxTree {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn errors(&self) -> &[SyntaxError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// The recovery error summarizing this tree's syntax errors, if any.
    pub fn recovery_error(&self) -> Option<Error> {
        self.errors.first().map(|first| Error::SyntaxRecovery {
            count: self.errors.len(),
            line: first.line,
        })
    }
}

/// Parse decoded source with the given grammar.
///
/// A fresh `tree_sitter::Parser` is created per call: parsers are not `Sync`
/// and creating one is cheap next to parsing.
pub fn parse(lang: &LoadedLanguage, source: &[u8]) -> Result<SyntaxTree> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&lang.language)
        .map_err(|e| Error::GrammarLoad {
            language: lang.id.grammar_name().to_string(),
            reason: e.to_string(),
        })?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| Error::parse_failure(format!("{} parser produced no tree", lang.id.grammar_name())))?;

    let errors = collect_errors(tree.root_node());
    Ok(SyntaxTree { tree, errors })
}

/// Collect ERROR and MISSING nodes in document order.
///
/// Only subtrees flagged with `has_error` are entered, and an ERROR node is
/// reported once without descending into it.
fn collect_errors(root: Node) -> Vec<SyntaxError> {
    let mut errors = Vec::new();
    if !root.has_error() {
        return errors;
    }

    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() {
            errors.push(syntax_error(node, "unexpected syntax".to_string()));
            continue;
        }
        if node.is_missing() {
            errors.push(syntax_error(node, format!("missing `{}`", node.kind())));
            continue;
        }
        if !node.has_error() {
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        // Reverse so the stack pops in document order.
        stack.extend(children.into_iter().rev());
    }

    errors
}

fn syntax_error(node: Node, message: String) -> SyntaxError {
    let pos = node.start_position();
    SyntaxError {
        byte_offset: node.start_byte(),
        line: pos.row + 1,
        column: pos.column + 1,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::langs::{self, LanguageId};

    fn parse_str(id: LanguageId, src: &str) -> SyntaxTree {
        let lang = langs::load(id).unwrap();
        parse(lang, src.as_bytes()).unwrap()
    }

    #[test]
    fn test_clean_parse_has_no_errors() {
        let tree = parse_str(LanguageId::Go, "package main\n\nfunc main() {}\n");
        assert!(!tree.has_errors());
        assert!(tree.recovery_error().is_none());
        assert_eq!(tree.root().kind(), "source_file");
    }

    #[test]
    fn test_syntax_errors_are_recovered() {
        let tree = parse_str(
            LanguageId::Python,
            "def ok():\n    return 1\n\ndef broken(:\n    pass\n",
        );
        assert!(tree.has_errors(), "broken def should produce an error node");
        let first = &tree.errors()[0];
        assert!(first.line >= 4, "error should point at the broken def, got {:?}", first);
        assert!(matches!(
            tree.recovery_error(),
            Some(Error::SyntaxRecovery { .. })
        ));
    }

    #[test]
    fn test_missing_node_reported() {
        let tree = parse_str(LanguageId::Rust, "fn f() { let x = 1 }\n");
        assert!(tree.has_errors());
    }

    #[test]
    fn test_deterministic_parse() {
        let src = "fn f(x: i32) -> i32 { if x > 0 { x } else { -x } }\n";
        let a = parse_str(LanguageId::Rust, src);
        let b = parse_str(LanguageId::Rust, src);
        assert_eq!(a.root().to_sexp(), b.root().to_sexp());
    }

    #[test]
    fn test_decode_strips_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"x = 1\n");
        let (decoded, enc) = decode(bytes).unwrap();
        assert_eq!(decoded, b"x = 1\n");
        assert_eq!(enc, Encoding::Utf8Bom);
    }

    #[test]
    fn test_decode_rejects_binary_and_utf16() {
        assert!(matches!(
            decode(vec![b'a', 0, b'b']),
            Err(Error::ParseFailure { .. })
        ));
        assert!(matches!(
            decode(vec![0xFF, 0xFE, b'a', 0]),
            Err(Error::ParseFailure { .. })
        ));
        assert!(matches!(
            decode(vec![b'a', 0xC3, 0x28]),
            Err(Error::ParseFailure { .. })
        ));
    }

    #[test]
    fn test_span_from_node() {
        let tree = parse_str(LanguageId::Go, "package main\n\nfunc main() {\n}\n");
        let func = tree.root().named_child(1).unwrap();
        let span = Span::from_node(func);
        assert_eq!(span.start_line, 3);
        assert_eq!(span.end_line, 4);
        assert_eq!(span.physical_lines(), 2);
        assert_eq!(span.to_string(), "3:1");
    }
}
