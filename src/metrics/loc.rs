//! Line metrics.
//!
//! Logical lines are statement nodes. Comment, code and blank lines are only
//! counted per file; a line holding code and a trailing comment counts as
//! both.

use serde::{Deserialize, Serialize};
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, QueryCursor};

use crate::langs::LoadedLanguage;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLines {
    pub total: usize,
    pub code: usize,
    pub comment: usize,
    pub blank: usize,
    pub logical: usize,
}

/// Logical lines of one unit, not counting nested units' bodies.
pub fn unit_logical_lines(unit: Node, lang: &LoadedLanguage) -> usize {
    count_statements(unit, lang, true)
}

fn count_statements(root: Node, lang: &LoadedLanguage, stop_at_units: bool) -> usize {
    let mut count = 0;
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if lang.is_statement(child) {
                count += 1;
            }
            if stop_at_units && lang.is_unit(child) {
                continue;
            }
            stack.push(child);
        }
        if lang.spec.tail_expressions && node.kind() == "block" && has_tail_expression(node, lang) {
            count += 1;
        }
    }
    count
}

/// A Rust block ending in an expression without a semicolon.
fn has_tail_expression(block: Node, lang: &LoadedLanguage) -> bool {
    let mut cursor = block.walk();
    let last = block
        .named_children(&mut cursor)
        .filter(|n| !n.is_extra())
        .last();
    match last {
        Some(node) => !lang.is_statement(node) && !lang.is_label(node),
        None => false,
    }
}

pub fn file_lines(root: Node, source: &[u8], lang: &LoadedLanguage) -> FileLines {
    let total = line_count(source);
    let mut comment = vec![false; total];
    let mut code = vec![false; total];

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&lang.comment_query, root, source);
    while let Some(m) = matches.next() {
        for capture in m.captures {
            mark(&mut comment, capture.node);
        }
    }

    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_extra() || node.is_missing() {
            continue;
        }
        if lang.spec.docstrings && is_docstring(node) {
            mark(&mut comment, node);
            continue;
        }
        if node.child_count() == 0 {
            if node.start_byte() < node.end_byte() && !matches!(node.kind(), "\n" | "\0") {
                mark(&mut code, node);
            }
            continue;
        }
        let mut cursor = node.walk();
        stack.extend(node.children(&mut cursor));
    }

    let blank = source
        .split(|b| *b == b'\n')
        .take(total)
        .enumerate()
        .filter(|(i, line)| !code[*i] && !comment[*i] && line.iter().all(|b| b.is_ascii_whitespace()))
        .count();

    FileLines {
        total,
        code: code.iter().filter(|c| **c).count(),
        comment: comment.iter().filter(|c| **c).count(),
        blank,
        logical: count_statements(root, lang, false),
    }
}

/// A statement consisting of nothing but a string literal.
fn is_docstring(node: Node) -> bool {
    if node.kind() != "expression_statement" {
        return false;
    }
    let mut cursor = node.walk();
    let named: Vec<Node> = node
        .named_children(&mut cursor)
        .filter(|n| !n.is_extra())
        .collect();
    matches!(named.as_slice(), [only] if matches!(only.kind(), "string" | "concatenated_string"))
}

fn line_count(source: &[u8]) -> usize {
    if source.is_empty() {
        return 0;
    }
    let newlines = source.iter().filter(|b| **b == b'\n').count();
    if source.ends_with(b"\n") {
        newlines
    } else {
        newlines + 1
    }
}

fn mark(lines: &mut [bool], node: Node) {
    let start = node.start_position();
    let end = node.end_position();
    let mut last = end.row;
    // A node ending at column 0 stops before that line.
    if end.column == 0 && end.row > start.row {
        last -= 1;
    }
    for row in start.row..=last {
        if let Some(slot) = lines.get_mut(row) {
            *slot = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::langs::{self, LanguageId};
    use crate::metrics::units::function_units;
    use crate::parser;

    fn lines_of(id: LanguageId, src: &str) -> FileLines {
        let lang = langs::load(id).unwrap();
        let tree = parser::parse(lang, src.as_bytes()).unwrap();
        file_lines(tree.root(), src.as_bytes(), lang)
    }

    fn first_unit_logical(id: LanguageId, src: &str) -> usize {
        let lang = langs::load(id).unwrap();
        let tree = parser::parse(lang, src.as_bytes()).unwrap();
        let units = function_units(tree.root(), src.as_bytes(), lang);
        unit_logical_lines(units[0].node, lang)
    }

    #[test]
    fn test_line_count() {
        assert_eq!(line_count(b""), 0);
        assert_eq!(line_count(b"a"), 1);
        assert_eq!(line_count(b"a\n"), 1);
        assert_eq!(line_count(b"a\n\nb"), 3);
    }

    #[test]
    fn test_go_file_lines() {
        let src = "package main\n\n// Entry point.\nfunc main() { // start\n\tx := 1\n\t_ = x\n}\n";
        let lines = lines_of(LanguageId::Go, src);
        assert_eq!(lines.total, 7);
        assert_eq!(lines.blank, 1);
        assert_eq!(lines.comment, 2);
        assert_eq!(lines.code, 5);
        // short_var_declaration + assignment_statement
        assert_eq!(lines.logical, 2);
    }

    #[test]
    fn test_python_docstring_is_comment() {
        let src = "def f():\n    \"\"\"Say hi.\n\n    Twice.\n    \"\"\"\n    return 1\n";
        let lines = lines_of(LanguageId::Python, src);
        assert_eq!(lines.comment, 4);
        assert_eq!(lines.code, 2);
        assert_eq!(lines.blank, 0);
    }

    #[test]
    fn test_rust_tail_expression_counts() {
        let src = "fn f(x: i32) -> i32 {\n    let y = x * 2;\n    y + 1\n}\n";
        assert_eq!(first_unit_logical(LanguageId::Rust, src), 2);
    }

    #[test]
    fn test_unit_logical_lines_skip_nested_units() {
        let src = r#"
function outer() {
  const a = 1;
  const inner = () => {
    const b = 2;
    return b;
  };
  return inner() + a;
}
"#;
        assert_eq!(first_unit_logical(LanguageId::Typescript, src), 3);
    }
}
