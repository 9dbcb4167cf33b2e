//! Discovery of measured units (functions, methods, lambdas).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, QueryCursor};

use crate::langs::LoadedLanguage;
use crate::parser::Span;

pub const ANONYMOUS: &str = "<anonymous>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Function,
    Method,
    Lambda,
}

impl UnitKind {
    fn rank(&self) -> u8 {
        match self {
            UnitKind::Method => 3,
            UnitKind::Function => 2,
            UnitKind::Lambda => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Function => "function",
            UnitKind::Method => "method",
            UnitKind::Lambda => "lambda",
        }
    }
}

/// One measured structural unit and the node it came from.
#[derive(Debug, Clone)]
pub struct FunctionUnit<'t> {
    pub name: String,
    pub kind: UnitKind,
    pub span: Span,
    /// How many enclosing units this one is lexically nested in.
    pub depth: usize,
    pub node: Node<'t>,
}

/// Find every unit in the tree, ordered by position.
///
/// Several patterns may capture the same node (a Python method also matches
/// the plain function pattern, a bound arrow function also matches the bare
/// lambda pattern). Those are merged: the more specific kind wins, and a
/// captured name wins over none.
pub fn function_units<'t>(
    root: Node<'t>,
    source: &[u8],
    lang: &LoadedLanguage,
) -> Vec<FunctionUnit<'t>> {
    let query = &lang.function_query;
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, root, source);

    let mut found: HashMap<usize, (Node<'t>, UnitKind, Option<String>)> = HashMap::new();

    while let Some(m) = matches.next() {
        let mut unit = None;
        let mut name = None;

        for capture in m.captures {
            match query.capture_names()[capture.index as usize] {
                "function" => unit = Some((capture.node, UnitKind::Function)),
                "method" => unit = Some((capture.node, UnitKind::Method)),
                "lambda" => unit = Some((capture.node, UnitKind::Lambda)),
                "name" => {
                    name = capture
                        .node
                        .utf8_text(source)
                        .ok()
                        .map(|s| s.to_string())
                        .filter(|s| !s.is_empty())
                }
                _ => {}
            }
        }

        let Some((node, kind)) = unit else {
            continue;
        };

        found
            .entry(node.id())
            .and_modify(|(_, prev_kind, prev_name)| {
                if kind.rank() > prev_kind.rank() {
                    *prev_kind = kind;
                }
                if prev_name.is_none() {
                    *prev_name = name.clone();
                }
            })
            .or_insert((node, kind, name));
    }

    let mut units: Vec<FunctionUnit<'t>> = found
        .into_values()
        .map(|(node, kind, name)| FunctionUnit {
            name: name.unwrap_or_else(|| ANONYMOUS.to_string()),
            kind,
            span: Span::from_node(node),
            depth: enclosing_units(node, lang),
            node,
        })
        .collect();

    units.sort_by_key(|u| (u.span.start_byte, u.span.end_byte));
    units
}

fn enclosing_units(node: Node, lang: &LoadedLanguage) -> usize {
    let mut depth = 0;
    let mut current = node.parent();
    while let Some(parent) = current {
        if lang.is_unit(parent) {
            depth += 1;
        }
        current = parent.parent();
    }
    depth
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::langs::{self, LanguageId};
    use crate::parser;

    fn units_of(id: LanguageId, src: &str) -> Vec<(String, UnitKind, usize)> {
        let lang = langs::load(id).unwrap();
        let tree = parser::parse(lang, src.as_bytes()).unwrap();
        function_units(tree.root(), src.as_bytes(), lang)
            .into_iter()
            .map(|u| (u.name, u.kind, u.depth))
            .collect()
    }

    #[test]
    fn test_go_units() {
        let src = r#"
package main

type S struct{}

func (s *S) Run() {
    f := func() {}
    f()
}

func main() {}
"#;
        let units = units_of(LanguageId::Go, src);
        assert_eq!(
            units,
            vec![
                ("Run".to_string(), UnitKind::Method, 0),
                (ANONYMOUS.to_string(), UnitKind::Lambda, 1),
                ("main".to_string(), UnitKind::Function, 0),
            ]
        );
    }

    #[test]
    fn test_python_methods_and_lambdas() {
        let src = r#"
class Greeter:
    def hello(self):
        return "hi"

    @staticmethod
    def build():
        pass

def top():
    square = lambda x: x * x
    return square(2)
"#;
        let units = units_of(LanguageId::Python, src);
        assert_eq!(units.len(), 4, "got {:?}", units);
        assert_eq!(units[0], ("hello".to_string(), UnitKind::Method, 0));
        assert_eq!(units[1], ("build".to_string(), UnitKind::Method, 0));
        assert_eq!(units[2], ("top".to_string(), UnitKind::Function, 0));
        assert_eq!(units[3], ("square".to_string(), UnitKind::Lambda, 1));
    }

    #[test]
    fn test_rust_impl_methods() {
        let src = r#"
struct Config;

impl Config {
    fn validate(&self) -> bool {
        let check = |x: i32| x > 0;
        check(1)
    }
}

fn free() {}
"#;
        let units = units_of(LanguageId::Rust, src);
        assert_eq!(
            units,
            vec![
                ("validate".to_string(), UnitKind::Method, 0),
                ("check".to_string(), UnitKind::Lambda, 1),
                ("free".to_string(), UnitKind::Function, 0),
            ]
        );
    }

    #[test]
    fn test_typescript_units() {
        let src = r#"
function load(path: string): string { return path; }

const handler = (req: Request) => { return req; };

class Service {
  start(): void {
    [1, 2].forEach(function (n) { console.log(n); });
  }
}
"#;
        let units = units_of(LanguageId::Typescript, src);
        assert_eq!(
            units,
            vec![
                ("load".to_string(), UnitKind::Function, 0),
                ("handler".to_string(), UnitKind::Lambda, 0),
                ("start".to_string(), UnitKind::Method, 0),
                (ANONYMOUS.to_string(), UnitKind::Lambda, 1),
            ]
        );
    }
}
