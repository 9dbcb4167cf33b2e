//! Object-oriented counts: methods per file (NOM) and weighted methods per
//! class (WMC).
//!
//! A method belongs to the nearest enclosing class-like node (Python and
//! TypeScript classes, Rust `impl` and `trait` blocks). Go methods belong to
//! their receiver type. Blocks that share a name, such as several `impl`
//! blocks for one Rust type, are merged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use super::units::{FunctionUnit, UnitKind, ANONYMOUS};
use super::FunctionMetric;
use crate::langs::LoadedLanguage;

/// Number of methods: named functions and methods versus closures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nom {
    pub functions: usize,
    pub closures: usize,
}

impl Nom {
    pub fn from_functions(functions: &[FunctionMetric]) -> Self {
        let closures = functions.iter().filter(|f| f.kind == UnitKind::Lambda).count();
        Self {
            functions: functions.len() - closures,
            closures,
        }
    }

    pub fn total(&self) -> usize {
        self.functions + self.closures
    }

    pub fn add(&mut self, other: Nom) {
        self.functions += other.functions;
        self.closures += other.closures;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassMetric {
    pub name: String,
    /// Line of the first block declaring the class.
    pub start_line: usize,
    pub methods: usize,
    /// Sum of the cyclomatic complexity of the methods.
    pub wmc: u32,
}

/// Group the method units of a file by owner. `functions` must be the
/// measurements of `units`, in the same order.
pub fn class_metrics(
    units: &[FunctionUnit],
    functions: &[FunctionMetric],
    source: &[u8],
    lang: &LoadedLanguage,
) -> Vec<ClassMetric> {
    let mut classes: BTreeMap<String, ClassMetric> = BTreeMap::new();

    for (unit, function) in units.iter().zip(functions) {
        if unit.kind != UnitKind::Method {
            continue;
        }
        let Some((name, line)) = owner(unit.node, source, lang) else {
            continue;
        };
        let class = classes.entry(name.clone()).or_insert_with(|| ClassMetric {
            name,
            start_line: line,
            methods: 0,
            wmc: 0,
        });
        class.start_line = class.start_line.min(line);
        class.methods += 1;
        class.wmc += function.cyclomatic;
    }

    let mut classes: Vec<ClassMetric> = classes.into_values().collect();
    classes.sort_by(|a, b| a.start_line.cmp(&b.start_line).then_with(|| a.name.cmp(&b.name)));
    classes
}

fn owner(method: Node, source: &[u8], lang: &LoadedLanguage) -> Option<(String, usize)> {
    if let Some(receiver) = method.child_by_field_name("receiver") {
        let name = first_of_kind(receiver, "type_identifier")?;
        return Some((text(name, source), method.start_position().row + 1));
    }

    let mut current = method.parent();
    while let Some(node) = current {
        if lang.is_class(node) {
            let line = node.start_position().row + 1;
            let name = node
                .child_by_field_name("name")
                .or_else(|| node.child_by_field_name("type"))
                .map(strip_generics)
                .map(|n| text(n, source))
                .unwrap_or_else(|| format!("{}@{}", ANONYMOUS, line));
            return Some((name, line));
        }
        if lang.is_unit(node) {
            return None;
        }
        current = node.parent();
    }
    None
}

/// `Stack<T>` is named `Stack`.
fn strip_generics(node: Node) -> Node {
    if node.kind() == "generic_type" {
        if let Some(base) = node.child_by_field_name("type") {
            return base;
        }
    }
    node
}

fn first_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        if n.kind() == kind {
            return Some(n);
        }
        let mut cursor = n.walk();
        let children: Vec<Node<'t>> = n.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    None
}

fn text(node: Node, source: &[u8]) -> String {
    String::from_utf8_lossy(&source[node.byte_range()]).into_owned()
}
