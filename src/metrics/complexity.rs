//! Control-flow metrics: cyclomatic and cognitive complexity, nesting depth
//! and exit points.
//!
//! All four grammars are walked through the abstract [`Construct`] table, so
//! the rules below are the same for every language.
//!
//! Cyclomatic complexity is `1 +` one for each `If`/`ElseIf`, each `Case` arm
//! (default arms included), each `Loop`, each short-circuit operator, each
//! `Catch`, each `Ternary`, each `Guard` and each Rust `?`.
//!
//! Cognitive complexity:
//! - `If`, `Switch`, `Loop`, `Catch`, `Ternary` add `1 + nesting` and raise
//!   the nesting level for their bodies. An `if` condition stays at the
//!   current level.
//! - `else if`/`elif` and `else` add a flat 1 and stay at the level of the
//!   `if` they continue.
//! - A run of the same short-circuit operator adds 1 (`a && b && c` is 1,
//!   `a && b || c` is 2).
//! - Guards, labelled `break`/`continue`, `goto` and early returns add a
//!   flat 1. Rust's `?` adds nothing. A return that closes a branch of the
//!   if-chain ending the unit is not early.
//!
//! Nested units are not entered; they are measured on their own.

use tree_sitter::Node;

use crate::langs::{Construct, LoadedLanguage};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Complexity {
    pub cyclomatic: u32,
    pub cognitive: u32,
    pub nesting_depth: u32,
    pub exits: u32,
}

pub fn complexity(unit: Node, lang: &LoadedLanguage) -> Complexity {
    let mut walker = Walker {
        lang,
        body: unit.child_by_field_name("body").map(statement_container),
        metrics: Complexity {
            cyclomatic: 1,
            ..Complexity::default()
        },
    };
    walker.children(unit, 0, 0);
    walker.metrics
}

/// Some grammar versions wrap a block's statements in a `statement_list`.
fn statement_container(body: Node) -> Node {
    let mut cursor = body.walk();
    let named: Vec<Node> = body
        .named_children(&mut cursor)
        .filter(|n| !n.is_extra())
        .collect();
    match named.as_slice() {
        [only] if only.kind() == "statement_list" => *only,
        _ => body,
    }
}

fn last_statement(body: Node) -> Option<Node> {
    let mut cursor = body.walk();
    let last = body
        .named_children(&mut cursor)
        .filter(|n| !n.is_extra())
        .last();
    last
}

struct Walker<'a, 't> {
    lang: &'a LoadedLanguage,
    body: Option<Node<'t>>,
    metrics: Complexity,
}

impl<'a, 't> Walker<'a, 't> {
    fn children(&mut self, node: Node<'t>, nesting: u32, depth: u32) {
        let mut cursor = node.walk();
        let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
        for child in children {
            self.visit(child, nesting, depth);
        }
    }

    fn visit(&mut self, node: Node<'t>, nesting: u32, depth: u32) {
        if self.lang.is_unit(node) {
            return;
        }

        match self.lang.construct(node) {
            Some(Construct::If) => self.visit_if(node, nesting, depth, false),
            Some(Construct::Loop) | Some(Construct::Catch) => {
                self.metrics.cyclomatic += 1;
                self.nested(node, nesting, depth);
            }
            Some(Construct::Switch) => self.nested(node, nesting, depth),
            Some(Construct::Ternary) => {
                self.metrics.cyclomatic += 1;
                self.metrics.cognitive += 1 + nesting;
                self.children(node, nesting + 1, depth);
            }
            Some(Construct::Case) => {
                self.metrics.cyclomatic += 1;
                self.children(node, nesting, depth);
            }
            Some(Construct::Guard) => {
                self.metrics.cyclomatic += 1;
                self.metrics.cognitive += 1;
                self.children(node, nesting, depth);
            }
            Some(Construct::Try) => {
                self.metrics.cyclomatic += 1;
                self.metrics.exits += 1;
                self.children(node, nesting, depth);
            }
            Some(Construct::Return) => {
                self.metrics.exits += 1;
                if self.is_early_return(node) {
                    self.metrics.cognitive += 1;
                }
                self.children(node, nesting, depth);
            }
            Some(Construct::Jump) => {
                if self.has_label(node) {
                    self.metrics.cognitive += 1;
                }
                self.children(node, nesting, depth);
            }
            // `else` outside an if chain (Python's for/while/try `else`).
            Some(Construct::ElseIf) | Some(Construct::Else) | None => {
                if let Some(op) = self.lang.logical_operator(node) {
                    self.metrics.cyclomatic += 1;
                    let continues_run = node
                        .parent()
                        .and_then(|p| self.lang.logical_operator(p))
                        == Some(op);
                    if !continues_run {
                        self.metrics.cognitive += 1;
                    }
                }
                if self.lang.is_guard(node) {
                    self.metrics.cyclomatic += 1;
                    self.metrics.cognitive += 1;
                }
                self.children(node, nesting, depth);
            }
        }
    }

    /// A construct that scores `1 + nesting` and nests its whole body.
    fn nested(&mut self, node: Node<'t>, nesting: u32, depth: u32) {
        self.metrics.cognitive += 1 + nesting;
        self.reach(depth + 1);
        self.children(node, nesting + 1, depth + 1);
    }

    fn visit_if(&mut self, node: Node<'t>, nesting: u32, depth: u32, else_if: bool) {
        self.metrics.cyclomatic += 1;
        self.metrics.cognitive += if else_if { 1 } else { 1 + nesting };
        self.reach(depth + 1);

        let condition = node.child_by_field_name("condition");
        let mut cursor = node.walk();
        let alternatives: Vec<Node<'t>> = node
            .children_by_field_name("alternative", &mut cursor)
            .collect();

        let mut cursor = node.walk();
        let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
        for child in children {
            if alternatives.contains(&child) {
                continue;
            }
            if Some(child) == condition {
                self.visit(child, nesting, depth);
            } else {
                self.visit(child, nesting + 1, depth + 1);
            }
        }

        for alt in alternatives {
            self.visit_alternative(alt, nesting, depth);
        }
    }

    fn visit_alternative(&mut self, alt: Node<'t>, nesting: u32, depth: u32) {
        match self.lang.construct(alt) {
            // Go: `else if` is an if_statement in the alternative field.
            Some(Construct::If) => self.visit_if(alt, nesting, depth, true),
            // Python: elif_clause carries its own condition.
            Some(Construct::ElseIf) => {
                self.metrics.cyclomatic += 1;
                self.metrics.cognitive += 1;
                let condition = alt.child_by_field_name("condition");
                let mut cursor = alt.walk();
                let children: Vec<Node<'t>> = alt.named_children(&mut cursor).collect();
                for child in children {
                    if Some(child) == condition {
                        self.visit(child, nesting, depth);
                    } else {
                        self.visit(child, nesting + 1, depth + 1);
                    }
                }
            }
            Some(Construct::Else) => match self.chained_if(alt) {
                Some(inner) => self.visit_if(inner, nesting, depth, true),
                None => {
                    self.metrics.cognitive += 1;
                    self.children(alt, nesting + 1, depth + 1);
                }
            },
            // Go: a bare block is the else branch.
            _ => {
                self.metrics.cognitive += 1;
                self.visit(alt, nesting + 1, depth + 1);
            }
        }
    }

    /// The `if` of an `else if`, when an else clause holds nothing else.
    fn chained_if(&self, else_clause: Node<'t>) -> Option<Node<'t>> {
        let mut cursor = else_clause.walk();
        let named: Vec<Node<'t>> = else_clause
            .named_children(&mut cursor)
            .filter(|n| !n.is_extra())
            .collect();
        match named.as_slice() {
            [only] if self.lang.construct(*only) == Some(Construct::If) => Some(*only),
            _ => None,
        }
    }

    fn reach(&mut self, depth: u32) {
        self.metrics.nesting_depth = self.metrics.nesting_depth.max(depth);
    }

    fn has_label(&self, node: Node<'t>) -> bool {
        let mut cursor = node.walk();
        let found = node
            .named_children(&mut cursor)
            .any(|child| self.lang.is_label(child));
        found
    }

    /// Any return that does not end the unit. A return ends the unit when it
    /// is the body's final statement, or the final statement of a branch of
    /// an if-chain that is itself in that position.
    fn is_early_return(&self, node: Node<'t>) -> bool {
        let Some(body) = self.body else {
            return true;
        };
        let mut current = node;
        while let Some(parent) = current.parent() {
            if parent == body {
                return last_statement(body) != Some(current);
            }
            if self.lang.is_unit(parent) {
                return true;
            }
            let in_tail = match self.lang.construct(parent) {
                Some(Construct::If) | Some(Construct::ElseIf) => {
                    parent.child_by_field_name("condition") != Some(current)
                }
                Some(Construct::Else) | None => last_statement(parent) == Some(current),
                Some(_) => false,
            };
            if !in_tail {
                return true;
            }
            current = parent;
        }
        true
    }
}
