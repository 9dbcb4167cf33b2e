//! ABC size: assignments, branches and conditions.
//!
//! - Assignments are assignment nodes and declarations with an initializer.
//! - Branches are call sites (Rust macro invocations included).
//! - Conditions are comparison operators plus `else` branches, cases,
//!   catches, ternaries, guards and Rust `?`.
//!
//! Nested units are measured on their own and not counted here.

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::langs::{Construct, LoadedLanguage};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Abc {
    pub assignments: u32,
    pub branches: u32,
    pub conditions: u32,
    /// `sqrt(A² + B² + C²)`
    pub magnitude: f64,
}

impl Abc {
    pub fn from_counts(assignments: u32, branches: u32, conditions: u32) -> Self {
        let (a, b, c) = (
            f64::from(assignments),
            f64::from(branches),
            f64::from(conditions),
        );
        Self {
            assignments,
            branches,
            conditions,
            magnitude: (a * a + b * b + c * c).sqrt(),
        }
    }
}

pub fn abc(unit: Node, lang: &LoadedLanguage) -> Abc {
    let (mut a, mut b, mut c) = (0, 0, 0);

    let mut stack = vec![unit];
    while let Some(node) = stack.pop() {
        if node != unit && lang.is_unit(node) {
            continue;
        }
        if node.is_extra() || node.is_missing() {
            continue;
        }
        if !node.is_named() {
            if lang.is_comparison(node) {
                c += 1;
            }
            continue;
        }

        if lang.is_assignment(node) {
            a += 1;
        }
        if lang.is_call(node) {
            b += 1;
        }
        match lang.construct(node) {
            Some(Construct::Else)
            | Some(Construct::Case)
            | Some(Construct::Catch)
            | Some(Construct::Ternary)
            | Some(Construct::Guard)
            | Some(Construct::Try) => c += 1,
            _ if lang.is_guard(node) => c += 1,
            _ => {}
        }

        let mut cursor = node.walk();
        stack.extend(node.children(&mut cursor));
    }

    Abc::from_counts(a, b, c)
}
