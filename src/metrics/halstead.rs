//! Halstead operator/operand counts and derived measures.
//!
//! Operators are the anonymous tokens of a unit (keywords and operator
//! symbols), distinguished by token kind; closing brackets and separators are
//! not counted. Operands are identifiers and literals, distinguished by their
//! text; literal nodes are atomic.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::langs::LoadedLanguage;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Halstead {
    /// n1
    pub unique_operators: u32,
    /// n2
    pub unique_operands: u32,
    /// N1
    pub total_operators: u32,
    /// N2
    pub total_operands: u32,
    pub length: u32,
    pub vocabulary: u32,
    pub volume: f64,
    pub difficulty: f64,
    pub effort: f64,
    /// Estimated seconds to write the unit.
    pub time: f64,
    /// Estimated delivered bugs.
    pub bugs: f64,
}

impl Halstead {
    pub fn from_counts(n1: u32, n2: u32, big_n1: u32, big_n2: u32) -> Self {
        let length = big_n1 + big_n2;
        let vocabulary = n1 + n2;

        let volume = if vocabulary > 0 {
            f64::from(length) * f64::from(vocabulary).log2()
        } else {
            0.0
        };
        let difficulty = if n2 > 0 {
            (f64::from(n1) / 2.0) * (f64::from(big_n2) / f64::from(n2))
        } else {
            0.0
        };
        let effort = difficulty * volume;

        Self {
            unique_operators: n1,
            unique_operands: n2,
            total_operators: big_n1,
            total_operands: big_n2,
            length,
            vocabulary,
            volume: finite(volume),
            difficulty: finite(difficulty),
            effort: finite(effort),
            time: finite(effort / 18.0),
            bugs: finite(effort.powf(2.0 / 3.0) / 3000.0),
        }
    }
}

pub(crate) fn finite(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

pub fn halstead(unit: Node, source: &[u8], lang: &LoadedLanguage) -> Halstead {
    let mut operators: HashMap<&'static str, u32> = HashMap::new();
    let mut operands: HashMap<&[u8], u32> = HashMap::new();

    let mut stack = vec![unit];
    while let Some(node) = stack.pop() {
        if node != unit && lang.is_unit(node) {
            continue;
        }
        if node.is_extra() || node.is_missing() {
            continue;
        }
        if lang.is_operand(node) {
            *operands.entry(&source[node.byte_range()]).or_default() += 1;
            continue;
        }
        if node.child_count() == 0 {
            if !node.is_named()
                && node.start_byte() < node.end_byte()
                && !lang.is_ignored_token(node.kind())
            {
                *operators.entry(node.kind()).or_default() += 1;
            }
            continue;
        }
        let mut cursor = node.walk();
        stack.extend(node.children(&mut cursor));
    }

    Halstead::from_counts(
        operators.len() as u32,
        operands.len() as u32,
        operators.values().sum(),
        operands.values().sum(),
    )
}
