//! Metric extractors.
//!
//! Each extractor is a pure function of a parsed tree, its source and the
//! language descriptor. [`measure`] runs all of them over one file.

pub mod abc;
pub mod classes;
pub mod complexity;
pub mod halstead;
pub mod loc;
pub mod units;

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::langs::LoadedLanguage;
use crate::parser::SyntaxTree;

pub use abc::Abc;
pub use classes::{ClassMetric, Nom};
pub use complexity::Complexity;
pub use halstead::Halstead;
pub use loc::FileLines;
pub use units::{FunctionUnit, UnitKind};

/// Maintainability index of a unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Maintainability {
    /// `171 - 5.2 ln(V) - 0.23 CC - 16.2 ln(LOC)`
    pub original: f64,
    /// The original rescaled to 0..=100 and clamped at 0.
    pub visual_studio: f64,
}

impl Maintainability {
    pub fn compute(volume: f64, cyclomatic: u32, lines: usize) -> Self {
        let ln_volume = if volume > 0.0 { volume.ln() } else { 0.0 };
        let ln_lines = if lines > 0 { (lines as f64).ln() } else { 0.0 };
        let original =
            halstead::finite(171.0 - 5.2 * ln_volume - 0.23 * f64::from(cyclomatic) - 16.2 * ln_lines);
        Self {
            original,
            visual_studio: (original * 100.0 / 171.0).max(0.0),
        }
    }
}

/// All measurements for one function-like unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionMetric {
    pub name: String,
    pub kind: UnitKind,
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
    /// Number of enclosing functions.
    pub scope_depth: usize,
    pub cyclomatic: u32,
    pub cognitive: u32,
    pub nesting_depth: u32,
    pub logical_lines: usize,
    pub physical_lines: usize,
    pub exits: u32,
    pub parameters: u32,
    pub halstead: Halstead,
    pub maintainability_index: Maintainability,
    #[serde(default)]
    pub abc: Abc,
}

/// Everything extracted from one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileMeasurement {
    pub functions: Vec<FunctionMetric>,
    pub lines: FileLines,
    pub classes: Vec<ClassMetric>,
}

pub fn measure(tree: &SyntaxTree, source: &[u8], lang: &LoadedLanguage) -> FileMeasurement {
    let root = tree.root();
    let units = units::function_units(root, source, lang);
    let functions: Vec<FunctionMetric> = units
        .iter()
        .map(|unit| measure_unit(unit, source, lang))
        .collect();
    let classes = classes::class_metrics(&units, &functions, source, lang);

    FileMeasurement {
        functions,
        lines: loc::file_lines(root, source, lang),
        classes,
    }
}

fn measure_unit(unit: &FunctionUnit, source: &[u8], lang: &LoadedLanguage) -> FunctionMetric {
    let flow = complexity::complexity(unit.node, lang);
    let halstead = halstead::halstead(unit.node, source, lang);
    let physical_lines = unit.span.physical_lines();

    FunctionMetric {
        name: unit.name.clone(),
        kind: unit.kind,
        start_line: unit.span.start_line,
        start_column: unit.span.start_col,
        end_line: unit.span.end_line,
        end_column: unit.span.end_col,
        scope_depth: unit.depth,
        cyclomatic: flow.cyclomatic,
        cognitive: flow.cognitive,
        nesting_depth: flow.nesting_depth,
        logical_lines: loc::unit_logical_lines(unit.node, lang),
        physical_lines,
        exits: flow.exits,
        parameters: parameter_count(unit.node, lang),
        maintainability_index: Maintainability::compute(halstead.volume, flow.cyclomatic, physical_lines),
        halstead,
        abc: abc::abc(unit.node, lang),
    }
}

fn parameter_count(unit: Node, lang: &LoadedLanguage) -> u32 {
    let Some(list) = unit.child_by_field_name("parameters") else {
        // `x => x + 1`
        return u32::from(unit.child_by_field_name("parameter").is_some());
    };

    let mut count = 0;
    let mut cursor = list.walk();
    let params: Vec<Node> = list.named_children(&mut cursor).collect();
    for param in params {
        if param.is_extra() || lang.spec.parameter_separators.contains(&param.kind()) {
            continue;
        }
        if lang.spec.grouped_parameter_kinds.contains(&param.kind()) {
            let mut names = param.walk();
            let declared = param.children_by_field_name("name", &mut names).count() as u32;
            count += declared.max(1);
        } else {
            count += 1;
        }
    }
    count
}
