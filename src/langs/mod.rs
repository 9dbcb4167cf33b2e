//! Language registry.
//!
//! Every supported language is described by a static [`LanguageSpec`]: the
//! grammar, the tree-sitter queries the extractors run, and tables mapping
//! grammar node kinds onto the abstract [`Construct`] categories. Extractors
//! only ever see the abstract categories, so adding a language means adding
//! one descriptor module here.
//!
//! Grammars and queries are compiled once per process and cached in
//! `OnceCell` statics; a [`LanguageRegistry`] is the per-run view that applies
//! the `--lang` filter and records which grammars failed to load.

mod go;
mod python;
mod rust_lang;
mod sniff;
mod typescript;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use tree_sitter::{Language, Node, Query};

use crate::error::{Error, Result};

pub use sniff::{classify, SAMPLE_LEN};

/// Grammar-level language identifier.
///
/// TypeScript and TSX are distinct grammars of the single user-facing
/// `typescript` language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageId {
    Go,
    Python,
    Rust,
    Typescript,
    Tsx,
}

impl LanguageId {
    pub const ALL: [LanguageId; 5] = [
        LanguageId::Go,
        LanguageId::Python,
        LanguageId::Rust,
        LanguageId::Typescript,
        LanguageId::Tsx,
    ];

    /// User-facing language name; TSX reports as `typescript`.
    pub fn name(&self) -> &'static str {
        match self.family() {
            LanguageId::Go => "go",
            LanguageId::Python => "python",
            LanguageId::Rust => "rust",
            _ => "typescript",
        }
    }

    pub fn grammar_name(&self) -> &'static str {
        match self {
            LanguageId::Go => "go",
            LanguageId::Python => "python",
            LanguageId::Rust => "rust",
            LanguageId::Typescript => "typescript",
            LanguageId::Tsx => "tsx",
        }
    }

    /// The user-facing language this grammar belongs to.
    pub fn family(&self) -> LanguageId {
        match self {
            LanguageId::Tsx => LanguageId::Typescript,
            other => *other,
        }
    }

    /// Parse a user-facing language name as accepted by `--lang`.
    pub fn from_name(name: &str) -> Option<LanguageId> {
        match name.to_ascii_lowercase().as_str() {
            "go" | "golang" => Some(LanguageId::Go),
            "python" | "py" => Some(LanguageId::Python),
            "rust" | "rs" => Some(LanguageId::Rust),
            "typescript" | "ts" => Some(LanguageId::Typescript),
            "tsx" => Some(LanguageId::Tsx),
            _ => None,
        }
    }

    pub fn from_extension(ext: &str) -> Option<LanguageId> {
        match ext.to_ascii_lowercase().as_str() {
            "go" => Some(LanguageId::Go),
            "py" | "pyi" => Some(LanguageId::Python),
            "rs" => Some(LanguageId::Rust),
            "ts" | "mts" | "cts" => Some(LanguageId::Typescript),
            "tsx" => Some(LanguageId::Tsx),
            _ => None,
        }
    }

    pub fn spec(&self) -> &'static LanguageSpec {
        match self {
            LanguageId::Go => &go::SPEC,
            LanguageId::Python => &python::SPEC,
            LanguageId::Rust => &rust_lang::SPEC,
            LanguageId::Typescript => &typescript::SPEC,
            LanguageId::Tsx => &typescript::TSX_SPEC,
        }
    }
}

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Abstract control-flow categories shared by all grammars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Construct {
    If,
    ElseIf,
    Else,
    Switch,
    Case,
    Loop,
    Catch,
    Ternary,
    Guard,
    /// Rust's `?` operator.
    Try,
    Return,
    Jump,
}

/// Static, data-only description of one grammar.
pub struct LanguageSpec {
    pub id: LanguageId,
    pub grammar: fn() -> Language,
    /// Captures `@function`, `@method`, `@lambda` and optionally `@name`.
    pub function_query: &'static str,
    /// Captures `@comment`.
    pub comment_query: &'static str,
    pub constructs: &'static [(&'static str, Construct)],
    /// (node kind, operator token) pairs that short-circuit.
    pub logical_operators: &'static [(&'static str, &'static str)],
    /// (node kind, field) pairs whose presence makes the node a guard.
    pub guard_fields: &'static [(&'static str, &'static str)],
    /// Node kinds that open a new measured unit.
    pub unit_kinds: &'static [&'static str],
    pub statement_kinds: &'static [&'static str],
    pub operand_kinds: &'static [&'static str],
    /// Anonymous tokens that are not Halstead operators.
    pub ignored_tokens: &'static [&'static str],
    pub label_kinds: &'static [&'static str],
    /// Parameter nodes that may declare several names at once (`a, b int`).
    pub grouped_parameter_kinds: &'static [&'static str],
    /// Named children of a parameter list that are not parameters.
    pub parameter_separators: &'static [&'static str],
    /// Bare string statements count as comment lines.
    pub docstrings: bool,
    /// A block's trailing expression counts as a logical line.
    pub tail_expressions: bool,
    /// Nodes that always assign (ABC assignments).
    pub assignment_kinds: &'static [&'static str],
    /// (node kind, field) pairs that assign only when the field is present,
    /// such as a declaration with an initializer.
    pub initializer_fields: &'static [(&'static str, &'static str)],
    /// Call sites (ABC branches).
    pub call_kinds: &'static [&'static str],
    /// (node kind, operator token) pairs that compare (ABC conditions).
    pub comparison_operators: &'static [(&'static str, &'static str)],
    /// Nodes whose methods are grouped into one class for WMC.
    pub class_kinds: &'static [&'static str],
}

/// Named node kinds drawn from one of the descriptor tables.
struct KindSet(HashSet<&'static str>);

impl KindSet {
    fn build(kinds: &[&'static str]) -> Self {
        KindSet(kinds.iter().copied().collect())
    }

    fn contains(&self, node: Node) -> bool {
        node.is_named() && self.0.contains(node.kind())
    }
}

/// A grammar with its compiled queries and kind tables.
pub struct LoadedLanguage {
    pub id: LanguageId,
    pub spec: &'static LanguageSpec,
    pub language: Language,
    pub function_query: Query,
    pub comment_query: Query,
    constructs: HashMap<&'static str, Construct>,
    units: KindSet,
    statements: KindSet,
    operands: KindSet,
    labels: KindSet,
    assignments: KindSet,
    calls: KindSet,
    classes: KindSet,
}

impl LoadedLanguage {
    fn load(spec: &'static LanguageSpec) -> Result<Self> {
        let grammar_err = |reason: String| Error::GrammarLoad {
            language: spec.id.grammar_name().to_string(),
            reason,
        };

        let language = (spec.grammar)();
        let function_query = Query::new(&language, spec.function_query)
            .map_err(|e| grammar_err(format!("function query: {}", e)))?;
        let comment_query = Query::new(&language, spec.comment_query)
            .map_err(|e| grammar_err(format!("comment query: {}", e)))?;

        // Check that the grammar ABI is usable by this tree-sitter runtime.
        tree_sitter::Parser::new()
            .set_language(&language)
            .map_err(|e| grammar_err(e.to_string()))?;

        for (kind, _) in spec.constructs {
            if language.id_for_node_kind(kind, true) == 0 {
                debug!(kind, language = spec.id.grammar_name(), "construct kind not in grammar");
            }
        }

        Ok(Self {
            id: spec.id,
            spec,
            units: KindSet::build(spec.unit_kinds),
            statements: KindSet::build(spec.statement_kinds),
            operands: KindSet::build(spec.operand_kinds),
            labels: KindSet::build(spec.label_kinds),
            assignments: KindSet::build(spec.assignment_kinds),
            calls: KindSet::build(spec.call_kinds),
            classes: KindSet::build(spec.class_kinds),
            constructs: spec.constructs.iter().copied().collect(),
            function_query,
            comment_query,
            language,
        })
    }

    pub fn construct(&self, node: Node) -> Option<Construct> {
        if !node.is_named() {
            return None;
        }
        self.constructs.get(node.kind()).copied()
    }

    pub fn is_unit(&self, node: Node) -> bool {
        self.units.contains(node)
    }

    pub fn is_statement(&self, node: Node) -> bool {
        self.statements.contains(node)
    }

    pub fn is_operand(&self, node: Node) -> bool {
        self.operands.contains(node)
    }

    pub fn is_label(&self, node: Node) -> bool {
        self.labels.contains(node)
    }

    pub fn is_ignored_token(&self, kind: &str) -> bool {
        self.spec.ignored_tokens.contains(&kind)
    }

    /// The short-circuit operator token if `node` is a logical operation.
    pub fn logical_operator(&self, node: Node) -> Option<&'static str> {
        let kind = node.kind();
        let op = node.child_by_field_name("operator")?;
        let op_kind = op.kind();
        self.spec
            .logical_operators
            .iter()
            .find(|(k, o)| *k == kind && *o == op_kind)
            .map(|(_, o)| *o)
    }

    /// Whether `node` assigns a value, directly or through an initializer.
    pub fn is_assignment(&self, node: Node) -> bool {
        if self.assignments.contains(node) {
            return true;
        }
        let kind = node.kind();
        node.is_named()
            && self
                .spec
                .initializer_fields
                .iter()
                .any(|(k, field)| *k == kind && node.child_by_field_name(*field).is_some())
    }

    pub fn is_call(&self, node: Node) -> bool {
        self.calls.contains(node)
    }

    pub fn is_class(&self, node: Node) -> bool {
        self.classes.contains(node)
    }

    /// Whether `token` is a comparison operator of its parent node.
    ///
    /// Python chains comparisons in one node (`a < b <= c`), so the operator
    /// tokens are matched individually rather than through an `operator`
    /// field.
    pub fn is_comparison(&self, token: Node) -> bool {
        if token.is_named() {
            return false;
        }
        let Some(parent) = token.parent() else {
            return false;
        };
        let (kind, op) = (parent.kind(), token.kind());
        self.spec
            .comparison_operators
            .iter()
            .any(|(k, o)| *k == kind && *o == op)
    }

    pub fn is_guard(&self, node: Node) -> bool {
        let kind = node.kind();
        self.spec
            .guard_fields
            .iter()
            .any(|(k, field)| *k == kind && node.child_by_field_name(*field).is_some())
    }
}

static GO: OnceCell<std::result::Result<LoadedLanguage, String>> = OnceCell::new();
static PYTHON: OnceCell<std::result::Result<LoadedLanguage, String>> = OnceCell::new();
static RUST: OnceCell<std::result::Result<LoadedLanguage, String>> = OnceCell::new();
static TYPESCRIPT: OnceCell<std::result::Result<LoadedLanguage, String>> = OnceCell::new();
static TSX: OnceCell<std::result::Result<LoadedLanguage, String>> = OnceCell::new();

/// Load (once per process) the grammar and queries for `id`.
pub fn load(id: LanguageId) -> Result<&'static LoadedLanguage> {
    let cell = match id {
        LanguageId::Go => &GO,
        LanguageId::Python => &PYTHON,
        LanguageId::Rust => &RUST,
        LanguageId::Typescript => &TYPESCRIPT,
        LanguageId::Tsx => &TSX,
    };
    cell.get_or_init(|| LoadedLanguage::load(id.spec()).map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|reason| Error::GrammarLoad {
            language: id.grammar_name().to_string(),
            reason: reason.clone(),
        })
}

/// The set of user-facing languages selected with `--lang`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageFilter {
    families: BTreeSet<LanguageId>,
    explicit: bool,
}

impl Default for LanguageFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl LanguageFilter {
    pub fn all() -> Self {
        Self {
            families: LanguageId::ALL.iter().map(|l| l.family()).collect(),
            explicit: false,
        }
    }

    /// Build a filter from `--lang` values. An empty list or `all` selects
    /// every language.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let mut families = BTreeSet::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.eq_ignore_ascii_case("all") {
                return Ok(Self::all());
            }
            let id = LanguageId::from_name(name).ok_or_else(|| {
                Error::config(format!(
                    "unsupported language {:?}, must be one of go, python, rust, typescript, all",
                    name
                ))
            })?;
            families.insert(id.family());
        }
        if families.is_empty() {
            return Ok(Self::all());
        }
        Ok(Self {
            families,
            explicit: true,
        })
    }

    pub fn includes(&self, id: LanguageId) -> bool {
        self.families.contains(&id.family())
    }

    /// Whether the user named languages rather than relying on `all`.
    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// Grammars needed to cover the selected languages.
    pub fn grammars(&self) -> impl Iterator<Item = LanguageId> + '_ {
        LanguageId::ALL.into_iter().filter(|id| self.includes(*id))
    }
}

/// Per-run view over the loaded grammars.
pub struct LanguageRegistry {
    filter: LanguageFilter,
    loaded: BTreeMap<LanguageId, &'static LoadedLanguage>,
    unavailable: BTreeMap<LanguageId, String>,
}

impl LanguageRegistry {
    /// Load every grammar the filter selects.
    ///
    /// A load failure is fatal when the language was requested explicitly;
    /// under `all` it is logged and files of that language are reported as
    /// failed.
    pub fn load(filter: LanguageFilter) -> Result<Self> {
        let mut loaded = BTreeMap::new();
        let mut unavailable = BTreeMap::new();

        for id in filter.grammars() {
            match load(id) {
                Ok(lang) => {
                    loaded.insert(id, lang);
                }
                Err(e) if filter.is_explicit() => return Err(e),
                Err(e) => {
                    warn!(language = id.grammar_name(), error = %e, "grammar unavailable");
                    unavailable.insert(id, e.to_string());
                }
            }
        }

        Ok(Self {
            filter,
            loaded,
            unavailable,
        })
    }

    pub fn filter(&self) -> &LanguageFilter {
        &self.filter
    }

    pub fn get(&self, id: LanguageId) -> Result<&'static LoadedLanguage> {
        if let Some(lang) = self.loaded.get(&id) {
            return Ok(lang);
        }
        let reason = self
            .unavailable
            .get(&id)
            .cloned()
            .unwrap_or_else(|| "language not selected".to_string());
        Err(Error::GrammarLoad {
            language: id.grammar_name().to_string(),
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_grammars_load() {
        for id in LanguageId::ALL {
            let lang = load(id).unwrap_or_else(|e| panic!("{} failed to load: {}", id.grammar_name(), e));
            assert_eq!(lang.id, id);
        }
    }

    #[test]
    fn test_filter_parse() {
        let f = LanguageFilter::parse(&["go", "TS"]).unwrap();
        assert!(f.is_explicit());
        assert!(f.includes(LanguageId::Go));
        assert!(f.includes(LanguageId::Tsx), "typescript selects the TSX grammar");
        assert!(!f.includes(LanguageId::Python));

        let f = LanguageFilter::parse(&["go", "all"]).unwrap();
        assert!(!f.is_explicit());
        assert!(f.includes(LanguageId::Rust));

        let empty: [&str; 0] = [];
        assert_eq!(LanguageFilter::parse(&empty).unwrap(), LanguageFilter::all());

        assert!(LanguageFilter::parse(&["cobol"]).is_err());
    }

    #[test]
    fn test_registry_get_respects_filter() {
        let registry = LanguageRegistry::load(LanguageFilter::parse(&["rust"]).unwrap()).unwrap();
        assert!(registry.get(LanguageId::Rust).is_ok());
        assert!(registry.get(LanguageId::Go).is_err());
    }

    #[test]
    fn test_construct_tables_resolve() {
        let go = load(LanguageId::Go).unwrap();
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&go.language).unwrap();
        let tree = parser
            .parse("package p\nfunc f() { if true { return } }\n", None)
            .unwrap();
        let mut found = false;
        let mut stack = vec![tree.root_node()];
        while let Some(node) = stack.pop() {
            if node.kind() == "if_statement" {
                assert_eq!(go.construct(node), Some(Construct::If));
                found = true;
            }
            let mut cursor = node.walk();
            stack.extend(node.children(&mut cursor));
        }
        assert!(found);
    }

    #[test]
    fn test_names() {
        assert_eq!(LanguageId::Tsx.name(), "typescript");
        assert_eq!(LanguageId::Tsx.grammar_name(), "tsx");
        assert_eq!(LanguageId::from_extension("PYI"), Some(LanguageId::Python));
        assert_eq!(LanguageId::from_extension("js"), None);
    }
}
