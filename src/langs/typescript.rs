//! TypeScript and TSX descriptors.
//!
//! Both grammars share node kinds, so the TSX descriptor only swaps the
//! grammar and id.

use tree_sitter::Language;

use super::{Construct, LanguageId, LanguageSpec};

const FUNCTION_QUERY: &str = r#"
(function_declaration name: (identifier) @name) @function
(generator_function_declaration name: (identifier) @name) @function
(method_definition name: (_) @name) @method

(variable_declarator
  name: (identifier) @name
  value: [(arrow_function) (function_expression) (generator_function)] @lambda)

(function_expression) @lambda
(generator_function) @lambda
(arrow_function) @lambda
"#;

const COMMENT_QUERY: &str = "(comment) @comment";

fn typescript_grammar() -> Language {
    tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
}

fn tsx_grammar() -> Language {
    tree_sitter_typescript::LANGUAGE_TSX.into()
}

const BASE: LanguageSpec = LanguageSpec {
    id: LanguageId::Typescript,
    grammar: typescript_grammar,
    function_query: FUNCTION_QUERY,
    comment_query: COMMENT_QUERY,
    constructs: &[
        ("if_statement", Construct::If),
        ("else_clause", Construct::Else),
        ("for_statement", Construct::Loop),
        ("for_in_statement", Construct::Loop),
        ("while_statement", Construct::Loop),
        ("do_statement", Construct::Loop),
        ("switch_statement", Construct::Switch),
        ("switch_case", Construct::Case),
        ("switch_default", Construct::Case),
        ("catch_clause", Construct::Catch),
        ("ternary_expression", Construct::Ternary),
        ("return_statement", Construct::Return),
        ("break_statement", Construct::Jump),
        ("continue_statement", Construct::Jump),
    ],
    logical_operators: &[
        ("binary_expression", "&&"),
        ("binary_expression", "||"),
        ("binary_expression", "??"),
    ],
    guard_fields: &[],
    unit_kinds: &[
        "function_declaration",
        "generator_function_declaration",
        "function_expression",
        "generator_function",
        "arrow_function",
        "method_definition",
    ],
    statement_kinds: &[
        "expression_statement",
        "variable_declaration",
        "lexical_declaration",
        "return_statement",
        "if_statement",
        "for_statement",
        "for_in_statement",
        "while_statement",
        "do_statement",
        "switch_statement",
        "try_statement",
        "throw_statement",
        "break_statement",
        "continue_statement",
        "labeled_statement",
        "debugger_statement",
        "with_statement",
        "import_statement",
        "function_declaration",
        "generator_function_declaration",
        "class_declaration",
        "abstract_class_declaration",
        "interface_declaration",
        "type_alias_declaration",
        "enum_declaration",
    ],
    operand_kinds: &[
        "identifier",
        "property_identifier",
        "private_property_identifier",
        "shorthand_property_identifier",
        "shorthand_property_identifier_pattern",
        "statement_identifier",
        "type_identifier",
        "predefined_type",
        "string",
        "template_string",
        "regex",
        "number",
        "true",
        "false",
        "null",
        "undefined",
        "this",
        "super",
    ],
    ignored_tokens: &[")", "]", "}", ",", ";"],
    label_kinds: &["statement_identifier"],
    grouped_parameter_kinds: &[],
    parameter_separators: &["decorator"],
    docstrings: false,
    tail_expressions: false,
    assignment_kinds: &[
        "assignment_expression",
        "augmented_assignment_expression",
        "update_expression",
    ],
    initializer_fields: &[
        ("variable_declarator", "value"),
        ("public_field_definition", "value"),
    ],
    call_kinds: &["call_expression", "new_expression"],
    comparison_operators: &[
        ("binary_expression", "=="),
        ("binary_expression", "!="),
        ("binary_expression", "==="),
        ("binary_expression", "!=="),
        ("binary_expression", "<"),
        ("binary_expression", "<="),
        ("binary_expression", ">"),
        ("binary_expression", ">="),
        ("binary_expression", "instanceof"),
        ("binary_expression", "in"),
    ],
    class_kinds: &["class_declaration", "abstract_class_declaration", "class"],
};

pub static SPEC: LanguageSpec = LanguageSpec { ..BASE };

pub static TSX_SPEC: LanguageSpec = LanguageSpec {
    id: LanguageId::Tsx,
    grammar: tsx_grammar,
    ..BASE
};
