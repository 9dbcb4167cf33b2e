//! Rust descriptor.

use tree_sitter::Language;

use super::{Construct, LanguageId, LanguageSpec};

const FUNCTION_QUERY: &str = r#"
(function_item name: (identifier) @name) @function

(impl_item
  body: (declaration_list
    (function_item name: (identifier) @name) @method))

(trait_item
  body: (declaration_list
    (function_item name: (identifier) @name) @method))

(let_declaration pattern: (identifier) @name value: (closure_expression) @lambda)
(closure_expression) @lambda
"#;

const COMMENT_QUERY: &str = r#"
(line_comment) @comment
(block_comment) @comment
"#;

fn grammar() -> Language {
    tree_sitter_rust::LANGUAGE.into()
}

pub static SPEC: LanguageSpec = LanguageSpec {
    id: LanguageId::Rust,
    grammar,
    function_query: FUNCTION_QUERY,
    comment_query: COMMENT_QUERY,
    constructs: &[
        ("if_expression", Construct::If),
        ("else_clause", Construct::Else),
        ("for_expression", Construct::Loop),
        ("while_expression", Construct::Loop),
        ("loop_expression", Construct::Loop),
        ("match_expression", Construct::Switch),
        ("match_arm", Construct::Case),
        ("try_expression", Construct::Try),
        ("return_expression", Construct::Return),
        ("break_expression", Construct::Jump),
        ("continue_expression", Construct::Jump),
    ],
    logical_operators: &[("binary_expression", "&&"), ("binary_expression", "||")],
    // `pat if cond =>`
    guard_fields: &[("match_pattern", "condition")],
    unit_kinds: &["function_item", "closure_expression"],
    statement_kinds: &[
        "expression_statement",
        "let_declaration",
        "function_item",
        "struct_item",
        "enum_item",
        "union_item",
        "impl_item",
        "trait_item",
        "const_item",
        "static_item",
        "type_item",
        "mod_item",
        "use_declaration",
        "extern_crate_declaration",
        "macro_definition",
    ],
    operand_kinds: &[
        "identifier",
        "field_identifier",
        "shorthand_field_identifier",
        "type_identifier",
        "primitive_type",
        "string_literal",
        "raw_string_literal",
        "char_literal",
        "integer_literal",
        "float_literal",
        "boolean_literal",
        "lifetime",
        "metavariable",
        "self",
        "crate",
        "super",
    ],
    ignored_tokens: &[")", "]", "}", ",", ";"],
    label_kinds: &["label"],
    grouped_parameter_kinds: &[],
    parameter_separators: &["attribute_item"],
    docstrings: false,
    tail_expressions: true,
    assignment_kinds: &["assignment_expression", "compound_assignment_expr"],
    initializer_fields: &[("let_declaration", "value")],
    call_kinds: &["call_expression", "macro_invocation"],
    comparison_operators: &[
        ("binary_expression", "=="),
        ("binary_expression", "!="),
        ("binary_expression", "<"),
        ("binary_expression", "<="),
        ("binary_expression", ">"),
        ("binary_expression", ">="),
    ],
    class_kinds: &["impl_item", "trait_item"],
};
