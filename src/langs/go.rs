//! Go descriptor.

use tree_sitter::Language;

use super::{Construct, LanguageId, LanguageSpec};

const FUNCTION_QUERY: &str = r#"
(function_declaration name: (identifier) @name) @function
(method_declaration name: (field_identifier) @name) @method
(func_literal) @lambda
"#;

const COMMENT_QUERY: &str = "(comment) @comment";

fn grammar() -> Language {
    tree_sitter_go::LANGUAGE.into()
}

pub static SPEC: LanguageSpec = LanguageSpec {
    id: LanguageId::Go,
    grammar,
    function_query: FUNCTION_QUERY,
    comment_query: COMMENT_QUERY,
    constructs: &[
        ("if_statement", Construct::If),
        ("for_statement", Construct::Loop),
        ("expression_switch_statement", Construct::Switch),
        ("type_switch_statement", Construct::Switch),
        ("select_statement", Construct::Switch),
        ("expression_case", Construct::Case),
        ("type_case", Construct::Case),
        ("communication_case", Construct::Case),
        ("default_case", Construct::Case),
        ("return_statement", Construct::Return),
        ("break_statement", Construct::Jump),
        ("continue_statement", Construct::Jump),
        ("goto_statement", Construct::Jump),
    ],
    logical_operators: &[("binary_expression", "&&"), ("binary_expression", "||")],
    guard_fields: &[],
    unit_kinds: &["function_declaration", "method_declaration", "func_literal"],
    statement_kinds: &[
        "expression_statement",
        "send_statement",
        "inc_statement",
        "dec_statement",
        "assignment_statement",
        "short_var_declaration",
        "return_statement",
        "go_statement",
        "defer_statement",
        "if_statement",
        "for_statement",
        "expression_switch_statement",
        "type_switch_statement",
        "select_statement",
        "labeled_statement",
        "fallthrough_statement",
        "break_statement",
        "continue_statement",
        "goto_statement",
        "var_declaration",
        "const_declaration",
        "type_declaration",
    ],
    operand_kinds: &[
        "identifier",
        "field_identifier",
        "type_identifier",
        "package_identifier",
        "label_name",
        "interpreted_string_literal",
        "raw_string_literal",
        "rune_literal",
        "int_literal",
        "float_literal",
        "imaginary_literal",
        "true",
        "false",
        "nil",
        "iota",
    ],
    ignored_tokens: &[")", "]", "}", ",", ";", "\n", "\0"],
    label_kinds: &["label_name"],
    grouped_parameter_kinds: &["parameter_declaration"],
    parameter_separators: &[],
    docstrings: false,
    tail_expressions: false,
    assignment_kinds: &[
        "assignment_statement",
        "short_var_declaration",
        "inc_statement",
        "dec_statement",
    ],
    initializer_fields: &[("var_spec", "value"), ("const_spec", "value")],
    call_kinds: &["call_expression"],
    comparison_operators: &[
        ("binary_expression", "=="),
        ("binary_expression", "!="),
        ("binary_expression", "<"),
        ("binary_expression", "<="),
        ("binary_expression", ">"),
        ("binary_expression", ">="),
    ],
    // Methods are grouped by receiver type instead.
    class_kinds: &[],
};
