//! Python descriptor.

use tree_sitter::Language;

use super::{Construct, LanguageId, LanguageSpec};

// Functions defined directly in a class body are methods; the dedup in
// `metrics::units` prefers `@method` over `@function` for the same node.
const FUNCTION_QUERY: &str = r#"
(function_definition name: (identifier) @name) @function

(class_definition
  body: (block
    (function_definition name: (identifier) @name) @method))

(class_definition
  body: (block
    (decorated_definition
      definition: (function_definition name: (identifier) @name) @method)))

(assignment left: (identifier) @name right: (lambda) @lambda)
(lambda) @lambda
"#;

const COMMENT_QUERY: &str = "(comment) @comment";

fn grammar() -> Language {
    tree_sitter_python::LANGUAGE.into()
}

pub static SPEC: LanguageSpec = LanguageSpec {
    id: LanguageId::Python,
    grammar,
    function_query: FUNCTION_QUERY,
    comment_query: COMMENT_QUERY,
    constructs: &[
        ("if_statement", Construct::If),
        ("elif_clause", Construct::ElseIf),
        ("else_clause", Construct::Else),
        ("for_statement", Construct::Loop),
        ("while_statement", Construct::Loop),
        ("match_statement", Construct::Switch),
        ("case_clause", Construct::Case),
        ("except_clause", Construct::Catch),
        ("except_group_clause", Construct::Catch),
        ("conditional_expression", Construct::Ternary),
        // Comprehension filters and `case ... if` guards.
        ("if_clause", Construct::Guard),
        ("return_statement", Construct::Return),
    ],
    logical_operators: &[("boolean_operator", "and"), ("boolean_operator", "or")],
    guard_fields: &[],
    unit_kinds: &["function_definition", "lambda"],
    statement_kinds: &[
        "expression_statement",
        "return_statement",
        "pass_statement",
        "break_statement",
        "continue_statement",
        "if_statement",
        "for_statement",
        "while_statement",
        "try_statement",
        "with_statement",
        "raise_statement",
        "assert_statement",
        "import_statement",
        "import_from_statement",
        "future_import_statement",
        "global_statement",
        "nonlocal_statement",
        "delete_statement",
        "print_statement",
        "exec_statement",
        "type_alias_statement",
        "match_statement",
        "function_definition",
        "class_definition",
    ],
    operand_kinds: &[
        "identifier",
        "string",
        "concatenated_string",
        "integer",
        "float",
        "true",
        "false",
        "none",
        "ellipsis",
    ],
    ignored_tokens: &[")", "]", "}", ",", ";"],
    label_kinds: &[],
    grouped_parameter_kinds: &[],
    parameter_separators: &["keyword_separator", "positional_separator"],
    docstrings: true,
    tail_expressions: false,
    assignment_kinds: &["augmented_assignment", "named_expression"],
    initializer_fields: &[("assignment", "right")],
    call_kinds: &["call"],
    comparison_operators: &[
        ("comparison_operator", "=="),
        ("comparison_operator", "!="),
        ("comparison_operator", "<>"),
        ("comparison_operator", "<"),
        ("comparison_operator", "<="),
        ("comparison_operator", ">"),
        ("comparison_operator", ">="),
        ("comparison_operator", "in"),
        ("comparison_operator", "not in"),
        ("comparison_operator", "is"),
        ("comparison_operator", "is not"),
    ],
    class_kinds: &["class_definition"],
};
