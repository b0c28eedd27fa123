//! Closed views over the handful of tree-sitter node shapes the bundle
//! convention is written in.
//!
//! Every dispatch in the extractor matches on one of these enums. Shapes that
//! fall into an `Other` arm are either skipped with a warning or reported as a
//! structural mismatch by the caller; nothing is interpreted by default.

use tree_sitter::Node;

use crate::extract::common::{get_node_text, named_children, unwrap_parens};

// ============ Statements ============

/// A statement inside a function body or the program
#[derive(Debug, Clone, Copy)]
pub enum Stmt<'t> {
    /// `expr;`, carrying the inner expression
    Expression(Node<'t>),
    /// `const a = ...;`
    Const(Node<'t>),
    /// `let a = ...;`
    Let(Node<'t>),
    /// `var a, b;`
    Var(Node<'t>),
    Other(Node<'t>),
}

impl<'t> Stmt<'t> {
    pub fn of(node: Node<'t>) -> Self {
        match node.kind() {
            "expression_statement" => match named_children(node).into_iter().next() {
                Some(expression) => Stmt::Expression(expression),
                None => Stmt::Other(node),
            },
            "lexical_declaration" => match node.child(0).map(|keyword| keyword.kind()) {
                Some("const") => Stmt::Const(node),
                _ => Stmt::Let(node),
            },
            "variable_declaration" => Stmt::Var(node),
            _ => Stmt::Other(node),
        }
    }
}

// ============ Expressions ============

/// An expression, with enclosing parentheses already removed
#[derive(Debug, Clone)]
pub enum Expr<'t> {
    Number(Node<'t>),
    String(Node<'t>),
    Identifier(Node<'t>),
    Member { object: Node<'t>, property: Node<'t> },
    Assignment { left: Node<'t>, right: Node<'t> },
    /// Comma-separated members, flattened
    Sequence(Vec<Node<'t>>),
    Call { callee: Node<'t>, arguments: Vec<Node<'t>> },
    /// Object literal entries
    Object(Vec<Node<'t>>),
    /// Array literal elements
    Array(Vec<Node<'t>>),
    Binary { operator: &'static str, left: Node<'t>, right: Node<'t> },
    Unary { operator: &'static str, argument: Node<'t> },
    /// Arrow function or function expression
    Function { body: Node<'t> },
    Other(Node<'t>),
}

impl<'t> Expr<'t> {
    pub fn of(node: Node<'t>) -> Self {
        let node = unwrap_parens(node);
        match node.kind() {
            "number" => Expr::Number(node),
            "string" => Expr::String(node),
            "identifier" => Expr::Identifier(node),
            "member_expression" => match (
                node.child_by_field_name("object"),
                node.child_by_field_name("property"),
            ) {
                (Some(object), Some(property)) => Expr::Member { object, property },
                _ => Expr::Other(node),
            },
            "assignment_expression" => match (
                node.child_by_field_name("left"),
                node.child_by_field_name("right"),
            ) {
                (Some(left), Some(right)) => Expr::Assignment { left, right },
                _ => Expr::Other(node),
            },
            "sequence_expression" => {
                let mut members = Vec::new();
                flatten_sequence(node, &mut members);
                Expr::Sequence(members)
            }
            "call_expression" => {
                let Some(callee) = node.child_by_field_name("function") else {
                    return Expr::Other(node);
                };
                let arguments = match node.child_by_field_name("arguments") {
                    Some(args) if args.kind() == "arguments" => named_children(args),
                    Some(args) => vec![args],
                    None => Vec::new(),
                };
                Expr::Call { callee, arguments }
            }
            "object" => Expr::Object(named_children(node)),
            "array" => Expr::Array(named_children(node)),
            "binary_expression" => match (
                node.child_by_field_name("operator"),
                node.child_by_field_name("left"),
                node.child_by_field_name("right"),
            ) {
                (Some(operator), Some(left), Some(right)) => Expr::Binary {
                    operator: operator.kind(),
                    left,
                    right,
                },
                _ => Expr::Other(node),
            },
            "unary_expression" => match (
                node.child_by_field_name("operator"),
                node.child_by_field_name("argument"),
            ) {
                (Some(operator), Some(argument)) => Expr::Unary {
                    operator: operator.kind(),
                    argument,
                },
                _ => Expr::Other(node),
            },
            "arrow_function" | "function_expression" | "function" => {
                match node.child_by_field_name("body") {
                    Some(body) => Expr::Function { body },
                    None => Expr::Other(node),
                }
            }
            _ => Expr::Other(node),
        }
    }

    /// Short shape name used in error messages
    pub fn shape(&self) -> &'static str {
        match self {
            Expr::Number(_) => "numeric literal",
            Expr::String(_) => "string literal",
            Expr::Identifier(_) => "identifier",
            Expr::Member { .. } => "member access",
            Expr::Assignment { .. } => "assignment",
            Expr::Sequence(_) => "sequence",
            Expr::Call { .. } => "call",
            Expr::Object(_) => "object literal",
            Expr::Array(_) => "array literal",
            Expr::Binary { .. } => "binary expression",
            Expr::Unary { .. } => "unary expression",
            Expr::Function { .. } => "function",
            Expr::Other(node) => node.kind(),
        }
    }
}

fn flatten_sequence<'t>(node: Node<'t>, members: &mut Vec<Node<'t>>) {
    for child in named_children(node) {
        if child.kind() == "sequence_expression" {
            flatten_sequence(child, members);
        } else {
            members.push(child);
        }
    }
}

// ============ Object Entries ============

/// Key of an object literal entry
#[derive(Debug, Clone, Copy)]
pub enum Key<'t> {
    Identifier(Node<'t>),
    Number(Node<'t>),
    String(Node<'t>),
    Other(Node<'t>),
}

/// One entry of an object literal
#[derive(Debug, Clone, Copy)]
pub enum Entry<'t> {
    Pair { key: Key<'t>, value: Node<'t> },
    Other(Node<'t>),
}

impl<'t> Entry<'t> {
    pub fn of(node: Node<'t>) -> Self {
        if node.kind() != "pair" {
            return Entry::Other(node);
        }
        let (Some(key), Some(value)) = (
            node.child_by_field_name("key"),
            node.child_by_field_name("value"),
        ) else {
            return Entry::Other(node);
        };
        let key = match key.kind() {
            "property_identifier" | "identifier" => Key::Identifier(key),
            "number" => Key::Number(key),
            "string" => Key::String(key),
            _ => Key::Other(key),
        };
        Entry::Pair { key, value }
    }
}

// ============ Names ============

/// Text of an identifier-like node, `None` for anything else
pub fn identifier_name<'a>(node: Node, source: &'a [u8]) -> Option<&'a str> {
    match node.kind() {
        "identifier" | "property_identifier" | "shorthand_property_identifier" => {
            Some(get_node_text(node, source))
        }
        _ => None,
    }
}
