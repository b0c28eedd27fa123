//! Locating the spec functions inside the bundle's module table.
//!
//! The bundle is a single chunk push:
//!
//! ```text
//! (self.webpackChunk = self.webpackChunk || []).push([[123], {
//!     45678: (e, t, n) => { ... },
//!     ...
//! }]);
//! ```
//!
//! Only table entries whose body assigns an `internalSpec` inside a comma
//! group are spec functions.

use tracing::info;
use tree_sitter::Node;

use crate::extract::ast::{identifier_name, Entry, Expr, Key, Stmt};
use crate::extract::common::{get_node_text, named_children};
use crate::extract::error::{ExtractError, ExtractResult};

const MODULE_CONTEXT: &str = "module table";

/// One module table entry that defines part of the schema
#[derive(Debug, Clone, Copy)]
pub struct SpecFunction<'t> {
    /// Numeric module key, as written in the source
    pub key: &'t str,
    /// The function's statement block
    pub body: Node<'t>,
}

/// Find the spec functions of a parsed bundle, in source order
pub fn locate_spec_functions<'t>(root: Node<'t>, source: &'t [u8]) -> ExtractResult<Vec<SpecFunction<'t>>> {
    let statements: Vec<Node> = named_children(root)
        .into_iter()
        .filter(|node| node.kind() != "hash_bang_line")
        .collect();
    let [statement] = statements.as_slice() else {
        return Err(ExtractError::mismatch(
            MODULE_CONTEXT,
            "exactly one top-level statement",
            format!("{} statements", statements.len()),
        ));
    };

    let Stmt::Expression(expression) = Stmt::of(*statement) else {
        return Err(ExtractError::mismatch(MODULE_CONTEXT, "expression statement", statement.kind()));
    };
    let arguments = match Expr::of(expression) {
        Expr::Call { arguments, .. } => arguments,
        other => return Err(ExtractError::mismatch(MODULE_CONTEXT, "call expression", other.shape())),
    };
    let [argument] = arguments.as_slice() else {
        return Err(ExtractError::mismatch(
            MODULE_CONTEXT,
            "a single call argument",
            format!("{} arguments", arguments.len()),
        ));
    };
    let elements = match Expr::of(*argument) {
        Expr::Array(elements) => elements,
        other => return Err(ExtractError::mismatch(MODULE_CONTEXT, "array argument", other.shape())),
    };

    let mut tables = elements.into_iter().filter_map(|element| match Expr::of(element) {
        Expr::Object(entries) => Some(entries),
        _ => None,
    });
    let (Some(entries), None) = (tables.next(), tables.next()) else {
        return Err(ExtractError::mismatch(MODULE_CONTEXT, "exactly one object in the array", "zero or several"));
    };

    let specs: Vec<SpecFunction> = entries
        .into_iter()
        .filter_map(|entry| spec_function(entry, source))
        .collect();

    if specs.is_empty() {
        return Err(ExtractError::mismatch(MODULE_CONTEXT, "at least one spec function", "none"));
    }

    info!(count = specs.len(), "found spec functions");
    Ok(specs)
}

fn spec_function<'t>(entry: Node<'t>, source: &'t [u8]) -> Option<SpecFunction<'t>> {
    let Entry::Pair { key: Key::Number(key), value } = Entry::of(entry) else {
        return None;
    };
    let Expr::Function { body } = Expr::of(value) else {
        return None;
    };
    if body.kind() != "statement_block" || !assigns_internal_spec(body, source) {
        return None;
    }
    Some(SpecFunction {
        key: get_node_text(key, source),
        body,
    })
}

/// Whether a function body holds `..., x.internalSpec = {...}, ...`
fn assigns_internal_spec(body: Node, source: &[u8]) -> bool {
    named_children(body).into_iter().any(|statement| {
        let Stmt::Expression(expression) = Stmt::of(statement) else {
            return false;
        };
        let Expr::Sequence(members) = Expr::of(expression) else {
            return false;
        };
        members.into_iter().any(|member| {
            let Expr::Assignment { left, .. } = Expr::of(member) else {
                return false;
            };
            let Expr::Member { property, .. } = Expr::of(left) else {
                return false;
            };
            identifier_name(property, source) == Some("internalSpec")
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::{Parser, Tree};

    fn parse(code: &str) -> Tree {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_javascript::LANGUAGE.into())
            .expect("grammar loads");
        parser.parse(code, None).expect("parses")
    }

    fn keys(code: &str) -> ExtractResult<Vec<String>> {
        let tree = parse(code);
        let specs = locate_spec_functions(tree.root_node(), code.as_bytes())?;
        Ok(specs.iter().map(|spec| spec.key.to_string()).collect())
    }

    #[test]
    fn test_filters_spec_functions() {
        let code = r#"
/*! bundle banner */
(self.webpackChunk = self.webpackChunk || []).push([[77], {
    100: (e, t, n) => {
        const o = {};
        t.ASpec = o, o.internalSpec = {};
    },
    "200": (e, t, n) => {
        t.BSpec = o, o.internalSpec = {};
    },
    300: (e, t, n) => {
        t.helper = function () {};
    },
    400: function (e, t, n) {
        t.CSpec = o, o.internalSpec = {};
    },
    500: (e, t, n) => {
        o.internalSpec = {};
    }
}]);
"#;
        assert_eq!(keys(code).unwrap(), vec!["100", "400"]);
    }

    #[test]
    fn test_rejects_multiple_statements() {
        let err = keys("a(); b();").unwrap_err();
        assert!(matches!(err, ExtractError::StructuralMismatch { expected: "exactly one top-level statement", .. }));
    }

    #[test]
    fn test_rejects_non_array_argument() {
        let err = keys("push({ 1: () => {} });").unwrap_err();
        assert!(matches!(err, ExtractError::StructuralMismatch { expected: "array argument", .. }));
    }

    #[test]
    fn test_rejects_table_without_specs() {
        let err = keys("push([[1], { 1: (e, t) => { t.a = 1; } }]);").unwrap_err();
        assert!(matches!(err, ExtractError::StructuralMismatch { expected: "at least one spec function", .. }));
    }
}
