//! Classification of comma-grouped statements inside a spec function.
//!
//! Generated modules use the comma operator for two unrelated jobs: the
//! export preamble (`Object.defineProperty(t, ...), t.aSpec = t.b = void 0`)
//! and the block that wires locals to exports and assigns their field sets.
//! The only observed difference is that the preamble contains a call. The
//! rule lives here on its own so it can change without touching the builder.

use crate::extract::ast::Expr;

/// How a comma-separated statement is processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// Every assignment only reserves the paths it names
    Reservation,
    /// Assignments bind locals and attach field sets or defaults
    Assignment,
}

/// Decide how a group of comma-separated members is processed
pub fn classify_group(members: &[Expr]) -> GroupKind {
    if members.iter().any(|member| matches!(member, Expr::Call { .. })) {
        GroupKind::Reservation
    } else {
        GroupKind::Assignment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::common::named_children;
    use tree_sitter::{Parser, Tree};

    fn parse(code: &str) -> Tree {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_javascript::LANGUAGE.into())
            .expect("grammar loads");
        parser.parse(code, None).expect("parses")
    }

    fn classify(code: &str) -> GroupKind {
        let tree = parse(code);
        let statement = named_children(tree.root_node())[0];
        let expression = named_children(statement)[0];
        let Expr::Sequence(members) = Expr::of(expression) else {
            panic!("expected a sequence in {}", code);
        };
        let members: Vec<Expr> = members.into_iter().map(Expr::of).collect();
        classify_group(&members)
    }

    #[test]
    fn test_preamble_with_call_is_reservation() {
        let code = r#"Object.defineProperty(t, "__esModule", { value: !0 }), t.aSpec = t.b = void 0;"#;
        assert_eq!(classify(code), GroupKind::Reservation);
    }

    #[test]
    fn test_plain_assignments_are_real() {
        assert_eq!(classify("t.aSpec = o, o.internalSpec = {};"), GroupKind::Assignment);
    }
}
