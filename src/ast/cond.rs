//! Boolean-valued condition trees used by control-flow statements.

use std::rc::Rc;

use crate::ir::CompareOp;

use super::Expr;

/// A boolean expression tree. Operand ownership matches [`Expr`].
#[derive(Clone, Debug)]
pub enum Condition {
    /// A boolean-typed value used directly, possibly negated.
    BooleanValue {
        value: Rc<Expr>,
        inverted: bool,
    },
    Compare {
        op: CompareOp,
        left: Rc<Expr>,
        right: Rc<Expr>,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    /// The logical negation, with comparisons flipped in place and
    /// De Morgan applied to combinators.
    pub fn invert(self) -> Condition {
        match self {
            Condition::BooleanValue { value, inverted } => {
                Condition::BooleanValue { value, inverted: !inverted }
            }
            Condition::Compare { op, left, right } => {
                Condition::Compare { op: op.negate(), left, right }
            }
            Condition::And(parts) => {
                Condition::Or(parts.into_iter().map(Condition::invert).collect())
            }
            Condition::Or(parts) => {
                Condition::And(parts.into_iter().map(Condition::invert).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value() -> Rc<Expr> {
        Rc::new(Expr::IntConstant(1))
    }

    #[test]
    fn invert_compare() {
        let cond = Condition::Compare { op: CompareOp::Lt, left: value(), right: value() };
        match cond.invert() {
            Condition::Compare { op, .. } => assert_eq!(op, CompareOp::Ge),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn invert_applies_de_morgan() {
        let cond = Condition::And(vec![
            Condition::Compare { op: CompareOp::Eq, left: value(), right: value() },
            Condition::BooleanValue { value: value(), inverted: false },
        ]);
        match cond.invert() {
            Condition::Or(parts) => {
                assert!(matches!(parts[0], Condition::Compare { op: CompareOp::Ne, .. }));
                assert!(matches!(parts[1], Condition::BooleanValue { inverted: true, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
