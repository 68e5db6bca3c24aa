//! Pre-order traversal over the AST.
//!
//! External consumers (emitters, serializers, reference finders) dispatch on
//! concrete node kinds by matching the [`Expr`] / [`Stmt`] / [`Condition`]
//! enums; the visitor hooks here cover the common walk-and-collect cases
//! such as finding references to a local.

use std::rc::Rc;

use crate::locals::LocalInstance;

use super::{Condition, Expr, StatementBlock, Stmt};

/// Callbacks invoked while walking a tree. All default to no-ops.
pub trait AstVisitor {
    fn visit_expression(&mut self, _expr: &Expr) {}
    fn visit_statement(&mut self, _stmt: &Stmt) {}
    fn visit_condition(&mut self, _cond: &Condition) {}
    /// Called for every local read or written, including assignment targets.
    fn visit_local_instance(&mut self, _local: &Rc<LocalInstance>) {}
}

pub fn walk_expr<V: AstVisitor + ?Sized>(visitor: &mut V, expr: &Expr) {
    visitor.visit_expression(expr);
    match expr {
        Expr::IntConstant(_)
        | Expr::LongConstant(_)
        | Expr::FloatConstant(_)
        | Expr::DoubleConstant(_)
        | Expr::StringConstant(_)
        | Expr::TypeConstant(_)
        | Expr::NullConstant
        | Expr::Uninitialised { .. } => {}
        Expr::LocalAccess(local) => visitor.visit_local_instance(local),
        Expr::ArrayAccess { array, index } => {
            walk_expr(visitor, array);
            walk_expr(visitor, index);
        }
        Expr::InstanceFieldAccess { owner, .. } => walk_expr(visitor, owner),
        Expr::StaticFieldAccess { .. } => {}
        Expr::Operator { left, right, .. } | Expr::NumberCompare { left, right } => {
            walk_expr(visitor, left);
            walk_expr(visitor, right);
        }
        Expr::Negate { operand } => walk_expr(visitor, operand),
        Expr::Cast { value, .. } | Expr::InstanceOf { value, .. } => walk_expr(visitor, value),
        Expr::InstanceInvoke { receiver, args, .. } => {
            walk_expr(visitor, receiver);
            for arg in args {
                walk_expr(visitor, arg);
            }
        }
        Expr::StaticInvoke { args, .. }
        | Expr::DynamicInvoke { args, .. }
        | Expr::New { args, .. } => {
            for arg in args {
                walk_expr(visitor, arg);
            }
        }
        Expr::NewArray { length, .. } => walk_expr(visitor, length),
        Expr::MultiNewArray { sizes, .. } => {
            for size in sizes {
                walk_expr(visitor, size);
            }
        }
        Expr::ArrayLength { array } => walk_expr(visitor, array),
        Expr::Ternary { condition, if_true, if_false } => {
            walk_condition(visitor, condition);
            walk_expr(visitor, if_true);
            walk_expr(visitor, if_false);
        }
    }
}

pub fn walk_condition<V: AstVisitor + ?Sized>(visitor: &mut V, cond: &Condition) {
    visitor.visit_condition(cond);
    match cond {
        Condition::BooleanValue { value, .. } => walk_expr(visitor, value),
        Condition::Compare { left, right, .. } => {
            walk_expr(visitor, left);
            walk_expr(visitor, right);
        }
        Condition::And(parts) | Condition::Or(parts) => {
            for part in parts {
                walk_condition(visitor, part);
            }
        }
    }
}

pub fn walk_stmt<V: AstVisitor + ?Sized>(visitor: &mut V, stmt: &Stmt) {
    visitor.visit_statement(stmt);
    match stmt {
        Stmt::LocalAssign { local, value } => {
            visitor.visit_local_instance(local);
            walk_expr(visitor, value);
        }
        Stmt::InstanceFieldAssign { owner, value, .. } => {
            walk_expr(visitor, owner);
            walk_expr(visitor, value);
        }
        Stmt::StaticFieldAssign { value, .. } => walk_expr(visitor, value),
        Stmt::ArrayAssign { array, index, value } => {
            walk_expr(visitor, array);
            walk_expr(visitor, index);
            walk_expr(visitor, value);
        }
        Stmt::Increment { local, .. } => visitor.visit_local_instance(local),
        Stmt::Invoke { expr } => walk_expr(visitor, expr),
        Stmt::Return { value } => {
            if let Some(value) = value {
                walk_expr(visitor, value);
            }
        }
        Stmt::Throw { value } | Stmt::Monitor { value, .. } => walk_expr(visitor, value),
        Stmt::Comment { .. } => {}
        Stmt::If { condition, body, else_body } => {
            walk_condition(visitor, condition);
            walk_block(visitor, body);
            if let Some(else_body) = else_body {
                walk_block(visitor, else_body);
            }
        }
        Stmt::While { condition, body } | Stmt::DoWhile { body, condition } => {
            walk_condition(visitor, condition);
            walk_block(visitor, body);
        }
        Stmt::Switch { value, cases, default } => {
            walk_expr(visitor, value);
            for case in cases {
                walk_block(visitor, &case.body);
            }
            if let Some(default) = default {
                walk_block(visitor, default);
            }
        }
    }
}

pub fn walk_block<V: AstVisitor + ?Sized>(visitor: &mut V, block: &StatementBlock) {
    for stmt in &block.statements {
        walk_stmt(visitor, stmt);
    }
}

struct LocalFinder<'a> {
    local: &'a Rc<LocalInstance>,
    found: bool,
}

impl AstVisitor for LocalFinder<'_> {
    fn visit_local_instance(&mut self, local: &Rc<LocalInstance>) {
        if Rc::ptr_eq(self.local, local) {
            self.found = true;
        }
    }
}

/// Whether the expression references the given local instance (by identity,
/// never by slot index).
pub fn references_expr(expr: &Expr, local: &Rc<LocalInstance>) -> bool {
    let mut finder = LocalFinder { local, found: false };
    walk_expr(&mut finder, expr);
    finder.found
}

/// Whether the statement references the given local instance.
pub fn references_stmt(stmt: &Stmt, local: &Rc<LocalInstance>) -> bool {
    let mut finder = LocalFinder { local, found: false };
    walk_stmt(&mut finder, stmt);
    finder.found
}

/// Whether the condition references the given local instance.
pub fn references_condition(cond: &Condition, local: &Rc<LocalInstance>) -> bool {
    let mut finder = LocalFinder { local, found: false };
    walk_condition(&mut finder, cond);
    finder.found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sig::TypeSig;

    fn instance(slot: u16) -> Rc<LocalInstance> {
        Rc::new(LocalInstance {
            slot,
            name: format!("var{}", slot),
            ty: TypeSig::Int,
            start: 0,
            end: 10,
        })
    }

    #[test]
    fn finds_local_by_identity_not_slot() {
        let a = instance(1);
        let ghost = instance(1); // same slot, different instance
        let expr = Expr::Operator {
            op: crate::ir::BinaryOp::Add,
            left: Rc::new(Expr::LocalAccess(Rc::clone(&a))),
            right: Rc::new(Expr::IntConstant(3)),
        };
        assert!(references_expr(&expr, &a));
        assert!(!references_expr(&expr, &ghost));
    }

    #[test]
    fn finds_assignment_target() {
        let a = instance(2);
        let stmt = Stmt::LocalAssign {
            local: Rc::clone(&a),
            value: Rc::new(Expr::IntConstant(0)),
        };
        assert!(references_stmt(&stmt, &a));
    }
}
