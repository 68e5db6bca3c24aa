//! Expression building by virtual-stack simulation.
//!
//! One statement's instruction run is consumed in order; every instruction
//! pops its declared operand count of previously built nodes (most recently
//! pushed first) and pushes the node it constructs. Values duplicated by the
//! `dup` family are pushed as `Rc` clones of the same node, so both eventual
//! consumers hold the identical child — later passes rely on that identity
//! to recover compound assignments.

use std::rc::Rc;

use crate::ast::{Expr, Stmt};
use crate::error::BodyError;
use crate::ir::{Entry, Insn, InvokeKind};
use crate::locals::Locals;
use crate::raw::Constant;

/// The outcome of simulating one instruction run: completed statements plus
/// whatever remains on the virtual stack (operands for a trailing branch,
/// or a single result for expression-position runs).
pub struct BuiltRun {
    pub statements: Vec<Stmt>,
    pub stack: Vec<Rc<Expr>>,
}

struct Builder<'a> {
    locals: &'a Locals,
    /// Sequence index of the run's first entry, for local resolution.
    base: usize,
    stack: Vec<Rc<Expr>>,
    statements: Vec<Stmt>,
}

impl<'a> Builder<'a> {
    fn pop(&mut self, pos: usize) -> Result<Rc<Expr>, BodyError> {
        self.stack
            .pop()
            .ok_or(BodyError::StackUnderflow { pos: self.base + pos })
    }

    fn pop_n(&mut self, n: usize, pos: usize) -> Result<Vec<Rc<Expr>>, BodyError> {
        // Popped most-recent-first, returned in push (declaration) order.
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.pop(pos)?);
        }
        out.reverse();
        Ok(out)
    }

    fn push(&mut self, expr: Expr) {
        self.stack.push(Rc::new(expr));
    }

    /// Emit for side effect: invocations and allocations become expression
    /// statements, inert values are silently dropped.
    fn discard(&mut self, value: Rc<Expr>) {
        match &*value {
            Expr::InstanceInvoke { .. }
            | Expr::StaticInvoke { .. }
            | Expr::DynamicInvoke { .. }
            | Expr::New { .. } => self.statements.push(Stmt::Invoke { expr: value }),
            _ => {}
        }
    }
}

/// Simulate `entries` (a statement run with no control transfers), starting
/// from an empty virtual stack. `base` is the run's offset within the full
/// method sequence.
pub fn build_run(entries: &[Entry], base: usize, locals: &Locals) -> Result<BuiltRun, BodyError> {
    build_run_with(entries, base, locals, Vec::new())
}

/// Like [`build_run`] but seeded with values already on the virtual stack,
/// for a run that consumes the result of a conditional expression built by
/// the caller.
pub fn build_run_with(
    entries: &[Entry],
    base: usize,
    locals: &Locals,
    stack: Vec<Rc<Expr>>,
) -> Result<BuiltRun, BodyError> {
    let mut b = Builder { locals, base, stack, statements: Vec::new() };

    for (i, entry) in entries.iter().enumerate() {
        match &entry.insn {
            Insn::Label(_) => {}

            Insn::IntConst(v) => b.push(Expr::IntConstant(*v)),
            Insn::LongConst(v) => b.push(Expr::LongConstant(*v)),
            Insn::FloatConst(v) => b.push(Expr::FloatConstant(*v)),
            Insn::DoubleConst(v) => b.push(Expr::DoubleConstant(*v)),
            Insn::NullConst => b.push(Expr::NullConstant),
            Insn::Push(Constant::String(s)) => b.push(Expr::StringConstant(s.clone())),
            Insn::Push(Constant::Class(name)) => b.push(Expr::TypeConstant(name.clone())),
            Insn::Push(Constant::Int(v)) => b.push(Expr::IntConstant(*v)),
            Insn::Push(Constant::Long(v)) => b.push(Expr::LongConstant(*v)),
            Insn::Push(Constant::Float(v)) => b.push(Expr::FloatConstant(*v)),
            Insn::Push(Constant::Double(v)) => b.push(Expr::DoubleConstant(*v)),

            Insn::LocalLoad { slot, .. } => {
                let local = b.locals.resolve(*slot, base + i)?;
                b.push(Expr::LocalAccess(local));
            }
            Insn::LocalStore { slot, .. } => {
                let value = b.pop(i)?;
                let local = b.locals.resolve_store(*slot, base + i)?;
                b.statements.push(Stmt::LocalAssign { local, value });
            }
            Insn::Iinc { slot, amount } => {
                let local = b.locals.resolve(*slot, base + i)?;
                b.statements.push(Stmt::Increment { local, amount: *amount });
            }

            Insn::ArrayLoad => {
                let index = b.pop(i)?;
                let array = b.pop(i)?;
                b.push(Expr::ArrayAccess { array, index });
            }
            Insn::ArrayStore => {
                let value = b.pop(i)?;
                let index = b.pop(i)?;
                let array = b.pop(i)?;
                b.statements.push(Stmt::ArrayAssign { array, index, value });
            }
            Insn::ArrayLength => {
                let array = b.pop(i)?;
                b.push(Expr::ArrayLength { array });
            }

            Insn::GetField(field) => {
                let owner = b.pop(i)?;
                b.push(Expr::InstanceFieldAccess { owner, field: field.clone() });
            }
            Insn::GetStatic(field) => b.push(Expr::StaticFieldAccess { field: field.clone() }),
            Insn::PutField(field) => {
                let value = b.pop(i)?;
                let owner = b.pop(i)?;
                b.statements.push(Stmt::InstanceFieldAssign {
                    owner,
                    field: field.clone(),
                    value,
                });
            }
            Insn::PutStatic(field) => {
                let value = b.pop(i)?;
                b.statements.push(Stmt::StaticFieldAssign { field: field.clone(), value });
            }

            Insn::Op(op) => {
                let right = b.pop(i)?;
                let left = b.pop(i)?;
                b.push(Expr::Operator { op: *op, left, right });
            }
            Insn::Neg => {
                let operand = b.pop(i)?;
                b.push(Expr::Negate { operand });
            }
            Insn::Cmp => {
                let right = b.pop(i)?;
                let left = b.pop(i)?;
                b.push(Expr::NumberCompare { left, right });
            }
            Insn::Cast(ty) => {
                let value = b.pop(i)?;
                b.push(Expr::Cast { ty: ty.clone(), value });
            }
            Insn::InstanceOf(ty) => {
                let value = b.pop(i)?;
                b.push(Expr::InstanceOf { value, ty: ty.clone() });
            }

            Insn::Invoke { kind, method } => {
                let args = b.pop_n(method.sig.param_count(), i)?;
                let receiver = b.pop(i)?;
                if *kind == InvokeKind::Special && method.name == "<init>" {
                    if let Expr::Uninitialised { owner } = &*receiver {
                        let built = Rc::new(Expr::New {
                            owner: owner.clone(),
                            ctor: Some(method.clone()),
                            args,
                        });
                        // The dup'd copy of the uninitialised value is still
                        // on the stack; swap every copy for the built node so
                        // all consumers share it.
                        let mut replaced = false;
                        for slot in b.stack.iter_mut() {
                            if Rc::ptr_eq(slot, &receiver) {
                                *slot = Rc::clone(&built);
                                replaced = true;
                            }
                        }
                        if !replaced {
                            b.statements.push(Stmt::Invoke { expr: built });
                        }
                        continue;
                    }
                }
                let expr = Expr::InstanceInvoke {
                    kind: *kind,
                    receiver,
                    method: method.clone(),
                    args,
                };
                if method.sig.returns_value() {
                    b.push(expr);
                } else {
                    b.statements.push(Stmt::Invoke { expr: Rc::new(expr) });
                }
            }
            Insn::InvokeStatic(method) => {
                let args = b.pop_n(method.sig.param_count(), i)?;
                let expr = Expr::StaticInvoke { method: method.clone(), args };
                if method.sig.returns_value() {
                    b.push(expr);
                } else {
                    b.statements.push(Stmt::Invoke { expr: Rc::new(expr) });
                }
            }
            Insn::InvokeDynamic(site) => {
                let args = b.pop_n(site.sig.param_count(), i)?;
                let expr = Expr::DynamicInvoke { site: site.clone(), args };
                if site.sig.returns_value() {
                    b.push(expr);
                } else {
                    b.statements.push(Stmt::Invoke { expr: Rc::new(expr) });
                }
            }

            Insn::New(owner) => b.push(Expr::Uninitialised { owner: owner.clone() }),
            Insn::NewArray(element) => {
                let length = b.pop(i)?;
                b.push(Expr::NewArray { element: element.clone(), length });
            }
            Insn::MultiNewArray { ty, dims } => {
                let sizes = b.pop_n(*dims as usize, i)?;
                b.push(Expr::MultiNewArray { ty: ty.clone(), sizes });
            }

            Insn::Dup => {
                let value = b.pop(i)?;
                b.stack.push(Rc::clone(&value));
                b.stack.push(value);
            }
            Insn::DupX1 => {
                let v1 = b.pop(i)?;
                let v2 = b.pop(i)?;
                b.stack.push(Rc::clone(&v1));
                b.stack.push(v2);
                b.stack.push(v1);
            }
            Insn::DupX2 => {
                let v1 = b.pop(i)?;
                let v2 = b.pop(i)?;
                let v3 = b.pop(i)?;
                b.stack.push(Rc::clone(&v1));
                b.stack.push(v3);
                b.stack.push(v2);
                b.stack.push(v1);
            }
            Insn::Dup2 => {
                let v1 = b.pop(i)?;
                let v2 = b.pop(i)?;
                b.stack.push(Rc::clone(&v2));
                b.stack.push(Rc::clone(&v1));
                b.stack.push(v2);
                b.stack.push(v1);
            }
            Insn::Dup2X1 => {
                let v1 = b.pop(i)?;
                let v2 = b.pop(i)?;
                let v3 = b.pop(i)?;
                b.stack.push(Rc::clone(&v2));
                b.stack.push(Rc::clone(&v1));
                b.stack.push(v3);
                b.stack.push(v2);
                b.stack.push(v1);
            }
            Insn::Dup2X2 => {
                let v1 = b.pop(i)?;
                let v2 = b.pop(i)?;
                let v3 = b.pop(i)?;
                let v4 = b.pop(i)?;
                b.stack.push(Rc::clone(&v2));
                b.stack.push(Rc::clone(&v1));
                b.stack.push(v4);
                b.stack.push(v3);
                b.stack.push(v2);
                b.stack.push(v1);
            }
            Insn::Pop => {
                let value = b.pop(i)?;
                b.discard(value);
            }
            Insn::Swap => {
                let v1 = b.pop(i)?;
                let v2 = b.pop(i)?;
                b.stack.push(v1);
                b.stack.push(v2);
            }

            Insn::Return => b.statements.push(Stmt::Return { value: None }),
            Insn::ValueReturn => {
                let value = b.pop(i)?;
                b.statements.push(Stmt::Return { value: Some(value) });
            }
            Insn::Throw => {
                let value = b.pop(i)?;
                b.statements.push(Stmt::Throw { value });
            }
            Insn::MonitorEnter => {
                let value = b.pop(i)?;
                b.statements.push(Stmt::Monitor { enter: true, value });
            }
            Insn::MonitorExit => {
                let value = b.pop(i)?;
                b.statements.push(Stmt::Monitor { enter: false, value });
            }

            Insn::IfEq(_) | Insn::IfNe(_) | Insn::IfCmp { .. } | Insn::Goto(_)
            | Insn::Switch { .. } => {
                return Err(BodyError::UnsupportedFlow(format!(
                    "control transfer inside statement run at {}",
                    base + i
                )));
            }
        }
    }

    Ok(BuiltRun { statements: b.statements, stack: b.stack })
}

/// Like [`build_run`], but the run must leave the virtual stack empty.
pub fn build_statements(
    entries: &[Entry],
    base: usize,
    locals: &Locals,
) -> Result<Vec<Stmt>, BodyError> {
    let run = build_run(entries, base, locals)?;
    if !run.stack.is_empty() {
        return Err(BodyError::StrandedValue);
    }
    Ok(run.statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, Entry};
    use crate::sig::{self, TypeSig};

    fn entries(insns: Vec<Insn>) -> Vec<Entry> {
        insns
            .into_iter()
            .enumerate()
            .map(|(i, insn)| Entry { insn, pos: i as u32 })
            .collect()
    }

    fn int_locals(seq: &[Entry], params: usize) -> Locals {
        let desc = format!("({})V", "I".repeat(params));
        let seq = crate::ir::InsnSeq::from_entries(seq.to_vec());
        Locals::build(&seq, "test/Sample", &sig::parse_method(&desc).unwrap(), true, &[]).unwrap()
    }

    fn load(slot: u16) -> Insn {
        Insn::LocalLoad { slot, ty: TypeSig::Int }
    }

    fn store(slot: u16) -> Insn {
        Insn::LocalStore { slot, ty: TypeSig::Int }
    }

    #[test]
    fn binary_operands_in_push_order() {
        let run = entries(vec![load(0), load(1), Insn::Op(BinaryOp::Sub), store(2)]);
        let locals = int_locals(&run, 2);
        let stmts = build_statements(&run, 0, &locals).unwrap();
        assert_eq!(stmts.len(), 1);
        match &stmts[0] {
            Stmt::LocalAssign { value, .. } => match &**value {
                Expr::Operator { op: BinaryOp::Sub, left, right } => {
                    // first-pushed load is the left operand
                    match (&**left, &**right) {
                        (Expr::LocalAccess(l), Expr::LocalAccess(r)) => {
                            assert_eq!(l.slot, 0);
                            assert_eq!(r.slot, 1);
                        }
                        other => panic!("unexpected operands {:?}", other),
                    }
                }
                other => panic!("unexpected value {:?}", other),
            },
            other => panic!("unexpected stmt {:?}", other),
        }
    }

    #[test]
    fn expression_run_leaves_one_value() {
        let run = entries(vec![load(0), load(1), Insn::Op(BinaryOp::Add)]);
        let locals = int_locals(&run, 2);
        let built = build_run(&run, 0, &locals).unwrap();
        assert!(built.statements.is_empty());
        assert_eq!(built.stack.len(), 1);
    }

    #[test]
    fn underflow_is_reported_with_position() {
        let run = entries(vec![Insn::Op(BinaryOp::Add)]);
        let locals = int_locals(&run, 0);
        assert_eq!(
            build_statements(&run, 7, &locals).unwrap_err(),
            BodyError::StackUnderflow { pos: 7 }
        );
    }

    #[test]
    fn dup_shares_node_identity() {
        // i = j = 3  =>  iconst_3; dup; istore_1; istore_2  (slots inferred)
        let run = entries(vec![Insn::IntConst(3), Insn::Dup, store(1), store(2)]);
        let locals = int_locals(&run, 0);
        let stmts = build_statements(&run, 0, &locals).unwrap();
        assert_eq!(stmts.len(), 2);
        let values: Vec<_> = stmts
            .iter()
            .map(|s| match s {
                Stmt::LocalAssign { value, .. } => Rc::clone(value),
                other => panic!("unexpected stmt {:?}", other),
            })
            .collect();
        assert!(Rc::ptr_eq(&values[0], &values[1]), "dup must share, not copy");
    }

    #[test]
    fn stranded_value_is_an_error() {
        let run = entries(vec![Insn::IntConst(3)]);
        let locals = int_locals(&run, 0);
        assert_eq!(
            build_statements(&run, 0, &locals).unwrap_err(),
            BodyError::StrandedValue
        );
    }
}
