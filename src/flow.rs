//! Control-flow structuring over the linear instruction sequence.
//!
//! Compiled shapes are recognized positionally, without building a full
//! control-flow graph:
//!
//! * a forward conditional branch opens an `if`; a forward `goto` just
//!   before the branch target adds the `else`
//! * an if/else shape whose arms each leave one value on the stack is a
//!   ternary expression feeding the statements after the join point
//! * a leading `goto` into a trailing condition run that branches back is a
//!   `while` loop
//! * a backward conditional branch closes a `do`/`while` loop
//! * a switch whose every case ends in a return or throw is a `switch`
//!
//! Anything else is reported as [`BodyError::UnsupportedFlow`] and the
//! caller substitutes a placeholder body.

use std::rc::Rc;

use crate::ast::{BlockKind, Condition, Expr, StatementBlock, Stmt, SwitchCase};
use crate::builder;
use crate::error::BodyError;
use crate::ir::{CompareOp, Entry, Insn, InsnSeq};
use crate::locals::Locals;
use crate::segment;
use crate::sig::TypeSig;

/// Structure a whole method body.
pub fn build_body(seq: &InsnSeq, locals: &Locals) -> Result<StatementBlock, BodyError> {
    let statements = structure(seq.entries(), 0, seq.len(), locals)?;
    Ok(StatementBlock::new(BlockKind::MethodBody, statements))
}

fn first_branch(entries: &[Entry], from: usize, to: usize) -> Option<usize> {
    (from..to).find(|&i| entries[i].insn.is_branch())
}

/// The earliest conditional branch in `[from, to)` that jumps backward to an
/// unconsumed position, together with its target.
fn backward_branch(entries: &[Entry], from: usize, to: usize) -> Option<(usize, usize)> {
    for i in from..to {
        match &entries[i].insn {
            Insn::IfEq(t) | Insn::IfNe(t) | Insn::IfCmp { target: t, .. }
                if *t <= i && *t >= from =>
            {
                return Some((i, *t));
            }
            _ => {}
        }
    }
    None
}

fn compare(op: CompareOp, left: Rc<Expr>, right: Rc<Expr>) -> Condition {
    // A three-way compare against zero is the branch's real comparison.
    if let (Expr::NumberCompare { left: nl, right: nr }, Expr::IntConstant(0)) =
        (&*left, &*right)
    {
        return Condition::Compare { op, left: Rc::clone(nl), right: Rc::clone(nr) };
    }
    Condition::Compare { op, left, right }
}

/// The condition under which the branch at `pos` is taken.
fn taken_condition(
    insn: &Insn,
    stack: &mut Vec<Rc<Expr>>,
    pos: usize,
) -> Result<Condition, BodyError> {
    let mut pop = || stack.pop().ok_or(BodyError::StackUnderflow { pos });
    match insn {
        Insn::IfEq(_) => {
            let value = pop()?;
            if value.inferred_type() == TypeSig::Boolean {
                Ok(Condition::BooleanValue { value, inverted: true })
            } else {
                Ok(compare(CompareOp::Eq, value, Rc::new(Expr::IntConstant(0))))
            }
        }
        Insn::IfNe(_) => {
            let value = pop()?;
            if value.inferred_type() == TypeSig::Boolean {
                Ok(Condition::BooleanValue { value, inverted: false })
            } else {
                Ok(compare(CompareOp::Ne, value, Rc::new(Expr::IntConstant(0))))
            }
        }
        Insn::IfCmp { op, .. } => {
            let right = pop()?;
            let left = pop()?;
            Ok(compare(*op, left, right))
        }
        other => Err(BodyError::UnsupportedFlow(format!(
            "{} is not a conditional branch",
            other
        ))),
    }
}

/// Build the operand run `[from, branch)` and fold it with the branch at
/// `branch` into a taken-condition.
fn condition_of_run(
    entries: &[Entry],
    from: usize,
    branch: usize,
    locals: &Locals,
) -> Result<Condition, BodyError> {
    let run = builder::build_run(&entries[from..branch], from, locals)?;
    if !run.statements.is_empty() {
        return Err(BodyError::UnsupportedFlow(format!(
            "side effects inside the branch condition at {}",
            branch
        )));
    }
    let mut stack = run.stack;
    let condition = taken_condition(&entries[branch].insn, &mut stack, branch)?;
    if !stack.is_empty() {
        return Err(BodyError::StrandedValue);
    }
    Ok(condition)
}

fn conditional_target(insn: &Insn) -> Option<usize> {
    match insn {
        Insn::IfEq(t) | Insn::IfNe(t) | Insn::IfCmp { target: t, .. } => Some(*t),
        _ => None,
    }
}

fn structure(
    entries: &[Entry],
    lo: usize,
    hi: usize,
    locals: &Locals,
) -> Result<Vec<Stmt>, BodyError> {
    let mut out = Vec::new();
    let mut i = lo;

    while i < hi {
        let Some(fb) = first_branch(entries, i, hi) else {
            if !segment::is_empty_of_logic(&entries[i..hi]) {
                out.extend(builder::build_statements(&entries[i..hi], i, locals)?);
            }
            break;
        };

        match &entries[fb].insn {
            Insn::Goto(target) => {
                let target = *target;
                if !segment::is_empty_of_logic(&entries[i..fb]) {
                    out.extend(builder::build_statements(&entries[i..fb], i, locals)?);
                }
                if target <= fb || target >= hi {
                    return Err(BodyError::UnsupportedFlow(format!(
                        "unstructured goto at {}",
                        fb
                    )));
                }
                // while: the goto jumps to a trailing condition run whose
                // conditional branch jumps back to the body label.
                let cb = first_branch(entries, target + 1, hi).ok_or_else(|| {
                    BodyError::UnsupportedFlow(format!("no loop branch after goto at {}", fb))
                })?;
                let back = conditional_target(&entries[cb].insn).ok_or_else(|| {
                    BodyError::UnsupportedFlow(format!("unstructured goto at {}", fb))
                })?;
                if back != fb + 1
                    || !matches!(entries[target].insn, Insn::Label(_))
                    || !matches!(entries[fb + 1].insn, Insn::Label(_))
                {
                    return Err(BodyError::UnsupportedFlow(format!(
                        "unstructured goto at {}",
                        fb
                    )));
                }
                let condition = condition_of_run(entries, target + 1, cb, locals)?;
                let body = structure(entries, fb + 1, target, locals)?;
                out.push(Stmt::While {
                    condition,
                    body: StatementBlock::new(BlockKind::Loop, body),
                });
                i = cb + 1;
            }

            Insn::Switch { cases, default } => {
                let cond_start = i + segment::start_of_last_statement(&entries[i..=fb]);
                if cond_start > i && !segment::is_empty_of_logic(&entries[i..cond_start]) {
                    out.extend(builder::build_statements(&entries[i..cond_start], i, locals)?);
                }
                let run = builder::build_run(&entries[cond_start..fb], cond_start, locals)?;
                let mut stack = run.stack;
                let value = stack.pop().ok_or(BodyError::StackUnderflow { pos: fb })?;
                if !run.statements.is_empty() || !stack.is_empty() {
                    return Err(BodyError::UnsupportedFlow(format!(
                        "unbalanced switch operand at {}",
                        fb
                    )));
                }

                // Group case values sharing a body, keep bodies in order.
                let mut grouped: Vec<(usize, Vec<i32>)> = Vec::new();
                for (case_value, target) in cases {
                    match grouped.iter_mut().find(|(t, _)| t == target) {
                        Some((_, values)) => values.push(*case_value),
                        None => grouped.push((*target, vec![*case_value])),
                    }
                }
                grouped.sort_by_key(|(target, _)| *target);

                let mut boundaries: Vec<usize> =
                    grouped.iter().map(|(t, _)| *t).chain([*default]).collect();
                boundaries.sort_unstable();
                boundaries.dedup();
                if boundaries.iter().any(|&t| t <= fb || t >= hi) {
                    return Err(BodyError::UnsupportedFlow(format!(
                        "switch target outside the region at {}",
                        fb
                    )));
                }
                let end_of = |start: usize| {
                    boundaries.iter().find(|&&b| b > start).copied().unwrap_or(hi)
                };
                let terminated = |body: &[Stmt]| {
                    matches!(body.last(), Some(Stmt::Return { .. }) | Some(Stmt::Throw { .. }))
                };

                let mut case_blocks = Vec::with_capacity(grouped.len());
                for (target, values) in grouped {
                    let body = structure(entries, target, end_of(target), locals)?;
                    if !terminated(&body) {
                        return Err(BodyError::UnsupportedFlow(format!(
                            "switch case at {} falls through",
                            target
                        )));
                    }
                    case_blocks.push(SwitchCase {
                        values,
                        body: StatementBlock::new(BlockKind::SwitchCase, body),
                    });
                }
                let default_end = end_of(*default);
                let default_block = if segment::is_empty_of_logic(&entries[*default..default_end])
                {
                    None
                } else {
                    let body = structure(entries, *default, default_end, locals)?;
                    if !terminated(&body) {
                        return Err(BodyError::UnsupportedFlow(format!(
                            "switch default at {} falls through",
                            default
                        )));
                    }
                    Some(StatementBlock::new(BlockKind::SwitchCase, body))
                };

                out.push(Stmt::Switch { value, cases: case_blocks, default: default_block });
                i = hi;
            }

            _conditional => {
                if let Some((bb, loop_start)) = backward_branch(entries, i, hi)
                    .filter(|&(_, t)| t <= fb)
                {
                    // do/while: everything from the target label up to the
                    // condition run repeats.
                    if !matches!(entries[loop_start].insn, Insn::Label(_)) {
                        return Err(BodyError::UnsupportedFlow(format!(
                            "backward branch at {} into mid-statement",
                            bb
                        )));
                    }
                    if loop_start > i && !segment::is_empty_of_logic(&entries[i..loop_start]) {
                        out.extend(builder::build_statements(
                            &entries[i..loop_start],
                            i,
                            locals,
                        )?);
                    }
                    let cond_start = loop_start
                        + segment::start_of_last_statement(&entries[loop_start..=bb]);
                    let body = structure(entries, loop_start, cond_start, locals)?;
                    let condition = condition_of_run(entries, cond_start, bb, locals)?;
                    out.push(Stmt::DoWhile {
                        body: StatementBlock::new(BlockKind::Loop, body),
                        condition,
                    });
                    i = bb + 1;
                    continue;
                }

                let target = match conditional_target(&entries[fb].insn) {
                    Some(t) if t > fb && t <= hi => t,
                    _ => {
                        return Err(BodyError::UnsupportedFlow(format!(
                            "conditional branch at {} leaves the region",
                            fb
                        )));
                    }
                };
                let cond_start = i + segment::start_of_last_statement(&entries[i..=fb]);
                if cond_start > i && !segment::is_empty_of_logic(&entries[i..cond_start]) {
                    out.extend(builder::build_statements(&entries[i..cond_start], i, locals)?);
                }
                // The branch skips the body when taken, so the source
                // condition is its inverse.
                let condition = condition_of_run(entries, cond_start, fb, locals)?.invert();

                // A forward goto just before the join point carries an else.
                let (then_end, else_range, next) = match &entries[target - 1].insn {
                    Insn::Goto(e) if *e > target && *e <= hi && target - 1 > fb => {
                        (target - 1, Some((target, *e)), *e)
                    }
                    _ => (target, None, target),
                };
                // Arms that only produce a value form a conditional
                // expression, not an if/else.
                if let Some((start, end)) = else_range {
                    if let (Ok(then_run), Ok(else_run)) = (
                        builder::build_run(&entries[fb + 1..then_end], fb + 1, locals),
                        builder::build_run(&entries[start..end], start, locals),
                    ) {
                        if then_run.statements.is_empty() && else_run.statements.is_empty() {
                            if let ([if_true], [if_false]) =
                                (then_run.stack.as_slice(), else_run.stack.as_slice())
                            {
                                let value = Rc::new(Expr::Ternary {
                                    condition: Box::new(condition),
                                    if_true: Rc::clone(if_true),
                                    if_false: Rc::clone(if_false),
                                });
                                let stop = first_branch(entries, next, hi).unwrap_or(hi);
                                let run = builder::build_run_with(
                                    &entries[next..stop],
                                    next,
                                    locals,
                                    vec![value],
                                )?;
                                if !run.stack.is_empty() {
                                    return Err(BodyError::StrandedValue);
                                }
                                out.extend(run.statements);
                                i = stop;
                                continue;
                            }
                        }
                    }
                }

                let then_body = structure(entries, fb + 1, then_end, locals)?;
                let else_body = match else_range {
                    Some((start, end)) => Some(StatementBlock::new(
                        BlockKind::Else,
                        structure(entries, start, end, locals)?,
                    )),
                    None => None,
                };
                out.push(Stmt::If {
                    condition,
                    body: StatementBlock::new(BlockKind::If, then_body),
                    else_body,
                });
                i = next;
            }
        }
    }

    Ok(out)
}
