//! A compact Java source emitter.
//!
//! Renders a [`ClassEntry`] as readable Java-ish text. This is the reference
//! consumer of the node set: it dispatches exhaustively on every concrete
//! node kind, and the output is deterministic so two runs over the same
//! input compare equal. Emitters for other targets can be written externally
//! against the same enums.

use std::rc::Rc;

use crate::ast::{Condition, Expr, StatementBlock, Stmt};
use crate::locals::LocalInstance;
use crate::pipeline::{ClassEntry, MethodEntry, MethodFlags};
use crate::sig::{self, TypeSig};

/// Render a decompiled class as Java source text.
pub fn emit_class(entry: &ClassEntry) -> String {
    let mut out = String::new();
    out.push_str(&format!("class {} {{\n", sig::simple_name(&entry.name)));
    for (i, method) in entry.methods.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&emit_method(&entry.name, method));
    }
    out.push_str("}\n");
    out
}

fn modifiers(flags: MethodFlags) -> String {
    let mut parts = Vec::new();
    if flags.contains(MethodFlags::PUBLIC) {
        parts.push("public");
    }
    if flags.contains(MethodFlags::PROTECTED) {
        parts.push("protected");
    }
    if flags.contains(MethodFlags::PRIVATE) {
        parts.push("private");
    }
    if flags.contains(MethodFlags::STATIC) {
        parts.push("static");
    }
    if flags.contains(MethodFlags::FINAL) {
        parts.push("final");
    }
    if flags.contains(MethodFlags::SYNCHRONIZED) {
        parts.push("synchronized");
    }
    if flags.contains(MethodFlags::NATIVE) {
        parts.push("native");
    }
    if flags.contains(MethodFlags::ABSTRACT) {
        parts.push("abstract");
    }
    let mut out = parts.join(" ");
    if !out.is_empty() {
        out.push(' ');
    }
    out
}

fn emit_method(class_name: &str, method: &MethodEntry) -> String {
    let mut slot: u16 = if method.flags.contains(MethodFlags::STATIC) { 0 } else { 1 };
    let params: Vec<String> = method
        .sig
        .params
        .iter()
        .enumerate()
        .map(|(i, ty)| {
            let name = method
                .locals
                .iter()
                .find(|local| local.slot == slot && local.start == 0)
                .map(|local| local.name.clone())
                .unwrap_or_else(|| format!("param{}", i));
            slot += if ty.is_wide() { 2 } else { 1 };
            format!("{} {}", ty.source_name(), name)
        })
        .collect();
    let head = if method.name == "<init>" {
        format!(
            "    {}{}({})",
            modifiers(method.flags),
            sig::simple_name(class_name),
            params.join(", ")
        )
    } else {
        format!(
            "    {}{} {}({})",
            modifiers(method.flags),
            method.sig.ret.source_name(),
            method.name,
            params.join(", ")
        )
    };
    match &method.body {
        None => format!("{};\n", head),
        Some(body) => {
            let mut e = Emitter { out: String::new(), indent: 2, declared: Vec::new() };
            e.block(body);
            format!("{} {{\n{}    }}\n", head, e.out)
        }
    }
}

struct Emitter {
    out: String,
    indent: usize,
    /// Locals already given a declaration line, by identity.
    declared: Vec<Rc<LocalInstance>>,
}

impl Emitter {
    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn block(&mut self, block: &StatementBlock) {
        for stmt in &block.statements {
            self.stmt(stmt);
        }
    }

    fn nested(&mut self, block: &StatementBlock) {
        self.indent += 1;
        self.block(block);
        self.indent -= 1;
    }

    fn is_declared(&self, local: &Rc<LocalInstance>) -> bool {
        self.declared.iter().any(|d| Rc::ptr_eq(d, local))
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::LocalAssign { local, value } => {
                let rhs = expr(value);
                // Parameters (range start 0) are never declared in the body.
                if local.start > 0 && !self.is_declared(local) {
                    self.declared.push(Rc::clone(local));
                    self.line(&format!("{} {} = {};", local.ty.source_name(), local.name, rhs));
                } else {
                    self.line(&format!("{} = {};", local.name, rhs));
                }
            }
            Stmt::InstanceFieldAssign { owner, field, value } => {
                self.line(&format!("{}.{} = {};", operand(owner), field.name, expr(value)));
            }
            Stmt::StaticFieldAssign { field, value } => {
                self.line(&format!(
                    "{}.{} = {};",
                    sig::source_class_name(&field.owner),
                    field.name,
                    expr(value)
                ));
            }
            Stmt::ArrayAssign { array, index, value } => {
                self.line(&format!(
                    "{}[{}] = {};",
                    operand(array),
                    expr(index),
                    expr(value)
                ));
            }
            Stmt::Increment { local, amount } => match *amount {
                1 => self.line(&format!("{}++;", local.name)),
                -1 => self.line(&format!("{}--;", local.name)),
                n if n < 0 => self.line(&format!("{} -= {};", local.name, -n)),
                n => self.line(&format!("{} += {};", local.name, n)),
            },
            Stmt::Invoke { expr: e } => {
                self.line(&format!("{};", expr(e)));
            }
            Stmt::Return { value: None } => self.line("return;"),
            Stmt::Return { value: Some(value) } => {
                self.line(&format!("return {};", expr(value)));
            }
            Stmt::Throw { value } => self.line(&format!("throw {};", expr(value))),
            Stmt::Monitor { enter, value } => {
                let op = if *enter { "monitorenter" } else { "monitorexit" };
                self.line(&format!("// {} {}", op, expr(value)));
            }
            Stmt::Comment { lines } => {
                for comment in lines {
                    self.line(&format!("// {}", comment));
                }
            }
            Stmt::If { condition, body, else_body } => {
                self.line(&format!("if ({}) {{", cond(condition)));
                self.nested(body);
                if let Some(else_body) = else_body {
                    self.line("} else {");
                    self.nested(else_body);
                }
                self.line("}");
            }
            Stmt::While { condition, body } => {
                self.line(&format!("while ({}) {{", cond(condition)));
                self.nested(body);
                self.line("}");
            }
            Stmt::DoWhile { body, condition } => {
                self.line("do {");
                self.nested(body);
                self.line(&format!("}} while ({});", cond(condition)));
            }
            Stmt::Switch { value, cases, default } => {
                self.line(&format!("switch ({}) {{", expr(value)));
                for case in cases {
                    for v in &case.values {
                        self.line(&format!("case {}:", v));
                    }
                    self.nested(&case.body);
                }
                if let Some(default) = default {
                    self.line("default:");
                    self.nested(default);
                }
                self.line("}");
            }
        }
    }
}

fn cond(condition: &Condition) -> String {
    match condition {
        Condition::BooleanValue { value, inverted } => {
            if *inverted {
                format!("!{}", operand(value))
            } else {
                expr(value)
            }
        }
        Condition::Compare { op, left, right } => {
            format!("{} {} {}", operand(left), op.symbol(), operand(right))
        }
        Condition::And(parts) => join_cond(parts, " && "),
        Condition::Or(parts) => join_cond(parts, " || "),
    }
}

fn join_cond(parts: &[Condition], sep: &str) -> String {
    parts
        .iter()
        .map(|p| match p {
            Condition::And(_) | Condition::Or(_) => format!("({})", cond(p)),
            simple => cond(simple),
        })
        .collect::<Vec<_>>()
        .join(sep)
}

/// Strip array layers, returning the element type and the depth removed.
fn peel(ty: &TypeSig) -> (&TypeSig, usize) {
    let mut depth = 0;
    let mut current = ty;
    while let TypeSig::Array(inner) = current {
        depth += 1;
        current = inner;
    }
    (current, depth)
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn args(values: &[Rc<Expr>]) -> String {
    values.iter().map(|a| expr(a)).collect::<Vec<_>>().join(", ")
}

/// Wrap compound expressions used as operands.
fn operand(e: &Expr) -> String {
    match e {
        Expr::Operator { .. }
        | Expr::Ternary { .. }
        | Expr::Cast { .. }
        | Expr::InstanceOf { .. }
        | Expr::Negate { .. } => format!("({})", expr(e)),
        simple => expr(simple),
    }
}

fn expr(e: &Expr) -> String {
    match e {
        Expr::IntConstant(v) => format!("{}", v),
        Expr::LongConstant(v) => format!("{}L", v),
        Expr::FloatConstant(v) => format!("{:?}F", v),
        Expr::DoubleConstant(v) => format!("{:?}", v),
        Expr::StringConstant(s) => format!("\"{}\"", escape(s)),
        Expr::TypeConstant(name) => format!("{}.class", sig::source_class_name(name)),
        Expr::NullConstant => "null".into(),

        Expr::LocalAccess(local) => local.name.clone(),
        Expr::ArrayAccess { array, index } => format!("{}[{}]", operand(array), expr(index)),
        Expr::InstanceFieldAccess { owner, field } => {
            format!("{}.{}", operand(owner), field.name)
        }
        Expr::StaticFieldAccess { field } => {
            format!("{}.{}", sig::source_class_name(&field.owner), field.name)
        }

        Expr::Operator { op, left, right } => {
            format!("{} {} {}", operand(left), op.symbol(), operand(right))
        }
        Expr::Negate { operand: value } => format!("-{}", operand(value)),
        Expr::Cast { ty, value } => format!("({}) {}", ty.source_name(), operand(value)),
        Expr::InstanceOf { value, ty } => {
            format!("{} instanceof {}", operand(value), ty.source_name())
        }
        Expr::NumberCompare { left, right } => {
            let wrapper = match left.inferred_type() {
                TypeSig::Long => "Long",
                TypeSig::Float => "Float",
                TypeSig::Double => "Double",
                _ => "Integer",
            };
            format!("{}.compare({}, {})", wrapper, expr(left), expr(right))
        }

        Expr::InstanceInvoke { receiver, method, args: call_args, .. } => {
            if method.name == "<init>" {
                // An explicit constructor call on `this`/`super`.
                return format!("super({})", args(call_args));
            }
            format!("{}.{}({})", operand(receiver), method.name, args(call_args))
        }
        Expr::StaticInvoke { method, args: call_args } => {
            format!(
                "{}.{}({})",
                sig::source_class_name(&method.owner),
                method.name,
                args(call_args)
            )
        }
        Expr::DynamicInvoke { site, args: call_args } => {
            format!("{}({})", site.name, args(call_args))
        }

        Expr::New { owner, args: call_args, .. } => {
            format!("new {}({})", sig::simple_name(owner), args(call_args))
        }
        Expr::NewArray { element, length } => {
            let (base, depth) = peel(element);
            format!(
                "new {}[{}]{}",
                base.source_name(),
                expr(length),
                "[]".repeat(depth)
            )
        }
        Expr::MultiNewArray { ty, sizes } => {
            let (base, depth) = peel(ty);
            let dims: String = sizes.iter().map(|s| format!("[{}]", expr(s))).collect();
            format!(
                "new {}{}{}",
                base.source_name(),
                dims,
                "[]".repeat(depth.saturating_sub(sizes.len()))
            )
        }
        Expr::ArrayLength { array } => format!("{}.length", operand(array)),

        Expr::Ternary { condition, if_true, if_false } => {
            format!("{} ? {} : {}", cond(condition), operand(if_true), operand(if_false))
        }

        Expr::Uninitialised { owner } => format!("new {}", sig::simple_name(owner)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BlockKind;
    use crate::ir::{BinaryOp, CompareOp};

    fn local(slot: u16, name: &str, start: usize) -> Rc<LocalInstance> {
        Rc::new(LocalInstance {
            slot,
            name: name.into(),
            ty: TypeSig::Int,
            start,
            end: 100,
        })
    }

    #[test]
    fn first_assignment_declares_the_local() {
        let var = local(1, "x", 2);
        let mut e = Emitter { out: String::new(), indent: 0, declared: Vec::new() };
        e.stmt(&Stmt::LocalAssign {
            local: Rc::clone(&var),
            value: Rc::new(Expr::IntConstant(1)),
        });
        e.stmt(&Stmt::LocalAssign { local: var, value: Rc::new(Expr::IntConstant(2)) });
        assert_eq!(e.out, "int x = 1;\nx = 2;\n");
    }

    #[test]
    fn parameters_are_never_declared() {
        let param = local(0, "param0", 0);
        let mut e = Emitter { out: String::new(), indent: 0, declared: Vec::new() };
        e.stmt(&Stmt::LocalAssign { local: param, value: Rc::new(Expr::IntConstant(5)) });
        assert_eq!(e.out, "param0 = 5;\n");
    }

    #[test]
    fn nested_operators_are_parenthesized() {
        let a = Rc::new(Expr::LocalAccess(local(0, "a", 0)));
        let b = Rc::new(Expr::LocalAccess(local(1, "b", 0)));
        let sum = Rc::new(Expr::Operator { op: BinaryOp::Add, left: a, right: b });
        let doubled = Expr::Operator {
            op: BinaryOp::Mul,
            left: sum,
            right: Rc::new(Expr::IntConstant(2)),
        };
        assert_eq!(expr(&doubled), "(a + b) * 2");
    }

    #[test]
    fn if_block_renders_with_braces() {
        let var = local(0, "a", 0);
        let stmt = Stmt::If {
            condition: Condition::Compare {
                op: CompareOp::Lt,
                left: Rc::new(Expr::LocalAccess(Rc::clone(&var))),
                right: Rc::new(Expr::IntConstant(10)),
            },
            body: StatementBlock::new(
                BlockKind::If,
                vec![Stmt::Return { value: Some(Rc::new(Expr::IntConstant(1))) }],
            ),
            else_body: None,
        };
        let mut e = Emitter { out: String::new(), indent: 0, declared: Vec::new() };
        e.stmt(&stmt);
        assert_eq!(e.out, "if (a < 10) {\n    return 1;\n}\n");
    }
}
