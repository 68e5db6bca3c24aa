//! Expression nodes.

use std::rc::Rc;

use crate::ir::{BinaryOp, DynamicRef, FieldRef, InvokeKind, MethodRef};
use crate::locals::LocalInstance;
use crate::sig::TypeSig;

use super::Condition;

/// A value-producing AST node.
#[derive(Clone, Debug)]
pub enum Expr {
    IntConstant(i32),
    LongConstant(i64),
    FloatConstant(f32),
    DoubleConstant(f64),
    StringConstant(String),
    /// A class literal (`Foo.class`), internal name.
    TypeConstant(String),
    NullConstant,

    LocalAccess(Rc<LocalInstance>),
    ArrayAccess {
        array: Rc<Expr>,
        index: Rc<Expr>,
    },
    InstanceFieldAccess {
        owner: Rc<Expr>,
        field: FieldRef,
    },
    StaticFieldAccess {
        field: FieldRef,
    },

    Operator {
        op: BinaryOp,
        left: Rc<Expr>,
        right: Rc<Expr>,
    },
    Negate {
        operand: Rc<Expr>,
    },
    Cast {
        ty: TypeSig,
        value: Rc<Expr>,
    },
    InstanceOf {
        value: Rc<Expr>,
        ty: TypeSig,
    },
    /// Three-way numeric compare (`lcmp` and friends): -1, 0 or 1.
    NumberCompare {
        left: Rc<Expr>,
        right: Rc<Expr>,
    },

    InstanceInvoke {
        kind: InvokeKind,
        receiver: Rc<Expr>,
        method: MethodRef,
        args: Vec<Rc<Expr>>,
    },
    StaticInvoke {
        method: MethodRef,
        args: Vec<Rc<Expr>>,
    },
    DynamicInvoke {
        site: DynamicRef,
        args: Vec<Rc<Expr>>,
    },

    New {
        owner: String,
        ctor: Option<MethodRef>,
        args: Vec<Rc<Expr>>,
    },
    NewArray {
        element: TypeSig,
        length: Rc<Expr>,
    },
    MultiNewArray {
        ty: TypeSig,
        sizes: Vec<Rc<Expr>>,
    },
    ArrayLength {
        array: Rc<Expr>,
    },

    Ternary {
        condition: Box<Condition>,
        if_true: Rc<Expr>,
        if_false: Rc<Expr>,
    },

    /// A `new` whose constructor has not run yet; replaced by [`Expr::New`]
    /// when the `<init>` invoke is seen.
    Uninitialised {
        owner: String,
    },
}

impl Expr {
    /// The node's inferred static type.
    pub fn inferred_type(&self) -> TypeSig {
        match self {
            Expr::IntConstant(_) => TypeSig::Int,
            Expr::LongConstant(_) => TypeSig::Long,
            Expr::FloatConstant(_) => TypeSig::Float,
            Expr::DoubleConstant(_) => TypeSig::Double,
            Expr::StringConstant(_) => TypeSig::Object("java/lang/String".into()),
            Expr::TypeConstant(_) => TypeSig::Object("java/lang/Class".into()),
            Expr::NullConstant => TypeSig::Object("java/lang/Object".into()),
            Expr::LocalAccess(local) => local.ty.clone(),
            Expr::ArrayAccess { array, .. } => match array.inferred_type() {
                TypeSig::Array(element) => *element,
                _ => TypeSig::Object("java/lang/Object".into()),
            },
            Expr::InstanceFieldAccess { field, .. } | Expr::StaticFieldAccess { field } => {
                field.ty.clone()
            }
            Expr::Operator { left, .. } => left.inferred_type(),
            Expr::Negate { operand } => operand.inferred_type(),
            Expr::Cast { ty, .. } => ty.clone(),
            Expr::InstanceOf { .. } => TypeSig::Boolean,
            Expr::NumberCompare { .. } => TypeSig::Int,
            Expr::InstanceInvoke { method, .. } | Expr::StaticInvoke { method, .. } => {
                method.sig.ret.clone()
            }
            Expr::DynamicInvoke { site, .. } => site.sig.ret.clone(),
            Expr::New { owner, .. } | Expr::Uninitialised { owner } => {
                TypeSig::Object(owner.clone())
            }
            Expr::NewArray { element, .. } => TypeSig::Array(Box::new(element.clone())),
            Expr::MultiNewArray { ty, .. } => ty.clone(),
            Expr::ArrayLength { .. } => TypeSig::Int,
            Expr::Ternary { if_true, .. } => if_true.inferred_type(),
        }
    }
}
