//! Statement nodes and statement blocks.

use std::rc::Rc;

use crate::ir::FieldRef;
use crate::locals::LocalInstance;

use super::{Condition, Expr};

/// One structured operation.
#[derive(Clone, Debug)]
pub enum Stmt {
    LocalAssign {
        local: Rc<LocalInstance>,
        value: Rc<Expr>,
    },
    InstanceFieldAssign {
        owner: Rc<Expr>,
        field: FieldRef,
        value: Rc<Expr>,
    },
    StaticFieldAssign {
        field: FieldRef,
        value: Rc<Expr>,
    },
    ArrayAssign {
        array: Rc<Expr>,
        index: Rc<Expr>,
        value: Rc<Expr>,
    },
    Increment {
        local: Rc<LocalInstance>,
        amount: i16,
    },
    /// An expression evaluated for its side effect (an invocation, or a
    /// value discarded by `pop`).
    Invoke {
        expr: Rc<Expr>,
    },
    Return {
        value: Option<Rc<Expr>>,
    },
    Throw {
        value: Rc<Expr>,
    },
    Monitor {
        enter: bool,
        value: Rc<Expr>,
    },
    /// The placeholder substituted for an undecompilable body.
    Comment {
        lines: Vec<String>,
    },

    If {
        condition: Condition,
        body: StatementBlock,
        else_body: Option<StatementBlock>,
    },
    While {
        condition: Condition,
        body: StatementBlock,
    },
    DoWhile {
        body: StatementBlock,
        condition: Condition,
    },
    Switch {
        value: Rc<Expr>,
        cases: Vec<SwitchCase>,
        default: Option<StatementBlock>,
    },
}

#[derive(Clone, Debug)]
pub struct SwitchCase {
    pub values: Vec<i32>,
    pub body: StatementBlock,
}

/// What a statement block is the body of.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockKind {
    MethodBody,
    If,
    Else,
    Loop,
    SwitchCase,
}

/// An ordered statement sequence with its block kind.
#[derive(Clone, Debug)]
pub struct StatementBlock {
    pub kind: BlockKind,
    pub statements: Vec<Stmt>,
}

impl StatementBlock {
    pub fn new(kind: BlockKind, statements: Vec<Stmt>) -> Self {
        StatementBlock { kind, statements }
    }
}
