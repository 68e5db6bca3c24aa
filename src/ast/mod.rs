//! The typed AST produced by decompilation.
//!
//! Expression and condition trees are acyclic and effectively single-owner;
//! children sit behind `Rc` so that the one deliberate exception — values
//! duplicated by the `dup` instruction family — can be the *same* node
//! shared by both consumers, observable through `Rc::ptr_eq`.

pub mod cond;
pub mod expr;
pub mod stmt;
pub mod visitor;

pub use cond::Condition;
pub use expr::Expr;
pub use stmt::{BlockKind, StatementBlock, Stmt, SwitchCase};
