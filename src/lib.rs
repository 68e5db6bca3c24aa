//! declass — recovers structured Java-like source trees from JVM
//! stack-machine bytecode.
//!
//! The engine works per method: the code array is decoded to a simplified
//! instruction sequence ([`ir`]), split into statements by stack-balance
//! analysis ([`segment`]), rebuilt into expression trees over a virtual
//! operand stack ([`builder`]), and structured into `if`/loop/`switch`
//! statements ([`flow`]). The staged [`pipeline`] drives these phases over
//! whole classes with per-method failure isolation, and [`emit`] renders the
//! result as Java source text.
//!
//! Classfile parsing is the caller's concern: bodies arrive as raw code
//! bytes plus a [`raw::ConstantResolver`] over the class's constant pool.

pub mod ast;
pub mod builder;
pub mod emit;
pub mod error;
pub mod flow;
pub mod ir;
pub mod locals;
pub mod pipeline;
pub mod raw;
pub mod segment;
pub mod sig;

pub use error::{BodyError, DecodeError};
pub use pipeline::{ClassEntry, ClassSource, Decompiler, MethodSource, Options};

/// Decompile one class with default options.
pub fn decompile(
    class: &ClassSource,
    pool: &dyn raw::ConstantResolver,
) -> Result<ClassEntry, DecodeError> {
    Decompiler::default().decompile_class(class, pool)
}
