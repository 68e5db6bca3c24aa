use thiserror::Error;

/// Errors raised while lowering raw bytecode to the decompiler IR.
///
/// Only some of these abort the whole run: an opcode the engine cannot
/// represent means the decoder itself is incomplete, while truncated input or
/// dangling pool references are just bad data for one method. The pipeline
/// consults [`DecodeError::is_fatal`] to pick between the two policies.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("unsupported opcode 0x{opcode:02x} at offset {offset}")]
    Unsupported { opcode: u8, offset: u32 },
    #[error("jsr/ret subroutines are not supported (offset {offset})")]
    Subroutine { offset: u32 },
    #[error("code attribute truncated at offset {offset}")]
    Truncated { offset: u32 },
    #[error("constant pool index {index} cannot be resolved")]
    BadConstant { index: u16 },
    #[error("branch target {target} does not land on an instruction")]
    BadBranchTarget { target: u32 },
    #[error("malformed descriptor '{0}'")]
    BadDescriptor(String),
}

impl DecodeError {
    /// True when the error signals a gap in the engine rather than bad
    /// input, in which case it must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DecodeError::Unsupported { .. } | DecodeError::Subroutine { .. }
        )
    }
}

/// Errors fatal to a single method's body construction.
///
/// These never escape the pipeline's per-method boundary; the failing method
/// gets a placeholder comment block and the rest of the class proceeds.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum BodyError {
    #[error("virtual stack underflow at instruction {pos}")]
    StackUnderflow { pos: usize },
    #[error("no local variable live for slot {slot} at instruction {pos}")]
    UnresolvedLocal { slot: u16, pos: usize },
    #[error("local slot {slot} has overlapping live ranges")]
    OverlappingLocals { slot: u16 },
    #[error("value left on the virtual stack at end of statement")]
    StrandedValue,
    #[error("unsupported control flow: {0}")]
    UnsupportedFlow(String),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}
