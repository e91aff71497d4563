//! Errors produced while building IR.

use thiserror::Error;

/// A failure that aborts the current function compilation.
///
/// Corrupt bytecode indicates a mismatched or damaged input; it is never
/// recoverable, but it only kills this compilation, not the process.
#[derive(Error, Debug)]
pub enum CodegenError {
    /// The bytecode stream or its side tables violate an invariant.
    #[error("corrupt bytecode at offset {offset}: {reason}")]
    CorruptBytecode {
        reason: &'static str,
        offset: u32,
    },

    /// Scratch allocation failed.
    #[error("out of memory during compilation")]
    OutOfMemory,
}

impl CodegenError {
    pub fn corrupt(reason: &'static str, offset: u32) -> Self {
        CodegenError::CorruptBytecode { reason, offset }
    }
}

/// A convenient alias for a `Result` with a `CodegenError`.
pub type CodegenResult<T> = Result<T, CodegenError>;
