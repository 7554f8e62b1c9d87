//! Code generation errors. All of these are fatal; most indicate a
//! compiler bug rather than a user mistake.

use pcc_util::Symbol;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodeGenError {
    #[error("internal error: variable `{name}` has no stack slot")]
    VarNotOnStack { name: Symbol },

    #[error("internal error: method frame overflow allocating `{name}`")]
    StackOverflow { name: Symbol },

    #[error("internal error: no register available for allocation")]
    NoRegisterAvailable,

    #[error("internal error: {context} operand cannot be sized")]
    UnsizedOperand { context: &'static str },

    #[error("internal error: void operand in {context}")]
    VoidOperand { context: &'static str },

    #[error("floating-point immediates are not supported ({value})")]
    FloatImmediate { value: f64 },

    #[error("method `{method}` passes {count} arguments; at most 8 register arguments are supported")]
    TooManyArguments { method: Symbol, count: usize },
}

pub type Result<T> = std::result::Result<T, CodeGenError>;
