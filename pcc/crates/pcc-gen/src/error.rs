//! Encoding and emission errors. Range failures are program-size bugs and
//! terminate the compilation; nothing here is recovered locally.

use pcc_util::Symbol;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("immediate {value} does not fit the {context} field")]
    ImmediateOutOfRange { context: &'static str, value: i64 },

    #[error("unaligned {context} offset {offset}")]
    UnalignedOffset { context: &'static str, offset: i32 },

    #[error("branch to `{label}` out of range (offset {offset} bytes)")]
    BranchOutOfRange { label: Symbol, offset: i64 },

    #[error("unknown label `{label}`")]
    UnknownLabel { label: Symbol },

    #[error("label `{label}` defined twice")]
    DuplicateLabel { label: Symbol },

    #[error("internal error: instruction {index} still awaits relocation")]
    UnresolvedRelocation { index: usize },

    #[error("entry symbol `{entry}` missing from the text section")]
    MissingEntry { entry: String },
}

pub type Result<T> = std::result::Result<T, EncodeError>;
