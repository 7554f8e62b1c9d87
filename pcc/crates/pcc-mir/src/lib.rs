//! pcc-mir - the middle intermediate representation.
//!
//! Three pieces: the MIR data model ([`mir`]), AST lowering ([`lower`])
//! and the Mir2-folding optimizer ([`optimize`]). Each method owns its
//! linear instruction list; nothing here knows about registers or
//! encodings.

pub mod lower;
pub mod mir;
pub mod optimize;

pub use lower::{generate, MirError};
pub use mir::{
    BinOp, CmpOp, InstKind, Mir, MirInst, MirLiteral, MirMethod, MirParam, MirType, Operand,
    OptFlag, Scalar,
};
pub use optimize::optimize;
