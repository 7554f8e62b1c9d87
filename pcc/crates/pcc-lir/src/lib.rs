//! pcc-lir - target code generation for AArch64.
//!
//! Turns a method's MIR into an ordered list of typed instructions
//! ([`lir::Inst`]), allocating registers over a fixed 15-register file
//! with a residency map and Belady-style farthest-next-use eviction, and
//! laying every method's variables out in a statically-sized stack frame.

pub mod error;
pub mod frame;
pub mod lir;
pub mod lower;
pub mod regalloc;
pub mod regs;

pub use error::CodeGenError;
pub use lir::{Cond, Inst};
pub use lower::lower_method;

#[cfg(test)]
mod tests;
