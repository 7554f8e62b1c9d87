//! pcc-gen - instruction encoding and binary emission.
//!
//! Takes the typed instruction stream from `pcc-lir` through the two-pass
//! encoder (words first, branch relocation second) and wraps the result
//! in an output container. Also owns the platform startup stubs and the
//! `-S` assembly text backend.

pub mod asm;
pub mod buffer;
pub mod encode;
pub mod error;
pub mod object;
pub mod platform;
pub mod target;

pub use buffer::{assemble, CodeBuffer};
pub use error::EncodeError;
pub use object::{write_elf64, write_flat, TextSection};
pub use platform::Platform;
pub use target::{encode_text, generate_insts, render_asm};
