//! pcc-util - foundation types shared by every compiler stage.
//!
//! The one load-bearing piece here is [`Symbol`]: a 4-byte handle to an
//! interned string. Identifiers, temporaries, labels and method names are
//! created once and then compared, hashed and copied millions of times, so
//! every stage passes `Symbol`s around instead of owned strings. Interned
//! strings live for the duration of the process; nothing is ever freed,
//! which is the right trade for a batch compiler.

pub mod symbol;

pub use symbol::Symbol;

// Re-export the hash maps used across the workspace so downstream crates
// agree on one hasher.
pub use rustc_hash::FxHashMap;
pub use rustc_hash::FxHashSet;
