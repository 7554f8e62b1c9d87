//! The global string table backing [`Symbol`].
//!
//! Interned strings are leaked to obtain `'static` references: the table
//! lives as long as the process, entries are never removed, and the total
//! size is bounded by the source text. A `DashMap` keyed by the string
//! handles intern lookups; a plain vector indexed by symbol id handles the
//! reverse direction.

use std::sync::{LazyLock, RwLock};

use dashmap::DashMap;

use super::Symbol;

/// Global string table instance, initialized on first use.
pub(crate) static STRING_TABLE: LazyLock<StringTable> = LazyLock::new(StringTable::new);

pub(crate) struct StringTable {
    /// string -> symbol index
    map: DashMap<&'static str, u32, ahash::RandomState>,

    /// symbol index -> string; append-only
    strings: RwLock<Vec<&'static str>>,
}

impl StringTable {
    fn new() -> Self {
        Self {
            map: DashMap::with_capacity_and_hasher(256, ahash::RandomState::new()),
            strings: RwLock::new(Vec::with_capacity(256)),
        }
    }

    pub(crate) fn intern(&self, string: &str) -> Symbol {
        // Fast path: already interned.
        if let Some(entry) = self.map.get(string) {
            return Symbol::from_index(*entry.value());
        }

        let mut strings = self.strings.write().expect("string table poisoned");
        // Re-check under the write lock so concurrent interns of the same
        // string agree on one index.
        if let Some(entry) = self.map.get(string) {
            return Symbol::from_index(*entry.value());
        }
        let interned: &'static str = Box::leak(string.to_string().into_boxed_str());
        let index = u32::try_from(strings.len()).expect("string table overflow");
        strings.push(interned);
        self.map.insert(interned, index);
        Symbol::from_index(index)
    }

    pub(crate) fn get(&self, symbol: Symbol) -> Option<&'static str> {
        let strings = self.strings.read().expect("string table poisoned");
        strings.get(symbol.as_u32() as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn indices_are_dense() {
        let a = STRING_TABLE.intern("interner_dense_a");
        let b = STRING_TABLE.intern("interner_dense_b");
        assert_ne!(a, b);
        assert_eq!(STRING_TABLE.get(a), Some("interner_dense_a"));
        assert_eq!(STRING_TABLE.get(b), Some("interner_dense_b"));
    }

    #[test]
    fn concurrent_interns_of_same_string_agree() {
        let handles: Vec<_> = (0..16)
            .map(|_| thread::spawn(|| STRING_TABLE.intern("interner_concurrent")))
            .collect();
        let symbols: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for s in &symbols[1..] {
            assert_eq!(symbols[0], *s);
        }
    }

    #[test]
    fn out_of_bounds_symbol_is_none() {
        assert_eq!(STRING_TABLE.get(Symbol::from_index(u32::MAX)), None);
    }
}
