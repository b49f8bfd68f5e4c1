//! Global string interner built on DashMap.
//!
//! Two maps are kept in step: text → index for interning, index → text for
//! symbol resolution. Interned strings are leaked on purpose to obtain
//! `'static` references; the set of distinct strings in a compilation is
//! bounded, so the leak is too.

use ahash::RandomState;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::LazyLock;

use super::Symbol;

/// Global string table instance.
pub static STRING_TABLE: LazyLock<StringTable> = LazyLock::new(StringTable::new);

/// Thread-safe string table.
///
/// DashMap gives lock-free reads under the read-heavy interning workload;
/// `ahash` keys both directions.
pub struct StringTable {
    /// text → symbol index
    forward: DashMap<&'static str, u32, RandomState>,
    /// symbol index → text
    reverse: DashMap<u32, &'static str, RandomState>,
    /// Next free index
    next_index: AtomicU32,
}

impl StringTable {
    fn new() -> Self {
        Self {
            forward: DashMap::with_capacity_and_hasher(256, RandomState::new()),
            reverse: DashMap::with_capacity_and_hasher(256, RandomState::new()),
            next_index: AtomicU32::new(0),
        }
    }

    /// Intern a string, returning its symbol.
    pub fn intern(&self, string: &str) -> Symbol {
        if let Some(index) = self.forward.get(string) {
            return Symbol { index: *index };
        }

        let leaked: &'static str = Box::leak(string.to_string().into_boxed_str());
        match self.forward.entry(leaked) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                // Another thread won the race; the duplicate leak is lost but harmless.
                Symbol {
                    index: *entry.get(),
                }
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let index = self.next_index.fetch_add(1, Ordering::Relaxed);
                assert!(index != u32::MAX, "string table overflow");
                entry.insert(index);
                self.reverse.insert(index, leaked);
                Symbol { index }
            }
        }
    }

    /// Get the string for a symbol, if it was interned by this table.
    pub fn get(&self, symbol: Symbol) -> Option<&'static str> {
        self.reverse.get(&symbol.index).map(|entry| *entry.value())
    }

    /// Statistics for profiling.
    pub fn stats(&self) -> InternerStats {
        InternerStats {
            count: self.forward.len(),
            capacity: self.forward.capacity(),
        }
    }
}

/// Interner statistics.
#[derive(Debug, Clone, Copy)]
pub struct InternerStats {
    /// Number of distinct interned strings
    pub count: usize,
    /// Current table capacity
    pub capacity: usize,
}

impl InternerStats {
    pub fn load_factor(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.count as f64 / self.capacity as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_intern_same_string() {
        let s1 = STRING_TABLE.intern("hello");
        let s2 = STRING_TABLE.intern("hello");
        assert_eq!(s1, s2);
    }

    #[test]
    fn test_intern_different_strings() {
        let s1 = STRING_TABLE.intern("hello");
        let s2 = STRING_TABLE.intern("world");
        assert_ne!(s1, s2);
    }

    #[test]
    fn test_get_string() {
        let symbol = STRING_TABLE.intern("test_string");
        assert_eq!(STRING_TABLE.get(symbol), Some("test_string"));
    }

    #[test]
    fn test_empty_string() {
        let s = STRING_TABLE.intern("");
        assert_eq!(STRING_TABLE.get(s), Some(""));
    }

    #[test]
    fn test_unicode_strings() {
        for text in ["你好", "🦀", "Привет"] {
            let sym = STRING_TABLE.intern(text);
            assert_eq!(STRING_TABLE.get(sym), Some(text));
        }
    }

    #[test]
    fn test_concurrent_same_string() {
        let handles: Vec<_> = (0..10)
            .map(|_| thread::spawn(|| STRING_TABLE.intern("concurrent_same")))
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for symbol in &results[1..] {
            assert_eq!(results[0], *symbol);
        }
    }

    #[test]
    fn test_concurrent_distinct_strings() {
        let handles: Vec<_> = (0..20)
            .map(|i| thread::spawn(move || STRING_TABLE.intern(&format!("thread_{}", i))))
            .collect();

        let symbols: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for i in 0..symbols.len() {
            for j in (i + 1)..symbols.len() {
                assert_ne!(symbols[i], symbols[j]);
            }
        }
    }

    #[test]
    fn test_many_strings_roundtrip() {
        let symbols: Vec<_> = (0..500)
            .map(|i| STRING_TABLE.intern(&format!("bulk_{}", i)))
            .collect();
        for (i, sym) in symbols.iter().enumerate() {
            let expected = format!("bulk_{}", i);
            assert_eq!(STRING_TABLE.get(*sym), Some(expected.as_str()));
        }
    }

    #[test]
    fn test_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StringTable>();
    }
}
