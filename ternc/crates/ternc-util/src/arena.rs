//! Compilation arena.
//!
//! The AST and most transient lowering data live in one bump allocator whose
//! lifetime is the compilation; the Core IR tables that outlive the middle
//! end are ordinary owned data and must not be allocated here.

/// Bump allocator for per-compilation transients.
pub type Arena = bumpalo::Bump;

/// Allocate a string in the arena and get it back with the arena's lifetime.
pub fn alloc_str<'a>(arena: &'a Arena, s: &str) -> &'a str {
    arena.alloc_str(s)
}
