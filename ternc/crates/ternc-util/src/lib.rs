//! ternc-util - Foundation types for the Tern middle end.
//!
//! Everything the phase crates share lives here: source spans and the source
//! map, interned symbols, definition ids, typed index vectors, the diagnostic
//! machinery, and the compilation arena. These are zero-cost building blocks;
//! no compilation semantics belong in this crate.

pub mod arena;
pub mod def_id;
pub mod diagnostic;
pub mod error;
pub mod index_vec;
pub mod span;
pub mod symbol;

pub use arena::Arena;
pub use def_id::{DefId, DefIdGenerator};
pub use diagnostic::{Diagnostic, DiagnosticBuilder, DiagnosticCode, DiagnosticKind, Handler, Level};
pub use error::{InternerError, SourceMapError};
pub use index_vec::{Idx, IndexVec};
pub use span::{FileId, SourceFile, SourceMap, Span};
pub use symbol::{sym, Symbol};

// Re-export the hashers the phase crates standardize on. `FxHashMap` is for
// tables whose iteration order is never observed; anything that affects
// output ordering goes through `indexmap` instead.
pub use rustc_hash::{FxHashMap, FxHashSet};
