//! ternc-ast - The middle end's input contract.
//!
//! The external front end (parser, binder, module resolver) hands the middle
//! end three things: a surface AST per file, a scope table resolving every
//! identifier reference to its declaration, and a resolved import graph.
//! This crate defines those shapes as plain data; nothing here validates or
//! transforms anything.

pub mod expr;
pub mod imports;
pub mod items;
pub mod scope;
pub mod stmt;
pub mod types;

pub use expr::*;
pub use imports::ImportGraph;
pub use items::*;
pub use scope::{DefInfo, DefKind, ScopeInfo};
pub use stmt::*;
pub use types::*;

use ternc_util::define_idx;

define_idx!(
    /// Identity of an AST node, assigned by the front end.
    ///
    /// The scope table keys identifier resolutions by node id.
    NodeId
);
