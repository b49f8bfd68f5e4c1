//! Scope and symbol information.
//!
//! The external binder resolves every identifier reference before the middle
//! end runs; what arrives here is the finished mapping. There is no scope
//! *tree* at this layer — only declarations and per-node resolutions.

use crate::NodeId;
use ternc_util::{DefId, FileId, FxHashMap, IndexVec, Span, Symbol};

/// What a declaration declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefKind {
    Function,
    Class,
    Interface,
    TypeAlias,
    Enum,
    Param,
    Local,
    /// A host-environment global (`eval`, `Proxy`, `Math`, …). The validator
    /// rejects references to the dangerous ones.
    AmbientGlobal,
}

/// One declaration the binder saw.
#[derive(Debug, Clone)]
pub struct DefInfo {
    pub name: Symbol,
    pub kind: DefKind,
    pub span: Span,
    pub file: FileId,
    pub exported: bool,
}

/// The binder's output: all declarations plus per-reference resolutions.
#[derive(Default)]
pub struct ScopeInfo {
    defs: IndexVec<DefId, DefInfo>,
    resolutions: FxHashMap<NodeId, DefId>,
}

impl ScopeInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a declaration and get its id.
    pub fn declare(&mut self, info: DefInfo) -> DefId {
        self.defs.push(info)
    }

    /// Record that the identifier at `node` resolves to `def`.
    pub fn record_resolution(&mut self, node: NodeId, def: DefId) {
        self.resolutions.insert(node, def);
    }

    /// The declaration an identifier reference resolves to, if any.
    pub fn resolve(&self, node: NodeId) -> Option<DefId> {
        self.resolutions.get(&node).copied()
    }

    pub fn def(&self, id: DefId) -> &DefInfo {
        &self.defs[id]
    }

    pub fn def_count(&self) -> usize {
        self.defs.len()
    }

    /// True if the reference at `node` resolves to an ambient global.
    pub fn resolves_to_ambient(&self, node: NodeId) -> bool {
        self.resolve(node)
            .map(|d| self.def(d).kind == DefKind::AmbientGlobal)
            .unwrap_or(false)
    }

    /// First declaration with the given name, in declaration order.
    ///
    /// For tests and for synthesized-name collision checks; real resolution
    /// always goes through [`ScopeInfo::resolve`].
    pub fn lookup_by_name(&self, name: Symbol) -> Option<DefId> {
        self.defs
            .iter_enumerated()
            .find(|(_, info)| info.name == name)
            .map(|(id, _)| id)
    }
}
