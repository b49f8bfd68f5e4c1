//! The finished Core IR program.

use crate::context::{Context, EnumDef, FnDef, FnSig, StructDef, UnionDef};
use crate::ty::{StructId, UnionId};
use indexmap::IndexMap;
use ternc_util::{IndexVec, Symbol};

/// Everything the backend consumes. Immutable once built.
#[derive(Debug)]
pub struct Program {
    pub structs: IndexVec<StructId, StructDef>,
    pub unions: IndexVec<UnionId, UnionDef>,
    /// Function bodies, keyed by mangled name
    pub functions: IndexMap<Symbol, FnDef>,
    /// Mangled name → signature, for the linker interface
    pub signatures: IndexMap<Symbol, FnSig>,
    /// Compiled enums; values are compile-time only but the backend may
    /// want them for debug info
    pub enums: IndexMap<Symbol, EnumDef>,
}

impl Context {
    /// Seal the context into a [`Program`].
    ///
    /// Generic definitions and the monomorphization cache are dropped here:
    /// only reachable instantiations were ever lowered into the function
    /// table, so unused generics leave nothing behind.
    pub fn finish(self) -> Program {
        let signatures = self
            .functions
            .iter()
            .map(|(name, def)| (*name, def.sig.clone()))
            .collect();
        Program {
            structs: self.structs,
            unions: self.unions,
            functions: self.functions,
            signatures,
            enums: self.enums,
        }
    }
}

impl Program {
    pub fn fn_names(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.functions.keys().copied()
    }

    pub fn contains_fn(&self, name: Symbol) -> bool {
        self.functions.contains_key(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Body;
    use crate::ty::Ty;
    use ternc_util::Span;

    fn sym(s: &str) -> Symbol {
        Symbol::intern(s)
    }

    #[test]
    fn test_finish_builds_signature_map() {
        let mut ctx = Context::new();
        ctx.define_fn(FnDef {
            name: sym("main"),
            sig: FnSig {
                params: vec![],
                ret: Ty::Void,
            },
            body: Body::new(),
            throwing: false,
            capture_env: None,
            span: Span::DUMMY,
        });

        let program = ctx.finish();
        assert!(program.contains_fn(sym("main")));
        assert_eq!(program.signatures.len(), 1);
        assert_eq!(program.signatures[&sym("main")].ret, Ty::Void);
    }

    #[test]
    fn test_finish_drops_generics() {
        let mut ctx = Context::new();
        ctx.mono_insert(sym("id"), vec![Ty::I32], sym("id$Int32"));
        let program = ctx.finish();
        // The cache itself does not survive; only lowered functions do.
        assert_eq!(program.functions.len(), 0);
    }
}
