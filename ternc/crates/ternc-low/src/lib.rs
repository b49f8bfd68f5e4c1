//! ternc-low - Desugaring and monomorphization.
//!
//! The third and fourth phases of the middle end, sharing one crate because
//! they are mutually recursive: lowering a body can trigger a generic
//! instantiation, and instantiating a generic lowers its cloned body.
//!
//! The desugarer rewrites the high-level surface constructs — classes, arrow
//! closures, optional chaining, destructuring, spreads, template literals,
//! `throw`/`try`/`catch`, `for…of`, string switches — into the reduced Core
//! IR statement and expression forms. The monomorphizer resolves every
//! generic trigger to a cached, mangled instance and keeps a FIFO work queue
//! of instance bodies still to lower.

pub mod desugar;
pub mod mono;

use indexmap::IndexMap;
use std::collections::VecDeque;
use ternc_ast::{Item, Module, NodeId, ScopeInfo};
use ternc_sem::Resolver;
use ternc_tir::{FnSig, GenericDef, ParamSig, Ty};
use ternc_util::{DiagnosticBuilder, DiagnosticKind, Handler, Span, Symbol};

/// Everything a callable exposes to its call sites.
#[derive(Clone, Debug)]
pub struct SigInfo {
    pub sig: FnSig,
    pub throwing: bool,
}

/// Shared state for the desugar/monomorphize phases.
pub struct Lowering<'r, 'ctx> {
    pub res: &'r mut Resolver<'ctx>,
    pub scopes: &'r ScopeInfo,
    pub handler: &'r Handler,
    /// Signature of every known callable, keyed by (mangled) name
    pub sigs: IndexMap<Symbol, SigInfo>,
    /// Monomorphization work queue; FIFO drain keeps output deterministic
    queue: VecDeque<mono::PendingInstance>,
    /// Current generic instantiation depth, for the divergence limit
    pub(crate) inst_depth: usize,
    /// Fresh-name counter for lowered closures
    closure_counter: u32,
}

/// Lower every module: register generics, collect signatures, lower bodies
/// in source order, then drain the instance queue.
pub fn lower_modules(
    modules: &[Module],
    res: &mut Resolver<'_>,
    scopes: &ScopeInfo,
    handler: &Handler,
    skip: &dyn Fn(NodeId) -> bool,
) {
    let mut lowering = Lowering::new(res, scopes, handler);
    lowering.register_generic_fns(modules, skip);
    lowering.collect_signatures(modules, skip);

    for module in modules {
        for item in &module.items {
            if skip(item.node_id()) {
                continue;
            }
            match item {
                Item::Function(f) if !f.is_generic() => {
                    desugar::lower_function(&mut lowering, f, f.name, None);
                }
                Item::Class(c) if !c.is_generic() => {
                    desugar::lower_class(&mut lowering, c, c.name);
                }
                _ => {}
            }
        }
    }

    lowering.drain_instances();
}

impl<'r, 'ctx> Lowering<'r, 'ctx> {
    pub fn new(res: &'r mut Resolver<'ctx>, scopes: &'r ScopeInfo, handler: &'r Handler) -> Self {
        Self {
            res,
            scopes,
            handler,
            sigs: IndexMap::new(),
            queue: VecDeque::new(),
            inst_depth: 0,
            closure_counter: 0,
        }
    }

    pub fn error(&self, kind: DiagnosticKind, span: Span, message: impl Into<String>) {
        DiagnosticBuilder::error(kind, message)
            .span(span)
            .emit(self.handler);
    }

    /// Generic functions are never lowered directly; park their ASTs.
    fn register_generic_fns(&mut self, modules: &[Module], skip: &dyn Fn(NodeId) -> bool) {
        for module in modules {
            for item in &module.items {
                if skip(item.node_id()) {
                    continue;
                }
                if let Item::Function(f) = item {
                    if f.is_generic() {
                        self.res.ctx.register_generic(GenericDef::Fn(f.clone()));
                    }
                }
            }
        }
    }

    /// Pre-pass: every callable's signature and throwing-ness, so call sites
    /// can be typed before their callees are lowered.
    fn collect_signatures(&mut self, modules: &[Module], skip: &dyn Fn(NodeId) -> bool) {
        for module in modules {
            for item in &module.items {
                if skip(item.node_id()) {
                    continue;
                }
                match item {
                    Item::Function(f) if !f.is_generic() => {
                        let info = self.signature_of_fn(f, f.name, None);
                        self.sigs.insert(f.name, info);
                    }
                    Item::Class(c) if !c.is_generic() => {
                        self.collect_class_signatures(c, c.name);
                    }
                    _ => {}
                }
            }
        }
    }

    pub(crate) fn collect_class_signatures(&mut self, c: &ternc_ast::ClassDecl, class_name: Symbol) {
        let self_ty = self
            .res
            .ctx
            .struct_id_by_name(class_name)
            .map(Ty::Struct)
            .unwrap_or(Ty::Never);

        let ctor_name = ternc_tir::mangle::ctor_name(class_name);
        let ctor_sig = match &c.ctor {
            Some(ctor) => FnSig {
                params: self.resolve_params(&ctor.params, class_name),
                ret: self_ty.clone(),
            },
            None => FnSig {
                params: vec![],
                ret: self_ty.clone(),
            },
        };
        let ctor_throwing = c
            .ctor
            .as_ref()
            .map(|ct| desugar::body_throws(&ct.body))
            .unwrap_or(false);
        self.sigs.insert(
            ctor_name,
            SigInfo {
                sig: ctor_sig,
                throwing: ctor_throwing,
            },
        );

        for method in &c.methods {
            let f = &method.func;
            let name = match method.kind {
                ternc_ast::MethodKind::Method => {
                    ternc_tir::mangle::method_name(class_name, f.name)
                }
                ternc_ast::MethodKind::Getter => {
                    ternc_tir::mangle::getter_name(class_name, f.name)
                }
                ternc_ast::MethodKind::Setter => {
                    ternc_tir::mangle::setter_name(class_name, f.name)
                }
            };
            let mut info = self.signature_of_fn(f, name, None);
            // `self` is the implicit first parameter of every class callable.
            info.sig.params.insert(
                0,
                ParamSig {
                    name: *ternc_util::sym::SELF_PARAM,
                    ty: self_ty.clone(),
                    mode: None,
                },
            );
            self.sigs.insert(name, info);
        }
    }

    /// Resolve a declared signature. `subst` carries the type-parameter
    /// bindings when this is a generic instance.
    pub(crate) fn signature_of_fn(
        &mut self,
        f: &ternc_ast::FnDecl,
        name: Symbol,
        subst: Option<&ternc_util::FxHashMap<Symbol, Ty>>,
    ) -> SigInfo {
        if let Some(subst) = subst {
            self.res.push_subst(subst.clone());
        }
        let params = self.resolve_params(&f.params, name);
        let declared_ret = f
            .ret
            .as_ref()
            .map(|ann| self.res.resolve_annotation(ann))
            .unwrap_or(Ty::Void);
        if subst.is_some() {
            self.res.pop_subst();
        }

        let throwing = desugar::body_throws(&f.body);
        let ret = if throwing {
            let err = desugar::infer_error_ty(&f.body);
            Ty::result(declared_ret, err)
        } else {
            declared_ret
        };
        SigInfo {
            sig: FnSig { params, ret },
            throwing,
        }
    }

    fn resolve_params(&mut self, params: &[ternc_ast::Param], func: Symbol) -> Vec<ParamSig> {
        params
            .iter()
            .map(|p| {
                let ty = match &p.ty {
                    Some(ann) => self.res.resolve_with_hint(
                        ann,
                        ternc_sem::NameHint::FnParam {
                            func,
                            param: p.binding.name,
                        },
                    ),
                    None => Ty::Never,
                };
                ParamSig {
                    name: p.binding.name,
                    ty,
                    mode: None,
                }
            })
            .collect()
    }

    pub(crate) fn enqueue_instance(&mut self, instance: mono::PendingInstance) {
        self.queue.push_back(instance);
    }

    pub(crate) fn next_closure_name(&mut self, enclosing: Symbol) -> Symbol {
        let name = Symbol::intern(&format!("{}$lambda{}", enclosing, self.closure_counter));
        self.closure_counter += 1;
        name
    }

    /// Drain the monomorphization queue. Instances lowered here may enqueue
    /// further instances; insertion order is preserved.
    pub fn drain_instances(&mut self) {
        while let Some(instance) = self.queue.pop_front() {
            mono::lower_instance(self, instance);
        }
    }
}
