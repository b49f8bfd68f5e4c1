//! Generic monomorphization.
//!
//! Every application of a generic function and every `new` of a generic
//! class resolves here to a concrete, mangled instance. Explicit type
//! arguments win; otherwise arguments are inferred by unifying declared
//! parameter annotations against resolved argument types, with the numeric
//! widening lattice breaking ties. Instance bodies go onto a FIFO queue and
//! are lowered after the triggering body finishes — lowering them triggers
//! further instantiations through the same path.
//!
//! Only instances reachable from lowered code are ever created, so an
//! uncalled generic leaves nothing in the Core IR.

use crate::desugar::{self, classes, FnCtx};
use crate::Lowering;
use ternc_ast::{self as ast, TypeAnn, TypeAnnKind};
use ternc_tir::{mangle, Const, Expr, ExprKind, GenericDef, Ty};
use ternc_util::{DiagnosticKind, FxHashMap, Span, Symbol};

/// Instantiation nested deeper than this is assumed divergent.
pub const MAX_DEPTH: usize = ternc_sem::MAX_INSTANTIATION_DEPTH;

/// An instance whose body still needs lowering.
pub enum PendingInstance {
    Fn {
        decl: ast::FnDecl,
        mangled: Symbol,
        subst: FxHashMap<Symbol, Ty>,
        depth: usize,
    },
    Class {
        decl: ast::ClassDecl,
        mangled: Symbol,
        subst: FxHashMap<Symbol, Ty>,
        depth: usize,
    },
}

/// Lower a queued instance body.
pub fn lower_instance(lw: &mut Lowering<'_, '_>, instance: PendingInstance) {
    match instance {
        PendingInstance::Fn {
            decl,
            mangled,
            subst,
            depth,
        } => {
            if lw.res.ctx.fn_def(mangled).is_some() {
                return;
            }
            let saved = lw.inst_depth;
            lw.inst_depth = depth;
            desugar::lower_function(lw, &decl, mangled, Some(&subst));
            lw.inst_depth = saved;
        }
        PendingInstance::Class {
            decl,
            mangled,
            subst,
            depth,
        } => {
            let ctor = mangle::ctor_name(mangled);
            if lw.res.ctx.fn_def(ctor).is_some() {
                return;
            }
            let saved = lw.inst_depth;
            lw.inst_depth = depth;
            classes::lower_class_instance(lw, &decl, mangled, &subst);
            lw.inst_depth = saved;
        }
    }
}

// =============================================================================
// Generic function application
// =============================================================================

pub(crate) fn lower_generic_call(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    name: Symbol,
    type_args: &[TypeAnn],
    args: &[ast::Expr],
    span: Span,
) -> Expr {
    let Some(GenericDef::Fn(decl)) = lw.res.ctx.generic(name).cloned() else {
        lw.error(
            DiagnosticKind::InternalError,
            span,
            format!("`{}` is not a generic function", name),
        );
        return Expr::new(ExprKind::Const(Const::Void), Ty::Never, span);
    };

    // Step 1: explicit type arguments.
    let mut subst: FxHashMap<Symbol, Ty> = FxHashMap::default();
    for (tp, ann) in decl.type_params.iter().zip(type_args) {
        let ty = lw.res.resolve_annotation(ann);
        subst.insert(tp.name, ty);
    }

    // Infer the rest by unifying declared parameter types against the
    // arguments' resolved types. Arguments are lowered under the
    // substituted expectation when it is already known.
    let param_names: Vec<Symbol> = decl.type_params.iter().map(|tp| tp.name).collect();
    let mut lowered_args: Vec<Expr> = Vec::with_capacity(args.len());
    for (i, arg) in args.iter().enumerate() {
        let expected = decl.params.get(i).and_then(|p| {
            p.ty.as_ref()
                .and_then(|ann| concrete_under(lw, ann, &param_names, &subst))
        });
        let lowered = desugar::exprs::lower_expr(lw, f, arg, expected.as_ref());
        if let Some(param) = decl.params.get(i) {
            if let Some(ann) = &param.ty {
                unify(ann, &lowered.ty, &param_names, &mut subst);
            }
        }
        lowered_args.push(lowered);
    }

    // Step 2: defaults. Step 3: still unbound is an error.
    for tp in &decl.type_params {
        if subst.contains_key(&tp.name) {
            continue;
        }
        match &tp.default {
            Some(default) => {
                lw.res.push_subst(subst.clone());
                let ty = lw.res.resolve_annotation(default);
                lw.res.pop_subst();
                subst.insert(tp.name, ty);
            }
            None => {
                lw.error(
                    DiagnosticKind::UnresolvedTypeParameter,
                    span,
                    format!(
                        "cannot infer type parameter `{}` of `{}`",
                        tp.name, name
                    ),
                );
                return Expr::new(ExprKind::Const(Const::Void), Ty::Never, span);
            }
        }
    }

    // Constraint checking on the bound arguments.
    for tp in &decl.type_params {
        if let Some(constraint) = &tp.constraint {
            lw.res.push_subst(subst.clone());
            let constraint_ty = lw.res.resolve_annotation(constraint);
            lw.res.pop_subst();
            let arg = &subst[&tp.name];
            if !lw.res.satisfies(arg, &constraint_ty) {
                lw.error(
                    DiagnosticKind::ConstraintViolation,
                    span,
                    format!(
                        "`{}` does not satisfy the constraint on `{}` of `{}`",
                        mangle::segment(lw.res.ctx, arg),
                        tp.name,
                        name
                    ),
                );
                return Expr::new(ExprKind::Const(Const::Void), Ty::Never, span);
            }
        }
    }

    // Steps 4-6: mangle, consult the cache, register and enqueue on miss.
    let ordered: Vec<Ty> = decl
        .type_params
        .iter()
        .map(|tp| subst[&tp.name].clone())
        .collect();
    let mangled = match ensure_fn_instance(lw, &decl, name, ordered, subst, span) {
        Some(mangled) => mangled,
        None => return Expr::new(ExprKind::Const(Const::Void), Ty::Never, span),
    };

    // Step 7: the call site references the mangled instance.
    let info = lw.sigs.get(&mangled).cloned().expect("instance signature");
    if info.throwing && !f.allow_throwing && !f.in_protected_try() {
        lw.error(
            DiagnosticKind::PropagationError,
            span,
            format!("`{}` throws and is called outside `try/catch`", mangled),
        );
    }
    let coerced: Vec<Expr> = lowered_args
        .into_iter()
        .zip(&info.sig.params)
        .map(|(a, p)| desugar::exprs::coerce(lw, f, a, &p.ty))
        .collect();
    let fn_ty = Ty::Fn(ternc_tir::FnTy {
        params: info.sig.params.iter().map(|p| p.ty.clone()).collect(),
        ret: Box::new(info.sig.ret.clone()),
        captures: Default::default(),
    });
    Expr::new(
        ExprKind::Call {
            callee: Box::new(Expr::new(ExprKind::Fn(mangled), fn_ty, span)),
            args: coerced,
        },
        info.sig.ret,
        span,
    )
}

/// Cache-or-create a function instance; returns its mangled name.
fn ensure_fn_instance(
    lw: &mut Lowering<'_, '_>,
    decl: &ast::FnDecl,
    base: Symbol,
    ordered: Vec<Ty>,
    subst: FxHashMap<Symbol, Ty>,
    span: Span,
) -> Option<Symbol> {
    if let Some(mangled) = lw.res.ctx.mono_lookup(base, &ordered) {
        return Some(mangled);
    }

    let depth = lw.inst_depth + 1;
    if depth > MAX_DEPTH {
        lw.error(
            DiagnosticKind::RecursiveGenericDepth,
            span,
            format!(
                "instantiating `{}` exceeds the nesting limit of {}",
                base, MAX_DEPTH
            ),
        );
        return None;
    }

    let mangled = mangle::mangle_instance(lw.res.ctx, base, &ordered);
    // Register before lowering so recursive instantiations hit the cache.
    lw.res.ctx.mono_insert(base, ordered, mangled);
    let info = lw.signature_of_fn(decl, mangled, Some(&subst));
    lw.sigs.insert(mangled, info);
    lw.enqueue_instance(PendingInstance::Fn {
        decl: decl.clone(),
        mangled,
        subst,
        depth,
    });
    Some(mangled)
}

// =============================================================================
// Generic class instantiation
// =============================================================================

pub(crate) fn lower_generic_new(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    name: Symbol,
    type_args: &[TypeAnn],
    args: &[ast::Expr],
    span: Span,
) -> Expr {
    let Some(GenericDef::Class(decl)) = lw.res.ctx.generic(name).cloned() else {
        lw.error(
            DiagnosticKind::InternalError,
            span,
            format!("`{}` is not a generic class", name),
        );
        return Expr::new(ExprKind::Const(Const::Void), Ty::Never, span);
    };

    // The struct type goes through the resolver, which owns the type-side
    // cache; `new` requires explicit type arguments.
    let struct_ann = TypeAnn::new(
        TypeAnnKind::Named {
            name,
            args: type_args.to_vec(),
        },
        span,
    );
    let self_ty = lw.res.resolve_annotation(&struct_ann);
    let Ty::Struct(struct_id) = self_ty else {
        return Expr::new(ExprKind::Const(Const::Void), Ty::Never, span);
    };
    let mangled_class = lw.res.ctx.struct_def(struct_id).name;

    // Bind parameters for the ctor/method bodies.
    let mut subst: FxHashMap<Symbol, Ty> = FxHashMap::default();
    for (tp, ann) in decl.type_params.iter().zip(type_args) {
        subst.insert(tp.name, lw.res.resolve_annotation(ann));
    }
    for tp in &decl.type_params {
        if !subst.contains_key(&tp.name) {
            if let Some(default) = &tp.default {
                lw.res.push_subst(subst.clone());
                let ty = lw.res.resolve_annotation(default);
                lw.res.pop_subst();
                subst.insert(tp.name, ty);
            }
        }
    }

    let ctor = mangle::ctor_name(mangled_class);
    if !lw.sigs.contains_key(&ctor) {
        let depth = lw.inst_depth + 1;
        if depth > MAX_DEPTH {
            lw.error(
                DiagnosticKind::RecursiveGenericDepth,
                span,
                format!(
                    "instantiating `{}` exceeds the nesting limit of {}",
                    name, MAX_DEPTH
                ),
            );
            return Expr::new(ExprKind::Const(Const::Void), Ty::Never, span);
        }
        // Signatures now (the call below needs them), bodies via the queue.
        lw.res.push_subst(subst.clone());
        lw.collect_class_signatures(&decl, mangled_class);
        lw.res.pop_subst();
        lw.enqueue_instance(PendingInstance::Class {
            decl: decl.clone(),
            mangled: mangled_class,
            subst,
            depth,
        });
    }

    desugar::exprs::lower_direct_call(lw, f, ctor, args, span)
}

// =============================================================================
// Unification
// =============================================================================

/// Resolve an annotation if it mentions no unbound type parameters yet.
fn concrete_under(
    lw: &mut Lowering<'_, '_>,
    ann: &TypeAnn,
    params: &[Symbol],
    subst: &FxHashMap<Symbol, Ty>,
) -> Option<Ty> {
    if mentions_unbound(ann, params, subst) {
        return None;
    }
    lw.res.push_subst(subst.clone());
    let ty = lw.res.resolve_annotation(ann);
    lw.res.pop_subst();
    Some(ty)
}

fn mentions_unbound(ann: &TypeAnn, params: &[Symbol], subst: &FxHashMap<Symbol, Ty>) -> bool {
    match &ann.kind {
        TypeAnnKind::Named { name, args } => {
            (params.contains(name) && !subst.contains_key(name))
                || args.iter().any(|a| mentions_unbound(a, params, subst))
        }
        TypeAnnKind::Union(variants) => {
            variants.iter().any(|v| mentions_unbound(v, params, subst))
        }
        TypeAnnKind::Object(fields) => {
            fields.iter().any(|f| mentions_unbound(&f.ty, params, subst))
        }
        TypeAnnKind::Array(e) => mentions_unbound(e, params, subst),
        TypeAnnKind::Tuple(elements) => {
            elements.iter().any(|e| mentions_unbound(e, params, subst))
        }
        TypeAnnKind::Fn { params: ps, ret } => {
            ps.iter().any(|p| mentions_unbound(p, params, subst))
                || mentions_unbound(ret, params, subst)
        }
        _ => false,
    }
}

/// Structurally unify a declared parameter annotation against a resolved
/// argument type, binding type parameters. Conflicting numeric bindings
/// widen; anything else keeps the first binding.
pub(crate) fn unify(
    ann: &TypeAnn,
    ty: &Ty,
    params: &[Symbol],
    subst: &mut FxHashMap<Symbol, Ty>,
) {
    match (&ann.kind, ty) {
        (TypeAnnKind::Named { name, args }, _) if args.is_empty() && params.contains(name) => {
            match subst.get(name) {
                None => {
                    subst.insert(*name, ty.clone());
                }
                Some(bound) if bound.is_numeric() && ty.is_numeric() => {
                    let widened =
                        ternc_sem::unions::widen_numeric(&[bound.clone(), ty.clone()]);
                    subst.insert(*name, widened);
                }
                Some(_) => {}
            }
        }
        (TypeAnnKind::Array(element), Ty::Array(arg_element)) => {
            unify(element, arg_element, params, subst);
        }
        (TypeAnnKind::Named { name, args }, Ty::Array(arg_element))
            if name.as_str() == "Array" && args.len() == 1 =>
        {
            unify(&args[0], arg_element, params, subst);
        }
        (TypeAnnKind::Tuple(elements), Ty::Tuple(arg_elements)) => {
            for (e, a) in elements.iter().zip(arg_elements) {
                unify(e, a, params, subst);
            }
        }
        (TypeAnnKind::Fn { params: ps, ret }, Ty::Fn(fn_ty)) => {
            for (p, a) in ps.iter().zip(&fn_ty.params) {
                unify(p, a, params, subst);
            }
            unify(ret, &fn_ty.ret, params, subst);
        }
        _ => {}
    }
}
