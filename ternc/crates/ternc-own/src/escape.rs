//! Escape analysis, allocation placement, and capture boxing.
//!
//! An allocation stays on the stack iff no reference derived from it can
//! outlive the creating activation: it is never returned, never stored into
//! a heap location, never handed to an owning callee, and never captured by
//! an escaping closure. Everything else goes to the heap, with a refcount
//! when more than one live reference can observe it.

use ternc_tir::{
    ir, AllocPlacement, Context, Expr, ExprKind, LocalId, ParamMode, Place, Stmt,
};
use ternc_util::{
    DiagnosticBuilder, DiagnosticKind, FxHashMap, FxHashSet, Handler, Idx, Symbol,
};

/// Decide stack/heap for every allocation site in one function.
pub(crate) fn place_allocations(ctx: &mut Context, name: Symbol) {
    let Some(def) = ctx.fn_def(name) else { return };
    let escaping = escaping_locals(ctx, &def.body.stmts);
    let reads = read_counts(&def.body.stmts, def.body.locals.len());

    let def = ctx.functions.get_mut(&name).expect("function exists");
    place_stmts(&mut def.body.stmts, &escaping, &reads);
}

/// Locals from which a reference can outlive the function.
fn escaping_locals(ctx: &Context, stmts: &[Stmt]) -> FxHashSet<LocalId> {
    let mut escaping: FxHashSet<LocalId> = FxHashSet::default();
    // local → locals it was copied into
    let mut flowed_into: FxHashMap<LocalId, Vec<LocalId>> = FxHashMap::default();

    collect_escapes(ctx, stmts, &mut escaping, &mut flowed_into);

    // Escape is transitive through local copies.
    loop {
        let before = escaping.len();
        for (source, sinks) in &flowed_into {
            if sinks.iter().any(|s| escaping.contains(s)) {
                escaping.insert(*source);
            }
        }
        if escaping.len() == before {
            break;
        }
    }
    escaping
}

fn collect_escapes(
    ctx: &Context,
    stmts: &[Stmt],
    escaping: &mut FxHashSet<LocalId>,
    flowed_into: &mut FxHashMap<LocalId, Vec<LocalId>>,
) {
    for stmt in stmts {
        match stmt {
            Stmt::Let { local, init } => {
                if let Some(init) = init {
                    record_flow(*local, init, flowed_into);
                    collect_call_escapes(ctx, init, escaping);
                }
            }
            Stmt::Assign { place, value } => {
                match place {
                    Place::Local(local) => record_flow(*local, value, flowed_into),
                    // Stored into an aggregate: the value escapes with it —
                    // unless the store is a weak reference, which never
                    // keeps its referent alive.
                    Place::Field(..) | Place::Index(..) => {
                        if !matches!(value.ty, ternc_tir::Ty::Weak(_)) {
                            mark_locals(value, escaping);
                        }
                    }
                }
                collect_call_escapes(ctx, value, escaping);
            }
            Stmt::Expr(e) => collect_call_escapes(ctx, e, escaping),
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                collect_call_escapes(ctx, cond, escaping);
                collect_escapes(ctx, then_body, escaping, flowed_into);
                collect_escapes(ctx, else_body, escaping, flowed_into);
            }
            Stmt::Loop { body } => collect_escapes(ctx, body, escaping, flowed_into),
            Stmt::Return(Some(e)) => {
                mark_locals(e, escaping);
                collect_call_escapes(ctx, e, escaping);
            }
            Stmt::Match {
                scrutinee,
                arms,
                default,
            } => {
                collect_call_escapes(ctx, scrutinee, escaping);
                for arm in arms {
                    collect_escapes(ctx, &arm.body, escaping, flowed_into);
                }
                if let Some(d) = default {
                    collect_escapes(ctx, d, escaping, flowed_into);
                }
            }
            _ => {}
        }
    }
}

fn record_flow(dest: LocalId, value: &Expr, flowed_into: &mut FxHashMap<LocalId, Vec<LocalId>>) {
    crate::refs::reference_locals(value, &mut |source| {
        flowed_into.entry(source).or_default().push(dest);
    });
}

fn mark_locals(value: &Expr, escaping: &mut FxHashSet<LocalId>) {
    crate::refs::reference_locals(value, &mut |l| {
        escaping.insert(l);
    });
}

/// Arguments passed where the callee takes ownership escape; so do locals
/// captured by any closure the value creates.
fn collect_call_escapes(ctx: &Context, value: &Expr, escaping: &mut FxHashSet<LocalId>) {
    ir::walk_expr(value, &mut |e| match &e.kind {
        ExprKind::Call { callee, args } => {
            let ExprKind::Fn(name) = &callee.kind else { return };
            for (i, arg) in args.iter().enumerate() {
                let owned = ctx
                    .fn_sig(*name)
                    .and_then(|sig| sig.params.get(i))
                    .map(|p| p.mode == Some(ParamMode::Owned))
                    .unwrap_or(false);
                if owned {
                    mark_locals(arg, escaping);
                }
            }
        }
        _ => {}
    });
}

/// Reads per local; a heap value read from two places is observably aliased.
fn read_counts(stmts: &[Stmt], local_count: usize) -> Vec<usize> {
    let mut counts = vec![0usize; local_count];
    ir::walk_exprs(stmts, &mut |e| {
        if let ExprKind::Local(l) = &e.kind {
            counts[l.index()] += 1;
        }
    });
    counts
}

// =============================================================================
// Placement rewriting
// =============================================================================

fn place_stmts(stmts: &mut [Stmt], escaping: &FxHashSet<LocalId>, reads: &[usize]) {
    for stmt in stmts {
        match stmt {
            Stmt::Let { local, init } => {
                if let Some(init) = init {
                    place_destination(init, *local, escaping, reads);
                }
            }
            Stmt::Assign { place, value } => match place {
                Place::Local(local) => place_destination(value, *local, escaping, reads),
                // Stored straight into an aggregate: always heap, aliased.
                Place::Field(..) | Place::Index(..) => place_all(value, heap(true)),
            },
            Stmt::Expr(e) => place_all(e, heap(false)),
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                place_all(cond, heap(false));
                place_stmts(then_body, escaping, reads);
                place_stmts(else_body, escaping, reads);
            }
            Stmt::Loop { body } => place_stmts(body, escaping, reads),
            // A returned allocation outlives the frame by definition.
            Stmt::Return(Some(e)) => place_all(e, heap(false)),
            Stmt::Match {
                scrutinee,
                arms,
                default,
            } => {
                place_all(scrutinee, heap(false));
                for arm in arms {
                    place_stmts(&mut arm.body, escaping, reads);
                }
                if let Some(d) = default {
                    place_stmts(d, escaping, reads);
                }
            }
            _ => {}
        }
    }
}

fn heap(needs_refcount: bool) -> AllocPlacement {
    AllocPlacement::Heap { needs_refcount }
}

/// Place an initializer flowing into `local`: stack when the local never
/// escapes, heap otherwise, refcounted when observably aliased.
fn place_destination(
    value: &mut Expr,
    local: LocalId,
    escaping: &FxHashSet<LocalId>,
    reads: &[usize],
) {
    let placement = if escaping.contains(&local) {
        heap(reads[local.index()] > 1)
    } else {
        AllocPlacement::Stack
    };
    place_all(value, placement);
}

/// Set every unplaced allocation under `value`.
fn place_all(value: &mut Expr, placement: AllocPlacement) {
    if let ExprKind::Alloc {
        placement: slot, ..
    } = &mut value.kind
    {
        if *slot == AllocPlacement::Unplaced {
            *slot = placement;
        }
    }
    match &mut value.kind {
        ExprKind::Call { callee, args } => {
            place_all(callee, placement);
            for arg in args {
                place_all(arg, placement);
            }
        }
        ExprKind::Binary { left, right, .. } => {
            place_all(left, placement);
            place_all(right, placement);
        }
        ExprKind::Unary { operand, .. } => place_all(operand, placement),
        ExprKind::Field { base, .. } => place_all(base, placement),
        ExprKind::Index { base, index } => {
            place_all(base, placement);
            place_all(index, placement);
        }
        ExprKind::ArrayLen(e)
        | ExprKind::Tag(e)
        | ExprKind::Payload(e)
        | ExprKind::OptionSome(e)
        | ExprKind::ResultOk(e)
        | ExprKind::ResultErr(e) => place_all(e, placement),
        ExprKind::Tuple(items) | ExprKind::ArrayLit(items) => {
            for item in items {
                place_all(item, placement);
            }
        }
        ExprKind::StructLit { fields, .. } => {
            for field in fields {
                place_all(field, placement);
            }
        }
        ExprKind::UnionLit { payload, .. } => {
            if let Some(p) = payload {
                place_all(p, placement);
            }
        }
        ExprKind::Alloc { value, .. } => place_all(value, placement),
        _ => {}
    }
}

// =============================================================================
// Capture boxing
// =============================================================================

/// Closures that escape promote their captures to a heap capture box: the
/// creator's frame may be gone when the closure runs.
pub(crate) fn box_escaping_captures(ctx: &mut Context) {
    // Pass 1 (read-only): which closure functions escape their creator.
    let mut boxed: FxHashSet<Symbol> = FxHashSet::default();
    for def in ctx.functions.values() {
        let escaping = escaping_locals(ctx, &def.body.stmts);
        find_escaping_closures(&def.body.stmts, &escaping, &mut boxed);
    }

    // Pass 2: upgrade the closure definitions and their creation sites.
    for name in boxed.iter() {
        if let Some(def) = ctx.functions.get_mut(name) {
            if let Some(env) = &mut def.capture_env {
                env.boxed = true;
            }
        }
    }
    let names: Vec<Symbol> = ctx.functions.keys().copied().collect();
    for name in names {
        let def = ctx.functions.get_mut(&name).expect("function exists");
        upgrade_closure_exprs(&mut def.body.stmts, &boxed);
    }
}

/// A closure escapes if it is returned, stored into an aggregate, or flows
/// into an escaping local.
fn find_escaping_closures(
    stmts: &[Stmt],
    escaping: &FxHashSet<LocalId>,
    boxed: &mut FxHashSet<Symbol>,
) {
    for stmt in stmts {
        match stmt {
            Stmt::Let { local, init } => {
                if let Some(init) = init {
                    if escaping.contains(local) {
                        mark_closures(init, boxed);
                    }
                }
            }
            Stmt::Assign { place, value } => match place {
                Place::Local(local) if escaping.contains(local) => mark_closures(value, boxed),
                Place::Field(..) | Place::Index(..) => mark_closures(value, boxed),
                _ => {}
            },
            Stmt::Return(Some(e)) => mark_closures(e, boxed),
            Stmt::If {
                then_body,
                else_body,
                ..
            } => {
                find_escaping_closures(then_body, escaping, boxed);
                find_escaping_closures(else_body, escaping, boxed);
            }
            Stmt::Loop { body } => find_escaping_closures(body, escaping, boxed),
            Stmt::Match { arms, default, .. } => {
                for arm in arms {
                    find_escaping_closures(&arm.body, escaping, boxed);
                }
                if let Some(d) = default {
                    find_escaping_closures(d, escaping, boxed);
                }
            }
            _ => {}
        }
    }
}

fn mark_closures(value: &Expr, boxed: &mut FxHashSet<Symbol>) {
    ir::walk_expr(value, &mut |e| {
        if let ExprKind::Closure { func, captures, .. } = &e.kind {
            if !captures.is_empty() {
                boxed.insert(*func);
            }
        }
    });
}

fn upgrade_closure_exprs(stmts: &mut [Stmt], boxed: &FxHashSet<Symbol>) {
    for stmt in stmts {
        match stmt {
            Stmt::Let { init: Some(e), .. } => upgrade_expr(e, boxed),
            Stmt::Let { init: None, .. } => {}
            Stmt::Assign { value, .. } => upgrade_expr(value, boxed),
            Stmt::Expr(e) => upgrade_expr(e, boxed),
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                upgrade_expr(cond, boxed);
                upgrade_closure_exprs(then_body, boxed);
                upgrade_closure_exprs(else_body, boxed);
            }
            Stmt::Loop { body } => upgrade_closure_exprs(body, boxed),
            Stmt::Return(Some(e)) => upgrade_expr(e, boxed),
            Stmt::Match {
                scrutinee,
                arms,
                default,
            } => {
                upgrade_expr(scrutinee, boxed);
                for arm in arms {
                    upgrade_closure_exprs(&mut arm.body, boxed);
                }
                if let Some(d) = default {
                    upgrade_closure_exprs(d, boxed);
                }
            }
            _ => {}
        }
    }
}

fn upgrade_expr(expr: &mut Expr, boxed: &FxHashSet<Symbol>) {
    if let ExprKind::Closure { func, kind, .. } = &mut expr.kind {
        if boxed.contains(func) {
            *kind = ternc_tir::CaptureKind::BoxedEnv;
            if let ternc_tir::Ty::Fn(fn_ty) = &mut expr.ty {
                fn_ty.captures = ternc_tir::CaptureKind::BoxedEnv;
            }
        }
    }
    match &mut expr.kind {
        ExprKind::Call { callee, args } => {
            upgrade_expr(callee, boxed);
            args.iter_mut().for_each(|a| upgrade_expr(a, boxed));
        }
        ExprKind::Binary { left, right, .. } => {
            upgrade_expr(left, boxed);
            upgrade_expr(right, boxed);
        }
        ExprKind::Unary { operand, .. } => upgrade_expr(operand, boxed),
        ExprKind::Field { base, .. } => upgrade_expr(base, boxed),
        ExprKind::Index { base, index } => {
            upgrade_expr(base, boxed);
            upgrade_expr(index, boxed);
        }
        ExprKind::ArrayLen(e)
        | ExprKind::Tag(e)
        | ExprKind::Payload(e)
        | ExprKind::OptionSome(e)
        | ExprKind::ResultOk(e)
        | ExprKind::ResultErr(e) => upgrade_expr(e, boxed),
        ExprKind::Tuple(items) | ExprKind::ArrayLit(items) => {
            items.iter_mut().for_each(|i| upgrade_expr(i, boxed));
        }
        ExprKind::StructLit { fields, .. } => {
            fields.iter_mut().for_each(|f| upgrade_expr(f, boxed));
        }
        ExprKind::UnionLit { payload, .. } => {
            if let Some(p) = payload {
                upgrade_expr(p, boxed);
            }
        }
        ExprKind::Alloc { value, .. } => upgrade_expr(value, boxed),
        _ => {}
    }
}

// =============================================================================
// Verification
// =============================================================================

/// Every allocation must be placed once the analyzer finishes; a survivor
/// is a compiler bug, not bad input.
pub(crate) fn verify_placements(ctx: &Context, handler: &Handler) {
    for (name, def) in &ctx.functions {
        ir::walk_exprs(&def.body.stmts, &mut |e| {
            if matches!(
                e.kind,
                ExprKind::Alloc {
                    placement: AllocPlacement::Unplaced,
                    ..
                }
            ) {
                DiagnosticBuilder::error(
                    DiagnosticKind::InternalError,
                    format!("unplaced allocation survived analysis in `{}`", name),
                )
                .span(e.span)
                .emit(handler);
            }
        });
    }
}
