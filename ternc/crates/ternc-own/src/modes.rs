//! Parameter mode inference.
//!
//! For each parameter: a write through it makes it `BorrowedMut`; storing
//! or returning it (directly or through a local alias) makes it `Owned`;
//! otherwise it is `Borrowed`. Primitive parameters pass by value and their
//! label is advisory.
//!
//! Calls propagate: passing a parameter where the callee takes `Owned`
//! stores it; where the callee takes `BorrowedMut`, mutates it. Recursive
//! groups therefore iterate until no label changes.

use ternc_tir::{
    ir, Context, Expr, ExprKind, LocalId, ParamMode, Place, Stmt,
};
use ternc_util::{FxHashSet, Idx, Symbol};

/// Infer modes for one strongly connected group, jointly.
pub(crate) fn infer_group(ctx: &mut Context, group: &[Symbol]) {
    loop {
        let mut changed = false;
        for &name in group {
            let Some(def) = ctx.fn_def(name) else { continue };
            let inferred = infer_fn(ctx, def.body.params.clone(), &def.body.stmts, def);
            let def = ctx.functions.get_mut(&name).expect("function exists");
            for (param, mode) in def.sig.params.iter_mut().zip(&inferred) {
                if param.mode != Some(*mode) {
                    param.mode = Some(*mode);
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
}

/// Built-in runtime helpers have fixed parameter modes.
fn intrinsic_mode(name: Symbol, arg_index: usize) -> Option<ParamMode> {
    match name.as_str() {
        // push mutates the array and takes ownership of the element
        "__tern_array_push" => Some(if arg_index == 0 {
            ParamMode::BorrowedMut
        } else {
            ParamMode::Owned
        }),
        "__tern_str_concat" | "__tern_str_len" | "__tern_fmt_int" | "__tern_fmt_float" => {
            Some(ParamMode::Borrowed)
        }
        other if other.starts_with("__tern_") => Some(ParamMode::Borrowed),
        _ => None,
    }
}

fn infer_fn(
    ctx: &Context,
    params: Vec<LocalId>,
    stmts: &[Stmt],
    def: &ternc_tir::FnDef,
) -> Vec<ParamMode> {
    let mut mutated: FxHashSet<LocalId> = FxHashSet::default();
    let mut escaped: FxHashSet<LocalId> = FxHashSet::default();
    // local → params it may alias
    let mut aliases: Vec<FxHashSet<LocalId>> = vec![FxHashSet::default(); def.body.locals.len()];
    for &p in &params {
        aliases[p.index()].insert(p);
    }

    // Flow-insensitive: iterate until the alias sets and flags settle.
    loop {
        let before = (mutated.len(), escaped.len(), alias_total(&aliases));
        scan_stmts(ctx, stmts, &mut mutated, &mut escaped, &mut aliases);
        if (mutated.len(), escaped.len(), alias_total(&aliases)) == before {
            break;
        }
    }

    // Captured-by-closure parameters escape with the closure.
    ir::walk_exprs(stmts, &mut |e| {
        if let ExprKind::Closure { captures, .. } = &e.kind {
            for c in captures {
                for &p in aliases[c.index()].clone().iter() {
                    escaped.insert(p);
                }
            }
        }
    });

    params
        .iter()
        .map(|&p| {
            if mutated.contains(&p) {
                ParamMode::BorrowedMut
            } else if escaped.contains(&p) {
                ParamMode::Owned
            } else {
                ParamMode::Borrowed
            }
        })
        .collect()
}

fn alias_total(aliases: &[FxHashSet<LocalId>]) -> usize {
    aliases.iter().map(|s| s.len()).sum()
}

fn scan_stmts(
    ctx: &Context,
    stmts: &[Stmt],
    mutated: &mut FxHashSet<LocalId>,
    escaped: &mut FxHashSet<LocalId>,
    aliases: &mut Vec<FxHashSet<LocalId>>,
) {
    for stmt in stmts {
        match stmt {
            Stmt::Let { local, init } => {
                if let Some(init) = init {
                    flow_into_local(ctx, *local, init, mutated, escaped, aliases);
                }
            }
            Stmt::Assign { place, value } => {
                match place {
                    Place::Local(local) => {
                        flow_into_local(ctx, *local, value, mutated, escaped, aliases);
                    }
                    Place::Field(base, _) | Place::Index(base, _) => {
                        // A write through a projection mutates its root; the
                        // stored value escapes into the aggregate, except a
                        // weak reference, which owns nothing.
                        let root = base.base_local();
                        for &p in aliases[root.index()].clone().iter() {
                            mutated.insert(p);
                        }
                        if !matches!(value.ty, ternc_tir::Ty::Weak(_)) {
                            mark_value_escapes(value, escaped, aliases);
                        }
                    }
                }
                scan_value(ctx, value, mutated, escaped, aliases);
            }
            Stmt::Expr(e) => scan_value(ctx, e, mutated, escaped, aliases),
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                scan_value(ctx, cond, mutated, escaped, aliases);
                scan_stmts(ctx, then_body, mutated, escaped, aliases);
                scan_stmts(ctx, else_body, mutated, escaped, aliases);
            }
            Stmt::Loop { body } => scan_stmts(ctx, body, mutated, escaped, aliases),
            Stmt::Break | Stmt::Continue => {}
            Stmt::Return(Some(e)) => {
                mark_value_escapes(e, escaped, aliases);
                scan_value(ctx, e, mutated, escaped, aliases);
            }
            Stmt::Return(None) => {}
            Stmt::Match {
                scrutinee,
                arms,
                default,
            } => {
                scan_value(ctx, scrutinee, mutated, escaped, aliases);
                for arm in arms {
                    scan_stmts(ctx, &arm.body, mutated, escaped, aliases);
                }
                if let Some(d) = default {
                    scan_stmts(ctx, d, mutated, escaped, aliases);
                }
            }
            Stmt::Retain(_) | Stmt::Release(_) => {}
        }
    }
}

/// `local = value`: the destination aliases whatever params flow in.
fn flow_into_local(
    ctx: &Context,
    local: LocalId,
    value: &Expr,
    mutated: &mut FxHashSet<LocalId>,
    escaped: &mut FxHashSet<LocalId>,
    aliases: &mut Vec<FxHashSet<LocalId>>,
) {
    let mut sources = FxHashSet::default();
    crate::refs::reference_locals(value, &mut |l| {
        sources.extend(aliases[l.index()].iter().copied());
    });
    aliases[local.index()].extend(sources);
    scan_value(ctx, value, mutated, escaped, aliases);
}

/// The value flows somewhere that outlives the function. Only reference
/// paths count: a projected primitive is a copy.
fn mark_value_escapes(
    value: &Expr,
    escaped: &mut FxHashSet<LocalId>,
    aliases: &[FxHashSet<LocalId>],
) {
    crate::refs::reference_locals(value, &mut |l| {
        for &p in &aliases[l.index()] {
            escaped.insert(p);
        }
    });
}

/// Call-site propagation: callee modes flow back to argument roots.
fn scan_value(
    ctx: &Context,
    value: &Expr,
    mutated: &mut FxHashSet<LocalId>,
    escaped: &mut FxHashSet<LocalId>,
    aliases: &mut Vec<FxHashSet<LocalId>>,
) {
    ir::walk_expr(value, &mut |e| {
        let ExprKind::Call { callee, args } = &e.kind else {
            return;
        };
        let ExprKind::Fn(name) = &callee.kind else {
            // Indirect call: assume arguments are borrowed.
            return;
        };
        for (i, arg) in args.iter().enumerate() {
            let mode = intrinsic_mode(*name, i).or_else(|| {
                ctx.fn_sig(*name)
                    .and_then(|sig| sig.params.get(i))
                    .and_then(|p| p.mode)
            });
            let mode = match mode {
                Some(mode) => mode,
                // Unanalyzed callee in the same recursive group: the fixed
                // point will revisit.
                None => continue,
            };
            match mode {
                ParamMode::Owned => mark_value_escapes(arg, escaped, aliases),
                ParamMode::BorrowedMut => {
                    collect_locals(arg, &mut |l| {
                        for &p in aliases[l.index()].clone().iter() {
                            mutated.insert(p);
                        }
                    });
                }
                ParamMode::Borrowed => {}
            }
        }
    });
}

fn collect_locals(expr: &Expr, visit: &mut dyn FnMut(LocalId)) {
    ir::walk_expr(expr, &mut |e| {
        if let ExprKind::Local(l) = &e.kind {
            visit(*l);
        }
    });
}
