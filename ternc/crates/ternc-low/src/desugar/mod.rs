//! The desugarer: surface statements and functions to Core IR.
//!
//! Lowering is bottom-up per function: a [`FnCtx`] accumulates locals and a
//! stack of statement buffers, expressions may emit prelude statements
//! (temporaries, conditionals-as-ifs) into the open buffer, and `throw` /
//! `try` are rewritten into `Result` threading — there is no unwinding in
//! the Core IR.

pub(crate) mod classes;
pub(crate) mod exprs;

pub use classes::lower_class;

use crate::{Lowering, SigInfo};
use ternc_ast::{self as ast, StmtKind};
use ternc_tir::{
    AllocPlacement, Body, Const, Expr, ExprKind, FnDef, IntTy, LocalDecl, LocalId, MatchArm,
    ParamSig, Place, Stmt, Ty,
};
use ternc_util::{DefId, DiagnosticKind, FxHashMap, FxHashSet, Span, Symbol};

/// Result values carry tag 0 for Ok and 1 for Err.
pub const TAG_OK: u32 = 0;
pub const TAG_ERR: u32 = 1;
/// Option values carry tag 0 for None and 1 for Some.
pub const TAG_NONE: u32 = 0;
pub const TAG_SOME: u32 = 1;

/// Per-function lowering state.
pub(crate) struct FnCtx {
    pub name: Symbol,
    pub body: Body,
    pub locals_by_def: FxHashMap<DefId, LocalId>,
    pub locals_by_name: FxHashMap<Symbol, LocalId>,
    pub declared_ret: Ty,
    pub throwing: bool,
    pub err_ty: Ty,
    /// Open statement buffers, innermost last
    pub blocks: Vec<Vec<Stmt>>,
    /// Enclosing `try` contexts, innermost last
    pub tries: Vec<TryCtx>,
    /// Option-typed locals proven non-null on this path
    pub narrowed_options: FxHashSet<DefId>,
    /// Union-typed locals narrowed to a variant payload local
    pub narrowed_unions: FxHashMap<DefId, LocalId>,
    /// Locals that are captures of the closure being lowered
    pub captures: Vec<LocalId>,
    /// The `self` parameter of a method body
    pub self_local: Option<LocalId>,
    /// Set while lowering a throwing call the try machinery will match on
    pub allow_throwing: bool,
}

/// One enclosing `try`: its handler, if any, and the cleanup block that
/// must run on every path out of it.
#[derive(Clone)]
pub(crate) struct TryCtx {
    pub catch: Option<CatchCtx>,
    pub finally: Vec<ast::Stmt>,
}

#[derive(Clone)]
pub(crate) struct CatchCtx {
    pub binding: Option<ast::Binding>,
    pub body: Vec<ast::Stmt>,
}

impl FnCtx {
    pub fn new(name: Symbol, info: &SigInfo) -> Self {
        let (declared_ret, err_ty) = match (&info.throwing, &info.sig.ret) {
            (true, Ty::Result(ok, err)) => ((**ok).clone(), (**err).clone()),
            _ => (info.sig.ret.clone(), Ty::Str),
        };
        Self {
            name,
            body: Body::new(),
            locals_by_def: FxHashMap::default(),
            locals_by_name: FxHashMap::default(),
            declared_ret,
            throwing: info.throwing,
            err_ty,
            blocks: Vec::new(),
            tries: Vec::new(),
            narrowed_options: FxHashSet::default(),
            narrowed_unions: FxHashMap::default(),
            captures: Vec::new(),
            self_local: None,
            allow_throwing: false,
        }
    }

    pub fn emit(&mut self, stmt: Stmt) {
        self.blocks
            .last_mut()
            .expect("no open statement buffer")
            .push(stmt);
    }

    pub fn new_local(&mut self, name: Option<Symbol>, ty: Ty, span: Span, mutable: bool) -> LocalId {
        self.body.locals.push(LocalDecl {
            name,
            ty,
            span,
            mutable,
        })
    }

    pub fn new_temp(&mut self, ty: Ty, span: Span) -> LocalId {
        self.new_local(None, ty, span, true)
    }

    /// Bind a surface name to a local, via the binder's resolution when
    /// present and by name otherwise.
    pub fn bind(&mut self, scopes: &ast::ScopeInfo, binding: &ast::Binding, local: LocalId) {
        if let Some(def) = scopes.resolve(binding.id) {
            self.locals_by_def.insert(def, local);
        }
        self.locals_by_name.insert(binding.name, local);
    }

    pub fn local_ty(&self, local: LocalId) -> Ty {
        self.body.locals[local].ty.clone()
    }

    /// True if some enclosing `try` has a catch clause to handle a throw.
    pub fn in_protected_try(&self) -> bool {
        self.tries.iter().any(|t| t.catch.is_some())
    }
}

// =============================================================================
// Throwing pre-analysis
// =============================================================================

/// True if the body contains a `throw` that no enclosing `try`+`catch`
/// swallows; such a function returns `Result`.
pub fn body_throws(stmts: &[ast::Stmt]) -> bool {
    stmts.iter().any(stmt_throws)
}

fn stmt_throws(stmt: &ast::Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Throw(_) => true,
        StmtKind::Block(inner) => body_throws(inner),
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            stmt_throws(then_branch)
                || else_branch.as_deref().map(stmt_throws).unwrap_or(false)
        }
        StmtKind::While { body, .. } | StmtKind::ForOf { body, .. } => stmt_throws(body),
        StmtKind::For { body, .. } => stmt_throws(body),
        StmtKind::Switch { cases, default, .. } => {
            cases.iter().any(|c| body_throws(&c.body))
                || default.as_deref().map(body_throws).unwrap_or(false)
        }
        StmtKind::Try {
            block,
            catch,
            finally,
        } => {
            // A throw inside try { } with a catch is handled locally.
            let block_escapes = catch.is_none() && body_throws(block);
            block_escapes
                || catch.as_ref().map(|c| body_throws(&c.body)).unwrap_or(false)
                || finally.as_deref().map(body_throws).unwrap_or(false)
        }
        _ => false,
    }
}

/// The error type a throwing body produces: the type of its first thrown
/// literal, `string` otherwise.
pub fn infer_error_ty(stmts: &[ast::Stmt]) -> Ty {
    fn find(stmts: &[ast::Stmt]) -> Option<Ty> {
        for stmt in stmts {
            let found = match &stmt.kind {
                StmtKind::Throw(e) => match &e.kind {
                    ast::ExprKind::Literal(ast::Lit::String(_)) => Some(Ty::Str),
                    ast::ExprKind::Literal(ast::Lit::Number(_)) => Some(Ty::F64),
                    _ => Some(Ty::Str),
                },
                StmtKind::Block(inner) => find(inner),
                StmtKind::If {
                    then_branch,
                    else_branch,
                    ..
                } => find(std::slice::from_ref(then_branch)).or_else(|| {
                    else_branch
                        .as_deref()
                        .and_then(|e| find(std::slice::from_ref(e)))
                }),
                StmtKind::While { body, .. }
                | StmtKind::For { body, .. }
                | StmtKind::ForOf { body, .. } => find(std::slice::from_ref(body)),
                _ => None,
            };
            if found.is_some() {
                return found;
            }
        }
        None
    }
    find(stmts).unwrap_or(Ty::Str)
}

// =============================================================================
// Function lowering
// =============================================================================

/// Lower one function declaration under an optional type-parameter
/// substitution (present when this is a monomorphized instance).
pub fn lower_function(
    lw: &mut Lowering<'_, '_>,
    decl: &ast::FnDecl,
    name: Symbol,
    subst: Option<&FxHashMap<Symbol, Ty>>,
) {
    let info = match lw.sigs.get(&name) {
        Some(info) => info.clone(),
        None => {
            let info = lw.signature_of_fn(decl, name, subst);
            lw.sigs.insert(name, info.clone());
            info
        }
    };

    if let Some(s) = subst {
        lw.res.push_subst(s.clone());
    }

    let mut f = FnCtx::new(name, &info);
    declare_params(lw, &mut f, &decl.params, &info.sig.params, None);
    f.blocks.push(Vec::new());
    for stmt in &decl.body {
        lower_stmt(lw, &mut f, stmt);
    }
    let mut stmts = f.blocks.pop().expect("function body buffer");
    append_implicit_return(&mut f, &mut stmts, decl.span);
    f.body.stmts = stmts;

    lw.res.ctx.define_fn(FnDef {
        name,
        sig: info.sig,
        body: f.body,
        throwing: info.throwing,
        capture_env: None,
        span: decl.span,
    });

    if subst.is_some() {
        lw.res.pop_subst();
    }
}

/// Declare parameter locals in order. `self_ty` injects the implicit `self`
/// of class callables as parameter zero.
pub(crate) fn declare_params(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    params: &[ast::Param],
    sigs: &[ParamSig],
    self_ty: Option<Ty>,
) {
    let mut sig_iter = sigs.iter();
    if let Some(self_ty) = self_ty {
        let _ = sig_iter.next();
        let local = f.new_local(Some(*ternc_util::sym::SELF_PARAM), self_ty, Span::DUMMY, false);
        f.body.params.push(local);
        f.self_local = Some(local);
    }
    for (param, sig) in params.iter().zip(sig_iter) {
        let local = f.new_local(Some(param.binding.name), sig.ty.clone(), param.span, true);
        f.body.params.push(local);
        f.bind(lw.scopes, &param.binding, local);
    }
}

/// Functions returning Void may omit a trailing return; give them one.
/// Throwing Void functions return `Ok(void)`.
fn append_implicit_return(f: &mut FnCtx, stmts: &mut Vec<Stmt>, span: Span) {
    if matches!(stmts.last(), Some(Stmt::Return(_))) {
        return;
    }
    if f.declared_ret == Ty::Void {
        let value = if f.throwing {
            Some(Expr::new(
                ExprKind::ResultOk(Box::new(Expr::new(
                    ExprKind::Const(Const::Void),
                    Ty::Void,
                    span,
                ))),
                Ty::result(Ty::Void, f.err_ty.clone()),
                span,
            ))
        } else {
            None
        };
        stmts.push(Stmt::Return(value));
    }
}

// =============================================================================
// Statements
// =============================================================================

pub(crate) fn lower_block(lw: &mut Lowering<'_, '_>, f: &mut FnCtx, stmts: &[ast::Stmt]) -> Vec<Stmt> {
    f.blocks.push(Vec::new());
    for stmt in stmts {
        lower_stmt(lw, f, stmt);
    }
    f.blocks.pop().expect("block buffer")
}

fn lower_branch(lw: &mut Lowering<'_, '_>, f: &mut FnCtx, stmt: &ast::Stmt) -> Vec<Stmt> {
    match &stmt.kind {
        StmtKind::Block(inner) => lower_block(lw, f, inner),
        _ => lower_block(lw, f, std::slice::from_ref(stmt)),
    }
}

pub(crate) fn lower_stmt(lw: &mut Lowering<'_, '_>, f: &mut FnCtx, stmt: &ast::Stmt) {
    match &stmt.kind {
        StmtKind::Block(inner) => {
            let lowered = lower_block(lw, f, inner);
            for s in lowered {
                f.emit(s);
            }
        }
        StmtKind::Let(decl) => lower_let(lw, f, decl, stmt.span),
        StmtKind::ExprStmt(e) => {
            let lowered = exprs::lower_expr(lw, f, e, None);
            // An assignment already emitted its store; the residual read of
            // the assigned place is not worth a statement.
            if !matches!(e.kind, ast::ExprKind::Assign { .. }) {
                f.emit(Stmt::Expr(lowered));
            }
        }
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => lower_if(lw, f, cond, then_branch, else_branch.as_deref()),
        StmtKind::While { cond, body } => {
            // while (c) S  →  loop { if (!c) break; S }
            f.blocks.push(Vec::new());
            let cond_expr = exprs::lower_expr(lw, f, cond, Some(&Ty::Bool));
            let mut loop_body = f.blocks.pop().expect("loop buffer");
            loop_body.push(Stmt::If {
                cond: cond_expr,
                then_body: vec![],
                else_body: vec![Stmt::Break],
            });
            loop_body.extend(lower_branch(lw, f, body));
            f.emit(Stmt::Loop { body: loop_body });
        }
        StmtKind::For {
            init,
            cond,
            update,
            body,
        } => {
            if let Some(init) = init {
                lower_stmt(lw, f, init);
            }
            f.blocks.push(Vec::new());
            if let Some(cond) = cond {
                let cond_expr = exprs::lower_expr(lw, f, cond, Some(&Ty::Bool));
                f.emit(Stmt::If {
                    cond: cond_expr,
                    then_body: vec![],
                    else_body: vec![Stmt::Break],
                });
            }
            let body_stmts = lower_branch(lw, f, body);
            for s in body_stmts {
                f.emit(s);
            }
            if let Some(update) = update {
                let update_expr = exprs::lower_expr(lw, f, update, None);
                f.emit(Stmt::Expr(update_expr));
            }
            let loop_body = f.blocks.pop().expect("loop buffer");
            f.emit(Stmt::Loop { body: loop_body });
        }
        StmtKind::ForOf {
            binding,
            iter,
            body,
        } => lower_for_of(lw, f, binding, iter, body, stmt.span),
        StmtKind::Switch {
            disc,
            cases,
            default,
        } => lower_switch(lw, f, disc, cases, default.as_deref(), stmt.span),
        StmtKind::Return(value) => lower_return(lw, f, value.as_ref(), stmt.span),
        StmtKind::Throw(e) => lower_throw(lw, f, e, stmt.span),
        StmtKind::Try {
            block,
            catch,
            finally,
        } => lower_try(lw, f, block, catch.as_ref(), finally.as_deref(), stmt.span),
        StmtKind::Break => f.emit(Stmt::Break),
        StmtKind::Continue => f.emit(Stmt::Continue),
    }
}

fn lower_let(lw: &mut Lowering<'_, '_>, f: &mut FnCtx, decl: &ast::LetStmt, span: Span) {
    let declared = decl.ty.as_ref().map(|ann| match &decl.pattern {
        ast::Pattern::Ident(b) => lw
            .res
            .resolve_with_hint(ann, ternc_sem::NameHint::VarInit { var: b.name }),
        _ => lw.res.resolve_annotation(ann),
    });

    match &decl.pattern {
        ast::Pattern::Ident(binding) => {
            let init = decl
                .init
                .as_ref()
                .map(|e| exprs::lower_expr(lw, f, e, declared.as_ref()));
            let ty = declared
                .or_else(|| init.as_ref().map(|e| e.ty.clone()))
                .unwrap_or(Ty::Void);
            let init = init.map(|e| exprs::coerce(lw, f, e, &ty));
            let local = f.new_local(Some(binding.name), ty, span, decl.mutable);
            f.bind(lw.scopes, binding, local);
            f.emit(Stmt::Let { local, init });
        }
        ast::Pattern::Object(fields) => {
            // const { x, y } = p  →  tmp = p; x = tmp.x; y = tmp.y
            let Some(init) = &decl.init else { return };
            let source = exprs::lower_expr(lw, f, init, declared.as_ref());
            let source_ty = source.ty.clone();
            let tmp = f.new_temp(source_ty.clone(), span);
            f.emit(Stmt::Let {
                local: tmp,
                init: Some(source),
            });
            for field in fields {
                let (index, field_ty) = exprs::field_of(lw, &source_ty, field.key, field.span);
                let read = Expr::new(
                    ExprKind::Field {
                        base: Box::new(Expr::new(
                            ExprKind::Local(tmp),
                            source_ty.clone(),
                            span,
                        )),
                        index,
                    },
                    field_ty.clone(),
                    field.span,
                );
                let local = f.new_local(Some(field.binding.name), field_ty, field.span, decl.mutable);
                f.bind(lw.scopes, &field.binding, local);
                f.emit(Stmt::Let {
                    local,
                    init: Some(read),
                });
            }
        }
        ast::Pattern::Array(slots) => {
            // const [a, , b] = pair  →  tmp = pair; a = tmp[0]; b = tmp[2]
            let Some(init) = &decl.init else { return };
            let source = exprs::lower_expr(lw, f, init, declared.as_ref());
            let source_ty = source.ty.clone();
            let tmp = f.new_temp(source_ty.clone(), span);
            f.emit(Stmt::Let {
                local: tmp,
                init: Some(source),
            });
            for (i, slot) in slots.iter().enumerate() {
                let Some(binding) = slot else { continue };
                let element_ty = match &source_ty {
                    Ty::Array(e) => (**e).clone(),
                    Ty::Tuple(elements) => {
                        elements.get(i).cloned().unwrap_or(Ty::Never)
                    }
                    _ => Ty::Never,
                };
                let read = match &source_ty {
                    Ty::Tuple(_) => Expr::new(
                        ExprKind::Field {
                            base: Box::new(Expr::new(
                                ExprKind::Local(tmp),
                                source_ty.clone(),
                                span,
                            )),
                            index: i as u32,
                        },
                        element_ty.clone(),
                        binding.span,
                    ),
                    _ => Expr::new(
                        ExprKind::Index {
                            base: Box::new(Expr::new(
                                ExprKind::Local(tmp),
                                source_ty.clone(),
                                span,
                            )),
                            index: Box::new(Expr::int(i as i64, IntTy::I64, binding.span)),
                        },
                        element_ty.clone(),
                        binding.span,
                    ),
                };
                let local = f.new_local(Some(binding.name), element_ty, binding.span, decl.mutable);
                f.bind(lw.scopes, binding, local);
                f.emit(Stmt::Let {
                    local,
                    init: Some(read),
                });
            }
        }
    }
}

/// `if` with null-test narrowing: when the then-branch diverges, the tested
/// option stays narrowed for the rest of the function.
fn lower_if(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    cond: &ast::Expr,
    then_branch: &ast::Stmt,
    else_branch: Option<&ast::Stmt>,
) {
    let narrow_def = exprs::null_test_subject(lw, f, cond);
    let cond_expr = exprs::lower_expr(lw, f, cond, Some(&Ty::Bool));
    let then_body = lower_branch(lw, f, then_branch);

    // `if (x === null) return …;` proves x non-null afterwards.
    if let Some(def) = narrow_def {
        if diverges(&then_body) {
            f.narrowed_options.insert(def);
        }
    }

    let else_body = else_branch
        .map(|s| lower_branch(lw, f, s))
        .unwrap_or_default();
    f.emit(Stmt::If {
        cond: cond_expr,
        then_body,
        else_body,
    });
}

fn diverges(stmts: &[Stmt]) -> bool {
    matches!(stmts.last(), Some(Stmt::Return(_)))
}

fn lower_for_of(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    binding: &ast::Binding,
    iter: &ast::Expr,
    body: &ast::Stmt,
    span: Span,
) {
    // for (const x of arr)  →  i = 0; loop { if (i >= arr.length) break;
    //                                        x = arr[i]; …; i = i + 1 }
    let arr = exprs::lower_expr(lw, f, iter, None);
    let element_ty = match &arr.ty {
        Ty::Array(e) => (**e).clone(),
        other => {
            lw.error(
                DiagnosticKind::TypeMismatch,
                span,
                format!("`for…of` requires an array, found `{:?}`", other),
            );
            Ty::Never
        }
    };
    let arr_ty = arr.ty.clone();
    let arr_local = f.new_temp(arr_ty.clone(), span);
    f.emit(Stmt::Let {
        local: arr_local,
        init: Some(arr),
    });
    let index = f.new_temp(Ty::I64, span);
    f.emit(Stmt::Let {
        local: index,
        init: Some(Expr::int(0, IntTy::I64, span)),
    });

    let index_expr = Expr::new(ExprKind::Local(index), Ty::I64, span);
    let len_expr = Expr::new(
        ExprKind::ArrayLen(Box::new(Expr::new(
            ExprKind::Local(arr_local),
            arr_ty.clone(),
            span,
        ))),
        Ty::I64,
        span,
    );
    let done = Expr::new(
        ExprKind::Binary {
            op: ternc_tir::BinOp::Ge,
            left: Box::new(index_expr.clone()),
            right: Box::new(len_expr),
        },
        Ty::Bool,
        span,
    );

    let element = f.new_local(Some(binding.name), element_ty.clone(), binding.span, false);
    f.bind(lw.scopes, binding, element);
    let read = Expr::new(
        ExprKind::Index {
            base: Box::new(Expr::new(ExprKind::Local(arr_local), arr_ty, span)),
            index: Box::new(index_expr.clone()),
        },
        element_ty,
        span,
    );

    let mut loop_body = vec![
        Stmt::If {
            cond: done,
            then_body: vec![Stmt::Break],
            else_body: vec![],
        },
        Stmt::Let {
            local: element,
            init: Some(read),
        },
    ];
    loop_body.extend(lower_branch(lw, f, body));
    loop_body.push(Stmt::Assign {
        place: Place::Local(index),
        value: Expr::new(
            ExprKind::Binary {
                op: ternc_tir::BinOp::Add,
                left: Box::new(index_expr),
                right: Box::new(Expr::int(1, IntTy::I64, span)),
            },
            Ty::I64,
            span,
        ),
    });
    f.emit(Stmt::Loop { body: loop_body });
}

/// `switch` lowers to match-on-tag: over a union discriminant read, over a
/// string-literal enum value, or over plain integers.
fn lower_switch(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    disc: &ast::Expr,
    cases: &[ast::SwitchCase],
    default: Option<&[ast::Stmt]>,
    span: Span,
) {
    // switch (s.kind) over a discriminated union narrows per arm.
    if let Some((subject_def, union_id, subject_expr)) = exprs::union_discriminant(lw, f, disc) {
        let def = lw.res.ctx.union_def(union_id).clone();
        let mut arms = Vec::new();
        for case in cases {
            let Some(value) = case.test.kind.as_string_lit() else {
                lw.error(
                    DiagnosticKind::TypeMismatch,
                    case.span,
                    "switch over a union discriminant requires string-literal cases",
                );
                continue;
            };
            let Some(variant) = def.variant_for_discriminant(value) else {
                lw.error(
                    DiagnosticKind::TypeMismatch,
                    case.span,
                    format!("`{}` is not a variant of `{}`", value, def.name),
                );
                continue;
            };
            let payload_local = f.new_temp(variant.payload.clone(), case.span);
            if let Some(def_id) = subject_def {
                f.narrowed_unions.insert(def_id, payload_local);
            }
            let body = lower_block(lw, f, &case.body);
            if let Some(def_id) = subject_def {
                f.narrowed_unions.remove(&def_id);
            }
            arms.push(MatchArm {
                tag: variant.tag,
                binding: Some(payload_local),
                body,
            });
        }
        let default_body = default.map(|stmts| lower_block(lw, f, stmts));
        f.emit(Stmt::Match {
            scrutinee: subject_expr,
            arms,
            default: default_body,
        });
        return;
    }

    // Otherwise the discriminant is integer-valued (string-literal enums
    // already resolved to Int32); cases match on the compile-time tag.
    let scrutinee = exprs::lower_expr(lw, f, disc, None);
    let mut arms = Vec::new();
    for case in cases {
        let tag = match case.test.kind.as_string_lit() {
            Some(value) => match lw.res.ctx.lookup_string_tag(value) {
                Some(tag) => tag,
                None => {
                    lw.error(
                        DiagnosticKind::TypeMismatch,
                        case.span,
                        format!("string `{}` is not a member of this literal type", value),
                    );
                    continue;
                }
            },
            None => match &case.test.kind {
                ast::ExprKind::Literal(ast::Lit::Number(n)) => *n as u32,
                _ => {
                    lw.error(
                        DiagnosticKind::TypeMismatch,
                        case.span,
                        "switch cases must be string or numeric literals",
                    );
                    continue;
                }
            },
        };
        let body = lower_block(lw, f, &case.body);
        arms.push(MatchArm {
            tag,
            binding: None,
            body,
        });
    }
    let default_body = default.map(|stmts| lower_block(lw, f, stmts));
    let _ = span;
    f.emit(Stmt::Match {
        scrutinee,
        arms,
        default: default_body,
    });
}

fn lower_return(lw: &mut Lowering<'_, '_>, f: &mut FnCtx, value: Option<&ast::Expr>, span: Span) {
    let declared = f.declared_ret.clone();
    let lowered = value.map(|e| {
        let lowered = exprs::lower_expr(lw, f, e, Some(&declared));
        exprs::coerce(lw, f, lowered, &declared)
    });
    emit_return_with_cleanup(lw, f, lowered, span);
}

/// Run every pending `finally` and emit the return; plain returns in a
/// throwing function wrap in Ok. The value is evaluated into a temporary
/// before the cleanups run, so they cannot disturb it.
fn emit_return_with_cleanup(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    value: Option<Expr>,
    span: Span,
) {
    let has_cleanup = f.tries.iter().any(|t| !t.finally.is_empty());
    let value = match value {
        Some(v) if has_cleanup => Some(exprs::hoist(f, v, span)),
        other => other,
    };
    if has_cleanup {
        run_pending_finallys(lw, f);
    }
    if f.throwing {
        let ok_ty = Ty::result(f.declared_ret.clone(), f.err_ty.clone());
        let payload = value.unwrap_or_else(|| {
            Expr::new(ExprKind::Const(Const::Void), Ty::Void, span)
        });
        f.emit(Stmt::Return(Some(Expr::new(
            ExprKind::ResultOk(Box::new(payload)),
            ok_ty,
            span,
        ))));
    } else {
        f.emit(Stmt::Return(value));
    }
}

/// A return exits every enclosing `try`: their finally blocks run innermost
/// first, each lowered with its own try already off the stack so a throw
/// inside a finally targets the next handler out.
fn run_pending_finallys(lw: &mut Lowering<'_, '_>, f: &mut FnCtx) {
    let mut unwound = Vec::new();
    while let Some(ctx) = f.tries.pop() {
        for stmt in &ctx.finally {
            lower_stmt(lw, f, stmt);
        }
        unwound.push(ctx);
    }
    while let Some(ctx) = unwound.pop() {
        f.tries.push(ctx);
    }
}

/// `throw e` → `return Err(e)`, or a transfer into the nearest catch.
fn lower_throw(lw: &mut Lowering<'_, '_>, f: &mut FnCtx, e: &ast::Expr, span: Span) {
    let err_ty = f.err_ty.clone();
    let payload = exprs::lower_expr(lw, f, e, Some(&err_ty));
    let payload = exprs::coerce(lw, f, payload, &err_ty);
    lower_abrupt_throw(lw, f, payload, span);
}

/// Route a thrown value: unwind through the enclosing tries, running each
/// `finally`, until a catch handles it; with no catch anywhere the function
/// returns `Err`. Control never continues past the throw site, so callers
/// must lower nothing after this on the same path.
fn lower_abrupt_throw(lw: &mut Lowering<'_, '_>, f: &mut FnCtx, error_value: Expr, span: Span) {
    // The thrown value is evaluated before any cleanup runs.
    let error_value = exprs::hoist(f, error_value, span);

    let mut unwound = Vec::new();
    let mut handled = false;
    while let Some(ctx) = f.tries.pop() {
        if let Some(catch) = ctx.catch.clone() {
            if let Some(binding) = &catch.binding {
                let local = f.new_local(Some(binding.name), error_value.ty.clone(), span, false);
                f.bind(lw.scopes, binding, local);
                f.emit(Stmt::Let {
                    local,
                    init: Some(error_value.clone()),
                });
            }
            for stmt in &catch.body {
                lower_stmt(lw, f, stmt);
            }
            handled = true;
        }
        // The finally runs whether the catch handled the value or the
        // unwinding continues outward.
        for stmt in &ctx.finally {
            lower_stmt(lw, f, stmt);
        }
        unwound.push(ctx);
        if handled {
            break;
        }
    }
    while let Some(ctx) = unwound.pop() {
        f.tries.push(ctx);
    }
    if handled {
        return;
    }

    if !f.throwing {
        // body_throws said no but we found a throw; an analysis bug.
        lw.error(
            DiagnosticKind::InternalError,
            span,
            "throw in a function not marked as throwing",
        );
        return;
    }
    f.emit(Stmt::Return(Some(Expr::new(
        ExprKind::ResultErr(Box::new(error_value)),
        Ty::result(f.declared_ret.clone(), f.err_ty.clone()),
        span,
    ))));
}

// =============================================================================
// try / catch
// =============================================================================

/// True if the expression is a direct call of a throwing function.
pub(crate) fn throwing_call(lw: &Lowering<'_, '_>, expr: &ast::Expr) -> bool {
    if let ast::ExprKind::Call { callee, .. } = &expr.kind {
        if let ast::ExprKind::Ident(name) = &callee.kind {
            return lw.sigs.get(name).map(|s| s.throwing).unwrap_or(false);
        }
    }
    false
}

/// `try { … } catch (e) { … } finally { … }`.
///
/// Statements containing a throwing call at the top level become a match on
/// the call's `Result`: the Ok arm carries the rest of the try block, the
/// Err arm unwinds into the catch. `finally` is cloned onto every exit
/// path — normal completion, the catch path, and any `return` or `throw`
/// that leaves the block, however deeply nested.
fn lower_try(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    block: &[ast::Stmt],
    catch: Option<&ast::CatchClause>,
    finally: Option<&[ast::Stmt]>,
    span: Span,
) {
    f.tries.push(TryCtx {
        catch: catch.map(|c| CatchCtx {
            binding: c.binding.clone(),
            body: c.body.clone(),
        }),
        finally: finally.map(<[ast::Stmt]>::to_vec).unwrap_or_default(),
    });
    lower_try_stmts(lw, f, block, span);
    f.tries.pop();
}

/// Walk a try block. Every terminal path runs its own copy of the pending
/// finally blocks (`lower_return` and `lower_throw` thread them), so a
/// recognized terminal statement stops the walk; only normal completion
/// falls through to the copy emitted at the end.
fn lower_try_stmts(lw: &mut Lowering<'_, '_>, f: &mut FnCtx, stmts: &[ast::Stmt], span: Span) {
    for (i, stmt) in stmts.iter().enumerate() {
        let rest = &stmts[i + 1..];
        let protected = f.in_protected_try();
        match &stmt.kind {
            StmtKind::ExprStmt(e) if protected && throwing_call(lw, e) => {
                lower_result_stmt(lw, f, e, None, rest, span);
                return;
            }
            StmtKind::Return(Some(e)) if protected && throwing_call(lw, e) => {
                lower_result_stmt(lw, f, e, Some(ReturnSlot), rest, span);
                return;
            }
            StmtKind::Let(decl) if protected && let_has_throwing_init(lw, decl) => {
                let ast::Pattern::Ident(binding) = &decl.pattern else {
                    unreachable!("checked by let_has_throwing_init");
                };
                let declared = decl.ty.as_ref().map(|ann| {
                    lw.res
                        .resolve_with_hint(ann, ternc_sem::NameHint::VarInit { var: binding.name })
                });
                let init = decl.init.as_ref().expect("checked");
                lower_result_init(lw, f, binding, declared, init, rest, span);
                return;
            }
            // Control never continues past a throw or a return; anything
            // after them in the block is unreachable and dropped.
            StmtKind::Throw(_) | StmtKind::Return(_) => {
                lower_stmt(lw, f, stmt);
                return;
            }
            _ => lower_stmt(lw, f, stmt),
        }
    }
    // Normal completion of the block: this try's own finally.
    emit_current_finally(lw, f);
}

/// The innermost try's finally, lowered with that try off the stack so its
/// statements are not protected by the catch they clean up after.
fn emit_current_finally(lw: &mut Lowering<'_, '_>, f: &mut FnCtx) {
    let Some(ctx) = f.tries.pop() else { return };
    for stmt in &ctx.finally {
        lower_stmt(lw, f, stmt);
    }
    f.tries.push(ctx);
}

fn let_has_throwing_init(lw: &Lowering<'_, '_>, decl: &ast::LetStmt) -> bool {
    matches!(&decl.pattern, ast::Pattern::Ident(_))
        && decl
            .init
            .as_ref()
            .map(|e| throwing_call(lw, e))
            .unwrap_or(false)
}

struct ReturnSlot;

/// Lower one throwing call in statement position within `try`: match on the
/// result, continue the try block in the Ok arm, unwind into the catch in
/// the Err arm. Both arms carry their own finally copies.
fn lower_result_stmt(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    call: &ast::Expr,
    slot: Option<ReturnSlot>,
    rest: &[ast::Stmt],
    span: Span,
) {
    f.allow_throwing = true;
    let lowered = exprs::lower_expr(lw, f, call, None);
    f.allow_throwing = false;
    let (ok_ty, err_ty) = match &lowered.ty {
        Ty::Result(ok, err) => ((**ok).clone(), (**err).clone()),
        _ => (lowered.ty.clone(), Ty::Str),
    };

    let ok_local = f.new_temp(ok_ty.clone(), span);
    f.blocks.push(Vec::new());
    if slot.is_some() {
        // `return throwing()`: nothing after the return is reachable.
        let declared = f.declared_ret.clone();
        let value = Expr::new(ExprKind::Local(ok_local), ok_ty, span);
        let value = exprs::coerce(lw, f, value, &declared);
        emit_return_with_cleanup(lw, f, Some(value), span);
    } else {
        lower_try_stmts(lw, f, rest, span);
    }
    let ok_body = f.blocks.pop().expect("ok arm buffer");

    let err_local = f.new_temp(err_ty.clone(), span);
    f.blocks.push(Vec::new());
    lower_abrupt_throw(
        lw,
        f,
        Expr::new(ExprKind::Local(err_local), err_ty, span),
        span,
    );
    let err_body = f.blocks.pop().expect("err arm buffer");

    f.emit(Stmt::Match {
        scrutinee: lowered,
        arms: vec![
            MatchArm {
                tag: TAG_OK,
                binding: Some(ok_local),
                body: ok_body,
            },
            MatchArm {
                tag: TAG_ERR,
                binding: Some(err_local),
                body: err_body,
            },
        ],
        default: None,
    });
}

/// `let x = throwing()` inside try: the continuation of the try block rides
/// in the Ok arm, after the assignment.
fn lower_result_init(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    binding: &ast::Binding,
    declared: Option<Ty>,
    init: &ast::Expr,
    rest: &[ast::Stmt],
    span: Span,
) {
    f.allow_throwing = true;
    let lowered = exprs::lower_expr(lw, f, init, None);
    f.allow_throwing = false;
    let (ok_ty, err_ty) = match &lowered.ty {
        Ty::Result(ok, err) => ((**ok).clone(), (**err).clone()),
        _ => (lowered.ty.clone(), Ty::Str),
    };
    let var_ty = declared.unwrap_or_else(|| ok_ty.clone());
    let local = f.new_local(Some(binding.name), var_ty, span, true);
    f.bind(lw.scopes, binding, local);
    f.emit(Stmt::Let { local, init: None });

    let ok_local = f.new_temp(ok_ty.clone(), span);
    f.blocks.push(Vec::new());
    f.emit(Stmt::Assign {
        place: Place::Local(local),
        value: Expr::new(ExprKind::Local(ok_local), ok_ty, span),
    });
    lower_try_stmts(lw, f, rest, span);
    let ok_body = f.blocks.pop().expect("ok arm buffer");

    let err_local = f.new_temp(err_ty.clone(), span);
    f.blocks.push(Vec::new());
    lower_abrupt_throw(
        lw,
        f,
        Expr::new(ExprKind::Local(err_local), err_ty, span),
        span,
    );
    let err_body = f.blocks.pop().expect("err arm buffer");

    f.emit(Stmt::Match {
        scrutinee: lowered,
        arms: vec![
            MatchArm {
                tag: TAG_OK,
                binding: Some(ok_local),
                body: ok_body,
            },
            MatchArm {
                tag: TAG_ERR,
                binding: Some(err_local),
                body: err_body,
            },
        ],
        default: None,
    });
}

/// A statement-shaped allocation helper shared with class lowering.
pub(crate) fn alloc_expr(value: Expr, span: Span) -> Expr {
    let ty = value.ty.clone();
    Expr::new(
        ExprKind::Alloc {
            placement: AllocPlacement::Unplaced,
            value: Box::new(value),
        },
        ty,
        span,
    )
}
