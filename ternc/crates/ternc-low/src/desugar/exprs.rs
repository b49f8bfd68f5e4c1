//! Expression lowering.
//!
//! Expressions lower to typed Core IR nodes, emitting prelude statements
//! (temporaries, lowered conditionals) into the enclosing statement buffer.
//! Optional chaining, nullish coalescing, the ternary operator, templates,
//! spreads, and closures are all rewritten here.

use super::{alloc_expr, lower_stmt, FnCtx, TAG_NONE};
use crate::{mono, Lowering};
use ternc_ast::{self as ast, ArrayElement, ArrowBody, BinaryOp, UnaryOp};
use ternc_tir::{
    BinOp, CaptureEnv, CaptureKind, Const, Expr, ExprKind, FieldDef, FnDef, FnSig, FnTy, IntTy,
    LocalId, ParamSig, Place, Stmt, Ty, UnOp, UnionId,
};
use ternc_util::{sym, DefId, DiagnosticKind, FxHashSet, Span, Symbol};

// =============================================================================
// Entry
// =============================================================================

pub(crate) fn lower_expr(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    expr: &ast::Expr,
    expected: Option<&Ty>,
) -> Expr {
    let span = expr.span;
    match &expr.kind {
        ast::ExprKind::Literal(lit) => lower_literal(lit, expected, span),
        ast::ExprKind::Ident(name) => lower_ident(lw, f, expr, *name),
        ast::ExprKind::This => match f.self_local {
            Some(local) => Expr::new(ExprKind::Local(local), f.local_ty(local), span),
            None => {
                lw.error(
                    DiagnosticKind::UnknownSymbol,
                    span,
                    "`this` outside a class member",
                );
                Expr::new(ExprKind::Const(Const::Void), Ty::Never, span)
            }
        },
        ast::ExprKind::Member {
            object,
            property,
            optional,
        } => lower_member(lw, f, object, *property, *optional, span),
        ast::ExprKind::Index { object, index } => lower_index(lw, f, object, index, span),
        ast::ExprKind::Call {
            callee,
            type_args,
            args,
        } => lower_call(lw, f, callee, type_args, args, span),
        ast::ExprKind::New {
            callee,
            type_args,
            args,
        } => lower_new(lw, f, *callee, type_args, args, span),
        ast::ExprKind::Unary { op, operand } => lower_unary(lw, f, *op, operand, span),
        ast::ExprKind::Binary { op, left, right } => {
            lower_binary(lw, f, *op, left, right, span)
        }
        ast::ExprKind::Assign { op, target, value } => {
            lower_assign(lw, f, *op, target, value, span)
        }
        ast::ExprKind::Cond {
            cond,
            then_expr,
            else_expr,
        } => lower_cond(lw, f, cond, then_expr, else_expr, expected, span),
        ast::ExprKind::Arrow { params, ret, body } => {
            lower_arrow(lw, f, params, ret.as_ref(), body, expected, span)
        }
        ast::ExprKind::Template { head, parts } => lower_template(lw, f, *head, parts, span),
        ast::ExprKind::ObjectLit { fields } => lower_object_lit(lw, f, fields, expected, span),
        ast::ExprKind::ArrayLit { elements } => lower_array_lit(lw, f, elements, expected, span),
    }
}

// =============================================================================
// Leaves
// =============================================================================

fn lower_literal(lit: &ast::Lit, expected: Option<&Ty>, span: Span) -> Expr {
    match lit {
        ast::Lit::Number(n) => match expected {
            Some(Ty::Int(int)) if n.fract() == 0.0 => Expr::int(*n as i64, *int, span),
            Some(Ty::Float(float)) => Expr::new(
                ExprKind::Const(Const::Float(*n, *float)),
                Ty::Float(*float),
                span,
            ),
            _ => Expr::new(
                ExprKind::Const(Const::Float(*n, ternc_tir::FloatTy::F64)),
                Ty::F64,
                span,
            ),
        },
        ast::Lit::String(s) => Expr::new(ExprKind::Const(Const::Str(*s)), Ty::Str, span),
        ast::Lit::Bool(b) => Expr::bool(*b, span),
        ast::Lit::Null | ast::Lit::Undefined => {
            let ty = match expected {
                Some(opt @ Ty::Option(_)) => opt.clone(),
                _ => Ty::option(Ty::Never),
            };
            Expr::new(ExprKind::OptionNone, ty, span)
        }
    }
}

fn lower_ident(lw: &mut Lowering<'_, '_>, f: &mut FnCtx, expr: &ast::Expr, name: Symbol) -> Expr {
    let span = expr.span;
    let def = lw.scopes.resolve(expr.id);

    // Narrowing first: a union local narrowed by a switch arm or
    // instanceof reads as its variant payload, a null-tested option as its
    // inner value.
    if let Some(def) = def {
        if let Some(&payload) = f.narrowed_unions.get(&def) {
            return Expr::new(ExprKind::Local(payload), f.local_ty(payload), span);
        }
        if f.narrowed_options.contains(&def) {
            if let Some(&local) = f.locals_by_def.get(&def) {
                if let Ty::Option(inner) = f.local_ty(local) {
                    return Expr::new(
                        ExprKind::Payload(Box::new(Expr::new(
                            ExprKind::Local(local),
                            Ty::Option(inner.clone()),
                            span,
                        ))),
                        (*inner).clone(),
                        span,
                    );
                }
            }
        }
        if let Some(&local) = f.locals_by_def.get(&def) {
            return Expr::new(ExprKind::Local(local), f.local_ty(local), span);
        }
    }
    if let Some(&local) = f.locals_by_name.get(&name) {
        return Expr::new(ExprKind::Local(local), f.local_ty(local), span);
    }

    // A named function used as a value.
    if let Some(info) = lw.sigs.get(&name) {
        let ty = Ty::Fn(FnTy {
            params: info.sig.params.iter().map(|p| p.ty.clone()).collect(),
            ret: Box::new(info.sig.ret.clone()),
            captures: CaptureKind::None,
        });
        return Expr::new(ExprKind::Fn(name), ty, span);
    }

    lw.error(
        DiagnosticKind::UnknownSymbol,
        span,
        format!("cannot find value `{}`", name),
    );
    Expr::new(ExprKind::Const(Const::Void), Ty::Never, span)
}

// =============================================================================
// Member access and indexing
// =============================================================================

fn lower_member(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    object: &ast::Expr,
    property: Symbol,
    optional: bool,
    span: Span,
) -> Expr {
    // Enum member read: Mode.On is a compile-time integer.
    if let ast::ExprKind::Ident(obj_name) = &object.kind {
        if let Some(def) = lw.res.ctx.enum_def(*obj_name).cloned() {
            if let Some(value) = def.values.get(&property) {
                let n = match value {
                    ternc_tir::EnumValue::Int(n) => *n as i64,
                    ternc_tir::EnumValue::Str { tag, .. } => *tag as i64,
                };
                return Expr::int(n, IntTy::I32, span);
            }
        }
    }

    // `this.x` inside a method.
    let base = if matches!(object.kind, ast::ExprKind::This) {
        let Some(self_local) = f.self_local else {
            lw.error(
                DiagnosticKind::UnknownSymbol,
                span,
                "`this` outside a class member",
            );
            return Expr::new(ExprKind::Const(Const::Void), Ty::Never, span);
        };
        Expr::new(ExprKind::Local(self_local), f.local_ty(self_local), span)
    } else {
        lower_expr(lw, f, object, None)
    };

    if optional {
        return lower_optional_member(lw, f, base, property, span);
    }
    lower_member_of(lw, f, base, property, span)
}

/// Member read on an already-lowered base.
fn lower_member_of(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    base: Expr,
    property: Symbol,
    span: Span,
) -> Expr {
    match base.ty.clone() {
        Ty::Struct(id) => {
            let def = lw.res.ctx.struct_def(id);
            if let Some(index) = def.field_index(property) {
                let ty = def.fields[index as usize].ty.clone();
                return Expr::new(
                    ExprKind::Field {
                        base: Box::new(base),
                        index,
                    },
                    ty,
                    span,
                );
            }
            // A property with no field may be a getter.
            let class = def.name;
            let getter = ternc_tir::mangle::getter_name(class, property);
            if let Some(info) = lw.sigs.get(&getter) {
                let ret = info.sig.ret.clone();
                return Expr::new(
                    ExprKind::Call {
                        callee: Box::new(fn_ref(lw, getter, span)),
                        args: vec![base],
                    },
                    ret,
                    span,
                );
            }
            lw.error(
                DiagnosticKind::UnknownSymbol,
                span,
                format!("no field `{}` on `{}`", property, class),
            );
            Expr::new(ExprKind::Const(Const::Void), Ty::Never, span)
        }
        Ty::Union(id) => {
            let def = lw.res.ctx.union_def(id);
            if def.discriminant == Some(property) {
                // Reading the discriminant reads the tag.
                return Expr::new(ExprKind::Tag(Box::new(base)), Ty::I32, span);
            }
            lw.error(
                DiagnosticKind::TypeMismatch,
                span,
                format!(
                    "field `{}` requires narrowing `{}` to a variant first",
                    property, def.name
                ),
            );
            Expr::new(ExprKind::Const(Const::Void), Ty::Never, span)
        }
        Ty::Array(_) if property == *sym::LENGTH => {
            Expr::new(ExprKind::ArrayLen(Box::new(base)), Ty::I64, span)
        }
        Ty::Str if property == *sym::LENGTH => intrinsic_call(
            "__tern_str_len",
            vec![base],
            Ty::I64,
            span,
        ),
        other => {
            lw.error(
                DiagnosticKind::TypeMismatch,
                span,
                format!("no member `{}` on `{:?}`", property, other),
            );
            Expr::new(ExprKind::Const(Const::Void), Ty::Never, span)
        }
    }
}

/// `o?.f` → `o === null ? null : o.f`, typed `Option<typeof o.f>`.
fn lower_optional_member(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    base: Expr,
    property: Symbol,
    span: Span,
) -> Expr {
    let Ty::Option(inner) = base.ty.clone() else {
        // Plain member access on a non-optional base.
        return lower_member_of(lw, f, base, property, span);
    };

    let base_local = f.new_temp(base.ty.clone(), span);
    f.emit(Stmt::Let {
        local: base_local,
        init: Some(base),
    });
    let base_read = || Expr::new(ExprKind::Local(base_local), Ty::Option(inner.clone()), span);

    let unwrapped = Expr::new(
        ExprKind::Payload(Box::new(base_read())),
        (*inner).clone(),
        span,
    );
    let field = lower_member_of(lw, f, unwrapped, property, span);
    let result_ty = Ty::option(field.ty.clone());

    let result = f.new_temp(result_ty.clone(), span);
    f.emit(Stmt::Let {
        local: result,
        init: None,
    });
    f.emit(Stmt::If {
        cond: Expr::new(
            ExprKind::Binary {
                op: BinOp::Eq,
                left: Box::new(Expr::new(ExprKind::Tag(Box::new(base_read())), Ty::I32, span)),
                right: Box::new(Expr::int(TAG_NONE as i64, IntTy::I32, span)),
            },
            Ty::Bool,
            span,
        ),
        then_body: vec![Stmt::Assign {
            place: Place::Local(result),
            value: Expr::new(ExprKind::OptionNone, result_ty.clone(), span),
        }],
        else_body: vec![Stmt::Assign {
            place: Place::Local(result),
            value: Expr::new(
                ExprKind::OptionSome(Box::new(field)),
                result_ty.clone(),
                span,
            ),
        }],
    });
    Expr::new(ExprKind::Local(result), result_ty, span)
}

fn lower_index(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    object: &ast::Expr,
    index: &ast::Expr,
    span: Span,
) -> Expr {
    let base = lower_expr(lw, f, object, None);
    match base.ty.clone() {
        Ty::Array(element) => {
            let index = lower_expr(lw, f, index, Some(&Ty::I64));
            Expr::new(
                ExprKind::Index {
                    base: Box::new(base),
                    index: Box::new(index),
                },
                (*element).clone(),
                span,
            )
        }
        Ty::Tuple(elements) => {
            // Tuple indices are constants; project a field.
            if let ast::ExprKind::Literal(ast::Lit::Number(n)) = &index.kind {
                let i = *n as usize;
                let ty = elements.get(i).cloned().unwrap_or(Ty::Never);
                return Expr::new(
                    ExprKind::Field {
                        base: Box::new(base),
                        index: i as u32,
                    },
                    ty,
                    span,
                );
            }
            lw.error(
                DiagnosticKind::TypeMismatch,
                span,
                "tuple index must be a number literal",
            );
            Expr::new(ExprKind::Const(Const::Void), Ty::Never, span)
        }
        other => {
            lw.error(
                DiagnosticKind::TypeMismatch,
                span,
                format!("cannot index `{:?}`", other),
            );
            Expr::new(ExprKind::Const(Const::Void), Ty::Never, span)
        }
    }
}

// =============================================================================
// Calls
// =============================================================================

fn fn_ref(lw: &Lowering<'_, '_>, name: Symbol, span: Span) -> Expr {
    let ty = lw
        .sigs
        .get(&name)
        .map(|info| {
            Ty::Fn(FnTy {
                params: info.sig.params.iter().map(|p| p.ty.clone()).collect(),
                ret: Box::new(info.sig.ret.clone()),
                captures: CaptureKind::None,
            })
        })
        .unwrap_or(Ty::Never);
    Expr::new(ExprKind::Fn(name), ty, span)
}

fn intrinsic_call(name: &str, args: Vec<Expr>, ret: Ty, span: Span) -> Expr {
    let fn_ty = Ty::Fn(FnTy {
        params: args.iter().map(|a| a.ty.clone()).collect(),
        ret: Box::new(ret.clone()),
        captures: CaptureKind::None,
    });
    Expr::new(
        ExprKind::Call {
            callee: Box::new(Expr::new(ExprKind::Fn(Symbol::intern(name)), fn_ty, span)),
            args,
        },
        ret,
        span,
    )
}

fn lower_call(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    callee: &ast::Expr,
    type_args: &[ast::TypeAnn],
    args: &[ast::Expr],
    span: Span,
) -> Expr {
    // Ambient namespace calls: Math.sqrt and friends.
    if let ast::ExprKind::Member {
        object, property, ..
    } = &callee.kind
    {
        if let ast::ExprKind::Ident(obj_name) = &object.kind {
            if obj_name.as_str() == "Math"
                && (lw.scopes.resolves_to_ambient(object.id)
                    || lw.scopes.resolve(object.id).is_none())
            {
                let lowered: Vec<Expr> = args
                    .iter()
                    .map(|a| {
                        let e = lower_expr(lw, f, a, Some(&Ty::F64));
                        coerce(lw, f, e, &Ty::F64)
                    })
                    .collect();
                let name = format!("__tern_math_{}", property);
                return intrinsic_call(&name, lowered, Ty::F64, span);
            }
        }
        // Method call: obj.m(args) → C$m(obj, args).
        return lower_method_call(lw, f, callee, object, *property, args, span);
    }

    if let ast::ExprKind::Ident(name) = &callee.kind {
        // Generic function application.
        if matches!(
            lw.res.ctx.generic(*name),
            Some(ternc_tir::GenericDef::Fn(_))
        ) {
            return mono::lower_generic_call(lw, f, *name, type_args, args, span);
        }

        // Direct call of a known function.
        if lw.sigs.contains_key(name) && !is_local_value(lw, f, callee) {
            return lower_direct_call(lw, f, *name, args, span);
        }

        // Indirect call through a function-typed value.
        if let Some(local_expr) = try_local(lw, f, callee, *name) {
            return lower_indirect_call(lw, f, local_expr, args, span);
        }

        // Host-provided functions (`print`, …) become intrinsics.
        if lw.scopes.resolves_to_ambient(callee.id) || lw.scopes.resolve(callee.id).is_none() {
            let lowered: Vec<Expr> = args.iter().map(|a| lower_expr(lw, f, a, None)).collect();
            let name = format!("__tern_{}", name);
            return intrinsic_call(&name, lowered, Ty::Void, span);
        }
    }

    // Anything else: lower the callee and call through it.
    let callee_expr = lower_expr(lw, f, callee, None);
    lower_indirect_call(lw, f, callee_expr, args, span)
}

fn is_local_value(lw: &Lowering<'_, '_>, f: &FnCtx, callee: &ast::Expr) -> bool {
    if let Some(def) = lw.scopes.resolve(callee.id) {
        return f.locals_by_def.contains_key(&def);
    }
    if let ast::ExprKind::Ident(name) = &callee.kind {
        return f.locals_by_name.contains_key(name);
    }
    false
}

fn try_local(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    callee: &ast::Expr,
    name: Symbol,
) -> Option<Expr> {
    let local = lw
        .scopes
        .resolve(callee.id)
        .and_then(|def| f.locals_by_def.get(&def).copied())
        .or_else(|| f.locals_by_name.get(&name).copied())?;
    Some(Expr::new(
        ExprKind::Local(local),
        f.local_ty(local),
        callee.span,
    ))
}

pub(crate) fn lower_direct_call(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    name: Symbol,
    args: &[ast::Expr],
    span: Span,
) -> Expr {
    let info = lw.sigs.get(&name).cloned().expect("known callee");
    if info.throwing && !f.allow_throwing {
        if f.in_protected_try() {
            lw.error(
                DiagnosticKind::PropagationError,
                span,
                format!(
                    "call of throwing `{}` must be a whole statement inside `try`",
                    name
                ),
            );
        } else {
            lw.error(
                DiagnosticKind::PropagationError,
                span,
                format!("`{}` throws and is called outside `try/catch`", name),
            );
        }
    }

    let lowered = lower_args(lw, f, args, &info.sig.params, 0);
    Expr::new(
        ExprKind::Call {
            callee: Box::new(fn_ref(lw, name, span)),
            args: lowered,
        },
        info.sig.ret.clone(),
        span,
    )
}

fn lower_method_call(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    callee: &ast::Expr,
    object: &ast::Expr,
    property: Symbol,
    args: &[ast::Expr],
    span: Span,
) -> Expr {
    let base = if matches!(object.kind, ast::ExprKind::This) {
        match f.self_local {
            Some(local) => Expr::new(ExprKind::Local(local), f.local_ty(local), span),
            None => {
                lw.error(
                    DiagnosticKind::UnknownSymbol,
                    span,
                    "`this` outside a class member",
                );
                return Expr::new(ExprKind::Const(Const::Void), Ty::Never, span);
            }
        }
    } else {
        lower_expr(lw, f, object, None)
    };

    if let Ty::Struct(id) = base.ty.clone() {
        let class = lw.res.ctx.struct_def(id).name;
        let method = ternc_tir::mangle::method_name(class, property);
        if let Some(info) = lw.sigs.get(&method).cloned() {
            let mut lowered = vec![base];
            lowered.extend(lower_args(lw, f, args, &info.sig.params, 1));
            return Expr::new(
                ExprKind::Call {
                    callee: Box::new(fn_ref(lw, method, span)),
                    args: lowered,
                },
                info.sig.ret.clone(),
                span,
            );
        }
        // A function-typed field called through the object.
        let def = lw.res.ctx.struct_def(id);
        if let Some(index) = def.field_index(property) {
            let field_ty = def.fields[index as usize].ty.clone();
            let field = Expr::new(
                ExprKind::Field {
                    base: Box::new(base),
                    index,
                },
                field_ty,
                span,
            );
            return lower_indirect_call(lw, f, field, args, span);
        }
        lw.error(
            DiagnosticKind::UnknownSymbol,
            span,
            format!("no method `{}` on `{}`", property, class),
        );
        return Expr::new(ExprKind::Const(Const::Void), Ty::Never, span);
    }

    // Fall back to a plain member read and an indirect call.
    let member = lower_member_of(lw, f, base, property, callee.span);
    lower_indirect_call(lw, f, member, args, span)
}

fn lower_indirect_call(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    callee: Expr,
    args: &[ast::Expr],
    span: Span,
) -> Expr {
    let Ty::Fn(fn_ty) = callee.ty.clone() else {
        lw.error(
            DiagnosticKind::TypeMismatch,
            span,
            format!("`{:?}` is not callable", callee.ty),
        );
        return Expr::new(ExprKind::Const(Const::Void), Ty::Never, span);
    };
    let lowered: Vec<Expr> = args
        .iter()
        .zip(&fn_ty.params)
        .map(|(a, ty)| {
            let e = lower_expr(lw, f, a, Some(ty));
            coerce(lw, f, e, ty)
        })
        .collect();
    Expr::new(
        ExprKind::Call {
            callee: Box::new(callee),
            args: lowered,
        },
        (*fn_ty.ret).clone(),
        span,
    )
}

pub(crate) fn lower_args(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    args: &[ast::Expr],
    params: &[ParamSig],
    skip: usize,
) -> Vec<Expr> {
    args.iter()
        .zip(params.iter().skip(skip))
        .map(|(a, p)| {
            let e = lower_expr(lw, f, a, Some(&p.ty));
            coerce(lw, f, e, &p.ty.clone())
        })
        .collect()
}

fn lower_new(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    callee: Symbol,
    type_args: &[ast::TypeAnn],
    args: &[ast::Expr],
    span: Span,
) -> Expr {
    if matches!(
        lw.res.ctx.generic(callee),
        Some(ternc_tir::GenericDef::Class(_))
    ) {
        return mono::lower_generic_new(lw, f, callee, type_args, args, span);
    }
    let ctor = ternc_tir::mangle::ctor_name(callee);
    if lw.sigs.contains_key(&ctor) {
        return lower_direct_call(lw, f, ctor, args, span);
    }
    lw.error(
        DiagnosticKind::UnknownSymbol,
        span,
        format!("cannot find class `{}`", callee),
    );
    Expr::new(ExprKind::Const(Const::Void), Ty::Never, span)
}

// =============================================================================
// Operators
// =============================================================================

fn lower_unary(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    op: UnaryOp,
    operand: &ast::Expr,
    span: Span,
) -> Expr {
    let operand = lower_expr(lw, f, operand, None);
    match op {
        UnaryOp::Neg => {
            let ty = operand.ty.clone();
            Expr::new(
                ExprKind::Unary {
                    op: UnOp::Neg,
                    operand: Box::new(operand),
                },
                ty,
                span,
            )
        }
        UnaryOp::Not => Expr::new(
            ExprKind::Unary {
                op: UnOp::Not,
                operand: Box::new(operand),
            },
            Ty::Bool,
            span,
        ),
        // Narrowing typeof is consumed by the comparison lowering; the
        // validator rejects any other position.
        UnaryOp::TypeOf => Expr::new(ExprKind::Const(Const::Void), Ty::Never, span),
    }
}

fn lower_binary(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    op: BinaryOp,
    left: &ast::Expr,
    right: &ast::Expr,
    span: Span,
) -> Expr {
    match op {
        BinaryOp::NullishCoalesce => return lower_nullish(lw, f, left, right, span),
        BinaryOp::InstanceOf => return lower_instanceof(lw, f, left, right, span),
        BinaryOp::Eq | BinaryOp::Ne => {
            if let Some(e) = lower_special_equality(lw, f, op, left, right, span) {
                return e;
            }
        }
        _ => {}
    }

    let lhs = lower_expr(lw, f, left, None);
    let rhs = lower_expr(lw, f, right, Some(&lhs.ty));

    let ir_op = match op {
        BinaryOp::Add => BinOp::Add,
        BinaryOp::Sub => BinOp::Sub,
        BinaryOp::Mul => BinOp::Mul,
        BinaryOp::Div => BinOp::Div,
        BinaryOp::Rem => BinOp::Rem,
        BinaryOp::Pow => BinOp::Pow,
        BinaryOp::Eq => BinOp::Eq,
        BinaryOp::Ne => BinOp::Ne,
        BinaryOp::Lt => BinOp::Lt,
        BinaryOp::Le => BinOp::Le,
        BinaryOp::Gt => BinOp::Gt,
        BinaryOp::Ge => BinOp::Ge,
        BinaryOp::And => BinOp::And,
        BinaryOp::Or => BinOp::Or,
        BinaryOp::NullishCoalesce | BinaryOp::InstanceOf => unreachable!("handled above"),
    };

    // String concatenation routes through the runtime intrinsic.
    if ir_op == BinOp::Add && lhs.ty == Ty::Str {
        return intrinsic_call("__tern_str_concat", vec![lhs, rhs], Ty::Str, span);
    }

    let ty = match ir_op {
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge | BinOp::And
        | BinOp::Or => Ty::Bool,
        _ => unify_numeric(&lhs.ty, &rhs.ty),
    };
    Expr::new(
        ExprKind::Binary {
            op: ir_op,
            left: Box::new(lhs),
            right: Box::new(rhs),
        },
        ty,
        span,
    )
}

fn unify_numeric(a: &Ty, b: &Ty) -> Ty {
    if a == b {
        return a.clone();
    }
    ternc_sem::unions::widen_numeric(&[a.clone(), b.clone()])
}

/// Null tests on options and `typeof` probes on unions compare tags.
fn lower_special_equality(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    op: BinaryOp,
    left: &ast::Expr,
    right: &ast::Expr,
    span: Span,
) -> Option<Expr> {
    let ir_op = if op == BinaryOp::Eq { BinOp::Eq } else { BinOp::Ne };

    // x === null
    let (value, _null_side) = if left.kind.is_nullish_lit() {
        (right, left)
    } else if right.kind.is_nullish_lit() {
        (left, right)
    } else {
        // typeof v === "string"
        if let Some(e) = lower_typeof_probe(lw, f, ir_op, left, right, span) {
            return Some(e);
        }
        return None;
    };

    let lowered = lower_expr(lw, f, value, None);
    if !matches!(lowered.ty, Ty::Option(_)) {
        return None;
    }
    Some(Expr::new(
        ExprKind::Binary {
            op: ir_op,
            left: Box::new(Expr::new(ExprKind::Tag(Box::new(lowered)), Ty::I32, span)),
            right: Box::new(Expr::int(TAG_NONE as i64, IntTy::I32, span)),
        },
        Ty::Bool,
        span,
    ))
}

/// `typeof v === "string"` on an auto-tagged union compares against the tag
/// of the Str variant; "number" matches the Float64 variant only.
fn lower_typeof_probe(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    ir_op: BinOp,
    left: &ast::Expr,
    right: &ast::Expr,
    span: Span,
) -> Option<Expr> {
    let (typeof_expr, probe) = if matches!(
        left.kind,
        ast::ExprKind::Unary {
            op: UnaryOp::TypeOf,
            ..
        }
    ) {
        (left, right)
    } else if matches!(
        right.kind,
        ast::ExprKind::Unary {
            op: UnaryOp::TypeOf,
            ..
        }
    ) {
        (right, left)
    } else {
        return None;
    };

    let ast::ExprKind::Unary { operand, .. } = &typeof_expr.kind else {
        return None;
    };
    let probe_value = probe.kind.as_string_lit()?;
    let value = lower_expr(lw, f, operand, None);
    let Ty::Union(id) = value.ty.clone() else {
        return None;
    };

    let wanted = match probe_value.as_str() {
        "string" => Ty::Str,
        "number" => Ty::F64,
        "boolean" => Ty::Bool,
        _ => {
            lw.error(
                DiagnosticKind::TypeMismatch,
                span,
                format!("`typeof` cannot probe for \"{}\"", probe_value),
            );
            return Some(Expr::bool(false, span));
        }
    };
    let def = lw.res.ctx.union_def(id);
    let Some(variant) = def.variant_for_payload(&wanted) else {
        lw.error(
            DiagnosticKind::TypeMismatch,
            span,
            format!("`{}` has no \"{}\" variant", def.name, probe_value),
        );
        return Some(Expr::bool(false, span));
    };
    let tag = variant.tag;
    Some(Expr::new(
        ExprKind::Binary {
            op: ir_op,
            left: Box::new(Expr::new(ExprKind::Tag(Box::new(value)), Ty::I32, span)),
            right: Box::new(Expr::int(tag as i64, IntTy::I32, span)),
        },
        Ty::Bool,
        span,
    ))
}

/// `v instanceof C` → tag equality against C's variant.
fn lower_instanceof(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    left: &ast::Expr,
    right: &ast::Expr,
    span: Span,
) -> Expr {
    let value = lower_expr(lw, f, left, None);
    let Ty::Union(id) = value.ty.clone() else {
        lw.error(
            DiagnosticKind::TypeMismatch,
            span,
            "`instanceof` requires a union-typed value",
        );
        return Expr::bool(false, span);
    };
    let ast::ExprKind::Ident(class) = &right.kind else {
        lw.error(
            DiagnosticKind::TypeMismatch,
            span,
            "`instanceof` requires a named type",
        );
        return Expr::bool(false, span);
    };

    let def = lw.res.ctx.union_def(id);
    let variant = def.variants.iter().find(|v| match &v.payload {
        Ty::Struct(sid) => lw.res.ctx.struct_def(*sid).name == *class,
        _ => false,
    });
    let Some(variant) = variant else {
        lw.error(
            DiagnosticKind::TypeMismatch,
            span,
            format!("`{}` is not a variant of `{}`", class, def.name),
        );
        return Expr::bool(false, span);
    };
    let tag = variant.tag;
    Expr::new(
        ExprKind::Binary {
            op: BinOp::Eq,
            left: Box::new(Expr::new(ExprKind::Tag(Box::new(value)), Ty::I32, span)),
            right: Box::new(Expr::int(tag as i64, IntTy::I32, span)),
        },
        Ty::Bool,
        span,
    )
}

/// `a ?? b` → `a === null ? b : a`.
fn lower_nullish(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    left: &ast::Expr,
    right: &ast::Expr,
    span: Span,
) -> Expr {
    let lhs = lower_expr(lw, f, left, None);
    let Ty::Option(inner) = lhs.ty.clone() else {
        // Non-optional left side: `??` is the identity.
        return lhs;
    };

    let lhs_local = f.new_temp(lhs.ty.clone(), span);
    f.emit(Stmt::Let {
        local: lhs_local,
        init: Some(lhs),
    });
    let lhs_read = || {
        Expr::new(
            ExprKind::Local(lhs_local),
            Ty::Option(inner.clone()),
            span,
        )
    };

    let rhs = lower_expr(lw, f, right, Some(&inner));
    let rhs = coerce(lw, f, rhs, &inner);

    let result = f.new_temp((*inner).clone(), span);
    f.emit(Stmt::Let {
        local: result,
        init: None,
    });
    f.emit(Stmt::If {
        cond: Expr::new(
            ExprKind::Binary {
                op: BinOp::Eq,
                left: Box::new(Expr::new(ExprKind::Tag(Box::new(lhs_read())), Ty::I32, span)),
                right: Box::new(Expr::int(TAG_NONE as i64, IntTy::I32, span)),
            },
            Ty::Bool,
            span,
        ),
        then_body: vec![Stmt::Assign {
            place: Place::Local(result),
            value: rhs,
        }],
        else_body: vec![Stmt::Assign {
            place: Place::Local(result),
            value: Expr::new(
                ExprKind::Payload(Box::new(lhs_read())),
                (*inner).clone(),
                span,
            ),
        }],
    });
    Expr::new(ExprKind::Local(result), (*inner).clone(), span)
}

// =============================================================================
// Assignment
// =============================================================================

fn lower_assign(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    op: Option<BinaryOp>,
    target: &ast::Expr,
    value: &ast::Expr,
    span: Span,
) -> Expr {
    // A property store may be a setter call.
    if let ast::ExprKind::Member {
        object, property, ..
    } = &target.kind
    {
        if op.is_none() {
            if let Some(call) = try_setter(lw, f, object, *property, value, span) {
                return call;
            }
        }
    }

    let Some((place, place_ty)) = lower_place(lw, f, target, span) else {
        return Expr::new(ExprKind::Const(Const::Void), Ty::Never, span);
    };

    let value = match op {
        // x op= e  →  x = x op e; the place is already a stable location,
        // so reading it twice evaluates nothing twice.
        Some(op) => {
            let read = place_read(&place, &place_ty, f, span);
            let rhs = lower_expr(lw, f, value, Some(&place_ty));
            let ir_op = match op {
                BinaryOp::Add => BinOp::Add,
                BinaryOp::Sub => BinOp::Sub,
                BinaryOp::Mul => BinOp::Mul,
                BinaryOp::Div => BinOp::Div,
                BinaryOp::Rem => BinOp::Rem,
                BinaryOp::Pow => BinOp::Pow,
                _ => BinOp::Add,
            };
            if ir_op == BinOp::Add && place_ty == Ty::Str {
                intrinsic_call("__tern_str_concat", vec![read, rhs], Ty::Str, span)
            } else {
                Expr::new(
                    ExprKind::Binary {
                        op: ir_op,
                        left: Box::new(read),
                        right: Box::new(rhs),
                    },
                    place_ty.clone(),
                    span,
                )
            }
        }
        None => {
            let lowered = lower_expr(lw, f, value, Some(&place_ty));
            coerce(lw, f, lowered, &place_ty)
        }
    };

    f.emit(Stmt::Assign {
        place: place.clone(),
        value,
    });
    place_read(&place, &place_ty, f, span)
}

fn try_setter(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    object: &ast::Expr,
    property: Symbol,
    value: &ast::Expr,
    span: Span,
) -> Option<Expr> {
    let base = if matches!(object.kind, ast::ExprKind::This) {
        let local = f.self_local?;
        Expr::new(ExprKind::Local(local), f.local_ty(local), span)
    } else {
        // Probe the object's type without emitting: only identifiers can be
        // setter receivers in the subset.
        if !matches!(object.kind, ast::ExprKind::Ident(_)) {
            return None;
        }
        lower_expr(lw, f, object, None)
    };
    let Ty::Struct(id) = base.ty.clone() else {
        return None;
    };
    let def = lw.res.ctx.struct_def(id);
    if def.field_index(property).is_some() {
        return None;
    }
    let setter = ternc_tir::mangle::setter_name(def.name, property);
    let info = lw.sigs.get(&setter).cloned()?;
    let value_ty = info
        .sig
        .params
        .get(1)
        .map(|p| p.ty.clone())
        .unwrap_or(Ty::Never);
    let lowered = lower_expr(lw, f, value, Some(&value_ty));
    let lowered = coerce(lw, f, lowered, &value_ty);
    Some(Expr::new(
        ExprKind::Call {
            callee: Box::new(fn_ref(lw, setter, span)),
            args: vec![base, lowered],
        },
        info.sig.ret.clone(),
        span,
    ))
}

/// Lower an lvalue to a [`Place`]. Index expressions are hoisted into
/// temporaries so reading and writing the place evaluates them once.
fn lower_place(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    target: &ast::Expr,
    span: Span,
) -> Option<(Place, Ty)> {
    match &target.kind {
        ast::ExprKind::Ident(name) => {
            let local = lw
                .scopes
                .resolve(target.id)
                .and_then(|def| f.locals_by_def.get(&def).copied())
                .or_else(|| f.locals_by_name.get(name).copied());
            let Some(local) = local else {
                lw.error(
                    DiagnosticKind::UnknownSymbol,
                    span,
                    format!("cannot assign to unknown `{}`", name),
                );
                return None;
            };
            Some((Place::Local(local), f.local_ty(local)))
        }
        ast::ExprKind::Member {
            object, property, ..
        } => {
            let (base, base_ty) = if matches!(object.kind, ast::ExprKind::This) {
                let local = f.self_local?;
                (Place::Local(local), f.local_ty(local))
            } else {
                lower_place(lw, f, object, span)?
            };
            let Ty::Struct(id) = &base_ty else {
                lw.error(
                    DiagnosticKind::TypeMismatch,
                    span,
                    "assignment target must be a struct field",
                );
                return None;
            };
            let def = lw.res.ctx.struct_def(*id);
            let Some(index) = def.field_index(*property) else {
                lw.error(
                    DiagnosticKind::UnknownSymbol,
                    span,
                    format!("no field `{}` on `{}`", property, def.name),
                );
                return None;
            };
            let field_ty = def.fields[index as usize].ty.clone();
            Some((Place::Field(Box::new(base), index), field_ty))
        }
        ast::ExprKind::Index { object, index } => {
            let (base, base_ty) = lower_place(lw, f, object, span)?;
            let Ty::Array(element) = &base_ty else {
                lw.error(
                    DiagnosticKind::TypeMismatch,
                    span,
                    "indexed assignment target must be an array",
                );
                return None;
            };
            let element_ty = (**element).clone();
            let index_expr = lower_expr(lw, f, index, Some(&Ty::I64));
            let index_expr = hoist(f, index_expr, span);
            Some((
                Place::Index(Box::new(base), Box::new(index_expr)),
                element_ty,
            ))
        }
        _ => {
            lw.error(
                DiagnosticKind::TypeMismatch,
                span,
                "expression is not assignable",
            );
            None
        }
    }
}

/// Materialize an expression into a temporary unless it is already trivial.
pub(crate) fn hoist(f: &mut FnCtx, expr: Expr, span: Span) -> Expr {
    if matches!(expr.kind, ExprKind::Const(_) | ExprKind::Local(_)) {
        return expr;
    }
    let ty = expr.ty.clone();
    let tmp = f.new_temp(ty.clone(), span);
    f.emit(Stmt::Let {
        local: tmp,
        init: Some(expr),
    });
    Expr::new(ExprKind::Local(tmp), ty, span)
}

fn place_read(place: &Place, ty: &Ty, f: &FnCtx, span: Span) -> Expr {
    fn read(place: &Place, f: &FnCtx, span: Span) -> Expr {
        match place {
            Place::Local(id) => Expr::new(ExprKind::Local(*id), f.local_ty(*id), span),
            Place::Field(base, index) => {
                let base_expr = read(base, f, span);
                Expr::new(
                    ExprKind::Field {
                        base: Box::new(base_expr),
                        index: *index,
                    },
                    Ty::Never,
                    span,
                )
            }
            Place::Index(base, index) => {
                let base_expr = read(base, f, span);
                Expr::new(
                    ExprKind::Index {
                        base: Box::new(base_expr),
                        index: index.clone(),
                    },
                    Ty::Never,
                    span,
                )
            }
        }
    }
    let mut expr = read(place, f, span);
    expr.ty = ty.clone();
    expr
}

// =============================================================================
// Conditionals
// =============================================================================

fn lower_cond(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    cond: &ast::Expr,
    then_expr: &ast::Expr,
    else_expr: &ast::Expr,
    expected: Option<&Ty>,
    span: Span,
) -> Expr {
    let cond = lower_expr(lw, f, cond, Some(&Ty::Bool));

    f.blocks.push(Vec::new());
    let then_value = lower_expr(lw, f, then_expr, expected);
    let mut then_body = f.blocks.pop().expect("cond buffer");

    let result_ty = expected.cloned().unwrap_or_else(|| then_value.ty.clone());
    let result = f.new_temp(result_ty.clone(), span);
    f.emit(Stmt::Let {
        local: result,
        init: None,
    });

    let then_value = coerce(lw, f, then_value, &result_ty);
    then_body.push(Stmt::Assign {
        place: Place::Local(result),
        value: then_value,
    });

    f.blocks.push(Vec::new());
    let else_value = lower_expr(lw, f, else_expr, Some(&result_ty));
    let else_value = coerce(lw, f, else_value, &result_ty);
    let mut else_body = f.blocks.pop().expect("cond buffer");
    else_body.push(Stmt::Assign {
        place: Place::Local(result),
        value: else_value,
    });

    f.emit(Stmt::If {
        cond,
        then_body,
        else_body,
    });
    Expr::new(ExprKind::Local(result), result_ty, span)
}

// =============================================================================
// Closures
// =============================================================================

fn lower_arrow(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    params: &[ast::Param],
    ret: Option<&ast::TypeAnn>,
    body: &ArrowBody,
    expected: Option<&Ty>,
    span: Span,
) -> Expr {
    let name = lw.next_closure_name(f.name);

    // Parameter and return types: annotations first, the expected function
    // type as fallback (annotation-free arrows in typed positions).
    let expected_fn = match expected {
        Some(Ty::Fn(fn_ty)) => Some(fn_ty.clone()),
        _ => None,
    };
    let param_sigs: Vec<ParamSig> = params
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let ty = match &p.ty {
                Some(ann) => lw.res.resolve_annotation(ann),
                None => expected_fn
                    .as_ref()
                    .and_then(|ft| ft.params.get(i).cloned())
                    .unwrap_or(Ty::Never),
            };
            ParamSig {
                name: p.binding.name,
                ty,
                mode: None,
            }
        })
        .collect();
    let declared_ret = ret
        .map(|ann| lw.res.resolve_annotation(ann))
        .or_else(|| expected_fn.as_ref().map(|ft| (*ft.ret).clone()));

    // Free variables: identifiers that resolve to the enclosing function's
    // locals.
    let captured = collect_captures(lw, f, params, body);

    // Build the closure body in its own context.
    let info = crate::SigInfo {
        sig: FnSig {
            params: param_sigs.clone(),
            ret: declared_ret.clone().unwrap_or(Ty::Void),
        },
        throwing: false,
    };
    let mut inner = FnCtx::new(name, &info);
    for sig in &param_sigs {
        let local = inner.new_local(Some(sig.name), sig.ty.clone(), span, true);
        inner.body.params.push(local);
        inner.locals_by_name.insert(sig.name, local);
    }
    // Bind parameter defs so references inside the body resolve.
    for p in params {
        if let Some(def) = lw.scopes.resolve(p.binding.id) {
            if let Some(&local) = inner.locals_by_name.get(&p.binding.name) {
                inner.locals_by_def.insert(def, local);
            }
        }
    }
    // Capture locals shadow the creator's frame inside the closure body.
    let mut capture_fields = Vec::new();
    let mut outer_captures = Vec::new();
    for (def, name_sym, outer_local) in &captured {
        let ty = f.local_ty(*outer_local);
        let local = inner.new_local(Some(*name_sym), ty.clone(), span, true);
        inner.captures.push(local);
        inner.locals_by_name.insert(*name_sym, local);
        if let Some(def) = def {
            inner.locals_by_def.insert(*def, local);
        }
        capture_fields.push(FieldDef {
            name: *name_sym,
            ty,
        });
        outer_captures.push(*outer_local);
    }

    inner.blocks.push(Vec::new());
    let ret_ty = match body {
        ArrowBody::Expr(e) => {
            let value = lower_expr(lw, &mut inner, e, declared_ret.as_ref());
            let ty = declared_ret.clone().unwrap_or_else(|| value.ty.clone());
            let value = coerce(lw, &mut inner, value, &ty);
            inner.emit(Stmt::Return(Some(value)));
            ty
        }
        ArrowBody::Block(stmts) => {
            // With no declared return type, returns coerce against nothing
            // and the type is read off the first one afterwards.
            inner.declared_ret = declared_ret.clone().unwrap_or(Ty::Never);
            for stmt in stmts {
                lower_stmt(lw, &mut inner, stmt);
            }
            declared_ret
                .clone()
                .or_else(|| first_return_ty(inner.blocks.last().expect("arrow buffer")))
                .unwrap_or(Ty::Void)
        }
    };
    let mut stmts = inner.blocks.pop().expect("arrow buffer");
    if ret_ty == Ty::Void && !matches!(stmts.last(), Some(Stmt::Return(_))) {
        stmts.push(Stmt::Return(None));
    }
    inner.body.stmts = stmts;

    let capture_kind = if captured.is_empty() {
        CaptureKind::None
    } else {
        // The ownership analyzer upgrades this to BoxedEnv if the closure
        // escapes.
        CaptureKind::ByRef
    };
    let sig = FnSig {
        params: param_sigs.clone(),
        ret: ret_ty.clone(),
    };
    lw.sigs.insert(
        name,
        crate::SigInfo {
            sig: sig.clone(),
            throwing: false,
        },
    );
    lw.res.ctx.define_fn(FnDef {
        name,
        sig,
        body: inner.body,
        throwing: false,
        capture_env: if capture_fields.is_empty() {
            None
        } else {
            Some(CaptureEnv {
                fields: capture_fields,
                boxed: false,
            })
        },
        span,
    });

    Expr::new(
        ExprKind::Closure {
            func: name,
            captures: outer_captures,
            kind: capture_kind,
        },
        Ty::Fn(FnTy {
            params: param_sigs.into_iter().map(|p| p.ty).collect(),
            ret: Box::new(ret_ty),
            captures: capture_kind,
        }),
        span,
    )
}

fn first_return_ty(stmts: &[Stmt]) -> Option<Ty> {
    for stmt in stmts {
        match stmt {
            Stmt::Return(Some(e)) => return Some(e.ty.clone()),
            Stmt::If {
                then_body,
                else_body,
                ..
            } => {
                if let Some(ty) = first_return_ty(then_body).or_else(|| first_return_ty(else_body))
                {
                    return Some(ty);
                }
            }
            Stmt::Loop { body } => {
                if let Some(ty) = first_return_ty(body) {
                    return Some(ty);
                }
            }
            _ => {}
        }
    }
    None
}

/// Identifiers inside the arrow that resolve to enclosing-function locals.
fn collect_captures(
    lw: &Lowering<'_, '_>,
    f: &FnCtx,
    params: &[ast::Param],
    body: &ArrowBody,
) -> Vec<(Option<DefId>, Symbol, LocalId)> {
    let own: FxHashSet<Symbol> = params.iter().map(|p| p.binding.name).collect();
    let mut seen: FxHashSet<Symbol> = FxHashSet::default();
    let mut captures = Vec::new();

    let mut visit = |e: &ast::Expr| {
        if let ast::ExprKind::Ident(name) = &e.kind {
            if own.contains(name) || seen.contains(name) {
                return;
            }
            let local = lw
                .scopes
                .resolve(e.id)
                .and_then(|def| f.locals_by_def.get(&def).copied())
                .or_else(|| f.locals_by_name.get(name).copied());
            if let Some(local) = local {
                seen.insert(*name);
                captures.push((lw.scopes.resolve(e.id), *name, local));
            }
        }
    };
    match body {
        ArrowBody::Expr(e) => walk_ast_exprs(e, &mut visit),
        ArrowBody::Block(stmts) => {
            for stmt in stmts {
                walk_ast_stmt(stmt, &mut visit);
            }
        }
    }
    captures
}

fn walk_ast_stmt(stmt: &ast::Stmt, visit: &mut dyn FnMut(&ast::Expr)) {
    use ast::StmtKind as S;
    match &stmt.kind {
        S::Block(inner) => inner.iter().for_each(|s| walk_ast_stmt(s, visit)),
        S::Let(decl) => {
            if let Some(init) = &decl.init {
                walk_ast_exprs(init, visit);
            }
        }
        S::ExprStmt(e) | S::Throw(e) => walk_ast_exprs(e, visit),
        S::If {
            cond,
            then_branch,
            else_branch,
        } => {
            walk_ast_exprs(cond, visit);
            walk_ast_stmt(then_branch, visit);
            if let Some(e) = else_branch {
                walk_ast_stmt(e, visit);
            }
        }
        S::While { cond, body } => {
            walk_ast_exprs(cond, visit);
            walk_ast_stmt(body, visit);
        }
        S::For {
            init,
            cond,
            update,
            body,
        } => {
            if let Some(init) = init {
                walk_ast_stmt(init, visit);
            }
            if let Some(cond) = cond {
                walk_ast_exprs(cond, visit);
            }
            if let Some(update) = update {
                walk_ast_exprs(update, visit);
            }
            walk_ast_stmt(body, visit);
        }
        S::ForOf { iter, body, .. } => {
            walk_ast_exprs(iter, visit);
            walk_ast_stmt(body, visit);
        }
        S::Switch {
            disc,
            cases,
            default,
        } => {
            walk_ast_exprs(disc, visit);
            for case in cases {
                walk_ast_exprs(&case.test, visit);
                case.body.iter().for_each(|s| walk_ast_stmt(s, visit));
            }
            if let Some(d) = default {
                d.iter().for_each(|s| walk_ast_stmt(s, visit));
            }
        }
        S::Return(e) => {
            if let Some(e) = e {
                walk_ast_exprs(e, visit);
            }
        }
        S::Try {
            block,
            catch,
            finally,
        } => {
            block.iter().for_each(|s| walk_ast_stmt(s, visit));
            if let Some(c) = catch {
                c.body.iter().for_each(|s| walk_ast_stmt(s, visit));
            }
            if let Some(fin) = finally {
                fin.iter().for_each(|s| walk_ast_stmt(s, visit));
            }
        }
        S::Break | S::Continue => {}
    }
}

fn walk_ast_exprs(expr: &ast::Expr, visit: &mut dyn FnMut(&ast::Expr)) {
    visit(expr);
    use ast::ExprKind as E;
    match &expr.kind {
        E::Literal(_) | E::Ident(_) | E::This => {}
        E::Member { object, .. } => walk_ast_exprs(object, visit),
        E::Index { object, index } => {
            walk_ast_exprs(object, visit);
            walk_ast_exprs(index, visit);
        }
        E::Call { callee, args, .. } => {
            walk_ast_exprs(callee, visit);
            args.iter().for_each(|a| walk_ast_exprs(a, visit));
        }
        E::New { args, .. } => args.iter().for_each(|a| walk_ast_exprs(a, visit)),
        E::Unary { operand, .. } => walk_ast_exprs(operand, visit),
        E::Binary { left, right, .. } => {
            walk_ast_exprs(left, visit);
            walk_ast_exprs(right, visit);
        }
        E::Assign { target, value, .. } => {
            walk_ast_exprs(target, visit);
            walk_ast_exprs(value, visit);
        }
        E::Cond {
            cond,
            then_expr,
            else_expr,
        } => {
            walk_ast_exprs(cond, visit);
            walk_ast_exprs(then_expr, visit);
            walk_ast_exprs(else_expr, visit);
        }
        E::Arrow { body, .. } => match body {
            ArrowBody::Expr(e) => walk_ast_exprs(e, visit),
            ArrowBody::Block(stmts) => stmts.iter().for_each(|s| walk_ast_stmt(s, visit)),
        },
        E::Template { parts, .. } => parts.iter().for_each(|(e, _)| walk_ast_exprs(e, visit)),
        E::ObjectLit { fields } => fields.iter().for_each(|fld| walk_ast_exprs(&fld.value, visit)),
        E::ArrayLit { elements } => elements.iter().for_each(|el| match el {
            ArrayElement::Item(e) | ArrayElement::Spread(e) => walk_ast_exprs(e, visit),
        }),
    }
}

// =============================================================================
// Templates, object and array literals
// =============================================================================

/// Template literals concatenate string fragments; numeric interpolations go
/// through the formatting intrinsics.
fn lower_template(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    head: Symbol,
    parts: &[(ast::Expr, Symbol)],
    span: Span,
) -> Expr {
    let mut acc = Expr::new(ExprKind::Const(Const::Str(head)), Ty::Str, span);
    for (interp, tail) in parts {
        let value = lower_expr(lw, f, interp, None);
        let formatted = match &value.ty {
            Ty::Str => value,
            Ty::Int(_) | Ty::Bool => intrinsic_call("__tern_fmt_int", vec![value], Ty::Str, span),
            Ty::Float(_) => intrinsic_call("__tern_fmt_float", vec![value], Ty::Str, span),
            other => {
                lw.error(
                    DiagnosticKind::TypeMismatch,
                    span,
                    format!("cannot interpolate `{:?}` into a template", other),
                );
                Expr::new(ExprKind::Const(Const::Str(Symbol::intern(""))), Ty::Str, span)
            }
        };
        acc = intrinsic_call("__tern_str_concat", vec![acc, formatted], Ty::Str, span);
        if !tail.as_str().is_empty() {
            let lit = Expr::new(ExprKind::Const(Const::Str(*tail)), Ty::Str, span);
            acc = intrinsic_call("__tern_str_concat", vec![acc, lit], Ty::Str, span);
        }
    }
    acc
}

fn lower_object_lit(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    fields: &[ast::ObjectLitField],
    expected: Option<&Ty>,
    span: Span,
) -> Expr {
    // A literal in union position builds the variant its discriminant names.
    if let Some(Ty::Union(id)) = expected {
        let def = lw.res.ctx.union_def(*id).clone();
        if let Some(disc_field) = def.discriminant {
            let value = fields.iter().find_map(|fld| match (&fld.key, &fld.value.kind) {
                (ast::ObjectKey::Ident(k), ast::ExprKind::Literal(ast::Lit::String(v)))
                    if *k == disc_field =>
                {
                    Some(*v)
                }
                _ => None,
            });
            if let Some(value) = value {
                if let Some(variant) = def.variant_for_discriminant(value) {
                    let tag = variant.tag;
                    let payload_ty = variant.payload.clone();
                    let rest: Vec<ast::ObjectLitField> = fields
                        .iter()
                        .filter(|fld| !matches!(&fld.key, ast::ObjectKey::Ident(k) if *k == disc_field))
                        .cloned()
                        .collect();
                    let payload = lower_object_lit(lw, f, &rest, Some(&payload_ty), span);
                    return Expr::new(
                        ExprKind::UnionLit {
                            def: *id,
                            tag,
                            payload: Some(Box::new(payload)),
                        },
                        Ty::Union(*id),
                        span,
                    );
                }
            }
        }
    }

    // Against a known struct: fields coerce in the definition's order.
    if let Some(Ty::Struct(id)) = expected {
        let def = lw.res.ctx.struct_def(*id).clone();
        let mut values = Vec::new();
        for field_def in &def.fields {
            let provided = fields.iter().find(|fld| {
                matches!(&fld.key, ast::ObjectKey::Ident(k) | ast::ObjectKey::String(k)
                    if *k == field_def.name)
            });
            match provided {
                Some(fld) => {
                    let value = lower_expr(lw, f, &fld.value, Some(&field_def.ty));
                    values.push(coerce(lw, f, value, &field_def.ty));
                }
                None => {
                    lw.error(
                        DiagnosticKind::TypeMismatch,
                        span,
                        format!("missing field `{}` in `{}` literal", field_def.name, def.name),
                    );
                    values.push(Expr::new(ExprKind::Const(Const::Void), Ty::Never, span));
                }
            }
        }
        return alloc_expr(
            Expr::new(
                ExprKind::StructLit {
                    def: *id,
                    fields: values,
                },
                Ty::Struct(*id),
                span,
            ),
            span,
        );
    }

    // Free-standing literal: the shape is its own type.
    let mut field_defs = Vec::new();
    let mut values = Vec::new();
    for fld in fields {
        let name = match &fld.key {
            ast::ObjectKey::Ident(k) | ast::ObjectKey::String(k) => *k,
            // Rejected by the validator; skip for recovery.
            ast::ObjectKey::Computed(_) => continue,
        };
        let value = lower_expr(lw, f, &fld.value, None);
        field_defs.push(FieldDef {
            name,
            ty: value.ty.clone(),
        });
        values.push(value);
    }
    let id = ternc_sem::structural::intern_shape(lw.res, field_defs, ternc_sem::NameHint::Anonymous);
    alloc_expr(
        Expr::new(
            ExprKind::StructLit { def: id, fields: values },
            Ty::Struct(id),
            span,
        ),
        span,
    )
}

fn lower_array_lit(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    elements: &[ArrayElement],
    expected: Option<&Ty>,
    span: Span,
) -> Expr {
    let expected_element = match expected {
        Some(Ty::Array(e)) => Some((**e).clone()),
        _ => None,
    };

    let has_spread = elements
        .iter()
        .any(|e| matches!(e, ArrayElement::Spread(_)));
    if !has_spread {
        let mut values = Vec::new();
        for element in elements {
            let ArrayElement::Item(e) = element else { unreachable!() };
            let value = lower_expr(lw, f, e, expected_element.as_ref());
            let value = match &expected_element {
                Some(ty) => coerce(lw, f, value, ty),
                None => value,
            };
            values.push(value);
        }
        let element_ty = expected_element
            .or_else(|| values.first().map(|v| v.ty.clone()))
            .unwrap_or(Ty::Never);
        return alloc_expr(
            Expr::new(
                ExprKind::ArrayLit(values),
                Ty::array(element_ty),
                span,
            ),
            span,
        );
    }

    // Spread form: build empty, then push items and copy ranges.
    // [a, ...xs, b]  →  t = []; push(t, a); loop over xs pushing; push(t, b)
    let element_ty = expected_element
        .or_else(|| {
            elements.iter().find_map(|e| match e {
                ArrayElement::Item(item) => {
                    // Probe the first plain item's type without emitting twice:
                    // literals are the common case and are side-effect free.
                    match &item.kind {
                        ast::ExprKind::Literal(ast::Lit::Number(_)) => Some(Ty::F64),
                        ast::ExprKind::Literal(ast::Lit::String(_)) => Some(Ty::Str),
                        ast::ExprKind::Literal(ast::Lit::Bool(_)) => Some(Ty::Bool),
                        _ => None,
                    }
                }
                _ => None,
            })
        })
        .unwrap_or(Ty::F64);
    let arr_ty = Ty::array(element_ty.clone());

    let arr = f.new_temp(arr_ty.clone(), span);
    f.emit(Stmt::Let {
        local: arr,
        init: Some(alloc_expr(
            Expr::new(ExprKind::ArrayLit(vec![]), arr_ty.clone(), span),
            span,
        )),
    });
    let arr_read = || Expr::new(ExprKind::Local(arr), arr_ty.clone(), span);

    for element in elements {
        match element {
            ArrayElement::Item(e) => {
                let value = lower_expr(lw, f, e, Some(&element_ty));
                let value = coerce(lw, f, value, &element_ty);
                let push = intrinsic_call(
                    "__tern_array_push",
                    vec![arr_read(), value],
                    Ty::Void,
                    span,
                );
                f.emit(Stmt::Expr(push));
            }
            ArrayElement::Spread(source) => {
                let source = lower_expr(lw, f, source, Some(&arr_ty));
                let source_local = f.new_temp(source.ty.clone(), span);
                let source_ty = source.ty.clone();
                f.emit(Stmt::Let {
                    local: source_local,
                    init: Some(source),
                });
                let source_read =
                    || Expr::new(ExprKind::Local(source_local), source_ty.clone(), span);

                let i = f.new_temp(Ty::I64, span);
                f.emit(Stmt::Let {
                    local: i,
                    init: Some(Expr::int(0, IntTy::I64, span)),
                });
                let i_read = || Expr::new(ExprKind::Local(i), Ty::I64, span);

                let done = Expr::new(
                    ExprKind::Binary {
                        op: BinOp::Ge,
                        left: Box::new(i_read()),
                        right: Box::new(Expr::new(
                            ExprKind::ArrayLen(Box::new(source_read())),
                            Ty::I64,
                            span,
                        )),
                    },
                    Ty::Bool,
                    span,
                );
                let element = Expr::new(
                    ExprKind::Index {
                        base: Box::new(source_read()),
                        index: Box::new(i_read()),
                    },
                    element_ty.clone(),
                    span,
                );
                let push = intrinsic_call(
                    "__tern_array_push",
                    vec![arr_read(), element],
                    Ty::Void,
                    span,
                );
                f.emit(Stmt::Loop {
                    body: vec![
                        Stmt::If {
                            cond: done,
                            then_body: vec![Stmt::Break],
                            else_body: vec![],
                        },
                        Stmt::Expr(push),
                        Stmt::Assign {
                            place: Place::Local(i),
                            value: Expr::new(
                                ExprKind::Binary {
                                    op: BinOp::Add,
                                    left: Box::new(i_read()),
                                    right: Box::new(Expr::int(1, IntTy::I64, span)),
                                },
                                Ty::I64,
                                span,
                            ),
                        },
                    ],
                });
            }
        }
    }
    arr_read()
}

// =============================================================================
// Coercion and narrowing helpers
// =============================================================================

/// Fit an expression to an expected type, inserting Option/union injections
/// and numeric widenings. Anything else is a type mismatch.
pub(crate) fn coerce(lw: &mut Lowering<'_, '_>, f: &mut FnCtx, expr: Expr, expected: &Ty) -> Expr {
    let _ = f;
    if &expr.ty == expected || *expected == Ty::Never || expr.ty == Ty::Never {
        return expr;
    }
    match expected {
        Ty::Option(inner) => {
            if matches!(expr.kind, ExprKind::OptionNone) {
                let mut e = expr;
                e.ty = expected.clone();
                return e;
            }
            if &expr.ty == &**inner {
                let span = expr.span;
                return Expr::new(
                    ExprKind::OptionSome(Box::new(expr)),
                    expected.clone(),
                    span,
                );
            }
        }
        Ty::Union(id) => {
            let def = lw.res.ctx.union_def(*id);
            if let Some(variant) = def.variant_for_payload(&expr.ty) {
                let tag = variant.tag;
                let span = expr.span;
                return Expr::new(
                    ExprKind::UnionLit {
                        def: *id,
                        tag,
                        payload: Some(Box::new(expr)),
                    },
                    expected.clone(),
                    span,
                );
            }
        }
        Ty::Float(float) => {
            if let ExprKind::Const(Const::Int(n, _)) = &expr.kind {
                let span = expr.span;
                return Expr::new(
                    ExprKind::Const(Const::Float(*n as f64, *float)),
                    expected.clone(),
                    span,
                );
            }
        }
        Ty::Int(want) => {
            // Integer widening within a signedness keeps the value intact.
            if let Ty::Int(have) = &expr.ty {
                if have.signed == want.signed && have.width <= want.width {
                    let mut e = expr;
                    e.ty = expected.clone();
                    return e;
                }
            }
        }
        Ty::Weak(inner) => {
            // Demoting a strong reference to a weak one copies the pointer
            // and nothing else; only the type changes.
            if &expr.ty == &**inner {
                let mut e = expr;
                e.ty = expected.clone();
                return e;
            }
        }
        _ => {}
    }

    lw.error(
        DiagnosticKind::TypeMismatch,
        expr.span,
        format!("expected `{:?}`, found `{:?}`", expected, expr.ty),
    );
    expr
}

/// If `cond` is `x === null` on an Option-typed local, the definition being
/// tested (for post-divergence narrowing).
pub(crate) fn null_test_subject(
    lw: &Lowering<'_, '_>,
    f: &FnCtx,
    cond: &ast::Expr,
) -> Option<DefId> {
    let ast::ExprKind::Binary { op, left, right } = &cond.kind else {
        return None;
    };
    if *op != BinaryOp::Eq {
        return None;
    }
    let subject = if left.kind.is_nullish_lit() {
        right
    } else if right.kind.is_nullish_lit() {
        left
    } else {
        return None;
    };
    let def = lw.scopes.resolve(subject.id)?;
    let local = f.locals_by_def.get(&def)?;
    matches!(f.body.locals[*local].ty, Ty::Option(_)).then_some(def)
}

/// If `disc` reads a discriminated union's discriminant (`s.kind`), the
/// subject definition, the union, and the lowered tag read.
pub(crate) fn union_discriminant(
    lw: &mut Lowering<'_, '_>,
    f: &mut FnCtx,
    disc: &ast::Expr,
) -> Option<(Option<DefId>, UnionId, Expr)> {
    let ast::ExprKind::Member {
        object, property, ..
    } = &disc.kind
    else {
        return None;
    };
    let ast::ExprKind::Ident(_) = &object.kind else {
        return None;
    };
    let def = lw.scopes.resolve(object.id);
    let local = def
        .and_then(|d| f.locals_by_def.get(&d).copied())
        .or_else(|| match &object.kind {
            ast::ExprKind::Ident(name) => f.locals_by_name.get(name).copied(),
            _ => None,
        })?;
    let Ty::Union(id) = f.local_ty(local) else {
        return None;
    };
    let union_def = lw.res.ctx.union_def(id);
    if union_def.discriminant != Some(*property) {
        return None;
    }
    let subject = Expr::new(ExprKind::Local(local), Ty::Union(id), disc.span);
    Some((def, id, subject))
}

/// Field index and type for a destructuring read.
pub(crate) fn field_of(lw: &mut Lowering<'_, '_>, ty: &Ty, name: Symbol, span: Span) -> (u32, Ty) {
    if let Ty::Struct(id) = ty {
        let def = lw.res.ctx.struct_def(*id);
        if let Some(index) = def.field_index(name) {
            return (index, def.fields[index as usize].ty.clone());
        }
    }
    lw.error(
        DiagnosticKind::UnknownSymbol,
        span,
        format!("no field `{}` to destructure", name),
    );
    (0, Ty::Never)
}
