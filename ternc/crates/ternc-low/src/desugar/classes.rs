//! Class lowering.
//!
//! Classes are pure struct-plus-function sugar: the fields become a struct
//! (the resolver already interned it), the constructor becomes `C$new`, and
//! every method becomes a free function `C$m(self, …)`. There is no
//! inheritance and no dynamic dispatch.

use super::{declare_params, exprs, lower_stmt, FnCtx};
use crate::Lowering;
use ternc_ast::{self as ast, MethodKind};
use ternc_tir::{mangle, Expr, ExprKind, FnDef, Stmt, Ty};
use ternc_util::{DiagnosticKind, FxHashMap, Span, Symbol};

/// Lower one class under `class_name` (the mangled name for generic
/// instances). Signatures must already be collected.
pub fn lower_class(lw: &mut Lowering<'_, '_>, decl: &ast::ClassDecl, class_name: Symbol) {
    let Some(struct_id) = lw.res.ctx.struct_id_by_name(class_name) else {
        lw.error(
            DiagnosticKind::InternalError,
            decl.span,
            format!("class `{}` has no struct entry", class_name),
        );
        return;
    };
    let self_ty = Ty::Struct(struct_id);

    lower_ctor(lw, decl, class_name, &self_ty);
    for method in &decl.methods {
        let name = match method.kind {
            MethodKind::Method => mangle::method_name(class_name, method.func.name),
            MethodKind::Getter => mangle::getter_name(class_name, method.func.name),
            MethodKind::Setter => mangle::setter_name(class_name, method.func.name),
        };
        lower_method(lw, &method.func, name, &self_ty);
    }
}

/// `C$new`: allocate the struct, run field initializers, then the
/// constructor body with `this` bound, and return the instance.
fn lower_ctor(lw: &mut Lowering<'_, '_>, decl: &ast::ClassDecl, class_name: Symbol, self_ty: &Ty) {
    let name = mangle::ctor_name(class_name);
    let info = lw.sigs.get(&name).cloned().expect("ctor signature collected");

    let mut f = FnCtx::new(name, &info);
    if let Some(ctor) = &decl.ctor {
        declare_params(lw, &mut f, &ctor.params, &info.sig.params, None);
    }
    f.blocks.push(Vec::new());

    // self = alloc C { zeroes }; field initializers overwrite below.
    let Ty::Struct(struct_id) = self_ty else { unreachable!() };
    let field_count = lw.res.ctx.struct_def(*struct_id).fields.len();
    let zeroes: Vec<Expr> = (0..field_count)
        .map(|i| {
            let ty = lw.res.ctx.struct_def(*struct_id).fields[i].ty.clone();
            zero_value(&ty, decl.span)
        })
        .collect();
    let self_local = f.new_local(
        Some(*ternc_util::sym::SELF_PARAM),
        self_ty.clone(),
        decl.span,
        true,
    );
    f.self_local = Some(self_local);
    f.emit(Stmt::Let {
        local: self_local,
        init: Some(super::alloc_expr(
            Expr::new(
                ExprKind::StructLit {
                    def: *struct_id,
                    fields: zeroes,
                },
                self_ty.clone(),
                decl.span,
            ),
            decl.span,
        )),
    });

    for (i, field) in decl.fields.iter().enumerate() {
        if let Some(init) = &field.init {
            let field_ty = lw.res.ctx.struct_def(*struct_id).fields[i].ty.clone();
            let value = exprs::lower_expr(lw, &mut f, init, Some(&field_ty));
            let value = exprs::coerce(lw, &mut f, value, &field_ty);
            f.emit(Stmt::Assign {
                place: ternc_tir::Place::Field(
                    Box::new(ternc_tir::Place::Local(self_local)),
                    i as u32,
                ),
                value,
            });
        }
    }

    if let Some(ctor) = &decl.ctor {
        for stmt in &ctor.body {
            lower_stmt(lw, &mut f, stmt);
        }
    }

    let mut stmts = f.blocks.pop().expect("ctor buffer");
    stmts.push(Stmt::Return(Some(Expr::new(
        ExprKind::Local(self_local),
        self_ty.clone(),
        decl.span,
    ))));
    f.body.stmts = stmts;

    lw.res.ctx.define_fn(FnDef {
        name,
        sig: info.sig,
        body: f.body,
        throwing: info.throwing,
        capture_env: None,
        span: decl.span,
    });
}

fn lower_method(lw: &mut Lowering<'_, '_>, func: &ast::FnDecl, name: Symbol, self_ty: &Ty) {
    let info = lw.sigs.get(&name).cloned().expect("method signature collected");

    let mut f = FnCtx::new(name, &info);
    declare_params(lw, &mut f, &func.params, &info.sig.params, Some(self_ty.clone()));
    f.blocks.push(Vec::new());
    for stmt in &func.body {
        lower_stmt(lw, &mut f, stmt);
    }
    let mut stmts = f.blocks.pop().expect("method buffer");
    if f.declared_ret == Ty::Void && !matches!(stmts.last(), Some(Stmt::Return(_))) {
        stmts.push(Stmt::Return(None));
    }
    f.body.stmts = stmts;

    lw.res.ctx.define_fn(FnDef {
        name,
        sig: info.sig,
        body: f.body,
        throwing: info.throwing,
        capture_env: None,
        span: func.span,
    });
}

/// The zero value of a type, used before constructor assignments run.
pub(crate) fn zero_value(ty: &Ty, span: Span) -> Expr {
    match ty {
        Ty::Int(int) => Expr::int(0, *int, span),
        Ty::Float(float) => Expr::new(
            ExprKind::Const(ternc_tir::Const::Float(0.0, *float)),
            ty.clone(),
            span,
        ),
        Ty::Bool => Expr::bool(false, span),
        Ty::Str => Expr::new(
            ExprKind::Const(ternc_tir::Const::Str(Symbol::intern(""))),
            Ty::Str,
            span,
        ),
        Ty::Option(_) => Expr::new(ExprKind::OptionNone, ty.clone(), span),
        Ty::Array(_) => Expr::new(ExprKind::ArrayLit(vec![]), ty.clone(), span),
        _ => Expr::new(ExprKind::Const(ternc_tir::Const::Void), ty.clone(), span),
    }
}

/// Lower a generic class instance: the resolver has interned the struct
/// under the mangled name; the methods follow here.
pub fn lower_class_instance(
    lw: &mut Lowering<'_, '_>,
    decl: &ast::ClassDecl,
    mangled: Symbol,
    subst: &FxHashMap<Symbol, Ty>,
) {
    lw.res.push_subst(subst.clone());
    lw.collect_class_signatures(decl, mangled);
    lower_class(lw, decl, mangled);
    lw.res.pop_subst();
}
