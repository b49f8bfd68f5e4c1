//! Statement and expression checks.
//!
//! The walk rejects banned host-environment calls (resolved through scope
//! information, so a user function that happens to be called `eval` is left
//! alone), prototype manipulation, computed object keys, dynamic member
//! access on shaped values, and `typeof`/`instanceof` outside narrowing
//! positions.

use crate::Validator;
use ternc_ast::{
    ArrayElement, ArrowBody, BinaryOp, Expr, ExprKind, NodeId, ObjectKey, Stmt, StmtKind, TypeAnn,
    TypeAnnKind, UnaryOp,
};

/// Ambient globals whose invocation is rejected outright.
const BANNED_CALLS: &[&str] = &["eval", "Proxy", "Reflect"];

/// `Object` statics that manipulate prototypes or property tables.
const BANNED_OBJECT_STATICS: &[&str] = &["defineProperty", "setPrototypeOf", "getPrototypeOf"];

/// Visit every `let`/`const` annotation in a body, including nested blocks.
pub(crate) fn each_let_annotation(stmts: &[Stmt], visit: &mut dyn FnMut(NodeId, &TypeAnn)) {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Let(decl) => {
                if let (ternc_ast::Pattern::Ident(binding), Some(ty)) = (&decl.pattern, &decl.ty) {
                    visit(binding.id, ty);
                }
            }
            StmtKind::Block(inner) => each_let_annotation(inner, visit),
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                each_let_annotation(std::slice::from_ref(then_branch), visit);
                if let Some(e) = else_branch {
                    each_let_annotation(std::slice::from_ref(e), visit);
                }
            }
            StmtKind::While { body, .. } | StmtKind::ForOf { body, .. } => {
                each_let_annotation(std::slice::from_ref(body), visit);
            }
            StmtKind::For { init, body, .. } => {
                if let Some(init) = init {
                    each_let_annotation(std::slice::from_ref(init), visit);
                }
                each_let_annotation(std::slice::from_ref(body), visit);
            }
            StmtKind::Switch { cases, default, .. } => {
                for case in cases {
                    each_let_annotation(&case.body, visit);
                }
                if let Some(d) = default {
                    each_let_annotation(d, visit);
                }
            }
            StmtKind::Try {
                block,
                catch,
                finally,
            } => {
                each_let_annotation(block, visit);
                if let Some(c) = catch {
                    each_let_annotation(&c.body, visit);
                }
                if let Some(f) = finally {
                    each_let_annotation(f, visit);
                }
            }
            _ => {}
        }
    }
}

pub(crate) fn check_stmts(validator: &mut Validator<'_>, stmts: &[Stmt]) {
    for stmt in stmts {
        check_stmt(validator, stmt);
    }
}

fn check_stmt(validator: &mut Validator<'_>, stmt: &Stmt) {
    match &stmt.kind {
        StmtKind::Block(inner) => check_stmts(validator, inner),
        StmtKind::Let(decl) => {
            if let Some(ty) = &decl.ty {
                validator.check_type_ann(ty);
            }
            if let Some(init) = &decl.init {
                check_expr(validator, init);
            }
        }
        StmtKind::ExprStmt(e) => check_expr(validator, e),
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            check_expr(validator, cond);
            check_stmt(validator, then_branch);
            if let Some(e) = else_branch {
                check_stmt(validator, e);
            }
        }
        StmtKind::While { cond, body } => {
            check_expr(validator, cond);
            check_stmt(validator, body);
        }
        StmtKind::For {
            init,
            cond,
            update,
            body,
        } => {
            if let Some(init) = init {
                check_stmt(validator, init);
            }
            if let Some(cond) = cond {
                check_expr(validator, cond);
            }
            if let Some(update) = update {
                check_expr(validator, update);
            }
            check_stmt(validator, body);
        }
        StmtKind::ForOf { iter, body, .. } => {
            check_expr(validator, iter);
            check_stmt(validator, body);
        }
        StmtKind::Switch {
            disc,
            cases,
            default,
        } => {
            check_expr(validator, disc);
            for case in cases {
                check_expr(validator, &case.test);
                check_stmts(validator, &case.body);
            }
            if let Some(d) = default {
                check_stmts(validator, d);
            }
        }
        StmtKind::Return(e) => {
            if let Some(e) = e {
                check_expr(validator, e);
            }
        }
        StmtKind::Throw(e) => check_expr(validator, e),
        StmtKind::Try {
            block,
            catch,
            finally,
        } => {
            check_stmts(validator, block);
            if let Some(c) = catch {
                check_stmts(validator, &c.body);
            }
            if let Some(f) = finally {
                check_stmts(validator, f);
            }
        }
        StmtKind::Break | StmtKind::Continue => {}
    }
}

fn check_expr(validator: &mut Validator<'_>, expr: &Expr) {
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Ident(_) | ExprKind::This => {}
        ExprKind::Member {
            object, property, ..
        } => {
            let prop = property.as_str();
            if prop == "__proto__" || prop == "prototype" {
                validator.reject(
                    expr.span,
                    format!("prototype manipulation via `{}` is not compilable", prop),
                );
            }
            check_expr(validator, object);
        }
        ExprKind::Index { object, index } => {
            check_index(validator, expr, object, index);
            check_expr(validator, object);
            check_expr(validator, index);
        }
        ExprKind::Call { callee, args, .. } => {
            check_callee(validator, callee);
            check_expr(validator, callee);
            for arg in args {
                check_expr(validator, arg);
            }
        }
        ExprKind::New { callee, args, .. } => {
            let name = callee.as_str();
            if BANNED_CALLS.contains(&name)
                && (validator.scopes().resolves_to_ambient(expr.id)
                    || validator.scopes().resolve(expr.id).is_none())
            {
                validator.reject(expr.span, format!("`new {}` is not compilable", name));
            }
            for arg in args {
                check_expr(validator, arg);
            }
        }
        ExprKind::Unary { op, operand } => {
            if *op == UnaryOp::TypeOf {
                // A typeof that survived to here is not part of a narrowing
                // comparison; those are consumed by the Binary arm below.
                validator.reject(
                    expr.span,
                    "`typeof` is only compilable when comparing a union value against a literal",
                );
            }
            check_expr(validator, operand);
        }
        ExprKind::Binary { op, left, right } => {
            if *op == BinaryOp::InstanceOf {
                check_instanceof(validator, expr, left, right);
                return;
            }
            if matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
                if let Some((typeof_expr, other)) = typeof_side(left, right) {
                    check_typeof_narrowing(validator, typeof_expr, other);
                    return;
                }
            }
            check_expr(validator, left);
            check_expr(validator, right);
        }
        ExprKind::Assign { target, value, .. } => {
            check_expr(validator, target);
            check_expr(validator, value);
        }
        ExprKind::Cond {
            cond,
            then_expr,
            else_expr,
        } => {
            check_expr(validator, cond);
            check_expr(validator, then_expr);
            check_expr(validator, else_expr);
        }
        ExprKind::Arrow { params, ret, body } => {
            for param in params {
                match &param.ty {
                    // Arrow return types may be inferred; parameter types may not.
                    None => validator.reject(
                        param.span,
                        format!("parameter `{}` has no type annotation", param.binding.name),
                    ),
                    Some(ty) => validator.check_type_ann(ty),
                }
            }
            if let Some(ret) = ret {
                validator.check_type_ann(ret);
            }
            match body {
                ArrowBody::Expr(e) => check_expr(validator, e),
                ArrowBody::Block(stmts) => check_stmts(validator, stmts),
            }
        }
        ExprKind::Template { parts, .. } => {
            for (e, _) in parts {
                check_expr(validator, e);
            }
        }
        ExprKind::ObjectLit { fields } => {
            for field in fields {
                if let ObjectKey::Computed(key) = &field.key {
                    validator.reject(
                        field.span,
                        "object-literal keys must be identifiers or string literals",
                    );
                    check_expr(validator, key);
                }
                check_expr(validator, &field.value);
            }
        }
        ExprKind::ArrayLit { elements } => {
            for element in elements {
                match element {
                    ArrayElement::Item(e) | ArrayElement::Spread(e) => check_expr(validator, e),
                }
            }
        }
    }
}

/// Reject calls whose callee resolves to a banned ambient global.
fn check_callee(validator: &mut Validator<'_>, callee: &Expr) {
    match &callee.kind {
        ExprKind::Ident(name) => {
            if BANNED_CALLS.contains(&name.as_str())
                && validator.scopes().resolves_to_ambient(callee.id)
            {
                validator.reject(
                    callee.span,
                    format!("calling `{}` is not compilable", name),
                );
            }
        }
        ExprKind::Member {
            object, property, ..
        } => {
            if let ExprKind::Ident(obj_name) = &object.kind {
                let is_object_static = obj_name.as_str() == "Object"
                    && BANNED_OBJECT_STATICS.contains(&property.as_str());
                let is_reflect = obj_name.as_str() == "Reflect";
                if (is_object_static || is_reflect)
                    && validator.scopes().resolves_to_ambient(object.id)
                {
                    validator.reject(
                        callee.span,
                        format!("`{}.{}` is not compilable", obj_name, property),
                    );
                }
            }
        }
        _ => {}
    }
}

/// Dynamic member access: a non-literal key is only compilable on values
/// whose shape permits it (arrays, tuples, strings). Enum objects reject all
/// indexing — that is the reverse-map lookup.
fn check_index(validator: &mut Validator<'_>, whole: &Expr, object: &Expr, index: &Expr) {
    if let ExprKind::Ident(name) = &object.kind {
        let is_enum = validator
            .scopes()
            .resolve(object.id)
            .map(|d| validator.scopes().def(d).kind == ternc_ast::DefKind::Enum)
            .unwrap_or_else(|| validator.is_enum_name(*name));
        if is_enum {
            validator.reject(
                whole.span,
                format!("reverse enum lookup on `{}` is not compilable", name),
            );
            return;
        }
    }
    let key_is_literal = matches!(
        index.kind,
        ExprKind::Literal(ternc_ast::Lit::Number(_)) | ExprKind::Literal(ternc_ast::Lit::String(_))
    );
    if key_is_literal {
        return;
    }
    if let ExprKind::Ident(_) = &object.kind {
        if let Some(ann) = validator.annotation_of(object.id) {
            if matches!(ann.kind, TypeAnnKind::Object(_)) {
                validator.reject(
                    whole.span,
                    "dynamic member access with a non-literal key on an object shape",
                );
            }
        }
    }
}

/// Pull out `typeof x` from either side of an equality.
fn typeof_side<'e>(left: &'e Expr, right: &'e Expr) -> Option<(&'e Expr, &'e Expr)> {
    let is_typeof = |e: &Expr| {
        matches!(
            e.kind,
            ExprKind::Unary {
                op: UnaryOp::TypeOf,
                ..
            }
        )
    };
    if is_typeof(left) {
        Some((left, right))
    } else if is_typeof(right) {
        Some((right, left))
    } else {
        None
    }
}

/// `typeof v === "string"` is compilable only when `v`'s static type is a
/// union with a known variant set and the probe is a string literal.
fn check_typeof_narrowing(validator: &mut Validator<'_>, typeof_expr: &Expr, other: &Expr) {
    let ExprKind::Unary { operand, .. } = &typeof_expr.kind else {
        return;
    };
    if other.kind.as_string_lit().is_none() {
        validator.reject(
            typeof_expr.span,
            "`typeof` must be compared against a string literal",
        );
        return;
    }
    let union_typed = match &operand.kind {
        ExprKind::Ident(_) => validator
            .annotation_of(operand.id)
            .map(|ann| matches!(ann.kind, TypeAnnKind::Union(_)))
            .unwrap_or(false),
        _ => false,
    };
    if !union_typed {
        validator.reject(
            typeof_expr.span,
            "`typeof` on a value whose static type is not a union",
        );
    }
}

/// `v instanceof C` is compilable only when `v`'s static type is a union.
fn check_instanceof(validator: &mut Validator<'_>, whole: &Expr, left: &Expr, right: &Expr) {
    let union_typed = match &left.kind {
        ExprKind::Ident(_) => validator
            .annotation_of(left.id)
            .map(|ann| matches!(ann.kind, TypeAnnKind::Union(_)))
            .unwrap_or(false),
        _ => false,
    };
    if !union_typed {
        validator.reject(
            whole.span,
            "`instanceof` on a value whose static type is not a union",
        );
    }
    if !matches!(right.kind, ExprKind::Ident(_)) {
        validator.reject(whole.span, "`instanceof` requires a named type on the right");
    }
}
