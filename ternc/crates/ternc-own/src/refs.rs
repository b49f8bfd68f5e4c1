//! Reference containment.
//!
//! A value carries a reference to a local only along non-primitive paths: a
//! projected `f64` is a copy, and nothing reached through it can outlive
//! anything. Escape marking therefore prunes at primitive-typed subtrees.

use ternc_tir::{Expr, ExprKind, LocalId};

/// Visit every local from which the value may derive a *reference*.
pub(crate) fn reference_locals(expr: &Expr, visit: &mut dyn FnMut(LocalId)) {
    if expr.ty.is_primitive() {
        return;
    }
    match &expr.kind {
        ExprKind::Local(l) => visit(*l),
        ExprKind::Field { base, .. } => reference_locals(base, visit),
        ExprKind::Index { base, index } => {
            reference_locals(base, visit);
            reference_locals(index, visit);
        }
        ExprKind::Tuple(items) | ExprKind::ArrayLit(items) => {
            for item in items {
                reference_locals(item, visit);
            }
        }
        ExprKind::StructLit { fields, .. } => {
            for field in fields {
                reference_locals(field, visit);
            }
        }
        ExprKind::UnionLit { payload, .. } => {
            if let Some(p) = payload {
                reference_locals(p, visit);
            }
        }
        ExprKind::OptionSome(e)
        | ExprKind::ResultOk(e)
        | ExprKind::ResultErr(e)
        | ExprKind::Payload(e)
        | ExprKind::Alloc { value: e, .. } => reference_locals(e, visit),
        ExprKind::Closure { captures, .. } => {
            for c in captures {
                visit(*c);
            }
        }
        // A call result owns fresh storage; its arguments are handled at
        // the call site. Operators over non-primitives do not exist.
        ExprKind::Call { .. }
        | ExprKind::Binary { .. }
        | ExprKind::Unary { .. }
        | ExprKind::ArrayLen(_)
        | ExprKind::Tag(_)
        | ExprKind::Const(_)
        | ExprKind::Fn(_)
        | ExprKind::OptionNone => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ternc_tir::{Const, FloatTy, StructId, Ty};
    use ternc_util::Span;

    fn point_read(local: LocalId) -> Expr {
        Expr::new(ExprKind::Local(local), Ty::Struct(StructId(0)), Span::DUMMY)
    }

    fn collect(expr: &Expr) -> Vec<LocalId> {
        let mut out = Vec::new();
        reference_locals(expr, &mut |l| out.push(l));
        out
    }

    #[test]
    fn test_direct_local_is_a_reference() {
        assert_eq!(collect(&point_read(LocalId(3))), vec![LocalId(3)]);
    }

    #[test]
    fn test_primitive_projection_is_not() {
        // p.x : f64 — a copy, not a reference into p
        let field = Expr::new(
            ExprKind::Field {
                base: Box::new(point_read(LocalId(3))),
                index: 0,
            },
            Ty::F64,
            Span::DUMMY,
        );
        assert!(collect(&field).is_empty());
    }

    #[test]
    fn test_aggregate_wraps_references() {
        let some = Expr::new(
            ExprKind::OptionSome(Box::new(point_read(LocalId(1)))),
            Ty::option(Ty::Struct(StructId(0))),
            Span::DUMMY,
        );
        assert_eq!(collect(&some), vec![LocalId(1)]);
    }

    #[test]
    fn test_constants_carry_nothing() {
        let c = Expr::new(
            ExprKind::Const(Const::Float(1.0, FloatTy::F64)),
            Ty::F64,
            Span::DUMMY,
        );
        assert!(collect(&c).is_empty());
    }
}
