//! Core IR statement and expression forms.
//!
//! This is the reduced language the desugarer targets: sequences, ifs, bare
//! loops, match-on-tag, calls, field and index projections, and explicit
//! allocation, retain, and release. Every expression carries its resolved
//! type; a node with no type cannot be constructed.

use crate::ty::{CaptureKind, FloatTy, IntTy, StructId, Ty, UnionId};
use ternc_util::{define_idx, IndexVec, Span, Symbol};

define_idx!(
    /// Index into a function body's local table.
    LocalId
);

/// A lowered function body.
#[derive(Clone, Debug, PartialEq)]
pub struct Body {
    pub locals: IndexVec<LocalId, LocalDecl>,
    /// Locals that are the function's parameters, in order
    pub params: Vec<LocalId>,
    pub stmts: Vec<Stmt>,
}

impl Body {
    pub fn new() -> Self {
        Self {
            locals: IndexVec::new(),
            params: Vec::new(),
            stmts: Vec::new(),
        }
    }

    pub fn local(&self, id: LocalId) -> &LocalDecl {
        &self.locals[id]
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::new()
    }
}

/// A local slot: parameter, user variable, or synthesized temporary.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalDecl {
    /// Source name; `None` for temporaries
    pub name: Option<Symbol>,
    pub ty: Ty,
    pub span: Span,
    pub mutable: bool,
}

/// Ownership mode of a composite parameter, inferred by the ownership
/// analyzer. Primitive parameters pass by value; their label is advisory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamMode {
    Owned,
    Borrowed,
    BorrowedMut,
}

/// Placement of an allocation site.
///
/// The desugarer emits every site as `Unplaced`; the ownership analyzer
/// rewrites each one to `Stack` or `Heap` and nothing downstream may observe
/// an `Unplaced` site.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocPlacement {
    Unplaced,
    Stack,
    Heap { needs_refcount: bool },
}

/// A statement.
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    /// Declare (and optionally initialize) a local
    Let { local: LocalId, init: Option<Expr> },
    Assign { place: Place, value: Expr },
    Expr(Expr),
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    /// Bare loop; exits only through `Break` or `Return`
    Loop { body: Vec<Stmt> },
    Break,
    Continue,
    Return(Option<Expr>),
    /// Switch on a union/option/result tag
    Match {
        scrutinee: Expr,
        arms: Vec<MatchArm>,
        default: Option<Vec<Stmt>>,
    },
    /// Increment the refcount of a heap value
    Retain(Place),
    /// Decrement the refcount of a heap value
    Release(Place),
}

/// One arm of a tag match.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchArm {
    pub tag: u32,
    /// Local bound to the variant payload, if the arm uses it
    pub binding: Option<LocalId>,
    pub body: Vec<Stmt>,
}

/// A storable location.
#[derive(Clone, Debug, PartialEq)]
pub enum Place {
    Local(LocalId),
    Field(Box<Place>, u32),
    Index(Box<Place>, Box<Expr>),
}

impl Place {
    /// The local this place ultimately roots in.
    pub fn base_local(&self) -> LocalId {
        match self {
            Place::Local(id) => *id,
            Place::Field(base, _) => base.base_local(),
            Place::Index(base, _) => base.base_local(),
        }
    }

    /// True if the place is a bare local with no projection.
    pub fn is_local(&self) -> bool {
        matches!(self, Place::Local(_))
    }
}

/// A typed expression.
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Ty,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Ty, span: Span) -> Self {
        Self { kind, ty, span }
    }

    /// Integer constant helper, used pervasively by the desugarer.
    pub fn int(value: i64, ty: IntTy, span: Span) -> Self {
        Self::new(ExprKind::Const(Const::Int(value, ty)), Ty::Int(ty), span)
    }

    pub fn bool(value: bool, span: Span) -> Self {
        Self::new(ExprKind::Const(Const::Bool(value)), Ty::Bool, span)
    }
}

/// Kind of expression.
#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Const(Const),
    Local(LocalId),
    /// Reference to a function by mangled name
    Fn(Symbol),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    /// Field projection by index
    Field {
        base: Box<Expr>,
        index: u32,
    },
    /// Array element read
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    /// `arr.length`
    ArrayLen(Box<Expr>),
    Tuple(Vec<Expr>),
    StructLit {
        def: StructId,
        fields: Vec<Expr>,
    },
    ArrayLit(Vec<Expr>),
    UnionLit {
        def: UnionId,
        tag: u32,
        payload: Option<Box<Expr>>,
    },
    /// Read the discriminator of a union, option, or result value
    Tag(Box<Expr>),
    /// Project the payload of a tagged value; valid only under a tag guard
    Payload(Box<Expr>),
    OptionSome(Box<Expr>),
    OptionNone,
    ResultOk(Box<Expr>),
    ResultErr(Box<Expr>),
    /// Build a function value, pairing code with its environment
    Closure {
        func: Symbol,
        captures: Vec<LocalId>,
        kind: CaptureKind,
    },
    /// An allocation site; placement is decided by the ownership analyzer
    Alloc {
        placement: AllocPlacement,
        value: Box<Expr>,
    },
}

/// Constant values.
#[derive(Clone, Debug, PartialEq)]
pub enum Const {
    Int(i64, IntTy),
    Float(f64, FloatTy),
    Bool(bool),
    Str(Symbol),
    Void,
}

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

/// Walk every expression in a body, depth-first.
///
/// The visitor sees statements' expressions in source order; used by the
/// ownership analyzer and by the type-totality tests.
pub fn walk_exprs<'a>(stmts: &'a [Stmt], visit: &mut dyn FnMut(&'a Expr)) {
    for stmt in stmts {
        match stmt {
            Stmt::Let { init, .. } => {
                if let Some(e) = init {
                    walk_expr(e, visit);
                }
            }
            Stmt::Assign { place, value } => {
                walk_place_exprs(place, visit);
                walk_expr(value, visit);
            }
            Stmt::Expr(e) => walk_expr(e, visit),
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                walk_expr(cond, visit);
                walk_exprs(then_body, visit);
                walk_exprs(else_body, visit);
            }
            Stmt::Loop { body } => walk_exprs(body, visit),
            Stmt::Break | Stmt::Continue => {}
            Stmt::Return(e) => {
                if let Some(e) = e {
                    walk_expr(e, visit);
                }
            }
            Stmt::Match {
                scrutinee,
                arms,
                default,
            } => {
                walk_expr(scrutinee, visit);
                for arm in arms {
                    walk_exprs(&arm.body, visit);
                }
                if let Some(body) = default {
                    walk_exprs(body, visit);
                }
            }
            Stmt::Retain(place) | Stmt::Release(place) => walk_place_exprs(place, visit),
        }
    }
}

fn walk_place_exprs<'a>(place: &'a Place, visit: &mut dyn FnMut(&'a Expr)) {
    match place {
        Place::Local(_) => {}
        Place::Field(base, _) => walk_place_exprs(base, visit),
        Place::Index(base, index) => {
            walk_place_exprs(base, visit);
            walk_expr(index, visit);
        }
    }
}

/// Walk one expression tree, parents before children.
pub fn walk_expr<'a>(expr: &'a Expr, visit: &mut dyn FnMut(&'a Expr)) {
    visit(expr);
    match &expr.kind {
        ExprKind::Const(_)
        | ExprKind::Local(_)
        | ExprKind::Fn(_)
        | ExprKind::OptionNone
        | ExprKind::Closure { .. } => {}
        ExprKind::Call { callee, args } => {
            walk_expr(callee, visit);
            for arg in args {
                walk_expr(arg, visit);
            }
        }
        ExprKind::Binary { left, right, .. } => {
            walk_expr(left, visit);
            walk_expr(right, visit);
        }
        ExprKind::Unary { operand, .. } => walk_expr(operand, visit),
        ExprKind::Field { base, .. } => walk_expr(base, visit),
        ExprKind::Index { base, index } => {
            walk_expr(base, visit);
            walk_expr(index, visit);
        }
        ExprKind::ArrayLen(e)
        | ExprKind::Tag(e)
        | ExprKind::Payload(e)
        | ExprKind::OptionSome(e)
        | ExprKind::ResultOk(e)
        | ExprKind::ResultErr(e) => walk_expr(e, visit),
        ExprKind::Tuple(items) | ExprKind::ArrayLit(items) => {
            for item in items {
                walk_expr(item, visit);
            }
        }
        ExprKind::StructLit { fields, .. } => {
            for field in fields {
                walk_expr(field, visit);
            }
        }
        ExprKind::UnionLit { payload, .. } => {
            if let Some(p) = payload {
                walk_expr(p, visit);
            }
        }
        ExprKind::Alloc { value, .. } => walk_expr(value, visit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ternc_util::Idx;

    fn local(body: &mut Body, ty: Ty) -> LocalId {
        body.locals.push(LocalDecl {
            name: None,
            ty,
            span: Span::DUMMY,
            mutable: false,
        })
    }

    #[test]
    fn test_body_locals() {
        let mut body = Body::new();
        let a = local(&mut body, Ty::I32);
        let b = local(&mut body, Ty::Bool);
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(body.local(b).ty, Ty::Bool);
    }

    #[test]
    fn test_place_base_local() {
        let place = Place::Field(
            Box::new(Place::Field(Box::new(Place::Local(LocalId(3))), 0)),
            2,
        );
        assert_eq!(place.base_local(), LocalId(3));
        assert!(!place.is_local());
        assert!(Place::Local(LocalId(0)).is_local());
    }

    #[test]
    fn test_expr_helpers_carry_types() {
        let i = Expr::int(42, IntTy::I32, Span::DUMMY);
        assert_eq!(i.ty, Ty::I32);
        let b = Expr::bool(true, Span::DUMMY);
        assert_eq!(b.ty, Ty::Bool);
    }

    #[test]
    fn test_walk_exprs_visits_all() {
        let mut body = Body::new();
        let x = local(&mut body, Ty::I32);
        body.stmts.push(Stmt::Let {
            local: x,
            init: Some(Expr::int(1, IntTy::I32, Span::DUMMY)),
        });
        body.stmts.push(Stmt::If {
            cond: Expr::bool(true, Span::DUMMY),
            then_body: vec![Stmt::Return(Some(Expr::int(2, IntTy::I32, Span::DUMMY)))],
            else_body: vec![Stmt::Return(Some(Expr::int(3, IntTy::I32, Span::DUMMY)))],
        });

        let mut seen = 0;
        walk_exprs(&body.stmts, &mut |_| seen += 1);
        assert_eq!(seen, 4);
    }

    #[test]
    fn test_walk_expr_nested() {
        let sum = Expr::new(
            ExprKind::Binary {
                op: BinOp::Add,
                left: Box::new(Expr::int(1, IntTy::I32, Span::DUMMY)),
                right: Box::new(Expr::int(2, IntTy::I32, Span::DUMMY)),
            },
            Ty::I32,
            Span::DUMMY,
        );
        let mut seen = 0;
        walk_expr(&sum, &mut |_| seen += 1);
        assert_eq!(seen, 3);
    }
}
