//! Surface expressions.

use crate::{NodeId, Stmt, TypeAnn};
use ternc_util::{Span, Symbol};

/// An expression with its node identity and location.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    pub id: NodeId,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span, id: NodeId) -> Self {
        Self { kind, span, id }
    }
}

/// Kind of expression.
#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Lit),
    /// An identifier reference; resolved through the scope table by node id
    Ident(Symbol),
    /// `this` inside a class constructor or method
    This,
    /// `obj.prop` / `obj?.prop`
    Member {
        object: Box<Expr>,
        property: Symbol,
        optional: bool,
    },
    /// `obj[index]`
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    /// `f(args)`, `f<T>(args)`
    Call {
        callee: Box<Expr>,
        type_args: Vec<TypeAnn>,
        args: Vec<Expr>,
    },
    /// `new C(args)`, `new C<T>(args)`
    New {
        callee: Symbol,
        type_args: Vec<TypeAnn>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `target = value` or `target op= value`
    Assign {
        op: Option<BinaryOp>,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    /// `cond ? a : b`
    Cond {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    /// `(a: T) => expr` / `(a: T) => { … }`
    Arrow {
        params: Vec<crate::Param>,
        ret: Option<TypeAnn>,
        body: ArrowBody,
    },
    /// `` `head${e1}mid${e2}tail` ``
    Template {
        head: Symbol,
        parts: Vec<(Expr, Symbol)>,
    },
    ObjectLit {
        fields: Vec<ObjectLitField>,
    },
    ArrayLit {
        elements: Vec<ArrayElement>,
    },
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Lit {
    Number(f64),
    String(Symbol),
    Bool(bool),
    Null,
    Undefined,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    /// `typeof e` — only allowed in narrowing positions
    TypeOf,
}

/// Binary operators. `===`/`!==` are the only equality forms in the subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
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
    /// `a ?? b`
    NullishCoalesce,
    /// `v instanceof C` — only allowed on union-typed values
    InstanceOf,
}

/// Body of an arrow function.
#[derive(Debug, Clone)]
pub enum ArrowBody {
    Expr(Box<Expr>),
    Block(Vec<Stmt>),
}

/// One field of an object literal.
#[derive(Debug, Clone)]
pub struct ObjectLitField {
    pub key: ObjectKey,
    pub value: Expr,
    pub span: Span,
}

/// An object-literal key. Computed keys are rejected by the validator.
#[derive(Debug, Clone)]
pub enum ObjectKey {
    Ident(Symbol),
    String(Symbol),
    Computed(Box<Expr>),
}

/// An element of an array literal.
#[derive(Debug, Clone)]
pub enum ArrayElement {
    Item(Expr),
    /// `...xs`
    Spread(Expr),
}

impl ExprKind {
    /// The string value if this is a string literal.
    pub fn as_string_lit(&self) -> Option<Symbol> {
        match self {
            ExprKind::Literal(Lit::String(s)) => Some(*s),
            _ => None,
        }
    }

    /// True for `null` and `undefined` literals.
    pub fn is_nullish_lit(&self) -> bool {
        matches!(self, ExprKind::Literal(Lit::Null | Lit::Undefined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_string_lit() {
        let kind = ExprKind::Literal(Lit::String(Symbol::intern("circle")));
        assert_eq!(kind.as_string_lit(), Some(Symbol::intern("circle")));
        assert_eq!(ExprKind::Literal(Lit::Bool(true)).as_string_lit(), None);
    }

    #[test]
    fn test_is_nullish_lit() {
        assert!(ExprKind::Literal(Lit::Null).is_nullish_lit());
        assert!(ExprKind::Literal(Lit::Undefined).is_nullish_lit());
        assert!(!ExprKind::Literal(Lit::Number(0.0)).is_nullish_lit());
    }
}
