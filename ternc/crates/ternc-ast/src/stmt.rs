//! Surface statements and binding patterns.

use crate::{Expr, NodeId, TypeAnn};
use ternc_util::{Span, Symbol};

/// A statement with its location.
#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Kind of statement.
#[derive(Debug, Clone)]
pub enum StmtKind {
    Block(Vec<Stmt>),
    /// `let` / `const` declaration
    Let(LetStmt),
    ExprStmt(Expr),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    /// C-style `for (init; cond; update)`
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    /// `for (const x of xs)`
    ForOf {
        binding: Binding,
        iter: Expr,
        body: Box<Stmt>,
    },
    Switch {
        disc: Expr,
        cases: Vec<SwitchCase>,
        default: Option<Vec<Stmt>>,
    },
    Return(Option<Expr>),
    Throw(Expr),
    Try {
        block: Vec<Stmt>,
        catch: Option<CatchClause>,
        finally: Option<Vec<Stmt>>,
    },
    Break,
    Continue,
}

/// A `let`/`const` declaration.
#[derive(Debug, Clone)]
pub struct LetStmt {
    pub pattern: Pattern,
    pub ty: Option<TypeAnn>,
    pub init: Option<Expr>,
    /// `let` is mutable, `const` is not
    pub mutable: bool,
}

/// Destructurable binding patterns.
#[derive(Debug, Clone)]
pub enum Pattern {
    Ident(Binding),
    /// `const { x, y } = p`
    Object(Vec<ObjectPatternField>),
    /// `const [a, b] = pair` — holes allowed
    Array(Vec<Option<Binding>>),
}

/// One field of an object destructuring pattern.
#[derive(Debug, Clone)]
pub struct ObjectPatternField {
    /// Property being read
    pub key: Symbol,
    /// Name being bound (differs from `key` under renaming: `{ x: px }`)
    pub binding: Binding,
    pub span: Span,
}

/// A name introduced by a declaration, with the node id the binder resolved.
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: Symbol,
    pub id: NodeId,
    pub span: Span,
}

/// One arm of a `switch`.
#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub test: Expr,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// The `catch` clause of a `try`.
#[derive(Debug, Clone)]
pub struct CatchClause {
    pub binding: Option<Binding>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

impl Pattern {
    /// Every name this pattern binds, in source order.
    pub fn bindings(&self) -> Vec<&Binding> {
        match self {
            Pattern::Ident(b) => vec![b],
            Pattern::Object(fields) => fields.iter().map(|f| &f.binding).collect(),
            Pattern::Array(slots) => slots.iter().flatten().collect(),
        }
    }
}
