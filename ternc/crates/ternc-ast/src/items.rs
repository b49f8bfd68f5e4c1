//! Top-level declarations.

use crate::{Binding, Expr, NodeId, ObjectTypeField, Stmt, TypeAnn};
use ternc_util::{FileId, Span, Symbol};

/// One source file's declarations.
#[derive(Debug, Clone)]
pub struct Module {
    pub file: FileId,
    pub items: Vec<Item>,
}

/// A top-level declaration.
#[derive(Debug, Clone)]
pub enum Item {
    Function(FnDecl),
    Class(ClassDecl),
    Interface(InterfaceDecl),
    TypeAlias(TypeAliasDecl),
    Enum(EnumDecl),
    Import(ImportDecl),
}

impl Item {
    pub fn name(&self) -> Option<Symbol> {
        match self {
            Item::Function(f) => Some(f.name),
            Item::Class(c) => Some(c.name),
            Item::Interface(i) => Some(i.name),
            Item::TypeAlias(t) => Some(t.name),
            Item::Enum(e) => Some(e.name),
            Item::Import(_) => None,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Item::Function(f) => f.span,
            Item::Class(c) => c.span,
            Item::Interface(i) => i.span,
            Item::TypeAlias(t) => t.span,
            Item::Enum(e) => e.span,
            Item::Import(i) => i.span,
        }
    }

    pub fn node_id(&self) -> NodeId {
        match self {
            Item::Function(f) => f.id,
            Item::Class(c) => c.id,
            Item::Interface(i) => i.id,
            Item::TypeAlias(t) => t.id,
            Item::Enum(e) => e.id,
            Item::Import(i) => i.id,
        }
    }
}

/// A function declaration.
#[derive(Debug, Clone)]
pub struct FnDecl {
    pub name: Symbol,
    pub id: NodeId,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    /// `None` means the annotation is missing — the validator rejects that
    pub ret: Option<TypeAnn>,
    pub body: Vec<Stmt>,
    pub is_async: bool,
    pub is_generator: bool,
    pub exported: bool,
    pub span: Span,
}

/// A generic type parameter: `T extends Shape = Circle`.
#[derive(Debug, Clone)]
pub struct TypeParam {
    pub name: Symbol,
    pub constraint: Option<TypeAnn>,
    pub default: Option<TypeAnn>,
    pub span: Span,
}

/// A function parameter.
#[derive(Debug, Clone)]
pub struct Param {
    pub binding: Binding,
    /// `None` means untyped — the validator rejects that
    pub ty: Option<TypeAnn>,
    pub span: Span,
}

/// A class declaration.
#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: Symbol,
    pub id: NodeId,
    pub type_params: Vec<TypeParam>,
    pub fields: Vec<ClassField>,
    pub ctor: Option<Constructor>,
    pub methods: Vec<ClassMethod>,
    /// Spans of decorators, kept only so the validator can point at them
    pub decorators: Vec<Span>,
    pub exported: bool,
    pub span: Span,
}

/// A class field.
#[derive(Debug, Clone)]
pub struct ClassField {
    pub name: Symbol,
    pub ty: Option<TypeAnn>,
    pub init: Option<Expr>,
    pub span: Span,
}

/// A class constructor.
#[derive(Debug, Clone)]
pub struct Constructor {
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// A method, getter, or setter.
#[derive(Debug, Clone)]
pub struct ClassMethod {
    pub kind: MethodKind,
    pub func: FnDecl,
    pub decorators: Vec<Span>,
}

/// How a class member is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Getter,
    Setter,
}

/// An interface declaration.
#[derive(Debug, Clone)]
pub struct InterfaceDecl {
    pub name: Symbol,
    pub id: NodeId,
    pub type_params: Vec<TypeParam>,
    pub fields: Vec<ObjectTypeField>,
    pub exported: bool,
    pub span: Span,
}

/// A type alias declaration.
#[derive(Debug, Clone)]
pub struct TypeAliasDecl {
    pub name: Symbol,
    pub id: NodeId,
    pub type_params: Vec<TypeParam>,
    pub ty: TypeAnn,
    pub exported: bool,
    pub span: Span,
}

/// An enum declaration.
#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: Symbol,
    pub id: NodeId,
    pub is_const: bool,
    pub members: Vec<EnumMember>,
    pub exported: bool,
    pub span: Span,
}

/// One enum member.
#[derive(Debug, Clone)]
pub struct EnumMember {
    pub name: Symbol,
    pub init: Option<EnumInit>,
    pub span: Span,
}

/// An enum member initializer.
#[derive(Debug, Clone)]
pub enum EnumInit {
    Number(f64),
    String(Symbol),
    /// Computed initializer — rejected by the validator
    Computed(Box<Expr>),
}

/// An import declaration, already resolved by the external module resolver.
#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub id: NodeId,
    pub symbols: Vec<Symbol>,
    pub from: FileId,
    pub span: Span,
}

impl FnDecl {
    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }
}

impl ClassDecl {
    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_fn(name: &str, type_params: Vec<TypeParam>) -> FnDecl {
        FnDecl {
            name: Symbol::intern(name),
            id: NodeId(0),
            type_params,
            params: vec![],
            ret: None,
            body: vec![],
            is_async: false,
            is_generator: false,
            exported: false,
            span: Span::DUMMY,
        }
    }

    #[test]
    fn test_item_name() {
        let item = Item::Function(dummy_fn("main", vec![]));
        assert_eq!(item.name(), Some(Symbol::intern("main")));
    }

    #[test]
    fn test_is_generic() {
        assert!(!dummy_fn("plain", vec![]).is_generic());
        let tp = TypeParam {
            name: Symbol::intern("T"),
            constraint: None,
            default: None,
            span: Span::DUMMY,
        };
        assert!(dummy_fn("identity", vec![tp]).is_generic());
    }
}
