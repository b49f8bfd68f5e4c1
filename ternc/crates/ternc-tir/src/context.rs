//! The lowering context: every named-entity table the phases share.
//!
//! Types and functions are registered during type resolution and stay stable
//! afterwards; monomorphized instances are appended during monomorphization;
//! ownership labels are filled in last. The context is passed by unique
//! reference between phases and consumed by [`Context::finish`].

use crate::ir::{Body, ParamMode};
use crate::ty::{IntTy, StructId, Ty, UnionId};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use ternc_util::{IndexVec, Span, Symbol};

/// A struct field.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldDef {
    pub name: Symbol,
    pub ty: Ty,
}

/// A named (or synthesized-name) struct.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructDef {
    /// First declared name, or a synthesized one
    pub name: Symbol,
    /// Fields in source order — the canonical signature
    pub fields: Vec<FieldDef>,
}

impl StructDef {
    pub fn field_index(&self, name: Symbol) -> Option<u32> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .map(|i| i as u32)
    }

    pub fn field_ty(&self, name: Symbol) -> Option<&Ty> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.ty)
    }
}

/// One variant of a tagged union.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnionVariant {
    /// Dense, 0-based, in declaration order
    pub tag: u32,
    /// The discriminant string for discriminated unions
    pub discriminant: Option<Symbol>,
    pub payload: Ty,
}

/// A tagged union.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnionDef {
    /// Declared name, or a synthesized one for anonymous unions
    pub name: Symbol,
    pub tag_ty: IntTy,
    /// The shared discriminant field name, if this union is discriminated
    pub discriminant: Option<Symbol>,
    pub variants: Vec<UnionVariant>,
}

impl UnionDef {
    pub fn variant_by_tag(&self, tag: u32) -> Option<&UnionVariant> {
        self.variants.iter().find(|v| v.tag == tag)
    }

    /// The variant whose payload is exactly `ty`.
    pub fn variant_for_payload(&self, ty: &Ty) -> Option<&UnionVariant> {
        self.variants.iter().find(|v| &v.payload == ty)
    }

    /// The variant selected by a discriminant string.
    pub fn variant_for_discriminant(&self, value: Symbol) -> Option<&UnionVariant> {
        self.variants.iter().find(|v| v.discriminant == Some(value))
    }
}

/// One function parameter's signature entry.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamSig {
    pub name: Symbol,
    pub ty: Ty,
    /// Filled by the ownership analyzer
    pub mode: Option<ParamMode>,
}

/// A function signature.
#[derive(Clone, Debug, PartialEq)]
pub struct FnSig {
    pub params: Vec<ParamSig>,
    pub ret: Ty,
}

/// Layout of a closure's captured environment.
///
/// The closure body's capture locals directly follow its parameters, one
/// per field, in field order.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureEnv {
    pub fields: Vec<FieldDef>,
    /// True once captures are promoted to a heap capture box
    pub boxed: bool,
}

/// A fully lowered function.
#[derive(Clone, Debug, PartialEq)]
pub struct FnDef {
    /// Mangled name; also the key in the function table
    pub name: Symbol,
    pub sig: FnSig,
    pub body: Body,
    /// True if the declared return type was rewritten to `Result` by `throw`
    pub throwing: bool,
    /// Present on functions lowered from closures with captures
    pub capture_env: Option<CaptureEnv>,
    pub span: Span,
}

/// A generic definition, held as raw AST until instantiated.
#[derive(Clone, Debug)]
pub enum GenericDef {
    Fn(ternc_ast::FnDecl),
    Class(ternc_ast::ClassDecl),
    Alias(ternc_ast::TypeAliasDecl),
    Interface(ternc_ast::InterfaceDecl),
}

impl GenericDef {
    pub fn type_params(&self) -> &[ternc_ast::TypeParam] {
        match self {
            GenericDef::Fn(f) => &f.type_params,
            GenericDef::Class(c) => &c.type_params,
            GenericDef::Alias(a) => &a.type_params,
            GenericDef::Interface(i) => &i.type_params,
        }
    }

    pub fn name(&self) -> Symbol {
        match self {
            GenericDef::Fn(f) => f.name,
            GenericDef::Class(c) => c.name,
            GenericDef::Alias(a) => a.name,
            GenericDef::Interface(i) => i.name,
        }
    }
}

/// A compiled enum member value.
#[derive(Clone, Debug, PartialEq)]
pub enum EnumValue {
    Int(i32),
    /// Sequential tag; the text is retained for compile-time equality only
    Str { tag: u32, text: Symbol },
}

/// A compiled enum.
#[derive(Clone, Debug, PartialEq)]
pub struct EnumDef {
    pub name: Symbol,
    pub is_const: bool,
    /// Member name → value, in declaration order
    pub values: IndexMap<Symbol, EnumValue>,
}

/// The shared lowering context.
///
/// Tables that reach the backend are insertion-ordered so output is a pure
/// function of the input program; the signature index is the only hash map
/// and its iteration order is never observed.
#[derive(Default)]
pub struct Context {
    /// Struct table, unique by canonical field signature
    pub structs: IndexVec<StructId, StructDef>,
    struct_by_sig: FxHashMap<Vec<FieldDef>, StructId>,
    /// Union table
    pub unions: IndexVec<UnionId, UnionDef>,
    union_by_name: FxHashMap<Symbol, UnionId>,
    /// Function table, keyed by mangled name
    pub functions: IndexMap<Symbol, FnDef>,
    /// Generic definitions, keyed by base name
    pub generics: IndexMap<Symbol, GenericDef>,
    /// (base name, concrete args) → mangled instance name
    pub mono_cache: IndexMap<(Symbol, Vec<Ty>), Symbol>,
    /// Enum tables, keyed by enum name
    pub enums: IndexMap<Symbol, EnumDef>,
    /// Global string-tag table: every discriminant or string-enum literal
    /// gets one dense id, in first-seen (source) order
    tag_table: IndexMap<Symbol, u32>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Structs
    // =========================================================================

    /// Intern a struct by its canonical signature.
    ///
    /// Two shapes with identical ordered `(name, type)` fields share one
    /// entry; the name of the first registration wins.
    pub fn intern_struct(&mut self, name: Symbol, fields: Vec<FieldDef>) -> StructId {
        if let Some(&id) = self.struct_by_sig.get(&fields) {
            return id;
        }
        let id = self.structs.push(StructDef {
            name,
            fields: fields.clone(),
        });
        self.struct_by_sig.insert(fields, id);
        id
    }

    /// Reserve an id before its fields are known, for self-referential
    /// shapes broken by `Weak`.
    pub fn reserve_struct(&mut self, name: Symbol) -> StructId {
        self.structs.push(StructDef {
            name,
            fields: Vec::new(),
        })
    }

    /// Complete a reserved struct. The signature is registered only if no
    /// earlier struct claimed it.
    pub fn set_struct_fields(&mut self, id: StructId, fields: Vec<FieldDef>) {
        self.structs[id].fields = fields.clone();
        self.struct_by_sig.entry(fields).or_insert(id);
    }

    pub fn struct_def(&self, id: StructId) -> &StructDef {
        &self.structs[id]
    }

    pub fn struct_id_by_name(&self, name: Symbol) -> Option<StructId> {
        self.structs
            .iter_enumerated()
            .find(|(_, def)| def.name == name)
            .map(|(id, _)| id)
    }

    /// The id a signature would intern to, without interning it.
    pub fn struct_id_by_sig(&self, fields: &[FieldDef]) -> Option<StructId> {
        self.struct_by_sig.get(fields).copied()
    }

    // =========================================================================
    // Unions
    // =========================================================================

    pub fn register_union(&mut self, def: UnionDef) -> UnionId {
        if let Some(&id) = self.union_by_name.get(&def.name) {
            return id;
        }
        let name = def.name;
        let id = self.unions.push(def);
        self.union_by_name.insert(name, id);
        id
    }

    pub fn union_def(&self, id: UnionId) -> &UnionDef {
        &self.unions[id]
    }

    pub fn union_id_by_name(&self, name: Symbol) -> Option<UnionId> {
        self.union_by_name.get(&name).copied()
    }

    // =========================================================================
    // String tags
    // =========================================================================

    /// Dense id for a discriminant or string-enum literal; allocates on
    /// first sight, in source order.
    pub fn string_tag(&mut self, value: Symbol) -> u32 {
        if let Some(&tag) = self.tag_table.get(&value) {
            return tag;
        }
        let tag = self.tag_table.len() as u32;
        self.tag_table.insert(value, tag);
        tag
    }

    pub fn lookup_string_tag(&self, value: Symbol) -> Option<u32> {
        self.tag_table.get(&value).copied()
    }

    // =========================================================================
    // Functions and generics
    // =========================================================================

    pub fn define_fn(&mut self, def: FnDef) {
        self.functions.insert(def.name, def);
    }

    pub fn fn_def(&self, name: Symbol) -> Option<&FnDef> {
        self.functions.get(&name)
    }

    pub fn fn_sig(&self, name: Symbol) -> Option<&FnSig> {
        self.functions.get(&name).map(|f| &f.sig)
    }

    pub fn is_throwing(&self, name: Symbol) -> bool {
        self.functions.get(&name).map(|f| f.throwing).unwrap_or(false)
    }

    pub fn register_generic(&mut self, def: GenericDef) {
        self.generics.insert(def.name(), def);
    }

    pub fn generic(&self, name: Symbol) -> Option<&GenericDef> {
        self.generics.get(&name)
    }

    pub fn mono_lookup(&self, base: Symbol, args: &[Ty]) -> Option<Symbol> {
        self.mono_cache.get(&(base, args.to_vec())).copied()
    }

    pub fn mono_insert(&mut self, base: Symbol, args: Vec<Ty>, instance: Symbol) {
        self.mono_cache.insert((base, args), instance);
    }

    // =========================================================================
    // Enums
    // =========================================================================

    pub fn register_enum(&mut self, def: EnumDef) {
        self.enums.insert(def.name, def);
    }

    pub fn enum_def(&self, name: Symbol) -> Option<&EnumDef> {
        self.enums.get(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Symbol {
        Symbol::intern(s)
    }

    fn field(name: &str, ty: Ty) -> FieldDef {
        FieldDef {
            name: sym(name),
            ty,
        }
    }

    #[test]
    fn test_struct_structural_identity() {
        let mut ctx = Context::new();
        let point = ctx.intern_struct(
            sym("Point"),
            vec![field("x", Ty::F64), field("y", Ty::F64)],
        );
        let vec2 = ctx.intern_struct(
            sym("Vec2"),
            vec![field("x", Ty::F64), field("y", Ty::F64)],
        );

        // Identical signatures alias; the first declared name wins.
        assert_eq!(point, vec2);
        assert_eq!(ctx.struct_def(point).name, sym("Point"));
        assert_eq!(ctx.structs.len(), 1);
    }

    #[test]
    fn test_struct_field_order_matters() {
        let mut ctx = Context::new();
        let a = ctx.intern_struct(
            sym("A"),
            vec![field("x", Ty::F64), field("y", Ty::F64)],
        );
        let b = ctx.intern_struct(
            sym("B"),
            vec![field("y", Ty::F64), field("x", Ty::F64)],
        );
        assert_ne!(a, b);
    }

    #[test]
    fn test_struct_field_lookup() {
        let mut ctx = Context::new();
        let id = ctx.intern_struct(
            sym("Pair"),
            vec![field("first", Ty::I32), field("second", Ty::Str)],
        );
        let def = ctx.struct_def(id);
        assert_eq!(def.field_index(sym("second")), Some(1));
        assert_eq!(def.field_ty(sym("first")), Some(&Ty::I32));
        assert_eq!(def.field_index(sym("third")), None);
    }

    #[test]
    fn test_reserved_struct_backfill() {
        let mut ctx = Context::new();
        let id = ctx.reserve_struct(sym("Node"));
        // A self-referential shape must go through Weak.
        ctx.set_struct_fields(
            id,
            vec![
                field("value", Ty::I32),
                field("parent", Ty::option(Ty::weak(Ty::Struct(id)))),
            ],
        );
        assert_eq!(ctx.struct_def(id).fields.len(), 2);
        assert_eq!(ctx.struct_id_by_name(sym("Node")), Some(id));
    }

    #[test]
    fn test_union_registration() {
        let mut ctx = Context::new();
        let circle = ctx.intern_struct(sym("Shape$0"), vec![field("r", Ty::F64)]);
        let rect = ctx.intern_struct(
            sym("Shape$1"),
            vec![field("w", Ty::F64), field("h", Ty::F64)],
        );
        let id = ctx.register_union(UnionDef {
            name: sym("Shape"),
            tag_ty: IntTy::I32,
            discriminant: Some(sym("kind")),
            variants: vec![
                UnionVariant {
                    tag: 0,
                    discriminant: Some(sym("circle")),
                    payload: Ty::Struct(circle),
                },
                UnionVariant {
                    tag: 1,
                    discriminant: Some(sym("rect")),
                    payload: Ty::Struct(rect),
                },
            ],
        });

        assert_eq!(ctx.union_id_by_name(sym("Shape")), Some(id));
        let def = ctx.union_def(id);
        assert_eq!(def.variant_by_tag(1).unwrap().payload, Ty::Struct(rect));
        assert_eq!(
            def.variant_for_discriminant(sym("circle")).unwrap().tag,
            0
        );
    }

    #[test]
    fn test_string_tags_dense_in_first_seen_order() {
        let mut ctx = Context::new();
        assert_eq!(ctx.string_tag(sym("circle")), 0);
        assert_eq!(ctx.string_tag(sym("rect")), 1);
        assert_eq!(ctx.string_tag(sym("circle")), 0);
        assert_eq!(ctx.lookup_string_tag(sym("rect")), Some(1));
        assert_eq!(ctx.lookup_string_tag(sym("triangle")), None);
    }

    #[test]
    fn test_mono_cache() {
        let mut ctx = Context::new();
        assert_eq!(ctx.mono_lookup(sym("identity"), &[Ty::I32]), None);
        ctx.mono_insert(sym("identity"), vec![Ty::I32], sym("identity$Int32"));
        assert_eq!(
            ctx.mono_lookup(sym("identity"), &[Ty::I32]),
            Some(sym("identity$Int32"))
        );
        assert_eq!(ctx.mono_lookup(sym("identity"), &[Ty::I64]), None);
    }
}
