//! ternc-sem - Type resolution.
//!
//! The second phase of the middle end. Walks every type annotation, maps it
//! to a Core IR type, and registers structs, unions, and enums in the shared
//! lowering context. Structural identity is enforced here: two object shapes
//! with the same canonical field signature resolve to the same struct entry
//! no matter where they were written.
//!
//! Generic *type* instantiation (`Pair<i32>` in annotation position) is also
//! resolved here, through the same monomorphization cache the function
//! monomorphizer uses; generic *function* instantiation lives in `ternc-low`.

pub mod enums;
pub mod structural;
pub mod unions;

pub use structural::NameHint;

use indexmap::IndexMap;
use ternc_ast::{ClassDecl, InterfaceDecl, Item, Module, TypeAliasDecl, TypeAnn, TypeAnnKind};
use ternc_tir::mangle;
use ternc_tir::{Context, FloatTy, FnTy, GenericDef, IntTy, StructId, Ty};
use ternc_util::{
    sym, DiagnosticBuilder, DiagnosticKind, FxHashMap, Handler, Span, Symbol,
};

/// Nested generic type instantiation deeper than this is assumed divergent.
pub const MAX_INSTANTIATION_DEPTH: usize = 64;

/// The type resolver. One per compilation; later phases keep using it to
/// resolve annotations they encounter (arrow parameters, generic clones).
pub struct Resolver<'a> {
    pub ctx: &'a mut Context,
    handler: &'a Handler,
    /// Non-generic aliases by name
    pub(crate) aliases: IndexMap<Symbol, TypeAliasDecl>,
    /// Non-generic interfaces and classes not yet resolved to structs
    pending_shapes: IndexMap<Symbol, ShapeDecl>,
    /// Struct ids for resolved (or reserved, when self-referential) shapes
    named_structs: FxHashMap<Symbol, StructId>,
    /// Shapes currently being resolved; a back-reference to one of these
    /// reserves its id instead of recursing
    shapes_in_progress: Vec<Symbol>,
    /// Type-parameter substitutions, innermost scope last
    subst_stack: Vec<FxHashMap<Symbol, Ty>>,
    /// Aliases currently being expanded, as a cycle backstop
    in_progress: Vec<Symbol>,
    /// Generic type instantiations already resolved, by mangled name
    type_insts: FxHashMap<Symbol, Ty>,
    /// Current instantiation depth
    depth: usize,
}

/// An unresolved named object shape.
#[derive(Clone)]
enum ShapeDecl {
    Interface(InterfaceDecl),
    Class(ClassDecl),
}

impl<'a> Resolver<'a> {
    pub fn new(ctx: &'a mut Context, handler: &'a Handler) -> Self {
        Self {
            ctx,
            handler,
            aliases: IndexMap::new(),
            pending_shapes: IndexMap::new(),
            named_structs: FxHashMap::default(),
            shapes_in_progress: Vec::new(),
            subst_stack: Vec::new(),
            in_progress: Vec::new(),
            type_insts: FxHashMap::default(),
            depth: 0,
        }
    }

    fn error(&self, kind: DiagnosticKind, span: Span, message: impl Into<String>) {
        DiagnosticBuilder::error(kind, message)
            .span(span)
            .emit(self.handler);
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a module's type declarations. Collection first, then
    /// resolution in source order, so forward references within the module
    /// resolve. `skip` filters out declarations the validator rejected.
    pub fn register_module(&mut self, module: &Module, skip: &dyn Fn(ternc_ast::NodeId) -> bool) {
        for item in &module.items {
            if skip(item.node_id()) {
                continue;
            }
            match item {
                Item::TypeAlias(t) if !t.type_params.is_empty() => {
                    self.ctx.register_generic(GenericDef::Alias(t.clone()));
                }
                Item::TypeAlias(t) => {
                    self.aliases.insert(t.name, t.clone());
                }
                Item::Interface(i) if !i.type_params.is_empty() => {
                    self.ctx.register_generic(GenericDef::Interface(i.clone()));
                }
                Item::Interface(i) => {
                    self.pending_shapes
                        .insert(i.name, ShapeDecl::Interface(i.clone()));
                }
                Item::Class(c) if !c.type_params.is_empty() => {
                    self.ctx.register_generic(GenericDef::Class(c.clone()));
                }
                Item::Class(c) => {
                    self.pending_shapes.insert(c.name, ShapeDecl::Class(c.clone()));
                }
                Item::Enum(e) => enums::register_enum(self, e),
                Item::Function(_) | Item::Import(_) => {}
            }
        }

        for item in &module.items {
            if skip(item.node_id()) {
                continue;
            }
            match item {
                Item::TypeAlias(t) if t.type_params.is_empty() => {
                    self.resolve_alias(t.name, t.span);
                }
                Item::Interface(i) if i.type_params.is_empty() => {
                    self.ensure_named_struct(i.name);
                }
                Item::Class(c) if c.type_params.is_empty() => {
                    self.ensure_named_struct(c.name);
                }
                _ => {}
            }
        }
    }

    /// Resolve a pending interface/class to its struct entry, on demand.
    ///
    /// Structural identity holds for named shapes too: a shape whose
    /// canonical signature already exists aliases the earlier entry (first
    /// declared name wins). Self-referential shapes reserve their id up
    /// front instead — the resolution of their own fields hands the reserved
    /// id back through [`Resolver::resolve_named`].
    fn ensure_named_struct(&mut self, name: Symbol) -> Option<StructId> {
        if let Some(&id) = self.named_structs.get(&name) {
            return Some(id);
        }
        let decl = self.pending_shapes.get(&name).cloned()?;

        self.shapes_in_progress.push(name);
        let fields = match &decl {
            ShapeDecl::Interface(i) => structural::resolve_fields(self, &i.fields),
            ShapeDecl::Class(c) => c
                .fields
                .iter()
                .map(|field| ternc_tir::FieldDef {
                    name: field.name,
                    ty: match &field.ty {
                        Some(ann) => self.resolve_annotation(ann),
                        // The validator already rejected this; recover.
                        None => Ty::Never,
                    },
                })
                .collect(),
        };
        self.shapes_in_progress.pop();

        if let Some(&reserved) = self.named_structs.get(&name) {
            // A field referenced the shape itself; complete the entry.
            self.ctx.set_struct_fields(reserved, fields);
            return Some(reserved);
        }
        let id = match self.ctx.struct_id_by_sig(&fields) {
            Some(existing) => existing,
            None => self.ctx.intern_struct(name, fields),
        };
        self.named_structs.insert(name, id);
        Some(id)
    }

    fn resolve_alias(&mut self, name: Symbol, span: Span) -> Ty {
        if self.in_progress.contains(&name) {
            // The validator rejects strong cycles at the declaration level;
            // reaching this means one slipped through another path.
            self.error(
                DiagnosticKind::CycleError,
                span,
                format!("type alias `{}` is part of a cycle with no `Weak` edge", name),
            );
            return Ty::Never;
        }
        let Some(decl) = self.aliases.get(&name).cloned() else {
            return Ty::Never;
        };
        self.in_progress.push(name);
        let ty = self.resolve_with_hint(&decl.ty, NameHint::Declared(name));
        self.in_progress.pop();
        ty
    }

    // =========================================================================
    // Annotation resolution
    // =========================================================================

    /// Resolve an annotation with no naming context.
    pub fn resolve_annotation(&mut self, ann: &TypeAnn) -> Ty {
        self.resolve_with_hint(ann, NameHint::Anonymous)
    }

    /// Resolve an annotation, synthesizing names from `hint` where the shape
    /// is anonymous.
    pub fn resolve_with_hint(&mut self, ann: &TypeAnn, hint: NameHint) -> Ty {
        match &ann.kind {
            TypeAnnKind::Named { name, args } => self.resolve_named(*name, args, ann.span, hint),
            TypeAnnKind::Union(variants) => unions::classify_union(self, variants, ann.span, hint),
            TypeAnnKind::Object(fields) => structural::resolve_object(self, fields, hint),
            TypeAnnKind::Array(element) => Ty::array(self.resolve_annotation(element)),
            TypeAnnKind::Tuple(elements) => Ty::Tuple(
                elements
                    .iter()
                    .map(|e| self.resolve_annotation(e))
                    .collect(),
            ),
            TypeAnnKind::Fn { params, ret } => Ty::Fn(FnTy {
                params: params.iter().map(|p| self.resolve_annotation(p)).collect(),
                ret: Box::new(self.resolve_annotation(ret)),
                captures: Default::default(),
            }),
            // A lone string-literal type is a one-variant string enum.
            TypeAnnKind::StringLit(value) => {
                self.ctx.string_tag(*value);
                Ty::I32
            }
            TypeAnnKind::NumberLit(_) => Ty::F64,
            TypeAnnKind::Null | TypeAnnKind::Undefined => Ty::option(Ty::Never),
            // Rejected by the validator; recover quietly.
            TypeAnnKind::Any
            | TypeAnnKind::Unknown
            | TypeAnnKind::ObjectKeyword
            | TypeAnnKind::SymbolKeyword
            | TypeAnnKind::BigInt => Ty::Never,
        }
    }

    fn resolve_named(
        &mut self,
        name: Symbol,
        args: &[TypeAnn],
        span: Span,
        hint: NameHint,
    ) -> Ty {
        // Innermost substitution wins: a generic's `T` shadows outer names.
        for scope in self.subst_stack.iter().rev() {
            if let Some(ty) = scope.get(&name) {
                return ty.clone();
            }
        }

        if args.is_empty() {
            if let Some(ty) = primitive_ty(name) {
                return ty;
            }
        }

        if name == *sym::WEAK {
            if let [inner] = args {
                return Ty::weak(self.resolve_annotation(inner));
            }
            self.error(
                DiagnosticKind::TypeMismatch,
                span,
                "`Weak` takes exactly one type argument",
            );
            return Ty::Never;
        }
        if name == *sym::ARRAY {
            if let [element] = args {
                return Ty::array(self.resolve_annotation(element));
            }
        }

        if self.ctx.generic(name).is_some() {
            return self.instantiate_generic_type(name, args, span);
        }

        if self.aliases.contains_key(&name) {
            return self.resolve_alias(name, span);
        }
        if let Some(&id) = self.named_structs.get(&name) {
            return Ty::Struct(id);
        }
        if self.pending_shapes.contains_key(&name) {
            if self.shapes_in_progress.contains(&name) {
                // A shape referencing itself (through Weak, or the
                // validator has already complained): reserve its id.
                let id = self.ctx.reserve_struct(name);
                self.named_structs.insert(name, id);
                return Ty::Struct(id);
            }
            if let Some(id) = self.ensure_named_struct(name) {
                return Ty::Struct(id);
            }
        }
        if let Some(id) = self.ctx.union_id_by_name(name) {
            return Ty::Union(id);
        }
        if self.ctx.enum_def(name).is_some() {
            return Ty::I32;
        }
        // Keep the hint for diagnostics only; unknown names resolve nowhere.
        let _ = hint;
        self.error(
            DiagnosticKind::UnknownSymbol,
            span,
            format!("cannot find type `{}`", name),
        );
        Ty::Never
    }

    // =========================================================================
    // Generic type instantiation
    // =========================================================================

    fn instantiate_generic_type(&mut self, name: Symbol, args: &[TypeAnn], span: Span) -> Ty {
        let arg_tys: Vec<Ty> = args.iter().map(|a| self.resolve_annotation(a)).collect();
        let def = match self.ctx.generic(name) {
            Some(def) => def.clone(),
            None => return Ty::Never,
        };

        let Some(subst) = self.bind_type_params(&def, &arg_tys, span) else {
            return Ty::Never;
        };
        let bound_args: Vec<Ty> = def
            .type_params()
            .iter()
            .map(|tp| subst[&tp.name].clone())
            .collect();

        let mangled = mangle::mangle_instance(self.ctx, name, &bound_args);
        if let Some(ty) = self.type_insts.get(&mangled) {
            return ty.clone();
        }

        if self.depth >= MAX_INSTANTIATION_DEPTH {
            self.error(
                DiagnosticKind::RecursiveGenericDepth,
                span,
                format!(
                    "instantiating `{}` exceeds the nesting limit of {}",
                    name, MAX_INSTANTIATION_DEPTH
                ),
            );
            return Ty::Never;
        }

        self.depth += 1;
        self.subst_stack.push(subst);
        let ty = match &def {
            GenericDef::Alias(a) => self.resolve_with_hint(&a.ty, NameHint::Declared(mangled)),
            GenericDef::Interface(i) => {
                let fields = structural::resolve_fields(self, &i.fields);
                Ty::Struct(self.ctx.intern_struct(mangled, fields))
            }
            GenericDef::Class(c) => {
                let mut fields = Vec::new();
                for field in &c.fields {
                    let ty = match &field.ty {
                        Some(ann) => self.resolve_annotation(ann),
                        None => Ty::Never,
                    };
                    fields.push(ternc_tir::FieldDef {
                        name: field.name,
                        ty,
                    });
                }
                Ty::Struct(self.ctx.intern_struct(mangled, fields))
            }
            GenericDef::Fn(_) => {
                self.error(
                    DiagnosticKind::TypeMismatch,
                    span,
                    format!("`{}` is a function, not a type", name),
                );
                Ty::Never
            }
        };
        self.subst_stack.pop();
        self.depth -= 1;

        self.type_insts.insert(mangled, ty.clone());
        self.ctx.mono_insert(name, bound_args, mangled);
        ty
    }

    /// Bind every type parameter of `def` to a concrete type: explicit
    /// arguments first, then defaults, else an `UnresolvedTypeParameter`
    /// diagnostic. Constraints are checked once bound.
    pub fn bind_type_params(
        &mut self,
        def: &GenericDef,
        args: &[Ty],
        span: Span,
    ) -> Option<FxHashMap<Symbol, Ty>> {
        let params = def.type_params();
        let mut subst: FxHashMap<Symbol, Ty> = FxHashMap::default();
        for (i, tp) in params.iter().enumerate() {
            let ty = if let Some(arg) = args.get(i) {
                arg.clone()
            } else if let Some(default) = &tp.default {
                // Defaults may mention earlier parameters.
                self.subst_stack.push(subst.clone());
                let ty = self.resolve_annotation(default);
                self.subst_stack.pop();
                ty
            } else {
                self.error(
                    DiagnosticKind::UnresolvedTypeParameter,
                    span,
                    format!(
                        "type parameter `{}` of `{}` cannot be inferred and has no default",
                        tp.name,
                        def.name()
                    ),
                );
                return None;
            };
            subst.insert(tp.name, ty);
        }

        for tp in params {
            if let Some(constraint) = &tp.constraint {
                self.subst_stack.push(subst.clone());
                let constraint_ty = self.resolve_annotation(constraint);
                self.subst_stack.pop();
                let arg = &subst[&tp.name];
                if !self.satisfies(arg, &constraint_ty) {
                    self.error(
                        DiagnosticKind::ConstraintViolation,
                        span,
                        format!(
                            "`{}` does not satisfy the `extends` constraint on `{}`",
                            mangle::segment(self.ctx, arg),
                            tp.name
                        ),
                    );
                    return None;
                }
            }
        }
        Some(subst)
    }

    /// `extends` satisfaction: structural for object constraints, membership
    /// for union constraints, equality otherwise.
    pub fn satisfies(&self, arg: &Ty, constraint: &Ty) -> bool {
        match constraint {
            Ty::Struct(want) => match arg {
                Ty::Struct(have) => {
                    let want_def = self.ctx.struct_def(*want);
                    let have_def = self.ctx.struct_def(*have);
                    want_def.fields.iter().all(|wf| {
                        have_def
                            .fields
                            .iter()
                            .any(|hf| hf.name == wf.name && hf.ty == wf.ty)
                    })
                }
                _ => false,
            },
            Ty::Union(id) => {
                let def = self.ctx.union_def(*id);
                arg == constraint || def.variants.iter().any(|v| &v.payload == arg)
            }
            _ => arg == constraint,
        }
    }

    // =========================================================================
    // Substitution scopes (used by the monomorphizer)
    // =========================================================================

    pub fn push_subst(&mut self, subst: FxHashMap<Symbol, Ty>) {
        self.subst_stack.push(subst);
    }

    pub fn pop_subst(&mut self) {
        self.subst_stack.pop();
    }

    pub fn handler(&self) -> &Handler {
        self.handler
    }
}

/// The primitive keyword mapping.
pub fn primitive_ty(name: Symbol) -> Option<Ty> {
    let ty = if name == *sym::NUMBER || name == *sym::F64 {
        Ty::F64
    } else if name == *sym::F32 {
        Ty::Float(FloatTy::F32)
    } else if name == *sym::I8 {
        Ty::Int(IntTy::I8)
    } else if name == *sym::I16 {
        Ty::Int(IntTy::I16)
    } else if name == *sym::I32 {
        Ty::Int(IntTy::I32)
    } else if name == *sym::I64 {
        Ty::Int(IntTy::I64)
    } else if name == *sym::U8 {
        Ty::Int(IntTy::U8)
    } else if name == *sym::U16 {
        Ty::Int(IntTy::U16)
    } else if name == *sym::U32 {
        Ty::Int(IntTy::U32)
    } else if name == *sym::U64 {
        Ty::Int(IntTy::U64)
    } else if name == *sym::BOOLEAN {
        Ty::Bool
    } else if name == *sym::STRING {
        Ty::Str
    } else if name == *sym::VOID {
        Ty::Void
    } else if name == *sym::NEVER {
        Ty::Never
    } else {
        return None;
    };
    Some(ty)
}

#[cfg(test)]
mod tests;
