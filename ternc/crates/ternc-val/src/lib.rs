//! ternc-val - Subset validation.
//!
//! The first phase of the middle end. Walks every declaration and rejects
//! anything outside the compilable fragment of the surface language, before
//! type resolution ever runs. A rejected declaration short-circuits the later
//! phases for that declaration only; everything else continues.
//!
//! The validator consumes scope information so that references to ambient
//! globals (`eval`, `Proxy`, …) are distinguished from user definitions that
//! merely reuse the name.

mod body;
mod cycles;

use ternc_ast::{
    ClassDecl, EnumDecl, EnumInit, FnDecl, InterfaceDecl, Item, Module, NodeId, ScopeInfo,
    TypeAliasDecl, TypeAnn, TypeAnnKind,
};
use ternc_util::{
    DefId, DiagnosticBuilder, DiagnosticKind, FxHashMap, FxHashSet, Handler, Span, Symbol,
};

/// Which declarations failed validation, by node id.
///
/// The driver skips these in every later phase.
#[derive(Default)]
pub struct ValidationOutcome {
    pub rejected: FxHashSet<NodeId>,
}

impl ValidationOutcome {
    pub fn is_rejected(&self, id: NodeId) -> bool {
        self.rejected.contains(&id)
    }
}

/// Validate every module, in order.
pub fn validate_modules(
    modules: &[Module],
    scopes: &ScopeInfo,
    handler: &Handler,
) -> ValidationOutcome {
    let mut validator = Validator::new(scopes, handler);
    validator.collect_annotations(modules);

    let mut outcome = ValidationOutcome::default();
    for module in modules {
        for item in &module.items {
            let before = handler.error_count();
            validator.check_item(item);
            if handler.error_count() > before {
                outcome.rejected.insert(item.node_id());
            }
        }
    }

    for id in cycles::check_type_cycles(modules, handler) {
        outcome.rejected.insert(id);
    }
    outcome
}

pub(crate) struct Validator<'a> {
    scopes: &'a ScopeInfo,
    handler: &'a Handler,
    /// Declared annotation per binding definition, for typeof/instanceof and
    /// dynamic-index checks
    decl_annotations: FxHashMap<DefId, TypeAnn>,
    /// Names of enum declarations, for reverse-map rejection
    enum_names: FxHashSet<Symbol>,
}

impl<'a> Validator<'a> {
    fn new(scopes: &'a ScopeInfo, handler: &'a Handler) -> Self {
        Self {
            scopes,
            handler,
            decl_annotations: FxHashMap::default(),
            enum_names: FxHashSet::default(),
        }
    }

    pub(crate) fn reject(&self, span: Span, message: impl Into<String>) {
        DiagnosticBuilder::error(DiagnosticKind::UnsupportedConstruct, message)
            .span(span)
            .emit(self.handler);
    }

    /// Pre-pass: remember declared annotations of params and locals (keyed
    /// by the binding's own definition id) and the set of enum names.
    fn collect_annotations(&mut self, modules: &[Module]) {
        for module in modules {
            for item in &module.items {
                if let Item::Enum(e) = item {
                    self.enum_names.insert(e.name);
                }
                if let Item::Function(f) = item {
                    self.remember_fn_bindings(f);
                }
                if let Item::Class(c) = item {
                    if let Some(ctor) = &c.ctor {
                        self.remember_params(&ctor.params);
                    }
                    for method in &c.methods {
                        self.remember_fn_bindings(&method.func);
                    }
                }
            }
        }
    }

    fn remember_fn_bindings(&mut self, f: &FnDecl) {
        self.remember_params(&f.params);
        body::each_let_annotation(&f.body, &mut |binding_id, ann| {
            if let Some(def) = self.scopes.resolve(binding_id) {
                self.decl_annotations.insert(def, ann.clone());
            }
        });
    }

    fn remember_params(&mut self, params: &[ternc_ast::Param]) {
        for param in params {
            if let (Some(ty), Some(def)) = (&param.ty, self.scopes.resolve(param.binding.id)) {
                self.decl_annotations.insert(def, ty.clone());
            }
        }
    }

    /// The declared annotation of the definition an identifier resolves to.
    pub(crate) fn annotation_of(&self, node: NodeId) -> Option<&TypeAnn> {
        self.scopes
            .resolve(node)
            .and_then(|def| self.decl_annotations.get(&def))
    }

    pub(crate) fn scopes(&self) -> &ScopeInfo {
        self.scopes
    }

    pub(crate) fn is_enum_name(&self, name: Symbol) -> bool {
        self.enum_names.contains(&name)
    }

    // =========================================================================
    // Items
    // =========================================================================

    fn check_item(&mut self, item: &Item) {
        if let Some(name) = item.name() {
            if !name.is_mangle_safe() {
                self.reject(
                    item.span(),
                    format!("identifier `{}` contains `$`, which is reserved for mangled names", name),
                );
            }
        }
        match item {
            Item::Function(f) => self.check_fn(f, false),
            Item::Class(c) => self.check_class(c),
            Item::Interface(i) => self.check_interface(i),
            Item::TypeAlias(t) => self.check_alias(t),
            Item::Enum(e) => self.check_enum(e),
            Item::Import(_) => {}
        }
    }

    fn check_fn(&mut self, f: &FnDecl, is_accessor: bool) {
        if f.is_async {
            self.reject(
                f.span,
                format!("`async` functions are not compilable; `{}` suspends", f.name),
            );
        }
        if f.is_generator {
            self.reject(
                f.span,
                format!("generator functions are not compilable; `{}` yields", f.name),
            );
        }
        if f.ret.is_none() && !is_accessor {
            self.reject(
                f.span,
                format!("function `{}` has no explicit return type", f.name),
            );
        }
        for param in &f.params {
            match &param.ty {
                None => self.reject(
                    param.span,
                    format!("parameter `{}` has no type annotation", param.binding.name),
                ),
                Some(ty) => self.check_type_ann(ty),
            }
        }
        if let Some(ret) = &f.ret {
            self.check_type_ann(ret);
        }
        for tp in &f.type_params {
            if let Some(c) = &tp.constraint {
                self.check_type_ann(c);
            }
            if let Some(d) = &tp.default {
                self.check_type_ann(d);
            }
        }
        body::check_stmts(self, &f.body);
    }

    fn check_class(&mut self, c: &ClassDecl) {
        for span in &c.decorators {
            self.reject(*span, "decorators are not compilable");
        }
        for field in &c.fields {
            match &field.ty {
                None => self.reject(
                    field.span,
                    format!("field `{}` has no type annotation", field.name),
                ),
                Some(ty) => self.check_type_ann(ty),
            }
        }
        if let Some(ctor) = &c.ctor {
            for param in &ctor.params {
                match &param.ty {
                    None => self.reject(
                        param.span,
                        format!("parameter `{}` has no type annotation", param.binding.name),
                    ),
                    Some(ty) => self.check_type_ann(ty),
                }
            }
            body::check_stmts(self, &ctor.body);
        }
        for method in &c.methods {
            for span in &method.decorators {
                self.reject(*span, "decorators are not compilable");
            }
            let is_accessor = method.kind != ternc_ast::MethodKind::Method;
            self.check_fn(&method.func, is_accessor);
        }
    }

    fn check_interface(&mut self, i: &InterfaceDecl) {
        for field in &i.fields {
            self.check_type_ann(&field.ty);
        }
    }

    fn check_alias(&mut self, t: &TypeAliasDecl) {
        self.check_type_ann(&t.ty);
    }

    fn check_enum(&mut self, e: &EnumDecl) {
        let mut saw_number = false;
        let mut saw_string = false;
        for member in &e.members {
            match &member.init {
                Some(EnumInit::Computed(_)) => self.reject(
                    member.span,
                    format!(
                        "enum member `{}.{}` has a computed initializer",
                        e.name, member.name
                    ),
                ),
                Some(EnumInit::Number(_)) | None => saw_number = true,
                Some(EnumInit::String(_)) => saw_string = true,
            }
        }
        if saw_number && saw_string {
            self.reject(
                e.span,
                format!("enum `{}` mixes numeric and string members", e.name),
            );
        }
    }

    // =========================================================================
    // Type annotations
    // =========================================================================

    pub(crate) fn check_type_ann(&mut self, ann: &TypeAnn) {
        match &ann.kind {
            TypeAnnKind::Any => self.reject(ann.span, "`any` is not compilable"),
            TypeAnnKind::Unknown => self.reject(ann.span, "`unknown` is not compilable"),
            TypeAnnKind::ObjectKeyword => self.reject(ann.span, "`object` is not compilable"),
            TypeAnnKind::SymbolKeyword => self.reject(ann.span, "`symbol` is not compilable"),
            TypeAnnKind::BigInt => self.reject(ann.span, "`bigint` is not compilable"),
            TypeAnnKind::Named { args, .. } => {
                for arg in args {
                    self.check_type_ann(arg);
                }
            }
            TypeAnnKind::Union(variants) => {
                for v in variants {
                    self.check_type_ann(v);
                }
            }
            TypeAnnKind::Object(fields) => {
                for f in fields {
                    self.check_type_ann(&f.ty);
                }
            }
            TypeAnnKind::Array(element) => self.check_type_ann(element),
            TypeAnnKind::Tuple(elements) => {
                for e in elements {
                    self.check_type_ann(e);
                }
            }
            TypeAnnKind::Fn { params, ret } => {
                for p in params {
                    self.check_type_ann(p);
                }
                self.check_type_ann(ret);
            }
            TypeAnnKind::StringLit(_)
            | TypeAnnKind::NumberLit(_)
            | TypeAnnKind::Null
            | TypeAnnKind::Undefined => {}
        }
    }
}
