//! Structural identity and anonymous-struct naming.
//!
//! Object shapes canonicalize to their ordered `(name, type)` field list.
//! The context interns by that signature, so any two identical shapes share
//! one struct entry; the name chosen here only matters for the first
//! registration and for the backend's symbol table.

use crate::Resolver;
use ternc_ast::ObjectTypeField;
use ternc_tir::{mangle, FieldDef, Ty};
use ternc_util::Symbol;

/// Where an anonymous shape appeared, for name synthesis.
///
/// Priority order, highest first: union variant, function parameter,
/// variable initializer, fully anonymous.
#[derive(Clone, Copy, Debug)]
pub enum NameHint {
    /// A declared name: interface, class, or alias target
    Declared(Symbol),
    /// Variant `index` of the union named `union`
    UnionVariant { union: Symbol, index: usize },
    /// Parameter `param` of function `func`, typed inline
    FnParam { func: Symbol, param: Symbol },
    /// Initializer of variable `var`
    VarInit { var: Symbol },
    Anonymous,
}

/// Resolve an object annotation to its interned struct.
pub fn resolve_object(
    resolver: &mut Resolver<'_>,
    fields: &[ObjectTypeField],
    hint: NameHint,
) -> Ty {
    let resolved = resolve_fields(resolver, fields);
    Ty::Struct(intern_shape(resolver, resolved, hint))
}

/// Resolve a field list in source order.
pub fn resolve_fields(resolver: &mut Resolver<'_>, fields: &[ObjectTypeField]) -> Vec<FieldDef> {
    fields
        .iter()
        .map(|f| FieldDef {
            name: f.name,
            ty: resolver.resolve_annotation(&f.ty),
        })
        .collect()
}

/// Intern a resolved shape, synthesizing a name if it is new.
pub fn intern_shape(
    resolver: &mut Resolver<'_>,
    fields: Vec<FieldDef>,
    hint: NameHint,
) -> ternc_tir::StructId {
    // An existing signature keeps its first name regardless of hint.
    if let Some(id) = resolver.ctx.struct_id_by_sig(&fields) {
        return id;
    }
    let name = synthesize_name(resolver, &fields, hint);
    resolver.ctx.intern_struct(name, fields)
}

/// The synthesized name for a new anonymous shape. All separators are `$`,
/// which cannot appear in source identifiers.
fn synthesize_name(resolver: &Resolver<'_>, fields: &[FieldDef], hint: NameHint) -> Symbol {
    match hint {
        NameHint::Declared(name) => name,
        NameHint::UnionVariant { union, index } => {
            Symbol::intern(&format!("{}${}", union, index))
        }
        NameHint::FnParam { func, param } => Symbol::intern(&format!("{}${}", func, param)),
        NameHint::VarInit { var } => Symbol::intern(&format!("{}$type", var)),
        NameHint::Anonymous => {
            let mut name = "__anon".to_string();
            for field in fields {
                name.push('$');
                name.push_str(field.name.as_str());
                name.push('_');
                name.push_str(&mangle::segment(resolver.ctx, &field.ty));
            }
            Symbol::intern(&name)
        }
    }
}
