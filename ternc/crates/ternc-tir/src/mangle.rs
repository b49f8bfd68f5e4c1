//! Mangled-name construction.
//!
//! The grammar is part of the ABI contract with the backend:
//!
//! ```text
//! Name     := Ident ("$" Segment)*
//! Segment  := Ident | PrimitiveTag | "Array" "$" Segment | Ident ("$" Segment)+
//! ```
//!
//! Source identifiers appear verbatim; `$` is forbidden in them, which the
//! validator enforces.

use crate::context::Context;
use crate::ty::Ty;
use ternc_util::Symbol;

/// Mangle a generic instantiation: `identity` + `[Int32]` → `identity$Int32`.
///
/// Deterministic: the result is a pure function of the base name and the
/// argument types.
pub fn mangle_instance(ctx: &Context, base: Symbol, args: &[Ty]) -> Symbol {
    let mut name = base.as_str().to_string();
    for arg in args {
        name.push('$');
        name.push_str(&segment(ctx, arg));
    }
    Symbol::intern(&name)
}

/// Mangled method name: `C$m`.
pub fn method_name(class: Symbol, method: Symbol) -> Symbol {
    Symbol::intern(&format!("{}${}", class, method))
}

/// Mangled constructor name: `C$new`.
pub fn ctor_name(class: Symbol) -> Symbol {
    Symbol::intern(&format!("{}$new", class))
}

/// Mangled accessor names: `C$get_x` / `C$set_x`.
pub fn getter_name(class: Symbol, prop: Symbol) -> Symbol {
    Symbol::intern(&format!("{}$get_{}", class, prop))
}

pub fn setter_name(class: Symbol, prop: Symbol) -> Symbol {
    Symbol::intern(&format!("{}$set_{}", class, prop))
}

/// The mangled segment for one type, recursing through nested generics.
pub fn segment(ctx: &Context, ty: &Ty) -> String {
    match ty {
        Ty::Int(int) => int.mangle_tag().to_string(),
        Ty::Float(float) => float.mangle_tag().to_string(),
        Ty::Bool => "Bool".to_string(),
        Ty::Void => "Void".to_string(),
        Ty::Never => "Never".to_string(),
        Ty::Str => "String".to_string(),
        Ty::Struct(id) => ctx.struct_def(*id).name.as_str().to_string(),
        Ty::Union(id) => ctx.union_def(*id).name.as_str().to_string(),
        Ty::Array(element) => format!("Array${}", segment(ctx, element)),
        Ty::Option(inner) => format!("Option${}", segment(ctx, inner)),
        Ty::Result(ok, err) => {
            format!("Result${}${}", segment(ctx, ok), segment(ctx, err))
        }
        Ty::Weak(inner) => format!("Weak${}", segment(ctx, inner)),
        Ty::Tuple(elements) => {
            let mut s = "Tuple".to_string();
            for e in elements {
                s.push('$');
                s.push_str(&segment(ctx, e));
            }
            s
        }
        Ty::Fn(f) => {
            // Capture kind is a representation detail, not part of the name.
            let mut s = "Fn".to_string();
            for p in &f.params {
                s.push('$');
                s.push_str(&segment(ctx, p));
            }
            s.push('$');
            s.push_str(&segment(ctx, &f.ret));
            s
        }
    }
}
