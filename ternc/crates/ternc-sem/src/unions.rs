//! Union classification.
//!
//! A `T₁ | T₂ | …` annotation resolves through five rules, first match wins:
//! nullability collapses to `Option`, all-string-literal unions become
//! integer enums, numeric unions widen to one representation, struct unions
//! sharing a literal discriminant become discriminated unions, and anything
//! else gets auto-synthesized tags.

use crate::structural::{self, NameHint};
use crate::Resolver;
use ternc_ast::{ObjectTypeField, TypeAnn, TypeAnnKind};
use ternc_tir::{mangle, FloatTy, IntTy, Ty, UnionDef, UnionVariant};
use ternc_util::{DiagnosticBuilder, DiagnosticKind, Span, Symbol};

/// Classify a union annotation.
pub fn classify_union(
    resolver: &mut Resolver<'_>,
    variants: &[TypeAnn],
    span: Span,
    hint: NameHint,
) -> Ty {
    // Rule 1: strip null/undefined and wrap the rest in Option.
    let (nullish, concrete): (Vec<_>, Vec<_>) =
        variants.iter().partition(|v| v.kind.is_nullish());
    if !nullish.is_empty() {
        let inner = match concrete.len() {
            0 => Ty::Never,
            1 => resolver.resolve_with_hint(concrete[0], hint),
            _ => {
                let rest: Vec<TypeAnn> = concrete.iter().map(|v| (*v).clone()).collect();
                classify_union(resolver, &rest, span, hint)
            }
        };
        // T | null | undefined collapses to one Option, never two.
        return match inner {
            Ty::Option(_) => inner,
            other => Ty::option(other),
        };
    }

    // Rule 2: all string-literal variants form a compile-time enum.
    if variants
        .iter()
        .all(|v| matches!(v.kind, TypeAnnKind::StringLit(_)))
    {
        for v in variants {
            if let TypeAnnKind::StringLit(value) = v.kind {
                resolver.ctx.string_tag(value);
            }
        }
        return Ty::I32;
    }

    // Rule 4 runs on the annotations themselves: discriminants are string
    // literal *types* and would be erased by resolution.
    if let Some(object_variants) = all_object_variants(resolver, variants) {
        match find_discriminant(resolver, &object_variants, span) {
            DiscriminantSearch::Found(field) => {
                return build_discriminated(resolver, &object_variants, field, span, hint);
            }
            DiscriminantSearch::Ambiguous => return Ty::Never,
            DiscriminantSearch::None => {
                // Struct variants with no usable discriminant auto-tag.
                return build_auto_tagged(resolver, variants, hint);
            }
        }
    }

    // Rule 3: all-numeric unions widen; no tag is stored. Safe to resolve
    // now — object shapes were handled above.
    let resolved_probe: Vec<Ty> = variants
        .iter()
        .map(|v| resolver.resolve_annotation(v))
        .collect();
    if resolved_probe.iter().all(|t| t.is_numeric()) {
        return widen_numeric(&resolved_probe);
    }

    // Rule 5: auto-tagged union, fresh dense tags in declaration order.
    build_auto_tagged(resolver, variants, hint)
}

/// The widening lattice: any float makes the result the widest float seen;
/// otherwise the widest integer, with signedness winning ties.
///
/// Folding with `max` keeps the result independent of variant order.
pub fn widen_numeric(types: &[Ty]) -> Ty {
    let mut widest_float: Option<FloatTy> = None;
    let mut widest_int: Option<IntTy> = None;

    for ty in types {
        match ty {
            Ty::Float(f) => {
                widest_float = Some(match widest_float {
                    Some(prev) if prev.width >= f.width => prev,
                    _ => *f,
                });
            }
            Ty::Int(i) => {
                widest_int = Some(match widest_int {
                    None => *i,
                    Some(prev) => {
                        if prev.width > i.width {
                            prev
                        } else if i.width > prev.width {
                            *i
                        } else {
                            // Equal width: signed wins.
                            IntTy {
                                width: prev.width,
                                signed: prev.signed || i.signed,
                            }
                        }
                    }
                });
            }
            _ => {}
        }
    }

    if let Some(f) = widest_float {
        Ty::Float(f)
    } else if let Some(i) = widest_int {
        Ty::Int(i)
    } else {
        Ty::Never
    }
}

/// Field lists for every variant, if all variants are object-shaped.
///
/// A variant may be an inline object or a bare name aliasing one.
fn all_object_variants(
    resolver: &Resolver<'_>,
    variants: &[TypeAnn],
) -> Option<Vec<Vec<ObjectTypeField>>> {
    variants
        .iter()
        .map(|v| match &v.kind {
            TypeAnnKind::Object(fields) => Some(fields.clone()),
            TypeAnnKind::Named { name, args } if args.is_empty() => {
                match resolver.aliases.get(name).map(|a| &a.ty.kind) {
                    Some(TypeAnnKind::Object(fields)) => Some(fields.clone()),
                    _ => None,
                }
            }
            _ => None,
        })
        .collect()
}

enum DiscriminantSearch {
    Found(Symbol),
    Ambiguous,
    None,
}

/// A discriminant is a field present in every variant with a string-literal
/// type whose value is unique per variant. Exactly one such field may exist.
fn find_discriminant(
    resolver: &mut Resolver<'_>,
    variants: &[Vec<ObjectTypeField>],
    span: Span,
) -> DiscriminantSearch {
    let first = match variants.first() {
        Some(f) => f,
        None => return DiscriminantSearch::None,
    };

    let mut candidates = Vec::new();
    'field: for field in first {
        let mut values = Vec::new();
        for variant in variants {
            let lit = variant.iter().find_map(|f| {
                if f.name == field.name {
                    match &f.ty.kind {
                        TypeAnnKind::StringLit(v) => Some(*v),
                        _ => None,
                    }
                } else {
                    None
                }
            });
            match lit {
                Some(v) => values.push(v),
                None => continue 'field,
            }
        }
        candidates.push((field.name, values));
    }

    let mut usable = Vec::new();
    for (name, values) in &candidates {
        let mut seen = Vec::new();
        let mut duplicated = false;
        for v in values {
            if seen.contains(v) {
                duplicated = true;
            }
            seen.push(*v);
        }
        if duplicated {
            DiagnosticBuilder::error(
                DiagnosticKind::DiscriminantAmbiguous,
                format!("discriminant field `{}` repeats a value across variants", name),
            )
            .span(span)
            .emit(resolver.handler());
            return DiscriminantSearch::Ambiguous;
        }
        usable.push(*name);
    }

    match usable.len() {
        0 => DiscriminantSearch::None,
        1 => DiscriminantSearch::Found(usable[0]),
        _ => {
            DiagnosticBuilder::error(
                DiagnosticKind::DiscriminantAmbiguous,
                format!(
                    "variants share {} possible discriminant fields; exactly one is required",
                    usable.len()
                ),
            )
            .span(span)
            .emit(resolver.handler());
            DiscriminantSearch::Ambiguous
        }
    }
}

/// Build a discriminated union: the discriminant field is stripped from each
/// payload and its string value selects the variant.
fn build_discriminated(
    resolver: &mut Resolver<'_>,
    variants: &[Vec<ObjectTypeField>],
    discriminant: Symbol,
    span: Span,
    hint: NameHint,
) -> Ty {
    let _ = span;
    let union_name = hint_name(hint).unwrap_or_else(|| {
        // Anonymous discriminated unions are named by their variant values.
        let mut parts = vec!["__union".to_string()];
        for variant in variants {
            for field in variant {
                if field.name == discriminant {
                    if let TypeAnnKind::StringLit(v) = &field.ty.kind {
                        parts.push(v.as_str().to_string());
                    }
                }
            }
        }
        Symbol::intern(&parts.join("$"))
    });

    if let Some(id) = resolver.ctx.union_id_by_name(union_name) {
        return Ty::Union(id);
    }

    let mut union_variants = Vec::new();
    for (index, fields) in variants.iter().enumerate() {
        let mut value = None;
        let stripped: Vec<ObjectTypeField> = fields
            .iter()
            .filter(|f| {
                if f.name == discriminant {
                    if let TypeAnnKind::StringLit(v) = &f.ty.kind {
                        value = Some(*v);
                    }
                    false
                } else {
                    true
                }
            })
            .cloned()
            .collect();

        let resolved = structural::resolve_fields(resolver, &stripped);
        let payload_id = structural::intern_shape(
            resolver,
            resolved,
            NameHint::UnionVariant {
                union: union_name,
                index,
            },
        );
        let value = value.expect("discriminant was found in every variant");
        // Record the literal in the global tag table for switch lowering.
        resolver.ctx.string_tag(value);
        union_variants.push(UnionVariant {
            tag: index as u32,
            discriminant: Some(value),
            payload: Ty::Struct(payload_id),
        });
    }

    let id = resolver.ctx.register_union(UnionDef {
        name: union_name,
        tag_ty: IntTy::I32,
        discriminant: Some(discriminant),
        variants: union_variants,
    });
    Ty::Union(id)
}

/// Build an auto-tagged union: dense tags in declaration order, payloads as
/// resolved.
fn build_auto_tagged(resolver: &mut Resolver<'_>, variants: &[TypeAnn], hint: NameHint) -> Ty {
    // A hinted union knows its name before its payloads; a fully anonymous
    // one is named from its resolved payload segments afterwards.
    let (union_name, payloads) = match hint_name(hint) {
        Some(union_name) => {
            if let Some(id) = resolver.ctx.union_id_by_name(union_name) {
                return Ty::Union(id);
            }
            let payloads: Vec<Ty> = variants
                .iter()
                .enumerate()
                .map(|(index, v)| {
                    resolver.resolve_with_hint(
                        v,
                        NameHint::UnionVariant {
                            union: union_name,
                            index,
                        },
                    )
                })
                .collect();
            (union_name, payloads)
        }
        None => {
            let payloads: Vec<Ty> = variants
                .iter()
                .map(|v| resolver.resolve_annotation(v))
                .collect();
            let mut name = "__union".to_string();
            for ty in &payloads {
                name.push('$');
                name.push_str(&mangle::segment(resolver.ctx, ty));
            }
            (Symbol::intern(&name), payloads)
        }
    };

    if let Some(id) = resolver.ctx.union_id_by_name(union_name) {
        return Ty::Union(id);
    }
    let union_variants = payloads
        .into_iter()
        .enumerate()
        .map(|(index, payload)| UnionVariant {
            tag: index as u32,
            discriminant: None,
            payload,
        })
        .collect();
    let id = resolver.ctx.register_union(UnionDef {
        name: union_name,
        tag_ty: IntTy::I32,
        discriminant: None,
        variants: union_variants,
    });
    Ty::Union(id)
}

fn hint_name(hint: NameHint) -> Option<Symbol> {
    match hint {
        NameHint::Declared(name) => Some(name),
        NameHint::VarInit { var } => Some(Symbol::intern(&format!("{}$type", var))),
        NameHint::FnParam { func, param } => Some(Symbol::intern(&format!("{}${}", func, param))),
        NameHint::UnionVariant { .. } | NameHint::Anonymous => None,
    }
}
