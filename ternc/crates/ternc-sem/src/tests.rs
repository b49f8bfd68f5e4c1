use super::*;
use crate::structural::NameHint;
use crate::unions::widen_numeric;
use ternc_ast::{NodeId, ObjectTypeField, TypeParam};
use ternc_tir::{Context, EnumValue};
use ternc_util::Handler;

fn sym(s: &str) -> Symbol {
    Symbol::intern(s)
}

fn ann(kind: TypeAnnKind) -> TypeAnn {
    TypeAnn::new(kind, Span::DUMMY)
}

fn named(name: &str) -> TypeAnn {
    ann(TypeAnnKind::Named {
        name: sym(name),
        args: vec![],
    })
}

fn named_args(name: &str, args: Vec<TypeAnn>) -> TypeAnn {
    ann(TypeAnnKind::Named {
        name: sym(name),
        args,
    })
}

fn field(name: &str, ty: TypeAnn) -> ObjectTypeField {
    ObjectTypeField {
        name: sym(name),
        ty,
        span: Span::DUMMY,
    }
}

fn object(fields: Vec<ObjectTypeField>) -> TypeAnn {
    ann(TypeAnnKind::Object(fields))
}

fn string_lit(s: &str) -> TypeAnn {
    ann(TypeAnnKind::StringLit(sym(s)))
}

fn union(variants: Vec<TypeAnn>) -> TypeAnn {
    ann(TypeAnnKind::Union(variants))
}

fn with_resolver<R>(f: impl FnOnce(&mut Resolver<'_>) -> R) -> (R, Context, Handler) {
    let mut ctx = Context::new();
    let handler = Handler::new();
    let result = {
        let mut resolver = Resolver::new(&mut ctx, &handler);
        f(&mut resolver)
    };
    (result, ctx, handler)
}

// =============================================================================
// Primitive mapping
// =============================================================================

#[test]
fn test_primitive_mapping() {
    let cases = [
        ("number", Ty::F64),
        ("f64", Ty::F64),
        ("f32", Ty::Float(FloatTy::F32)),
        ("i8", Ty::Int(IntTy::I8)),
        ("i16", Ty::Int(IntTy::I16)),
        ("i32", Ty::I32),
        ("i64", Ty::I64),
        ("u8", Ty::Int(IntTy::U8)),
        ("u64", Ty::Int(IntTy::U64)),
        ("boolean", Ty::Bool),
        ("string", Ty::Str),
        ("void", Ty::Void),
        ("never", Ty::Never),
    ];
    for (name, expected) in cases {
        let (ty, _, handler) = with_resolver(|r| r.resolve_annotation(&named(name)));
        assert_eq!(ty, expected, "primitive `{}`", name);
        assert!(!handler.has_errors());
    }
}

#[test]
fn test_array_and_tuple() {
    let (ty, _, _) =
        with_resolver(|r| r.resolve_annotation(&ann(TypeAnnKind::Array(Box::new(named("i32"))))));
    assert_eq!(ty, Ty::array(Ty::I32));

    let (ty, _, _) = with_resolver(|r| {
        r.resolve_annotation(&ann(TypeAnnKind::Tuple(vec![named("f64"), named("boolean")])))
    });
    assert_eq!(ty, Ty::Tuple(vec![Ty::F64, Ty::Bool]));
}

#[test]
fn test_weak_wrapper() {
    let (ty, _, _) = with_resolver(|r| {
        r.register_module(
            &ternc_ast::Module {
                file: ternc_util::FileId::DUMMY,
                items: vec![ternc_ast::Item::Interface(ternc_ast::InterfaceDecl {
                    name: sym("Node"),
                    id: NodeId(0),
                    type_params: vec![],
                    fields: vec![field("value", named("i32"))],
                    exported: false,
                    span: Span::DUMMY,
                })],
            },
            &|_| false,
        );
        r.resolve_annotation(&named_args("Weak", vec![named("Node")]))
    });
    assert!(matches!(ty, Ty::Weak(inner) if matches!(*inner, Ty::Struct(_))));
}

// =============================================================================
// Nullability
// =============================================================================

#[test]
fn test_option_collapsing() {
    for variants in [
        vec![named("f64"), ann(TypeAnnKind::Null)],
        vec![named("f64"), ann(TypeAnnKind::Undefined)],
        vec![
            named("f64"),
            ann(TypeAnnKind::Null),
            ann(TypeAnnKind::Undefined),
        ],
    ] {
        let (ty, _, handler) = with_resolver(|r| r.resolve_annotation(&union(variants)));
        assert_eq!(ty, Ty::option(Ty::F64));
        assert!(!handler.has_errors());
    }
}

// =============================================================================
// Structural identity and naming
// =============================================================================

#[test]
fn test_identical_shapes_share_one_struct() {
    let (tys, ctx, _) = with_resolver(|r| {
        let a = r.resolve_annotation(&object(vec![
            field("x", named("f64")),
            field("y", named("f64")),
        ]));
        let b = r.resolve_annotation(&object(vec![
            field("x", named("f64")),
            field("y", named("f64")),
        ]));
        (a, b)
    });
    assert_eq!(tys.0, tys.1);
    assert_eq!(ctx.structs.len(), 1);
}

#[test]
fn test_var_init_name_synthesis() {
    let (ty, ctx, _) = with_resolver(|r| {
        r.resolve_with_hint(
            &object(vec![field("x", named("f64"))]),
            NameHint::VarInit { var: sym("origin") },
        )
    });
    let Ty::Struct(id) = ty else { panic!("expected struct") };
    assert_eq!(ctx.struct_def(id).name.as_str(), "origin$type");
}

#[test]
fn test_fn_param_name_synthesis() {
    let (ty, ctx, _) = with_resolver(|r| {
        r.resolve_with_hint(
            &object(vec![field("x", named("f64"))]),
            NameHint::FnParam {
                func: sym("dist"),
                param: sym("a"),
            },
        )
    });
    let Ty::Struct(id) = ty else { panic!("expected struct") };
    assert_eq!(ctx.struct_def(id).name.as_str(), "dist$a");
}

#[test]
fn test_anonymous_name_synthesis() {
    let (ty, ctx, _) = with_resolver(|r| {
        r.resolve_annotation(&object(vec![
            field("a", named("i32")),
            field("b", named("string")),
        ]))
    });
    let Ty::Struct(id) = ty else { panic!("expected struct") };
    assert_eq!(ctx.struct_def(id).name.as_str(), "__anon$a_Int32$b_String");
}

// =============================================================================
// Union classification
// =============================================================================

#[test]
fn test_string_literal_union_is_int32() {
    let (ty, ctx, _) = with_resolver(|r| {
        r.resolve_annotation(&union(vec![
            string_lit("idle"),
            string_lit("busy"),
            string_lit("done"),
        ]))
    });
    assert_eq!(ty, Ty::I32);
    assert_eq!(ctx.lookup_string_tag(sym("idle")), Some(0));
    assert_eq!(ctx.lookup_string_tag(sym("busy")), Some(1));
    assert_eq!(ctx.lookup_string_tag(sym("done")), Some(2));
}

#[test]
fn test_numeric_union_widens() {
    let (ty, _, _) =
        with_resolver(|r| r.resolve_annotation(&union(vec![named("i32"), named("f32")])));
    assert_eq!(ty, Ty::Float(FloatTy::F32));

    let (ty, _, _) =
        with_resolver(|r| r.resolve_annotation(&union(vec![named("i8"), named("i64")])));
    assert_eq!(ty, Ty::I64);

    let (ty, _, _) =
        with_resolver(|r| r.resolve_annotation(&union(vec![named("u32"), named("i32")])));
    assert_eq!(ty, Ty::I32);
}

fn shape_union() -> TypeAnn {
    union(vec![
        object(vec![field("kind", string_lit("circle")), field("r", named("f64"))]),
        object(vec![
            field("kind", string_lit("rect")),
            field("w", named("f64")),
            field("h", named("f64")),
        ]),
    ])
}

#[test]
fn test_discriminated_union() {
    let (ty, ctx, handler) =
        with_resolver(|r| r.resolve_with_hint(&shape_union(), NameHint::Declared(sym("Shape"))));
    assert!(!handler.has_errors());

    let Ty::Union(id) = ty else { panic!("expected union") };
    let def = ctx.union_def(id);
    assert_eq!(def.name, sym("Shape"));
    assert_eq!(def.discriminant, Some(sym("kind")));
    assert_eq!(def.variants.len(), 2);

    // Dense tags from 0 in declaration order.
    assert_eq!(def.variants[0].tag, 0);
    assert_eq!(def.variants[0].discriminant, Some(sym("circle")));
    assert_eq!(def.variants[1].tag, 1);
    assert_eq!(def.variants[1].discriminant, Some(sym("rect")));

    // The discriminant is stripped from each payload.
    let Ty::Struct(circle) = &def.variants[0].payload else {
        panic!("expected struct payload")
    };
    let circle_def = ctx.struct_def(*circle);
    assert_eq!(circle_def.name, sym("Shape$0"));
    assert_eq!(circle_def.fields.len(), 1);
    assert_eq!(circle_def.fields[0].name, sym("r"));
}

#[test]
fn test_duplicate_discriminant_is_ambiguous() {
    let bad = union(vec![
        object(vec![field("kind", string_lit("circle"))]),
        object(vec![field("kind", string_lit("circle"))]),
    ]);
    let (_, _, handler) =
        with_resolver(|r| r.resolve_with_hint(&bad, NameHint::Declared(sym("Bad"))));
    assert!(handler.has_error_kind(DiagnosticKind::DiscriminantAmbiguous));
}

#[test]
fn test_two_candidate_discriminants_is_ambiguous() {
    let bad = union(vec![
        object(vec![
            field("kind", string_lit("a")),
            field("tag", string_lit("x")),
        ]),
        object(vec![
            field("kind", string_lit("b")),
            field("tag", string_lit("y")),
        ]),
    ]);
    let (_, _, handler) =
        with_resolver(|r| r.resolve_with_hint(&bad, NameHint::Declared(sym("Bad"))));
    assert!(handler.has_error_kind(DiagnosticKind::DiscriminantAmbiguous));
}

#[test]
fn test_auto_tagged_union() {
    let (ty, ctx, handler) = with_resolver(|r| {
        r.resolve_with_hint(
            &union(vec![named("string"), named("boolean")]),
            NameHint::Declared(sym("Mixed")),
        )
    });
    assert!(!handler.has_errors());
    let Ty::Union(id) = ty else { panic!("expected union") };
    let def = ctx.union_def(id);
    assert_eq!(def.discriminant, None);
    assert_eq!(def.variants[0].tag, 0);
    assert_eq!(def.variants[0].payload, Ty::Str);
    assert_eq!(def.variants[1].tag, 1);
    assert_eq!(def.variants[1].payload, Ty::Bool);
}

// =============================================================================
// Widening lattice
// =============================================================================

#[test]
fn test_widen_float_beats_int() {
    assert_eq!(
        widen_numeric(&[Ty::I64, Ty::Float(FloatTy::F32)]),
        Ty::Float(FloatTy::F32)
    );
    assert_eq!(widen_numeric(&[Ty::F64, Ty::Float(FloatTy::F32)]), Ty::F64);
}

#[test]
fn test_widen_signedness_tie() {
    assert_eq!(
        widen_numeric(&[Ty::Int(IntTy::U32), Ty::I32]),
        Ty::I32
    );
}

#[quickcheck_macros::quickcheck]
fn prop_widening_commutes(picks: Vec<u8>) -> bool {
    // Map arbitrary bytes onto the numeric types and check that reversing
    // the variant order never changes the widened result.
    if picks.is_empty() {
        return true;
    }
    let pool = [
        Ty::Int(IntTy::I8),
        Ty::Int(IntTy::I16),
        Ty::I32,
        Ty::I64,
        Ty::Int(IntTy::U8),
        Ty::Int(IntTy::U16),
        Ty::Int(IntTy::U32),
        Ty::Int(IntTy::U64),
        Ty::Float(FloatTy::F32),
        Ty::F64,
    ];
    let types: Vec<Ty> = picks
        .iter()
        .map(|&p| pool[p as usize % pool.len()].clone())
        .collect();
    let mut reversed = types.clone();
    reversed.reverse();
    widen_numeric(&types) == widen_numeric(&reversed)
}

// =============================================================================
// Generic type instantiation
// =============================================================================

fn generic_box_alias(r: &mut Resolver<'_>) {
    // type Box<T> = { value: T }
    r.register_module(
        &ternc_ast::Module {
            file: ternc_util::FileId::DUMMY,
            items: vec![ternc_ast::Item::TypeAlias(ternc_ast::TypeAliasDecl {
                name: sym("Box"),
                id: NodeId(0),
                type_params: vec![TypeParam {
                    name: sym("T"),
                    constraint: None,
                    default: None,
                    span: Span::DUMMY,
                }],
                ty: object(vec![field("value", named("T"))]),
                exported: false,
                span: Span::DUMMY,
            })],
        },
        &|_| false,
    );
}

#[test]
fn test_generic_alias_instantiation() {
    let (tys, ctx, handler) = with_resolver(|r| {
        generic_box_alias(r);
        let a = r.resolve_annotation(&named_args("Box", vec![named("i32")]));
        let b = r.resolve_annotation(&named_args("Box", vec![named("i32")]));
        let c = r.resolve_annotation(&named_args("Box", vec![named("string")]));
        (a, b, c)
    });
    assert!(!handler.has_errors());

    // Same instantiation resolves to the same struct, once.
    assert_eq!(tys.0, tys.1);
    assert_ne!(tys.0, tys.2);

    let Ty::Struct(id) = tys.0 else { panic!("expected struct") };
    assert_eq!(ctx.struct_def(id).name.as_str(), "Box$Int32");
    assert_eq!(
        ctx.mono_lookup(sym("Box"), &[Ty::I32]),
        Some(sym("Box$Int32"))
    );
}

#[test]
fn test_generic_default_applies() {
    let (ty, ctx, handler) = with_resolver(|r| {
        r.register_module(
            &ternc_ast::Module {
                file: ternc_util::FileId::DUMMY,
                items: vec![ternc_ast::Item::TypeAlias(ternc_ast::TypeAliasDecl {
                    name: sym("Cell"),
                    id: NodeId(0),
                    type_params: vec![TypeParam {
                        name: sym("T"),
                        constraint: None,
                        default: Some(named("i32")),
                        span: Span::DUMMY,
                    }],
                    ty: object(vec![field("value", named("T"))]),
                    exported: false,
                    span: Span::DUMMY,
                })],
            },
            &|_| false,
        );
        r.resolve_annotation(&named_args("Cell", vec![]))
    });
    assert!(!handler.has_errors());
    let Ty::Struct(id) = ty else { panic!("expected struct") };
    assert_eq!(ctx.struct_def(id).name.as_str(), "Cell$Int32");
}

#[test]
fn test_unresolved_type_parameter() {
    let (_, _, handler) = with_resolver(|r| {
        generic_box_alias(r);
        r.resolve_annotation(&named_args("Box", vec![]))
    });
    assert!(handler.has_error_kind(DiagnosticKind::UnresolvedTypeParameter));
}

#[test]
fn test_unknown_type_reports_symbol() {
    let (ty, _, handler) = with_resolver(|r| r.resolve_annotation(&named("Mystery")));
    assert!(handler.has_error_kind(DiagnosticKind::UnknownSymbol));
    assert_eq!(ty, Ty::Never);
}

#[test]
fn test_enum_reference_is_int32() {
    let (ty, ctx, _) = with_resolver(|r| {
        crate::enums::register_enum(
            r,
            &ternc_ast::EnumDecl {
                name: sym("Mode"),
                id: NodeId(0),
                is_const: false,
                members: vec![ternc_ast::EnumMember {
                    name: sym("On"),
                    init: None,
                    span: Span::DUMMY,
                }],
                exported: false,
                span: Span::DUMMY,
            },
        );
        r.resolve_annotation(&named("Mode"))
    });
    assert_eq!(ty, Ty::I32);
    assert_eq!(
        ctx.enum_def(sym("Mode")).unwrap().values[&sym("On")],
        EnumValue::Int(0)
    );
}
