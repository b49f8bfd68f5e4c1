//! End-to-end middle-end scenarios, driven with programmatically built
//! ASTs: the parser and binder are external, so the tests play binder where
//! resolution matters (narrowing, captures).

use super::*;
use ternc_ast::{
    Binding, DefInfo, DefKind, Expr, ExprKind, FnDecl, Item, Lit, Module, NodeId, ObjectTypeField,
    Param, Pattern, Stmt, StmtKind, SwitchCase, TypeAnn, TypeAnnKind, TypeParam,
};
use ternc_tir::{
    AllocPlacement, CaptureKind, ExprKind as IrExpr, ParamMode, Stmt as IrStmt, Ty,
};
use ternc_util::{DefId, FileId, Span, Symbol};

// =============================================================================
// Builders
// =============================================================================

struct B {
    next: u32,
    scopes: ScopeInfo,
}

impl B {
    fn new() -> Self {
        Self {
            next: 0,
            scopes: ScopeInfo::new(),
        }
    }

    fn node(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }

    fn declare(&mut self, name: &str, kind: DefKind) -> DefId {
        self.scopes.declare(DefInfo {
            name: sym(name),
            kind,
            span: Span::DUMMY,
            file: FileId::DUMMY,
            exported: false,
        })
    }

    fn expr(&mut self, kind: ExprKind) -> Expr {
        let id = self.node();
        Expr::new(kind, Span::DUMMY, id)
    }

    fn ident(&mut self, name: &str) -> Expr {
        let kind = ExprKind::Ident(sym(name));
        self.expr(kind)
    }

    /// An identifier reference resolved to a known definition.
    fn ident_to(&mut self, name: &str, def: DefId) -> Expr {
        let e = self.ident(name);
        self.scopes.record_resolution(e.id, def);
        e
    }

    fn num(&mut self, n: f64) -> Expr {
        self.expr(ExprKind::Literal(Lit::Number(n)))
    }

    fn string(&mut self, s: &str) -> Expr {
        self.expr(ExprKind::Literal(Lit::String(sym(s))))
    }

    fn member(&mut self, object: Expr, property: &str) -> Expr {
        self.expr(ExprKind::Member {
            object: Box::new(object),
            property: sym(property),
            optional: false,
        })
    }

    fn binary(&mut self, op: ternc_ast::BinaryOp, left: Expr, right: Expr) -> Expr {
        self.expr(ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn call(&mut self, name: &str, type_args: Vec<TypeAnn>, args: Vec<Expr>) -> Expr {
        let callee = self.ident(name);
        self.expr(ExprKind::Call {
            callee: Box::new(callee),
            type_args,
            args,
        })
    }

    fn binding(&mut self, name: &str) -> Binding {
        Binding {
            name: sym(name),
            id: self.node(),
            span: Span::DUMMY,
        }
    }

    /// A typed parameter whose binding resolves to a fresh definition.
    fn param(&mut self, name: &str, ty: TypeAnn) -> (Param, DefId) {
        let def = self.declare(name, DefKind::Param);
        let binding = self.binding(name);
        self.scopes.record_resolution(binding.id, def);
        (
            Param {
                binding,
                ty: Some(ty),
                span: Span::DUMMY,
            },
            def,
        )
    }

    fn func(
        &mut self,
        name: &str,
        type_params: Vec<TypeParam>,
        params: Vec<Param>,
        ret: TypeAnn,
        body: Vec<Stmt>,
    ) -> FnDecl {
        FnDecl {
            name: sym(name),
            id: self.node(),
            type_params,
            params,
            ret: Some(ret),
            body,
            is_async: false,
            is_generator: false,
            exported: false,
            span: Span::DUMMY,
        }
    }

    fn alias(&mut self, name: &str, ty: TypeAnn) -> Item {
        Item::TypeAlias(ternc_ast::TypeAliasDecl {
            name: sym(name),
            id: self.node(),
            type_params: vec![],
            ty,
            exported: false,
            span: Span::DUMMY,
        })
    }

    fn interface(&mut self, name: &str, fields: Vec<(&str, TypeAnn)>) -> Item {
        Item::Interface(ternc_ast::InterfaceDecl {
            name: sym(name),
            id: self.node(),
            type_params: vec![],
            fields: fields
                .into_iter()
                .map(|(n, ty)| ObjectTypeField {
                    name: sym(n),
                    ty,
                    span: Span::DUMMY,
                })
                .collect(),
            exported: false,
            span: Span::DUMMY,
        })
    }

    fn run(self, items: Vec<Item>) -> Result<Program, Vec<ternc_util::Diagnostic>> {
        let session = Session::new();
        let modules = [Module {
            file: FileId::DUMMY,
            items,
        }];
        run_middle_end(&session, &modules, &self.scopes, &ImportGraph::new())
    }
}

fn sym(s: &str) -> Symbol {
    Symbol::intern(s)
}

fn named(name: &str) -> TypeAnn {
    TypeAnn::new(
        TypeAnnKind::Named {
            name: sym(name),
            args: vec![],
        },
        Span::DUMMY,
    )
}

fn object(fields: Vec<(&str, TypeAnn)>) -> TypeAnn {
    TypeAnn::new(
        TypeAnnKind::Object(
            fields
                .into_iter()
                .map(|(n, ty)| ObjectTypeField {
                    name: sym(n),
                    ty,
                    span: Span::DUMMY,
                })
                .collect(),
        ),
        Span::DUMMY,
    )
}

fn string_lit_ty(s: &str) -> TypeAnn {
    TypeAnn::new(TypeAnnKind::StringLit(sym(s)), Span::DUMMY)
}

fn stmt(kind: StmtKind) -> Stmt {
    Stmt::new(kind, Span::DUMMY)
}

fn ret(e: Expr) -> Stmt {
    stmt(StmtKind::Return(Some(e)))
}

// =============================================================================
// S1: two instantiations, no generic base
// =============================================================================

#[test]
fn scenario_identity_monomorphization() {
    let mut b = B::new();
    let x_ret = b.ident("x");
    let (px, _) = b.param("x", named("T"));
    let identity = b.func(
        "identity",
        vec![TypeParam {
            name: sym("T"),
            constraint: None,
            default: None,
            span: Span::DUMMY,
        }],
        vec![px],
        named("T"),
        vec![ret(x_ret)],
    );

    let forty_two = b.num(42.0);
    let pi = b.num(3.14);
    let call_a = b.call("identity", vec![named("i32")], vec![forty_two]);
    let call_b = b.call("identity", vec![named("f64")], vec![pi]);
    let main = b.func(
        "main",
        vec![],
        vec![],
        named("void"),
        vec![stmt(StmtKind::ExprStmt(call_a)), stmt(StmtKind::ExprStmt(call_b))],
    );

    let program = b
        .run(vec![Item::Function(identity), Item::Function(main)])
        .expect("clean compile");

    assert!(program.contains_fn(sym("identity$Int32")));
    assert!(program.contains_fn(sym("identity$Float64")));
    assert!(!program.contains_fn(sym("identity")));
}

// =============================================================================
// S2: discriminated union and switch-on-tag
// =============================================================================

#[test]
fn scenario_shape_union_switch() {
    let mut b = B::new();
    // type Shape = {kind:"circle"; r:f64} | {kind:"rect"; w:f64; h:f64}
    let shape = b.alias(
        "Shape",
        TypeAnn::new(
            TypeAnnKind::Union(vec![
                object(vec![("kind", string_lit_ty("circle")), ("r", named("f64"))]),
                object(vec![
                    ("kind", string_lit_ty("rect")),
                    ("w", named("f64")),
                    ("h", named("f64")),
                ]),
            ]),
            Span::DUMMY,
        ),
    );

    // function area(s: Shape): f64 { switch (s.kind) { … } }
    let (ps, s_def) = b.param("s", named("Shape"));

    let s1 = b.ident_to("s", s_def);
    let disc = b.member(s1, "kind");

    let s2 = b.ident_to("s", s_def);
    let r1 = b.member(s2, "r");
    let s3 = b.ident_to("s", s_def);
    let r2 = b.member(s3, "r");
    let circle_value = b.binary(ternc_ast::BinaryOp::Mul, r1, r2);

    let s4 = b.ident_to("s", s_def);
    let w = b.member(s4, "w");
    let s5 = b.ident_to("s", s_def);
    let h = b.member(s5, "h");
    let rect_value = b.binary(ternc_ast::BinaryOp::Mul, w, h);

    let circle_test = b.string("circle");
    let rect_test = b.string("rect");
    let area = b.func(
        "area",
        vec![],
        vec![ps],
        named("f64"),
        vec![stmt(StmtKind::Switch {
            disc,
            cases: vec![
                SwitchCase {
                    test: circle_test,
                    body: vec![ret(circle_value)],
                    span: Span::DUMMY,
                },
                SwitchCase {
                    test: rect_test,
                    body: vec![ret(rect_value)],
                    span: Span::DUMMY,
                },
            ],
            default: None,
        })],
    );

    let program = b.run(vec![shape, Item::Function(area)]).expect("clean compile");

    // One union named Shape: tag 0 → circle {r}, tag 1 → rect {w, h}.
    let shape_def = program
        .unions
        .iter()
        .find(|u| u.name == sym("Shape"))
        .expect("Shape registered");
    assert_eq!(shape_def.variants.len(), 2);
    assert_eq!(shape_def.variants[0].tag, 0);
    assert_eq!(shape_def.variants[0].discriminant, Some(sym("circle")));
    assert_eq!(shape_def.variants[1].tag, 1);
    assert_eq!(shape_def.variants[1].discriminant, Some(sym("rect")));

    // The function body is a match-on-tag with two arms.
    let area_def = &program.functions[&sym("area")];
    let IrStmt::Match { arms, .. } = &area_def.body.stmts[0] else {
        panic!("expected match-on-tag, got {:?}", area_def.body.stmts[0]);
    };
    assert_eq!(arms.len(), 2);
    assert_eq!(arms[0].tag, 0);
    assert_eq!(arms[1].tag, 1);
}

// =============================================================================
// S3: Option parameter with null-test narrowing
// =============================================================================

#[test]
fn scenario_option_parameter() {
    let mut b = B::new();
    // function p(x: f64 | null): f64 { if (x === null) return 0; return x }
    let opt_ann = TypeAnn::new(
        TypeAnnKind::Union(vec![named("f64"), TypeAnn::new(TypeAnnKind::Null, Span::DUMMY)]),
        Span::DUMMY,
    );
    let (px, x_def) = b.param("x", opt_ann);

    let x1 = b.ident_to("x", x_def);
    let null = b.expr(ExprKind::Literal(Lit::Null));
    let cond = b.binary(ternc_ast::BinaryOp::Eq, x1, null);
    let zero = b.num(0.0);
    let x2 = b.ident_to("x", x_def);
    let p = b.func(
        "p",
        vec![],
        vec![px],
        named("f64"),
        vec![
            stmt(StmtKind::If {
                cond,
                then_branch: Box::new(ret(zero)),
                else_branch: None,
            }),
            ret(x2),
        ],
    );

    let program = b.run(vec![Item::Function(p)]).expect("clean compile");
    let def = &program.functions[&sym("p")];

    assert_eq!(def.sig.params[0].ty, Ty::option(Ty::F64));
    assert_eq!(def.sig.ret, Ty::F64);

    let mut saw_tag = false;
    ternc_tir::ir::walk_exprs(&def.body.stmts, &mut |e| {
        if matches!(e.kind, IrExpr::Tag(_)) {
            saw_tag = true;
        }
    });
    assert!(saw_tag, "null test should read the option discriminator");
}

// =============================================================================
// S4: borrowed composite parameters
// =============================================================================

#[test]
fn scenario_distance_borrows_points() {
    let mut b = B::new();
    let point = b.interface("Point", vec![("x", named("f64")), ("y", named("f64"))]);

    // function d(a: Point, b: Point): f64
    //   { return Math.sqrt((a.x-b.x)**2 + (a.y-b.y)**2) }
    let (pa, _) = b.param("a", named("Point"));
    let (pb, _) = b.param("b", named("Point"));

    let ax = {
        let a = b.ident("a");
        b.member(a, "x")
    };
    let bx = {
        let bb = b.ident("b");
        b.member(bb, "x")
    };
    let dx = b.binary(ternc_ast::BinaryOp::Sub, ax, bx);
    let two_a = b.num(2.0);
    let dx2 = b.binary(ternc_ast::BinaryOp::Pow, dx, two_a);

    let ay = {
        let a = b.ident("a");
        b.member(a, "y")
    };
    let by = {
        let bb = b.ident("b");
        b.member(bb, "y")
    };
    let dy = b.binary(ternc_ast::BinaryOp::Sub, ay, by);
    let two_b = b.num(2.0);
    let dy2 = b.binary(ternc_ast::BinaryOp::Pow, dy, two_b);

    let sum = b.binary(ternc_ast::BinaryOp::Add, dx2, dy2);
    let math = b.ident("Math");
    let sqrt = b.member(math, "sqrt");
    let call = b.expr(ExprKind::Call {
        callee: Box::new(sqrt),
        type_args: vec![],
        args: vec![sum],
    });

    let d = b.func("d", vec![], vec![pa, pb], named("f64"), vec![ret(call)]);

    let program = b.run(vec![point, Item::Function(d)]).expect("clean compile");
    let sig = &program.signatures[&sym("d")];

    assert_eq!(sig.params[0].mode, Some(ParamMode::Borrowed));
    assert_eq!(sig.params[1].mode, Some(ParamMode::Borrowed));

    // No retain/release anywhere in the body.
    let def = &program.functions[&sym("d")];
    fn has_rc(stmts: &[IrStmt]) -> bool {
        stmts.iter().any(|s| match s {
            IrStmt::Retain(_) | IrStmt::Release(_) => true,
            IrStmt::If {
                then_body,
                else_body,
                ..
            } => has_rc(then_body) || has_rc(else_body),
            IrStmt::Loop { body } => has_rc(body),
            _ => false,
        })
    }
    assert!(!has_rc(&def.body.stmts));
}

// =============================================================================
// S5: escaping closure gets a heap capture box
// =============================================================================

#[test]
fn scenario_counter_closure_boxes_capture() {
    let mut b = B::new();
    // function make(): () => i32 { let c = 0; return () => { c += 1; return c } }
    let c_def = b.declare("c", DefKind::Local);
    let c_binding = b.binding("c");
    b.scopes.record_resolution(c_binding.id, c_def);
    let zero = b.num(0.0);

    let c1 = b.ident_to("c", c_def);
    let one = b.num(1.0);
    let inc = b.expr(ExprKind::Assign {
        op: Some(ternc_ast::BinaryOp::Add),
        target: Box::new(c1),
        value: Box::new(one),
    });
    let c2 = b.ident_to("c", c_def);
    let arrow = b.expr(ExprKind::Arrow {
        params: vec![],
        ret: None,
        body: ternc_ast::ArrowBody::Block(vec![stmt(StmtKind::ExprStmt(inc)), ret(c2)]),
    });

    let fn_ty = TypeAnn::new(
        TypeAnnKind::Fn {
            params: vec![],
            ret: Box::new(named("i32")),
        },
        Span::DUMMY,
    );
    let make = b.func(
        "make",
        vec![],
        vec![],
        fn_ty,
        vec![
            stmt(StmtKind::Let(ternc_ast::LetStmt {
                pattern: Pattern::Ident(c_binding),
                ty: Some(named("i32")),
                init: Some(zero),
                mutable: true,
            })),
            ret(arrow),
        ],
    );

    let program = b.run(vec![Item::Function(make)]).expect("clean compile");

    // The closure escaped: its environment is a boxed heap capture.
    let closure = &program.functions[&sym("make$lambda0")];
    let env = closure.capture_env.as_ref().expect("captures recorded");
    assert!(env.boxed, "escaping closure must box its captures");
    assert_eq!(env.fields[0].name, sym("c"));

    // The returned function value carries the boxed environment pointer.
    let make_def = &program.functions[&sym("make")];
    let mut kind = None;
    ternc_tir::ir::walk_exprs(&make_def.body.stmts, &mut |e| {
        if let IrExpr::Closure { kind: k, .. } = &e.kind {
            kind = Some(*k);
        }
    });
    assert_eq!(kind, Some(CaptureKind::BoxedEnv));
}

// =============================================================================
// S6: throw and try/catch as Result threading
// =============================================================================

#[test]
fn scenario_throw_try_catch() {
    let mut b = B::new();
    // function parse(s: string): i32 { if (s === "") throw "empty"; return 0 }
    let (ps, s_def) = b.param("s", named("string"));
    let s1 = b.ident_to("s", s_def);
    let empty = b.string("");
    let cond = b.binary(ternc_ast::BinaryOp::Eq, s1, empty);
    let msg = b.string("empty");
    let zero = b.num(0.0);
    let parse = b.func(
        "parse",
        vec![],
        vec![ps],
        named("i32"),
        vec![
            stmt(StmtKind::If {
                cond,
                then_branch: Box::new(stmt(StmtKind::Throw(msg))),
                else_branch: None,
            }),
            ret(zero),
        ],
    );

    // try { parse(x) } catch (e) { print(e) }
    let input = b.string("x");
    let call = b.call("parse", vec![], vec![input]);
    let e_def = b.declare("e", DefKind::Local);
    let e_binding = b.binding("e");
    b.scopes.record_resolution(e_binding.id, e_def);
    let e_ref = b.ident_to("e", e_def);
    let print_call = b.call("print", vec![], vec![e_ref]);
    let main = b.func(
        "main",
        vec![],
        vec![],
        named("void"),
        vec![stmt(StmtKind::Try {
            block: vec![stmt(StmtKind::ExprStmt(call))],
            catch: Some(ternc_ast::CatchClause {
                binding: Some(e_binding),
                body: vec![stmt(StmtKind::ExprStmt(print_call))],
                span: Span::DUMMY,
            }),
            finally: None,
        })],
    );

    let program = b
        .run(vec![Item::Function(parse), Item::Function(main)])
        .expect("clean compile");

    // parse's return type became Result<Int32, String>.
    let parse_def = &program.functions[&sym("parse")];
    assert!(parse_def.throwing);
    assert_eq!(parse_def.sig.ret, Ty::result(Ty::I32, Ty::Str));

    // throw became return Err(…).
    let mut saw_err = false;
    ternc_tir::ir::walk_exprs(&parse_def.body.stmts, &mut |e| {
        if matches!(e.kind, IrExpr::ResultErr(_)) {
            saw_err = true;
        }
    });
    assert!(saw_err);

    // try/catch became a match on the result.
    let main_def = &program.functions[&sym("main")];
    assert!(main_def
        .body
        .stmts
        .iter()
        .any(|s| matches!(s, IrStmt::Match { .. })));
}

#[test]
fn scenario_finally_runs_on_every_path() {
    let mut b = B::new();
    // function parse(s: string): i32 { if (s === "") throw "empty"; return 0 }
    let (ps, s_def) = b.param("s", named("string"));
    let s1 = b.ident_to("s", s_def);
    let empty = b.string("");
    let cond = b.binary(ternc_ast::BinaryOp::Eq, s1, empty);
    let msg = b.string("empty");
    let zero = b.num(0.0);
    let parse = b.func(
        "parse",
        vec![],
        vec![ps],
        named("i32"),
        vec![
            stmt(StmtKind::If {
                cond,
                then_branch: Box::new(stmt(StmtKind::Throw(msg))),
                else_branch: None,
            }),
            ret(zero),
        ],
    );

    // try { parse("x") } catch (e) { handle(e) } finally { cleanup() }
    let input = b.string("x");
    let call = b.call("parse", vec![], vec![input]);
    let e_def = b.declare("e", DefKind::Local);
    let e_binding = b.binding("e");
    b.scopes.record_resolution(e_binding.id, e_def);
    let e_ref = b.ident_to("e", e_def);
    let handle_call = b.call("handle", vec![], vec![e_ref]);
    let cleanup_call = b.call("cleanup", vec![], vec![]);
    let main = b.func(
        "main",
        vec![],
        vec![],
        named("void"),
        vec![stmt(StmtKind::Try {
            block: vec![stmt(StmtKind::ExprStmt(call))],
            catch: Some(ternc_ast::CatchClause {
                binding: Some(e_binding),
                body: vec![stmt(StmtKind::ExprStmt(handle_call))],
                span: Span::DUMMY,
            }),
            finally: Some(vec![stmt(StmtKind::ExprStmt(cleanup_call))]),
        })],
    );

    let program = b
        .run(vec![Item::Function(parse), Item::Function(main)])
        .expect("clean compile");

    fn intrinsics_in(stmts: &[IrStmt]) -> Vec<&'static str> {
        let mut names = Vec::new();
        ternc_tir::ir::walk_exprs(stmts, &mut |e| {
            if let IrExpr::Fn(name) = &e.kind {
                names.push(name.as_str());
            }
        });
        names
    }

    // The cleanup block lands inside both arms of the result match.
    let main_def = &program.functions[&sym("main")];
    let IrStmt::Match { arms, .. } = &main_def.body.stmts[0] else {
        panic!("expected a match on the call result");
    };
    assert!(intrinsics_in(&arms[0].body).contains(&"__tern_cleanup"));
    let err_calls = intrinsics_in(&arms[1].body);
    assert!(err_calls.contains(&"__tern_handle"));
    assert!(err_calls.contains(&"__tern_cleanup"));
}

// =============================================================================
// Universal pipeline properties
// =============================================================================

#[test]
fn test_structural_identity_across_declarations() {
    let mut b = B::new();
    let point = b.interface("Point", vec![("x", named("f64")), ("y", named("f64"))]);
    let vec2 = b.interface("Vec2", vec![("x", named("f64")), ("y", named("f64"))]);

    let program = b.run(vec![point, vec2]).expect("clean compile");
    // Identical canonical signatures collapse to one entry, first name wins.
    let matching: Vec<_> = program
        .structs
        .iter()
        .filter(|s| s.fields.len() == 2)
        .collect();
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].name, sym("Point"));
}

#[test]
fn test_type_totality_through_pipeline() {
    let mut b = B::new();
    let (px, _) = b.param("x", named("f64"));
    let x = b.ident("x");
    let two = b.num(2.0);
    let double = b.binary(ternc_ast::BinaryOp::Mul, x, two);
    let f = b.func("double", vec![], vec![px], named("f64"), vec![ret(double)]);

    let program = b.run(vec![Item::Function(f)]).expect("clean compile");
    for def in program.functions.values() {
        ternc_tir::ir::walk_exprs(&def.body.stmts, &mut |e| {
            assert_ne!(e.ty, Ty::Never, "every expression carries a real type");
        });
    }
}

#[test]
fn test_allocations_all_placed() {
    let mut b = B::new();
    let point = b.interface("Point", vec![("x", named("f64"))]);
    let lit_x = b.num(1.0);
    let lit = b.expr(ExprKind::ObjectLit {
        fields: vec![ternc_ast::ObjectLitField {
            key: ternc_ast::ObjectKey::Ident(sym("x")),
            value: lit_x,
            span: Span::DUMMY,
        }],
    });
    let f = b.func("mk", vec![], vec![], named("Point"), vec![ret(lit)]);

    let program = b.run(vec![point, Item::Function(f)]).expect("clean compile");
    for def in program.functions.values() {
        ternc_tir::ir::walk_exprs(&def.body.stmts, &mut |e| {
            if let IrExpr::Alloc { placement, .. } = &e.kind {
                assert_ne!(*placement, AllocPlacement::Unplaced);
            }
        });
    }
}

#[test]
fn test_validator_rejection_is_per_declaration() {
    let mut b = B::new();
    let good = b.func("good", vec![], vec![], named("void"), vec![]);
    let mut bad = b.func("bad", vec![], vec![], named("void"), vec![]);
    bad.is_async = true;

    let err = b
        .run(vec![Item::Function(good), Item::Function(bad)])
        .expect_err("bad declaration fails the batch");
    // The batch carries the async rejection but the good declaration was
    // still validated and lowered (no knock-on diagnostics).
    assert_eq!(err.len(), 1);
    assert_eq!(err[0].kind, ternc_util::DiagnosticKind::UnsupportedConstruct);
}

#[test]
fn test_monomorphization_errors_abort() {
    let mut b = B::new();
    // Generic with no default and an uninferable parameter: f<T>(): void
    let f = b.func(
        "f",
        vec![TypeParam {
            name: sym("T"),
            constraint: None,
            default: None,
            span: Span::DUMMY,
        }],
        vec![],
        named("void"),
        vec![],
    );
    let call = b.call("f", vec![], vec![]);
    let main = b.func(
        "main",
        vec![],
        vec![],
        named("void"),
        vec![stmt(StmtKind::ExprStmt(call))],
    );

    let err = b
        .run(vec![Item::Function(f), Item::Function(main)])
        .expect_err("unresolved type parameter aborts");
    assert!(err
        .iter()
        .any(|d| d.kind == ternc_util::DiagnosticKind::UnresolvedTypeParameter));
}

#[test]
fn test_compile_wrapper_summarizes() {
    let mut b = B::new();
    let mut bad = b.func("bad", vec![], vec![], named("void"), vec![]);
    bad.is_generator = true;
    let items = vec![Item::Function(bad)];

    let session = Session::new();
    let modules = [Module {
        file: FileId::DUMMY,
        items,
    }];
    let err = compile(&session, &modules, &b.scopes, &ImportGraph::new())
        .expect_err("generator rejected");
    assert!(err.to_string().contains("diagnostic"));
}
