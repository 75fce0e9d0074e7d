//! Declaration checking scenarios.
//!
//! Modules are built by hand against a source string so diagnostics can be
//! rendered with the text they point at, and fix-its can be applied back to
//! the source.

use insta::assert_snapshot;
use tarn_ast::*;
use tarn_diag::{DiagId, Diagnostic};
use tarn_types::{ProtocolRef, Type};

use crate::{TypeChecker, ValidationState, check_module};

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

struct Fixture {
    src: &'static str,
    builder: ModuleBuilder,
}

impl Fixture {
    fn new(src: &'static str) -> Self {
        Self {
            src,
            builder: ModuleBuilder::new("main").with_source(src),
        }
    }

    /// Span of the `nth` occurrence of `needle`.
    fn span(&self, needle: &str, nth: usize) -> Span {
        let (start, _) = self
            .src
            .match_indices(needle)
            .nth(nth)
            .unwrap_or_else(|| panic!("no occurrence {nth} of {needle:?}"));
        Span::new(
            self.builder.file(),
            start as u32,
            (start + needle.len()) as u32,
        )
    }

    /// Span of the last `inner` within the `nth` occurrence of `outer`.
    fn span_in(&self, outer: &str, nth: usize, inner: &str) -> Span {
        let outer_span = self.span(outer, nth);
        let offset = outer.rfind(inner).expect("inner text") as u32;
        Span::new(
            outer_span.file,
            outer_span.start + offset,
            outer_span.start + offset + inner.len() as u32,
        )
    }

    fn ident(&self, name: &str, nth: usize) -> TypeRepr {
        Spanned::new(TypeReprKind::Ident(name.to_string()), self.span(name, nth))
    }

    fn add(&mut self, parent: Option<DeclId>, name: &str, nth: usize, kind: DeclKind) -> DeclId {
        let span = self.span(name, nth);
        self.add_at(parent, name, span, kind)
    }

    fn add_at(&mut self, parent: Option<DeclId>, name: &str, span: Span, kind: DeclKind) -> DeclId {
        self.builder.add_decl(parent, Decl::new(name, kind, span))
    }

    fn inherit(&mut self, decl: DeclId, entries: Vec<TypeRepr>) {
        self.builder.decl_mut(decl).inherited = entries;
    }

    fn decl_mut(&mut self, decl: DeclId) -> &mut Decl {
        self.builder.decl_mut(decl)
    }

    fn checker(self) -> TypeChecker {
        TypeChecker::new(self.builder.finish().expect("module links"))
    }
}

fn func() -> DeclKind {
    DeclKind::Func {
        signature: FuncSignature::default(),
        body: Vec::new(),
    }
}

fn var_of(ty: Option<TypeRepr>) -> DeclKind {
    DeclKind::Var {
        is_let: false,
        ty,
        init: None,
    }
}

fn case(raw_value: Option<Spanned<Literal>>) -> DeclKind {
    DeclKind::EnumCase {
        raw_value,
        params: Vec::new(),
    }
}

fn render(tc: &TypeChecker, src: &str) -> String {
    tc.diagnostics()
        .iter()
        .map(|diag| {
            let at = diag
                .location
                .map(|loc| &src[loc.start as usize..loc.end as usize])
                .unwrap_or("?");
            format!("{diag} @ `{at}`")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn apply_fix_its(src: &str, diag: &Diagnostic) -> String {
    let mut fixes = diag.fix_its.clone();
    fixes.sort_by_key(|fix| std::cmp::Reverse((fix.range.start, fix.range.end)));
    let mut out = src.to_string();
    for fix in fixes {
        out.replace_range(fix.range.start as usize..fix.range.end as usize, &fix.text);
    }
    out
}

fn ids(tc: &TypeChecker) -> Vec<DiagId> {
    tc.diagnostics().iter().map(|diag| diag.id).collect()
}

// ---------------------------------------------------------------------------
// Inheritance clauses
// ---------------------------------------------------------------------------

#[test]
fn superclass_listed_after_protocol_is_moved_to_front() {
    const SRC: &str = "protocol P {}\nclass C {}\nclass D: P, C {}";
    let mut fx = Fixture::new(SRC);
    fx.add(None, "P", 0, DeclKind::Protocol);
    let c = fx.add(None, "C", 0, DeclKind::Class);
    let d = fx.add(None, "D", 0, DeclKind::Class);
    let entries = vec![fx.ident("P", 1), fx.ident("C", 1)];
    fx.inherit(d, entries);
    let mut tc = fx.checker();

    check_module(&mut tc);

    assert_eq!(tc.superclass_decl(d), Some(c));
    assert_snapshot!(render(&tc, SRC), @"error[E0119]: superclass `C` must appear first in the inheritance clause @ `C`");
    assert_eq!(
        apply_fix_its(SRC, &tc.diagnostics()[0]),
        "protocol P {}\nclass C {}\nclass D: C, P {}"
    );
}

#[test]
fn duplicate_protocol_is_removed() {
    const SRC: &str = "protocol P {}\nstruct S: P, P {}";
    let mut fx = Fixture::new(SRC);
    fx.add(None, "P", 0, DeclKind::Protocol);
    let s = fx.add(None, "S", 0, DeclKind::Struct);
    let entries = vec![fx.ident("P", 1), fx.ident("P", 2)];
    fx.inherit(s, entries);
    let mut tc = fx.checker();

    check_module(&mut tc);

    assert_snapshot!(render(&tc, SRC), @"error[E0116]: duplicate inheritance from `P` @ `P`");
    assert_eq!(
        apply_fix_its(SRC, &tc.diagnostics()[0]),
        "protocol P {}\nstruct S: P {}"
    );
    assert_eq!(tc.inheritance_clause(s).protocols.len(), 1);
}

#[test]
fn second_superclass_is_rejected() {
    const SRC: &str = "class A {}\nclass B {}\nclass C: A, B {}";
    let mut fx = Fixture::new(SRC);
    let a = fx.add(None, "A", 0, DeclKind::Class);
    fx.add(None, "B", 0, DeclKind::Class);
    let c = fx.add(None, "C", 0, DeclKind::Class);
    let entries = vec![fx.ident("A", 1), fx.ident("B", 1)];
    fx.inherit(c, entries);
    let mut tc = fx.checker();

    check_module(&mut tc);

    assert_eq!(tc.superclass_decl(c), Some(a));
    assert_snapshot!(render(&tc, SRC), @"error[E0117]: class `C` cannot inherit from both `A` and `B` @ `B`");
}

#[test]
fn struct_cannot_inherit_from_class() {
    const SRC: &str = "class K {}\nstruct S: K {}";
    let mut fx = Fixture::new(SRC);
    fx.add(None, "K", 0, DeclKind::Class);
    let s = fx.add(None, "S", 0, DeclKind::Struct);
    let entries = vec![fx.ident("K", 1)];
    fx.inherit(s, entries);
    let mut tc = fx.checker();

    check_module(&mut tc);

    assert_eq!(ids(&tc), vec![DiagId::InheritanceFromNonProtocol]);
    assert_eq!(tc.superclass_decl(s), None);
}

#[test]
fn final_class_cannot_be_subclassed() {
    const SRC: &str = "final class F {}\nclass G: F {}";
    let mut fx = Fixture::new(SRC);
    let f = fx.add(None, "F", 0, DeclKind::Class);
    fx.decl_mut(f).attrs.is_final = true;
    let g = fx.add(None, "G", 0, DeclKind::Class);
    let entries = vec![fx.ident("F", 1)];
    fx.inherit(g, entries);
    let mut tc = fx.checker();

    check_module(&mut tc);

    assert_snapshot!(render(&tc, SRC), @"error[E0123]: inheritance from a final class `F` @ `F`");
}

#[test]
fn unresolved_inherited_name_is_diagnosed_once() {
    const SRC: &str = "class A: Nope {}";
    let mut fx = Fixture::new(SRC);
    let a = fx.add(None, "A", 0, DeclKind::Class);
    let entries = vec![fx.ident("Nope", 0)];
    fx.inherit(a, entries);
    let mut tc = fx.checker();

    check_module(&mut tc);
    assert_eq!(tc.inherited_type(a, 0), Type::Error);

    assert_snapshot!(render(&tc, SRC), @"error[E0115]: use of undeclared type `Nope` @ `Nope`");
}

#[test]
fn composition_alias_is_reported_as_itself() {
    const SRC: &str =
        "protocol P {}\nprotocol Q {}\ntypealias PQ = P & Q\nstruct S: PQ {}\nstruct T: P & Q {}";
    let mut fx = Fixture::new(SRC);
    let p = fx.add(None, "P", 0, DeclKind::Protocol);
    let q = fx.add(None, "Q", 0, DeclKind::Protocol);
    let composition = Spanned::new(
        TypeReprKind::Composition(vec![fx.ident("P", 2), fx.ident("Q", 2)]),
        fx.span("P & Q", 0),
    );
    let alias = fx.add(
        None,
        "PQ",
        0,
        DeclKind::TypeAlias {
            underlying: composition,
        },
    );
    let s = fx.add(None, "S", 0, DeclKind::Struct);
    let entries = vec![fx.ident("PQ", 1)];
    fx.inherit(s, entries);
    let t = fx.add(None, "T", 0, DeclKind::Struct);
    let inline = Spanned::new(
        TypeReprKind::Composition(vec![fx.ident("P", 4), fx.ident("Q", 4)]),
        fx.span("P & Q", 1),
    );
    fx.inherit(t, vec![inline]);
    let mut tc = fx.checker();

    assert_eq!(tc.inherited_decls_referenced(s, 0).as_slice(), &[alias]);
    assert_eq!(tc.inherited_decls_referenced(t, 0).as_slice(), &[p, q]);

    check_module(&mut tc);
    assert!(tc.diagnostics().is_empty(), "{}", render(&tc, SRC));
    let q_ref = ProtocolRef::declared(q, "Q");
    let s_ty = tc.declared_type(s);
    assert!(tc.conforms_to(&s_ty, &q_ref));
    let t_ty = tc.declared_type(t);
    assert!(tc.conforms_to(&t_ty, &q_ref));
}

#[test]
fn member_types_are_found_through_superclasses() {
    const SRC: &str = "class A {\n  struct Inner {}\n}\nclass B: A {}";
    let mut fx = Fixture::new(SRC);
    let a = fx.add(None, "A", 0, DeclKind::Class);
    let inner = fx.add(Some(a), "Inner", 0, DeclKind::Struct);
    let b = fx.add(None, "B", 0, DeclKind::Class);
    let entries = vec![fx.ident("A", 1)];
    fx.inherit(b, entries);
    let mut tc = fx.checker();

    let repr = Spanned::new(
        TypeReprKind::Member {
            base: Box::new(Spanned::new(
                TypeReprKind::Ident("B".to_string()),
                Span::synthetic(),
            )),
            name: "Inner".to_string(),
        },
        Span::synthetic(),
    );
    let ty = tc.resolve_type(&repr, None);
    assert_eq!(ty.nominal_decl(), Some(inner));
    assert!(tc.diagnostics().is_empty());
    assert!(tc.is_subclass_of(b, a));
    assert_eq!(tc.superclass_chain(b), vec![b, a]);
}

// ---------------------------------------------------------------------------
// Cycles
// ---------------------------------------------------------------------------

#[test]
fn class_cycle_is_reported_once_with_notes() {
    const SRC: &str = "class A: B {}\nclass B: A {}";
    let mut fx = Fixture::new(SRC);
    let a = fx.add(None, "A", 0, DeclKind::Class);
    let b = fx.add(None, "B", 1, DeclKind::Class);
    let a_entries = vec![fx.ident("B", 0)];
    fx.inherit(a, a_entries);
    let b_entries = vec![fx.ident("A", 1)];
    fx.inherit(b, b_entries);
    let mut tc = fx.checker();

    check_module(&mut tc);

    assert_snapshot!(render(&tc, SRC), @r"
    error[E0110]: circular class inheritance A -> B -> A @ `A`
    note[N0113]: class `B` declared here @ `B`
    ");
    assert!(tc.is_invalid(a));
    assert!(!tc.is_invalid(b));
    assert_eq!(tc.superclass_chain(a), vec![a, b]);
}

#[test]
fn protocol_refining_itself() {
    const SRC: &str = "protocol P: P {}";
    let mut fx = Fixture::new(SRC);
    let p = fx.add(None, "P", 0, DeclKind::Protocol);
    let entries = vec![fx.ident("P", 1)];
    fx.inherit(p, entries);
    let mut tc = fx.checker();

    check_module(&mut tc);

    assert_snapshot!(render(&tc, SRC), @"error[E0111]: protocol `P` refines itself @ `P`");
    assert!(tc.is_invalid(p));
}

#[test]
fn enum_raw_type_cycle() {
    const SRC: &str = "enum X: Y {}\nenum Y: X {}";
    let mut fx = Fixture::new(SRC);
    let x = fx.add(None, "X", 0, DeclKind::Enum);
    let y = fx.add(None, "Y", 1, DeclKind::Enum);
    let x_entries = vec![fx.ident("Y", 0)];
    fx.inherit(x, x_entries);
    let y_entries = vec![fx.ident("X", 1)];
    fx.inherit(y, y_entries);
    let mut tc = fx.checker();

    check_module(&mut tc);

    assert_snapshot!(render(&tc, SRC), @r"
    error[E0112]: circular enum raw types X -> Y -> X @ `X`
    note[N0113]: enum `Y` declared here @ `Y`
    error[E0200]: raw type `X` is not expressible by a string, integer, or floating-point literal @ `X`
    ");
}

#[test]
fn member_lookup_through_own_superclass_is_a_request_cycle() {
    const SRC: &str = "class A: A.Missing {}";
    let mut fx = Fixture::new(SRC);
    let a = fx.add(None, "A", 0, DeclKind::Class);
    let entry = Spanned::new(
        TypeReprKind::Member {
            base: Box::new(fx.ident("A", 1)),
            name: "Missing".to_string(),
        },
        fx.span("A.Missing", 0),
    );
    fx.inherit(a, vec![entry]);
    let mut tc = fx.checker();

    check_module(&mut tc);

    assert_snapshot!(render(&tc, SRC), @r"
    error[E0100]: circular reference to inheritance clause of `A` @ `A`
    note[N0101]: through reference to inherited type #0 of `A` here @ `A`
    note[N0101]: through reference to superclass of `A` here @ `A`
    error[E0801]: type `A` has no member `Missing` @ `A.Missing`
    ");
    assert_eq!(tc.stats().cycles_of("inheritance_clause"), 1);
    assert_eq!(tc.superclass_decl(a), None);
}

// ---------------------------------------------------------------------------
// Enum raw values
// ---------------------------------------------------------------------------

#[test]
fn duplicate_raw_value_points_at_both_literals() {
    const SRC: &str = "enum E: Int {\n  case a = 1\n  case b = 1\n}";
    let mut fx = Fixture::new(SRC);
    let e = fx.add(None, "E", 0, DeclKind::Enum);
    let entries = vec![fx.ident("Int", 0)];
    fx.inherit(e, entries);
    let first = fx.span("1", 0);
    let second = fx.span("1", 1);
    let a_span = fx.span_in("case a", 0, "a");
    let b_span = fx.span_in("case b", 0, "b");
    fx.add_at(Some(e), "a", a_span, case(Some(Spanned::new(Literal::Int(1), first))));
    let b = fx.add_at(Some(e), "b", b_span, case(Some(Spanned::new(Literal::Int(1), second))));
    let mut tc = fx.checker();

    check_module(&mut tc);

    assert_snapshot!(render(&tc, SRC), @r"
    error[E0207]: raw value for enum case is not unique @ `1`
    note[N0208]: raw value previously used here @ `1`
    ");
    let diags = tc.diagnostics();
    let not_unique: Vec<_> = diags
        .iter()
        .filter(|d| d.id == DiagId::EnumRawValueNotUnique)
        .collect();
    assert_eq!(not_unique.len(), 1);
    assert_eq!(not_unique[0].location, Some(second.loc()));
    assert_eq!(diags[1].location, Some(first.loc()));
    assert!(tc.is_invalid(b));
}

#[test]
fn auto_incremented_duplicate_explains_the_increment() {
    const SRC: &str = "enum E: Int {\n  case a = 1\n  case b\n  case c = 2\n}";
    let mut fx = Fixture::new(SRC);
    let e = fx.add(None, "E", 0, DeclKind::Enum);
    let entries = vec![fx.ident("Int", 0)];
    fx.inherit(e, entries);
    let one = fx.span("1", 0);
    let two = fx.span("2", 0);
    let a_span = fx.span_in("case a", 0, "a");
    let b_span = fx.span_in("case b", 0, "b");
    let c_span = fx.span_in("case c", 0, "c");
    fx.add_at(Some(e), "a", a_span, case(Some(Spanned::new(Literal::Int(1), one))));
    fx.add_at(Some(e), "b", b_span, case(None));
    fx.add_at(Some(e), "c", c_span, case(Some(Spanned::new(Literal::Int(2), two))));
    let mut tc = fx.checker();

    check_module(&mut tc);

    assert_snapshot!(render(&tc, SRC), @r"
    error[E0207]: raw value for enum case is not unique @ `2`
    note[N0208]: raw value previously used here @ `b`
    note[N0209]: raw value auto-incremented from here @ `1`
    ");
}

#[test]
fn raw_value_shape_errors() {
    const SRC: &str = "enum E: String {\n  case a = 1\n}\nenum F {\n  case b = 2\n}\nenum G: Int {}";
    let mut fx = Fixture::new(SRC);
    let e = fx.add(None, "E", 0, DeclKind::Enum);
    let entries = vec![fx.ident("String", 0)];
    fx.inherit(e, entries);
    let one = fx.span("1", 0);
    let a_span = fx.span_in("case a", 0, "a");
    fx.add_at(Some(e), "a", a_span, case(Some(Spanned::new(Literal::Int(1), one))));
    let f = fx.add(None, "F", 0, DeclKind::Enum);
    let two = fx.span("2", 0);
    let b_span = fx.span_in("case b", 0, "b");
    fx.add_at(Some(f), "b", b_span, case(Some(Spanned::new(Literal::Int(2), two))));
    let g = fx.add(None, "G", 0, DeclKind::Enum);
    let entries = vec![fx.ident("Int", 0)];
    fx.inherit(g, entries);
    let mut tc = fx.checker();

    check_module(&mut tc);

    assert_snapshot!(render(&tc, SRC), @r"
    error[E0205]: cannot convert value of type `Int` to raw type `String` @ `1`
    error[E0202]: enum case cannot have a raw value if the enum does not have a raw type @ `2`
    error[E0201]: an enum with no cases cannot declare a raw type @ `Int`
    ");
}

#[test]
fn auto_increment_past_the_largest_int_overflows() {
    const SRC: &str = "enum E: Int {\n  case a = 9223372036854775807\n  case b\n}";
    let mut fx = Fixture::new(SRC);
    let e = fx.add(None, "E", 0, DeclKind::Enum);
    let entries = vec![fx.ident("Int", 0)];
    fx.inherit(e, entries);
    let max = fx.span("9223372036854775807", 0);
    let a_span = fx.span_in("case a", 0, "a");
    let b_span = fx.span_in("case b", 0, "b");
    fx.add_at(Some(e), "a", a_span, case(Some(Spanned::new(Literal::Int(i64::MAX), max))));
    fx.add_at(Some(e), "b", b_span, case(None));
    let mut tc = fx.checker();

    check_module(&mut tc);

    assert_snapshot!(render(&tc, SRC), @"error[E0211]: auto-incremented raw value overflows raw type `Int` @ `b`");
}

// ---------------------------------------------------------------------------
// Redeclarations
// ---------------------------------------------------------------------------

fn unlabeled_int_param(fx: &Fixture, name: &str, int_nth: usize) -> ParamDecl {
    ParamDecl {
        label: None,
        name: Spanned::new(name.to_string(), fx.span_in(&format!("_ {name}"), 0, name)),
        ty: fx.ident("Int", int_nth),
        has_default: false,
    }
}

#[test]
fn identical_functions_conflict_at_the_later_one() {
    const SRC: &str = "func move(_ x: Int) {}\nfunc move(_ y: Int) {}";
    let mut fx = Fixture::new(SRC);
    let x = unlabeled_int_param(&fx, "x", 0);
    let y = unlabeled_int_param(&fx, "y", 1);
    let first = fx.add(
        None,
        "move",
        0,
        DeclKind::Func {
            signature: FuncSignature {
                params: vec![x],
                result: None,
            },
            body: Vec::new(),
        },
    );
    let second = fx.add(
        None,
        "move",
        1,
        DeclKind::Func {
            signature: FuncSignature {
                params: vec![y],
                result: None,
            },
            body: Vec::new(),
        },
    );
    let second_span = fx.span("move", 1);
    let mut tc = fx.checker();

    check_module(&mut tc);

    assert_snapshot!(render(&tc, SRC), @r"
    error[E0300]: invalid redeclaration of `move(_:)` @ `move`
    note[N0301]: `move(_:)` previously declared here @ `move`
    ");
    assert_eq!(tc.diagnostics()[0].location, Some(second_span.loc()));
    assert!(tc.is_invalid(second));
    assert!(!tc.is_invalid(first));
}

#[test]
fn overloads_on_labels_or_types_do_not_conflict() {
    const SRC: &str = "func f(a: Int) {}\nfunc f(b: Int) {}\nfunc f(a: String) {}\nvar f: Int";
    let mut fx = Fixture::new(SRC);
    let labelled = |fx: &Fixture, label: &str, ty: TypeRepr, nth: usize| ParamDecl {
        label: Some(label.to_string()),
        name: Spanned::new(label.to_string(), fx.span(&format!("{label}:"), nth)),
        ty,
        has_default: false,
    };
    let params = [
        labelled(&fx, "a", fx.ident("Int", 0), 0),
        labelled(&fx, "b", fx.ident("Int", 1), 0),
        labelled(&fx, "a", fx.ident("String", 0), 1),
    ];
    for (nth, param) in params.into_iter().enumerate() {
        let name_span = fx.span_in("func f", nth, "f");
        fx.add_at(
            None,
            "f",
            name_span,
            DeclKind::Func {
                signature: FuncSignature {
                    params: vec![param],
                    result: None,
                },
                body: Vec::new(),
            },
        );
    }
    let int = fx.ident("Int", 2);
    let var_span = fx.span_in("var f", 0, "f");
    fx.add_at(None, "f", var_span, var_of(Some(int)));
    let mut tc = fx.checker();

    check_module(&mut tc);

    assert!(tc.diagnostics().is_empty(), "{}", render(&tc, SRC));
}

#[test]
fn overloads_on_result_type_do_not_conflict() {
    const SRC: &str = "func f() -> Int {}\nfunc f() -> String {}\nfunc f() -> Int {}";
    let mut fx = Fixture::new(SRC);
    let results = [fx.ident("Int", 0), fx.ident("String", 0), fx.ident("Int", 1)];
    let mut decls = Vec::new();
    for (nth, result) in results.into_iter().enumerate() {
        let name_span = fx.span_in("func f", nth, "f");
        decls.push(fx.add_at(
            None,
            "f",
            name_span,
            DeclKind::Func {
                signature: FuncSignature {
                    params: Vec::new(),
                    result: Some(result),
                },
                body: Vec::new(),
            },
        ));
    }
    let clash = fx.span_in("func f", 2, "f");
    let mut tc = fx.checker();

    check_module(&mut tc);

    // Only the second `-> Int` clashes, and only with the first.
    assert_eq!(ids(&tc), vec![DiagId::InvalidRedecl, DiagId::InvalidRedeclPrev]);
    assert_eq!(tc.diagnostics()[0].location, Some(clash.loc()));
    assert!(!tc.is_invalid(decls[0]));
    assert!(!tc.is_invalid(decls[1]));
    assert!(tc.is_invalid(decls[2]));
}

// ---------------------------------------------------------------------------
// Overrides
// ---------------------------------------------------------------------------

#[test]
fn override_checking() {
    const SRC: &str = "class Base {\n  func run() {}\n  final func stop() {}\n}\n\
                       class Sub: Base {\n  func run() {}\n  override func stop() {}\n  override func jump() {}\n}";
    let mut fx = Fixture::new(SRC);
    let base = fx.add(None, "Base", 0, DeclKind::Class);
    let base_run = fx.add(Some(base), "run", 0, func());
    let base_stop = fx.add(Some(base), "stop", 0, func());
    fx.decl_mut(base_stop).attrs.is_final = true;
    let sub = fx.add(None, "Sub", 0, DeclKind::Class);
    let entries = vec![fx.ident("Base", 1)];
    fx.inherit(sub, entries);
    let sub_run = fx.add(Some(sub), "run", 1, func());
    let run_extent = fx.span("func run() {}", 1);
    fx.decl_mut(sub_run).span = run_extent;
    let sub_stop = fx.add(Some(sub), "stop", 1, func());
    fx.decl_mut(sub_stop).attrs.is_override = true;
    let jump = fx.add(Some(sub), "jump", 0, func());
    fx.decl_mut(jump).attrs.is_override = true;
    let mut tc = fx.checker();

    check_module(&mut tc);

    assert_snapshot!(render(&tc, SRC), @r"
    error[E0304]: overriding declaration requires an `override` keyword @ `run`
    error[E0305]: `stop()` overrides a `final` declaration @ `stop`
    note[N0307]: overridden declaration is here @ `stop`
    error[E0302]: method does not override any method from its superclass @ `jump`
    ");
    assert!(
        apply_fix_its(SRC, &tc.diagnostics()[0]).contains("  override func run() {}\n  override func stop")
    );
    assert_eq!(tc.overridden_decls(sub_run).as_slice(), &[base_run]);
    assert_eq!(tc.overridden_decls(sub_stop).as_slice(), &[base_stop]);
    assert!(tc.overridden_decls(jump).is_empty());
    assert!(tc.is_final(base_stop));
    assert!(!tc.is_final(sub_run));

    let found = tc.lookup_value_members(sub, "run");
    assert_eq!(found, vec![sub_run]);
}

#[test]
fn protocol_requirement_overrides_one_per_parent() {
    const SRC: &str = "protocol P {\n  func f()\n}\nprotocol Q {\n  func f()\n}\nprotocol R: P, Q {\n  func f()\n}";
    let mut fx = Fixture::new(SRC);
    let p = fx.add(None, "P", 0, DeclKind::Protocol);
    let pf_span = fx.span_in("func f", 0, "f");
    let pf = fx.add_at(Some(p), "f", pf_span, func());
    let q = fx.add(None, "Q", 0, DeclKind::Protocol);
    let qf_span = fx.span_in("func f", 1, "f");
    let qf = fx.add_at(Some(q), "f", qf_span, func());
    let r = fx.add(None, "R", 0, DeclKind::Protocol);
    let entries = vec![fx.ident("P", 1), fx.ident("Q", 1)];
    fx.inherit(r, entries);
    let rf_span = fx.span_in("func f", 2, "f");
    let rf = fx.add_at(Some(r), "f", rf_span, func());
    let mut tc = fx.checker();

    assert_eq!(tc.overridden_decls(rf).as_slice(), &[pf, qf]);
    check_module(&mut tc);
    assert!(tc.diagnostics().is_empty(), "{}", render(&tc, SRC));
}

// ---------------------------------------------------------------------------
// Property wrappers
// ---------------------------------------------------------------------------

#[test]
fn property_wrappers() {
    const SRC: &str = "@propertyWrapper struct Clamped<T> {\n  var wrappedValue: T\n  var projectedValue: Int\n}\n\
                       @propertyWrapper struct Broken {}\n\
                       struct S {\n  @Clamped var x: Int\n  @Missing var y: Int\n}";
    let mut fx = Fixture::new(SRC);
    let clamped = fx.add(None, "Clamped", 0, DeclKind::Struct);
    let t_span = fx.span_in("Clamped<T>", 0, "T");
    {
        let decl = fx.decl_mut(clamped);
        decl.attrs.is_property_wrapper = true;
        decl.generic_params = vec![GenericParamDecl {
            name: Spanned::new("T".to_string(), t_span),
            constraints: Vec::new(),
        }];
    }
    let t_repr = Spanned::new(
        TypeReprKind::Ident("T".to_string()),
        fx.span_in("wrappedValue: T", 0, "T"),
    );
    let wrapped = fx.add(Some(clamped), "wrappedValue", 0, var_of(Some(t_repr)));
    let int = fx.ident("Int", 0);
    let projected = fx.add(Some(clamped), "projectedValue", 0, var_of(Some(int)));
    let broken = fx.add(None, "Broken", 0, DeclKind::Struct);
    fx.decl_mut(broken).attrs.is_property_wrapper = true;

    let s = fx.add(None, "S", 0, DeclKind::Struct);
    let x_span = fx.span_in("var x", 0, "x");
    let x_ty = fx.ident("Int", 1);
    let x = fx.add_at(Some(s), "x", x_span, var_of(Some(x_ty)));
    let clamped_attr = fx.span("Clamped", 1);
    fx.decl_mut(x).attrs.custom = vec![CustomAttr {
        name: Spanned::new("Clamped".to_string(), clamped_attr),
    }];
    let y_span = fx.span_in("var y", 0, "y");
    let y_ty = fx.ident("Int", 2);
    let y = fx.add_at(Some(s), "y", y_span, var_of(Some(y_ty)));
    let missing_attr = fx.span("Missing", 0);
    fx.decl_mut(y).attrs.custom = vec![CustomAttr {
        name: Spanned::new("Missing".to_string(), missing_attr),
    }];
    let mut tc = fx.checker();

    check_module(&mut tc);

    assert_snapshot!(render(&tc, SRC), @r"
    error[E0400]: property wrapper type `Broken` does not contain a non-static property named `wrappedValue` @ `Broken`
    error[E0401]: unknown attribute `Missing` @ `Missing`
    ");

    let info = tc.property_wrapper_type_info(clamped);
    assert!(info.is_valid());
    assert_eq!(info.value_var, Some(wrapped));
    assert_eq!(info.projected_value_var, Some(projected));
    assert!(!tc.property_wrapper_type_info(broken).is_valid());

    let backing = tc.backing_property_info(x);
    assert_eq!(backing.backing_var_name, "_x");
    assert_eq!(backing.projection_var_name.as_deref(), Some("$x"));
    assert_eq!(backing.backing_type.to_string(), "Clamped<Int>");
    assert_eq!(backing.wrappers, vec![clamped]);
    assert!(tc.backing_property_info(y).is_empty());
}

// ---------------------------------------------------------------------------
// USRs
// ---------------------------------------------------------------------------

#[test]
fn usrs_and_local_type_mangling() {
    const SRC: &str = "struct Outer {\n  func move(_ a: Int, to b: Int) {}\n  static var count: Int\n  func make() {\n    struct Local {}\n    struct Local {}\n  }\n}";
    let mut fx = Fixture::new(SRC);
    let outer = fx.add(None, "Outer", 0, DeclKind::Struct);
    let params = vec![
        ParamDecl {
            label: None,
            name: Spanned::new("a".to_string(), fx.span_in("_ a", 0, "a")),
            ty: fx.ident("Int", 0),
            has_default: false,
        },
        ParamDecl {
            label: Some("to".to_string()),
            name: Spanned::new("b".to_string(), fx.span_in("to b", 0, "b")),
            ty: fx.ident("Int", 1),
            has_default: false,
        },
    ];
    let mv = fx.add(
        Some(outer),
        "move",
        0,
        DeclKind::Func {
            signature: FuncSignature {
                params,
                result: None,
            },
            body: Vec::new(),
        },
    );
    let int = fx.ident("Int", 2);
    let count = fx.add(Some(outer), "count", 0, var_of(Some(int)));
    fx.decl_mut(count).attrs.is_static = true;
    let make = fx.add(Some(outer), "make", 0, func());
    let first_local = fx.add(Some(make), "Local", 0, DeclKind::Struct);
    let second_local = fx.add(Some(make), "Local", 1, DeclKind::Struct);
    let mut tc = fx.checker();

    assert_eq!(tc.usr(outer), "s:4main5OuterV");
    assert_eq!(tc.usr(mv), "s:4main5OuterV11move(_:to:)F");
    assert_eq!(tc.usr(count), "s:4main5OuterV5countZv");
    assert_eq!(tc.mangle_local_type(first_local), "$s4main5OuterV6make()F5LocalL0_V");
    assert_eq!(tc.mangle_local_type(second_local), "$s4main5OuterV6make()F5LocalL1_V");
    assert_eq!(tc.usr(second_local), "s:4main5OuterV6make()F5LocalL1_V");
}

// ---------------------------------------------------------------------------
// Caching and validation
// ---------------------------------------------------------------------------

#[test]
fn separately_cached_requests_execute_once() {
    const SRC: &str = "class A {}\nclass B: A {}";
    let mut fx = Fixture::new(SRC);
    let a = fx.add(None, "A", 0, DeclKind::Class);
    let b = fx.add(None, "B", 0, DeclKind::Class);
    let entries = vec![fx.ident("A", 1)];
    fx.inherit(b, entries);
    let mut tc = fx.checker();

    assert_eq!(tc.superclass_decl(b), Some(a));
    assert_eq!(tc.superclass_decl(b), Some(a));
    assert_eq!(tc.stats().executions_of("superclass_decl"), 1);
    assert_eq!(tc.stats().cache_hits_of("superclass_decl"), 1);
    assert_eq!(tc.stats().executions_of("inheritance_clause"), 1);
    assert_eq!(tc.cx.caches.superclass_decls.get(&b), Some(&Some(a)));
}

#[test]
fn inherited_decls_referenced_is_never_cached() {
    const SRC: &str = "protocol P {}\nstruct S: P {}";
    let mut fx = Fixture::new(SRC);
    let p = fx.add(None, "P", 0, DeclKind::Protocol);
    let s = fx.add(None, "S", 0, DeclKind::Struct);
    let entries = vec![fx.ident("P", 1)];
    fx.inherit(s, entries);
    let mut tc = fx.checker();

    assert_eq!(tc.inherited_decls_referenced(s, 0).as_slice(), &[p]);
    assert_eq!(tc.inherited_decls_referenced(s, 0).as_slice(), &[p]);
    assert_eq!(tc.stats().executions_of("inherited_decls_referenced"), 2);
}

#[test]
fn validation_walks_to_a_terminal_state() {
    const SRC: &str = "var good: Int\nvar bad: Nope";
    let mut fx = Fixture::new(SRC);
    let int = fx.ident("Int", 0);
    let good = fx.add(None, "good", 0, var_of(Some(int)));
    let nope = fx.ident("Nope", 0);
    let bad = fx.add(None, "bad", 0, var_of(Some(nope)));
    let mut tc = fx.checker();

    assert_eq!(tc.validation(good), ValidationState::Unvalidated);
    check_module(&mut tc);
    assert_eq!(tc.validation(good), ValidationState::Validated);
    assert_eq!(tc.validation(bad), ValidationState::Invalid);
    assert_eq!(tc.interface_type(good), Type::Int);
    assert_eq!(ids(&tc), vec![DiagId::UseOfUndeclaredType]);
}
