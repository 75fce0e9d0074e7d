//! Property tests for the sibling passes.
//!
//! 1. Among functions that differ only in argument labels, exactly the later
//!    copies of a repeated label list are redeclarations.
//! 2. Enum raw values report one duplicate per case whose value (explicit or
//!    auto-incremented) was already taken.

use proptest::prelude::*;
use rustc_hash::FxHashSet;
use tarn_ast::*;
use tarn_diag::DiagId;

use crate::{TypeChecker, check_module};

fn count(tc: &TypeChecker, id: DiagId) -> usize {
    tc.diagnostics().iter().filter(|diag| diag.id == id).count()
}

fn arb_labels() -> impl Strategy<Value = Vec<Option<String>>> {
    prop::collection::vec(
        prop_oneof![Just(None), Just(Some("a".to_string())), Just(Some("b".to_string()))],
        0..3,
    )
}

/// `func f(a p0: Int, _ p1: Int) {}`, one per line.
fn overloads(signatures: &[Vec<Option<String>>]) -> (TypeChecker, Vec<DeclId>) {
    let lines: Vec<String> = signatures
        .iter()
        .map(|labels| {
            let params: Vec<String> = labels
                .iter()
                .enumerate()
                .map(|(i, label)| format!("{} p{i}: Int", label.as_deref().unwrap_or("_")))
                .collect();
            format!("func f({}) {{}}\n", params.join(", "))
        })
        .collect();
    let src = lines.concat();
    let mut builder = ModuleBuilder::new("main").with_source(src.clone());
    let file = builder.file();

    let mut decls = Vec::new();
    let mut start = 0;
    for (line, labels) in lines.iter().zip(signatures) {
        let at = |offset: usize, len: usize| Span::new(file, (start + offset) as u32, (start + offset + len) as u32);
        let ints: Vec<usize> = line.match_indices("Int").map(|(offset, _)| offset).collect();
        let params = labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let name = format!("p{i}");
                let name_at = line.find(&format!("{name}:")).unwrap_or_default();
                ParamDecl {
                    label: label.clone(),
                    name: Spanned::new(name.clone(), at(name_at, name.len())),
                    ty: Spanned::new(TypeReprKind::Ident("Int".to_string()), at(ints[i], 3)),
                    has_default: false,
                }
            })
            .collect();
        let kind = DeclKind::Func {
            signature: FuncSignature { params, result: None },
            body: Vec::new(),
        };
        decls.push(builder.add_decl(None, Decl::new("f", kind, at(5, 1))));
        start += line.len();
    }
    (TypeChecker::new(builder.finish().expect("module links")), decls)
}

/// `enum E: Int` with one case per entry; `None` leaves the value implicit.
fn int_enum(values: &[Option<i64>]) -> TypeChecker {
    let mut src = String::from("enum E: Int {\n");
    let mut layout = Vec::new();
    for (i, value) in values.iter().enumerate() {
        let name = format!("c{i}");
        let name_at = src.len() + "  case ".len();
        let literal_at = name_at + name.len() + " = ".len();
        match value {
            Some(v) => src.push_str(&format!("  case {name} = {v}\n")),
            None => src.push_str(&format!("  case {name}\n")),
        }
        layout.push((name, name_at, literal_at));
    }
    src.push('}');

    let mut builder = ModuleBuilder::new("main").with_source(src);
    let file = builder.file();
    let e = builder.add_decl(None, Decl::new("E", DeclKind::Enum, Span::new(file, 5, 6)));
    builder.decl_mut(e).inherited = vec![Spanned::new(TypeReprKind::Ident("Int".to_string()), Span::new(file, 8, 11))];
    for ((name, name_at, literal_at), value) in layout.into_iter().zip(values) {
        let raw_value = value.map(|v| {
            let len = v.to_string().len() as u32;
            Spanned::new(Literal::Int(v), Span::new(file, literal_at as u32, literal_at as u32 + len))
        });
        let span = Span::new(file, name_at as u32, (name_at + name.len()) as u32);
        builder.add_decl(Some(e), Decl::new(name, DeclKind::EnumCase { raw_value, params: Vec::new() }, span));
    }
    TypeChecker::new(builder.finish().expect("module links"))
}

proptest! {
    #[test]
    fn repeated_label_lists_are_redeclarations(signatures in prop::collection::vec(arb_labels(), 1..6)) {
        let (mut tc, decls) = overloads(&signatures);
        check_module(&mut tc);

        let mut seen = FxHashSet::default();
        let mut expected = 0;
        for (decl, labels) in decls.iter().zip(&signatures) {
            let repeated = !seen.insert(labels.clone());
            expected += usize::from(repeated);
            prop_assert_eq!(tc.is_invalid(*decl), repeated, "{:?}", signatures);
        }
        prop_assert_eq!(count(&tc, DiagId::InvalidRedecl), expected);
        prop_assert_eq!(count(&tc, DiagId::InvalidRedeclPrev), expected);
    }

    #[test]
    fn raw_value_duplicates_follow_auto_increment(
        values in prop::collection::vec(prop::option::of(0i64..6), 1..8),
    ) {
        let mut tc = int_enum(&values);
        check_module(&mut tc);

        let mut seen = FxHashSet::default();
        let mut previous: Option<i64> = None;
        let mut duplicates = 0;
        for value in &values {
            let value = value.unwrap_or_else(|| previous.map_or(0, |p| p + 1));
            duplicates += usize::from(!seen.insert(value));
            previous = Some(value);
        }
        prop_assert_eq!(count(&tc, DiagId::EnumRawValueNotUnique), duplicates, "{:?}", values);
        prop_assert_eq!(count(&tc, DiagId::EnumRawValueUsedHere), duplicates);
        prop_assert!(!tc.diagnostics().iter().any(|d| d.id == DiagId::EnumNonIntegerRawValueAutoIncrement));
    }
}
