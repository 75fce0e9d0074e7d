//! Property tests for locators, fixes, scoring and literal checking.
//!
//! Properties covered:
//!
//! 1. Simplifying a locator keeps its anchor and drops exactly the
//!    synthetic path elements.
//! 2. Resolving a locator never leaves the module and only shortens the
//!    path.
//! 3. Every fix explains itself at its own locator.
//! 4. Scores order lexicographically, fixes first.
//! 5. Ranking picks a minimal score.
//! 6. A literal initializer either checks cleanly or produces exactly one
//!    error, whatever its annotation.

use proptest::prelude::*;
use tarn_ast::{Decl, DeclKind, ExprId, ExprKind, Literal, ModuleBuilder, Span, Spanned, TypeRepr, TypeReprKind};
use tarn_sema::{TypeChecker, check_module};
use tarn_types::Type;

use crate::cs::Solution;
use crate::diagnostics::FailureKind;
use crate::fix::{ConstraintFix, FixKind};
use crate::locator::{ConstraintLocator, ContextualPurpose, PathElt};
use crate::score::{Ranking, Score, rank};
use crate::trace::{SolveAction, Trace};
use crate::check_bodies;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_leaf_type() -> impl Strategy<Value = Type> {
    prop_oneof![
        Just(Type::Int),
        Just(Type::Double),
        Just(Type::Bool),
        Just(Type::String),
        Just(Type::Void),
        Just(Type::Any),
    ]
}

fn arb_type() -> impl Strategy<Value = Type> {
    arb_leaf_type().prop_recursive(3, 12, 3, |inner| {
        prop_oneof![
            inner.clone().prop_map(Type::optional),
            inner.clone().prop_map(Type::array),
            prop::collection::vec(inner, 0..3).prop_map(Type::Tuple),
        ]
    })
}

fn arb_path_elt() -> impl Strategy<Value = PathElt> {
    prop_oneof![
        Just(PathElt::ApplyFunction),
        (0usize..3, 0usize..3).prop_map(|(arg, param)| PathElt::ApplyArgToParam { arg, param }),
        (0usize..3).prop_map(PathElt::FunctionArgument),
        Just(PathElt::FunctionResult),
        Just(PathElt::Member),
        Just(PathElt::MemberRefBase),
        (0usize..3).prop_map(PathElt::TupleElement),
        (0usize..3).prop_map(PathElt::ArrayElement),
        Just(PathElt::ClosureResult),
        Just(PathElt::ContextualType(ContextualPurpose::Initialization)),
        Just(PathElt::ContextualType(ContextualPurpose::Return)),
        (0usize..3).prop_map(PathElt::KeyPathComponent),
        Just(PathElt::LValueConversion),
        Just(PathElt::RValueAdjustment),
        Just(PathElt::OptionalPayload),
        Just(PathElt::AutoclosureResult),
        Just(PathElt::ImplicitConversion),
    ]
}

fn arb_path() -> impl Strategy<Value = Vec<PathElt>> {
    prop::collection::vec(arb_path_elt(), 0..6)
}

fn arb_fix_kind() -> impl Strategy<Value = FixKind> {
    prop_oneof![
        (arb_type(), arb_type()).prop_map(|(base, unwrapped)| FixKind::ForceOptional {
            base: Type::optional(base),
            unwrapped,
        }),
        (arb_type(), arb_type()).prop_map(|(from, to)| FixKind::ContextualMismatch { from, to }),
        arb_type().prop_map(|base| FixKind::RemoveUnwrap { base }),
        arb_type().prop_map(|ty| FixKind::AddressOf { ty }),
        Just(FixKind::TreatRValueAsLValue),
        Just(FixKind::InsertCall),
        Just(FixKind::RemoveReturn),
        prop::collection::vec(prop::option::of("[a-z]{1,4}"), 0..4)
            .prop_map(|labels| FixKind::RelabelArguments { labels }),
        (0usize..4, 0usize..4).prop_map(|(arg, prev_arg)| FixKind::MoveOutOfOrderArgument { arg, prev_arg }),
        (arb_type(), "[a-z]{1,6}").prop_map(|(base, name)| FixKind::DefineMemberBasedOnUse { base, name }),
        prop::collection::vec("[A-Z]", 1..3)
            .prop_map(|params| FixKind::ExplicitlySpecifyGenericArguments { params }),
    ]
}

fn arb_score() -> impl Strategy<Value = Score> {
    (0u32..3, 0u32..3, 0u32..3, 0u32..3, 0u32..3).prop_map(
        |(error_fixes, warning_fixes, inaccessible_choices, defaulted_generics, generic_overloads)| Score {
            error_fixes,
            warning_fixes,
            inaccessible_choices,
            defaulted_generics,
            generic_overloads,
        },
    )
}

/// A module holding a single integer literal, returned with its id.
fn leaf_module() -> (tarn_ast::Module, ExprId) {
    let mut builder = ModuleBuilder::new("leaf").with_source("1");
    let span = Span::new(builder.file(), 0, 1);
    let leaf = builder.add_expr(ExprKind::Literal(Literal::Int(1)), span);
    (builder.finish().expect("module links"), leaf)
}

// ---------------------------------------------------------------------------
// Locators
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn simplified_keeps_anchor_and_source_elements(path in arb_path()) {
        let (_, leaf) = leaf_module();
        let locator = ConstraintLocator::with_path(Some(leaf), path.clone());
        let simplified = locator.simplified();

        prop_assert_eq!(simplified.anchor, Some(leaf));
        let expected: Vec<PathElt> = path.into_iter().filter(|elt| !elt.is_synthetic()).collect();
        prop_assert_eq!(simplified.path.to_vec(), expected);
        prop_assert_eq!(simplified.simplified(), simplified);
    }

    #[test]
    fn resolving_on_a_leaf_stays_put_and_shortens(path in arb_path()) {
        let (module, leaf) = leaf_module();
        let locator = ConstraintLocator::with_path(Some(leaf), path);
        let resolved = locator.resolve(&module);
        let simplified = locator.simplified();

        prop_assert_eq!(resolved.anchor, Some(leaf));
        prop_assert!(resolved.path.len() <= simplified.path.len());
        prop_assert!(simplified.path.ends_with(&resolved.path));
        prop_assert!(resolved.path.iter().all(|elt| !elt.is_synthetic()));
    }
}

// ---------------------------------------------------------------------------
// Fixes
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn every_fix_explains_itself_at_its_locator(
        kind in arb_fix_kind(),
        path in arb_path(),
        warning in any::<bool>(),
    ) {
        let (_, leaf) = leaf_module();
        let locator = ConstraintLocator::with_path(Some(leaf), path);
        let fix = if warning {
            ConstraintFix::warning(kind, locator.clone())
        } else {
            ConstraintFix::new(kind, locator.clone())
        };
        let failure = fix.failure();
        prop_assert_eq!(&failure.locator, &locator);
        prop_assert!(!fix.name().is_empty());
        // Deterministic: asking twice gives the same failure.
        prop_assert_eq!(fix.failure(), failure);
    }

    #[test]
    fn force_optional_is_explained_as_missing_unwrap(base in arb_type(), unwrapped in arb_type()) {
        let (_, leaf) = leaf_module();
        let base = Type::optional(base);
        let fix = ConstraintFix::new(
            FixKind::ForceOptional { base: base.clone(), unwrapped: unwrapped.clone() },
            ConstraintLocator::new(leaf),
        );
        prop_assert_eq!(fix.failure().kind, FailureKind::MissingOptionalUnwrap { base, unwrapped });
    }
}

// ---------------------------------------------------------------------------
// Scores and ranking
// ---------------------------------------------------------------------------

fn key(score: &Score) -> (u32, u32, u32, u32, u32) {
    (
        score.error_fixes,
        score.warning_fixes,
        score.inaccessible_choices,
        score.defaulted_generics,
        score.generic_overloads,
    )
}

proptest! {
    #[test]
    fn scores_order_lexicographically(a in arb_score(), b in arb_score()) {
        prop_assert_eq!(a.cmp(&b), key(&a).cmp(&key(&b)));
        prop_assert_eq!(a < b, b > a);
        prop_assert_eq!(a.has_fixes(), a.error_fixes + a.warning_fixes > 0);
    }

    #[test]
    fn ranking_picks_first_minimal_score(scores in prop::collection::vec(arb_score(), 1..6)) {
        let solutions: Vec<Solution> = scores
            .iter()
            .map(|score| Solution { score: *score, ..Solution::default() })
            .collect();
        let best = scores.iter().min().copied();
        let first_best = scores.iter().position(|s| Some(*s) == best);
        // Without overloads every tie is the same answer.
        prop_assert_eq!(rank(&solutions), Ranking::Best(first_best.unwrap_or_default()));
    }

    #[test]
    fn trace_keeps_at_most_limit_steps(limit in 0usize..8, records in 0usize..16) {
        let mut trace = Trace::new(limit);
        for i in 0..records {
            trace.record(SolveAction::Simplify, || format!("step {i}"));
        }
        let steps = trace.steps();
        prop_assert_eq!(steps.len(), records.min(limit));
        for (index, step) in steps.iter().enumerate() {
            prop_assert_eq!(step.step, index + 1);
        }
    }
}

// ---------------------------------------------------------------------------
// Literal initializers
// ---------------------------------------------------------------------------

const LITERALS: &[(&str, &str)] = &[
    ("int", "7"),
    ("float", "2.5"),
    ("string", "\"s\""),
    ("bool", "true"),
    ("nil", "nil"),
];

const TARGETS: &[&str] = &["Int", "Double", "String", "Bool"];

fn literal_value(kind: &str, text: &str) -> Literal {
    match kind {
        "int" => Literal::Int(7),
        "float" => Literal::Float(text.to_string()),
        "string" => Literal::String("s".to_string()),
        "bool" => Literal::Bool(true),
        _ => Literal::Nil,
    }
}

/// Whether a literal of `kind` can initialize `target` (or `target?`).
fn accepts(kind: &str, target: &str, optional: bool) -> bool {
    match (kind, target) {
        ("nil", _) => optional,
        ("int", "Int" | "Double") => true,
        ("float", "Double") => true,
        ("string", "String") => true,
        ("bool", "Bool") => true,
        _ => false,
    }
}

proptest! {
    #[test]
    fn literal_initializer_is_clean_or_one_error(
        literal in prop::sample::select(LITERALS),
        target in prop::sample::select(TARGETS),
        optional in any::<bool>(),
    ) {
        let (kind, text) = literal;
        let annotation = if optional { format!("{target}?") } else { target.to_string() };
        let src = format!("let v: {annotation} = {text}");

        let mut builder = ModuleBuilder::new("main").with_source(src.clone());
        let file = builder.file();
        let at = |needle: &str| {
            let start = src.find(needle).unwrap_or_default() as u32;
            Span::new(file, start, start + needle.len() as u32)
        };
        let value = builder.add_expr(ExprKind::Literal(literal_value(kind, text)), at(text));
        let ident: TypeRepr = Spanned::new(TypeReprKind::Ident(target.to_string()), at(target));
        let ty = if optional {
            Spanned::new(TypeReprKind::Optional(Box::new(ident)), at(&annotation))
        } else {
            ident
        };
        builder.add_decl(
            None,
            Decl::new("v", DeclKind::Var { is_let: true, ty: Some(ty), init: Some(value) }, at("v")),
        );

        let mut tc = TypeChecker::new(builder.finish().expect("module links"));
        check_module(&mut tc);
        let report = check_bodies(&mut tc);

        let errors = tc.diagnostics().iter().filter(|d| d.is_error()).count();
        let expected = usize::from(!accepts(kind, target, optional));
        prop_assert_eq!(errors, expected, "{}: {:?}", src, tc.diagnostics());
        prop_assert_eq!(report.failed, 0);
    }
}
