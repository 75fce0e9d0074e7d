use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use proptest::prelude::*;

use super::*;

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TestRequest {
    Square(u64),
    Stored(u64),
    Fresh(u64),
    Sum(u64),
    A,
    B,
    Outer,
    Inner,
    Flaky,
}

impl fmt::Display for TestRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestRequest::Square(n) => write!(f, "square({n})"),
            TestRequest::Stored(n) => write!(f, "stored({n})"),
            TestRequest::Fresh(n) => write!(f, "fresh({n})"),
            TestRequest::Sum(n) => write!(f, "sum({n})"),
            TestRequest::A => write!(f, "a"),
            TestRequest::B => write!(f, "b"),
            TestRequest::Outer => write!(f, "outer"),
            TestRequest::Inner => write!(f, "inner"),
            TestRequest::Flaky => write!(f, "flaky"),
        }
    }
}

#[derive(Default)]
struct TestCx {
    executed: BTreeMap<String, u32>,
    stored: BTreeMap<u64, u64>,
    diagnosed: Vec<String>,
    notes: Vec<String>,
    flaky_failures: u32,
}

impl TestCx {
    fn bump(&mut self, request: &TestRequest) {
        *self.executed.entry(request.to_string()).or_insert(0) += 1;
    }

    fn runs(&self, name: &str) -> u32 {
        self.executed.get(name).copied().unwrap_or(0)
    }
}

impl Request for TestRequest {
    type Output = u64;

    fn kind_name(&self) -> &'static str {
        match self {
            TestRequest::Square(_) => "square",
            TestRequest::Stored(_) => "stored",
            TestRequest::Fresh(_) => "fresh",
            TestRequest::Sum(_) => "sum",
            TestRequest::A => "a",
            TestRequest::B => "b",
            TestRequest::Outer => "outer",
            TestRequest::Inner => "inner",
            TestRequest::Flaky => "flaky",
        }
    }

    fn cache_kind(&self) -> CacheKind {
        match self {
            TestRequest::Fresh(_) | TestRequest::A | TestRequest::B => CacheKind::Uncached,
            TestRequest::Stored(_) => CacheKind::SeparatelyCached,
            _ => CacheKind::Cached,
        }
    }
}

impl Evaluate<TestCx> for TestRequest {
    fn evaluate(&self, ev: &mut Evaluator<Self>, cx: &mut TestCx) -> Result<u64, EvalError> {
        cx.bump(self);
        match self {
            TestRequest::Square(n) => Ok(n * n),
            TestRequest::Stored(n) => Ok(n + 100),
            TestRequest::Fresh(n) => Ok(*n),
            TestRequest::Sum(n) => {
                let mut total = 0;
                for i in 0..*n {
                    total += ev.evaluate(&TestRequest::Square(i), cx)?;
                }
                Ok(total)
            }
            TestRequest::A => ev.evaluate(&TestRequest::B, cx),
            TestRequest::B => ev.evaluate(&TestRequest::A, cx),
            TestRequest::Outer => Ok(ev.evaluate(&TestRequest::Inner, cx)? + 1),
            TestRequest::Inner => Ok(ev.evaluate(&TestRequest::Outer, cx)? * 2),
            TestRequest::Flaky => {
                if cx.flaky_failures > 0 {
                    cx.flaky_failures -= 1;
                    Err(EvalError::failed(self, "not ready"))
                } else {
                    Ok(1)
                }
            }
        }
    }

    fn cached_result(&self, cx: &TestCx) -> Option<u64> {
        match self {
            TestRequest::Stored(n) => cx.stored.get(n).copied(),
            _ => None,
        }
    }

    fn cache_result(&self, cx: &mut TestCx, value: u64) {
        if let TestRequest::Stored(n) = self {
            cx.stored.insert(*n, value);
        }
    }

    fn diagnose_cycle(&self, cx: &mut TestCx) {
        cx.diagnosed.push(self.to_string());
    }

    fn note_cycle_step(&self, cx: &mut TestCx) {
        cx.notes.push(self.to_string());
    }

    fn break_cycle(&self) -> Option<u64> {
        match self {
            TestRequest::Outer => Some(7),
            _ => None,
        }
    }
}

fn setup() -> (Evaluator<TestRequest>, TestCx) {
    (Evaluator::new(), TestCx::default())
}

// ---------------------------------------------------------------------------
// Caching
// ---------------------------------------------------------------------------

#[test]
fn cached_request_executes_once() {
    let (mut ev, mut cx) = setup();
    let first = ev.evaluate(&TestRequest::Square(3), &mut cx).unwrap();
    let second = ev.evaluate(&TestRequest::Square(3), &mut cx).unwrap();
    assert_eq!(first, 9);
    assert_eq!(first, second);
    assert_eq!(cx.runs("square(3)"), 1);
    assert_eq!(ev.stats().executions_of("square"), 1);
    assert_eq!(ev.stats().cache_hits_of("square"), 1);
    assert_eq!(ev.cached(&TestRequest::Square(3)), Some(&9));
}

#[test]
fn separately_cached_request_uses_context_storage() {
    let (mut ev, mut cx) = setup();
    assert_eq!(ev.evaluate(&TestRequest::Stored(1), &mut cx).unwrap(), 101);
    assert_eq!(ev.evaluate(&TestRequest::Stored(1), &mut cx).unwrap(), 101);
    assert_eq!(cx.runs("stored(1)"), 1);
    assert_eq!(cx.stored.get(&1), Some(&101));
    assert_eq!(ev.cache_len(), 0);
    assert_eq!(ev.stats().executions_of("stored"), 1);
}

#[test]
fn uncached_request_executes_every_time() {
    let (mut ev, mut cx) = setup();
    let first = ev.evaluate(&TestRequest::Fresh(5), &mut cx).unwrap();
    let second = ev.evaluate(&TestRequest::Fresh(5), &mut cx).unwrap();
    assert_eq!(first, second);
    assert_eq!(cx.runs("fresh(5)"), 2);
    assert_eq!(ev.stats().executions_of("fresh"), 2);
    assert_eq!(ev.stats().cache_hits_of("fresh"), 0);
}

#[test]
fn nested_results_are_cached_individually() {
    let (mut ev, mut cx) = setup();
    assert_eq!(ev.evaluate(&TestRequest::Sum(3), &mut cx).unwrap(), 5);
    assert_eq!(ev.evaluate(&TestRequest::Square(2), &mut cx).unwrap(), 4);
    assert_eq!(cx.runs("square(2)"), 1);
    assert_eq!(ev.stats().executions_of("square"), 3);
    assert_eq!(ev.stats().executions_of("sum"), 1);
    assert!(ev.active_requests().is_empty());
}

#[test]
fn errors_are_not_cached() {
    let (mut ev, mut cx) = setup();
    cx.flaky_failures = 1;
    let err = ev.evaluate(&TestRequest::Flaky, &mut cx).unwrap_err();
    assert_eq!(
        err,
        EvalError::Failed {
            request: "flaky".into(),
            message: "not ready".into()
        }
    );
    assert_eq!(ev.evaluate(&TestRequest::Flaky, &mut cx).unwrap(), 1);
    assert_eq!(cx.runs("flaky"), 2);
}

// ---------------------------------------------------------------------------
// Cycles
// ---------------------------------------------------------------------------

#[test]
fn cycle_reports_minimal_cycle_once() {
    let (mut ev, mut cx) = setup();
    let err = ev.evaluate(&TestRequest::A, &mut cx).unwrap_err();
    assert_eq!(
        err,
        EvalError::Cycle {
            request: "a".into(),
            cycle: vec!["a".into(), "b".into()],
        }
    );
    assert_eq!(cx.diagnosed, vec!["a".to_string()]);
    assert_eq!(cx.notes, vec!["b".to_string()]);
    assert_eq!(ev.stats().cycles_of("a"), 1);
    assert!(ev.active_requests().is_empty());
    assert_eq!(err.to_string(), "cycle detected while evaluating a: a -> b");
}

#[test]
fn cycle_entered_from_the_other_side() {
    let (mut ev, mut cx) = setup();
    let err = ev.evaluate(&TestRequest::B, &mut cx).unwrap_err();
    assert!(err.is_cycle());
    assert_eq!(cx.diagnosed, vec!["b".to_string()]);
    assert_eq!(cx.notes, vec!["a".to_string()]);
}

#[test]
fn break_cycle_unwinds_with_fallback() {
    let (mut ev, mut cx) = setup();
    // outer -> inner -> outer(break = 7): inner = 14, outer = 15.
    assert_eq!(ev.evaluate(&TestRequest::Outer, &mut cx).unwrap(), 15);
    assert_eq!(cx.diagnosed, vec!["outer".to_string()]);
    assert_eq!(cx.notes, vec!["inner".to_string()]);

    assert_eq!(ev.evaluate(&TestRequest::Outer, &mut cx).unwrap(), 15);
    assert_eq!(cx.runs("outer"), 1);
    assert_eq!(cx.diagnosed.len(), 1);
}

#[test]
fn evaluate_or_default_substitutes_fallback() {
    let (mut ev, mut cx) = setup();
    assert_eq!(ev.evaluate_or_default(&TestRequest::A, &mut cx, 42), 42);
    assert_eq!(ev.evaluate_or_default(&TestRequest::Square(4), &mut cx, 0), 16);
}

// ---------------------------------------------------------------------------
// Statistics and tracing
// ---------------------------------------------------------------------------

#[test]
fn stats_snapshot_and_reset() {
    let (mut ev, mut cx) = setup();
    ev.evaluate(&TestRequest::Sum(2), &mut cx).unwrap();
    let snapshot = ev.stats().snapshot();
    ev.stats_mut().reset();
    assert_eq!(snapshot.total_executions(), 3);
    assert_eq!(ev.stats().total_executions(), 0);

    ev.evaluate(&TestRequest::Sum(2), &mut cx).unwrap();
    assert_eq!(ev.stats().total_executions(), 0);
    assert_eq!(ev.stats().cache_hits_of("sum"), 1);
}

#[test]
fn trace_records_nesting_and_hits() {
    let (mut ev, mut cx) = setup();
    ev.enable_tracing();
    ev.evaluate(&TestRequest::Sum(2), &mut cx).unwrap();
    ev.evaluate(&TestRequest::Sum(2), &mut cx).unwrap();
    let trace = ev.take_trace().unwrap();

    let actions: Vec<(usize, &str, EvalAction)> = trace
        .iter()
        .map(|s| (s.depth, s.request.as_str(), s.action))
        .collect();
    assert_eq!(
        actions,
        vec![
            (0, "sum(2)", EvalAction::Execute),
            (1, "square(0)", EvalAction::Execute),
            (1, "square(1)", EvalAction::Execute),
            (0, "sum(2)", EvalAction::CacheHit),
        ]
    );
    assert_eq!(trace[1].parent.as_deref(), Some("sum(2)"));

    let json = serde_json::to_string(&trace[3]).unwrap();
    assert!(json.contains("\"cache_hit\""));
    assert!(!json.contains("parent"));
}

#[test]
fn tracing_disabled_records_nothing() {
    let (mut ev, mut cx) = setup();
    ev.evaluate(&TestRequest::Sum(2), &mut cx).unwrap();
    assert!(ev.trace().is_none());
}

#[test]
fn trace_limit_caps_steps() {
    let mut ev = Evaluator::with_options(EvaluatorOptions { trace_limit: 2 });
    let mut cx = TestCx::default();
    ev.enable_tracing();
    ev.evaluate(&TestRequest::Sum(4), &mut cx).unwrap();
    assert_eq!(ev.trace().map(|t| t.len()), Some(2));
}

proptest! {
    #[test]
    fn executions_match_distinct_requests(inputs in prop::collection::vec(0u64..6, 1..24)) {
        let (mut ev, mut cx) = setup();
        for n in &inputs {
            prop_assert_eq!(ev.evaluate(&TestRequest::Square(*n), &mut cx).unwrap(), n * n);
        }
        let distinct: BTreeSet<u64> = inputs.iter().copied().collect();
        prop_assert_eq!(ev.stats().executions_of("square"), distinct.len() as u64);
        prop_assert_eq!(
            ev.stats().cache_hits_of("square"),
            (inputs.len() - distinct.len()) as u64
        );
    }
}
