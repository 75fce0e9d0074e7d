//! Demand-driven request evaluation.
//!
//! A request is a small value naming a query and its inputs. The
//! [`Evaluator`] runs requests on demand, memoizes their results according to
//! each request's [`CacheKind`], and detects re-entrant evaluation through an
//! explicit stack of active requests. Request bodies may evaluate further
//! requests through the same evaluator; that recursion is how a declaration
//! graph's dependencies are threaded through one engine.
//!
//! The evaluator is generic over the request type and over a context `Cx`
//! handed to every request body. The context owns whatever state requests
//! need (the module, the diagnostics sink, side-table caches); the evaluator
//! owns only the generic cache, the active stack and statistics.

mod stats;
pub mod trace;

#[cfg(test)]
mod evaluator_tests;

use std::fmt;
use std::hash::Hash;

use rustc_hash::FxHashMap;

pub use stats::EvaluatorStats;
use trace::{EvalAction, EvalStep};

/// Where a request's results are memoized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    /// Never memoized; every call executes the body.
    Uncached,
    /// Memoized in the evaluator's table, keyed by the full request.
    Cached,
    /// Memoized in storage the request reaches through its context.
    SeparatelyCached,
}

/// Identity of a query. Two equal requests are interchangeable cache keys.
pub trait Request: Clone + Eq + Hash + fmt::Debug + fmt::Display {
    type Output: Clone;

    /// Name used for statistics and traces.
    fn kind_name(&self) -> &'static str;

    fn cache_kind(&self) -> CacheKind;

    fn is_cached(&self) -> bool {
        self.cache_kind() != CacheKind::Uncached
    }
}

/// How a request executes against a context `Cx`.
///
/// Only `evaluate` is required. The cache hooks are consulted for
/// [`CacheKind::SeparatelyCached`] requests; the cycle hooks run when the
/// request re-enters itself.
pub trait Evaluate<Cx>: Request {
    fn evaluate(&self, ev: &mut Evaluator<Self>, cx: &mut Cx) -> Result<Self::Output, EvalError>;

    /// Whether the result of this particular invocation should be stored.
    /// Requests may decline while a prerequisite is still settling.
    fn should_cache(&self, _cx: &Cx) -> bool {
        self.is_cached()
    }

    fn cached_result(&self, _cx: &Cx) -> Option<Self::Output> {
        None
    }

    fn cache_result(&self, _cx: &mut Cx, _value: Self::Output) {}

    /// Called once, on the request that closes a cycle.
    fn diagnose_cycle(&self, _cx: &mut Cx) {}

    /// Called once per frame strictly inside a cycle.
    fn note_cycle_step(&self, _cx: &mut Cx) {}

    /// Fallback value that unwinds a cycle. `None` makes the cycle an error.
    fn break_cycle(&self) -> Option<Self::Output> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("cycle detected while evaluating {request}: {}", cycle.join(" -> "))]
    Cycle { request: String, cycle: Vec<String> },
    #[error("{request} failed: {message}")]
    Failed { request: String, message: String },
}

impl EvalError {
    pub fn failed(request: &impl fmt::Display, message: impl Into<String>) -> Self {
        EvalError::Failed {
            request: request.to_string(),
            message: message.into(),
        }
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self, EvalError::Cycle { .. })
    }
}

/// Evaluator configuration.
#[derive(Debug, Clone)]
pub struct EvaluatorOptions {
    /// Maximum number of trace steps kept while tracing is enabled.
    pub trace_limit: usize,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        Self { trace_limit: 10_000 }
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

pub struct Evaluator<R: Request> {
    cache: FxHashMap<R, R::Output>,
    active: Vec<R>,
    stats: EvaluatorStats,
    options: EvaluatorOptions,
    /// Evaluation trace. `None` when tracing is disabled.
    trace: Option<Vec<EvalStep>>,
}

impl<R: Request> Default for Evaluator<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Request> fmt::Debug for Evaluator<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("cached", &self.cache.len())
            .field("active", &self.active)
            .field("stats", &self.stats)
            .finish()
    }
}

impl<R: Request> Evaluator<R> {
    pub fn new() -> Self {
        Self::with_options(EvaluatorOptions::default())
    }

    pub fn with_options(options: EvaluatorOptions) -> Self {
        Self {
            cache: FxHashMap::default(),
            active: Vec::new(),
            stats: EvaluatorStats::default(),
            options,
            trace: None,
        }
    }

    /// Evaluate `request`, consulting and filling caches per its policy.
    pub fn evaluate<Cx>(&mut self, request: &R, cx: &mut Cx) -> Result<R::Output, EvalError>
    where
        R: Evaluate<Cx>,
    {
        let kind = request.kind_name();

        match request.cache_kind() {
            CacheKind::Cached => {
                if let Some(value) = self.cache.get(request) {
                    let value = value.clone();
                    self.stats.record_cache_hit(kind);
                    self.push_step(request, EvalAction::CacheHit);
                    return Ok(value);
                }
            }
            CacheKind::SeparatelyCached => {
                if let Some(value) = request.cached_result(cx) {
                    self.stats.record_cache_hit(kind);
                    self.push_step(request, EvalAction::CacheHit);
                    return Ok(value);
                }
            }
            CacheKind::Uncached => {}
        }

        if let Some(start) = self.active.iter().position(|active| active == request) {
            return self.handle_cycle(request, start, cx);
        }

        self.push_step(request, EvalAction::Execute);
        self.active.push(request.clone());
        let result = request.evaluate(self, cx);
        self.active.pop();
        self.stats.record_execution(kind);

        match &result {
            Ok(value) if request.should_cache(cx) => match request.cache_kind() {
                CacheKind::Cached => {
                    self.cache.insert(request.clone(), value.clone());
                }
                CacheKind::SeparatelyCached => request.cache_result(cx, value.clone()),
                CacheKind::Uncached => {}
            },
            Ok(_) => {}
            Err(_) => self.push_step(request, EvalAction::Failed),
        }
        result
    }

    /// Evaluate `request`, substituting `fallback` on any error.
    pub fn evaluate_or_default<Cx>(&mut self, request: &R, cx: &mut Cx, fallback: R::Output) -> R::Output
    where
        R: Evaluate<Cx>,
    {
        self.evaluate(request, cx).unwrap_or(fallback)
    }

    fn handle_cycle<Cx>(
        &mut self,
        request: &R,
        start: usize,
        cx: &mut Cx,
    ) -> Result<R::Output, EvalError>
    where
        R: Evaluate<Cx>,
    {
        self.stats.record_cycle(request.kind_name());
        self.push_step(request, EvalAction::Cycle);

        request.diagnose_cycle(cx);
        for frame in &self.active[start + 1..] {
            frame.note_cycle_step(cx);
        }

        match request.break_cycle() {
            Some(value) => {
                self.push_step(request, EvalAction::BreakCycle);
                Ok(value)
            }
            None => Err(EvalError::Cycle {
                request: request.to_string(),
                cycle: self.active[start..].iter().map(|r| r.to_string()).collect(),
            }),
        }
    }

    // -- Inspection ---------------------------------------------------------

    /// Requests currently being evaluated, outermost first.
    pub fn active_requests(&self) -> &[R] {
        &self.active
    }

    pub fn is_active(&self, request: &R) -> bool {
        self.active.contains(request)
    }

    pub fn cached(&self, request: &R) -> Option<&R::Output> {
        self.cache.get(request)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn stats(&self) -> &EvaluatorStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut EvaluatorStats {
        &mut self.stats
    }

    // -- Tracing ------------------------------------------------------------

    /// Enable recording of evaluation steps.
    pub fn enable_tracing(&mut self) {
        self.trace = Some(Vec::new());
    }

    pub fn trace(&self) -> Option<&[EvalStep]> {
        self.trace.as_deref()
    }

    /// Take the recorded trace, leaving tracing enabled with an empty log.
    pub fn take_trace(&mut self) -> Option<Vec<EvalStep>> {
        self.trace.as_mut().map(std::mem::take)
    }

    fn push_step(&mut self, request: &R, action: EvalAction) {
        let Some(trace) = self.trace.as_mut() else {
            return;
        };
        if trace.len() >= self.options.trace_limit {
            return;
        }
        trace.push(EvalStep {
            depth: self.active.len(),
            kind: request.kind_name(),
            request: request.to_string(),
            parent: self.active.last().map(|r| r.to_string()),
            action,
        });
    }
}
