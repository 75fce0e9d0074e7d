//! Evaluation traces.
//!
//! Recording is opt-in via `Evaluator::enable_tracing()`; nothing is
//! allocated while tracing is disabled.

use serde::Serialize;

/// One step of request evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvalStep {
    /// Number of requests active when the step was recorded.
    pub depth: usize,
    pub kind: &'static str,
    pub request: String,
    /// The request that asked for this one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub action: EvalAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalAction {
    /// The request body is about to run.
    Execute,
    /// Served from a cache.
    CacheHit,
    /// The request was already on the active stack.
    Cycle,
    /// A cycle was unwound with the request's fallback value.
    BreakCycle,
    /// The body returned an error; nothing was cached.
    Failed,
}
