//! Solver traces.
//!
//! A trace records what the solver did step by step: which constraints it
//! simplified or deferred, which bindings and overload choices it tried,
//! and which fixes it recorded. Tracing is opt-in through
//! [`SolverOptions::trace_limit`](crate::SolverOptions); with a limit of
//! zero nothing is recorded.

use serde::Serialize;

/// One step of a solver trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SolveStep {
    pub step: usize,
    pub action: SolveAction,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveAction {
    /// Constraints generated for an expression.
    Generate,
    /// A constraint was simplified away.
    Simplify,
    /// A constraint could not be decided yet and waits for bindings.
    Defer,
    /// A type variable was bound.
    Bind,
    /// A failure was repaired by recording a fix.
    Fix,
    /// One choice of a disjunction is being explored.
    AttemptChoice,
    /// One candidate binding of a type variable is being explored.
    AttemptBinding,
    /// A branch ended with a complete solution.
    Solution,
    /// A branch ended with an unrepairable failure.
    Fail,
    BudgetExceeded,
}

/// Bounded trace sink shared by every branch of one solve.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    limit: usize,
    steps: Vec<SolveStep>,
    counter: usize,
}

impl Trace {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            steps: Vec::new(),
            counter: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.limit > 0
    }

    pub fn record(&mut self, action: SolveAction, detail: impl FnOnce() -> String) {
        if self.steps.len() >= self.limit {
            return;
        }
        self.counter += 1;
        self.steps.push(SolveStep {
            step: self.counter,
            action,
            detail: detail(),
        });
    }

    pub fn steps(&self) -> &[SolveStep] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<SolveStep> {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_trace_records_nothing() {
        let mut trace = Trace::new(0);
        trace.record(SolveAction::Bind, || unreachable!());
        assert!(!trace.is_enabled());
        assert!(trace.steps().is_empty());
    }

    #[test]
    fn trace_stops_at_limit() {
        let mut trace = Trace::new(2);
        for i in 0..5 {
            trace.record(SolveAction::Simplify, || format!("step {i}"));
        }
        let steps = trace.into_steps();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].step, 2);
        assert_eq!(steps[1].detail, "step 1");
    }

    #[test]
    fn serializes_action_in_snake_case() {
        let step = SolveStep {
            step: 1,
            action: SolveAction::AttemptChoice,
            detail: "f".into(),
        };
        let json = serde_json::to_string(&step).unwrap();
        assert_eq!(json, r#"{"step":1,"action":"attempt_choice","detail":"f"}"#);
    }
}
