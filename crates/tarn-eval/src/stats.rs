use std::collections::BTreeMap;

use serde::Serialize;

/// Per-kind counters kept by an evaluator.
///
/// `executions` counts request bodies that actually ran; cache hits are
/// counted separately and never bump `executions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvaluatorStats {
    pub executions: BTreeMap<&'static str, u64>,
    pub cache_hits: BTreeMap<&'static str, u64>,
    pub cycles: BTreeMap<&'static str, u64>,
}

impl EvaluatorStats {
    pub fn record_execution(&mut self, kind: &'static str) {
        *self.executions.entry(kind).or_insert(0) += 1;
    }

    pub fn record_cache_hit(&mut self, kind: &'static str) {
        *self.cache_hits.entry(kind).or_insert(0) += 1;
    }

    pub fn record_cycle(&mut self, kind: &'static str) {
        *self.cycles.entry(kind).or_insert(0) += 1;
    }

    pub fn executions_of(&self, kind: &str) -> u64 {
        self.executions.get(kind).copied().unwrap_or(0)
    }

    pub fn cache_hits_of(&self, kind: &str) -> u64 {
        self.cache_hits.get(kind).copied().unwrap_or(0)
    }

    pub fn cycles_of(&self, kind: &str) -> u64 {
        self.cycles.get(kind).copied().unwrap_or(0)
    }

    pub fn total_executions(&self) -> u64 {
        self.executions.values().sum()
    }

    pub fn snapshot(&self) -> EvaluatorStats {
        self.clone()
    }

    pub fn reset(&mut self) {
        *self = EvaluatorStats::default();
    }
}
