//! Solution scores and ranking.

use std::fmt;

use serde::Serialize;

use crate::cs::Solution;

/// How much a solution had to compromise. Fields compare in declaration
/// order, so one more error fix outweighs any number of defaulted literals;
/// lower is better.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Score {
    pub error_fixes: u32,
    pub warning_fixes: u32,
    pub inaccessible_choices: u32,
    pub defaulted_generics: u32,
    pub generic_overloads: u32,
}

impl Score {
    pub fn has_fixes(&self) -> bool {
        self.error_fixes > 0 || self.warning_fixes > 0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[fixes {}/{}, inaccessible {}, defaulted {}, generic {}]",
            self.error_fixes,
            self.warning_fixes,
            self.inaccessible_choices,
            self.defaulted_generics,
            self.generic_overloads
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ranking {
    NoSolution,
    Best(usize),
    /// Indices of equally good solutions that disagree on an overload.
    Ambiguous(Vec<usize>),
}

/// Pick the best solution. Solutions tied on score that picked the same
/// overloads everywhere are the same answer reached twice.
pub fn rank(solutions: &[Solution]) -> Ranking {
    let Some(best) = solutions.iter().map(|s| s.score).min() else {
        return Ranking::NoSolution;
    };
    let mut distinct: Vec<usize> = Vec::new();
    for (index, solution) in solutions.iter().enumerate() {
        if solution.score != best {
            continue;
        }
        let duplicate = distinct
            .iter()
            .any(|&seen| solutions[seen].same_overloads(solution));
        if !duplicate {
            distinct.push(index);
        }
    }
    match distinct.as_slice() {
        [only] => Ranking::Best(*only),
        _ => Ranking::Ambiguous(distinct),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixes_dominate_defaults() {
        let fixed = Score {
            error_fixes: 1,
            ..Score::default()
        };
        let defaulted = Score {
            defaulted_generics: 5,
            generic_overloads: 3,
            ..Score::default()
        };
        assert!(defaulted < fixed);
        assert!(Score::default() < defaulted);
    }

    #[test]
    fn warnings_rank_below_errors() {
        let warning = Score {
            warning_fixes: 2,
            ..Score::default()
        };
        let error = Score {
            error_fixes: 1,
            ..Score::default()
        };
        assert!(warning < error);
        assert!(warning.has_fixes());
    }

    #[test]
    fn rank_of_nothing() {
        assert_eq!(rank(&[]), Ranking::NoSolution);
    }

    #[test]
    fn display() {
        let score = Score {
            error_fixes: 1,
            defaulted_generics: 2,
            ..Score::default()
        };
        assert_eq!(
            score.to_string(),
            "[fixes 1/0, inaccessible 0, defaulted 2, generic 0]"
        );
    }
}
