//! Constraint system state and solutions.

use std::collections::{BTreeMap, VecDeque};

use tarn_ast::{DeclId, ExprId};
use tarn_types::{Substitution, Type, TypeVarId};

use crate::constraint::{Constraint, OverloadChoice};
use crate::fix::ConstraintFix;
use crate::locator::{ConstraintLocator, PathElt};
use crate::score::Score;

/// A generic parameter of a referenced declaration, replaced by a fresh
/// type variable at the point of reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedGeneric {
    pub var: TypeVarId,
    pub name: String,
    pub locator: ConstraintLocator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedOverload {
    pub choice: OverloadChoice,
    pub opened_type: Type,
}

/// Everything one branch of the search knows. Branches clone it.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSystem {
    pub(crate) subst: Substitution,
    next_var: u32,
    pub(crate) active: VecDeque<Constraint>,
    pub(crate) inactive: Vec<Constraint>,
    pub(crate) disjunctions: Vec<Constraint>,
    pub(crate) fixes: Vec<ConstraintFix>,
    pub(crate) overloads: BTreeMap<ConstraintLocator, SelectedOverload>,
    pub(crate) opened_generics: Vec<OpenedGeneric>,
    pub(crate) expr_types: BTreeMap<ExprId, Type>,
    pub(crate) score: Score,
    pub(crate) attempt_fixes: bool,
    /// Some type variables could not be inferred and were bound to
    /// `Type::Error`.
    pub(crate) holes: bool,
}

/// Saved state for rolling back a tentative match.
pub struct SolverScope {
    snapshot: Box<ConstraintSystem>,
}

impl ConstraintSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_type_var(&mut self) -> Type {
        let id = TypeVarId(self.next_var);
        self.next_var += 1;
        Type::Var(id)
    }

    pub fn type_var_count(&self) -> u32 {
        self.next_var
    }

    pub fn add(&mut self, constraint: Constraint) {
        self.active.push_back(constraint);
    }

    /// Requeue deferred constraints after a binding.
    pub(crate) fn activate_inactive(&mut self) {
        let inactive = std::mem::take(&mut self.inactive);
        self.active.extend(inactive);
    }

    pub fn constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.active
            .iter()
            .chain(self.inactive.iter())
            .chain(self.disjunctions.iter())
    }

    pub fn fixes(&self) -> &[ConstraintFix] {
        &self.fixes
    }

    pub fn score(&self) -> Score {
        self.score
    }

    /// Replace every bound variable in `ty`.
    pub fn resolve(&self, ty: &Type) -> Type {
        self.subst.apply(ty)
    }

    pub fn shallow(&self, ty: &Type) -> Type {
        self.subst.shallow_resolve(ty)
    }

    pub(crate) fn bind(&mut self, var: TypeVarId, ty: Type) {
        self.subst.bind(var, ty);
    }

    pub fn set_expr_type(&mut self, expr: ExprId, ty: Type) {
        self.expr_types.insert(expr, ty);
    }

    pub fn expr_type(&self, expr: ExprId) -> Option<&Type> {
        self.expr_types.get(&expr)
    }

    /// Record a fix unless an identical one is already recorded. Returns
    /// whether it was new.
    pub fn record_fix(&mut self, fix: ConstraintFix) -> bool {
        if self.fixes.contains(&fix) {
            return false;
        }
        if fix.is_warning {
            self.score.warning_fixes += 1;
        } else {
            self.score.error_fixes += 1;
        }
        self.fixes.push(fix);
        true
    }

    pub fn record_overload(&mut self, locator: ConstraintLocator, overload: SelectedOverload) {
        self.overloads.insert(locator, overload);
    }

    pub fn begin_scope(&self) -> SolverScope {
        SolverScope {
            snapshot: Box::new(self.clone()),
        }
    }

    /// Keep or discard everything done since `scope` began. Type variable
    /// numbering never goes backwards.
    pub fn end_scope(&mut self, scope: SolverScope, commit: bool) {
        if commit {
            return;
        }
        let next_var = self.next_var;
        *self = *scope.snapshot;
        self.next_var = self.next_var.max(next_var);
    }

    pub fn to_solution(&self) -> Solution {
        let expr_types = self
            .expr_types
            .iter()
            .map(|(expr, ty)| (*expr, self.resolve(ty)))
            .collect();
        let overloads = self
            .overloads
            .iter()
            .map(|(locator, overload)| {
                (
                    locator.clone(),
                    SelectedOverload {
                        choice: overload.choice.clone(),
                        opened_type: self.resolve(&overload.opened_type),
                    },
                )
            })
            .collect();
        Solution {
            subst: self.subst.clone(),
            fixes: self.fixes.clone(),
            overloads,
            expr_types,
            score: self.score,
            holes: self.holes,
        }
    }
}

/// A complete assignment of types, possibly with fixes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Solution {
    pub subst: Substitution,
    pub fixes: Vec<ConstraintFix>,
    pub overloads: BTreeMap<ConstraintLocator, SelectedOverload>,
    pub expr_types: BTreeMap<ExprId, Type>,
    pub score: Score,
    pub holes: bool,
}

impl Solution {
    pub fn simplify_type(&self, ty: &Type) -> Type {
        self.subst.apply(ty)
    }

    /// The type of `expr` in this solution; `Type::Error` when it was never
    /// typed.
    pub fn expr_type(&self, expr: ExprId) -> Type {
        self.expr_types.get(&expr).cloned().unwrap_or(Type::Error)
    }

    pub fn overload_at(&self, locator: &ConstraintLocator) -> Option<&SelectedOverload> {
        self.overloads.get(locator)
    }

    /// The declaration a name or member reference expression resolved to.
    pub fn referenced_decl(&self, expr: ExprId) -> Option<DeclId> {
        self.overloads
            .iter()
            .find(|(locator, _)| {
                locator.anchor == Some(expr)
                    && matches!(
                        locator.path.as_slice(),
                        [] | [PathElt::Member] | [PathElt::ConstructorMember] | [PathElt::SubscriptMember]
                    )
            })
            .and_then(|(_, overload)| overload.choice.decl())
    }

    pub fn same_overloads(&self, other: &Solution) -> bool {
        self.overloads.len() == other.overloads.len()
            && self
                .overloads
                .iter()
                .zip(other.overloads.iter())
                .all(|((l1, o1), (l2, o2))| l1 == l2 && o1.choice == o2.choice)
    }

    pub fn has_fixes(&self) -> bool {
        !self.fixes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::ConstraintKind;
    use crate::fix::FixKind;

    #[test]
    fn rolled_back_scope_keeps_fresh_variables_fresh() {
        let mut cs = ConstraintSystem::new();
        let t0 = cs.new_type_var();
        let scope = cs.begin_scope();
        let Type::Var(v0) = t0 else { unreachable!() };
        cs.bind(v0, Type::Int);
        let t1 = cs.new_type_var();
        cs.end_scope(scope, false);
        assert_eq!(cs.resolve(&t0), t0);
        let t2 = cs.new_type_var();
        assert_ne!(t1, t2);
        assert_eq!(cs.type_var_count(), 3);
    }

    #[test]
    fn committed_scope_keeps_bindings() {
        let mut cs = ConstraintSystem::new();
        let t0 = cs.new_type_var();
        let scope = cs.begin_scope();
        let Type::Var(v0) = t0 else { unreachable!() };
        cs.bind(v0, Type::String);
        cs.end_scope(scope, true);
        assert_eq!(cs.resolve(&t0), Type::String);
    }

    #[test]
    fn duplicate_fixes_count_once() {
        let mut cs = ConstraintSystem::new();
        let fix = ConstraintFix::new(FixKind::InsertCall, ConstraintLocator::new(ExprId(1)));
        assert!(cs.record_fix(fix.clone()));
        assert!(!cs.record_fix(fix));
        assert_eq!(cs.score().error_fixes, 1);
        let warning = ConstraintFix::warning(
            FixKind::AllowInvalidPartialApplication { member: "f".into() },
            ConstraintLocator::new(ExprId(2)),
        );
        cs.record_fix(warning);
        assert_eq!(cs.score().warning_fixes, 1);
    }

    #[test]
    fn solution_resolves_expression_types() {
        let mut cs = ConstraintSystem::new();
        let t0 = cs.new_type_var();
        cs.set_expr_type(ExprId(0), Type::optional(t0.clone()));
        cs.add(Constraint::new(
            ConstraintKind::Bind {
                first: t0.clone(),
                second: Type::Int,
            },
            ConstraintLocator::new(ExprId(0)),
        ));
        let Type::Var(v0) = t0 else { unreachable!() };
        cs.bind(v0, Type::Int);
        let solution = cs.to_solution();
        assert_eq!(solution.expr_type(ExprId(0)), Type::optional(Type::Int));
        assert_eq!(solution.expr_type(ExprId(9)), Type::Error);
    }
}
