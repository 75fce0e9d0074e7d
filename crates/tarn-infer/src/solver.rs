//! The constraint solver.
//!
//! Solving alternates between propagation, which simplifies every queued
//! constraint until nothing changes, and search, which picks a type
//! variable binding or a disjunction choice and explores each alternative
//! in a cloned system. Every branch that runs out of work with all type
//! variables decided becomes a [`Solution`].
//!
//! In fix mode a failing constraint is handed to the repair routines in
//! [`crate::repair`], which record a [`ConstraintFix`] and let the branch
//! continue. Fixes count against the solution's score, so a repaired
//! solution only wins when nothing cheaper exists.

use std::collections::{BTreeMap, BTreeSet};

use tarn_ast::{AccessLevel, DeclId, DeclKind, ExprId, ExprKind, KeyPathComponentKind, TypeRepr, TypeReprKind};
use tarn_sema::{Ev, SemaContext, lookup, request};
use tarn_types::{FunctionType, NominalKind, ProtocolRef, Type, TypeVarId, free_type_vars, occurs_in};

use crate::SolverOptions;
use crate::constraint::{Constraint, ConstraintKind, LiteralKind, OverloadChoice};
use crate::cs::{ConstraintSystem, SelectedOverload, Solution};
use crate::fix::{ConstraintFix, FixKind, InitRefKind, KeyPathRefKind, SynthesizedArg};
use crate::locator::{ConstraintLocator, PathElt};
use crate::members;
use crate::trace::{SolveAction, Trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SolveResult {
    Solved,
    /// Not decidable until more type variables are bound.
    Unsolved,
    Error,
}

/// The relation a type match checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MatchKind {
    Bind,
    Equal,
    Conversion,
    ArgumentConversion,
}

impl MatchKind {
    pub(crate) fn constraint(self, first: Type, second: Type) -> ConstraintKind {
        match self {
            MatchKind::Bind => ConstraintKind::Bind { first, second },
            MatchKind::Equal => ConstraintKind::Equal { first, second },
            MatchKind::Conversion => ConstraintKind::Conversion {
                from: first,
                to: second,
            },
            MatchKind::ArgumentConversion => ConstraintKind::ArgumentConversion {
                from: first,
                to: second,
            },
        }
    }

    fn is_conversion(self) -> bool {
        matches!(self, MatchKind::Conversion | MatchKind::ArgumentConversion)
    }
}

pub(crate) struct Solver<'a> {
    pub(crate) ev: &'a mut Ev,
    pub(crate) cx: &'a mut SemaContext,
    /// The declaration whose expression is being solved.
    pub(crate) dc: DeclId,
    max_steps: usize,
    steps: usize,
    budget_exceeded: bool,
    pub(crate) trace: Trace,
    solutions: Vec<Solution>,
    /// The last constraint that failed outright in fix mode, with the
    /// callee type resolved when it was an application.
    pub(crate) last_failure: Option<(Constraint, Option<Type>)>,
}

impl<'a> Solver<'a> {
    pub(crate) fn new(
        ev: &'a mut Ev,
        cx: &'a mut SemaContext,
        dc: DeclId,
        options: &SolverOptions,
        trace: Trace,
    ) -> Self {
        Self {
            ev,
            cx,
            dc,
            max_steps: options.max_steps,
            steps: 0,
            budget_exceeded: false,
            trace,
            solutions: Vec::new(),
            last_failure: None,
        }
    }

    pub(crate) fn budget_exceeded(&self) -> bool {
        self.budget_exceeded
    }

    pub(crate) fn into_trace(self) -> Trace {
        self.trace
    }

    /// Every solution reachable from `cs`.
    pub(crate) fn solve(&mut self, cs: ConstraintSystem) -> Vec<Solution> {
        self.steps = 0;
        self.budget_exceeded = false;
        self.solutions.clear();
        self.last_failure = None;
        self.search(cs);
        std::mem::take(&mut self.solutions)
    }

    fn tick(&mut self) -> bool {
        if self.budget_exceeded {
            return false;
        }
        self.steps += 1;
        if self.steps > self.max_steps {
            self.budget_exceeded = true;
            let max_steps = self.max_steps;
            self.trace
                .record(SolveAction::BudgetExceeded, || format!("gave up after {max_steps} steps"));
            return false;
        }
        true
    }

    pub(crate) fn record(&mut self, cs: &mut ConstraintSystem, fix: ConstraintFix) {
        self.trace
            .record(SolveAction::Fix, || format!("{} @ {}", fix.name(), fix.locator));
        cs.record_fix(fix);
    }

    pub(crate) fn record_fix(&mut self, cs: &mut ConstraintSystem, kind: FixKind, locator: &ConstraintLocator) {
        self.record(cs, ConstraintFix::new(kind, locator.clone()));
    }

    /// Bind every free type variable of `ty` to `Type::Error`, so that a
    /// repaired failure does not cascade.
    pub(crate) fn absorb(&mut self, cs: &mut ConstraintSystem, ty: &Type) {
        for var in free_type_vars(&cs.resolve(ty)) {
            cs.bind(var, Type::Error);
        }
    }

    // -- Search -------------------------------------------------------------

    fn search(&mut self, mut cs: ConstraintSystem) {
        if self.budget_exceeded {
            return;
        }
        if !self.propagate(&mut cs) {
            return;
        }

        if let Some((var, candidates)) = self.binding_candidates(&cs) {
            for ty in candidates {
                if self.budget_exceeded {
                    return;
                }
                let before = self.solutions.len();
                self.trace
                    .record(SolveAction::AttemptBinding, || format!("${} := {ty}", var.0));
                let mut branch = cs.clone();
                branch.bind(var, ty);
                branch.activate_inactive();
                self.search(branch);
                if !cs.attempt_fixes && self.solutions.len() > before {
                    return;
                }
            }
            return;
        }

        if !cs.disjunctions.is_empty() {
            let disjunction = cs.disjunctions.remove(0);
            let ConstraintKind::Disjunction(choices) = disjunction.kind else {
                return;
            };
            for (index, choice) in choices.into_iter().enumerate() {
                if self.budget_exceeded {
                    return;
                }
                self.trace
                    .record(SolveAction::AttemptChoice, || format!("choice #{index}: {choice}"));
                let mut branch = cs.clone();
                branch.add(choice);
                self.search(branch);
            }
            return;
        }

        let defaults = default_bindings(&cs);
        if !defaults.is_empty() {
            for (var, ty, defaulted) in defaults {
                if self.budget_exceeded {
                    return;
                }
                let before = self.solutions.len();
                self.trace
                    .record(SolveAction::AttemptBinding, || format!("${} := {ty} (default)", var.0));
                let mut branch = cs.clone();
                if defaulted {
                    branch.score.defaulted_generics += 1;
                }
                branch.bind(var, ty);
                branch.activate_inactive();
                self.search(branch);
                if self.solutions.len() > before {
                    return;
                }
            }
            return;
        }

        self.finalize(cs);
    }

    /// Simplify queued constraints until a round makes no progress.
    /// Returns false when the branch failed.
    fn propagate(&mut self, cs: &mut ConstraintSystem) -> bool {
        loop {
            let mut progress = false;
            while let Some(constraint) = cs.active.pop_front() {
                if !self.tick() {
                    return false;
                }
                match self.simplify(cs, &constraint) {
                    SolveResult::Solved => {
                        progress = true;
                        self.trace.record(SolveAction::Simplify, || constraint.to_string());
                    }
                    SolveResult::Unsolved => {
                        self.trace.record(SolveAction::Defer, || constraint.to_string());
                        cs.inactive.push(constraint);
                    }
                    SolveResult::Error => {
                        self.trace.record(SolveAction::Fail, || constraint.to_string());
                        if cs.attempt_fixes {
                            let callee = match &constraint.kind {
                                ConstraintKind::ApplicableFunction { callee, .. } => {
                                    Some(cs.resolve(callee).rvalue().clone())
                                }
                                _ => None,
                            };
                            self.last_failure = Some((constraint, callee));
                        }
                        return false;
                    }
                }
            }
            if !progress || cs.inactive.is_empty() {
                return true;
            }
            cs.activate_inactive();
        }
    }

    /// Candidate bindings for the lowest-numbered type variable that a
    /// deferred conversion relates to a concrete type.
    fn binding_candidates(&self, cs: &ConstraintSystem) -> Option<(TypeVarId, Vec<Type>)> {
        let mut candidates: BTreeMap<TypeVarId, Vec<Type>> = BTreeMap::new();
        let mut push = |var: TypeVarId, ty: Type| {
            if matches!(ty, Type::InOut(_)) {
                return;
            }
            let list = candidates.entry(var).or_default();
            if !list.contains(&ty) {
                list.push(ty);
            }
        };
        for constraint in &cs.inactive {
            let (ConstraintKind::Conversion { from, to } | ConstraintKind::ArgumentConversion { from, to }) =
                &constraint.kind
            else {
                continue;
            };
            let from = cs.resolve(from).rvalue().clone();
            let to = cs.resolve(to).rvalue().clone();
            match (&from, &to) {
                (Type::Var(_), Type::Var(_)) => {}
                (Type::Var(var), _) => {
                    push(*var, to.clone());
                    if let Type::Optional(payload) = &to {
                        push(*var, (**payload).clone());
                    }
                }
                (_, Type::Var(var)) => push(*var, from.clone()),
                _ => {}
            }
        }
        let (var, mut types) = candidates.into_iter().next()?;
        if cs.attempt_fixes
            && let Some(default) = literal_default(cs, var)
        {
            types.retain(|ty| *ty != default);
            types.insert(0, default);
        }
        Some((var, types))
    }

    fn finalize(&mut self, mut cs: ConstraintSystem) {
        let unbound: Vec<_> = cs
            .opened_generics
            .iter()
            .filter(|g| cs.shallow(&Type::Var(g.var)).is_var())
            .cloned()
            .collect();
        if !unbound.is_empty() {
            if !cs.attempt_fixes {
                self.trace
                    .record(SolveAction::Fail, || "unresolved generic parameters".to_string());
                return;
            }
            let mut by_reference: BTreeMap<ConstraintLocator, Vec<String>> = BTreeMap::new();
            for generic in &unbound {
                let mut reference = generic.locator.clone();
                reference.path.pop();
                by_reference.entry(reference).or_default().push(generic.name.clone());
                cs.bind(generic.var, Type::Error);
            }
            for (reference, params) in by_reference {
                self.record_fix(&mut cs, FixKind::ExplicitlySpecifyGenericArguments { params }, &reference);
            }
            cs.activate_inactive();
            if !self.propagate(&mut cs) {
                return;
            }
        }

        let mut holes = BTreeSet::new();
        for constraint in &cs.inactive {
            for ty in constraint_types(constraint) {
                holes.extend(free_type_vars(&cs.resolve(ty)));
            }
        }
        for ty in cs.expr_types.values() {
            holes.extend(free_type_vars(&cs.resolve(ty)));
        }
        if !holes.is_empty() {
            if !cs.attempt_fixes {
                self.trace.record(SolveAction::Fail, || format!("{} unresolved type variables", holes.len()));
                return;
            }
            for var in holes {
                cs.bind(var, Type::Error);
            }
            cs.holes = true;
            cs.activate_inactive();
            if !self.propagate(&mut cs) {
                return;
            }
        }
        if !cs.inactive.is_empty() {
            self.trace.record(SolveAction::Fail, || "constraints left undecided".to_string());
            return;
        }
        let score = cs.score;
        self.trace.record(SolveAction::Solution, || score.to_string());
        self.solutions.push(cs.to_solution());
    }

    // -- Simplification -----------------------------------------------------

    fn simplify(&mut self, cs: &mut ConstraintSystem, constraint: &Constraint) -> SolveResult {
        let loc = &constraint.locator;
        match &constraint.kind {
            ConstraintKind::Bind { first, second } => self.solve_relation(cs, first, second, MatchKind::Bind, loc),
            ConstraintKind::Equal { first, second } => {
                self.solve_relation(cs, first, second, MatchKind::Equal, loc)
            }
            ConstraintKind::Conversion { from, to } => {
                self.solve_relation(cs, from, to, MatchKind::Conversion, loc)
            }
            ConstraintKind::ArgumentConversion { from, to } => {
                self.solve_relation(cs, from, to, MatchKind::ArgumentConversion, loc)
            }
            ConstraintKind::ConformsTo { ty, protocol } => self.simplify_conformance(cs, ty, protocol, loc),
            ConstraintKind::Superclass { ty, superclass } => {
                let ty = cs.resolve(ty).rvalue().clone();
                let superclass = cs.resolve(superclass);
                if ty.has_type_vars() || superclass.has_type_vars() {
                    return SolveResult::Unsolved;
                }
                if ty == superclass
                    || ty.is_error()
                    || superclass.is_error()
                    || matches!(ty, Type::GenericParam { .. })
                    || lookup::is_class_upcast(self.ev, self.cx, &ty, &superclass)
                {
                    return SolveResult::Solved;
                }
                if !cs.attempt_fixes {
                    return SolveResult::Error;
                }
                self.record_fix(
                    cs,
                    FixKind::SkipSuperclassRequirement {
                        lhs: ty,
                        rhs: superclass,
                    },
                    loc,
                );
                SolveResult::Solved
            }
            ConstraintKind::SameType { first, second } => {
                let scope = cs.begin_scope();
                match self.match_types(cs, first, second, MatchKind::Equal, loc) {
                    SolveResult::Error => {
                        cs.end_scope(scope, false);
                        if !cs.attempt_fixes {
                            return SolveResult::Error;
                        }
                        let lhs = cs.resolve(first);
                        let rhs = cs.resolve(second);
                        self.record_fix(cs, FixKind::SkipSameTypeRequirement { lhs, rhs }, loc);
                        self.absorb(cs, first);
                        self.absorb(cs, second);
                        SolveResult::Solved
                    }
                    result => {
                        cs.end_scope(scope, true);
                        result
                    }
                }
            }
            ConstraintKind::ValueMember { base, member, name } => self.simplify_member(cs, base, member, name, loc),
            ConstraintKind::ApplicableFunction { args, callee } => self.simplify_apply(cs, args, callee, loc),
            ConstraintKind::OptionalObject { optional, object } => {
                let optional_ty = cs.resolve(optional);
                let is_lvalue = optional_ty.is_lvalue();
                match optional_ty.rvalue().clone() {
                    Type::Var(_) => SolveResult::Unsolved,
                    Type::Error => {
                        self.absorb(cs, object);
                        SolveResult::Solved
                    }
                    Type::Optional(payload) => {
                        let payload = if is_lvalue { Type::lvalue(*payload) } else { *payload };
                        self.relate(cs, object, &payload, MatchKind::Bind, loc)
                    }
                    base => {
                        if !cs.attempt_fixes {
                            return SolveResult::Error;
                        }
                        self.record_fix(cs, FixKind::RemoveUnwrap { base }, loc);
                        self.relate(cs, object, &optional_ty, MatchKind::Bind, loc)
                    }
                }
            }
            ConstraintKind::LiteralConformsTo { ty, literal } => self.simplify_literal(cs, ty, *literal, loc),
            ConstraintKind::KeyPath { key_path, root, expr } => self.simplify_key_path(cs, key_path, root, *expr, loc),
            ConstraintKind::KeyPathApplication { key_path, root, value } => {
                self.simplify_key_path_application(cs, key_path, root, value, loc)
            }
            ConstraintKind::Disjunction(_) => {
                cs.disjunctions.push(constraint.clone());
                SolveResult::Solved
            }
            ConstraintKind::BindOverload { ty, choice } => self.resolve_overload(cs, ty, choice, loc),
            ConstraintKind::Defaultable { ty, .. } => {
                if cs.resolve(ty).is_var() {
                    SolveResult::Unsolved
                } else {
                    SolveResult::Solved
                }
            }
        }
    }

    /// Match two types in a scope, repairing the failure in fix mode.
    pub(crate) fn solve_relation(
        &mut self,
        cs: &mut ConstraintSystem,
        first: &Type,
        second: &Type,
        kind: MatchKind,
        loc: &ConstraintLocator,
    ) -> SolveResult {
        let scope = cs.begin_scope();
        match self.match_types(cs, first, second, kind, loc) {
            SolveResult::Error => {
                cs.end_scope(scope, false);
                if cs.attempt_fixes {
                    self.repair_relation(cs, first, second, kind, loc)
                } else {
                    SolveResult::Error
                }
            }
            result => {
                cs.end_scope(scope, true);
                result
            }
        }
    }

    /// Like [`Self::solve_relation`], queueing the relation as a new
    /// constraint when it cannot be decided yet.
    pub(crate) fn relate(
        &mut self,
        cs: &mut ConstraintSystem,
        first: &Type,
        second: &Type,
        kind: MatchKind,
        loc: &ConstraintLocator,
    ) -> SolveResult {
        match self.solve_relation(cs, first, second, kind, loc) {
            SolveResult::Unsolved => {
                cs.add(Constraint::new(kind.constraint(first.clone(), second.clone()), loc.clone()));
                SolveResult::Solved
            }
            result => result,
        }
    }

    /// Match without repairs; undecidable parts become new constraints.
    fn sub(
        &mut self,
        cs: &mut ConstraintSystem,
        first: &Type,
        second: &Type,
        kind: MatchKind,
        loc: &ConstraintLocator,
    ) -> SolveResult {
        match self.match_types(cs, first, second, kind, loc) {
            SolveResult::Unsolved => {
                cs.add(Constraint::new(kind.constraint(first.clone(), second.clone()), loc.clone()));
                SolveResult::Solved
            }
            result => result,
        }
    }

    fn bind_var(&mut self, cs: &mut ConstraintSystem, var: TypeVarId, ty: Type) -> SolveResult {
        if occurs_in(var, &ty) {
            return SolveResult::Error;
        }
        self.trace.record(SolveAction::Bind, || format!("${} := {ty}", var.0));
        cs.bind(var, ty);
        SolveResult::Solved
    }

    pub(crate) fn match_types(
        &mut self,
        cs: &mut ConstraintSystem,
        first: &Type,
        second: &Type,
        kind: MatchKind,
        loc: &ConstraintLocator,
    ) -> SolveResult {
        let a = cs.resolve(first);
        let b = cs.resolve(second);
        if kind == MatchKind::ArgumentConversion {
            match (&a, &b) {
                (Type::InOut(x), Type::InOut(y)) => return self.match_types(cs, x, y, MatchKind::Bind, loc),
                (_, Type::InOut(_)) => {
                    return if a.rvalue().is_var() {
                        SolveResult::Unsolved
                    } else {
                        SolveResult::Error
                    };
                }
                (Type::InOut(_), _) => {
                    return if b.is_var() {
                        SolveResult::Unsolved
                    } else {
                        SolveResult::Error
                    };
                }
                _ => {}
            }
        }
        let (a, b) = if kind == MatchKind::Bind {
            (a, b)
        } else {
            (a.rvalue().clone(), b.rvalue().clone())
        };
        if a == b {
            return SolveResult::Solved;
        }
        if a.is_error() || b.is_error() {
            self.absorb(cs, &a);
            self.absorb(cs, &b);
            return SolveResult::Solved;
        }
        if kind.is_conversion() && b == Type::Any {
            return SolveResult::Solved;
        }
        match (&a, &b) {
            (Type::Var(var), _) if !kind.is_conversion() => return self.bind_var(cs, *var, b.clone()),
            (_, Type::Var(var)) if !kind.is_conversion() => return self.bind_var(cs, *var, a.clone()),
            (Type::Var(_), _) | (_, Type::Var(_)) => return SolveResult::Unsolved,
            _ => {}
        }
        if kind.is_conversion() {
            self.match_conversion(cs, &a, &b, loc)
        } else {
            self.match_structure(cs, &a, &b, kind, loc)
        }
    }

    fn match_structure(
        &mut self,
        cs: &mut ConstraintSystem,
        a: &Type,
        b: &Type,
        kind: MatchKind,
        loc: &ConstraintLocator,
    ) -> SolveResult {
        let pairs: Vec<(Type, Type)> = match (a, b) {
            (Type::Optional(x), Type::Optional(y))
            | (Type::Array(x), Type::Array(y))
            | (Type::Metatype(x), Type::Metatype(y))
            | (Type::LValue(x), Type::LValue(y))
            | (Type::InOut(x), Type::InOut(y)) => vec![((**x).clone(), (**y).clone())],
            (Type::Nominal(n), Type::Nominal(m)) if n.decl == m.decl && n.args.len() == m.args.len() => {
                n.args.iter().cloned().zip(m.args.iter().cloned()).collect()
            }
            (Type::Function(f), Type::Function(g)) if f.params.len() == g.params.len() => f
                .params
                .iter()
                .map(|p| p.ty.clone())
                .zip(g.params.iter().map(|p| p.ty.clone()))
                .chain(std::iter::once(((*f.result).clone(), (*g.result).clone())))
                .collect(),
            (Type::Tuple(xs), Type::Tuple(ys)) if xs.len() == ys.len() => {
                xs.iter().cloned().zip(ys.iter().cloned()).collect()
            }
            (
                Type::KeyPath {
                    root: r1,
                    value: v1,
                    writable: w1,
                },
                Type::KeyPath {
                    root: r2,
                    value: v2,
                    writable: w2,
                },
            ) if w1 == w2 => vec![((**r1).clone(), (**r2).clone()), ((**v1).clone(), (**v2).clone())],
            _ => return SolveResult::Error,
        };
        for (x, y) in pairs {
            if self.sub(cs, &x, &y, kind, loc) == SolveResult::Error {
                return SolveResult::Error;
            }
        }
        SolveResult::Solved
    }

    fn match_conversion(&mut self, cs: &mut ConstraintSystem, a: &Type, b: &Type, loc: &ConstraintLocator) -> SolveResult {
        let conv = MatchKind::Conversion;
        match (a, b) {
            (_, Type::AnyObject) => {
                if a.is_class_bound() {
                    SolveResult::Solved
                } else {
                    SolveResult::Error
                }
            }
            (Type::Optional(x), Type::Optional(y)) => self.sub(cs, x, y, conv, loc),
            (Type::Optional(_), _) => SolveResult::Error,
            (_, Type::Optional(y)) => self.sub(cs, a, y, conv, loc),
            (Type::Array(x), Type::Array(y)) | (Type::Metatype(x), Type::Metatype(y)) => self.sub(cs, x, y, conv, loc),
            (Type::Function(f), Type::Function(g)) => {
                if f.params.len() != g.params.len() || (!f.escaping && g.escaping) {
                    return SolveResult::Error;
                }
                for (p, q) in f.params.iter().zip(g.params.iter()) {
                    if p.is_inout() != q.is_inout() {
                        return SolveResult::Error;
                    }
                    let kind = if p.is_inout() { MatchKind::Bind } else { conv };
                    if self.sub(cs, &q.ty, &p.ty, kind, loc) == SolveResult::Error {
                        return SolveResult::Error;
                    }
                }
                self.sub(cs, &f.result, &g.result, conv, loc)
            }
            (Type::Tuple(xs), Type::Tuple(ys)) if xs.len() == ys.len() => {
                for (x, y) in xs.iter().zip(ys.iter()) {
                    if self.sub(cs, x, y, conv, loc) == SolveResult::Error {
                        return SolveResult::Error;
                    }
                }
                SolveResult::Solved
            }
            (Type::Nominal(n), Type::Nominal(m)) => {
                if n.decl == m.decl && n.args.len() == m.args.len() {
                    for (x, y) in n.args.iter().zip(m.args.iter()) {
                        if self.sub(cs, x, y, MatchKind::Bind, loc) == SolveResult::Error {
                            return SolveResult::Error;
                        }
                    }
                    SolveResult::Solved
                } else if lookup::is_class_upcast(self.ev, self.cx, a, b) {
                    SolveResult::Solved
                } else {
                    SolveResult::Error
                }
            }
            (_, Type::Existential(protos)) => {
                if a.has_type_vars() {
                    return SolveResult::Unsolved;
                }
                let all = protos.iter().all(|proto| self.conforms(a, proto));
                if all { SolveResult::Solved } else { SolveResult::Error }
            }
            (
                Type::KeyPath {
                    root: r1,
                    value: v1,
                    writable: w1,
                },
                Type::KeyPath {
                    root: r2,
                    value: v2,
                    writable: w2,
                },
            ) => {
                if !w1 && *w2 {
                    return SolveResult::Error;
                }
                if self.sub(cs, r1, r2, MatchKind::Bind, loc) == SolveResult::Error {
                    return SolveResult::Error;
                }
                self.sub(cs, v1, v2, MatchKind::Bind, loc)
            }
            _ => SolveResult::Error,
        }
    }

    /// Conformance of a concrete type. Generic parameters are assumed to
    /// satisfy whatever their signature requires.
    pub(crate) fn conforms(&mut self, ty: &Type, proto: &ProtocolRef) -> bool {
        if proto.decl.is_none() && proto.name == "AnyObject" {
            return ty.is_class_bound();
        }
        match ty {
            Type::GenericParam { .. } | Type::Error => true,
            _ => lookup::conforms_to(self.ev, self.cx, ty, proto),
        }
    }

    fn simplify_conformance(
        &mut self,
        cs: &mut ConstraintSystem,
        ty: &Type,
        protocol: &ProtocolRef,
        loc: &ConstraintLocator,
    ) -> SolveResult {
        let ty = cs.resolve(ty).rvalue().clone();
        if ty.has_type_vars() {
            return SolveResult::Unsolved;
        }
        if self.conforms(&ty, protocol) {
            return SolveResult::Solved;
        }
        if !cs.attempt_fixes {
            return SolveResult::Error;
        }
        let fix = if loc.contains(|elt| matches!(elt, PathElt::KeyPathComponent(_))) {
            FixKind::TreatKeyPathSubscriptIndexAsHashable { ty }
        } else {
            let protocol = if protocol.decl.is_none() && protocol.name == "AnyObject" {
                Type::AnyObject
            } else {
                Type::Existential(vec![protocol.clone()])
            };
            FixKind::AddConformance {
                ty,
                protocol,
                contextual: false,
            }
        };
        self.record_fix(cs, fix, loc);
        SolveResult::Solved
    }

    fn simplify_literal(
        &mut self,
        cs: &mut ConstraintSystem,
        ty: &Type,
        literal: LiteralKind,
        loc: &ConstraintLocator,
    ) -> SolveResult {
        let ty = cs.resolve(ty).rvalue().clone();
        if ty.is_var() {
            return SolveResult::Unsolved;
        }
        if ty.is_error() {
            return SolveResult::Solved;
        }
        let proto = ProtocolRef::builtin(literal.protocol_name());
        let holds = match ty.builtin_conforms_to(&proto.name) {
            Some(answer) => answer,
            None => match &ty {
                Type::Nominal(_) | Type::Existential(_) => lookup::conforms_to(self.ev, self.cx, &ty, &proto),
                _ => false,
            },
        };
        if holds {
            return SolveResult::Solved;
        }
        if cs.attempt_fixes && literal == LiteralKind::Nil {
            self.record_fix(
                cs,
                FixKind::ContextualMismatch {
                    from: Type::optional(ty.clone()),
                    to: ty,
                },
                loc,
            );
            return SolveResult::Solved;
        }
        SolveResult::Error
    }

    // -- Key paths ------------------------------------------------------------

    fn simplify_key_path(
        &mut self,
        cs: &mut ConstraintSystem,
        key_path: &Type,
        root: &Type,
        expr: ExprId,
        loc: &ConstraintLocator,
    ) -> SolveResult {
        let mut root_ty = cs.resolve(root);
        if root_ty.is_var() {
            match cs.resolve(key_path) {
                Type::KeyPath { root: known, .. } if !known.is_var() => {
                    if self.relate(cs, &root_ty, &known, MatchKind::Bind, loc) == SolveResult::Error {
                        return SolveResult::Error;
                    }
                    root_ty = *known;
                }
                _ => return SolveResult::Unsolved,
            }
        }
        if root_ty.is_error() {
            self.absorb(cs, key_path);
            return SolveResult::Solved;
        }
        if root_ty == Type::AnyObject {
            if !cs.attempt_fixes {
                return SolveResult::Error;
            }
            self.record_fix(cs, FixKind::AllowAnyObjectKeyPathRoot, loc);
            self.absorb(cs, key_path);
            return SolveResult::Solved;
        }
        let ExprKind::KeyPath { components, .. } = self.cx.module.expr(expr).node.clone() else {
            return SolveResult::Error;
        };

        let mut current = root_ty.clone();
        let mut writable = true;
        let mut chained = false;
        for (index, component) in components.iter().enumerate() {
            let comp_loc = ConstraintLocator::new(expr).with(PathElt::KeyPathComponent(index));
            current = cs.resolve(&current);
            if current.is_var() || current.is_error() {
                current = Type::Error;
                break;
            }
            match &component.node {
                KeyPathComponentKind::Property(name) => {
                    let base = current.clone();
                    let choices = members::lookup_members(self.ev, self.cx, &base, name, true);
                    let Some(choice) = choices.into_iter().next() else {
                        if !cs.attempt_fixes {
                            return SolveResult::Error;
                        }
                        self.record_fix(
                            cs,
                            FixKind::DefineMemberBasedOnUse {
                                base,
                                name: name.clone(),
                            },
                            &comp_loc,
                        );
                        current = Type::Error;
                        break;
                    };
                    let choice = match choice {
                        OverloadChoice::Decl { decl, .. } => OverloadChoice::Decl {
                            decl,
                            base: Some(Type::lvalue(base)),
                        },
                        other => other,
                    };
                    if let Some(decl) = choice.decl() {
                        let d = self.cx.module.decl(decl);
                        let invalid = if d.attrs.is_static {
                            Some(KeyPathRefKind::StaticMember)
                        } else if matches!(d.kind, DeclKind::Func { .. }) {
                            Some(KeyPathRefKind::Method)
                        } else if d.attrs.mutating_getter {
                            Some(KeyPathRefKind::MutatingGetter)
                        } else {
                            None
                        };
                        if let Some(kind) = invalid {
                            if !cs.attempt_fixes {
                                return SolveResult::Error;
                            }
                            self.record_fix(cs, FixKind::AllowInvalidRefInKeyPath { kind, member: decl }, &comp_loc);
                        }
                    }
                    let ty = members::type_of_reference(self.ev, self.cx, cs, &choice, &comp_loc);
                    cs.record_overload(
                        comp_loc,
                        SelectedOverload {
                            choice,
                            opened_type: ty.clone(),
                        },
                    );
                    writable &= ty.is_lvalue();
                    current = ty.rvalue().clone();
                }
                KeyPathComponentKind::Subscript(args) => {
                    let base = current.clone();
                    let choice = members::lookup_members(self.ev, self.cx, &base, "subscript", true)
                        .into_iter()
                        .next();
                    let Some(choice) = choice else {
                        if !cs.attempt_fixes {
                            return SolveResult::Error;
                        }
                        self.record_fix(
                            cs,
                            FixKind::DefineMemberBasedOnUse {
                                base,
                                name: "subscript".into(),
                            },
                            &comp_loc,
                        );
                        current = Type::Error;
                        break;
                    };
                    let ty = members::type_of_reference(self.ev, self.cx, cs, &choice, &comp_loc);
                    cs.record_overload(
                        comp_loc.clone(),
                        SelectedOverload {
                            choice,
                            opened_type: ty.clone(),
                        },
                    );
                    let Type::Function(f) = ty else {
                        current = Type::Error;
                        break;
                    };
                    for (arg, param) in args.iter().zip(f.params.iter()) {
                        let arg_ty = cs.expr_type(arg.value).cloned().unwrap_or(Type::Error);
                        cs.add(Constraint::new(
                            ConstraintKind::ArgumentConversion {
                                from: arg_ty,
                                to: param.ty.clone(),
                            },
                            comp_loc.clone(),
                        ));
                    }
                    writable &= f.result.is_lvalue();
                    current = f.result.rvalue().clone();
                }
                KeyPathComponentKind::OptionalChain => {
                    writable = false;
                    chained = true;
                    if let Type::Optional(payload) = current {
                        current = *payload;
                    }
                }
                KeyPathComponentKind::OptionalForce => {
                    writable = false;
                    if let Type::Optional(payload) = current {
                        current = *payload;
                    }
                }
            }
        }
        let value = if chained && !current.is_optional() {
            Type::optional(current)
        } else {
            current
        };
        let computed = Type::KeyPath {
            root: Box::new(root_ty),
            value: Box::new(value),
            writable,
        };
        if cs.resolve(key_path).is_var() {
            self.relate(cs, key_path, &computed, MatchKind::Bind, loc)
        } else {
            self.relate(cs, &computed, key_path, MatchKind::Conversion, loc)
        }
    }

    fn simplify_key_path_application(
        &mut self,
        cs: &mut ConstraintSystem,
        key_path: &Type,
        root: &Type,
        value: &Type,
        loc: &ConstraintLocator,
    ) -> SolveResult {
        let base = cs.resolve(root);
        let mut kp = cs.resolve(key_path);
        if let Type::Var(var) = kp {
            let fresh = cs.new_type_var();
            let guessed = Type::KeyPath {
                root: Box::new(base.rvalue().clone()),
                value: Box::new(fresh),
                writable: false,
            };
            cs.bind(var, guessed.clone());
            kp = guessed;
        }
        match kp {
            Type::KeyPath {
                root: kp_root,
                value: kp_value,
                writable,
            } => {
                let root_loc = loc.with(PathElt::KeyPathRoot);
                if self.relate(cs, base.rvalue(), &kp_root, MatchKind::Conversion, &root_loc) == SolveResult::Error {
                    return SolveResult::Error;
                }
                let result = if writable && base.is_lvalue() {
                    Type::lvalue(*kp_value)
                } else {
                    *kp_value
                };
                self.relate(cs, value, &result, MatchKind::Bind, &loc.with(PathElt::KeyPathValue))
            }
            Type::Error => {
                self.absorb(cs, value);
                SolveResult::Solved
            }
            other => {
                if !cs.attempt_fixes {
                    return SolveResult::Error;
                }
                let expected = Type::KeyPath {
                    root: Box::new(base.rvalue().clone()),
                    value: Box::new(cs.resolve(value).rvalue().clone()),
                    writable: false,
                };
                self.record_fix(cs, FixKind::KeyPathContextualMismatch { from: other, to: expected }, loc);
                self.absorb(cs, value);
                SolveResult::Solved
            }
        }
    }

    // -- Members --------------------------------------------------------------

    fn simplify_member(
        &mut self,
        cs: &mut ConstraintSystem,
        base: &Type,
        member: &Type,
        name: &str,
        loc: &ConstraintLocator,
    ) -> SolveResult {
        let base_full = cs.resolve(base);
        let base_ty = base_full.rvalue().clone();
        match &base_ty {
            Type::Var(_) => return SolveResult::Unsolved,
            Type::Metatype(instance) if instance.is_var() => return SolveResult::Unsolved,
            Type::Error => {
                self.absorb(cs, member);
                return SolveResult::Solved;
            }
            _ => {}
        }
        if name == "subscript" && loc.last() == Some(&PathElt::Member) {
            if !cs.attempt_fixes {
                return SolveResult::Error;
            }
            self.record_fix(cs, FixKind::UseSubscriptOperator, loc);
        }

        if let Type::Optional(payload) = &base_ty {
            let choices = members::lookup_members(self.ev, self.cx, payload, name, false);
            if !choices.is_empty() {
                if !cs.attempt_fixes {
                    return SolveResult::Error;
                }
                let optional_result = choices.first().is_some_and(|c| self.member_is_optional(c));
                let fix = if optional_result {
                    FixKind::UnwrapOptionalBaseWithOptionalResult {
                        member: name.to_string(),
                        base: base_ty.clone(),
                    }
                } else {
                    FixKind::UnwrapOptionalBase {
                        member: name.to_string(),
                        base: base_ty.clone(),
                    }
                };
                self.record_fix(cs, fix, loc);
                return self.resolve_member_choices(cs, member, payload, choices, name, loc);
            }
        }

        let choices = members::lookup_members(self.ev, self.cx, &base_ty, name, base_full.is_lvalue());
        if choices.is_empty() {
            if let Some(result) = self.storage_member(cs, &base_full, member, name, loc) {
                return result;
            }
            return self.repair_missing_member(cs, &base_ty, member, name, loc);
        }
        self.resolve_member_choices(cs, member, &base_full, choices, name, loc)
    }

    fn member_is_optional(&mut self, choice: &OverloadChoice) -> bool {
        match choice {
            OverloadChoice::Decl { decl, .. } => request::interface_type(self.ev, self.cx, *decl).is_optional(),
            OverloadChoice::Builtin { ty, .. } => ty.is_optional(),
            OverloadChoice::ImplicitInit { .. } => false,
        }
    }

    /// `base._x` and `base.$x` for a wrapped property `x` of `base`.
    fn storage_member(
        &mut self,
        cs: &mut ConstraintSystem,
        base_full: &Type,
        member: &Type,
        name: &str,
        loc: &ConstraintLocator,
    ) -> Option<SolveResult> {
        let (projection, wrapped_name) = members::storage_ref_name(name)?;
        let wrapped = members::lookup_members(self.ev, self.cx, base_full.rvalue(), wrapped_name, false)
            .into_iter()
            .filter_map(|choice| choice.decl())
            .find(|decl| matches!(self.cx.module.decl(*decl).kind, DeclKind::Var { .. }))?;
        let ty = members::wrapper_storage_type(self.ev, self.cx, cs, wrapped, projection, Some(base_full), loc)?;
        cs.record_overload(
            loc.clone(),
            SelectedOverload {
                choice: OverloadChoice::Decl {
                    decl: wrapped,
                    base: Some(base_full.clone()),
                },
                opened_type: ty.clone(),
            },
        );
        Some(self.relate(cs, member, &ty, MatchKind::Bind, loc))
    }

    fn is_accessible(&self, decl: DeclId) -> bool {
        let d = self.cx.module.decl(decl);
        if d.attrs.access != AccessLevel::Private {
            return true;
        }
        let Some(scope) = d.parent else {
            return true;
        };
        let mut current = Some(self.dc);
        while let Some(c) = current {
            if c == scope {
                return true;
            }
            current = self.cx.module.parent(c);
        }
        false
    }

    /// Problems with referring to `decl` through `base`, as fixes.
    fn member_ref_fixes(&self, decl: DeclId, base: &Type, name: &str) -> Vec<FixKind> {
        let mut fixes = Vec::new();
        let is_meta = base.rvalue().is_metatype();
        let is_static = members::is_static_member(&*self.cx, decl);
        if is_static != is_meta {
            fixes.push(FixKind::AllowTypeOrInstanceMember {
                base: base.rvalue().clone(),
                member: decl,
                name: name.to_string(),
            });
        }
        if !self.is_accessible(decl) {
            fixes.push(FixKind::AllowInaccessibleMember { member: decl });
        }
        fixes
    }

    fn resolve_member_choices(
        &mut self,
        cs: &mut ConstraintSystem,
        member: &Type,
        base: &Type,
        choices: Vec<OverloadChoice>,
        name: &str,
        loc: &ConstraintLocator,
    ) -> SolveResult {
        let choices: Vec<(OverloadChoice, Vec<FixKind>)> = choices
            .into_iter()
            .map(|choice| match choice {
                OverloadChoice::Decl { decl, .. } => {
                    let fixes = self.member_ref_fixes(decl, base, name);
                    (
                        OverloadChoice::Decl {
                            decl,
                            base: Some(base.clone()),
                        },
                        fixes,
                    )
                }
                other => (other, Vec::new()),
            })
            .collect();
        let viable: Vec<OverloadChoice> = choices
            .iter()
            .filter(|(_, fixes)| fixes.is_empty())
            .map(|(choice, _)| choice.clone())
            .collect();
        match viable.as_slice() {
            [] => {
                if !cs.attempt_fixes {
                    return SolveResult::Error;
                }
                let Some((choice, fixes)) = choices.into_iter().next() else {
                    return SolveResult::Error;
                };
                for fix in fixes {
                    if matches!(fix, FixKind::AllowInaccessibleMember { .. }) {
                        cs.score.inaccessible_choices += 1;
                    }
                    self.record_fix(cs, fix, loc);
                }
                self.resolve_overload(cs, member, &choice, loc)
            }
            [choice] => self.resolve_overload(cs, member, choice, loc),
            _ => {
                let alternatives = viable
                    .into_iter()
                    .map(|choice| {
                        Constraint::new(
                            ConstraintKind::BindOverload {
                                ty: member.clone(),
                                choice,
                            },
                            loc.clone(),
                        )
                    })
                    .collect();
                cs.disjunctions
                    .push(Constraint::new(ConstraintKind::Disjunction(alternatives), loc.clone()));
                SolveResult::Solved
            }
        }
    }

    fn resolve_overload(
        &mut self,
        cs: &mut ConstraintSystem,
        ty: &Type,
        choice: &OverloadChoice,
        loc: &ConstraintLocator,
    ) -> SolveResult {
        if let (Some(decl), Some(base)) = (choice.decl(), choice.base())
            && self.check_member_use(cs, decl, base, loc) == SolveResult::Error
        {
            return SolveResult::Error;
        }
        let opened = members::type_of_reference(self.ev, self.cx, cs, choice, loc);
        if let Some(decl) = choice.decl()
            && !self.cx.module.decl(decl).generic_params.is_empty()
        {
            cs.score.generic_overloads += 1;
        }
        cs.record_overload(
            loc.clone(),
            SelectedOverload {
                choice: choice.clone(),
                opened_type: opened.clone(),
            },
        );
        self.relate(cs, ty, &opened, MatchKind::Bind, loc)
    }

    /// The expression a member reference at `loc` is made through.
    fn base_expr(&self, loc: &ConstraintLocator) -> Option<ExprId> {
        match &self.cx.module.expr(loc.anchor?).node {
            ExprKind::Member { base, .. } | ExprKind::Subscript { base, .. } => Some(*base),
            ExprKind::Call { callee, .. } => Some(*callee),
            _ => None,
        }
    }

    /// Checks on a member reference that depend on how it is used.
    fn check_member_use(
        &mut self,
        cs: &mut ConstraintSystem,
        decl: DeclId,
        base: &Type,
        loc: &ConstraintLocator,
    ) -> SolveResult {
        let d = self.cx.module.decl(decl).clone();
        let base_rv = base.rvalue().clone();
        let mut fixes = Vec::new();

        let on_existential = match &base_rv {
            Type::Existential(_) => true,
            Type::Metatype(instance) => instance.is_existential(),
            _ => false,
        };
        let in_protocol = d.parent.is_some_and(|p| self.cx.module.decl(p).is_protocol());
        if on_existential && in_protocol && !matches!(d.kind, DeclKind::Init { .. }) && mentions_self(&d.kind) {
            fixes.push(ConstraintFix::new(
                FixKind::AllowMemberRefOnExistential {
                    base: base_rv.clone(),
                    name: d.name.clone(),
                },
                loc.clone(),
            ));
        }

        if let DeclKind::Init { .. } = d.kind
            && let Type::Metatype(instance) = &base_rv
        {
            let base_expr = self.base_expr(loc);
            let dynamic = base_expr.is_some_and(|e| {
                !matches!(self.cx.module.expr(e).node, ExprKind::TypeRef { .. })
                    && cs.overloads.contains_key(&ConstraintLocator::new(e))
            });
            if instance.is_existential() {
                fixes.push(ConstraintFix::new(
                    FixKind::AllowInvalidInitRef {
                        kind: InitRefKind::ProtocolMetatype,
                        base: base_rv.clone(),
                        init: Some(decl),
                    },
                    loc.clone(),
                ));
            } else if dynamic
                && instance.as_nominal().is_some_and(|n| n.kind == NominalKind::Class)
                && !d.attrs.is_required
            {
                fixes.push(ConstraintFix::new(
                    FixKind::AllowInvalidInitRef {
                        kind: InitRefKind::DynamicOnMetatype,
                        base: base_rv.clone(),
                        init: Some(decl),
                    },
                    loc.clone(),
                ));
            }
        }

        if let DeclKind::Func { .. } = d.kind
            && d.attrs.is_mutating
            && loc.last() == Some(&PathElt::Member)
            && let Some(anchor) = loc.anchor
        {
            let applied = matches!(
                self.cx.module.expr_parent(anchor),
                Some(tarn_ast::ExprParent::Expr(parent))
                    if matches!(self.cx.module.expr(parent).node, ExprKind::Call { callee, .. } if callee == anchor)
            );
            let value_base = matches!(
                base_rv.as_nominal().map(|n| n.kind),
                Some(NominalKind::Struct | NominalKind::Enum)
            );
            if !applied {
                let through_self = self
                    .base_expr(loc)
                    .is_some_and(|e| matches!(&self.cx.module.expr(e).node, ExprKind::DeclRef { name } if name == "self"));
                let kind = FixKind::AllowInvalidPartialApplication { member: d.name.clone() };
                fixes.push(if through_self {
                    ConstraintFix::warning(kind, loc.clone())
                } else {
                    ConstraintFix::new(kind, loc.clone())
                });
            } else if value_base && !base.is_lvalue() {
                fixes.push(ConstraintFix::new(
                    FixKind::AllowMutatingMemberOnRValueBase {
                        member: decl,
                        base: base_rv.clone(),
                    },
                    loc.clone(),
                ));
            }
        }

        if fixes.is_empty() {
            return SolveResult::Solved;
        }
        if !cs.attempt_fixes && fixes.iter().any(|f| !f.is_warning) {
            return SolveResult::Error;
        }
        for fix in fixes {
            self.record(cs, fix);
        }
        SolveResult::Solved
    }

    // -- Application ----------------------------------------------------------

    fn simplify_apply(
        &mut self,
        cs: &mut ConstraintSystem,
        args: &FunctionType,
        callee: &Type,
        loc: &ConstraintLocator,
    ) -> SolveResult {
        let callee_ty = cs.resolve(callee).rvalue().clone();
        match callee_ty {
            Type::Var(_) => SolveResult::Unsolved,
            Type::Error => {
                for param in &args.params {
                    self.absorb(cs, &param.ty);
                }
                self.absorb(cs, &args.result);
                SolveResult::Solved
            }
            Type::Metatype(_) => {
                let call = loc.anchor;
                let callee_expr = call.and_then(|c| match self.cx.module.expr(c).node {
                    ExprKind::Call { callee, .. } => Some(callee),
                    _ => None,
                });
                if let Some(callee_expr) = callee_expr
                    && cs.overloads.contains_key(&ConstraintLocator::new(callee_expr))
                {
                    if !cs.attempt_fixes {
                        return SolveResult::Error;
                    }
                    self.record_fix(
                        cs,
                        FixKind::AllowInvalidInitRef {
                            kind: InitRefKind::NonConstMetatype,
                            base: callee_ty.clone(),
                            init: None,
                        },
                        loc,
                    );
                }
                let init = cs.new_type_var();
                cs.add(Constraint::new(
                    ConstraintKind::ValueMember {
                        base: callee_ty,
                        member: init.clone(),
                        name: "init".into(),
                    },
                    ConstraintLocator::with_path(call, [PathElt::ConstructorMember]),
                ));
                cs.add(Constraint::new(
                    ConstraintKind::ApplicableFunction {
                        args: args.clone(),
                        callee: init,
                    },
                    loc.clone(),
                ));
                SolveResult::Solved
            }
            Type::Function(f) => self.match_arguments(cs, args, &f, loc),
            _ => SolveResult::Error,
        }
    }

    /// Bind call arguments to parameters by label and position.
    fn match_arguments(
        &mut self,
        cs: &mut ConstraintSystem,
        args: &FunctionType,
        f: &FunctionType,
        loc: &ConstraintLocator,
    ) -> SolveResult {
        let anchor = loc.anchor;
        let call_loc = ConstraintLocator::with_path(anchor, []);
        let nargs = args.params.len();
        let nparams = f.params.len();
        let mut bound: Vec<Option<usize>> = vec![None; nparams];
        let mut used = vec![false; nargs];

        for (j, param) in f.params.iter().enumerate() {
            if let Some(i) = (0..nargs).find(|&i| !used[i] && args.params[i].label == param.label) {
                bound[j] = Some(i);
                used[i] = true;
            }
        }
        let mut relabeled = false;
        for pass_defaults in [false, true] {
            for (j, param) in f.params.iter().enumerate() {
                if bound[j].is_some() || param.has_default != pass_defaults {
                    continue;
                }
                if let Some(i) = (0..nargs).find(|&i| !used[i]) {
                    bound[j] = Some(i);
                    used[i] = true;
                    relabeled = true;
                }
            }
        }
        if used.iter().any(|u| !u) {
            return SolveResult::Error;
        }

        if relabeled {
            if !cs.attempt_fixes {
                return SolveResult::Error;
            }
            let mut labels = vec![None; nargs];
            for (j, arg) in bound.iter().enumerate() {
                if let Some(i) = arg {
                    labels[*i] = f.params[j].label.clone();
                }
            }
            self.record_fix(cs, FixKind::RelabelArguments { labels }, &call_loc);
        } else {
            let order: Vec<usize> = bound.iter().flatten().copied().collect();
            if let Some(k) = (1..order.len()).find(|&k| order[k] < order[k - 1]) {
                if !cs.attempt_fixes {
                    return SolveResult::Error;
                }
                self.record_fix(
                    cs,
                    FixKind::MoveOutOfOrderArgument {
                        arg: order[k - 1],
                        prev_arg: order[k],
                    },
                    &call_loc,
                );
            }
        }

        let missing: Vec<SynthesizedArg> = f
            .params
            .iter()
            .enumerate()
            .filter(|(j, param)| bound[*j].is_none() && !param.has_default)
            .map(|(j, param)| SynthesizedArg {
                param_index: j,
                label: param.label.clone(),
                ty: cs.resolve(&param.ty),
            })
            .collect();
        if !missing.is_empty() {
            if !cs.attempt_fixes {
                return SolveResult::Error;
            }
            self.record_fix(cs, FixKind::AddMissingArguments { synthesized: missing }, &call_loc);
        }

        for (j, arg) in bound.iter().enumerate() {
            let Some(i) = *arg else {
                continue;
            };
            let param = &f.params[j];
            let arg_loc = ConstraintLocator::with_path(anchor, [PathElt::ApplyArgToParam { arg: i, param: j }]);
            let (to, arg_loc) = match &param.ty {
                Type::Function(inner) if param.autoclosure => {
                    ((*inner.result).clone(), arg_loc.with(PathElt::AutoclosureResult))
                }
                other => (other.clone(), arg_loc),
            };
            cs.add(Constraint::new(
                ConstraintKind::ArgumentConversion {
                    from: args.params[i].ty.clone(),
                    to,
                },
                arg_loc,
            ));
        }
        cs.add(Constraint::new(
            ConstraintKind::Bind {
                first: (*args.result).clone(),
                second: (*f.result).clone(),
            },
            ConstraintLocator::with_path(anchor, [PathElt::FunctionResult]),
        ));
        SolveResult::Solved
    }
}

/// The default type of a literal constrained to be `var`, if any.
fn literal_default(cs: &ConstraintSystem, var: TypeVarId) -> Option<Type> {
    cs.inactive.iter().find_map(|constraint| match &constraint.kind {
        ConstraintKind::LiteralConformsTo { ty, literal } if cs.resolve(ty) == Type::Var(var) => {
            literal.default_type()
        }
        _ => None,
    })
}

/// Fallback bindings for variables nothing else decides: literal defaults
/// first, then `Defaultable` constraints. The flag marks the latter.
fn default_bindings(cs: &ConstraintSystem) -> Vec<(TypeVarId, Type, bool)> {
    let mut defaults = Vec::new();
    for constraint in &cs.inactive {
        if let ConstraintKind::LiteralConformsTo { ty, literal } = &constraint.kind
            && let Type::Var(var) = cs.resolve(ty).rvalue()
            && let Some(default) = literal.default_type()
        {
            defaults.push((*var, default, false));
        }
    }
    for constraint in &cs.inactive {
        if let ConstraintKind::Defaultable { ty, default } = &constraint.kind
            && let Type::Var(var) = cs.resolve(ty)
        {
            defaults.push((var, default.clone(), true));
        }
    }
    defaults
}

/// The types a constraint mentions.
fn constraint_types(constraint: &Constraint) -> Vec<&Type> {
    match &constraint.kind {
        ConstraintKind::Bind { first, second }
        | ConstraintKind::Equal { first, second }
        | ConstraintKind::SameType { first, second } => vec![first, second],
        ConstraintKind::Conversion { from, to } | ConstraintKind::ArgumentConversion { from, to } => {
            vec![from, to]
        }
        ConstraintKind::ConformsTo { ty, .. }
        | ConstraintKind::LiteralConformsTo { ty, .. }
        | ConstraintKind::BindOverload { ty, .. }
        | ConstraintKind::Defaultable { ty, .. } => vec![ty],
        ConstraintKind::Superclass { ty, superclass } => vec![ty, superclass],
        ConstraintKind::ValueMember { base, member, .. } => vec![base, member],
        ConstraintKind::ApplicableFunction { args, callee } => args
            .params
            .iter()
            .map(|p| &p.ty)
            .chain([&*args.result, callee])
            .collect(),
        ConstraintKind::OptionalObject { optional, object } => vec![optional, object],
        ConstraintKind::KeyPath { key_path, root, .. } => vec![key_path, root],
        ConstraintKind::KeyPathApplication { key_path, root, value } => vec![key_path, root, value],
        ConstraintKind::Disjunction(_) => Vec::new(),
    }
}

fn repr_mentions_self(repr: &TypeRepr) -> bool {
    match &repr.node {
        TypeReprKind::Ident(name) => name == "Self",
        TypeReprKind::Member { base, .. }
        | TypeReprKind::Optional(base)
        | TypeReprKind::Metatype(base)
        | TypeReprKind::InOut(base) => repr_mentions_self(base),
        TypeReprKind::Generic { base, args } => {
            repr_mentions_self(base) || args.iter().any(repr_mentions_self)
        }
        TypeReprKind::Function { params, result, .. } => {
            params.iter().any(repr_mentions_self) || repr_mentions_self(result)
        }
        TypeReprKind::Tuple(elems) | TypeReprKind::Composition(elems) => elems.iter().any(repr_mentions_self),
    }
}

/// Whether a protocol requirement's signature refers to `Self`.
fn mentions_self(kind: &DeclKind) -> bool {
    match kind {
        DeclKind::Func { signature, .. } | DeclKind::Subscript { signature } => {
            signature.params.iter().any(|p| repr_mentions_self(&p.ty))
                || signature.result.as_ref().is_some_and(repr_mentions_self)
        }
        DeclKind::Var { ty: Some(ty), .. } => repr_mentions_self(ty),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_put_literals_before_defaultable() {
        let mut cs = ConstraintSystem::new();
        let element = cs.new_type_var();
        let literal = cs.new_type_var();
        let loc = ConstraintLocator::new(ExprId(0));
        cs.inactive.push(Constraint::new(
            ConstraintKind::Defaultable {
                ty: element.clone(),
                default: Type::Any,
            },
            loc.clone(),
        ));
        cs.inactive.push(Constraint::new(
            ConstraintKind::LiteralConformsTo {
                ty: literal.clone(),
                literal: LiteralKind::String,
            },
            loc,
        ));
        let defaults = default_bindings(&cs);
        assert_eq!(defaults.len(), 2);
        assert_eq!(defaults[0].1, Type::String);
        assert!(!defaults[0].2);
        assert_eq!(defaults[1].1, Type::Any);
        assert!(defaults[1].2);
    }

    #[test]
    fn nil_literal_has_no_default() {
        let mut cs = ConstraintSystem::new();
        let ty = cs.new_type_var();
        cs.inactive.push(Constraint::new(
            ConstraintKind::LiteralConformsTo {
                ty,
                literal: LiteralKind::Nil,
            },
            ConstraintLocator::new(ExprId(0)),
        ));
        assert!(default_bindings(&cs).is_empty());
        assert_eq!(literal_default(&cs, TypeVarId(0)), None);
    }

    #[test]
    fn match_kind_builds_matching_constraint() {
        let kind = MatchKind::ArgumentConversion.constraint(Type::Int, Type::Double);
        assert_eq!(
            kind,
            ConstraintKind::ArgumentConversion {
                from: Type::Int,
                to: Type::Double
            }
        );
        assert!(MatchKind::Conversion.is_conversion());
        assert!(!MatchKind::Bind.is_conversion());
    }
}
