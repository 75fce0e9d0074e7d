//! Expression type checking for tarn.
//!
//! Each expression is checked in three steps:
//!
//! 1. [constraint generation](constraint_gen) gives every sub-expression a type and
//!    records how the types relate;
//! 2. the [solver] looks for assignments of the type variables that satisfy
//!    every constraint, first strictly and then, if nothing fits, in fix
//!    mode where failures are repaired by recording a [`fix::ConstraintFix`];
//! 3. the best solution is written back and each of its fixes is explained
//!    by its [`diagnostics::FailureDiagnostic`].
//!
//! [`check_bodies`] runs this over every initializer, function body and
//! top-level statement of a module, sharing the [`TypeChecker`] that
//! declaration checking used.

pub mod constraint;
pub mod cs;
pub mod diagnostics;
pub mod fix;
mod constraint_gen;
pub mod locator;
mod members;
mod repair;
pub mod score;
mod solver;
pub mod trace;

#[cfg(test)]
mod prop_tests;

use std::collections::BTreeMap;

use tarn_ast::{DeclId, DeclKind, ExprId, ExprKind};
use tarn_diag::{DiagId, diag_args};
use tarn_sema::{Ev, SemaContext, TypeChecker, request};
use tarn_types::Type;

use crate::constraint::{ConstraintKind, OverloadChoice};
use crate::cs::{ConstraintSystem, Solution};
use crate::diagnostics::{DiagnoseResult, FailureContext};
use crate::constraint_gen::ConstraintGenerator;
use crate::locator::{ConstraintLocator, ContextualPurpose};
use crate::score::Ranking;
use crate::solver::Solver;
use crate::trace::{SolveAction, SolveStep, Trace};

/// Knobs for one solver run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverOptions {
    /// Re-solve with fixes when no clean solution exists.
    pub attempt_fixes: bool,
    /// Constraint simplifications allowed per solve before giving up.
    pub max_steps: usize,
    /// Trace steps kept per expression; zero disables tracing.
    pub trace_limit: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            attempt_fixes: true,
            max_steps: 10_000,
            trace_limit: 0,
        }
    }
}

/// Outcome of checking one expression.
#[derive(Debug, Clone, Default)]
pub struct ExprCheck {
    /// The chosen solution, possibly carrying fixes. `None` when no
    /// solution exists or the best ones are ambiguous.
    pub solution: Option<Solution>,
    pub trace: Vec<SolveStep>,
}

impl ExprCheck {
    pub fn ty(&self, expr: ExprId) -> Option<Type> {
        self.solution.as_ref().map(|s| s.expr_type(expr))
    }

    pub fn is_clean(&self) -> bool {
        self.solution.as_ref().is_some_and(|s| !s.has_fixes())
    }
}

/// Summary of [`check_bodies`].
#[derive(Debug, Clone, Default)]
pub struct InferReport {
    /// Expressions type checked.
    pub checked: usize,
    /// Expressions left without a usable solution.
    pub failed: usize,
    /// Types of every expression, from the chosen solutions.
    pub expr_types: BTreeMap<ExprId, Type>,
    pub trace: Vec<SolveStep>,
}

/// Type check `expr` in the context of `dc`, converting it to `contextual`
/// when given. `return_type` is the declared result of the enclosing
/// function, for `return` statements inside it.
pub fn type_check_expr(
    ev: &mut Ev,
    cx: &mut SemaContext,
    dc: DeclId,
    expr: ExprId,
    contextual: Option<(Type, ContextualPurpose)>,
    return_type: Option<Type>,
    options: &SolverOptions,
) -> ExprCheck {
    let errors_before = cx.diags.error_count();
    let mut cs = ConstraintSystem::new();
    ConstraintGenerator::new(ev, cx, &mut cs, dc, return_type).generate(expr, contextual);

    let mut trace = Trace::new(options.trace_limit);
    trace.record(SolveAction::Generate, || {
        format!("#{} with {} constraints", expr.0, cs.constraints().count())
    });

    let mut solver = Solver::new(ev, cx, dc, options, trace);
    let mut solutions = solver.solve(cs.clone());
    let mut budget_exceeded = solver.budget_exceeded();
    if solutions.is_empty() && !budget_exceeded && options.attempt_fixes {
        let mut fixing = cs;
        fixing.attempt_fixes = true;
        solutions = solver.solve(fixing);
        budget_exceeded = solver.budget_exceeded();
    }
    let last_failure = solver.last_failure.take();
    let trace = solver.into_trace().into_steps();

    let at = cx.module.expr(expr).span.report_loc();
    if budget_exceeded {
        cx.diags.emit(at, DiagId::SolverBudgetExceeded, diag_args![]);
        return ExprCheck { solution: None, trace };
    }

    let solution = match score::rank(&solutions) {
        Ranking::Best(index) => {
            let solution = solutions.swap_remove(index);
            diagnose_solution(ev, cx, dc, expr, &solution, errors_before);
            Some(solution)
        }
        Ranking::Ambiguous(indices) => {
            let candidates: Vec<&Solution> = indices.iter().map(|&i| &solutions[i]).collect();
            diagnose_ambiguity(ev, cx, dc, expr, &candidates);
            None
        }
        Ranking::NoSolution => {
            if cx.diags.error_count() == errors_before {
                diagnose_no_solution(cx, expr, last_failure);
            }
            None
        }
    };
    ExprCheck { solution, trace }
}

fn diagnose_solution(
    ev: &mut Ev,
    cx: &mut SemaContext,
    dc: DeclId,
    expr: ExprId,
    solution: &Solution,
    errors_before: usize,
) {
    let mut deferred = false;
    {
        let mut fcx = FailureContext {
            ev: &mut *ev,
            cx: &mut *cx,
            solution,
            dc,
        };
        for fix in &solution.fixes {
            if fix.failure().diagnose_as_error(&mut fcx) == DiagnoseResult::Deferred {
                deferred = true;
            }
        }
    }
    if cx.diags.error_count() > errors_before {
        return;
    }
    let at = cx.module.expr(expr).span.report_loc();
    if deferred {
        cx.diags.emit(at, DiagId::FailedToProduceDiagnostic, diag_args![]);
    } else if solution.holes && !solution.fixes.iter().any(|f| !f.is_warning) {
        cx.diags.emit(at, DiagId::TypeOfExpressionIsAmbiguous, diag_args![]);
    }
}

fn choice_name(cx: &SemaContext, choice: &OverloadChoice) -> String {
    match choice {
        OverloadChoice::Decl { decl, .. } => cx.module.decl(*decl).name.clone(),
        OverloadChoice::ImplicitInit { .. } => "init".to_string(),
        OverloadChoice::Builtin { name, .. } => name.clone(),
    }
}

/// Equally good solutions disagree on an overload: report the first
/// reference they disagree on and the candidates for it.
fn diagnose_ambiguity(ev: &mut Ev, cx: &mut SemaContext, dc: DeclId, expr: ExprId, candidates: &[&Solution]) {
    let Some((first, rest)) = candidates.split_first() else {
        return;
    };
    let disputed: Option<ConstraintLocator> = first
        .overloads
        .iter()
        .find(|(locator, overload)| {
            rest.iter()
                .any(|s| s.overload_at(locator).map(|o| &o.choice) != Some(&overload.choice))
        })
        .map(|(locator, _)| locator.clone());
    let Some(locator) = disputed else {
        let at = cx.module.expr(expr).span.report_loc();
        cx.diags.emit(at, DiagId::TypeOfExpressionIsAmbiguous, diag_args![]);
        return;
    };

    let name = first
        .overload_at(&locator)
        .map(|o| choice_name(cx, &o.choice))
        .unwrap_or_default();
    let anchor = locator.resolve_anchor(&cx.module).unwrap_or(expr);
    let at = match &cx.module.expr(anchor).node {
        ExprKind::Member { name, .. } => name.span.report_loc(),
        _ => cx.module.expr(anchor).span.report_loc(),
    };

    let all_fixed = candidates.iter().all(|s| s.has_fixes());
    if all_fixed {
        cx.diags.emit(at, DiagId::NoExactMatch, diag_args![name.as_str()]);
    } else {
        cx.diags.emit(at, DiagId::AmbiguousDeclRef, diag_args![name.as_str()]);
    }

    let mut noted: Vec<DeclId> = Vec::new();
    for &solution in candidates {
        let decl = solution.overload_at(&locator).and_then(|o| o.choice.decl());
        let mut explained = false;
        if all_fixed {
            let mut fcx = FailureContext {
                ev: &mut *ev,
                cx: &mut *cx,
                solution,
                dc,
            };
            for fix in &solution.fixes {
                if fix.failure().diagnose_as_note(&mut fcx) == DiagnoseResult::Diagnosed {
                    explained = true;
                }
            }
        }
        if explained {
            continue;
        }
        if let Some(decl) = decl
            && !noted.contains(&decl)
        {
            noted.push(decl);
            let note_at = cx.module.decl(decl).name_span.report_loc();
            cx.diags.emit(note_at, DiagId::FoundCandidate, diag_args![]);
        }
    }
}

/// Nothing fits even with fixes. Explain the application that failed when
/// there is one, or fall back to a generic error.
fn diagnose_no_solution(
    cx: &mut SemaContext,
    expr: ExprId,
    last_failure: Option<(constraint::Constraint, Option<Type>)>,
) {
    if let Some((failed, Some(callee_ty))) = last_failure
        && let ConstraintKind::ApplicableFunction { args, .. } = &failed.kind
        && let Some(call) = failed.locator.anchor
        && let ExprKind::Call { callee, args: call_args } = &cx.module.expr(call).node
    {
        match &callee_ty {
            Type::Function(f) if args.params.len() > f.params.len() => {
                let extra = call_args
                    .get(f.params.len())
                    .map_or(call, |a| a.value);
                let at = cx.module.expr(extra).span.report_loc();
                cx.diags.emit(at, DiagId::ExtraArgument, diag_args![]);
                return;
            }
            Type::Function(_) | Type::Var(_) | Type::Error => {}
            other => {
                let at = cx.module.expr(*callee).span.report_loc();
                let other = other.clone();
                cx.diags.emit(at, DiagId::CannotCallNonFunction, diag_args![&other]);
                return;
            }
        }
    }
    let at = cx.module.expr(expr).span.report_loc();
    cx.diags.emit(at, DiagId::FailedToProduceDiagnostic, diag_args![]);
}

/// Type check every initializer, function body and top-level statement of
/// the module in source order.
pub fn check_bodies(tc: &mut TypeChecker) -> InferReport {
    check_bodies_with(tc, &SolverOptions::default())
}

pub fn check_bodies_with(tc: &mut TypeChecker, options: &SolverOptions) -> InferReport {
    let TypeChecker { evaluator, cx } = tc;
    let mut report = InferReport::default();
    for decl in cx.module.decls_in_source_order() {
        // Locals are checked with the body that declares them.
        if cx.module.is_local(decl) {
            continue;
        }
        check_decl_body(evaluator, cx, decl, options, &mut report);
    }
    report
}

fn check_decl_body(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId, options: &SolverOptions, report: &mut InferReport) {
    match cx.module.decl(decl).kind.clone() {
        DeclKind::Var { init: Some(init), ty, .. } => {
            let contextual = ty
                .is_some()
                .then(|| (request::interface_type(ev, cx, decl), ContextualPurpose::Initialization))
                .filter(|(ty, _)| !ty.is_error());
            let annotated = contextual.is_some();
            let check = check_expr(ev, cx, decl, init, contextual, None, options, report);
            if !annotated && let Some(ty) = check.ty(init) {
                cx.caches.inferred_var_types.insert(decl, ty.rvalue().clone());
            }
        }
        DeclKind::Func { signature, body } => {
            let result = match &signature.result {
                Some(repr) => tarn_sema::resolve::resolve_type(ev, cx, repr, Some(decl)),
                None => Type::Void,
            };
            check_function(ev, cx, decl, &body, result, options, report);
        }
        DeclKind::Init { body, .. } => check_function(ev, cx, decl, &body, Type::Void, options, report),
        DeclKind::TopLevelCode { expr } => {
            check_expr(ev, cx, decl, expr, None, None, options, report);
        }
        _ => {}
    }
}

/// Check a body's statements and the declarations nested in it, in the
/// order they appear.
fn check_function(
    ev: &mut Ev,
    cx: &mut SemaContext,
    func: DeclId,
    body: &[ExprId],
    result: Type,
    options: &SolverOptions,
    report: &mut InferReport,
) {
    enum Item {
        Stmt(ExprId),
        Local(DeclId),
    }
    let mut items: Vec<(u32, Item)> = body
        .iter()
        .map(|&e| (cx.module.expr(e).span.start, Item::Stmt(e)))
        .collect();
    items.extend(
        cx.module
            .decl_ids()
            .filter(|&d| cx.module.parent(d) == Some(func))
            .map(|d| (cx.module.decl(d).name_span.start, Item::Local(d))),
    );
    items.sort_by_key(|(start, _)| *start);

    for (_, item) in items {
        match item {
            Item::Stmt(e) => {
                check_expr(ev, cx, func, e, None, Some(result.clone()), options, report);
            }
            Item::Local(d) => check_decl_body(ev, cx, d, options, report),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn check_expr(
    ev: &mut Ev,
    cx: &mut SemaContext,
    dc: DeclId,
    expr: ExprId,
    contextual: Option<(Type, ContextualPurpose)>,
    return_type: Option<Type>,
    options: &SolverOptions,
    report: &mut InferReport,
) -> ExprCheck {
    let mut check = type_check_expr(ev, cx, dc, expr, contextual, return_type, options);
    report.checked += 1;
    match &check.solution {
        Some(solution) => report.expr_types.extend(
            solution
                .expr_types
                .iter()
                .map(|(e, ty)| (*e, ty.clone())),
        ),
        None => report.failed += 1,
    }
    report.trace.append(&mut check.trace);
    check
}
