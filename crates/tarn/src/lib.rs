//! Driver for the tarn checker.
//!
//! Loads a module, runs declaration checking and then expression type
//! checking over one shared [`TypeChecker`], and renders what was found.
//! Errors at this level are plain strings meant for the terminal.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use tarn_ast::{DeclId, Module};
use tarn_diag::{Diagnostic, Severity};
use tarn_eval::trace::EvalStep;
use tarn_eval::{EvaluatorOptions, EvaluatorStats};
use tarn_infer::trace::SolveStep;
use tarn_infer::{InferReport, SolverOptions, check_bodies_with};
use tarn_sema::{CheckOptions, TypeChecker, check_module_with};

/// Options for one [`check`] run.
#[derive(Debug, Clone, Default)]
pub struct DriverOptions {
    pub check: CheckOptions,
    pub solver: SolverOptions,
    /// Record evaluator steps. Solver steps are governed by
    /// `solver.trace_limit`.
    pub trace: bool,
}

impl DriverOptions {
    /// Options with evaluator and solver tracing both turned on.
    pub fn traced() -> Self {
        Self {
            solver: SolverOptions {
                trace_limit: 1_000,
                ..SolverOptions::default()
            },
            trace: true,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
pub struct CheckResult {
    pub module: Module,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: EvaluatorStats,
    pub eval_trace: Vec<EvalStep>,
    pub report: InferReport,
}

impl CheckResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn solver_trace(&self) -> &[SolveStep] {
        &self.report.trace
    }

    /// All diagnostics rendered for a terminal, one block per diagnostic.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for diag in &self.diagnostics {
            out.push_str(&render_diagnostic(&self.module, diag));
        }
        out
    }
}

pub fn load_module(path: &Path) -> Result<Module, String> {
    let text = fs::read_to_string(path)
        .map_err(|err| format!("failed to read `{}`: {err}", path.display()))?;
    Module::from_json(&text).map_err(|err| format!("failed to load `{}`: {err}", path.display()))
}

/// Check every declaration and body of `module`.
pub fn check(module: Module, options: &DriverOptions) -> CheckResult {
    let mut tc = TypeChecker::with_options(module, EvaluatorOptions::default());
    if options.trace {
        tc.evaluator.enable_tracing();
    }
    check_module_with(&mut tc, &options.check);
    let report = check_bodies_with(&mut tc, &options.solver);

    let eval_trace = tc.evaluator.take_trace().unwrap_or_default();
    let stats = tc.stats().snapshot();
    let diagnostics = tc.take_diagnostics();
    CheckResult {
        module: tc.cx.module,
        diagnostics,
        stats,
        eval_trace,
        report,
    }
}

pub fn check_file(path: &Path, options: &DriverOptions) -> Result<CheckResult, String> {
    Ok(check(load_module(path)?, options))
}

/// USRs of every declaration called `name`, in source order. `name` may be
/// a plain name (`move`) or a full function name (`move(dx:dy:)`).
pub fn usrs_named(module: Module, name: &str) -> Result<Vec<(DeclId, String)>, String> {
    let matches: Vec<DeclId> = module
        .decls_in_source_order()
        .into_iter()
        .filter(|&id| {
            let decl = module.decl(id);
            decl.name == name || (decl.is_func_like() && decl.full_name() == name)
        })
        .collect();
    if matches.is_empty() {
        return Err(format!("no declaration named `{name}` in module `{}`", module.name()));
    }
    let mut tc = TypeChecker::new(module);
    Ok(matches.into_iter().map(|id| (id, tc.usr(id))).collect())
}

/// `error[E0614]: message` followed by a `-->` line when the diagnostic has
/// a location. Notes are indented under the diagnostic they belong to.
pub fn render_diagnostic(module: &Module, diag: &Diagnostic) -> String {
    let indent = if diag.severity == Severity::Note { "  " } else { "" };
    let mut out = format!("{indent}{diag}\n");
    if let Some(location) = diag.location {
        let (line, column) = line_column(module, location.start);
        let _ = writeln!(out, "{indent}  --> {}:{line}:{column}", module.name());
    }
    for fix in &diag.fix_its {
        let (line, column) = line_column(module, fix.range.start);
        let action = match (fix.range.is_empty(), fix.text.is_empty()) {
            (true, _) => format!("insert `{}`", fix.text),
            (false, true) => "remove".to_string(),
            (false, false) => format!("replace with `{}`", fix.text),
        };
        let _ = writeln!(out, "{indent}  = fix: {action} at {line}:{column}");
    }
    out
}

/// One-based line and column of a byte offset. Without source text every
/// offset is on line 1.
pub fn line_column(module: &Module, offset: u32) -> (usize, usize) {
    let Some(source) = module.data().source.as_deref() else {
        return (1, offset as usize + 1);
    };
    let offset = (offset as usize).min(source.len());
    let before = source.get(..offset).unwrap_or(source);
    let line = before.matches('\n').count() + 1;
    let column = before.rfind('\n').map_or(before.len(), |nl| before.len() - nl - 1) + 1;
    (line, column)
}
