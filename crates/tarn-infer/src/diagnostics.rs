//! Failure diagnostics: the user-facing explanation of each fix in the best
//! solution.
//!
//! A [`FailureDiagnostic`] pairs a [`FailureKind`] with the locator of the
//! fix that produced it. Diagnosing resolves the locator to the expression
//! to blame, reads types from the solution, and emits an error (or a note
//! pointing at a candidate) with fix-its where the repair is mechanical.

use tarn_ast::{Argument, Decl, DeclId, DeclKind, ExprId, ExprKind, ExprParent, Module, Span};
use tarn_diag::{DiagArg, DiagId, DiagnosticHandle, SourceLocation, diag_args};
use tarn_sema::{Ev, SemaContext, request};
use tarn_types::{FunctionType, Type};

use crate::cs::Solution;
use crate::fix::{InitRefKind, KeyPathRefKind, SynthesizedArg};
use crate::locator::{ConstraintLocator, ContextualPurpose, PathElt};

/// Outcome of trying to explain one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnoseResult {
    Diagnosed,
    /// The failure could not be pinned to source precisely enough; the
    /// caller falls back to a generic error.
    Deferred,
    /// This failure has no note form.
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailureKind {
    MissingOptionalUnwrap { base: Type, unwrapped: Type },
    MemberAccessOnOptionalBase { member: String, result_is_optional: bool },
    MissingExplicitConversion { from: Type, to: Type },
    MissingForcedDowncast { from: Type, to: Type },
    MissingAddressOf { ty: Type },
    InvalidUseOfAddressOf,
    RValueTreatedAsLValue,
    NoEscapeFuncToTypeConversion { to: Type },
    Labeling { labels: Vec<Option<String>> },
    OutOfOrderArgument { arg: usize, prev_arg: usize },
    MissingArguments { synthesized: Vec<SynthesizedArg> },
    MissingContextualConformance { ty: Type, protocol: Type },
    MissingConformance { ty: Type, protocol: Type },
    SameTypeRequirement { lhs: Type, rhs: Type },
    SuperclassRequirement { lhs: Type, rhs: Type },
    Contextual { from: Type, to: Type },
    CollectionElementContextual { from: Type, to: Type },
    GenericArgumentsMismatch {
        actual: Type,
        required: Type,
        mismatches: Vec<usize>,
    },
    AutoClosureForwarding,
    NonOptionalUnwrap { base: Type },
    MissingCall,
    ExtraneousPropertyWrapperUnwrap {
        wrapped: DeclId,
        using_projection: bool,
        base: Type,
        wrapper: Type,
    },
    MissingPropertyWrapperUnwrap {
        wrapped: DeclId,
        base: Type,
        wrapper: Type,
    },
    SubscriptMisuse,
    MissingMember { base: Type, name: String },
    AllowTypeOrInstanceMember {
        base: Type,
        member: DeclId,
        name: String,
    },
    PartialApplication { member: String, is_warning: bool },
    InvalidInitRef {
        kind: InitRefKind,
        base: Type,
        init: Option<DeclId>,
    },
    InvalidMemberRefOnExistential { base: Type, name: String },
    ClosureParamDestructuring { contextual: FunctionType },
    InaccessibleMember { member: DeclId },
    AnyObjectKeyPathRoot,
    KeyPathSubscriptIndexHashable { ty: Type },
    InvalidRefInKeyPath { kind: KeyPathRefKind, member: DeclId },
    ExtraneousReturn,
    MissingGenericArguments { params: Vec<String> },
    SkipUnhandledConstructInFunctionBuilder { construct: String, builder: DeclId },
    MutatingMemberRefOnImmutableBase { member: DeclId, base: Type },
}

/// What a failure needs to read while it is diagnosed.
pub struct FailureContext<'a> {
    pub ev: &'a mut Ev,
    pub cx: &'a mut SemaContext,
    pub solution: &'a Solution,
    /// The declaration whose expression was solved.
    pub dc: DeclId,
}

impl FailureContext<'_> {
    fn module(&self) -> &Module {
        &self.cx.module
    }

    fn expr_loc(&self, expr: ExprId) -> Option<SourceLocation> {
        self.cx.module.expr(expr).span.report_loc()
    }

    fn ty(&self, ty: &Type) -> Type {
        self.solution.simplify_type(ty).rvalue().clone()
    }

    fn expr_ty(&self, expr: ExprId) -> Type {
        self.solution.expr_type(expr).rvalue().clone()
    }

    fn parent_expr(&self, expr: ExprId) -> Option<ExprId> {
        match self.cx.module.expr_parent(expr)? {
            ExprParent::Expr(parent) => Some(parent),
            ExprParent::Decl(_) => None,
        }
    }

    fn emit(&mut self, at: Option<SourceLocation>, id: DiagId, args: Vec<DiagArg>) -> DiagnosticHandle<'_> {
        self.cx.diags.emit(at, id, args)
    }

    /// The declaration a call expression invokes.
    fn callee_decl(&self, call: ExprId) -> Option<DeclId> {
        if let Some(decl) = self.solution.referenced_decl(call) {
            return Some(decl);
        }
        match &self.module().expr(call).node {
            ExprKind::Call { callee, .. } => self.solution.referenced_decl(*callee),
            _ => None,
        }
    }

    /// Where a member reference should be reported: its name when it has
    /// one.
    fn member_name_loc(&self, expr: ExprId) -> Option<SourceLocation> {
        match &self.module().expr(expr).node {
            ExprKind::Member { name, .. } => name.span.report_loc(),
            _ => self.expr_loc(expr),
        }
    }

    fn key_path_component_loc(&self, expr: ExprId, index: usize) -> Option<SourceLocation> {
        match &self.module().expr(expr).node {
            ExprKind::KeyPath { components, .. } => components
                .get(index)
                .and_then(|c| c.span.report_loc())
                .or_else(|| self.expr_loc(expr)),
            _ => self.expr_loc(expr),
        }
    }
}

fn call_args(module: &Module, call: ExprId) -> Option<&[Argument]> {
    match &module.expr(call).node {
        ExprKind::Call { args, .. } | ExprKind::Subscript { args, .. } => Some(args),
        _ => None,
    }
}

/// Where an argument starts in source, label included.
fn arg_span(module: &Module, arg: &Argument) -> Span {
    let value = module.expr(arg.value).span;
    match &arg.label {
        Some(label) => label.span.merge(value),
        None => value,
    }
}

/// Labels as they are written in a call: `x:_:`.
fn render_labels<'l>(labels: impl IntoIterator<Item = Option<&'l str>>) -> String {
    labels
        .into_iter()
        .map(|label| format!("{}:", label.unwrap_or("_")))
        .collect()
}

/// A missing parameter as it appears in messages: `` `x` `` or `#2`.
fn describe_param(arg: &SynthesizedArg) -> String {
    match &arg.label {
        Some(label) => format!("`{label}`"),
        None => format!("#{}", arg.param_index + 1),
    }
}

fn placeholder_arg(arg: &SynthesizedArg) -> String {
    match &arg.label {
        Some(label) => format!("{label}: <#{}#>", arg.ty),
        None => format!("<#{}#>", arg.ty),
    }
}

fn range(loc: SourceLocation, start: u32, end: u32) -> SourceLocation {
    SourceLocation::new(loc.file_id, start, end)
}

fn first_char(loc: SourceLocation) -> SourceLocation {
    range(loc, loc.start, (loc.start + 1).min(loc.end))
}

fn last_char(loc: SourceLocation) -> SourceLocation {
    range(loc, loc.end.saturating_sub(1).max(loc.start), loc.end)
}

/// A diagnostic about one fix, resolved against a solution on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureDiagnostic {
    pub locator: ConstraintLocator,
    pub kind: FailureKind,
}

impl FailureDiagnostic {
    pub fn new(locator: ConstraintLocator, kind: FailureKind) -> Self {
        Self { locator, kind }
    }

    /// Emit the primary error for this failure.
    pub fn diagnose_as_error(&self, fcx: &mut FailureContext<'_>) -> DiagnoseResult {
        let resolved = self.locator.resolve(fcx.module());
        let Some(anchor) = resolved.anchor else {
            return DiagnoseResult::Deferred;
        };
        match &self.kind {
            FailureKind::MissingOptionalUnwrap { base, unwrapped } => {
                self.missing_optional_unwrap(fcx, anchor, base, unwrapped)
            }
            FailureKind::MemberAccessOnOptionalBase {
                member,
                result_is_optional,
            } => self.optional_base(fcx, anchor, member, *result_is_optional),
            FailureKind::MissingExplicitConversion { from, to } => {
                let (from, to) = (fcx.ty(from), fcx.ty(to));
                // `as` only when the value already upcasts; otherwise `as!`.
                let use_as = tarn_sema::lookup::is_class_upcast(fcx.ev, fcx.cx, &from, &to);
                let (id, cast) = if use_as {
                    (DiagId::MissingExplicitConversion, "as")
                } else {
                    (DiagId::MissingForcedDowncast, "as!")
                };
                let at = fcx.expr_loc(anchor);
                let postfix = fcx.module().expr(anchor).node.accepts_postfix();
                let mut diag = fcx.emit(at, id, diag_args![&from, &to]);
                if let Some(at) = at {
                    if postfix {
                        diag.fix_it_insert_after(at, format!(" {cast} {to}"));
                    } else {
                        diag.fix_it_insert(at, "(")
                            .fix_it_insert_after(at, format!(") {cast} {to}"));
                    }
                }
                DiagnoseResult::Diagnosed
            }
            FailureKind::MissingForcedDowncast { from, to } => {
                let ExprKind::Coerce { as_span, .. } = fcx.module().expr(anchor).node else {
                    return DiagnoseResult::Deferred;
                };
                let (from, to) = (fcx.ty(from), fcx.ty(to));
                let at = as_span.report_loc();
                let mut diag = fcx.emit(at, DiagId::MissingForcedDowncast, diag_args![&from, &to]);
                if let Some(at) = at {
                    diag.fix_it_replace(at, "as!");
                }
                DiagnoseResult::Diagnosed
            }
            FailureKind::MissingAddressOf { ty } => {
                let ty = fcx.ty(ty);
                let at = fcx.expr_loc(anchor);
                let mut diag = fcx.emit(at, DiagId::MissingAddressOf, diag_args![&ty]);
                if let Some(at) = at {
                    diag.fix_it_insert(at, "&");
                }
                DiagnoseResult::Diagnosed
            }
            FailureKind::InvalidUseOfAddressOf => {
                let at = fcx.expr_loc(anchor);
                let is_address_of = matches!(fcx.module().expr(anchor).node, ExprKind::AddressOf(_));
                let mut diag = fcx.emit(at, DiagId::ExtraneousAddressOf, diag_args![]);
                if let Some(at) = at
                    && is_address_of
                {
                    diag.fix_it_remove(first_char(at));
                }
                DiagnoseResult::Diagnosed
            }
            FailureKind::RValueTreatedAsLValue => self.rvalue_as_lvalue(fcx, anchor),
            FailureKind::NoEscapeFuncToTypeConversion { to } => self.noescape_conversion(fcx, anchor, to),
            FailureKind::Labeling { labels } => self.labeling(fcx, anchor, labels),
            FailureKind::OutOfOrderArgument { arg, prev_arg } => self.out_of_order(fcx, anchor, *arg, *prev_arg),
            FailureKind::MissingArguments { synthesized } => self.missing_arguments(fcx, anchor, synthesized),
            FailureKind::MissingContextualConformance { ty, protocol } => {
                let (ty, protocol) = (fcx.ty(ty), fcx.ty(protocol));
                let id = if self.locator.contains(|elt| matches!(elt, PathElt::ApplyArgToParam { .. })) {
                    DiagId::ArgumentTypeDoesNotConform
                } else {
                    DiagId::ContextualTypeDoesNotConform
                };
                let at = fcx.expr_loc(anchor);
                fcx.emit(at, id, diag_args![&ty, &protocol]);
                DiagnoseResult::Diagnosed
            }
            FailureKind::MissingConformance { ty, protocol } => {
                self.requirement(fcx, anchor, DiagId::TypeDoesNotConformDeclOwner, ty, protocol)
            }
            FailureKind::SameTypeRequirement { lhs, rhs } => {
                self.requirement(fcx, anchor, DiagId::TypesNotEqualDeclOwner, lhs, rhs)
            }
            FailureKind::SuperclassRequirement { lhs, rhs } => {
                self.requirement(fcx, anchor, DiagId::TypesNotInheritedDeclOwner, lhs, rhs)
            }
            FailureKind::Contextual { from, to } => self.contextual(fcx, anchor, &resolved, from, to),
            FailureKind::CollectionElementContextual { from, to } => {
                let (from, to) = (fcx.ty(from), fcx.ty(to));
                if from.has_error() || to.has_error() {
                    return DiagnoseResult::Diagnosed;
                }
                let at = fcx.expr_loc(anchor);
                fcx.emit(at, DiagId::CannotConvertArrayElement, diag_args![&from, &to]);
                DiagnoseResult::Diagnosed
            }
            FailureKind::GenericArgumentsMismatch {
                actual,
                required,
                mismatches,
            } => self.generic_arguments(fcx, anchor, actual, required, mismatches),
            FailureKind::AutoClosureForwarding => {
                let at = fcx.expr_loc(anchor);
                let mut diag = fcx.emit(at, DiagId::InvalidAutoclosureForwarding, diag_args![]);
                if let Some(at) = at {
                    diag.fix_it_insert_after(at, "()");
                }
                DiagnoseResult::Diagnosed
            }
            FailureKind::NonOptionalUnwrap { base } => {
                let base = fcx.ty(base);
                let id = match fcx.module().expr(anchor).node {
                    ExprKind::ForceValue(_) => DiagId::InvalidForceUnwrap,
                    ExprKind::BindOptional(_) => DiagId::InvalidOptionalChain,
                    _ => return DiagnoseResult::Deferred,
                };
                let at = fcx.expr_loc(anchor);
                let mut diag = fcx.emit(at, id, diag_args![&base]);
                if let Some(at) = at {
                    diag.fix_it_remove(last_char(at));
                }
                DiagnoseResult::Diagnosed
            }
            FailureKind::MissingCall => self.missing_call(fcx, anchor),
            FailureKind::ExtraneousPropertyWrapperUnwrap {
                using_projection,
                wrapper,
                ..
            } => self.property_wrapper_member(fcx, anchor, Some((*using_projection, wrapper))),
            FailureKind::MissingPropertyWrapperUnwrap { .. } => self.property_wrapper_member(fcx, anchor, None),
            FailureKind::SubscriptMisuse => self.subscript_misuse(fcx, anchor),
            FailureKind::MissingMember { base, name } => self.missing_member(fcx, anchor, &resolved, base, name),
            FailureKind::AllowTypeOrInstanceMember { base, name, .. } => {
                let base = fcx.ty(base);
                let at = fcx.member_name_loc(anchor);
                match base.metatype_instance() {
                    Some(instance) => {
                        let instance = instance.clone();
                        fcx.emit(at, DiagId::CouldNotUseInstanceMemberOnType, diag_args![name.as_str(), &instance]);
                    }
                    None => {
                        let base_expr = match &fcx.module().expr(anchor).node {
                            ExprKind::Member { base, .. } => Some(*base),
                            _ => None,
                        };
                        let base_loc = base_expr.and_then(|e| fcx.expr_loc(e));
                        let mut diag =
                            fcx.emit(at, DiagId::CouldNotUseTypeMemberOnInstance, diag_args![name.as_str(), &base]);
                        if let Some(base_loc) = base_loc {
                            diag.fix_it_replace(base_loc, base.to_string());
                        }
                    }
                }
                DiagnoseResult::Diagnosed
            }
            FailureKind::PartialApplication { member, is_warning } => {
                let id = if *is_warning {
                    DiagId::PartialApplicationOfFunctionInvalidWarning
                } else {
                    DiagId::PartialApplicationOfFunctionInvalid
                };
                let at = fcx.member_name_loc(anchor);
                fcx.emit(at, id, diag_args![member.as_str()]);
                DiagnoseResult::Diagnosed
            }
            FailureKind::InvalidInitRef { kind, base, init } => self.invalid_init_ref(fcx, anchor, *kind, base, *init),
            FailureKind::InvalidMemberRefOnExistential { base, name } => {
                let base = fcx.ty(base);
                let at = fcx.member_name_loc(anchor);
                fcx.emit(at, DiagId::CouldNotUseMemberOnExistential, diag_args![name.as_str(), &base]);
                DiagnoseResult::Diagnosed
            }
            FailureKind::ClosureParamDestructuring { contextual } => {
                let at = fcx.expr_loc(anchor);
                let param = contextual.params.first().map(|p| fcx.ty(&p.ty));
                match param {
                    Some(param) if !param.has_error() && !param.has_type_vars() => {
                        fcx.emit(at, DiagId::ClosureTupleParameterDestructuring, diag_args![&param]);
                    }
                    _ => {
                        fcx.emit(at, DiagId::ClosureTupleParameterDestructuringImplicit, diag_args![]);
                    }
                }
                DiagnoseResult::Diagnosed
            }
            FailureKind::InaccessibleMember { member } => {
                let d = fcx.module().decl(*member).clone();
                let access = d.attrs.access.as_str();
                let at = match d.kind {
                    DeclKind::Init { .. } => fcx.expr_loc(anchor),
                    _ => fcx.member_name_loc(anchor),
                };
                if let DeclKind::Init { .. } = d.kind {
                    let owner = d.parent.map(|p| fcx.module().decl(p).name.clone()).unwrap_or_default();
                    fcx.emit(at, DiagId::InitCandidateInaccessible, diag_args![owner, access]);
                } else {
                    fcx.emit(at, DiagId::CandidateInaccessible, diag_args![d.full_name(), access]);
                }
                fcx.emit(
                    d.name_span.report_loc(),
                    DiagId::InaccessibleCandidateHere,
                    diag_args![d.full_name(), access],
                );
                DiagnoseResult::Diagnosed
            }
            FailureKind::AnyObjectKeyPathRoot => {
                let at = fcx.expr_loc(anchor);
                fcx.emit(at, DiagId::ExprSwiftKeypathAnyobjectRoot, diag_args![]);
                DiagnoseResult::Diagnosed
            }
            FailureKind::KeyPathSubscriptIndexHashable { ty } => {
                let ty = fcx.ty(ty);
                let at = match resolved.last() {
                    Some(PathElt::KeyPathComponent(index)) => fcx.key_path_component_loc(anchor, *index),
                    _ => fcx.expr_loc(anchor),
                };
                fcx.emit(at, DiagId::ExprKeypathSubscriptIndexNotHashable, diag_args![&ty]);
                DiagnoseResult::Diagnosed
            }
            FailureKind::InvalidRefInKeyPath { kind, member } => {
                let name = fcx.module().decl(*member).name.clone();
                let id = match kind {
                    KeyPathRefKind::StaticMember => DiagId::ExprKeypathStaticMember,
                    KeyPathRefKind::MutatingGetter => DiagId::ExprKeypathMutatingGetter,
                    KeyPathRefKind::Method => DiagId::ExprKeypathNotProperty,
                };
                let at = match resolved.last() {
                    Some(PathElt::KeyPathComponent(index)) => fcx.key_path_component_loc(anchor, *index),
                    _ => fcx.expr_loc(anchor),
                };
                fcx.emit(at, id, diag_args![name]);
                DiagnoseResult::Diagnosed
            }
            FailureKind::ExtraneousReturn => {
                let at = fcx.expr_loc(anchor);
                fcx.emit(at, DiagId::CannotReturnValueFromVoidFunc, diag_args![]);
                DiagnoseResult::Diagnosed
            }
            FailureKind::MissingGenericArguments { params } => self.missing_generic_arguments(fcx, anchor, params),
            FailureKind::SkipUnhandledConstructInFunctionBuilder { builder, .. } => {
                let b = fcx.module().decl(*builder).clone();
                let at = fcx.expr_loc(anchor);
                fcx.emit(at, DiagId::FunctionBuilderControlFlow, diag_args![b.name.as_str()]);
                fcx.emit(b.name_span.report_loc(), DiagId::FunctionBuilderDecl, diag_args![b.name.as_str()]);
                DiagnoseResult::Diagnosed
            }
            FailureKind::MutatingMemberRefOnImmutableBase { base, .. } => {
                let base_expr = match &fcx.module().expr(anchor).node {
                    ExprKind::Member { base, .. } => *base,
                    _ => anchor,
                };
                let at = fcx.expr_loc(base_expr);
                match fcx.solution.referenced_decl(base_expr) {
                    Some(decl) if fcx.module().decl(decl).is_let() => {
                        let name = fcx.module().decl(decl).name.clone();
                        fcx.emit(at, DiagId::CannotPassRvalueMutating, diag_args![name]);
                    }
                    _ => {
                        let base = fcx.ty(base);
                        fcx.emit(at, DiagId::CannotPassRvalueMutatingOfType, diag_args![&base]);
                    }
                }
                DiagnoseResult::Diagnosed
            }
        }
    }

    /// Emit a note attached to a candidate in an ambiguity report.
    pub fn diagnose_as_note(&self, fcx: &mut FailureContext<'_>) -> DiagnoseResult {
        let Some(anchor) = self.locator.resolve_anchor(fcx.module()) else {
            return DiagnoseResult::Deferred;
        };
        match &self.kind {
            FailureKind::Labeling { labels } => {
                let expected = render_labels(labels.iter().map(Option::as_deref));
                let at = fcx
                    .callee_decl(anchor)
                    .and_then(|d| fcx.module().decl(d).name_span.report_loc())
                    .or_else(|| fcx.expr_loc(anchor));
                fcx.emit(at, DiagId::CandidateExpectsLabels, diag_args![expected]);
                DiagnoseResult::Diagnosed
            }
            FailureKind::MissingArguments { synthesized } => {
                let Some(decl) = fcx.callee_decl(anchor) else {
                    return DiagnoseResult::NotApplicable;
                };
                let d = fcx.module().decl(decl).clone();
                for arg in synthesized {
                    fcx.emit(
                        d.name_span.report_loc(),
                        DiagId::CandidateRequiresArgument,
                        diag_args![d.full_name(), describe_param(arg)],
                    );
                }
                DiagnoseResult::Diagnosed
            }
            FailureKind::MissingConformance { ty, protocol } => {
                self.requirement_note(fcx, DiagId::CandidateTypesConformanceRequirement, ty, protocol)
            }
            FailureKind::SameTypeRequirement { lhs, rhs } => {
                self.requirement_note(fcx, DiagId::CandidateTypesEqualRequirement, lhs, rhs)
            }
            FailureKind::SuperclassRequirement { lhs, rhs } => {
                self.requirement_note(fcx, DiagId::CandidateTypesInheritanceRequirement, lhs, rhs)
            }
            FailureKind::SubscriptMisuse => {
                let Some(decl) = fcx.solution.referenced_decl(anchor) else {
                    return DiagnoseResult::NotApplicable;
                };
                let at = fcx.module().decl(decl).name_span.report_loc();
                fcx.emit(at, DiagId::FoundCandidate, diag_args![]);
                DiagnoseResult::Diagnosed
            }
            FailureKind::SkipUnhandledConstructInFunctionBuilder { builder, .. } => {
                let name = fcx.module().decl(*builder).name.clone();
                let at = fcx.expr_loc(anchor);
                fcx.emit(at, DiagId::FunctionBuilderControlFlowNote, diag_args![name]);
                DiagnoseResult::Diagnosed
            }
            _ => DiagnoseResult::NotApplicable,
        }
    }

    fn missing_optional_unwrap(
        &self,
        fcx: &mut FailureContext<'_>,
        anchor: ExprId,
        base: &Type,
        unwrapped: &Type,
    ) -> DiagnoseResult {
        let (base, unwrapped) = (fcx.ty(base), fcx.ty(unwrapped));
        if base.has_error() || unwrapped.has_error() {
            return DiagnoseResult::Diagnosed;
        }
        let at = fcx.expr_loc(anchor);
        let postfix = fcx.module().expr(anchor).node.accepts_postfix();
        fcx.emit(at, DiagId::OptionalNotUnwrapped, diag_args![&base, &unwrapped]);

        let mut coalesce = fcx.emit(at, DiagId::UnwrapWithDefaultValue, diag_args![]);
        if let Some(at) = at {
            coalesce.fix_it_insert_after(at, " ?? <#default value#>");
        }

        let mut force = fcx.emit(at, DiagId::UnwrapWithForceValue, diag_args![]);
        if let Some(at) = at {
            if postfix {
                force.fix_it_insert_after(at, "!");
            } else {
                force.fix_it_insert(at, "(").fix_it_insert_after(at, ")!");
            }
        }
        DiagnoseResult::Diagnosed
    }

    fn optional_base(
        &self,
        fcx: &mut FailureContext<'_>,
        anchor: ExprId,
        member: &str,
        result_is_optional: bool,
    ) -> DiagnoseResult {
        let base_expr = match &fcx.module().expr(anchor).node {
            ExprKind::Member { base, .. } | ExprKind::Subscript { base, .. } => *base,
            ExprKind::Call { callee, .. } => *callee,
            _ => return DiagnoseResult::Deferred,
        };
        let base_ty = fcx.expr_ty(base_expr);
        if base_ty.has_error() {
            return DiagnoseResult::Diagnosed;
        }
        let wrapped = base_ty.lookthrough_all_optionals().clone();
        let at = fcx.expr_loc(base_expr);
        fcx.emit(at, DiagId::OptionalBaseNotUnwrapped, diag_args![&base_ty, member, &wrapped]);

        let mut chain = fcx.emit(at, DiagId::OptionalBaseChain, diag_args![member]);
        if let Some(at) = at {
            chain.fix_it_insert_after(at, "?");
        }
        if !result_is_optional {
            let mut force = fcx.emit(at, DiagId::UnwrapWithForceValue, diag_args![]);
            if let Some(at) = at {
                force.fix_it_insert_after(at, "!");
            }
        }
        DiagnoseResult::Diagnosed
    }

    /// Assignment to, or inout passing of, something that is not mutable.
    fn rvalue_as_lvalue(&self, fcx: &mut FailureContext<'_>, anchor: ExprId) -> DiagnoseResult {
        let (subject, assignment) = match fcx.module().expr(anchor).node {
            ExprKind::Assign { dest, .. } => (dest, true),
            ExprKind::AddressOf(inner) => (inner, false),
            _ => {
                let assigned = fcx.parent_expr(anchor).is_some_and(|p| {
                    matches!(fcx.module().expr(p).node, ExprKind::Assign { dest, .. } if dest == anchor)
                });
                (anchor, assigned)
            }
        };
        let at = fcx.expr_loc(subject);
        let immutable_var = fcx
            .solution
            .referenced_decl(subject)
            .filter(|d| fcx.module().decl(*d).is_let())
            .map(|d| fcx.module().decl(d).name.clone());
        match (immutable_var, assignment) {
            (Some(name), true) => {
                fcx.emit(at, DiagId::AssignmentLhsIsImmutableVariable, diag_args![name]);
            }
            (Some(name), false) => {
                fcx.emit(at, DiagId::CannotPassRvalueInout, diag_args![name]);
            }
            (None, assignment) => {
                let ty = fcx.expr_ty(subject);
                if ty.has_error() {
                    return DiagnoseResult::Diagnosed;
                }
                let id = if assignment {
                    DiagId::AssignmentLhsNotLvalue
                } else {
                    DiagId::CannotPassRvalueInoutOfType
                };
                fcx.emit(at, id, diag_args![&ty]);
            }
        }
        DiagnoseResult::Diagnosed
    }

    fn noescape_conversion(&self, fcx: &mut FailureContext<'_>, anchor: ExprId, to: &Type) -> DiagnoseResult {
        let to = fcx.ty(to);
        let at = fcx.expr_loc(anchor);
        let param = match &fcx.module().expr(anchor).node {
            ExprKind::DeclRef { name } => {
                let func = if fcx.module().decl(fcx.dc).is_func_like() {
                    Some(fcx.dc)
                } else {
                    fcx.module().enclosing_function(fcx.dc)
                };
                func.and_then(|f| fcx.module().decl(f).signature())
                    .and_then(|sig| sig.params.iter().find(|p| p.name.node == *name))
                    .cloned()
            }
            _ => None,
        };
        let Some(param) = param else {
            fcx.emit(at, DiagId::ConvertingNoescapeToType, diag_args![&to]);
            return DiagnoseResult::Diagnosed;
        };
        let name = param.name.node.clone();
        let id = if self.locator.contains(|elt| matches!(elt, PathElt::ApplyArgToParam { .. })) {
            DiagId::PassingNoescapeToEscaping
        } else if self.locator.last_source_elt() == Some(&PathElt::ContextualType(ContextualPurpose::Assignment)) {
            DiagId::AssigningNoescapeToEscaping
        } else {
            fcx.emit(at, DiagId::ConvertingNoescapeToType, diag_args![&to]);
            return DiagnoseResult::Diagnosed;
        };
        fcx.emit(at, id, diag_args![name.as_str()]);
        let mut note = fcx.emit(param.name.span.report_loc(), DiagId::NoescapeParameter, diag_args![name]);
        if let Some(ty_loc) = param.ty.span.report_loc() {
            note.fix_it_insert(ty_loc, "@escaping ");
        }
        DiagnoseResult::Diagnosed
    }

    fn labeling(&self, fcx: &mut FailureContext<'_>, anchor: ExprId, labels: &[Option<String>]) -> DiagnoseResult {
        let Some(args) = call_args(fcx.module(), anchor).map(<[Argument]>::to_vec) else {
            return DiagnoseResult::Deferred;
        };
        let have = render_labels(args.iter().map(Argument::label_str));
        let expected = render_labels(labels.iter().map(Option::as_deref));
        let mut edits = Vec::new();
        for (arg, wanted) in args.iter().zip(labels) {
            let value_loc = fcx.expr_loc(arg.value);
            match (&arg.label, wanted) {
                (Some(label), Some(wanted)) if label.node != *wanted => {
                    if let Some(l) = label.span.report_loc() {
                        edits.push((l, wanted.clone()));
                    }
                }
                (Some(label), None) => {
                    if let (Some(l), Some(v)) = (label.span.report_loc(), value_loc) {
                        edits.push((range(l, l.start, v.start), String::new()));
                    }
                }
                (None, Some(wanted)) => {
                    if let Some(v) = value_loc {
                        edits.push((v.start_point(), format!("{wanted}: ")));
                    }
                }
                _ => {}
            }
        }
        let at = fcx.expr_loc(anchor);
        let mut diag = fcx.emit(at, DiagId::WrongArgumentLabels, diag_args![have, expected]);
        for (range, text) in edits {
            diag.fix_it_replace(range, text);
        }
        DiagnoseResult::Diagnosed
    }

    fn out_of_order(&self, fcx: &mut FailureContext<'_>, anchor: ExprId, arg: usize, prev_arg: usize) -> DiagnoseResult {
        let Some(args) = call_args(fcx.module(), anchor).map(<[Argument]>::to_vec) else {
            return DiagnoseResult::Deferred;
        };
        let (Some(moved), Some(prev)) = (args.get(arg), args.get(prev_arg)) else {
            return DiagnoseResult::Deferred;
        };
        let (id, args_out) = match (moved.label_str(), prev.label_str()) {
            (Some(a), Some(b)) => (DiagId::ArgumentOutOfOrderNamedNamed, diag_args![a, b]),
            (Some(a), None) => (DiagId::ArgumentOutOfOrderNamedUnnamed, diag_args![a, prev_arg + 1]),
            (None, Some(b)) => (DiagId::ArgumentOutOfOrderUnnamedNamed, diag_args![arg + 1, b]),
            (None, None) => (DiagId::ArgumentOutOfOrderUnnamedUnnamed, diag_args![arg + 1, prev_arg + 1]),
        };

        let module = fcx.module();
        let moved_span = arg_span(module, moved);
        let prev_span = arg_span(module, prev);
        let moved_text = module.source_text(moved_span).map(str::to_string);
        // The moved argument goes away together with the comma before it.
        let removal_start = arg
            .checked_sub(1)
            .and_then(|i| args.get(i))
            .map(|a| module.expr(a.value).span.end);
        let edits = match (moved_text, removal_start, moved_span.report_loc(), prev_span.report_loc()) {
            (Some(text), Some(start), Some(moved_loc), Some(prev_loc)) => Some((
                prev_loc.start_point(),
                format!("{text}, "),
                range(moved_loc, start, moved_loc.end),
            )),
            _ => None,
        };

        let at = moved_span.report_loc();
        let mut diag = fcx.emit(at, id, args_out);
        if let Some((insert_at, text, removal)) = edits {
            diag.fix_it_insert(insert_at, text).fix_it_remove(removal);
        }
        DiagnoseResult::Diagnosed
    }

    fn missing_arguments(
        &self,
        fcx: &mut FailureContext<'_>,
        anchor: ExprId,
        synthesized: &[SynthesizedArg],
    ) -> DiagnoseResult {
        let synthesized: Vec<SynthesizedArg> = synthesized
            .iter()
            .map(|arg| SynthesizedArg {
                ty: fcx.ty(&arg.ty),
                ..arg.clone()
            })
            .collect();
        let (id, args) = match synthesized.as_slice() {
            [] => return DiagnoseResult::Deferred,
            [single] => match &single.label {
                Some(label) => (DiagId::MissingArgumentNamed, diag_args![label.as_str()]),
                None => (DiagId::MissingArgumentPositional, diag_args![single.param_index + 1]),
            },
            many => {
                let list = many.iter().map(describe_param).collect::<Vec<_>>().join(", ");
                (DiagId::MissingArgumentsMulti, diag_args![list])
            }
        };

        let has_args = call_args(fcx.module(), anchor).is_some_and(|a| !a.is_empty());
        let mut text = synthesized.iter().map(placeholder_arg).collect::<Vec<_>>().join(", ");
        if has_args {
            text = format!(", {text}");
        }
        let at = fcx.expr_loc(anchor);
        let callee = fcx.callee_decl(anchor).map(|d| fcx.module().decl(d).clone());

        let mut diag = fcx.emit(at, id, args);
        // Arguments go right before the closing bracket.
        if let Some(at) = at
            && at.end > at.start
        {
            diag.fix_it_insert(last_char(at), text);
        }

        if let Some(d) = callee {
            for arg in &synthesized {
                fcx.emit(
                    d.name_span.report_loc(),
                    DiagId::CandidateRequiresArgument,
                    diag_args![d.full_name(), describe_param(arg)],
                );
            }
        }
        DiagnoseResult::Diagnosed
    }

    /// The owner of the unmet requirement and how that requirement was
    /// written: subject, constraint and the span covering both.
    fn requirement_source(&self, fcx: &FailureContext<'_>) -> Option<(Decl, Option<(String, String, Span)>)> {
        let Some(PathElt::TypeParameterRequirement { owner, index }) = self
            .locator
            .path
            .iter()
            .rev()
            .find(|elt| matches!(elt, PathElt::TypeParameterRequirement { .. }))
            .cloned()
        else {
            return None;
        };
        let d = fcx.module().decl(owner).clone();
        let repr = d
            .generic_params
            .iter()
            .flat_map(|p| {
                p.constraints
                    .iter()
                    .map(|c| (p.name.node.clone(), c.node.display(), c.span))
            })
            .chain(
                d.where_clause
                    .iter()
                    .map(|r| (r.subject.node.display(), r.constraint.node.display(), r.subject.span.merge(r.constraint.span))),
            )
            .nth(index);
        Some((d, repr))
    }

    /// A generic requirement of the referenced declaration is not met.
    fn requirement(
        &self,
        fcx: &mut FailureContext<'_>,
        anchor: ExprId,
        id: DiagId,
        lhs: &Type,
        rhs: &Type,
    ) -> DiagnoseResult {
        let Some((d, repr)) = self.requirement_source(fcx) else {
            return DiagnoseResult::Deferred;
        };
        let (lhs, rhs) = (fcx.ty(lhs), fcx.ty(rhs));
        if lhs.has_error() || rhs.has_error() {
            return DiagnoseResult::NotApplicable;
        }
        let at = fcx.member_name_loc(anchor);
        fcx.emit(at, id, diag_args![d.kind_name(), d.full_name(), &lhs, &rhs]);
        if let Some((subject, constraint, span)) = repr {
            fcx.emit(span.report_loc(), DiagId::WhereRequirementHere, diag_args![subject, constraint]);
        }
        DiagnoseResult::Diagnosed
    }

    /// The candidate note for an unmet requirement, placed on the
    /// requirement itself or, failing that, on its owner.
    fn requirement_note(&self, fcx: &mut FailureContext<'_>, id: DiagId, lhs: &Type, rhs: &Type) -> DiagnoseResult {
        let Some((d, repr)) = self.requirement_source(fcx) else {
            return DiagnoseResult::NotApplicable;
        };
        let (lhs, rhs) = (fcx.ty(lhs), fcx.ty(rhs));
        if lhs.has_error() || rhs.has_error() {
            return DiagnoseResult::NotApplicable;
        }
        let (at, subject, constraint) = match repr {
            Some((subject, constraint, span)) => (span.report_loc(), subject, constraint),
            None => (d.name_span.report_loc(), lhs.to_string(), rhs.to_string()),
        };
        fcx.emit(at, id, diag_args![&lhs, &rhs, subject, constraint]);
        DiagnoseResult::Diagnosed
    }

    fn contextual(
        &self,
        fcx: &mut FailureContext<'_>,
        anchor: ExprId,
        resolved: &ConstraintLocator,
        from: &Type,
        to: &Type,
    ) -> DiagnoseResult {
        if resolved.path.len() > 1 {
            return DiagnoseResult::Deferred;
        }
        let (from, to) = (fcx.ty(from), fcx.ty(to));
        if from.has_error() || to.has_error() {
            return DiagnoseResult::Diagnosed;
        }
        let (id, args) = match self.locator.last_source_elt() {
            Some(PathElt::ContextualType(purpose)) => {
                let id = match purpose {
                    ContextualPurpose::Initialization => DiagId::CannotConvertInitializerValue,
                    ContextualPurpose::Assignment => DiagId::CannotConvertAssign,
                    ContextualPurpose::Return => DiagId::CannotConvertToReturnType,
                    ContextualPurpose::Coercion => DiagId::CannotConvertCoerce,
                };
                (id, diag_args![&from, &to])
            }
            Some(PathElt::ClosureResult) => (DiagId::CannotConvertClosureResult, diag_args![&from, &to]),
            Some(PathElt::KeyPathRoot) => (DiagId::ExprKeypathRootTypeMismatch, diag_args![&to, &from]),
            Some(PathElt::KeyPathValue) => (DiagId::ExprKeypathValueTypeMismatch, diag_args![&to, &from]),
            Some(PathElt::ArrayElement(_)) => (DiagId::CannotConvertArrayElement, diag_args![&from, &to]),
            Some(PathElt::ApplyArgToParam { .. }) => (DiagId::CannotConvertArgumentValue, diag_args![&from, &to]),
            _ => (DiagId::CannotConvertValue, diag_args![&from, &to]),
        };
        let at = fcx.expr_loc(anchor);
        fcx.emit(at, id, args);
        DiagnoseResult::Diagnosed
    }

    fn generic_arguments(
        &self,
        fcx: &mut FailureContext<'_>,
        anchor: ExprId,
        actual: &Type,
        required: &Type,
        mismatches: &[usize],
    ) -> DiagnoseResult {
        let (actual, required) = (fcx.ty(actual), fcx.ty(required));
        let (Some(a), Some(r)) = (actual.as_nominal(), required.as_nominal()) else {
            return DiagnoseResult::Deferred;
        };
        let generic_params = fcx.module().decl(a.decl).generic_params.clone();
        let at = fcx.expr_loc(anchor);
        for &index in mismatches {
            let (Some(x), Some(y)) = (a.args.get(index), r.args.get(index)) else {
                continue;
            };
            let param = generic_params
                .get(index)
                .map_or_else(|| format!("#{}", index + 1), |p| p.name.node.clone());
            let args = diag_args![&actual, &required, param, x, y];
            fcx.emit(at, DiagId::GenericArgumentMismatch, args);
        }
        DiagnoseResult::Diagnosed
    }

    fn missing_call(&self, fcx: &mut FailureContext<'_>, anchor: ExprId) -> DiagnoseResult {
        let at = fcx.expr_loc(anchor);
        let (id, args) = match fcx.solution.referenced_decl(anchor) {
            Some(decl) if matches!(fcx.module().decl(decl).kind, DeclKind::Func { .. }) => {
                let d = fcx.module().decl(decl);
                let is_method = d.parent.is_some_and(|p| fcx.module().decl(p).is_nominal());
                let id = if is_method {
                    DiagId::DidNotCallMethod
                } else {
                    DiagId::DidNotCallFunction
                };
                (id, diag_args![d.name.as_str()])
            }
            _ => (DiagId::DidNotCallFunctionValue, diag_args![]),
        };
        let mut diag = fcx.emit(at, id, args);
        if let Some(at) = at {
            diag.fix_it_insert_after(at, "()");
        }
        DiagnoseResult::Diagnosed
    }

    /// A member of the wrapper was referenced through the wrapped property,
    /// or the other way round.
    fn property_wrapper_member(
        &self,
        fcx: &mut FailureContext<'_>,
        anchor: ExprId,
        use_wrapper: Option<(bool, &Type)>,
    ) -> DiagnoseResult {
        let ExprKind::Member { base, name } = fcx.module().expr(anchor).node.clone() else {
            return DiagnoseResult::Deferred;
        };
        // The property name is either the base reference itself or the
        // member name of a `self.x` base.
        let property_loc = match &fcx.module().expr(base).node {
            ExprKind::Member { name, .. } => name.span.report_loc(),
            _ => fcx.expr_loc(base),
        };
        let at = name.span.report_loc();
        match use_wrapper {
            Some((projection, wrapper)) => {
                let wrapper = fcx.ty(wrapper);
                let mut diag =
                    fcx.emit(at, DiagId::PropertyWrapperReferenceMember, diag_args![name.node.as_str(), &wrapper]);
                if let Some(p) = property_loc {
                    diag.fix_it_insert(p, if projection { "$" } else { "_" });
                }
            }
            None => {
                let FailureKind::MissingPropertyWrapperUnwrap { wrapped, .. } = &self.kind else {
                    return DiagnoseResult::Deferred;
                };
                let value = request::interface_type(fcx.ev, fcx.cx, *wrapped);
                let mut diag = fcx.emit(at, DiagId::WrappedValueReferenceMember, diag_args![name.node.as_str(), &value]);
                if let Some(p) = property_loc {
                    diag.fix_it_remove(first_char(p));
                }
            }
        }
        DiagnoseResult::Diagnosed
    }

    fn subscript_misuse(&self, fcx: &mut FailureContext<'_>, anchor: ExprId) -> DiagnoseResult {
        let ExprKind::Member { base, .. } = fcx.module().expr(anchor).node else {
            return DiagnoseResult::Deferred;
        };
        let base_ty = fcx.expr_ty(base);
        let base_loc = fcx.expr_loc(base);
        let member_loc = fcx.expr_loc(anchor);
        let call_loc = fcx
            .parent_expr(anchor)
            .filter(|p| matches!(fcx.module().expr(*p).node, ExprKind::Call { callee, .. } if callee == anchor))
            .and_then(|p| fcx.expr_loc(p));

        let mut diag = fcx.emit(member_loc.or(base_loc), DiagId::SubscriptMisuse, diag_args![&base_ty]);
        if let (Some(b), Some(m)) = (base_loc, member_loc) {
            match call_loc {
                Some(c) if c.end > m.end => {
                    diag.fix_it_replace(range(m, b.end, m.end + 1), "[")
                        .fix_it_replace(last_char(c), "]");
                }
                _ => {
                    diag.fix_it_remove(range(m, b.end, m.end));
                }
            }
        }
        DiagnoseResult::Diagnosed
    }

    fn missing_member(
        &self,
        fcx: &mut FailureContext<'_>,
        anchor: ExprId,
        resolved: &ConstraintLocator,
        base: &Type,
        name: &str,
    ) -> DiagnoseResult {
        let base = fcx.ty(base);
        if base.has_error() {
            return DiagnoseResult::Diagnosed;
        }
        let at = match resolved.last() {
            Some(PathElt::KeyPathComponent(index)) => fcx.key_path_component_loc(anchor, *index),
            _ => fcx.member_name_loc(anchor),
        };
        match base.metatype_instance() {
            Some(instance) => {
                let instance = instance.clone();
                fcx.emit(at, DiagId::CouldNotFindTypeMember, diag_args![&instance, name]);
            }
            None => {
                fcx.emit(at, DiagId::CouldNotFindValueMember, diag_args![&base, name]);
            }
        }
        DiagnoseResult::Diagnosed
    }

    fn invalid_init_ref(
        &self,
        fcx: &mut FailureContext<'_>,
        anchor: ExprId,
        kind: InitRefKind,
        base: &Type,
        init: Option<DeclId>,
    ) -> DiagnoseResult {
        let base = fcx.ty(base);
        let instance = base.metatype_instance().cloned().unwrap_or_else(|| base.clone());
        match kind {
            InitRefKind::DynamicOnMetatype => {
                let at = fcx.member_name_loc(anchor);
                fcx.emit(at, DiagId::DynamicConstructClass, diag_args![&instance]);
                if let Some(init) = init {
                    let d = fcx.module().decl(init).clone();
                    fcx.emit(d.name_span.report_loc(), DiagId::DeclDeclaredHere, diag_args![d.full_name()]);
                }
            }
            InitRefKind::ProtocolMetatype => {
                let at = fcx.member_name_loc(anchor);
                fcx.emit(at, DiagId::ConstructProtocolByName, diag_args![&instance]);
            }
            InitRefKind::NonConstMetatype => {
                let at = fcx.expr_loc(anchor);
                let mut diag = fcx.emit(at, DiagId::MissingInitOnMetatypeInitialization, diag_args![]);
                if let Some(at) = at {
                    diag.fix_it_insert_after(at, ".init");
                }
            }
        }
        DiagnoseResult::Diagnosed
    }

    fn missing_generic_arguments(&self, fcx: &mut FailureContext<'_>, anchor: ExprId, params: &[String]) -> DiagnoseResult {
        // Explicit arguments can only be written after a type name.
        let type_ref = match &fcx.module().expr(anchor).node {
            ExprKind::TypeRef { .. } => Some(anchor),
            ExprKind::Call { callee, .. } if matches!(fcx.module().expr(*callee).node, ExprKind::TypeRef { .. }) => {
                Some(*callee)
            }
            _ => None,
        };
        let at = fcx.expr_loc(anchor);
        for param in params {
            fcx.emit(at, DiagId::UnboundGenericParameter, diag_args![param.as_str()]);
        }
        let placeholder = format!(
            "<{}>",
            params.iter().map(|p| format!("<#{p}#>")).collect::<Vec<_>>().join(", ")
        );
        let type_loc = type_ref.and_then(|e| fcx.expr_loc(e));
        let mut note = fcx.emit(type_loc.or(at), DiagId::UnboundGenericParameterExplicitFix, diag_args![]);
        if let Some(type_loc) = type_loc {
            note.fix_it_insert_after(type_loc, placeholder);
        }
        DiagnoseResult::Diagnosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tarn_ast::{FuncSignature, GenericParamDecl, ModuleBuilder, Spanned, TypeReprKind};
    use tarn_sema::TypeChecker;
    use tarn_types::ProtocolRef;

    use crate::constraint::OverloadChoice;
    use crate::cs::SelectedOverload;

    const SRC: &str = "protocol Shape {}\nfunc fit<T: Shape>() {}\nfit\nstruct Views {}";

    struct Requirement {
        tc: TypeChecker,
        fit: DeclId,
        views: DeclId,
        reference: ExprId,
        shape: Type,
    }

    /// `fit<T: Shape>` and a bare reference to it at top level.
    fn requirement_module() -> Requirement {
        let mut b = ModuleBuilder::new("main").with_source(SRC);
        let file = b.file();
        let at = |start, end| Span::new(file, start, end);
        let shape = b.add_decl(None, Decl::new("Shape", DeclKind::Protocol, at(9, 14)));
        let signature = FuncSignature {
            params: Vec::new(),
            result: None,
        };
        let fit = b.add_decl(
            None,
            Decl::new("fit", DeclKind::Func { signature, body: Vec::new() }, at(23, 26)),
        );
        b.decl_mut(fit).generic_params = vec![GenericParamDecl {
            name: Spanned::new("T".to_string(), at(27, 28)),
            constraints: vec![Spanned::new(TypeReprKind::Ident("Shape".to_string()), at(30, 35))],
        }];
        let reference = b.add_expr(ExprKind::DeclRef { name: "fit".to_string() }, at(42, 45));
        b.add_decl(None, Decl::new("", DeclKind::TopLevelCode { expr: reference }, at(42, 45)));
        let views = b.add_decl(None, Decl::new("Views", DeclKind::Struct, at(53, 58)));
        Requirement {
            tc: TypeChecker::new(b.finish().unwrap()),
            fit,
            views,
            reference,
            shape: Type::protocol(ProtocolRef::declared(shape, "Shape")),
        }
    }

    fn unmet(r: &Requirement, ty: Type) -> FailureDiagnostic {
        let locator = ConstraintLocator::new(r.reference).with(PathElt::TypeParameterRequirement { owner: r.fit, index: 0 });
        FailureDiagnostic::new(
            locator,
            FailureKind::MissingConformance {
                ty,
                protocol: r.shape.clone(),
            },
        )
    }

    fn ids(tc: &TypeChecker) -> Vec<DiagId> {
        tc.diagnostics().iter().map(|d| d.id).collect()
    }

    #[test]
    fn labels_render_like_declaration_names() {
        assert_eq!(render_labels([Some("x"), None, Some("to")]), "x:_:to:");
        assert_eq!(render_labels(std::iter::empty()), "");
    }

    #[test]
    fn missing_parameters_are_named_or_numbered() {
        let named = SynthesizedArg {
            param_index: 0,
            label: Some("x".into()),
            ty: Type::Int,
        };
        let positional = SynthesizedArg {
            param_index: 1,
            label: None,
            ty: Type::String,
        };
        assert_eq!(describe_param(&named), "`x`");
        assert_eq!(describe_param(&positional), "#2");
        assert_eq!(placeholder_arg(&named), "x: <#Int#>");
        assert_eq!(placeholder_arg(&positional), "<#String#>");
    }

    #[test]
    fn char_ranges_stay_inside_the_location() {
        let loc = SourceLocation::new(0, 4, 9);
        assert_eq!(first_char(loc), SourceLocation::new(0, 4, 5));
        assert_eq!(last_char(loc), SourceLocation::new(0, 8, 9));
        let empty = SourceLocation::new(0, 3, 3);
        assert_eq!(first_char(empty), SourceLocation::new(0, 3, 3));
        assert_eq!(last_char(empty), SourceLocation::new(0, 3, 3));
    }

    #[test]
    fn unmet_requirement_on_error_type_is_not_diagnosed() {
        let mut r = requirement_module();
        let failure = unmet(&r, Type::Error);
        let solution = Solution::default();
        let mut fcx = FailureContext {
            ev: &mut r.tc.evaluator,
            cx: &mut r.tc.cx,
            solution: &solution,
            dc: r.fit,
        };
        assert_eq!(failure.diagnose_as_error(&mut fcx), DiagnoseResult::NotApplicable);
        assert_eq!(failure.diagnose_as_note(&mut fcx), DiagnoseResult::NotApplicable);
        assert!(r.tc.diagnostics().is_empty());
    }

    #[test]
    fn unmet_requirement_points_at_the_constraint() {
        let mut r = requirement_module();
        let failure = unmet(&r, Type::Int);
        let solution = Solution::default();
        let mut fcx = FailureContext {
            ev: &mut r.tc.evaluator,
            cx: &mut r.tc.cx,
            solution: &solution,
            dc: r.fit,
        };
        assert_eq!(failure.diagnose_as_error(&mut fcx), DiagnoseResult::Diagnosed);
        assert_eq!(failure.diagnose_as_note(&mut fcx), DiagnoseResult::Diagnosed);
        assert_eq!(
            ids(&r.tc),
            [
                DiagId::TypeDoesNotConformDeclOwner,
                DiagId::WhereRequirementHere,
                DiagId::CandidateTypesConformanceRequirement,
            ]
        );
        for diag in &r.tc.diagnostics()[1..] {
            assert_eq!(diag.location.map(|loc| loc.start..loc.end), Some(30..35));
        }
        assert_eq!(
            r.tc.diagnostics()[2].to_string(),
            "note[N0704]: candidate requires that `Int` conform to `Shape` (requirement specified as `T` : `Shape`)"
        );
    }

    #[test]
    fn candidate_notes_for_subscripts_and_builders() {
        let mut r = requirement_module();
        let mut solution = Solution::default();
        solution.overloads.insert(
            ConstraintLocator::new(r.reference),
            SelectedOverload {
                choice: OverloadChoice::Decl { decl: r.fit, base: None },
                opened_type: Type::Error,
            },
        );
        let locator = ConstraintLocator::new(r.reference);
        let subscript = FailureDiagnostic::new(locator.clone(), FailureKind::SubscriptMisuse);
        let builder = FailureDiagnostic::new(
            locator,
            FailureKind::SkipUnhandledConstructInFunctionBuilder {
                construct: "if".to_string(),
                builder: r.views,
            },
        );
        let mut fcx = FailureContext {
            ev: &mut r.tc.evaluator,
            cx: &mut r.tc.cx,
            solution: &solution,
            dc: r.fit,
        };
        assert_eq!(subscript.diagnose_as_note(&mut fcx), DiagnoseResult::Diagnosed);
        assert_eq!(builder.diagnose_as_note(&mut fcx), DiagnoseResult::Diagnosed);

        assert_eq!(ids(&r.tc), [DiagId::FoundCandidate, DiagId::FunctionBuilderControlFlowNote]);
        let at: Vec<_> = r.tc.diagnostics().iter().map(|d| d.location.map(|loc| loc.start..loc.end)).collect();
        assert_eq!(at, [Some(23..26), Some(42..45)]);
        assert!(r.tc.diagnostics()[1].to_string().ends_with("function builder `Views`"));
    }
}
