//! The checker: one evaluator plus the context its requests run against.

use smallvec::SmallVec;
use tarn_ast::{DeclId, Module, TypeRepr};
use tarn_diag::{Diagnostic, DiagnosticEngine};
use tarn_eval::{EvalError, EvaluatorOptions, EvaluatorStats};
use tarn_types::{ProtocolRef, Type};

use crate::inheritance::InheritanceSummary;
use crate::property_wrappers::{PropertyWrapperBackingPropertyInfo, PropertyWrapperTypeInfo};
use crate::request::{self, Ev, TypeCheckOutput, TypeCheckRequest};
use crate::state::{DeclCaches, DeclStates, ValidationState};
use crate::{interface, lookup, resolve};

/// State shared by every request body: the module being checked, the
/// diagnostics sink and the per-declaration side tables.
#[derive(Debug)]
pub struct SemaContext {
    pub module: Module,
    pub diags: DiagnosticEngine,
    pub caches: DeclCaches,
    pub states: DeclStates,
}

impl SemaContext {
    pub fn new(module: Module) -> Self {
        Self {
            module,
            diags: DiagnosticEngine::new(),
            caches: DeclCaches::default(),
            states: DeclStates::default(),
        }
    }
}

/// Entry point for declaration-level queries over one module.
///
/// Declaration checking and expression type checking share one
/// `TypeChecker`, so every request is evaluated at most once per session.
#[derive(Debug)]
pub struct TypeChecker {
    pub evaluator: Ev,
    pub cx: SemaContext,
}

impl TypeChecker {
    pub fn new(module: Module) -> Self {
        Self::with_options(module, EvaluatorOptions::default())
    }

    pub fn with_options(module: Module, options: EvaluatorOptions) -> Self {
        Self {
            evaluator: Ev::with_options(options),
            cx: SemaContext::new(module),
        }
    }

    pub fn module(&self) -> &Module {
        &self.cx.module
    }

    pub fn diags(&mut self) -> &mut DiagnosticEngine {
        &mut self.cx.diags
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.cx.diags.diagnostics()
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.cx.diags.take()
    }

    pub fn stats(&self) -> &EvaluatorStats {
        self.evaluator.stats()
    }

    /// Evaluate an arbitrary request.
    pub fn request(&mut self, request: TypeCheckRequest) -> Result<TypeCheckOutput, EvalError> {
        self.evaluator.evaluate(&request, &mut self.cx)
    }

    pub fn is_invalid(&self, decl: DeclId) -> bool {
        self.cx.states.is_invalid(decl)
    }

    pub fn mark_invalid(&mut self, decl: DeclId) {
        self.cx.states.mark_invalid(decl);
    }

    pub fn validation(&self, decl: DeclId) -> ValidationState {
        self.cx.states.validation(decl)
    }

    /// Record the type inferred for an unannotated variable.
    pub fn record_inferred_var_type(&mut self, decl: DeclId, ty: Type) {
        self.cx.caches.inferred_var_types.insert(decl, ty);
    }

    // -- Requests -----------------------------------------------------------

    pub fn inherited_decls_referenced(&mut self, decl: DeclId, index: usize) -> SmallVec<[DeclId; 2]> {
        request::inherited_decls_referenced(&mut self.evaluator, &mut self.cx, decl, index)
    }

    pub fn inherited_type(&mut self, decl: DeclId, index: usize) -> Type {
        request::inherited_type(&mut self.evaluator, &mut self.cx, decl, index)
    }

    pub fn inheritance_clause(&mut self, decl: DeclId) -> InheritanceSummary {
        request::inheritance_clause(&mut self.evaluator, &mut self.cx, decl)
    }

    pub fn superclass_decl(&mut self, decl: DeclId) -> Option<DeclId> {
        request::superclass_decl(&mut self.evaluator, &mut self.cx, decl)
    }

    pub fn superclass_type(&mut self, decl: DeclId) -> Option<Type> {
        request::superclass_type(&mut self.evaluator, &mut self.cx, decl)
    }

    pub fn enum_raw_type(&mut self, decl: DeclId) -> Option<Type> {
        request::enum_raw_type(&mut self.evaluator, &mut self.cx, decl)
    }

    pub fn interface_type(&mut self, decl: DeclId) -> Type {
        request::interface_type(&mut self.evaluator, &mut self.cx, decl)
    }

    pub fn overridden_decls(&mut self, decl: DeclId) -> SmallVec<[DeclId; 1]> {
        request::overridden_decls(&mut self.evaluator, &mut self.cx, decl)
    }

    pub fn is_final(&mut self, decl: DeclId) -> bool {
        request::is_final(&mut self.evaluator, &mut self.cx, decl)
    }

    pub fn attached_property_wrappers(&mut self, decl: DeclId) -> Vec<DeclId> {
        request::attached_property_wrappers(&mut self.evaluator, &mut self.cx, decl)
    }

    pub fn property_wrapper_type_info(&mut self, decl: DeclId) -> PropertyWrapperTypeInfo {
        request::property_wrapper_type_info(&mut self.evaluator, &mut self.cx, decl)
    }

    pub fn backing_property_info(&mut self, decl: DeclId) -> PropertyWrapperBackingPropertyInfo {
        request::backing_property_info(&mut self.evaluator, &mut self.cx, decl)
    }

    pub fn backing_property_type(&mut self, decl: DeclId) -> Type {
        request::backing_property_type(&mut self.evaluator, &mut self.cx, decl)
    }

    pub fn usr(&mut self, decl: DeclId) -> String {
        request::usr(&mut self.evaluator, &mut self.cx, decl)
    }

    pub fn mangle_local_type(&mut self, decl: DeclId) -> String {
        request::mangle_local_type(&mut self.evaluator, &mut self.cx, decl)
    }

    // -- Lookup and resolution ----------------------------------------------

    /// Resolve a written type in the scope of `context`, diagnosing
    /// unresolvable names.
    pub fn resolve_type(&mut self, repr: &TypeRepr, context: Option<DeclId>) -> Type {
        resolve::resolve_type(&mut self.evaluator, &mut self.cx, repr, context)
    }

    /// The type a type declaration declares (not its metatype).
    pub fn declared_type(&mut self, decl: DeclId) -> Type {
        resolve::declared_type(&mut self.evaluator, &mut self.cx, decl)
    }

    /// Value members named `name` visible on instances or the metatype of
    /// `owner`, including inherited ones. Nearest declarations come first.
    pub fn lookup_value_members(&mut self, owner: DeclId, name: &str) -> Vec<DeclId> {
        lookup::lookup_value_members(&mut self.evaluator, &mut self.cx, owner, name)
    }

    /// Unqualified value lookup from `context` outward.
    pub fn lookup_unqualified(&mut self, context: Option<DeclId>, name: &str) -> Vec<DeclId> {
        lookup::lookup_unqualified_values(&mut self.evaluator, &mut self.cx, context, name)
    }

    pub fn conforms_to(&mut self, ty: &Type, proto: &ProtocolRef) -> bool {
        lookup::conforms_to(&mut self.evaluator, &mut self.cx, ty, proto)
    }

    pub fn is_subclass_of(&mut self, sub: DeclId, sup: DeclId) -> bool {
        lookup::is_subclass_of(&mut self.evaluator, &mut self.cx, sub, sup)
    }

    /// `decl` and its superclasses, nearest first, stopping at repeats.
    pub fn superclass_chain(&mut self, decl: DeclId) -> Vec<DeclId> {
        lookup::superclass_chain(&mut self.evaluator, &mut self.cx, decl)
    }

    pub fn validate_decl(&mut self, decl: DeclId) {
        interface::validate_decl(&mut self.evaluator, &mut self.cx, decl);
    }
}
