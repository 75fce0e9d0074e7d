//! The closed set of declaration-graph requests.

use std::fmt;

use smallvec::SmallVec;
use tarn_ast::{DeclId, Module};
use tarn_diag::{DiagId, diag_args};
use tarn_eval::{CacheKind, EvalError, Evaluate, Evaluator, Request};
use tarn_types::Type;

use crate::context::SemaContext;
use crate::inheritance::{self, InheritanceSummary};
use crate::property_wrappers::{
    self, PropertyWrapperBackingPropertyInfo, PropertyWrapperTypeInfo,
};
use crate::{interface, overrides, usr};

pub type Ev = Evaluator<TypeCheckRequest>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCheckRequest {
    /// Type declarations directly named by one inheritance clause entry.
    InheritedDeclsReferenced { decl: DeclId, index: usize },
    /// The resolved type of one inheritance clause entry.
    InheritedType { decl: DeclId, index: usize },
    /// The classified inheritance clause of a nominal type.
    InheritanceClause(DeclId),
    SuperclassDecl(DeclId),
    SuperclassType(DeclId),
    EnumRawType(DeclId),
    InterfaceType(DeclId),
    OverriddenDecls(DeclId),
    IsFinal(DeclId),
    AttachedPropertyWrappers(DeclId),
    PropertyWrapperTypeInfo(DeclId),
    PropertyWrapperBackingPropertyInfo(DeclId),
    PropertyWrapperBackingPropertyType(DeclId),
    UsrGeneration(DeclId),
    MangleLocalTypeDecl(DeclId),
}

impl TypeCheckRequest {
    /// The declaration this request is about.
    pub fn decl(&self) -> DeclId {
        match *self {
            TypeCheckRequest::InheritedDeclsReferenced { decl, .. }
            | TypeCheckRequest::InheritedType { decl, .. }
            | TypeCheckRequest::InheritanceClause(decl)
            | TypeCheckRequest::SuperclassDecl(decl)
            | TypeCheckRequest::SuperclassType(decl)
            | TypeCheckRequest::EnumRawType(decl)
            | TypeCheckRequest::InterfaceType(decl)
            | TypeCheckRequest::OverriddenDecls(decl)
            | TypeCheckRequest::IsFinal(decl)
            | TypeCheckRequest::AttachedPropertyWrappers(decl)
            | TypeCheckRequest::PropertyWrapperTypeInfo(decl)
            | TypeCheckRequest::PropertyWrapperBackingPropertyInfo(decl)
            | TypeCheckRequest::PropertyWrapperBackingPropertyType(decl)
            | TypeCheckRequest::UsrGeneration(decl)
            | TypeCheckRequest::MangleLocalTypeDecl(decl) => decl,
        }
    }

    /// Description naming the declaration, for cycle diagnostics.
    pub fn describe(&self, module: &Module) -> String {
        let name = &module.decl(self.decl()).name;
        match self {
            TypeCheckRequest::InheritedDeclsReferenced { index, .. } => {
                format!("inherited declaration #{index} of `{name}`")
            }
            TypeCheckRequest::InheritedType { index, .. } => {
                format!("inherited type #{index} of `{name}`")
            }
            TypeCheckRequest::InheritanceClause(_) => format!("inheritance clause of `{name}`"),
            TypeCheckRequest::SuperclassDecl(_) | TypeCheckRequest::SuperclassType(_) => {
                format!("superclass of `{name}`")
            }
            TypeCheckRequest::EnumRawType(_) => format!("raw type of `{name}`"),
            TypeCheckRequest::InterfaceType(_) => format!("type of `{name}`"),
            TypeCheckRequest::OverriddenDecls(_) => format!("declarations overridden by `{name}`"),
            TypeCheckRequest::IsFinal(_) => format!("finality of `{name}`"),
            TypeCheckRequest::AttachedPropertyWrappers(_) => {
                format!("property wrappers attached to `{name}`")
            }
            TypeCheckRequest::PropertyWrapperTypeInfo(_) => {
                format!("property wrapper type `{name}`")
            }
            TypeCheckRequest::PropertyWrapperBackingPropertyInfo(_)
            | TypeCheckRequest::PropertyWrapperBackingPropertyType(_) => {
                format!("backing storage of `{name}`")
            }
            TypeCheckRequest::UsrGeneration(_) => format!("USR of `{name}`"),
            TypeCheckRequest::MangleLocalTypeDecl(_) => format!("mangled name of `{name}`"),
        }
    }
}

impl fmt::Display for TypeCheckRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeCheckRequest::InheritedDeclsReferenced { decl, index }
            | TypeCheckRequest::InheritedType { decl, index } => {
                write!(f, "{}(#{}, {index})", self.kind_name(), decl.0)
            }
            _ => write!(f, "{}(#{})", self.kind_name(), self.decl().0),
        }
    }
}

/// Results of [`TypeCheckRequest`], one variant per output shape.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeCheckOutput {
    Decls(SmallVec<[DeclId; 2]>),
    Type(Type),
    OptType(Option<Type>),
    Inheritance(InheritanceSummary),
    Decl(Option<DeclId>),
    Overridden(SmallVec<[DeclId; 1]>),
    Bool(bool),
    DeclList(Vec<DeclId>),
    WrapperTypeInfo(PropertyWrapperTypeInfo),
    BackingInfo(PropertyWrapperBackingPropertyInfo),
    Text(String),
}

impl TypeCheckOutput {
    pub fn into_decls(self) -> SmallVec<[DeclId; 2]> {
        match self {
            TypeCheckOutput::Decls(decls) => decls,
            _ => SmallVec::new(),
        }
    }

    pub fn into_type(self) -> Type {
        match self {
            TypeCheckOutput::Type(ty) => ty,
            _ => Type::Error,
        }
    }

    pub fn into_opt_type(self) -> Option<Type> {
        match self {
            TypeCheckOutput::OptType(ty) => ty,
            _ => None,
        }
    }

    pub fn into_inheritance(self) -> InheritanceSummary {
        match self {
            TypeCheckOutput::Inheritance(summary) => summary,
            _ => InheritanceSummary::default(),
        }
    }

    pub fn into_decl(self) -> Option<DeclId> {
        match self {
            TypeCheckOutput::Decl(decl) => decl,
            _ => None,
        }
    }

    pub fn into_overridden(self) -> SmallVec<[DeclId; 1]> {
        match self {
            TypeCheckOutput::Overridden(decls) => decls,
            _ => SmallVec::new(),
        }
    }

    pub fn into_bool(self) -> bool {
        matches!(self, TypeCheckOutput::Bool(true))
    }

    pub fn into_decl_list(self) -> Vec<DeclId> {
        match self {
            TypeCheckOutput::DeclList(decls) => decls,
            _ => Vec::new(),
        }
    }

    pub fn into_wrapper_type_info(self) -> PropertyWrapperTypeInfo {
        match self {
            TypeCheckOutput::WrapperTypeInfo(info) => info,
            _ => PropertyWrapperTypeInfo::default(),
        }
    }

    pub fn into_backing_info(self) -> PropertyWrapperBackingPropertyInfo {
        match self {
            TypeCheckOutput::BackingInfo(info) => info,
            _ => PropertyWrapperBackingPropertyInfo::default(),
        }
    }

    pub fn into_text(self) -> String {
        match self {
            TypeCheckOutput::Text(text) => text,
            _ => String::new(),
        }
    }
}

impl Request for TypeCheckRequest {
    type Output = TypeCheckOutput;

    fn kind_name(&self) -> &'static str {
        match self {
            TypeCheckRequest::InheritedDeclsReferenced { .. } => "inherited_decls_referenced",
            TypeCheckRequest::InheritedType { .. } => "inherited_type",
            TypeCheckRequest::InheritanceClause(_) => "inheritance_clause",
            TypeCheckRequest::SuperclassDecl(_) => "superclass_decl",
            TypeCheckRequest::SuperclassType(_) => "superclass_type",
            TypeCheckRequest::EnumRawType(_) => "enum_raw_type",
            TypeCheckRequest::InterfaceType(_) => "interface_type",
            TypeCheckRequest::OverriddenDecls(_) => "overridden_decls",
            TypeCheckRequest::IsFinal(_) => "is_final",
            TypeCheckRequest::AttachedPropertyWrappers(_) => "attached_property_wrappers",
            TypeCheckRequest::PropertyWrapperTypeInfo(_) => "property_wrapper_type_info",
            TypeCheckRequest::PropertyWrapperBackingPropertyInfo(_) => {
                "property_wrapper_backing_property_info"
            }
            TypeCheckRequest::PropertyWrapperBackingPropertyType(_) => {
                "property_wrapper_backing_property_type"
            }
            TypeCheckRequest::UsrGeneration(_) => "usr_generation",
            TypeCheckRequest::MangleLocalTypeDecl(_) => "mangle_local_type_decl",
        }
    }

    fn cache_kind(&self) -> CacheKind {
        match self {
            TypeCheckRequest::InheritedDeclsReferenced { .. } => CacheKind::Uncached,
            TypeCheckRequest::InheritedType { .. }
            | TypeCheckRequest::SuperclassDecl(_)
            | TypeCheckRequest::SuperclassType(_)
            | TypeCheckRequest::EnumRawType(_)
            | TypeCheckRequest::OverriddenDecls(_)
            | TypeCheckRequest::IsFinal(_) => CacheKind::SeparatelyCached,
            TypeCheckRequest::InheritanceClause(_)
            | TypeCheckRequest::InterfaceType(_)
            | TypeCheckRequest::AttachedPropertyWrappers(_)
            | TypeCheckRequest::PropertyWrapperTypeInfo(_)
            | TypeCheckRequest::PropertyWrapperBackingPropertyInfo(_)
            | TypeCheckRequest::PropertyWrapperBackingPropertyType(_)
            | TypeCheckRequest::UsrGeneration(_)
            | TypeCheckRequest::MangleLocalTypeDecl(_) => CacheKind::Cached,
        }
    }
}

impl Evaluate<SemaContext> for TypeCheckRequest {
    fn evaluate(&self, ev: &mut Ev, cx: &mut SemaContext) -> Result<TypeCheckOutput, EvalError> {
        let output = match *self {
            TypeCheckRequest::InheritedDeclsReferenced { decl, index } => {
                TypeCheckOutput::Decls(inheritance::inherited_decls_referenced(cx, decl, index))
            }
            TypeCheckRequest::InheritedType { decl, index } => {
                TypeCheckOutput::Type(inheritance::inherited_type(ev, cx, decl, index))
            }
            TypeCheckRequest::InheritanceClause(decl) => {
                TypeCheckOutput::Inheritance(inheritance::inheritance_clause(ev, cx, decl))
            }
            TypeCheckRequest::SuperclassDecl(decl) => TypeCheckOutput::Decl(
                inheritance_clause(ev, cx, decl)
                    .superclass
                    .and_then(|entry| entry.ty.nominal_decl()),
            ),
            TypeCheckRequest::SuperclassType(decl) => TypeCheckOutput::OptType(
                inheritance_clause(ev, cx, decl)
                    .superclass
                    .map(|entry| entry.ty),
            ),
            TypeCheckRequest::EnumRawType(decl) => TypeCheckOutput::OptType(
                inheritance_clause(ev, cx, decl)
                    .raw_type
                    .map(|entry| entry.ty),
            ),
            TypeCheckRequest::InterfaceType(decl) => {
                TypeCheckOutput::Type(interface::compute_interface_type(ev, cx, decl))
            }
            TypeCheckRequest::OverriddenDecls(decl) => {
                TypeCheckOutput::Overridden(overrides::compute_overridden_decls(ev, cx, decl))
            }
            TypeCheckRequest::IsFinal(decl) => {
                TypeCheckOutput::Bool(overrides::compute_is_final(ev, cx, decl))
            }
            TypeCheckRequest::AttachedPropertyWrappers(decl) => TypeCheckOutput::DeclList(
                property_wrappers::compute_attached_wrappers(ev, cx, decl),
            ),
            TypeCheckRequest::PropertyWrapperTypeInfo(decl) => TypeCheckOutput::WrapperTypeInfo(
                property_wrappers::compute_type_info(cx, decl),
            ),
            TypeCheckRequest::PropertyWrapperBackingPropertyInfo(decl) => {
                TypeCheckOutput::BackingInfo(property_wrappers::compute_backing_info(ev, cx, decl))
            }
            TypeCheckRequest::PropertyWrapperBackingPropertyType(decl) => {
                TypeCheckOutput::Type(property_wrappers::compute_backing_type(ev, cx, decl))
            }
            TypeCheckRequest::UsrGeneration(decl) => {
                TypeCheckOutput::Text(usr::compute_usr(ev, cx, decl))
            }
            TypeCheckRequest::MangleLocalTypeDecl(decl) => {
                TypeCheckOutput::Text(usr::compute_local_mangling(cx, decl))
            }
        };
        Ok(output)
    }

    fn should_cache(&self, cx: &SemaContext) -> bool {
        match *self {
            TypeCheckRequest::InterfaceType(decl) => interface::is_settled(cx, decl),
            _ => self.is_cached(),
        }
    }

    fn cached_result(&self, cx: &SemaContext) -> Option<TypeCheckOutput> {
        let caches = &cx.caches;
        match *self {
            TypeCheckRequest::InheritedType { decl, index } => caches
                .inherited_types
                .get(&(decl, index))
                .cloned()
                .map(TypeCheckOutput::Type),
            TypeCheckRequest::SuperclassDecl(decl) => caches
                .superclass_decls
                .get(&decl)
                .copied()
                .map(TypeCheckOutput::Decl),
            TypeCheckRequest::SuperclassType(decl) => caches
                .superclass_types
                .get(&decl)
                .cloned()
                .map(TypeCheckOutput::OptType),
            TypeCheckRequest::EnumRawType(decl) => caches
                .raw_types
                .get(&decl)
                .cloned()
                .map(TypeCheckOutput::OptType),
            TypeCheckRequest::OverriddenDecls(decl) => caches
                .overridden
                .get(&decl)
                .cloned()
                .map(TypeCheckOutput::Overridden),
            TypeCheckRequest::IsFinal(decl) => {
                caches.is_final.get(&decl).copied().map(TypeCheckOutput::Bool)
            }
            _ => None,
        }
    }

    fn cache_result(&self, cx: &mut SemaContext, value: TypeCheckOutput) {
        let caches = &mut cx.caches;
        match (*self, value) {
            (TypeCheckRequest::InheritedType { decl, index }, TypeCheckOutput::Type(ty)) => {
                caches.inherited_types.insert((decl, index), ty);
            }
            (TypeCheckRequest::SuperclassDecl(decl), TypeCheckOutput::Decl(sup)) => {
                caches.superclass_decls.insert(decl, sup);
            }
            (TypeCheckRequest::SuperclassType(decl), TypeCheckOutput::OptType(ty)) => {
                caches.superclass_types.insert(decl, ty);
            }
            (TypeCheckRequest::EnumRawType(decl), TypeCheckOutput::OptType(ty)) => {
                caches.raw_types.insert(decl, ty);
            }
            (TypeCheckRequest::OverriddenDecls(decl), TypeCheckOutput::Overridden(decls)) => {
                caches.overridden.insert(decl, decls);
            }
            (TypeCheckRequest::IsFinal(decl), TypeCheckOutput::Bool(value)) => {
                caches.is_final.insert(decl, value);
            }
            _ => {}
        }
    }

    fn diagnose_cycle(&self, cx: &mut SemaContext) {
        let description = self.describe(&cx.module);
        let loc = cx.module.decl(self.decl()).name_span.report_loc();
        cx.diags
            .emit(loc, DiagId::CircularReference, diag_args![description]);
    }

    fn note_cycle_step(&self, cx: &mut SemaContext) {
        let description = self.describe(&cx.module);
        let loc = cx.module.decl(self.decl()).name_span.report_loc();
        cx.diags
            .emit(loc, DiagId::CircularReferenceThrough, diag_args![description]);
    }

    fn break_cycle(&self) -> Option<TypeCheckOutput> {
        let fallback = match self {
            // Pure name lookup never re-enters the evaluator.
            TypeCheckRequest::InheritedDeclsReferenced { .. } => return None,
            TypeCheckRequest::InheritedType { .. }
            | TypeCheckRequest::InterfaceType(_)
            | TypeCheckRequest::PropertyWrapperBackingPropertyType(_) => {
                TypeCheckOutput::Type(Type::Error)
            }
            TypeCheckRequest::InheritanceClause(_) => {
                TypeCheckOutput::Inheritance(InheritanceSummary::default())
            }
            TypeCheckRequest::SuperclassDecl(_) => TypeCheckOutput::Decl(None),
            TypeCheckRequest::SuperclassType(_) | TypeCheckRequest::EnumRawType(_) => {
                TypeCheckOutput::OptType(None)
            }
            TypeCheckRequest::OverriddenDecls(_) => TypeCheckOutput::Overridden(SmallVec::new()),
            TypeCheckRequest::IsFinal(_) => TypeCheckOutput::Bool(false),
            TypeCheckRequest::AttachedPropertyWrappers(_) => TypeCheckOutput::DeclList(Vec::new()),
            TypeCheckRequest::PropertyWrapperTypeInfo(_) => {
                TypeCheckOutput::WrapperTypeInfo(PropertyWrapperTypeInfo::default())
            }
            TypeCheckRequest::PropertyWrapperBackingPropertyInfo(_) => {
                TypeCheckOutput::BackingInfo(PropertyWrapperBackingPropertyInfo::default())
            }
            TypeCheckRequest::UsrGeneration(_) | TypeCheckRequest::MangleLocalTypeDecl(_) => {
                TypeCheckOutput::Text(String::new())
            }
        };
        Some(fallback)
    }
}

// ---------------------------------------------------------------------------
// Typed entry points
// ---------------------------------------------------------------------------

pub fn inherited_decls_referenced(
    ev: &mut Ev,
    cx: &mut SemaContext,
    decl: DeclId,
    index: usize,
) -> SmallVec<[DeclId; 2]> {
    ev.evaluate_or_default(
        &TypeCheckRequest::InheritedDeclsReferenced { decl, index },
        cx,
        TypeCheckOutput::Decls(SmallVec::new()),
    )
    .into_decls()
}

pub fn inherited_type(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId, index: usize) -> Type {
    ev.evaluate_or_default(
        &TypeCheckRequest::InheritedType { decl, index },
        cx,
        TypeCheckOutput::Type(Type::Error),
    )
    .into_type()
}

pub fn inheritance_clause(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId) -> InheritanceSummary {
    ev.evaluate_or_default(
        &TypeCheckRequest::InheritanceClause(decl),
        cx,
        TypeCheckOutput::Inheritance(InheritanceSummary::default()),
    )
    .into_inheritance()
}

pub fn superclass_decl(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId) -> Option<DeclId> {
    ev.evaluate_or_default(
        &TypeCheckRequest::SuperclassDecl(decl),
        cx,
        TypeCheckOutput::Decl(None),
    )
    .into_decl()
}

pub fn superclass_type(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId) -> Option<Type> {
    ev.evaluate_or_default(
        &TypeCheckRequest::SuperclassType(decl),
        cx,
        TypeCheckOutput::OptType(None),
    )
    .into_opt_type()
}

pub fn enum_raw_type(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId) -> Option<Type> {
    ev.evaluate_or_default(
        &TypeCheckRequest::EnumRawType(decl),
        cx,
        TypeCheckOutput::OptType(None),
    )
    .into_opt_type()
}

pub fn interface_type(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId) -> Type {
    ev.evaluate_or_default(
        &TypeCheckRequest::InterfaceType(decl),
        cx,
        TypeCheckOutput::Type(Type::Error),
    )
    .into_type()
}

pub fn overridden_decls(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId) -> SmallVec<[DeclId; 1]> {
    ev.evaluate_or_default(
        &TypeCheckRequest::OverriddenDecls(decl),
        cx,
        TypeCheckOutput::Overridden(SmallVec::new()),
    )
    .into_overridden()
}

pub fn is_final(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId) -> bool {
    ev.evaluate_or_default(&TypeCheckRequest::IsFinal(decl), cx, TypeCheckOutput::Bool(false))
        .into_bool()
}

pub fn attached_property_wrappers(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId) -> Vec<DeclId> {
    ev.evaluate_or_default(
        &TypeCheckRequest::AttachedPropertyWrappers(decl),
        cx,
        TypeCheckOutput::DeclList(Vec::new()),
    )
    .into_decl_list()
}

pub fn property_wrapper_type_info(
    ev: &mut Ev,
    cx: &mut SemaContext,
    decl: DeclId,
) -> PropertyWrapperTypeInfo {
    ev.evaluate_or_default(
        &TypeCheckRequest::PropertyWrapperTypeInfo(decl),
        cx,
        TypeCheckOutput::WrapperTypeInfo(PropertyWrapperTypeInfo::default()),
    )
    .into_wrapper_type_info()
}

pub fn backing_property_info(
    ev: &mut Ev,
    cx: &mut SemaContext,
    decl: DeclId,
) -> PropertyWrapperBackingPropertyInfo {
    ev.evaluate_or_default(
        &TypeCheckRequest::PropertyWrapperBackingPropertyInfo(decl),
        cx,
        TypeCheckOutput::BackingInfo(PropertyWrapperBackingPropertyInfo::default()),
    )
    .into_backing_info()
}

pub fn backing_property_type(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId) -> Type {
    ev.evaluate_or_default(
        &TypeCheckRequest::PropertyWrapperBackingPropertyType(decl),
        cx,
        TypeCheckOutput::Type(Type::Error),
    )
    .into_type()
}

pub fn usr(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId) -> String {
    ev.evaluate_or_default(
        &TypeCheckRequest::UsrGeneration(decl),
        cx,
        TypeCheckOutput::Text(String::new()),
    )
    .into_text()
}

pub fn mangle_local_type(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId) -> String {
    ev.evaluate_or_default(
        &TypeCheckRequest::MangleLocalTypeDecl(decl),
        cx,
        TypeCheckOutput::Text(String::new()),
    )
    .into_text()
}
