//! Property wrapper types and the storage synthesized for wrapped
//! properties.

use tarn_ast::{Decl, DeclId, DeclKind, Module};
use tarn_diag::{DiagId, diag_args};
use tarn_types::{NominalType, Type};

use crate::context::SemaContext;
use crate::lookup;
use crate::request::{self, Ev};
use crate::resolve;

/// The members that make a nominal type usable as a property wrapper.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyWrapperTypeInfo {
    /// `wrappedValue`; required.
    pub value_var: Option<DeclId>,
    /// `init(wrappedValue:)`.
    pub wrapped_value_init: Option<DeclId>,
    /// `init()`.
    pub default_init: Option<DeclId>,
    /// `projectedValue`, exposed as `$name`.
    pub projected_value_var: Option<DeclId>,
    pub enclosing_instance_wrapped_subscript: Option<DeclId>,
}

impl PropertyWrapperTypeInfo {
    pub fn is_valid(&self) -> bool {
        self.value_var.is_some()
    }
}

/// Storage synthesized for a property with attached wrappers.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyWrapperBackingPropertyInfo {
    /// `_name`
    pub backing_var_name: String,
    /// `$name`, when the outermost wrapper has a projection.
    pub projection_var_name: Option<String>,
    pub backing_type: Type,
    /// Outermost first.
    pub wrappers: Vec<DeclId>,
}

impl Default for PropertyWrapperBackingPropertyInfo {
    fn default() -> Self {
        Self {
            backing_var_name: String::new(),
            projection_var_name: None,
            backing_type: Type::Error,
            wrappers: Vec::new(),
        }
    }
}

impl PropertyWrapperBackingPropertyInfo {
    pub fn is_empty(&self) -> bool {
        self.wrappers.is_empty()
    }
}

fn instance_var(module: &Module, owner: DeclId, name: &str) -> Option<DeclId> {
    module
        .members_named(owner, name)
        .into_iter()
        .find(|id| {
            let decl = module.decl(*id);
            matches!(decl.kind, DeclKind::Var { .. }) && !decl.attrs.is_static
        })
}

fn first_label(decl: &Decl) -> Option<&str> {
    decl.signature()?.params.first()?.label.as_deref()
}

pub fn compute_type_info(cx: &mut SemaContext, decl: DeclId) -> PropertyWrapperTypeInfo {
    let module = &cx.module;
    let d = module.decl(decl);
    if !d.attrs.is_property_wrapper {
        return PropertyWrapperTypeInfo::default();
    }

    let mut info = PropertyWrapperTypeInfo {
        value_var: instance_var(module, decl, "wrappedValue"),
        projected_value_var: instance_var(module, decl, "projectedValue"),
        ..PropertyWrapperTypeInfo::default()
    };
    for &member in module.members(decl) {
        let member_decl = module.decl(member);
        match &member_decl.kind {
            DeclKind::Init { signature, .. } => {
                if first_label(member_decl) == Some("wrappedValue") {
                    info.wrapped_value_init.get_or_insert(member);
                } else if signature.params.iter().all(|p| p.has_default) {
                    info.default_init.get_or_insert(member);
                }
            }
            DeclKind::Subscript { .. }
                if member_decl.attrs.is_static
                    && first_label(member_decl) == Some("_enclosingInstance") =>
            {
                info.enclosing_instance_wrapped_subscript.get_or_insert(member);
            }
            _ => {}
        }
    }

    if !info.is_valid() {
        let loc = d.name_span.report_loc();
        let name = d.name.clone();
        cx.diags
            .emit(loc, DiagId::PropertyWrapperNoValueProperty, diag_args![name]);
    }
    info
}

/// Wrapper types named by the custom attributes of `var`, outermost first.
/// Attributes that name no valid wrapper type are diagnosed and dropped.
pub fn compute_attached_wrappers(ev: &mut Ev, cx: &mut SemaContext, var: DeclId) -> Vec<DeclId> {
    let attrs = cx.module.decl(var).attrs.custom.clone();
    let mut wrappers = Vec::new();
    for attr in attrs {
        let name = &attr.name.node;
        let candidate = lookup::lookup_type_decls(&cx.module, Some(var), name)
            .into_iter()
            .find(|id| cx.module.decl(*id).attrs.is_property_wrapper);
        match candidate {
            Some(wrapper) => {
                if request::property_wrapper_type_info(ev, cx, wrapper).is_valid() {
                    wrappers.push(wrapper);
                }
            }
            None => {
                cx.diags.emit(
                    attr.name.span.report_loc(),
                    DiagId::UnknownAttribute,
                    diag_args![name.as_str()],
                );
            }
        }
    }
    wrappers
}

pub fn compute_backing_info(
    ev: &mut Ev,
    cx: &mut SemaContext,
    var: DeclId,
) -> PropertyWrapperBackingPropertyInfo {
    let wrappers = request::attached_property_wrappers(ev, cx, var);
    let Some(&outermost) = wrappers.first() else {
        return PropertyWrapperBackingPropertyInfo::default();
    };
    let name = cx.module.decl(var).name.clone();
    let projected = request::property_wrapper_type_info(ev, cx, outermost)
        .projected_value_var
        .is_some();
    PropertyWrapperBackingPropertyInfo {
        backing_var_name: format!("_{name}"),
        projection_var_name: projected.then(|| format!("${name}")),
        backing_type: request::backing_property_type(ev, cx, var),
        wrappers,
    }
}

/// `Outer<Inner<T>>` for `@Outer @Inner var x: T`; non-generic wrappers
/// stand alone.
pub fn compute_backing_type(ev: &mut Ev, cx: &mut SemaContext, var: DeclId) -> Type {
    let wrappers = request::attached_property_wrappers(ev, cx, var);
    if wrappers.is_empty() {
        return Type::Error;
    }
    let mut current = request::interface_type(ev, cx, var);
    for &wrapper in wrappers.iter().rev() {
        let is_generic = !cx.module.decl(wrapper).generic_params.is_empty();
        current = match resolve::declared_type(ev, cx, wrapper) {
            Type::Nominal(nominal) if is_generic => Type::Nominal(NominalType {
                args: vec![current],
                ..nominal
            }),
            other => other,
        };
    }
    current
}

/// Validate wrapper types and the wrappers attached to properties.
pub fn check_property_wrappers(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId) {
    let d = cx.module.decl(decl);
    if d.attrs.is_property_wrapper && d.is_nominal() {
        let _ = request::property_wrapper_type_info(ev, cx, decl);
    } else if matches!(d.kind, DeclKind::Var { .. }) && !d.attrs.custom.is_empty() {
        let _ = request::backing_property_info(ev, cx, decl);
    }
}
