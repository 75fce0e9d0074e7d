//! Member lookup on types and the types of references to declarations.

use std::collections::BTreeMap;

use tarn_ast::{DeclId, DeclKind, TypeRepr, TypeReprKind};
use tarn_sema::{Ev, SemaContext, lookup, request, resolve};
use tarn_types::{FunctionParam, GenericParamType, NominalKind, ProtocolRef, Type};

use crate::constraint::{Constraint, ConstraintKind, OverloadChoice};
use crate::cs::{ConstraintSystem, OpenedGeneric};
use crate::locator::{ConstraintLocator, PathElt};

/// Function types stored in variables and returned from functions escape.
pub(crate) fn mark_escaping(ty: Type) -> Type {
    match ty {
        Type::Function(mut f) => {
            f.escaping = true;
            Type::Function(f)
        }
        Type::Optional(inner) => Type::optional(mark_escaping(*inner)),
        other => other,
    }
}

fn builtin_member(base: &Type, name: &str, base_is_lvalue: bool) -> Option<Type> {
    match (base, name) {
        (Type::Array(_) | Type::String, "count") => Some(Type::Int),
        (Type::Array(_) | Type::String, "isEmpty") => Some(Type::Bool),
        (Type::Array(element), "subscript") => {
            let result = if base_is_lvalue {
                Type::lvalue((**element).clone())
            } else {
                (**element).clone()
            };
            Some(Type::function(vec![FunctionParam::unlabeled(Type::Int)], result))
        }
        _ => None,
    }
}

fn owner_decls(base: &Type) -> Vec<DeclId> {
    match base {
        Type::Nominal(nominal) => vec![nominal.decl],
        Type::Existential(protos) => protos.iter().filter_map(|p| p.decl).collect(),
        Type::Metatype(instance) => owner_decls(instance),
        _ => Vec::new(),
    }
}

/// Value members named `name` on `base`. `base` is loaded and not
/// optional; a metatype base finds static members and initializers along
/// with everything else, leaving the instance/static check to the caller.
pub(crate) fn lookup_members(
    ev: &mut Ev,
    cx: &mut SemaContext,
    base: &Type,
    name: &str,
    base_is_lvalue: bool,
) -> Vec<OverloadChoice> {
    if let Some(ty) = builtin_member(base, name, base_is_lvalue) {
        return vec![OverloadChoice::Builtin {
            name: name.to_string(),
            ty,
        }];
    }
    let mut found = Vec::new();
    for owner in owner_decls(base) {
        for decl in lookup::lookup_value_members(ev, cx, owner, name) {
            let choice = OverloadChoice::Decl {
                decl,
                base: Some(base.clone()),
            };
            if !found.contains(&choice) {
                found.push(choice);
            }
        }
    }
    if found.is_empty()
        && name == "init"
        && let Type::Metatype(instance) = base
        && let Type::Nominal(nominal) = &**instance
        && nominal.kind != NominalKind::Enum
    {
        found.push(OverloadChoice::ImplicitInit {
            nominal: nominal.decl,
            base: base.clone(),
        });
    }
    found
}

/// Whether `decl` is a member that needs a metatype base.
pub(crate) fn is_static_member(cx: &SemaContext, decl: DeclId) -> bool {
    let d = cx.module.decl(decl);
    d.attrs.is_static
        || matches!(d.kind, DeclKind::Init { .. } | DeclKind::EnumCase { .. })
        || d.is_type_decl()
}

/// Map the generic parameters of the type that owns `decl` to the
/// arguments of `base`.
fn base_substitutions(
    ev: &mut Ev,
    cx: &mut SemaContext,
    decl: DeclId,
    base: Option<&Type>,
) -> BTreeMap<GenericParamType, Type> {
    let mut map = BTreeMap::new();
    let Some(base) = base else {
        return map;
    };
    let instance = match base.rvalue() {
        Type::Metatype(instance) => (**instance).clone(),
        other => other.clone(),
    };
    let Type::Nominal(nominal) = instance else {
        return map;
    };
    let Some(owner) = cx.module.parent(decl).filter(|p| cx.module.decl(*p).is_nominal()) else {
        return map;
    };
    if cx.module.decl(owner).generic_params.is_empty() {
        return map;
    }
    if let Type::Nominal(declared) = resolve::declared_type(ev, cx, owner) {
        for (param, arg) in declared.args.iter().zip(nominal.args.iter()) {
            if let Type::GenericParam { param, .. } = param {
                map.insert(*param, arg.clone());
            }
        }
    }
    map
}

fn generic_param_key(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId, index: usize) -> Option<GenericParamType> {
    let name = cx.module.decl(decl).generic_params.get(index)?.name.clone();
    let repr = TypeRepr::new(TypeReprKind::Ident(name.node), name.span);
    match resolve::resolve_type(ev, cx, &repr, Some(decl)) {
        Type::GenericParam { param, .. } => Some(param),
        _ => None,
    }
}

/// Replace the generic parameters of `decl` with fresh type variables and
/// add its requirements as constraints on them.
pub(crate) fn open_generic_params(
    ev: &mut Ev,
    cx: &mut SemaContext,
    cs: &mut ConstraintSystem,
    decl: DeclId,
    locator: &ConstraintLocator,
) -> BTreeMap<GenericParamType, Type> {
    let mut map = BTreeMap::new();
    let d = cx.module.decl(decl).clone();
    if d.generic_params.is_empty() {
        return map;
    }
    // Requirements were diagnosed when the declaration was checked.
    let mark = cx.diags.len();
    for (index, param) in d.generic_params.iter().enumerate() {
        let Some(key) = generic_param_key(ev, cx, decl, index) else {
            continue;
        };
        let var = cs.new_type_var();
        if let Type::Var(id) = var {
            cs.opened_generics.push(OpenedGeneric {
                var: id,
                name: param.name.node.clone(),
                locator: locator.with(PathElt::GenericParameter(param.name.node.clone())),
            });
        }
        map.insert(key, var);
    }

    let mut requirement = 0;
    for param in &d.generic_params {
        let subject_repr = TypeRepr::new(TypeReprKind::Ident(param.name.node.clone()), param.name.span);
        let subject = resolve::resolve_type(ev, cx, &subject_repr, Some(decl)).subst_generic_params(&map);
        for constraint in &param.constraints {
            let bound = resolve::resolve_type(ev, cx, constraint, Some(decl)).subst_generic_params(&map);
            let req_locator = locator.with(PathElt::TypeParameterRequirement {
                owner: decl,
                index: requirement,
            });
            add_requirement(cs, subject.clone(), bound, false, req_locator);
            requirement += 1;
        }
    }
    for req in &d.where_clause {
        let subject = resolve::resolve_type(ev, cx, &req.subject, Some(decl)).subst_generic_params(&map);
        let bound = resolve::resolve_type(ev, cx, &req.constraint, Some(decl)).subst_generic_params(&map);
        let req_locator = locator.with(PathElt::TypeParameterRequirement {
            owner: decl,
            index: requirement,
        });
        add_requirement(cs, subject, bound, req.same_type, req_locator);
        requirement += 1;
    }
    cx.diags.truncate(mark);
    map
}

fn add_requirement(
    cs: &mut ConstraintSystem,
    subject: Type,
    bound: Type,
    same_type: bool,
    locator: ConstraintLocator,
) {
    if subject.is_error() || bound.is_error() {
        return;
    }
    let kind = if same_type {
        ConstraintKind::SameType {
            first: subject,
            second: bound,
        }
    } else {
        match bound {
            Type::Existential(protos) => {
                for protocol in protos {
                    cs.add(Constraint::new(
                        ConstraintKind::ConformsTo {
                            ty: subject.clone(),
                            protocol,
                        },
                        locator.clone(),
                    ));
                }
                return;
            }
            Type::AnyObject => ConstraintKind::ConformsTo {
                ty: subject,
                protocol: ProtocolRef::builtin("AnyObject"),
            },
            superclass => ConstraintKind::Superclass {
                ty: subject,
                superclass,
            },
        }
    };
    cs.add(Constraint::new(kind, locator));
}

/// Whether a settable member reached through `base` can be mutated.
fn base_allows_mutation(base: Option<&Type>) -> bool {
    match base {
        None => true,
        Some(base) => base.is_lvalue() || base.is_metatype() || base.rvalue().is_class_bound(),
    }
}

/// The type of a reference to `choice`, with generic parameters opened.
pub(crate) fn type_of_reference(
    ev: &mut Ev,
    cx: &mut SemaContext,
    cs: &mut ConstraintSystem,
    choice: &OverloadChoice,
    locator: &ConstraintLocator,
) -> Type {
    match choice {
        OverloadChoice::Builtin { ty, .. } => ty.clone(),
        OverloadChoice::ImplicitInit { nominal, base } => {
            implicit_init_type(ev, cx, *nominal, base)
        }
        OverloadChoice::Decl { decl, base } => {
            let decl = *decl;
            let d = cx.module.decl(decl).clone();
            let mut subst = base_substitutions(ev, cx, decl, base.as_ref());
            match &d.kind {
                DeclKind::Var { is_let, .. } => {
                    let ty = mark_escaping(request::interface_type(ev, cx, decl));
                    let ty = ty.subst_generic_params(&subst);
                    if !is_let && !ty.is_error() && base_allows_mutation(base.as_ref()) {
                        Type::lvalue(ty)
                    } else {
                        ty
                    }
                }
                DeclKind::Class | DeclKind::Struct | DeclKind::Enum | DeclKind::Protocol => {
                    subst.extend(open_generic_params(ev, cx, cs, decl, locator));
                    request::interface_type(ev, cx, decl).subst_generic_params(&subst)
                }
                DeclKind::TypeAlias { .. } => {
                    request::interface_type(ev, cx, decl).subst_generic_params(&subst)
                }
                DeclKind::Func { .. } | DeclKind::Init { .. } | DeclKind::Subscript { .. } => {
                    subst.extend(open_generic_params(ev, cx, cs, decl, locator));
                    let ty = request::interface_type(ev, cx, decl).subst_generic_params(&subst);
                    match ty {
                        Type::Function(mut f) => {
                            f.result = Box::new(mark_escaping(*f.result));
                            Type::Function(f)
                        }
                        other => other,
                    }
                }
                DeclKind::EnumCase { .. } => {
                    request::interface_type(ev, cx, decl).subst_generic_params(&subst)
                }
                DeclKind::TopLevelCode { .. } => Type::Error,
            }
        }
    }
}

/// `init` of a type without declared initializers: memberwise for structs,
/// no parameters for classes.
fn implicit_init_type(ev: &mut Ev, cx: &mut SemaContext, nominal: DeclId, base: &Type) -> Type {
    let instance = match base.rvalue() {
        Type::Metatype(instance) => (**instance).clone(),
        other => other.clone(),
    };
    let subst = match &instance {
        Type::Nominal(inst) => {
            let mut map = BTreeMap::new();
            if let Type::Nominal(declared) = resolve::declared_type(ev, cx, nominal) {
                for (param, arg) in declared.args.iter().zip(inst.args.iter()) {
                    if let Type::GenericParam { param, .. } = param {
                        map.insert(*param, arg.clone());
                    }
                }
            }
            map
        }
        _ => BTreeMap::new(),
    };
    let mut params = Vec::new();
    if !cx.module.decl(nominal).is_class() {
        let members = cx.module.members(nominal).to_vec();
        for member in members {
            let d = cx.module.decl(member).clone();
            if let DeclKind::Var { init, .. } = &d.kind
                && !d.attrs.is_static
            {
                let ty = mark_escaping(request::interface_type(ev, cx, member)).subst_generic_params(&subst);
                let mut param = FunctionParam::new(Some(d.name.clone()), ty);
                param.has_default = init.is_some();
                params.push(param);
            }
        }
    }
    Type::function(params, instance)
}

/// Open the generic parameters of a type written without arguments:
/// `Box` in `Box(value: 1)` becomes `Box<$T0>`.
pub(crate) fn open_unapplied_type(
    ev: &mut Ev,
    cx: &mut SemaContext,
    cs: &mut ConstraintSystem,
    ty: Type,
    locator: &ConstraintLocator,
) -> Type {
    let Type::Nominal(nominal) = &ty else {
        return ty;
    };
    let decl = nominal.decl;
    if cx.module.decl(decl).generic_params.is_empty() {
        return ty;
    }
    let declared = resolve::declared_type(ev, cx, decl);
    if declared != ty {
        return ty;
    }
    let subst = open_generic_params(ev, cx, cs, decl, locator);
    ty.subst_generic_params(&subst)
}

/// The type of `_x` (the wrapper storage) or `$x` (its projection) for a
/// property `x` with attached wrappers, reached through `base`.
pub(crate) fn wrapper_storage_type(
    ev: &mut Ev,
    cx: &mut SemaContext,
    cs: &mut ConstraintSystem,
    wrapped: DeclId,
    projection: bool,
    base: Option<&Type>,
    locator: &ConstraintLocator,
) -> Option<Type> {
    let info = request::backing_property_info(ev, cx, wrapped);
    if info.is_empty() {
        return None;
    }
    if !projection {
        let ty = info.backing_type.clone();
        return Some(if base_allows_mutation(base) { Type::lvalue(ty) } else { ty });
    }
    info.projection_var_name.as_ref()?;
    let outermost = *info.wrappers.first()?;
    let projected = request::property_wrapper_type_info(ev, cx, outermost).projected_value_var?;
    let choice = OverloadChoice::Decl {
        decl: projected,
        base: Some(info.backing_type.clone()),
    };
    Some(type_of_reference(ev, cx, cs, &choice, locator))
}

/// Split `_x` or `$x` into whether it names the projection and `x`.
pub(crate) fn storage_ref_name(name: &str) -> Option<(bool, &str)> {
    let (prefix, wrapped) = name.split_at_checked(1)?;
    match prefix {
        _ if wrapped.is_empty() => None,
        "_" => Some((false, wrapped)),
        "$" => Some((true, wrapped)),
        _ => None,
    }
}
