//! Resolution of written types into semantic types.

use tarn_ast::{DeclId, DeclKind, Module, TypeRepr, TypeReprKind};
use tarn_diag::{DiagId, diag_args};
use tarn_types::{
    FunctionParam, FunctionType, GenericParamType, NominalKind, NominalType, ProtocolRef, Type,
};

use crate::context::SemaContext;
use crate::lookup;
use crate::request::{self, Ev};

const BUILTIN_PROTOCOLS: &[&str] = &[
    "Equatable",
    "Hashable",
    "Comparable",
    "ExpressibleByIntegerLiteral",
    "ExpressibleByFloatLiteral",
    "ExpressibleByStringLiteral",
    "ExpressibleByBooleanLiteral",
    "ExpressibleByNilLiteral",
    "ExpressibleByArrayLiteral",
];

pub fn builtin_type(name: &str) -> Option<Type> {
    let ty = match name {
        "Int" => Type::Int,
        "Double" => Type::Double,
        "Bool" => Type::Bool,
        "String" => Type::String,
        "Void" => Type::Void,
        "Any" => Type::Any,
        "AnyObject" => Type::AnyObject,
        _ if BUILTIN_PROTOCOLS.contains(&name) => Type::protocol(ProtocolRef::builtin(name)),
        _ => return None,
    };
    Some(ty)
}

/// Generic parameter depth of `decl`: the number of enclosing declarations
/// that introduce generic parameters.
fn generic_depth(module: &Module, decl: DeclId) -> u32 {
    let mut depth = 0;
    let mut scope = module.parent(decl);
    while let Some(current) = scope {
        if !module.decl(current).generic_params.is_empty() {
            depth += 1;
        }
        scope = module.parent(current);
    }
    depth
}

fn generic_param_types(module: &Module, decl: DeclId) -> Vec<Type> {
    let depth = generic_depth(module, decl);
    module
        .decl(decl)
        .generic_params
        .iter()
        .enumerate()
        .map(|(index, param)| Type::GenericParam {
            name: param.name.node.clone(),
            param: GenericParamType {
                depth,
                index: index as u32,
            },
        })
        .collect()
}

fn lookup_generic_param(module: &Module, context: Option<DeclId>, name: &str) -> Option<Type> {
    let mut scope = context;
    while let Some(current) = scope {
        let decl = module.decl(current);
        if let Some(index) = decl.generic_params.iter().position(|p| p.name.node == name) {
            return Some(Type::GenericParam {
                name: name.to_string(),
                param: GenericParamType {
                    depth: generic_depth(module, current),
                    index: index as u32,
                },
            });
        }
        scope = module.parent(current);
    }
    None
}

/// The type declared by a type declaration, generic parameters as
/// arguments.
pub fn declared_type(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId) -> Type {
    let module = &cx.module;
    let d = module.decl(decl);
    let kind = match d.kind {
        DeclKind::Class => NominalKind::Class,
        DeclKind::Struct => NominalKind::Struct,
        DeclKind::Enum => NominalKind::Enum,
        DeclKind::Protocol => {
            return Type::protocol(ProtocolRef::declared(decl, d.name.clone()));
        }
        DeclKind::TypeAlias { .. } => {
            return match request::interface_type(ev, cx, decl) {
                Type::Metatype(instance) => *instance,
                _ => Type::Error,
            };
        }
        _ => return Type::Error,
    };
    Type::Nominal(NominalType {
        decl,
        name: d.name.clone(),
        kind,
        args: generic_param_types(module, decl),
    })
}

/// Resolve `repr` in the scope of `context`. Names that do not resolve are
/// diagnosed and become `Type::Error`.
pub fn resolve_type(
    ev: &mut Ev,
    cx: &mut SemaContext,
    repr: &TypeRepr,
    context: Option<DeclId>,
) -> Type {
    match &repr.node {
        TypeReprKind::Ident(name) => resolve_ident(ev, cx, repr, name, context),
        TypeReprKind::Member { base, name } => {
            let base_ty = resolve_type(ev, cx, base, context);
            let owner = match &base_ty {
                Type::Error => return Type::Error,
                Type::Nominal(nominal) => Some(nominal.decl),
                Type::Existential(protos) if protos.len() == 1 => protos[0].decl,
                _ => None,
            };
            let member = owner.and_then(|owner| lookup::lookup_type_member(ev, cx, owner, name));
            match member {
                Some(member) => declared_type(ev, cx, member),
                None => {
                    cx.diags.emit(
                        repr.span.report_loc(),
                        DiagId::CouldNotFindTypeMember,
                        diag_args![&base_ty, name.as_str()],
                    );
                    Type::Error
                }
            }
        }
        TypeReprKind::Generic { base, args } => {
            let base_ty = resolve_type(ev, cx, base, context);
            let args: Vec<Type> = args
                .iter()
                .map(|arg| resolve_type(ev, cx, arg, context))
                .collect();
            match base_ty {
                Type::Nominal(mut nominal) => {
                    nominal.args = args;
                    Type::Nominal(nominal)
                }
                other => other,
            }
        }
        TypeReprKind::Optional(inner) => Type::optional(resolve_type(ev, cx, inner, context)),
        TypeReprKind::Function {
            params,
            result,
            escaping,
            ..
        } => {
            let params = params
                .iter()
                .map(|param| resolve_param(ev, cx, param, None, context))
                .collect();
            let result = resolve_type(ev, cx, result, context);
            Type::Function(FunctionType {
                params,
                result: Box::new(result),
                escaping: *escaping,
            })
        }
        TypeReprKind::Tuple(elems) => match elems.len() {
            0 => Type::Void,
            1 => resolve_type(ev, cx, &elems[0], context),
            _ => Type::Tuple(
                elems
                    .iter()
                    .map(|elem| resolve_type(ev, cx, elem, context))
                    .collect(),
            ),
        },
        TypeReprKind::Composition(members) => {
            let mut protos = Vec::new();
            for member in members {
                match resolve_type(ev, cx, member, context) {
                    Type::Existential(inner) => protos.extend(inner),
                    Type::Any => {}
                    Type::Error => return Type::Error,
                    Type::AnyObject => protos.push(ProtocolRef::builtin("AnyObject")),
                    other => {
                        cx.diags.emit(
                            member.span.report_loc(),
                            DiagId::InheritanceFromNonProtocol,
                            diag_args![&other],
                        );
                        return Type::Error;
                    }
                }
            }
            Type::Existential(protos)
        }
        TypeReprKind::Metatype(inner) => Type::metatype(resolve_type(ev, cx, inner, context)),
        TypeReprKind::InOut(inner) => Type::inout(resolve_type(ev, cx, inner, context)),
    }
}

/// Resolve a parameter type, lifting `@autoclosure` onto the parameter.
pub fn resolve_param(
    ev: &mut Ev,
    cx: &mut SemaContext,
    repr: &TypeRepr,
    label: Option<String>,
    context: Option<DeclId>,
) -> FunctionParam {
    let autoclosure = matches!(
        repr.node,
        TypeReprKind::Function {
            autoclosure: true,
            ..
        }
    );
    FunctionParam {
        label,
        ty: resolve_type(ev, cx, repr, context),
        autoclosure,
        has_default: false,
    }
}

fn resolve_ident(
    ev: &mut Ev,
    cx: &mut SemaContext,
    repr: &TypeRepr,
    name: &str,
    context: Option<DeclId>,
) -> Type {
    if let Some(param) = lookup_generic_param(&cx.module, context, name) {
        return param;
    }
    if name == "Self"
        && let Some(nominal) = self_nominal(&cx.module, context)
    {
        return declared_type(ev, cx, nominal);
    }
    let found = lookup::lookup_type_decls(&cx.module, context, name);
    if let Some(decl) = found.first() {
        return declared_type(ev, cx, *decl);
    }
    if let Some(builtin) = builtin_type(name) {
        return builtin;
    }
    cx.diags.emit(
        repr.span.report_loc(),
        DiagId::UseOfUndeclaredType,
        diag_args![name],
    );
    Type::Error
}

fn self_nominal(module: &Module, context: Option<DeclId>) -> Option<DeclId> {
    let context = context?;
    if module.decl(context).is_nominal() {
        Some(context)
    } else {
        module.enclosing_nominal(context)
    }
}
