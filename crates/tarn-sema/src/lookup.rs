//! Name lookup, conformance and subclassing queries.

use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use tarn_ast::{DeclId, DeclKind, Module};
use tarn_types::{NominalKind, ProtocolRef, Type};

use crate::context::SemaContext;
use crate::request::{self, Ev};

/// Type declarations named `name`, searching `context` and its parents, then
/// file scope. Pure: never evaluates requests.
pub fn lookup_type_decls(
    module: &Module,
    context: Option<DeclId>,
    name: &str,
) -> SmallVec<[DeclId; 2]> {
    let mut scope = context;
    while let Some(current) = scope {
        let found: SmallVec<[DeclId; 2]> = module
            .members_named(current, name)
            .into_iter()
            .filter(|id| module.decl(*id).is_type_decl())
            .collect();
        if !found.is_empty() {
            return found;
        }
        scope = module.parent(current);
    }
    module
        .lookup_top_level(name)
        .into_iter()
        .filter(|id| module.decl(*id).is_type_decl())
        .collect()
}

/// `decl` followed by its superclasses, nearest first. Stops at the first
/// repeated class so cyclic hierarchies terminate.
pub fn superclass_chain(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId) -> Vec<DeclId> {
    let mut chain = vec![decl];
    let mut seen = FxHashSet::default();
    seen.insert(decl);
    let mut current = decl;
    while let Some(sup) = request::superclass_decl(ev, cx, current) {
        if !seen.insert(sup) {
            break;
        }
        chain.push(sup);
        current = sup;
    }
    chain
}

pub fn is_subclass_of(ev: &mut Ev, cx: &mut SemaContext, sub: DeclId, sup: DeclId) -> bool {
    superclass_chain(ev, cx, sub).contains(&sup)
}

/// Member type named `name` in `owner` or its superclasses.
pub fn lookup_type_member(
    ev: &mut Ev,
    cx: &mut SemaContext,
    owner: DeclId,
    name: &str,
) -> Option<DeclId> {
    let direct = cx
        .module
        .members_named(owner, name)
        .into_iter()
        .find(|id| cx.module.decl(*id).is_type_decl());
    if direct.is_some() {
        return direct;
    }
    if !cx.module.decl(owner).is_class() {
        return None;
    }
    for sup in superclass_chain(ev, cx, owner).into_iter().skip(1) {
        let found = cx
            .module
            .members_named(sup, name)
            .into_iter()
            .find(|id| cx.module.decl(*id).is_type_decl());
        if found.is_some() {
            return found;
        }
    }
    None
}

fn is_value_decl(module: &Module, id: DeclId) -> bool {
    matches!(
        module.decl(id).kind,
        DeclKind::Var { .. }
            | DeclKind::Func { .. }
            | DeclKind::Init { .. }
            | DeclKind::Subscript { .. }
            | DeclKind::EnumCase { .. }
    )
}

/// Value members named `name` on `owner`: its own members, then those of
/// its superclasses, then requirements of the protocols it conforms to.
/// Members hidden by an override in a nearer class are skipped.
pub fn lookup_value_members(
    ev: &mut Ev,
    cx: &mut SemaContext,
    owner: DeclId,
    name: &str,
) -> Vec<DeclId> {
    let mut results: Vec<DeclId> = Vec::new();
    let mut hidden: FxHashSet<DeclId> = FxHashSet::default();

    let chain = if cx.module.decl(owner).is_class() {
        superclass_chain(ev, cx, owner)
    } else {
        vec![owner]
    };
    for scope in chain {
        for member in cx.module.members_named(scope, name) {
            if !is_value_decl(&cx.module, member) || hidden.contains(&member) {
                continue;
            }
            for overridden in request::overridden_decls(ev, cx, member) {
                hidden.insert(overridden);
            }
            results.push(member);
        }
    }

    if results.is_empty() {
        for proto in all_protocols(ev, cx, owner) {
            if let Some(proto_decl) = proto.decl {
                for member in cx.module.members_named(proto_decl, name) {
                    if is_value_decl(&cx.module, member) && !results.contains(&member) {
                        results.push(member);
                    }
                }
            }
        }
    }
    results
}

/// Unqualified value lookup: members of each enclosing scope (including
/// inherited members of enclosing types), then file scope.
pub fn lookup_unqualified_values(
    ev: &mut Ev,
    cx: &mut SemaContext,
    context: Option<DeclId>,
    name: &str,
) -> Vec<DeclId> {
    let mut scope = context;
    while let Some(current) = scope {
        let found = if cx.module.decl(current).is_nominal() {
            lookup_value_members(ev, cx, current, name)
        } else {
            cx.module
                .members_named(current, name)
                .into_iter()
                .filter(|id| is_value_decl(&cx.module, *id))
                .collect()
        };
        if !found.is_empty() {
            return found;
        }
        scope = cx.module.parent(current);
    }
    cx.module
        .lookup_top_level(name)
        .into_iter()
        .filter(|id| is_value_decl(&cx.module, *id))
        .collect()
}

/// Every protocol `decl` conforms to: declared conformances, protocols they
/// refine, and conformances inherited from superclasses.
pub fn all_protocols(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId) -> Vec<ProtocolRef> {
    let mut result: Vec<ProtocolRef> = Vec::new();
    let mut worklist: Vec<DeclId> = if cx.module.decl(decl).is_class() {
        superclass_chain(ev, cx, decl)
    } else {
        vec![decl]
    };
    let mut visited: FxHashSet<DeclId> = FxHashSet::default();
    while let Some(current) = worklist.pop() {
        if !visited.insert(current) {
            continue;
        }
        let summary = request::inheritance_clause(ev, cx, current);
        for entry in summary.protocols {
            if !result.contains(&entry.proto) {
                if let Some(proto_decl) = entry.proto.decl {
                    worklist.push(proto_decl);
                }
                result.push(entry.proto);
            }
        }
    }
    result
}

fn protocol_matches(candidate: &ProtocolRef, proto: &ProtocolRef) -> bool {
    match (candidate.decl, proto.decl) {
        (Some(a), Some(b)) => a == b,
        (None, None) => candidate.name == proto.name,
        _ => false,
    }
}

/// Whether `ty` conforms to `proto`. Unresolved type variables are not
/// known to conform.
pub fn conforms_to(ev: &mut Ev, cx: &mut SemaContext, ty: &Type, proto: &ProtocolRef) -> bool {
    if proto.decl.is_none()
        && let Some(answer) = ty.builtin_conforms_to(&proto.name)
    {
        return answer;
    }
    match ty {
        Type::Error => true,
        Type::Nominal(nominal) => {
            let decl = nominal.decl;
            // Value types get Equatable/Hashable only when they ask for them.
            all_protocols(ev, cx, decl)
                .iter()
                .any(|candidate| protocol_matches(candidate, proto))
        }
        Type::Existential(protos) => protos.iter().any(|p| {
            if protocol_matches(p, proto) {
                return true;
            }
            match p.decl {
                Some(decl) => all_protocols(ev, cx, decl)
                    .iter()
                    .any(|candidate| protocol_matches(candidate, proto)),
                None => false,
            }
        }),
        _ => false,
    }
}

/// Whether a value of class type `sub` converts to class type `sup`.
pub fn is_class_upcast(ev: &mut Ev, cx: &mut SemaContext, sub: &Type, sup: &Type) -> bool {
    match (sub, sup) {
        (Type::Nominal(a), Type::Nominal(b))
            if a.kind == NominalKind::Class && b.kind == NominalKind::Class =>
        {
            a.decl != b.decl && is_subclass_of(ev, cx, a.decl, b.decl)
        }
        _ => false,
    }
}
