//! Unified symbol references and local type mangling.
//!
//! The scheme is stable within tarn but makes no attempt at ABI
//! compatibility: `s:` followed by length-prefixed identifiers for the
//! module, each enclosing declaration and the declaration itself, each
//! identifier followed by a kind marker.

use std::fmt::Write as _;

use tarn_ast::{Decl, DeclId, DeclKind, Module};

use crate::context::SemaContext;
use crate::request::{self, Ev};

fn kind_suffix(decl: &Decl) -> &'static str {
    match decl.kind {
        DeclKind::Class => "C",
        DeclKind::Struct => "V",
        DeclKind::Enum => "O",
        DeclKind::Protocol => "P",
        DeclKind::TypeAlias { .. } => "a",
        DeclKind::EnumCase { .. } => "e",
        DeclKind::Var { .. } => "v",
        DeclKind::Func { .. } => "F",
        DeclKind::Init { .. } => "fc",
        DeclKind::Subscript { .. } => "i",
        DeclKind::TopLevelCode { .. } => "",
    }
}

fn push_identifier(out: &mut String, text: &str) {
    let _ = write!(out, "{}{text}", text.len());
}

fn push_entity(out: &mut String, decl: &Decl) {
    let name = if decl.is_func_like() {
        decl.full_name()
    } else {
        decl.name.clone()
    };
    push_identifier(out, &name);
    if decl.attrs.is_static {
        out.push('Z');
    }
    out.push_str(kind_suffix(decl));
}

/// Enclosing declarations of `decl`, outermost first.
fn ancestors(module: &Module, decl: DeclId) -> Vec<DeclId> {
    let mut chain = Vec::new();
    let mut current = module.parent(decl);
    while let Some(parent) = current {
        chain.push(parent);
        current = module.parent(parent);
    }
    chain.reverse();
    chain
}

fn context_prefix(module: &Module, decl: DeclId) -> String {
    let mut out = String::new();
    push_identifier(&mut out, module.name());
    for ancestor in ancestors(module, decl) {
        push_entity(&mut out, module.decl(ancestor));
    }
    out
}

pub fn compute_usr(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId) -> String {
    let d = cx.module.decl(decl);
    if matches!(d.kind, DeclKind::TopLevelCode { .. }) {
        return String::new();
    }
    if d.is_type_decl() && cx.module.is_local(decl) {
        let mangled = request::mangle_local_type(ev, cx, decl);
        return format!("s:{}", mangled.trim_start_matches("$s"));
    }
    let mut out = String::from("s:");
    out.push_str(&context_prefix(&cx.module, decl));
    push_entity(&mut out, d);
    out
}

/// Mangled name of a type declared inside a function body. Same-named local
/// types in one function are told apart by a discriminator in declaration
/// order.
pub fn compute_local_mangling(cx: &mut SemaContext, decl: DeclId) -> String {
    let module = &cx.module;
    let d = module.decl(decl);
    let Some(function) = module.enclosing_function(decl) else {
        return String::new();
    };
    let discriminator = local_types_named(module, function, &d.name)
        .iter()
        .position(|id| *id == decl)
        .unwrap_or(0);

    let mut out = String::from("$s");
    out.push_str(&context_prefix(module, decl));
    push_identifier(&mut out, &d.name);
    let _ = write!(out, "L{discriminator}_");
    out.push_str(kind_suffix(d));
    out
}

/// Type declarations named `name` anywhere under `function`, in source order.
fn local_types_named(module: &Module, function: DeclId, name: &str) -> Vec<DeclId> {
    let mut found = Vec::new();
    let mut pending = vec![function];
    while let Some(scope) = pending.pop() {
        for &member in module.members(scope) {
            let decl = module.decl(member);
            if decl.is_func_like() {
                continue;
            }
            if decl.name == name && decl.is_type_decl() {
                found.push(member);
            }
            pending.push(member);
        }
    }
    found.sort_by_key(|id| (module.decl(*id).name_span.start, *id));
    found
}
