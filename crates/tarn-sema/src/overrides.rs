//! Override resolution and checking.

use smallvec::SmallVec;
use tarn_ast::{Decl, DeclId, DeclKind};
use tarn_diag::{DiagId, diag_args};

use crate::context::SemaContext;
use crate::lookup;
use crate::request::{self, Ev};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemberCategory {
    Property,
    Method,
    Initializer,
    Subscript,
}

fn category(decl: &Decl) -> Option<MemberCategory> {
    match decl.kind {
        DeclKind::Var { .. } => Some(MemberCategory::Property),
        DeclKind::Func { .. } => Some(MemberCategory::Method),
        DeclKind::Init { .. } => Some(MemberCategory::Initializer),
        DeclKind::Subscript { .. } => Some(MemberCategory::Subscript),
        _ => None,
    }
}

fn labels(decl: &Decl) -> Option<String> {
    decl.signature().map(|signature| signature.label_list())
}

/// Whether `candidate` has the shape `decl` would need to override it.
fn shape_matches(decl: &Decl, candidate: &Decl) -> bool {
    category(decl) == category(candidate)
        && decl.name == candidate.name
        && decl.attrs.is_static == candidate.attrs.is_static
        && labels(decl) == labels(candidate)
}

fn types_match(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId, candidate: DeclId) -> bool {
    let ours = request::interface_type(ev, cx, decl);
    let theirs = request::interface_type(ev, cx, candidate);
    ours.has_error() || theirs.has_error() || ours == theirs
}

fn matching_members(
    ev: &mut Ev,
    cx: &mut SemaContext,
    decl: DeclId,
    scope: DeclId,
) -> SmallVec<[DeclId; 1]> {
    let name = cx.module.decl(decl).name.clone();
    let mut found = SmallVec::new();
    for candidate in cx.module.members_named(scope, &name) {
        if !shape_matches(cx.module.decl(decl), cx.module.decl(candidate)) {
            continue;
        }
        if types_match(ev, cx, decl, candidate) {
            found.push(candidate);
        }
    }
    found
}

/// Declarations `decl` overrides: for a class member, the matches in the
/// nearest superclass declaring any; for a protocol requirement, one match
/// per inherited protocol.
pub fn compute_overridden_decls(
    ev: &mut Ev,
    cx: &mut SemaContext,
    decl: DeclId,
) -> SmallVec<[DeclId; 1]> {
    let d = cx.module.decl(decl);
    let Some(parent) = d.parent else {
        return SmallVec::new();
    };
    if category(d).is_none() {
        return SmallVec::new();
    }

    if cx.module.decl(parent).is_class() {
        for sup in lookup::superclass_chain(ev, cx, parent).into_iter().skip(1) {
            let found = matching_members(ev, cx, decl, sup);
            if !found.is_empty() {
                return found;
            }
        }
        return SmallVec::new();
    }

    let mut result = SmallVec::new();
    if cx.module.decl(parent).is_protocol() {
        let protocols = request::inheritance_clause(ev, cx, parent).protocols;
        for entry in protocols {
            let Some(proto) = entry.proto.decl else {
                continue;
            };
            if let Some(first) = matching_members(ev, cx, decl, proto).first()
                && !result.contains(first)
            {
                result.push(*first);
            }
        }
    }
    result
}

pub fn compute_is_final(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId) -> bool {
    let d = cx.module.decl(decl);
    if d.attrs.is_final {
        return true;
    }
    // Nested types do not inherit finality from their parent.
    let parent = d.parent.filter(|_| category(d).is_some());
    if d.attrs.is_static && parent.is_some() {
        return true;
    }
    match parent {
        Some(parent) if cx.module.decl(parent).is_class() => request::is_final(ev, cx, parent),
        _ => false,
    }
}

/// Diagnose `override` misuse on a class member.
pub fn check_overrides(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId) {
    let d = cx.module.decl(decl);
    let Some(member_kind) = category(d) else {
        return;
    };
    match d.parent {
        Some(parent) if cx.module.decl(parent).is_class() => {}
        _ => return,
    }
    let has_override = d.attrs.is_override;
    let loc = d.name_span.report_loc();
    let insert_at = d.attrs.modifiers_start.unwrap_or(d.span).loc();
    let full_name = d.full_name();

    let overridden = request::overridden_decls(ev, cx, decl);
    if overridden.is_empty() {
        if has_override {
            let id = match member_kind {
                MemberCategory::Property => DiagId::PropertyDoesNotOverride,
                _ => DiagId::MethodDoesNotOverride,
            };
            cx.diags.emit(loc, id, diag_args![]);
            cx.states.mark_invalid(decl);
        }
        return;
    }

    if !has_override {
        cx.diags
            .emit(loc, DiagId::MissingOverride, diag_args![])
            .fix_it_insert(insert_at, "override ");
    }

    if overridden.len() > 1 {
        cx.diags
            .emit(loc, DiagId::MultipleOverride, diag_args![full_name.as_str()]);
        for &other in &overridden {
            let note_loc = cx.module.decl(other).name_span.report_loc();
            cx.diags.emit(note_loc, DiagId::OverriddenHere, diag_args![]);
        }
        return;
    }

    let base = overridden[0];
    if request::is_final(ev, cx, base) {
        cx.diags
            .emit(loc, DiagId::OverrideFinal, diag_args![full_name.as_str()]);
        let note_loc = cx.module.decl(base).name_span.report_loc();
        cx.diags.emit(note_loc, DiagId::OverriddenHere, diag_args![]);
    }
}
