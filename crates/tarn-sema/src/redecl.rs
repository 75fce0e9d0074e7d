//! Redeclaration checking among sibling declarations.

use tarn_ast::{DeclId, DeclKind};
use tarn_diag::{DiagId, diag_args};

use crate::context::SemaContext;
use crate::request::{self, Ev};

/// Whether `earlier` and `later` declare the same entity. Functions overload
/// on argument labels, parameter types and result type; everything else on
/// name alone.
fn conflicts(ev: &mut Ev, cx: &mut SemaContext, earlier: DeclId, later: DeclId) -> bool {
    let a = cx.module.decl(earlier);
    let b = cx.module.decl(later);
    if a.name != b.name {
        return false;
    }
    match (a.signature(), b.signature()) {
        (None, None) => true,
        (Some(sig_a), Some(sig_b)) => {
            if std::mem::discriminant(&a.kind) != std::mem::discriminant(&b.kind)
                || a.attrs.is_static != b.attrs.is_static
                || sig_a.label_list() != sig_b.label_list()
            {
                return false;
            }
            let ty_a = request::interface_type(ev, cx, earlier);
            let ty_b = request::interface_type(ev, cx, later);
            if ty_a.has_error() || ty_b.has_error() {
                return false;
            }
            match (ty_a.as_function(), ty_b.as_function()) {
                (Some(fa), Some(fb)) => {
                    fa.result == fb.result
                        && fa.params.len() == fb.params.len()
                        && fa.params.iter().zip(&fb.params).all(|(x, y)| x.ty == y.ty)
                }
                _ => false,
            }
        }
        _ => false,
    }
}

/// Diagnose conflicting declarations among `siblings`. Each conflicting
/// declaration is reported once, against the first earlier declaration it
/// conflicts with, and marked invalid.
pub fn check_redeclarations(ev: &mut Ev, cx: &mut SemaContext, siblings: &[DeclId]) {
    let mut ordered: Vec<DeclId> = siblings
        .iter()
        .copied()
        .filter(|id| !matches!(cx.module.decl(*id).kind, DeclKind::TopLevelCode { .. }))
        .collect();
    ordered.sort_by_key(|id| (cx.module.decl(*id).name_span.start, *id));

    for (i, &later) in ordered.iter().enumerate() {
        if cx.states.is_invalid(later) {
            continue;
        }
        for &earlier in &ordered[..i] {
            if cx.states.is_invalid(earlier) || !conflicts(ev, cx, earlier, later) {
                continue;
            }
            let later_decl = cx.module.decl(later);
            let earlier_decl = cx.module.decl(earlier);
            cx.diags.emit(
                later_decl.name_span.report_loc(),
                DiagId::InvalidRedecl,
                diag_args![later_decl.full_name()],
            );
            cx.diags.emit(
                earlier_decl.name_span.report_loc(),
                DiagId::InvalidRedeclPrev,
                diag_args![earlier_decl.full_name()],
            );
            cx.states.mark_invalid(later);
            break;
        }
    }
}
