//! Cycle detection over the class, protocol and enum inheritance graphs.
//!
//! One depth-first walk serves all three graphs; only the neighbor function
//! differs. Each node moves `Unchecked -> Checking -> Checked` in
//! [`DeclStates`](crate::state::DeclStates), so a cycle is reported once no
//! matter which of its members the walk starts from.

use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use tarn_ast::{DeclId, DeclKind};
use tarn_diag::{DiagId, diag_args};

use crate::context::SemaContext;
use crate::inheritance;
use crate::request::{self, Ev};
use crate::state::{CircularityState, InheritanceWalk};

/// Walk the inheritance graph selected by `walk` from `decl`. Returns true
/// if a cycle was found and diagnosed.
pub fn check_circularity(
    ev: &mut Ev,
    cx: &mut SemaContext,
    decl: DeclId,
    walk: InheritanceWalk,
) -> bool {
    let mut path = Vec::new();
    visit(ev, cx, decl, walk, &mut path)
}

fn visit(
    ev: &mut Ev,
    cx: &mut SemaContext,
    decl: DeclId,
    walk: InheritanceWalk,
    path: &mut Vec<DeclId>,
) -> bool {
    match cx.states.circularity(decl, walk) {
        CircularityState::Checked => return false,
        CircularityState::Checking => {
            if let Some(start) = path.iter().position(|d| *d == decl) {
                let cycle = path[start..].to_vec();
                diagnose(cx, walk, &cycle);
                return true;
            }
            return false;
        }
        CircularityState::Unchecked => {}
    }

    cx.states
        .advance_circularity(decl, walk, CircularityState::Checking);
    path.push(decl);
    let mut found = false;
    for next in neighbors(ev, cx, decl, walk) {
        if visit(ev, cx, next, walk, path) {
            found = true;
            break;
        }
    }
    path.pop();
    cx.states
        .advance_circularity(decl, walk, CircularityState::Checked);
    found
}

fn neighbors(
    ev: &mut Ev,
    cx: &mut SemaContext,
    decl: DeclId,
    walk: InheritanceWalk,
) -> SmallVec<[DeclId; 2]> {
    let mut out = SmallVec::new();
    match walk {
        InheritanceWalk::Class => {
            if cx.module.decl(decl).is_class()
                && let Some(sup) = request::superclass_decl(ev, cx, decl)
            {
                out.push(sup);
            }
        }
        InheritanceWalk::Protocol => {
            if !cx.module.decl(decl).is_protocol() {
                return out;
            }
            let count = cx.module.decl(decl).inherited.len();
            let mut visited = FxHashSet::default();
            let mut pending: Vec<DeclId> = Vec::new();
            for index in 0..count {
                pending.extend(request::inherited_decls_referenced(ev, cx, decl, index));
            }
            while let Some(found) = pending.pop() {
                if !visited.insert(found) {
                    continue;
                }
                let found_decl = cx.module.decl(found);
                match &found_decl.kind {
                    DeclKind::Protocol => {
                        if !out.contains(&found) {
                            out.push(found);
                        }
                    }
                    DeclKind::TypeAlias { underlying } => {
                        pending.extend(inheritance::referenced_in(
                            &cx.module,
                            found_decl.parent,
                            underlying,
                        ));
                    }
                    _ => {}
                }
            }
            // Walk in clause order.
            out.reverse();
        }
        InheritanceWalk::Enum => {
            if cx.module.decl(decl).is_enum()
                && let Some(raw) = request::enum_raw_type(ev, cx, decl)
                && let Some(raw_decl) = raw.nominal_decl()
                && cx.module.decl(raw_decl).is_enum()
            {
                out.push(raw_decl);
            }
        }
    }
    out
}

fn diagnose(cx: &mut SemaContext, walk: InheritanceWalk, cycle: &[DeclId]) {
    let start = cycle[0];
    let start_decl = cx.module.decl(start);
    let loc = start_decl.name_span.report_loc();
    let (id, description) = match walk {
        InheritanceWalk::Class => (DiagId::CircularClassInheritance, cycle_path(cx, cycle)),
        InheritanceWalk::Enum => (DiagId::CircularEnumInheritance, cycle_path(cx, cycle)),
        InheritanceWalk::Protocol => (
            DiagId::CircularProtocolDef,
            format!("`{}`", start_decl.name),
        ),
    };
    cx.diags.emit(loc, id, diag_args![description]);
    for &other in &cycle[1..] {
        let decl = cx.module.decl(other);
        let loc = decl.name_span.report_loc();
        let args = diag_args![decl.kind_name(), decl.name.as_str()];
        cx.diags.emit(loc, DiagId::KindDeclnameDeclaredHere, args);
    }
    cx.states.mark_invalid(start);
}

/// `A -> B -> A`
fn cycle_path(cx: &SemaContext, cycle: &[DeclId]) -> String {
    let mut names: Vec<&str> = cycle
        .iter()
        .map(|id| cx.module.decl(*id).name.as_str())
        .collect();
    names.push(names[0]);
    names.join(" -> ")
}
