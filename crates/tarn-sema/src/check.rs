//! Declaration checking passes over a whole module.

use tarn_ast::{DeclId, DeclKind};

use crate::context::TypeChecker;
use crate::request::{self, Ev};
use crate::state::InheritanceWalk;
use crate::{SemaContext, circularity, interface, overrides, property_wrappers, raw_values, redecl};

/// Which declaration passes [`check_module_with`] runs.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub overrides: bool,
    pub property_wrappers: bool,
    pub raw_values: bool,
    pub redeclarations: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            overrides: true,
            property_wrappers: true,
            raw_values: true,
            redeclarations: true,
        }
    }
}

/// Check every declaration of the module with all passes enabled.
pub fn check_module(tc: &mut TypeChecker) {
    check_module_with(tc, &CheckOptions::default());
}

pub fn check_module_with(tc: &mut TypeChecker, options: &CheckOptions) {
    let TypeChecker { evaluator, cx } = tc;
    for decl in cx.module.decls_in_source_order() {
        check_decl(evaluator, cx, decl, options);
    }

    if options.redeclarations {
        let top_level = cx.module.top_level().to_vec();
        redecl::check_redeclarations(evaluator, cx, &top_level);
        let scopes: Vec<DeclId> = cx.module.decl_ids().collect();
        for scope in scopes {
            let members = cx.module.members(scope).to_vec();
            if !members.is_empty() {
                redecl::check_redeclarations(evaluator, cx, &members);
            }
        }
    }
}

fn check_decl(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId, options: &CheckOptions) {
    let walk = match cx.module.decl(decl).kind {
        DeclKind::Class => Some(InheritanceWalk::Class),
        DeclKind::Protocol => Some(InheritanceWalk::Protocol),
        DeclKind::Enum => Some(InheritanceWalk::Enum),
        _ => None,
    };
    if cx.module.decl(decl).is_nominal() {
        let _ = request::inheritance_clause(ev, cx, decl);
    }
    if let Some(walk) = walk {
        circularity::check_circularity(ev, cx, decl, walk);
    }
    if options.raw_values && walk == Some(InheritanceWalk::Enum) && !cx.states.is_invalid(decl) {
        raw_values::check_enum_raw_values(ev, cx, decl);
    }
    if options.property_wrappers {
        property_wrappers::check_property_wrappers(ev, cx, decl);
    }
    if options.overrides {
        overrides::check_overrides(ev, cx, decl);
    }
    interface::validate_decl(ev, cx, decl);
}
