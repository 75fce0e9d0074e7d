//! Repairs for failed type relations and member lookups.
//!
//! Each routine runs only in fix mode, after a match failed and its scope
//! was rolled back. It picks the most specific fix that explains the
//! failure, records it, and leaves the constraint system consistent,
//! binding anything left undecided to `Type::Error`.

use tarn_ast::{DeclKind, ExprKind};
use tarn_sema::request;
use tarn_types::{NominalKind, Type};

use crate::constraint::OverloadChoice;
use crate::cs::ConstraintSystem;
use crate::fix::FixKind;
use crate::locator::{ConstraintLocator, ContextualPurpose, PathElt};
use crate::members;
use crate::solver::{MatchKind, SolveResult, Solver};

impl Solver<'_> {
    /// Try a relation in a scope, keeping it only when it holds.
    fn try_relation(
        &mut self,
        cs: &mut ConstraintSystem,
        first: &Type,
        second: &Type,
        kind: MatchKind,
        loc: &ConstraintLocator,
    ) -> bool {
        let scope = cs.begin_scope();
        let holds = self.match_types(cs, first, second, kind, loc) != SolveResult::Error;
        cs.end_scope(scope, holds);
        holds
    }

    /// Relate two types after a fix, absorbing a second failure.
    fn relate_or_absorb(
        &mut self,
        cs: &mut ConstraintSystem,
        first: &Type,
        second: &Type,
        kind: MatchKind,
        loc: &ConstraintLocator,
    ) -> SolveResult {
        if !self.try_relation(cs, first, second, kind, loc) {
            self.absorb(cs, first);
            self.absorb(cs, second);
        }
        SolveResult::Solved
    }

    pub(crate) fn repair_relation(
        &mut self,
        cs: &mut ConstraintSystem,
        first: &Type,
        second: &Type,
        kind: MatchKind,
        loc: &ConstraintLocator,
    ) -> SolveResult {
        let a = cs.resolve(first);
        let b = cs.resolve(second);
        match kind {
            MatchKind::Bind | MatchKind::Equal => {
                if kind == MatchKind::Bind && a.is_lvalue() != b.is_lvalue() && !a.is_var() && !b.is_var() {
                    self.record_fix(cs, FixKind::TreatRValueAsLValue, loc);
                    return self.relate_or_absorb(cs, a.rvalue(), b.rvalue(), MatchKind::Equal, loc);
                }
                self.record_fix(
                    cs,
                    FixKind::ContextualMismatch {
                        from: a.rvalue().clone(),
                        to: b.rvalue().clone(),
                    },
                    loc,
                );
                self.absorb(cs, &a);
                self.absorb(cs, &b);
                SolveResult::Solved
            }
            MatchKind::ArgumentConversion if matches!(b, Type::InOut(_)) && !matches!(a, Type::InOut(_)) => {
                let Type::InOut(object) = &b else {
                    return SolveResult::Error;
                };
                if a.is_lvalue() {
                    self.record_fix(cs, FixKind::AddressOf { ty: a.rvalue().clone() }, loc);
                } else {
                    self.record_fix(cs, FixKind::TreatRValueAsLValue, loc);
                }
                self.relate_or_absorb(cs, a.rvalue(), object, MatchKind::Equal, loc)
            }
            MatchKind::ArgumentConversion if matches!(a, Type::InOut(_)) && !matches!(b, Type::InOut(_)) => {
                let Type::InOut(object) = &a else {
                    return SolveResult::Error;
                };
                self.record_fix(cs, FixKind::RemoveAddressOf, loc);
                self.relate_or_absorb(cs, object, &b, MatchKind::Conversion, loc)
            }
            MatchKind::Conversion | MatchKind::ArgumentConversion => {
                let from = a.rvalue().clone();
                let to = b.rvalue().clone();
                let fix = self.conversion_fix(cs, &from, &to, loc);
                if let Some(fix) = fix {
                    self.record_fix(cs, fix, loc);
                }
                self.absorb(cs, &from);
                self.absorb(cs, &to);
                SolveResult::Solved
            }
        }
    }

    /// The fix for a failed conversion from `from` to `to`. Fixes that
    /// make the conversion hold keep their bindings; `None` means a
    /// structural fix already handled everything.
    fn conversion_fix(
        &mut self,
        cs: &mut ConstraintSystem,
        from: &Type,
        to: &Type,
        loc: &ConstraintLocator,
    ) -> Option<FixKind> {
        let conv = MatchKind::Conversion;

        if from.is_optional() && !to.is_optional() {
            let unwrapped = from.lookthrough_all_optionals().clone();
            if self.try_relation(cs, &unwrapped, to, conv, loc) {
                return Some(FixKind::ForceOptional {
                    base: from.clone(),
                    unwrapped: cs.resolve(to),
                });
            }
        }

        if let Type::Function(f) = from
            && f.params.is_empty()
            && !to.is_function()
            && self.try_relation(cs, &f.result, to, conv, loc)
        {
            return Some(if loc.contains(|elt| *elt == PathElt::AutoclosureResult) {
                FixKind::AutoClosureForwarding
            } else {
                FixKind::InsertCall
            });
        }

        if let (Type::Function(f), Type::Function(g)) = (from, to) {
            if !f.escaping && g.escaping {
                let mut escaping = f.clone();
                escaping.escaping = true;
                if self.try_relation(cs, &Type::Function(escaping), to, conv, loc) {
                    return Some(FixKind::ExplicitlyEscaping { to: to.clone() });
                }
            }
            if let [param] = g.params.as_slice()
                && let Type::Tuple(elems) = cs.resolve(&param.ty)
                && f.params.len() == elems.len()
                && f.params.len() > 1
                && self.anchor_is_closure(loc)
            {
                self.record_fix(
                    cs,
                    FixKind::AllowClosureParameterDestructuring { contextual: g.clone() },
                    loc,
                );
                for (p, elem) in f.params.iter().zip(elems.iter()) {
                    self.relate_or_absorb(cs, elem, &p.ty, conv, loc);
                }
                self.relate_or_absorb(cs, &f.result, &g.result, conv, loc);
                return None;
            }
        }

        if let (Type::Nominal(n), Type::Nominal(m)) = (from, to)
            && n.decl == m.decl
            && n.args.len() == m.args.len()
        {
            let mismatches: Vec<usize> = n
                .args
                .iter()
                .zip(m.args.iter())
                .enumerate()
                .filter(|(_, (x, y))| x != y && !x.has_type_vars() && !y.has_type_vars())
                .map(|(index, _)| index)
                .collect();
            if !mismatches.is_empty() {
                return Some(FixKind::GenericArgumentsMismatch {
                    actual: from.clone(),
                    required: to.clone(),
                    mismatches,
                });
            }
        }

        if self.is_downcast(from, to) {
            let coercion = loc.last() == Some(&PathElt::ContextualType(ContextualPurpose::Coercion));
            return Some(if coercion {
                FixKind::CoerceToCheckedCast {
                    from: from.clone(),
                    to: to.clone(),
                }
            } else {
                FixKind::ForceDowncast {
                    from: from.clone(),
                    to: to.clone(),
                }
            });
        }

        let key_path_loc = loc.contains(|elt| matches!(elt, PathElt::KeyPathRoot | PathElt::KeyPathValue));
        if key_path_loc || matches!(from, Type::KeyPath { .. }) || matches!(to, Type::KeyPath { .. }) {
            return Some(FixKind::KeyPathContextualMismatch {
                from: from.clone(),
                to: to.clone(),
            });
        }
        if matches!(loc.last_source_elt(), Some(PathElt::ArrayElement(_))) {
            return Some(FixKind::CollectionElementContextualMismatch {
                from: from.clone(),
                to: to.clone(),
            });
        }
        if to.is_existential() || *to == Type::AnyObject {
            return Some(FixKind::AddConformance {
                ty: from.clone(),
                protocol: to.clone(),
                contextual: true,
            });
        }
        if *to == Type::Void && loc.last_source_elt() == Some(&PathElt::ContextualType(ContextualPurpose::Return)) {
            return Some(FixKind::RemoveReturn);
        }
        Some(FixKind::ContextualMismatch {
            from: from.clone(),
            to: to.clone(),
        })
    }

    fn anchor_is_closure(&self, loc: &ConstraintLocator) -> bool {
        loc.resolve_anchor(&self.cx.module)
            .is_some_and(|e| matches!(self.cx.module.expr(e).node, ExprKind::Closure { .. }))
    }

    /// Whether `to` is only reachable from `from` through a checked cast.
    fn is_downcast(&mut self, from: &Type, to: &Type) -> bool {
        if to.has_type_vars() || to.is_existential() || matches!(to, Type::Any | Type::AnyObject | Type::Error) {
            return false;
        }
        match from {
            Type::Any | Type::AnyObject => true,
            Type::Existential(protos) => protos.iter().all(|proto| self.conforms(to, proto)),
            Type::Nominal(n) if n.kind == NominalKind::Class => {
                tarn_sema::lookup::is_class_upcast(self.ev, self.cx, to, from)
            }
            _ => false,
        }
    }

    /// A member `name` was not found on `base`.
    pub(crate) fn repair_missing_member(
        &mut self,
        cs: &mut ConstraintSystem,
        base: &Type,
        member: &Type,
        name: &str,
        loc: &ConstraintLocator,
    ) -> SolveResult {
        if !cs.attempt_fixes {
            return SolveResult::Error;
        }
        if let Some((fix, alternative)) = self.property_wrapper_fix(cs, base, name, loc) {
            self.record_fix(cs, fix, loc);
            let choices = members::lookup_members(self.ev, self.cx, &alternative, name, false);
            if let Some(choice) = choices.into_iter().next() {
                let ty = members::type_of_reference(self.ev, self.cx, cs, &choice, loc);
                return self.relate(cs, member, ty.rvalue(), MatchKind::Bind, loc);
            }
            self.absorb(cs, member);
            return SolveResult::Solved;
        }
        self.record_fix(
            cs,
            FixKind::DefineMemberBasedOnUse {
                base: base.clone(),
                name: name.to_string(),
            },
            loc,
        );
        self.absorb(cs, member);
        SolveResult::Solved
    }

    /// A member lookup that failed on a wrapped property or on its
    /// storage, but succeeds on the other one. Returns the fix and the type
    /// the member was found on.
    fn property_wrapper_fix(
        &mut self,
        cs: &mut ConstraintSystem,
        base: &Type,
        name: &str,
        loc: &ConstraintLocator,
    ) -> Option<(FixKind, Type)> {
        let anchor = loc.anchor?;
        let ExprKind::Member { base: base_expr, .. } = self.cx.module.expr(anchor).node.clone() else {
            return None;
        };
        let overload = cs
            .overloads
            .get(&ConstraintLocator::new(base_expr))
            .or_else(|| cs.overloads.get(&ConstraintLocator::new(base_expr).with(PathElt::Member)))?;
        let OverloadChoice::Decl { decl: wrapped, .. } = overload.choice else {
            return None;
        };
        if !matches!(self.cx.module.decl(wrapped).kind, DeclKind::Var { .. }) {
            return None;
        }
        let info = request::backing_property_info(self.ev, self.cx, wrapped);
        if info.is_empty() {
            return None;
        }
        let referenced = match &self.cx.module.expr(base_expr).node {
            ExprKind::DeclRef { name } => name.clone(),
            ExprKind::Member { name, .. } => name.node.clone(),
            _ => return None,
        };

        if members::storage_ref_name(&referenced).is_some() {
            let value = request::interface_type(self.ev, self.cx, wrapped);
            if members::lookup_members(self.ev, self.cx, &value, name, false).is_empty() {
                return None;
            }
            return Some((
                FixKind::UseWrappedValue {
                    wrapped,
                    base: base.clone(),
                    wrapper: info.backing_type.clone(),
                },
                value,
            ));
        }

        let storage = info.backing_type.clone();
        if !members::lookup_members(self.ev, self.cx, &storage, name, false).is_empty() {
            return Some((
                FixKind::UsePropertyWrapper {
                    wrapped,
                    using_projection: false,
                    base: base.clone(),
                    wrapper: storage.clone(),
                },
                storage,
            ));
        }
        let projected = members::wrapper_storage_type(self.ev, self.cx, cs, wrapped, true, None, loc)?;
        let projected = projected.rvalue().clone();
        if members::lookup_members(self.ev, self.cx, &projected, name, false).is_empty() {
            return None;
        }
        Some((
            FixKind::UsePropertyWrapper {
                wrapped,
                using_projection: true,
                base: base.clone(),
                wrapper: projected.clone(),
            },
            projected,
        ))
    }
}
