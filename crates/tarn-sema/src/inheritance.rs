//! Inheritance clause resolution and classification.
//!
//! Each clause is walked once by [`inheritance_clause`]; the superclass and
//! raw type requests read their answer off the resulting summary.

use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use tarn_ast::{DeclId, DeclKind, Module, Span, TypeRepr, TypeReprKind};
use tarn_diag::{DiagId, SourceLocation, diag_args};
use tarn_types::{NominalKind, ProtocolRef, Type};

use crate::context::SemaContext;
use crate::lookup;
use crate::request::{self, Ev};
use crate::resolve;

/// One classified inheritance clause entry.
#[derive(Debug, Clone, PartialEq)]
pub struct InheritedEntry {
    pub index: usize,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InheritedProtocol {
    pub index: usize,
    pub proto: ProtocolRef,
}

/// The inheritance clause of a nominal type, sorted into its roles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InheritanceSummary {
    pub superclass: Option<InheritedEntry>,
    pub raw_type: Option<InheritedEntry>,
    pub protocols: Vec<InheritedProtocol>,
    /// Index of an `AnyObject` entry.
    pub any_object: Option<usize>,
}

impl InheritanceSummary {
    pub fn conforms_directly(&self, proto: &ProtocolRef) -> bool {
        self.protocols.iter().any(|entry| &entry.proto == proto)
    }
}

// ---------------------------------------------------------------------------
// Directly referenced declarations
// ---------------------------------------------------------------------------

/// Type declarations named by inheritance entry `index` of `decl`, found by
/// name lookup alone. Aliases are looked through unless they name a
/// protocol composition, in which case the alias itself is reported.
pub fn inherited_decls_referenced(
    cx: &SemaContext,
    decl: DeclId,
    index: usize,
) -> SmallVec<[DeclId; 2]> {
    let module = &cx.module;
    let mut out = SmallVec::new();
    let Some(repr) = module.decl(decl).inherited.get(index) else {
        return out;
    };
    let mut visited = FxHashSet::default();
    collect_referenced(module, Some(decl), repr, &mut visited, &mut out);
    out
}

/// Type declarations named by `repr` in the scope of `context`.
pub fn referenced_in(
    module: &Module,
    context: Option<DeclId>,
    repr: &TypeRepr,
) -> SmallVec<[DeclId; 2]> {
    let mut out = SmallVec::new();
    let mut visited = FxHashSet::default();
    collect_referenced(module, context, repr, &mut visited, &mut out);
    out
}

fn collect_referenced(
    module: &Module,
    context: Option<DeclId>,
    repr: &TypeRepr,
    visited: &mut FxHashSet<DeclId>,
    out: &mut SmallVec<[DeclId; 2]>,
) {
    match &repr.node {
        TypeReprKind::Ident(name) => {
            for found in lookup::lookup_type_decls(module, context, name) {
                push_referenced(module, found, visited, out);
            }
        }
        TypeReprKind::Member { base, name } => {
            let mut bases = SmallVec::new();
            collect_referenced(module, context, base, visited, &mut bases);
            for base in bases {
                for member in module.members_named(base, name) {
                    if module.decl(member).is_type_decl() {
                        push_referenced(module, member, visited, out);
                    }
                }
            }
        }
        TypeReprKind::Generic { base, .. } => {
            collect_referenced(module, context, base, visited, out);
        }
        TypeReprKind::Composition(members) => {
            for member in members {
                collect_referenced(module, context, member, visited, out);
            }
        }
        _ => {}
    }
}

fn push_referenced(
    module: &Module,
    found: DeclId,
    visited: &mut FxHashSet<DeclId>,
    out: &mut SmallVec<[DeclId; 2]>,
) {
    let decl = module.decl(found);
    if let DeclKind::TypeAlias { underlying } = &decl.kind {
        if matches!(underlying.node, TypeReprKind::Composition(_)) {
            if !out.contains(&found) {
                out.push(found);
            }
        } else if visited.insert(found) {
            collect_referenced(module, decl.parent, underlying, visited, out);
        }
        return;
    }
    if !out.contains(&found) {
        out.push(found);
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

pub fn inherited_type(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId, index: usize) -> Type {
    let Some(repr) = cx.module.decl(decl).inherited.get(index).cloned() else {
        return Type::Error;
    };
    resolve::resolve_type(ev, cx, &repr, Some(decl))
}

/// Range removing entry `index` together with its separator. A lone entry
/// takes the colon with it.
fn removal_range(spans: &[Span], header_end: u32, index: usize) -> SourceLocation {
    let this = spans[index];
    let (start, end) = if spans.len() == 1 {
        (header_end, this.end)
    } else if index == 0 {
        (this.start, spans[1].start)
    } else {
        (spans[index - 1].end, this.end)
    };
    SourceLocation::new(this.file.0, start, end)
}

struct Clause {
    name: String,
    kind: NominalRole,
    spans: Vec<Span>,
    texts: Vec<String>,
    header_end: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NominalRole {
    Class,
    Struct,
    Enum,
    Protocol,
    Other,
}

impl Clause {
    fn new(module: &Module, decl: DeclId) -> Self {
        let d = module.decl(decl);
        let kind = match d.kind {
            DeclKind::Class => NominalRole::Class,
            DeclKind::Struct => NominalRole::Struct,
            DeclKind::Enum => NominalRole::Enum,
            DeclKind::Protocol => NominalRole::Protocol,
            _ => NominalRole::Other,
        };
        Self {
            name: d.name.clone(),
            kind,
            spans: d.inherited.iter().map(|repr| repr.span).collect(),
            texts: d
                .inherited
                .iter()
                .map(|repr| {
                    module
                        .source_text(repr.span)
                        .map(str::to_string)
                        .unwrap_or_else(|| repr.node.display())
                })
                .collect(),
            header_end: d.header_end(),
        }
    }

    fn loc(&self, index: usize) -> Option<SourceLocation> {
        self.spans[index].report_loc()
    }

    /// Emit `id` for an entry that must be first, with a fix-it moving it
    /// to the front of the clause.
    fn diagnose_not_first(&self, cx: &mut SemaContext, index: usize, id: DiagId, ty: &Type) {
        let remove = removal_range(&self.spans, self.header_end, index);
        let front = self.spans[0].loc().start_point();
        let moved = format!("{}, ", self.texts[index]);
        cx.diags
            .emit(self.loc(index), id, diag_args![ty])
            .fix_it_remove(remove)
            .fix_it_insert(front, moved);
    }
}

/// Resolve every entry of `decl`'s inheritance clause and sort it into
/// superclass, raw type and protocols, diagnosing misplaced entries.
pub fn inheritance_clause(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId) -> InheritanceSummary {
    let clause = Clause::new(&cx.module, decl);
    let mut summary = InheritanceSummary::default();
    let mut seen: Vec<Type> = Vec::new();

    for index in 0..clause.spans.len() {
        let ty = request::inherited_type(ev, cx, decl, index);
        if ty.is_error() {
            continue;
        }
        if seen.contains(&ty) {
            cx.diags
                .emit(clause.loc(index), DiagId::DuplicateInheritance, diag_args![&ty])
                .fix_it_remove(removal_range(&clause.spans, clause.header_end, index));
            continue;
        }
        seen.push(ty.clone());

        match &ty {
            Type::Existential(protos) => {
                for proto in protos {
                    if proto.decl.is_none() && proto.name == "AnyObject" {
                        summary.any_object.get_or_insert(index);
                    } else {
                        summary.protocols.push(InheritedProtocol {
                            index,
                            proto: proto.clone(),
                        });
                    }
                }
            }
            Type::AnyObject => match clause.kind {
                NominalRole::Class | NominalRole::Protocol => {
                    summary.any_object.get_or_insert(index);
                }
                _ => {
                    cx.diags.emit(
                        clause.loc(index),
                        DiagId::InheritanceFromNonProtocol,
                        diag_args![&ty],
                    );
                }
            },
            Type::Nominal(nominal)
                if nominal.kind == NominalKind::Class
                    && matches!(clause.kind, NominalRole::Class | NominalRole::Protocol) =>
            {
                classify_superclass(ev, cx, &clause, &mut summary, index, &ty, nominal.decl);
            }
            _ if clause.kind == NominalRole::Enum => {
                classify_raw_type(cx, &clause, &mut summary, index, &ty);
            }
            _ if clause.kind == NominalRole::Class => {
                cx.diags.emit(
                    clause.loc(index),
                    DiagId::InheritanceFromNonProtocolOrClass,
                    diag_args![&ty],
                );
            }
            _ => {
                cx.diags.emit(
                    clause.loc(index),
                    DiagId::InheritanceFromNonProtocol,
                    diag_args![&ty],
                );
            }
        }
    }
    summary
}

fn classify_superclass(
    ev: &mut Ev,
    cx: &mut SemaContext,
    clause: &Clause,
    summary: &mut InheritanceSummary,
    index: usize,
    ty: &Type,
    superclass: DeclId,
) {
    if let Some(previous) = &summary.superclass {
        cx.diags.emit(
            clause.loc(index),
            DiagId::MultipleInheritance,
            diag_args![clause.name.as_str(), &previous.ty, ty],
        );
        return;
    }
    if index != 0 {
        clause.diagnose_not_first(cx, index, DiagId::SuperclassNotFirst, ty);
    }
    if clause.kind == NominalRole::Class && request::is_final(ev, cx, superclass) {
        cx.diags.emit(
            clause.loc(index),
            DiagId::InheritanceFromFinalClass,
            diag_args![ty],
        );
    }
    summary.superclass = Some(InheritedEntry {
        index,
        ty: ty.clone(),
    });
}

fn classify_raw_type(
    cx: &mut SemaContext,
    clause: &Clause,
    summary: &mut InheritanceSummary,
    index: usize,
    ty: &Type,
) {
    if let Some(previous) = &summary.raw_type {
        cx.diags.emit(
            clause.loc(index),
            DiagId::MultipleEnumRawTypes,
            diag_args![clause.name.as_str(), &previous.ty, ty],
        );
        return;
    }
    if index != 0 {
        clause.diagnose_not_first(cx, index, DiagId::RawTypeNotFirst, ty);
    }
    summary.raw_type = Some(InheritedEntry {
        index,
        ty: ty.clone(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tarn_ast::FileId;

    fn span(start: u32, end: u32) -> Span {
        Span::new(FileId(0), start, end)
    }

    #[test]
    fn removal_of_lone_entry_takes_colon() {
        // class D: P
        let spans = [span(9, 10)];
        let range = removal_range(&spans, 7, 0);
        assert_eq!((range.start, range.end), (7, 10));
    }

    #[test]
    fn removal_of_first_entry_runs_to_next() {
        // class D: P, C
        let spans = [span(9, 10), span(12, 13)];
        let range = removal_range(&spans, 7, 0);
        assert_eq!((range.start, range.end), (9, 12));
    }

    #[test]
    fn removal_of_later_entry_starts_at_previous_end() {
        let spans = [span(9, 10), span(12, 13)];
        let range = removal_range(&spans, 7, 1);
        assert_eq!((range.start, range.end), (10, 13));
    }
}
