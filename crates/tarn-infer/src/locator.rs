//! Constraint locators.
//!
//! A locator names the place a constraint, overload choice or fix came from:
//! an anchor expression plus a path of steps into it ("argument 1 of this
//! call", "the result of this closure"). Diagnostics resolve a locator back
//! to the source-level expression to blame.

use std::fmt;

use smallvec::SmallVec;
use tarn_ast::{DeclId, ExprId, ExprKind, Module};

/// Why an expression has a contextual type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContextualPurpose {
    Initialization,
    Assignment,
    Return,
    Coercion,
}

impl ContextualPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            ContextualPurpose::Initialization => "initialization",
            ContextualPurpose::Assignment => "assignment",
            ContextualPurpose::Return => "return",
            ContextualPurpose::Coercion => "coercion",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathElt {
    /// The callee of an application.
    ApplyFunction,
    /// Argument `arg` matched to parameter `param`.
    ApplyArgToParam { arg: usize, param: usize },
    FunctionArgument(usize),
    FunctionResult,
    /// The member named by a member reference.
    Member,
    /// The base of a member reference or subscript.
    MemberRefBase,
    SubscriptMember,
    ConstructorMember,
    TupleElement(usize),
    ArrayElement(usize),
    ClosureResult,
    ContextualType(ContextualPurpose),
    KeyPathComponent(usize),
    KeyPathRoot,
    KeyPathValue,
    GenericArgument(usize),
    /// An opened generic parameter of a referenced declaration.
    GenericParameter(String),
    /// Requirement `index` of `owner`, counting inline constraints then the
    /// `where` clause.
    TypeParameterRequirement { owner: DeclId, index: usize },
    LValueConversion,
    RValueAdjustment,
    OptionalPayload,
    AutoclosureResult,
    ImplicitConversion,
}

impl PathElt {
    /// Elements introduced by the solver itself, with no source-level
    /// counterpart.
    pub fn is_synthetic(&self) -> bool {
        matches!(
            self,
            PathElt::LValueConversion
                | PathElt::RValueAdjustment
                | PathElt::OptionalPayload
                | PathElt::AutoclosureResult
                | PathElt::ImplicitConversion
        )
    }
}

impl fmt::Display for PathElt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElt::ApplyFunction => write!(f, "apply function"),
            PathElt::ApplyArgToParam { arg, param } => {
                write!(f, "apply argument #{arg} to parameter #{param}")
            }
            PathElt::FunctionArgument(i) => write!(f, "function argument #{i}"),
            PathElt::FunctionResult => write!(f, "function result"),
            PathElt::Member => write!(f, "member"),
            PathElt::MemberRefBase => write!(f, "member base"),
            PathElt::SubscriptMember => write!(f, "subscript member"),
            PathElt::ConstructorMember => write!(f, "constructor member"),
            PathElt::TupleElement(i) => write!(f, "tuple element #{i}"),
            PathElt::ArrayElement(i) => write!(f, "array element #{i}"),
            PathElt::ClosureResult => write!(f, "closure result"),
            PathElt::ContextualType(purpose) => write!(f, "contextual type ({})", purpose.as_str()),
            PathElt::KeyPathComponent(i) => write!(f, "key path component #{i}"),
            PathElt::KeyPathRoot => write!(f, "key path root"),
            PathElt::KeyPathValue => write!(f, "key path value"),
            PathElt::GenericArgument(i) => write!(f, "generic argument #{i}"),
            PathElt::GenericParameter(name) => write!(f, "generic parameter `{name}`"),
            PathElt::TypeParameterRequirement { index, .. } => write!(f, "requirement #{index}"),
            PathElt::LValueConversion => write!(f, "lvalue conversion"),
            PathElt::RValueAdjustment => write!(f, "rvalue adjustment"),
            PathElt::OptionalPayload => write!(f, "optional payload"),
            PathElt::AutoclosureResult => write!(f, "autoclosure result"),
            PathElt::ImplicitConversion => write!(f, "implicit conversion"),
        }
    }
}

pub type LocatorPath = SmallVec<[PathElt; 4]>;

/// An anchor expression plus a path of steps into it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintLocator {
    pub anchor: Option<ExprId>,
    pub path: LocatorPath,
}

enum Step {
    Into(ExprId),
    Stay,
    Stop,
}

impl ConstraintLocator {
    pub fn new(anchor: ExprId) -> Self {
        Self {
            anchor: Some(anchor),
            path: SmallVec::new(),
        }
    }

    pub fn with_path(anchor: Option<ExprId>, path: impl IntoIterator<Item = PathElt>) -> Self {
        Self {
            anchor,
            path: path.into_iter().collect(),
        }
    }

    /// This locator extended by one more step.
    pub fn with(&self, elt: PathElt) -> Self {
        let mut next = self.clone();
        next.path.push(elt);
        next
    }

    pub fn last(&self) -> Option<&PathElt> {
        self.path.last()
    }

    /// The last element that is not synthetic.
    pub fn last_source_elt(&self) -> Option<&PathElt> {
        self.path.iter().rev().find(|elt| !elt.is_synthetic())
    }

    pub fn contains(&self, pred: impl Fn(&PathElt) -> bool) -> bool {
        self.path.iter().any(pred)
    }

    /// The same locator without synthetic path elements. The anchor is
    /// never changed.
    pub fn simplified(&self) -> Self {
        if self.path.is_empty() {
            return self.clone();
        }
        Self {
            anchor: self.anchor,
            path: self
                .path
                .iter()
                .filter(|elt| !elt.is_synthetic())
                .cloned()
                .collect(),
        }
    }

    /// Walk the path through the module's expressions as far as it leads
    /// to a sub-expression. Returns the resolved anchor and the remaining,
    /// non-synthetic path.
    pub fn resolve(&self, module: &Module) -> Self {
        let Some(mut current) = self.anchor else {
            return self.simplified();
        };
        let mut rest = LocatorPath::new();
        let mut elts = self.path.iter();
        for elt in elts.by_ref() {
            match step(module, current, elt) {
                Step::Into(next) => current = next,
                Step::Stay => {}
                Step::Stop => {
                    rest.push(elt.clone());
                    break;
                }
            }
        }
        rest.extend(elts.filter(|elt| !elt.is_synthetic()).cloned());
        Self {
            anchor: Some(current),
            path: rest,
        }
    }

    /// The source-level expression this locator blames.
    pub fn resolve_anchor(&self, module: &Module) -> Option<ExprId> {
        self.resolve(module).anchor
    }

    /// Whether more than one step remains after resolving, so that a
    /// diagnostic keyed on the anchor alone would point at the wrong thing.
    pub fn is_complex(&self, module: &Module) -> bool {
        self.resolve(module).path.len() > 1
    }
}

fn step(module: &Module, current: ExprId, elt: &PathElt) -> Step {
    let node = &module.expr(current).node;
    match (elt, node) {
        (PathElt::ApplyFunction, ExprKind::Call { callee, .. }) => Step::Into(*callee),
        (
            PathElt::ApplyArgToParam { arg, .. },
            ExprKind::Call { args, .. } | ExprKind::Subscript { args, .. },
        ) => args.get(*arg).map_or(Step::Stop, |a| Step::Into(a.value)),
        (
            PathElt::MemberRefBase,
            ExprKind::Member { base, .. } | ExprKind::Subscript { base, .. },
        ) => Step::Into(*base),
        (PathElt::TupleElement(i), ExprKind::Tuple(elems)) => {
            elems.get(*i).map_or(Step::Stop, |a| Step::Into(a.value))
        }
        (PathElt::ArrayElement(i), ExprKind::Array(elems)) => {
            elems.get(*i).map_or(Step::Stop, |e| Step::Into(*e))
        }
        (PathElt::ClosureResult, ExprKind::Closure { body, .. }) => match body.last() {
            Some(last) => match &module.expr(*last).node {
                ExprKind::Return(Some(value)) => Step::Into(*value),
                _ => Step::Into(*last),
            },
            None => Step::Stop,
        },
        (PathElt::ClosureResult, _) => Step::Stay,
        (elt, _) if elt.is_synthetic() => Step::Stay,
        _ => Step::Stop,
    }
}

impl fmt::Display for ConstraintLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.anchor {
            Some(anchor) => write!(f, "#{}", anchor.0)?,
            None => write!(f, "<none>")?,
        }
        for elt in &self.path {
            write!(f, " -> {elt}")?;
        }
        Ok(())
    }
}
