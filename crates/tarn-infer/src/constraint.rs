//! Constraints between types, generated from expressions and consumed by
//! the solver.

use std::fmt;

use tarn_ast::{DeclId, ExprId};
use tarn_types::{FunctionType, ProtocolRef, Type};

use crate::locator::ConstraintLocator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LiteralKind {
    Integer,
    Float,
    String,
    Boolean,
    Nil,
}

impl LiteralKind {
    /// The builtin protocol a type must conform to for this literal.
    pub fn protocol_name(self) -> &'static str {
        match self {
            LiteralKind::Integer => "ExpressibleByIntegerLiteral",
            LiteralKind::Float => "ExpressibleByFloatLiteral",
            LiteralKind::String => "ExpressibleByStringLiteral",
            LiteralKind::Boolean => "ExpressibleByBooleanLiteral",
            LiteralKind::Nil => "ExpressibleByNilLiteral",
        }
    }

    /// The type a literal gets when nothing else constrains it. `nil` has
    /// none.
    pub fn default_type(self) -> Option<Type> {
        match self {
            LiteralKind::Integer => Some(Type::Int),
            LiteralKind::Float => Some(Type::Double),
            LiteralKind::String => Some(Type::String),
            LiteralKind::Boolean => Some(Type::Bool),
            LiteralKind::Nil => None,
        }
    }
}

/// What a name reference resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OverloadChoice {
    /// A declaration, accessed on `base` when it is a member.
    Decl { decl: DeclId, base: Option<Type> },
    /// The memberwise or default initializer of a type without explicit
    /// initializers.
    ImplicitInit { nominal: DeclId, base: Type },
    /// A member of a builtin type, such as `count` on arrays.
    Builtin { name: String, ty: Type },
}

impl OverloadChoice {
    pub fn decl(&self) -> Option<DeclId> {
        match self {
            OverloadChoice::Decl { decl, .. } => Some(*decl),
            OverloadChoice::ImplicitInit { .. } | OverloadChoice::Builtin { .. } => None,
        }
    }

    pub fn base(&self) -> Option<&Type> {
        match self {
            OverloadChoice::Decl { base, .. } => base.as_ref(),
            OverloadChoice::ImplicitInit { base, .. } => Some(base),
            OverloadChoice::Builtin { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// The two types are identical, lvalue-ness included.
    Bind { first: Type, second: Type },
    /// The two types are identical once the first is loaded.
    Equal { first: Type, second: Type },
    /// A value of type `from` converts implicitly to `to`.
    Conversion { from: Type, to: Type },
    /// Like `Conversion`, for an argument passed to a parameter.
    ArgumentConversion { from: Type, to: Type },
    ConformsTo { ty: Type, protocol: ProtocolRef },
    /// `ty` is `superclass` or a subclass of it.
    Superclass { ty: Type, superclass: Type },
    /// A same-type requirement of a generic signature.
    SameType { first: Type, second: Type },
    /// `base` has a member `name` of type `member`.
    ValueMember { base: Type, member: Type, name: String },
    /// `callee` can be applied to arguments of these types, producing
    /// `args.result`.
    ApplicableFunction { args: FunctionType, callee: Type },
    /// `optional` is `Optional(object)`.
    OptionalObject { optional: Type, object: Type },
    LiteralConformsTo { ty: Type, literal: LiteralKind },
    /// The key path expression `expr` has type `key_path` given its root.
    KeyPath { key_path: Type, root: Type, expr: ExprId },
    /// Applying `key_path` to a base of type `root` produces `value`.
    KeyPathApplication { key_path: Type, root: Type, value: Type },
    /// Exactly one of these constraints holds.
    Disjunction(Vec<Constraint>),
    /// `ty` is the type of a reference to `choice`.
    BindOverload { ty: Type, choice: OverloadChoice },
    /// `ty` is `default` unless something else decides it.
    Defaultable { ty: Type, default: Type },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub locator: ConstraintLocator,
}

impl Constraint {
    pub fn new(kind: ConstraintKind, locator: ConstraintLocator) -> Self {
        Self { kind, locator }
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ConstraintKind::Bind { .. } => "bind",
            ConstraintKind::Equal { .. } => "equal",
            ConstraintKind::Conversion { .. } => "conversion",
            ConstraintKind::ArgumentConversion { .. } => "argument conversion",
            ConstraintKind::ConformsTo { .. } => "conforms to",
            ConstraintKind::Superclass { .. } => "superclass",
            ConstraintKind::SameType { .. } => "same type",
            ConstraintKind::ValueMember { .. } => "value member",
            ConstraintKind::ApplicableFunction { .. } => "applicable function",
            ConstraintKind::OptionalObject { .. } => "optional object",
            ConstraintKind::LiteralConformsTo { .. } => "literal conforms to",
            ConstraintKind::KeyPath { .. } => "key path",
            ConstraintKind::KeyPathApplication { .. } => "key path application",
            ConstraintKind::Disjunction(_) => "disjunction",
            ConstraintKind::BindOverload { .. } => "bind overload",
            ConstraintKind::Defaultable { .. } => "defaultable",
        }
    }

    pub fn is_disjunction(&self) -> bool {
        matches!(self.kind, ConstraintKind::Disjunction(_))
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ConstraintKind::Bind { first, second } => write!(f, "{first} bind {second}")?,
            ConstraintKind::Equal { first, second } => write!(f, "{first} equal {second}")?,
            ConstraintKind::Conversion { from, to } => write!(f, "{from} conv {to}")?,
            ConstraintKind::ArgumentConversion { from, to } => write!(f, "{from} arg conv {to}")?,
            ConstraintKind::ConformsTo { ty, protocol } => {
                write!(f, "{ty} conforms to {}", protocol.name)?
            }
            ConstraintKind::Superclass { ty, superclass } => {
                write!(f, "{ty} subclass of {superclass}")?
            }
            ConstraintKind::SameType { first, second } => write!(f, "{first} == {second}")?,
            ConstraintKind::ValueMember { base, member, name } => {
                write!(f, "{base}.{name} : {member}")?
            }
            ConstraintKind::ApplicableFunction { args, callee } => {
                write!(f, "{} applicable to {callee}", Type::Function(args.clone()))?
            }
            ConstraintKind::OptionalObject { optional, object } => {
                write!(f, "{optional} optional of {object}")?
            }
            ConstraintKind::LiteralConformsTo { ty, literal } => {
                write!(f, "{ty} literal {}", literal.protocol_name())?
            }
            ConstraintKind::KeyPath { key_path, root, .. } => {
                write!(f, "{key_path} key path from {root}")?
            }
            ConstraintKind::KeyPathApplication {
                key_path,
                root,
                value,
            } => write!(f, "{key_path} applied to {root} : {value}")?,
            ConstraintKind::Disjunction(choices) => {
                write!(f, "disjunction of {} choices", choices.len())?
            }
            ConstraintKind::BindOverload { ty, choice } => match choice {
                OverloadChoice::Decl { decl, .. } => write!(f, "{ty} bound to decl #{}", decl.0)?,
                OverloadChoice::ImplicitInit { nominal, .. } => {
                    write!(f, "{ty} bound to implicit init of #{}", nominal.0)?
                }
                OverloadChoice::Builtin { name, .. } => write!(f, "{ty} bound to builtin {name}")?,
            },
            ConstraintKind::Defaultable { ty, default } => {
                write!(f, "{ty} defaults to {default}")?
            }
        }
        write!(f, " @ {}", self.locator)
    }
}
