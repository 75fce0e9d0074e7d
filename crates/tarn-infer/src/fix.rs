//! Fixes: repairs the solver records so that solving can continue past a
//! failure, each of which knows the failure diagnostic that explains it.

use tarn_ast::DeclId;
use tarn_types::{FunctionType, Type};

use crate::diagnostics::{FailureDiagnostic, FailureKind};
use crate::locator::ConstraintLocator;

/// Why an initializer reference on a metatype is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitRefKind {
    /// A non-`required` initializer through a metatype value.
    DynamicOnMetatype,
    /// An initializer of a protocol type.
    ProtocolMetatype,
    /// Calling a metatype value without naming `init`.
    NonConstMetatype,
}

/// Why a key path component reference is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPathRefKind {
    StaticMember,
    MutatingGetter,
    Method,
}

/// An argument the call did not supply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SynthesizedArg {
    pub param_index: usize,
    pub label: Option<String>,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FixKind {
    /// Force-unwrap an optional where its payload was expected.
    ForceOptional { base: Type, unwrapped: Type },
    /// Unwrap an optional base before referring to a member.
    UnwrapOptionalBase { member: String, base: Type },
    /// Same, where the member itself is optional.
    UnwrapOptionalBaseWithOptionalResult { member: String, base: Type },
    /// Add `as!` to a conversion that is only valid as a checked cast.
    ForceDowncast { from: Type, to: Type },
    /// Turn an `as` coercion into `as!`.
    CoerceToCheckedCast { from: Type, to: Type },
    /// Add `&` to pass an lvalue to an inout parameter.
    AddressOf { ty: Type },
    /// Drop an `&` that has no inout parameter to go to.
    RemoveAddressOf,
    /// Treat an rvalue as if it were assignable.
    TreatRValueAsLValue,
    /// Mark a non-escaping function as escaping.
    ExplicitlyEscaping { to: Type },
    /// Use these argument labels instead of the written ones.
    RelabelArguments { labels: Vec<Option<String>> },
    /// Move argument `arg` before argument `prev_arg`.
    MoveOutOfOrderArgument { arg: usize, prev_arg: usize },
    AddMissingArguments { synthesized: Vec<SynthesizedArg> },
    /// Pretend `ty` conforms to `protocol`.
    AddConformance {
        ty: Type,
        protocol: Type,
        contextual: bool,
    },
    SkipSameTypeRequirement { lhs: Type, rhs: Type },
    SkipSuperclassRequirement { lhs: Type, rhs: Type },
    ContextualMismatch { from: Type, to: Type },
    CollectionElementContextualMismatch { from: Type, to: Type },
    KeyPathContextualMismatch { from: Type, to: Type },
    /// Generic arguments at these positions differ between two
    /// specializations of one type.
    GenericArgumentsMismatch {
        actual: Type,
        required: Type,
        mismatches: Vec<usize>,
    },
    /// Forward an autoclosure parameter by calling it.
    AutoClosureForwarding,
    /// Drop a `!` or `?` applied to a non-optional value.
    RemoveUnwrap { base: Type },
    /// Call a function used as a value.
    InsertCall,
    /// Reference the wrapper storage of a wrapped property.
    UsePropertyWrapper {
        wrapped: DeclId,
        using_projection: bool,
        base: Type,
        wrapper: Type,
    },
    /// Reference the wrapped value instead of the wrapper storage.
    UseWrappedValue {
        wrapped: DeclId,
        base: Type,
        wrapper: Type,
    },
    /// Use `[...]` instead of a member named `subscript`.
    UseSubscriptOperator,
    /// Pretend the member exists.
    DefineMemberBasedOnUse { base: Type, name: String },
    AllowTypeOrInstanceMember {
        base: Type,
        member: DeclId,
        name: String,
    },
    AllowInvalidPartialApplication { member: String },
    AllowInvalidInitRef {
        kind: InitRefKind,
        base: Type,
        init: Option<DeclId>,
    },
    AllowMemberRefOnExistential { base: Type, name: String },
    AllowClosureParameterDestructuring { contextual: FunctionType },
    AllowInaccessibleMember { member: DeclId },
    AllowAnyObjectKeyPathRoot,
    TreatKeyPathSubscriptIndexAsHashable { ty: Type },
    AllowInvalidRefInKeyPath { kind: KeyPathRefKind, member: DeclId },
    /// Drop a value returned from a `Void` function.
    RemoveReturn,
    ExplicitlySpecifyGenericArguments { params: Vec<String> },
    SkipUnhandledConstructInFunctionBuilder { construct: String, builder: DeclId },
    AllowMutatingMemberOnRValueBase { member: DeclId, base: Type },
}

/// A recorded repair and where it applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstraintFix {
    pub kind: FixKind,
    pub locator: ConstraintLocator,
    /// Warning fixes still produce a usable program.
    pub is_warning: bool,
}

impl ConstraintFix {
    pub fn new(kind: FixKind, locator: ConstraintLocator) -> Self {
        Self {
            kind,
            locator,
            is_warning: false,
        }
    }

    pub fn warning(kind: FixKind, locator: ConstraintLocator) -> Self {
        Self {
            kind,
            locator,
            is_warning: true,
        }
    }

    pub fn name(&self) -> &'static str {
        match &self.kind {
            FixKind::ForceOptional { .. } => "force optional",
            FixKind::UnwrapOptionalBase { .. } => "unwrap optional base",
            FixKind::UnwrapOptionalBaseWithOptionalResult { .. } => {
                "unwrap optional base with optional result"
            }
            FixKind::ForceDowncast { .. } => "force downcast",
            FixKind::CoerceToCheckedCast { .. } => "coerce to checked cast",
            FixKind::AddressOf { .. } => "add address-of",
            FixKind::RemoveAddressOf => "remove address-of",
            FixKind::TreatRValueAsLValue => "treat rvalue as lvalue",
            FixKind::ExplicitlyEscaping { .. } => "add @escaping",
            FixKind::RelabelArguments { .. } => "re-label arguments",
            FixKind::MoveOutOfOrderArgument { .. } => "move out-of-order argument",
            FixKind::AddMissingArguments { .. } => "add missing arguments",
            FixKind::AddConformance { .. } => "add missing conformance",
            FixKind::SkipSameTypeRequirement { .. } => "skip same-type requirement",
            FixKind::SkipSuperclassRequirement { .. } => "skip superclass requirement",
            FixKind::ContextualMismatch { .. } => "fix contextual mismatch",
            FixKind::CollectionElementContextualMismatch { .. } => {
                "fix collection element contextual mismatch"
            }
            FixKind::KeyPathContextualMismatch { .. } => "fix key path contextual mismatch",
            FixKind::GenericArgumentsMismatch { .. } => "fix generic arguments mismatch",
            FixKind::AutoClosureForwarding => "fix @autoclosure forwarding",
            FixKind::RemoveUnwrap { .. } => "remove unwrap",
            FixKind::InsertCall => "insert call",
            FixKind::UsePropertyWrapper { .. } => "use property wrapper",
            FixKind::UseWrappedValue { .. } => "use wrapped value",
            FixKind::UseSubscriptOperator => "use subscript operator",
            FixKind::DefineMemberBasedOnUse { .. } => "define missing member",
            FixKind::AllowTypeOrInstanceMember { .. } => "allow type or instance member",
            FixKind::AllowInvalidPartialApplication { .. } => "allow invalid partial application",
            FixKind::AllowInvalidInitRef { .. } => "allow invalid initializer reference",
            FixKind::AllowMemberRefOnExistential { .. } => "allow member on existential",
            FixKind::AllowClosureParameterDestructuring { .. } => {
                "allow closure parameter destructuring"
            }
            FixKind::AllowInaccessibleMember { .. } => "allow inaccessible member",
            FixKind::AllowAnyObjectKeyPathRoot => "allow AnyObject key path root",
            FixKind::TreatKeyPathSubscriptIndexAsHashable { .. } => {
                "treat key path subscript index as hashable"
            }
            FixKind::AllowInvalidRefInKeyPath { .. } => "allow invalid reference in key path",
            FixKind::RemoveReturn => "remove return",
            FixKind::ExplicitlySpecifyGenericArguments { .. } => {
                "explicitly specify generic arguments"
            }
            FixKind::SkipUnhandledConstructInFunctionBuilder { .. } => {
                "skip unhandled construct in function builder"
            }
            FixKind::AllowMutatingMemberOnRValueBase { .. } => {
                "allow mutating member on rvalue base"
            }
        }
    }

    /// The failure that explains this fix to the user.
    pub fn failure(&self) -> FailureDiagnostic {
        let kind = match &self.kind {
            FixKind::ForceOptional { base, unwrapped } => FailureKind::MissingOptionalUnwrap {
                base: base.clone(),
                unwrapped: unwrapped.clone(),
            },
            FixKind::UnwrapOptionalBase { member, .. } => FailureKind::MemberAccessOnOptionalBase {
                member: member.clone(),
                result_is_optional: false,
            },
            FixKind::UnwrapOptionalBaseWithOptionalResult { member, .. } => {
                FailureKind::MemberAccessOnOptionalBase {
                    member: member.clone(),
                    result_is_optional: true,
                }
            }
            FixKind::ForceDowncast { from, to } => FailureKind::MissingExplicitConversion {
                from: from.clone(),
                to: to.clone(),
            },
            FixKind::CoerceToCheckedCast { from, to } => FailureKind::MissingForcedDowncast {
                from: from.clone(),
                to: to.clone(),
            },
            FixKind::AddressOf { ty } => FailureKind::MissingAddressOf { ty: ty.clone() },
            FixKind::RemoveAddressOf => FailureKind::InvalidUseOfAddressOf,
            FixKind::TreatRValueAsLValue => FailureKind::RValueTreatedAsLValue,
            FixKind::ExplicitlyEscaping { to } => {
                FailureKind::NoEscapeFuncToTypeConversion { to: to.clone() }
            }
            FixKind::RelabelArguments { labels } => FailureKind::Labeling {
                labels: labels.clone(),
            },
            FixKind::MoveOutOfOrderArgument { arg, prev_arg } => FailureKind::OutOfOrderArgument {
                arg: *arg,
                prev_arg: *prev_arg,
            },
            FixKind::AddMissingArguments { synthesized } => FailureKind::MissingArguments {
                synthesized: synthesized.clone(),
            },
            FixKind::AddConformance {
                ty,
                protocol,
                contextual: true,
            } => FailureKind::MissingContextualConformance {
                ty: ty.clone(),
                protocol: protocol.clone(),
            },
            FixKind::AddConformance {
                ty,
                protocol,
                contextual: false,
            } => FailureKind::MissingConformance {
                ty: ty.clone(),
                protocol: protocol.clone(),
            },
            FixKind::SkipSameTypeRequirement { lhs, rhs } => FailureKind::SameTypeRequirement {
                lhs: lhs.clone(),
                rhs: rhs.clone(),
            },
            FixKind::SkipSuperclassRequirement { lhs, rhs } => FailureKind::SuperclassRequirement {
                lhs: lhs.clone(),
                rhs: rhs.clone(),
            },
            FixKind::ContextualMismatch { from, to }
            | FixKind::KeyPathContextualMismatch { from, to } => FailureKind::Contextual {
                from: from.clone(),
                to: to.clone(),
            },
            FixKind::CollectionElementContextualMismatch { from, to } => {
                FailureKind::CollectionElementContextual {
                    from: from.clone(),
                    to: to.clone(),
                }
            }
            FixKind::GenericArgumentsMismatch {
                actual,
                required,
                mismatches,
            } => FailureKind::GenericArgumentsMismatch {
                actual: actual.clone(),
                required: required.clone(),
                mismatches: mismatches.clone(),
            },
            FixKind::AutoClosureForwarding => FailureKind::AutoClosureForwarding,
            FixKind::RemoveUnwrap { base } => FailureKind::NonOptionalUnwrap { base: base.clone() },
            FixKind::InsertCall => FailureKind::MissingCall,
            FixKind::UsePropertyWrapper {
                wrapped,
                using_projection,
                base,
                wrapper,
            } => FailureKind::ExtraneousPropertyWrapperUnwrap {
                wrapped: *wrapped,
                using_projection: *using_projection,
                base: base.clone(),
                wrapper: wrapper.clone(),
            },
            FixKind::UseWrappedValue {
                wrapped,
                base,
                wrapper,
            } => FailureKind::MissingPropertyWrapperUnwrap {
                wrapped: *wrapped,
                base: base.clone(),
                wrapper: wrapper.clone(),
            },
            FixKind::UseSubscriptOperator => FailureKind::SubscriptMisuse,
            FixKind::DefineMemberBasedOnUse { base, name } => FailureKind::MissingMember {
                base: base.clone(),
                name: name.clone(),
            },
            FixKind::AllowTypeOrInstanceMember { base, member, name } => {
                FailureKind::AllowTypeOrInstanceMember {
                    base: base.clone(),
                    member: *member,
                    name: name.clone(),
                }
            }
            FixKind::AllowInvalidPartialApplication { member } => FailureKind::PartialApplication {
                member: member.clone(),
                is_warning: self.is_warning,
            },
            FixKind::AllowInvalidInitRef { kind, base, init } => FailureKind::InvalidInitRef {
                kind: *kind,
                base: base.clone(),
                init: *init,
            },
            FixKind::AllowMemberRefOnExistential { base, name } => {
                FailureKind::InvalidMemberRefOnExistential {
                    base: base.clone(),
                    name: name.clone(),
                }
            }
            FixKind::AllowClosureParameterDestructuring { contextual } => {
                FailureKind::ClosureParamDestructuring {
                    contextual: contextual.clone(),
                }
            }
            FixKind::AllowInaccessibleMember { member } => {
                FailureKind::InaccessibleMember { member: *member }
            }
            FixKind::AllowAnyObjectKeyPathRoot => FailureKind::AnyObjectKeyPathRoot,
            FixKind::TreatKeyPathSubscriptIndexAsHashable { ty } => {
                FailureKind::KeyPathSubscriptIndexHashable { ty: ty.clone() }
            }
            FixKind::AllowInvalidRefInKeyPath { kind, member } => FailureKind::InvalidRefInKeyPath {
                kind: *kind,
                member: *member,
            },
            FixKind::RemoveReturn => FailureKind::ExtraneousReturn,
            FixKind::ExplicitlySpecifyGenericArguments { params } => {
                FailureKind::MissingGenericArguments {
                    params: params.clone(),
                }
            }
            FixKind::SkipUnhandledConstructInFunctionBuilder { construct, builder } => {
                FailureKind::SkipUnhandledConstructInFunctionBuilder {
                    construct: construct.clone(),
                    builder: *builder,
                }
            }
            FixKind::AllowMutatingMemberOnRValueBase { member, base } => {
                FailureKind::MutatingMemberRefOnImmutableBase {
                    member: *member,
                    base: base.clone(),
                }
            }
        };
        FailureDiagnostic::new(self.locator.clone(), kind)
    }
}
