//! Error reporting and diagnostics for tarn.
//!
//! Every diagnostic is keyed by a [`DiagId`]; the checker never builds message
//! text by hand. Callers go through [`DiagnosticEngine::emit`], which returns a
//! [`DiagnosticHandle`] for attaching highlights and fix-its. Rendering of the
//! message template happens here so that the checker crates only deal in ids
//! and arguments.

use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// How severe a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        }
    }
}

// ---------------------------------------------------------------------------
// Diagnostic ids
// ---------------------------------------------------------------------------

macro_rules! diagnostic_ids {
    ($( $variant:ident = ($code:literal, $severity:ident, $name:literal, $text:literal), )*) => {
        /// Opaque identifier of a diagnostic message.
        ///
        /// The template text uses `{N}` placeholders for positional arguments.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub enum DiagId {
            $( $variant, )*
        }

        impl DiagId {
            pub const ALL: &'static [DiagId] = &[ $( DiagId::$variant, )* ];

            pub fn all() -> &'static [DiagId] {
                Self::ALL
            }

            /// Stable diagnostic code (e.g. E0201).
            pub fn code(self) -> &'static str {
                match self {
                    $( DiagId::$variant => $code, )*
                }
            }

            pub fn severity(self) -> Severity {
                match self {
                    $( DiagId::$variant => Severity::$severity, )*
                }
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $( DiagId::$variant => $name, )*
                }
            }

            pub fn template(self) -> &'static str {
                match self {
                    $( DiagId::$variant => $text, )*
                }
            }
        }
    };
}

diagnostic_ids! {
    // -- request evaluation --
    CircularReference = ("E0100", Error, "circular_reference", "circular reference to {0}"),
    CircularReferenceThrough = ("N0101", Note, "circular_reference_through", "through reference to {0} here"),

    // -- inheritance --
    CircularClassInheritance = ("E0110", Error, "circular_class_inheritance", "circular class inheritance {0}"),
    CircularProtocolDef = ("E0111", Error, "circular_protocol_def", "protocol {0} refines itself"),
    CircularEnumInheritance = ("E0112", Error, "circular_enum_inheritance", "circular enum raw types {0}"),
    KindDeclnameDeclaredHere = ("N0113", Note, "kind_declname_declared_here", "{0} `{1}` declared here"),
    DeclDeclaredHere = ("N0114", Note, "decl_declared_here", "`{0}` declared here"),
    UseOfUndeclaredType = ("E0115", Error, "use_of_undeclared_type", "use of undeclared type `{0}`"),
    DuplicateInheritance = ("E0116", Error, "duplicate_inheritance", "duplicate inheritance from `{0}`"),
    MultipleInheritance = ("E0117", Error, "multiple_inheritance", "class `{0}` cannot inherit from both `{1}` and `{2}`"),
    MultipleEnumRawTypes = ("E0118", Error, "multiple_enum_raw_types", "enum `{0}` cannot have multiple raw types `{1}` and `{2}`"),
    SuperclassNotFirst = ("E0119", Error, "superclass_not_first", "superclass `{0}` must appear first in the inheritance clause"),
    RawTypeNotFirst = ("E0120", Error, "raw_type_not_first", "raw type `{0}` must appear first in the enum inheritance clause"),
    InheritanceFromNonProtocol = ("E0121", Error, "inheritance_from_non_protocol", "inheritance from non-protocol type `{0}`"),
    InheritanceFromNonProtocolOrClass = ("E0122", Error, "inheritance_from_non_protocol_or_class", "inheritance from non-protocol, non-class type `{0}`"),
    InheritanceFromFinalClass = ("E0123", Error, "inheritance_from_final_class", "inheritance from a final class `{0}`"),

    // -- enum raw values --
    RawTypeNotLiteralConvertible = ("E0200", Error, "raw_type_not_literal_convertible", "raw type `{0}` is not expressible by a string, integer, or floating-point literal"),
    EmptyEnumRawType = ("E0201", Error, "empty_enum_raw_type", "an enum with no cases cannot declare a raw type"),
    EnumRawValueWithoutRawType = ("E0202", Error, "enum_raw_value_without_raw_type", "enum case cannot have a raw value if the enum does not have a raw type"),
    EnumWithRawTypeCaseWithArgument = ("E0203", Error, "enum_with_raw_type_case_with_argument", "enum with raw type cannot have cases with arguments"),
    EnumRawTypeHere = ("N0204", Note, "enum_raw_type_here", "declared raw type `{0}` here"),
    CannotConvertRawInitializerValue = ("E0205", Error, "cannot_convert_raw_initializer_value", "cannot convert value of type `{0}` to raw type `{1}`"),
    EnumNonIntegerRawValueAutoIncrement = ("E0206", Error, "enum_non_integer_raw_value_auto_increment", "enum case must declare a raw value when the preceding raw value is not an integer"),
    EnumRawValueNotUnique = ("E0207", Error, "enum_raw_value_not_unique", "raw value for enum case is not unique"),
    EnumRawValueUsedHere = ("N0208", Note, "enum_raw_value_used_here", "raw value previously used here"),
    EnumRawValueIncrementingFromHere = ("N0209", Note, "enum_raw_value_incrementing_from_here", "raw value auto-incremented from here"),
    EnumRawValueIncrementingFromZero = ("N0210", Note, "enum_raw_value_incrementing_from_zero", "raw value implicitly auto-incremented from zero"),
    EnumRawValueAutoIncrementOverflow = ("E0211", Error, "enum_raw_value_auto_increment_overflow", "auto-incremented raw value overflows raw type `{0}`"),

    // -- redeclaration and overrides --
    InvalidRedecl = ("E0300", Error, "invalid_redecl", "invalid redeclaration of `{0}`"),
    InvalidRedeclPrev = ("N0301", Note, "invalid_redecl_prev", "`{0}` previously declared here"),
    MethodDoesNotOverride = ("E0302", Error, "method_does_not_override", "method does not override any method from its superclass"),
    PropertyDoesNotOverride = ("E0303", Error, "property_does_not_override", "property does not override any property from its superclass"),
    MissingOverride = ("E0304", Error, "missing_override", "overriding declaration requires an `override` keyword"),
    OverrideFinal = ("E0305", Error, "override_final", "`{0}` overrides a `final` declaration"),
    MultipleOverride = ("E0306", Error, "multiple_override", "declaration `{0}` cannot override more than one superclass declaration"),
    OverriddenHere = ("N0307", Note, "overridden_here", "overridden declaration is here"),

    // -- property wrappers --
    PropertyWrapperNoValueProperty = ("E0400", Error, "property_wrapper_no_value_property", "property wrapper type `{0}` does not contain a non-static property named `wrappedValue`"),
    UnknownAttribute = ("E0401", Error, "unknown_attribute", "unknown attribute `{0}`"),

    // -- optionals --
    OptionalNotUnwrapped = ("E0500", Error, "optional_not_unwrapped", "value of optional type `{0}` must be unwrapped to a value of type `{1}`"),
    UnwrapWithDefaultValue = ("N0501", Note, "unwrap_with_default_value", "coalesce using `??` to provide a default when the optional value contains `nil`"),
    UnwrapWithForceValue = ("N0502", Note, "unwrap_with_force_value", "force-unwrap using `!` to abort execution if the optional value contains `nil`"),
    OptionalBaseNotUnwrapped = ("E0503", Error, "optional_base_not_unwrapped", "value of optional type `{0}` must be unwrapped to refer to member `{1}` of wrapped base type `{2}`"),
    OptionalBaseChain = ("N0504", Note, "optional_base_chain", "chain the optional using `?` to access member `{0}` only for non-`nil` base values"),
    InvalidForceUnwrap = ("E0505", Error, "invalid_force_unwrap", "cannot force unwrap value of non-optional type `{0}`"),
    InvalidOptionalChain = ("E0506", Error, "invalid_optional_chain", "cannot use optional chaining on non-optional value of type `{0}`"),

    // -- conversions --
    MissingExplicitConversion = ("E0600", Error, "missing_explicit_conversion", "`{0}` is not implicitly convertible to `{1}`; did you mean to use `as` to explicitly convert?"),
    MissingForcedDowncast = ("E0601", Error, "missing_forced_downcast", "`{0}` is not convertible to `{1}`; did you mean to use `as!` to force downcast?"),
    MissingAddressOf = ("E0602", Error, "missing_address_of", "passing value of type `{0}` to an inout parameter requires explicit `&`"),
    ExtraneousAddressOf = ("E0603", Error, "extraneous_address_of", "use of extraneous `&`"),
    AssignmentLhsIsImmutableVariable = ("E0604", Error, "assignment_lhs_is_immutable_variable", "cannot assign to value: `{0}` is a `let` constant"),
    AssignmentLhsNotLvalue = ("E0605", Error, "assignment_lhs_not_lvalue", "cannot assign to immutable expression of type `{0}`"),
    CannotPassRvalueInout = ("E0606", Error, "cannot_pass_rvalue_inout", "cannot pass immutable value as inout argument: `{0}` is a `let` constant"),
    CannotPassRvalueInoutOfType = ("E0607", Error, "cannot_pass_rvalue_inout_of_type", "cannot pass immutable value of type `{0}` as inout argument"),
    CannotPassRvalueMutating = ("E0608", Error, "cannot_pass_rvalue_mutating", "cannot use mutating member on immutable value: `{0}` is a `let` constant"),
    CannotPassRvalueMutatingOfType = ("E0609", Error, "cannot_pass_rvalue_mutating_of_type", "cannot use mutating member on immutable value of type `{0}`"),
    ConvertingNoescapeToType = ("E0610", Error, "converting_noescape_to_type", "converting non-escaping value to `{0}` may allow it to escape"),
    PassingNoescapeToEscaping = ("E0611", Error, "passing_noescape_to_escaping", "passing non-escaping parameter `{0}` to function expecting an `@escaping` closure"),
    AssigningNoescapeToEscaping = ("E0612", Error, "assigning_noescape_to_escaping", "assigning non-escaping parameter `{0}` to an `@escaping` closure"),
    NoescapeParameter = ("N0613", Note, "noescape_parameter", "parameter `{0}` is implicitly non-escaping"),
    CannotConvertInitializerValue = ("E0614", Error, "cannot_convert_initializer_value", "cannot convert value of type `{0}` to specified type `{1}`"),
    CannotConvertAssign = ("E0615", Error, "cannot_convert_assign", "cannot assign value of type `{0}` to type `{1}`"),
    CannotConvertToReturnType = ("E0616", Error, "cannot_convert_to_return_type", "cannot convert return expression of type `{0}` to return type `{1}`"),
    CannotConvertArgumentValue = ("E0617", Error, "cannot_convert_argument_value", "cannot convert value of type `{0}` to expected argument type `{1}`"),
    CannotConvertCoerce = ("E0618", Error, "cannot_convert_coerce", "cannot convert value of type `{0}` to type `{1}` in coercion"),
    CannotConvertClosureResult = ("E0619", Error, "cannot_convert_closure_result", "cannot convert value of type `{0}` to closure result type `{1}`"),
    CannotConvertValue = ("E0620", Error, "cannot_convert_value", "cannot convert value of type `{0}` to `{1}`"),
    CannotConvertArrayElement = ("E0621", Error, "cannot_convert_array_element", "cannot convert value of type `{0}` to expected element type `{1}`"),
    ExprKeypathValueTypeMismatch = ("E0622", Error, "expr_keypath_value_type_mismatch", "key path value type `{0}` cannot be converted to contextual type `{1}`"),
    ExprKeypathRootTypeMismatch = ("E0623", Error, "expr_keypath_root_type_mismatch", "key path with root type `{0}` cannot be applied to a base of type `{1}`"),
    GenericArgumentMismatch = ("E0624", Error, "generic_argument_mismatch", "cannot convert value of type `{0}` to `{1}`; arguments to generic parameter `{2}` (`{3}` and `{4}`) are expected to be equal"),
    InvalidAutoclosureForwarding = ("E0625", Error, "invalid_autoclosure_forwarding", "add () to forward `@autoclosure` parameter"),
    ContextualTypeDoesNotConform = ("E0626", Error, "contextual_type_does_not_conform", "value of type `{0}` does not conform to specified type `{1}`"),
    ArgumentTypeDoesNotConform = ("E0627", Error, "argument_type_does_not_conform", "argument type `{0}` does not conform to expected type `{1}`"),

    // -- requirements --
    TypeDoesNotConformDeclOwner = ("E0700", Error, "type_does_not_conform_decl_owner", "{0} `{1}` requires that `{2}` conform to `{3}`"),
    TypesNotEqualDeclOwner = ("E0701", Error, "types_not_equal_decl_owner", "{0} `{1}` requires the types `{2}` and `{3}` be equivalent"),
    TypesNotInheritedDeclOwner = ("E0702", Error, "types_not_inherited_decl_owner", "{0} `{1}` requires that `{2}` inherit from `{3}`"),
    WhereRequirementHere = ("N0703", Note, "where_requirement_here", "requirement specified as `{0}` : `{1}`"),
    CandidateTypesConformanceRequirement = ("N0704", Note, "candidate_types_conformance_requirement", "candidate requires that `{0}` conform to `{1}` (requirement specified as `{2}` : `{3}`)"),
    CandidateTypesEqualRequirement = ("N0705", Note, "candidate_types_equal_requirement", "candidate requires that the types `{0}` and `{1}` be equivalent (requirement specified as `{2}` == `{3}`)"),
    CandidateTypesInheritanceRequirement = ("N0706", Note, "candidate_types_inheritance_requirement", "candidate requires that `{0}` inherit from `{1}` (requirement specified as `{2}` : `{3}`)"),

    // -- members --
    CouldNotFindValueMember = ("E0800", Error, "could_not_find_value_member", "value of type `{0}` has no member `{1}`"),
    CouldNotFindTypeMember = ("E0801", Error, "could_not_find_type_member", "type `{0}` has no member `{1}`"),
    CouldNotUseMemberOnExistential = ("E0802", Error, "could_not_use_member_on_existential", "member `{0}` cannot be used on value of protocol type `{1}`; use a generic constraint instead"),
    CouldNotUseInstanceMemberOnType = ("E0803", Error, "could_not_use_instance_member_on_type", "instance member `{0}` cannot be used on type `{1}`"),
    CouldNotUseTypeMemberOnInstance = ("E0804", Error, "could_not_use_type_member_on_instance", "static member `{0}` cannot be used on instance of type `{1}`"),
    CandidateInaccessible = ("E0805", Error, "candidate_inaccessible", "`{0}` is inaccessible due to `{1}` protection level"),
    InitCandidateInaccessible = ("E0806", Error, "init_candidate_inaccessible", "initializer for `{0}` is inaccessible due to `{1}` protection level"),
    InaccessibleCandidateHere = ("N0807", Note, "inaccessible_candidate_here", "`{0}` declared here with `{1}` access"),
    DidNotCallFunction = ("E0808", Error, "did_not_call_function", "function `{0}` was used as a property; add () to call it"),
    DidNotCallMethod = ("E0809", Error, "did_not_call_method", "method `{0}` was used as a property; add () to call it"),
    DidNotCallFunctionValue = ("E0810", Error, "did_not_call_function_value", "function value was used as a property; add () to call it"),
    PropertyWrapperReferenceMember = ("E0811", Error, "incorrect_property_wrapper_reference_member", "referencing member `{0}` requires wrapper `{1}`"),
    WrappedValueReferenceMember = ("E0812", Error, "incorrect_wrapped_value_reference_member", "referencing member `{0}` requires wrapped value of type `{1}`"),
    SubscriptMisuse = ("E0813", Error, "could_not_find_subscript_member_did_you_mean", "value of type `{0}` has no property or method named `subscript`; did you mean to use the subscript operator?"),
    FoundCandidate = ("N0814", Note, "found_candidate", "found this candidate"),
    PartialApplicationOfFunctionInvalid = ("E0815", Error, "partial_application_of_function_invalid", "partial application of `mutating` method `{0}` is not allowed"),
    PartialApplicationOfFunctionInvalidWarning = ("W0816", Warning, "partial_application_of_function_invalid_warning", "partial application of `mutating` method `{0}` is deprecated"),
    DynamicConstructClass = ("E0817", Error, "dynamic_construct_class", "constructing an object of class type `{0}` with a metatype value must use a `required` initializer"),
    ConstructProtocolByName = ("E0818", Error, "construct_protocol_by_name", "protocol type `{0}` cannot be instantiated"),
    MissingInitOnMetatypeInitialization = ("E0819", Error, "missing_init_on_metatype_initialization", "initializing from a metatype value must reference `init` explicitly"),

    // -- arguments and closures --
    WrongArgumentLabels = ("E0900", Error, "wrong_argument_labels", "incorrect argument labels in call (have `{0}`, expected `{1}`)"),
    CandidateExpectsLabels = ("N0901", Note, "candidate_expects_labels", "candidate expects argument labels `{0}`"),
    MissingArgumentNamed = ("E0902", Error, "missing_argument_named", "missing argument for parameter `{0}` in call"),
    MissingArgumentPositional = ("E0903", Error, "missing_argument_positional", "missing argument for parameter #{0} in call"),
    MissingArgumentsMulti = ("E0904", Error, "missing_arguments_multi", "missing arguments for parameters {0} in call"),
    CandidateRequiresArgument = ("N0905", Note, "candidate_requires_argument", "candidate `{0}` requires an argument for parameter {1}"),
    ArgumentOutOfOrderNamedNamed = ("E0906", Error, "argument_out_of_order_named_named", "argument `{0}` must precede argument `{1}`"),
    ArgumentOutOfOrderNamedUnnamed = ("E0907", Error, "argument_out_of_order_named_unnamed", "argument `{0}` must precede unnamed argument #{1}"),
    ArgumentOutOfOrderUnnamedNamed = ("E0908", Error, "argument_out_of_order_unnamed_named", "unnamed argument #{0} must precede argument `{1}`"),
    ArgumentOutOfOrderUnnamedUnnamed = ("E0909", Error, "argument_out_of_order_unnamed_unnamed", "unnamed argument #{0} must precede unnamed argument #{1}"),
    ClosureTupleParameterDestructuring = ("E0910", Error, "closure_tuple_parameter_destructuring", "closure tuple parameter `{0}` does not support destructuring"),
    ClosureTupleParameterDestructuringImplicit = ("E0911", Error, "closure_tuple_parameter_destructuring_implicit", "closure tuple parameter does not support destructuring"),
    CannotReturnValueFromVoidFunc = ("E0912", Error, "cannot_return_value_from_void_func", "unexpected non-void return value in void function"),
    ExtraArgument = ("E0913", Error, "extra_argument", "extra argument in call"),
    CannotCallNonFunction = ("E0914", Error, "cannot_call_non_function", "cannot call value of non-function type `{0}`"),

    // -- key paths --
    ExprSwiftKeypathAnyobjectRoot = ("E1000", Error, "expr_swift_keypath_anyobject_root", "the root type of a key path cannot be `AnyObject`"),
    ExprKeypathSubscriptIndexNotHashable = ("E1001", Error, "expr_keypath_subscript_index_not_hashable", "subscript index of type `{0}` in a key path must be Hashable"),
    ExprKeypathStaticMember = ("E1002", Error, "expr_keypath_static_member", "key path cannot refer to static member `{0}`"),
    ExprKeypathMutatingGetter = ("E1003", Error, "expr_keypath_mutating_getter", "key path cannot refer to `{0}`, which has a mutating getter"),
    ExprKeypathNotProperty = ("E1004", Error, "expr_keypath_not_property", "key path cannot refer to instance method `{0}`"),

    // -- generics and function builders --
    UnboundGenericParameter = ("E1100", Error, "unbound_generic_parameter", "generic parameter `{0}` could not be inferred"),
    UnboundGenericParameterExplicitFix = ("N1101", Note, "unbound_generic_parameter_explicit_fix", "explicitly specify the generic arguments to fix this issue"),
    FunctionBuilderControlFlow = ("E1102", Error, "function_builder_control_flow", "closure containing control flow statement cannot be used with function builder `{0}`"),
    FunctionBuilderDecl = ("N1103", Note, "function_builder_decl", "function builder `{0}` declared here"),
    FunctionBuilderControlFlowNote = ("N1104", Note, "function_builder_control_flow_note", "closure containing control flow statement cannot be used with function builder `{0}`"),

    // -- solver --
    UseOfUnresolvedIdentifier = ("E1200", Error, "use_of_unresolved_identifier", "use of unresolved identifier `{0}`"),
    AmbiguousDeclRef = ("E1201", Error, "ambiguous_decl_ref", "ambiguous use of `{0}`"),
    NoExactMatch = ("E1202", Error, "no_exact_match", "no exact matches in call to `{0}`"),
    TypeOfExpressionIsAmbiguous = ("E1203", Error, "type_of_expression_is_ambiguous", "type of expression is ambiguous without more context"),
    FailedToProduceDiagnostic = ("E1204", Error, "failed_to_produce_diagnostic", "failed to produce diagnostic for expression"),
    SolverBudgetExceeded = ("E1205", Error, "solver_budget_exceeded", "the compiler is unable to type-check this expression in reasonable time"),
}

impl fmt::Display for DiagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Source locations (independent of tarn-ast's Span)
// ---------------------------------------------------------------------------

/// A source location for diagnostics.
///
/// Uses byte offsets. An empty range (`start == end`) is an insertion point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SourceLocation {
    pub file_id: u32,
    pub start: u32,
    pub end: u32,
}

impl SourceLocation {
    pub fn new(file_id: u32, start: u32, end: u32) -> Self {
        Self {
            file_id,
            start,
            end,
        }
    }

    /// An insertion point at `offset`.
    pub fn point(file_id: u32, offset: u32) -> Self {
        Self::new(file_id, offset, offset)
    }

    pub fn start_point(self) -> Self {
        Self::point(self.file_id, self.start)
    }

    pub fn end_point(self) -> Self {
        Self::point(self.file_id, self.end)
    }

    pub fn is_empty(self) -> bool {
        self.start == self.end
    }

    /// Range from the start of `self` to the end of `other`.
    pub fn to(self, other: SourceLocation) -> Self {
        Self::new(self.file_id, self.start.min(other.start), self.end.max(other.end))
    }
}

// ---------------------------------------------------------------------------
// Diagnostic arguments
// ---------------------------------------------------------------------------

/// A typed argument substituted into a diagnostic template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DiagArg {
    Text(String),
    Int(i64),
}

impl fmt::Display for DiagArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagArg::Text(text) => f.write_str(text),
            DiagArg::Int(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for DiagArg {
    fn from(value: &str) -> Self {
        DiagArg::Text(value.to_string())
    }
}

impl From<String> for DiagArg {
    fn from(value: String) -> Self {
        DiagArg::Text(value)
    }
}

impl From<&String> for DiagArg {
    fn from(value: &String) -> Self {
        DiagArg::Text(value.clone())
    }
}

impl From<i64> for DiagArg {
    fn from(value: i64) -> Self {
        DiagArg::Int(value)
    }
}

impl From<usize> for DiagArg {
    fn from(value: usize) -> Self {
        DiagArg::Int(value as i64)
    }
}

impl From<u32> for DiagArg {
    fn from(value: u32) -> Self {
        DiagArg::Int(i64::from(value))
    }
}

/// Build a `Vec<DiagArg>` from heterogeneous values.
#[macro_export]
macro_rules! diag_args {
    () => { Vec::<$crate::DiagArg>::new() };
    ($($arg:expr),+ $(,)?) => { vec![$($crate::DiagArg::from($arg)),+] };
}

/// Substitute `{N}` placeholders with the matching argument.
///
/// Placeholders without an argument are left verbatim so a missing argument
/// shows up in output instead of silently vanishing.
pub fn render_template(template: &str, args: &[DiagArg]) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        match after[..close].parse::<usize>() {
            Ok(index) if index < args.len() => {
                out.push_str(&args[index].to_string());
            }
            _ => out.push_str(&rest[open..open + close + 2]),
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// A textual edit attached to a diagnostic.
///
/// Insertions use an empty range; removals use empty replacement text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixIt {
    pub range: SourceLocation,
    pub text: String,
}

/// A structured diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub id: DiagId,
    pub severity: Severity,
    /// Rendered message text.
    pub message: String,
    pub args: Vec<DiagArg>,
    /// Where it went wrong.
    pub location: Option<SourceLocation>,
    pub highlights: Vec<SourceLocation>,
    pub fix_its: Vec<FixIt>,
}

impl Diagnostic {
    pub fn new(id: DiagId, args: Vec<DiagArg>) -> Self {
        Self {
            id,
            severity: id.severity(),
            message: render_template(id.template(), &args),
            args,
            location: None,
            highlights: Vec::new(),
            fix_its: Vec::new(),
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_highlight(mut self, range: SourceLocation) -> Self {
        self.highlights.push(range);
        self
    }

    pub fn with_fix_it(mut self, range: SourceLocation, text: impl Into<String>) -> Self {
        self.fix_its.push(FixIt {
            range,
            text: text.into(),
        });
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]: {}",
            self.severity.as_str(),
            self.id.code(),
            self.message
        )
    }
}

// ---------------------------------------------------------------------------
// Emission
// ---------------------------------------------------------------------------

/// Collects emitted diagnostics in emission order.
///
/// Notes are ordinary diagnostics with [`Severity::Note`] emitted right after
/// the diagnostic they belong to.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticEngine {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a diagnostic and return a handle for attaching ranges and fix-its.
    pub fn emit(
        &mut self,
        location: Option<SourceLocation>,
        id: DiagId,
        args: Vec<DiagArg>,
    ) -> DiagnosticHandle<'_> {
        let mut diag = Diagnostic::new(id, args);
        diag.location = location;
        self.diagnostics.push(diag);
        let last = self.diagnostics.len() - 1;
        DiagnosticHandle {
            diag: &mut self.diagnostics[last],
        }
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    /// Drop everything emitted after `len`. Used to roll back tentative
    /// diagnostics.
    pub fn truncate(&mut self, len: usize) {
        self.diagnostics.truncate(len);
    }

    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

/// Builder-style access to the most recently emitted diagnostic.
pub struct DiagnosticHandle<'a> {
    diag: &'a mut Diagnostic,
}

impl DiagnosticHandle<'_> {
    pub fn highlight(&mut self, range: SourceLocation) -> &mut Self {
        self.diag.highlights.push(range);
        self
    }

    pub fn fix_it_replace(&mut self, range: SourceLocation, text: impl Into<String>) -> &mut Self {
        self.diag.fix_its.push(FixIt {
            range,
            text: text.into(),
        });
        self
    }

    pub fn fix_it_insert(&mut self, at: SourceLocation, text: impl Into<String>) -> &mut Self {
        self.fix_it_replace(at.start_point(), text)
    }

    pub fn fix_it_insert_after(&mut self, range: SourceLocation, text: impl Into<String>) -> &mut Self {
        self.fix_it_replace(range.end_point(), text)
    }

    pub fn fix_it_remove(&mut self, range: SourceLocation) -> &mut Self {
        self.fix_it_replace(range, "")
    }

    pub fn id(&self) -> DiagId {
        self.diag.id
    }
}

// ---------------------------------------------------------------------------
// Error type for crates that produce diagnostics
// ---------------------------------------------------------------------------

/// Error type wrapping one or more diagnostics.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", .0.first().map(|d| d.to_string()).unwrap_or_default())]
pub struct DiagnosticError(pub Vec<Diagnostic>);

impl DiagnosticError {
    pub fn single(diag: Diagnostic) -> Self {
        Self(vec![diag])
    }

    pub fn multiple(diags: Vec<Diagnostic>) -> Self {
        Self(diags)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.0
    }
}
