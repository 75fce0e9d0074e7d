//! Declaration and expression nodes for tarn.
//!
//! Declarations and expressions live in arenas owned by a [`Module`] and are
//! addressed by [`DeclId`] and [`ExprId`]. Nodes are immutable once the
//! module is built; everything the checker learns about a declaration is kept
//! in side tables keyed by its id.

mod module;

pub use module::{ExprParent, LoadError, Module, ModuleBuilder, ModuleData};

use serde::{Deserialize, Serialize};
use tarn_diag::SourceLocation;

/// Identifies a source file in the compilation session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct FileId(pub u32);

/// A byte offset range within a source file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Span {
    pub file: FileId,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(file: FileId, start: u32, end: u32) -> Self {
        Self { file, start, end }
    }

    /// Create a span that covers both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        debug_assert_eq!(
            self.file, other.file,
            "cannot merge spans from different files"
        );
        Span {
            file: self.file,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// A synthetic span for compiler-generated nodes.
    pub fn synthetic() -> Self {
        Self {
            file: FileId(u32::MAX),
            start: 0,
            end: 0,
        }
    }

    pub fn is_synthetic(self) -> bool {
        self.file == FileId(u32::MAX)
    }

    pub fn loc(self) -> SourceLocation {
        SourceLocation::new(self.file.0, self.start, self.end)
    }

    /// The location to report at, or `None` for synthesized nodes.
    pub fn report_loc(self) -> Option<SourceLocation> {
        (!self.is_synthetic()).then(|| self.loc())
    }
}

impl From<Span> for SourceLocation {
    fn from(span: Span) -> Self {
        span.loc()
    }
}

/// A value paired with its source location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            node: f(self.node),
            span: self.span,
        }
    }
}

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

/// Arena index of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeclId(pub u32);

/// Arena index of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExprId(pub u32);

impl DeclId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ---------------------------------------------------------------------------
// Literals
// ---------------------------------------------------------------------------

/// Literal values. Float literals keep their source text so nodes stay `Eq`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Int(i64),
    Float(String),
    String(String),
    Bool(bool),
    Nil,
}

impl Literal {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Literal::Int(_) => "integer",
            Literal::Float(_) => "floating-point",
            Literal::String(_) => "string",
            Literal::Bool(_) => "boolean",
            Literal::Nil => "nil",
        }
    }
}

// ---------------------------------------------------------------------------
// Type representations
// ---------------------------------------------------------------------------

/// Written type, as it appears in source.
pub type TypeRepr = Spanned<TypeReprKind>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeReprKind {
    /// `Int`, `Self`, `AnyObject`.
    Ident(String),
    /// `Outer.Inner`.
    Member { base: Box<TypeRepr>, name: String },
    /// `Box<Int>`.
    Generic {
        base: Box<TypeRepr>,
        args: Vec<TypeRepr>,
    },
    /// `T?`.
    Optional(Box<TypeRepr>),
    /// `(A, B) -> R`, optionally `@escaping` or `@autoclosure`.
    Function {
        params: Vec<TypeRepr>,
        result: Box<TypeRepr>,
        #[serde(default)]
        escaping: bool,
        #[serde(default)]
        autoclosure: bool,
    },
    /// `(A, B)`; `()` is `Void`.
    Tuple(Vec<TypeRepr>),
    /// `P & Q`.
    Composition(Vec<TypeRepr>),
    /// `T.Type`.
    Metatype(Box<TypeRepr>),
    /// `inout T`.
    InOut(Box<TypeRepr>),
}

impl TypeReprKind {
    /// Source-like rendering used in diagnostics and fix-its.
    pub fn display(&self) -> String {
        match self {
            TypeReprKind::Ident(name) => name.clone(),
            TypeReprKind::Member { base, name } => format!("{}.{name}", base.node.display()),
            TypeReprKind::Generic { base, args } => format!(
                "{}<{}>",
                base.node.display(),
                args.iter()
                    .map(|a| a.node.display())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            TypeReprKind::Optional(inner) => format!("{}?", inner.node.display()),
            TypeReprKind::Function {
                params,
                result,
                escaping,
                autoclosure,
            } => {
                let mut out = String::new();
                if *autoclosure {
                    out.push_str("@autoclosure ");
                }
                if *escaping {
                    out.push_str("@escaping ");
                }
                out.push('(');
                out.push_str(
                    &params
                        .iter()
                        .map(|p| p.node.display())
                        .collect::<Vec<_>>()
                        .join(", "),
                );
                out.push_str(") -> ");
                out.push_str(&result.node.display());
                out
            }
            TypeReprKind::Tuple(elems) => format!(
                "({})",
                elems
                    .iter()
                    .map(|e| e.node.display())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            TypeReprKind::Composition(members) => members
                .iter()
                .map(|m| m.node.display())
                .collect::<Vec<_>>()
                .join(" & "),
            TypeReprKind::Metatype(inner) => format!("{}.Type", inner.node.display()),
            TypeReprKind::InOut(inner) => format!("inout {}", inner.node.display()),
        }
    }
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Private,
    #[default]
    Internal,
    Public,
}

impl AccessLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessLevel::Private => "private",
            AccessLevel::Internal => "internal",
            AccessLevel::Public => "public",
        }
    }
}

/// A custom attribute such as `@Clamped`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomAttr {
    pub name: Spanned<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Attributes {
    pub access: AccessLevel,
    pub is_final: bool,
    pub is_static: bool,
    pub is_override: bool,
    pub is_mutating: bool,
    /// `@propertyWrapper` on a nominal type.
    pub is_property_wrapper: bool,
    /// A computed property whose getter is `mutating`.
    pub mutating_getter: bool,
    /// `required` initializer.
    pub is_required: bool,
    /// Span of the first modifier keyword, where `override ` is inserted.
    pub modifiers_start: Option<Span>,
    pub custom: Vec<CustomAttr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericParamDecl {
    pub name: Spanned<String>,
    /// Inline constraints: `T: P`.
    #[serde(default)]
    pub constraints: Vec<TypeRepr>,
}

/// A `where` clause entry: `T: P` or `T == U`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementRepr {
    pub subject: TypeRepr,
    pub constraint: TypeRepr,
    #[serde(default)]
    pub same_type: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDecl {
    /// Argument label; `None` for `_`.
    pub label: Option<String>,
    pub name: Spanned<String>,
    pub ty: TypeRepr,
    #[serde(default)]
    pub has_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FuncSignature {
    #[serde(default)]
    pub params: Vec<ParamDecl>,
    #[serde(default)]
    pub result: Option<TypeRepr>,
}

impl FuncSignature {
    /// Labels rendered the way a declaration name shows them: `f(_:to:)`.
    pub fn label_list(&self) -> String {
        self.params
            .iter()
            .map(|p| format!("{}:", p.label.as_deref().unwrap_or("_")))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclKind {
    Class,
    Struct,
    Enum,
    Protocol,
    TypeAlias {
        underlying: TypeRepr,
    },
    EnumCase {
        #[serde(default)]
        raw_value: Option<Spanned<Literal>>,
        /// Associated value types.
        #[serde(default)]
        params: Vec<TypeRepr>,
    },
    Var {
        is_let: bool,
        #[serde(default)]
        ty: Option<TypeRepr>,
        #[serde(default)]
        init: Option<ExprId>,
    },
    Func {
        signature: FuncSignature,
        #[serde(default)]
        body: Vec<ExprId>,
    },
    Init {
        signature: FuncSignature,
        #[serde(default)]
        body: Vec<ExprId>,
    },
    Subscript {
        signature: FuncSignature,
    },
    TopLevelCode {
        expr: ExprId,
    },
}

/// A declaration node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decl {
    pub name: String,
    pub name_span: Span,
    /// Full extent of the declaration.
    pub span: Span,
    pub kind: DeclKind,
    /// Enclosing declaration; `None` at file scope.
    #[serde(default)]
    pub parent: Option<DeclId>,
    /// Inheritance clause entries in source order.
    #[serde(default)]
    pub inherited: Vec<TypeRepr>,
    #[serde(default)]
    pub members: Vec<DeclId>,
    #[serde(default)]
    pub generic_params: Vec<GenericParamDecl>,
    #[serde(default)]
    pub where_clause: Vec<RequirementRepr>,
    #[serde(default)]
    pub attrs: Attributes,
}

impl Decl {
    pub fn new(name: impl Into<String>, kind: DeclKind, name_span: Span) -> Self {
        Self {
            name: name.into(),
            name_span,
            span: name_span,
            kind,
            parent: None,
            inherited: Vec::new(),
            members: Vec::new(),
            generic_params: Vec::new(),
            where_clause: Vec::new(),
            attrs: Attributes::default(),
        }
    }

    pub fn is_nominal(&self) -> bool {
        matches!(
            self.kind,
            DeclKind::Class | DeclKind::Struct | DeclKind::Enum | DeclKind::Protocol
        )
    }

    pub fn is_type_decl(&self) -> bool {
        self.is_nominal() || matches!(self.kind, DeclKind::TypeAlias { .. })
    }

    pub fn is_class(&self) -> bool {
        matches!(self.kind, DeclKind::Class)
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self.kind, DeclKind::Protocol)
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.kind, DeclKind::Enum)
    }

    pub fn is_func_like(&self) -> bool {
        matches!(
            self.kind,
            DeclKind::Func { .. } | DeclKind::Init { .. } | DeclKind::Subscript { .. }
        )
    }

    pub fn is_let(&self) -> bool {
        matches!(self.kind, DeclKind::Var { is_let: true, .. })
    }

    pub fn signature(&self) -> Option<&FuncSignature> {
        match &self.kind {
            DeclKind::Func { signature, .. }
            | DeclKind::Init { signature, .. }
            | DeclKind::Subscript { signature } => Some(signature),
            _ => None,
        }
    }

    pub fn body(&self) -> &[ExprId] {
        match &self.kind {
            DeclKind::Func { body, .. } | DeclKind::Init { body, .. } => body,
            _ => &[],
        }
    }

    /// Human-readable kind, as used in "declared here" notes.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            DeclKind::Class => "class",
            DeclKind::Struct => "struct",
            DeclKind::Enum => "enum",
            DeclKind::Protocol => "protocol",
            DeclKind::TypeAlias { .. } => "type alias",
            DeclKind::EnumCase { .. } => "enum case",
            DeclKind::Var { is_let: true, .. } => "let",
            DeclKind::Var { .. } => "var",
            DeclKind::Func { .. } if self.parent.is_some() => "instance method",
            DeclKind::Func { .. } => "global function",
            DeclKind::Init { .. } => "initializer",
            DeclKind::Subscript { .. } => "subscript",
            DeclKind::TopLevelCode { .. } => "top-level code",
        }
    }

    /// Full name including argument labels for function-like decls.
    pub fn full_name(&self) -> String {
        match self.signature() {
            Some(signature) => format!("{}({})", self.name, signature.label_list()),
            None => self.name.clone(),
        }
    }

    /// End of the declaration header before the inheritance clause: the end of
    /// the name or of the last generic parameter.
    pub fn header_end(&self) -> u32 {
        self.generic_params
            .iter()
            .map(|p| p.name.span.end + 1)
            .max()
            .unwrap_or(self.name_span.end)
            .max(self.name_span.end)
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

pub type Expr = Spanned<ExprKind>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    pub label: Option<Spanned<String>>,
    pub value: ExprId,
}

impl Argument {
    pub fn label_str(&self) -> Option<&str> {
        self.label.as_ref().map(|l| l.node.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureParam {
    pub name: Spanned<String>,
    #[serde(default)]
    pub ty: Option<TypeRepr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPathComponentKind {
    Property(String),
    Subscript(Vec<Argument>),
    OptionalChain,
    OptionalForce,
}

pub type KeyPathComponent = Spanned<KeyPathComponentKind>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprKind {
    Literal(Literal),
    /// Unqualified name reference.
    DeclRef { name: String },
    /// A type used as a value: `Point`, `Box<Int>`.
    TypeRef { repr: TypeRepr },
    /// `base.name`.
    Member {
        base: ExprId,
        name: Spanned<String>,
    },
    /// `callee(args)`.
    Call { callee: ExprId, args: Vec<Argument> },
    /// `base[args]`.
    Subscript { base: ExprId, args: Vec<Argument> },
    /// `dest = source`.
    Assign { dest: ExprId, source: ExprId },
    /// `&expr`.
    AddressOf(ExprId),
    /// `expr!`.
    ForceValue(ExprId),
    /// `expr?` inside an optional chain.
    BindOptional(ExprId),
    /// The outermost expression of an optional chain.
    OptionalChain(ExprId),
    /// `expr as T`.
    Coerce {
        expr: ExprId,
        ty: TypeRepr,
        as_span: Span,
    },
    /// `expr as! T`.
    ForcedCast {
        expr: ExprId,
        ty: TypeRepr,
        as_span: Span,
    },
    /// `expr as? T`.
    ConditionalCast {
        expr: ExprId,
        ty: TypeRepr,
        as_span: Span,
    },
    Closure {
        params: Vec<ClosureParam>,
        body: Vec<ExprId>,
    },
    Return(Option<ExprId>),
    Tuple(Vec<Argument>),
    Paren(ExprId),
    Array(Vec<ExprId>),
    /// `\Root.a.b`.
    KeyPath {
        root: Option<TypeRepr>,
        components: Vec<KeyPathComponent>,
    },
}

impl ExprKind {
    /// Direct sub-expressions in source order.
    pub fn children(&self) -> Vec<ExprId> {
        match self {
            ExprKind::Literal(_) | ExprKind::DeclRef { .. } | ExprKind::TypeRef { .. } => {
                Vec::new()
            }
            ExprKind::Member { base, .. } => vec![*base],
            ExprKind::Call { callee, args } => std::iter::once(*callee)
                .chain(args.iter().map(|a| a.value))
                .collect(),
            ExprKind::Subscript { base, args } => std::iter::once(*base)
                .chain(args.iter().map(|a| a.value))
                .collect(),
            ExprKind::Assign { dest, source } => vec![*dest, *source],
            ExprKind::AddressOf(inner)
            | ExprKind::ForceValue(inner)
            | ExprKind::BindOptional(inner)
            | ExprKind::OptionalChain(inner)
            | ExprKind::Paren(inner) => vec![*inner],
            ExprKind::Coerce { expr, .. }
            | ExprKind::ForcedCast { expr, .. }
            | ExprKind::ConditionalCast { expr, .. } => vec![*expr],
            ExprKind::Closure { body, .. } => body.clone(),
            ExprKind::Return(value) => value.iter().copied().collect(),
            ExprKind::Tuple(elems) => elems.iter().map(|a| a.value).collect(),
            ExprKind::Array(elems) => elems.clone(),
            ExprKind::KeyPath { components, .. } => components
                .iter()
                .flat_map(|c| match &c.node {
                    KeyPathComponentKind::Subscript(args) => {
                        args.iter().map(|a| a.value).collect::<Vec<_>>()
                    }
                    _ => Vec::new(),
                })
                .collect(),
        }
    }

    /// Whether a postfix operator can be appended without parentheses.
    pub fn accepts_postfix(&self) -> bool {
        matches!(
            self,
            ExprKind::Literal(_)
                | ExprKind::DeclRef { .. }
                | ExprKind::TypeRef { .. }
                | ExprKind::Member { .. }
                | ExprKind::Call { .. }
                | ExprKind::Subscript { .. }
                | ExprKind::ForceValue(_)
                | ExprKind::BindOptional(_)
                | ExprKind::OptionalChain(_)
                | ExprKind::Paren(_)
                | ExprKind::Tuple(_)
                | ExprKind::Array(_)
                | ExprKind::KeyPath { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sp(start: u32, end: u32) -> Span {
        Span::new(FileId(0), start, end)
    }

    #[test]
    fn span_merge() {
        let a = sp(10, 20);
        let b = sp(15, 30);
        let merged = a.merge(b);
        assert_eq!(merged.start, 10);
        assert_eq!(merged.end, 30);
    }

    #[test]
    fn synthetic_spans_have_no_report_location() {
        assert_eq!(Span::synthetic().report_loc(), None);
        assert_eq!(
            sp(1, 2).report_loc(),
            Some(SourceLocation::new(0, 1, 2))
        );
    }

    #[test]
    fn spanned_map() {
        let s = Spanned::new(42, sp(0, 1));
        let s2 = s.map(|n| n.to_string());
        assert_eq!(s2.node, "42");
    }

    #[test]
    fn type_repr_display() {
        let int = Spanned::new(TypeReprKind::Ident("Int".into()), sp(0, 3));
        let opt = TypeReprKind::Optional(Box::new(int.clone()));
        assert_eq!(opt.display(), "Int?");
        let func = TypeReprKind::Function {
            params: vec![int.clone()],
            result: Box::new(int),
            escaping: true,
            autoclosure: false,
        };
        assert_eq!(func.display(), "@escaping (Int) -> Int");
    }

    #[test]
    fn full_name_includes_labels() {
        let int = Spanned::new(TypeReprKind::Ident("Int".into()), sp(0, 3));
        let decl = Decl::new(
            "move",
            DeclKind::Func {
                signature: FuncSignature {
                    params: vec![
                        ParamDecl {
                            label: None,
                            name: Spanned::new("x".into(), sp(0, 1)),
                            ty: int.clone(),
                            has_default: false,
                        },
                        ParamDecl {
                            label: Some("to".into()),
                            name: Spanned::new("y".into(), sp(0, 1)),
                            ty: int,
                            has_default: false,
                        },
                    ],
                    result: None,
                },
                body: Vec::new(),
            },
            sp(0, 4),
        );
        assert_eq!(decl.full_name(), "move(_:to:)");
        assert_eq!(decl.kind_name(), "global function");
    }

    #[test]
    fn children_follow_source_order() {
        let call = ExprKind::Call {
            callee: ExprId(0),
            args: vec![
                Argument {
                    label: None,
                    value: ExprId(1),
                },
                Argument {
                    label: Some(Spanned::new("b".into(), sp(0, 1))),
                    value: ExprId(2),
                },
            ],
        };
        assert_eq!(call.children(), vec![ExprId(0), ExprId(1), ExprId(2)]);
        assert!(call.accepts_postfix());
        let assign = ExprKind::Assign {
            dest: ExprId(0),
            source: ExprId(1),
        };
        assert!(!assign.accepts_postfix());
    }
}
