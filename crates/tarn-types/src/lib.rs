//! Semantic types for tarn.
//!
//! These are the resolved types the checker and the constraint solver work
//! with. Written types live in `tarn-ast` as `TypeRepr`; resolving one into a
//! [`Type`] is the job of `tarn-sema`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tarn_ast::DeclId;
use tarn_diag::DiagArg;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Unique identifier for a type variable during constraint solving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeVarId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NominalKind {
    Class,
    Struct,
    Enum,
}

/// A named protocol. Protocols declared in the module carry their decl;
/// the handful of builtin protocols (`Hashable`, `Equatable`, the literal
/// protocols) are identified by name alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProtocolRef {
    pub decl: Option<DeclId>,
    pub name: String,
}

impl ProtocolRef {
    pub fn declared(decl: DeclId, name: impl Into<String>) -> Self {
        Self {
            decl: Some(decl),
            name: name.into(),
        }
    }

    pub fn builtin(name: impl Into<String>) -> Self {
        Self {
            decl: None,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NominalType {
    pub decl: DeclId,
    pub name: String,
    pub kind: NominalKind,
    pub args: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionParam {
    pub label: Option<String>,
    /// `Type::InOut` for `inout` parameters.
    pub ty: Type,
    pub autoclosure: bool,
    pub has_default: bool,
}

impl FunctionParam {
    pub fn new(label: Option<String>, ty: Type) -> Self {
        Self {
            label,
            ty,
            autoclosure: false,
            has_default: false,
        }
    }

    pub fn unlabeled(ty: Type) -> Self {
        Self::new(None, ty)
    }

    pub fn is_inout(&self) -> bool {
        matches!(self.ty, Type::InOut(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionType {
    pub params: Vec<FunctionParam>,
    pub result: Box<Type>,
    pub escaping: bool,
}

impl FunctionType {
    pub fn new(params: Vec<FunctionParam>, result: Type) -> Self {
        Self {
            params,
            result: Box::new(result),
            escaping: false,
        }
    }

    pub fn escaping(mut self) -> Self {
        self.escaping = true;
        self
    }

    pub fn labels(&self) -> Vec<Option<&str>> {
        self.params.iter().map(|p| p.label.as_deref()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GenericParamType {
    pub depth: u32,
    pub index: u32,
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Type {
    Int,
    Double,
    Bool,
    String,
    Void,
    Any,
    AnyObject,
    Nominal(NominalType),
    /// A protocol or protocol composition used as a type.
    Existential(Vec<ProtocolRef>),
    Optional(Box<Type>),
    Array(Box<Type>),
    Function(FunctionType),
    Tuple(Vec<Type>),
    Metatype(Box<Type>),
    /// A mutable storage location holding the wrapped type.
    LValue(Box<Type>),
    InOut(Box<Type>),
    KeyPath {
        root: Box<Type>,
        value: Box<Type>,
        writable: bool,
    },
    GenericParam {
        name: String,
        param: GenericParamType,
    },
    Var(TypeVarId),
    /// Sentinel for a type that could not be resolved. Already diagnosed.
    Error,
}

impl Type {
    pub fn optional(inner: Type) -> Type {
        Type::Optional(Box::new(inner))
    }

    pub fn array(element: Type) -> Type {
        Type::Array(Box::new(element))
    }

    pub fn metatype(instance: Type) -> Type {
        Type::Metatype(Box::new(instance))
    }

    pub fn lvalue(object: Type) -> Type {
        match object {
            Type::LValue(_) => object,
            other => Type::LValue(Box::new(other)),
        }
    }

    pub fn inout(object: Type) -> Type {
        Type::InOut(Box::new(object))
    }

    pub fn function(params: Vec<FunctionParam>, result: Type) -> Type {
        Type::Function(FunctionType::new(params, result))
    }

    pub fn nominal(decl: DeclId, name: impl Into<String>, kind: NominalKind) -> Type {
        Type::Nominal(NominalType {
            decl,
            name: name.into(),
            kind,
            args: Vec::new(),
        })
    }

    pub fn protocol(proto: ProtocolRef) -> Type {
        Type::Existential(vec![proto])
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Type::Var(_))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Type::Optional(_))
    }

    pub fn is_lvalue(&self) -> bool {
        matches!(self, Type::LValue(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Type::Function(_))
    }

    pub fn is_existential(&self) -> bool {
        matches!(self, Type::Existential(_) | Type::Any | Type::AnyObject)
    }

    pub fn is_metatype(&self) -> bool {
        matches!(self, Type::Metatype(_))
    }

    /// Class instances and `AnyObject`.
    pub fn is_class_bound(&self) -> bool {
        matches!(
            self,
            Type::AnyObject
                | Type::Nominal(NominalType {
                    kind: NominalKind::Class,
                    ..
                })
        )
    }

    pub fn optional_object(&self) -> Option<&Type> {
        match self {
            Type::Optional(inner) => Some(inner),
            _ => None,
        }
    }

    /// Strip every level of optionality: `Int??` -> `Int`.
    pub fn lookthrough_all_optionals(&self) -> &Type {
        let mut current = self;
        while let Type::Optional(inner) = current {
            current = inner;
        }
        current
    }

    pub fn optional_depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self;
        while let Type::Optional(inner) = current {
            depth += 1;
            current = inner;
        }
        depth
    }

    /// The value type of an lvalue or inout; the type itself otherwise.
    pub fn rvalue(&self) -> &Type {
        match self {
            Type::LValue(inner) | Type::InOut(inner) => inner,
            other => other,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionType> {
        match self {
            Type::Function(func) => Some(func),
            _ => None,
        }
    }

    pub fn as_nominal(&self) -> Option<&NominalType> {
        match self {
            Type::Nominal(nominal) => Some(nominal),
            _ => None,
        }
    }

    pub fn nominal_decl(&self) -> Option<DeclId> {
        self.as_nominal().map(|n| n.decl)
    }

    pub fn metatype_instance(&self) -> Option<&Type> {
        match self {
            Type::Metatype(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn has_type_vars(&self) -> bool {
        self.any(&mut |ty| matches!(ty, Type::Var(_)))
    }

    pub fn has_error(&self) -> bool {
        self.any(&mut |ty| matches!(ty, Type::Error))
    }

    pub fn has_generic_params(&self) -> bool {
        self.any(&mut |ty| matches!(ty, Type::GenericParam { .. }))
    }

    /// Direct structural children.
    pub fn children(&self) -> Vec<&Type> {
        match self {
            Type::Int
            | Type::Double
            | Type::Bool
            | Type::String
            | Type::Void
            | Type::Any
            | Type::AnyObject
            | Type::Existential(_)
            | Type::GenericParam { .. }
            | Type::Var(_)
            | Type::Error => Vec::new(),
            Type::Nominal(nominal) => nominal.args.iter().collect(),
            Type::Optional(inner)
            | Type::Array(inner)
            | Type::Metatype(inner)
            | Type::LValue(inner)
            | Type::InOut(inner) => vec![inner],
            Type::Function(func) => func
                .params
                .iter()
                .map(|p| &p.ty)
                .chain(std::iter::once(func.result.as_ref()))
                .collect(),
            Type::Tuple(elems) => elems.iter().collect(),
            Type::KeyPath { root, value, .. } => vec![root, value],
        }
    }

    /// Whether `pred` holds for this type or any nested type.
    pub fn any(&self, pred: &mut impl FnMut(&Type) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        self.children().into_iter().any(|child| child.any(pred))
    }

    /// Rebuild the type bottom-up, replacing every node for which `f`
    /// returns `Some`. Replacements are not revisited.
    pub fn transform(&self, f: &mut impl FnMut(&Type) -> Option<Type>) -> Type {
        if let Some(replacement) = f(self) {
            return replacement;
        }
        match self {
            Type::Nominal(nominal) => Type::Nominal(NominalType {
                decl: nominal.decl,
                name: nominal.name.clone(),
                kind: nominal.kind,
                args: nominal.args.iter().map(|a| a.transform(f)).collect(),
            }),
            Type::Optional(inner) => Type::optional(inner.transform(f)),
            Type::Array(inner) => Type::array(inner.transform(f)),
            Type::Metatype(inner) => Type::metatype(inner.transform(f)),
            Type::LValue(inner) => Type::LValue(Box::new(inner.transform(f))),
            Type::InOut(inner) => Type::inout(inner.transform(f)),
            Type::Function(func) => Type::Function(FunctionType {
                params: func
                    .params
                    .iter()
                    .map(|p| FunctionParam {
                        label: p.label.clone(),
                        ty: p.ty.transform(f),
                        autoclosure: p.autoclosure,
                        has_default: p.has_default,
                    })
                    .collect(),
                result: Box::new(func.result.transform(f)),
                escaping: func.escaping,
            }),
            Type::Tuple(elems) => Type::Tuple(elems.iter().map(|e| e.transform(f)).collect()),
            Type::KeyPath {
                root,
                value,
                writable,
            } => Type::KeyPath {
                root: Box::new(root.transform(f)),
                value: Box::new(value.transform(f)),
                writable: *writable,
            },
            leaf => leaf.clone(),
        }
    }

    /// Replace generic parameters by the given arguments.
    pub fn subst_generic_params(&self, args: &BTreeMap<GenericParamType, Type>) -> Type {
        self.transform(&mut |ty| match ty {
            Type::GenericParam { param, .. } => args.get(param).cloned(),
            _ => None,
        })
    }

    /// Conformance of builtin types to builtin protocols. `None` when the
    /// answer depends on declarations (nominal types, declared protocols).
    pub fn builtin_conforms_to(&self, protocol: &str) -> Option<bool> {
        let equatable = matches!(protocol, "Equatable" | "Hashable");
        match self {
            Type::Int => Some(
                equatable
                    || matches!(protocol, "Comparable" | "ExpressibleByIntegerLiteral"),
            ),
            Type::Double => Some(
                equatable
                    || matches!(
                        protocol,
                        "Comparable" | "ExpressibleByIntegerLiteral" | "ExpressibleByFloatLiteral"
                    ),
            ),
            Type::String => Some(
                equatable || matches!(protocol, "Comparable" | "ExpressibleByStringLiteral"),
            ),
            Type::Bool => Some(equatable || protocol == "ExpressibleByBooleanLiteral"),
            Type::Optional(inner) => {
                if protocol == "ExpressibleByNilLiteral" {
                    Some(true)
                } else if equatable {
                    inner.builtin_conforms_to(protocol)
                } else {
                    Some(false)
                }
            }
            Type::Array(element) => {
                if protocol == "ExpressibleByArrayLiteral" {
                    Some(true)
                } else if equatable {
                    element.builtin_conforms_to(protocol)
                } else {
                    Some(false)
                }
            }
            Type::Void
            | Type::Any
            | Type::AnyObject
            | Type::Function(_)
            | Type::Tuple(_)
            | Type::Metatype(_)
            | Type::KeyPath { .. } => Some(false),
            Type::Error => Some(true),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "Int"),
            Type::Double => write!(f, "Double"),
            Type::Bool => write!(f, "Bool"),
            Type::String => write!(f, "String"),
            Type::Void => write!(f, "()"),
            Type::Any => write!(f, "Any"),
            Type::AnyObject => write!(f, "AnyObject"),
            Type::Nominal(nominal) => {
                write!(f, "{}", nominal.name)?;
                if !nominal.args.is_empty() {
                    write!(f, "<")?;
                    write_joined(f, &nominal.args, ", ")?;
                    write!(f, ">")?;
                }
                Ok(())
            }
            Type::Existential(protos) => {
                if protos.is_empty() {
                    return write!(f, "Any");
                }
                for (i, proto) in protos.iter().enumerate() {
                    if i > 0 {
                        write!(f, " & ")?;
                    }
                    write!(f, "{}", proto.name)?;
                }
                Ok(())
            }
            Type::Optional(inner) => match inner.as_ref() {
                Type::Function(_) | Type::Existential(_) => write!(f, "({inner})?"),
                _ => write!(f, "{inner}?"),
            },
            Type::Array(element) => write!(f, "[{element}]"),
            Type::Function(func) => {
                if func.escaping {
                    write!(f, "@escaping ")?;
                }
                write!(f, "(")?;
                for (i, param) in func.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if param.autoclosure {
                        write!(f, "@autoclosure ")?;
                    }
                    write!(f, "{}", param.ty)?;
                }
                write!(f, ") -> {}", func.result)
            }
            Type::Tuple(elems) => {
                write!(f, "(")?;
                write_joined(f, elems, ", ")?;
                write!(f, ")")
            }
            Type::Metatype(inner) => match inner.as_ref() {
                Type::Existential(_) => write!(f, "({inner}).Type"),
                _ => write!(f, "{inner}.Type"),
            },
            Type::LValue(inner) => write!(f, "@lvalue {inner}"),
            Type::InOut(inner) => write!(f, "inout {inner}"),
            Type::KeyPath {
                root,
                value,
                writable,
            } => {
                let name = if *writable {
                    "WritableKeyPath"
                } else {
                    "KeyPath"
                };
                write!(f, "{name}<{root}, {value}>")
            }
            Type::GenericParam { name, .. } => write!(f, "{name}"),
            // Unresolved variables never reach users by name.
            Type::Var(_) => write!(f, "_"),
            Type::Error => write!(f, "<<error type>>"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, types: &[Type], sep: &str) -> fmt::Result {
    for (i, ty) in types.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{ty}")?;
    }
    Ok(())
}

impl From<&Type> for DiagArg {
    fn from(ty: &Type) -> Self {
        DiagArg::Text(ty.to_string())
    }
}

impl From<Type> for DiagArg {
    fn from(ty: Type) -> Self {
        DiagArg::Text(ty.to_string())
    }
}

// ---------------------------------------------------------------------------
// Substitution
// ---------------------------------------------------------------------------

/// Bindings from type variables to types, built up during solving.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitution {
    type_map: BTreeMap<TypeVarId, Type>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, var: TypeVarId, ty: Type) {
        self.type_map.insert(var, ty);
    }

    pub fn lookup(&self, var: TypeVarId) -> Option<&Type> {
        self.type_map.get(&var)
    }

    pub fn is_bound(&self, var: TypeVarId) -> bool {
        self.type_map.contains_key(&var)
    }

    pub fn bindings(&self) -> &BTreeMap<TypeVarId, Type> {
        &self.type_map
    }

    pub fn len(&self) -> usize {
        self.type_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.type_map.is_empty()
    }

    /// Apply this substitution to a type, replacing all bound variables.
    pub fn apply(&self, ty: &Type) -> Type {
        ty.transform(&mut |t| match t {
            Type::Var(v) => self.lookup(*v).map(|bound| self.apply(bound)),
            _ => None,
        })
    }

    /// Follow variable-to-variable bindings to the representative.
    pub fn shallow_resolve(&self, ty: &Type) -> Type {
        let mut current = ty.clone();
        while let Type::Var(v) = current {
            match self.lookup(v) {
                Some(bound) => current = bound.clone(),
                None => break,
            }
        }
        current
    }
}

/// Collect all free type variables in a type.
pub fn free_type_vars(ty: &Type) -> BTreeSet<TypeVarId> {
    let mut vars = BTreeSet::new();
    ty.any(&mut |t| {
        if let Type::Var(v) = t {
            vars.insert(*v);
        }
        false
    });
    vars
}

/// Whether binding `var` to `ty` would create an infinite type.
pub fn occurs_in(var: TypeVarId, ty: &Type) -> bool {
    ty.any(&mut |t| matches!(t, Type::Var(v) if *v == var))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn point() -> Type {
        Type::nominal(DeclId(0), "Point", NominalKind::Struct)
    }

    #[test]
    fn display_common_types() {
        assert_eq!(Type::optional(Type::Int).to_string(), "Int?");
        assert_eq!(Type::array(Type::String).to_string(), "[String]");
        let func = Type::function(vec![FunctionParam::unlabeled(Type::Int)], Type::Bool);
        assert_eq!(func.to_string(), "(Int) -> Bool");
        assert_eq!(Type::optional(func).to_string(), "((Int) -> Bool)?");
        assert_eq!(Type::metatype(point()).to_string(), "Point.Type");
        assert_eq!(Type::Var(TypeVarId(3)).to_string(), "_");
        let kp = Type::KeyPath {
            root: Box::new(point()),
            value: Box::new(Type::Int),
            writable: true,
        };
        assert_eq!(kp.to_string(), "WritableKeyPath<Point, Int>");
    }

    #[test]
    fn lookthrough_optionals() {
        let ty = Type::optional(Type::optional(Type::Int));
        assert_eq!(ty.optional_depth(), 2);
        assert_eq!(ty.lookthrough_all_optionals(), &Type::Int);
    }

    #[test]
    fn apply_follows_chains() {
        let mut subst = Substitution::new();
        subst.bind(TypeVarId(0), Type::Var(TypeVarId(1)));
        subst.bind(TypeVarId(1), Type::Int);
        let ty = Type::optional(Type::Var(TypeVarId(0)));
        assert_eq!(subst.apply(&ty), Type::optional(Type::Int));
        assert_eq!(subst.shallow_resolve(&Type::Var(TypeVarId(0))), Type::Int);
    }

    #[test]
    fn generic_param_substitution() {
        let param = GenericParamType { depth: 0, index: 0 };
        let t = Type::GenericParam {
            name: "T".into(),
            param,
        };
        let args = BTreeMap::from([(param, Type::String)]);
        assert_eq!(
            Type::array(t).subst_generic_params(&args),
            Type::array(Type::String)
        );
    }

    #[test]
    fn builtin_conformances() {
        assert_eq!(Type::Int.builtin_conforms_to("Hashable"), Some(true));
        assert_eq!(
            Type::optional(Type::Int).builtin_conforms_to("ExpressibleByNilLiteral"),
            Some(true)
        );
        assert_eq!(Type::Void.builtin_conforms_to("Hashable"), Some(false));
        assert_eq!(point().builtin_conforms_to("Hashable"), None);
    }

    #[test]
    fn type_renders_as_diag_arg() {
        let arg: DiagArg = (&Type::optional(Type::Int)).into();
        assert_eq!(arg, DiagArg::Text("Int?".into()));
    }

    fn arb_type() -> impl Strategy<Value = Type> {
        let leaf = prop_oneof![
            Just(Type::Int),
            Just(Type::Bool),
            Just(Type::String),
            (0u32..4).prop_map(|v| Type::Var(TypeVarId(v))),
        ];
        leaf.prop_recursive(3, 16, 3, |inner| {
            prop_oneof![
                inner.clone().prop_map(Type::optional),
                inner.clone().prop_map(Type::array),
                prop::collection::vec(inner.clone(), 0..3).prop_map(Type::Tuple),
                (inner.clone(), inner).prop_map(|(p, r)| Type::function(
                    vec![FunctionParam::unlabeled(p)],
                    r
                )),
            ]
        })
    }

    proptest! {
        #[test]
        fn apply_is_idempotent(ty in arb_type(), bound in arb_type()) {
            let mut subst = Substitution::new();
            if !occurs_in(TypeVarId(0), &bound) {
                subst.bind(TypeVarId(0), bound);
            }
            let once = subst.apply(&ty);
            prop_assert_eq!(subst.apply(&once), once);
        }

        #[test]
        fn full_substitution_leaves_no_vars(ty in arb_type()) {
            let mut subst = Substitution::new();
            for var in free_type_vars(&ty) {
                subst.bind(var, Type::Int);
            }
            prop_assert!(!subst.apply(&ty).has_type_vars());
        }
    }
}
