//! Constraint generation: one walk over an expression tree that gives every
//! sub-expression a type (often a fresh type variable) and records the
//! constraints relating them.

use tarn_ast::{Argument, DeclId, DeclKind, ExprId, ExprKind, KeyPathComponentKind, Literal};
use tarn_diag::{DiagId, diag_args};
use tarn_sema::{Ev, SemaContext, lookup, request, resolve};
use tarn_types::{FunctionParam, FunctionType, NominalKind, ProtocolRef, Type};

use crate::constraint::{Constraint, ConstraintKind, LiteralKind, OverloadChoice};
use crate::cs::{ConstraintSystem, SelectedOverload};
use crate::locator::{ConstraintLocator, ContextualPurpose, PathElt};
use crate::members;

struct ClosureScope {
    params: Vec<(String, Type)>,
    result: Type,
    has_return: bool,
}

pub(crate) struct ConstraintGenerator<'a> {
    ev: &'a mut Ev,
    cx: &'a mut SemaContext,
    cs: &'a mut ConstraintSystem,
    /// The declaration whose body or initializer is being checked.
    dc: DeclId,
    /// Declared result of the enclosing function, for `return`.
    return_type: Option<Type>,
    closures: Vec<ClosureScope>,
}

impl<'a> ConstraintGenerator<'a> {
    pub(crate) fn new(
        ev: &'a mut Ev,
        cx: &'a mut SemaContext,
        cs: &'a mut ConstraintSystem,
        dc: DeclId,
        return_type: Option<Type>,
    ) -> Self {
        Self {
            ev,
            cx,
            cs,
            dc,
            return_type,
            closures: Vec::new(),
        }
    }

    /// Generate constraints for `root`, converting it to `contextual` when
    /// given.
    pub(crate) fn generate(
        &mut self,
        root: ExprId,
        contextual: Option<(Type, ContextualPurpose)>,
    ) -> Type {
        let ty = self.gen_expr(root);
        if let Some((to, purpose)) = contextual {
            self.cs.add(Constraint::new(
                ConstraintKind::Conversion {
                    from: ty.clone(),
                    to,
                },
                ConstraintLocator::new(root).with(PathElt::ContextualType(purpose)),
            ));
        }
        ty
    }

    fn add(&mut self, kind: ConstraintKind, locator: ConstraintLocator) {
        self.cs.add(Constraint::new(kind, locator));
    }

    fn resolve_repr(&mut self, repr: &tarn_ast::TypeRepr) -> Type {
        resolve::resolve_type(self.ev, self.cx, repr, Some(self.dc))
    }

    fn gen_expr(&mut self, e: ExprId) -> Type {
        let ty = self.gen_expr_kind(e);
        self.cs.set_expr_type(e, ty.clone());
        ty
    }

    fn gen_expr_kind(&mut self, e: ExprId) -> Type {
        let node = self.cx.module.expr(e).node.clone();
        let loc = ConstraintLocator::new(e);
        match node {
            ExprKind::Literal(literal) => {
                let kind = match literal {
                    Literal::Int(_) => LiteralKind::Integer,
                    Literal::Float(_) => LiteralKind::Float,
                    Literal::String(_) => LiteralKind::String,
                    Literal::Bool(_) => LiteralKind::Boolean,
                    Literal::Nil => LiteralKind::Nil,
                };
                let ty = self.cs.new_type_var();
                self.add(
                    ConstraintKind::LiteralConformsTo {
                        ty: ty.clone(),
                        literal: kind,
                    },
                    loc,
                );
                ty
            }
            ExprKind::DeclRef { name } => self.gen_decl_ref(e, &name),
            ExprKind::TypeRef { repr } => {
                let ty = self.resolve_repr(&repr);
                if ty.is_error() {
                    return Type::Error;
                }
                let ty = members::open_unapplied_type(self.ev, self.cx, self.cs, ty, &loc);
                Type::metatype(ty)
            }
            ExprKind::Member { base, name } => {
                let base_ty = self.gen_expr(base);
                let member = self.cs.new_type_var();
                self.add(
                    ConstraintKind::ValueMember {
                        base: base_ty,
                        member: member.clone(),
                        name: name.node,
                    },
                    loc.with(PathElt::Member),
                );
                member
            }
            ExprKind::Call { callee, args } => {
                let callee_ty = if matches!(self.cx.module.expr(callee).node, ExprKind::TypeRef { .. }) {
                    let meta = self.gen_expr(callee);
                    let init = self.cs.new_type_var();
                    self.add(
                        ConstraintKind::ValueMember {
                            base: meta,
                            member: init.clone(),
                            name: "init".into(),
                        },
                        loc.with(PathElt::ConstructorMember),
                    );
                    init
                } else {
                    self.gen_expr(callee)
                };
                self.gen_apply(&loc, callee_ty, &args)
            }
            ExprKind::Subscript { base, args } => {
                let base_ty = self.gen_expr(base);
                if let [arg] = args.as_slice()
                    && arg.label_str() == Some("keyPath")
                {
                    let key_path = self.gen_expr(arg.value);
                    let value = self.cs.new_type_var();
                    self.add(
                        ConstraintKind::KeyPathApplication {
                            key_path,
                            root: base_ty,
                            value: value.clone(),
                        },
                        loc,
                    );
                    return value;
                }
                let member = self.cs.new_type_var();
                self.add(
                    ConstraintKind::ValueMember {
                        base: base_ty,
                        member: member.clone(),
                        name: "subscript".into(),
                    },
                    loc.with(PathElt::SubscriptMember),
                );
                self.gen_apply(&loc, member, &args)
            }
            ExprKind::Assign { dest, source } => {
                let dest_ty = self.gen_expr(dest);
                let source_ty = self.gen_expr(source);
                let object = self.cs.new_type_var();
                self.add(
                    ConstraintKind::Bind {
                        first: dest_ty,
                        second: Type::lvalue(object.clone()),
                    },
                    loc.clone(),
                );
                self.add(
                    ConstraintKind::Conversion {
                        from: source_ty,
                        to: object,
                    },
                    ConstraintLocator::new(source)
                        .with(PathElt::ContextualType(ContextualPurpose::Assignment)),
                );
                Type::Void
            }
            ExprKind::AddressOf(inner) => {
                let inner_ty = self.gen_expr(inner);
                let object = self.cs.new_type_var();
                self.add(
                    ConstraintKind::Bind {
                        first: inner_ty,
                        second: Type::lvalue(object.clone()),
                    },
                    loc,
                );
                Type::inout(object)
            }
            ExprKind::ForceValue(inner) | ExprKind::BindOptional(inner) => {
                let inner_ty = self.gen_expr(inner);
                let object = self.cs.new_type_var();
                self.add(
                    ConstraintKind::OptionalObject {
                        optional: inner_ty,
                        object: object.clone(),
                    },
                    loc,
                );
                object
            }
            ExprKind::OptionalChain(inner) => {
                let inner_ty = self.gen_expr(inner);
                let object = self.cs.new_type_var();
                let result = Type::optional(object);
                self.add(
                    ConstraintKind::Conversion {
                        from: inner_ty,
                        to: result.clone(),
                    },
                    loc,
                );
                result
            }
            ExprKind::Coerce { expr, ty, .. } => {
                let target = self.resolve_repr(&ty);
                let expr_ty = self.gen_expr(expr);
                self.add(
                    ConstraintKind::Conversion {
                        from: expr_ty,
                        to: target.clone(),
                    },
                    loc.with(PathElt::ContextualType(ContextualPurpose::Coercion)),
                );
                target
            }
            ExprKind::ForcedCast { expr, ty, .. } => {
                self.gen_expr(expr);
                self.resolve_repr(&ty)
            }
            ExprKind::ConditionalCast { expr, ty, .. } => {
                self.gen_expr(expr);
                Type::optional(self.resolve_repr(&ty))
            }
            ExprKind::Closure { params, body } => self.gen_closure(e, &params, &body),
            ExprKind::Return(value) => {
                self.gen_return(e, value);
                Type::Void
            }
            ExprKind::Tuple(elems) => {
                if let [single] = elems.as_slice()
                    && single.label.is_none()
                {
                    return self.gen_expr(single.value);
                }
                let elems = elems.iter().map(|a| self.gen_expr(a.value)).collect();
                Type::Tuple(elems)
            }
            ExprKind::Paren(inner) => self.gen_expr(inner),
            ExprKind::Array(elems) => {
                let element = self.cs.new_type_var();
                for (index, elem) in elems.iter().enumerate() {
                    let elem_ty = self.gen_expr(*elem);
                    self.add(
                        ConstraintKind::Conversion {
                            from: elem_ty,
                            to: element.clone(),
                        },
                        loc.with(PathElt::ArrayElement(index)),
                    );
                }
                if !elems.is_empty() {
                    self.add(
                        ConstraintKind::Defaultable {
                            ty: element.clone(),
                            default: Type::Any,
                        },
                        loc,
                    );
                }
                Type::array(element)
            }
            ExprKind::KeyPath { root, components } => {
                let root_ty = match &root {
                    Some(repr) => self.resolve_repr(repr),
                    None => self.cs.new_type_var(),
                };
                for (index, component) in components.iter().enumerate() {
                    if let KeyPathComponentKind::Subscript(args) = &component.node {
                        for arg in args {
                            let index_ty = self.gen_expr(arg.value);
                            self.add(
                                ConstraintKind::ConformsTo {
                                    ty: index_ty,
                                    protocol: ProtocolRef::builtin("Hashable"),
                                },
                                loc.with(PathElt::KeyPathComponent(index)),
                            );
                        }
                    }
                }
                let key_path = self.cs.new_type_var();
                self.add(
                    ConstraintKind::KeyPath {
                        key_path: key_path.clone(),
                        root: root_ty,
                        expr: e,
                    },
                    loc,
                );
                key_path
            }
        }
    }

    fn gen_apply(&mut self, loc: &ConstraintLocator, callee: Type, args: &[Argument]) -> Type {
        let params = args
            .iter()
            .map(|arg| {
                let ty = self.gen_expr(arg.value);
                FunctionParam::new(arg.label_str().map(str::to_string), ty)
            })
            .collect();
        let result = self.cs.new_type_var();
        self.add(
            ConstraintKind::ApplicableFunction {
                args: FunctionType::new(params, result.clone()),
                callee,
            },
            loc.with(PathElt::ApplyFunction),
        );
        result
    }

    fn gen_closure(&mut self, e: ExprId, params: &[tarn_ast::ClosureParam], body: &[ExprId]) -> Type {
        let mut scope_params = Vec::new();
        let mut fn_params = Vec::new();
        for param in params {
            let ty = match &param.ty {
                Some(repr) => self.resolve_repr(repr),
                None => self.cs.new_type_var(),
            };
            scope_params.push((param.name.node.clone(), ty.clone()));
            fn_params.push(FunctionParam::unlabeled(ty));
        }
        let result = self.cs.new_type_var();
        self.closures.push(ClosureScope {
            params: scope_params,
            result: result.clone(),
            has_return: false,
        });
        let body_types: Vec<Type> = body.iter().map(|expr| self.gen_expr(*expr)).collect();
        let has_return = self.closures.pop().is_some_and(|scope| scope.has_return);
        if !has_return {
            match (body, body_types.as_slice()) {
                ([single], [single_ty]) => self.add(
                    ConstraintKind::Conversion {
                        from: single_ty.clone(),
                        to: result.clone(),
                    },
                    ConstraintLocator::new(*single).with(PathElt::ClosureResult),
                ),
                _ => self.add(
                    ConstraintKind::Bind {
                        first: result.clone(),
                        second: Type::Void,
                    },
                    ConstraintLocator::new(e).with(PathElt::ClosureResult),
                ),
            }
        }
        Type::Function(FunctionType::new(fn_params, result).escaping())
    }

    fn gen_return(&mut self, e: ExprId, value: Option<ExprId>) {
        let value_ty = value.map(|v| self.gen_expr(v));
        if let Some(scope) = self.closures.last_mut() {
            scope.has_return = true;
            let result = scope.result.clone();
            let anchor = value.unwrap_or(e);
            self.add(
                ConstraintKind::Conversion {
                    from: value_ty.unwrap_or(Type::Void),
                    to: result,
                },
                ConstraintLocator::new(anchor).with(PathElt::ClosureResult),
            );
            return;
        }
        if let (Some(value), Some(value_ty), Some(return_ty)) =
            (value, value_ty, self.return_type.clone())
        {
            self.add(
                ConstraintKind::Conversion {
                    from: value_ty,
                    to: return_ty,
                },
                ConstraintLocator::new(value).with(PathElt::ContextualType(ContextualPurpose::Return)),
            );
        }
    }

    // -- Name references ----------------------------------------------------

    fn enclosing_function(&self) -> Option<DeclId> {
        if self.cx.module.decl(self.dc).is_func_like() {
            Some(self.dc)
        } else {
            self.cx.module.enclosing_function(self.dc)
        }
    }

    fn param_type(&mut self, name: &str) -> Option<Type> {
        let func = self.enclosing_function()?;
        let index = self
            .cx
            .module
            .decl(func)
            .signature()?
            .params
            .iter()
            .position(|p| p.name.node == name)?;
        let Type::Function(f) = request::interface_type(self.ev, self.cx, func) else {
            return Some(Type::Error);
        };
        let param = f.params.get(index)?;
        Some(match &param.ty {
            Type::InOut(object) => Type::lvalue((**object).clone()),
            other => other.clone(),
        })
    }

    fn self_type(&mut self) -> Option<Type> {
        let func = self.enclosing_function();
        let nominal = match func {
            Some(func) => self.cx.module.enclosing_nominal(func),
            None => self.cx.module.enclosing_nominal(self.dc),
        }?;
        let declared = resolve::declared_type(self.ev, self.cx, nominal);
        let Some(func) = func else {
            return Some(declared);
        };
        let f = self.cx.module.decl(func);
        if f.attrs.is_static {
            return Some(Type::metatype(declared));
        }
        let value_type = matches!(
            declared.as_nominal().map(|n| n.kind),
            Some(NominalKind::Struct | NominalKind::Enum)
        );
        let mutable = matches!(f.kind, DeclKind::Init { .. }) || f.attrs.is_mutating;
        Some(if value_type && mutable {
            Type::lvalue(declared)
        } else {
            declared
        })
    }

    fn gen_decl_ref(&mut self, e: ExprId, name: &str) -> Type {
        let loc = ConstraintLocator::new(e);
        for scope in self.closures.iter().rev() {
            if let Some((_, ty)) = scope.params.iter().find(|(n, _)| n == name) {
                return ty.clone();
            }
        }
        if let Some(ty) = self.param_type(name) {
            return ty;
        }
        if name == "self"
            && let Some(ty) = self.self_type()
        {
            return ty;
        }

        let dc = self.dc;
        let found: Vec<DeclId> = lookup::lookup_unqualified_values(self.ev, self.cx, Some(dc), name)
            .into_iter()
            .filter(|decl| *decl != dc)
            .collect();
        match found.as_slice() {
            [] => {}
            [decl] => {
                let ty = self.cs.new_type_var();
                self.add(
                    ConstraintKind::BindOverload {
                        ty: ty.clone(),
                        choice: OverloadChoice::Decl {
                            decl: *decl,
                            base: None,
                        },
                    },
                    loc,
                );
                return ty;
            }
            decls => {
                let ty = self.cs.new_type_var();
                let choices = decls
                    .iter()
                    .map(|decl| {
                        Constraint::new(
                            ConstraintKind::BindOverload {
                                ty: ty.clone(),
                                choice: OverloadChoice::Decl {
                                    decl: *decl,
                                    base: None,
                                },
                            },
                            loc.clone(),
                        )
                    })
                    .collect();
                self.add(ConstraintKind::Disjunction(choices), loc);
                return ty;
            }
        }

        if let Some(decl) = lookup::lookup_type_decls(&self.cx.module, Some(dc), name).first().copied() {
            let declared = resolve::declared_type(self.ev, self.cx, decl);
            let ty = members::open_unapplied_type(self.ev, self.cx, self.cs, declared, &loc);
            return Type::metatype(ty);
        }
        if let Some(ty) = self.wrapper_storage_ref(e, name) {
            return ty;
        }

        let span = self.cx.module.expr(e).span;
        self.cx
            .diags
            .emit(span.report_loc(), DiagId::UseOfUnresolvedIdentifier, diag_args![name]);
        Type::Error
    }

    /// `_x` and `$x` for a property `x` with attached wrappers.
    fn wrapper_storage_ref(&mut self, e: ExprId, name: &str) -> Option<Type> {
        let (projection, wrapped_name) = members::storage_ref_name(name)?;
        let dc = self.dc;
        let wrapped = lookup::lookup_unqualified_values(self.ev, self.cx, Some(dc), wrapped_name)
            .into_iter()
            .find(|decl| matches!(self.cx.module.decl(*decl).kind, DeclKind::Var { .. }))?;
        let loc = ConstraintLocator::new(e);
        let ty = members::wrapper_storage_type(self.ev, self.cx, self.cs, wrapped, projection, None, &loc)?;
        self.cs.record_overload(
            loc,
            SelectedOverload {
                choice: OverloadChoice::Decl {
                    decl: wrapped,
                    base: None,
                },
                opened_type: ty.clone(),
            },
        );
        Some(ty)
    }
}
