//! Interface types of declarations and declaration validation.

use tarn_ast::{DeclId, DeclKind, ExprKind, FuncSignature, Literal};
use tarn_types::{FunctionParam, FunctionType, Type};

use crate::context::SemaContext;
use crate::request::{self, Ev};
use crate::resolve;
use crate::state::ValidationState;

/// The semantic type of `decl`. Type declarations produce their metatype.
/// Failure to resolve a written type marks the declaration invalid.
pub fn compute_interface_type(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId) -> Type {
    let d = cx.module.decl(decl).clone();
    match &d.kind {
        DeclKind::Class | DeclKind::Struct | DeclKind::Enum | DeclKind::Protocol => {
            Type::metatype(resolve::declared_type(ev, cx, decl))
        }
        DeclKind::TypeAlias { underlying } => {
            let ty = resolve::resolve_type(ev, cx, underlying, Some(decl));
            if ty.has_error() {
                cx.states.mark_invalid(decl);
            }
            Type::metatype(ty)
        }
        DeclKind::EnumCase { params, .. } => {
            let Some(parent) = d.parent else {
                return Type::Error;
            };
            let enum_ty = resolve::declared_type(ev, cx, parent);
            if params.is_empty() {
                return enum_ty;
            }
            let params: Vec<FunctionParam> = params
                .iter()
                .map(|repr| FunctionParam::unlabeled(resolve::resolve_type(ev, cx, repr, Some(decl))))
                .collect();
            if params.iter().any(|p| p.ty.has_error()) {
                cx.states.mark_invalid(decl);
            }
            Type::function(params, enum_ty)
        }
        DeclKind::Var { ty: Some(repr), .. } => {
            let ty = resolve::resolve_type(ev, cx, repr, Some(decl));
            if ty.has_error() {
                cx.states.mark_invalid(decl);
            }
            ty
        }
        DeclKind::Var { ty: None, init, .. } => {
            if let Some(ty) = cx.caches.inferred_var_types.get(&decl) {
                return ty.clone();
            }
            init.and_then(|init| literal_type(cx, init))
                .unwrap_or(Type::Error)
        }
        DeclKind::Func { signature, .. } | DeclKind::Subscript { signature } => {
            let result = match &signature.result {
                Some(repr) => resolve::resolve_type(ev, cx, repr, Some(decl)),
                None => Type::Void,
            };
            signature_type(ev, cx, decl, signature, result)
        }
        DeclKind::Init { signature, .. } => {
            let result = match cx.module.enclosing_nominal(decl) {
                Some(nominal) => resolve::declared_type(ev, cx, nominal),
                None => Type::Error,
            };
            signature_type(ev, cx, decl, signature, result)
        }
        DeclKind::TopLevelCode { .. } => Type::Void,
    }
}

fn signature_type(
    ev: &mut Ev,
    cx: &mut SemaContext,
    decl: DeclId,
    signature: &FuncSignature,
    result: Type,
) -> Type {
    let params: Vec<FunctionParam> = signature
        .params
        .iter()
        .map(|param| {
            let mut resolved =
                resolve::resolve_param(ev, cx, &param.ty, param.label.clone(), Some(decl));
            resolved.has_default = param.has_default;
            resolved
        })
        .collect();
    if result.has_error() || params.iter().any(|p| p.ty.has_error()) {
        cx.states.mark_invalid(decl);
    }
    Type::Function(FunctionType {
        params,
        result: Box::new(result),
        escaping: false,
    })
}

fn literal_type(cx: &SemaContext, init: tarn_ast::ExprId) -> Option<Type> {
    match &cx.module.expr(init).node {
        ExprKind::Literal(Literal::Int(_)) => Some(Type::Int),
        ExprKind::Literal(Literal::Float(_)) => Some(Type::Double),
        ExprKind::Literal(Literal::String(_)) => Some(Type::String),
        ExprKind::Literal(Literal::Bool(_)) => Some(Type::Bool),
        _ => None,
    }
}

/// Whether the interface type of `decl` is final. An unannotated variable
/// whose initializer has not been type checked yet is not.
pub fn is_settled(cx: &SemaContext, decl: DeclId) -> bool {
    match &cx.module.decl(decl).kind {
        DeclKind::Var {
            ty: None,
            init: Some(init),
            ..
        } => {
            cx.caches.inferred_var_types.contains_key(&decl)
                || matches!(cx.module.expr(*init).node, ExprKind::Literal(_))
        }
        _ => true,
    }
}

/// Drive `decl` through validation. Re-entering while it is validating is a
/// no-op.
pub fn validate_decl(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId) {
    if cx.states.validation(decl) != ValidationState::Unvalidated {
        return;
    }
    cx.states.set_validation(decl, ValidationState::Validating);
    let _ = request::interface_type(ev, cx, decl);
    let state = if cx.states.is_invalid(decl) {
        ValidationState::Invalid
    } else {
        ValidationState::Validated
    };
    cx.states.set_validation(decl, state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tarn_ast::{FileId, ModuleBuilder, Span, Spanned, TypeReprKind};
    use tarn_eval::Evaluator;

    fn span(start: u32, end: u32) -> Span {
        Span::new(FileId(0), start, end)
    }

    fn var(name: &str, ty: &str, at: u32) -> tarn_ast::Decl {
        let repr = Spanned::new(TypeReprKind::Ident(ty.to_string()), span(at + 3, at + 6));
        tarn_ast::Decl::new(
            name,
            DeclKind::Var {
                is_let: false,
                ty: Some(repr),
                init: None,
            },
            span(at, at + 1),
        )
    }

    #[test]
    fn unresolved_annotation_invalidates() {
        let mut builder = ModuleBuilder::new("m");
        let good = builder.add_decl(None, var("a", "Int", 0));
        let bad = builder.add_decl(None, var("b", "Nope", 10));
        let mut cx = SemaContext::new(builder.finish().unwrap());
        let mut ev = Evaluator::new();

        validate_decl(&mut ev, &mut cx, good);
        validate_decl(&mut ev, &mut cx, bad);

        assert_eq!(cx.states.validation(good), ValidationState::Validated);
        assert_eq!(cx.states.validation(bad), ValidationState::Invalid);
        assert_eq!(request::interface_type(&mut ev, &mut cx, good), Type::Int);
        assert_eq!(cx.diags.len(), 1);
    }

    #[test]
    fn unannotated_var_waits_for_inference() {
        let mut builder = ModuleBuilder::new("m");
        let callee = builder.add_expr(
            ExprKind::DeclRef {
                name: "make".to_string(),
            },
            span(8, 12),
        );
        let call = builder.add_expr(
            ExprKind::Call {
                callee,
                args: Vec::new(),
            },
            span(8, 14),
        );
        let decl = builder.add_decl(
            None,
            tarn_ast::Decl::new(
                "x",
                DeclKind::Var {
                    is_let: true,
                    ty: None,
                    init: Some(call),
                },
                span(4, 5),
            ),
        );
        let mut cx = SemaContext::new(builder.finish().unwrap());
        let mut ev = Evaluator::new();

        assert!(!is_settled(&cx, decl));
        assert_eq!(request::interface_type(&mut ev, &mut cx, decl), Type::Error);
        cx.caches.inferred_var_types.insert(decl, Type::Double);
        assert_eq!(request::interface_type(&mut ev, &mut cx, decl), Type::Double);
        assert_eq!(ev.stats().executions_of("interface_type"), 2);
        assert_eq!(request::interface_type(&mut ev, &mut cx, decl), Type::Double);
        assert_eq!(ev.stats().executions_of("interface_type"), 2);
    }
}
