//! Raw value checking for enums with a raw type.

use rustc_hash::FxHashMap;
use tarn_ast::{DeclId, DeclKind, Literal, Spanned};
use tarn_diag::{DiagId, SourceLocation, diag_args};
use tarn_types::Type;

use crate::context::SemaContext;
use crate::request::{self, Ev};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawKind {
    Int,
    Double,
    String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RawValue {
    Int(i64),
    /// Bit pattern, so `1.0` and `1.00` collide.
    Double(u64),
    String(String),
}

impl RawValue {
    fn as_int(&self) -> Option<i64> {
        match self {
            RawValue::Int(value) => Some(*value),
            RawValue::Double(bits) => {
                let value = f64::from_bits(*bits);
                (value.fract() == 0.0).then_some(value as i64)
            }
            RawValue::String(_) => None,
        }
    }
}

/// How a case obtained its raw value, for the notes on a duplicate.
#[derive(Debug, Clone, Copy)]
enum Origin {
    Explicit,
    /// Incremented from the explicit value at this location.
    IncrementedFrom(Option<SourceLocation>),
    IncrementedFromZero,
    CaseName,
}

#[derive(Debug, Clone, Copy)]
struct Assigned {
    loc: Option<SourceLocation>,
    origin: Origin,
}

fn literal_type_name(literal: &Literal) -> &'static str {
    match literal {
        Literal::Int(_) => "Int",
        Literal::Float(_) => "Double",
        Literal::String(_) => "String",
        Literal::Bool(_) => "Bool",
        Literal::Nil => "nil",
    }
}

fn convert(kind: RawKind, literal: &Literal) -> Option<RawValue> {
    match (kind, literal) {
        (RawKind::Int, Literal::Int(value)) => Some(RawValue::Int(*value)),
        (RawKind::Double, Literal::Int(value)) => Some(RawValue::Double((*value as f64).to_bits())),
        (RawKind::Double, Literal::Float(text)) => {
            text.parse::<f64>().ok().map(|value| RawValue::Double(value.to_bits()))
        }
        (RawKind::String, Literal::String(text)) => Some(RawValue::String(text.clone())),
        _ => None,
    }
}

/// The value after `previous`, or the diagnostic explaining why there is
/// none.
fn successor(kind: RawKind, previous: Option<&RawValue>) -> Result<RawValue, DiagId> {
    let next = match previous {
        None => 0,
        Some(value) => value
            .as_int()
            .ok_or(DiagId::EnumNonIntegerRawValueAutoIncrement)?
            .checked_add(1)
            .ok_or(DiagId::EnumRawValueAutoIncrementOverflow)?,
    };
    Ok(match kind {
        RawKind::Double => RawValue::Double((next as f64).to_bits()),
        _ => RawValue::Int(next),
    })
}

/// Check the cases of enum `decl` against its raw type: literal kinds,
/// auto-incremented values and uniqueness.
pub fn check_enum_raw_values(ev: &mut Ev, cx: &mut SemaContext, decl: DeclId) {
    let raw_type = request::enum_raw_type(ev, cx, decl);
    let summary = request::inheritance_clause(ev, cx, decl);
    let enum_decl = cx.module.decl(decl);
    let cases: Vec<DeclId> = enum_decl
        .members
        .iter()
        .copied()
        .filter(|id| matches!(cx.module.decl(*id).kind, DeclKind::EnumCase { .. }))
        .collect();

    let Some(raw_type) = raw_type else {
        for &case in &cases {
            if let DeclKind::EnumCase {
                raw_value: Some(literal),
                ..
            } = &cx.module.decl(case).kind
            {
                let loc = literal.span.report_loc();
                cx.diags
                    .emit(loc, DiagId::EnumRawValueWithoutRawType, diag_args![]);
            }
        }
        return;
    };
    let raw_loc = summary
        .raw_type
        .as_ref()
        .and_then(|entry| enum_decl.inherited.get(entry.index))
        .and_then(|repr| repr.span.report_loc());

    let kind = match raw_type {
        Type::Error => return,
        Type::Int => RawKind::Int,
        Type::Double => RawKind::Double,
        Type::String => RawKind::String,
        _ => {
            cx.diags.emit(
                raw_loc,
                DiagId::RawTypeNotLiteralConvertible,
                diag_args![&raw_type],
            );
            return;
        }
    };
    if cases.is_empty() {
        cx.diags.emit(raw_loc, DiagId::EmptyEnumRawType, diag_args![]);
        return;
    }

    let mut seen: FxHashMap<RawValue, Assigned> = FxHashMap::default();
    let mut previous: Option<(RawValue, Assigned)> = None;
    for case in cases {
        let case_decl = cx.module.decl(case);
        let DeclKind::EnumCase { raw_value, params } = &case_decl.kind else {
            continue;
        };
        let name_loc = case_decl.name_span.report_loc();
        if !params.is_empty() {
            cx.diags.emit(
                name_loc,
                DiagId::EnumWithRawTypeCaseWithArgument,
                diag_args![],
            );
            cx.diags
                .emit(raw_loc, DiagId::EnumRawTypeHere, diag_args![&raw_type]);
            continue;
        }

        let (value, assigned) = match raw_value {
            Some(Spanned { node: literal, span }) => {
                let loc = span.report_loc();
                let Some(value) = convert(kind, literal) else {
                    cx.diags.emit(
                        loc,
                        DiagId::CannotConvertRawInitializerValue,
                        diag_args![literal_type_name(literal), &raw_type],
                    );
                    continue;
                };
                (
                    value,
                    Assigned {
                        loc,
                        origin: Origin::Explicit,
                    },
                )
            }
            None if kind == RawKind::String => (
                RawValue::String(case_decl.name.clone()),
                Assigned {
                    loc: name_loc,
                    origin: Origin::CaseName,
                },
            ),
            None => {
                let value = match successor(kind, previous.as_ref().map(|(value, _)| value)) {
                    Ok(value) => value,
                    Err(id) => {
                        let args = match id {
                            DiagId::EnumRawValueAutoIncrementOverflow => diag_args![&raw_type],
                            _ => diag_args![],
                        };
                        cx.diags.emit(name_loc, id, args);
                        continue;
                    }
                };
                let origin = match &previous {
                    None => Origin::IncrementedFromZero,
                    Some((_, prev)) => match prev.origin {
                        Origin::Explicit => Origin::IncrementedFrom(prev.loc),
                        inherited => inherited,
                    },
                };
                (
                    value,
                    Assigned {
                        loc: name_loc,
                        origin,
                    },
                )
            }
        };

        if let Some(earlier) = seen.get(&value).copied() {
            cx.diags
                .emit(assigned.loc, DiagId::EnumRawValueNotUnique, diag_args![]);
            cx.diags
                .emit(earlier.loc, DiagId::EnumRawValueUsedHere, diag_args![]);
            match earlier.origin {
                Origin::IncrementedFrom(from) => {
                    cx.diags.emit(
                        from,
                        DiagId::EnumRawValueIncrementingFromHere,
                        diag_args![],
                    );
                }
                Origin::IncrementedFromZero => {
                    cx.diags.emit(
                        earlier.loc,
                        DiagId::EnumRawValueIncrementingFromZero,
                        diag_args![],
                    );
                }
                Origin::Explicit | Origin::CaseName => {}
            }
            cx.states.mark_invalid(case);
        } else {
            seen.insert(value.clone(), assigned);
        }
        previous = Some((value, assigned));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successor_starts_at_zero() {
        assert_eq!(successor(RawKind::Int, None), Ok(RawValue::Int(0)));
        assert_eq!(
            successor(RawKind::Int, Some(&RawValue::Int(41))),
            Ok(RawValue::Int(42))
        );
    }

    #[test]
    fn successor_needs_integral_predecessor() {
        let not_integer = Err(DiagId::EnumNonIntegerRawValueAutoIncrement);
        let half = RawValue::Double(0.5f64.to_bits());
        assert_eq!(successor(RawKind::Double, Some(&half)), not_integer);
        let string = RawValue::String("a".to_string());
        assert_eq!(successor(RawKind::String, Some(&string)), not_integer);
        let two = RawValue::Double(2.0f64.to_bits());
        assert_eq!(
            successor(RawKind::Double, Some(&two)),
            Ok(RawValue::Double(3.0f64.to_bits()))
        );
    }

    #[test]
    fn successor_of_largest_int_overflows() {
        assert_eq!(
            successor(RawKind::Int, Some(&RawValue::Int(i64::MAX))),
            Err(DiagId::EnumRawValueAutoIncrementOverflow)
        );
    }

    #[test]
    fn float_literals_compare_by_value() {
        let a = convert(RawKind::Double, &Literal::Float("1.0".to_string()));
        let b = convert(RawKind::Double, &Literal::Float("1.00".to_string()));
        let c = convert(RawKind::Double, &Literal::Int(1));
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(convert(RawKind::Int, &Literal::String("x".into())), None);
    }
}
