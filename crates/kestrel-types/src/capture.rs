// src/capture.rs
//! Capture and uncapture of use-site projections.
//!
//! Capturing turns `MutableList<out Number>` into `MutableList<Captured(out Number)>`
//! so the projected argument can be treated as an ordinary (if unknown) type.
//! Uncapturing goes the other way and yields a denotable type that can be used
//! as a constraint bound.

use std::collections::BTreeMap;

use crate::context::TypeContext;
use crate::types::{CapturedType, IntersectionType, Projection, SimpleType, Type};

/// Replaces every projected argument of `ty` by a fresh captured type.
///
/// Returns `None` when there is nothing to capture (all arguments are invariant)
/// or the class is unknown.
///
/// Preconditions: `ty.arguments` matches the declared parameters of its class.
/// Postconditions: every `in`/`out`/`*` argument of the result is
/// `Invariant(Captured(..))`; conflicting projections are left alone.
pub fn capture_arguments(ctx: &TypeContext, ty: &SimpleType) -> Option<SimpleType> {
    if ty
        .arguments
        .iter()
        .all(|a| matches!(a, Projection::Invariant(_) | Projection::Conflicting(_)))
    {
        return None;
    }
    let decl = ctx.class(ty.class_id).ok()?;
    if decl.type_parameters.len() != ty.arguments.len() {
        return None;
    }

    // Declared bounds may mention sibling parameters (`T : Comparable<T>`).
    let mapping: BTreeMap<_, _> = decl
        .type_parameters
        .iter()
        .zip(&ty.arguments)
        .map(|(&p, arg)| (p, arg.ty().cloned().unwrap_or_else(|| ctx.nullable_any_type())))
        .collect();

    let mut arguments = Vec::with_capacity(ty.arguments.len());
    for (arg, &param) in ty.arguments.iter().zip(&decl.type_parameters) {
        let declared_bounds: Vec<Type> = ctx
            .type_parameter(param)
            .map(|p| p.bounds.iter().map(|b| b.substitute_parameters(&mapping)).collect())
            .unwrap_or_default();
        let captured = match arg {
            Projection::Invariant(_) | Projection::Conflicting(_) => {
                arguments.push(arg.clone());
                continue;
            }
            Projection::Out(t) => {
                let mut supertypes = vec![t.clone()];
                supertypes.extend(declared_bounds);
                CapturedType::new(arg.clone(), supertypes, Some(param))
            }
            Projection::In(_) | Projection::Star => {
                let supertypes = if declared_bounds.is_empty() {
                    vec![ctx.nullable_any_type()]
                } else {
                    declared_bounds
                };
                CapturedType::new(arg.clone(), supertypes, Some(param))
            }
        };
        arguments.push(Projection::Invariant(Type::Captured(captured)));
    }

    Some(SimpleType {
        arguments,
        ..ty.clone()
    })
}

/// Converts captured types back into denotable bounds.
///
/// The result contains no captured type, and `uncapture(uncapture(t)) == uncapture(t)`.
/// Inference variables and type parameters are left untouched.
pub fn uncapture(ctx: &TypeContext, ty: &Type) -> Type {
    match ty {
        Type::Flexible(f) => {
            let lower = uncapture(ctx, &f.lower);
            let upper = uncapture(ctx, &f.upper);
            if lower == *f.lower && upper == *f.upper {
                ty.clone()
            } else {
                Type::flexible(lower, upper)
            }
        }
        Type::Captured(c) => {
            let chosen = if let Some(lower) = &c.lower_type {
                (**lower).clone()
            } else {
                match c.supertypes() {
                    [single] => single.clone(),
                    [] => c
                        .projection()
                        .ty()
                        .cloned()
                        .unwrap_or_else(|| ctx.nullable_any_type()),
                    many => ctx.intersect_types(many),
                }
            };
            let chosen = uncapture(ctx, &chosen);
            let nullability = c.nullability.min(chosen.nullability());
            chosen.with_nullability(nullability)
        }
        Type::Simple(s) => {
            let arguments = s.arguments.iter().map(|a| uncapture_projection(ctx, a)).collect();
            Type::Simple(SimpleType {
                arguments,
                ..s.clone()
            })
        }
        Type::Intersection(i) => {
            IntersectionType::from_components(i.components.iter().map(|c| uncapture(ctx, c)))
        }
        Type::DefinitelyNotNull(inner) => Type::definitely_not_null(uncapture(ctx, inner)),
        Type::Variable(_) | Type::Parameter(_) => ty.clone(),
    }
}

fn uncapture_projection(ctx: &TypeContext, projection: &Projection) -> Projection {
    match projection {
        Projection::Star => Projection::Star,
        // A captured argument reverts to the projection it was captured from.
        Projection::Invariant(Type::Captured(c)) | Projection::Conflicting(Type::Captured(c)) => {
            c.projection().map_type(|t| uncapture(ctx, t))
        }
        Projection::Invariant(t) => Projection::Invariant(uncapture(ctx, t)),
        Projection::In(t) => Projection::In(uncapture(ctx, t)),
        Projection::Out(t) => Projection::Out(uncapture(ctx, t)),
        Projection::Conflicting(t) => Projection::Conflicting(t.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Nullability, TypeVariableId, Variance};

    fn captured(projection: Projection, supertypes: Vec<Type>) -> Type {
        Type::Captured(CapturedType::new(projection, supertypes, None))
    }

    #[test]
    fn captured_with_several_supertypes_becomes_intersection() {
        let ctx = TypeContext::with_builtins();
        let b = ctx.builtins();
        let string = Type::class(b.string);
        let comparable_string = Type::simple(b.comparable, vec![string.clone()]);
        let c = captured(
            Projection::Out(string),
            vec![Type::class(b.char_sequence), comparable_string.clone()],
        );
        assert_eq!(
            uncapture(&ctx, &c),
            IntersectionType::from_components(vec![Type::class(b.char_sequence), comparable_string])
        );
    }

    #[test]
    fn lower_type_wins_over_supertypes() {
        let ctx = TypeContext::with_builtins();
        let b = ctx.builtins();
        let c = captured(Projection::In(Type::class(b.int)), vec![ctx.nullable_any_type()]);
        assert_eq!(uncapture(&ctx, &c), Type::class(b.int));
    }

    #[test]
    fn projection_type_is_the_last_resort() {
        let ctx = TypeContext::with_builtins();
        let int = Type::class(ctx.builtins().int);
        let c = captured(Projection::Out(int.clone()), vec![]);
        assert_eq!(uncapture(&ctx, &c), int);
    }

    #[test]
    fn nullability_takes_the_minimum() {
        let ctx = TypeContext::with_builtins();
        let int = Type::class(ctx.builtins().int);
        let c = captured(Projection::Out(int.clone()), vec![int.clone()]).make_nullable();
        assert_eq!(uncapture(&ctx, &c), int.make_nullable());

        let c = captured(Projection::Out(int.make_nullable()), vec![int.make_nullable()]);
        assert_eq!(uncapture(&ctx, &c).nullability(), Nullability::Nullable);
    }

    #[test]
    fn captured_argument_reverts_to_its_projection() {
        let ctx = TypeContext::with_builtins();
        let b = ctx.builtins();
        let projected = Type::projected(b.mutable_list, vec![Projection::Out(Type::class(b.number))]);
        let Type::Simple(s) = &projected else { unreachable!() };
        let captured = capture_arguments(&ctx, s).unwrap();
        assert!(matches!(&captured.arguments[0], Projection::Invariant(Type::Captured(_))));
        assert_eq!(uncapture(&ctx, &Type::Simple(captured)), projected);
    }

    #[test]
    fn invariant_arguments_are_not_captured() {
        let ctx = TypeContext::with_builtins();
        let b = ctx.builtins();
        let Type::Simple(s) = Type::simple(b.list, vec![Type::class(b.int)]) else { unreachable!() };
        assert!(capture_arguments(&ctx, &s).is_none());
    }

    #[test]
    fn star_capture_uses_declared_bounds() {
        let mut ctx = TypeContext::with_builtins();
        let number = Type::class(ctx.builtins().number);
        let t = ctx.declare_type_parameter("T", Variance::Out);
        ctx.set_bounds(t, vec![number.clone()]).unwrap();
        let boxed = ctx.declare_class("Box", vec![t], vec![]).unwrap();
        let Type::Simple(s) = Type::projected(boxed, vec![Projection::Star]) else { unreachable!() };
        let captured = capture_arguments(&ctx, &s).unwrap();
        let Projection::Invariant(Type::Captured(c)) = &captured.arguments[0] else {
            panic!("expected a captured argument");
        };
        assert_eq!(c.supertypes(), &[number.clone()]);
        assert_eq!(uncapture(&ctx, &Type::Captured(c.clone())), number);
    }

    #[test]
    fn flexible_without_captures_is_returned_unchanged() {
        let ctx = TypeContext::with_builtins();
        let string = Type::class(ctx.builtins().string);
        let platform = Type::flexible(string.clone(), string.make_nullable());
        assert_eq!(uncapture(&ctx, &platform), platform);
    }

    #[test]
    fn placeholders_are_untouched() {
        let ctx = TypeContext::with_builtins();
        let v = Type::variable(TypeVariableId(4)).make_nullable();
        assert_eq!(uncapture(&ctx, &v), v);
    }

    #[test]
    fn uncapture_is_idempotent() {
        let ctx = TypeContext::with_builtins();
        let b = ctx.builtins();
        let string = Type::class(b.string);
        let inner = captured(
            Projection::Out(string.clone()),
            vec![Type::class(b.char_sequence), Type::simple(b.comparable, vec![string.clone()])],
        );
        let samples = vec![
            inner.clone(),
            inner.make_nullable(),
            Type::simple(b.list, vec![inner.clone()]),
            Type::flexible(inner.clone(), inner.make_nullable()),
            Type::definitely_not_null(inner.make_nullable()),
            IntersectionType::from_components(vec![inner.clone(), Type::class(b.number)]),
            captured(Projection::In(inner.clone()), vec![]),
            captured(Projection::Star, vec![]),
            Type::projected(b.mutable_list, vec![Projection::Invariant(inner)]),
        ];
        for t in samples {
            let once = uncapture(&ctx, &t);
            assert_eq!(uncapture(&ctx, &once), once, "not idempotent for {t:?}");
            assert!(!once.contains_captured());
        }
    }
}
