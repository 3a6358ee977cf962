// src/constraint/generator.rs
//! Decomposition of subtyping and equality relations into variable bounds.

use kestrel_types::{Nullability, Projection, SimpleType, Type, TypeContext, TypeVariableId, Variance};

use crate::constraint::{ConstraintKind, ConstraintPosition, ConstraintStore};

impl ConstraintStore {
    /// Adds `sub <: sup`, turning it into bounds on the variables it mentions.
    pub(crate) fn add_subtype(&mut self, ctx: &TypeContext, sub: &Type, sup: &Type, position: &ConstraintPosition) {
        let sub = self.apply_fixed(sub);
        let sup = self.apply_fixed(sup);
        let variable = first_variable(&sub, &sup);
        self.subtype(ctx, variable, &sub, &sup, position);
    }

    /// Adds `a == b`.
    pub(crate) fn add_equality(&mut self, ctx: &TypeContext, a: &Type, b: &Type, position: &ConstraintPosition) {
        let a = self.apply_fixed(a);
        let b = self.apply_fixed(b);
        let variable = first_variable(&a, &b);
        self.equality(ctx, variable, &a, &b, position);
    }

    pub(super) fn subtype(
        &mut self,
        ctx: &TypeContext,
        variable: Option<TypeVariableId>,
        sub: &Type,
        sup: &Type,
        position: &ConstraintPosition,
    ) {
        if sub == sup {
            return;
        }
        if is_variable_like(sub) || is_variable_like(sup) {
            self.variable_relation(ctx, sub, sup, position);
            return;
        }
        if sub.is_proper() && sup.is_proper() {
            if !ctx.is_subtype_of(sub, sup) {
                self.record_conflict(variable, sub.clone(), sup.clone(), position.clone());
            }
            return;
        }
        if ctx.is_nullable_any(sup) {
            return;
        }

        match (sub, sup) {
            (_, Type::Flexible(f)) => self.subtype(ctx, variable, sub, &f.upper, position),
            (Type::Flexible(f), _) => self.subtype(ctx, variable, &f.lower, sup, position),
            (_, Type::Intersection(i)) => {
                for component in &i.components {
                    self.subtype(ctx, variable, sub, component, position);
                }
            }
            (Type::Intersection(i), _) => {
                if i.components.iter().any(|c| c.is_proper() && ctx.is_subtype_of(c, sup)) {
                    return;
                }
                match i.components.iter().find(|c| can_decompose(ctx, c, sup)) {
                    Some(component) => self.subtype(ctx, variable, component, sup, position),
                    None => self.record_conflict(variable, sub.clone(), sup.clone(), position.clone()),
                }
            }
            (Type::Captured(c), _) => {
                let supertype = c
                    .supertypes()
                    .iter()
                    .find(|s| can_decompose(ctx, s, sup))
                    .map(|s| s.with_nullability(c.nullability.min(s.nullability())));
                match supertype {
                    Some(s) => self.subtype(ctx, variable, &s, sup, position),
                    None => self.record_conflict(variable, sub.clone(), sup.clone(), position.clone()),
                }
            }
            (Type::Parameter(p), _) => {
                let bound = ctx
                    .effective_bounds(p.id)
                    .ok()
                    .and_then(|bounds| bounds.into_iter().next())
                    .unwrap_or_else(|| ctx.nullable_any_type());
                let bound = if p.nullability.is_nullable() { bound.make_nullable() } else { bound };
                self.subtype(ctx, variable, &bound, sup, position);
            }
            (Type::DefinitelyNotNull(inner), _) => self.subtype(ctx, variable, inner, sup, position),
            (Type::Simple(a), Type::Simple(b)) => self.simple_subtype(ctx, variable, a, b, sub, sup, position),
            _ => self.record_conflict(variable, sub.clone(), sup.clone(), position.clone()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn simple_subtype(
        &mut self,
        ctx: &TypeContext,
        variable: Option<TypeVariableId>,
        a: &SimpleType,
        b: &SimpleType,
        sub: &Type,
        sup: &Type,
        position: &ConstraintPosition,
    ) {
        if a.nullability == Nullability::Nullable && !b.nullability.accepts_null() {
            self.record_conflict(variable, sub.clone(), sup.clone(), position.clone());
            return;
        }
        if ctx.is_nothing(sub) {
            return;
        }
        let Some(view) = ctx.supertype_as(a, b.class_id) else {
            self.record_conflict(variable, sub.clone(), sup.clone(), position.clone());
            return;
        };
        let parameters = match ctx.class(b.class_id) {
            Ok(decl) => decl.type_parameters.clone(),
            Err(_) => {
                self.record_conflict(variable, sub.clone(), sup.clone(), position.clone());
                return;
            }
        };
        for ((sub_arg, sup_arg), param) in view.arguments.iter().zip(&b.arguments).zip(parameters) {
            let declared = ctx.type_parameter(param).map(|p| p.variance).unwrap_or(Variance::Invariant);
            let (variance, target) = match sup_arg {
                Projection::Star | Projection::Conflicting(_) => continue,
                Projection::In(t) => (Variance::In, t),
                Projection::Out(t) => (Variance::Out, t),
                Projection::Invariant(t) => (declared, t),
            };
            match variance {
                Variance::Out => {
                    let upper = match sub_arg {
                        Projection::Invariant(x) | Projection::Out(x) => x.clone(),
                        _ => ctx.nullable_any_type(),
                    };
                    self.subtype(ctx, variable, &upper, target, position);
                }
                Variance::In => {
                    let lower = match sub_arg {
                        Projection::Invariant(x) | Projection::In(x) => x.clone(),
                        _ => ctx.nothing_type(),
                    };
                    self.subtype(ctx, variable, target, &lower, position);
                }
                Variance::Invariant => match sub_arg {
                    Projection::Invariant(x) => self.equality(ctx, variable, x, target, position),
                    _ => self.record_conflict(variable, sub.clone(), sup.clone(), position.clone()),
                },
            }
        }
    }

    /// Relations where at least one side is a bare variable, possibly nullable or `& Any`.
    fn variable_relation(&mut self, ctx: &TypeContext, sub: &Type, sup: &Type, position: &ConstraintPosition) {
        match sub {
            Type::Variable(a) => {
                // `a? <: S` needs S to admit null, unless S is itself a variable.
                if a.nullability.is_nullable() && !sup.nullability().accepts_null() && !is_variable_like(sup) {
                    self.record_conflict(Some(a.id), sub.clone(), sup.clone(), position.clone());
                } else {
                    self.record_bound(ctx, a.id, ConstraintKind::Upper, sup.clone(), position.clone());
                }
            }
            Type::DefinitelyNotNull(inner) => {
                if let Some(a) = inner.as_variable() {
                    self.record_bound(ctx, a, ConstraintKind::Upper, sup.make_nullable(), position.clone());
                }
            }
            _ => {}
        }
        match sup {
            Type::Variable(b) => {
                let lower = if b.nullability.is_nullable() {
                    sub.make_not_null()
                } else {
                    sub.clone()
                };
                self.record_bound(ctx, b.id, ConstraintKind::Lower, lower, position.clone());
            }
            Type::DefinitelyNotNull(inner) => {
                if let Some(b) = inner.as_variable() {
                    if sub.is_nullable() {
                        self.record_conflict(Some(b), sub.clone(), sup.clone(), position.clone());
                    } else {
                        self.record_bound(ctx, b, ConstraintKind::Lower, sub.clone(), position.clone());
                    }
                }
            }
            _ => {}
        }
    }

    pub(super) fn equality(
        &mut self,
        ctx: &TypeContext,
        variable: Option<TypeVariableId>,
        a: &Type,
        b: &Type,
        position: &ConstraintPosition,
    ) {
        if a == b {
            return;
        }
        match (a, b) {
            (Type::Variable(x), _) if x.nullability == Nullability::NotNull => {
                self.record_bound(ctx, x.id, ConstraintKind::Equality, b.clone(), position.clone());
                if let Type::Variable(y) = b {
                    if y.nullability == Nullability::NotNull {
                        self.record_bound(ctx, y.id, ConstraintKind::Equality, a.clone(), position.clone());
                    }
                }
            }
            (_, Type::Variable(y)) if y.nullability == Nullability::NotNull => {
                self.record_bound(ctx, y.id, ConstraintKind::Equality, a.clone(), position.clone());
            }
            _ if a.is_proper() && b.is_proper() => {
                if !ctx.equal_types(a, b) {
                    self.record_conflict(variable, a.clone(), b.clone(), position.clone());
                }
            }
            (Type::Simple(x), Type::Simple(y))
                if x.class_id == y.class_id
                    && x.nullability == y.nullability
                    && x.arguments.len() == y.arguments.len() =>
            {
                for (p, q) in x.arguments.iter().zip(&y.arguments) {
                    match (p, q) {
                        (Projection::Star, Projection::Star) => {}
                        (Projection::Invariant(s), Projection::Invariant(t))
                        | (Projection::In(s), Projection::In(t))
                        | (Projection::Out(s), Projection::Out(t))
                        | (Projection::Conflicting(s), Projection::Conflicting(t)) => {
                            self.equality(ctx, variable, s, t, position)
                        }
                        _ => self.record_conflict(variable, a.clone(), b.clone(), position.clone()),
                    }
                }
            }
            _ => {
                self.subtype(ctx, variable, a, b, position);
                self.subtype(ctx, variable, b, a, position);
            }
        }
    }
}

fn first_variable(a: &Type, b: &Type) -> Option<TypeVariableId> {
    a.free_variables()
        .into_iter()
        .next()
        .or_else(|| b.free_variables().into_iter().next())
}

/// A bare variable, or `variable & Any`.
fn is_variable_like(ty: &Type) -> bool {
    match ty {
        Type::Variable(_) => true,
        Type::DefinitelyNotNull(inner) => inner.is_variable(),
        _ => false,
    }
}

/// Whether `component` can be related to `sup` structurally.
fn can_decompose(ctx: &TypeContext, component: &Type, sup: &Type) -> bool {
    match (component, sup) {
        (Type::Simple(a), Type::Simple(b)) => ctx.supertype_as(a, b.class_id).is_some(),
        (Type::Simple(_), _) => true,
        _ => false,
    }
}
