// src/fixation/result_type.rs
use kestrel_types::{Type, TypeContext, TypeVariableId};

use crate::constraint::{ConstraintKind, ConstraintStore};

fn proper_bounds(store: &ConstraintStore, variable: TypeVariableId, kind: ConstraintKind) -> Vec<Type> {
    store
        .constraints(variable)
        .iter()
        .filter(|c| c.kind == kind && c.is_relevant() && c.is_proper())
        .map(|c| c.bound.clone())
        .collect()
}

/// The tightest type satisfying the proper bounds of `variable`: its equality
/// bound, else the common supertype of its lower bounds, else the intersection
/// of its upper bounds, else `Any?`.
pub(crate) fn tightest_type(ctx: &TypeContext, store: &ConstraintStore, variable: TypeVariableId) -> Type {
    if let Some(eq) = proper_bounds(store, variable, ConstraintKind::Equality).into_iter().next() {
        return eq;
    }
    let lowers = proper_bounds(store, variable, ConstraintKind::Lower);
    if lowers.is_empty() {
        upper_choice(ctx, store, variable)
    } else {
        ctx.common_supertype(&lowers)
    }
}

/// Step four's choice: the intersection of the proper upper bounds, or `Any?`.
///
/// Declared bounds are recorded as upper constraints when solving starts, so
/// they take part in the intersection.
pub(crate) fn upper_choice(ctx: &TypeContext, store: &ConstraintStore, variable: TypeVariableId) -> Type {
    let uppers = proper_bounds(store, variable, ConstraintKind::Upper);
    if uppers.is_empty() {
        ctx.nullable_any_type()
    } else {
        ctx.intersect_types(&uppers)
    }
}

/// The alternative tried when forking: the common supertype of the proper lower bounds.
pub(crate) fn lower_choice(ctx: &TypeContext, store: &ConstraintStore, variable: TypeVariableId) -> Option<Type> {
    let lowers = proper_bounds(store, variable, ConstraintKind::Lower);
    if lowers.is_empty() {
        return None;
    }
    Some(ctx.common_supertype(&lowers))
}
