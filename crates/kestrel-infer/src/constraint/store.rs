// src/constraint/store.rs
use std::collections::BTreeMap;

use rustc_hash::FxHashSet;

use kestrel_types::{Type, TypeContext, TypeVariableId};

use crate::constraint::{Conflict, Constraint, ConstraintKind, ConstraintPosition, InitialRelation};
use crate::variable::TypeVariableInfo;

#[derive(Debug, Clone)]
struct VariableEntry {
    info: TypeVariableInfo,
    constraints: Vec<Constraint>,
}

/// Arena of type variables with their bounds, fixed values and recorded conflicts.
///
/// Insertion never fails: unsatisfiable relations are kept as [`Conflict`]s and
/// reported when fixation runs.
#[derive(Debug, Clone)]
pub struct ConstraintStore {
    variables: Vec<VariableEntry>,
    seen: FxHashSet<(TypeVariableId, ConstraintKind, Type)>,
    fixed: BTreeMap<TypeVariableId, Type>,
    initial: Vec<InitialRelation>,
    conflicts: Vec<Conflict>,
    pub(super) max_depth: usize,
}

impl ConstraintStore {
    pub(crate) fn new(max_depth: usize) -> Self {
        ConstraintStore {
            variables: Vec::new(),
            seen: FxHashSet::default(),
            fixed: BTreeMap::new(),
            initial: Vec::new(),
            conflicts: Vec::new(),
            max_depth,
        }
    }

    pub(crate) fn new_variable(&mut self, make: impl FnOnce(TypeVariableId) -> TypeVariableInfo) -> TypeVariableId {
        let id = TypeVariableId(self.variables.len() as u32);
        self.variables.push(VariableEntry {
            info: make(id),
            constraints: Vec::new(),
        });
        id
    }

    pub fn variable(&self, id: TypeVariableId) -> Option<&TypeVariableInfo> {
        self.variables.get(id.0 as usize).map(|e| &e.info)
    }

    pub fn variables(&self) -> impl Iterator<Item = &TypeVariableInfo> {
        self.variables.iter().map(|e| &e.info)
    }

    pub fn variable_name(&self, id: TypeVariableId) -> String {
        self.variable(id)
            .map(|info| info.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Renders a type with variable names instead of raw ids.
    pub fn render(&self, ctx: &TypeContext, ty: &Type) -> String {
        ctx.render_with(ty, &|id| self.variable(id).map(|info| info.name.clone()))
    }

    /// All constraints recorded on `id`, in insertion order.
    pub fn constraints(&self, id: TypeVariableId) -> &[Constraint] {
        self.variables
            .get(id.0 as usize)
            .map(|e| e.constraints.as_slice())
            .unwrap_or(&[])
    }

    pub fn fixed_type(&self, id: TypeVariableId) -> Option<&Type> {
        self.fixed.get(&id)
    }

    pub fn fixed(&self) -> &BTreeMap<TypeVariableId, Type> {
        &self.fixed
    }

    pub fn is_fixed(&self, id: TypeVariableId) -> bool {
        self.fixed.contains_key(&id)
    }

    /// Unfixed variables in id order.
    pub fn unfixed_variables(&self) -> Vec<TypeVariableId> {
        self.variables
            .iter()
            .map(|e| e.info.id)
            .filter(|id| !self.fixed.contains_key(id))
            .collect()
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn initial_relations(&self) -> &[InitialRelation] {
        &self.initial
    }

    pub(crate) fn apply_fixed(&self, ty: &Type) -> Type {
        ty.substitute_variables(&self.fixed)
    }

    /// Records `sub <: sup` as a relation the final substitution must satisfy.
    pub(crate) fn add_initial_relation(&mut self, ctx: &TypeContext, sub: Type, sup: Type, position: ConstraintPosition) {
        self.add_subtype(ctx, &sub, &sup, &position);
        self.initial.push(InitialRelation { sub, sup, position });
    }

    pub(crate) fn record_conflict(
        &mut self,
        variable: Option<TypeVariableId>,
        lower: Type,
        upper: Type,
        position: ConstraintPosition,
    ) {
        log::debug!("conflict recorded: {:?} <: {:?} at {:?}", lower, upper, position);
        let conflict = Conflict {
            variable,
            lower,
            upper,
            position,
        };
        if !self.conflicts.contains(&conflict) {
            self.conflicts.push(conflict);
        }
    }

    /// Stores a bound on `variable` and incorporates it against the variable's
    /// existing bounds.
    pub(crate) fn record_bound(
        &mut self,
        ctx: &TypeContext,
        variable: TypeVariableId,
        kind: ConstraintKind,
        bound: Type,
        position: ConstraintPosition,
    ) {
        if let Some(fixed) = self.fixed.get(&variable).cloned() {
            let derived = position.derived();
            match kind {
                ConstraintKind::Lower => self.add_subtype(ctx, &bound, &fixed, &derived),
                ConstraintKind::Upper => self.add_subtype(ctx, &fixed, &bound, &derived),
                ConstraintKind::Equality => self.add_equality(ctx, &fixed, &bound, &derived),
            }
            return;
        }
        let index = variable.0 as usize;
        let Some(entry) = self.variables.get(index) else {
            log::warn!("bound recorded on unknown variable {variable}");
            return;
        };
        if position.depth() > self.max_depth {
            log::trace!("incorporation depth exceeded, dropping bound on {variable}");
            return;
        }

        let promote = entry.info.flexible_bounds
            && matches!(bound, Type::Simple(_))
            && !matches!(position, ConstraintPosition::FixVariable { .. });
        let bound = if promote {
            Type::flexible(bound.clone(), bound)
        } else {
            bound
        };
        if !self.seen.insert((variable, kind, bound.clone())) {
            return;
        }
        let ignored_for_fixation = entry.info.only_input_types && position.is_from_expected_type();

        log::trace!(
            "{} {:?} {}{}",
            entry.info.name,
            kind,
            self.render(ctx, &bound),
            if ignored_for_fixation { " (ignored for fixation)" } else { "" }
        );

        let constraint = Constraint {
            variable,
            kind,
            bound,
            position,
            ignored_for_fixation,
        };
        let existing = self.variables[index].constraints.len();
        self.variables[index].constraints.push(constraint.clone());
        self.incorporate(ctx, &constraint, index, existing);
    }

    /// Relates a new bound to the first `existing` bounds of its variable, the
    /// ones recorded before it. Bounds derived meanwhile are appended after them.
    fn incorporate(&mut self, ctx: &TypeContext, new: &Constraint, index: usize, existing: usize) {
        let position = new.position.derived();
        let variable = Some(new.variable);
        for i in 0..existing {
            let Some(other) = self.variables[index].constraints.get(i).cloned() else {
                break;
            };
            match (new.kind, other.kind) {
                (ConstraintKind::Lower, ConstraintKind::Upper) | (ConstraintKind::Lower, ConstraintKind::Equality) => {
                    self.subtype(ctx, variable, &new.bound, &other.bound, &position)
                }
                (ConstraintKind::Upper, ConstraintKind::Lower) | (ConstraintKind::Equality, ConstraintKind::Lower) => {
                    self.subtype(ctx, variable, &other.bound, &new.bound, &position)
                }
                (ConstraintKind::Upper, ConstraintKind::Equality) => {
                    self.subtype(ctx, variable, &other.bound, &new.bound, &position)
                }
                (ConstraintKind::Equality, ConstraintKind::Upper) => {
                    self.subtype(ctx, variable, &new.bound, &other.bound, &position)
                }
                (ConstraintKind::Equality, ConstraintKind::Equality) => {
                    self.equality(ctx, variable, &new.bound, &other.bound, &position)
                }
                (ConstraintKind::Lower, ConstraintKind::Lower) | (ConstraintKind::Upper, ConstraintKind::Upper) => {}
            }
        }
    }

    /// Fixes `variable := ty` and substitutes it into every recorded bound.
    ///
    /// Postconditions: no bound mentions `variable` any more; the fixed value is
    /// recorded as an equality so it reaches related variables.
    pub(crate) fn fix(&mut self, ctx: &TypeContext, variable: TypeVariableId, ty: Type) {
        self.record_bound(
            ctx,
            variable,
            ConstraintKind::Equality,
            ty.clone(),
            ConstraintPosition::FixVariable { variable },
        );
        self.fixed.insert(variable, ty.clone());

        self.seen.clear();
        for entry in &mut self.variables {
            let mut kept: Vec<Constraint> = Vec::with_capacity(entry.constraints.len());
            for mut constraint in entry.constraints.drain(..) {
                if constraint.bound.contains_variable(variable) {
                    constraint.bound = constraint.bound.substitute_variable(variable, &ty);
                }
                if self
                    .seen
                    .insert((constraint.variable, constraint.kind, constraint.bound.clone()))
                {
                    kept.push(constraint);
                }
            }
            entry.constraints = kept;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::TypeVariableOrigin;
    use kestrel_types::TypeParameterId;

    fn store_with(n: usize) -> (ConstraintStore, Vec<TypeVariableId>) {
        let mut store = ConstraintStore::new(16);
        let vars = (0..n)
            .map(|i| {
                store.new_variable(|id| {
                    TypeVariableInfo::synthetic(id, TypeVariableOrigin::TypeParameter(TypeParameterId(i as u32)))
                })
            })
            .collect();
        (store, vars)
    }

    #[test]
    fn duplicate_bounds_are_stored_once() {
        let ctx = TypeContext::with_builtins();
        let (mut store, vars) = store_with(1);
        let int = Type::class(ctx.builtins().int);
        for _ in 0..3 {
            store.record_bound(&ctx, vars[0], ConstraintKind::Lower, int.clone(), ConstraintPosition::argument(0));
        }
        assert_eq!(store.constraints(vars[0]).len(), 1);
    }

    #[test]
    fn incompatible_bounds_become_conflicts() {
        let ctx = TypeContext::with_builtins();
        let b = ctx.builtins();
        let (mut store, vars) = store_with(1);
        store.record_bound(&ctx, vars[0], ConstraintKind::Lower, Type::class(b.string), ConstraintPosition::argument(0));
        store.record_bound(&ctx, vars[0], ConstraintKind::Upper, Type::class(b.number), ConstraintPosition::argument(1));
        assert_eq!(store.constraints(vars[0]).len(), 2);
        assert_eq!(store.conflicts().len(), 1);
        assert_eq!(store.conflicts()[0].variable, Some(vars[0]));
    }

    #[test]
    fn new_bound_meets_every_earlier_opposite_bound() {
        let ctx = TypeContext::with_builtins();
        let b = ctx.builtins();
        let (mut store, vars) = store_with(1);
        for (i, class) in [b.int, b.string, b.long, b.double].into_iter().enumerate() {
            store.record_bound(&ctx, vars[0], ConstraintKind::Lower, Type::class(class), ConstraintPosition::argument(i));
        }
        store.record_bound(&ctx, vars[0], ConstraintKind::Upper, Type::class(b.number), ConstraintPosition::argument(4));
        assert_eq!(store.constraints(vars[0]).len(), 5);
        assert_eq!(store.conflicts().len(), 1);
        assert_eq!(store.conflicts()[0].lower, Type::class(b.string));
        assert_eq!(store.conflicts()[0].upper, Type::class(b.number));
    }

    #[test]
    fn variable_to_variable_bounds_are_transitive() {
        let ctx = TypeContext::with_builtins();
        let int = Type::class(ctx.builtins().int);
        let (mut store, vars) = store_with(2);
        store.add_subtype(&ctx, &Type::variable(vars[0]), &Type::variable(vars[1]), &ConstraintPosition::argument(0));
        store.add_subtype(&ctx, &int, &Type::variable(vars[0]), &ConstraintPosition::argument(1));
        let lowers: Vec<_> = store
            .constraints(vars[1])
            .iter()
            .filter(|c| c.kind == ConstraintKind::Lower)
            .map(|c| c.bound.clone())
            .collect();
        assert!(lowers.contains(&Type::variable(vars[0])));
        assert!(lowers.contains(&int));
    }

    #[test]
    fn fixing_substitutes_into_other_bounds() {
        let ctx = TypeContext::with_builtins();
        let b = ctx.builtins();
        let (mut store, vars) = store_with(2);
        let list_of_y = Type::simple(b.list, vec![Type::variable(vars[1])]);
        store.record_bound(&ctx, vars[0], ConstraintKind::Equality, list_of_y, ConstraintPosition::argument(0));
        store.fix(&ctx, vars[1], Type::class(b.int));
        let eq = &store.constraints(vars[0])[0];
        assert_eq!(eq.bound, Type::simple(b.list, vec![Type::class(b.int)]));
        assert!(store.is_fixed(vars[1]));
        assert_eq!(store.unfixed_variables(), vec![vars[0]]);
    }

    #[test]
    fn depth_limit_drops_deep_bounds() {
        let ctx = TypeContext::with_builtins();
        let (mut store, vars) = store_with(1);
        let mut position = ConstraintPosition::argument(0);
        for _ in 0..17 {
            position = position.derived();
        }
        store.record_bound(&ctx, vars[0], ConstraintKind::Lower, ctx.any_type(), position);
        assert!(store.constraints(vars[0]).is_empty());
    }
}
