// src/fixation/mod.rs
//! Chooses, fixes and substitutes type variables until none is left.

pub(crate) mod finder;
pub(crate) mod result_type;

use kestrel_types::{uncapture, Type, TypeContext, TypeVariableId};

use crate::config::SolverConfig;
use crate::constraint::{Conflict, ConstraintKind, ConstraintPosition, ConstraintStore};
use crate::error::{InferenceError, InferenceResult};
use crate::postponed::{AtomAnalyzer, PostponedAtom};

use self::finder::{Candidate, FixationStep};

/// Everything a fork has to copy: the constraint store and the atoms.
#[derive(Debug, Clone)]
pub(crate) struct SolverState {
    pub(crate) store: ConstraintStore,
    /// Atoms still waiting for analysis, in argument order.
    pub(crate) atoms: Vec<PostponedAtom>,
    pub(crate) analyzed: Vec<PostponedAtom>,
}

impl SolverState {
    pub(crate) fn new(store: ConstraintStore) -> Self {
        SolverState {
            store,
            atoms: Vec::new(),
            analyzed: Vec::new(),
        }
    }

    /// Fixes `variable := ty` in the store and in every pending atom.
    fn fix_variable(&mut self, ctx: &TypeContext, variable: TypeVariableId, ty: Type) {
        self.store.fix(ctx, variable, ty.clone());
        for atom in &mut self.atoms {
            atom.expected_type = atom.expected_type.substitute_variable(variable, &ty);
            if let Some(revised) = &mut atom.revised_expected_type {
                *revised = revised.substitute_variable(variable, &ty);
            }
        }
    }
}

/// Runs the fixation loop over a [`SolverState`].
pub(crate) struct Orchestrator<'a> {
    ctx: &'a TypeContext,
    config: &'a SolverConfig,
}

impl<'a> Orchestrator<'a> {
    pub(crate) fn new(ctx: &'a TypeContext, config: &'a SolverConfig) -> Self {
        Orchestrator { ctx, config }
    }

    /// Fixes every variable of `state`, analyzing postponed atoms as their input
    /// types become known.
    ///
    /// Postconditions on success: every variable is fixed, every atom is merged,
    /// and every recorded constraint holds for the fixed types.
    pub(crate) fn run(
        &self,
        state: &mut SolverState,
        analyzer: &mut Option<Box<dyn AtomAnalyzer + '_>>,
    ) -> InferenceResult<()> {
        self.run_at_depth(state, analyzer, 0)
    }

    fn run_at_depth(
        &self,
        state: &mut SolverState,
        analyzer: &mut Option<Box<dyn AtomAnalyzer + '_>>,
        fork_depth: usize,
    ) -> InferenceResult<()> {
        loop {
            self.check_conflicts(&state.store)?;
            if state.process_atoms(self.ctx, self.config, analyzer)? {
                continue;
            }
            let Some(Candidate { variable, step }) = finder::find_candidate(self.ctx, state)? else {
                break;
            };

            let ty = match step {
                FixationStep::Remaining => {
                    let upper = result_type::upper_choice(self.ctx, &state.store, variable);
                    let lower = result_type::lower_choice(self.ctx, &state.store, variable).filter(|l| *l != upper);
                    match lower {
                        Some(lower) if self.may_fork(state, fork_depth) => {
                            return self.fork(state, analyzer, variable, [upper, lower], fork_depth + 1);
                        }
                        _ => upper,
                    }
                }
                _ => result_type::tightest_type(self.ctx, &state.store, variable),
            };
            log::debug!(
                "fixing {} := {} ({:?})",
                state.store.variable_name(variable),
                state.store.render(self.ctx, &ty),
                step
            );
            state.fix_variable(self.ctx, variable, ty);
        }
        self.check_soundness(state)
    }

    /// Branches share the analyzer, so a fork is only taken once every atom has
    /// been analyzed. Past `max_fork_depth` nested forks the upper choice is kept.
    fn may_fork(&self, state: &SolverState, fork_depth: usize) -> bool {
        self.config.allow_forking && fork_depth < self.config.max_fork_depth && state.atoms.is_empty()
    }

    /// Tries each choice for `variable` on a copy of `state`. The first branch
    /// that solves wins; otherwise the branch that merged the most atoms is kept
    /// and its error returned.
    fn fork(
        &self,
        state: &mut SolverState,
        analyzer: &mut Option<Box<dyn AtomAnalyzer + '_>>,
        variable: TypeVariableId,
        choices: [Type; 2],
        fork_depth: usize,
    ) -> InferenceResult<()> {
        let mut best: Option<(SolverState, InferenceError)> = None;
        for choice in choices {
            let mut branch = state.clone();
            log::debug!(
                "forking on {} (depth {fork_depth}): trying {}",
                branch.store.variable_name(variable),
                branch.store.render(self.ctx, &choice)
            );
            branch.fix_variable(self.ctx, variable, choice);
            match self.run_at_depth(&mut branch, analyzer, fork_depth) {
                Ok(()) => {
                    *state = branch;
                    return Ok(());
                }
                Err(err) => {
                    log::debug!("fork branch failed: {err}");
                    let better = best
                        .as_ref()
                        .map_or(true, |(kept, _)| branch.analyzed.len() > kept.analyzed.len());
                    if better {
                        best = Some((branch, err));
                    }
                }
            }
        }
        match best {
            Some((branch, err)) => {
                *state = branch;
                Err(err)
            }
            None => Err(InferenceError::Internal("fork without choices".to_string())),
        }
    }

    fn check_conflicts(&self, store: &ConstraintStore) -> InferenceResult<()> {
        match store.conflicts().first() {
            Some(conflict) => Err(self.conflict_error(store, conflict)),
            None => Ok(()),
        }
    }

    fn conflict_error(&self, store: &ConstraintStore, conflict: &Conflict) -> InferenceError {
        incompatible(
            self.ctx,
            store,
            conflict.variable,
            &conflict.lower,
            &conflict.upper,
            &conflict.position,
        )
    }

    /// Re-checks every bound and every initial relation against the fixed types.
    fn check_soundness(&self, state: &SolverState) -> InferenceResult<()> {
        let store = &state.store;
        self.check_conflicts(store)?;

        for info in store.variables() {
            let Some(fixed) = store.fixed_type(info.id) else {
                return Err(InferenceError::Internal(format!("{} was never fixed", info.name)));
            };
            for constraint in store.constraints(info.id) {
                let bound = store.apply_fixed(&constraint.bound);
                let (holds, lower, upper) = match constraint.kind {
                    ConstraintKind::Lower => (self.holds(&bound, fixed), bound, fixed.clone()),
                    ConstraintKind::Upper => (self.holds(fixed, &bound), fixed.clone(), bound),
                    ConstraintKind::Equality => {
                        (self.holds(fixed, &bound) && self.holds(&bound, fixed), fixed.clone(), bound)
                    }
                };
                if !holds {
                    return Err(incompatible(
                        self.ctx,
                        store,
                        Some(info.id),
                        &lower,
                        &upper,
                        &constraint.position,
                    ));
                }
            }
        }

        for relation in store.initial_relations() {
            let sub = store.apply_fixed(&relation.sub);
            let sup = store.apply_fixed(&relation.sup);
            if !self.holds(&sub, &sup) {
                let variable = relation
                    .sub
                    .free_variables()
                    .into_iter()
                    .chain(relation.sup.free_variables())
                    .next();
                return Err(incompatible(self.ctx, store, variable, &sub, &sup, &relation.position));
            }
        }
        Ok(())
    }

    /// `sub <: sup`, where a captured type on the right may stand for the
    /// projection it was captured from.
    fn holds(&self, sub: &Type, sup: &Type) -> bool {
        self.ctx.is_subtype_of(sub, sup)
            || (sup.contains_captured() && self.ctx.is_subtype_of(sub, &uncapture(self.ctx, sup)))
    }
}

fn incompatible(
    ctx: &TypeContext,
    store: &ConstraintStore,
    variable: Option<TypeVariableId>,
    lower: &Type,
    upper: &Type,
    position: &ConstraintPosition,
) -> InferenceError {
    InferenceError::IncompatibleConstraint {
        variable: variable.map(|v| store.variable_name(v)).unwrap_or_else(|| "_".to_string()),
        lower: store.render(ctx, lower),
        upper: store.render(ctx, upper),
        positions: vec![position.clone()],
        span: position.span(),
    }
}
