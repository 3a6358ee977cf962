// src/system.rs
use std::collections::BTreeMap;

use miette::SourceSpan;

use kestrel_types::{uncapture, Type, TypeContext, TypeParameterId, TypeVariableId};

use crate::config::SolverConfig;
use crate::constraint::{Constraint, ConstraintKind, ConstraintPosition, ConstraintStore};
use crate::error::{InferenceError, InferenceResult};
use crate::fixation::{Orchestrator, SolverState};
use crate::postponed::{AtomAnalyzer, AtomId, AtomState, PostponedAtom, PostponedAtomKind};
use crate::substitution::{Substitution, SubstitutionEntry};
use crate::variable::{TypeVariableInfo, TypeVariableOrigin};

/// Constraint system for one attempt at resolving one call.
///
/// Created by the call resolver, fed with the call's argument/parameter pairs
/// and postponed arguments, then solved exactly once.
pub struct ConstraintSystem<'ctx> {
    ctx: &'ctx TypeContext,
    config: SolverConfig,
    state: SolverState,
    /// Type parameter of the called declaration to the variable standing for it.
    parameters: BTreeMap<TypeParameterId, TypeVariableId>,
    analyzer: Option<Box<dyn AtomAnalyzer + 'ctx>>,
    next_atom: u32,
    solved: bool,
}

impl<'ctx> ConstraintSystem<'ctx> {
    pub fn new(ctx: &'ctx TypeContext, config: SolverConfig) -> Self {
        ConstraintSystem {
            ctx,
            state: SolverState::new(ConstraintStore::new(config.max_incorporation_depth)),
            config,
            parameters: BTreeMap::new(),
            analyzer: None,
            next_atom: 0,
            solved: false,
        }
    }

    /// Attaches the resolver that analyzes lambda bodies and callable references.
    pub fn with_analyzer(mut self, analyzer: impl AtomAnalyzer + 'ctx) -> Self {
        self.analyzer = Some(Box::new(analyzer));
        self
    }

    pub fn context(&self) -> &'ctx TypeContext {
        self.ctx
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Creates the variable standing for `parameter` in this call.
    pub fn new_type_variable(&mut self, parameter: TypeParameterId) -> InferenceResult<TypeVariableId> {
        let decl = self.ctx.type_parameter(parameter)?;
        if let Some(existing) = self.parameters.get(&parameter) {
            return Err(InferenceError::Internal(format!(
                "type parameter {} already has variable {existing}",
                decl.name
            )));
        }
        let variable = self.state.store.new_variable(|id| TypeVariableInfo {
            id,
            name: decl.name.clone(),
            origin: TypeVariableOrigin::TypeParameter(parameter),
            only_input_types: decl.only_input_types,
            reified: decl.reified,
            declared_bounds: decl.bounds.clone(),
            flexible_bounds: decl.bounds.iter().any(Type::contains_flexible),
        });
        log::trace!("new type variable {} for {}", variable, decl.name);
        self.parameters.insert(parameter, variable);
        Ok(variable)
    }

    pub fn fresh_variables_for(&mut self, parameters: &[TypeParameterId]) -> InferenceResult<Vec<TypeVariableId>> {
        parameters.iter().map(|&p| self.new_type_variable(p)).collect()
    }

    /// Replaces the call's type parameters in `ty` by their variables.
    pub fn instantiate(&self, ty: &Type) -> Type {
        let mapping: BTreeMap<TypeParameterId, Type> = self
            .parameters
            .iter()
            .map(|(&p, &v)| (p, Type::variable(v)))
            .collect();
        ty.substitute_parameters(&mapping)
    }

    pub fn variable(&self, id: TypeVariableId) -> Option<&TypeVariableInfo> {
        self.state.store.variable(id)
    }

    pub fn variable_for(&self, parameter: TypeParameterId) -> Option<TypeVariableId> {
        self.parameters.get(&parameter).copied()
    }

    pub fn constraints(&self, variable: TypeVariableId) -> &[Constraint] {
        self.state.store.constraints(variable)
    }

    pub fn store(&self) -> &ConstraintStore {
        &self.state.store
    }

    /// Records one bound on `variable`.
    pub fn add_constraint(
        &mut self,
        variable: TypeVariableId,
        bound: &Type,
        kind: ConstraintKind,
        position: ConstraintPosition,
    ) -> InferenceResult<()> {
        self.known_variable(variable)?;
        let var = Type::variable(variable);
        let bound = self.instantiate(bound);
        let store = &mut self.state.store;
        match kind {
            ConstraintKind::Lower => store.add_subtype(self.ctx, &bound, &var, &position),
            ConstraintKind::Upper => store.add_subtype(self.ctx, &var, &bound, &position),
            ConstraintKind::Equality => store.add_equality(self.ctx, &var, &bound, &position),
        }
        Ok(())
    }

    /// Records `sub <: sup`; it must hold for the final substitution.
    pub fn add_subtype_constraint(&mut self, sub: &Type, sup: &Type, position: ConstraintPosition) {
        let sub = self.instantiate(sub);
        let sup = self.instantiate(sup);
        self.state.store.add_initial_relation(self.ctx, sub, sup, position);
    }

    /// Checks an argument type against its declared parameter type.
    pub fn add_constraint_from_argument(&mut self, argument: &Type, parameter: &Type, position: ConstraintPosition) {
        self.add_subtype_constraint(argument, parameter, position);
    }

    pub fn add_explicit_type_argument(
        &mut self,
        variable: TypeVariableId,
        ty: &Type,
        span: Option<SourceSpan>,
    ) -> InferenceResult<()> {
        self.add_constraint(
            variable,
            ty,
            ConstraintKind::Equality,
            ConstraintPosition::ExplicitTypeArgument { span },
        )
    }

    /// Checks the call's declared return type against the type the surrounding
    /// code expects.
    pub fn add_expected_type(&mut self, return_type: &Type, expected: &Type, span: Option<SourceSpan>) {
        self.add_subtype_constraint(return_type, expected, ConstraintPosition::ExpectedType { span });
    }

    /// Queues a lambda or callable reference argument.
    pub fn add_postponed_atom(
        &mut self,
        kind: PostponedAtomKind,
        expected_type: &Type,
        argument_index: usize,
        span: Option<SourceSpan>,
    ) -> AtomId {
        let id = AtomId(self.next_atom);
        self.next_atom += 1;
        let expected_type = self.instantiate(expected_type);
        log::trace!("{id}: postponed against {}", self.state.store.render(self.ctx, &expected_type));
        self.state.atoms.push(PostponedAtom {
            id,
            kind,
            expected_type,
            revised_expected_type: None,
            argument_index,
            span,
            state: AtomState::Created,
            analysis: None,
        });
        id
    }

    /// Atoms whose analysis has been merged, in analysis order.
    pub fn analyzed_atoms(&self) -> &[PostponedAtom] {
        &self.state.analyzed
    }

    pub fn pending_atoms(&self) -> &[PostponedAtom] {
        &self.state.atoms
    }

    /// Fixes every variable and returns their values.
    ///
    /// May be called once; a second call fails with `AlreadySolved` whatever the
    /// outcome of the first.
    pub fn solve(&mut self) -> InferenceResult<Substitution> {
        if self.solved {
            return Err(InferenceError::AlreadySolved);
        }
        self.solved = true;

        self.add_declared_upper_bounds();
        let orchestrator = Orchestrator::new(self.ctx, &self.config);
        orchestrator.run(&mut self.state, &mut self.analyzer)?;

        let store = &self.state.store;
        let mut substitution = Substitution::default();
        for info in store.variables() {
            let Some(ty) = store.fixed_type(info.id) else {
                return Err(InferenceError::Internal(format!("{} left unfixed", info.name)));
            };
            // Reified arguments must be denotable.
            let ty = if info.reified {
                uncapture(self.ctx, ty)
            } else {
                ty.clone()
            };
            substitution.insert(
                info.id,
                SubstitutionEntry {
                    name: info.name.clone(),
                    parameter: info.origin.type_parameter(),
                    ty,
                },
            );
        }
        log::debug!("solved {} variable(s)", substitution.len());
        Ok(substitution)
    }

    fn add_declared_upper_bounds(&mut self) {
        let bounds: Vec<(TypeVariableId, TypeParameterId, Type)> = self
            .state
            .store
            .variables()
            .filter_map(|info| info.origin.type_parameter().map(|p| (info, p)))
            .flat_map(|(info, p)| {
                info.declared_bounds
                    .iter()
                    .map(move |bound| (info.id, p, bound.clone()))
            })
            .collect();
        for (variable, parameter, bound) in bounds {
            let bound = self.instantiate(&bound);
            self.state.store.add_subtype(
                self.ctx,
                &Type::variable(variable),
                &bound,
                &ConstraintPosition::DeclaredUpperBound { parameter },
            );
        }
    }

    fn known_variable(&self, variable: TypeVariableId) -> InferenceResult<()> {
        match self.state.store.variable(variable) {
            Some(_) => Ok(()),
            None => Err(InferenceError::Internal(format!("unknown type variable {variable}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_types::Variance;

    #[test]
    fn solving_twice_is_rejected() {
        let mut ctx = TypeContext::with_builtins();
        let t = ctx.declare_type_parameter("T", Variance::Invariant);
        let int = Type::class(ctx.builtins().int);
        let mut system = ConstraintSystem::new(&ctx, SolverConfig::default());
        system.new_type_variable(t).unwrap();
        system.add_constraint_from_argument(&int, &Type::parameter(t), ConstraintPosition::argument(0));
        assert!(system.solve().is_ok());
        assert_eq!(system.solve().unwrap_err(), InferenceError::AlreadySolved);
    }

    #[test]
    fn unknown_variable_is_an_internal_error() {
        let ctx = TypeContext::with_builtins();
        let mut system = ConstraintSystem::new(&ctx, SolverConfig::default());
        let err = system
            .add_constraint(
                TypeVariableId(3),
                &ctx.any_type(),
                ConstraintKind::Upper,
                ConstraintPosition::argument(0),
            )
            .unwrap_err();
        assert!(matches!(err, InferenceError::Internal(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn second_variable_for_a_parameter_is_rejected() {
        let mut ctx = TypeContext::with_builtins();
        let t = ctx.declare_type_parameter("T", Variance::Invariant);
        let mut system = ConstraintSystem::new(&ctx, SolverConfig::default());
        let first = system.new_type_variable(t).unwrap();
        let err = system.new_type_variable(t).unwrap_err();
        assert!(matches!(err, InferenceError::Internal(_)));
        assert_eq!(system.variable_for(t), Some(first));
        assert_eq!(system.store().variables().count(), 1);
    }
}
