// src/postponed/resolver.rs
use kestrel_types::{uncapture, Type, TypeContext, TypeVariableId};

use crate::config::SolverConfig;
use crate::constraint::{ConstraintKind, ConstraintPosition};
use crate::error::{InferenceError, InferenceResult};
use crate::fixation::SolverState;
use crate::postponed::{AtomAnalysis, AtomAnalyzer, AtomExpectation, AtomState, PostponedAtom, PostponedAtomKind};
use crate::variable::{TypeVariableInfo, TypeVariableOrigin};

/// Positions of `ty` a function literal consumes: receiver and parameters of a
/// function type, or the whole type otherwise.
pub(crate) fn input_types(ctx: &TypeContext, ty: &Type) -> Vec<Type> {
    match ctx.function_type_view(ty) {
        Some(view) => view.input_types().cloned().collect(),
        None => vec![ty.clone()],
    }
}

/// The return position of `ty`, if it is a function type.
pub(crate) fn output_type(ctx: &TypeContext, ty: &Type) -> Option<Type> {
    ctx.function_type_view(ty).map(|view| view.return_type)
}

impl SolverState {
    /// Runs one round of atom processing: revises bare-variable expected types,
    /// feeds explicitly declared parameter types, then analyzes at most one atom
    /// whose input types are known.
    ///
    /// Returns whether an atom was analyzed.
    pub(crate) fn process_atoms(
        &mut self,
        ctx: &TypeContext,
        config: &SolverConfig,
        analyzer: &mut Option<Box<dyn AtomAnalyzer + '_>>,
    ) -> InferenceResult<bool> {
        for index in 0..self.atoms.len() {
            self.revise_expected_type(ctx, config, index)?;
            self.feed_declared_types(ctx, index);
        }

        let ready = self.atoms.iter().position(|atom| {
            input_types(ctx, atom.current_expected_type())
                .iter()
                .all(|t| self.store.apply_fixed(t).is_proper())
        });
        let Some(index) = ready else {
            return Ok(false);
        };
        let atom = self.atoms.remove(index);
        let merged = self.analyze(ctx, atom, analyzer)?;
        self.analyzed.push(merged);
        Ok(true)
    }

    /// Replaces a bare variable expected type by a function type synthesized
    /// from the atom's declared shape.
    fn revise_expected_type(&mut self, ctx: &TypeContext, config: &SolverConfig, index: usize) -> InferenceResult<()> {
        let atom = &self.atoms[index];
        if atom.revised_expected_type.is_some() || atom.state != AtomState::Created {
            return Ok(());
        }
        let Some(variable) = atom.expected_type.as_variable() else {
            return Ok(());
        };
        if self.store.is_fixed(variable) {
            return Ok(());
        }
        let id = atom.id;
        let span = atom.span;
        let argument_index = atom.argument_index;

        let (receiver, parameters, return_type) = match atom.kind.clone() {
            PostponedAtomKind::Lambda(lambda) => {
                let declared = lambda.extract_parameter_types_from_declaration();
                let forced_receiver = lambda.is_lambda()
                    && declared.is_none()
                    && config.forced_extension_receiver_in_lambdas
                    && self.extension_function_bound(ctx, variable).is_some();
                if declared.is_none() && !forced_receiver {
                    return Ok(());
                }

                let receiver = if lambda.is_function_expression() {
                    lambda.receiver.clone()
                } else if forced_receiver {
                    Some(self.fresh(TypeVariableOrigin::LambdaReceiver { atom: id }))
                } else {
                    None
                };
                let declared_parameters: Vec<Option<Type>> = if forced_receiver {
                    self.extension_function_bound(ctx, variable)
                        .map(|count| vec![None; count])
                        .unwrap_or_default()
                } else {
                    lambda.parameters.clone().unwrap_or_default()
                };
                let parameters = declared_parameters
                    .into_iter()
                    .enumerate()
                    .map(|(i, declared)| {
                        declared.unwrap_or_else(|| self.fresh(TypeVariableOrigin::LambdaParameter { atom: id, index: i }))
                    })
                    .collect::<Vec<_>>();
                let return_type = lambda
                    .return_type
                    .clone()
                    .unwrap_or_else(|| self.fresh(TypeVariableOrigin::LambdaReturn { atom: id }));
                (receiver, parameters, return_type)
            }
            PostponedAtomKind::CallableReference(reference) => {
                let Some(count) = reference.parameter_count else {
                    return Ok(());
                };
                let parameters = (0..count)
                    .map(|i| self.fresh(TypeVariableOrigin::ReferenceParameter { atom: id, index: i }))
                    .collect::<Vec<_>>();
                let return_type = self.fresh(TypeVariableOrigin::ReferenceReturn { atom: id });
                (None, parameters, return_type)
            }
        };

        let revised = ctx.function_type(receiver, parameters, return_type)?;
        log::debug!(
            "{id}: revised expected type {} to {}",
            self.store.variable_name(variable),
            self.store.render(ctx, &revised)
        );
        self.store.add_subtype(
            ctx,
            &revised,
            &Type::variable(variable),
            &ConstraintPosition::Argument {
                index: argument_index,
                span,
            },
        );
        self.atoms[index].revised_expected_type = Some(revised);
        Ok(())
    }

    /// Parameter count of an extension function type among the upper bounds of `variable`.
    fn extension_function_bound(&self, ctx: &TypeContext, variable: TypeVariableId) -> Option<usize> {
        self.store
            .constraints(variable)
            .iter()
            .filter(|c| c.kind != ConstraintKind::Lower)
            .find(|c| ctx.is_extension_function_type(&c.bound))
            .and_then(|c| ctx.function_type_view(&c.bound))
            .map(|view| view.parameters.len())
    }

    fn fresh(&mut self, origin: TypeVariableOrigin) -> Type {
        Type::variable(self.store.new_variable(|id| TypeVariableInfo::synthetic(id, origin)))
    }

    /// Feeds explicitly declared input types into the system while the expected
    /// type still mentions unfixed variables.
    fn feed_declared_types(&mut self, ctx: &TypeContext, index: usize) {
        let atom = &self.atoms[index];
        if atom.state != AtomState::Created {
            return;
        }
        let PostponedAtomKind::Lambda(lambda) = &atom.kind else {
            return;
        };
        if !lambda.has_explicit_parameter_types() {
            return;
        }
        let Some(view) = ctx.function_type_view(atom.current_expected_type()) else {
            return;
        };

        let id = atom.id;
        let span = atom.span;
        let mut pairs: Vec<(Type, Type, ConstraintPosition)> = Vec::new();
        if lambda.is_function_expression() {
            if let (Some(expected), Some(declared)) = (&view.receiver, &lambda.receiver) {
                pairs.push((
                    expected.clone(),
                    declared.clone(),
                    ConstraintPosition::LambdaReceiver { atom: id, span },
                ));
            }
        }
        let declared_parameters = lambda.parameters.iter().flatten();
        if lambda.parameters.as_ref().map(Vec::len) == Some(view.parameters.len()) {
            for (i, (expected, declared)) in view.parameters.iter().zip(declared_parameters).enumerate() {
                if let Some(declared) = declared {
                    pairs.push((
                        expected.clone(),
                        declared.clone(),
                        ConstraintPosition::LambdaParameter { atom: id, index: i, span },
                    ));
                }
            }
        }

        for (expected, declared, position) in pairs {
            self.store.add_subtype(ctx, &expected, &declared, &position);
        }
        log::debug!("{id}: declared parameter types recorded, partially analyzed");
        self.atoms[index].state = AtomState::PartiallyAnalyzed;
    }

    /// Hands a ready atom to the analyzer and merges what it reports.
    fn analyze(
        &mut self,
        ctx: &TypeContext,
        mut atom: PostponedAtom,
        analyzer: &mut Option<Box<dyn AtomAnalyzer + '_>>,
    ) -> InferenceResult<PostponedAtom> {
        let expected = self.store.apply_fixed(atom.current_expected_type());
        check_declared_shape(ctx, &atom, &expected)?;
        let expectation = expectation_for(ctx, &expected);

        let Some(analyzer) = analyzer.as_mut() else {
            return Err(InferenceError::Internal(format!(
                "{} is ready for analysis but no atom analyzer is attached",
                atom.id
            )));
        };
        let analysis = match &atom.kind {
            PostponedAtomKind::Lambda(lambda) => analyzer.analyze_lambda(lambda, &expectation)?,
            PostponedAtomKind::CallableReference(reference) => {
                analyzer.analyze_callable_reference(reference, &expectation)?
            }
        };
        atom.state = AtomState::FullyAnalyzed;
        log::debug!(
            "{}: analyzed against {}, got {}",
            atom.id,
            self.store.render(ctx, &expected),
            self.store.render(ctx, &analysis.atom_type)
        );

        if let (PostponedAtomKind::Lambda(lambda), Some(found)) = (&atom.kind, analysis.literal_kind) {
            if found != lambda.literal_kind {
                return Err(InferenceError::ShapeMismatch {
                    atom: atom.id,
                    expected: lambda.literal_kind.to_string(),
                    found: found.to_string(),
                    span: atom.span,
                });
            }
        }

        self.merge(ctx, &atom, &expected, &analysis);
        atom.analysis = Some(analysis);
        atom.state = AtomState::Merged;
        Ok(atom)
    }

    fn merge(&mut self, ctx: &TypeContext, atom: &PostponedAtom, expected: &Type, analysis: &AtomAnalysis) {
        self.store.add_initial_relation(
            ctx,
            analysis.atom_type.clone(),
            expected.clone(),
            ConstraintPosition::AtomResult {
                atom: atom.id,
                span: atom.span,
            },
        );
        for outer in &analysis.outer_constraints {
            self.store.add_initial_relation(
                ctx,
                outer.sub.clone(),
                outer.sup.clone(),
                ConstraintPosition::NestedCall {
                    atom: atom.id,
                    span: atom.span,
                },
            );
        }
        log::debug!(
            "{}: merged with {} outer constraint(s)",
            atom.id,
            analysis.outer_constraints.len()
        );
    }
}

/// Rejects atoms whose declared arity cannot match the expected function type.
fn check_declared_shape(ctx: &TypeContext, atom: &PostponedAtom, expected: &Type) -> InferenceResult<()> {
    let Some(view) = ctx.function_type_view(expected) else {
        return Ok(());
    };
    let expected_inputs = view.input_types().count();
    let mismatch = match &atom.kind {
        PostponedAtomKind::Lambda(lambda) if lambda.is_function_expression() => {
            let declared = lambda.extract_parameter_types_from_declaration().map_or(0, |d| d.len());
            (declared != expected_inputs || lambda.receiver.is_some() != view.receiver.is_some())
                .then(|| (expected_inputs, format!("a function expression with {declared} input(s)")))
        }
        PostponedAtomKind::Lambda(lambda) => match &lambda.parameters {
            Some(parameters) if !parameters.is_empty() && parameters.len() != view.parameters.len() => Some((
                view.parameters.len(),
                format!("a lambda with {} parameter(s)", parameters.len()),
            )),
            _ => None,
        },
        PostponedAtomKind::CallableReference(reference) => match reference.parameter_count {
            Some(count) if count != expected_inputs => {
                Some((expected_inputs, format!("a callable reference with {count} parameter(s)")))
            }
            _ => None,
        },
    };
    match mismatch {
        Some((arity, found)) => Err(InferenceError::ShapeMismatch {
            atom: atom.id,
            expected: format!("a function with {arity} input(s)"),
            found,
            span: atom.span,
        }),
        None => Ok(()),
    }
}

/// What the analyzer gets to see of `expected`: uncaptured inputs, and the
/// return type only once it is proper.
fn expectation_for(ctx: &TypeContext, expected: &Type) -> AtomExpectation {
    match ctx.function_type_view(expected) {
        Some(view) => AtomExpectation::Function {
            receiver: view.receiver.as_ref().map(|r| uncapture(ctx, r)),
            parameters: view.parameters.iter().map(|p| uncapture(ctx, p)).collect(),
            return_type: Some(view.return_type)
                .filter(Type::is_proper)
                .map(|r| uncapture(ctx, &r)),
        },
        None => AtomExpectation::Known(uncapture(ctx, expected)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::ConstraintStore;
    use crate::postponed::{AtomId, ExpressionId, LambdaAtom};

    fn state_with_variable() -> (SolverState, TypeVariableId) {
        let mut store = ConstraintStore::new(16);
        let var = store.new_variable(|id| {
            TypeVariableInfo::synthetic(id, TypeVariableOrigin::TypeParameter(kestrel_types::TypeParameterId(0)))
        });
        (SolverState::new(store), var)
    }

    fn atom(kind: PostponedAtomKind, expected: Type) -> PostponedAtom {
        PostponedAtom {
            id: AtomId(0),
            kind,
            expected_type: expected,
            revised_expected_type: None,
            argument_index: 0,
            span: None,
            state: AtomState::Created,
            analysis: None,
        }
    }

    #[test]
    fn declared_lambda_shape_revises_bare_variable() {
        let ctx = TypeContext::with_builtins();
        let int = Type::class(ctx.builtins().int);
        let (mut state, var) = state_with_variable();
        let lambda = LambdaAtom::lambda_with_parameters(ExpressionId(0), vec![Some(int.clone())]);
        state
            .atoms
            .push(atom(PostponedAtomKind::Lambda(lambda), Type::variable(var)));

        state.revise_expected_type(&ctx, &SolverConfig::default(), 0).unwrap();
        state.feed_declared_types(&ctx, 0);
        let revised = state.atoms[0].revised_expected_type.clone().unwrap();
        let view = ctx.function_type_view(&revised).unwrap();
        assert_eq!(view.parameters, vec![int]);
        assert_eq!(state.store.variable_name(view.return_type.as_variable().unwrap()), "_R");
        assert!(state
            .store
            .constraints(var)
            .iter()
            .any(|c| c.kind == ConstraintKind::Lower && c.bound == revised));
        assert_eq!(state.atoms[0].state, AtomState::PartiallyAnalyzed);
    }

    #[test]
    fn shapeless_lambda_is_not_revised_without_receiver_bound() {
        let ctx = TypeContext::with_builtins();
        let (mut state, var) = state_with_variable();
        state.atoms.push(atom(
            PostponedAtomKind::Lambda(LambdaAtom::lambda(ExpressionId(0))),
            Type::variable(var),
        ));
        state.process_atoms(&ctx, &SolverConfig::default(), &mut None).unwrap();
        assert!(state.atoms[0].revised_expected_type.is_none());
        assert_eq!(state.atoms[0].state, AtomState::Created);
    }

    #[test]
    fn forced_receiver_comes_from_extension_function_bound() {
        let ctx = TypeContext::with_builtins();
        let b = ctx.builtins();
        let (mut state, var) = state_with_variable();
        let bound = ctx
            .function_type(Some(Type::class(b.string)), vec![], Type::class(b.unit))
            .unwrap();
        state.store.record_bound(
            &ctx,
            var,
            ConstraintKind::Upper,
            bound,
            ConstraintPosition::argument(0),
        );
        state.atoms.push(atom(
            PostponedAtomKind::Lambda(LambdaAtom::lambda(ExpressionId(0))),
            Type::variable(var),
        ));

        let mut forced = state.clone();
        forced.revise_expected_type(&ctx, &SolverConfig::default(), 0).unwrap();
        let revised = forced.atoms[0].revised_expected_type.clone().unwrap();
        let view = ctx.function_type_view(&revised).unwrap();
        let receiver = view.receiver.unwrap();
        assert_eq!(forced.store.variable_name(receiver.as_variable().unwrap()), "_RCV");

        let config = SolverConfig {
            forced_extension_receiver_in_lambdas: false,
            ..SolverConfig::default()
        };
        state.revise_expected_type(&ctx, &config, 0).unwrap();
        assert!(state.atoms[0].revised_expected_type.is_none());
    }

    #[test]
    fn ready_atom_without_analyzer_is_an_internal_error() {
        let ctx = TypeContext::with_builtins();
        let b = ctx.builtins();
        let (mut state, _) = state_with_variable();
        let expected = ctx
            .function_type(None, vec![Type::class(b.int)], Type::class(b.unit))
            .unwrap();
        state.atoms.push(atom(
            PostponedAtomKind::Lambda(LambdaAtom::lambda(ExpressionId(0))),
            expected,
        ));
        let err = state
            .process_atoms(&ctx, &SolverConfig::default(), &mut None)
            .unwrap_err();
        assert!(matches!(err, InferenceError::Internal(_)));
    }

    #[test]
    fn unfixed_return_type_is_withheld_from_the_analyzer() {
        let ctx = TypeContext::with_builtins();
        let b = ctx.builtins();
        let (_, var) = state_with_variable();
        let pending = ctx
            .function_type(None, vec![Type::class(b.int)], Type::variable(var))
            .unwrap();
        assert_eq!(
            expectation_for(&ctx, &pending),
            AtomExpectation::Function {
                receiver: None,
                parameters: vec![Type::class(b.int)],
                return_type: None,
            }
        );

        let known = ctx
            .function_type(Some(Type::class(b.string)), vec![], Type::class(b.unit))
            .unwrap();
        let expectation = expectation_for(&ctx, &known);
        assert_eq!(expectation.return_type(), Some(&Type::class(b.unit)));
        assert_eq!(expectation.input_types(), vec![&Type::class(b.string)]);
        assert_eq!(
            expectation_for(&ctx, &Type::class(b.int)),
            AtomExpectation::Known(Type::class(b.int))
        );
    }
}
