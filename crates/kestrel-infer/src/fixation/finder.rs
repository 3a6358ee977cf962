// src/fixation/finder.rs
use std::collections::{BTreeMap, BTreeSet};

use kestrel_types::{Type, TypeContext, TypeVariableId};

use crate::constraint::{ConstraintKind, ConstraintPosition, ConstraintStore};
use crate::error::{InferenceError, InferenceResult};
use crate::fixation::SolverState;
use crate::postponed::resolver::{input_types, output_type};

/// Why a variable was chosen for fixation, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum FixationStep {
    /// Has a proper equality bound.
    Equality,
    /// Every relevant bound is variable-free.
    ProperConstraints,
    /// Blocks the analysis of a postponed atom.
    AtomInput,
    /// Nothing better is available.
    Remaining,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Candidate {
    pub(crate) variable: TypeVariableId,
    pub(crate) step: FixationStep,
}

/// Picks the next variable to fix, or `None` once every variable is fixed.
///
/// Fails with `UnresolvedCycle` when no variable has a proper equality bound and
/// the equality bounds form a cycle through a type constructor.
pub(crate) fn find_candidate(ctx: &TypeContext, state: &SolverState) -> InferenceResult<Option<Candidate>> {
    let store = &state.store;
    let unfixed = store.unfixed_variables();
    if unfixed.is_empty() {
        return Ok(None);
    }

    let candidate = |variable: TypeVariableId, step: FixationStep| -> InferenceResult<Option<Candidate>> {
        Ok(Some(Candidate { variable, step }))
    };

    if let Some(&variable) = unfixed.iter().find(|&&v| {
        store
            .constraints(v)
            .iter()
            .any(|c| c.kind == ConstraintKind::Equality && c.is_relevant() && c.is_proper())
    }) {
        return candidate(variable, FixationStep::Equality);
    }
    detect_cycles(store, &unfixed)?;

    let (inputs, outputs) = atom_variables(ctx, state);

    if let Some(&variable) = unfixed.iter().find(|&&v| {
        let relevant: Vec<_> = store.constraints(v).iter().filter(|c| c.is_relevant()).collect();
        !outputs.contains(&v) && !relevant.is_empty() && relevant.iter().all(|c| c.is_proper())
    }) {
        return candidate(variable, FixationStep::ProperConstraints);
    }

    if let Some(&variable) = unfixed.iter().find(|v| inputs.contains(v)) {
        return candidate(variable, FixationStep::AtomInput);
    }

    let variable = unfixed
        .iter()
        .copied()
        .find(|v| !outputs.contains(v))
        .unwrap_or(unfixed[0]);
    candidate(variable, FixationStep::Remaining)
}

/// Variables in the input and output positions of pending atoms. A variable
/// that occurs in both counts as an input.
fn atom_variables(ctx: &TypeContext, state: &SolverState) -> (BTreeSet<TypeVariableId>, BTreeSet<TypeVariableId>) {
    let mut inputs = BTreeSet::new();
    let mut outputs = BTreeSet::new();
    for atom in &state.atoms {
        let expected = state.store.apply_fixed(atom.current_expected_type());
        for input in input_types(ctx, &expected) {
            inputs.extend(input.free_variables());
        }
        if let Some(output) = output_type(ctx, &expected) {
            outputs.extend(output.free_variables());
        }
        if atom.revised_expected_type.is_some() {
            outputs.extend(state.store.apply_fixed(&atom.expected_type).free_variables());
        }
    }
    let outputs = outputs.difference(&inputs).copied().collect();
    (inputs, outputs)
}

struct Edge {
    to: TypeVariableId,
    through_constructor: bool,
    position: ConstraintPosition,
}

/// Tarjan's strongly connected components over the dependencies introduced by
/// non-proper equality bounds.
fn detect_cycles(store: &ConstraintStore, unfixed: &[TypeVariableId]) -> InferenceResult<()> {
    let mut graph: BTreeMap<TypeVariableId, Vec<Edge>> = BTreeMap::new();
    for &from in unfixed {
        let edges = store
            .constraints(from)
            .iter()
            .filter(|c| c.kind == ConstraintKind::Equality && !c.is_proper())
            .flat_map(|c| {
                let through_constructor = !matches!(c.bound, Type::Variable(_));
                c.bound.free_variables().into_iter().map(move |to| Edge {
                    to,
                    through_constructor,
                    position: c.position.clone(),
                })
            })
            .collect();
        graph.insert(from, edges);
    }

    let mut tarjan = Tarjan::new(&graph);
    for &v in unfixed {
        if !tarjan.index.contains_key(&v) {
            tarjan.visit(v);
        }
    }

    for component in tarjan.components {
        let members: BTreeSet<_> = component.iter().copied().collect();
        let cyclic_edges: Vec<&Edge> = component
            .iter()
            .flat_map(|v| graph.get(v).into_iter().flatten())
            .filter(|e| members.contains(&e.to))
            .collect();
        if !cyclic_edges.iter().any(|e| e.through_constructor) {
            continue;
        }
        let positions: Vec<ConstraintPosition> = cyclic_edges.iter().map(|e| e.position.clone()).collect();
        let variables: Vec<String> = members.iter().map(|&v| store.variable_name(v)).collect();
        log::debug!("unresolved cycle between {}", variables.join(", "));
        return Err(InferenceError::UnresolvedCycle {
            variables,
            span: positions.iter().find_map(ConstraintPosition::span),
            positions,
        });
    }
    Ok(())
}

struct Tarjan<'g> {
    graph: &'g BTreeMap<TypeVariableId, Vec<Edge>>,
    next: usize,
    index: BTreeMap<TypeVariableId, usize>,
    low: BTreeMap<TypeVariableId, usize>,
    stack: Vec<TypeVariableId>,
    on_stack: BTreeSet<TypeVariableId>,
    components: Vec<Vec<TypeVariableId>>,
}

impl<'g> Tarjan<'g> {
    fn new(graph: &'g BTreeMap<TypeVariableId, Vec<Edge>>) -> Self {
        Tarjan {
            graph,
            next: 0,
            index: BTreeMap::new(),
            low: BTreeMap::new(),
            stack: Vec::new(),
            on_stack: BTreeSet::new(),
            components: Vec::new(),
        }
    }

    fn visit(&mut self, v: TypeVariableId) {
        self.index.insert(v, self.next);
        self.low.insert(v, self.next);
        self.next += 1;
        self.stack.push(v);
        self.on_stack.insert(v);

        let graph = self.graph;
        for edge in graph.get(&v).into_iter().flatten() {
            let w = edge.to;
            // Edges to fixed variables lead nowhere.
            if !graph.contains_key(&w) {
                continue;
            }
            if !self.index.contains_key(&w) {
                self.visit(w);
                let low = self.low[&v].min(self.low[&w]);
                self.low.insert(v, low);
            } else if self.on_stack.contains(&w) {
                let low = self.low[&v].min(self.index[&w]);
                self.low.insert(v, low);
            }
        }

        if self.low[&v] == self.index[&v] {
            let mut component = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack.remove(&w);
                component.push(w);
                if w == v {
                    break;
                }
            }
            component.sort();
            self.components.push(component);
        }
    }
}
