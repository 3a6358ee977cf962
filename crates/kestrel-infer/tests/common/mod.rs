#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use kestrel_infer::{
    AtomAnalysis, AtomAnalyzer, AtomExpectation, CallableReferenceAtom, ConstraintSystem, InferenceResult, LambdaAtom,
    SolverConfig,
};
use kestrel_types::{Type, TypeContext, TypeParameterId, Variance};

/// A fresh context; also routes solver logs to the test output (`RUST_LOG=kestrel_infer=trace`).
pub fn ctx() -> TypeContext {
    let _ = env_logger::builder().is_test(true).try_init();
    TypeContext::with_builtins()
}

pub fn named(ctx: &TypeContext, name: &str) -> Type {
    let id = ctx
        .class_by_name(name)
        .unwrap_or_else(|| panic!("class {name} not declared"));
    Type::class(id)
}

pub fn generic(ctx: &TypeContext, name: &str, args: Vec<Type>) -> Type {
    let id = ctx
        .class_by_name(name)
        .unwrap_or_else(|| panic!("class {name} not declared"));
    ctx.class_type(id, args).unwrap()
}

pub fn function(ctx: &TypeContext, parameters: Vec<Type>, return_type: Type) -> Type {
    ctx.function_type(None, parameters, return_type).unwrap()
}

/// Declares the type parameters of a generic function, all invariant.
pub fn type_parameters(ctx: &mut TypeContext, names: &[&str]) -> Vec<TypeParameterId> {
    names
        .iter()
        .map(|name| ctx.declare_type_parameter(name, Variance::Invariant))
        .collect()
}

pub fn param(id: TypeParameterId) -> Type {
    Type::parameter(id)
}

/// A system with a variable for each of `parameters`.
pub fn system<'ctx>(ctx: &'ctx TypeContext, parameters: &[TypeParameterId]) -> ConstraintSystem<'ctx> {
    system_with(ctx, parameters, SolverConfig::default())
}

pub fn system_with<'ctx>(
    ctx: &'ctx TypeContext,
    parameters: &[TypeParameterId],
    config: SolverConfig,
) -> ConstraintSystem<'ctx> {
    let mut system = ConstraintSystem::new(ctx, config);
    system.fresh_variables_for(parameters).unwrap();
    system
}

type Respond = Box<dyn FnMut(&AtomExpectation) -> AtomAnalysis>;
pub type Seen = Rc<RefCell<Vec<AtomExpectation>>>;

/// Answers every analysis request with `respond` and records the expectations
/// it was handed.
pub struct ScriptedAnalyzer {
    pub seen: Seen,
    respond: Respond,
}

impl ScriptedAnalyzer {
    pub fn new(respond: impl FnMut(&AtomExpectation) -> AtomAnalysis + 'static) -> (Self, Seen) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let analyzer = ScriptedAnalyzer {
            seen: seen.clone(),
            respond: Box::new(respond),
        };
        (analyzer, seen)
    }

    /// Reports the expected type itself, with a `Unit` body where the return
    /// type is still open.
    pub fn echo(ctx: &TypeContext) -> (Self, Seen) {
        let ctx = ctx.clone();
        let unit = named(&ctx, "Unit");
        Self::new(move |expected| AtomAnalysis::new(expected.complete(&ctx, unit.clone()).unwrap()))
    }
}

impl AtomAnalyzer for ScriptedAnalyzer {
    fn analyze_lambda(&mut self, _atom: &LambdaAtom, expected: &AtomExpectation) -> InferenceResult<AtomAnalysis> {
        self.seen.borrow_mut().push(expected.clone());
        Ok((self.respond)(expected))
    }

    fn analyze_callable_reference(
        &mut self,
        _atom: &CallableReferenceAtom,
        expected: &AtomExpectation,
    ) -> InferenceResult<AtomAnalysis> {
        self.seen.borrow_mut().push(expected.clone());
        Ok((self.respond)(expected))
    }
}
