mod common;

use common::*;
use expect_test::expect;
use kestrel_infer::{
    AtomAnalysis, AtomExpectation, AtomState, CallableReferenceAtom, ConstraintKind, ConstraintPosition, ExpressionId,
    FunctionLiteralKind, InferenceError, LambdaAtom, OuterConstraint, PostponedAtomKind, SolverConfig,
};
use kestrel_types::Type;

fn lambda(parameters: Option<Vec<Option<Type>>>) -> PostponedAtomKind {
    let atom = match parameters {
        Some(parameters) => LambdaAtom::lambda_with_parameters(ExpressionId(0), parameters),
        None => LambdaAtom::lambda(ExpressionId(0)),
    };
    PostponedAtomKind::Lambda(atom)
}

#[test]
fn test_lambda_is_analyzed_once_its_input_is_fixed() {
    // fun <T, R> T.let(block: (T) -> R): R, called as `1.let { it.toString() }`
    let mut ctx = ctx();
    let ps = type_parameters(&mut ctx, &["T", "R"]);
    let reported = function(&ctx, vec![named(&ctx, "Int")], named(&ctx, "String"));
    let (analyzer, seen) = ScriptedAnalyzer::new(move |_| AtomAnalysis::new(reported.clone()));
    let mut system = system(&ctx, &ps).with_analyzer(analyzer);

    system.add_constraint_from_argument(&named(&ctx, "Int"), &param(ps[0]), ConstraintPosition::argument(0));
    let block = function(&ctx, vec![param(ps[0])], param(ps[1]));
    let atom = system.add_postponed_atom(lambda(None), &block, 1, None);
    assert_eq!(system.pending_atoms()[0].state, AtomState::Created);

    let substitution = system.solve().unwrap();
    expect![[r#"
        T := Int
        R := String
    "#]]
    .assert_eq(&substitution.render(&ctx));

    // R is still open when the lambda is analyzed, so only the input is handed over.
    let seen = seen.borrow();
    assert_eq!(
        *seen,
        vec![AtomExpectation::Function {
            receiver: None,
            parameters: vec![named(&ctx, "Int")],
            return_type: None,
        }]
    );
    assert!(system.pending_atoms().is_empty());
    let analyzed = &system.analyzed_atoms()[0];
    assert_eq!(analyzed.id, atom);
    assert_eq!(analyzed.state, AtomState::Merged);
}

#[test]
fn test_declared_parameter_types_flow_into_the_system() {
    // fun <T> run(block: (T) -> Unit), called as `run { x: Int -> }`
    let mut ctx = ctx();
    let ps = type_parameters(&mut ctx, &["T"]);
    let (analyzer, _) = ScriptedAnalyzer::echo(&ctx);
    let mut system = system(&ctx, &ps).with_analyzer(analyzer);
    let t = system.variable_for(ps[0]).unwrap();

    let block = function(&ctx, vec![param(ps[0])], named(&ctx, "Unit"));
    system.add_postponed_atom(lambda(Some(vec![Some(named(&ctx, "Int"))])), &block, 0, None);
    let substitution = system.solve().unwrap();

    assert_eq!(substitution.for_parameter(ps[0]), Some(&named(&ctx, "Int")));
    assert!(system
        .constraints(t)
        .iter()
        .any(|c| c.kind == ConstraintKind::Upper && matches!(c.position, ConstraintPosition::LambdaParameter { index: 0, .. })));
}

#[test]
fn test_bare_variable_expected_type_is_revised_from_the_lambda_shape() {
    // fun <F> call(f: F), called as `call { x: Int -> }`
    let mut ctx = ctx();
    let ps = type_parameters(&mut ctx, &["F"]);
    let reported = function(&ctx, vec![named(&ctx, "Int")], named(&ctx, "Unit"));
    let (analyzer, seen) = ScriptedAnalyzer::new(move |_| AtomAnalysis::new(reported.clone()));
    let mut system = system(&ctx, &ps).with_analyzer(analyzer);

    system.add_postponed_atom(lambda(Some(vec![Some(named(&ctx, "Int"))])), &param(ps[0]), 0, None);
    let substitution = system.solve().unwrap();
    expect![[r#"
        F := (Int) -> Unit
        _R := Unit
    "#]]
    .assert_eq(&substitution.render(&ctx));

    assert!(matches!(
        seen.borrow()[0],
        AtomExpectation::Function { return_type: None, .. }
    ));
    assert!(system.analyzed_atoms()[0].revised_expected_type.is_some());
}

#[test]
fn test_extension_receiver_is_forced_from_the_variable_bound() {
    // fun <F : String.() -> Unit> build(f: F), called as `build { }`
    let mut ctx = ctx();
    let ps = type_parameters(&mut ctx, &["F"]);
    let (analyzer, seen) = ScriptedAnalyzer::echo(&ctx);
    let mut system = system(&ctx, &ps).with_analyzer(analyzer);
    let f = system.variable_for(ps[0]).unwrap();
    let builder = ctx
        .function_type(Some(named(&ctx, "String")), vec![], named(&ctx, "Unit"))
        .unwrap();
    system
        .add_constraint(f, &builder, ConstraintKind::Upper, ConstraintPosition::argument(0))
        .unwrap();

    system.add_postponed_atom(lambda(None), &param(ps[0]), 0, None);
    let substitution = system.solve().unwrap();
    expect![[r#"
        F := String.() -> Unit
        _RCV := String
        _R := Unit
    "#]]
    .assert_eq(&substitution.render(&ctx));

    assert_eq!(seen.borrow()[0].input_types(), vec![&named(&ctx, "String")]);
}

#[test]
fn test_function_expression_receiver_is_matched() {
    // fun <T> with(block: T.() -> Unit), called as `with(fun String.() {})`
    let mut ctx = ctx();
    let ps = type_parameters(&mut ctx, &["T"]);
    let (analyzer, _) = ScriptedAnalyzer::echo(&ctx);
    let mut system = system(&ctx, &ps).with_analyzer(analyzer);

    let block = ctx
        .function_type(Some(param(ps[0])), vec![], named(&ctx, "Unit"))
        .unwrap();
    let literal = LambdaAtom::function_expression(ExpressionId(3), Some(named(&ctx, "String")), vec![], None);
    assert!(literal.is_function_expression_with_receiver());
    system.add_postponed_atom(PostponedAtomKind::Lambda(literal), &block, 0, None);

    let substitution = system.solve().unwrap();
    assert_eq!(substitution.for_parameter(ps[0]), Some(&named(&ctx, "String")));
}

#[test]
fn test_parameter_count_mismatch_is_a_shape_error() {
    // fun <T> fold(block: (T, T) -> Unit), called as `fold { x: Int -> }`
    let mut ctx = ctx();
    let ps = type_parameters(&mut ctx, &["T"]);
    let (analyzer, seen) = ScriptedAnalyzer::echo(&ctx);
    let mut system = system(&ctx, &ps).with_analyzer(analyzer);

    let block = function(&ctx, vec![param(ps[0]), param(ps[0])], named(&ctx, "Unit"));
    let span = miette::SourceSpan::from((4, 12));
    system.add_postponed_atom(lambda(Some(vec![Some(named(&ctx, "Int"))])), &block, 0, Some(span));
    let err = system.solve().unwrap_err();

    expect!["Expected a function with 2 input(s) but the argument is a lambda with 1 parameter(s)"]
        .assert_eq(&err.to_string());
    assert!(err.is_recoverable());
    assert_eq!(err.span(), Some(span));
    assert!(seen.borrow().is_empty());
}

#[test]
fn test_literal_kind_reported_by_the_analyzer_must_match() {
    let mut ctx = ctx();
    let ps = type_parameters(&mut ctx, &["T"]);
    let reported = function(&ctx, vec![named(&ctx, "Int")], named(&ctx, "Unit"));
    let (analyzer, _) = ScriptedAnalyzer::new(move |_| AtomAnalysis {
        literal_kind: Some(FunctionLiteralKind::FunctionExpression),
        ..AtomAnalysis::new(reported.clone())
    });
    let mut system = system(&ctx, &ps).with_analyzer(analyzer);
    system.add_constraint_from_argument(&named(&ctx, "Int"), &param(ps[0]), ConstraintPosition::argument(0));
    let block = function(&ctx, vec![param(ps[0])], named(&ctx, "Unit"));
    system.add_postponed_atom(lambda(None), &block, 1, None);

    let err = system.solve().unwrap_err();
    expect!["Expected a lambda but the argument is a function expression"].assert_eq(&err.to_string());
}

#[test]
fn test_callable_reference_gets_fresh_parameter_and_return_variables() {
    // fun <F> invoke(f: F), called as `invoke(::hash)`
    let mut ctx = ctx();
    let ps = type_parameters(&mut ctx, &["F"]);
    let any = ctx.nullable_any_type();
    let reported = function(&ctx, vec![any], named(&ctx, "Int"));
    let (analyzer, seen) = ScriptedAnalyzer::new(move |_| AtomAnalysis::new(reported.clone()));
    let mut system = system(&ctx, &ps).with_analyzer(analyzer);

    let reference = CallableReferenceAtom {
        expression: ExpressionId(1),
        parameter_count: Some(1),
    };
    system.add_postponed_atom(PostponedAtomKind::CallableReference(reference), &param(ps[0]), 0, None);
    let substitution = system.solve().unwrap();
    expect![[r#"
        F := (Any?) -> Int
        _RP0 := Any?
        _R := Int
    "#]]
    .assert_eq(&substitution.render(&ctx));
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn test_outer_constraints_from_lambda_bodies_are_merged() {
    // fun <T, R, S> scope(x: T, block: (T) -> R, sink: S), where the lambda
    // body calls a function constraining S
    let mut ctx = ctx();
    let ps = type_parameters(&mut ctx, &["T", "R", "S"]);
    let system = system(&ctx, &ps);
    let s = system.variable_for(ps[2]).unwrap();

    let list_of_string = generic(&ctx, "List", vec![named(&ctx, "String")]);
    let reported = function(&ctx, vec![named(&ctx, "Int")], named(&ctx, "Unit"));
    let (analyzer, _) = ScriptedAnalyzer::new(move |_| AtomAnalysis {
        outer_constraints: vec![OuterConstraint {
            sub: list_of_string.clone(),
            sup: Type::variable(s),
        }],
        ..AtomAnalysis::new(reported.clone())
    });
    let mut system = system.with_analyzer(analyzer);

    system.add_constraint_from_argument(&named(&ctx, "Int"), &param(ps[0]), ConstraintPosition::argument(0));
    let block = function(&ctx, vec![param(ps[0])], param(ps[1]));
    system.add_postponed_atom(lambda(None), &block, 1, None);
    let substitution = system.solve().unwrap();
    expect![[r#"
        T := Int
        R := Unit
        S := List<String>
    "#]]
    .assert_eq(&substitution.render(&ctx));
    assert!(system
        .constraints(s)
        .iter()
        .any(|c| matches!(c.position, ConstraintPosition::NestedCall { .. })));
}

#[test]
fn test_ready_atom_without_analyzer_is_an_internal_error() {
    let mut ctx = ctx();
    let ps = type_parameters(&mut ctx, &["T"]);
    let mut system = system(&ctx, &ps);
    system.add_constraint_from_argument(&named(&ctx, "Int"), &param(ps[0]), ConstraintPosition::argument(0));
    let block = function(&ctx, vec![param(ps[0])], named(&ctx, "Unit"));
    system.add_postponed_atom(lambda(None), &block, 1, None);

    let err = system.solve().unwrap_err();
    assert!(matches!(err, InferenceError::Internal(_)));
    assert!(!err.is_recoverable());
}

#[test]
fn test_failed_fork_branch_does_not_reanalyze_atoms() {
    // fun <T, X, Y> pipe(x: T, block: (T) -> Unit, a: X, b: Y) with X <: Y <: Number
    let mut ctx = ctx();
    let ps = type_parameters(&mut ctx, &["T", "X", "Y"]);
    let (analyzer, seen) = ScriptedAnalyzer::echo(&ctx);
    let config = SolverConfig {
        max_incorporation_depth: 0,
        ..SolverConfig::default()
    };
    let mut system = system_with(&ctx, &ps, config).with_analyzer(analyzer);

    system.add_constraint_from_argument(&named(&ctx, "Int"), &param(ps[0]), ConstraintPosition::argument(0));
    let block = function(&ctx, vec![param(ps[0])], named(&ctx, "Unit"));
    system.add_postponed_atom(lambda(None), &block, 1, None);
    system.add_subtype_constraint(&named(&ctx, "Int"), &param(ps[1]), ConstraintPosition::argument(2));
    system.add_subtype_constraint(&param(ps[1]), &param(ps[2]), ConstraintPosition::argument(3));
    system.add_subtype_constraint(&param(ps[2]), &named(&ctx, "Number"), ConstraintPosition::argument(4));

    let substitution = system.solve().unwrap();
    expect![[r#"
        T := Int
        X := Int
        Y := Int
    "#]]
    .assert_eq(&substitution.render(&ctx));
    assert_eq!(seen.borrow().len(), 1);
    assert_eq!(system.analyzed_atoms().len(), 1);
}
