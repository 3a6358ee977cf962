// src/postponed/mod.rs
//! Lambdas and callable references whose analysis waits for type variables.

pub(crate) mod resolver;

use std::fmt;

use miette::SourceSpan;

use kestrel_types::{Type, TypeContext};

use crate::error::InferenceResult;

/// Index of a postponed atom within one constraint system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtomId(pub u32);

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "atom#{}", self.0)
    }
}

/// Opaque handle on the caller's syntax node for the argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExpressionId(pub u32);

/// Syntactic shape of a function literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionLiteralKind {
    /// `{ x -> ... }`
    Lambda,
    /// `fun(x: Int): String { ... }`, possibly with a receiver.
    FunctionExpression,
}

impl fmt::Display for FunctionLiteralKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionLiteralKind::Lambda => write!(f, "a lambda"),
            FunctionLiteralKind::FunctionExpression => write!(f, "a function expression"),
        }
    }
}

/// A lambda or anonymous function argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LambdaAtom {
    pub expression: ExpressionId,
    pub literal_kind: FunctionLiteralKind,
    /// Declared receiver type; only function expressions can declare one.
    pub receiver: Option<Type>,
    /// `None` when a lambda declares no parameters at all. Each entry is the
    /// declared type of a parameter, `None` if the parameter has no annotation.
    pub parameters: Option<Vec<Option<Type>>>,
    /// Declared return type of a function expression.
    pub return_type: Option<Type>,
}

impl LambdaAtom {
    /// A lambda without declared parameters (`{ it + 1 }`).
    pub fn lambda(expression: ExpressionId) -> Self {
        LambdaAtom {
            expression,
            literal_kind: FunctionLiteralKind::Lambda,
            receiver: None,
            parameters: None,
            return_type: None,
        }
    }

    /// A lambda with declared parameters, each optionally annotated.
    pub fn lambda_with_parameters(expression: ExpressionId, parameters: Vec<Option<Type>>) -> Self {
        LambdaAtom {
            parameters: Some(parameters),
            ..LambdaAtom::lambda(expression)
        }
    }

    pub fn function_expression(
        expression: ExpressionId,
        receiver: Option<Type>,
        parameters: Vec<Type>,
        return_type: Option<Type>,
    ) -> Self {
        LambdaAtom {
            expression,
            literal_kind: FunctionLiteralKind::FunctionExpression,
            receiver,
            parameters: Some(parameters.into_iter().map(Some).collect()),
            return_type,
        }
    }

    /// Declared input types: the receiver (function expressions only) followed by
    /// the parameters. `None` when a lambda declares no parameters.
    pub fn extract_parameter_types_from_declaration(&self) -> Option<Vec<Option<Type>>> {
        match self.literal_kind {
            FunctionLiteralKind::Lambda => self.parameters.clone().filter(|p| !p.is_empty()),
            FunctionLiteralKind::FunctionExpression => {
                let mut types: Vec<Option<Type>> = self.receiver.iter().cloned().map(Some).collect();
                types.extend(self.parameters.iter().flatten().cloned());
                Some(types)
            }
        }
    }

    pub fn is_lambda(&self) -> bool {
        self.literal_kind == FunctionLiteralKind::Lambda
    }

    pub fn is_function_expression(&self) -> bool {
        self.literal_kind == FunctionLiteralKind::FunctionExpression
    }

    pub fn is_function_expression_with_receiver(&self) -> bool {
        self.is_function_expression() && self.receiver.is_some()
    }

    /// At least one input type is written out in the source.
    pub fn has_explicit_parameter_types(&self) -> bool {
        self.extract_parameter_types_from_declaration()
            .is_some_and(|types| types.iter().any(Option::is_some))
    }
}

/// A callable reference argument (`::foo`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallableReferenceAtom {
    pub expression: ExpressionId,
    /// Parameter count of the referenced callable, when already known.
    pub parameter_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostponedAtomKind {
    Lambda(LambdaAtom),
    CallableReference(CallableReferenceAtom),
}

impl PostponedAtomKind {
    pub fn as_lambda(&self) -> Option<&LambdaAtom> {
        match self {
            PostponedAtomKind::Lambda(l) => Some(l),
            PostponedAtomKind::CallableReference(_) => None,
        }
    }

    pub fn is_lambda(&self) -> bool {
        self.as_lambda().is_some_and(LambdaAtom::is_lambda)
    }

    pub fn is_function_expression(&self) -> bool {
        self.as_lambda().is_some_and(LambdaAtom::is_function_expression)
    }

    pub fn is_function_expression_with_receiver(&self) -> bool {
        self.as_lambda().is_some_and(LambdaAtom::is_function_expression_with_receiver)
    }
}

/// Lifecycle of a postponed atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AtomState {
    /// Expected type still mentions unfixed variables.
    Created,
    /// Declared parameter types have been fed into the constraint system.
    PartiallyAnalyzed,
    /// The analyzer has produced a result for a variable-free input.
    FullyAnalyzed,
    /// The result's constraints are part of the system.
    Merged,
}

/// A relation on outer variables discovered while analyzing a lambda body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OuterConstraint {
    pub sub: Type,
    pub sup: Type,
}

/// What the external body/reference resolver reports for one atom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomAnalysis {
    /// The atom's own inferred type.
    pub atom_type: Type,
    /// The literal shape actually found in the source, if the analyzer checked it.
    pub literal_kind: Option<FunctionLiteralKind>,
    pub outer_constraints: Vec<OuterConstraint>,
}

impl AtomAnalysis {
    pub fn new(atom_type: Type) -> Self {
        AtomAnalysis {
            atom_type,
            literal_kind: None,
            outer_constraints: Vec::new(),
        }
    }
}

/// The expected type an [`AtomAnalyzer`] checks an atom against.
///
/// Input positions are variable-free and uncaptured. The return position of a
/// function type is withheld while it still mentions variables of the call: the
/// atom's body infers it, and the result is merged back into the system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtomExpectation {
    /// The expected type is not a function type.
    Known(Type),
    Function {
        receiver: Option<Type>,
        parameters: Vec<Type>,
        /// `None` while the return type is still being inferred.
        return_type: Option<Type>,
    },
}

impl AtomExpectation {
    pub fn input_types(&self) -> Vec<&Type> {
        match self {
            AtomExpectation::Known(ty) => vec![ty],
            AtomExpectation::Function {
                receiver, parameters, ..
            } => receiver.iter().chain(parameters.iter()).collect(),
        }
    }

    /// The known return type, if the expectation is a function type whose
    /// return position no longer depends on the call.
    pub fn return_type(&self) -> Option<&Type> {
        match self {
            AtomExpectation::Known(_) => None,
            AtomExpectation::Function { return_type, .. } => return_type.as_ref(),
        }
    }

    /// The type of an atom matching this expectation whose body produced
    /// `inferred`. A known return type takes precedence over `inferred`.
    pub fn complete(&self, ctx: &TypeContext, inferred: Type) -> InferenceResult<Type> {
        match self {
            AtomExpectation::Known(ty) => Ok(ty.clone()),
            AtomExpectation::Function {
                receiver,
                parameters,
                return_type,
            } => Ok(ctx.function_type(
                receiver.clone(),
                parameters.clone(),
                return_type.clone().unwrap_or(inferred),
            )?),
        }
    }
}

/// Resolves the bodies of lambdas and the targets of callable references once
/// their input types are known.
pub trait AtomAnalyzer {
    fn analyze_lambda(&mut self, atom: &LambdaAtom, expected: &AtomExpectation) -> InferenceResult<AtomAnalysis>;

    fn analyze_callable_reference(
        &mut self,
        atom: &CallableReferenceAtom,
        expected: &AtomExpectation,
    ) -> InferenceResult<AtomAnalysis>;
}

/// A lambda or callable reference argument awaiting analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostponedAtom {
    pub id: AtomId,
    pub kind: PostponedAtomKind,
    /// Expected type, kept substituted with every fixed variable.
    pub expected_type: Type,
    /// Function type synthesized for an expected type that was a bare variable.
    pub revised_expected_type: Option<Type>,
    pub argument_index: usize,
    pub span: Option<SourceSpan>,
    pub state: AtomState,
    pub analysis: Option<AtomAnalysis>,
}

impl PostponedAtom {
    /// The type the atom is currently checked against.
    pub fn current_expected_type(&self) -> &Type {
        self.revised_expected_type.as_ref().unwrap_or(&self.expected_type)
    }
}
