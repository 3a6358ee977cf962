// src/error.rs
use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use kestrel_types::TypeContextError;

use crate::constraint::ConstraintPosition;
use crate::postponed::AtomId;

/// Errors produced while building or solving one constraint system.
///
/// Values carry rendered types and the positions of the constraints involved;
/// they never format a full diagnostic message themselves.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
pub enum InferenceError {
    #[error("Type variable `{variable}` cannot satisfy `{lower} <: {upper}`")]
    #[diagnostic(code(kestrel_infer::incompatible_constraint))]
    IncompatibleConstraint {
        variable: String,
        lower: String,
        upper: String,
        positions: Vec<ConstraintPosition>,
        #[label("constraint introduced here")]
        span: Option<SourceSpan>,
    },

    #[error("Type variables {} depend on each other through their own type arguments", .variables.join(", "))]
    #[diagnostic(
        code(kestrel_infer::unresolved_cycle),
        help("Specify one of the type arguments explicitly")
    )]
    UnresolvedCycle {
        variables: Vec<String>,
        positions: Vec<ConstraintPosition>,
        #[label("cycle starts here")]
        span: Option<SourceSpan>,
    },

    #[error("Expected {expected} but the argument is {found}")]
    #[diagnostic(code(kestrel_infer::shape_mismatch))]
    ShapeMismatch {
        atom: AtomId,
        expected: String,
        found: String,
        #[label("postponed argument")]
        span: Option<SourceSpan>,
    },

    #[error("Constraint system has already been solved")]
    #[diagnostic(code(kestrel_infer::already_solved))]
    AlreadySolved,

    #[error(transparent)]
    #[diagnostic(transparent)]
    TypeContext(#[from] TypeContextError),

    #[error("Internal inference error: {0}")]
    #[diagnostic(code(kestrel_infer::internal))]
    Internal(String),
}

impl InferenceError {
    /// Whether the caller may simply treat the candidate as not applicable.
    ///
    /// Cycles, API misuse and internal errors are always surfaced.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            InferenceError::IncompatibleConstraint { .. } | InferenceError::ShapeMismatch { .. }
        )
    }

    pub fn span(&self) -> Option<SourceSpan> {
        match self {
            InferenceError::IncompatibleConstraint { span, .. }
            | InferenceError::UnresolvedCycle { span, .. }
            | InferenceError::ShapeMismatch { span, .. } => *span,
            _ => None,
        }
    }
}

pub type InferenceResult<T> = Result<T, InferenceError>;
