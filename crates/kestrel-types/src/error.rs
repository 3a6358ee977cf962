// src/error.rs
use miette::Diagnostic;
use thiserror::Error;

use crate::types::{ClassId, TypeParameterId};

/// Errors raised while declaring or looking up classes and type parameters.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
pub enum TypeContextError {
    #[error("Unknown class id {0:?}")]
    #[diagnostic(code(kestrel_types::unknown_class))]
    UnknownClass(ClassId),

    #[error("Unknown type parameter id {0:?}")]
    #[diagnostic(code(kestrel_types::unknown_type_parameter))]
    UnknownTypeParameter(TypeParameterId),

    #[error("Class `{name}` is already declared")]
    #[diagnostic(code(kestrel_types::duplicate_class))]
    DuplicateClass { name: String },

    #[error("Class `{class}` expects {expected} type arguments, found {found}")]
    #[diagnostic(
        code(kestrel_types::argument_count_mismatch),
        help("Pass exactly one argument per declared type parameter")
    )]
    ArgumentCountMismatch {
        class: String,
        expected: usize,
        found: usize,
    },

    #[error("Function types support at most {max} parameters, found {arity}")]
    #[diagnostic(code(kestrel_types::function_arity))]
    FunctionArityTooLarge { arity: usize, max: usize },
}

pub type TypeResult<T> = Result<T, TypeContextError>;
