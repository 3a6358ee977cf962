// src/variable.rs
use kestrel_types::{Type, TypeParameterId, TypeVariableId};

use crate::postponed::AtomId;

/// Why a type variable exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeVariableOrigin {
    /// Instantiated from a type parameter of the called declaration.
    TypeParameter(TypeParameterId),
    /// `_P{index}`: parameter type of a lambda with a revised expected type.
    LambdaParameter { atom: AtomId, index: usize },
    /// `_RCV`: extension receiver of a lambda.
    LambdaReceiver { atom: AtomId },
    /// `_R`: return type of a lambda.
    LambdaReturn { atom: AtomId },
    /// `_RP{index}`: parameter type of a callable reference.
    ReferenceParameter { atom: AtomId, index: usize },
    /// `_R`: return type of a callable reference.
    ReferenceReturn { atom: AtomId },
}

impl TypeVariableOrigin {
    pub fn type_parameter(&self) -> Option<TypeParameterId> {
        match self {
            TypeVariableOrigin::TypeParameter(p) => Some(*p),
            _ => None,
        }
    }

    /// Display name for variables not created from a type parameter.
    pub(crate) fn synthetic_name(&self) -> String {
        match self {
            TypeVariableOrigin::TypeParameter(p) => format!("T{}", p.0),
            TypeVariableOrigin::LambdaParameter { index, .. } => format!("_P{index}"),
            TypeVariableOrigin::LambdaReceiver { .. } => "_RCV".to_string(),
            TypeVariableOrigin::LambdaReturn { .. } | TypeVariableOrigin::ReferenceReturn { .. } => "_R".to_string(),
            TypeVariableOrigin::ReferenceParameter { index, .. } => format!("_RP{index}"),
        }
    }
}

/// Per-variable facts that stay fixed for the lifetime of a constraint system.
#[derive(Debug, Clone)]
pub struct TypeVariableInfo {
    pub id: TypeVariableId,
    pub name: String,
    pub origin: TypeVariableOrigin,
    /// Marked "only input types": expected-type constraints do not shape the result.
    pub only_input_types: bool,
    /// Created from a reified parameter; the result must be denotable.
    pub reified: bool,
    /// Declared upper bounds, still expressed over the declaration's type parameters.
    pub declared_bounds: Vec<Type>,
    /// A declared bound mentions a flexible type, so simple bounds are recorded as flexible.
    pub flexible_bounds: bool,
}

impl TypeVariableInfo {
    pub(crate) fn synthetic(id: TypeVariableId, origin: TypeVariableOrigin) -> Self {
        TypeVariableInfo {
            id,
            name: origin.synthetic_name(),
            origin,
            only_input_types: false,
            reified: false,
            declared_bounds: Vec::new(),
            flexible_bounds: false,
        }
    }
}
