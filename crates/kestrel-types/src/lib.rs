//! Type model for the Kestrel inference engine.
//!
//! Provides the immutable [`Type`] representation, the compilation-wide
//! [`TypeContext`] (class table, subtyping, lattice operations, rendering) and
//! capture/uncapture of use-site projections.

pub mod capture;
pub mod context;
pub mod error;
pub mod types;

pub use capture::{capture_arguments, uncapture};
pub use context::{Builtins, ClassDecl, FunctionTypeView, TypeContext, TypeParameterDecl};
pub use error::{TypeContextError, TypeResult};
pub use types::{
    CapturedType, CapturedTypeConstructor, ClassId, FlexibleType, IntersectionType, Nullability, ParameterType,
    Projection, ProjectionKind, SimpleType, Type, TypeParameterId, TypeVariableId, Variance, VariableType,
};
