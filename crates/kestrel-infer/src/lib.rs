//! Constraint-based type inference for a single generic call.
//!
//! A [`ConstraintSystem`] is created per call-resolution attempt. The caller
//! creates a variable per type parameter, records argument/parameter pairs and
//! postponed lambda or callable-reference arguments, then calls
//! [`ConstraintSystem::solve`] to obtain a [`Substitution`].
//!
//! ```
//! use kestrel_infer::{ConstraintPosition, ConstraintSystem, SolverConfig};
//! use kestrel_types::{Type, TypeContext, Variance};
//!
//! let mut ctx = TypeContext::with_builtins();
//! let t = ctx.declare_type_parameter("T", Variance::Invariant);
//! let int = Type::class(ctx.builtins().int);
//!
//! let mut system = ConstraintSystem::new(&ctx, SolverConfig::default());
//! system.new_type_variable(t)?;
//! system.add_constraint_from_argument(&int, &Type::parameter(t), ConstraintPosition::argument(0));
//! let substitution = system.solve()?;
//! assert_eq!(substitution.render(&ctx), "T := Int\n");
//! # Ok::<(), kestrel_infer::InferenceError>(())
//! ```

pub mod config;
pub mod constraint;
pub mod error;
mod fixation;
pub mod postponed;
pub mod substitution;
pub mod system;
pub mod variable;

pub use config::{ConfigError, SolverConfig};
pub use constraint::{Conflict, Constraint, ConstraintKind, ConstraintPosition, ConstraintStore, InitialRelation};
pub use error::{InferenceError, InferenceResult};
pub use postponed::{
    AtomAnalysis, AtomAnalyzer, AtomExpectation, AtomId, AtomState, CallableReferenceAtom, ExpressionId,
    FunctionLiteralKind, LambdaAtom, OuterConstraint, PostponedAtom, PostponedAtomKind,
};
pub use substitution::{Substitution, SubstitutionEntry};
pub use system::ConstraintSystem;
pub use variable::{TypeVariableInfo, TypeVariableOrigin};
