// src/constraint/mod.rs
//! Constraints on type variables and the store that incorporates them.

mod generator;
pub mod position;
pub mod store;

use kestrel_types::{Type, TypeVariableId};

pub use position::ConstraintPosition;
pub use store::ConstraintStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConstraintKind {
    /// `bound <: variable`
    Lower,
    /// `variable <: bound`
    Upper,
    /// `variable == bound`
    Equality,
}

/// One bound recorded on a type variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub variable: TypeVariableId,
    pub kind: ConstraintKind,
    pub bound: Type,
    pub position: ConstraintPosition,
    /// Recorded for consistency checks but not used to choose the variable's value.
    pub ignored_for_fixation: bool,
}

impl Constraint {
    /// Whether the constraint takes part in choosing the variable's value.
    pub fn is_relevant(&self) -> bool {
        !self.ignored_for_fixation
    }

    pub fn is_proper(&self) -> bool {
        self.bound.is_proper()
    }
}

/// A `sub <: sup` relation handed to the system before solving; re-checked
/// against the final substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialRelation {
    pub sub: Type,
    pub sup: Type,
    pub position: ConstraintPosition,
}

/// A relation found unsatisfiable while incorporating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub variable: Option<TypeVariableId>,
    pub lower: Type,
    pub upper: Type,
    pub position: ConstraintPosition,
}
