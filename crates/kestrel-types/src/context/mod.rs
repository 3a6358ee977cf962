// src/context/mod.rs
pub mod display;
pub mod functions;
pub mod lattice;
pub mod subtyping;
pub mod type_context;

pub use functions::FunctionTypeView;
pub use type_context::{Builtins, ClassDecl, TypeContext, TypeParameterDecl, MAX_FUNCTION_ARITY};
