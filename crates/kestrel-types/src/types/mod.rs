// src/types/mod.rs
pub mod core;
pub mod substitute;

pub use self::core::*;
