// src/substitution.rs
use std::collections::BTreeMap;
use std::fmt::Write;

use kestrel_types::{Type, TypeContext, TypeParameterId, TypeVariableId};

/// Fixed value of one type variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionEntry {
    pub name: String,
    /// Declared type parameter the variable was created for, if any.
    pub parameter: Option<TypeParameterId>,
    pub ty: Type,
}

/// The result of a solved constraint system: a variable-free type per variable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitution {
    entries: BTreeMap<TypeVariableId, SubstitutionEntry>,
}

impl Substitution {
    pub(crate) fn insert(&mut self, variable: TypeVariableId, entry: SubstitutionEntry) {
        self.entries.insert(variable, entry);
    }

    pub fn get(&self, variable: TypeVariableId) -> Option<&Type> {
        self.entries.get(&variable).map(|e| &e.ty)
    }

    pub fn for_parameter(&self, parameter: TypeParameterId) -> Option<&Type> {
        self.entries
            .values()
            .find(|e| e.parameter == Some(parameter))
            .map(|e| &e.ty)
    }

    pub fn entries(&self) -> impl Iterator<Item = (TypeVariableId, &SubstitutionEntry)> {
        self.entries.iter().map(|(&id, entry)| (id, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replaces the system's variables and the call's type parameters in `ty`.
    pub fn apply(&self, ty: &Type) -> Type {
        let variables: BTreeMap<TypeVariableId, Type> =
            self.entries.iter().map(|(&id, e)| (id, e.ty.clone())).collect();
        let parameters: BTreeMap<TypeParameterId, Type> = self
            .entries
            .values()
            .filter_map(|e| e.parameter.map(|p| (p, e.ty.clone())))
            .collect();
        ty.substitute_variables(&variables).substitute_parameters(&parameters)
    }

    /// One `name := type` line per variable, in creation order.
    pub fn render(&self, ctx: &TypeContext) -> String {
        let mut out = String::new();
        for entry in self.entries.values() {
            let _ = writeln!(out, "{} := {}", entry.name, ctx.render(&entry.ty));
        }
        out
    }
}
