// src/types/substitute.rs
use std::collections::BTreeMap;

use triomphe::Arc;

use super::core::{
    CapturedType, CapturedTypeConstructor, IntersectionType, Nullability, SimpleType, Type,
    TypeParameterId, TypeVariableId,
};

impl Type {
    /// Replaces placeholder leaves (variables and type parameters).
    ///
    /// `replace` is asked about every `Variable`/`Parameter` leaf and returns the
    /// replacement, or `None` to keep the leaf. The leaf's own nullability is
    /// applied on top of the replacement: `T?` with `T := Int` becomes `Int?`.
    ///
    /// Captured types whose components do not change keep their identity.
    pub fn substitute(&self, replace: &mut dyn FnMut(&Type) -> Option<Type>) -> Type {
        match self {
            Type::Variable(v) => match replace(self) {
                Some(r) => with_leaf_nullability(r, v.nullability),
                None => self.clone(),
            },
            Type::Parameter(p) => match replace(self) {
                Some(r) => with_leaf_nullability(r, p.nullability),
                None => self.clone(),
            },
            Type::Simple(s) => Type::Simple(SimpleType {
                class_id: s.class_id,
                nullability: s.nullability,
                arguments: s
                    .arguments
                    .iter()
                    .map(|a| a.map_type(|t| t.substitute(replace)))
                    .collect(),
                extension_function: s.extension_function,
            }),
            Type::Flexible(f) => {
                let lower = f.lower.substitute(replace);
                let upper = f.upper.substitute(replace);
                Type::flexible(lower, upper)
            }
            Type::Captured(c) => {
                let projection = c.projection().map_type(|t| t.substitute(replace));
                let supertypes: Vec<Type> =
                    c.supertypes().iter().map(|t| t.substitute(replace)).collect();
                if &projection == c.projection() && supertypes.as_slice() == c.supertypes() {
                    return self.clone();
                }
                let lower_type = c.lower_type.as_ref().map(|t| Arc::new(t.substitute(replace)));
                Type::Captured(CapturedType {
                    constructor: Arc::new(CapturedTypeConstructor {
                        projection,
                        supertypes,
                        type_parameter: c.constructor.type_parameter,
                    }),
                    lower_type,
                    nullability: c.nullability,
                })
            }
            Type::Intersection(i) => IntersectionType::from_components(
                i.components.iter().map(|t| t.substitute(replace)),
            ),
            Type::DefinitelyNotNull(inner) => Type::definitely_not_null(inner.substitute(replace)),
        }
    }

    /// Replaces inference variables according to `map`.
    pub fn substitute_variables(&self, map: &BTreeMap<TypeVariableId, Type>) -> Type {
        if map.is_empty() {
            return self.clone();
        }
        self.substitute(&mut |leaf| match leaf {
            Type::Variable(v) => map.get(&v.id).cloned(),
            _ => None,
        })
    }

    /// Replaces a single inference variable.
    pub fn substitute_variable(&self, id: TypeVariableId, with: &Type) -> Type {
        self.substitute(&mut |leaf| match leaf {
            Type::Variable(v) if v.id == id => Some(with.clone()),
            _ => None,
        })
    }

    /// Replaces declared type parameters according to `map`.
    pub fn substitute_parameters(&self, map: &BTreeMap<TypeParameterId, Type>) -> Type {
        if map.is_empty() {
            return self.clone();
        }
        self.substitute(&mut |leaf| match leaf {
            Type::Parameter(p) => map.get(&p.id).cloned(),
            _ => None,
        })
    }
}

fn with_leaf_nullability(replacement: Type, leaf: Nullability) -> Type {
    match leaf {
        Nullability::Nullable => replacement.make_nullable(),
        Nullability::NotNull | Nullability::Unknown => replacement,
    }
}
