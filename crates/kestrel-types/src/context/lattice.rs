// src/context/lattice.rs
use crate::context::type_context::TypeContext;
use crate::types::{IntersectionType, Nullability, Projection, SimpleType, Type, Variance};

const MAX_LATTICE_DEPTH: usize = 8;

impl TypeContext {
    /// Greatest lower bound of `types`, used for upper bounds and uncapture.
    ///
    /// Nested intersections are flattened, duplicates and components that are
    /// supertypes of another component are dropped. A flexible component makes the
    /// result flexible. An empty input yields `Any?`.
    pub fn intersect_types(&self, types: &[Type]) -> Type {
        if types.is_empty() {
            return self.nullable_any_type();
        }
        if types.iter().any(Type::is_flexible) {
            let lowers: Vec<Type> = types.iter().map(|t| t.lower_bound_if_flexible().clone()).collect();
            let uppers: Vec<Type> = types.iter().map(|t| t.upper_bound_if_flexible().clone()).collect();
            return Type::flexible(self.intersect_types(&lowers), self.intersect_types(&uppers));
        }

        let mut flat: Vec<Type> = Vec::new();
        for t in types {
            match t {
                Type::Intersection(i) => flat.extend(i.components.iter().cloned()),
                other => flat.push(other.clone()),
            }
        }

        let all_nullable = flat.iter().all(|t| t.nullability() == Nullability::Nullable);
        let any_not_null = flat.iter().any(|t| t.nullability() == Nullability::NotNull);
        let mut components: Vec<Type> = flat
            .into_iter()
            .map(|t| {
                if all_nullable || (any_not_null && t.is_nullable()) {
                    Type::definitely_not_null(t)
                } else {
                    t
                }
            })
            .collect();
        components.dedup();

        let mut kept: Vec<Type> = Vec::new();
        for (i, candidate) in components.iter().enumerate() {
            if kept.contains(candidate) {
                continue;
            }
            let redundant = components.iter().enumerate().any(|(j, other)| {
                if i == j || other == candidate {
                    return false;
                }
                if !self.is_subtype_of(other, candidate) {
                    return false;
                }
                // Mutually related components keep the first occurrence.
                !self.is_subtype_of(candidate, other) || j < i
            });
            if !redundant {
                kept.push(candidate.clone());
            }
        }

        let result = IntersectionType::from_components(kept);
        if all_nullable {
            result.make_nullable()
        } else {
            result
        }
    }

    /// Least upper bound of `types`, used for lower bounds.
    ///
    /// An empty input yields `Nothing`. A nullable component makes the result
    /// nullable; a flexible component makes it flexible.
    pub fn common_supertype(&self, types: &[Type]) -> Type {
        self.common_supertype_at(types, 0)
    }

    fn common_supertype_at(&self, types: &[Type], depth: usize) -> Type {
        if types.is_empty() {
            return self.nothing_type();
        }
        if types.iter().any(Type::is_flexible) {
            let lowers: Vec<Type> = types.iter().map(|t| t.lower_bound_if_flexible().clone()).collect();
            let uppers: Vec<Type> = types.iter().map(|t| t.upper_bound_if_flexible().clone()).collect();
            return Type::flexible(
                self.common_supertype_at(&lowers, depth),
                self.common_supertype_at(&uppers, depth),
            );
        }

        let nullable = types.iter().any(|t| t.nullability().accepts_null());
        let mut not_null: Vec<Type> = Vec::new();
        for t in types {
            let t = t.make_not_null();
            if self.is_nothing(&t) || not_null.contains(&t) {
                continue;
            }
            not_null.push(t);
        }
        let result = if not_null.is_empty() {
            self.nothing_type()
        } else {
            self.common_not_null_supertype(&not_null, depth)
        };
        if nullable {
            result.make_nullable()
        } else {
            result
        }
    }

    fn common_not_null_supertype(&self, types: &[Type], depth: usize) -> Type {
        if types.len() == 1 {
            return types[0].clone();
        }
        if let Some(top) = types
            .iter()
            .find(|candidate| types.iter().all(|t| self.is_subtype_of(t, candidate)))
        {
            return top.clone();
        }
        if depth >= MAX_LATTICE_DEPTH {
            return self.any_type();
        }

        let mut simples: Vec<SimpleType> = Vec::with_capacity(types.len());
        for t in types {
            match self.representative_class_type(t) {
                Some(s) => simples.push(s),
                None => return self.any_type(),
            }
        }

        let mut common = self.superclasses(simples[0].class_id);
        for s in &simples[1..] {
            let theirs = self.superclasses(s.class_id);
            common.retain(|c| theirs.contains(c));
        }
        // Keep only the most specific shared classes.
        let minimal: Vec<_> = common
            .iter()
            .copied()
            .filter(|&c| {
                !common
                    .iter()
                    .any(|&other| other != c && self.superclasses(other).contains(&c))
            })
            .collect();

        let mut results = Vec::new();
        for class_id in minimal {
            if class_id == self.builtins().any {
                continue;
            }
            let Some(views) = simples
                .iter()
                .map(|s| self.supertype_as(s, class_id))
                .collect::<Option<Vec<_>>>()
            else {
                continue;
            };
            let Ok(decl) = self.class(class_id) else {
                continue;
            };
            let mut arguments = Vec::with_capacity(decl.type_parameters.len());
            for (index, &param) in decl.type_parameters.iter().enumerate() {
                let args: Vec<Type> = views
                    .iter()
                    .map(|v| {
                        v.arguments
                            .get(index)
                            .and_then(|a| a.ty().cloned())
                            .unwrap_or_else(|| self.nullable_any_type())
                    })
                    .collect();
                if args.iter().all(|a| a == &args[0]) {
                    arguments.push(Projection::Invariant(args[0].clone()));
                    continue;
                }
                let variance = self
                    .type_parameter(param)
                    .map(|p| p.variance)
                    .unwrap_or(Variance::Invariant);
                arguments.push(match variance {
                    Variance::Out => Projection::Invariant(self.common_supertype_at(&args, depth + 1)),
                    Variance::In => Projection::Invariant(self.intersect_types(&args)),
                    Variance::Invariant => Projection::Out(self.common_supertype_at(&args, depth + 1)),
                });
            }
            results.push(Type::projected(class_id, arguments));
        }

        match results.len() {
            0 => self.any_type(),
            _ => IntersectionType::from_components(results),
        }
    }

    /// The class type standing for `ty` when computing common supertypes.
    fn representative_class_type(&self, ty: &Type) -> Option<SimpleType> {
        match ty {
            Type::Simple(s) => Some(s.clone()),
            Type::Captured(c) => c
                .supertypes()
                .iter()
                .find_map(|s| self.representative_class_type(&s.make_not_null())),
            Type::Parameter(p) => self
                .effective_bounds(p.id)
                .ok()?
                .iter()
                .find_map(|b| self.representative_class_type(&b.make_not_null())),
            Type::DefinitelyNotNull(inner) => self.representative_class_type(inner),
            Type::Intersection(i) => i
                .components
                .iter()
                .find_map(|c| self.representative_class_type(c)),
            Type::Flexible(f) => self.representative_class_type(&f.lower),
            Type::Variable(_) => None,
        }
    }
}
