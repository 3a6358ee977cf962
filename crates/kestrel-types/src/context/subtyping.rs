// src/context/subtyping.rs
use std::collections::{BTreeMap, VecDeque};

use rustc_hash::FxHashSet;

use crate::capture::capture_arguments;
use crate::context::type_context::TypeContext;
use crate::types::{ClassId, Nullability, Projection, SimpleType, Type, Variance};

const MAX_SUBTYPING_DEPTH: usize = 64;

impl TypeContext {
    /// Structural subtyping over proper types.
    ///
    /// Inference variables are only related to themselves; relations involving
    /// other variables are the constraint system's business.
    pub fn is_subtype_of(&self, sub: &Type, sup: &Type) -> bool {
        self.subtype_at(sub, sup, 0)
    }

    /// Mutual subtyping.
    pub fn equal_types(&self, a: &Type, b: &Type) -> bool {
        a == b || (self.is_subtype_of(a, b) && self.is_subtype_of(b, a))
    }

    fn subtype_at(&self, sub: &Type, sup: &Type, depth: usize) -> bool {
        if depth > MAX_SUBTYPING_DEPTH {
            log::trace!("subtyping depth exceeded for {} <: {}", self.render(sub), self.render(sup));
            return false;
        }
        if sub == sup {
            return true;
        }
        match (sub, sup) {
            (_, Type::Flexible(f)) => return self.subtype_at(sub, &f.upper, depth + 1),
            (Type::Flexible(f), _) => return self.subtype_at(&f.lower, sup, depth + 1),
            _ => {}
        }
        if let Type::Intersection(i) = sup {
            return i.components.iter().all(|c| self.subtype_at(sub, c, depth + 1));
        }
        if let Type::Intersection(i) = sub {
            return i.components.iter().any(|c| self.subtype_at(c, sup, depth + 1));
        }
        if self.is_nullable_any(sup) {
            return true;
        }
        if sub.nullability() == Nullability::Nullable && !sup.nullability().accepts_null() {
            return false;
        }
        if self.is_nothing(sub) {
            return true;
        }

        match (sub, sup) {
            (Type::DefinitelyNotNull(inner), _) => {
                self.subtype_at(inner, sup, depth + 1) || self.subtype_at(&self.any_type(), sup, depth + 1)
            }
            (_, Type::DefinitelyNotNull(inner)) => {
                self.subtype_at(sub, &self.any_type(), depth + 1) && self.subtype_at(sub, inner, depth + 1)
            }
            (Type::Captured(a), Type::Captured(b)) if a.same_constructor(b) => true,
            (_, Type::Captured(c)) => {
                c.lower_type
                    .as_ref()
                    .is_some_and(|lower| self.subtype_at(sub, lower, depth + 1))
                    || match sub {
                        Type::Captured(s) => s.supertypes().iter().any(|t| self.subtype_at(t, sup, depth + 1)),
                        _ => false,
                    }
            }
            (Type::Captured(c), _) => c.supertypes().iter().any(|s| self.subtype_at(s, sup, depth + 1)),
            (Type::Parameter(p), _) => {
                if let Type::Parameter(q) = sup {
                    if p.id == q.id {
                        return true;
                    }
                }
                let Ok(bounds) = self.effective_bounds(p.id) else {
                    return false;
                };
                bounds.iter().any(|b| {
                    let b = if p.nullability.is_nullable() { b.make_nullable() } else { b.clone() };
                    self.subtype_at(&b, sup, depth + 1)
                })
            }
            (Type::Variable(a), Type::Variable(b)) => a.id == b.id,
            (Type::Simple(a), Type::Simple(b)) => self.simple_subtype(a, b, depth),
            _ => false,
        }
    }

    fn simple_subtype(&self, sub: &SimpleType, sup: &SimpleType, depth: usize) -> bool {
        let Some(view) = self.supertype_as(sub, sup.class_id) else {
            return false;
        };
        let Ok(decl) = self.class(sup.class_id) else {
            return false;
        };
        if view.arguments.len() != sup.arguments.len() {
            return false;
        }
        for ((sub_arg, sup_arg), param) in view
            .arguments
            .iter()
            .zip(&sup.arguments)
            .zip(&decl.type_parameters)
        {
            let variance = self
                .type_parameter(*param)
                .map(|p| p.variance)
                .unwrap_or(Variance::Invariant);
            if !self.argument_contained(sub_arg, sup_arg, variance, depth + 1) {
                return false;
            }
        }
        true
    }

    /// Whether `sub_arg` fits inside `sup_arg` for a parameter declared with `variance`.
    fn argument_contained(&self, sub_arg: &Projection, sup_arg: &Projection, variance: Variance, depth: usize) -> bool {
        let (effective, target) = match sup_arg {
            Projection::Star | Projection::Conflicting(_) => return true,
            Projection::In(t) => (Variance::In, t),
            Projection::Out(t) => (Variance::Out, t),
            Projection::Invariant(t) => (variance, t),
        };
        match effective {
            Variance::Out => {
                let upper = match sub_arg {
                    Projection::Invariant(x) | Projection::Out(x) => x.clone(),
                    Projection::In(_) | Projection::Star | Projection::Conflicting(_) => self.nullable_any_type(),
                };
                self.subtype_at(&upper, target, depth)
            }
            Variance::In => {
                let lower = match sub_arg {
                    Projection::Invariant(x) | Projection::In(x) => x.clone(),
                    Projection::Out(_) | Projection::Star | Projection::Conflicting(_) => self.nothing_type(),
                };
                self.subtype_at(target, &lower, depth)
            }
            Variance::Invariant => match sub_arg {
                Projection::Invariant(x) => {
                    x == target || (self.subtype_at(x, target, depth) && self.subtype_at(target, x, depth))
                }
                _ => false,
            },
        }
    }

    /// Views `ty` as an instance of `target`, walking declared supertypes.
    ///
    /// Projected arguments of `ty` are captured first, so the arguments of the
    /// result are always invariant. Returns `None` when `target` is not a supertype.
    pub fn supertype_as(&self, ty: &SimpleType, target: ClassId) -> Option<SimpleType> {
        if target == self.builtins().any {
            return Some(SimpleType {
                nullability: ty.nullability,
                ..SimpleType::new(target, Vec::new())
            });
        }
        let start = capture_arguments(self, ty).unwrap_or_else(|| ty.clone());
        if start.class_id == target {
            return Some(start);
        }
        let mut queue = VecDeque::from([start]);
        let mut visited = FxHashSet::default();
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.class_id) {
                continue;
            }
            let Ok(decl) = self.class(current.class_id) else {
                continue;
            };
            let mapping: BTreeMap<_, _> = decl
                .type_parameters
                .iter()
                .zip(&current.arguments)
                .map(|(&p, arg)| {
                    let t = arg.ty().cloned().unwrap_or_else(|| self.nullable_any_type());
                    (p, t)
                })
                .collect();
            for supertype in &decl.supertypes {
                let Type::Simple(s) = supertype.substitute_parameters(&mapping) else {
                    continue;
                };
                if s.class_id == target {
                    return Some(SimpleType {
                        nullability: ty.nullability,
                        ..s
                    });
                }
                queue.push_back(s);
            }
        }
        None
    }

    /// All superclasses of `class_id`, nearest first, including itself.
    pub fn superclasses(&self, class_id: ClassId) -> Vec<ClassId> {
        let mut out = Vec::new();
        let mut queue = VecDeque::from([class_id]);
        while let Some(current) = queue.pop_front() {
            if out.contains(&current) {
                continue;
            }
            out.push(current);
            if let Ok(decl) = self.class(current) {
                for s in &decl.supertypes {
                    if let Type::Simple(s) = s {
                        queue.push_back(s.class_id);
                    }
                }
            }
        }
        out
    }
}
