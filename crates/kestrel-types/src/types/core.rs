// src/types/core.rs
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use triomphe::Arc;

/// Identifier of a class or interface declared in a [`crate::TypeContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(pub u32);

impl ClassId {
    /// `Any` is the first class of every context.
    pub const ANY: ClassId = ClassId(0);
}

/// Identifier of a declared type parameter (`T` in `fun <T> listOf(...)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeParameterId(pub u32);

/// Identifier of an inference variable created by a constraint system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeVariableId(pub u32);

impl fmt::Display for TypeVariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$t{}", self.0)
    }
}

/// Three-valued nullability marker.
///
/// The variant order is significant: `Nullable < Unknown < NotNull`, so taking the
/// `min` of two markers yields the "most nullable" one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Nullability {
    /// `T?`
    Nullable,
    /// Platform type: nullability not known (only produced by flexible types).
    Unknown,
    /// `T`
    NotNull,
}

impl Nullability {
    pub fn is_nullable(self) -> bool {
        matches!(self, Nullability::Nullable)
    }

    /// Whether a value of this nullability may legally hold `null`.
    pub fn accepts_null(self) -> bool {
        !matches!(self, Nullability::NotNull)
    }
}

/// Declaration-site variance of a type parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variance {
    Invariant,
    In,
    Out,
}

/// A type argument together with its use-site projection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Projection {
    /// `*`
    Star,
    /// `T`
    Invariant(Type),
    /// `in T`
    In(Type),
    /// `out T`
    Out(Type),
    /// A use-site projection that contradicts the declared variance (`in T` on an `out` parameter).
    Conflicting(Type),
}

/// Kind of a [`Projection`], without its argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectionKind {
    Star,
    Invariant,
    In,
    Out,
    Conflicting,
}

impl Projection {
    /// The projected type, if the projection carries one.
    pub fn ty(&self) -> Option<&Type> {
        match self {
            Projection::Star => None,
            Projection::Invariant(t)
            | Projection::In(t)
            | Projection::Out(t)
            | Projection::Conflicting(t) => Some(t),
        }
    }

    pub fn kind(&self) -> ProjectionKind {
        match self {
            Projection::Star => ProjectionKind::Star,
            Projection::Invariant(_) => ProjectionKind::Invariant,
            Projection::In(_) => ProjectionKind::In,
            Projection::Out(_) => ProjectionKind::Out,
            Projection::Conflicting(_) => ProjectionKind::Conflicting,
        }
    }

    /// Rebuilds the projection with the same kind around a transformed argument.
    pub fn map_type(&self, f: impl FnOnce(&Type) -> Type) -> Projection {
        match self {
            Projection::Star => Projection::Star,
            Projection::Invariant(t) => Projection::Invariant(f(t)),
            Projection::In(t) => Projection::In(f(t)),
            Projection::Out(t) => Projection::Out(f(t)),
            Projection::Conflicting(t) => Projection::Conflicting(f(t)),
        }
    }

    pub fn is_invariant(&self) -> bool {
        matches!(self, Projection::Invariant(_))
    }
}

/// A class type `C<args>` with nullability.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SimpleType {
    pub class_id: ClassId,
    pub nullability: Nullability,
    pub arguments: Vec<Projection>,
    /// Set on function types whose first parameter is an extension receiver.
    pub extension_function: bool,
}

impl SimpleType {
    pub fn new(class_id: ClassId, arguments: Vec<Projection>) -> Self {
        SimpleType {
            class_id,
            nullability: Nullability::NotNull,
            arguments,
            extension_function: false,
        }
    }
}

/// A platform type with a lower and an upper bound (`L..U`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlexibleType {
    pub lower: Arc<Type>,
    pub upper: Arc<Type>,
}

/// Shared part of a captured type: every [`CapturedType`] built from the same
/// constructor denotes the same unknown type.
#[derive(Debug)]
pub struct CapturedTypeConstructor {
    pub projection: Projection,
    pub supertypes: Vec<Type>,
    /// The declared parameter this capture stands in for, when known.
    pub type_parameter: Option<TypeParameterId>,
}

/// A fresh, unnamed type standing for the unknown argument behind a projection.
///
/// Identity is the identity of the shared constructor: two captured types are
/// equal iff they point at the same constructor and carry the same nullability.
#[derive(Debug, Clone)]
pub struct CapturedType {
    pub constructor: Arc<CapturedTypeConstructor>,
    /// Lower bound, present for `in` projections.
    pub lower_type: Option<Arc<Type>>,
    pub nullability: Nullability,
}

impl CapturedType {
    /// Creates a captured type with a brand new identity.
    ///
    /// Preconditions: `supertypes` already contains the projection's upper bound and
    /// the declared bounds of the captured parameter.
    /// Postconditions: The result is not equal to any previously created captured type.
    pub fn new(projection: Projection, supertypes: Vec<Type>, type_parameter: Option<TypeParameterId>) -> Self {
        let lower_type = match &projection {
            Projection::In(t) => Some(Arc::new(t.clone())),
            _ => None,
        };
        CapturedType {
            constructor: Arc::new(CapturedTypeConstructor {
                projection,
                supertypes,
                type_parameter,
            }),
            lower_type,
            nullability: Nullability::NotNull,
        }
    }

    pub fn projection(&self) -> &Projection {
        &self.constructor.projection
    }

    pub fn supertypes(&self) -> &[Type] {
        &self.constructor.supertypes
    }

    pub fn same_constructor(&self, other: &CapturedType) -> bool {
        std::ptr::eq(&*self.constructor, &*other.constructor)
    }

    pub fn with_nullability(&self, nullability: Nullability) -> CapturedType {
        CapturedType {
            constructor: self.constructor.clone(),
            lower_type: self.lower_type.clone(),
            nullability,
        }
    }
}

impl PartialEq for CapturedType {
    fn eq(&self, other: &Self) -> bool {
        self.same_constructor(other) && self.nullability == other.nullability
    }
}

impl Eq for CapturedType {}

impl Hash for CapturedType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(&*self.constructor, state);
        self.nullability.hash(state);
    }
}

/// `A & B & ...`; equality ignores component order.
#[derive(Debug, Clone)]
pub struct IntersectionType {
    pub components: Vec<Type>,
}

impl IntersectionType {
    /// Flattens nested intersections and drops duplicates. Returns the single
    /// component when only one remains, and `Any?` when none does.
    pub fn from_components(components: impl IntoIterator<Item = Type>) -> Type {
        let mut flat: Vec<Type> = Vec::new();
        for component in components {
            match component {
                Type::Intersection(inner) => {
                    for c in inner.components {
                        if !flat.contains(&c) {
                            flat.push(c);
                        }
                    }
                }
                other => {
                    if !flat.contains(&other) {
                        flat.push(other);
                    }
                }
            }
        }
        match flat.len() {
            0 => Type::class(ClassId::ANY).make_nullable(),
            1 => flat.remove(0),
            _ => Type::Intersection(IntersectionType { components: flat }),
        }
    }
}

impl PartialEq for IntersectionType {
    fn eq(&self, other: &Self) -> bool {
        self.components.len() == other.components.len()
            && self.components.iter().all(|c| other.components.contains(c))
    }
}

impl Eq for IntersectionType {}

impl Hash for IntersectionType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Order-independent combination of the component hashes.
        let mut combined: u64 = 0;
        for component in &self.components {
            let mut hasher = FxHasher::default();
            component.hash(&mut hasher);
            combined = combined.wrapping_add(hasher.finish());
        }
        self.components.len().hash(state);
        combined.hash(state);
    }
}

/// Reference to an inference variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariableType {
    pub id: TypeVariableId,
    pub nullability: Nullability,
}

/// Reference to a declared type parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParameterType {
    pub id: TypeParameterId,
    pub nullability: Nullability,
}

/// A type in the inference engine.
///
/// `NotNull` on a variable or parameter reference means "as declared": the
/// referenced type itself may still be nullable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Simple(SimpleType),
    Flexible(FlexibleType),
    Captured(CapturedType),
    Intersection(IntersectionType),
    /// `T & Any`
    DefinitelyNotNull(Arc<Type>),
    Variable(VariableType),
    Parameter(ParameterType),
}

impl Type {
    /// `C<args>` with invariant arguments.
    pub fn simple(class_id: ClassId, arguments: Vec<Type>) -> Type {
        Type::Simple(SimpleType::new(
            class_id,
            arguments.into_iter().map(Projection::Invariant).collect(),
        ))
    }

    pub fn projected(class_id: ClassId, arguments: Vec<Projection>) -> Type {
        Type::Simple(SimpleType::new(class_id, arguments))
    }

    pub fn class(class_id: ClassId) -> Type {
        Type::simple(class_id, Vec::new())
    }

    pub fn variable(id: TypeVariableId) -> Type {
        Type::Variable(VariableType {
            id,
            nullability: Nullability::NotNull,
        })
    }

    pub fn parameter(id: TypeParameterId) -> Type {
        Type::Parameter(ParameterType {
            id,
            nullability: Nullability::NotNull,
        })
    }

    /// Builds `lower..upper`. Flexible bounds collapse to their own lower/upper
    /// parts so flexible types never nest.
    pub fn flexible(lower: Type, upper: Type) -> Type {
        let lower = lower.lower_bound_if_flexible().clone();
        let upper = upper.upper_bound_if_flexible().clone();
        Type::Flexible(FlexibleType {
            lower: Arc::new(lower),
            upper: Arc::new(upper),
        })
    }

    /// Builds `ty & Any`.
    ///
    /// Postconditions: class, flexible and intersection types are simply made
    /// not-null; placeholders and captured types get a `DefinitelyNotNull` wrapper.
    pub fn definitely_not_null(ty: Type) -> Type {
        match ty {
            Type::Simple(_) | Type::Flexible(_) | Type::Intersection(_) => {
                ty.with_nullability(Nullability::NotNull)
            }
            Type::DefinitelyNotNull(_) => ty,
            Type::Variable(_) | Type::Parameter(_) | Type::Captured(_) => {
                Type::DefinitelyNotNull(Arc::new(ty.with_nullability(Nullability::NotNull)))
            }
        }
    }

    pub fn nullability(&self) -> Nullability {
        match self {
            Type::Simple(s) => s.nullability,
            Type::Flexible(f) => {
                if f.lower.nullability() == Nullability::Nullable {
                    Nullability::Nullable
                } else if f.upper.nullability() == Nullability::NotNull {
                    Nullability::NotNull
                } else {
                    Nullability::Unknown
                }
            }
            Type::Captured(c) => c.nullability,
            Type::Intersection(i) => {
                if i.components.iter().any(|c| c.nullability() == Nullability::NotNull) {
                    Nullability::NotNull
                } else if i.components.iter().all(|c| c.nullability() == Nullability::Nullable) {
                    Nullability::Nullable
                } else {
                    Nullability::Unknown
                }
            }
            Type::DefinitelyNotNull(_) => Nullability::NotNull,
            Type::Variable(v) => v.nullability,
            Type::Parameter(p) => p.nullability,
        }
    }

    pub fn is_nullable(&self) -> bool {
        self.nullability().is_nullable()
    }

    /// Returns this type with the given nullability.
    ///
    /// `Unknown` leaves flexible and intersection types untouched.
    pub fn with_nullability(&self, nullability: Nullability) -> Type {
        match self {
            Type::Simple(s) => Type::Simple(SimpleType {
                nullability,
                ..s.clone()
            }),
            Type::Flexible(f) => match nullability {
                Nullability::Unknown => self.clone(),
                _ => Type::Flexible(FlexibleType {
                    lower: Arc::new(f.lower.with_nullability(nullability)),
                    upper: Arc::new(f.upper.with_nullability(nullability)),
                }),
            },
            Type::Captured(c) => Type::Captured(c.with_nullability(nullability)),
            Type::Intersection(i) => match nullability {
                Nullability::Unknown => self.clone(),
                _ => IntersectionType::from_components(
                    i.components.iter().map(|c| c.with_nullability(nullability)),
                ),
            },
            Type::DefinitelyNotNull(inner) => match nullability {
                Nullability::Nullable => inner.with_nullability(Nullability::Nullable),
                _ => self.clone(),
            },
            Type::Variable(v) => Type::Variable(VariableType {
                id: v.id,
                nullability,
            }),
            Type::Parameter(p) => Type::Parameter(ParameterType {
                id: p.id,
                nullability,
            }),
        }
    }

    pub fn make_nullable(&self) -> Type {
        self.with_nullability(Nullability::Nullable)
    }

    pub fn make_not_null(&self) -> Type {
        self.with_nullability(Nullability::NotNull)
    }

    pub fn as_simple(&self) -> Option<&SimpleType> {
        match self {
            Type::Simple(s) => Some(s),
            _ => None,
        }
    }

    /// The variable id if this type is a bare variable reference (any nullability).
    pub fn as_variable(&self) -> Option<TypeVariableId> {
        match self {
            Type::Variable(v) => Some(v.id),
            _ => None,
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Type::Variable(_))
    }

    pub fn is_flexible(&self) -> bool {
        matches!(self, Type::Flexible(_))
    }

    pub fn lower_bound_if_flexible(&self) -> &Type {
        match self {
            Type::Flexible(f) => &f.lower,
            other => other,
        }
    }

    pub fn upper_bound_if_flexible(&self) -> &Type {
        match self {
            Type::Flexible(f) => &f.upper,
            other => other,
        }
    }

    /// All inference variables mentioned anywhere in this type.
    pub fn free_variables(&self) -> BTreeSet<TypeVariableId> {
        let mut out = BTreeSet::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut BTreeSet<TypeVariableId>) {
        match self {
            Type::Simple(s) => {
                for arg in &s.arguments {
                    if let Some(t) = arg.ty() {
                        t.collect_variables(out);
                    }
                }
            }
            Type::Flexible(f) => {
                f.lower.collect_variables(out);
                f.upper.collect_variables(out);
            }
            Type::Captured(c) => {
                if let Some(t) = c.projection().ty() {
                    t.collect_variables(out);
                }
                for s in c.supertypes() {
                    s.collect_variables(out);
                }
            }
            Type::Intersection(i) => {
                for c in &i.components {
                    c.collect_variables(out);
                }
            }
            Type::DefinitelyNotNull(inner) => inner.collect_variables(out),
            Type::Variable(v) => {
                out.insert(v.id);
            }
            Type::Parameter(_) => {}
        }
    }

    pub fn contains_variable(&self, id: TypeVariableId) -> bool {
        self.free_variables().contains(&id)
    }

    /// A type is proper when it mentions no inference variable.
    pub fn is_proper(&self) -> bool {
        self.free_variables().is_empty()
    }

    /// Whether a captured type occurs anywhere inside this type.
    pub fn contains_captured(&self) -> bool {
        match self {
            Type::Captured(_) => true,
            Type::Simple(s) => s
                .arguments
                .iter()
                .any(|a| a.ty().is_some_and(Type::contains_captured)),
            Type::Flexible(f) => f.lower.contains_captured() || f.upper.contains_captured(),
            Type::Intersection(i) => i.components.iter().any(Type::contains_captured),
            Type::DefinitelyNotNull(inner) => inner.contains_captured(),
            Type::Variable(_) | Type::Parameter(_) => false,
        }
    }

    pub fn contains_flexible(&self) -> bool {
        match self {
            Type::Flexible(_) => true,
            Type::Simple(s) => s
                .arguments
                .iter()
                .any(|a| a.ty().is_some_and(Type::contains_flexible)),
            Type::Captured(c) => c.supertypes().iter().any(Type::contains_flexible),
            Type::Intersection(i) => i.components.iter().any(Type::contains_flexible),
            Type::DefinitelyNotNull(inner) => inner.contains_flexible(),
            Type::Variable(_) | Type::Parameter(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> Type {
        Type::class(ClassId(5))
    }

    #[test]
    fn nullability_order_puts_nullable_first() {
        assert!(Nullability::Nullable < Nullability::Unknown);
        assert!(Nullability::Unknown < Nullability::NotNull);
        assert_eq!(Nullability::NotNull.min(Nullability::Nullable), Nullability::Nullable);
    }

    #[test]
    fn flexible_bounds_do_not_nest() {
        let inner = Type::flexible(int(), int().make_nullable());
        let outer = Type::flexible(inner.clone(), inner);
        let Type::Flexible(f) = outer else {
            panic!("expected flexible type");
        };
        assert_eq!(*f.lower, int());
        assert_eq!(*f.upper, int().make_nullable());
    }

    #[test]
    fn flexible_nullability_is_unknown_between_bounds() {
        assert_eq!(
            Type::flexible(int(), int().make_nullable()).nullability(),
            Nullability::Unknown
        );
        assert_eq!(Type::flexible(int(), int()).nullability(), Nullability::NotNull);
    }

    #[test]
    fn captured_identity_is_per_construction() {
        let a = CapturedType::new(Projection::Out(int()), vec![int()], None);
        let b = CapturedType::new(Projection::Out(int()), vec![int()], None);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_ne!(a, a.with_nullability(Nullability::Nullable));
        assert!(a.same_constructor(&a.with_nullability(Nullability::Nullable)));
    }

    #[test]
    fn in_projection_capture_has_lower_type() {
        let c = CapturedType::new(Projection::In(int()), vec![], None);
        assert_eq!(c.lower_type.as_deref(), Some(&int()));
    }

    #[test]
    fn intersection_equality_ignores_order() {
        let a = Type::class(ClassId(1));
        let b = Type::class(ClassId(2));
        let ab = IntersectionType::from_components(vec![a.clone(), b.clone()]);
        let ba = IntersectionType::from_components(vec![b, a.clone(), a.clone()]);
        assert_eq!(ab, ba);
        assert_eq!(IntersectionType::from_components(vec![a.clone(), a.clone()]), a);
    }

    #[test]
    fn empty_intersection_is_nullable_any() {
        let empty = IntersectionType::from_components(Vec::new());
        assert_eq!(empty, Type::class(ClassId::ANY).make_nullable());
        assert!(!matches!(empty, Type::Intersection(_)));
    }

    #[test]
    fn definitely_not_null_wraps_placeholders_only() {
        let v = Type::variable(TypeVariableId(0)).make_nullable();
        let dnn = Type::definitely_not_null(v);
        assert!(matches!(dnn, Type::DefinitelyNotNull(_)));
        assert_eq!(dnn.nullability(), Nullability::NotNull);
        assert_eq!(Type::definitely_not_null(int().make_nullable()), int());
    }

    #[test]
    fn free_variables_walk_nested_arguments() {
        let t = Type::simple(
            ClassId(9),
            vec![
                Type::variable(TypeVariableId(3)),
                Type::flexible(Type::variable(TypeVariableId(1)), int()),
            ],
        );
        assert_eq!(
            t.free_variables().into_iter().collect::<Vec<_>>(),
            vec![TypeVariableId(1), TypeVariableId(3)]
        );
        assert!(!t.is_proper());
        assert!(int().is_proper());
    }
}
