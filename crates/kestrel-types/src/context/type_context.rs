// src/context/type_context.rs
use lazy_static::lazy_static;
use rustc_hash::FxHashMap;

use crate::error::{TypeContextError, TypeResult};
use crate::types::{ClassId, Projection, Type, TypeParameterId, Variance};

/// Highest supported function-type arity (`Function0` .. `Function8`).
pub const MAX_FUNCTION_ARITY: usize = 8;

/// A declared class or interface.
#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub id: ClassId,
    pub name: String,
    pub type_parameters: Vec<TypeParameterId>,
    /// Direct supertypes, written in terms of `type_parameters`.
    pub supertypes: Vec<Type>,
}

/// A declared type parameter.
#[derive(Debug, Clone)]
pub struct TypeParameterDecl {
    pub id: TypeParameterId,
    pub name: String,
    pub variance: Variance,
    /// Upper bounds. Empty means the implicit `Any?`.
    pub bounds: Vec<Type>,
    /// Marked with the "only input types" annotation.
    pub only_input_types: bool,
    pub reified: bool,
}

/// Ids of the classes every context starts with.
#[derive(Debug, Clone)]
pub struct Builtins {
    pub any: ClassId,
    pub nothing: ClassId,
    pub unit: ClassId,
    pub comparable: ClassId,
    pub number: ClassId,
    pub int: ClassId,
    pub long: ClassId,
    pub double: ClassId,
    pub boolean: ClassId,
    pub char: ClassId,
    pub char_sequence: ClassId,
    pub string: ClassId,
    pub iterable: ClassId,
    pub collection: ClassId,
    pub list: ClassId,
    pub mutable_list: ClassId,
    pub set: ClassId,
    pub map: ClassId,
    /// `functions[n]` is `Function<n>`.
    pub functions: Vec<ClassId>,
}

/// Class table and type-parameter declarations shared by every inference run.
///
/// Contexts are cheap to clone and hold no interior mutability, so independent
/// solver instances never observe each other.
#[derive(Debug, Clone)]
pub struct TypeContext {
    classes: Vec<ClassDecl>,
    type_parameters: Vec<TypeParameterDecl>,
    class_names: FxHashMap<String, ClassId>,
    builtins: Builtins,
}

lazy_static! {
    static ref BUILTIN_TEMPLATE: TypeContext = TypeContext::build_builtin_template();
}

impl TypeContext {
    /// A context populated with the standard built-in classes.
    pub fn with_builtins() -> Self {
        BUILTIN_TEMPLATE.clone()
    }

    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    pub fn declare_type_parameter(&mut self, name: &str, variance: Variance) -> TypeParameterId {
        let id = TypeParameterId(self.type_parameters.len() as u32);
        self.type_parameters.push(TypeParameterDecl {
            id,
            name: name.to_string(),
            variance,
            bounds: Vec::new(),
            only_input_types: false,
            reified: false,
        });
        id
    }

    pub fn set_bounds(&mut self, id: TypeParameterId, bounds: Vec<Type>) -> TypeResult<()> {
        self.type_parameter_mut(id)?.bounds = bounds;
        Ok(())
    }

    pub fn mark_only_input_types(&mut self, id: TypeParameterId) -> TypeResult<()> {
        self.type_parameter_mut(id)?.only_input_types = true;
        Ok(())
    }

    pub fn mark_reified(&mut self, id: TypeParameterId) -> TypeResult<()> {
        self.type_parameter_mut(id)?.reified = true;
        Ok(())
    }

    /// Declares a class. A class without explicit supertypes extends `Any`.
    ///
    /// Preconditions: every id in `type_parameters` was declared in this context.
    /// Postconditions: `class_by_name(name)` returns the new id.
    pub fn declare_class(
        &mut self,
        name: &str,
        type_parameters: Vec<TypeParameterId>,
        supertypes: Vec<Type>,
    ) -> TypeResult<ClassId> {
        if self.class_names.contains_key(name) {
            return Err(TypeContextError::DuplicateClass {
                name: name.to_string(),
            });
        }
        for &p in &type_parameters {
            self.type_parameter(p)?;
        }
        let supertypes = if supertypes.is_empty() {
            vec![Type::class(self.builtins.any)]
        } else {
            supertypes
        };
        Ok(self.push_class(name, type_parameters, supertypes))
    }

    fn push_class(&mut self, name: &str, type_parameters: Vec<TypeParameterId>, supertypes: Vec<Type>) -> ClassId {
        let id = ClassId(self.classes.len() as u32);
        self.classes.push(ClassDecl {
            id,
            name: name.to_string(),
            type_parameters,
            supertypes,
        });
        self.class_names.insert(name.to_string(), id);
        id
    }

    pub fn class(&self, id: ClassId) -> TypeResult<&ClassDecl> {
        self.classes
            .get(id.0 as usize)
            .ok_or(TypeContextError::UnknownClass(id))
    }

    pub fn type_parameter(&self, id: TypeParameterId) -> TypeResult<&TypeParameterDecl> {
        self.type_parameters
            .get(id.0 as usize)
            .ok_or(TypeContextError::UnknownTypeParameter(id))
    }

    fn type_parameter_mut(&mut self, id: TypeParameterId) -> TypeResult<&mut TypeParameterDecl> {
        self.type_parameters
            .get_mut(id.0 as usize)
            .ok_or(TypeContextError::UnknownTypeParameter(id))
    }

    pub fn class_by_name(&self, name: &str) -> Option<ClassId> {
        self.class_names.get(name).copied()
    }

    /// `C<args>` with invariant arguments, checked against the declared arity.
    pub fn class_type(&self, id: ClassId, arguments: Vec<Type>) -> TypeResult<Type> {
        self.projected_type(id, arguments.into_iter().map(Projection::Invariant).collect())
    }

    /// `C<projections>`, checked against the declared arity.
    pub fn projected_type(&self, id: ClassId, arguments: Vec<Projection>) -> TypeResult<Type> {
        let decl = self.class(id)?;
        if decl.type_parameters.len() != arguments.len() {
            return Err(TypeContextError::ArgumentCountMismatch {
                class: decl.name.clone(),
                expected: decl.type_parameters.len(),
                found: arguments.len(),
            });
        }
        Ok(Type::projected(id, arguments))
    }

    pub fn any_type(&self) -> Type {
        Type::class(self.builtins.any)
    }

    pub fn nullable_any_type(&self) -> Type {
        Type::class(self.builtins.any).make_nullable()
    }

    pub fn nothing_type(&self) -> Type {
        Type::class(self.builtins.nothing)
    }

    pub fn is_nothing(&self, ty: &Type) -> bool {
        matches!(ty, Type::Simple(s) if s.class_id == self.builtins.nothing)
    }

    pub fn is_any(&self, ty: &Type) -> bool {
        matches!(ty, Type::Simple(s) if s.class_id == self.builtins.any)
    }

    /// `Any?`, or a flexible type whose upper bound is `Any?`.
    pub fn is_nullable_any(&self, ty: &Type) -> bool {
        let upper = ty.upper_bound_if_flexible();
        self.is_any(upper) && upper.is_nullable()
    }

    /// Declared upper bounds of a type parameter; `[Any?]` when none are declared.
    pub fn effective_bounds(&self, id: TypeParameterId) -> TypeResult<Vec<Type>> {
        let decl = self.type_parameter(id)?;
        if decl.bounds.is_empty() {
            Ok(vec![self.nullable_any_type()])
        } else {
            Ok(decl.bounds.clone())
        }
    }

    fn build_builtin_template() -> TypeContext {
        let mut ctx = TypeContext {
            classes: Vec::new(),
            type_parameters: Vec::new(),
            class_names: FxHashMap::default(),
            builtins: Builtins {
                any: ClassId(0),
                nothing: ClassId(0),
                unit: ClassId(0),
                comparable: ClassId(0),
                number: ClassId(0),
                int: ClassId(0),
                long: ClassId(0),
                double: ClassId(0),
                boolean: ClassId(0),
                char: ClassId(0),
                char_sequence: ClassId(0),
                string: ClassId(0),
                iterable: ClassId(0),
                collection: ClassId(0),
                list: ClassId(0),
                mutable_list: ClassId(0),
                set: ClassId(0),
                map: ClassId(0),
                functions: Vec::new(),
            },
        };

        let any = ctx.push_class("Any", Vec::new(), Vec::new());
        debug_assert_eq!(any, ClassId::ANY);
        ctx.builtins.any = any;
        let any_ty = Type::class(any);
        let nothing = ctx.push_class("Nothing", Vec::new(), Vec::new());
        let unit = ctx.push_class("Unit", Vec::new(), vec![any_ty.clone()]);

        let comparable_t = ctx.declare_type_parameter("T", Variance::In);
        let comparable = ctx.push_class("Comparable", vec![comparable_t], vec![any_ty.clone()]);
        let number = ctx.push_class("Number", Vec::new(), vec![any_ty.clone()]);
        let comparable_of = |c: ClassId| Type::simple(comparable, vec![Type::class(c)]);

        let int = ctx.next_class_id();
        ctx.push_class("Int", Vec::new(), vec![Type::class(number), comparable_of(int)]);
        let long = ctx.next_class_id();
        ctx.push_class("Long", Vec::new(), vec![Type::class(number), comparable_of(long)]);
        let double = ctx.next_class_id();
        ctx.push_class("Double", Vec::new(), vec![Type::class(number), comparable_of(double)]);
        let boolean = ctx.next_class_id();
        ctx.push_class("Boolean", Vec::new(), vec![comparable_of(boolean)]);
        let char = ctx.next_class_id();
        ctx.push_class("Char", Vec::new(), vec![comparable_of(char)]);
        let char_sequence = ctx.push_class("CharSequence", Vec::new(), vec![any_ty.clone()]);
        let string = ctx.next_class_id();
        ctx.push_class(
            "String",
            Vec::new(),
            vec![Type::class(char_sequence), comparable_of(string)],
        );

        let iterable_t = ctx.declare_type_parameter("T", Variance::Out);
        let iterable = ctx.push_class("Iterable", vec![iterable_t], vec![any_ty.clone()]);
        let collection_e = ctx.declare_type_parameter("E", Variance::Out);
        let collection = ctx.push_class(
            "Collection",
            vec![collection_e],
            vec![Type::simple(iterable, vec![Type::parameter(collection_e)])],
        );
        let list_e = ctx.declare_type_parameter("E", Variance::Out);
        let list = ctx.push_class(
            "List",
            vec![list_e],
            vec![Type::simple(collection, vec![Type::parameter(list_e)])],
        );
        let mutable_list_e = ctx.declare_type_parameter("E", Variance::Invariant);
        let mutable_list = ctx.push_class(
            "MutableList",
            vec![mutable_list_e],
            vec![Type::simple(list, vec![Type::parameter(mutable_list_e)])],
        );
        let set_e = ctx.declare_type_parameter("E", Variance::Out);
        let set = ctx.push_class(
            "Set",
            vec![set_e],
            vec![Type::simple(collection, vec![Type::parameter(set_e)])],
        );
        let map_k = ctx.declare_type_parameter("K", Variance::Invariant);
        let map_v = ctx.declare_type_parameter("V", Variance::Out);
        let map = ctx.push_class("Map", vec![map_k, map_v], vec![any_ty.clone()]);

        let mut functions = Vec::with_capacity(MAX_FUNCTION_ARITY + 1);
        for arity in 0..=MAX_FUNCTION_ARITY {
            let mut params: Vec<TypeParameterId> = (1..=arity)
                .map(|i| ctx.declare_type_parameter(&format!("P{i}"), Variance::In))
                .collect();
            params.push(ctx.declare_type_parameter("R", Variance::Out));
            functions.push(ctx.push_class(&format!("Function{arity}"), params, vec![any_ty.clone()]));
        }

        ctx.builtins = Builtins {
            any,
            nothing,
            unit,
            comparable,
            number,
            int,
            long,
            double,
            boolean,
            char,
            char_sequence,
            string,
            iterable,
            collection,
            list,
            mutable_list,
            set,
            map,
            functions,
        };
        ctx
    }

    fn next_class_id(&self) -> ClassId {
        ClassId(self.classes.len() as u32)
    }
}

impl Default for TypeContext {
    fn default() -> Self {
        TypeContext::with_builtins()
    }
}
