// src/context/functions.rs
use crate::context::type_context::{TypeContext, MAX_FUNCTION_ARITY};
use crate::error::{TypeContextError, TypeResult};
use crate::types::{ClassId, Nullability, Projection, SimpleType, Type};

/// A function type taken apart into receiver, parameters and return type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionTypeView {
    pub receiver: Option<Type>,
    pub parameters: Vec<Type>,
    pub return_type: Type,
    pub nullability: Nullability,
}

impl FunctionTypeView {
    /// Receiver and parameter types, the positions a function literal consumes.
    pub fn input_types(&self) -> impl Iterator<Item = &Type> {
        self.receiver.iter().chain(self.parameters.iter())
    }
}

impl TypeContext {
    /// Builds `Receiver.(P1, ..) -> R` over the built-in `FunctionN` classes.
    ///
    /// The receiver, when present, is passed as the first argument and the type
    /// is flagged as an extension function type.
    pub fn function_type(&self, receiver: Option<Type>, parameters: Vec<Type>, return_type: Type) -> TypeResult<Type> {
        let extension = receiver.is_some();
        let mut arguments: Vec<Projection> = receiver.into_iter().map(Projection::Invariant).collect();
        arguments.extend(parameters.into_iter().map(Projection::Invariant));
        let arity = arguments.len();
        let class_id = self.function_class(arity)?;
        arguments.push(Projection::Invariant(return_type));
        Ok(Type::Simple(SimpleType {
            class_id,
            nullability: Nullability::NotNull,
            arguments,
            extension_function: extension,
        }))
    }

    pub fn function_class(&self, arity: usize) -> TypeResult<ClassId> {
        self.builtins()
            .functions
            .get(arity)
            .copied()
            .ok_or(TypeContextError::FunctionArityTooLarge {
                arity,
                max: MAX_FUNCTION_ARITY,
            })
    }

    /// The arity of `class_id` if it is one of the `FunctionN` classes.
    pub fn function_arity(&self, class_id: ClassId) -> Option<usize> {
        self.builtins().functions.iter().position(|&c| c == class_id)
    }

    /// Views `ty` as a function type. Flexible types are viewed through their lower bound.
    pub fn function_type_view(&self, ty: &Type) -> Option<FunctionTypeView> {
        let Type::Simple(s) = ty.lower_bound_if_flexible() else {
            return None;
        };
        self.function_arity(s.class_id)?;
        let (return_arg, inputs) = s.arguments.split_last()?;
        let mut inputs = inputs.iter().map(|p| self.projection_argument(p));
        let receiver = if s.extension_function { inputs.next() } else { None };
        Some(FunctionTypeView {
            receiver,
            parameters: inputs.collect(),
            return_type: self.projection_argument(return_arg),
            nullability: ty.nullability(),
        })
    }

    pub fn is_function_type(&self, ty: &Type) -> bool {
        self.function_type_view(ty).is_some()
    }

    pub fn is_extension_function_type(&self, ty: &Type) -> bool {
        matches!(ty.lower_bound_if_flexible(), Type::Simple(s) if s.extension_function && self.function_arity(s.class_id).is_some())
    }

    fn projection_argument(&self, projection: &Projection) -> Type {
        match projection {
            Projection::Star => self.nullable_any_type(),
            other => other.ty().cloned().unwrap_or_else(|| self.nullable_any_type()),
        }
    }
}
