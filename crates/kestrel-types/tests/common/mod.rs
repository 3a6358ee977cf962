#![allow(dead_code)]

use kestrel_types::{Projection, Type, TypeContext, TypeParameterId, Variance};

pub fn ctx() -> TypeContext {
    TypeContext::with_builtins()
}

pub fn named(ctx: &TypeContext, name: &str) -> Type {
    let id = ctx
        .class_by_name(name)
        .unwrap_or_else(|| panic!("class {name} not declared"));
    Type::class(id)
}

pub fn generic(ctx: &TypeContext, name: &str, args: Vec<Type>) -> Type {
    let id = ctx
        .class_by_name(name)
        .unwrap_or_else(|| panic!("class {name} not declared"));
    ctx.class_type(id, args).unwrap()
}

pub fn projected(ctx: &TypeContext, name: &str, args: Vec<Projection>) -> Type {
    let id = ctx
        .class_by_name(name)
        .unwrap_or_else(|| panic!("class {name} not declared"));
    ctx.projected_type(id, args).unwrap()
}

/// Declares `class Box<out T : bound>`.
pub fn declare_box(ctx: &mut TypeContext, bound: Option<Type>) -> TypeParameterId {
    let t = ctx.declare_type_parameter("T", Variance::Out);
    if let Some(bound) = bound {
        ctx.set_bounds(t, vec![bound]).unwrap();
    }
    ctx.declare_class("Box", vec![t], vec![]).unwrap();
    t
}
