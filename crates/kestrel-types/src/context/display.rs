// src/context/display.rs
use std::fmt::Write;

use crate::context::type_context::TypeContext;
use crate::types::{Nullability, Projection, Type, TypeVariableId};

impl TypeContext {
    /// Renders a type; inference variables print as `$t{n}`.
    pub fn render(&self, ty: &Type) -> String {
        self.render_with(ty, &|_| None)
    }

    /// Renders a type, asking `variable_name` for the display name of each variable.
    pub fn render_with(&self, ty: &Type, variable_name: &dyn Fn(TypeVariableId) -> Option<String>) -> String {
        let mut out = String::new();
        self.write_type(&mut out, ty, variable_name);
        out
    }

    fn write_type(&self, out: &mut String, ty: &Type, names: &dyn Fn(TypeVariableId) -> Option<String>) {
        match ty {
            Type::Simple(s) => {
                if let Some(view) = self.function_type_view(ty) {
                    let nullable = s.nullability == Nullability::Nullable;
                    if nullable {
                        out.push('(');
                    }
                    if let Some(receiver) = &view.receiver {
                        self.write_type(out, receiver, names);
                        out.push('.');
                    }
                    out.push('(');
                    for (i, p) in view.parameters.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        self.write_type(out, p, names);
                    }
                    out.push_str(") -> ");
                    self.write_type(out, &view.return_type, names);
                    if nullable {
                        out.push_str(")?");
                    }
                    return;
                }
                match self.class(s.class_id) {
                    Ok(decl) => out.push_str(&decl.name),
                    Err(_) => {
                        let _ = write!(out, "#{}", s.class_id.0);
                    }
                }
                if !s.arguments.is_empty() {
                    out.push('<');
                    for (i, arg) in s.arguments.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        self.write_projection(out, arg, names);
                    }
                    out.push('>');
                }
                write_nullability(out, s.nullability);
            }
            Type::Flexible(f) => {
                if f.lower == f.upper || *f.upper == f.lower.make_nullable() {
                    self.write_type(out, &f.lower, names);
                    out.push('!');
                } else {
                    out.push('(');
                    self.write_type(out, &f.lower, names);
                    out.push_str("..");
                    self.write_type(out, &f.upper, names);
                    out.push(')');
                }
            }
            Type::Captured(c) => {
                out.push_str("Captured(");
                self.write_projection(out, c.projection(), names);
                out.push(')');
                write_nullability(out, c.nullability);
            }
            Type::Intersection(i) => {
                out.push('{');
                for (n, component) in i.components.iter().enumerate() {
                    if n > 0 {
                        out.push_str(" & ");
                    }
                    self.write_type(out, component, names);
                }
                out.push('}');
            }
            Type::DefinitelyNotNull(inner) => {
                self.write_type(out, inner, names);
                out.push_str(" & Any");
            }
            Type::Variable(v) => {
                match names(v.id) {
                    Some(name) => out.push_str(&name),
                    None => {
                        let _ = write!(out, "{}", v.id);
                    }
                }
                write_nullability(out, v.nullability);
            }
            Type::Parameter(p) => {
                match self.type_parameter(p.id) {
                    Ok(decl) => out.push_str(&decl.name),
                    Err(_) => {
                        let _ = write!(out, "#T{}", p.id.0);
                    }
                }
                write_nullability(out, p.nullability);
            }
        }
    }

    fn write_projection(&self, out: &mut String, projection: &Projection, names: &dyn Fn(TypeVariableId) -> Option<String>) {
        match projection {
            Projection::Star => out.push('*'),
            Projection::Invariant(t) => self.write_type(out, t, names),
            Projection::In(t) => {
                out.push_str("in ");
                self.write_type(out, t, names);
            }
            Projection::Out(t) => {
                out.push_str("out ");
                self.write_type(out, t, names);
            }
            Projection::Conflicting(t) => {
                out.push_str("conflicting ");
                self.write_type(out, t, names);
            }
        }
    }
}

fn write_nullability(out: &mut String, nullability: Nullability) {
    match nullability {
        Nullability::Nullable => out.push('?'),
        Nullability::Unknown => out.push('!'),
        Nullability::NotNull => {}
    }
}
