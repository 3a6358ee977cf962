// src/constraint/position.rs
use miette::SourceSpan;

use kestrel_types::{TypeParameterId, TypeVariableId};

use crate::postponed::AtomId;

/// Provenance of a constraint, kept for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintPosition {
    /// Argument `index` checked against its parameter type.
    Argument { index: usize, span: Option<SourceSpan> },
    ExplicitTypeArgument { span: Option<SourceSpan> },
    /// The call's return type checked against the type expected by the surrounding code.
    ExpectedType { span: Option<SourceSpan> },
    DeclaredUpperBound { parameter: TypeParameterId },
    /// The value chosen when the variable was fixed.
    FixVariable { variable: TypeVariableId },
    LambdaParameter { atom: AtomId, index: usize, span: Option<SourceSpan> },
    LambdaReceiver { atom: AtomId, span: Option<SourceSpan> },
    /// Type of an analyzed postponed argument against its expected type.
    AtomResult { atom: AtomId, span: Option<SourceSpan> },
    /// Reported by the analyzer for a call nested inside a lambda body.
    NestedCall { atom: AtomId, span: Option<SourceSpan> },
    /// Derived by incorporation from another constraint.
    Incorporation { from: Box<ConstraintPosition> },
}

impl ConstraintPosition {
    pub fn argument(index: usize) -> Self {
        ConstraintPosition::Argument { index, span: None }
    }

    /// The original, non-derived position.
    pub fn root(&self) -> &ConstraintPosition {
        match self {
            ConstraintPosition::Incorporation { from } => from.root(),
            other => other,
        }
    }

    /// Number of incorporation steps between this position and its root.
    pub fn depth(&self) -> usize {
        match self {
            ConstraintPosition::Incorporation { from } => 1 + from.depth(),
            _ => 0,
        }
    }

    pub fn derived(&self) -> ConstraintPosition {
        ConstraintPosition::Incorporation {
            from: Box::new(self.clone()),
        }
    }

    pub fn span(&self) -> Option<SourceSpan> {
        match self.root() {
            ConstraintPosition::Argument { span, .. }
            | ConstraintPosition::ExplicitTypeArgument { span }
            | ConstraintPosition::ExpectedType { span }
            | ConstraintPosition::LambdaParameter { span, .. }
            | ConstraintPosition::LambdaReceiver { span, .. }
            | ConstraintPosition::AtomResult { span, .. }
            | ConstraintPosition::NestedCall { span, .. } => *span,
            _ => None,
        }
    }

    pub fn is_from_expected_type(&self) -> bool {
        matches!(self.root(), ConstraintPosition::ExpectedType { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_positions_keep_their_root() {
        let span = SourceSpan::from((4, 2));
        let pos = ConstraintPosition::ExpectedType { span: Some(span) }.derived().derived();
        assert_eq!(pos.depth(), 2);
        assert!(pos.is_from_expected_type());
        assert_eq!(pos.span(), Some(span));
        assert_eq!(pos.root(), &ConstraintPosition::ExpectedType { span: Some(span) });
    }
}
