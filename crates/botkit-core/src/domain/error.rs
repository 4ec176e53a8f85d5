// ============================================================================
// domain/error.rs - DOMAIN ERRORS
// ============================================================================

use thiserror::Error;

use crate::error::ErrorCategory;

/// Errors raised by pure domain logic.
///
/// All errors are:
/// - Cloneable (error handlers receive a shared reference per turn)
/// - Categorizable (for CLI display)
/// - Actionable (provides suggestions)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    // ========================================================================
    // Declarative expressions
    // ========================================================================
    #[error("Invalid expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("Expression '{expression}' did not evaluate to {expected}: {reason}")]
    ExpressionTypeMismatch {
        expression: String,
        expected: &'static str,
        reason: String,
    },

    // ========================================================================
    // Resources and activities
    // ========================================================================
    #[error("Resource '{id}' is malformed: {reason}")]
    MalformedResource { id: String, reason: String },

    #[error("Activity is missing {field}")]
    IncompleteActivity { field: &'static str },
}

impl DomainError {
    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidExpression { .. } => vec![
                "Expressions start with '=' and reference configuration paths".into(),
                "Example: \"=settings.feature.removeRecipientMention\"".into(),
            ],
            Self::ExpressionTypeMismatch { expected, .. } => vec![
                format!("Make sure the configured value is a {}", expected),
            ],
            Self::MalformedResource { id, .. } => vec![
                format!("Check that '{}' contains valid JSON", id),
            ],
            Self::IncompleteActivity { field } => vec![
                format!("The channel must populate {} on inbound activities", field),
            ],
        }
    }

    /// Error category for CLI display styling.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::IncompleteActivity { .. } => ErrorCategory::TurnExecution,
            _ => ErrorCategory::Validation,
        }
    }
}
