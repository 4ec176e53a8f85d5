//! Unified error handling for botkit Core.
//!
//! This module provides a unified error type that wraps domain and application
//! errors, with the offending parameter name and user-actionable suggestions.

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::DomainError;

/// Root error type for botkit Core operations.
///
/// Layer errors are transparent so that their messages surface unchanged:
/// a missing resource reads `Could not find resource 'root.dialog'` no
/// matter how deep the lookup happened.
#[derive(Debug, Error, Clone)]
pub enum BotError {
    /// Errors from the domain layer (expressions, activities, resources).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Errors from the application layer (composition and turn failures).
    #[error(transparent)]
    Application(#[from] ApplicationError),

    /// Configuration or setup errors.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Unexpected internal errors (bugs).
    #[error("Internal error: {message}. This is a bug, please report it.")]
    Internal { message: String },
}

impl BotError {
    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Domain(e) => e.suggestions(),
            Self::Application(e) => e.suggestions(),
            Self::Configuration { message } => vec![
                format!("Configuration issue: {}", message),
                "Check settings/appsettings.json and try again".into(),
            ],
            Self::Internal { .. } => vec![
                "This appears to be a bug in botkit".into(),
                "Please report this issue at: https://github.com/cosecruz/botkit/issues".into(),
            ],
        }
    }

    /// Get error category for display/styling purposes.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Domain(e) => e.category(),
            Self::Application(e) => e.category(),
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Name of the argument or resource this error is about, if any.
    ///
    /// For a missing resource this is the resource identifier itself.
    pub fn param_name(&self) -> Option<&str> {
        match self {
            Self::Application(e) => e.param_name(),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Application(
                ApplicationError::StoreLockError | ApplicationError::EtagConflict { .. }
            )
        )
    }
}

/// Error categories for UI display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed declarations, expressions or arguments.
    Validation,
    NotFound,
    Configuration,
    /// Failures raised while a turn is running.
    TurnExecution,
    Internal,
}

/// Convenient result type alias.
pub type BotResult<T> = Result<T, BotError>;

/// Extension trait for adding context to errors.
pub trait Context<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> BotResult<T>;
}

impl<T, E> Context<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, msg: impl Into<String>) -> BotResult<T> {
        self.map_err(|e| BotError::Internal {
            message: format!("{}: {}", msg.into(), e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_not_found_reads_like_a_lookup_failure() {
        let err: BotError = ApplicationError::ResourceNotFound {
            id: "root.dialog".into(),
        }
        .into();

        assert!(err.to_string().starts_with("Could not find resource 'root.dialog'"));
        assert_eq!(err.param_name(), Some("root.dialog"));
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn missing_argument_names_parameter() {
        let err: BotError = ApplicationError::MissingArgument {
            param: "transcriptStore".into(),
        }
        .into();

        assert_eq!(err.param_name(), Some("transcriptStore"));
        assert!(err.to_string().contains("transcriptStore"));
    }

    #[test]
    fn etag_conflicts_are_retryable() {
        let err: BotError = ApplicationError::EtagConflict { key: "k".into() }.into();
        assert!(err.is_retryable());
        assert!(!BotError::Internal { message: "x".into() }.is_retryable());
    }

    #[test]
    fn context_wraps_foreign_errors_as_internal() {
        let result: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        let err = result.context("reading transcript").unwrap_err();
        assert!(matches!(err, BotError::Internal { .. }));
        assert!(err.to_string().contains("reading transcript: boom"));
    }
}
