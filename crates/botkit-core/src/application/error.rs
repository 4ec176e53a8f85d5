//! Application layer errors.
//!
//! These errors represent failures in composition and turn orchestration.
//! Data-level errors are `DomainError` from `crate::domain`.

use std::path::PathBuf;
use thiserror::Error;

use crate::error::ErrorCategory;

/// Errors that occur during composition or while running a turn.
#[derive(Debug, Error, Clone)]
pub enum ApplicationError {
    // ── Configuration ──────────────────────────────────────────────────────
    /// A required argument or declarative field is absent.
    #[error("Value cannot be null. (Parameter '{param}')")]
    MissingArgument { param: String },

    /// A named resource is not in the catalog.
    #[error("Could not find resource '{id}'")]
    ResourceNotFound { id: String },

    /// Neither `rootDialog` nor `defaultRootDialog` names a dialog.
    #[error("No root dialog configured: set 'rootDialog' in runtime.json or 'defaultRootDialog' in settings")]
    RootDialogNotConfigured,

    /// A service was requested that nothing registered.
    #[error("Required service not registered: {service}")]
    ServiceNotRegistered { service: &'static str },

    /// Composition ran twice against the same service collection.
    #[error("Bot services were already composed into this service collection")]
    AlreadyComposed,

    // ── Declarative validation ─────────────────────────────────────────────
    #[error("Unknown component kind '{kind}'")]
    UnknownKind { kind: String },

    #[error("Declarative component has no '$kind' discriminator")]
    MissingKind,

    #[error("Component '{kind}' is a {found}, expected a {expected}")]
    UnexpectedComponent {
        kind: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Invalid '{kind}' declaration: {reason}")]
    InvalidDeclaration { kind: String, reason: String },

    // ── Turn execution ─────────────────────────────────────────────────────
    /// Lock poisoned on an in-memory store.
    #[error("Store lock poisoned")]
    StoreLockError,

    #[error("Storage operation failed: {reason}")]
    StorageFailure { reason: String },

    /// Optimistic concurrency check failed on write.
    #[error("eTag conflict writing '{key}'")]
    EtagConflict { key: String },

    #[error("Turn was cancelled")]
    TurnCancelled,

    #[error("Dialog '{dialog}' failed: {reason}")]
    DialogFailed { dialog: String, reason: String },

    #[error("Caller '{app_id}' is not allowed to call this bot as a skill")]
    UnauthorizedCaller { app_id: String },

    #[error("Skill conversation '{id}' not found")]
    SkillConversationNotFound { id: String },

    #[error("Skill request failed: {reason}")]
    SkillTransportFailed { reason: String },

    /// Filesystem operation failed.
    #[error("Filesystem error at {path}: {reason}")]
    FilesystemError { path: PathBuf, reason: String },
}

impl ApplicationError {
    /// Get user-actionable suggestions.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::MissingArgument { param } => vec![
                format!("Provide a value for '{}'", param),
                "Check the declaration in runtime.json".into(),
            ],
            Self::ResourceNotFound { id } => vec![
                format!("Add '{}' to the bot folder", id),
                "Try: botkit check --root <bot folder> to list resources".into(),
            ],
            Self::RootDialogNotConfigured => vec![
                "Set \"rootDialog\": \"main.dialog\" in runtime.json".into(),
                "Or put a *.dialog file in the bot folder".into(),
            ],
            Self::ServiceNotRegistered { service } => vec![
                format!("Required component not configured: {}", service),
                "Declare the matching provider in runtime.json".into(),
            ],
            Self::UnknownKind { kind } => vec![
                format!("'{}' is not a registered component kind", kind),
                "Check the spelling of $kind or register the component".into(),
            ],
            Self::MissingKind => vec!["Add a \"$kind\" property to the declaration".into()],
            Self::StoreLockError => vec![
                "An in-memory store is locked".into(),
                "Try again in a moment".into(),
            ],
            Self::EtagConflict { .. } => vec![
                "Another turn changed the same state concurrently".into(),
                "Retry the turn".into(),
            ],
            Self::UnauthorizedCaller { app_id } => vec![
                format!("Add '{}' to skillConfiguration:allowedCallers", app_id),
            ],
            Self::FilesystemError { path, .. } => vec![
                format!("Failed to access: {}", path.display()),
                "Check that you have write permissions".into(),
            ],
            _ => vec!["Check the error details above".into()],
        }
    }

    /// Get error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingArgument { .. } => ErrorCategory::Validation,
            Self::ResourceNotFound { .. } => ErrorCategory::NotFound,
            Self::RootDialogNotConfigured
            | Self::ServiceNotRegistered { .. }
            | Self::AlreadyComposed => ErrorCategory::Configuration,
            Self::UnknownKind { .. }
            | Self::MissingKind
            | Self::UnexpectedComponent { .. }
            | Self::InvalidDeclaration { .. } => ErrorCategory::Validation,
            Self::StoreLockError | Self::FilesystemError { .. } => ErrorCategory::Internal,
            Self::StorageFailure { .. }
            | Self::EtagConflict { .. }
            | Self::TurnCancelled
            | Self::DialogFailed { .. }
            | Self::UnauthorizedCaller { .. }
            | Self::SkillConversationNotFound { .. }
            | Self::SkillTransportFailed { .. } => ErrorCategory::TurnExecution,
        }
    }

    /// The offending parameter or resource identifier.
    pub fn param_name(&self) -> Option<&str> {
        match self {
            Self::MissingArgument { param } => Some(param),
            Self::ResourceNotFound { id } => Some(id),
            Self::RootDialogNotConfigured => Some("rootDialog"),
            _ => None,
        }
    }
}
