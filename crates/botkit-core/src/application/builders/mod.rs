//! Builder nodes: declarative values that produce one object.
//!
//! Unlike providers, builders do not register anything. The adapter calls
//! them while it is assembled and keeps what they return for its lifetime.

use std::{fmt, sync::Arc};

use crate::{
    application::{
        middleware::Middleware, ports::TranscriptLogger, services::ServiceProvider,
        services::TurnErrorHandler,
    },
    domain::Configuration,
    error::BotResult,
};

mod on_turn_error;
mod remove_recipient;
mod show_typing;
mod telemetry;
mod transcript;

pub use on_turn_error::{DeclarativeTurnErrorHandler, OnTurnErrorBuilder};
pub use remove_recipient::RemoveRecipientMiddlewareBuilder;
pub use show_typing::ShowTypingMiddlewareBuilder;
pub use telemetry::TelemetryMiddlewareBuilder;
pub use transcript::TranscriptLoggerMiddlewareBuilder;

/// A declarative node producing a `T` from the container and configuration.
///
/// Both inputs are plain references, so a builder can never be invoked
/// without them:
///
/// ```compile_fail
/// use botkit_core::prelude::*;
/// use botkit_core::application::builders::RemoveRecipientMiddlewareBuilder;
///
/// let builder = RemoveRecipientMiddlewareBuilder;
/// builder.build(None, &Configuration::empty());
/// ```
pub trait Builder<T>: Send + Sync + fmt::Debug {
    /// The `$kind` this builder was declared with.
    fn kind(&self) -> &'static str;

    fn build(&self, services: &ServiceProvider, configuration: &Configuration) -> BotResult<T>;
}

pub type SharedMiddlewareBuilder = Arc<dyn Builder<Arc<dyn Middleware>>>;
pub type SharedOnTurnErrorBuilder = Arc<dyn Builder<Arc<dyn TurnErrorHandler>>>;
pub type SharedTranscriptLoggerBuilder = Arc<dyn Builder<Arc<dyn TranscriptLogger>>>;
