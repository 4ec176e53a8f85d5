//! Provider nodes: declarative values that register services.
//!
//! The root of a bot's declarative configuration is a
//! [`RuntimeConfigurationProvider`]; it aggregates the other providers and
//! registers them in a fixed order.

use std::fmt;

use crate::{application::services::ServiceCollection, domain::Configuration, error::BotResult};

mod adapter;
mod runtime;
mod settings;

pub use adapter::BotCoreAdapterProvider;
pub use runtime::RuntimeConfigurationProvider;
pub use settings::{
    ChannelSettings, Credentials, DeclarativeChannelProvider, DeclarativeCredentialsProvider,
    TracingTelemetryClient, TracingTelemetryProvider,
};

/// A declarative node that registers services into the container.
///
/// Registration is additive: a provider only adds factories and never
/// resolves anything itself. The collection and the configuration are
/// required references:
///
/// ```compile_fail
/// use botkit_core::prelude::*;
///
/// let provider = RuntimeConfigurationProvider::default();
/// provider.configure_services(None, &Configuration::empty());
/// ```
pub trait Provider: Send + Sync + fmt::Debug {
    /// The `$kind` this provider was declared with.
    fn kind(&self) -> &'static str;

    fn configure_services(
        &self,
        services: &mut ServiceCollection,
        configuration: &Configuration,
    ) -> BotResult<()>;
}
