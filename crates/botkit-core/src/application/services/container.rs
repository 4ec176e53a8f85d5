//! Typed service container.
//!
//! Providers register factories into a [`ServiceCollection`]; `build()`
//! turns it into a [`ServiceProvider`] that creates each service on first
//! request and hands out the same instance afterwards. Factories may
//! resolve other services, so registration order does not constrain them.

use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::{
    application::{
        ApplicationError,
        ports::{ResourceCatalog, SkillTransport, Storage, TelemetryClient, TranscriptLogger},
        providers::{ChannelSettings, Credentials},
        services::{ComponentRegistry, CoreBotAdapter, CoreBotAdapterOptions, CoreBotOptions},
        skills::{AuthenticationConfiguration, SkillClient, SkillConversationIdFactory, SkillHandler},
        state::BotState,
        turn::Bot,
    },
    error::BotResult,
};

type Factory<T> = Arc<dyn Fn(&ServiceProvider) -> BotResult<T> + Send + Sync>;

/// A lazily created singleton.
struct Slot<T> {
    factory: Option<Factory<T>>,
    value: OnceLock<T>,
}

impl<T: Clone> Slot<T> {
    fn new(factory: Option<Factory<T>>) -> Self {
        Self {
            factory,
            value: OnceLock::new(),
        }
    }

    fn resolve(&self, services: &ServiceProvider, kind: ServiceKind) -> BotResult<T> {
        if let Some(value) = self.value.get() {
            return Ok(value.clone());
        }
        let factory = self
            .factory
            .as_ref()
            .ok_or(ApplicationError::ServiceNotRegistered {
                service: kind.name(),
            })?;
        let value = factory(services)?;
        debug!(service = kind.name(), "Service created");
        Ok(self.value.get_or_init(|| value).clone())
    }
}

macro_rules! service_slots {
    ($( $(#[$doc:meta])* $slot:ident, $add:ident, $variant:ident: $ty:ty; )+) => {
        /// Every service the container can hold.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ServiceKind {
            $( $(#[$doc])* $variant, )+
        }

        impl ServiceKind {
            pub const ALL: &'static [ServiceKind] = &[$( ServiceKind::$variant, )+];

            pub fn name(&self) -> &'static str {
                match self {
                    $( Self::$variant => stringify!($variant), )+
                }
            }
        }

        impl std::fmt::Display for ServiceKind {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }

        #[derive(Default)]
        struct Factories {
            $( $slot: Option<Factory<$ty>>, )+
        }

        impl ServiceCollection {
            $(
                $(#[$doc])*
                ///
                /// Registering again replaces the earlier factory.
                pub fn $add<F>(&mut self, factory: F) -> &mut Self
                where
                    F: Fn(&ServiceProvider) -> BotResult<$ty> + Send + Sync + 'static,
                {
                    debug!(service = ServiceKind::$variant.name(), "Service registered");
                    self.factories.$slot = Some(Arc::new(factory));
                    self.registrations.push(ServiceKind::$variant);
                    self
                }
            )+
        }

        /// Resolves registered services, creating each once.
        pub struct ServiceProvider {
            $( $slot: Slot<$ty>, )+
            registrations: Vec<ServiceKind>,
        }

        impl ServiceProvider {
            fn new(factories: Factories, registrations: Vec<ServiceKind>) -> Self {
                Self {
                    $( $slot: Slot::new(factories.$slot), )+
                    registrations,
                }
            }

            $(
                $(#[$doc])*
                pub fn $slot(&self) -> BotResult<$ty> {
                    self.$slot.resolve(self, ServiceKind::$variant)
                }
            )+

            pub fn is_registered(&self, kind: ServiceKind) -> bool {
                match kind {
                    $( ServiceKind::$variant => self.$slot.factory.is_some(), )+
                }
            }
        }
    };
}

/// Service registrations, before the container is built.
#[derive(Default)]
pub struct ServiceCollection {
    factories: Factories,
    registrations: Vec<ServiceKind>,
    composed: bool,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every registration so far, in order (repeats included).
    pub fn registrations(&self) -> &[ServiceKind] {
        &self.registrations
    }

    pub fn is_registered(&self, kind: ServiceKind) -> bool {
        self.registrations.contains(&kind)
    }

    /// `true` once bot services were composed into this collection.
    pub fn is_composed(&self) -> bool {
        self.composed
    }

    pub(crate) fn mark_composed(&mut self) {
        self.composed = true;
    }

    pub fn build(self) -> ServiceProvider {
        debug!(registrations = self.registrations.len(), "Building service provider");
        ServiceProvider::new(self.factories, self.registrations)
    }
}

service_slots! {
    /// Where declarative resources are read from.
    catalog, add_catalog, Catalog: Arc<dyn ResourceCatalog>;
    /// `$kind` decoders.
    registry, add_registry, Registry: Arc<ComponentRegistry>;
    storage, add_storage, Storage: Arc<dyn Storage>;
    conversation_state, add_conversation_state, ConversationState: BotState;
    user_state, add_user_state, UserState: BotState;
    credentials, add_credentials, Credentials: Credentials;
    channel, add_channel, Channel: ChannelSettings;
    telemetry, add_telemetry, Telemetry: Arc<dyn TelemetryClient>;
    transcript_logger, add_transcript_logger, TranscriptLogger: Arc<dyn TranscriptLogger>;
    /// Which skills may call this bot.
    authentication, add_authentication, Authentication: AuthenticationConfiguration;
    skill_conversation_id_factory, add_skill_conversation_id_factory, SkillConversationIdFactory: Arc<SkillConversationIdFactory>;
    /// Outbound skill delivery; supplied by the host.
    skill_transport, add_skill_transport, SkillTransport: Arc<dyn SkillTransport>;
    skill_client, add_skill_client, SkillClient: Arc<SkillClient>;
    skill_handler, add_skill_handler, SkillHandler: Arc<SkillHandler>;
    adapter_options, add_adapter_options, AdapterOptions: CoreBotAdapterOptions;
    adapter, add_adapter, Adapter: Arc<CoreBotAdapter>;
    bot_options, add_bot_options, BotOptions: CoreBotOptions;
    bot, add_bot, Bot: Arc<dyn Bot>;
}

impl ServiceProvider {
    /// Registrations the provider was built from, in order.
    pub fn registrations(&self) -> &[ServiceKind] {
        &self.registrations
    }
}

// ── tests ───────────────────────────────────────────────────────────────────
