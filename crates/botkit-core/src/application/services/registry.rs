//! `$kind` → component decoding.
//!
//! Declarative nodes are JSON objects tagged with a `$kind` string. A
//! [`ComponentRegistry`] maps each kind to a decode function producing a
//! [`Component`]. Hosts build one registry at startup, register the kinds
//! they need and pass it to composition explicitly.

use std::{collections::BTreeMap, fmt, sync::Arc};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::{
    application::{
        ApplicationError,
        builders::{
            OnTurnErrorBuilder, RemoveRecipientMiddlewareBuilder, SharedMiddlewareBuilder,
            SharedOnTurnErrorBuilder, SharedTranscriptLoggerBuilder, ShowTypingMiddlewareBuilder,
            TelemetryMiddlewareBuilder, TranscriptLoggerMiddlewareBuilder,
        },
        dialog::Dialog,
        providers::{
            BotCoreAdapterProvider, DeclarativeChannelProvider, DeclarativeCredentialsProvider,
            Provider, RuntimeConfigurationProvider, TracingTelemetryProvider,
        },
    },
    error::BotResult,
};

/// Property holding a declarative node's kind.
pub const KIND_PROPERTY: &str = "$kind";

/// A decoded declarative node.
#[derive(Clone)]
pub enum Component {
    Runtime(Arc<RuntimeConfigurationProvider>),
    Adapter(Arc<dyn Provider>),
    Channel(Arc<dyn Provider>),
    Credentials(Arc<dyn Provider>),
    Storage(Arc<dyn Provider>),
    Telemetry(Arc<dyn Provider>),
    /// Usable nested in middleware and as the runtime's transcript logger.
    TranscriptLogger(SharedTranscriptLoggerBuilder),
    Middleware(SharedMiddlewareBuilder),
    OnTurnError(SharedOnTurnErrorBuilder),
    Dialog(Arc<dyn Dialog>),
}

impl Component {
    pub fn category(&self) -> ComponentCategory {
        match self {
            Self::Runtime(_) => ComponentCategory::Runtime,
            Self::Adapter(_) => ComponentCategory::Adapter,
            Self::Channel(_) => ComponentCategory::Channel,
            Self::Credentials(_) => ComponentCategory::Credentials,
            Self::Storage(_) => ComponentCategory::Storage,
            Self::Telemetry(_) => ComponentCategory::Telemetry,
            Self::TranscriptLogger(_) => ComponentCategory::TranscriptLogger,
            Self::Middleware(_) => ComponentCategory::Middleware,
            Self::OnTurnError(_) => ComponentCategory::OnTurnError,
            Self::Dialog(_) => ComponentCategory::Dialog,
        }
    }
}

/// What a kind decodes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentCategory {
    Runtime,
    Adapter,
    Channel,
    Credentials,
    Storage,
    Telemetry,
    TranscriptLogger,
    Middleware,
    OnTurnError,
    Dialog,
}

impl ComponentCategory {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Runtime => "runtime configuration",
            Self::Adapter => "adapter provider",
            Self::Channel => "channel provider",
            Self::Credentials => "credentials provider",
            Self::Storage => "storage provider",
            Self::Telemetry => "telemetry provider",
            Self::TranscriptLogger => "transcript logger",
            Self::Middleware => "middleware",
            Self::OnTurnError => "turn error handler",
            Self::Dialog => "dialog",
        }
    }
}

impl fmt::Display for ComponentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub type DecodeFn = fn(&Value, &ComponentRegistry) -> BotResult<Component>;

#[derive(Clone, Copy)]
struct Registration {
    category: ComponentCategory,
    decode: DecodeFn,
}

/// Maps `$kind` strings to decoders.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    kinds: BTreeMap<String, Registration>,
}

impl ComponentRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry knowing the kinds implemented in this crate.
    pub fn with_core_components() -> Self {
        let mut registry = Self::new();
        registry
            .register(
                RuntimeConfigurationProvider::KIND,
                ComponentCategory::Runtime,
                RuntimeConfigurationProvider::decode,
            )
            .register(
                BotCoreAdapterProvider::KIND,
                ComponentCategory::Adapter,
                BotCoreAdapterProvider::decode,
            )
            .register(
                DeclarativeChannelProvider::KIND,
                ComponentCategory::Channel,
                DeclarativeChannelProvider::decode,
            )
            .register(
                DeclarativeCredentialsProvider::KIND,
                ComponentCategory::Credentials,
                DeclarativeCredentialsProvider::decode,
            )
            .register(
                TracingTelemetryProvider::KIND,
                ComponentCategory::Telemetry,
                TracingTelemetryProvider::decode,
            )
            .register(
                RemoveRecipientMiddlewareBuilder::KIND,
                ComponentCategory::Middleware,
                RemoveRecipientMiddlewareBuilder::decode,
            )
            .register(
                TranscriptLoggerMiddlewareBuilder::KIND,
                ComponentCategory::Middleware,
                TranscriptLoggerMiddlewareBuilder::decode,
            )
            .register(
                ShowTypingMiddlewareBuilder::KIND,
                ComponentCategory::Middleware,
                ShowTypingMiddlewareBuilder::decode,
            )
            .register(
                TelemetryMiddlewareBuilder::KIND,
                ComponentCategory::Middleware,
                TelemetryMiddlewareBuilder::decode,
            )
            .register(
                OnTurnErrorBuilder::KIND,
                ComponentCategory::OnTurnError,
                OnTurnErrorBuilder::decode,
            );
        registry
    }

    /// Register `kind`; a later registration of the same kind replaces it.
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        category: ComponentCategory,
        decode: DecodeFn,
    ) -> &mut Self {
        let kind = kind.into();
        debug!(kind = %kind, category = %category, "Component kind registered");
        self.kinds.insert(kind, Registration { category, decode });
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// Registered kinds with their category, sorted by kind.
    pub fn kinds(&self) -> impl Iterator<Item = (&str, ComponentCategory)> {
        self.kinds.iter().map(|(k, r)| (k.as_str(), r.category))
    }

    /// Decode any registered node.
    pub fn decode(&self, value: &Value) -> BotResult<Component> {
        let kind = kind_of(value)?;
        let registration = self
            .kinds
            .get(kind)
            .ok_or_else(|| ApplicationError::UnknownKind { kind: kind.into() })?;
        (registration.decode)(value, self)
    }

    fn decode_as(&self, value: &Value, expected: ComponentCategory) -> BotResult<Component> {
        let component = self.decode(value)?;
        let found = component.category();
        if found != expected {
            return Err(ApplicationError::UnexpectedComponent {
                kind: kind_of(value)?.into(),
                expected: expected.name(),
                found: found.name(),
            }
            .into());
        }
        Ok(component)
    }

    /// Decode a provider of the given category.
    pub fn decode_provider(
        &self,
        value: &Value,
        category: ComponentCategory,
    ) -> BotResult<Arc<dyn Provider>> {
        match self.decode_as(value, category)? {
            Component::Adapter(p)
            | Component::Channel(p)
            | Component::Credentials(p)
            | Component::Storage(p)
            | Component::Telemetry(p) => Ok(p),
            Component::Runtime(p) => Ok(p),
            other => Err(ApplicationError::UnexpectedComponent {
                kind: kind_of(value)?.into(),
                expected: "provider",
                found: other.category().name(),
            }
            .into()),
        }
    }

    pub fn decode_middleware(&self, value: &Value) -> BotResult<SharedMiddlewareBuilder> {
        match self.decode_as(value, ComponentCategory::Middleware)? {
            Component::Middleware(builder) => Ok(builder),
            other => Err(self.mismatch(value, ComponentCategory::Middleware, &other)),
        }
    }

    pub fn decode_on_turn_error(&self, value: &Value) -> BotResult<SharedOnTurnErrorBuilder> {
        match self.decode_as(value, ComponentCategory::OnTurnError)? {
            Component::OnTurnError(builder) => Ok(builder),
            other => Err(self.mismatch(value, ComponentCategory::OnTurnError, &other)),
        }
    }

    pub fn decode_transcript_logger(
        &self,
        value: &Value,
    ) -> BotResult<SharedTranscriptLoggerBuilder> {
        match self.decode_as(value, ComponentCategory::TranscriptLogger)? {
            Component::TranscriptLogger(builder) => Ok(builder),
            other => Err(self.mismatch(value, ComponentCategory::TranscriptLogger, &other)),
        }
    }

    pub fn decode_dialog(&self, value: &Value) -> BotResult<Arc<dyn Dialog>> {
        match self.decode_as(value, ComponentCategory::Dialog)? {
            Component::Dialog(dialog) => Ok(dialog),
            other => Err(self.mismatch(value, ComponentCategory::Dialog, &other)),
        }
    }

    /// Decode the root node of `runtime.json`.
    ///
    /// The root may omit `$kind`; it is then read as a runtime configuration.
    pub fn decode_runtime(&self, value: &Value) -> BotResult<Arc<RuntimeConfigurationProvider>> {
        if value.get(KIND_PROPERTY).is_none() {
            return match RuntimeConfigurationProvider::decode(value, self)? {
                Component::Runtime(runtime) => Ok(runtime),
                other => Err(self.mismatch(value, ComponentCategory::Runtime, &other)),
            };
        }
        match self.decode_as(value, ComponentCategory::Runtime)? {
            Component::Runtime(runtime) => Ok(runtime),
            other => Err(self.mismatch(value, ComponentCategory::Runtime, &other)),
        }
    }

    fn mismatch(
        &self,
        value: &Value,
        expected: ComponentCategory,
        found: &Component,
    ) -> crate::error::BotError {
        ApplicationError::UnexpectedComponent {
            kind: kind_of(value).unwrap_or(RuntimeConfigurationProvider::KIND).into(),
            expected: expected.name(),
            found: found.category().name(),
        }
        .into()
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.kinds.keys()).finish()
    }
}

fn kind_of(value: &Value) -> BotResult<&str> {
    value
        .get(KIND_PROPERTY)
        .and_then(Value::as_str)
        .ok_or_else(|| ApplicationError::MissingKind.into())
}

/// Deserialize the fields of a `kind` node, reporting serde failures as
/// invalid declarations.
pub fn decode_fields<T: DeserializeOwned>(kind: &str, value: &Value) -> BotResult<T> {
    serde_json::from_value(value.clone()).map_err(|e| {
        ApplicationError::InvalidDeclaration {
            kind: kind.into(),
            reason: e.to_string(),
        }
        .into()
    })
}

// ── tests ───────────────────────────────────────────────────────────────────
