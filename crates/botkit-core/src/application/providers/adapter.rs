use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{
    application::{
        builders::{SharedMiddlewareBuilder, SharedOnTurnErrorBuilder},
        providers::Provider,
        services::{
            Component, ComponentRegistry, CoreBotAdapter, CoreBotAdapterOptions,
            ServiceCollection, decode_fields,
        },
    },
    domain::Configuration,
    error::BotResult,
};

/// `Microsoft.BotCoreAdapter`
///
/// ```json
/// {
///   "$kind": "Microsoft.BotCoreAdapter",
///   "middleware": [{ "$kind": "Microsoft.ShowTypingMiddleware" }],
///   "onTurnError": { "$kind": "Microsoft.OnTurnErrorProvider", "logError": true }
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct BotCoreAdapterProvider {
    /// Middleware in execution order, first outermost.
    pub middleware: Vec<SharedMiddlewareBuilder>,
    pub on_turn_error: Option<SharedOnTurnErrorBuilder>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Fields {
    #[serde(default)]
    middleware: Vec<Value>,
    #[serde(default)]
    on_turn_error: Option<Value>,
}

impl BotCoreAdapterProvider {
    pub const KIND: &'static str = "Microsoft.BotCoreAdapter";

    pub fn decode(value: &Value, registry: &ComponentRegistry) -> BotResult<Component> {
        let fields: Fields = decode_fields(Self::KIND, value)?;
        let middleware = fields
            .middleware
            .iter()
            .map(|m| registry.decode_middleware(m))
            .collect::<BotResult<Vec<_>>>()?;
        let on_turn_error = fields
            .on_turn_error
            .filter(|v| !v.is_null())
            .map(|v| registry.decode_on_turn_error(&v))
            .transpose()?;
        Ok(Component::Adapter(Arc::new(Self {
            middleware,
            on_turn_error,
        })))
    }
}

impl Provider for BotCoreAdapterProvider {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn configure_services(
        &self,
        services: &mut ServiceCollection,
        configuration: &Configuration,
    ) -> BotResult<()> {
        debug!(middleware = self.middleware.len(), "Registering bot adapter");
        let options = CoreBotAdapterOptions {
            middleware: self.middleware.clone(),
            on_turn_error: self.on_turn_error.clone(),
        };
        services.add_adapter_options(move |_| Ok(options.clone()));

        let configuration = configuration.clone();
        services.add_adapter(move |sp| {
            let options = sp.adapter_options()?;
            Ok(Arc::new(CoreBotAdapter::new(sp, &configuration, &options)?))
        });
        Ok(())
    }
}
