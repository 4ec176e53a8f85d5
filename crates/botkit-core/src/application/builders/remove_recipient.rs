use std::sync::Arc;

use serde_json::Value;

use crate::{
    application::{
        builders::Builder,
        middleware::{Middleware, RemoveRecipientMentionMiddleware},
        services::{Component, ComponentRegistry, ServiceProvider},
    },
    domain::Configuration,
    error::BotResult,
};

/// `Microsoft.RemoveRecipientMiddleware`
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveRecipientMiddlewareBuilder;

impl RemoveRecipientMiddlewareBuilder {
    pub const KIND: &'static str = "Microsoft.RemoveRecipientMiddleware";

    pub fn decode(_value: &Value, _registry: &ComponentRegistry) -> BotResult<Component> {
        Ok(Component::Middleware(Arc::new(Self)))
    }
}

impl Builder<Arc<dyn Middleware>> for RemoveRecipientMiddlewareBuilder {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn build(
        &self,
        _services: &ServiceProvider,
        _configuration: &Configuration,
    ) -> BotResult<Arc<dyn Middleware>> {
        Ok(Arc::new(RemoveRecipientMentionMiddleware))
    }
}
