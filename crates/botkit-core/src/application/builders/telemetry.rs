use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::{
    application::{
        builders::Builder,
        middleware::{Middleware, TelemetryLoggerMiddleware},
        ports::TelemetryClient,
        providers::TracingTelemetryClient,
        services::{Component, ComponentRegistry, ServiceKind, ServiceProvider, decode_fields},
    },
    domain::{BoolExpression, Configuration},
    error::BotResult,
};

/// `Microsoft.TelemetryMiddleware`
///
/// Uses the registered telemetry client, or a tracing-backed one when the
/// runtime declares no telemetry provider.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelemetryMiddlewareBuilder {
    /// Defaults to `true`.
    pub log_activities: Option<BoolExpression>,
    /// Defaults to `false`.
    pub log_personal_information: Option<BoolExpression>,
}

impl TelemetryMiddlewareBuilder {
    pub const KIND: &'static str = "Microsoft.TelemetryMiddleware";

    pub fn decode(value: &Value, _registry: &ComponentRegistry) -> BotResult<Component> {
        let builder: Self = decode_fields(Self::KIND, value)?;
        Ok(Component::Middleware(Arc::new(builder)))
    }
}

impl Builder<Arc<dyn Middleware>> for TelemetryMiddlewareBuilder {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn build(
        &self,
        services: &ServiceProvider,
        configuration: &Configuration,
    ) -> BotResult<Arc<dyn Middleware>> {
        let log_activities = match &self.log_activities {
            Some(flag) => flag.evaluate(configuration)?,
            None => true,
        };
        let log_personal_information = match &self.log_personal_information {
            Some(flag) => flag.evaluate(configuration)?,
            None => false,
        };
        let client: Arc<dyn TelemetryClient> = if services.is_registered(ServiceKind::Telemetry) {
            services.telemetry()?
        } else {
            Arc::new(TracingTelemetryClient::default())
        };
        Ok(Arc::new(TelemetryLoggerMiddleware::new(
            client,
            log_activities,
            log_personal_information,
        )))
    }
}
