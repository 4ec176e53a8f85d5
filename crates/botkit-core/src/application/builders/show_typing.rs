use std::{sync::Arc, time::Duration};

use serde::Deserialize;
use serde_json::Value;

use crate::{
    application::{
        ApplicationError,
        builders::Builder,
        middleware::{Middleware, ShowTypingMiddleware},
        services::{Component, ComponentRegistry, ServiceProvider, decode_fields},
    },
    domain::{Configuration, IntExpression},
    error::BotResult,
};

/// `Microsoft.ShowTypingMiddleware`
///
/// ```json
/// { "$kind": "Microsoft.ShowTypingMiddleware", "delay": 500, "period": "=typing.period" }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShowTypingMiddlewareBuilder {
    /// Milliseconds before the first typing indicator.
    pub delay: Option<IntExpression>,
    /// Milliseconds between typing indicators.
    pub period: Option<IntExpression>,
}

impl ShowTypingMiddlewareBuilder {
    pub const KIND: &'static str = "Microsoft.ShowTypingMiddleware";

    pub fn decode(value: &Value, _registry: &ComponentRegistry) -> BotResult<Component> {
        let builder: Self = decode_fields(Self::KIND, value)?;
        Ok(Component::Middleware(Arc::new(builder)))
    }

    fn millis(
        expression: Option<&IntExpression>,
        field: &str,
        default: Duration,
        configuration: &Configuration,
    ) -> BotResult<Duration> {
        let Some(expression) = expression else {
            return Ok(default);
        };
        let millis = expression.evaluate(configuration)?;
        let millis = u64::try_from(millis).map_err(|_| ApplicationError::InvalidDeclaration {
            kind: Self::KIND.into(),
            reason: format!("'{field}' must not be negative, got {millis}"),
        })?;
        Ok(Duration::from_millis(millis))
    }
}

impl Builder<Arc<dyn Middleware>> for ShowTypingMiddlewareBuilder {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn build(
        &self,
        _services: &ServiceProvider,
        configuration: &Configuration,
    ) -> BotResult<Arc<dyn Middleware>> {
        let delay = Self::millis(
            self.delay.as_ref(),
            "delay",
            ShowTypingMiddleware::DEFAULT_DELAY,
            configuration,
        )?;
        let period = Self::millis(
            self.period.as_ref(),
            "period",
            ShowTypingMiddleware::DEFAULT_PERIOD,
            configuration,
        )?;
        if period.is_zero() {
            return Err(ApplicationError::InvalidDeclaration {
                kind: Self::KIND.into(),
                reason: "'period' must be greater than zero".into(),
            }
            .into());
        }
        Ok(Arc::new(ShowTypingMiddleware::new(delay, period)))
    }
}
