use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::{
    application::{
        ApplicationError,
        builders::{Builder, SharedTranscriptLoggerBuilder},
        middleware::{Middleware, TranscriptLoggerMiddleware},
        services::{Component, ComponentRegistry, ServiceKind, ServiceProvider, decode_fields},
    },
    domain::Configuration,
    error::BotResult,
};

/// `Microsoft.TranscriptLoggerMiddleware`
///
/// ```json
/// {
///   "$kind": "Microsoft.TranscriptLoggerMiddleware",
///   "transcriptStore": { "$kind": "Microsoft.MemoryTranscriptStore" }
/// }
/// ```
///
/// Without a nested `transcriptStore` the container's transcript logger is
/// used.
#[derive(Debug, Clone, Default)]
pub struct TranscriptLoggerMiddlewareBuilder {
    pub transcript_store: Option<SharedTranscriptLoggerBuilder>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Fields {
    #[serde(default)]
    transcript_store: Option<Value>,
}

impl TranscriptLoggerMiddlewareBuilder {
    pub const KIND: &'static str = "Microsoft.TranscriptLoggerMiddleware";

    pub fn decode(value: &Value, registry: &ComponentRegistry) -> BotResult<Component> {
        let fields: Fields = decode_fields(Self::KIND, value)?;
        let transcript_store = fields
            .transcript_store
            .filter(|v| !v.is_null())
            .map(|v| registry.decode_transcript_logger(&v))
            .transpose()?;
        Ok(Component::Middleware(Arc::new(Self { transcript_store })))
    }
}

impl Builder<Arc<dyn Middleware>> for TranscriptLoggerMiddlewareBuilder {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn build(
        &self,
        services: &ServiceProvider,
        configuration: &Configuration,
    ) -> BotResult<Arc<dyn Middleware>> {
        let logger = match &self.transcript_store {
            Some(builder) => builder.build(services, configuration)?,
            None if services.is_registered(ServiceKind::TranscriptLogger) => {
                services.transcript_logger()?
            }
            None => {
                return Err(ApplicationError::MissingArgument {
                    param: "transcriptStore".into(),
                }
                .into());
            }
        };
        Ok(Arc::new(TranscriptLoggerMiddleware::new(logger)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::ServiceCollection;

    #[test]
    fn missing_store_names_the_field() {
        let services = ServiceCollection::new().build();
        let err = TranscriptLoggerMiddlewareBuilder::default()
            .build(&services, &Configuration::empty())
            .err()
            .unwrap();
        assert_eq!(err.param_name(), Some("transcriptStore"));
    }
}
