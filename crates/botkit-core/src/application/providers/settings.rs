//! Channel, credential and telemetry providers.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};

use crate::{
    application::{
        ports::{TelemetryClient, TelemetryProperties},
        providers::Provider,
        services::{Component, ComponentRegistry, ServiceCollection, decode_fields},
    },
    domain::{BoolExpression, Configuration, StringExpression},
    error::{BotError, BotResult},
};

/// Properties that identify a person; dropped unless explicitly allowed.
const PERSONAL_PROPERTIES: [&str; 3] = ["fromId", "fromName", "text"];

/// Where the channel service lives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSettings {
    pub channel_service: Option<String>,
    pub open_id_metadata: Option<String>,
}

/// The bot's app registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub app_id: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    /// No app id configured; the bot accepts unauthenticated callers.
    pub fn is_anonymous(&self) -> bool {
        !self
            .app_id
            .as_deref()
            .is_some_and(Configuration::is_configured)
    }
}

fn evaluate_setting(
    expression: Option<&StringExpression>,
    configuration: &Configuration,
) -> BotResult<Option<String>> {
    match expression {
        Some(expression) => Ok(expression
            .evaluate_optional(configuration)?
            .filter(|v| Configuration::is_configured(v))),
        None => Ok(None),
    }
}

/// `Microsoft.DeclarativeChannel`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeclarativeChannelProvider {
    pub channel_service: Option<StringExpression>,
    pub open_id_metadata: Option<StringExpression>,
}

impl DeclarativeChannelProvider {
    pub const KIND: &'static str = "Microsoft.DeclarativeChannel";

    pub fn decode(value: &Value, _registry: &ComponentRegistry) -> BotResult<Component> {
        let provider: Self = decode_fields(Self::KIND, value)?;
        Ok(Component::Channel(Arc::new(provider)))
    }
}

impl Provider for DeclarativeChannelProvider {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn configure_services(
        &self,
        services: &mut ServiceCollection,
        configuration: &Configuration,
    ) -> BotResult<()> {
        let settings = ChannelSettings {
            channel_service: evaluate_setting(self.channel_service.as_ref(), configuration)?,
            open_id_metadata: evaluate_setting(self.open_id_metadata.as_ref(), configuration)?,
        };
        services.add_channel(move |_| Ok(settings.clone()));
        Ok(())
    }
}

/// `Microsoft.DeclarativeCredentials`
///
/// ```json
/// {
///   "$kind": "Microsoft.DeclarativeCredentials",
///   "microsoftAppId": "=MicrosoftAppId",
///   "microsoftAppPassword": "=MicrosoftAppPassword"
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeclarativeCredentialsProvider {
    pub microsoft_app_id: Option<StringExpression>,
    pub microsoft_app_password: Option<StringExpression>,
}

impl DeclarativeCredentialsProvider {
    pub const KIND: &'static str = "Microsoft.DeclarativeCredentials";

    pub fn decode(value: &Value, _registry: &ComponentRegistry) -> BotResult<Component> {
        let provider: Self = decode_fields(Self::KIND, value)?;
        Ok(Component::Credentials(Arc::new(provider)))
    }
}

impl Provider for DeclarativeCredentialsProvider {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn configure_services(
        &self,
        services: &mut ServiceCollection,
        configuration: &Configuration,
    ) -> BotResult<()> {
        let credentials = Credentials {
            app_id: evaluate_setting(self.microsoft_app_id.as_ref(), configuration)?,
            password: evaluate_setting(self.microsoft_app_password.as_ref(), configuration)?,
        };
        services.add_credentials(move |_| Ok(credentials.clone()));
        Ok(())
    }
}

/// Telemetry client that emits `tracing` events under the
/// `botkit::telemetry` target.
#[derive(Debug, Clone)]
pub struct TracingTelemetryClient {
    log_activities: bool,
    log_personal_information: bool,
}

impl TracingTelemetryClient {
    pub fn new(log_activities: bool, log_personal_information: bool) -> Self {
        Self {
            log_activities,
            log_personal_information,
        }
    }

    fn redact(&self, properties: &TelemetryProperties) -> TelemetryProperties {
        let mut properties = properties.clone();
        if !self.log_personal_information {
            for key in PERSONAL_PROPERTIES {
                properties.remove(key);
            }
        }
        properties
    }
}

impl Default for TracingTelemetryClient {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl TelemetryClient for TracingTelemetryClient {
    fn track_event(&self, name: &str, properties: &TelemetryProperties) {
        if !self.log_activities {
            return;
        }
        let properties = self.redact(properties);
        info!(target: "botkit::telemetry", event = name, properties = ?properties);
    }

    fn track_exception(&self, err: &BotError, properties: &TelemetryProperties) {
        let properties = self.redact(properties);
        error!(target: "botkit::telemetry", error = %err, properties = ?properties);
    }
}

/// `Microsoft.TracingTelemetry`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TracingTelemetryProvider {
    /// Defaults to `true`.
    pub log_activities: Option<BoolExpression>,
    /// Defaults to `false`.
    pub log_personal_information: Option<BoolExpression>,
}

impl TracingTelemetryProvider {
    pub const KIND: &'static str = "Microsoft.TracingTelemetry";

    pub fn decode(value: &Value, _registry: &ComponentRegistry) -> BotResult<Component> {
        let provider: Self = decode_fields(Self::KIND, value)?;
        Ok(Component::Telemetry(Arc::new(provider)))
    }
}

impl Provider for TracingTelemetryProvider {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn configure_services(
        &self,
        services: &mut ServiceCollection,
        configuration: &Configuration,
    ) -> BotResult<()> {
        let log_activities = match &self.log_activities {
            Some(flag) => flag.evaluate(configuration)?,
            None => true,
        };
        let log_personal_information = match &self.log_personal_information {
            Some(flag) => flag.evaluate(configuration)?,
            None => false,
        };
        let client = Arc::new(TracingTelemetryClient::new(
            log_activities,
            log_personal_information,
        ));
        services.add_telemetry(move |_| Ok(client.clone() as Arc<dyn TelemetryClient>));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn credentials_evaluate_against_configuration() {
        let provider: DeclarativeCredentialsProvider = serde_json::from_value(json!({
            "microsoftAppId": "=MicrosoftAppId",
            "microsoftAppPassword": "=MicrosoftAppPassword"
        }))
        .unwrap();
        let configuration = Configuration::new(json!({
            "MicrosoftAppId": "app-1",
            "MicrosoftAppPassword": "<password>"
        }));

        let mut services = ServiceCollection::new();
        provider.configure_services(&mut services, &configuration).unwrap();
        let credentials = services.build().credentials().unwrap();

        assert_eq!(credentials.app_id.as_deref(), Some("app-1"));
        // Unfilled placeholders count as absent.
        assert_eq!(credentials.password, None);
        assert!(!credentials.is_anonymous());
    }

    #[test]
    fn missing_app_id_is_anonymous() {
        assert!(Credentials::default().is_anonymous());
    }

    #[test]
    fn channel_settings_are_registered() {
        let provider: DeclarativeChannelProvider =
            serde_json::from_value(json!({ "channelService": "https://botframework.azure.us" }))
                .unwrap();
        let mut services = ServiceCollection::new();
        provider
            .configure_services(&mut services, &Configuration::empty())
            .unwrap();
        let channel = services.build().channel().unwrap();
        assert_eq!(
            channel.channel_service.as_deref(),
            Some("https://botframework.azure.us")
        );
        assert_eq!(channel.open_id_metadata, None);
    }
}
