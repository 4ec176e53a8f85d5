use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::{
    application::{
        builders::SharedTranscriptLoggerBuilder,
        providers::{Credentials, Provider},
        services::{
            Component, ComponentCategory, ComponentRegistry, CoreBot, CoreBotOptions,
            ServiceCollection, ServiceKind, decode_fields,
        },
        skills::{AuthenticationConfiguration, SkillClient, SkillConversationIdFactory, SkillHandler},
        state::BotState,
        turn::Bot,
    },
    domain::{BoolExpression, Configuration, StringExpression},
    error::BotResult,
};

/// The root provider, declared in `runtime.json`.
///
/// ```json
/// {
///   "$kind": "Microsoft.RuntimeConfiguration",
///   "adapters": [{ "$kind": "Microsoft.BotCoreAdapter" }],
///   "storage": { "$kind": "Microsoft.MemoryStorage" },
///   "rootDialog": "=defaultRootDialog",
///   "removeRecipientMention": true
/// }
/// ```
///
/// Every member is optional; absent members are skipped. A bot still needs
/// storage to run, which surfaces when the bot is first resolved.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfigurationProvider {
    /// `null` entries are allowed and skipped.
    pub adapters: Vec<Option<Arc<dyn Provider>>>,
    pub channel: Option<Arc<dyn Provider>>,
    pub credentials: Option<Arc<dyn Provider>>,
    pub storage: Option<Arc<dyn Provider>>,
    pub telemetry: Option<Arc<dyn Provider>>,
    pub transcript_logger: Option<SharedTranscriptLoggerBuilder>,
    pub default_locale: Option<String>,
    pub root_dialog: Option<StringExpression>,
    pub remove_recipient_mention: Option<BoolExpression>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Fields {
    adapters: Vec<Value>,
    channel: Option<Value>,
    credentials: Option<Value>,
    storage: Option<Value>,
    telemetry: Option<Value>,
    transcript_logger: Option<Value>,
    default_locale: Option<String>,
    root_dialog: Option<StringExpression>,
    remove_recipient_mention: Option<BoolExpression>,
}

impl RuntimeConfigurationProvider {
    pub const KIND: &'static str = "Microsoft.RuntimeConfiguration";

    pub fn decode(value: &Value, registry: &ComponentRegistry) -> BotResult<Component> {
        let fields: Fields = decode_fields(Self::KIND, value)?;

        let member = |value: Option<Value>, category| {
            value
                .filter(|v| !v.is_null())
                .map(|v| registry.decode_provider(&v, category))
                .transpose()
        };

        let adapters = fields
            .adapters
            .iter()
            .map(|v| {
                if v.is_null() {
                    Ok(None)
                } else {
                    registry.decode_provider(v, ComponentCategory::Adapter).map(Some)
                }
            })
            .collect::<BotResult<Vec<_>>>()?;

        Ok(Component::Runtime(Arc::new(Self {
            adapters,
            channel: member(fields.channel, ComponentCategory::Channel)?,
            credentials: member(fields.credentials, ComponentCategory::Credentials)?,
            storage: member(fields.storage, ComponentCategory::Storage)?,
            telemetry: member(fields.telemetry, ComponentCategory::Telemetry)?,
            transcript_logger: fields
                .transcript_logger
                .filter(|v| !v.is_null())
                .map(|v| registry.decode_transcript_logger(&v))
                .transpose()?,
            default_locale: fields.default_locale,
            root_dialog: fields.root_dialog,
            remove_recipient_mention: fields.remove_recipient_mention,
        })))
    }

    /// Bot options from this provider's own fields, expressions evaluated.
    pub fn bot_options(&self, configuration: &Configuration) -> BotResult<CoreBotOptions> {
        let root_dialog = match &self.root_dialog {
            Some(expression) => expression.evaluate_optional(configuration)?,
            None => None,
        };
        let remove_recipient_mention = match &self.remove_recipient_mention {
            Some(flag) => flag.evaluate(configuration)?,
            None => false,
        };
        Ok(CoreBotOptions {
            default_locale: self.default_locale.clone(),
            root_dialog,
            remove_recipient_mention,
        })
    }

    fn configure_skills(services: &mut ServiceCollection) {
        services.add_skill_conversation_id_factory(|sp| {
            Ok(Arc::new(SkillConversationIdFactory::new(sp.storage()?)))
        });
        services.add_skill_client(|sp| {
            let transport = if sp.is_registered(ServiceKind::SkillTransport) {
                Some(sp.skill_transport()?)
            } else {
                None
            };
            let credentials = if sp.is_registered(ServiceKind::Credentials) {
                sp.credentials()?
            } else {
                Credentials::default()
            };
            Ok(Arc::new(SkillClient::new(
                transport,
                sp.skill_conversation_id_factory()?,
                credentials.app_id,
            )))
        });
        services.add_skill_handler(|sp| {
            Ok(Arc::new(SkillHandler::new(
                sp.adapter()?,
                sp.bot()?,
                sp.skill_conversation_id_factory()?,
            )))
        });
    }
}

impl Provider for RuntimeConfigurationProvider {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    #[instrument(skip_all, fields(adapters = self.adapters.len()))]
    fn configure_services(
        &self,
        services: &mut ServiceCollection,
        configuration: &Configuration,
    ) -> BotResult<()> {
        // 1. Adapters, in declared order
        for adapter in self.adapters.iter().flatten() {
            debug!(kind = adapter.kind(), "Configuring adapter");
            adapter.configure_services(services, configuration)?;
        }

        // 2-5. Channel, credentials, storage, telemetry
        for provider in [&self.channel, &self.credentials, &self.storage, &self.telemetry]
            .into_iter()
            .flatten()
        {
            debug!(kind = provider.kind(), "Configuring provider");
            provider.configure_services(services, configuration)?;
        }

        if let Some(builder) = &self.transcript_logger {
            let builder = builder.clone();
            let configuration = configuration.clone();
            services.add_transcript_logger(move |sp| builder.build(sp, &configuration));
        }

        // 6. Skills
        Self::configure_skills(services);

        // 7. State
        services.add_conversation_state(|sp| Ok(BotState::conversation(sp.storage()?)));
        services.add_user_state(|sp| Ok(BotState::user(sp.storage()?)));

        // 8. Authentication
        let authentication = AuthenticationConfiguration::from_configuration(configuration);
        services.add_authentication(move |_| Ok(authentication.clone()));

        // 9. Bot
        let options = self.bot_options(configuration)?;
        services.add_bot_options(move |_| Ok(options.clone()));
        let configuration = configuration.clone();
        services.add_bot(move |sp| {
            let bot: Arc<dyn Bot> = Arc::new(CoreBot::from_services(sp, &configuration)?);
            Ok(bot)
        });

        info!(
            registrations = services.registrations().len(),
            "Runtime services configured"
        );
        Ok(())
    }
}
