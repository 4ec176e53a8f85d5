//! The bot: root dialog driver plus state persistence.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::{
    application::{
        ApplicationError,
        dialog::DialogManager,
        ports::{ResourceCatalog, TelemetryClient},
        services::{ComponentRegistry, ServiceKind, ServiceProvider},
        skills::{SkillClient, SkillConversationIdFactory},
        state::BotState,
        turn::{Bot, TurnContext},
    },
    domain::Configuration,
    error::BotResult,
};

/// Configuration key naming the root dialog when `rootDialog` is not declared.
pub const DEFAULT_ROOT_DIALOG_KEY: &str = "defaultRootDialog";
pub const DEFAULT_LANGUAGE_KEY: &str = "defaultLanguage";
pub const FALLBACK_LOCALE: &str = "en-us";

/// Bot settings copied from the runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreBotOptions {
    pub default_locale: Option<String>,
    /// Resource id of the root dialog, already evaluated.
    pub root_dialog: Option<String>,
    pub remove_recipient_mention: bool,
}

/// Everything [`CoreBot::new`] needs, resolved once by the caller.
#[derive(Clone)]
pub struct CoreBotDependencies {
    pub catalog: Arc<dyn ResourceCatalog>,
    pub registry: Arc<ComponentRegistry>,
    pub conversation_state: BotState,
    pub user_state: BotState,
    pub skill_client: Option<Arc<SkillClient>>,
    pub conversation_id_factory: Option<Arc<SkillConversationIdFactory>>,
    pub telemetry: Option<Arc<dyn TelemetryClient>>,
}

impl CoreBotDependencies {
    /// Resolve dependencies from the container; skills and telemetry are
    /// optional.
    pub fn from_services(services: &ServiceProvider) -> BotResult<Self> {
        Ok(Self {
            catalog: services.catalog()?,
            registry: services.registry()?,
            conversation_state: services.conversation_state()?,
            user_state: services.user_state()?,
            skill_client: optional(services, ServiceKind::SkillClient, ServiceProvider::skill_client)?,
            conversation_id_factory: optional(
                services,
                ServiceKind::SkillConversationIdFactory,
                ServiceProvider::skill_conversation_id_factory,
            )?,
            telemetry: optional(services, ServiceKind::Telemetry, ServiceProvider::telemetry)?,
        })
    }
}

fn optional<T>(
    services: &ServiceProvider,
    kind: ServiceKind,
    resolve: fn(&ServiceProvider) -> BotResult<T>,
) -> BotResult<Option<T>> {
    if services.is_registered(kind) {
        resolve(services).map(Some)
    } else {
        Ok(None)
    }
}

/// Turn entry point: runs the root dialog, then saves state.
pub struct CoreBot {
    dialog_manager: DialogManager,
    conversation_state: BotState,
    user_state: BotState,
    remove_recipient_mention: bool,
}

impl CoreBot {
    /// Load and decode the root dialog.
    ///
    /// The root dialog is `options.root_dialog`, or the configured
    /// `defaultRootDialog`. Failing to find it is fatal.
    #[instrument(skip_all)]
    pub fn new(
        dependencies: CoreBotDependencies,
        options: &CoreBotOptions,
        configuration: &Configuration,
    ) -> BotResult<Self> {
        let root_dialog = options
            .root_dialog
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| {
                configuration
                    .get_str(DEFAULT_ROOT_DIALOG_KEY)
                    .filter(|id| Configuration::is_configured(id))
                    .map(str::to_owned)
            })
            .ok_or(ApplicationError::RootDialogNotConfigured)?;

        let resource = dependencies.catalog.get_resource(&root_dialog)?;
        let dialog = dependencies.registry.decode_dialog(&resource.json()?)?;

        let default_locale = options
            .default_locale
            .clone()
            .or_else(|| configuration.get_str(DEFAULT_LANGUAGE_KEY).map(str::to_owned))
            .unwrap_or_else(|| FALLBACK_LOCALE.to_owned());

        info!(root_dialog = %root_dialog, dialog = dialog.id(), locale = %default_locale, "Bot ready");

        let dialog_manager = DialogManager::new(
            dialog,
            dependencies.conversation_state.clone(),
            dependencies.user_state.clone(),
            default_locale,
        )
        .with_skills(dependencies.skill_client, dependencies.conversation_id_factory)
        .with_telemetry(dependencies.telemetry);

        Ok(Self {
            dialog_manager,
            conversation_state: dependencies.conversation_state,
            user_state: dependencies.user_state,
            remove_recipient_mention: options.remove_recipient_mention,
        })
    }

    /// Build from registered services and bot options.
    pub fn from_services(services: &ServiceProvider, configuration: &Configuration) -> BotResult<Self> {
        let options = if services.is_registered(ServiceKind::BotOptions) {
            services.bot_options()?
        } else {
            CoreBotOptions::default()
        };
        Self::new(CoreBotDependencies::from_services(services)?, &options, configuration)
    }

    pub fn dialog_manager(&self) -> &DialogManager {
        &self.dialog_manager
    }
}

#[async_trait]
impl Bot for CoreBot {
    /// Conversation state is saved before user state on every turn, also
    /// when the dialog failed; the dialog's error is returned afterwards.
    #[instrument(skip_all, fields(conversation = %ctx.activity().conversation.id))]
    async fn on_turn(&self, ctx: &mut TurnContext) -> BotResult<()> {
        let skill_call = ctx.is_skill_call();
        ctx.turn_state_mut().auto_end_root_dialog = skill_call;

        if self.remove_recipient_mention && ctx.activity().is_message() {
            let text = ctx.activity_mut().remove_recipient_mention();
            debug!(text = %text, "Recipient mention removed");
        }

        let result = self.dialog_manager.on_turn(ctx).await;

        self.conversation_state.save_changes(ctx, false).await?;
        self.user_state.save_changes(ctx, false).await?;

        result.map(|_| ())
    }
}

// ── tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{
        dialog::{
            Dialog, DialogContext, DialogTurnResult,
            tests::{AskDialog, inbound},
        },
        ports::{MockStorage, Storage},
        services::{Component, ComponentCategory},
    };
    use crate::domain::{ChannelAccount, ClaimsIdentity, Entity, Resource, claims};
    use mockall::Sequence;
    use serde_json::{Value, json};
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    struct Catalog(BTreeMap<String, String>);

    impl ResourceCatalog for Catalog {
        fn get_resource(&self, id: &str) -> BotResult<Resource> {
            self.0
                .get(id)
                .map(|content| Resource::new(id, content.clone()))
                .ok_or_else(|| ApplicationError::ResourceNotFound { id: id.into() }.into())
        }

        fn contains(&self, id: &str) -> bool {
            self.0.contains_key(id)
        }

        fn resource_ids(&self) -> Vec<String> {
            self.0.keys().cloned().collect()
        }
    }

    /// Records what it saw, writes to both states, then optionally fails.
    struct ProbeDialog {
        seen: Arc<Mutex<Vec<(String, bool)>>>,
        fail: bool,
    }

    #[async_trait]
    impl Dialog for ProbeDialog {
        fn id(&self) -> &str {
            "probe"
        }

        async fn begin_dialog(
            &self,
            dc: &mut DialogContext<'_>,
            _options: Option<Value>,
        ) -> BotResult<DialogTurnResult> {
            self.seen.lock().unwrap().push((
                dc.turn.activity().text().to_owned(),
                dc.turn.turn_state().auto_end_root_dialog,
            ));
            dc.conversation_state.set_property(dc.turn, "turns", &1).await?;
            dc.user_state.set_property(dc.turn, "seen", &true).await?;
            if self.fail {
                return Err(ApplicationError::DialogFailed {
                    dialog: "probe".into(),
                    reason: "boom".into(),
                }
                .into());
            }
            Ok(DialogTurnResult::complete(None))
        }

        async fn continue_dialog(&self, dc: &mut DialogContext<'_>) -> BotResult<DialogTurnResult> {
            self.begin_dialog(dc, None).await
        }
    }

    fn decode_ask(_: &Value, _: &ComponentRegistry) -> BotResult<Component> {
        Ok(Component::Dialog(Arc::new(AskDialog)))
    }

    fn registry() -> Arc<ComponentRegistry> {
        let mut registry = ComponentRegistry::with_core_components();
        registry.register("Test.Ask", ComponentCategory::Dialog, decode_ask);
        Arc::new(registry)
    }

    fn dependencies(storage: Arc<dyn Storage>) -> CoreBotDependencies {
        CoreBotDependencies {
            catalog: Arc::new(Catalog(BTreeMap::from([(
                "root.dialog".to_string(),
                json!({ "$kind": "Test.Ask" }).to_string(),
            )]))),
            registry: registry(),
            conversation_state: BotState::conversation(storage.clone()),
            user_state: BotState::user(storage),
            skill_client: None,
            conversation_id_factory: None,
            telemetry: None,
        }
    }

    fn probe_bot(storage: MockStorage, fail: bool) -> (CoreBot, Arc<Mutex<Vec<(String, bool)>>>) {
        let storage: Arc<dyn Storage> = Arc::new(storage);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bot = CoreBot::new(
            dependencies(storage.clone()),
            &CoreBotOptions {
                root_dialog: Some("root.dialog".into()),
                remove_recipient_mention: true,
                ..CoreBotOptions::default()
            },
            &Configuration::empty(),
        )
        .unwrap();
        bot.dialog_manager = DialogManager::new(
            Arc::new(ProbeDialog {
                seen: seen.clone(),
                fail,
            }),
            BotState::conversation(storage.clone()),
            BotState::user(storage),
            "en-us",
        );
        (bot, seen)
    }

    fn ordered_storage() -> MockStorage {
        let mut storage = MockStorage::new();
        let mut seq = Sequence::new();
        storage.expect_read().returning(|_| Ok(HashMap::new()));
        storage
            .expect_write()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|changes| {
                assert!(changes.contains_key("test/conversations/conv"));
                Ok(HashMap::new())
            });
        storage
            .expect_write()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|changes| {
                assert!(changes.contains_key("test/users/user"));
                Ok(HashMap::new())
            });
        storage
    }

    #[test]
    fn missing_root_dialog_is_not_configured() {
        let err = CoreBot::new(
            dependencies(Arc::new(MockStorage::new())),
            &CoreBotOptions::default(),
            &Configuration::empty(),
        )
        .err()
        .unwrap();
        assert_eq!(err.param_name(), Some("rootDialog"));
    }

    #[test]
    fn unknown_root_dialog_names_the_resource() {
        let err = CoreBot::new(
            dependencies(Arc::new(MockStorage::new())),
            &CoreBotOptions {
                root_dialog: Some("missing.dialog".into()),
                ..CoreBotOptions::default()
            },
            &Configuration::empty(),
        )
        .err()
        .unwrap();
        assert!(err.to_string().starts_with("Could not find resource 'missing.dialog'"));
        assert_eq!(err.param_name(), Some("missing.dialog"));
    }

    #[test]
    fn default_root_dialog_comes_from_configuration() {
        let bot = CoreBot::new(
            dependencies(Arc::new(MockStorage::new())),
            &CoreBotOptions::default(),
            &Configuration::new(json!({ "defaultRootDialog": "root.dialog", "defaultLanguage": "de-de" })),
        )
        .unwrap();
        assert_eq!(bot.dialog_manager().root_dialog_id(), "ask");
        assert_eq!(bot.dialog_manager().default_locale(), "de-de");
    }

    #[tokio::test]
    async fn saves_conversation_then_user_state() {
        let (bot, _) = probe_bot(ordered_storage(), false);
        let mut ctx = TurnContext::new(inbound("hi"), None, CancellationToken::new());
        bot.on_turn(&mut ctx).await.unwrap();
    }

    #[tokio::test]
    async fn saves_state_even_when_dialog_fails() {
        let (bot, _) = probe_bot(ordered_storage(), true);
        let mut ctx = TurnContext::new(inbound("hi"), None, CancellationToken::new());
        let err = bot.on_turn(&mut ctx).await.err().unwrap();
        assert_eq!(err.to_string(), "Dialog 'probe' failed: boom");
    }

    #[tokio::test]
    async fn mentions_are_stripped_before_the_dialog_runs() {
        let (bot, seen) = probe_bot(ordered_storage(), false);
        let mut activity = inbound("@Bot Hi Bot");
        activity
            .entities
            .push(Entity::mention(ChannelAccount::new("bot", "Bot"), "@Bot"));
        let mut ctx = TurnContext::new(activity, None, CancellationToken::new());
        bot.on_turn(&mut ctx).await.unwrap();
        assert_eq!(seen.lock().unwrap()[0], ("Hi Bot".to_string(), false));
    }

    #[tokio::test]
    async fn skill_turns_auto_end_the_root_dialog() {
        let (bot, seen) = probe_bot(ordered_storage(), false);
        let identity = ClaimsIdentity::from_pairs([
            (claims::VERSION_CLAIM, "1.0"),
            (claims::AUDIENCE_CLAIM, "bot"),
            (claims::APP_ID_CLAIM, "parent"),
        ]);
        let mut ctx = TurnContext::new(inbound("hi"), Some(identity), CancellationToken::new());
        bot.on_turn(&mut ctx).await.unwrap();
        assert!(seen.lock().unwrap()[0].1);
    }
}
