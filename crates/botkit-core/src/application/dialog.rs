//! Dialog port and a thin dialog manager.
//!
//! Dialog execution itself is external: a [`Dialog`] is whatever the
//! registry decodes a `.dialog` resource into. The [`DialogManager`] only
//! decides whether to begin or continue the root dialog and keeps the
//! dialog stack in conversation state.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
    application::{
        ports::{TelemetryClient, TelemetryProperties},
        skills::{SkillClient, SkillConversationIdFactory},
        state::BotState,
        turn::TurnContext,
    },
    domain::Activity,
    error::BotResult,
};

/// Conversation state property holding the dialog stack.
pub const DIALOG_STATE_PROPERTY: &str = "DialogState";

/// `code` of the end-of-conversation sent when a skill's dialog completes.
pub const COMPLETED_SUCCESSFULLY: &str = "completedSuccessfully";

pub const DIALOG_TURN_EVENT: &str = "DialogTurn";

/// Outcome of running a dialog for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogTurnStatus {
    /// Nothing was running.
    Empty,
    /// The dialog expects more input.
    Waiting,
    Complete,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogTurnResult {
    pub status: DialogTurnStatus,
    pub result: Option<Value>,
}

impl DialogTurnResult {
    pub fn waiting() -> Self {
        Self {
            status: DialogTurnStatus::Waiting,
            result: None,
        }
    }

    pub fn complete(result: Option<Value>) -> Self {
        Self {
            status: DialogTurnStatus::Complete,
            result,
        }
    }
}

/// What a dialog sees during a turn.
pub struct DialogContext<'a> {
    pub turn: &'a mut TurnContext,
    pub conversation_state: &'a BotState,
    pub user_state: &'a BotState,
}

/// A dialog decoded from a declarative resource.
#[async_trait]
pub trait Dialog: Send + Sync {
    fn id(&self) -> &str;

    async fn begin_dialog(
        &self,
        dc: &mut DialogContext<'_>,
        options: Option<Value>,
    ) -> BotResult<DialogTurnResult>;

    /// Called on later turns while the dialog is waiting.
    async fn continue_dialog(&self, dc: &mut DialogContext<'_>) -> BotResult<DialogTurnResult>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DialogStack {
    #[serde(default)]
    dialog_stack: Vec<DialogInstance>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DialogInstance {
    id: String,
}

/// Drives the root dialog once per turn.
pub struct DialogManager {
    root: Arc<dyn Dialog>,
    conversation_state: BotState,
    user_state: BotState,
    default_locale: String,
    skill_client: Option<Arc<SkillClient>>,
    conversation_id_factory: Option<Arc<SkillConversationIdFactory>>,
    telemetry: Option<Arc<dyn TelemetryClient>>,
}

impl DialogManager {
    pub fn new(
        root: Arc<dyn Dialog>,
        conversation_state: BotState,
        user_state: BotState,
        default_locale: impl Into<String>,
    ) -> Self {
        Self {
            root,
            conversation_state,
            user_state,
            default_locale: default_locale.into(),
            skill_client: None,
            conversation_id_factory: None,
            telemetry: None,
        }
    }

    pub fn with_skills(
        mut self,
        skill_client: Option<Arc<SkillClient>>,
        conversation_id_factory: Option<Arc<SkillConversationIdFactory>>,
    ) -> Self {
        self.skill_client = skill_client;
        self.conversation_id_factory = conversation_id_factory;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Option<Arc<dyn TelemetryClient>>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn root_dialog_id(&self) -> &str {
        self.root.id()
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// Seed turn state, then begin or continue the root dialog.
    ///
    /// State is loaded but not saved; the caller owns persistence.
    #[instrument(skip_all, fields(dialog = self.root.id()))]
    pub async fn on_turn(&self, ctx: &mut TurnContext) -> BotResult<DialogTurnResult> {
        self.seed_turn_state(ctx);

        self.conversation_state.load(ctx, false).await?;
        self.user_state.load(ctx, false).await?;
        let mut stack: DialogStack = self
            .conversation_state
            .get_property(ctx, DIALOG_STATE_PROPERTY)
            .await?
            .unwrap_or_default();

        let auto_end = ctx.turn_state().auto_end_root_dialog;
        let mut result = {
            let mut dc = DialogContext {
                turn: &mut *ctx,
                conversation_state: &self.conversation_state,
                user_state: &self.user_state,
            };
            if stack.dialog_stack.is_empty() {
                self.root.begin_dialog(&mut dc, None).await?
            } else {
                self.root.continue_dialog(&mut dc).await?
            }
        };

        if auto_end && result.status == DialogTurnStatus::Waiting {
            debug!("Ending root dialog for skill caller");
            result = DialogTurnResult::complete(result.result);
        }

        stack.dialog_stack.clear();
        if result.status == DialogTurnStatus::Waiting {
            stack.dialog_stack.push(DialogInstance {
                id: self.root.id().to_owned(),
            });
        }
        self.conversation_state
            .set_property(ctx, DIALOG_STATE_PROPERTY, &stack)
            .await?;

        if result.status == DialogTurnStatus::Complete && ctx.is_skill_call() {
            let mut end = Activity::end_of_conversation(COMPLETED_SUCCESSFULLY, result.result.clone());
            end.locale = ctx.turn_state().locale.clone();
            ctx.send_activity(end)?;
        }

        if let Some(telemetry) = &self.telemetry {
            let properties = TelemetryProperties::from([
                ("dialogId".to_owned(), self.root.id().to_owned()),
                ("status".to_owned(), format!("{:?}", result.status)),
            ]);
            telemetry.track_event(DIALOG_TURN_EVENT, &properties);
        }

        debug!(status = ?result.status, "Dialog turn finished");
        Ok(result)
    }

    fn seed_turn_state(&self, ctx: &mut TurnContext) {
        let locale = ctx
            .activity()
            .locale
            .clone()
            .unwrap_or_else(|| self.default_locale.clone());
        let state = ctx.turn_state_mut();
        state.locale.get_or_insert(locale);
        if state.skill_client.is_none() {
            state.skill_client = self.skill_client.clone();
        }
        if state.conversation_id_factory.is_none() {
            state.conversation_id_factory = self.conversation_id_factory.clone();
        }
        if state.telemetry.is_none() {
            state.telemetry = self.telemetry.clone();
        }
    }
}

// ── tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::application::ports::{Storage, StoreItem};
    use crate::domain::{
        ActivityType, ChannelAccount, ClaimsIdentity, ConversationAccount, claims,
    };
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    /// Minimal storage for dialog tests.
    #[derive(Default)]
    pub(crate) struct TestStorage(pub Mutex<HashMap<String, StoreItem>>);

    #[async_trait]
    impl Storage for TestStorage {
        async fn read(&self, keys: &[String]) -> BotResult<HashMap<String, StoreItem>> {
            let items = self.0.lock().unwrap();
            Ok(keys
                .iter()
                .filter_map(|k| items.get(k).map(|v| (k.clone(), v.clone())))
                .collect())
        }

        async fn write(
            &self,
            changes: HashMap<String, StoreItem>,
        ) -> BotResult<HashMap<String, String>> {
            let mut items = self.0.lock().unwrap();
            let tags = changes.keys().map(|k| (k.clone(), "1".to_owned())).collect();
            items.extend(changes);
            Ok(tags)
        }

        async fn delete(&self, keys: &[String]) -> BotResult<()> {
            let mut items = self.0.lock().unwrap();
            for key in keys {
                items.remove(key);
            }
            Ok(())
        }
    }

    /// Asks a question, then completes with the answer.
    pub(crate) struct AskDialog;

    #[async_trait]
    impl Dialog for AskDialog {
        fn id(&self) -> &str {
            "ask"
        }

        async fn begin_dialog(
            &self,
            dc: &mut DialogContext<'_>,
            _options: Option<Value>,
        ) -> BotResult<DialogTurnResult> {
            dc.turn.send_text("What is your name?")?;
            Ok(DialogTurnResult::waiting())
        }

        async fn continue_dialog(
            &self,
            dc: &mut DialogContext<'_>,
        ) -> BotResult<DialogTurnResult> {
            let name = dc.turn.activity().text().to_owned();
            dc.turn.send_text(format!("Hello {name}"))?;
            Ok(DialogTurnResult::complete(Some(Value::String(name))))
        }
    }

    pub(crate) fn inbound(text: &str) -> Activity {
        let mut activity = Activity::message(text);
        activity.channel_id = "test".into();
        activity.from = ChannelAccount::new("user", "User");
        activity.recipient = ChannelAccount::new("bot", "Bot");
        activity.conversation = ConversationAccount::new("conv");
        activity
    }

    fn manager(storage: Arc<TestStorage>) -> DialogManager {
        DialogManager::new(
            Arc::new(AskDialog),
            BotState::conversation(storage.clone()),
            BotState::user(storage),
            "en-us",
        )
    }

    #[tokio::test]
    async fn waits_then_continues() {
        let storage = Arc::new(TestStorage::default());
        let manager = manager(storage.clone());

        let mut first = TurnContext::new(inbound("hi"), None, CancellationToken::new());
        let result = manager.on_turn(&mut first).await.unwrap();
        assert_eq!(result.status, DialogTurnStatus::Waiting);
        manager.conversation_state.save_changes(&mut first, false).await.unwrap();

        let mut second = TurnContext::new(inbound("Ada"), None, CancellationToken::new());
        let result = manager.on_turn(&mut second).await.unwrap();
        assert_eq!(result.status, DialogTurnStatus::Complete);
        assert_eq!(second.outbox().snapshot().unwrap()[0].text(), "Hello Ada");
        assert_eq!(second.turn_state().locale.as_deref(), Some("en-us"));
    }

    #[tokio::test]
    async fn skill_callers_get_end_of_conversation() {
        let manager = manager(Arc::new(TestStorage::default()));
        let identity = ClaimsIdentity::from_pairs([
            (claims::VERSION_CLAIM, "1.0"),
            (claims::AUDIENCE_CLAIM, "bot"),
            (claims::APP_ID_CLAIM, "parent"),
        ]);
        let mut ctx = TurnContext::new(inbound("hi"), Some(identity), CancellationToken::new());
        ctx.turn_state_mut().auto_end_root_dialog = true;

        let result = manager.on_turn(&mut ctx).await.unwrap();
        assert_eq!(result.status, DialogTurnStatus::Complete);

        let sent = ctx.outbox().snapshot().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].activity_type, ActivityType::EndOfConversation);
        assert_eq!(sent[1].code.as_deref(), Some(COMPLETED_SUCCESSFULLY));
    }
}
