//! Per-turn context: the inbound activity, the caller's identity, turn-scoped
//! state and the outbox collecting everything the bot sends.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    application::{
        ApplicationError,
        ports::TelemetryClient,
        skills::{SkillClient, SkillConversationIdFactory},
        state::CachedState,
    },
    domain::{Activity, ActivityType, ClaimsIdentity, Configuration},
    error::BotResult,
};

/// Turn entry point implemented by bots.
#[async_trait]
pub trait Bot: Send + Sync {
    async fn on_turn(&self, ctx: &mut TurnContext) -> BotResult<()>;
}

/// Activities sent during a turn, in send order.
///
/// Shared so that background work started by middleware (typing
/// indicators) can send while the turn runs.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    inner: Arc<Mutex<Vec<Activity>>>,
}

impl Outbox {
    pub fn push(&self, activity: Activity) -> BotResult<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| ApplicationError::StoreLockError)?;
        inner.push(activity);
        Ok(())
    }

    /// Copy of everything sent so far.
    pub fn snapshot(&self) -> BotResult<Vec<Activity>> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| ApplicationError::StoreLockError)?;
        Ok(inner.clone())
    }

    /// Take everything sent so far, leaving the outbox empty.
    pub fn drain(&self) -> BotResult<Vec<Activity>> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| ApplicationError::StoreLockError)?;
        Ok(std::mem::take(&mut *inner))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// State that lives for exactly one turn.
#[derive(Clone, Default)]
pub struct TurnState {
    /// End the root dialog when it would otherwise wait for input.
    pub auto_end_root_dialog: bool,
    pub locale: Option<String>,
    pub configuration: Option<Configuration>,
    pub skill_client: Option<Arc<SkillClient>>,
    pub conversation_id_factory: Option<Arc<SkillConversationIdFactory>>,
    pub telemetry: Option<Arc<dyn TelemetryClient>>,
    pub(crate) state_cache: HashMap<&'static str, CachedState>,
}

/// Everything a middleware or bot sees while handling one activity.
pub struct TurnContext {
    activity: Activity,
    identity: Option<ClaimsIdentity>,
    outbox: Outbox,
    state: TurnState,
    cancellation: CancellationToken,
    responded: bool,
}

impl TurnContext {
    pub fn new(
        activity: Activity,
        identity: Option<ClaimsIdentity>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            activity,
            identity,
            outbox: Outbox::default(),
            state: TurnState::default(),
            cancellation,
            responded: false,
        }
    }

    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    pub fn activity_mut(&mut self) -> &mut Activity {
        &mut self.activity
    }

    pub fn identity(&self) -> Option<&ClaimsIdentity> {
        self.identity.as_ref()
    }

    pub fn is_skill_call(&self) -> bool {
        self.identity.as_ref().is_some_and(ClaimsIdentity::is_skill_claim)
    }

    pub fn turn_state(&self) -> &TurnState {
        &self.state
    }

    pub fn turn_state_mut(&mut self) -> &mut TurnState {
        &mut self.state
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// `true` once anything other than a trace was sent this turn.
    pub fn responded(&self) -> bool {
        self.responded
    }

    /// Fail with `TurnCancelled` when the turn's token was cancelled.
    pub fn ensure_not_cancelled(&self) -> BotResult<()> {
        if self.cancellation.is_cancelled() {
            return Err(ApplicationError::TurnCancelled.into());
        }
        Ok(())
    }

    /// Send an activity back into this conversation.
    ///
    /// The activity is addressed from the inbound activity and gets an id
    /// and timestamp when it has none. Returns the id.
    pub fn send_activity(&mut self, mut activity: Activity) -> BotResult<String> {
        self.ensure_not_cancelled()?;

        activity.apply_conversation_reference(&self.activity.conversation_reference(), false);
        let id = activity
            .id
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone();
        activity.timestamp.get_or_insert_with(Utc::now);

        if activity.activity_type != ActivityType::Trace {
            self.responded = true;
        }
        self.outbox.push(activity)?;
        Ok(id)
    }

    /// Send a plain text message.
    pub fn send_text(&mut self, text: impl Into<String>) -> BotResult<String> {
        self.send_activity(Activity::message(text))
    }
}
