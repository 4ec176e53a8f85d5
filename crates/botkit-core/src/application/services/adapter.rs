//! The bot adapter: middleware pipeline plus turn error recovery.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    application::{
        ApplicationError,
        builders::{SharedMiddlewareBuilder, SharedOnTurnErrorBuilder},
        middleware::{ConfigurationMiddleware, MiddlewareSet},
        services::{ServiceKind, ServiceProvider},
        skills::AuthenticationConfiguration,
        state::BotState,
        turn::{Bot, TurnContext},
    },
    domain::{Activity, ActivityType, ClaimsIdentity, Configuration, ConversationReference},
    error::{BotError, BotResult},
};

/// Event name of activities created by [`CoreBotAdapter::continue_conversation`].
pub const CONTINUE_CONVERSATION_EVENT: &str = "ContinueConversation";

/// Handles errors that escape the middleware pipeline.
#[async_trait]
pub trait TurnErrorHandler: Send + Sync {
    async fn on_turn_error(&self, ctx: &mut TurnContext, err: &BotError) -> BotResult<()>;
}

/// Declared adapter composition.
#[derive(Debug, Clone, Default)]
pub struct CoreBotAdapterOptions {
    /// First entry runs outermost.
    pub middleware: Vec<SharedMiddlewareBuilder>,
    pub on_turn_error: Option<SharedOnTurnErrorBuilder>,
}

/// The registered conversation state, or one over the registered storage.
pub fn resolve_conversation_state(services: &ServiceProvider) -> BotResult<BotState> {
    if services.is_registered(ServiceKind::ConversationState) {
        services.conversation_state()
    } else {
        Ok(BotState::conversation(services.storage()?))
    }
}

fn resolve_user_state(services: &ServiceProvider) -> BotResult<BotState> {
    if services.is_registered(ServiceKind::UserState) {
        services.user_state()
    } else {
        Ok(BotState::user(services.storage()?))
    }
}

/// Used when no `onTurnError` is declared.
///
/// Replies with the error message, then clears and saves conversation state
/// so the conversation cannot stay stuck on the state that failed.
pub struct DefaultTurnErrorHandler {
    conversation_state: BotState,
}

impl DefaultTurnErrorHandler {
    pub fn new(conversation_state: BotState) -> Self {
        Self { conversation_state }
    }
}

#[async_trait]
impl TurnErrorHandler for DefaultTurnErrorHandler {
    async fn on_turn_error(&self, ctx: &mut TurnContext, err: &BotError) -> BotResult<()> {
        error!(error = %err, "Unhandled error in turn");
        ctx.send_text(err.to_string())?;
        self.conversation_state.clear_state(ctx);
        self.conversation_state.save_changes(ctx, false).await
    }
}

/// Runs turns through the declared middleware and the bot.
pub struct CoreBotAdapter {
    middleware: MiddlewareSet,
    on_turn_error: Arc<dyn TurnErrorHandler>,
    conversation_state: BotState,
    user_state: BotState,
    authentication: AuthenticationConfiguration,
}

impl CoreBotAdapter {
    /// Assemble the adapter.
    ///
    /// Storage and state come from the container. The pipeline is the
    /// configuration middleware followed by every declared middleware in
    /// order. Builders run exactly once, here.
    #[instrument(skip_all, fields(middleware = options.middleware.len()))]
    pub fn new(
        services: &ServiceProvider,
        configuration: &Configuration,
        options: &CoreBotAdapterOptions,
    ) -> BotResult<Self> {
        let conversation_state = resolve_conversation_state(services)?;
        let user_state = resolve_user_state(services)?;

        let mut middleware = MiddlewareSet::new();
        middleware.use_middleware(Arc::new(ConfigurationMiddleware::new(configuration.clone())));
        for builder in &options.middleware {
            let built = builder.build(services, configuration)?;
            debug!(kind = builder.kind(), middleware = built.name(), "Middleware attached");
            middleware.use_middleware(built);
        }

        let on_turn_error = match &options.on_turn_error {
            Some(builder) => builder.build(services, configuration)?,
            None => Arc::new(DefaultTurnErrorHandler::new(conversation_state.clone())),
        };

        let authentication = if services.is_registered(ServiceKind::Authentication) {
            services.authentication()?
        } else {
            AuthenticationConfiguration::from_configuration(configuration)
        };

        info!(pipeline = ?middleware.names(), "Bot adapter assembled");
        Ok(Self {
            middleware,
            on_turn_error,
            conversation_state,
            user_state,
            authentication,
        })
    }

    /// Middleware names in execution order.
    pub fn middleware_names(&self) -> Vec<&str> {
        self.middleware.names()
    }

    pub fn conversation_state(&self) -> &BotState {
        &self.conversation_state
    }

    pub fn user_state(&self) -> &BotState {
        &self.user_state
    }

    /// Process one inbound activity and return everything sent during the
    /// turn.
    ///
    /// Skill callers must be allowed by the authentication configuration.
    /// Errors escaping the pipeline go to the turn error handler; only a
    /// failure of the handler itself, or cancellation, is returned.
    #[instrument(
        skip_all,
        fields(
            activity_type = ?activity.activity_type,
            channel = %activity.channel_id,
            conversation = %activity.conversation.id
        )
    )]
    pub async fn process_activity(
        &self,
        activity: Activity,
        identity: Option<ClaimsIdentity>,
        bot: &dyn Bot,
        cancellation: CancellationToken,
    ) -> BotResult<Vec<Activity>> {
        if let Some(identity) = &identity {
            self.authentication.validate_claims(identity)?;
        }
        let mut ctx = TurnContext::new(activity, identity, cancellation);
        self.run_pipeline(&mut ctx, bot).await?;
        ctx.outbox().drain()
    }

    /// Run a proactive turn into the conversation `reference` points at.
    #[instrument(skip_all, fields(conversation = %reference.conversation.id))]
    pub async fn continue_conversation(
        &self,
        reference: &ConversationReference,
        identity: Option<ClaimsIdentity>,
        bot: &dyn Bot,
        cancellation: CancellationToken,
    ) -> BotResult<Vec<Activity>> {
        let mut activity = Activity {
            activity_type: ActivityType::Event,
            name: Some(CONTINUE_CONVERSATION_EVENT.into()),
            ..Activity::default()
        };
        activity.apply_conversation_reference(reference, true);

        let mut ctx = TurnContext::new(activity, identity, cancellation);
        self.run_pipeline(&mut ctx, bot).await?;
        ctx.outbox().drain()
    }

    async fn run_pipeline(&self, ctx: &mut TurnContext, bot: &dyn Bot) -> BotResult<()> {
        let Err(err) = self.middleware.receive_activity(ctx, bot).await else {
            return Ok(());
        };
        if matches!(err, BotError::Application(ApplicationError::TurnCancelled)) {
            warn!("Turn cancelled");
            return Err(err);
        }
        warn!(error = %err, "Turn failed, running turn error handler");
        self.on_turn_error.on_turn_error(ctx, &err).await.map_err(|handler_err| {
            error!(error = %handler_err, "Turn error handler failed");
            handler_err
        })
    }
}

// ── tests ───────────────────────────────────────────────────────────────────
