//! Turn middleware.
//!
//! Middleware wraps the bot: each stage receives the turn and a [`Next`]
//! continuation, and may act before and after calling it. The first
//! registered middleware is the outermost.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    application::turn::{Bot, TurnContext},
    domain::Configuration,
    error::BotResult,
};

mod remove_recipient;
mod show_typing;
mod telemetry;
mod transcript;

pub use remove_recipient::RemoveRecipientMentionMiddleware;
pub use show_typing::ShowTypingMiddleware;
pub use telemetry::TelemetryLoggerMiddleware;
pub use transcript::TranscriptLoggerMiddleware;

/// A pipeline stage around the bot.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Name used in logs and for inspecting pipeline order.
    fn name(&self) -> &str;

    /// Handle the turn; call `next.run(ctx)` to continue the pipeline.
    async fn on_turn(&self, ctx: &mut TurnContext, next: Next<'_>) -> BotResult<()>;
}

/// The rest of the pipeline after the current middleware.
pub struct Next<'a> {
    remaining: &'a [Arc<dyn Middleware>],
    bot: &'a dyn Bot,
}

impl<'a> Next<'a> {
    pub fn new(remaining: &'a [Arc<dyn Middleware>], bot: &'a dyn Bot) -> Self {
        Self { remaining, bot }
    }

    /// Run the remaining middleware, then the bot.
    pub async fn run(self, ctx: &mut TurnContext) -> BotResult<()> {
        ctx.ensure_not_cancelled()?;
        match self.remaining.split_first() {
            Some((head, tail)) => head.on_turn(ctx, Next::new(tail, self.bot)).await,
            None => self.bot.on_turn(ctx).await,
        }
    }
}

/// Ordered middleware pipeline.
#[derive(Default, Clone)]
pub struct MiddlewareSet {
    middleware: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `middleware` (innermost so far).
    pub fn use_middleware(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    /// Names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.middleware.iter().map(|m| m.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Run the turn through every middleware and finally `bot`.
    pub async fn receive_activity(&self, ctx: &mut TurnContext, bot: &dyn Bot) -> BotResult<()> {
        Next::new(&self.middleware, bot).run(ctx).await
    }
}

/// Exposes the bot's configuration to everything downstream via turn state.
#[derive(Debug, Clone)]
pub struct ConfigurationMiddleware {
    configuration: Configuration,
}

impl ConfigurationMiddleware {
    pub const NAME: &'static str = "Configuration";

    pub fn new(configuration: Configuration) -> Self {
        Self { configuration }
    }
}

#[async_trait]
impl Middleware for ConfigurationMiddleware {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn on_turn(&self, ctx: &mut TurnContext, next: Next<'_>) -> BotResult<()> {
        ctx.turn_state_mut().configuration = Some(self.configuration.clone());
        next.run(ctx).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::Activity;
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    /// Records `<name>:before` / `<name>:after` around `next`.
    pub(crate) struct Recording {
        pub name: &'static str,
        pub log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Middleware for Recording {
        fn name(&self) -> &str {
            self.name
        }

        async fn on_turn(&self, ctx: &mut TurnContext, next: Next<'_>) -> BotResult<()> {
            self.log.lock().unwrap().push(format!("{}:before", self.name));
            let result = next.run(ctx).await;
            self.log.lock().unwrap().push(format!("{}:after", self.name));
            result
        }
    }

    pub(crate) struct EchoBot;

    #[async_trait]
    impl Bot for EchoBot {
        async fn on_turn(&self, ctx: &mut TurnContext) -> BotResult<()> {
            let text = format!("echo: {}", ctx.activity().text());
            ctx.send_text(text)?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn first_registered_runs_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut set = MiddlewareSet::new();
        set.use_middleware(Arc::new(Recording { name: "a", log: log.clone() }))
            .use_middleware(Arc::new(Recording { name: "b", log: log.clone() }));

        let mut ctx = TurnContext::new(Activity::message("hi"), None, CancellationToken::new());
        set.receive_activity(&mut ctx, &EchoBot).await.unwrap();

        assert_eq!(set.names(), ["a", "b"]);
        assert_eq!(
            *log.lock().unwrap(),
            ["a:before", "b:before", "b:after", "a:after"]
        );
        assert_eq!(ctx.outbox().snapshot().unwrap()[0].text(), "echo: hi");
    }

    #[tokio::test]
    async fn configuration_is_published_to_turn_state() {
        let mut set = MiddlewareSet::new();
        set.use_middleware(Arc::new(ConfigurationMiddleware::new(Configuration::new(
            serde_json::json!({ "bot": "demo" }),
        ))));

        let mut ctx = TurnContext::new(Activity::message("hi"), None, CancellationToken::new());
        set.receive_activity(&mut ctx, &EchoBot).await.unwrap();

        let configuration = ctx.turn_state().configuration.as_ref().unwrap();
        assert_eq!(configuration.get_str("bot"), Some("demo"));
    }

    #[tokio::test]
    async fn cancelled_turn_never_reaches_bot() {
        let token = CancellationToken::new();
        token.cancel();
        let mut ctx = TurnContext::new(Activity::message("hi"), None, token);

        let result = MiddlewareSet::new().receive_activity(&mut ctx, &EchoBot).await;
        assert!(result.is_err());
        assert!(ctx.outbox().is_empty());
    }
}
