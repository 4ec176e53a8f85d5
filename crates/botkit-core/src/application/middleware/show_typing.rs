use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use crate::{
    application::{
        middleware::{Middleware, Next},
        turn::{Outbox, TurnContext},
    },
    domain::{Activity, ConversationReference},
    error::BotResult,
};

/// Sends typing indicators while a message turn is running.
///
/// The first indicator goes out after `delay`, then one every `period`
/// until the rest of the pipeline returns.
#[derive(Debug, Clone, Copy)]
pub struct ShowTypingMiddleware {
    delay: Duration,
    period: Duration,
}

impl ShowTypingMiddleware {
    pub const NAME: &'static str = "ShowTyping";
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);
    pub const DEFAULT_PERIOD: Duration = Duration::from_millis(2000);

    pub fn new(delay: Duration, period: Duration) -> Self {
        Self { delay, period }
    }
}

impl Default for ShowTypingMiddleware {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY, Self::DEFAULT_PERIOD)
    }
}

#[async_trait]
impl Middleware for ShowTypingMiddleware {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn on_turn(&self, ctx: &mut TurnContext, next: Next<'_>) -> BotResult<()> {
        if !ctx.activity().is_message() {
            return next.run(ctx).await;
        }

        let stop = ctx.cancellation().child_token();
        let task = tokio::spawn(send_typing(
            ctx.outbox().clone(),
            ctx.activity().conversation_reference(),
            self.delay,
            self.period,
            stop.clone(),
        ));

        let result = next.run(ctx).await;

        stop.cancel();
        if let Err(e) = task.await {
            warn!(error = %e, "Typing indicator task failed");
        }
        result
    }
}

async fn send_typing(
    outbox: Outbox,
    reference: ConversationReference,
    delay: Duration,
    period: Duration,
    stop: CancellationToken,
) {
    tokio::select! {
        _ = stop.cancelled() => return,
        _ = sleep(delay) => {}
    }
    loop {
        let mut typing = Activity::typing();
        typing.apply_conversation_reference(&reference, false);
        typing.id = Some(Uuid::new_v4().to_string());
        if outbox.push(typing).is_err() {
            return;
        }
        tokio::select! {
            _ = stop.cancelled() => return,
            _ = sleep(period) => {}
        }
    }
}
