use async_trait::async_trait;
use tracing::debug;

use crate::{
    application::{
        middleware::{Middleware, Next},
        turn::TurnContext,
    },
    error::BotResult,
};

/// Strips mentions of the bot from inbound message text.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveRecipientMentionMiddleware;

impl RemoveRecipientMentionMiddleware {
    pub const NAME: &'static str = "RemoveRecipientMention";
}

#[async_trait]
impl Middleware for RemoveRecipientMentionMiddleware {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn on_turn(&self, ctx: &mut TurnContext, next: Next<'_>) -> BotResult<()> {
        if ctx.activity().is_message() {
            let text = ctx.activity_mut().remove_recipient_mention();
            debug!(text = %text, "Recipient mention removed");
        }
        next.run(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::middleware::{MiddlewareSet, tests::EchoBot};
    use crate::domain::{Activity, ChannelAccount, Entity};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn bot_sees_text_without_mention() {
        let bot = ChannelAccount::new("bot", "Bot");
        let mut activity = Activity::message("<at>Bot</at> Hi Bot");
        activity.recipient = bot.clone();
        activity.entities.push(Entity::mention(bot, "<at>Bot</at>"));

        let mut set = MiddlewareSet::new();
        set.use_middleware(Arc::new(RemoveRecipientMentionMiddleware));
        let mut ctx = TurnContext::new(activity, None, CancellationToken::new());
        set.receive_activity(&mut ctx, &EchoBot).await.unwrap();

        assert_eq!(ctx.outbox().snapshot().unwrap()[0].text(), "echo: Hi Bot");
    }
}
