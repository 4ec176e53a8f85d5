use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::{
    application::{
        middleware::{Middleware, Next},
        ports::TranscriptLogger,
        turn::TurnContext,
    },
    domain::{Activity, ActivityType},
    error::BotResult,
};

/// Logs the inbound activity and everything the turn sent.
///
/// Logger failures are reported but never fail the turn.
#[derive(Clone)]
pub struct TranscriptLoggerMiddleware {
    logger: Arc<dyn TranscriptLogger>,
}

impl TranscriptLoggerMiddleware {
    pub const NAME: &'static str = "TranscriptLogger";

    pub fn new(logger: Arc<dyn TranscriptLogger>) -> Self {
        Self { logger }
    }

    async fn log(&self, mut activity: Activity, role: &str) {
        if activity.from.role.is_none() {
            activity.from.role = Some(role.to_owned());
        }
        if let Err(e) = self.logger.log_activity(&activity).await {
            warn!(error = %e, "Transcript logger failed");
        }
    }
}

#[async_trait]
impl Middleware for TranscriptLoggerMiddleware {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn on_turn(&self, ctx: &mut TurnContext, next: Next<'_>) -> BotResult<()> {
        let mut incoming = ctx.activity().clone();
        incoming.timestamp.get_or_insert_with(chrono::Utc::now);
        self.log(incoming, "user").await;

        let already_sent = ctx.outbox().len();
        let result = next.run(ctx).await;

        for sent in ctx.outbox().snapshot()?.into_iter().skip(already_sent) {
            if sent.activity_type != ActivityType::Typing {
                self.log(sent, "bot").await;
            }
        }
        result
    }
}
