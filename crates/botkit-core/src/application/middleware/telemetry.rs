use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    application::{
        middleware::{Middleware, Next},
        ports::{TelemetryClient, TelemetryProperties},
        turn::TurnContext,
    },
    domain::{Activity, ActivityType},
    error::BotResult,
};

pub const MESSAGE_RECEIVED_EVENT: &str = "BotMessageReceived";
pub const MESSAGE_SEND_EVENT: &str = "BotMessageSend";

/// Tracks inbound and outbound activities as telemetry events.
///
/// Sender names, ids and message text are only included with
/// `log_personal_information`.
#[derive(Clone)]
pub struct TelemetryLoggerMiddleware {
    client: Arc<dyn TelemetryClient>,
    log_activities: bool,
    log_personal_information: bool,
}

impl TelemetryLoggerMiddleware {
    pub const NAME: &'static str = "TelemetryLogger";

    pub fn new(
        client: Arc<dyn TelemetryClient>,
        log_activities: bool,
        log_personal_information: bool,
    ) -> Self {
        Self {
            client,
            log_activities,
            log_personal_information,
        }
    }

    fn properties(&self, activity: &Activity) -> TelemetryProperties {
        let mut props = TelemetryProperties::new();
        if let Some(id) = &activity.id {
            props.insert("activityId".into(), id.clone());
        }
        props.insert("channelId".into(), activity.channel_id.clone());
        props.insert("conversationId".into(), activity.conversation.id.clone());
        props.insert("recipientId".into(), activity.recipient.id.clone());
        if let Some(locale) = &activity.locale {
            props.insert("locale".into(), locale.clone());
        }
        if self.log_personal_information {
            props.insert("fromId".into(), activity.from.id.clone());
            if let Some(name) = &activity.from.name {
                props.insert("fromName".into(), name.clone());
            }
            if let Some(text) = &activity.text {
                props.insert("text".into(), text.clone());
            }
        }
        props
    }
}

#[async_trait]
impl Middleware for TelemetryLoggerMiddleware {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn on_turn(&self, ctx: &mut TurnContext, next: Next<'_>) -> BotResult<()> {
        ctx.turn_state_mut().telemetry = Some(self.client.clone());
        if self.log_activities {
            self.client
                .track_event(MESSAGE_RECEIVED_EVENT, &self.properties(ctx.activity()));
        }

        let already_sent = ctx.outbox().len();
        let result = next.run(ctx).await;

        if self.log_activities {
            for sent in ctx.outbox().snapshot()?.iter().skip(already_sent) {
                if sent.activity_type != ActivityType::Typing {
                    self.client
                        .track_event(MESSAGE_SEND_EVENT, &self.properties(sent));
                }
            }
        }
        if let Err(e) = &result {
            self.client
                .track_exception(e, &self.properties(ctx.activity()));
        }
        result
    }
}
