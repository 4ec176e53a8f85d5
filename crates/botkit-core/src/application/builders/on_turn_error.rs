use std::{error::Error as _, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::error;

use crate::{
    application::{
        builders::Builder,
        services::{
            Component, ComponentRegistry, ServiceProvider, TurnErrorHandler, decode_fields,
            resolve_conversation_state,
        },
        state::BotState,
        turn::TurnContext,
    },
    domain::{Activity, BoolExpression, Configuration},
    error::{BotError, BotResult},
};

pub const TURN_ERROR_TRACE_NAME: &str = "OnTurnError Trace";
pub const TURN_ERROR_TRACE_LABEL: &str = "TurnError";

/// `Microsoft.OnTurnErrorProvider`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OnTurnErrorBuilder {
    /// Log the error through `tracing`. Defaults to `false`.
    pub log_error: Option<BoolExpression>,
    /// Send the error chain as a trace activity. Defaults to `false`.
    pub send_trace_activity: Option<BoolExpression>,
}

impl OnTurnErrorBuilder {
    pub const KIND: &'static str = "Microsoft.OnTurnErrorProvider";

    pub fn decode(value: &Value, _registry: &ComponentRegistry) -> BotResult<Component> {
        let builder: Self = decode_fields(Self::KIND, value)?;
        Ok(Component::OnTurnError(Arc::new(builder)))
    }

    /// `(logError, sendTraceActivity)`, both off unless declared.
    fn flags(&self, configuration: &Configuration) -> BotResult<(bool, bool)> {
        let flag = |expression: &Option<BoolExpression>| match expression {
            Some(expression) => expression.evaluate(configuration),
            None => Ok(false),
        };
        Ok((flag(&self.log_error)?, flag(&self.send_trace_activity)?))
    }
}

impl Builder<Arc<dyn TurnErrorHandler>> for OnTurnErrorBuilder {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn build(
        &self,
        services: &ServiceProvider,
        configuration: &Configuration,
    ) -> BotResult<Arc<dyn TurnErrorHandler>> {
        let (log_error, send_trace_activity) = self.flags(configuration)?;
        Ok(Arc::new(DeclarativeTurnErrorHandler {
            log_error,
            send_trace_activity,
            conversation_state: resolve_conversation_state(services)?,
        }))
    }
}

/// Error handler configured by [`OnTurnErrorBuilder`].
///
/// Reports the error to the user and deletes the conversation state so the
/// next turn starts over.
pub struct DeclarativeTurnErrorHandler {
    log_error: bool,
    send_trace_activity: bool,
    conversation_state: BotState,
}

impl DeclarativeTurnErrorHandler {
    pub fn new(log_error: bool, send_trace_activity: bool, conversation_state: BotState) -> Self {
        Self {
            log_error,
            send_trace_activity,
            conversation_state,
        }
    }
}

/// The error followed by its sources, one per line.
fn error_chain(err: &BotError) -> String {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push_str("\ncaused by: ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}

#[async_trait]
impl TurnErrorHandler for DeclarativeTurnErrorHandler {
    async fn on_turn_error(&self, ctx: &mut TurnContext, err: &BotError) -> BotResult<()> {
        if self.log_error {
            error!(error = %err, category = ?err.category(), "Exception caught in turn");
        }
        if self.send_trace_activity {
            ctx.send_activity(Activity::trace(
                TURN_ERROR_TRACE_NAME,
                Some(Value::String(error_chain(err))),
                TURN_ERROR_TRACE_LABEL,
            ))?;
        }
        ctx.send_text(err.to_string())?;
        self.conversation_state.delete(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{ApplicationError, ports::MockStorage};
    use crate::domain::{ActivityType, ChannelAccount, ConversationAccount};
    use tokio_util::sync::CancellationToken;

    fn ctx() -> TurnContext {
        let mut activity = Activity::message("hi");
        activity.channel_id = "test".into();
        activity.from = ChannelAccount::new("user", "User");
        activity.conversation = ConversationAccount::new("conv");
        TurnContext::new(activity, None, CancellationToken::new())
    }

    #[tokio::test]
    async fn reports_and_deletes_conversation_state() {
        let mut storage = MockStorage::new();
        storage.expect_delete().times(1).returning(|keys| {
            assert_eq!(keys, ["test/conversations/conv".to_string()]);
            Ok(())
        });
        let handler =
            DeclarativeTurnErrorHandler::new(false, true, BotState::conversation(Arc::new(storage)));

        let mut ctx = ctx();
        let err: BotError = ApplicationError::DialogFailed {
            dialog: "root".into(),
            reason: "boom".into(),
        }
        .into();
        handler.on_turn_error(&mut ctx, &err).await.unwrap();

        let sent = ctx.outbox().snapshot().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].activity_type, ActivityType::Trace);
        assert_eq!(sent[0].label.as_deref(), Some(TURN_ERROR_TRACE_LABEL));
        assert_eq!(sent[1].text(), "Dialog 'root' failed: boom");
    }

    #[test]
    fn flags_default_to_off() {
        let builder: OnTurnErrorBuilder = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(builder.flags(&Configuration::empty()).unwrap(), (false, false));

        let builder: OnTurnErrorBuilder = serde_json::from_value(serde_json::json!({
            "logError": "=diagnostics.logErrors",
            "sendTraceActivity": true
        }))
        .unwrap();
        let configuration =
            Configuration::new(serde_json::json!({ "diagnostics": { "logErrors": true } }));
        assert_eq!(builder.flags(&configuration).unwrap(), (true, true));
    }
}
