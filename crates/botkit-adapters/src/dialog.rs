//! A minimal declarative dialog.

use std::sync::Arc;

use async_trait::async_trait;
use botkit_core::{
    application::{
        dialog::{Dialog, DialogContext, DialogTurnResult},
        services::{Component, ComponentRegistry, decode_fields},
    },
    domain::{Configuration, StringExpression},
    error::BotResult,
};
use serde::Deserialize;
use serde_json::Value;

/// `Microsoft.ReplyDialog`
///
/// Sends `text` on every turn. With `waitForInput` the dialog stays active
/// and replies again to the next message; otherwise it completes at once.
///
/// ```json
/// {
///   "$kind": "Microsoft.ReplyDialog",
///   "id": "greeting",
///   "text": "Hello World!",
///   "waitForInput": false
/// }
/// ```
///
/// `text` may be an expression evaluated against the turn's configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyDialog {
    #[serde(default = "ReplyDialog::default_id")]
    id: String,
    text: StringExpression,
    #[serde(default)]
    wait_for_input: bool,
}

impl ReplyDialog {
    pub const KIND: &'static str = "Microsoft.ReplyDialog";

    pub fn new(id: impl Into<String>, text: impl Into<StringExpression>, wait_for_input: bool) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            wait_for_input,
        }
    }

    fn default_id() -> String {
        "ReplyDialog".into()
    }

    pub fn decode(value: &Value, _registry: &ComponentRegistry) -> BotResult<Component> {
        let dialog: Self = decode_fields(Self::KIND, value)?;
        Ok(Component::Dialog(Arc::new(dialog)))
    }

    fn reply(&self, dc: &mut DialogContext<'_>) -> BotResult<DialogTurnResult> {
        let configuration = dc
            .turn
            .turn_state()
            .configuration
            .clone()
            .unwrap_or_default();
        let text = self.render(&configuration)?;
        dc.turn.send_text(text)?;

        if self.wait_for_input {
            Ok(DialogTurnResult::waiting())
        } else {
            Ok(DialogTurnResult::complete(None))
        }
    }

    fn render(&self, configuration: &Configuration) -> BotResult<String> {
        Ok(self.text.evaluate_optional(configuration)?.unwrap_or_default())
    }
}

#[async_trait]
impl Dialog for ReplyDialog {
    fn id(&self) -> &str {
        &self.id
    }

    async fn begin_dialog(
        &self,
        dc: &mut DialogContext<'_>,
        _options: Option<Value>,
    ) -> BotResult<DialogTurnResult> {
        self.reply(dc)
    }

    async fn continue_dialog(&self, dc: &mut DialogContext<'_>) -> BotResult<DialogTurnResult> {
        self.reply(dc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_with_defaults() {
        let Component::Dialog(dialog) = ReplyDialog::decode(
            &json!({ "$kind": "Microsoft.ReplyDialog", "text": "Hello World!" }),
            &ComponentRegistry::new(),
        )
        .unwrap() else {
            panic!("expected a dialog");
        };
        assert_eq!(dialog.id(), "ReplyDialog");
    }

    #[test]
    fn text_is_required() {
        let err = ReplyDialog::decode(
            &json!({ "$kind": "Microsoft.ReplyDialog" }),
            &ComponentRegistry::new(),
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("missing field `text`"));
    }

    #[test]
    fn text_expressions_read_configuration() {
        let dialog = ReplyDialog::new("greet", StringExpression::expression("greeting"), false);
        let configuration = Configuration::new(json!({ "greeting": "Hi from settings" }));
        assert_eq!(dialog.render(&configuration).unwrap(), "Hi from settings");
    }
}
