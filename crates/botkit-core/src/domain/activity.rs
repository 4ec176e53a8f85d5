//! Activity model exchanged between a channel and the bot.
//!
//! Field names serialize in camelCase so that activities round-trip with
//! the JSON the channels send.

use std::fmt;

use chrono::{DateTime, Utc};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kind of activity.
///
/// Types this crate does not interpret are kept as [`ActivityType::Other`]
/// with their wire name, so they pass through transcripts and skills intact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityType {
    #[default]
    Message,
    Trace,
    Typing,
    Event,
    EndOfConversation,
    ConversationUpdate,
    Invoke,
    Other(String),
}

impl ActivityType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Message => "message",
            Self::Trace => "trace",
            Self::Typing => "typing",
            Self::Event => "event",
            Self::EndOfConversation => "endOfConversation",
            Self::ConversationUpdate => "conversationUpdate",
            Self::Invoke => "invoke",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for ActivityType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "message" => Self::Message,
            "trace" => Self::Trace,
            "typing" => Self::Typing,
            "event" => Self::Event,
            "endOfConversation" => Self::EndOfConversation,
            "conversationUpdate" => Self::ConversationUpdate,
            "invoke" => Self::Invoke,
            _ => Self::Other(name),
        }
    }
}

impl From<ActivityType> for String {
    fn from(activity_type: ActivityType) -> Self {
        match activity_type {
            ActivityType::Other(name) => name,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user or bot endpoint on a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl ChannelAccount {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            role: None,
        }
    }
}

/// The conversation an activity belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_group: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl ConversationAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// Metadata attached to an activity (mentions, places, ...).
///
/// Only `type` is interpreted; every other property is kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

/// Typed view over a `mention` entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    pub mentioned: ChannelAccount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Entity {
    pub const MENTION: &'static str = "mention";

    /// Build a mention entity for `account` rendered as `text` in the message.
    pub fn mention(account: ChannelAccount, text: impl Into<String>) -> Self {
        let mut properties = Map::new();
        properties.insert(
            "mentioned".into(),
            serde_json::to_value(&account).unwrap_or(Value::Null),
        );
        properties.insert("text".into(), Value::String(text.into()));
        Self {
            entity_type: Self::MENTION.into(),
            properties,
        }
    }

    /// Parse this entity as a mention, if it is one.
    pub fn as_mention(&self) -> Option<Mention> {
        if !self.entity_type.eq_ignore_ascii_case(Self::MENTION) {
            return None;
        }
        serde_json::from_value(Value::Object(self.properties.clone())).ok()
    }
}

/// Everything needed to address a message back into an existing conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<ChannelAccount>,
    #[serde(default)]
    pub bot: ChannelAccount,
    #[serde(default)]
    pub conversation: ConversationAccount,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

/// A single inbound or outbound exchange on a channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type", default)]
    pub activity_type: ActivityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(default)]
    pub from: ChannelAccount,
    #[serde(default)]
    pub recipient: ChannelAccount,
    #[serde(default)]
    pub conversation: ConversationAccount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_id: Option<String>,
}

impl Activity {
    /// A message activity carrying `text`.
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            activity_type: ActivityType::Message,
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// A trace activity; channels other than the emulator drop these.
    pub fn trace(name: impl Into<String>, value: Option<Value>, label: impl Into<String>) -> Self {
        Self {
            activity_type: ActivityType::Trace,
            name: Some(name.into()),
            label: Some(label.into()),
            value_type: Some("https://www.botframework.com/schemas/error".into()),
            value,
            ..Self::default()
        }
    }

    pub fn typing() -> Self {
        Self {
            activity_type: ActivityType::Typing,
            ..Self::default()
        }
    }

    /// Signals the caller that this conversation is over.
    pub fn end_of_conversation(code: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            activity_type: ActivityType::EndOfConversation,
            code: Some(code.into()),
            value,
            ..Self::default()
        }
    }

    pub fn is_message(&self) -> bool {
        self.activity_type == ActivityType::Message
    }

    /// Message text, empty when absent.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }

    /// Mentions contained in this activity's entities.
    pub fn mentions(&self) -> Vec<Mention> {
        self.entities.iter().filter_map(Entity::as_mention).collect()
    }

    /// Reference that addresses replies to this (inbound) activity.
    pub fn conversation_reference(&self) -> ConversationReference {
        ConversationReference {
            activity_id: self.id.clone(),
            user: Some(self.from.clone()),
            bot: self.recipient.clone(),
            conversation: self.conversation.clone(),
            channel_id: self.channel_id.clone(),
            service_url: self.service_url.clone(),
            locale: self.locale.clone(),
        }
    }

    /// Address this activity using `reference`.
    ///
    /// With `is_incoming` the activity is treated as coming from the user
    /// (continuations, skill replies); otherwise it is an outgoing reply.
    pub fn apply_conversation_reference(
        &mut self,
        reference: &ConversationReference,
        is_incoming: bool,
    ) {
        self.channel_id = reference.channel_id.clone();
        self.service_url = reference.service_url.clone();
        self.conversation = reference.conversation.clone();
        if self.locale.is_none() {
            self.locale = reference.locale.clone();
        }

        let user = reference.user.clone().unwrap_or_default();
        if is_incoming {
            self.from = user;
            self.recipient = reference.bot.clone();
            if reference.activity_id.is_some() {
                self.id = reference.activity_id.clone();
            }
        } else {
            self.from = reference.bot.clone();
            self.recipient = user;
            if reference.activity_id.is_some() && self.reply_to_id.is_none() {
                self.reply_to_id = reference.activity_id.clone();
            }
        }
    }

    /// A message addressed back to the sender of this activity.
    pub fn create_reply(&self, text: impl Into<String>) -> Activity {
        let mut reply = Activity::message(text);
        reply.apply_conversation_reference(&self.conversation_reference(), false);
        reply.timestamp = Some(Utc::now());
        reply
    }

    /// Strip every mention of the recipient (the bot) from the message text.
    ///
    /// Channels render mentions differently (`@Bot` or `<at>Bot</at>`); the
    /// mention entity's own text is removed when present, otherwise both
    /// forms of the recipient's name are. Returns the resulting text.
    pub fn remove_recipient_mention(&mut self) -> String {
        let Some(mut text) = self.text.clone() else {
            return String::new();
        };
        let recipient_id = self.recipient.id.clone();

        for mention in self.mentions() {
            if mention.mentioned.id != recipient_id {
                continue;
            }
            let rendered: Vec<String> = match mention.text.as_deref().filter(|t| !t.is_empty()) {
                Some(t) => vec![t.to_owned()],
                None => match mention.mentioned.name.as_deref() {
                    Some(name) => vec![format!("<at>{name}</at>"), format!("@{name}")],
                    None => Vec::new(),
                },
            };
            for pattern in rendered {
                text = remove_ignoring_case(&text, &pattern);
            }
        }

        let text = text.trim().to_owned();
        self.text = Some(text.clone());
        text
    }
}

fn remove_ignoring_case(text: &str, pattern: &str) -> String {
    match RegexBuilder::new(&regex::escape(pattern))
        .case_insensitive(true)
        .build()
    {
        Ok(regex) => regex.replace_all(text, "").into_owned(),
        Err(_) => text.replace(pattern, ""),
    }
}
