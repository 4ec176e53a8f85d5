//! Skill plumbing: conversation id mapping, outbound delivery, inbound
//! replies and caller authorization.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    application::{
        ApplicationError,
        ports::{InvokeResponse, SkillRequest, SkillTransport, Storage, StoreItem},
        services::CoreBotAdapter,
        turn::{Bot, TurnContext},
    },
    domain::{Activity, ActivityType, ChannelAccount, ClaimsIdentity, Configuration, ConversationReference},
    error::BotResult,
};

/// A skill this bot can call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotFrameworkSkill {
    pub id: String,
    pub app_id: String,
    pub skill_endpoint: String,
}

/// Where a skill conversation id leads back to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillConversationReference {
    pub conversation_reference: ConversationReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_scope: Option<String>,
}

/// Maps skill conversation ids to the parent conversation, in storage.
pub struct SkillConversationIdFactory {
    storage: Arc<dyn Storage>,
}

impl SkillConversationIdFactory {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Store a reference to the conversation `activity` belongs to and
    /// return a fresh id for the skill conversation.
    pub async fn create_skill_conversation_id(
        &self,
        activity: &Activity,
        oauth_scope: Option<&str>,
    ) -> BotResult<String> {
        let id = Uuid::new_v4().to_string();
        let reference = SkillConversationReference {
            conversation_reference: activity.conversation_reference(),
            oauth_scope: oauth_scope.map(str::to_owned),
        };
        let value = serde_json::to_value(&reference).map_err(|e| ApplicationError::StorageFailure {
            reason: e.to_string(),
        })?;
        self.storage
            .write(HashMap::from([(id.clone(), StoreItem::new(value))]))
            .await?;
        debug!(skill_conversation = %id, "Skill conversation id created");
        Ok(id)
    }

    pub async fn get_skill_conversation_reference(
        &self,
        id: &str,
    ) -> BotResult<SkillConversationReference> {
        let key = id.to_owned();
        let mut items = self.storage.read(std::slice::from_ref(&key)).await?;
        let item = items
            .remove(&key)
            .ok_or_else(|| ApplicationError::SkillConversationNotFound { id: key.clone() })?;
        serde_json::from_value(item.value).map_err(|e| {
            ApplicationError::StorageFailure {
                reason: format!("skill conversation '{id}': {e}"),
            }
            .into()
        })
    }

    pub async fn delete_conversation_reference(&self, id: &str) -> BotResult<()> {
        self.storage.delete(&[id.to_owned()]).await
    }
}

/// Sends activities to skills through the [`SkillTransport`] port.
pub struct SkillClient {
    transport: Option<Arc<dyn SkillTransport>>,
    conversation_id_factory: Arc<SkillConversationIdFactory>,
    bot_app_id: Option<String>,
}

impl SkillClient {
    pub fn new(
        transport: Option<Arc<dyn SkillTransport>>,
        conversation_id_factory: Arc<SkillConversationIdFactory>,
        bot_app_id: Option<String>,
    ) -> Self {
        Self {
            transport,
            conversation_id_factory,
            bot_app_id,
        }
    }

    /// Deliver `activity` to `skill`; the skill replies to `callback_url`.
    #[instrument(skip_all, fields(skill = %skill.id))]
    pub async fn post_to_skill(
        &self,
        activity: &Activity,
        skill: &BotFrameworkSkill,
        callback_url: &str,
    ) -> BotResult<InvokeResponse> {
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| ApplicationError::SkillTransportFailed {
                reason: "no skill transport registered".into(),
            })?;

        let conversation_id = self
            .conversation_id_factory
            .create_skill_conversation_id(activity, None)
            .await?;

        let mut outbound = activity.clone();
        outbound.conversation.id = conversation_id.clone();
        outbound.service_url = Some(callback_url.to_owned());
        outbound.recipient = ChannelAccount {
            id: skill.app_id.clone(),
            name: None,
            role: Some("skill".into()),
        };

        let response = transport
            .post_activity(SkillRequest {
                from_bot_id: self.bot_app_id.clone(),
                to_bot_id: skill.app_id.clone(),
                to_url: skill.skill_endpoint.clone(),
                service_url: callback_url.to_owned(),
                conversation_id,
                activity: outbound,
            })
            .await?;
        info!(status = response.status, "Skill responded");
        Ok(response)
    }
}

/// Forwards one activity from a skill into the parent conversation.
struct ForwardToChannel {
    activity: Activity,
}

#[async_trait]
impl Bot for ForwardToChannel {
    async fn on_turn(&self, ctx: &mut TurnContext) -> BotResult<()> {
        ctx.send_activity(self.activity.clone())?;
        Ok(())
    }
}

/// Handles activities that skills send back to this bot.
pub struct SkillHandler {
    adapter: Arc<CoreBotAdapter>,
    bot: Arc<dyn Bot>,
    conversation_id_factory: Arc<SkillConversationIdFactory>,
}

impl SkillHandler {
    pub fn new(
        adapter: Arc<CoreBotAdapter>,
        bot: Arc<dyn Bot>,
        conversation_id_factory: Arc<SkillConversationIdFactory>,
    ) -> Self {
        Self {
            adapter,
            bot,
            conversation_id_factory,
        }
    }

    pub async fn on_send_to_conversation(
        &self,
        identity: ClaimsIdentity,
        conversation_id: &str,
        activity: Activity,
        cancellation: CancellationToken,
    ) -> BotResult<Vec<Activity>> {
        self.process(identity, conversation_id, None, activity, cancellation)
            .await
    }

    pub async fn on_reply_to_activity(
        &self,
        identity: ClaimsIdentity,
        conversation_id: &str,
        activity_id: &str,
        activity: Activity,
        cancellation: CancellationToken,
    ) -> BotResult<Vec<Activity>> {
        self.process(
            identity,
            conversation_id,
            Some(activity_id),
            activity,
            cancellation,
        )
        .await
    }

    /// End-of-conversation and event activities are turns for the bot;
    /// anything else is forwarded to the parent conversation as is.
    #[instrument(skip_all, fields(skill_conversation = %conversation_id, activity_type = ?activity.activity_type))]
    async fn process(
        &self,
        identity: ClaimsIdentity,
        conversation_id: &str,
        reply_to_id: Option<&str>,
        mut activity: Activity,
        cancellation: CancellationToken,
    ) -> BotResult<Vec<Activity>> {
        let reference = self
            .conversation_id_factory
            .get_skill_conversation_reference(conversation_id)
            .await?
            .conversation_reference;

        match activity.activity_type {
            ActivityType::EndOfConversation | ActivityType::Event => {
                if activity.activity_type == ActivityType::EndOfConversation {
                    self.conversation_id_factory
                        .delete_conversation_reference(conversation_id)
                        .await?;
                }
                let from = activity.from.clone();
                activity.apply_conversation_reference(&reference, true);
                activity.from = from;
                activity.caller_id = identity.app_id().map(|id| format!("urn:botframework:aadappid:{id}"));
                self.adapter
                    .process_activity(activity, Some(identity), self.bot.as_ref(), cancellation)
                    .await
            }
            _ => {
                activity.reply_to_id = reply_to_id.map(str::to_owned);
                activity.id = None;
                let forward = ForwardToChannel { activity };
                self.adapter
                    .continue_conversation(&reference, Some(identity), &forward, cancellation)
                    .await
            }
        }
    }
}

/// Which bots may call this one as a skill.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthenticationConfiguration {
    pub required_endorsements: Vec<String>,
    /// App ids allowed to call; `*` allows any.
    pub allowed_callers: Vec<String>,
}

impl AuthenticationConfiguration {
    /// Read `skillConfiguration:allowedCallers`, falling back to
    /// `allowedCallers`.
    pub fn from_configuration(configuration: &Configuration) -> Self {
        let mut allowed_callers =
            configuration.get_string_list("skillConfiguration:allowedCallers");
        if allowed_callers.is_empty() {
            allowed_callers = configuration.get_string_list("allowedCallers");
        }
        Self {
            required_endorsements: Vec::new(),
            allowed_callers,
        }
    }

    /// Reject skill callers that are not allowed. Other callers pass.
    pub fn validate_claims(&self, identity: &ClaimsIdentity) -> BotResult<()> {
        if !identity.is_skill_claim() {
            return Ok(());
        }
        let app_id = identity.app_id().unwrap_or_default();
        let allowed = self
            .allowed_callers
            .iter()
            .any(|caller| caller == "*" || caller == app_id);
        if allowed {
            Ok(())
        } else {
            Err(ApplicationError::UnauthorizedCaller {
                app_id: app_id.to_owned(),
            }
            .into())
        }
    }
}

// ── tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{
        dialog::tests::{TestStorage, inbound},
        ports::MockSkillTransport,
    };
    use crate::domain::claims;
    use serde_json::json;

    fn skill() -> BotFrameworkSkill {
        BotFrameworkSkill {
            id: "echo".into(),
            app_id: "skill-app".into(),
            skill_endpoint: "http://localhost:39783/api/messages".into(),
        }
    }

    #[tokio::test]
    async fn conversation_ids_round_trip_through_storage() {
        let factory = SkillConversationIdFactory::new(Arc::new(TestStorage::default()));
        let activity = inbound("hi");
        let id = factory
            .create_skill_conversation_id(&activity, Some("scope"))
            .await
            .unwrap();

        let reference = factory.get_skill_conversation_reference(&id).await.unwrap();
        assert_eq!(reference.conversation_reference.conversation.id, "conv");
        assert_eq!(reference.oauth_scope.as_deref(), Some("scope"));

        factory.delete_conversation_reference(&id).await.unwrap();
        assert!(factory.get_skill_conversation_reference(&id).await.is_err());
    }

    #[tokio::test]
    async fn skill_requests_use_a_fresh_conversation() {
        let mut transport = MockSkillTransport::new();
        transport.expect_post_activity().times(1).returning(|request| {
            assert_eq!(request.to_bot_id, "skill-app");
            assert_eq!(request.from_bot_id.as_deref(), Some("parent-app"));
            assert_ne!(request.activity.conversation.id, "conv");
            assert_eq!(request.activity.conversation.id, request.conversation_id);
            Ok(InvokeResponse {
                status: 200,
                body: None,
            })
        });

        let factory = Arc::new(SkillConversationIdFactory::new(Arc::new(
            TestStorage::default(),
        )));
        let client = SkillClient::new(Some(Arc::new(transport)), factory, Some("parent-app".into()));
        let response = client
            .post_to_skill(&inbound("hi"), &skill(), "http://localhost:3978/api/skills")
            .await
            .unwrap();
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn missing_transport_is_reported() {
        let factory = Arc::new(SkillConversationIdFactory::new(Arc::new(
            TestStorage::default(),
        )));
        let client = SkillClient::new(None, factory, None);
        let err = client
            .post_to_skill(&inbound("hi"), &skill(), "http://localhost")
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("no skill transport registered"));
    }

    #[test]
    fn allowed_callers_gate_skill_claims() {
        let configuration = Configuration::new(json!({
            "skillConfiguration": { "allowedCallers": "parent-app, other" }
        }));
        let auth = AuthenticationConfiguration::from_configuration(&configuration);
        let skill = |app: &str| {
            ClaimsIdentity::from_pairs([
                (claims::VERSION_CLAIM, "1.0"),
                (claims::AUDIENCE_CLAIM, "bot"),
                (claims::APP_ID_CLAIM, app),
            ])
        };

        assert!(auth.validate_claims(&skill("parent-app")).is_ok());
        assert!(auth.validate_claims(&skill("stranger")).is_err());
        // Users (non-skill callers) are not gated.
        assert!(auth.validate_claims(&ClaimsIdentity::anonymous()).is_ok());
    }

    #[test]
    fn wildcard_allows_any_skill() {
        let auth = AuthenticationConfiguration {
            required_endorsements: Vec::new(),
            allowed_callers: vec!["*".into()],
        };
        let identity = ClaimsIdentity::from_pairs([
            (claims::VERSION_CLAIM, "2.0"),
            (claims::AUDIENCE_CLAIM, "bot"),
            (claims::AUTHORIZED_PARTY_CLAIM, "anyone"),
        ]);
        assert!(auth.validate_claims(&identity).is_ok());
    }
}
