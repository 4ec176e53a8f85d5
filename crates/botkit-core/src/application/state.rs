//! Conversation and user state over the [`Storage`] port.
//!
//! State is loaded into the turn's cache on first use and written back by
//! [`BotState::save_changes`] only when it changed (or when forced).

use std::{collections::HashMap, sync::Arc};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::{
    application::{
        ApplicationError,
        ports::{Storage, StoreItem},
        turn::TurnContext,
    },
    domain::{Activity, DomainError},
    error::BotResult,
};

/// Which identity a state blob is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateScope {
    /// `<channel>/conversations/<conversation id>`
    Conversation,
    /// `<channel>/users/<user id>`
    User,
}

impl StateScope {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Conversation => "ConversationState",
            Self::User => "UserState",
        }
    }

    /// Storage key for `activity` in this scope.
    pub fn storage_key(&self, activity: &Activity) -> BotResult<String> {
        if activity.channel_id.is_empty() {
            return Err(DomainError::IncompleteActivity {
                field: "channelId",
            }
            .into());
        }
        match self {
            Self::Conversation => {
                if activity.conversation.id.is_empty() {
                    return Err(DomainError::IncompleteActivity {
                        field: "conversation.id",
                    }
                    .into());
                }
                Ok(format!(
                    "{}/conversations/{}",
                    activity.channel_id, activity.conversation.id
                ))
            }
            Self::User => {
                if activity.from.id.is_empty() {
                    return Err(DomainError::IncompleteActivity { field: "from.id" }.into());
                }
                Ok(format!("{}/users/{}", activity.channel_id, activity.from.id))
            }
        }
    }
}

/// Turn-cached copy of one state blob.
#[derive(Debug, Clone, Default)]
pub(crate) struct CachedState {
    state: Map<String, Value>,
    /// Serialized form at load/save time; `None` forces the next save.
    persisted: Option<String>,
    e_tag: Option<String>,
}

impl CachedState {
    fn is_changed(&self) -> bool {
        match &self.persisted {
            Some(persisted) => serialize(&self.state) != *persisted,
            None => true,
        }
    }
}

fn serialize(state: &Map<String, Value>) -> String {
    Value::Object(state.clone()).to_string()
}

/// Conversation- or user-scoped state.
#[derive(Clone)]
pub struct BotState {
    scope: StateScope,
    storage: Arc<dyn Storage>,
}

impl BotState {
    pub fn new(scope: StateScope, storage: Arc<dyn Storage>) -> Self {
        Self { scope, storage }
    }

    pub fn conversation(storage: Arc<dyn Storage>) -> Self {
        Self::new(StateScope::Conversation, storage)
    }

    pub fn user(storage: Arc<dyn Storage>) -> Self {
        Self::new(StateScope::User, storage)
    }

    pub fn scope(&self) -> StateScope {
        self.scope
    }

    pub fn name(&self) -> &'static str {
        self.scope.name()
    }

    /// Load state into the turn cache unless it is already there.
    #[instrument(skip_all, fields(state = self.name(), force))]
    pub async fn load(&self, ctx: &mut TurnContext, force: bool) -> BotResult<()> {
        if !force && ctx.turn_state().state_cache.contains_key(self.name()) {
            return Ok(());
        }

        let key = self.scope.storage_key(ctx.activity())?;
        let items = self.storage.read(std::slice::from_ref(&key)).await?;
        let cached = match items.get(&key) {
            Some(item) => {
                let state = match &item.value {
                    Value::Object(map) => map.clone(),
                    _ => Map::new(),
                };
                CachedState {
                    persisted: Some(serialize(&state)),
                    state,
                    e_tag: item.e_tag.clone(),
                }
            }
            None => CachedState {
                persisted: Some(serialize(&Map::new())),
                ..CachedState::default()
            },
        };
        debug!(key = %key, "State loaded");
        ctx.turn_state_mut().state_cache.insert(self.name(), cached);
        Ok(())
    }

    /// Write the cached state when it changed, or always with `force`.
    #[instrument(skip_all, fields(state = self.name(), force))]
    pub async fn save_changes(&self, ctx: &mut TurnContext, force: bool) -> BotResult<()> {
        let Some(cached) = ctx.turn_state().state_cache.get(self.name()) else {
            return Ok(());
        };
        if !force && !cached.is_changed() {
            return Ok(());
        }

        let key = self.scope.storage_key(ctx.activity())?;
        let item = StoreItem {
            value: Value::Object(cached.state.clone()),
            e_tag: cached.e_tag.clone(),
        };
        let snapshot = serialize(&cached.state);
        let mut tags = self
            .storage
            .write(HashMap::from([(key.clone(), item)]))
            .await?;
        debug!(key = %key, "State saved");

        if let Some(cached) = ctx.turn_state_mut().state_cache.get_mut(self.name()) {
            cached.persisted = Some(snapshot);
            cached.e_tag = tags.remove(&key);
        }
        Ok(())
    }

    /// Replace the cached state with an empty one; the next save writes it.
    pub fn clear_state(&self, ctx: &mut TurnContext) {
        let e_tag = ctx
            .turn_state()
            .state_cache
            .get(self.name())
            .and_then(|c| c.e_tag.clone());
        ctx.turn_state_mut().state_cache.insert(
            self.name(),
            CachedState {
                state: Map::new(),
                persisted: None,
                e_tag,
            },
        );
    }

    /// Drop the cached state and delete it from storage.
    pub async fn delete(&self, ctx: &mut TurnContext) -> BotResult<()> {
        ctx.turn_state_mut().state_cache.remove(self.name());
        let key = self.scope.storage_key(ctx.activity())?;
        self.storage.delete(&[key]).await
    }

    /// Read a property, loading state first if needed.
    pub async fn get_property<T: DeserializeOwned>(
        &self,
        ctx: &mut TurnContext,
        name: &str,
    ) -> BotResult<Option<T>> {
        self.load(ctx, false).await?;
        let Some(value) = ctx
            .turn_state()
            .state_cache
            .get(self.name())
            .and_then(|c| c.state.get(name))
        else {
            return Ok(None);
        };
        serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| {
                ApplicationError::StorageFailure {
                    reason: format!("property '{name}' of {}: {e}", self.name()),
                }
                .into()
            })
    }

    /// Set a property in the turn cache, loading state first if needed.
    pub async fn set_property<T: Serialize>(
        &self,
        ctx: &mut TurnContext,
        name: &str,
        value: &T,
    ) -> BotResult<()> {
        self.load(ctx, false).await?;
        let value = serde_json::to_value(value).map_err(|e| ApplicationError::StorageFailure {
            reason: format!("property '{name}' of {}: {e}", self.name()),
        })?;
        if let Some(cached) = ctx.turn_state_mut().state_cache.get_mut(self.name()) {
            cached.state.insert(name.to_owned(), value);
        }
        Ok(())
    }

    pub async fn delete_property(&self, ctx: &mut TurnContext, name: &str) -> BotResult<()> {
        self.load(ctx, false).await?;
        if let Some(cached) = ctx.turn_state_mut().state_cache.get_mut(self.name()) {
            cached.state.remove(name);
        }
        Ok(())
    }
}
