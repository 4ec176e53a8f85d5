//! In-memory state storage.
//!
//! Items live for the life of the process. Every write hands out a new
//! eTag; writing with a stale eTag fails with `EtagConflict`.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use botkit_core::{
    application::{
        ApplicationError,
        ports::{Storage, StoreItem},
        providers::Provider,
        services::{Component, ComponentRegistry, ServiceCollection, decode_fields},
    },
    domain::Configuration,
    error::BotResult,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

/// eTag that matches any stored version.
const ANY_ETAG: &str = "*";

/// Thread-safe in-memory [`Storage`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<RwLock<MemoryStorageInner>>,
}

#[derive(Debug, Default)]
struct MemoryStorageInner {
    items: HashMap<String, StoreItem>,
    last_etag: u64,
}

impl MemoryStorageInner {
    fn next_etag(&mut self) -> String {
        self.last_etag += 1;
        self.last_etag.to_string()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-filled with `items`, each given a fresh eTag.
    pub fn with_items(items: impl IntoIterator<Item = (String, Value)>) -> Self {
        let mut inner = MemoryStorageInner::default();
        for (key, value) in items {
            let e_tag = inner.next_etag();
            inner.items.insert(
                key,
                StoreItem {
                    value,
                    e_tag: Some(e_tag),
                },
            );
        }
        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self
            .inner
            .read()
            .map(|i| i.items.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read(&self, keys: &[String]) -> BotResult<HashMap<String, StoreItem>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ApplicationError::StoreLockError)?;

        Ok(keys
            .iter()
            .filter_map(|key| inner.items.get(key).map(|item| (key.clone(), item.clone())))
            .collect())
    }

    #[instrument(skip_all, fields(items = changes.len()))]
    async fn write(&self, changes: HashMap<String, StoreItem>) -> BotResult<HashMap<String, String>> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;

        // All or nothing: check every eTag before writing any item.
        for (key, change) in &changes {
            let (Some(expected), Some(stored)) = (change.e_tag.as_deref(), inner.items.get(key))
            else {
                continue;
            };
            if expected != ANY_ETAG && stored.e_tag.as_deref() != Some(expected) {
                warn!(key = %key, expected, "eTag conflict");
                return Err(ApplicationError::EtagConflict { key: key.clone() }.into());
            }
        }

        let mut tags = HashMap::with_capacity(changes.len());
        for (key, change) in changes {
            let e_tag = inner.next_etag();
            inner.items.insert(
                key.clone(),
                StoreItem {
                    value: change.value,
                    e_tag: Some(e_tag.clone()),
                },
            );
            tags.insert(key, e_tag);
        }
        debug!(written = tags.len(), "Items written");
        Ok(tags)
    }

    async fn delete(&self, keys: &[String]) -> BotResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;
        for key in keys {
            inner.items.remove(key);
        }
        Ok(())
    }
}

/// `Microsoft.MemoryStorage`
///
/// ```json
/// {
///   "$kind": "Microsoft.MemoryStorage",
///   "content": { "test/users/ada": { "name": "Ada" } }
/// }
/// ```
///
/// `content` seeds the store; only object values are kept.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryStorageProvider {
    pub content: Map<String, Value>,
}

impl MemoryStorageProvider {
    pub const KIND: &'static str = "Microsoft.MemoryStorage";

    pub fn decode(value: &Value, _registry: &ComponentRegistry) -> BotResult<Component> {
        let provider: Self = decode_fields(Self::KIND, value)?;
        Ok(Component::Storage(Arc::new(provider)))
    }

    fn seed_items(&self) -> Vec<(String, Value)> {
        self.content
            .iter()
            .filter_map(|(key, value)| {
                if value.is_object() {
                    Some((key.clone(), value.clone()))
                } else {
                    warn!(key = %key, "Ignoring non-object memory storage seed");
                    None
                }
            })
            .collect()
    }
}

impl Provider for MemoryStorageProvider {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn configure_services(
        &self,
        services: &mut ServiceCollection,
        _configuration: &Configuration,
    ) -> BotResult<()> {
        let items = self.seed_items();
        services.add_storage(move |_| {
            Ok(Arc::new(MemoryStorage::with_items(items.clone())) as Arc<dyn Storage>)
        });
        Ok(())
    }
}

// ── tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use botkit_core::error::BotError;
    use serde_json::json;

    fn change(value: Value, e_tag: Option<&str>) -> StoreItem {
        StoreItem {
            value,
            e_tag: e_tag.map(str::to_owned),
        }
    }

    #[tokio::test]
    async fn writes_assign_increasing_etags() {
        let storage = MemoryStorage::new();
        let first = storage
            .write(HashMap::from([("a".to_string(), change(json!({"n": 1}), None))]))
            .await
            .unwrap();
        let second = storage
            .write(HashMap::from([("a".to_string(), change(json!({"n": 2}), first.get("a").map(String::as_str)))]))
            .await
            .unwrap();
        assert_ne!(first["a"], second["a"]);

        let read = storage.read(&["a".to_string(), "missing".to_string()]).await.unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read["a"].value, json!({"n": 2}));
        assert_eq!(read["a"].e_tag.as_deref(), Some(second["a"].as_str()));
    }

    #[tokio::test]
    async fn stale_etag_is_a_conflict() {
        let storage = MemoryStorage::new();
        let tags = storage
            .write(HashMap::from([("a".to_string(), change(json!({}), None))]))
            .await
            .unwrap();
        storage
            .write(HashMap::from([("a".to_string(), change(json!({"x": 1}), None))]))
            .await
            .unwrap();

        let err = storage
            .write(HashMap::from([("a".to_string(), change(json!({"x": 2}), Some(tags["a"].as_str())))]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BotError::Application(ApplicationError::EtagConflict { ref key }) if key == "a"
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn wildcard_etag_always_writes() {
        let storage = MemoryStorage::with_items([("a".to_string(), json!({}))]);
        storage
            .write(HashMap::from([("a".to_string(), change(json!({"x": 1}), Some("*")))]))
            .await
            .unwrap();
        assert_eq!(storage.read(&["a".to_string()]).await.unwrap()["a"].value, json!({"x": 1}));
    }

    #[tokio::test]
    async fn delete_ignores_missing_keys() {
        let storage = MemoryStorage::with_items([("a".to_string(), json!({}))]);
        storage.delete(&["a".to_string(), "b".to_string()]).await.unwrap();
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn provider_seeds_object_content() {
        let registry = ComponentRegistry::new();
        let Component::Storage(provider) = MemoryStorageProvider::decode(
            &json!({
                "$kind": "Microsoft.MemoryStorage",
                "content": { "test/users/ada": { "name": "Ada" }, "junk": 5 }
            }),
            &registry,
        )
        .unwrap() else {
            panic!("expected a storage provider");
        };

        let mut services = ServiceCollection::new();
        provider
            .configure_services(&mut services, &Configuration::empty())
            .unwrap();
        let storage = services.build().storage().unwrap();

        let read = storage
            .read(&["test/users/ada".to_string(), "junk".to_string()])
            .await
            .unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read["test/users/ada"].value["name"], "Ada");
    }
}
