//! Driven (output) ports - implemented by infrastructure.
//!
//! These traits define what the application needs from external systems.
//! The `botkit-adapters` crate provides implementations.

use std::{collections::BTreeMap, collections::HashMap, path::Path};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{Activity, Resource},
    error::{BotError, BotResult},
};

/// A persisted state blob with its optimistic concurrency token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreItem {
    pub value: Value,
    /// `None` or `"*"` writes unconditionally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e_tag: Option<String>,
}

impl StoreItem {
    pub fn new(value: Value) -> Self {
        Self { value, e_tag: None }
    }
}

/// Port for conversation and user state persistence.
///
/// Implemented by:
/// - `botkit_adapters::storage::MemoryStorage` (in-process)
///
/// Implementations must provide conversation-scoped consistency; turns of
/// one conversation are not serialized by the pipeline itself.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read the items stored under `keys`; missing keys are simply absent.
    async fn read(&self, keys: &[String]) -> BotResult<HashMap<String, StoreItem>>;

    /// Write `changes`, returning the new eTag of every written key.
    async fn write(&self, changes: HashMap<String, StoreItem>) -> BotResult<HashMap<String, String>>;

    /// Delete `keys`; deleting a missing key is not an error.
    async fn delete(&self, keys: &[String]) -> BotResult<()>;
}

/// Port for named declarative resources.
///
/// Implemented by:
/// - `botkit_adapters::catalog::FolderResourceCatalog` (bot folder on disk)
/// - `botkit_adapters::catalog::MemoryResourceCatalog` (tests, embedding)
pub trait ResourceCatalog: Send + Sync {
    /// Resolve `id`, failing with `ResourceNotFound` naming it.
    fn get_resource(&self, id: &str) -> BotResult<Resource>;

    fn contains(&self, id: &str) -> bool;

    /// All resource ids, sorted.
    fn resource_ids(&self) -> Vec<String>;
}

/// Port for recording the activities of a conversation.
#[async_trait]
pub trait TranscriptLogger: Send + Sync {
    async fn log_activity(&self, activity: &Activity) -> BotResult<()>;
}

/// A transcript logger that can also read transcripts back.
#[async_trait]
pub trait TranscriptStore: TranscriptLogger {
    async fn get_transcript_activities(
        &self,
        channel_id: &str,
        conversation_id: &str,
    ) -> BotResult<Vec<Activity>>;

    /// Conversation ids with a transcript on `channel_id`.
    async fn list_transcripts(&self, channel_id: &str) -> BotResult<Vec<String>>;

    async fn delete_transcript(&self, channel_id: &str, conversation_id: &str) -> BotResult<()>;
}

pub type TelemetryProperties = BTreeMap<String, String>;

/// Port for telemetry.
pub trait TelemetryClient: Send + Sync {
    fn track_event(&self, name: &str, properties: &TelemetryProperties);

    fn track_exception(&self, error: &BotError, properties: &TelemetryProperties);
}

/// An activity addressed to a skill.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillRequest {
    pub from_bot_id: Option<String>,
    pub to_bot_id: String,
    pub to_url: String,
    /// Where the skill sends its replies.
    pub service_url: String,
    pub conversation_id: String,
    pub activity: Activity,
}

/// Response of a skill to a delivered activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeResponse {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl InvokeResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Port for delivering activities to skills (HTTP in production).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SkillTransport: Send + Sync {
    async fn post_activity(&self, request: SkillRequest) -> BotResult<InvokeResponse>;
}

/// Port for filesystem operations.
///
/// Implemented by:
/// - `botkit_adapters::filesystem::LocalFilesystem` (production)
/// - `botkit_adapters::filesystem::MemoryFilesystem` (testing)
pub trait Filesystem: Send + Sync {
    /// Create a directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> BotResult<()>;

    /// Write content to a file, replacing it.
    fn write_file(&self, path: &Path, content: &str) -> BotResult<()>;

    /// Read a whole file as UTF-8.
    fn read_file(&self, path: &Path) -> BotResult<String>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Remove a single file.
    fn remove_file(&self, path: &Path) -> BotResult<()>;
}
