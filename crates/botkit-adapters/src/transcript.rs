//! Transcript loggers.
//!
//! Each logger has a declarative kind that decodes to a transcript logger
//! builder. The same node works nested in a
//! `Microsoft.TranscriptLoggerMiddleware` and as the runtime's
//! `transcriptLogger`.

use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, RwLock},
};

use async_trait::async_trait;
use botkit_core::{
    application::{
        ApplicationError,
        builders::Builder,
        ports::{Filesystem, TranscriptLogger, TranscriptStore},
        services::{Component, ComponentRegistry, ServiceProvider, decode_fields},
    },
    domain::{Activity, BoolExpression, Configuration, DomainError, StringExpression},
    error::BotResult,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::filesystem::LocalFilesystem;

/// Extension of transcript files written by [`FileTranscriptLogger`].
pub const TRANSCRIPT_EXTENSION: &str = "transcript";

/// Target of the events emitted by [`TraceTranscriptLogger`].
pub const TRANSCRIPT_TRACE_TARGET: &str = "botkit::transcript";

fn transcript_ids(activity: &Activity) -> BotResult<(&str, &str)> {
    if activity.channel_id.is_empty() {
        return Err(DomainError::IncompleteActivity { field: "channelId" }.into());
    }
    if activity.conversation.id.is_empty() {
        return Err(DomainError::IncompleteActivity {
            field: "conversation.id",
        }
        .into());
    }
    Ok((&activity.channel_id, &activity.conversation.id))
}

// ── memory ──────────────────────────────────────────────────────────────────

type Transcripts = BTreeMap<String, BTreeMap<String, Vec<Activity>>>;

/// Transcripts kept in memory, keyed by channel then conversation.
#[derive(Debug, Clone, Default)]
pub struct MemoryTranscriptStore {
    inner: Arc<RwLock<Transcripts>>,
}

impl MemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TranscriptLogger for MemoryTranscriptStore {
    async fn log_activity(&self, activity: &Activity) -> BotResult<()> {
        let (channel_id, conversation_id) = transcript_ids(activity)?;
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;
        inner
            .entry(channel_id.to_owned())
            .or_default()
            .entry(conversation_id.to_owned())
            .or_default()
            .push(activity.clone());
        Ok(())
    }
}

#[async_trait]
impl TranscriptStore for MemoryTranscriptStore {
    async fn get_transcript_activities(
        &self,
        channel_id: &str,
        conversation_id: &str,
    ) -> BotResult<Vec<Activity>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ApplicationError::StoreLockError)?;
        Ok(inner
            .get(channel_id)
            .and_then(|conversations| conversations.get(conversation_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_transcripts(&self, channel_id: &str) -> BotResult<Vec<String>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ApplicationError::StoreLockError)?;
        Ok(inner
            .get(channel_id)
            .map(|conversations| conversations.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_transcript(&self, channel_id: &str, conversation_id: &str) -> BotResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;
        if let Some(conversations) = inner.get_mut(channel_id) {
            conversations.remove(conversation_id);
        }
        Ok(())
    }
}

/// `Microsoft.MemoryTranscriptStore`
///
/// One store per declaration: every build of the same node returns it.
#[derive(Debug, Clone, Default)]
pub struct MemoryTranscriptStoreBuilder {
    store: MemoryTranscriptStore,
}

impl MemoryTranscriptStoreBuilder {
    pub const KIND: &'static str = "Microsoft.MemoryTranscriptStore";

    pub fn decode(_value: &Value, _registry: &ComponentRegistry) -> BotResult<Component> {
        Ok(Component::TranscriptLogger(Arc::new(Self::default())))
    }

    pub fn store(&self) -> &MemoryTranscriptStore {
        &self.store
    }
}

impl Builder<Arc<dyn TranscriptLogger>> for MemoryTranscriptStoreBuilder {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn build(
        &self,
        _services: &ServiceProvider,
        _configuration: &Configuration,
    ) -> BotResult<Arc<dyn TranscriptLogger>> {
        Ok(Arc::new(self.store.clone()))
    }
}

// ── file ────────────────────────────────────────────────────────────────────

/// Writes each conversation to `<folder>/<channel>/<conversation>.transcript`
/// as a JSON array of activities.
///
/// In unit test mode the first activity of a conversation seen by this
/// logger replaces any transcript left by an earlier run. Outside unit test
/// mode no per-conversation state is kept.
pub struct FileTranscriptLogger {
    filesystem: Arc<dyn Filesystem>,
    folder: PathBuf,
    unit_test_mode: bool,
    started: Mutex<HashSet<PathBuf>>,
}

impl FileTranscriptLogger {
    pub fn new(filesystem: Arc<dyn Filesystem>, folder: impl Into<PathBuf>, unit_test_mode: bool) -> Self {
        Self {
            filesystem,
            folder: folder.into(),
            unit_test_mode,
            started: Mutex::new(HashSet::new()),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Where the transcript of `activity`'s conversation is written.
    pub fn transcript_path(&self, activity: &Activity) -> BotResult<PathBuf> {
        let (channel_id, conversation_id) = transcript_ids(activity)?;
        Ok(self
            .folder
            .join(sanitize(channel_id))
            .join(format!("{}.{}", sanitize(conversation_id), TRANSCRIPT_EXTENSION)))
    }

    /// Number of conversations whose transcript was reset by this logger.
    pub fn reset_conversations(&self) -> BotResult<usize> {
        let started = self
            .started
            .lock()
            .map_err(|_| ApplicationError::StoreLockError)?;
        Ok(started.len())
    }

    /// True when this activity starts a fresh transcript.
    fn starts_fresh(&self, path: &Path) -> BotResult<bool> {
        if !self.unit_test_mode {
            return Ok(false);
        }
        let mut started = self
            .started
            .lock()
            .map_err(|_| ApplicationError::StoreLockError)?;
        Ok(started.insert(path.to_path_buf()))
    }
}

/// Read-modify-write of one transcript file.
fn append(filesystem: &dyn Filesystem, path: &Path, fresh: bool, entry: Value) -> BotResult<()> {
    let mut activities: Vec<Value> = if !fresh && filesystem.exists(path) {
        let content = filesystem.read_file(path)?;
        serde_json::from_str(&content).map_err(|e| ApplicationError::FilesystemError {
            path: path.to_path_buf(),
            reason: format!("Transcript is not a JSON array: {}", e),
        })?
    } else {
        Vec::new()
    };
    activities.push(entry);

    let content = serde_json::to_string_pretty(&activities).map_err(|e| {
        ApplicationError::StorageFailure {
            reason: e.to_string(),
        }
    })?;
    if let Some(parent) = path.parent() {
        filesystem.create_dir_all(parent)?;
    }
    filesystem.write_file(path, &content)
}

impl fmt::Debug for FileTranscriptLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileTranscriptLogger")
            .field("folder", &self.folder)
            .field("unit_test_mode", &self.unit_test_mode)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TranscriptLogger for FileTranscriptLogger {
    #[instrument(skip_all, fields(conversation = %activity.conversation.id))]
    async fn log_activity(&self, activity: &Activity) -> BotResult<()> {
        let path = self.transcript_path(activity)?;
        let fresh = self.starts_fresh(&path)?;
        let entry = serde_json::to_value(activity).map_err(|e| ApplicationError::StorageFailure {
            reason: e.to_string(),
        })?;

        let filesystem = Arc::clone(&self.filesystem);
        let target = path.clone();
        tokio::task::spawn_blocking(move || append(filesystem.as_ref(), &target, fresh, entry))
            .await
            .map_err(|e| ApplicationError::StorageFailure {
                reason: format!("Transcript writer stopped: {e}"),
            })??;

        debug!(path = %path.display(), "Transcript updated");
        Ok(())
    }
}

/// Keep ids usable as single path components.
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `Microsoft.FileTranscriptLogger`
///
/// ```json
/// {
///   "$kind": "Microsoft.FileTranscriptLogger",
///   "folder": "transcripts",
///   "unitTestMode": false
/// }
/// ```
///
/// A relative `folder` is resolved against the configured `applicationRoot`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileTranscriptLoggerBuilder {
    pub folder: Option<StringExpression>,
    pub unit_test_mode: Option<BoolExpression>,
}

impl FileTranscriptLoggerBuilder {
    pub const KIND: &'static str = "Microsoft.FileTranscriptLogger";

    pub fn decode(value: &Value, _registry: &ComponentRegistry) -> BotResult<Component> {
        let builder: Self = decode_fields(Self::KIND, value)?;
        Ok(Component::TranscriptLogger(Arc::new(builder)))
    }

    fn resolve_folder(&self, configuration: &Configuration) -> BotResult<PathBuf> {
        let folder = match &self.folder {
            Some(expression) => expression.evaluate_optional(configuration)?,
            None => None,
        }
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ApplicationError::MissingArgument {
            param: "folder".into(),
        })?;

        let folder = PathBuf::from(folder);
        match configuration.get_str("applicationRoot") {
            Some(root) if folder.is_relative() => Ok(Path::new(root).join(folder)),
            _ => Ok(folder),
        }
    }
}

impl Builder<Arc<dyn TranscriptLogger>> for FileTranscriptLoggerBuilder {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn build(
        &self,
        _services: &ServiceProvider,
        configuration: &Configuration,
    ) -> BotResult<Arc<dyn TranscriptLogger>> {
        let folder = self.resolve_folder(configuration)?;
        let unit_test_mode = match &self.unit_test_mode {
            Some(expression) => expression.evaluate_optional(configuration)?.unwrap_or(false),
            None => false,
        };
        Ok(Arc::new(FileTranscriptLogger::new(
            Arc::new(LocalFilesystem::new()),
            folder,
            unit_test_mode,
        )))
    }
}

// ── trace ───────────────────────────────────────────────────────────────────

/// Emits activities as `tracing` events under [`TRANSCRIPT_TRACE_TARGET`].
#[derive(Debug, Clone, Copy)]
pub struct TraceTranscriptLogger {
    trace_activity: bool,
}

impl TraceTranscriptLogger {
    /// With `trace_activity` the whole activity is logged as JSON,
    /// otherwise a one-line summary.
    pub fn new(trace_activity: bool) -> Self {
        Self { trace_activity }
    }
}

impl Default for TraceTranscriptLogger {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl TranscriptLogger for TraceTranscriptLogger {
    async fn log_activity(&self, activity: &Activity) -> BotResult<()> {
        if self.trace_activity {
            let json = serde_json::to_string(activity).map_err(|e| {
                ApplicationError::StorageFailure {
                    reason: e.to_string(),
                }
            })?;
            info!(target: TRANSCRIPT_TRACE_TARGET, activity = %json, "Activity");
        } else {
            info!(
                target: TRANSCRIPT_TRACE_TARGET,
                activity_type = ?activity.activity_type,
                from = activity.from.name.as_deref().unwrap_or(&activity.from.id),
                text = activity.text(),
                "Activity"
            );
        }
        Ok(())
    }
}

/// `Microsoft.TraceTranscriptLogger`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TraceTranscriptLoggerBuilder {
    pub trace_activity: Option<BoolExpression>,
}

impl TraceTranscriptLoggerBuilder {
    pub const KIND: &'static str = "Microsoft.TraceTranscriptLogger";

    pub fn decode(value: &Value, _registry: &ComponentRegistry) -> BotResult<Component> {
        let builder: Self = decode_fields(Self::KIND, value)?;
        Ok(Component::TranscriptLogger(Arc::new(builder)))
    }
}

impl Builder<Arc<dyn TranscriptLogger>> for TraceTranscriptLoggerBuilder {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn build(
        &self,
        _services: &ServiceProvider,
        configuration: &Configuration,
    ) -> BotResult<Arc<dyn TranscriptLogger>> {
        let trace_activity = match &self.trace_activity {
            Some(expression) => expression.evaluate_optional(configuration)?.unwrap_or(true),
            None => true,
        };
        Ok(Arc::new(TraceTranscriptLogger::new(trace_activity)))
    }
}

// ── tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::MemoryFilesystem;
    use botkit_core::{application::services::ServiceCollection, domain::ConversationAccount};
    use serde_json::json;

    fn activity(conversation: &str, text: &str) -> Activity {
        let mut activity = Activity::message(text);
        activity.channel_id = "test".into();
        activity.conversation = ConversationAccount::new(conversation);
        activity
    }

    #[tokio::test]
    async fn memory_store_groups_by_conversation() {
        let store = MemoryTranscriptStore::new();
        store.log_activity(&activity("a", "one")).await.unwrap();
        store.log_activity(&activity("b", "two")).await.unwrap();
        store.log_activity(&activity("a", "three")).await.unwrap();

        let texts: Vec<_> = store
            .get_transcript_activities("test", "a")
            .await
            .unwrap()
            .iter()
            .map(|a| a.text().to_owned())
            .collect();
        assert_eq!(texts, ["one", "three"]);
        assert_eq!(store.list_transcripts("test").await.unwrap(), ["a", "b"]);

        store.delete_transcript("test", "a").await.unwrap();
        assert_eq!(store.list_transcripts("test").await.unwrap(), ["b"]);
    }

    #[tokio::test]
    async fn activities_without_conversation_are_rejected() {
        let store = MemoryTranscriptStore::new();
        assert!(store.log_activity(&Activity::message("hi")).await.is_err());
    }

    #[tokio::test]
    async fn memory_builder_shares_one_store() {
        let builder = MemoryTranscriptStoreBuilder::default();
        let services = ServiceCollection::new().build();
        let logger = builder.build(&services, &Configuration::empty()).unwrap();
        logger.log_activity(&activity("a", "hi")).await.unwrap();

        let again = builder.build(&services, &Configuration::empty()).unwrap();
        again.log_activity(&activity("a", "again")).await.unwrap();
        assert_eq!(
            builder.store().get_transcript_activities("test", "a").await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn file_logger_appends_json_array() {
        let fs = MemoryFilesystem::new();
        let logger = FileTranscriptLogger::new(Arc::new(fs.clone()), "transcripts", false);
        let first = activity("conv|1", "one");
        logger.log_activity(&first).await.unwrap();
        logger.log_activity(&activity("conv|1", "two")).await.unwrap();

        let path = logger.transcript_path(&first).unwrap();
        assert_eq!(path, Path::new("transcripts/test/conv_1.transcript"));
        let written: Vec<Activity> = serde_json::from_str(&fs.read_file(&path).unwrap()).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(written[1].text(), "two");
    }

    #[tokio::test]
    async fn file_logger_tracks_no_conversations_outside_unit_test_mode() {
        let dir = tempfile::TempDir::new().unwrap();
        let logger = FileTranscriptLogger::new(Arc::new(LocalFilesystem), dir.path(), false);
        for conversation in ["a", "b", "c"] {
            logger.log_activity(&activity(conversation, "hi")).await.unwrap();
        }

        assert_eq!(logger.reset_conversations().unwrap(), 0);
        assert!(dir.path().join("test").join("b.transcript").is_file());
    }

    #[tokio::test]
    async fn unit_test_mode_replaces_earlier_runs() {
        let fs = MemoryFilesystem::new();
        let path = Path::new("transcripts/test/conv.transcript");
        fs.create_dir_all(Path::new("transcripts/test")).unwrap();
        fs.write_file(path, &json!([{ "type": "message", "text": "old" }]).to_string())
            .unwrap();

        let logger = FileTranscriptLogger::new(Arc::new(fs.clone()), "transcripts", true);
        logger.log_activity(&activity("conv", "new")).await.unwrap();
        logger.log_activity(&activity("conv", "newer")).await.unwrap();

        let written: Vec<Activity> = serde_json::from_str(&fs.read_file(path).unwrap()).unwrap();
        let texts: Vec<_> = written.iter().map(Activity::text).collect();
        assert_eq!(texts, ["new", "newer"]);
        assert_eq!(logger.reset_conversations().unwrap(), 1);
    }

    #[test]
    fn file_builder_requires_folder() {
        let services = ServiceCollection::new().build();
        let err = FileTranscriptLoggerBuilder::default()
            .build(&services, &Configuration::empty())
            .err()
            .unwrap();
        assert_eq!(err.param_name(), Some("folder"));
    }

    #[test]
    fn file_builder_resolves_relative_folder() {
        let builder: FileTranscriptLoggerBuilder =
            serde_json::from_value(json!({ "folder": "=transcriptFolder" })).unwrap();
        let configuration = Configuration::new(json!({
            "applicationRoot": "/bots/echo",
            "transcriptFolder": "logs"
        }));
        assert_eq!(
            builder.resolve_folder(&configuration).unwrap(),
            Path::new("/bots/echo/logs")
        );
    }

    #[tokio::test]
    async fn trace_logger_accepts_any_activity() {
        let services = ServiceCollection::new().build();
        let builder: TraceTranscriptLoggerBuilder =
            serde_json::from_value(json!({ "traceActivity": false })).unwrap();
        let logger = builder.build(&services, &Configuration::empty()).unwrap();
        logger.log_activity(&Activity::typing()).await.unwrap();
    }
}
