//! Resource catalogs.
//!
//! # Bot folder layout
//!
//! ```text
//! echo-bot/
//! ├── runtime.json           ← root provider (required)
//! ├── echo-bot.dialog        ← root dialog
//! ├── dialogs/
//! │   └── greeting.dialog
//! └── settings/
//!     └── appsettings.json   ← read by the host, not a resource
//! ```
//!
//! Resource ids are file names, so `dialogs/greeting.dialog` is
//! `greeting.dialog`. When two files share a name the first one in
//! file-name order wins.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use botkit_core::{
    application::{ApplicationError, ports::ResourceCatalog},
    domain::Resource,
    error::BotResult,
};
use tracing::{debug, instrument, warn};
use walkdir::{DirEntry, WalkDir};

/// Directories never searched for resources.
const SKIPPED_DIRECTORIES: [&str; 4] = ["bin", "obj", "node_modules", "target"];

/// Resources read from a bot folder on disk.
///
/// The folder is indexed once; content is read on every lookup.
#[derive(Debug, Clone)]
pub struct FolderResourceCatalog {
    root: PathBuf,
    resources: BTreeMap<String, PathBuf>,
}

impl FolderResourceCatalog {
    /// Index every file under `root`.
    #[instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub fn new(root: impl AsRef<Path>) -> BotResult<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(ApplicationError::FilesystemError {
                path: root,
                reason: "Bot folder does not exist or is not a directory".into(),
            }
            .into());
        }

        let mut resources: BTreeMap<String, PathBuf> = BTreeMap::new();
        let walker = WalkDir::new(&root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_skipped(entry));

        for entry in walker {
            let entry = entry.map_err(|e| ApplicationError::FilesystemError {
                path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone()),
                reason: format!("directory walk error: {e}"),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let id = entry.file_name().to_string_lossy().into_owned();
            if let Some(existing) = resources.get(&id) {
                warn!(
                    id = %id,
                    kept = %existing.display(),
                    ignored = %entry.path().display(),
                    "Duplicate resource id"
                );
                continue;
            }
            resources.insert(id, entry.into_path());
        }

        debug!(resources = resources.len(), "Bot folder indexed");
        Ok(Self { root, resources })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn is_skipped(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    entry.file_type().is_dir()
        && (name.starts_with('.') || SKIPPED_DIRECTORIES.contains(&name.as_ref()))
}

impl ResourceCatalog for FolderResourceCatalog {
    fn get_resource(&self, id: &str) -> BotResult<Resource> {
        let path = self
            .resources
            .get(id)
            .ok_or_else(|| ApplicationError::ResourceNotFound { id: id.into() })?;
        let content = fs::read_to_string(path).map_err(|e| ApplicationError::FilesystemError {
            path: path.clone(),
            reason: format!("Failed to read resource: {}", e),
        })?;
        Ok(Resource::new(id, content).with_source(path))
    }

    fn contains(&self, id: &str) -> bool {
        self.resources.contains_key(id)
    }

    fn resource_ids(&self) -> Vec<String> {
        self.resources.keys().cloned().collect()
    }
}

/// Resources held in memory, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryResourceCatalog {
    resources: BTreeMap<String, String>,
}

impl MemoryResourceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(mut self, id: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(id, content);
        self
    }

    /// Add or replace a resource.
    pub fn insert(&mut self, id: impl Into<String>, content: impl Into<String>) {
        self.resources.insert(id.into(), content.into());
    }
}

impl ResourceCatalog for MemoryResourceCatalog {
    fn get_resource(&self, id: &str) -> BotResult<Resource> {
        self.resources
            .get(id)
            .map(|content| Resource::new(id, content.clone()))
            .ok_or_else(|| ApplicationError::ResourceNotFound { id: id.into() }.into())
    }

    fn contains(&self, id: &str) -> bool {
        self.resources.contains_key(id)
    }

    fn resource_ids(&self) -> Vec<String> {
        self.resources.keys().cloned().collect()
    }
}

// ── tests ───────────────────────────────────────────────────────────────────
