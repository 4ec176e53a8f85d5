//! Infrastructure adapters for botkit.
//!
//! This crate provides implementations of the ports defined in `botkit-core`:
//!
//! | Port | Adapters |
//! |------|----------|
//! | `Storage` | [`storage::MemoryStorage`] |
//! | `TranscriptLogger` | [`transcript::MemoryTranscriptStore`], [`transcript::FileTranscriptLogger`], [`transcript::TraceTranscriptLogger`] |
//! | `ResourceCatalog` | [`catalog::FolderResourceCatalog`], [`catalog::MemoryResourceCatalog`] |
//! | `Filesystem` | [`filesystem::LocalFilesystem`], [`filesystem::MemoryFilesystem`] |
//! | `Dialog` | [`dialog::ReplyDialog`] |
//!
//! The declarative kinds for these adapters are added to a registry with
//! [`register_components`].

pub mod catalog;
pub mod dialog;
pub mod filesystem;
pub mod storage;
pub mod transcript;

use botkit_core::application::services::{ComponentCategory, ComponentRegistry};

pub use catalog::{FolderResourceCatalog, MemoryResourceCatalog};
pub use dialog::ReplyDialog;
pub use filesystem::{LocalFilesystem, MemoryFilesystem};
pub use storage::{MemoryStorage, MemoryStorageProvider};
pub use transcript::{
    FileTranscriptLogger, FileTranscriptLoggerBuilder, MemoryTranscriptStore,
    MemoryTranscriptStoreBuilder, TraceTranscriptLogger, TraceTranscriptLoggerBuilder,
};

/// Register the declarative kinds implemented in this crate.
pub fn register_components(registry: &mut ComponentRegistry) -> &mut ComponentRegistry {
    registry
        .register(
            MemoryStorageProvider::KIND,
            ComponentCategory::Storage,
            MemoryStorageProvider::decode,
        )
        .register(
            MemoryTranscriptStoreBuilder::KIND,
            ComponentCategory::TranscriptLogger,
            MemoryTranscriptStoreBuilder::decode,
        )
        .register(
            FileTranscriptLoggerBuilder::KIND,
            ComponentCategory::TranscriptLogger,
            FileTranscriptLoggerBuilder::decode,
        )
        .register(
            TraceTranscriptLoggerBuilder::KIND,
            ComponentCategory::TranscriptLogger,
            TraceTranscriptLoggerBuilder::decode,
        )
        .register(ReplyDialog::KIND, ComponentCategory::Dialog, ReplyDialog::decode)
}

/// Core kinds plus this crate's kinds.
pub fn default_registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::with_core_components();
    register_components(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_knows_adapter_kinds() {
        let registry = default_registry();
        for kind in [
            "Microsoft.MemoryStorage",
            "Microsoft.MemoryTranscriptStore",
            "Microsoft.FileTranscriptLogger",
            "Microsoft.TraceTranscriptLogger",
            "Microsoft.ReplyDialog",
            "Microsoft.BotCoreAdapter",
        ] {
            assert!(registry.contains(kind), "{kind} not registered");
        }
        assert_eq!(registry.kinds().count(), 15);
    }
}
