//! Application layer for botkit.
//!
//! This layer contains:
//! - **Ports**: Interface definitions (traits) for storage, catalogs,
//!   transcripts, telemetry and the skill transport
//! - **Turn pipeline**: [`turn`], [`state`], [`middleware`] and [`dialog`]
//! - **Composition**: declarative [`providers`] and [`builders`], resolved
//!   through the [`services`] container and component registry
//! - **Skills**: conversation-id factory, client and inbound handler
//! - **Errors**: Application-specific error types
//!
//! Pure data rules (activities, claims, expressions) live in `crate::domain`.

pub mod builders;
pub mod dialog;
pub mod error;
pub mod middleware;
pub mod ports;
pub mod providers;
pub mod services;
pub mod skills;
pub mod state;
pub mod turn;

// Re-export main services
pub use services::{
    ComponentRegistry, CoreBot, CoreBotAdapter, ServiceCollection, ServiceProvider, add_bot_core,
};

// Re-export port traits (for adapter implementation)
pub use ports::{
    Filesystem, ResourceCatalog, SkillTransport, Storage, TelemetryClient, TranscriptLogger,
    TranscriptStore,
};

pub use error::ApplicationError;
