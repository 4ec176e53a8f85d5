//! Application ports (traits) for external dependencies.
//!
//! In hexagonal architecture, ports define interfaces that the application
//! needs from the outside world. Adapters in `botkit-adapters` implement these.
//!
//! ## Port Types
//!
//! - **Driven (Output) Ports**: Called by application, implemented by infrastructure
//!   - `Storage`: conversation / user state persistence
//!   - `ResourceCatalog`: named declarative resources
//!   - `TranscriptLogger` / `TranscriptStore`: activity transcripts
//!   - `TelemetryClient`: event tracking
//!   - `SkillTransport`: delivery of activities to skills
//!   - `Filesystem`: file operations
//!
//! - **Driving (Input) Ports**: Called by external world, implemented by application
//!   - `Bot` (see `crate::application::turn`), driven through `CoreBotAdapter`

pub mod output;

pub use output::{
    Filesystem, InvokeResponse, ResourceCatalog, SkillRequest, SkillTransport, Storage, StoreItem,
    TelemetryClient, TelemetryProperties, TranscriptLogger, TranscriptStore,
};

#[cfg(test)]
pub use output::{MockSkillTransport, MockStorage};
