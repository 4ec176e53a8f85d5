//! botkit Core - Hexagonal Architecture Implementation
//!
//! This crate provides the domain and application layers for botkit: the
//! activity model, the declarative provider/builder composition graph and
//! the turn pipeline (adapter, middleware, bot), following hexagonal
//! (ports and adapters) architecture.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           botkit-cli (host)             │
//! │   (layered config, console channel)     │
//! └──────────────────┬──────────────────────┘
//!                    │ calls add_bot_core / process_activity
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │         Application Services            │
//! │ (container, registry, CoreBotAdapter,   │
//! │        CoreBot, composition)            │
//! └──────────────────┬──────────────────────┘
//!                    │ uses
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │      Application Ports (Traits)         │
//! │ (Storage, ResourceCatalog, Transcript,  │
//! │   Telemetry, SkillTransport, Dialog)    │
//! └──────────────────┬──────────────────────┘
//!                    │ implemented by
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │     botkit-adapters (Infrastructure)    │
//! │ (MemoryStorage, FolderResourceCatalog,  │
//! │   transcript loggers, ReplyDialog)      │
//! └─────────────────────────────────────────┘
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │         Domain Layer (Pure Logic)       │
//! │ (Activity, Claims, Configuration,       │
//! │        ExpressionProperty)              │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use botkit_core::prelude::*;
//!
//! # async fn demo(catalog: Arc<dyn ResourceCatalog>, registry: ComponentRegistry) -> BotResult<()> {
//! let configuration = Configuration::new(serde_json::json!({ "defaultRootDialog": "root.dialog" }));
//!
//! // 1. Compose services from `runtime.json`
//! let mut services = ServiceCollection::new();
//! add_bot_core(&mut services, &configuration, catalog, Arc::new(registry))?;
//! let provider = services.build();
//!
//! // 2. Run a turn
//! let adapter = provider.adapter()?;
//! let bot = provider.bot()?;
//! let replies = adapter
//!     .process_activity(Activity::message("hi"), None, bot.as_ref(), CancellationToken::new())
//!     .await?;
//! # let _ = replies;
//! # Ok(())
//! # }
//! ```

// Domain layer (stable, well-defined API)
pub mod domain;

// Application layer (orchestration logic)
pub mod application;

// Error types
pub mod error;

// Public API - what external crates should use
pub mod prelude {
    pub use crate::application::{
        builders::{Builder, SharedMiddlewareBuilder, SharedOnTurnErrorBuilder, SharedTranscriptLoggerBuilder},
        dialog::{Dialog, DialogContext, DialogManager, DialogTurnResult, DialogTurnStatus},
        middleware::{Middleware, MiddlewareSet, Next},
        ports::{
            Filesystem, ResourceCatalog, SkillTransport, Storage, StoreItem, TelemetryClient,
            TranscriptLogger, TranscriptStore,
        },
        providers::{Provider, RuntimeConfigurationProvider},
        services::{
            Component, ComponentCategory, ComponentRegistry, CoreBot, CoreBotAdapter,
            CoreBotAdapterOptions, CoreBotOptions, ServiceCollection, ServiceKind, ServiceProvider,
            TurnErrorHandler, add_bot_core,
        },
        state::{BotState, StateScope},
        turn::{Bot, Outbox, TurnContext, TurnState},
    };
    pub use crate::domain::{
        Activity, ActivityType, BoolExpression, ChannelAccount, ClaimsIdentity, Configuration,
        ConversationAccount, ConversationReference, IntExpression, Resource, StringExpression,
    };
    pub use crate::error::{BotError, BotResult};
    pub use tokio_util::sync::CancellationToken;
}

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
