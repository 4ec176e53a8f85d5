//! Application services - composition and turn orchestration.
//!
//! The container and registry turn declarative configuration into live
//! objects; the adapter and bot run turns through them.

pub mod adapter;
pub mod bot;
pub mod composition;
pub mod container;
pub mod registry;

pub use adapter::{
    CoreBotAdapter, CoreBotAdapterOptions, DefaultTurnErrorHandler, TurnErrorHandler,
    resolve_conversation_state,
};
pub use bot::{CoreBot, CoreBotDependencies, CoreBotOptions};
pub use composition::add_bot_core;
pub use container::{ServiceCollection, ServiceKind, ServiceProvider};
pub use registry::{Component, ComponentCategory, ComponentRegistry, decode_fields};
