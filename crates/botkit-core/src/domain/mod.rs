// ============================================================================
//  CLEAN MODULE BOUNDARIES
// ============================================================================

//! Core domain layer for botkit.
//!
//! This module contains pure logic with no I/O: the activity model, caller
//! claims, configuration lookup and declarative expressions. Everything that
//! touches storage, transports or the filesystem is reached through ports
//! defined in the application layer.
//!
//! ## Hexagonal Architecture Compliance
//!
//! - **No async**: Domain logic is synchronous
//! - **No I/O**: No filesystem, network, or external calls
//! - **Serde-friendly**: Everything a channel or a declarative file carries
//!   round-trips through JSON
pub mod activity;
pub mod claims;
pub mod configuration;
pub mod error;
pub mod expression;
pub mod resource;

// Re-exports for convenience
pub use activity::{
    Activity, ActivityType, ChannelAccount, ConversationAccount, ConversationReference, Entity,
    Mention,
};
pub use claims::{Claim, ClaimsIdentity};
pub use configuration::{Configuration, ConfigurationEvaluator, ExpressionEvaluator};
pub use error::DomainError;
pub use expression::{BoolExpression, ExpressionProperty, IntExpression, StringExpression};
pub use resource::{RUNTIME_CONFIGURATION_RESOURCE, Resource};
