//! Command handlers.
//!
//! Every bot-facing command starts the same way: layer the settings for the
//! bot folder, then compose its services from `runtime.json`.

pub mod check;
pub mod completions;
pub mod config;
pub mod run;

use std::sync::Arc;

use botkit_adapters::{FolderResourceCatalog, default_registry};
use botkit_core::prelude::{ServiceCollection, ServiceProvider, add_bot_core};
use tracing::instrument;

use crate::{
    cli::BotArgs,
    config::BotSettings,
    error::{CliError, CliResult},
};

/// Layer the settings for the bot folder in `args`.
pub(crate) fn load_settings(args: &BotArgs) -> CliResult<BotSettings> {
    if !args.root.is_dir() {
        return Err(CliError::BotFolderNotFound {
            path: args.root.clone(),
        });
    }
    BotSettings::load(args).map_err(|e| CliError::config("Failed to load bot settings", e))
}

/// Compose the bot's services from the resources in its folder.
#[instrument(skip_all, fields(root = %settings.root.display()))]
pub(crate) fn compose(settings: &BotSettings) -> CliResult<ServiceProvider> {
    let catalog = FolderResourceCatalog::new(&settings.root)?;
    let mut services = ServiceCollection::new();
    add_bot_core(
        &mut services,
        &settings.configuration,
        Arc::new(catalog),
        Arc::new(default_registry()),
    )?;
    Ok(services.build())
}
