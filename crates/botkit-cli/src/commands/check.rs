//! `botkit check`: compose a bot folder and report what it registers.
//!
//! Resolving the adapter and the bot forces every lazy factory on the
//! path to a turn, so a folder that passes here can take messages.

use serde::Serialize;
use tracing::info;

use crate::{
    cli::CheckArgs,
    config::SETTINGS_DIRECTORY,
    error::CliResult,
    output::OutputManager,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckReport {
    root: String,
    environment: String,
    root_dialog: Option<String>,
    default_locale: Option<String>,
    resources: usize,
    registrations: Vec<&'static str>,
    middleware: Vec<String>,
}

pub fn execute(args: CheckArgs, output: OutputManager) -> CliResult<()> {
    let settings = super::load_settings(&args.bot)?;
    let services = super::compose(&settings)?;

    let adapter = services.adapter()?;
    services.bot()?;
    let options = services.bot_options()?;

    let report = CheckReport {
        root: settings.root.display().to_string(),
        environment: settings.environment.clone(),
        root_dialog: options.root_dialog.clone().or_else(|| {
            settings
                .configuration
                .get_str("defaultRootDialog")
                .map(str::to_owned)
        }),
        default_locale: options.default_locale.clone(),
        resources: services.catalog()?.resource_ids().len(),
        registrations: services.registrations().iter().map(|k| k.name()).collect(),
        middleware: adapter
            .middleware_names()
            .into_iter()
            .map(str::to_owned)
            .collect(),
    };
    info!(registrations = report.registrations.len(), "Bot folder checked");

    if output.is_json() {
        output.json_pretty(&report)?;
        return Ok(());
    }

    output.header(&format!("Bot at {} ({})", report.root, report.environment))?;
    if !settings.root.join(SETTINGS_DIRECTORY).is_dir() {
        output.warning(&format!(
            "No {SETTINGS_DIRECTORY}/ folder, using defaults and environment only"
        ))?;
    }
    output.print(&format!(
        "  Root dialog:  {}",
        report.root_dialog.as_deref().unwrap_or("-")
    ))?;
    output.print(&format!(
        "  Locale:       {}",
        report.default_locale.as_deref().unwrap_or("-")
    ))?;
    output.print(&format!("  Resources:    {}", report.resources))?;
    output.print(&format!("  Services:     {}", report.registrations.join(", ")))?;
    output.print(&format!("  Middleware:   {}", report.middleware.join(" \u{2192} ")))?;
    output.success("Bot composed")?;
    Ok(())
}
