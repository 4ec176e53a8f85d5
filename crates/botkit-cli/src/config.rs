//! Layered bot configuration.
//!
//! [`BotSettings`] is loaded once per command and handed to core as a
//! [`Configuration`].  Core never reads files or the environment itself.
//!
//! # Resolution order (highest priority first)
//!
//! 1. `--set key=value` overrides
//! 2. Environment variables (`__` separates levels: `BOT__LOCALE`)
//! 3. `settings/appsettings.<environment>.json`
//! 4. `settings/appsettings.json`
//! 5. Built-in defaults: `applicationRoot`, `bot`, `defaultRootDialog`
//!
//! Keys on the command line may use `:` or `.` between levels.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use botkit_core::domain::Configuration;
use config::{Environment, File, FileFormat};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::cli::BotArgs;

/// Folder under the bot root holding the settings files.
pub const SETTINGS_DIRECTORY: &str = "settings";

const DIALOG_EXTENSION: &str = "dialog";
const ENVIRONMENT_SEPARATOR: &str = "__";

/// Settings for one bot folder.
#[derive(Debug, Clone)]
pub struct BotSettings {
    /// Absolute bot folder.
    pub root: PathBuf,
    pub environment: String,
    pub configuration: Configuration,
}

impl BotSettings {
    /// Layer every source for the bot folder in `args`.
    #[instrument(skip_all, fields(root = %args.root.display(), environment = %args.environment))]
    pub fn load(args: &BotArgs) -> anyhow::Result<Self> {
        let root = std::path::absolute(&args.root)
            .with_context(|| format!("Cannot resolve bot folder '{}'", args.root.display()))?;
        let settings = root.join(SETTINGS_DIRECTORY);
        let root_text = root.to_string_lossy().into_owned();

        let mut builder = config::Config::builder()
            .set_default("applicationRoot", root_text.as_str())?
            .set_default("bot", root_text.as_str())?;
        if let Some(dialog) = default_root_dialog(&root)? {
            builder = builder.set_default("defaultRootDialog", dialog)?;
        }

        builder = builder
            .add_source(settings_file(&settings.join("appsettings.json")))
            .add_source(settings_file(
                &settings.join(format!("appsettings.{}.json", args.environment)),
            ))
            .add_source(Environment::default().separator(ENVIRONMENT_SEPARATOR));

        for (key, value) in &args.overrides {
            builder = builder.set_override(config_key(key), value.as_str())?;
        }

        let layered: Value = builder
            .build()
            .context("Failed to read bot settings")?
            .try_deserialize()
            .context("Bot settings are not a JSON object")?;
        debug!(
            keys = layered.as_object().map_or(0, |map| map.len()),
            "Bot settings loaded"
        );

        Ok(Self {
            root,
            environment: args.environment.clone(),
            configuration: Configuration::new(layered),
        })
    }
}

fn settings_file(path: &Path) -> File<config::FileSourceFile, FileFormat> {
    File::from(path).format(FileFormat::Json).required(false)
}

/// `bot:entry` → `bot.entry`.
fn config_key(key: &str) -> String {
    key.replace(':', ".")
}

/// First `*.dialog` file directly inside `root`, by name.
fn default_root_dialog(root: &Path) -> anyhow::Result<Option<String>> {
    if !root.is_dir() {
        return Ok(None);
    }
    let mut dialogs: Vec<String> = fs::read_dir(root)
        .with_context(|| format!("Cannot list bot folder '{}'", root.display()))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(DIALOG_EXTENSION))
        })
        .filter_map(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
        .collect();
    dialogs.sort();
    Ok(dialogs.into_iter().next())
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(root: &Path) -> BotArgs {
        BotArgs {
            root: root.to_path_buf(),
            environment: "Development".into(),
            overrides: Vec::new(),
        }
    }

    fn bot_folder() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("zeta.dialog"), "{}").unwrap();
        fs::write(dir.path().join("alpha.Dialog"), "{}").unwrap();
        fs::write(dir.path().join("runtime.json"), "{}").unwrap();
        fs::create_dir_all(dir.path().join(SETTINGS_DIRECTORY)).unwrap();
        dir
    }

    fn write_settings(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(SETTINGS_DIRECTORY).join(name), content).unwrap();
    }

    #[test]
    fn defaults_point_at_the_bot_folder() {
        let dir = bot_folder();
        let settings = BotSettings::load(&args(dir.path())).unwrap();

        let root = dir.path().to_string_lossy();
        assert_eq!(settings.configuration.get_str("applicationRoot"), Some(root.as_ref()));
        assert_eq!(settings.configuration.get_str("bot"), Some(root.as_ref()));
        assert_eq!(
            settings.configuration.get_str("defaultRootDialog"),
            Some("alpha.Dialog")
        );
    }

    #[test]
    fn folder_without_dialogs_has_no_default_root_dialog() {
        let dir = TempDir::new().unwrap();
        let settings = BotSettings::load(&args(dir.path())).unwrap();
        assert!(settings.configuration.get("defaultRootDialog").is_none());
    }

    #[test]
    fn environment_file_wins_over_base_file() {
        let dir = bot_folder();
        write_settings(
            &dir,
            "appsettings.json",
            r#"{ "defaultRootDialog": "base.dialog", "feature": { "enabled": false, "name": "base" } }"#,
        );
        write_settings(
            &dir,
            "appsettings.Production.json",
            r#"{ "feature": { "enabled": true } }"#,
        );

        let mut production = args(dir.path());
        production.environment = "Production".into();
        let settings = BotSettings::load(&production).unwrap();

        let configuration = &settings.configuration;
        assert_eq!(configuration.get_str("defaultRootDialog"), Some("base.dialog"));
        assert_eq!(configuration.get_bool("feature:enabled"), Some(true));
        assert_eq!(configuration.get_str("feature:name"), Some("base"));
    }

    #[test]
    fn command_line_overrides_win() {
        let dir = bot_folder();
        write_settings(&dir, "appsettings.json", r#"{ "greeting": { "text": "file" } }"#);

        let mut overridden = args(dir.path());
        overridden.overrides = vec![
            ("greeting:text".into(), "cli".into()),
            ("defaultRootDialog".into(), "zeta.dialog".into()),
        ];
        let settings = BotSettings::load(&overridden).unwrap();

        assert_eq!(settings.configuration.get_str("greeting:text"), Some("cli"));
        assert_eq!(
            settings.configuration.get_str("defaultRootDialog"),
            Some("zeta.dialog")
        );
    }

    #[test]
    fn malformed_settings_file_is_an_error() {
        let dir = bot_folder();
        write_settings(&dir, "appsettings.json", "{ not json");
        assert!(BotSettings::load(&args(dir.path())).is_err());
    }

    #[test]
    fn config_keys_accept_colons() {
        assert_eq!(config_key("a:b:c"), "a.b.c");
        assert_eq!(config_key("a.b"), "a.b");
    }
}
