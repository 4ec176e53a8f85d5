//! CLI argument definitions using the clap derive API.
//!
//! This module is the *only* place that knows about argument names, aliases,
//! help text, and value enums.  No business logic lives here.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

pub mod global;
pub use global::{GlobalArgs, OutputFormat};

// ── Top-level CLI ─────────────────────────────────────────────────────────────

/// Main CLI entry-point.
#[derive(Debug, Parser)]
#[command(
    name    = "botkit",
    bin_name = "botkit",
    version  = env!("CARGO_PKG_VERSION"),
    author   = env!("CARGO_PKG_AUTHORS"),
    about    = "\u{1f916} Run declarative bots from a folder",
    long_about = "botkit composes a bot from the runtime.json and .dialog \
                  resources in a bot folder and hosts it on the console.",
    after_help = "EXAMPLES:\n\
        \x20 botkit run   --root ./echo-bot\n\
        \x20 botkit check --root ./echo-bot --environment Production\n\
        \x20 botkit config --root ./echo-bot --key defaultRootDialog\n\
        \x20 botkit completions bash > /usr/share/bash-completion/completions/botkit",
    arg_required_else_help = true,
    subcommand_required    = true,
)]
pub struct Cli {
    /// Flags available on every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

// ── Subcommands ───────────────────────────────────────────────────────────────

/// All available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Chat with a bot on the console.
    #[command(
        visible_alias = "r",
        about = "Host a bot on the console",
        after_help = "Each line read from stdin is sent to the bot as a message; \
            replies are printed to stdout.\n\n\
            EXAMPLES:\n\
            \x20 botkit run --root ./echo-bot\n\
            \x20 echo hi | botkit run --root ./echo-bot --output-format json\n\
            \x20 botkit run --root ./echo-bot --set defaultRootDialog=main.dialog"
    )]
    Run(RunArgs),

    /// Compose the bot without running it.
    #[command(
        about = "Validate a bot folder",
        after_help = "EXAMPLES:\n\
            \x20 botkit check --root ./echo-bot\n\
            \x20 botkit check --root ./echo-bot --output-format json"
    )]
    Check(CheckArgs),

    /// Print the layered configuration.
    #[command(
        visible_alias = "cfg",
        about = "Show the bot configuration",
        after_help = "EXAMPLES:\n\
            \x20 botkit config --root ./echo-bot\n\
            \x20 botkit config --root ./echo-bot --key bot\n\
            \x20 GREETING__TEXT=hi botkit config --key greeting:text"
    )]
    Config(ConfigArgs),

    /// Generate shell completion scripts.
    #[command(
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n\
            \x20 botkit completions bash > ~/.local/share/bash-completion/completions/botkit\n\
            \x20 botkit completions zsh  > ~/.zfunc/_botkit\n\
            \x20 botkit completions fish > ~/.config/fish/completions/botkit.fish"
    )]
    Completions(CompletionsArgs),
}

// ── shared ────────────────────────────────────────────────────────────────────

/// Where the bot lives and how its configuration is layered.
#[derive(Debug, Clone, Args)]
pub struct BotArgs {
    /// Bot folder holding `runtime.json`, dialogs and `settings/`.
    #[arg(
        short = 'r',
        long = "root",
        value_name = "DIR",
        default_value = ".",
        help = "Bot folder"
    )]
    pub root: PathBuf,

    /// Selects `settings/appsettings.<ENV>.json`.
    #[arg(
        short = 'e',
        long = "environment",
        value_name = "ENV",
        env = "BOTKIT_ENVIRONMENT",
        default_value = "Development",
        help = "Hosting environment name"
    )]
    pub environment: String,

    /// Override a setting; wins over files and environment variables.
    #[arg(
        short = 's',
        long = "set",
        value_name = "KEY=VALUE",
        value_parser = parse_override,
        help = "Override a configuration value (repeatable)"
    )]
    pub overrides: Vec<(String, String)>,
}

fn parse_override(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{raw}'"));
    }
    Ok((key.to_owned(), value.to_owned()))
}

// ── run ───────────────────────────────────────────────────────────────────────

/// Arguments for `botkit run`.
#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub bot: BotArgs,

    /// Name the user appears under in activities.
    #[arg(long = "user", value_name = "NAME", default_value = "User")]
    pub user: String,
}

// ── check ─────────────────────────────────────────────────────────────────────

/// Arguments for `botkit check`.
#[derive(Debug, Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub bot: BotArgs,
}

// ── config ────────────────────────────────────────────────────────────────────

/// Arguments for `botkit config`.
#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub bot: BotArgs,

    /// Print a single `:` separated key instead of everything.
    #[arg(short = 'k', long = "key", value_name = "KEY")]
    pub key: Option<String>,
}

// ── completions ───────────────────────────────────────────────────────────────

/// Arguments for `botkit completions`.
#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for.
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Supported shells.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
    Elvish,
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults_to_current_folder_and_development() {
        let cli = Cli::parse_from(["botkit", "run"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.bot.root, PathBuf::from("."));
        assert_eq!(args.bot.environment, "Development");
        assert!(args.bot.overrides.is_empty());
        assert_eq!(args.user, "User");
    }

    #[test]
    fn overrides_are_split_on_the_first_equals() {
        let cli = Cli::parse_from([
            "botkit",
            "check",
            "--root",
            "bot",
            "--set",
            "bot:entry=main.dialog",
            "-s",
            "expr==x",
        ]);
        let Commands::Check(args) = cli.command else {
            panic!("expected check");
        };
        assert_eq!(
            args.bot.overrides,
            [
                ("bot:entry".to_owned(), "main.dialog".to_owned()),
                ("expr".to_owned(), "=x".to_owned()),
            ]
        );
    }

    #[test]
    fn override_without_equals_is_rejected() {
        assert!(Cli::try_parse_from(["botkit", "run", "--set", "novalue"]).is_err());
        assert!(Cli::try_parse_from(["botkit", "run", "--set", "=value"]).is_err());
    }

    #[test]
    fn config_key_and_alias() {
        let cli = Cli::parse_from(["botkit", "cfg", "--key", "bot"]);
        let Commands::Config(args) = cli.command else {
            panic!("expected config");
        };
        assert_eq!(args.key.as_deref(), Some("bot"));
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli = Cli::parse_from(["botkit", "check", "-vv", "--no-color"]);
        assert_eq!(cli.global.verbose, 2);
        assert!(cli.global.no_color);
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["botkit", "-q", "-v", "check"]).is_err());
    }

    #[test]
    fn completions_accept_powershell() {
        let cli = Cli::parse_from(["botkit", "completions", "powershell"]);
        assert!(matches!(
            cli.command,
            Commands::Completions(CompletionsArgs {
                shell: Shell::PowerShell
            })
        ));
    }
}
