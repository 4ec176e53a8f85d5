//! End-to-end tests for the `botkit` binary.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const RUNTIME: &str = r#"{
    "$kind": "Microsoft.RuntimeConfiguration",
    "adapters": [{ "$kind": "Microsoft.BotCoreAdapter" }],
    "storage": { "$kind": "Microsoft.MemoryStorage" }
}"#;

const HELLO_DIALOG: &str = r#"{
    "$kind": "Microsoft.ReplyDialog",
    "text": "Hello World!"
}"#;

fn botkit() -> Command {
    let mut cmd = Command::cargo_bin("botkit").unwrap();
    cmd.env_remove("BOTKIT_ENVIRONMENT").env_remove("RUST_LOG");
    cmd
}

fn bot_folder(dialog: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("runtime.json"), RUNTIME).unwrap();
    fs::write(dir.path().join("hello.dialog"), dialog).unwrap();
    dir
}

fn write_settings(root: &Path, name: &str, content: &str) {
    let settings = root.join("settings");
    fs::create_dir_all(&settings).unwrap();
    fs::write(settings.join(name), content).unwrap();
}

// ── help / version ────────────────────────────────────────────────────────────

#[test]
fn help_lists_commands() {
    botkit()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn version_flag() {
    botkit()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn no_arguments_is_a_usage_error() {
    botkit().assert().code(2);
}

// ── run ───────────────────────────────────────────────────────────────────────

#[test]
fn run_replies_to_each_line() {
    let bot = bot_folder(HELLO_DIALOG);

    botkit()
        .args(["run", "--root"])
        .arg(bot.path())
        .write_stdin("hi\n\nagain\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello World!").count(2));
}

#[test]
fn run_json_prints_reply_activities() {
    let bot = bot_folder(HELLO_DIALOG);

    botkit()
        .args(["--output-format", "json", "run", "--root"])
        .arg(bot.path())
        .write_stdin("hi\n")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""text":"Hello World!""#))
        .stdout(predicate::str::contains(r#""channelId":"console""#));
}

#[test]
fn dialogs_read_layered_settings() {
    let bot = bot_folder(r#"{ "$kind": "Microsoft.ReplyDialog", "text": "=greeting.text" }"#);
    write_settings(
        bot.path(),
        "appsettings.json",
        r#"{ "greeting": { "text": "Hello from settings" } }"#,
    );

    botkit()
        .args(["run", "--root"])
        .arg(bot.path())
        .write_stdin("hi\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello from settings"));

    botkit()
        .args(["run", "--set", "greeting:text=Hello from the command line", "--root"])
        .arg(bot.path())
        .write_stdin("hi\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello from the command line"));
}

// ── check ─────────────────────────────────────────────────────────────────────

#[test]
fn check_reports_composition() {
    let bot = bot_folder(HELLO_DIALOG);

    botkit()
        .args(["check", "--root"])
        .arg(bot.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("hello.dialog"))
        .stdout(predicate::str::contains("Adapter"))
        .stdout(predicate::str::contains("Configuration"))
        .stdout(predicate::str::contains("Bot composed"));
}

#[test]
fn missing_runtime_is_not_found() {
    let bot = TempDir::new().unwrap();
    fs::write(bot.path().join("hello.dialog"), HELLO_DIALOG).unwrap();

    botkit()
        .args(["check", "--root"])
        .arg(bot.path())
        .assert()
        .code(3)
        .stderr(predicate::str::contains(
            "Could not find resource 'runtime.json'",
        ));
}

#[test]
fn missing_bot_folder_is_not_found() {
    let dir = TempDir::new().unwrap();

    botkit()
        .args(["check", "--root"])
        .arg(dir.path().join("nope"))
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Bot folder not found"));
}

#[test]
fn unknown_kind_is_a_user_error() {
    let bot = bot_folder(HELLO_DIALOG);
    fs::write(
        bot.path().join("runtime.json"),
        r#"{ "adapters": [{ "$kind": "Microsoft.BotCoreAdapter" }], "storage": { "$kind": "Contoso.Storage" } }"#,
    )
    .unwrap();

    botkit()
        .args(["check", "--root"])
        .arg(bot.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Contoso.Storage"));
}

#[test]
fn malformed_settings_are_a_configuration_error() {
    let bot = bot_folder(HELLO_DIALOG);
    write_settings(bot.path(), "appsettings.json", "{ nope");

    botkit()
        .args(["check", "--root"])
        .arg(bot.path())
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Configuration error"));
}

// ── config ────────────────────────────────────────────────────────────────────

#[test]
fn config_key_prints_default_root_dialog() {
    let bot = bot_folder(HELLO_DIALOG);

    botkit()
        .args(["config", "--key", "defaultRootDialog", "--root"])
        .arg(bot.path())
        .assert()
        .success()
        .stdout(predicate::str::diff("hello.dialog\n"));
}

#[test]
fn environment_settings_and_variables_layer() {
    let bot = bot_folder(HELLO_DIALOG);
    write_settings(bot.path(), "appsettings.json", r#"{ "locale": "en-us", "tier": "base" }"#);
    write_settings(bot.path(), "appsettings.Production.json", r#"{ "tier": "prod" }"#);

    botkit()
        .args(["config", "--environment", "Production", "--key", "tier", "--root"])
        .arg(bot.path())
        .assert()
        .success()
        .stdout(predicate::str::diff("prod\n"));

    botkit()
        .env("TIER", "from-env")
        .args(["config", "--environment", "Production", "--key", "tier", "--root"])
        .arg(bot.path())
        .assert()
        .success()
        .stdout(predicate::str::diff("from-env\n"));

    botkit()
        .env("FEATURE__FLAG", "on")
        .args(["config", "--key", "feature:flag", "--root"])
        .arg(bot.path())
        .assert()
        .success()
        .stdout(predicate::str::diff("on\n"));
}

#[test]
fn config_unknown_key_is_not_found() {
    let bot = bot_folder(HELLO_DIALOG);

    botkit()
        .args(["config", "--key", "does:not:exist", "--root"])
        .arg(bot.path())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("does:not:exist"));
}

// ── completions ───────────────────────────────────────────────────────────────

#[test]
fn completions_for_bash() {
    botkit()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("botkit"));
}
