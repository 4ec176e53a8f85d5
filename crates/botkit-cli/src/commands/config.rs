//! `botkit config`: show the layered configuration.

use serde_json::Value;

use crate::{
    cli::ConfigArgs,
    error::{CliError, CliResult},
    output::OutputManager,
};

pub fn execute(args: ConfigArgs, output: OutputManager) -> CliResult<()> {
    let settings = super::load_settings(&args.bot)?;
    let configuration = &settings.configuration;

    let Some(key) = args.key else {
        if !output.is_json() {
            output.header(&format!(
                "Configuration for {} ({}):",
                settings.root.display(),
                settings.environment
            ))?;
        }
        output.json_pretty(configuration.as_value())?;
        return Ok(());
    };

    let value = configuration
        .get(&key)
        .ok_or_else(|| CliError::KeyNotFound { key: key.clone() })?;
    if output.is_json() {
        output.json(value)?;
    } else {
        output.data(&render(value))?;
    }
    Ok(())
}

/// Scalars print bare; objects and arrays as pretty JSON.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
    }
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_render_bare() {
        assert_eq!(render(&json!("root.dialog")), "root.dialog");
        assert_eq!(render(&json!(true)), "true");
        assert_eq!(render(&json!(3)), "3");
        assert_eq!(render(&Value::Null), "");
    }

    #[test]
    fn objects_render_as_json() {
        let rendered = render(&json!({ "locale": "en-us" }));
        assert!(rendered.contains("\"locale\": \"en-us\""));
    }
}
