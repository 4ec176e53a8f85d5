//! Read-only configuration tree and expression evaluation against it.
//!
//! Paths use `:` between segments (`skillConfiguration:allowedCallers`) and
//! match keys case-insensitively, the way layered settings are usually
//! addressed. Expressions may also use `.` and `_` as separators.

use std::{fmt, sync::Arc};

use serde_json::{Number, Value};

use crate::domain::DomainError;

/// Evaluates declarative expressions (`=settings.feature`) against configuration.
///
/// Injected into [`Configuration`] so hosts can plug in a richer language;
/// [`ConfigurationEvaluator`] is the built-in path/literal evaluator.
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluate `expression` (with or without its leading `=`).
    fn evaluate(&self, expression: &str, configuration: &Configuration)
    -> Result<Value, DomainError>;
}

/// Shared, immutable configuration.
///
/// Cloning is cheap: the tree and the evaluator are reference counted.
#[derive(Clone)]
pub struct Configuration {
    root: Arc<Value>,
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl Configuration {
    /// Wrap `root` using the built-in [`ConfigurationEvaluator`].
    pub fn new(root: Value) -> Self {
        Self::with_evaluator(root, Arc::new(ConfigurationEvaluator))
    }

    pub fn with_evaluator(root: Value, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self {
            root: Arc::new(root),
            evaluator,
        }
    }

    pub fn empty() -> Self {
        Self::new(Value::Object(Default::default()))
    }

    /// Look up a `:` separated path.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = self.root.as_ref();
        for segment in path.split(':').filter(|s| !s.is_empty()) {
            current = match current {
                Value::Object(map) => map.get(segment).or_else(|| {
                    map.iter()
                        .find(|(key, _)| key.eq_ignore_ascii_case(segment))
                        .map(|(_, value)| value)
                })?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path)?.as_str()
    }

    /// Booleans may also be configured as `"true"` / `"false"` strings,
    /// which is how environment variables arrive.
    pub fn get_bool(&self, path: &str) -> Option<bool> {
        match self.get(path)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    /// A string list, configured either as an array or comma separated.
    pub fn get_string_list(&self, path: &str) -> Vec<String> {
        match self.get(path) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Evaluate an expression with the injected evaluator.
    pub fn evaluate(&self, expression: &str) -> Result<Value, DomainError> {
        self.evaluator.evaluate(expression, self)
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// `false` for empty values and unfilled `<placeholder>` settings.
    pub fn is_configured(value: &str) -> bool {
        !value.is_empty() && !value.starts_with('<')
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

/// Evaluates configuration paths and literals.
///
/// Supported forms: `=path.to.value`, `='quoted'`, `=true`, `=false`,
/// `=null` and numbers. A path that resolves to nothing yields `null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigurationEvaluator;

impl ExpressionEvaluator for ConfigurationEvaluator {
    fn evaluate(
        &self,
        expression: &str,
        configuration: &Configuration,
    ) -> Result<Value, DomainError> {
        let body = expression.trim();
        let body = body.strip_prefix('=').unwrap_or(body).trim();
        let invalid = |reason: &str| DomainError::InvalidExpression {
            expression: expression.to_owned(),
            reason: reason.to_owned(),
        };

        if body.is_empty() {
            return Err(invalid("expression is empty"));
        }
        if let Some(text) = unquote(body) {
            return Ok(Value::String(text.to_owned()));
        }
        match body {
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            "null" => return Ok(Value::Null),
            _ => {}
        }
        if let Ok(number) = body.parse::<Number>() {
            return Ok(Value::Number(number));
        }
        if body.contains('=') && !body.contains("==") {
            return Err(invalid("Assignment expressions are not supported."));
        }
        if !is_path(body) {
            return Err(invalid(
                "only configuration paths and literals can be evaluated",
            ));
        }

        let exact = body.replace('.', ":");
        let value = configuration
            .get(&exact)
            .or_else(|| configuration.get(&normalize_separators(body)))
            .cloned()
            .unwrap_or(Value::Null);
        Ok(value)
    }
}

fn unquote(body: &str) -> Option<&str> {
    ['\'', '"'].into_iter().find_map(|q| {
        body.strip_prefix(q)
            .and_then(|rest| rest.strip_suffix(q))
            .filter(|inner| !inner.contains(q))
    })
}

fn is_path(body: &str) -> bool {
    let mut chars = body.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$');
    first_ok
        && body
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '$' | '-'))
}

/// Collapse runs of `.`, `_` and `:` into a single `:`.
fn normalize_separators(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut in_separator = false;
    for c in body.chars() {
        if matches!(c, '.' | '_' | ':') {
            if !in_separator {
                out.push(':');
            }
            in_separator = true;
        } else {
            out.push(c);
            in_separator = false;
        }
    }
    out
}
