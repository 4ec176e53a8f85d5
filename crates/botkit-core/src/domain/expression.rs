//! Declarative values that are either literals or `=expressions`.
//!
//! ```json
//! { "removeRecipientMention": true }
//! { "removeRecipientMention": "=feature.removeRecipientMention" }
//! ```
//!
//! Both forms deserialize into a [`BoolExpression`]; the second is
//! evaluated against [`Configuration`] when the owning node is built.

use std::{any::type_name, fmt, marker::PhantomData};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned};
use serde_json::Value;

use crate::domain::{Configuration, DomainError};

pub type BoolExpression = ExpressionProperty<bool>;
pub type StringExpression = ExpressionProperty<String>;
pub type IntExpression = ExpressionProperty<i64>;

/// A literal `T` or an expression that evaluates to one.
pub struct ExpressionProperty<T> {
    raw: Value,
    marker: PhantomData<fn() -> T>,
}

impl<T> ExpressionProperty<T> {
    fn from_raw(raw: Value) -> Self {
        Self {
            raw,
            marker: PhantomData,
        }
    }

    /// An expression; the leading `=` is added when missing.
    pub fn expression(text: impl Into<String>) -> Self {
        let text = text.into();
        let text = if text.starts_with('=') {
            text
        } else {
            format!("={text}")
        };
        Self::from_raw(Value::String(text))
    }

    pub fn literal(value: T) -> Self
    where
        T: Into<Value>,
    {
        Self::from_raw(value.into())
    }

    /// The expression text (including `=`), `None` for literals.
    pub fn expression_text(&self) -> Option<&str> {
        self.raw.as_str().filter(|s| s.starts_with('='))
    }

    pub fn is_expression(&self) -> bool {
        self.expression_text().is_some()
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

impl<T: DeserializeOwned> ExpressionProperty<T> {
    /// Evaluate to a value; `null` results are an error.
    pub fn evaluate(&self, configuration: &Configuration) -> Result<T, DomainError> {
        self.evaluate_optional(configuration)?
            .ok_or_else(|| DomainError::ExpressionTypeMismatch {
                expression: self.describe(),
                expected: type_name::<T>(),
                reason: "evaluated to null".into(),
            })
    }

    /// Evaluate to a value, mapping `null` to `None`.
    pub fn evaluate_optional(&self, configuration: &Configuration) -> Result<Option<T>, DomainError> {
        let value = match self.expression_text() {
            Some(expression) => configuration.evaluate(expression)?,
            None => self.raw.clone(),
        };
        if value.is_null() {
            return Ok(None);
        }
        self.coerce(value).map(Some)
    }

    /// Convert, accepting scalars that arrive as strings (environment
    /// variables) and scalars where a string is expected.
    fn coerce(&self, value: Value) -> Result<T, DomainError> {
        let first_error = match serde_json::from_value::<T>(value.clone()) {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        let retried = match &value {
            Value::String(s) => serde_json::from_str::<T>(s).ok(),
            Value::Bool(_) | Value::Number(_) => {
                serde_json::from_value::<T>(Value::String(value.to_string())).ok()
            }
            _ => None,
        };
        retried.ok_or_else(|| DomainError::ExpressionTypeMismatch {
            expression: self.describe(),
            expected: type_name::<T>(),
            reason: first_error.to_string(),
        })
    }

    fn describe(&self) -> String {
        match &self.raw {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl<T: Into<Value>> From<T> for ExpressionProperty<T> {
    fn from(value: T) -> Self {
        Self::literal(value)
    }
}

impl From<&str> for StringExpression {
    fn from(value: &str) -> Self {
        Self::from_raw(Value::String(value.to_owned()))
    }
}

impl<T> Clone for ExpressionProperty<T> {
    fn clone(&self) -> Self {
        Self::from_raw(self.raw.clone())
    }
}

impl<T> PartialEq for ExpressionProperty<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> fmt::Debug for ExpressionProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExpressionProperty({})", self.raw)
    }
}

impl<'de, T> Deserialize<'de> for ExpressionProperty<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_raw)
    }
}

impl<T> Serialize for ExpressionProperty<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}
