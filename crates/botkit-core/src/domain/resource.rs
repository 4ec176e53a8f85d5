//! Named declarative resources (`runtime.json`, `*.dialog`).

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::DomainError;

/// Identifier of the resource holding the root runtime provider.
pub const RUNTIME_CONFIGURATION_RESOURCE: &str = "runtime.json";

/// Extension of dialog resources.
pub const DIALOG_EXTENSION: &str = "dialog";

/// A resource resolved from a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    id: String,
    content: String,
    source: Option<PathBuf>,
}

impl Resource {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            source: None,
        }
    }

    /// Record where the resource was read from (diagnostics only).
    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn source(&self) -> Option<&PathBuf> {
        self.source.as_ref()
    }

    /// Parse the content as JSON.
    pub fn json(&self) -> Result<Value, DomainError> {
        self.parse()
    }

    /// Parse the content into `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, DomainError> {
        // Declarative files are often saved with a byte order mark.
        let content = self.content.trim_start_matches('\u{feff}');
        serde_json::from_str(content).map_err(|e| DomainError::MalformedResource {
            id: self.id.clone(),
            reason: e.to_string(),
        })
    }

    /// `true` for `*.dialog` resources.
    pub fn is_dialog(&self) -> bool {
        self.id
            .rsplit_once('.')
            .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case(DIALOG_EXTENSION))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_with_bom() {
        let resource = Resource::new("runtime.json", "\u{feff}{\"defaultLocale\":\"en-us\"}");
        assert_eq!(resource.json().unwrap()["defaultLocale"], "en-us");
    }

    #[test]
    fn malformed_json_names_resource() {
        let err = Resource::new("root.dialog", "{ nope").json().unwrap_err();
        assert!(matches!(err, DomainError::MalformedResource { ref id, .. } if id == "root.dialog"));
    }

    #[test]
    fn recognizes_dialogs() {
        assert!(Resource::new("Main.Dialog", "{}").is_dialog());
        assert!(!Resource::new("runtime.json", "{}").is_dialog());
    }
}
