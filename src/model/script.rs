//! Script output storage shared by hosts and services

use crate::error::{MissingScriptError, ModelError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Output of an nmap script or a registered Rust script
///
/// nmap itself only ever produces text; parsers may turn it into structured
/// data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScriptOutput {
    Text(String),
    Structured(serde_json::Value),
}

impl ScriptOutput {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ScriptOutput::Text(text) => Some(text),
            ScriptOutput::Structured(_) => None,
        }
    }

    pub fn as_structured(&self) -> Option<&serde_json::Value> {
        match self {
            ScriptOutput::Structured(value) => Some(value),
            ScriptOutput::Text(_) => None,
        }
    }
}

impl fmt::Display for ScriptOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptOutput::Text(text) => write!(f, "{}", text),
            ScriptOutput::Structured(value) => write!(f, "{}", value),
        }
    }
}

impl From<String> for ScriptOutput {
    fn from(text: String) -> Self {
        ScriptOutput::Text(text)
    }
}

impl From<&str> for ScriptOutput {
    fn from(text: &str) -> Self {
        ScriptOutput::Text(text.to_string())
    }
}

impl From<serde_json::Value> for ScriptOutput {
    fn from(value: serde_json::Value) -> Self {
        ScriptOutput::Structured(value)
    }
}

/// Script outputs keyed by script name, write-once per name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ScriptMap {
    entries: BTreeMap<String, ScriptOutput>,
}

impl ScriptMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new output; a name can only be added once
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        output: impl Into<ScriptOutput>,
    ) -> Result<(), ModelError> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(ModelError::DuplicateScript(name));
        }
        self.entries.insert(name, output.into());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&ScriptOutput, MissingScriptError> {
        self.entries
            .get(name)
            .ok_or_else(|| MissingScriptError::new(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Overwrite an existing output in place (parser rewrites)
    pub(crate) fn replace(
        &mut self,
        name: &str,
        output: ScriptOutput,
    ) -> Result<(), MissingScriptError> {
        match self.entries.get_mut(name) {
            Some(slot) => {
                *slot = output;
                Ok(())
            }
            None => Err(MissingScriptError::new(name)),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScriptOutput)> {
        self.entries.iter().map(|(name, output)| (name.as_str(), output))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_write_once() {
        let mut scripts = ScriptMap::new();
        scripts.insert("http-title", "Welcome").unwrap();
        let err = scripts.insert("http-title", "Other").unwrap_err();
        assert_eq!(err, ModelError::DuplicateScript("http-title".to_string()));
        assert_eq!(scripts.get("http-title").unwrap().as_text(), Some("Welcome"));
    }

    #[test]
    fn test_missing_lookup_names_script() {
        let scripts = ScriptMap::new();
        let err = scripts.get("ssh-hostkey").unwrap_err();
        assert_eq!(err.name, "ssh-hostkey");
    }

    #[test]
    fn test_replace_requires_existing_entry() {
        let mut scripts = ScriptMap::new();
        assert!(scripts.replace("banner", "x".into()).is_err());

        scripts.insert("banner", "SSH-2.0").unwrap();
        scripts
            .replace("banner", serde_json::json!({"proto": "ssh"}).into())
            .unwrap();
        assert!(scripts.get("banner").unwrap().as_structured().is_some());
    }

    #[test]
    fn test_serializes_untagged() {
        let mut scripts = ScriptMap::new();
        scripts.insert("a", "text").unwrap();
        scripts.insert("b", serde_json::json!([1, 2])).unwrap();
        let json = serde_json::to_string(&scripts).unwrap();
        assert_eq!(json, r#"{"a":"text","b":[1,2]}"#);
    }
}
