//! Loader configuration

use serde::{Deserialize, Serialize};

use crate::task_group::InFlightPolicy;

/// Module loader configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Name attached to the loader's tracing span
    pub name: String,

    /// URL prefix of host builtin modules (e.g. `node:fs`)
    pub builtin_scheme: String,

    /// Content types compiled as module scripts
    pub script_content_types: Vec<String>,

    /// Content types loaded as JSON modules
    pub json_content_types: Vec<String>,

    /// What happens to outstanding fetches when a load job fails
    pub in_flight: InFlightPolicy,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            name: "main".into(),
            builtin_scheme: "node:".into(),
            script_content_types: vec![
                "text/javascript".into(),
                "application/javascript".into(),
                "application/x-javascript".into(),
            ],
            json_content_types: vec!["application/json".into()],
            in_flight: InFlightPolicy::default(),
        }
    }
}

impl LoaderConfig {
    /// Whether `content_type` is compiled as a script
    pub fn is_script(&self, content_type: &str) -> bool {
        self.script_content_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(content_type))
    }

    /// Whether `content_type` is loaded as JSON
    pub fn is_json(&self, content_type: &str) -> bool {
        self.json_content_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(content_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_matching() {
        let config = LoaderConfig::default();
        assert!(config.is_script("text/javascript"));
        assert!(config.is_script("Application/JavaScript"));
        assert!(config.is_json("application/json"));
        assert!(!config.is_script("application/json"));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: LoaderConfig =
            serde_json::from_str(r#"{"name": "cli", "in_flight": "abort"}"#).unwrap();
        assert_eq!(config.name, "cli");
        assert_eq!(config.in_flight, InFlightPolicy::Abort);
        assert_eq!(config.builtin_scheme, "node:");
    }
}
