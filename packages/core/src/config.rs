use crate::errors::EditorResult;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_NAME: &str = "outline.config.json";

/// Editor configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// Name recorded on the editor's log spans
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default)]
    pub history: HistoryConfig,

    /// Merge adjacent equal-format text runs at commit time
    #[serde(default = "default_true")]
    pub normalize_text: bool,

    #[serde(default = "default_transform_passes")]
    pub max_transform_passes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryConfig {
    /// Maximum number of undo levels (0 = unlimited)
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Typing within this window coalesces into one undo step
    #[serde(default = "default_merge_interval")]
    pub merge_interval_ms: u64,
}

fn default_namespace() -> String {
    "outline".to_string()
}

fn default_true() -> bool {
    true
}

fn default_transform_passes() -> usize {
    4
}

fn default_max_depth() -> usize {
    100
}

fn default_merge_interval() -> u64 {
    1000
}

impl HistoryConfig {
    pub fn merge_interval(&self) -> Duration {
        Duration::from_millis(self.merge_interval_ms)
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            merge_interval_ms: default_merge_interval(),
        }
    }
}

impl EditorConfig {
    /// Load config from a directory, falling back to defaults
    pub fn load(dir: impl AsRef<Path>) -> EditorResult<Self> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_json_str(&content)
        } else {
            Ok(EditorConfig::default())
        }
    }

    pub fn from_json_str(json: &str) -> EditorResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            history: HistoryConfig::default(),
            normalize_text: true,
            max_transform_passes: default_transform_passes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "namespace": "notes",
            "history": { "maxDepth": 5 },
            "normalizeText": false
        }"#;

        let config = EditorConfig::from_json_str(json).unwrap();
        assert_eq!(config.namespace, "notes");
        assert_eq!(config.history.max_depth, 5);
        assert_eq!(config.history.merge_interval_ms, 1000);
        assert!(!config.normalize_text);
        assert_eq!(config.max_transform_passes, 4);
    }

    #[test]
    fn test_default_config() {
        let config = EditorConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EditorConfig::default());
        assert_eq!(config.history.merge_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(EditorConfig::load(dir.path()).unwrap(), EditorConfig::default());

        std::fs::write(dir.path().join(DEFAULT_CONFIG_NAME), r#"{ "maxTransformPasses": 1 }"#).unwrap();
        assert_eq!(EditorConfig::load(dir.path()).unwrap().max_transform_passes, 1);
    }

    #[test]
    fn test_invalid_config_is_a_serialization_error() {
        let err = EditorConfig::from_json_str("{ \"history\": 3 }").unwrap_err();
        assert!(matches!(err, crate::EditorError::Serialization(_)));
    }
}
