use anyhow::{Context, Result};
use outline_core::{EditorConfig, DEFAULT_CONFIG_NAME};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Editor config for a command: `explicit` when given, otherwise
/// `outline.config.json` in `cwd`, otherwise defaults
pub fn load(cwd: &Path, explicit: Option<&Path>) -> Result<EditorConfig> {
    match explicit {
        Some(path) => {
            debug!(path = %path.display(), "Loading explicit config");
            let content =
                fs::read_to_string(path).with_context(|| format!("Cannot read config {}", path.display()))?;
            EditorConfig::from_json_str(&content).with_context(|| format!("Invalid config {}", path.display()))
        }
        None => EditorConfig::load(cwd).with_context(|| format!("Invalid {} in {}", DEFAULT_CONFIG_NAME, cwd.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(dir.path(), None).unwrap();
        assert_eq!(config, EditorConfig::default());
    }

    #[test]
    fn test_explicit_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(DEFAULT_CONFIG_NAME), r#"{ "namespace": "local" }"#).unwrap();
        let explicit = dir.path().join("other.json");
        fs::write(&explicit, r#"{ "namespace": "explicit" }"#).unwrap();

        assert_eq!(load(dir.path(), None).unwrap().namespace, "local");
        assert_eq!(load(dir.path(), Some(&explicit)).unwrap().namespace, "explicit");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path(), Some(&dir.path().join("nope.json"))).unwrap_err();
        assert!(err.to_string().contains("Cannot read config"));
    }
}
