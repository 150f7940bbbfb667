//! Plugin configuration
//!
//! Each `[plugins.<name>]` table in the configuration file reaches its plugin
//! as a [`PluginConfig`] during initialization.

use std::collections::HashMap;
use std::path::PathBuf;

/// Configuration context passed to plugins during initialization
#[derive(Debug, Clone, Default)]
pub struct PluginConfig {
    /// Forced color setting: Some(true)=force on, Some(false)=force off, None=auto (TTY based)
    pub use_colors: Option<bool>,
    /// Plugin-specific TOML configuration
    pub toml_config: HashMap<String, toml::Value>,
}

impl PluginConfig {
    /// Create a PluginConfig from a TOML table
    pub fn from_toml(use_colors: Option<bool>, toml_table: &toml::value::Table) -> Self {
        Self {
            use_colors,
            toml_config: toml_table
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        }
    }

    /// Builder used by embedders and tests
    pub fn with_value(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.toml_config.insert(key.to_string(), value.into());
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.toml_config.contains_key(key)
    }

    /// Get a string configuration value with default
    pub fn get_string(&self, key: &str, default: &str) -> String {
        if let Some(toml::Value::String(s)) = self.toml_config.get(key) {
            s.clone()
        } else {
            default.to_string()
        }
    }

    pub fn get_optional_string(&self, key: &str) -> Option<String> {
        match self.toml_config.get(key) {
            Some(toml::Value::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    /// Get a boolean configuration value with default
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        if let Some(toml::Value::Boolean(b)) = self.toml_config.get(key) {
            *b
        } else {
            default
        }
    }

    pub fn get_integer(&self, key: &str, default: i64) -> i64 {
        if let Some(toml::Value::Integer(i)) = self.toml_config.get(key) {
            *i
        } else {
            default
        }
    }

    /// Integers are accepted where a float is expected
    pub fn get_float(&self, key: &str, default: f64) -> f64 {
        match self.toml_config.get(key) {
            Some(toml::Value::Float(f)) => *f,
            Some(toml::Value::Integer(i)) => *i as f64,
            _ => default,
        }
    }

    /// A single string is accepted as a one-element list
    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        match self.toml_config.get(key) {
            Some(toml::Value::String(s)) => vec![s.clone()],
            Some(toml::Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn get_path(&self, key: &str, default: PathBuf) -> PathBuf {
        self.get_optional_string(key)
            .map(PathBuf::from)
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PluginConfig {
        let table: toml::value::Table = toml::from_str(
            r#"
            server = "https://apps.example.org/tagger"
            enabled = true
            timeout = 5
            ratio = 0.5
            dirs = ["/usr/share/applications", "/var/lib/flatpak/exports/share/applications"]
            single = "/opt/apps"
            "#,
        )
        .unwrap();
        PluginConfig::from_toml(Some(false), &table)
    }

    #[test]
    fn test_typed_getters() {
        let config = sample();
        assert_eq!(
            config.get_string("server", ""),
            "https://apps.example.org/tagger"
        );
        assert!(config.get_bool("enabled", false));
        assert_eq!(config.get_integer("timeout", 1), 5);
        assert_eq!(config.get_float("ratio", 0.0), 0.5);
        assert_eq!(config.get_float("timeout", 0.0), 5.0);
        assert_eq!(config.use_colors, Some(false));
    }

    #[test]
    fn test_defaults_for_missing_or_mistyped_keys() {
        let config = sample();
        assert_eq!(config.get_string("missing", "fallback"), "fallback");
        assert_eq!(config.get_string("timeout", "fallback"), "fallback");
        assert!(!config.get_bool("server", false));
        assert_eq!(config.get_integer("server", 7), 7);
        assert_eq!(config.get_optional_string("missing"), None);
    }

    #[test]
    fn test_string_lists() {
        let config = sample();
        assert_eq!(config.get_string_list("dirs").len(), 2);
        assert_eq!(config.get_string_list("single"), vec!["/opt/apps"]);
        assert!(config.get_string_list("missing").is_empty());
    }

    #[test]
    fn test_builder_and_paths() {
        let config = PluginConfig::default().with_value("database", "/tmp/packages.json");
        assert!(config.contains("database"));
        assert_eq!(
            config.get_path("database", PathBuf::from("/nope")),
            PathBuf::from("/tmp/packages.json")
        );
        assert_eq!(
            config.get_path("other", PathBuf::from("/default")),
            PathBuf::from("/default")
        );
    }
}
