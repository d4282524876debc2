//! Configuration file loading and parsing.
//!
//! witrack reads an optional `witrack.toml`. Every section and key is
//! optional; if no config file exists the system falls back to defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Default page size when the request does not specify one.
pub const DEFAULT_LIMIT: usize = 20;
/// Upper bound for a requested page size.
pub const DEFAULT_MAX_LIMIT: usize = 100;
/// Upper bound for an ancestor walk.
pub const DEFAULT_MAX_TREE_DEPTH: usize = 64;

/// Root configuration structure loaded from `witrack.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WitrackConfig {
    /// Query compilation and paging (optional).
    pub query: Option<QueryConfig>,
    /// Field value vocabularies (optional).
    pub fields: Option<FieldsConfig>,
    /// REST server settings (optional).
    pub server: Option<ServerConfig>,
}

/// Query compilation and paging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryConfig {
    /// Page size used when none is requested (default: 20).
    pub default_limit: Option<usize>,
    /// Largest page size a request may ask for (default: 100).
    pub max_limit: Option<usize>,
    /// Reject keys that are neither system keys nor type groups (default: false).
    pub strict_keys: Option<bool>,
    /// Deepest ancestor chain before the walk fails (default: 64).
    pub max_tree_depth: Option<usize>,
}

/// Field vocabularies used by value conversion.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldsConfig {
    /// Allowed workflow states.
    pub states: Option<Vec<String>>,
}

impl FieldsConfig {
    /// Get states with default fallback.
    pub fn states(&self) -> Vec<String> {
        self.states.clone().unwrap_or_else(default_states)
    }
}

/// REST server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    /// Listen address (default: "0.0.0.0:3000").
    pub bind: Option<String>,
    /// Dataset file to serve (default: "witrack-data.json").
    pub data: Option<String>,
    /// Prefix used when building paging links (default: "/api").
    pub base_url: Option<String>,
}

impl ServerConfig {
    pub fn bind(&self) -> String {
        self.bind.clone().unwrap_or_else(|| "0.0.0.0:3000".to_string())
    }

    pub fn data(&self) -> String {
        self.data
            .clone()
            .unwrap_or_else(|| "witrack-data.json".to_string())
    }

    pub fn base_url(&self) -> String {
        self.base_url.clone().unwrap_or_else(|| "/api".to_string())
    }
}

/// Workflow states known when no `[fields]` section is configured.
pub fn default_states() -> Vec<String> {
    ["new", "open", "in progress", "resolved", "closed"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Effective query settings with all defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySettings {
    pub default_limit: usize,
    pub max_limit: usize,
    pub strict_keys: bool,
    pub max_tree_depth: usize,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: DEFAULT_MAX_LIMIT,
            strict_keys: false,
            max_tree_depth: DEFAULT_MAX_TREE_DEPTH,
        }
    }
}

impl WitrackConfig {
    /// Load configuration from the given file if it exists.
    ///
    /// Returns an empty config if the file doesn't exist.
    /// Returns an error if the file exists but is malformed.
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(WitrackConfig::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: WitrackConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Resolve query settings, applying defaults for missing keys.
    pub fn query_settings(&self) -> QuerySettings {
        let defaults = QuerySettings::default();
        let Some(query) = &self.query else {
            return defaults;
        };

        let max_limit = query.max_limit.unwrap_or(defaults.max_limit).max(1);
        QuerySettings {
            default_limit: query
                .default_limit
                .unwrap_or(defaults.default_limit)
                .clamp(1, max_limit),
            max_limit,
            strict_keys: query.strict_keys.unwrap_or(defaults.strict_keys),
            max_tree_depth: query.max_tree_depth.unwrap_or(defaults.max_tree_depth),
        }
    }

    /// Allowed workflow states.
    pub fn states(&self) -> Vec<String> {
        self.fields
            .as_ref()
            .map(FieldsConfig::states)
            .unwrap_or_else(default_states)
    }

    /// Server settings, defaulted when the section is absent.
    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = WitrackConfig::load(&temp.path().join("witrack.toml")).unwrap();

        assert_eq!(config.query_settings(), QuerySettings::default());
        assert_eq!(config.states(), default_states());
        assert_eq!(config.server().bind(), "0.0.0.0:3000");
    }

    #[test]
    fn test_load_query_section() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("witrack.toml");
        fs::write(
            &path,
            r#"
[query]
default_limit = 5
strict_keys = true
max_tree_depth = 8

[fields]
states = ["todo", "doing", "done"]
"#,
        )
        .unwrap();

        let config = WitrackConfig::load(&path).unwrap();
        let settings = config.query_settings();

        assert_eq!(settings.default_limit, 5);
        assert_eq!(settings.max_limit, DEFAULT_MAX_LIMIT);
        assert!(settings.strict_keys);
        assert_eq!(settings.max_tree_depth, 8);
        assert_eq!(config.states(), vec!["todo", "doing", "done"]);
    }

    #[test]
    fn test_default_limit_is_clamped_to_max() {
        let config = WitrackConfig::from_toml_str(
            r#"
[query]
default_limit = 500
max_limit = 50
"#,
        )
        .unwrap();

        assert_eq!(config.query_settings().default_limit, 50);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("witrack.toml");
        fs::write(&path, "[query\ndefault_limit = ").unwrap();

        let err = WitrackConfig::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse"));
    }
}
