use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{RelayError, Result};

/// Top-level configuration for relay.
///
/// Loaded from `~/.relay/config.toml` by default. Every section falls back
/// to its defaults when omitted, so an empty file is a valid config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

impl RelayConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RelayConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| RelayError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Session store limits and expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sessions idle for longer than this are evicted.
    pub ttl_secs: u64,
    /// How often the background janitor looks for expired sessions.
    pub cleanup_interval_secs: u64,
    /// Maximum number of turns retained per session.
    pub max_turns: usize,
    /// User messages are truncated to this many characters.
    pub max_user_chars: usize,
    /// Agent messages are truncated to this many characters.
    pub max_agent_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            cleanup_interval_secs: 300,
            max_turns: 50,
            max_user_chars: 10_000,
            max_agent_chars: 50_000,
        }
    }
}

/// Query router settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// How many previous user questions go into the classification prompt.
    pub history_questions: usize,
    /// Words in the model's reason that mark an out-of-scope verdict as a
    /// follow-up to the previous route.
    pub follow_up_indicators: Vec<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            history_questions: 3,
            follow_up_indicators: ["follow-up", "pronoun", "refer", "previous", "context", "vague"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Classification model endpoint (Ollama chat API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "gpt-oss:latest".to_string(),
            temperature: 0.0,
            timeout_secs: 60,
        }
    }
}

/// Result-context extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Columns whose values are kept from multi-row results.
    pub key_columns: Vec<String>,
    /// Maximum distinct values kept per key column.
    pub max_key_values: usize,
    /// Only this many leading rows are scanned for key values.
    pub scan_rows: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            key_columns: [
                "Vendor Name",
                "Power Plant",
                "Power Plant Desc",
                "Plant Desc",
                "Route Code",
                "Route Desc",
                "Waybill Status Desc",
                "Contractor Name",
                "zone_name",
                "driver_id",
                "vehicle_name",
                "month",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_key_values: 5,
            scan_rows: 10,
        }
    }
}

/// Workflow orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Queries longer than this are rejected before routing.
    pub max_query_chars: usize,
    /// Reply sent when nothing can answer the query.
    pub out_of_scope_message: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_query_chars: 10_000,
            out_of_scope_message: "I can't answer this question because it's outside my data. \
                I can help you with dispatch operations, waybills, vehicle dwell times, \
                grid code documents, or calculations."
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn create_temp_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config_values() {
        let config = RelayConfig::default();

        assert_eq!(config.general.log_level, "info");

        assert_eq!(config.session.ttl_secs, 3600);
        assert_eq!(config.session.cleanup_interval_secs, 300);
        assert_eq!(config.session.max_turns, 50);
        assert_eq!(config.session.max_user_chars, 10_000);
        assert_eq!(config.session.max_agent_chars, 50_000);

        assert_eq!(config.router.history_questions, 3);
        assert!(config
            .router
            .follow_up_indicators
            .contains(&"pronoun".to_string()));

        assert_eq!(config.model.base_url, "http://localhost:11434");
        assert_eq!(config.model.timeout_secs, 60);

        assert_eq!(config.context.max_key_values, 5);
        assert_eq!(config.context.scan_rows, 10);
        assert!(config.context.key_columns.contains(&"Vendor Name".to_string()));
        assert!(config.context.key_columns.contains(&"zone_name".to_string()));

        assert_eq!(config.workflow.max_query_chars, 10_000);
    }

    #[test]
    fn test_config_load_partial_toml() {
        let content = r#"
[session]
ttl_secs = 60
max_turns = 10

[model]
model = "llama3"
"#;
        let file = create_temp_config(content);
        let config = RelayConfig::load(file.path()).unwrap();

        assert_eq!(config.session.ttl_secs, 60);
        assert_eq!(config.session.max_turns, 10);
        // Unspecified fields in a present section keep their defaults
        assert_eq!(config.session.max_user_chars, 10_000);
        assert_eq!(config.model.model, "llama3");
        assert_eq!(config.model.base_url, "http://localhost:11434");
        // Missing sections use defaults
        assert_eq!(config.router.history_questions, 3);
    }

    #[test]
    fn test_config_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = RelayConfig::load(file.path()).unwrap();
        assert_eq!(config.session.ttl_secs, 3600);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        let result = RelayConfig::load(file.path());
        assert!(matches!(result, Err(RelayError::Config(_))));
    }

    #[test]
    fn test_config_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = RelayConfig::load_or_default(&dir.path().join("absent.toml"));
        assert_eq!(config.session.max_turns, 50);
    }

    #[test]
    fn test_config_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("dir").join("config.toml");

        let mut config = RelayConfig::default();
        config.router.history_questions = 5;
        config.save(&path).unwrap();

        assert!(path.exists());
        let reloaded = RelayConfig::load(&path).unwrap();
        assert_eq!(reloaded.router.history_questions, 5);
        assert_eq!(reloaded.context.key_columns, config.context.key_columns);
    }
}
