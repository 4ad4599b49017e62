//! CLI argument definitions for the relay binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use relay_core::RelayConfig;

/// Relay: routes questions to the right data source and keeps the
/// conversation's state between turns.
#[derive(Parser, Debug)]
#[command(name = "relay", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Classification model name (e.g. gpt-oss:latest).
    #[arg(long = "model", global = true)]
    pub model: Option<String>,

    /// Base URL of the Ollama server.
    #[arg(long = "base-url", global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Interactive multi-turn conversation against echo collaborators.
    Console {
        /// Resume a known session id instead of starting a new one.
        #[arg(long = "session")]
        session: Option<String>,
    },
    /// Classify one query and print the result as JSON.
    Route {
        query: String,
        /// Session to classify against.
        #[arg(long = "session", default_value = "cli")]
        session: String,
    },
    /// Pick a chart for a table and print the spec as JSON.
    Chart {
        /// JSON file holding `{"columns": [...], "rows": [[...], ...]}`.
        #[arg(short = 'f', long = "file")]
        file: PathBuf,
        /// The question the table answers.
        query: String,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > RELAY_CONFIG env var > ~/.relay/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("RELAY_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config: &RelayConfig) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config.general.log_level.clone())
    }

    /// Apply model overrides from the command line onto the loaded config.
    pub fn apply_overrides(&self, config: &mut RelayConfig) {
        if let Some(ref model) = self.model {
            config.model.model = model.clone();
        }
        if let Some(ref url) = self.base_url {
            config.model.base_url = url.clone();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".relay").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".relay").join("config.toml");
    }
    PathBuf::from("config.toml")
}
