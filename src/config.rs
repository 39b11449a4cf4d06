//! Report configuration: loading, validation, defaults.
//!
//! Config lives in a small schema-versioned JSON file; every field has a
//! default so a partial file (or no file at all) still yields a usable
//! run. The LM command can also come from the `--lm` flag or the
//! `UNIREP_LM_COMMAND` environment variable, resolved in that order.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Current schema version for the config file.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Environment fallback for the LM command.
pub const LM_COMMAND_ENV: &str = "UNIREP_LM_COMMAND";

fn default_school_count() -> usize {
    3
}

fn default_min_label_length() -> usize {
    4
}

/// Structural patterns for the extraction pattern tier: capitalized
/// multi-word names with an institutional suffix, plus the CJK suffix
/// form. Names outside these shapes (e.g. "University of X") are left to
/// the generative fallback tier; supply custom patterns to widen the net.
pub fn default_name_patterns() -> Vec<String> {
    vec![
        r"[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\s+(?:University|College|Institute|Academy)".to_string(),
        r"\p{Han}{2,}(?:大学|学院)".to_string(),
    ]
}

/// How the pipeline reaches its LM backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Spawn a command per call: prompt on stdin, response on stdout.
    Command { command: String },
    /// POST to an OpenAI-compatible chat-completions endpoint.
    Http(HttpProviderConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpProviderConfig {
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key, if the endpoint needs one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

/// Pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    pub schema_version: u32,

    /// How many schools the report covers (the extractor's N).
    #[serde(default = "default_school_count")]
    pub school_count: usize,

    /// A school-name candidate must be strictly longer than this many
    /// characters to be considered valid.
    #[serde(default = "default_min_label_length")]
    pub min_label_length: usize,

    /// Write a per-stage JSONL trace log.
    #[serde(default)]
    pub trace_enabled: bool,

    /// Pattern-tier regex set, in match-priority order.
    #[serde(default = "default_name_patterns")]
    pub name_patterns: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderConfig>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            school_count: default_school_count(),
            min_label_length: default_min_label_length(),
            trace_enabled: false,
            name_patterns: default_name_patterns(),
            provider: None,
        }
    }
}

/// Build the default config used when no config file is given.
pub fn default_config() -> ReportConfig {
    ReportConfig::default()
}

/// Load a config file from disk.
pub fn load_config(path: &Path) -> Result<ReportConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: ReportConfig =
        serde_json::from_slice(&bytes).context("parse report config JSON")?;
    Ok(config)
}

/// Validate config schema and user-provided values.
pub fn validate_config(config: &ReportConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported report config schema_version {}",
            config.schema_version
        ));
    }
    if config.school_count == 0 {
        return Err(anyhow!("school_count must be at least 1"));
    }
    if config.name_patterns.iter().any(|p| p.trim().is_empty()) {
        return Err(anyhow!("name_patterns entries must be non-empty"));
    }
    if let Some(ProviderConfig::Http(http)) = &config.provider {
        if http.endpoint.trim().is_empty() {
            return Err(anyhow!("provider endpoint must be non-empty"));
        }
        if http.model.trim().is_empty() {
            return Err(anyhow!("provider model must be non-empty"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = default_config();
        validate_config(&config).unwrap();
        assert_eq!(config.school_count, 3);
        assert_eq!(config.min_label_length, 4);
        assert!(!config.trace_enabled);
        assert_eq!(config.name_patterns.len(), 2);
    }

    #[test]
    fn minimal_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"schema_version": 1}}"#).unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.school_count, 3);
        assert!(config.provider.is_none());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"schema_version": 1, "entity_budget": 9}}"#).unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn provider_configs_round_trip() {
        let mut config = default_config();
        config.provider = Some(ProviderConfig::Http(HttpProviderConfig {
            endpoint: "https://api.example.com/v1/chat/completions".to_string(),
            model: "small-model".to_string(),
            api_key_env: Some("EXAMPLE_API_KEY".to_string()),
        }));
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: ReportConfig = serde_json::from_str(&json).unwrap();
        match parsed.provider {
            Some(ProviderConfig::Http(http)) => assert_eq!(http.model, "small-model"),
            other => panic!("expected http provider, got {other:?}"),
        }
    }

    #[test]
    fn bad_values_fail_validation() {
        let mut config = default_config();
        config.schema_version = 99;
        assert!(validate_config(&config).is_err());

        let mut config = default_config();
        config.school_count = 0;
        assert!(validate_config(&config).is_err());

        let mut config = default_config();
        config.name_patterns = vec!["  ".to_string()];
        assert!(validate_config(&config).is_err());
    }
}
