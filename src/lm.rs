//! LM providers: prompt text in, generated text out.
//!
//! The pipeline is agnostic to which backend produces text. Rather than
//! embedding a fixed vendor SDK, the default provider delegates to a
//! user-configured command (any tool that accepts a prompt on stdin and
//! prints the response on stdout, e.g. `llm`, `ollama run`, custom
//! scripts). An OpenAI-compatible HTTP provider is available for direct
//! endpoint access.
//!
//! Providers are injected into the orchestrator; there is no global
//! registry. A provider must be safe for sequential reuse across runs.

use serde_json::Value;
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Instant;
use thiserror::Error;

use crate::config::{HttpProviderConfig, ProviderConfig, ReportConfig, LM_COMMAND_ENV};

/// One generation call. Implementations must not retry internally; a
/// failed call is a failed call.
pub trait Provider: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Failure of a single provider invocation.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("LM command is empty")]
    EmptyCommand,
    #[error("no LM provider configured (use --lm, a config provider entry, or UNIREP_LM_COMMAND)")]
    NotConfigured,
    #[error("parse LM command {command:?}: {reason}")]
    BadCommand { command: String, reason: String },
    #[error("spawn LM command {program:?}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("write prompt to LM stdin: {0}")]
    Stdin(#[source] std::io::Error),
    #[error("wait for LM command: {0}")]
    Wait(#[source] std::io::Error),
    #[error("LM command failed with status {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("decode LM response as UTF-8")]
    Decode,
    #[error("environment variable {0} is not set")]
    MissingApiKey(String),
    #[error("LM endpoint request failed: {0}")]
    Transport(String),
    #[error("LM endpoint returned a malformed response: {0}")]
    MalformedResponse(String),
}

/// Provider that spawns a configured command per call, writing the prompt
/// to its stdin and reading the response from its stdout.
pub struct CommandProvider {
    argv: Vec<String>,
}

impl CommandProvider {
    pub fn new(command: &str) -> Result<Self, ProviderError> {
        let argv = shell_words::split(command).map_err(|err| ProviderError::BadCommand {
            command: command.to_string(),
            reason: err.to_string(),
        })?;
        if argv.is_empty() {
            return Err(ProviderError::EmptyCommand);
        }
        Ok(Self { argv })
    }
}

impl Provider for CommandProvider {
    fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let start = Instant::now();
        let mut child = Command::new(&self.argv[0])
            .args(&self.argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ProviderError::Spawn {
                program: self.argv[0].clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .map_err(ProviderError::Stdin)?;
        }

        let output = child.wait_with_output().map_err(ProviderError::Wait)?;
        let elapsed_ms = start.elapsed().as_millis();
        tracing::info!(
            elapsed_ms,
            prompt_bytes = prompt.len(),
            response_bytes = output.stdout.len(),
            "lm invoke complete"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::Failed {
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| ProviderError::Decode)
    }
}

/// Provider that posts to an OpenAI-compatible chat-completions endpoint.
pub struct HttpProvider {
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpProvider {
    /// Build a provider from config, reading the API key from the
    /// configured environment variable at construction time.
    pub fn new(config: &HttpProviderConfig) -> Result<Self, ProviderError> {
        let api_key = match config.api_key_env.as_deref() {
            Some(var) => Some(
                std::env::var(var).map_err(|_| ProviderError::MissingApiKey(var.to_string()))?,
            ),
            None => None,
        };
        Ok(Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
        })
    }
}

impl Provider for HttpProvider {
    fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let start = Instant::now();
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
        });

        let mut request = ureq::post(self.endpoint.as_str());
        if let Some(key) = &self.api_key {
            request = request.header("authorization", format!("Bearer {key}"));
        }
        let mut response = request
            .send_json(&body)
            .map_err(|err| ProviderError::Transport(err.to_string()))?;
        let value: Value = response
            .body_mut()
            .read_json()
            .map_err(|err| ProviderError::Transport(err.to_string()))?;

        let elapsed_ms = start.elapsed().as_millis();
        tracing::info!(elapsed_ms, prompt_bytes = prompt.len(), "lm endpoint complete");

        value["choices"][0]["message"]["content"]
            .as_str()
            .map(|text| text.to_string())
            .ok_or_else(|| {
                ProviderError::MalformedResponse(
                    "missing choices[0].message.content".to_string(),
                )
            })
    }
}

/// Resolve the provider in priority order: `--lm` flag, config file,
/// `UNIREP_LM_COMMAND` environment variable.
pub fn resolve_provider(
    flag: Option<&str>,
    config: &ReportConfig,
) -> Result<Box<dyn Provider>, ProviderError> {
    if let Some(command) = flag {
        return Ok(Box::new(CommandProvider::new(command)?));
    }
    match &config.provider {
        Some(ProviderConfig::Command { command }) => Ok(Box::new(CommandProvider::new(command)?)),
        Some(ProviderConfig::Http(http)) => Ok(Box::new(HttpProvider::new(http)?)),
        None => match std::env::var(LM_COMMAND_ENV) {
            Ok(command) => Ok(Box::new(CommandProvider::new(&command)?)),
            Err(_) => Err(ProviderError::NotConfigured),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn empty_command_is_rejected() {
        assert!(matches!(
            CommandProvider::new("   "),
            Err(ProviderError::EmptyCommand)
        ));
    }

    #[test]
    fn unbalanced_quotes_are_rejected() {
        assert!(matches!(
            CommandProvider::new("llm 'unterminated"),
            Err(ProviderError::BadCommand { .. })
        ));
    }

    #[test]
    fn command_provider_round_trips_through_cat() {
        // Skip on systems without cat on PATH.
        if find_in_path("cat").is_none() {
            return;
        }
        let provider = CommandProvider::new("cat").unwrap();
        let response = provider.generate("echo this back").unwrap();
        assert_eq!(response, "echo this back");
    }

    #[test]
    fn failing_command_surfaces_stderr() {
        if find_in_path("sh").is_none() {
            return;
        }
        let provider = CommandProvider::new("sh -c 'echo boom >&2; exit 3'").unwrap();
        let err = provider.generate("ignored").unwrap_err();
        match err {
            ProviderError::Failed { stderr, .. } => assert_eq!(stderr, "boom"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    fn find_in_path(name: &str) -> Option<PathBuf> {
        let path_var = std::env::var_os("PATH")?;
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }
}
