//! Shared test infrastructure for integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use uni_report::lm::{Provider, ProviderError};
use uni_report::trace::{TraceRecord, TraceSink, TraceSinkError};

/// Provider that replays a fixed script of responses and counts calls.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, String>>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<&str, &str>>) -> Self {
        Self {
            script: Mutex::new(
                script
                    .into_iter()
                    .map(|step| match step {
                        Ok(text) => Ok(text.to_string()),
                        Err(message) => Err(message.to_string()),
                    })
                    .collect(),
            ),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Provider for ScriptedProvider {
    fn generate(&self, _prompt: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(ProviderError::Transport(message)),
            None => Err(ProviderError::Transport("script exhausted".to_string())),
        }
    }
}

/// Sink that fails every record, for trace-isolation checks.
pub struct AlwaysFailingSink;

impl TraceSink for AlwaysFailingSink {
    fn record(&self, _record: &TraceRecord) -> Result<(), TraceSinkError> {
        Err(TraceSinkError("sink unreachable".to_string()))
    }
}
