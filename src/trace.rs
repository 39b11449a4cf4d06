//! Best-effort per-stage tracing.
//!
//! Each stage invocation can emit one `TraceRecord` to an injected sink.
//! Tracing is strictly observational: a sink failure is logged at debug
//! level and discarded, and must never alter a stage's own result. The
//! no-op sink is the default collaborator, so optionality is a structural
//! property of the wiring rather than an environment check inside stages.
//!
//! # Log Format
//!
//! The file sink appends newline-delimited JSON:
//!
//! ```jsonl
//! {"schema_version":1,"stage":"recommend-majors","outcome":"ok","duration_ms":4200,...}
//! {"schema_version":1,"stage":"recommend-schools","outcome":"error",...}
//! ```

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;

use crate::context::ReportContext;
use crate::lm::Provider;
use crate::stage::{StageError, StageSpec};

/// Current schema version for trace records.
pub const TRACE_SCHEMA_VERSION: u32 = 1;

const PREVIEW_CHARS: usize = 500;

/// Outcome of one traced stage invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceOutcome {
    Ok,
    Error,
}

/// One observation of a stage invocation. Ephemeral; never persisted by
/// the core itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Schema version for forwards compatibility.
    pub schema_version: u32,

    /// Stage name.
    pub stage: String,

    /// Context keys the stage read.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub requires: Vec<String>,

    /// Rendered prompt preview (first ~500 chars).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_preview: Option<String>,

    /// Generated output preview (first ~500 chars).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_preview: Option<String>,

    /// Whether the stage succeeded.
    pub outcome: TraceOutcome,

    /// Error message if the stage failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Duration of the stage invocation in milliseconds.
    pub duration_ms: u64,
}

#[derive(Debug, Error)]
#[error("trace sink failure: {0}")]
pub struct TraceSinkError(pub String);

/// Destination for trace records. May fail; failures are discarded at the
/// wrapper boundary.
pub trait TraceSink: Send + Sync {
    fn record(&self, record: &TraceRecord) -> Result<(), TraceSinkError>;
}

/// Default sink: drops every record.
pub struct NoopSink;

impl TraceSink for NoopSink {
    fn record(&self, _record: &TraceRecord) -> Result<(), TraceSinkError> {
        Ok(())
    }
}

/// Sink that appends one JSON line per record to a file.
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl TraceSink for JsonlSink {
    fn record(&self, record: &TraceRecord) -> Result<(), TraceSinkError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|err| TraceSinkError(err.to_string()))?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| TraceSinkError(err.to_string()))?;
        let line =
            serde_json::to_string(record).map_err(|err| TraceSinkError(err.to_string()))?;
        writeln!(file, "{line}").map_err(|err| TraceSinkError(err.to_string()))?;
        Ok(())
    }
}

/// Hand a record to the sink, swallowing sink failures.
pub fn emit(sink: &dyn TraceSink, record: TraceRecord) {
    if let Err(err) = sink.record(&record) {
        tracing::debug!(stage = %record.stage, %err, "trace sink failure ignored");
    }
}

/// Truncate a preview to a char boundary.
pub fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(PREVIEW_CHARS).collect();
    format!("{cut}...")
}

/// Execute a stage with tracing around the call. Returns exactly what
/// `StageSpec::execute` returns; the sink cannot affect the result.
pub fn traced(
    stage: &StageSpec,
    ctx: &ReportContext,
    provider: &dyn Provider,
    sink: &dyn TraceSink,
) -> Result<(String, String), StageError> {
    let start = Instant::now();
    let prompt_preview = stage.render_prompt(ctx).ok().map(|p| preview(&p));
    let result = stage.execute(ctx, provider);
    let duration_ms = start.elapsed().as_millis() as u64;

    let record = match &result {
        Ok((_, text)) => TraceRecord {
            schema_version: TRACE_SCHEMA_VERSION,
            stage: stage.name.clone(),
            requires: stage.requires.clone(),
            prompt_preview,
            output_preview: Some(preview(text)),
            outcome: TraceOutcome::Ok,
            error: None,
            duration_ms,
        },
        Err(err) => TraceRecord {
            schema_version: TRACE_SCHEMA_VERSION,
            stage: stage.name.clone(),
            requires: stage.requires.clone(),
            prompt_preview,
            output_preview: None,
            outcome: TraceOutcome::Error,
            error: Some(err.to_string()),
            duration_ms,
        },
    };
    emit(sink, record);

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PROFILE_KEY;
    use crate::lm::ProviderError;

    struct OkProvider;

    impl Provider for OkProvider {
        fn generate(&self, _prompt: &str) -> Result<String, ProviderError> {
            Ok("generated text".to_string())
        }
    }

    struct FailingSink;

    impl TraceSink for FailingSink {
        fn record(&self, _record: &TraceRecord) -> Result<(), TraceSinkError> {
            Err(TraceSinkError("sink unreachable".to_string()))
        }
    }

    fn stage() -> StageSpec {
        StageSpec::new("recommend-majors", &[PROFILE_KEY], "majors_report", "{profile}")
    }

    fn seeded_ctx() -> ReportContext {
        let mut ctx = ReportContext::new();
        ctx.insert_text(PROFILE_KEY, "profile text").unwrap();
        ctx
    }

    #[test]
    fn record_round_trips_through_json() {
        let record = TraceRecord {
            schema_version: TRACE_SCHEMA_VERSION,
            stage: "recommend-majors".to_string(),
            requires: vec![PROFILE_KEY.to_string()],
            prompt_preview: Some("prompt".to_string()),
            output_preview: Some("output".to_string()),
            outcome: TraceOutcome::Ok,
            error: None,
            duration_ms: 42,
        };
        let json = serde_json::to_string(&record).unwrap();
        let parsed: TraceRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.stage, "recommend-majors");
        assert_eq!(parsed.outcome, TraceOutcome::Ok);
    }

    #[test]
    fn jsonl_sink_appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let sink = JsonlSink::new(path.clone());

        traced(&stage(), &seeded_ctx(), &OkProvider, &sink).unwrap();
        traced(&stage(), &seeded_ctx(), &OkProvider, &sink).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let record: TraceRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(record.stage, "recommend-majors");
        assert_eq!(record.output_preview.as_deref(), Some("generated text"));
    }

    #[test]
    fn failing_sink_does_not_change_stage_result() {
        let ctx = seeded_ctx();
        let with_noop = traced(&stage(), &ctx, &OkProvider, &NoopSink).unwrap();
        let with_failing = traced(&stage(), &ctx, &OkProvider, &FailingSink).unwrap();
        assert_eq!(with_noop, with_failing);
    }

    #[test]
    fn preview_truncates_on_char_boundaries() {
        let long: String = "大".repeat(600);
        let cut = preview(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 503);
    }
}
