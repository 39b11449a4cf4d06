//! Cascading school-name extraction.
//!
//! Upstream generation is non-deterministic free text, but the detail
//! fan-out needs a fixed, predictable list to iterate over. Extraction
//! therefore runs a strict three-tier cascade with a guaranteed terminal
//! tier, each tier engaged only when the previous one left the result
//! short of the configured count:
//!
//! 1. pattern tier: structural regexes over the schools report;
//! 2. generative fallback tier: one dedicated provider call asking for
//!    the names alone, one per line (its own failure contributes zero
//!    candidates and never aborts extraction);
//! 3. placeholder tier: distinct numbered placeholder labels.
//!
//! The result always has exactly `school_count` entries, in discovery
//! order: pattern matches first, then fallback lines, placeholders last.

use regex::Regex;
use std::collections::HashSet;
use std::time::Instant;
use thiserror::Error;

use crate::config::ReportConfig;
use crate::lm::Provider;
use crate::templates::EXTRACT_SCHOOLS_PROMPT_MD;
use crate::trace::{emit, preview, TraceOutcome, TraceRecord, TraceSink, TRACE_SCHEMA_VERSION};

/// Trace name for the generative fallback call.
pub const FALLBACK_STAGE: &str = "extract-schools-fallback";

#[derive(Debug, Error)]
#[error("invalid school-name pattern {pattern:?}: {source}")]
pub struct PatternError {
    pub pattern: String,
    #[source]
    source: regex::Error,
}

/// The configured extractor. Stateless across calls; safe to reuse.
#[derive(Debug)]
pub struct SchoolExtractor {
    patterns: Vec<Regex>,
    school_count: usize,
    min_label_length: usize,
}

impl SchoolExtractor {
    pub fn from_config(config: &ReportConfig) -> Result<Self, PatternError> {
        Self::new(
            &config.name_patterns,
            config.school_count,
            config.min_label_length,
        )
    }

    pub fn new(
        patterns: &[String],
        school_count: usize,
        min_label_length: usize,
    ) -> Result<Self, PatternError> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| PatternError {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            patterns,
            school_count,
            min_label_length,
        })
    }

    /// Run the full cascade. Infallible by design: the placeholder tier
    /// guarantees exactly `school_count` entries for any input.
    pub fn extract(
        &self,
        schools_report: &str,
        provider: &dyn Provider,
        sink: &dyn TraceSink,
    ) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();

        for candidate in self.pattern_candidates(schools_report) {
            push_unique(&mut names, &mut seen, candidate);
        }

        if names.len() < self.school_count {
            tracing::debug!(
                found = names.len(),
                wanted = self.school_count,
                "pattern tier short, engaging generative fallback"
            );
            for candidate in self.fallback_candidates(schools_report, provider, sink) {
                push_unique(&mut names, &mut seen, candidate);
            }
        }

        let mut ordinal = 1;
        while names.len() < self.school_count {
            let label = format!("TBD School {ordinal}");
            ordinal += 1;
            push_unique(&mut names, &mut seen, label);
        }

        names.truncate(self.school_count);
        names
    }

    /// Tier 1: collect matches across all patterns in pattern order,
    /// deduplicated case-insensitively, length-filtered.
    pub fn pattern_candidates(&self, schools_report: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for pattern in &self.patterns {
            for found in pattern.find_iter(schools_report) {
                let candidate = found.as_str().trim().to_string();
                if self.valid(&candidate) {
                    push_unique(&mut candidates, &mut seen, candidate);
                }
            }
        }
        candidates
    }

    /// Tier 2: one provider call asking for the names, one per line.
    /// A provider failure here is caught and reported as zero candidates.
    fn fallback_candidates(
        &self,
        schools_report: &str,
        provider: &dyn Provider,
        sink: &dyn TraceSink,
    ) -> Vec<String> {
        let prompt = EXTRACT_SCHOOLS_PROMPT_MD
            .replace("{school_count}", &self.school_count.to_string())
            .replace("{schools_report}", schools_report);

        let start = Instant::now();
        let result = provider.generate(&prompt);
        let duration_ms = start.elapsed().as_millis() as u64;

        let record = match &result {
            Ok(text) => TraceRecord {
                schema_version: TRACE_SCHEMA_VERSION,
                stage: FALLBACK_STAGE.to_string(),
                requires: vec![crate::context::SCHOOLS_KEY.to_string()],
                prompt_preview: Some(preview(&prompt)),
                output_preview: Some(preview(text)),
                outcome: TraceOutcome::Ok,
                error: None,
                duration_ms,
            },
            Err(err) => TraceRecord {
                schema_version: TRACE_SCHEMA_VERSION,
                stage: FALLBACK_STAGE.to_string(),
                requires: vec![crate::context::SCHOOLS_KEY.to_string()],
                prompt_preview: Some(preview(&prompt)),
                output_preview: None,
                outcome: TraceOutcome::Error,
                error: Some(err.to_string()),
                duration_ms,
            },
        };
        emit(sink, record);

        match result {
            Ok(text) => text
                .lines()
                .map(|line| line.trim().to_string())
                .filter(|line| self.valid(line))
                .collect(),
            Err(err) => {
                tracing::warn!(%err, "generative fallback failed, continuing with placeholders");
                Vec::new()
            }
        }
    }

    fn valid(&self, label: &str) -> bool {
        label.chars().count() > self.min_label_length
    }
}

fn push_unique(names: &mut Vec<String>, seen: &mut HashSet<String>, candidate: String) {
    if seen.insert(candidate.to_lowercase()) {
        names.push(candidate);
    }
}
