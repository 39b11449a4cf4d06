//! Pipeline orchestration for one report run.
//!
//! The orchestrator owns the context, executes the fixed stage order
//! (majors → schools → extraction → per-school detail → assembly), and
//! statically validates the composition before the first provider call:
//! every key a stage requires must be produced by an earlier stage or be
//! the profile seed. Execution is strictly sequential; the first provider
//! failure aborts the run with the failing stage's name and no partial
//! document.

use std::collections::BTreeSet;
use thiserror::Error;

use crate::assemble::{assemble, FinalDocument};
use crate::config::ReportConfig;
use crate::context::{
    detail_key, ContextError, ReportContext, MAJORS_KEY, PROFILE_KEY, SCHOOLS_KEY,
    SCHOOL_NAMES_KEY,
};
use crate::extract::{PatternError, SchoolExtractor};
use crate::lm::{Provider, ProviderError};
use crate::profile::{self, Profile, ProfileError, ProfileRef};
use crate::stage::{StageError, StageSpec};
use crate::templates::{MAJORS_PROMPT_MD, SCHOOLS_PROMPT_MD, SCHOOL_DETAIL_PROMPT_MD};
use crate::trace::{traced, TraceSink};

pub const MAJORS_STAGE: &str = "recommend-majors";
pub const SCHOOLS_STAGE: &str = "recommend-schools";

pub fn detail_stage_name(index: usize) -> String {
    format!("school-detail-{}", index + 1)
}

/// Failure of one report run.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error("stage {stage}: generation failed: {source}")]
    GenerationFailed {
        stage: String,
        #[source]
        source: ProviderError,
    },
    #[error("invalid pipeline: stage {stage} requires key {key:?} which no earlier stage produces")]
    MissingInput { stage: String, key: String },
    #[error("invalid pipeline: stage {stage} would overwrite key {key:?}")]
    DuplicateOutput { stage: String, key: String },
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error("context misuse: {0}")]
    Context(#[from] ContextError),
}

/// Check that a stage list is executable over the seeded keys: each
/// stage's requirements must be satisfied by the seeds or an earlier
/// stage's output, and no output key may repeat. Purely static; runs
/// before any provider call.
pub fn validate_stages(stages: &[StageSpec], seeded: &[&str]) -> Result<(), ReportError> {
    let mut available: BTreeSet<String> = seeded.iter().map(|key| key.to_string()).collect();
    for stage in stages {
        for key in &stage.requires {
            if !available.contains(key) {
                return Err(ReportError::MissingInput {
                    stage: stage.name.clone(),
                    key: key.clone(),
                });
            }
        }
        if !available.insert(stage.output.clone()) {
            return Err(ReportError::DuplicateOutput {
                stage: stage.name.clone(),
                key: stage.output.clone(),
            });
        }
    }
    Ok(())
}

fn base_stages() -> Vec<StageSpec> {
    vec![
        StageSpec::new(MAJORS_STAGE, &[PROFILE_KEY], MAJORS_KEY, MAJORS_PROMPT_MD),
        StageSpec::new(
            SCHOOLS_STAGE,
            &[PROFILE_KEY, MAJORS_KEY],
            SCHOOLS_KEY,
            SCHOOLS_PROMPT_MD,
        ),
    ]
}

/// Build the detail stage for one extracted school. The school name is
/// bound into the template up front; the remaining `{profile}` slot is
/// filled from the context at render time.
fn detail_stage(index: usize, school_name: &str) -> StageSpec {
    StageSpec::new(
        detail_stage_name(index),
        &[PROFILE_KEY],
        detail_key(index),
        SCHOOL_DETAIL_PROMPT_MD.replace("{school_name}", school_name),
    )
}

fn run_stage(
    stage: &StageSpec,
    ctx: &mut ReportContext,
    provider: &dyn Provider,
    sink: &dyn TraceSink,
) -> Result<(), ReportError> {
    let (key, value) = traced(stage, ctx, provider, sink).map_err(|err| match err {
        StageError::Provider(source) => ReportError::GenerationFailed {
            stage: stage.name.clone(),
            source,
        },
        StageError::Context(err) => ReportError::Context(err),
    })?;
    tracing::info!(stage = %stage.name, output_bytes = value.len(), "stage complete");
    ctx.insert_text(key, value)?;
    Ok(())
}

/// Resolve a profile reference and generate its report.
pub fn run(
    reference: &ProfileRef,
    config: &ReportConfig,
    provider: &dyn Provider,
    sink: &dyn TraceSink,
) -> Result<FinalDocument, ReportError> {
    let profile = profile::resolve(reference)?;
    generate_report(&profile, config, provider, sink)
}

/// Generate a report for an already-resolved profile.
pub fn generate_report(
    profile: &Profile,
    config: &ReportConfig,
    provider: &dyn Provider,
    sink: &dyn TraceSink,
) -> Result<FinalDocument, ReportError> {
    let stages = base_stages();
    validate_stages(&stages, &[PROFILE_KEY])?;
    let extractor = SchoolExtractor::from_config(config)?;

    let mut ctx = ReportContext::new();
    ctx.insert_text(PROFILE_KEY, profile.text())?;

    for stage in &stages {
        run_stage(stage, &mut ctx, provider, sink)?;
    }

    let schools_report = ctx.text(SCHOOLS_KEY)?.to_string();
    let names = extractor.extract(&schools_report, provider, sink);
    tracing::info!(count = names.len(), "school names extracted");
    ctx.insert_list(SCHOOL_NAMES_KEY, names.clone())?;

    // Detail fan-out: one stage per school, sequentially, in extraction
    // order. Assembly depends on a stable section order and the provider
    // is a single logical resource.
    let detail_stages: Vec<StageSpec> = names
        .iter()
        .enumerate()
        .map(|(index, name)| detail_stage(index, name))
        .collect();
    validate_stages(&detail_stages, &[PROFILE_KEY])?;
    for stage in &detail_stages {
        run_stage(stage, &mut ctx, provider, sink)?;
    }

    Ok(assemble(&ctx)?)
}
