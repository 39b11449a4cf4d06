//! Final report assembly.
//!
//! A pure function of the populated context: named sections concatenated
//! in fixed order under fixed Markdown headers. Missing keys are the
//! programming-error class the orchestrator's static validation rules out.

use crate::context::{detail_key, ContextError, ReportContext, MAJORS_KEY, SCHOOLS_KEY, SCHOOL_NAMES_KEY};

pub const MAJORS_SECTION_TITLE: &str = "Major Recommendations";
pub const SCHOOLS_SECTION_TITLE: &str = "School Selection";

pub fn detail_section_title(school_name: &str) -> String {
    format!("School Report: {school_name}")
}

/// One named section of the final report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub body: String,
}

/// The assembled report. Immutable once produced; owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalDocument {
    sections: Vec<Section>,
}

impl FinalDocument {
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Render the report as Markdown.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str(&format!("# {}\n\n{}", section.title, section.body.trim_end()));
        }
        out.push('\n');
        out
    }
}

/// Concatenate the generated sections in fixed order: majors, schools,
/// then one detail section per extracted school in extraction order.
pub fn assemble(ctx: &ReportContext) -> Result<FinalDocument, ContextError> {
    let mut sections = vec![
        Section {
            title: MAJORS_SECTION_TITLE.to_string(),
            body: ctx.text(MAJORS_KEY)?.to_string(),
        },
        Section {
            title: SCHOOLS_SECTION_TITLE.to_string(),
            body: ctx.text(SCHOOLS_KEY)?.to_string(),
        },
    ];
    let names = ctx.list(SCHOOL_NAMES_KEY)?;
    for (index, name) in names.iter().enumerate() {
        sections.push(Section {
            title: detail_section_title(name),
            body: ctx.text(&detail_key(index))?.to_string(),
        });
    }
    Ok(FinalDocument { sections })
}
