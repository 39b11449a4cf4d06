//! Prompt templates compiled into the binary.
//!
//! Templates use `{key}` slots that are filled by plain substitution when
//! a stage renders its prompt; no template logic beyond replacement.

pub const MAJORS_PROMPT_MD: &str = include_str!("../prompts/majors.md");
pub const SCHOOLS_PROMPT_MD: &str = include_str!("../prompts/schools.md");
pub const SCHOOL_DETAIL_PROMPT_MD: &str = include_str!("../prompts/school_detail.md");
pub const EXTRACT_SCHOOLS_PROMPT_MD: &str = include_str!("../prompts/extract_schools.md");
