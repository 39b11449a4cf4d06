//! Append-only key/value context threaded through one report run.
//!
//! Every stage reads the keys it declares and writes exactly one new key.
//! Once a key is set it is never overwritten, so downstream stages can
//! trust the presence and stability of upstream outputs. The context lives
//! for a single pipeline run and is owned by the orchestrator.

use std::collections::BTreeMap;
use thiserror::Error;

/// Seed key holding the student profile text.
pub const PROFILE_KEY: &str = "profile";
/// Output key of the majors-recommendation stage.
pub const MAJORS_KEY: &str = "majors_report";
/// Output key of the schools-recommendation stage.
pub const SCHOOLS_KEY: &str = "schools_report";
/// Output key of the extraction stage: the ordered school-name list.
pub const SCHOOL_NAMES_KEY: &str = "school_names";

/// Output key of the detail stage for the school at `index` (0-based).
pub fn detail_key(index: usize) -> String {
    format!("school_detail_{}", index + 1)
}

/// A value stored in the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextValue {
    Text(String),
    List(Vec<String>),
}

/// Context misuse. These indicate a pipeline configuration bug, not a
/// runtime condition; the orchestrator's composition-time validation is
/// expected to rule them out before any provider call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("context key {key:?} is already set; stage outputs are append-only")]
    Overwrite { key: String },
    #[error("context key {key:?} is missing")]
    Missing { key: String },
    #[error("context key {key:?} does not hold text")]
    NotText { key: String },
    #[error("context key {key:?} does not hold a list")]
    NotList { key: String },
}

/// The accumulating store for one pipeline run.
#[derive(Debug, Default)]
pub struct ReportContext {
    values: BTreeMap<String, ContextValue>,
}

impl ReportContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text value under a fresh key.
    pub fn insert_text(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), ContextError> {
        self.insert(key.into(), ContextValue::Text(value.into()))
    }

    /// Append a list value under a fresh key.
    pub fn insert_list(
        &mut self,
        key: impl Into<String>,
        values: Vec<String>,
    ) -> Result<(), ContextError> {
        self.insert(key.into(), ContextValue::List(values))
    }

    fn insert(&mut self, key: String, value: ContextValue) -> Result<(), ContextError> {
        if self.values.contains_key(&key) {
            return Err(ContextError::Overwrite { key });
        }
        self.values.insert(key, value);
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    /// Fetch a text value, failing on absent or non-text keys.
    pub fn text(&self, key: &str) -> Result<&str, ContextError> {
        match self.values.get(key) {
            Some(ContextValue::Text(text)) => Ok(text),
            Some(_) => Err(ContextError::NotText {
                key: key.to_string(),
            }),
            None => Err(ContextError::Missing {
                key: key.to_string(),
            }),
        }
    }

    /// Fetch a list value, failing on absent or non-list keys.
    pub fn list(&self, key: &str) -> Result<&[String], ContextError> {
        match self.values.get(key) {
            Some(ContextValue::List(values)) => Ok(values),
            Some(_) => Err(ContextError::NotList {
                key: key.to_string(),
            }),
            None => Err(ContextError::Missing {
                key: key.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_read_back() {
        let mut ctx = ReportContext::new();
        ctx.insert_text(PROFILE_KEY, "a profile").unwrap();
        ctx.insert_list(SCHOOL_NAMES_KEY, vec!["Alpha University".to_string()])
            .unwrap();

        assert_eq!(ctx.text(PROFILE_KEY).unwrap(), "a profile");
        assert_eq!(
            ctx.list(SCHOOL_NAMES_KEY).unwrap(),
            ["Alpha University".to_string()]
        );
    }

    #[test]
    fn overwrite_is_rejected() {
        let mut ctx = ReportContext::new();
        ctx.insert_text(MAJORS_KEY, "first").unwrap();
        let err = ctx.insert_text(MAJORS_KEY, "second").unwrap_err();
        assert_eq!(
            err,
            ContextError::Overwrite {
                key: MAJORS_KEY.to_string()
            }
        );
        // The original value is untouched.
        assert_eq!(ctx.text(MAJORS_KEY).unwrap(), "first");
    }

    #[test]
    fn missing_and_mistyped_keys() {
        let mut ctx = ReportContext::new();
        ctx.insert_list(SCHOOL_NAMES_KEY, vec![]).unwrap();

        assert_eq!(
            ctx.text(SCHOOLS_KEY).unwrap_err(),
            ContextError::Missing {
                key: SCHOOLS_KEY.to_string()
            }
        );
        assert_eq!(
            ctx.text(SCHOOL_NAMES_KEY).unwrap_err(),
            ContextError::NotText {
                key: SCHOOL_NAMES_KEY.to_string()
            }
        );
    }

    #[test]
    fn detail_keys_are_one_indexed() {
        assert_eq!(detail_key(0), "school_detail_1");
        assert_eq!(detail_key(2), "school_detail_3");
    }
}
