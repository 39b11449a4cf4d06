//! Student profile resolution.
//!
//! A profile reference is either inline text or a path to a text file.
//! Resolution happens before any LM call; an unresolvable reference is
//! fatal for the run.

use std::fs;
use std::path::PathBuf;
use thiserror::Error;

/// How the caller names a profile.
#[derive(Debug, Clone)]
pub enum ProfileRef {
    /// The profile text itself.
    Inline(String),
    /// A path to a UTF-8 text file holding the profile.
    File(PathBuf),
}

/// Resolved profile text, immutable once read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    text: String,
}

impl Profile {
    pub fn text(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile file {path:?} not found")]
    NotFound { path: PathBuf },
    #[error("read profile {path:?}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("profile text is empty")]
    Empty,
}

/// Resolve a profile reference to profile text.
pub fn resolve(reference: &ProfileRef) -> Result<Profile, ProfileError> {
    let text = match reference {
        ProfileRef::Inline(text) => text.clone(),
        ProfileRef::File(path) => {
            if !path.is_file() {
                return Err(ProfileError::NotFound { path: path.clone() });
            }
            fs::read_to_string(path).map_err(|source| ProfileError::Unreadable {
                path: path.clone(),
                source,
            })?
        }
    };
    if text.trim().is_empty() {
        return Err(ProfileError::Empty);
    }
    Ok(Profile { text })
}
