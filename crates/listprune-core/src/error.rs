use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    /// The extraction pattern does not have exactly one capture group.
    /// Per-list configuration error; the pass for that list is abandoned.
    #[error("extraction pattern `{pattern}` must have exactly one capture group, found {groups}")]
    CaptureGroupCount { pattern: String, groups: usize },

    /// The capture group sits at the very start of the pattern, so there is
    /// no preceding literal character to preserve during derivation.
    #[error("extraction pattern `{0}` has no literal character before its capture group")]
    CaptureGroupAtStart(String),

    /// The extraction pattern itself does not compile. Configuration error.
    #[error("extraction pattern failed to compile: {0}")]
    Pattern(regex::Error),

    /// A derived removal/rename pattern failed to compile. This means the
    /// deriver let an unescaped metacharacter through; surfaced, never
    /// swallowed.
    #[error("derived pattern `{pattern}` failed to compile: {source}")]
    DerivedPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A directory lookup failed with something other than "no such record".
    /// Fatal to the whole pass; a disposition is never guessed.
    #[error("directory lookup failed: {0}")]
    Lookup(#[source] anyhow::Error),
}
