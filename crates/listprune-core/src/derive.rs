//! Run-time pattern derivation
//!
//! The extraction pattern has exactly one capture group marking the
//! identifier field. To remove or rename entries we need patterns that match
//! specific identifiers in that position, and the hosted dialect has no
//! lookbehind, so the group cannot be replaced positionally. Instead the
//! locator finds the group *together with the one literal character
//! immediately before it*; that character lands in the locator's own capture
//! group 1 and is preserved verbatim when the surrounding fragments are
//! spliced back together.
//!
//! All splicing here is explicit string surgery on integer offsets. It is
//! fragile by nature, so each fragment operation is unit-tested on its own.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{CoreError, Result};

/// Matches the single capture group of an extraction pattern plus the
/// literal character before it. `[^?]` right after the opening paren keeps
/// non-capturing `(?:` groups from matching; the `[^\\]` checks keep escaped
/// parens from terminating the span early.
static CAPTURE_LOCATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^\\])\([^?].*?[^\\]\)").unwrap());

/// Flags every list pattern is compiled with, by convention.
const PATTERN_FLAGS: &str = "(?im)";

/// Byte offsets of the capture group within a pattern body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSpan {
    /// End of the preserved preceding character; the prefix fragment is
    /// `body[..preceding_end]`.
    pub preceding_end: usize,
    /// End of the capture group; the suffix fragment is `body[group_end..]`.
    pub group_end: usize,
}

/// Derives removal and rename patterns from an extraction pattern.
///
/// Owns its precompiled locator; construct once and share, rather than
/// reaching for process globals.
#[derive(Debug, Clone)]
pub struct PatternDeriver {
    locator: Regex,
}

impl PatternDeriver {
    pub fn new() -> Self {
        Self {
            locator: CAPTURE_LOCATOR.clone(),
        }
    }

    /// Strip the conventional `(?im)` prefix; derivation re-adds it, and it
    /// must not end up inside a derived capture group.
    pub fn strip_flags(pattern: &str) -> &str {
        pattern.strip_prefix(PATTERN_FLAGS).unwrap_or(pattern)
    }

    /// Locate the capture group in a pattern body.
    ///
    /// Fails with [`CoreError::CaptureGroupAtStart`] when there is no
    /// literal character before the group, which makes the pattern unusable
    /// for derivation. Callers reject such patterns before doing anything
    /// else with the list.
    pub fn locate(&self, body: &str) -> Result<CaptureSpan> {
        let caps = self
            .locator
            .captures(body)
            .ok_or_else(|| CoreError::CaptureGroupAtStart(body.to_string()))?;
        // group 1 always participates when the locator matches
        let preceding = caps.get(1).map(|m| m.end()).unwrap_or_default();
        let full = caps.get(0).map(|m| m.end()).unwrap_or_default();
        Ok(CaptureSpan {
            preceding_end: preceding,
            group_end: full,
        })
    }

    /// Derive the removal pattern: the capture group becomes a non-capturing
    /// alternation of every identifier to remove, each escaped as a literal.
    /// A trailing `\n?` eats the entry's newline so removal does not leave a
    /// blank line behind.
    ///
    /// Callers skip this entirely when the removal set is empty.
    pub fn derive_removal(&self, body: &str, identifiers: &[&str]) -> Result<String> {
        let span = self.locate(body)?;

        let mut pattern = String::with_capacity(body.len() + 16 * identifiers.len());
        pattern.push_str(PATTERN_FLAGS);
        pattern.push_str(&body[..span.preceding_end]);
        pattern.push_str("(?:");
        for (i, identifier) in identifiers.iter().enumerate() {
            if i > 0 {
                pattern.push('|');
            }
            pattern.push_str(&regex::escape(identifier));
        }
        pattern.push(')');
        pattern.push_str(&body[span.group_end..]);
        pattern.push_str(r"\n?");
        Ok(pattern)
    }

    /// Derive a rename pattern for one identifier: the fragments around the
    /// capture group become capture groups themselves, flanking the old
    /// identifier as an escaped literal. A match is then substituted with
    /// `${1}<new>${2}`.
    pub fn derive_rename(&self, body: &str, old: &str) -> Result<String> {
        let span = self.locate(body)?;

        let mut pattern = String::with_capacity(body.len() + old.len() + 8);
        pattern.push_str(PATTERN_FLAGS);
        pattern.push('(');
        pattern.push_str(&body[..span.preceding_end]);
        pattern.push(')');
        pattern.push_str(&regex::escape(old));
        pattern.push('(');
        pattern.push_str(&body[span.group_end..]);
        pattern.push(')');
        Ok(pattern)
    }

    /// Escape an identifier for use as a literal inside a replacement
    /// template, where `$` introduces a group reference.
    pub fn escape_replacement(identifier: &str) -> String {
        identifier.replace('$', "$$")
    }
}

impl Default for PatternDeriver {
    fn default() -> Self {
        Self::new()
    }
}
