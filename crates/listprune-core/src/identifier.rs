//! Identifier normalization
//!
//! Entries extracted from a document may spell the same identifier with a
//! lowercase first letter, underscores instead of spaces, or a trailing
//! subpage qualifier. Everything downstream (classification, dedup,
//! reporting) works on the normalized form produced here.

use std::collections::HashMap;

/// First-letter uppercasing overrides, consulted before falling back to
/// `char::to_uppercase`.
///
/// The wiki's first-letter capitalization is not plain Unicode uppercasing:
/// the Latin digraphs get their titlecase form rather than full uppercase,
/// and `ß` is left alone (default uppercasing would expand it to `SS`,
/// which names a different subject).
#[derive(Debug, Clone)]
pub struct CaseOverrides {
    map: HashMap<char, char>,
}

impl CaseOverrides {
    /// An empty table; every first letter falls back to Unicode uppercasing.
    pub fn empty() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Add or replace a single override.
    pub fn with(mut self, from: char, to: char) -> Self {
        self.map.insert(from, to);
        self
    }

    pub fn get(&self, c: char) -> Option<char> {
        self.map.get(&c).copied()
    }
}

impl Default for CaseOverrides {
    fn default() -> Self {
        let mut map = HashMap::new();
        // ß has no single-char uppercase; the wiki keeps it as-is
        map.insert('ß', 'ß');
        // digraphs titlecase, not uppercase
        map.insert('ǆ', 'ǅ');
        map.insert('ǳ', 'ǲ');
        map.insert('ǉ', 'ǈ');
        map.insert('ǌ', 'ǋ');
        Self { map }
    }
}

/// Normalize a raw extracted identifier.
///
/// Strips everything from the first `/` (subpage qualifier), uppercases the
/// first code point via `overrides` with a Unicode fallback, and replaces
/// underscores with spaces. Pure and total: never fails, and the empty
/// string normalizes to the empty string.
pub fn normalize(raw: &str, overrides: &CaseOverrides) -> String {
    let root = raw.split('/').next().unwrap_or("");

    let mut out = String::with_capacity(root.len());
    let mut chars = root.chars();
    if let Some(first) = chars.next() {
        match overrides.get(first) {
            Some(up) => out.push(up),
            None => out.extend(first.to_uppercase()),
        }
        out.push_str(chars.as_str());
    }

    out.replace('_', " ")
}
