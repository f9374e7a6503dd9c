//! Document rewriting
//!
//! Applies derived patterns to the document text: removals first, then
//! renames over the already-once-rewritten text. If nothing applies the
//! output is byte-identical to the input, which callers use as the no-op
//! signal to skip writing.

use regex::Regex;

use crate::derive::PatternDeriver;
use crate::error::{CoreError, Result};

/// One rename to apply: the derived pattern, plus the old/new identifiers
/// as they should appear in link fixups.
#[derive(Debug, Clone)]
pub struct RenameRule {
    pub pattern: String,
    pub old: String,
    pub new: String,
}

/// Rewrite `document`: strip every removal match, then substitute every
/// rename match.
///
/// The rename substitution also performs a narrow literal fixup inside each
/// rewritten entry: a simple self-link whose target was already updated but
/// whose visible text still reads as the old identifier
/// (`[[User:New|Old]]`), and any literal `User talk:Old` reference. Fancier
/// styled signatures are deliberately left alone; their links still work.
pub fn rewrite(
    document: &str,
    removal_pattern: Option<&str>,
    renames: &[RenameRule],
) -> Result<String> {
    let mut text = document.to_string();

    if let Some(pattern) = removal_pattern {
        let removal = compile_derived(pattern)?;
        text = removal.replace_all(&text, "").into_owned();
    }

    for rule in renames {
        let rename = compile_derived(&rule.pattern)?;
        let template = format!(
            "${{1}}{}${{2}}",
            PatternDeriver::escape_replacement(&rule.new)
        );
        let self_link_stale = format!("[[User:{}|{}]]", rule.new, rule.old);
        let self_link_fixed = format!("[[User:{}|{}]]", rule.new, rule.new);
        let talk_old = format!("User talk:{}", rule.old);
        let talk_new = format!("User talk:{}", rule.new);

        text = rename
            .replace_all(&text, |caps: &regex::Captures| {
                let mut expanded = String::new();
                caps.expand(&template, &mut expanded);
                expanded
                    .replace(&self_link_stale, &self_link_fixed)
                    .replace(&talk_old, &talk_new)
            })
            .into_owned();
    }

    Ok(text)
}

/// Derived patterns are built by us; a compile failure here is an invariant
/// violation in the deriver, not a user error.
fn compile_derived(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| CoreError::DerivedPattern {
        pattern: pattern.to_string(),
        source,
    })
}
