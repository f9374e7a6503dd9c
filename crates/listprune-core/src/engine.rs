//! Pruning orchestrator
//!
//! One [`Pruner::prune`] call is one pass over one document: extract,
//! classify, derive, rewrite. A pass either completes or fails before any
//! text is returned; there is no partial rewrite.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::classify::{Classifier, Disposition};
use crate::derive::PatternDeriver;
use crate::directory::ActivityDirectory;
use crate::error::{CoreError, Result};
use crate::identifier::{normalize, CaseOverrides};
use crate::rewrite::{self, RenameRule};

/// Outcome of one pruning pass. Reporting is always under the identifier as
/// it was first seen in the document, in first-seen order.
#[derive(Debug, Clone, Serialize)]
pub struct PruneResult {
    /// The rewritten document. Byte-identical to the input when nothing was
    /// removed or renamed.
    pub text: String,
    /// Identifiers removed for inactivity; also the notification list.
    pub removed_inactive: Vec<String>,
    /// Identifiers removed for an indefinite block.
    pub removed_indeffed: Vec<String>,
    /// Old identifier to new identifier, one entry per rename.
    pub renames: Vec<(String, String)>,
}

impl PruneResult {
    pub fn inactive_count(&self) -> usize {
        self.removed_inactive.len()
    }

    pub fn indeffed_count(&self) -> usize {
        self.removed_indeffed.len()
    }

    pub fn rename_count(&self) -> usize {
        self.renames.len()
    }
}

/// Context object for pruning passes: the shared directory client, the
/// case-folding overrides, and the precompiled pattern machinery.
///
/// One `Pruner` serves any number of passes; passes are independent and may
/// run concurrently from the surrounding caller.
pub struct Pruner {
    directory: Arc<dyn ActivityDirectory>,
    overrides: CaseOverrides,
    deriver: PatternDeriver,
}

impl Pruner {
    pub fn new(directory: Arc<dyn ActivityDirectory>) -> Self {
        Self::with_overrides(directory, CaseOverrides::default())
    }

    pub fn with_overrides(directory: Arc<dyn ActivityDirectory>, overrides: CaseOverrides) -> Self {
        Self {
            directory,
            overrides,
            deriver: PatternDeriver::new(),
        }
    }

    /// Run one pruning pass over `document` using the list's extraction
    /// `pattern` and the two cutoffs computed from the list's settings.
    ///
    /// Configuration problems with the pattern (capture-group count, group
    /// with nothing before it) are rejected before the first directory
    /// lookup. Directory lookup failures abort the pass. The engine has no
    /// side effects beyond read-only directory queries.
    pub async fn prune(
        &self,
        document: &str,
        pattern: &str,
        inactivity_cutoff: OffsetDateTime,
        block_cutoff: OffsetDateTime,
    ) -> Result<PruneResult> {
        let body = PatternDeriver::strip_flags(pattern);
        let extraction = Regex::new(&format!("(?im){body}")).map_err(CoreError::Pattern)?;

        // captures_len counts the implicit whole-match group
        let groups = extraction.captures_len() - 1;
        if groups != 1 {
            return Err(CoreError::CaptureGroupCount {
                pattern: pattern.to_string(),
                groups,
            });
        }
        // a pattern the deriver cannot handle must fail before any lookup
        self.deriver.locate(body)?;

        // Unique identifiers in first-seen order, remembering every raw
        // spelling each one appeared under: the derived patterns must match
        // the document as written, while classification happens once per
        // normalized identifier.
        let mut order: Vec<String> = Vec::new();
        let mut spellings: HashMap<String, Vec<String>> = HashMap::new();
        for caps in extraction.captures_iter(document) {
            let raw = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            // only the root identifier is meaningful
            let raw = raw.split('/').next().unwrap_or_default().to_string();
            let identifier = normalize(&raw, &self.overrides);
            let seen = spellings.entry(identifier.clone()).or_insert_with(|| {
                order.push(identifier);
                Vec::new()
            });
            if !seen.contains(&raw) {
                seen.push(raw);
            }
        }
        debug!(entries = order.len(), "extracted unique identifiers");

        let classifier = Classifier::new(self.directory.as_ref(), &self.overrides);
        let mut removed_inactive = Vec::new();
        let mut removed_indeffed = Vec::new();
        let mut renames: Vec<(String, String)> = Vec::new();

        for identifier in &order {
            match classifier
                .classify(identifier, inactivity_cutoff, block_cutoff)
                .await?
            {
                Disposition::Active => {}
                Disposition::InactiveExpired => {
                    info!(%identifier, "queuing inactive identifier for removal");
                    removed_inactive.push(identifier.clone());
                }
                Disposition::IndefinitelyBlocked => {
                    info!(%identifier, "queuing indeffed identifier for removal");
                    removed_indeffed.push(identifier.clone());
                }
                Disposition::RenamedTo(new) => {
                    info!(%identifier, new = %new, "queuing identifier for rename");
                    renames.push((identifier.clone(), new));
                }
            }
        }

        let mut removal_spellings: Vec<&str> = Vec::new();
        for identifier in removed_indeffed.iter().chain(removed_inactive.iter()) {
            for raw in &spellings[identifier] {
                removal_spellings.push(raw);
            }
        }

        let removal_pattern = if removal_spellings.is_empty() {
            None
        } else {
            Some(self.deriver.derive_removal(body, &removal_spellings)?)
        };

        let mut rules = Vec::new();
        for (old, new) in &renames {
            for raw in &spellings[old] {
                rules.push(RenameRule {
                    pattern: self.deriver.derive_rename(body, raw)?,
                    old: raw.clone(),
                    new: new.clone(),
                });
            }
        }

        let text = rewrite::rewrite(document, removal_pattern.as_deref(), &rules)?;

        Ok(PruneResult {
            text,
            removed_inactive,
            removed_indeffed,
            renames,
        })
    }
}
