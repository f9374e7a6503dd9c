//! Status classification
//!
//! Determines, for one normalized identifier, what a pruning pass should do
//! with its entries: keep them, remove them (inactive or indeffed), or
//! rewrite them to a new identifier.

use serde::Serialize;
use time::OffsetDateTime;
use tracing::debug;

use crate::directory::ActivityDirectory;
use crate::error::{CoreError, Result};
use crate::identifier::{normalize, CaseOverrides};

/// The classification outcome for one identifier in one pruning pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Disposition {
    /// Qualifying activity within the window; the entry stays.
    Active,
    /// No activity and no redirect; the entry is removed.
    InactiveExpired,
    /// Indefinitely blocked; the entry is removed regardless of anything
    /// else the lookups found.
    IndefinitelyBlocked,
    /// The subject now goes by another identifier; the entry is rewritten.
    RenamedTo(String),
}

/// Classifies identifiers against an [`ActivityDirectory`].
pub struct Classifier<'a> {
    directory: &'a dyn ActivityDirectory,
    overrides: &'a CaseOverrides,
}

impl<'a> Classifier<'a> {
    pub fn new(directory: &'a dyn ActivityDirectory, overrides: &'a CaseOverrides) -> Self {
        Self {
            directory,
            overrides,
        }
    }

    /// Classify one identifier. Short-circuiting, in order:
    ///
    /// 1. activity within the window keeps the subject (pending the block
    ///    check);
    /// 2. otherwise a redirect target, if any, becomes both the pending
    ///    rename and the identity the block check runs against. No redirect
    ///    means `InactiveExpired`, with no block check at all;
    /// 3. an indefinite block imposed before `block_cutoff` replaces any
    ///    pending `Active`/`RenamedTo` outright.
    ///
    /// Lookup errors propagate as [`CoreError::Lookup`]; they are never
    /// collapsed into a disposition.
    pub async fn classify(
        &self,
        identifier: &str,
        inactivity_cutoff: OffsetDateTime,
        block_cutoff: OffsetDateTime,
    ) -> Result<Disposition> {
        let active = self
            .directory
            .has_activity_since(identifier, inactivity_cutoff)
            .await
            .map_err(CoreError::Lookup)?;

        let mut effective = identifier.to_string();
        let mut pending = Disposition::Active;

        if !active {
            match self
                .directory
                .redirect_target_of(identifier)
                .await
                .map_err(CoreError::Lookup)?
            {
                Some(target) => {
                    let target = normalize(&target, self.overrides);
                    debug!(old = identifier, new = %target, "redirect found");
                    if target != identifier {
                        pending = Disposition::RenamedTo(target.clone());
                    }
                    // block status is checked against the current identity
                    effective = target;
                }
                None => {
                    debug!(identifier, "no activity and no redirect, expiring");
                    return Ok(Disposition::InactiveExpired);
                }
            }
        }

        if self
            .directory
            .is_indef_blocked_since(&effective, block_cutoff)
            .await
            .map_err(CoreError::Lookup)?
        {
            debug!(identifier, "indefinitely blocked");
            return Ok(Disposition::IndefinitelyBlocked);
        }

        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use async_trait::async_trait;
    use time::OffsetDateTime;

    use super::*;

    /// Fake directory: explicit sets/maps, optionally failing on a name.
    #[derive(Default)]
    struct FakeDirectory {
        active: HashSet<String>,
        redirects: HashMap<String, String>,
        blocked: HashSet<String>,
        failing: HashSet<String>,
    }

    #[async_trait]
    impl ActivityDirectory for FakeDirectory {
        async fn has_activity_since(
            &self,
            identifier: &str,
            _cutoff: OffsetDateTime,
        ) -> anyhow::Result<bool> {
            if self.failing.contains(identifier) {
                anyhow::bail!("replica went away");
            }
            Ok(self.active.contains(identifier))
        }

        async fn redirect_target_of(&self, identifier: &str) -> anyhow::Result<Option<String>> {
            Ok(self.redirects.get(identifier).cloned())
        }

        async fn is_indef_blocked_since(
            &self,
            identifier: &str,
            _cutoff: OffsetDateTime,
        ) -> anyhow::Result<bool> {
            Ok(self.blocked.contains(identifier))
        }
    }

    fn now() -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH
    }

    async fn classify(dir: &FakeDirectory, id: &str) -> Result<Disposition> {
        let overrides = CaseOverrides::default();
        Classifier::new(dir, &overrides)
            .classify(id, now(), now())
            .await
    }

    #[tokio::test]
    async fn test_active_subject_stays() {
        let dir = FakeDirectory {
            active: ["Alice".to_string()].into(),
            ..Default::default()
        };
        assert_eq!(classify(&dir, "Alice").await.unwrap(), Disposition::Active);
    }

    #[tokio::test]
    async fn test_inactive_without_redirect_expires() {
        let dir = FakeDirectory::default();
        assert_eq!(
            classify(&dir, "Bob").await.unwrap(),
            Disposition::InactiveExpired
        );
    }

    #[tokio::test]
    async fn test_inactive_with_redirect_renames() {
        let dir = FakeDirectory {
            redirects: [("Bob".to_string(), "Robert".to_string())].into(),
            ..Default::default()
        };
        assert_eq!(
            classify(&dir, "Bob").await.unwrap(),
            Disposition::RenamedTo("Robert".to_string())
        );
    }

    #[tokio::test]
    async fn test_redirect_target_is_normalized() {
        let dir = FakeDirectory {
            redirects: [("Bob".to_string(), "robert_q/archive".to_string())].into(),
            ..Default::default()
        };
        assert_eq!(
            classify(&dir, "Bob").await.unwrap(),
            Disposition::RenamedTo("Robert q".to_string())
        );
    }

    #[tokio::test]
    async fn test_self_redirect_is_not_a_rename() {
        let dir = FakeDirectory {
            redirects: [("Bob".to_string(), "bob/Archive".to_string())].into(),
            ..Default::default()
        };
        assert_eq!(classify(&dir, "Bob").await.unwrap(), Disposition::Active);
    }

    #[tokio::test]
    async fn test_block_beats_active() {
        let dir = FakeDirectory {
            active: ["Alice".to_string()].into(),
            blocked: ["Alice".to_string()].into(),
            ..Default::default()
        };
        assert_eq!(
            classify(&dir, "Alice").await.unwrap(),
            Disposition::IndefinitelyBlocked
        );
    }

    #[tokio::test]
    async fn test_block_beats_rename_and_is_checked_against_target() {
        // Carol redirects to Caroline; Caroline is blocked, Carol is not.
        let dir = FakeDirectory {
            redirects: [("Carol".to_string(), "Caroline".to_string())].into(),
            blocked: ["Caroline".to_string()].into(),
            ..Default::default()
        };
        assert_eq!(
            classify(&dir, "Carol").await.unwrap(),
            Disposition::IndefinitelyBlocked
        );
    }

    #[tokio::test]
    async fn test_expired_subject_skips_block_check() {
        // blocked, but already expired with no redirect: block check never
        // runs, the removal reason stays "inactive"
        let dir = FakeDirectory {
            blocked: ["Bob".to_string()].into(),
            ..Default::default()
        };
        assert_eq!(
            classify(&dir, "Bob").await.unwrap(),
            Disposition::InactiveExpired
        );
    }

    #[tokio::test]
    async fn test_lookup_error_is_fatal() {
        let dir = FakeDirectory {
            failing: ["Alice".to_string()].into(),
            ..Default::default()
        };
        assert!(matches!(
            classify(&dir, "Alice").await,
            Err(CoreError::Lookup(_))
        ));
    }
}
