use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;

use listprune_core::{ActivityDirectory, CoreError, Pruner};

const PATTERN: &str = r"\{\{entry\|([^|]*)\|note\}\}";

/// In-memory directory for driving the orchestrator end to end.
#[derive(Default)]
struct FakeDirectory {
    active: HashSet<String>,
    redirects: HashMap<String, String>,
    blocked: HashSet<String>,
    lookups: AtomicUsize,
}

impl FakeDirectory {
    fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActivityDirectory for FakeDirectory {
    async fn has_activity_since(
        &self,
        identifier: &str,
        _cutoff: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.active.contains(identifier))
    }

    async fn redirect_target_of(&self, identifier: &str) -> anyhow::Result<Option<String>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.redirects.get(identifier).cloned())
    }

    async fn is_indef_blocked_since(
        &self,
        identifier: &str,
        _cutoff: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.blocked.contains(identifier))
    }
}

fn cutoff() -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH
}

async fn prune(directory: FakeDirectory, document: &str) -> listprune_core::PruneResult {
    let pruner = Pruner::new(Arc::new(directory));
    pruner
        .prune(document, PATTERN, cutoff(), cutoff())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_inactive_entry_is_removed() {
    let directory = FakeDirectory {
        active: ["Alice".to_string()].into(),
        ..Default::default()
    };
    let doc = "{{entry|Alice|note}}\n{{entry|Bob|note}}";

    let result = prune(directory, doc).await;

    assert_eq!(result.text, "{{entry|Alice|note}}\n");
    assert_eq!(result.inactive_count(), 1);
    assert_eq!(result.indeffed_count(), 0);
    assert_eq!(result.removed_inactive, vec!["Bob".to_string()]);
}

#[tokio::test]
async fn test_renamed_entry_is_rewritten_in_place() {
    let directory = FakeDirectory {
        active: ["Alice".to_string(), "Robert".to_string()].into(),
        redirects: [("Bob".to_string(), "Robert".to_string())].into(),
        ..Default::default()
    };
    let doc = "{{entry|Alice|note}}\n{{entry|Bob|note}}";

    let result = prune(directory, doc).await;

    assert_eq!(result.text, "{{entry|Alice|note}}\n{{entry|Robert|note}}");
    assert_eq!(result.rename_count(), 1);
    assert_eq!(
        result.renames,
        vec![("Bob".to_string(), "Robert".to_string())]
    );
}

#[tokio::test]
async fn test_blocked_rename_target_removes_entry_outright() {
    // Carol is inactive and redirects to Caroline; Caroline is indeffed.
    // Block precedence: the entry goes away, it is not renamed.
    let directory = FakeDirectory {
        redirects: [("Carol".to_string(), "Caroline".to_string())].into(),
        blocked: ["Caroline".to_string()].into(),
        active: ["Alice".to_string()].into(),
        ..Default::default()
    };
    let doc = "{{entry|Carol|note}}\n{{entry|Alice|note}}\n";

    let result = prune(directory, doc).await;

    assert_eq!(result.text, "{{entry|Alice|note}}\n");
    assert_eq!(result.indeffed_count(), 1);
    assert_eq!(result.rename_count(), 0);
    // reported under the original identifier
    assert_eq!(result.removed_indeffed, vec!["Carol".to_string()]);
}

#[tokio::test]
async fn test_spelling_variants_are_classified_once_and_removed_together() {
    let directory = FakeDirectory::default();
    let doc = "{{entry|Dave_Smith|note}}\n{{entry|dave Smith|note}}\n";

    let result = prune(directory, doc).await;

    // one identifier, both entries gone
    assert_eq!(result.text, "");
    assert_eq!(result.inactive_count(), 1);
    assert_eq!(result.removed_inactive, vec!["Dave Smith".to_string()]);
}

#[tokio::test]
async fn test_variants_share_one_classification() {
    let directory = FakeDirectory::default();
    let doc = "{{entry|Dave|note}}\n{{entry|dave|note}}\n";

    let pruner = Pruner::new(Arc::new(directory));
    let result = pruner.prune(doc, PATTERN, cutoff(), cutoff()).await.unwrap();

    assert_eq!(result.inactive_count(), 1);
    assert_eq!(result.text, "");
}

#[tokio::test]
async fn test_capture_group_at_start_fails_before_any_lookup() {
    let directory = Arc::new(FakeDirectory {
        active: ["Alice".to_string()].into(),
        ..Default::default()
    });
    let pruner = Pruner::new(directory.clone());

    let err = pruner
        .prune("{{Alice|note}}", r"([^|]*)\|note\}\}", cutoff(), cutoff())
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::CaptureGroupAtStart(_)));
    assert_eq!(directory.lookup_count(), 0);
}

#[tokio::test]
async fn test_wrong_capture_group_count_is_a_configuration_error() {
    let pruner = Pruner::new(Arc::new(FakeDirectory::default()));

    let err = pruner
        .prune("doc", r"\{\{entry\|([^|]*)\|(\w+)\}\}", cutoff(), cutoff())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::CaptureGroupCount { groups: 2, .. }
    ));

    let err = pruner
        .prune("doc", r"\{\{entry\}\}", cutoff(), cutoff())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::CaptureGroupCount { groups: 0, .. }
    ));
}

#[tokio::test]
async fn test_no_removals_and_no_renames_is_byte_identical() {
    let directory = FakeDirectory {
        active: ["Alice".to_string(), "Bob".to_string()].into(),
        ..Default::default()
    };
    // odd spacing and trailing junk must survive untouched
    let doc = "{{entry|Alice|note}}\r\n\n  {{entry|Bob|note}}  \n";

    let result = prune(directory, doc).await;

    assert_eq!(result.text, doc);
    assert_eq!(result.inactive_count(), 0);
    assert_eq!(result.indeffed_count(), 0);
    assert_eq!(result.rename_count(), 0);
}

#[tokio::test]
async fn test_lookup_error_aborts_the_pass() {
    struct FailingDirectory;

    #[async_trait]
    impl ActivityDirectory for FailingDirectory {
        async fn has_activity_since(
            &self,
            _identifier: &str,
            _cutoff: OffsetDateTime,
        ) -> anyhow::Result<bool> {
            anyhow::bail!("connection reset")
        }

        async fn redirect_target_of(&self, _identifier: &str) -> anyhow::Result<Option<String>> {
            anyhow::bail!("connection reset")
        }

        async fn is_indef_blocked_since(
            &self,
            _identifier: &str,
            _cutoff: OffsetDateTime,
        ) -> anyhow::Result<bool> {
            anyhow::bail!("connection reset")
        }
    }

    let pruner = Pruner::new(Arc::new(FailingDirectory));
    let err = pruner
        .prune("{{entry|Alice|note}}", PATTERN, cutoff(), cutoff())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Lookup(_)));
}

#[tokio::test]
async fn test_subpage_qualified_entry_classifies_by_root() {
    // {{entry|Bob/archive|note}} refers to Bob; Bob is active so the entry
    // stays even though the spelling carries a qualifier
    let directory = FakeDirectory {
        active: ["Bob".to_string()].into(),
        ..Default::default()
    };
    let doc = "{{entry|Bob/archive|note}}\n";

    let result = prune(directory, doc).await;
    assert_eq!(result.text, doc);
}

#[tokio::test]
async fn test_mixed_pass_removes_then_renames() {
    let directory = FakeDirectory {
        active: [
            "Alice".to_string(),
            "Caroline".to_string(),
            "Mallory".to_string(),
        ]
        .into(),
        redirects: [("Carol".to_string(), "Caroline".to_string())].into(),
        blocked: ["Mallory".to_string()].into(),
        ..Default::default()
    };
    let doc = "{{entry|Alice|note}}\n\
               {{entry|Bob|note}}\n\
               {{entry|Carol|note}}\n\
               {{entry|Mallory|note}}\n";

    let result = prune(directory, doc).await;

    assert_eq!(
        result.text,
        "{{entry|Alice|note}}\n{{entry|Caroline|note}}\n"
    );
    assert_eq!(result.removed_inactive, vec!["Bob".to_string()]);
    assert_eq!(result.removed_indeffed, vec!["Mallory".to_string()]);
    assert_eq!(
        result.renames,
        vec![("Carol".to_string(), "Caroline".to_string())]
    );
}
