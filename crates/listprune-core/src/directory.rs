//! Activity Directory trait
//!
//! The engine never talks to storage directly; it asks these three questions
//! about an identifier and nothing else. Implementations live elsewhere
//! (the replica client in `listprune-directory`, fakes in tests).

use async_trait::async_trait;
use time::OffsetDateTime;

/// Read-only directory answering activity/redirect/block questions.
///
/// "Not found" is an expected, frequent outcome and is expressed in the
/// return value (`false` / `None`), never as an error. An `Err` from any of
/// these methods means the lookup itself failed and aborts the whole pass.
///
/// Implementations must be safe for concurrent use by multiple simultaneous
/// passes; the engine shares one instance behind an `Arc`.
#[async_trait]
pub trait ActivityDirectory: Send + Sync {
    /// Whether the subject has any qualifying activity at or after `cutoff`.
    async fn has_activity_since(
        &self,
        identifier: &str,
        cutoff: OffsetDateTime,
    ) -> anyhow::Result<bool>;

    /// The identifier this one redirects to, or `None`. Implementations
    /// return the target in space-separated form; the classifier normalizes
    /// it before use.
    async fn redirect_target_of(&self, identifier: &str) -> anyhow::Result<Option<String>>;

    /// Whether an unconditional, non-expiring restriction was imposed on the
    /// subject at or before `cutoff` and is still unconditional.
    async fn is_indef_blocked_since(
        &self,
        identifier: &str,
        cutoff: OffsetDateTime,
    ) -> anyhow::Result<bool>;
}
