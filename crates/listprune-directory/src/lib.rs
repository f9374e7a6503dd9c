//! Activity Directory backed by a wiki database replica
//!
//! Implements [`ActivityDirectory`] over a MySQL connection pool. The pool
//! is opened once per process and shared read-only across concurrent
//! pruning passes; sqlx pools and prepared statements are safe for that.
//!
//! "No rows" is the expected answer for most subjects and maps onto the
//! trait's `false`/`None` sentinels; any other database error propagates and
//! aborts the pass that asked.

use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::Row;
use thiserror::Error;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::debug;

use listprune_core::ActivityDirectory;

pub type Result<T> = std::result::Result<T, DirectoryError>;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("timestamp formatting failed: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// Any qualifying activity at or after the cutoff, one row is enough.
const ACTIVITY_QUERY: &str = "SELECT 1 FROM revision_userindex \
     INNER JOIN actor_user ON actor_user.actor_name = ? AND actor_id = rev_actor \
     WHERE rev_timestamp > ? LIMIT 1";

/// An unconditional, non-expiring restriction imposed at or before the
/// cutoff. Expiring or partial restrictions do not count.
const BLOCK_QUERY: &str = "SELECT bl_id FROM block_target \
     INNER JOIN user ON user_name = ? AND user_id = bt_user \
     INNER JOIN block ON bl_target = bt_id \
     WHERE bl_expiry = 'infinity' AND bl_timestamp < ? LIMIT 1";

/// Redirect target of the subject's root page within the user namespace.
const REDIRECT_QUERY: &str = "SELECT rd_title FROM redirect \
     INNER JOIN page ON page_namespace = 3 AND page_title = ? AND rd_from = page_id \
     WHERE page_is_redirect = 1 AND rd_namespace = 3 LIMIT 1";

/// Directory client over the replica. Cheap to clone; all clones share the
/// same pool.
#[derive(Clone)]
pub struct ReplicaDirectory {
    pool: MySqlPool,
}

impl ReplicaDirectory {
    /// Open the replica pool. Connection acquisition is bounded so a dead
    /// replica fails the run instead of hanging it.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// The replica stores timestamps as `YYYYMMDDHHMMSS` strings.
    fn replica_timestamp(at: OffsetDateTime) -> Result<String> {
        let format = format_description!("[year][month][day][hour][minute][second]");
        Ok(at.format(&format)?)
    }

    /// Page-title form of an identifier: spaces become underscores.
    fn title_form(identifier: &str) -> String {
        identifier.replace(' ', "_")
    }
}

#[async_trait]
impl ActivityDirectory for ReplicaDirectory {
    async fn has_activity_since(
        &self,
        identifier: &str,
        cutoff: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let since = Self::replica_timestamp(cutoff)?;
        let row = sqlx::query(ACTIVITY_QUERY)
            .bind(identifier)
            .bind(&since)
            .fetch_optional(&self.pool)
            .await
            .map_err(DirectoryError::Database)?;
        debug!(identifier, active = row.is_some(), "activity lookup");
        Ok(row.is_some())
    }

    async fn redirect_target_of(&self, identifier: &str) -> anyhow::Result<Option<String>> {
        let row = sqlx::query(REDIRECT_QUERY)
            .bind(Self::title_form(identifier))
            .fetch_optional(&self.pool)
            .await
            .map_err(DirectoryError::Database)?;

        let target = match row {
            Some(row) => {
                let title: String = row.try_get(0).map_err(DirectoryError::Database)?;
                // page titles come back underscored and may point at a
                // subpage; only the root identifier is meaningful
                let root = title
                    .replace('_', " ")
                    .split('/')
                    .next()
                    .unwrap_or_default()
                    .to_string();
                debug!(identifier, target = %root, "redirect lookup hit");
                Some(root)
            }
            None => None,
        };
        Ok(target)
    }

    async fn is_indef_blocked_since(
        &self,
        identifier: &str,
        cutoff: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let before = Self::replica_timestamp(cutoff)?;
        let row = sqlx::query(BLOCK_QUERY)
            .bind(identifier)
            .bind(&before)
            .fetch_optional(&self.pool)
            .await
            .map_err(DirectoryError::Database)?;
        debug!(identifier, blocked = row.is_some(), "block lookup");
        Ok(row.is_some())
    }
}
